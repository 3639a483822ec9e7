// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ensures a job's data and config artifacts are present in the local cache.

use rtt_cache::{ArtifactStore, CacheError, LockedDownloader};
use rtt_core::paths;
use std::path::PathBuf;

/// Fetches `{id}.bin` / `{id}.json` pairs into the cache.
pub struct ArtifactFetcher<S: ArtifactStore> {
    store: S,
    cache_data_dir: PathBuf,
    cache_config_dir: PathBuf,
    storage_data_dir: PathBuf,
    storage_config_dir: PathBuf,
}

impl<S: ArtifactStore> ArtifactFetcher<S> {
    pub fn new(
        store: S,
        cache_data_dir: PathBuf,
        cache_config_dir: PathBuf,
        storage_data_dir: PathBuf,
        storage_config_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            cache_data_dir,
            cache_config_dir,
            storage_data_dir,
            storage_config_dir,
        }
    }

    /// Download both artifacts unless already cached. The data file is
    /// verified against the submitter's digest when one is recorded; config
    /// files carry no digest.
    pub async fn ensure(
        &self,
        experiment_id: i64,
        expected_sha256: Option<&str>,
        force: bool,
    ) -> Result<(PathBuf, PathBuf), CacheError> {
        let data_dest = paths::data_file(&self.cache_data_dir, experiment_id);
        let data_remote = paths::data_file(&self.storage_data_dir, experiment_id);
        LockedDownloader::new(&data_dest)
            .download(&self.store, &data_remote, force, expected_sha256)
            .await?;

        let config_dest = paths::config_file(&self.cache_config_dir, experiment_id);
        let config_remote = paths::config_file(&self.storage_config_dir, experiment_id);
        LockedDownloader::new(&config_dest)
            .download(&self.store, &config_remote, force, None)
            .await?;

        Ok((data_dest, config_dest))
    }
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;
