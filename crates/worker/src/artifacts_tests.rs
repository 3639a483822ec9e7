// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rtt_cache::LocalStore;
use tempfile::TempDir;

struct Dirs {
    _root: TempDir,
    cache_data: PathBuf,
    cache_config: PathBuf,
    storage_data: PathBuf,
    storage_config: PathBuf,
}

fn dirs() -> Dirs {
    let root = TempDir::new().unwrap();
    let mk = |name: &str| {
        let dir = root.path().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    };
    Dirs {
        cache_data: mk("cache-data"),
        cache_config: mk("cache-config"),
        storage_data: mk("storage-data"),
        storage_config: mk("storage-config"),
        _root: root,
    }
}

fn fetcher(d: &Dirs) -> ArtifactFetcher<LocalStore> {
    ArtifactFetcher::new(
        LocalStore,
        d.cache_data.clone(),
        d.cache_config.clone(),
        d.storage_data.clone(),
        d.storage_config.clone(),
    )
}

#[tokio::test]
async fn fetches_both_artifacts_into_cache() {
    let d = dirs();
    std::fs::write(d.storage_data.join("42.bin"), vec![0u8; 1024]).unwrap();
    std::fs::write(d.storage_config.join("42.json"), b"{}").unwrap();

    let (data, config) = fetcher(&d).ensure(42, None, false).await.unwrap();

    assert_eq!(data, d.cache_data.join("42.bin"));
    assert_eq!(config, d.cache_config.join("42.json"));
    assert_eq!(std::fs::read(&data).unwrap().len(), 1024);
    assert_eq!(std::fs::read(&config).unwrap(), b"{}");
    assert!(paths::sentinel_file(&data).exists());
    assert!(paths::sentinel_file(&config).exists());
}

#[tokio::test]
async fn digest_mismatch_fails_the_fetch() {
    let d = dirs();
    std::fs::write(d.storage_data.join("42.bin"), b"data").unwrap();
    std::fs::write(d.storage_config.join("42.json"), b"{}").unwrap();

    let err = fetcher(&d)
        .ensure(42, Some("0000000000000000"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::DigestMismatch { .. }));
}

#[tokio::test]
async fn cached_pair_is_not_refetched() {
    let d = dirs();
    std::fs::write(d.storage_data.join("7.bin"), b"bits").unwrap();
    std::fs::write(d.storage_config.join("7.json"), b"{}").unwrap();

    let f = fetcher(&d);
    f.ensure(7, None, false).await.unwrap();

    // Remove the remote side; the cached copy must satisfy the second call.
    std::fs::remove_file(d.storage_data.join("7.bin")).unwrap();
    std::fs::remove_file(d.storage_config.join("7.json")).unwrap();
    let (data, _config) = f.ensure(7, None, false).await.unwrap();
    assert_eq!(std::fs::read(&data).unwrap(), b"bits");
}
