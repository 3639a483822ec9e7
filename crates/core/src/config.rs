// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker configuration, loaded once from the INI master file.
//!
//! The master config references two credential files (database login, storage
//! key) which are INI files themselves. Everything is resolved eagerly into an
//! immutable [`WorkerSettings`] value that the rest of the worker borrows; no
//! component re-reads configuration at runtime.

use config::{File, FileFormat};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fallback for `[Backend] Maximum-seconds-per-test`.
pub const DEFAULT_MAX_SEC_PER_TEST: u64 = 3800;

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },
    #[error("missing key [{section}] {key} in {path}")]
    Missing {
        section: String,
        key: String,
        path: PathBuf,
    },
    #[error("invalid value for [{section}] {key} in {path}: {value}")]
    Invalid {
        section: String,
        key: String,
        path: PathBuf,
        value: String,
    },
}

/// One loaded INI file with section/key access.
struct Ini {
    sections: HashMap<String, HashMap<String, String>>,
    path: PathBuf,
}

impl Ini {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let sections = config::Config::builder()
            .add_source(File::from(path).format(FileFormat::Ini))
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            sections,
            path: path.to_path_buf(),
        })
    }

    /// Section/key lookup, case-insensitive on both parts: the loader does
    /// not guarantee it preserves key case.
    fn get_opt(&self, section: &str, key: &str) -> Option<String> {
        let (_, entries) = self
            .sections
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(section))?;
        entries
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.clone())
    }

    fn get(&self, section: &str, key: &str) -> Result<String, ConfigError> {
        self.get_opt(section, key).ok_or_else(|| ConfigError::Missing {
            section: section.to_string(),
            key: key.to_string(),
            path: self.path.clone(),
        })
    }

    fn get_path(&self, section: &str, key: &str) -> Result<PathBuf, ConfigError> {
        self.get(section, key).map(PathBuf::from)
    }

    fn get_parsed<T: std::str::FromStr>(
        &self,
        section: &str,
        key: &str,
    ) -> Result<T, ConfigError> {
        let value = self.get(section, key)?;
        value.trim().parse().map_err(|_| ConfigError::Invalid {
            section: section.to_string(),
            key: key.to_string(),
            path: self.path.clone(),
            value,
        })
    }

    fn get_parsed_or<T: std::str::FromStr>(
        &self,
        section: &str,
        key: &str,
        default: T,
    ) -> Result<T, ConfigError> {
        match self.get_opt(section, key) {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                section: section.to_string(),
                key: key.to_string(),
                path: self.path.clone(),
                value,
            }),
            None => Ok(default),
        }
    }
}

/// Database login from the `Credentials-file` INI.
#[derive(Debug, Clone)]
pub struct DbCredentials {
    pub username: String,
    pub password: String,
}

/// `[MySQL-Database]` section.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub credentials: DbCredentials,
}

/// `[Local-cache]` section.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub data_dir: PathBuf,
    pub config_dir: PathBuf,
}

/// Storage key material from the storage `Credentials-file` INI.
#[derive(Debug, Clone)]
pub struct SshCredentials {
    pub username: String,
    pub private_key_file: PathBuf,
    pub private_key_password: String,
}

/// `[Storage]` section.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub config_dir: PathBuf,
    pub credentials: SshCredentials,
}

/// `[Backend]` section: worker identity defaults and runtime knobs.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub sender_email: String,
    pub worker_id: String,
    pub worker_name: Option<String>,
    pub location: Option<String>,
    pub longterm: bool,
    pub aux: Option<String>,
    pub max_sec_per_test: u64,
    pub log_dir: PathBuf,
}

/// `[RTT-Binary]` section.
#[derive(Debug, Clone)]
pub struct BinarySettings {
    pub rtt_binary: PathBuf,
    pub booltest_binary: PathBuf,
}

/// The complete, immutable worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub storage: StorageSettings,
    pub backend: BackendSettings,
    pub binaries: BinarySettings,
}

impl WorkerSettings {
    /// Load the master INI and both referenced credential files.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load(path)?;

        let db_cred_path = ini.get_path("MySQL-Database", "Credentials-file")?;
        let db_cred = Ini::load(&db_cred_path)?;
        let database = DatabaseSettings {
            name: ini.get("MySQL-Database", "Name")?,
            host: ini.get("MySQL-Database", "Address")?,
            port: ini.get_parsed("MySQL-Database", "Port")?,
            credentials: DbCredentials {
                username: db_cred.get("Credentials", "Username")?,
                password: db_cred.get("Credentials", "Password")?,
            },
        };

        let cache = CacheSettings {
            data_dir: ini.get_path("Local-cache", "Data-directory")?,
            config_dir: ini.get_path("Local-cache", "Config-directory")?,
        };

        let storage_cred_path = ini.get_path("Storage", "Credentials-file")?;
        let storage_cred = Ini::load(&storage_cred_path)?;
        let storage = StorageSettings {
            host: ini.get("Storage", "Address")?,
            port: ini.get_parsed_or("Storage", "Port", 22)?,
            data_dir: ini.get_path("Storage", "Data-directory")?,
            config_dir: ini.get_path("Storage", "Config-directory")?,
            credentials: SshCredentials {
                username: storage_cred.get("Credentials", "Username")?,
                private_key_file: storage_cred.get_path("Credentials", "Private-key-file")?,
                private_key_password: storage_cred
                    .get_opt("Credentials", "Private-key-password")
                    .unwrap_or_default(),
            },
        };

        let backend = BackendSettings {
            sender_email: ini.get("Backend", "Sender-email")?,
            worker_id: ini.get("Backend", "backend-id")?,
            worker_name: ini.get_opt("Backend", "backend-name"),
            location: ini.get_opt("Backend", "backend-loc"),
            longterm: ini.get_parsed_or::<u8>("Backend", "backend-longterm", 0)? != 0,
            aux: ini.get_opt("Backend", "backend-aux"),
            max_sec_per_test: ini.get_parsed_or(
                "Backend",
                "Maximum-seconds-per-test",
                DEFAULT_MAX_SEC_PER_TEST,
            )?,
            log_dir: ini.get_path("Backend", "log-dir")?,
        };

        let binaries = BinarySettings {
            rtt_binary: ini.get_path("RTT-Binary", "Binary-path")?,
            booltest_binary: ini.get_path("RTT-Binary", "booltest-rtt-path")?,
        };

        Ok(WorkerSettings {
            database,
            cache,
            storage,
            backend,
            binaries,
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
