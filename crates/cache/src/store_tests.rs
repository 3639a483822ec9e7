// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::io::AsyncReadExt;

#[tokio::test]
async fn local_store_streams_file_contents() {
    let dir = tempfile::TempDir::new().unwrap();
    let remote = dir.path().join("1.bin");
    tokio::fs::write(&remote, b"random bytes").await.unwrap();

    let store = LocalStore;
    let mut reader = store.open(&remote).await.unwrap();
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await.unwrap();
    assert_eq!(buf, b"random bytes");
    store
        .close(tokio::fs::File::open(&remote).await.unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn local_store_missing_file_is_open_error() {
    let store = LocalStore;
    let err = store
        .open(std::path::Path::new("/nonexistent/1.bin"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Open { .. }));
}

#[test]
fn ssh_command_includes_endpoint_and_key() {
    let store = SshStore::new(
        "storage.example.org",
        2222,
        rtt_core::SshCredentials {
            username: "rtt-storage".to_string(),
            private_key_file: "/keys/storage.pem".into(),
            private_key_password: String::new(),
        },
    );
    let (cmd, askpass) = store
        .command(std::path::Path::new("/remote/data/5.bin"))
        .unwrap();
    assert!(askpass.is_none());

    let args: Vec<String> = cmd
        .as_std()
        .get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    assert!(args.contains(&"rtt-storage@storage.example.org".to_string()));
    assert!(args.contains(&"2222".to_string()));
    assert!(args.contains(&"/keys/storage.pem".to_string()));
    assert!(args.contains(&"cat".to_string()));
    assert!(args.contains(&"/remote/data/5.bin".to_string()));
    // Passphrase-less keys run non-interactively.
    assert!(args.contains(&"-oBatchMode=yes".to_string()));
}

#[test]
fn ssh_command_with_passphrase_uses_askpass() {
    let store = SshStore::new(
        "storage.example.org",
        22,
        rtt_core::SshCredentials {
            username: "u".to_string(),
            private_key_file: "/keys/k.pem".into(),
            private_key_password: "secret".to_string(),
        },
    );
    let (cmd, askpass) = store.command(std::path::Path::new("/remote/1.bin")).unwrap();
    let askpass = askpass.unwrap();
    assert!(askpass.path().exists());

    let envs: Vec<String> = cmd
        .as_std()
        .get_envs()
        .filter_map(|(k, _)| k.to_str().map(String::from))
        .collect();
    assert!(envs.contains(&"SSH_ASKPASS".to_string()));
    assert!(envs.contains(&"SSH_ASKPASS_REQUIRE".to_string()));

    // The passphrase must never appear in argv.
    let args: Vec<String> = cmd
        .as_std()
        .get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    assert!(!args.iter().any(|a| a.contains("secret")));
}
