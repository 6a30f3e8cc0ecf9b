#![cfg(unix)]

use armdeploy_core::ARM_SCOPE;
use identity::{AzureCliCredential, TokenProvider};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to chmod script");
    path
}

// Scripts are exercised from a single test so no other test forks while a
// script file is still open for writing.
#[tokio::test]
async fn test_cli_credential_with_fake_az() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let logged_in = write_script(
        temp_dir.path(),
        "az-ok",
        r#"case "$2" in
  get-access-token) echo '{"accessToken": "cli-token", "expires_on": 4102444800}' ;;
  show) echo '11111111-2222-3333-4444-555555555555' ;;
esac"#,
    );
    let cred = AzureCliCredential::with_program(&logged_in);

    let token = cred.get_token(ARM_SCOPE).await.unwrap();
    assert_eq!(token.token(), "cli-token");
    assert_eq!(token.expires_on().unwrap().timestamp(), 4102444800);

    let subscription = cred.default_subscription().await.unwrap();
    assert_eq!(subscription, "11111111-2222-3333-4444-555555555555");

    let logged_out = write_script(
        temp_dir.path(),
        "az-logged-out",
        "echo \"ERROR: Please run 'az login' to setup account.\" >&2\nexit 1",
    );
    let cred = AzureCliCredential::with_program(&logged_out);

    let err = cred.get_token(ARM_SCOPE).await.unwrap_err();
    assert!(err.is_authentication_failure());
    assert!(err.to_string().contains("az login"));
}
