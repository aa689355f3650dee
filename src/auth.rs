//! Google OAuth for an installed app. `yup-oauth2` runs the loopback redirect,
//! refreshes expired tokens and keeps the token cache on disk.

use crate::error::AutoReplyError;
use anyhow::{Context, Result};
use std::fs;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use yup_oauth2::authenticator_delegate::InstalledFlowDelegate;
use yup_oauth2::{ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod};

pub const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// `credentials.json` as downloaded from the Google cloud console
pub async fn load_secrets(path: &Path) -> Result<ApplicationSecret> {
    yup_oauth2::read_application_secret(path).await.map_err(|e| {
        AutoReplyError::auth(format!("cannot read client secrets {}: {}", path.display(), e)).into()
    })
}

/// Prints the consent URL instead of the crate's generic prompt.
struct BrowserPrompt;

impl InstalledFlowDelegate for BrowserPrompt {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        need_code: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            println!("Open this URL in your browser to authorize access to Gmail:\n");
            println!("{}\n", url);
            if !need_code {
                println!("Waiting for authorization ...");
                return Ok(String::new());
            }

            println!("Paste the authorization code:");
            let mut code = String::new();
            BufReader::new(tokio::io::stdin())
                .read_line(&mut code)
                .await
                .map_err(|e| e.to_string())?;
            Ok(code.trim().to_string())
        })
    }
}

/// Directory holding the token cache, readable by the owner only.
fn prepare_cache_dir(token_path: &Path) -> Result<()> {
    let Some(dir) = token_path.parent().filter(|d| !d.as_os_str().is_empty()) else {
        return Ok(());
    };
    if dir.exists() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
        .create(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))
}

/// Forget the cached token so the next authentication runs the browser flow.
fn clear_cache(token_path: &Path) -> Result<()> {
    if token_path.exists() {
        fs::remove_file(token_path)
            .with_context(|| format!("Failed to remove {}", token_path.display()))?;
        debug!(path = %token_path.display(), "token cache cleared");
    }
    Ok(())
}

/// Access token for the Gmail API: cached, refreshed, or obtained through the
/// browser flow. The cache at `token_path` is kept current by the authenticator.
pub async fn authenticate(credentials_path: &Path, token_path: &Path, force_login: bool) -> Result<String> {
    let secret = load_secrets(credentials_path).await?;

    if force_login {
        clear_cache(token_path)?;
    }
    prepare_cache_dir(token_path)?;

    let authenticator =
        InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
            .persist_tokens_to_disk(token_path.to_path_buf())
            .flow_delegate(Box::new(BrowserPrompt))
            .build()
            .await
            .map_err(|e| AutoReplyError::auth(format!("cannot start OAuth flow: {}", e)))?;

    let token = authenticator
        .token(&[GMAIL_MODIFY_SCOPE])
        .await
        .map_err(|e| AutoReplyError::auth(format!("failed to obtain access token: {}", e)))?;
    info!("Gmail access token ready");

    token
        .token()
        .map(str::to_string)
        .ok_or_else(|| AutoReplyError::auth("token response carried no access token").into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_auth_failure(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<AutoReplyError>(),
            Some(AutoReplyError::Authentication(_))
        )
    }

    #[tokio::test]
    async fn test_load_installed_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(
            &path,
            r#"{"installed": {"client_id": "abc", "client_secret": "xyz",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "redirect_uris": ["http://localhost"]}}"#,
        )
        .unwrap();

        let secret = load_secrets(&path).await.unwrap();
        assert_eq!(secret.client_id, "abc");
        assert_eq!(secret.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[tokio::test]
    async fn test_secrets_without_section_is_auth_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, r#"{"other": {}}"#).unwrap();

        assert!(is_auth_failure(&load_secrets(&path).await.unwrap_err()));
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_any_flow() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        fs::write(&token_path, "[]").unwrap();

        let err = authenticate(&dir.path().join("missing.json"), &token_path, true)
            .await
            .unwrap_err();
        assert!(is_auth_failure(&err));
        // the cache is only touched once the secrets are usable
        assert!(token_path.exists());
    }

    #[test]
    fn test_clear_cache() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        clear_cache(&token_path).unwrap();

        fs::write(&token_path, "[]").unwrap();
        clear_cache(&token_path).unwrap();
        assert!(!token_path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_cache_dir_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("gmail-autoreply");
        prepare_cache_dir(&cache_dir.join("token.json")).unwrap();

        let mode = fs::metadata(&cache_dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[tokio::test]
    async fn test_prompt_without_code_returns_immediately() {
        let code = BrowserPrompt
            .present_user_url("https://accounts.google.com/o/oauth2/auth?x=1", false)
            .await
            .unwrap();
        assert!(code.is_empty());
    }
}
