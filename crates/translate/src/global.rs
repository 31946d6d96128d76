//! Process-wide translation client.
//!
//! The client is built once at startup from explicit settings and shared by
//! reference afterwards. Nothing is read from the environment here.

use std::sync::OnceLock;

use tracing::debug;

use crate::client::TranslationClient;
use crate::config::CompletionConfig;
use crate::error::TranslateError;

static CLIENT: OnceLock<TranslationClient> = OnceLock::new();

/// Builds the shared client. Fails if one is already installed.
pub fn install(config: CompletionConfig) -> Result<&'static TranslationClient, TranslateError> {
    if CLIENT.get().is_some() {
        return Err(TranslateError::AlreadyInstalled);
    }
    let client = TranslationClient::new(config)?;
    CLIENT
        .set(client)
        .map_err(|_| TranslateError::AlreadyInstalled)?;
    debug!("installed process-wide translation client");
    client_ref()
}

/// Returns the shared client installed with [`install`].
pub fn client() -> Result<&'static TranslationClient, TranslateError> {
    client_ref()
}

fn client_ref() -> Result<&'static TranslationClient, TranslateError> {
    CLIENT.get().ok_or(TranslateError::NotInstalled)
}
