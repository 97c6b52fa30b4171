use std::fmt::Debug;

use crate::provider_client::ProviderError;
use crate::utils::error_chain_fmt;

/// Everything a waitlist request can fail with. The `Display` string is what
/// ends up in the `{"error": ...}` body, so it must never contain secrets.
#[derive(thiserror::Error)]
pub enum WaitlistError {
    /// User-correctable
    #[error("{0}")]
    InvalidInput(String),
    /// Operator-correctable; names variables, never their values
    #[error("{0}")]
    Configuration(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl WaitlistError {
    pub fn missing_variables(names: &[&str]) -> Self {
        Self::Configuration(format!("Missing server env: {}", names.join(", ")))
    }
}

impl Debug for WaitlistError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
