//! Streaming chat-completion providers for Toolstream.
//!
//! All providers implement the `toolstream_core::Provider` trait.

pub mod openai_compat;
pub mod sse;

use std::sync::Arc;
use std::time::Duration;

use toolstream_config::AppConfig;
use toolstream_core::error::ProviderError;
use toolstream_core::provider::Provider;

pub use openai_compat::OpenAiCompatProvider;

/// Build the configured provider.
///
/// Fails with [`ProviderError::NotConfigured`] when no API key is available.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config.api_key.as_deref().ok_or_else(|| {
        ProviderError::NotConfigured(
            "no API key: set api_key in config.toml, TOOLSTREAM_API_KEY or OPENAI_API_KEY".into(),
        )
    })?;

    let name = if config.api_url.contains("api.openai.com") {
        "openai"
    } else {
        "openai-compatible"
    };

    tracing::debug!(provider = name, url = %config.api_url, "Building provider");

    let provider = OpenAiCompatProvider::new(
        name,
        config.api_url.as_str(),
        api_key,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    Ok(Arc::new(provider))
}
