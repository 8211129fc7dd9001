use super::base::ProviderConfig;
use anyhow::Result;

pub const OPENAI_HOST: &str = "https://api.openai.com";

/// Connection settings for any endpoint speaking the OpenAI chat-completions protocol.
#[derive(Clone)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    pub host: String,
}

impl OpenAiProviderConfig {
    pub fn new(api_key: String, host: String) -> Self {
        Self { api_key, host }
    }

    /// Use an explicit key; the host still comes from `OPENAI_API_HOST` when set.
    pub fn with_api_key(api_key: String) -> Result<Self> {
        let host = Self::get_env("OPENAI_API_HOST", false, Some(OPENAI_HOST.to_string()))?
            .unwrap_or_else(|| OPENAI_HOST.to_string());
        Ok(Self::new(api_key, host))
    }
}

impl std::fmt::Debug for OpenAiProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProviderConfig")
            .field("api_key", &"<redacted>")
            .field("host", &self.host)
            .finish()
    }
}

impl ProviderConfig for OpenAiProviderConfig {
    fn from_env() -> Result<Self> {
        let api_key = Self::get_env("OPENAI_API_KEY", true, None)?
            .ok_or_else(|| anyhow::anyhow!("OpenAI API key should be present"))?;

        Self::with_api_key(api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_key() {
        let config = OpenAiProviderConfig::new("sk-secret".to_string(), OPENAI_HOST.to_string());
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("sk-secret"));
        assert!(debug_output.contains("<redacted>"));
        assert!(debug_output.contains(OPENAI_HOST));
    }
}
