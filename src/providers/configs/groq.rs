use super::base::ProviderConfig;
use super::openai::OpenAiProviderConfig;
use anyhow::Result;

/// Groq serves the OpenAI protocol under this prefix.
pub const GROQ_HOST: &str = "https://api.groq.com/openai";

pub struct GroqProviderConfig {
    pub api_key: String,
    pub host: String,
}

impl GroqProviderConfig {
    pub fn new(api_key: String, host: String) -> Self {
        Self { api_key, host }
    }

    /// Use an explicit key; the host still comes from `GROQ_API_HOST` when set.
    pub fn with_api_key(api_key: String) -> Result<Self> {
        let host = Self::get_env("GROQ_API_HOST", false, Some(GROQ_HOST.to_string()))?
            .unwrap_or_else(|| GROQ_HOST.to_string());
        Ok(Self::new(api_key, host))
    }
}

impl ProviderConfig for GroqProviderConfig {
    fn from_env() -> Result<Self> {
        let api_key = Self::get_env("GROQ_API_KEY", true, None)?
            .ok_or_else(|| anyhow::anyhow!("Groq API key should be present"))?;

        Self::with_api_key(api_key)
    }
}

impl From<GroqProviderConfig> for OpenAiProviderConfig {
    fn from(config: GroqProviderConfig) -> Self {
        OpenAiProviderConfig::new(config.api_key, config.host)
    }
}
