use std::time::Duration;

use anyhow::Context as _;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_ALADIN_BASE_URL: &str = "http://www.aladin.co.kr/ttb/api";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct AladinConfig {
    pub ttb_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub openai: OpenAiConfig,
    pub gemini: GeminiConfig,
    pub aladin: AladinConfig,
    pub http_timeout: Duration,
}

impl Config {
    /// Reads configuration from the process environment.
    ///
    /// Missing API keys are not errors here; the component that needs the key
    /// degrades or fails when it is used.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let temperature = match get("BESSELCHU_OPENAI_TEMPERATURE") {
            Some(raw) => raw
                .parse::<f32>()
                .with_context(|| format!("invalid BESSELCHU_OPENAI_TEMPERATURE={raw:?}"))?,
            None => 0.7,
        };
        let timeout_secs = match get("BESSELCHU_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("invalid BESSELCHU_HTTP_TIMEOUT_SECS={raw:?}"))?,
            None => 120,
        };

        Ok(Self {
            openai: OpenAiConfig {
                api_key: get("OPENAI_API_KEY"),
                base_url: get("BESSELCHU_OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_owned()),
                model: get("BESSELCHU_OPENAI_MODEL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_owned()),
                temperature,
            },
            gemini: GeminiConfig {
                api_key: get("GEMINI_API_KEY"),
                base_url: get("BESSELCHU_GEMINI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_owned()),
                model: get("BESSELCHU_IMAGE_MODEL")
                    .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_owned()),
            },
            aladin: AladinConfig {
                ttb_key: get("ALADIN_TTB_KEY"),
                base_url: get("BESSELCHU_ALADIN_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_ALADIN_BASE_URL.to_owned()),
            },
            http_timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }

    pub fn http_client(&self) -> anyhow::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build http client")
    }
}
