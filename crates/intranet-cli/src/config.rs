use anyhow::Context;
use url::Url;

use intranet_chat::ChatConfig;
use intranet_http::gateway_url;

const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";

/// Where to connect and as whom.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: Url,
    pub gateway_url: Url,
    pub token: String,
    /// Channel (name or id) to open on start.
    pub channel: Option<String>,
    pub chat: ChatConfig,
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), ChatConfig::from_env())
    }

    fn from_lookup<F>(get: F, chat: ChatConfig) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url: Url = get("INTRANET_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.into())
            .parse()
            .context("INTRANET_API_URL is not a valid URL")?;
        let gateway_url = match get("INTRANET_GATEWAY_URL") {
            Some(raw) => raw.parse().context("INTRANET_GATEWAY_URL is not a valid URL")?,
            None => gateway_url(&api_url)?,
        };
        let token = get("INTRANET_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .context("INTRANET_TOKEN must be set")?;
        let channel = get("INTRANET_CHANNEL").filter(|c| !c.trim().is_empty());

        Ok(Self {
            api_url,
            gateway_url,
            token: token.trim().to_string(),
            channel,
            chat,
        })
    }
}
