//! Client configuration from environment variables

use crate::conversation::ReplyOrdering;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL, without trailing slash
    pub api_url: String,
    /// Placement of agent replies among concurrent sends
    pub reply_ordering: ReplyOrdering,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            reply_ordering: ReplyOrdering::Completion,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    /// TEXTGPT_API_URL and TEXTGPT_REPLY_ORDER are both optional
    pub fn from_env() -> Self {
        let api_url = std::env::var("TEXTGPT_API_URL")
            .ok()
            .and_then(|url| {
                let trimmed = url.trim().trim_end_matches('/');
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let reply_ordering = match std::env::var("TEXTGPT_REPLY_ORDER") {
            Ok(value) if !value.trim().is_empty() => value.parse().unwrap_or_else(|e| {
                tracing::warn!("{}; falling back to completion order", e);
                ReplyOrdering::Completion
            }),
            _ => ReplyOrdering::Completion,
        };

        Self {
            api_url,
            reply_ordering,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        std::env::remove_var("TEXTGPT_API_URL");
        std::env::remove_var("TEXTGPT_REPLY_ORDER");
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let config = ClientConfig::from_env();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.reply_ordering, ReplyOrdering::Completion);
    }

    #[test]
    #[serial]
    fn test_reads_env() {
        clear_env();
        std::env::set_var("TEXTGPT_API_URL", " https://chat.example.com/ ");
        std::env::set_var("TEXTGPT_REPLY_ORDER", "sent");

        let config = ClientConfig::from_env();
        assert_eq!(config.api_url, "https://chat.example.com");
        assert_eq!(config.reply_ordering, ReplyOrdering::Sent);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_bad_ordering_falls_back() {
        clear_env();
        std::env::set_var("TEXTGPT_API_URL", "   ");
        std::env::set_var("TEXTGPT_REPLY_ORDER", "alphabetical");

        let config = ClientConfig::from_env();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.reply_ordering, ReplyOrdering::Completion);
        clear_env();
    }
}
