// Process-wide configuration, resolved once at startup from flags and
// environment variables and passed down to `Client::new`. No global
// mutable state.

use std::time::Duration;

/// Default base URL of the doarama API.
pub const DEFAULT_API_URL: &str = "https://api.doarama.com/api/0.2";

/// Application-level configuration for the API client.
///
/// `api_name` and `api_key` identify the calling application; they are
/// passed through as-is and validated by the remote service, not locally.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the doarama API.
    pub api_url: String,
    /// Application name issued by doarama.
    pub api_name: String,
    /// Application key issued by doarama.
    pub api_key: String,
    /// Per-request timeout. `None` leaves the transport default in place;
    /// expiry surfaces as a regular remote-call failure.
    pub timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: DEFAULT_API_URL.to_string(),
            api_name: String::new(),
            api_key: String::new(),
            timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_the_public_api_with_no_timeout() {
        let config = Config::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.api_name.is_empty());
        assert!(config.api_key.is_empty());
        assert_eq!(config.timeout, None);
    }
}
