/// Base URL of the backend API, e.g. `http://127.0.0.1:5000/api`. Both the
/// prediction endpoints and the chat proxy hang off this root.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
}

pub const API_URL_ENV: &str = "VDLAB_API_URL";
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000/api";

impl Config {
    /// Resolve configuration from the environment, loading a `.env` file
    /// if one is present. Falls back to the local development backend.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let api_base_url = std::env::var(API_URL_ENV)
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self { api_base_url }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
        }
    }
}
