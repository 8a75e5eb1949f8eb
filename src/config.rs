use std::env;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "config/chat.json";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5001/api";

const API_URL_VAR: &str = "CHAT_API_URL";
const AUTH_COOKIE_VAR: &str = "CHAT_AUTH_COOKIE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Raw `Cookie` header value, e.g. `jwt=...`, sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_cookie: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            auth_cookie: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Settings from `path` (defaults if absent or unreadable), then environment
    /// overrides.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let mut config = Self::from_file(path.as_ref()).unwrap_or_default();
        config.apply_env_overrides();
        if config.auth_cookie.is_none() {
            log::warn!(
                "No auth cookie configured (set {AUTH_COOKIE_VAR} or `auth_cookie`); \
                 the chat API will answer 401"
            );
        }
        config
    }

    fn from_file(path: &Path) -> Option<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::info!("No chat config at {}; using {DEFAULT_API_BASE_URL}", path.display());
                return None;
            }
            Err(err) => {
                log::warn!("Cannot read chat config {}: {err}", path.display());
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(config) => Some(config),
            Err(err) => {
                log::warn!("Ignoring invalid chat config {}: {err}", path.display());
                None
            }
        }
    }

    /// Environment (after `.env` is loaded) wins over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = non_blank_var(API_URL_VAR) {
            self.api_base_url = url;
        }
        if let Some(cookie) = non_blank_var(AUTH_COOKIE_VAR) {
            self.auth_cookie = Some(cookie);
        }
    }

    /// Write as pretty JSON, creating missing parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        fs::write(path, json)
    }
}

fn non_blank_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
