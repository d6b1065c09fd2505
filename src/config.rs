use serde::{Deserialize, Serialize};

use crate::errors::XuiError;

/// Where the panel lives and how to log in to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelConfig {
    pub panel_url: String,
    pub username: String,
    pub password: String,
}

impl PanelConfig {
    pub fn new(
        panel_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            panel_url: with_trailing_slash(panel_url.into()),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Reads `XUI_PANEL_URL`, `XUI_USERNAME` and `XUI_PASSWORD`.
    pub fn from_env() -> Result<Self, XuiError> {
        tracing::info!("Loading panel config from environment");
        Ok(Self::new(
            require_var("XUI_PANEL_URL")?,
            require_var("XUI_USERNAME")?,
            require_var("XUI_PASSWORD")?,
        ))
    }
}

fn require_var(name: &str) -> Result<String, XuiError> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| XuiError::Config(format!("{} is not set", name)))
}

// Endpoints are joined relative to the base, which drops a last segment
// that is not followed by a slash.
fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}
