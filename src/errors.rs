use thiserror::Error;

use crate::protocols::Protocol;

#[derive(Error, Debug)]
pub enum XuiError {
    #[error("Reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("ToStr error: {0}")]
    ToStrError(#[from] reqwest::header::ToStrError),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("{field} is required for {protocol} clients")]
    MissingSecret {
        protocol: Protocol,
        field: &'static str,
    },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Panel error: {0}")]
    Panel(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl XuiError {
    /// True for errors raised by local validation, before anything reaches the panel.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            XuiError::MissingSecret { .. } | XuiError::MissingField(_) | XuiError::Validation(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, XuiError::NotFound(_))
    }
}
