//! Common error types.

use thiserror::Error;

/// Error type for fallible setup and configuration paths.
///
/// Request handling itself never fails synchronously; transport failures are
/// reported through completion notifications instead.
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    #[error("Setting {key} expects a {expected} value")]
    SettingType { key: String, expected: &'static str },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type BrowserResult<T> = Result<T, BrowserError>;

impl BrowserError {
    pub fn unknown_setting(key: impl Into<String>) -> Self {
        Self::UnknownSetting(key.into())
    }

    pub fn setting_type(key: impl Into<String>, expected: &'static str) -> Self {
        Self::SettingType {
            key: key.into(),
            expected,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BrowserError::unknown_setting("Network/Nope");
        assert_eq!(err.to_string(), "Unknown setting: Network/Nope");

        let err = BrowserError::setting_type("Network/EnableReferrer", "boolean");
        assert_eq!(
            err.to_string(),
            "Setting Network/EnableReferrer expects a boolean value"
        );
    }

    #[test]
    fn test_from_url_error() {
        let err: BrowserError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, BrowserError::UrlParse(_)));
    }
}
