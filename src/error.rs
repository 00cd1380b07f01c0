use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Invalid webhook payload: {0}")]
    Validation(String),

    #[error("Remote API error ({status}): {message}")]
    Remote {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Completion response error: {0}")]
    Completion(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BotError {
    /// True when the completion API reported that the requested model does
    /// not exist: HTTP 404, or a `not_found` / "model ... not found" message.
    pub fn is_model_not_found(&self) -> bool {
        let BotError::Remote { status, message } = self else {
            return false;
        };
        if *status == reqwest::StatusCode::NOT_FOUND {
            return true;
        }
        let lower = message.to_lowercase();
        lower.contains("not_found") || (lower.contains("model") && lower.contains("not found"))
    }
}

pub type Result<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn not_found_status_is_model_not_found() {
        let err = BotError::Remote {
            status: StatusCode::NOT_FOUND,
            message: "no such route".to_string(),
        };
        assert!(err.is_model_not_found());
    }

    #[test]
    fn not_found_error_type_is_model_not_found() {
        let err = BotError::Remote {
            status: StatusCode::BAD_REQUEST,
            message: r#"{"type":"error","error":{"type":"not_found_error","message":"model: claude-9"}}"#
                .to_string(),
        };
        assert!(err.is_model_not_found());
    }

    #[test]
    fn model_not_found_message_is_case_insensitive() {
        let err = BotError::Remote {
            status: StatusCode::BAD_REQUEST,
            message: "Model claude-9 Not Found".to_string(),
        };
        assert!(err.is_model_not_found());
    }

    #[test]
    fn other_remote_errors_are_not_model_not_found() {
        let err = BotError::Remote {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "rate limited".to_string(),
        };
        assert!(!err.is_model_not_found());
    }

    #[test]
    fn non_remote_errors_are_not_model_not_found() {
        assert!(!BotError::Config("missing key".to_string()).is_model_not_found());
    }
}
