use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid auid/password combination")]
    Authentication,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Printer not found: {name}")]
    PrinterNotFound { name: String },

    #[error("Spooler error: {0}")]
    Spooler(String),

    #[error("Print submission failed: {0}")]
    Submission(String),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to resolve print server {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Credential store error: {0}")]
    SecretStore(#[from] SecretStoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with status {}", exit_label(.code))]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{program} did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
}

#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("Secret store unavailable: {0}")]
    Unavailable(String),

    #[error("Secret store operation failed: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid command timeout: {value}")]
    InvalidTimeout { value: String },

    #[error("Invalid session lifetime: {value}")]
    InvalidSessionTtl { value: String },

    #[error("Invalid server IP address: {value}")]
    InvalidServerIp { value: String },

    #[error("Invalid boolean for {key}: {value}")]
    InvalidFlag { key: String, value: String },

    #[error("Print server hostname must not be empty")]
    EmptyHost,
}

pub type AppResult<T> = Result<T, AppError>;

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

impl AppError {
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Authentication => 401,             // Unauthorized
            AppError::InvalidCredentials(_) => 401,      // Unauthorized
            AppError::PrinterNotFound { .. } => 404,     // Not Found
            AppError::FileNotFound { .. } => 404,        // Not Found
            AppError::Spooler(_) => 503,                 // Service Unavailable
            AppError::Submission(_) => 503,              // Service Unavailable
            AppError::Resolve { .. } => 503,             // Service Unavailable
            AppError::Command(_) => 503,                 // Service Unavailable
            AppError::SecretStore(_) => 500,             // Internal Server Error
            AppError::Config(_) => 500,                  // Internal Server Error
            AppError::Prompt(_) => 500,                  // Internal Server Error
            AppError::Io(_) => 500,                      // Internal Server Error
        }
    }

    pub fn error_response(&self) -> serde_json::Value {
        serde_json::json!({
            "ok": false,
            "error": self.to_string(),
            "error_type": self.error_type()
        })
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::Authentication | AppError::InvalidCredentials(_) => "authentication_error",
            AppError::PrinterNotFound { .. } => "printer_not_found",
            AppError::Spooler(_) => "spooler_error",
            AppError::Submission(_) => "submission_error",
            AppError::FileNotFound { .. } => "file_not_found",
            AppError::Resolve { .. } => "resolve_error",
            AppError::Command(_) => "command_error",
            AppError::SecretStore(_) => "secret_store_error",
            AppError::Config(_) => "config_error",
            AppError::Prompt(_) => "prompt_error",
            AppError::Io(_) => "io_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_display() {
        let err = CommandError::Failed {
            program: "lpadmin".to_string(),
            code: Some(1),
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "lpadmin exited with status 1");

        let err = CommandError::Failed {
            program: "smbclient".to_string(),
            code: None,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "smbclient exited with status signal");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(AppError::Authentication.status_code(), 401);

        let err = AppError::PrinterNotFound {
            name: "5341-101".to_string(),
        };
        assert_eq!(err.status_code(), 404);

        let err = AppError::Spooler("lpadmin exited with status 1".to_string());
        assert_eq!(err.status_code(), 503);
    }

    #[test]
    fn test_error_response_json() {
        let err = AppError::PrinterNotFound {
            name: "5341-101".to_string(),
        };
        let json = err.error_response();

        assert_eq!(json["ok"], false);
        assert_eq!(json["error"], "Printer not found: 5341-101");
        assert_eq!(json["error_type"], "printer_not_found");
    }

    #[test]
    fn test_authentication_error_does_not_name_a_field() {
        let json = AppError::Authentication.error_response();
        assert_eq!(json["error"], "Invalid auid/password combination");
    }
}
