use std::path::PathBuf;
use thiserror::Error;

use crate::http::HttpError;

#[derive(Debug, Error)]
pub enum AkaError {
    #[error("'{name}' is not an aka command.{}", suggestion_text(.suggestions))]
    UnknownCommand {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("{0}")]
    UserInput(String),

    #[error("Invalid command pattern: '{pattern}'")]
    InvalidPattern { pattern: String },

    #[error("Error loading plugin \"{plugin}\": {message}")]
    PluginLoad { plugin: String, message: String },

    #[error("Invalid plugin manifest at {path}: {message}")]
    PluginManifest { path: PathBuf, message: String },

    #[error("Plugin command '{command}' failed{}", exit_text(.code))]
    PluginCommand { command: String, code: Option<i32> },

    #[error("{0}")]
    Http(#[from] HttpError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Failed to parse config at {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Unknown config key: {key}")]
    ConfigKeyNotFound { key: String },

    #[error("The API host is not configured. Set AKKERIS_API_HOST or run `aka config api.host HOST`")]
    ApiHostMissing,

    #[error("Home directory not found")]
    HomeNotFound,

    #[error("{0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, AkaError>;

fn suggestion_text(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" Did you mean {}?", suggestions.join(", "))
    }
}

fn exit_text(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {code}"),
        None => " (terminated by signal)".to_string(),
    }
}

impl AkaError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UserInput(_) => 2,
            Self::UnknownCommand { .. } => 3,
            Self::Http(HttpError::Status(_)) => 4,
            Self::PluginCommand { code: Some(code), .. } if *code > 0 => *code,
            _ => 1,
        }
    }

    /// Whether the message is meant for the end user as-is.
    ///
    /// Everything else is unexpected and gets replaced by a generic hint
    /// unless debugging is enabled.
    pub fn is_user_facing(&self) -> bool {
        match self {
            Self::Http(err) => err.is_user_facing(),
            Self::Io(_) | Self::Json(_) | Self::TomlSer(_) => false,
            _ => true,
        }
    }

    pub fn user_input(message: impl Into<String>) -> Self {
        Self::UserInput(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_command_lists_suggestions() {
        let err = AkaError::UnknownCommand {
            name: "bulds".to_string(),
            suggestions: vec!["builds".to_string(), "builds:info".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "'bulds' is not an aka command. Did you mean builds, builds:info?"
        );
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_unknown_command_without_suggestions() {
        let err = AkaError::UnknownCommand {
            name: "zzz".to_string(),
            suggestions: Vec::new(),
        };
        assert_eq!(err.to_string(), "'zzz' is not an aka command.");
    }

    #[test]
    fn test_io_errors_are_not_user_facing() {
        let err = AkaError::from(std::io::Error::other("disk on fire"));
        assert!(!err.is_user_facing());
        assert!(AkaError::user_input("missing --app").is_user_facing());
    }

    #[test]
    fn test_plugin_command_passes_exit_code_through() {
        let err = AkaError::PluginCommand {
            command: "apps:info".to_string(),
            code: Some(7),
        };
        assert_eq!(err.to_string(), "Plugin command 'apps:info' failed with exit code 7");
        assert_eq!(err.exit_code(), 7);

        let killed = AkaError::PluginCommand {
            command: "apps:info".to_string(),
            code: None,
        };
        assert_eq!(killed.exit_code(), 1);
    }
}
