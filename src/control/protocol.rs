use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const SET_WATCH_PATH: &str = "SetWatchPath";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum ControlCommand {
    SetWatchPath { path: String },
}

/// Failures reported back to the client. `Display` is the response message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("invalid format")]
    InvalidFormat,
    #[error("unknown command")]
    UnknownCommand(String),
    #[error("path not provided")]
    PathNotProvided,
    #[error("not a valid directory: {0}")]
    NotADirectory(String),
    #[error("failed to start watcher: {0}")]
    WatchFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub status: ResponseStatus,
    pub message: String,
}

impl ControlResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Ok,
            message: message.into(),
        }
    }

    pub fn error(err: &ControlError) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: err.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"status":"error","message":"response encoding failed"}"#.to_string()
        })
    }
}

/// Parse one request. Anything that is not a JSON object with a string
/// `command` is `invalid format`; a command other than `SetWatchPath` is
/// `unknown command`. A missing, null or empty `path` is `path not provided`,
/// while a `path` of any other JSON type is `invalid format`. The path is
/// taken verbatim.
pub fn parse_command(text: &str) -> Result<ControlCommand, ControlError> {
    let value: Value = serde_json::from_str(text).map_err(|_| ControlError::InvalidFormat)?;
    let object = value.as_object().ok_or(ControlError::InvalidFormat)?;
    let command = object
        .get("command")
        .and_then(Value::as_str)
        .ok_or(ControlError::InvalidFormat)?;

    match command {
        SET_WATCH_PATH => {
            let path = match object.get("path") {
                None | Some(Value::Null) => return Err(ControlError::PathNotProvided),
                Some(Value::String(path)) if path.is_empty() => {
                    return Err(ControlError::PathNotProvided)
                }
                Some(Value::String(path)) => path.clone(),
                Some(_) => return Err(ControlError::InvalidFormat),
            };
            Ok(ControlCommand::SetWatchPath { path })
        }
        other => Err(ControlError::UnknownCommand(other.to_string())),
    }
}
