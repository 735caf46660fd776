use thiserror::Error;

use crate::platform::WindowHandle;

#[derive(Debug, Error)]
pub enum PilotError {
    #[error("Window '{0}' not found")]
    WindowNotFound(String),

    #[error("Window {0} is gone")]
    WindowGone(WindowHandle),

    #[error("Window '{0}' is already added")]
    DuplicateDevice(String),

    #[error("No valid captcha targets found")]
    NoCaptchaTarget,

    #[error("Couldn't find the starting point for dragging")]
    NoStartPoint,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Perception error: {0}")]
    Perception(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl serde::Serialize for PilotError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type PilotResult<T> = Result<T, PilotError>;
