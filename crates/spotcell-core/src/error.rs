use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpotcellError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid preference file: {0}")]
    PreferenceParse(#[from] toml::de::Error),

    #[error("Cannot serialize preferences: {0}")]
    PreferenceWrite(#[from] toml::ser::Error),

    #[error("Configuration incomplete: {0}")]
    ConfigurationIncomplete(String),

    #[error("Channel index {index} out of range (total: {total})")]
    ChannelIndexOutOfRange { index: usize, total: usize },

    #[error("No image for channel {channel} in field of view {field}")]
    MissingImage { channel: usize, field: usize },

    #[error("Image `{file}` does not match ending pattern `{pattern}`")]
    EndingMismatch { file: String, pattern: String },

    #[error("No spot image could be associated with experiment `{name}` (field of view {field})")]
    PairingFailure { name: String, field: usize },

    #[error("Run declined by user")]
    RunDeclined,

    #[error("A preview is already running for panel {0}")]
    PreviewBusy(String),

    #[error("Batch runner is already running")]
    AlreadyRunning,

    #[error("Execution error: {0}")]
    Execution(String),
}

pub type Result<T> = std::result::Result<T, SpotcellError>;
