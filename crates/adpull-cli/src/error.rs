use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Fetch(#[from] adpull_core::FetchError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no account produced any data")]
    EmptyRun,

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Fetch(_) | Self::InvalidArgument(_) => 2,
            Self::EmptyRun => 5,
            Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}
