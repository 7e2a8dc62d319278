use thiserror::Error;

use super::resource::ResourceError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),
    #[error("{0}")]
    Resource(#[from] ResourceError),
    #[error("command failed: {0}")]
    Command(String),
    #[error("cancelled")]
    Cancelled,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl CliError {
    /// Process exit code.
    ///
    /// 0: success, 1: a task list failed (reported as a normal exit code),
    /// 2: not found, 11: config, 20: command / io, 50: internal,
    /// 130: cancelled by the user.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 11,
            Self::Resource(re) => match re {
                ResourceError::NotFound { .. }
                | ResourceError::PluginNotFound(_)
                | ResourceError::KindNotFound { .. } => 2,
                ResourceError::Adapter(_) => 50,
                _ => 20,
            },
            Self::Command(_) | Self::Io(_) => 20,
            Self::Cancelled => 130,
            Self::Anyhow(_) => 50,
        }
    }
}
