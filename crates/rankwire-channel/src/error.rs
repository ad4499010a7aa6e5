/// Errors that can occur while wiring channels from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// A required environment variable is missing.
    #[error("environment variable {name} is not set")]
    MissingEnv { name: &'static str },

    /// An environment variable holds something other than a decimal integer.
    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidEnv { name: &'static str, value: String },

    /// The advertised rank does not fit the advertised world size.
    #[error("rank {rank} out of range for world size {size}")]
    RankOutOfRange { rank: usize, size: usize },

    /// The advertised world size exceeds the descriptor table capacity.
    #[error("world size {size} exceeds maximum {max}")]
    WorldTooLarge { size: usize, max: usize },

    /// An I/O error occurred while setting up a channel.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
