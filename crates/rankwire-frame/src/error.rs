/// Errors that can occur while reading or writing framed messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The channel closed before a complete message crossed it.
    #[error("channel closed")]
    Closed,

    /// An I/O error occurred while reading or writing a message.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
