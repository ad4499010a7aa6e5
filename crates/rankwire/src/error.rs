/// Outcome of a communication operation that did not succeed.
///
/// These are cooperative conditions, not internal failures: the runtime
/// stays usable toward other peers after any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommError {
    /// The operation addressed this process's own rank.
    #[error("operation addressed to own rank")]
    SelfOp,

    /// The addressed rank is outside the world.
    #[error("no such rank")]
    NoSuchRank,

    /// The tag is not usable here: sends need a strictly positive tag,
    /// receives a positive tag or the wildcard.
    #[error("invalid tag")]
    InvalidTag,

    /// The channel to or from the peer has closed.
    #[error("remote process finished")]
    RemoteFinished,

    /// The pairwise deadlock check found unsatisfiable waiting.
    #[error("deadlock detected")]
    DeadlockDetected,
}

pub type Result<T> = std::result::Result<T, CommError>;

/// Errors that can occur while bringing a world up.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// The job environment or channel wiring is unusable.
    #[error(transparent)]
    Channel(#[from] rankwire_channel::ChannelError),

    /// The explicit channel table handed to `from_channels` is inconsistent.
    #[error("world wiring mismatch: {0}")]
    Wiring(&'static str),

    /// A receiver thread could not be started.
    #[error("failed to start receiver thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Width of the status word carried at the tail of collective payloads.
pub(crate) const STATUS_SIZE: usize = 4;

/// Fold two outcomes, keeping the dominant one.
///
/// Precedence: `NoSuchRank > SelfOp > InvalidTag > RemoteFinished >
/// DeadlockDetected > Ok`, so the most informative permanent condition
/// wins over transient and cooperative ones. Programming errors cannot
/// actually reach a collective's status tail (collectives take no user
/// tags and validate the root up front), but the fold is total anyway.
pub(crate) fn combine(a: Result<()>, b: Result<()>) -> Result<()> {
    use CommError::*;
    match (a, b) {
        (Err(NoSuchRank), _) | (_, Err(NoSuchRank)) => Err(NoSuchRank),
        (Err(SelfOp), _) | (_, Err(SelfOp)) => Err(SelfOp),
        (Err(InvalidTag), _) | (_, Err(InvalidTag)) => Err(InvalidTag),
        (Err(RemoteFinished), _) | (_, Err(RemoteFinished)) => Err(RemoteFinished),
        (Err(DeadlockDetected), _) | (_, Err(DeadlockDetected)) => Err(DeadlockDetected),
        _ => Ok(()),
    }
}

/// Encode an outcome as the little-endian status word.
pub(crate) fn encode_status(status: Result<()>) -> [u8; STATUS_SIZE] {
    let code: u32 = match status {
        Ok(()) => 0,
        Err(CommError::SelfOp) => 1,
        Err(CommError::NoSuchRank) => 2,
        Err(CommError::RemoteFinished) => 3,
        Err(CommError::DeadlockDetected) => 4,
        Err(CommError::InvalidTag) => 5,
    };
    code.to_le_bytes()
}

/// Decode a status word received from a peer.
///
/// An out-of-protocol code is treated as the peer having misbehaved, which
/// the caller observes as the peer being gone.
pub(crate) fn decode_status(bytes: &[u8]) -> Result<()> {
    let mut word = [0u8; STATUS_SIZE];
    word.copy_from_slice(&bytes[..STATUS_SIZE]);
    match u32::from_le_bytes(word) {
        0 => Ok(()),
        1 => Err(CommError::SelfOp),
        2 => Err(CommError::NoSuchRank),
        3 => Err(CommError::RemoteFinished),
        4 => Err(CommError::DeadlockDetected),
        5 => Err(CommError::InvalidTag),
        _ => Err(CommError::RemoteFinished),
    }
}
