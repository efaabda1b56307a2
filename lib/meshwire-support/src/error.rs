use std::io;

/// Error taxonomy shared by every component in the fabric (spec.md §7).
///
/// `Wait` is not really an error — it mirrors `io::ErrorKind::WouldBlock` and
/// lets callers distinguish "try again" from "give up", the same split
/// `NetworkError` makes in the teacher's networking stack.
#[derive(Debug)]
pub enum MeshError {
    /// The peer is gone or the socket failed outright.
    Transport(io::Error),
    /// Frame sentinels or length were malformed; the caller should resync,
    /// not disconnect.
    Frame(FrameFault),
    /// A container's text body could not be parsed.
    Parse(&'static str),
    /// A message arrived that violates handshake or routing rules.
    Protocol(&'static str),
    /// The job pool is locked for teardown; the push was dropped.
    PoolLocked,
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum FrameFault {
    /// Named for parity with spec.md §4.4's taxonomy; unreachable from the
    /// blocking `read_exact` receive loop, where a short read can only mean
    /// the peer closed the socket and so is reported as a disconnect
    /// instead. A non-blocking reactor variant would resync on this instead.
    ShortRead,
    StartMismatch,
    EndMismatch,
    LengthOverMax,
    UnknownMode,
}

pub type MeshResult<T> = Result<T, MeshError>;

impl From<io::Error> for MeshError {
    #[inline]
    fn from(err: io::Error) -> Self {
        MeshError::Transport(err)
    }
}

impl MeshError {
    /// True for conditions the caller may retry (the `Wait` equivalent).
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, MeshError::Transport(e) if e.kind() == io::ErrorKind::WouldBlock)
    }
}
