use core::fmt;
use std::io;

/// Error reading or parsing the process status record.
///
/// Memory reporting is the entire point of the demonstration, so callers
/// treat this as fatal rather than substituting zero readings.
#[derive(Debug)]
pub enum ReportError {
    /// The status record could not be read.
    Io(io::Error),
    /// The status record (or the page size query) did not have the expected
    /// shape. The payload names the field or step that failed.
    Malformed(&'static str),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read process status record: {err}"),
            Self::Malformed(what) => write!(f, "malformed process status record: {what}"),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Malformed(_) => None,
        }
    }
}

impl From<io::Error> for ReportError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// The global allocator could not satisfy a payload or control block
/// allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError {
    size: usize,
}

impl AllocError {
    pub(crate) fn new(size: usize) -> Self {
        Self { size }
    }

    /// Size in bytes of the allocation that failed.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "allocation of {} bytes failed", self.size)
    }
}

impl std::error::Error for AllocError {}

/// Top-level error for the experiment: either a measurement failed or an
/// allocation failed. Both are unrecoverable for this program's purpose.
#[derive(Debug)]
pub enum Error {
    /// A memory report could not be taken.
    Report(ReportError),
    /// A payload or control block could not be allocated.
    Alloc(AllocError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Report(err) => write!(f, "memory report failed: {err}"),
            Self::Alloc(err) => write!(f, "experiment allocation failed: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Report(err) => Some(err),
            Self::Alloc(err) => Some(err),
        }
    }
}

impl From<ReportError> for Error {
    fn from(err: ReportError) -> Self {
        Self::Report(err)
    }
}

impl From<AllocError> for Error {
    fn from(err: AllocError) -> Self {
        Self::Alloc(err)
    }
}
