/*!
 * Error types for Ferry
 */

use std::fmt;
use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, FerryError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug)]
pub enum FerryError {
    /// I/O error
    Io(io::Error),

    /// Configuration error
    Config(String),

    /// No usable credential configured
    AuthConfiguration(String),

    /// The underlying connection failed (reset, timeout, refused)
    Transport(String),

    /// The remote store answered with a non-success application status
    RemoteRejection { status: u16, body: String },

    /// Record creation was refused by the remote store
    RecordCreation { status: u16, body: String },

    /// Local source file does not exist
    LocalFileMissing(PathBuf),

    /// Metadata source file could not be read or parsed
    Metadata(String),

    /// Version manifest could not be parsed
    ManifestParse(String),

    /// Retry budget exhausted without a usable response
    RetriesExhausted { attempts: u32 },

    /// Cancellation was accepted at a suspension point
    Interrupted,
}

impl FerryError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // Fatal errors: nothing was or can be transferred
            FerryError::Config(_)
            | FerryError::AuthConfiguration(_)
            | FerryError::Metadata(_)
            | FerryError::ManifestParse(_)
            | FerryError::RecordCreation { .. } => EXIT_FATAL,
            // Everything else: partial failure
            _ => EXIT_PARTIAL,
        }
    }

    /// Check if this error aborts an entire run (as opposed to one item)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FerryError::Config(_)
                | FerryError::AuthConfiguration(_)
                | FerryError::Metadata(_)
                | FerryError::ManifestParse(_)
                | FerryError::RecordCreation { .. }
                | FerryError::Interrupted
        )
    }

    /// Check if this error is a transport failure worth a reconnect-and-retry
    pub fn is_transport(&self) -> bool {
        match self {
            FerryError::Transport(_) => true,
            FerryError::Io(io_err) => Self::is_io_transport(io_err),
            _ => false,
        }
    }

    fn is_io_transport(io_err: &io::Error) -> bool {
        use io::ErrorKind::*;
        matches!(
            io_err.kind(),
            ConnectionRefused
                | ConnectionReset
                | ConnectionAborted
                | NotConnected
                | BrokenPipe
                | TimedOut
                | Interrupted
        )
    }
}

impl fmt::Display for FerryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FerryError::Io(err) => {
                write!(f, "I/O error: {}", err)
            }
            FerryError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            FerryError::AuthConfiguration(msg) => {
                write!(f, "No usable credential: {}", msg)
            }
            FerryError::Transport(msg) => {
                write!(f, "Transport error: {}", msg)
            }
            FerryError::RemoteRejection { status, body } => {
                write!(f, "Remote store rejected the request ({}): {}", status, body)
            }
            FerryError::RecordCreation { status, body } => {
                write!(f, "Unable to create record ({}): {}", status, body)
            }
            FerryError::LocalFileMissing(path) => {
                write!(f, "Local file not found: {}", path.display())
            }
            FerryError::Metadata(msg) => {
                write!(f, "Metadata source error: {}", msg)
            }
            FerryError::ManifestParse(msg) => {
                write!(f, "Manifest parse error: {}", msg)
            }
            FerryError::RetriesExhausted { attempts } => {
                write!(f, "All {} attempts exhausted", attempts)
            }
            FerryError::Interrupted => {
                write!(f, "Interrupted by cancellation")
            }
        }
    }
}

impl std::error::Error for FerryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FerryError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for FerryError {
    fn from(err: io::Error) -> Self {
        FerryError::Io(err)
    }
}
