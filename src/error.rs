// Error types shared between the library and the CLI. Every remote
// failure carries the name of the operation that was being performed so
// batch commands can report which item went wrong.

use std::io;
use std::path::PathBuf;

use reqwest::StatusCode;

/// Errors produced by the doarama client.
///
/// Invalid input and cancellation are rejected locally, before any
/// remote call is made. A remote call can fail three ways: the request
/// never completed, the server answered with a non-2xx status, or the
/// response body could not be decoded. `Track` ties any of these to the
/// batch input file it occurred on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("exactly one of user id and user key must be specified")]
    AmbiguousCredentials,

    #[error("no activities to visualise")]
    NothingToVisualise,

    #[error("operation cancelled")]
    Cancelled,

    #[error("cannot open track file {}", .path.display())]
    TrackFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("track {}: {}", .path.display(), .source)]
    Track { path: PathBuf, source: Box<Error> },

    #[error("{operation}: request failed")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation}: server returned {status}: {body}")]
    Status {
        operation: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("{operation}: malformed response body")]
    Decode {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl Error {
    /// Whether this error is a remote-call failure (as opposed to invalid
    /// input rejected locally).
    pub fn is_remote(&self) -> bool {
        match self {
            Error::Transport { .. } | Error::Status { .. } | Error::Decode { .. } => true,
            Error::Track { source, .. } => source.is_remote(),
            _ => false,
        }
    }

    /// Attach the track file an error occurred on, so batch errors
    /// identify the failing input. File-open errors already carry their
    /// path and are returned unchanged.
    pub(crate) fn for_track(self, path: &std::path::Path) -> Error {
        match self {
            err @ Error::TrackFile { .. } => err,
            err => Error::Track {
                path: path.to_path_buf(),
                source: Box::new(err),
            },
        }
    }
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;
