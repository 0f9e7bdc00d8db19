//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// a magic number, fixed field or structural invariant did not match
    #[error("malformed header: {0}")]
    #[diagnostic(help("the file is either corrupt or not the format it was opened as"))]
    MalformedHeader(String),

    /// a count, offset or length read from a directory is out of range
    #[error("{field} of {value} is outside of 0..={bound}")]
    OutOfRange {
        /// Name of the field that was checked
        field: &'static str,
        /// The value that was read
        value: i64,
        /// The inclusive upper bound
        bound: i64,
    },

    /// read called on a stream with no bytes left
    #[error("attempted to read past the end of a decompressed stream")]
    ExhaustedStream,

    /// compressed data could not be decoded
    #[error("{codec} decompression failed: {message}")]
    Codec {
        /// Name of the strategy that failed
        codec: &'static str,
        /// What went wrong
        message: String,
    },

    /// no plugin recognised the input
    #[error("no format plugin recognised the input")]
    UnsupportedFormat,

    /// unable to find requested file
    #[error("unable to find requested file")]
    FileNotFound(#[from] FileNotFoundError),

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

impl Error {
    /// Shorthand for building a [`Error::Codec`]
    pub fn codec(codec: &'static str, message: impl Into<String>) -> Self {
        Error::Codec {
            codec,
            message: message.into(),
        }
    }
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested file")]
pub enum FileNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by name {0}
    #[error("by name {0}")]
    Name(String),
}

impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::IOError(e) => e,
            Error::ExhaustedStream => {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, value)
            }
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
