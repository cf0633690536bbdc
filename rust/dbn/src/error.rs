//! Errors from decoding, encoding, and converting DBN.
use std::{any, io, str::Utf8Error};

use thiserror::Error;

use crate::DBN_VERSION;

/// An error that can occur while processing DBN data.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error while reading or writing DBN.
    #[error("I/O error while {context}: {source}")]
    Io {
        /// The original error.
        #[source]
        source: io::Error,
        /// What was being read or written.
        context: String,
    },
    /// The input was encoded with a DBN version this crate can't decode.
    #[error("DBN version {version} is not supported, expected 1 through {}", DBN_VERSION)]
    UnsupportedVersion {
        /// The version from the input.
        version: u8,
    },
    /// A length prefix from the input is implausible, such as a record length
    /// shorter than a record header.
    #[error("invalid {kind} length {length}: {desc}")]
    InvalidLength {
        /// What the length describes, e.g. `record` or `metadata`.
        kind: &'static str,
        /// The length in bytes.
        length: usize,
        /// Why the length was rejected.
        desc: String,
    },
    /// The input ended in the middle of a metadata field.
    #[error(
        "unexpected end of metadata while reading {field}: needed {needed} bytes at offset {offset} of {available}"
    )]
    Truncated {
        /// The field being read.
        field: String,
        /// The number of bytes the field needs.
        needed: usize,
        /// The offset of the field in the metadata.
        offset: usize,
        /// The total number of metadata bytes available.
        available: usize,
    },
    /// A record is shorter than the struct its rtype indicates.
    #[error("record with length {length} is too short for {record_type}")]
    RecordTooShort {
        /// The record length in bytes.
        length: usize,
        /// The name of the expected record type.
        record_type: &'static str,
    },
    /// Any other invalid input while decoding.
    #[error("decoding error: {0}")]
    Decode(String),
    /// A value can't be represented in DBN.
    #[error("encoding error: {0}")]
    Encode(String),
    /// A raw value doesn't correspond to any variant of an enum.
    #[error("couldn't convert {input} to {desired_type}")]
    Conversion {
        /// The input to the conversion.
        input: String,
        /// The desired type.
        desired_type: &'static str,
    },
    /// A C string in a record or the metadata isn't valid UTF-8.
    #[error("UTF-8 error while {context}: {source}")]
    Utf8 {
        /// The original error.
        #[source]
        source: Utf8Error,
        /// What was being decoded.
        context: String,
    },
    /// An invalid argument was passed to a function.
    #[error("bad argument {param_name}: {desc}")]
    BadArgument {
        /// The name of the parameter.
        param_name: String,
        /// Why the argument was invalid.
        desc: String,
    },
}

/// An alias for a `Result` with [`dbn::Error`](crate::Error) as the error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new I/O [`dbn::Error`](crate::Error).
    pub fn io(error: io::Error, context: impl ToString) -> Self {
        Self::Io {
            source: error,
            context: context.to_string(),
        }
    }

    /// Creates a new decode [`dbn::Error`](crate::Error).
    pub fn decode(msg: impl ToString) -> Self {
        Self::Decode(msg.to_string())
    }

    /// Creates a new encode [`dbn::Error`](crate::Error).
    pub fn encode(msg: impl ToString) -> Self {
        Self::Encode(msg.to_string())
    }

    /// Creates a new invalid length [`dbn::Error`](crate::Error).
    pub fn invalid_length(kind: &'static str, length: usize, desc: impl ToString) -> Self {
        Self::InvalidLength {
            kind,
            length,
            desc: desc.to_string(),
        }
    }

    /// Creates a new [`dbn::Error`](crate::Error) for a record of `length` bytes that
    /// can't hold a `T`.
    pub fn record_too_short<T>(length: usize) -> Self {
        Self::RecordTooShort {
            length,
            record_type: any::type_name::<T>(),
        }
    }

    /// Creates a new conversion [`dbn::Error`](crate::Error) where `desired_type` is `T`.
    pub fn conversion<T>(input: impl ToString) -> Self {
        Self::Conversion {
            input: input.to_string(),
            desired_type: any::type_name::<T>(),
        }
    }

    /// Creates a new UTF-8 [`dbn::Error`](crate::Error).
    pub fn utf8(error: Utf8Error, context: impl ToString) -> Self {
        Self::Utf8 {
            source: error,
            context: context.to_string(),
        }
    }

    /// Creates a new bad argument [`dbn::Error`](crate::Error).
    pub fn bad_arg(param_name: impl ToString, desc: impl ToString) -> Self {
        Self::BadArgument {
            param_name: param_name.to_string(),
            desc: desc.to_string(),
        }
    }

    /// Returns `true` if the error was caused by the reader or writer rather than by
    /// invalid DBN.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

/// Maps an EOF at a record boundary to `Ok(None)`.
pub(crate) fn silence_eof_error<T>(err: io::Error) -> io::Result<Option<T>> {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Ok(None)
    } else {
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TradeMsg;

    #[test]
    fn test_display() {
        assert_eq!(
            Error::invalid_length("record", 4, "shorter than the 16-byte header").to_string(),
            "invalid record length 4: shorter than the 16-byte header"
        );
        assert_eq!(
            Error::UnsupportedVersion { version: 9 }.to_string(),
            format!("DBN version 9 is not supported, expected 1 through {DBN_VERSION}")
        );
        let msg = Error::record_too_short::<TradeMsg>(16).to_string();
        assert!(msg.starts_with("record with length 16 is too short for "));
        assert!(msg.ends_with("TradeMsg"));
    }

    #[test]
    fn test_is_io() {
        let err = Error::io(io::Error::from(io::ErrorKind::BrokenPipe), "writing");
        assert!(err.is_io());
        assert_eq!(err.to_string(), "I/O error while writing: broken pipe");
        assert!(!Error::decode("bad").is_io());
    }
}
