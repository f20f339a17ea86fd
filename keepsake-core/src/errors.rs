// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.
//!
//! Only fatal conditions are errors. Structural problems found while characterizing a file are
//! recorded as [`anomalies`](crate::anomaly) and never surface here.

use std::error;
use std::fmt;
use std::io;
use std::result;

/// `Error` provides an enumeration of all fatal errors reported by Keepsake.
#[derive(Debug)]
pub enum Error {
    /// An IO error occured while reading, writing, or seeking the source. Reading past the end of
    /// the source is reported with the `UnexpectedEof` kind.
    IoError(io::Error),
    /// The unit tree could not be walked any further. For example, a unit declared a size smaller
    /// than its own header, or a handler consumed more than the unit's declared size.
    DecodeError(&'static str),
    /// The source is not of the format the parser was asked to read.
    Unsupported(&'static str),
    /// A default or user-defined limit was reached. Limits are used to prevent denial-of-service
    /// attacks from malicious files.
    LimitError(&'static str),
}

impl Error {
    /// Returns `true` if the error was caused by reading past the end of the source.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::IoError(err) if err.kind() == io::ErrorKind::UnexpectedEof)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::IoError(ref err) => err.fmt(f),
            Error::DecodeError(msg) => {
                write!(f, "malformed container: {}", msg)
            }
            Error::Unsupported(feature) => {
                write!(f, "unsupported feature: {}", feature)
            }
            Error::LimitError(constraint) => {
                write!(f, "limit reached: {}", constraint)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::IoError(ref err) => Some(err),
            Error::DecodeError(_) => None,
            Error::Unsupported(_) => None,
            Error::LimitError(_) => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a decode error.
pub fn decode_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::DecodeError(desc))
}

/// Convenience function to create an unsupport feature error.
pub fn unsupported_error<T>(feature: &'static str) -> Result<T> {
    Err(Error::Unsupported(feature))
}

/// Convenience function to create a limit error.
pub fn limit_error<T>(constraint: &'static str) -> Result<T> {
    Err(Error::LimitError(constraint))
}

/// Convenience function to create an end-of-stream error.
pub fn end_of_stream_error<T>() -> Result<T> {
    Err(Error::IoError(io::Error::new(io::ErrorKind::UnexpectedEof, "end of stream")))
}
