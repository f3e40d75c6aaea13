// This file is part of TRINCI.
//
// Copyright (C) 2021 Affidaty Spa.
//
// TRINCI is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// TRINCI is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License
// for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with TRINCI. If not, see <https://www.gnu.org/licenses/>.

//! Library error codes and results.

use std::fmt::{Display, Formatter};

/// Project-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Max string length when the error is converted to string using `to_string_full`.
const MAX_ERROR_SOURCE_STRING_LENGTH: usize = 128;

/// Error kind to better contextualize the returned error.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    /// Dial failure, broken socket or unexpected HTTP status.
    BadNetwork,
    /// Operation exceeded its time budget.
    Timeout,
    /// Response that cannot be decoded.
    MalformedData,
    /// The remote node answered with a JSON-RPC error object.
    RpcFault,
    /// Missing or invalid endpoints configuration.
    BadConfiguration,
    /// Expected pool entry (e.g. the current best endpoint) is missing.
    ResourceNotFound,
    /// No endpoint could be reached while building the pool.
    NoUsableEndpoint,
    Other,
}

/// Error kind strings.
pub(super) mod error_kind_str {
    pub const BAD_NETWORK: &str = "bad network";
    pub const TIMEOUT: &str = "timeout";
    pub const MALFORMED_DATA: &str = "malformed data";
    pub const RPC_FAULT: &str = "rpc fault";
    pub const BAD_CONFIGURATION: &str = "bad configuration";
    pub const RESOURCE_NOT_FOUND: &str = "resource not found";
    pub const NO_USABLE_ENDPOINT: &str = "no usable endpoint";
    pub const OTHER: &str = "other";
}

impl ErrorKind {
    /// Transient errors are expected to clear up on the next probe cycle or
    /// switch attempt. Everything else is structural and surfaced to callers.
    pub fn is_transient(&self) -> bool {
        use ErrorKind::*;
        matches!(self, BadNetwork | Timeout | MalformedData | RpcFault)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use ErrorKind::*;
        let kind_str = match self {
            BadNetwork => error_kind_str::BAD_NETWORK,
            Timeout => error_kind_str::TIMEOUT,
            MalformedData => error_kind_str::MALFORMED_DATA,
            RpcFault => error_kind_str::RPC_FAULT,
            BadConfiguration => error_kind_str::BAD_CONFIGURATION,
            ResourceNotFound => error_kind_str::RESOURCE_NOT_FOUND,
            NoUsableEndpoint => error_kind_str::NO_USABLE_ENDPOINT,
            Other => error_kind_str::OTHER,
        };
        write!(f, "{}", kind_str)
    }
}

/// Project-wide error type.
/// Contains a kind enumerate and an optional `source` carrying the detail
/// reported by the failing subsystem (socket, HTTP client, JSON parser...).
#[derive(Debug)]
pub struct Error {
    /// Error kind.
    pub kind: ErrorKind,
    /// Underlying cause, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Clone for Error {
    fn clone(&self) -> Self {
        Error {
            kind: self.kind,
            source: self
                .source
                .as_ref()
                .map(|source| source.to_string().into()),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::new_ext(ErrorKind::Other, s)
    }
}

impl<T> From<ErrorKind> for Result<T> {
    fn from(kind: ErrorKind) -> Self {
        Err(kind.into())
    }
}

impl Error {
    pub fn new_ext<E>(kind: ErrorKind, error: E) -> Error
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let source = error.into();
        Error {
            kind,
            source: Some(source),
        }
    }

    pub fn new(kind: ErrorKind) -> Error {
        Error { kind, source: None }
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    pub fn to_string_full(&self) -> String {
        let mut err_string = self.to_string();
        if let Some(ref source) = self.source {
            let detail = format!(": {}", source);
            let max_len = std::cmp::min(detail.len(), MAX_ERROR_SOURCE_STRING_LENGTH);
            let mut end = max_len;
            while !detail.is_char_boundary(end) {
                end -= 1;
            }
            err_string.push_str(&detail[..end]);
        }
        err_string
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        if self.kind != other.kind {
            return false;
        }
        match (&self.source, &other.source) {
            (None, None) => true,
            (Some(a), Some(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.source {
            None => None,
            Some(ref source) => Some(source.as_ref()),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}
