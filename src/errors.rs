use crate::{Method, StatusCode};
use std::{io, net::SocketAddr};
use thiserror::Error;

/// Why a request head could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Malformed {
    #[error("no blank line separating head and body")]
    MissingDelimiter,
    #[error("request head is not valid UTF-8")]
    InvalidEncoding,
    #[error("request line needs a method and a target")]
    RequestLine,
    #[error("unknown request method")]
    Method,
    #[error("header line without a colon or a name")]
    Header,
}

/// Every failure the server can observe.
///
/// Parsing and routing failures are turned into HTTP responses by the
/// connection handler; only [`Error::Transport`] ends a connection without
/// an answer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed request: {0}")]
    MalformedRequest(#[from] Malformed),

    #[error("no route for {method} {path}")]
    RouteNotFound { method: Method, path: String },

    #[error("{0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),

    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Status code the failure is reported with, if it is reported at all.
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Error::MalformedRequest(_) => Some(StatusCode::BadRequest),
            Error::RouteNotFound { .. } => Some(StatusCode::NotFound),
            Error::Serialization(_) => Some(StatusCode::InternalServerError),
            Error::Transport(_) | Error::InvalidPattern { .. } | Error::Bind { .. } => None,
        }
    }
}

macro_rules! canned_responses {
    ($($name:ident: $status_code:expr, $len:literal => $json:literal; )*) => {
        /// Pre-rendered answers written before any handler runs.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub(crate) enum Canned { $($name,)* }

        impl Canned {
            pub(crate) const fn as_http(&self, json: bool) -> &'static [u8] {
                match (json, self) { $(
                    (true, Self::$name) => concat!(
                        "HTTP/1.1 ", $status_code, "\r\n",
                        "Connection: close\r\n",
                        "Content-Type: application/json\r\n",
                        "Content-Length: ", $len, "\r\n",
                        "\r\n",
                        $json
                    ),
                    (false, Self::$name) => concat!(
                        "HTTP/1.1 ", $status_code, "\r\n",
                        "Connection: close\r\n",
                        "Content-Length: 0\r\n\r\n",
                    ),
                )* }.as_bytes()
            }
        }
    };
}

canned_responses! {
    MalformedRequest: "400 Bad Request", "56"
        => r#"{"error":"Malformed request","code":"MALFORMED_REQUEST"}"#;
    ServiceUnavailable: "503 Service Unavailable", "72"
        => r#"{"error":"Service temporarily unavailable","code":"SERVICE_UNAVAILABLE"}"#;
}
