//! Server configuration limits and timeouts
//!
//! All structures carry a hidden `_priv` field, so they are built with
//! struct-update syntax over [`Default`]:
//!
//! ```no_run
//! # fn table() -> petal_web::RouteTable { petal_web::RouteTable::builder().build().unwrap() }
//! use petal_web::{Server, limits::{ConnLimits, ReqLimits, ServerLimits}};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::builder()
//!         .listener(Server::bind("127.0.0.1:4221".parse().unwrap()).unwrap())
//!         .routes(table())
//!         .server_limits(ServerLimits {
//!             max_connections: 512,
//!             ..ServerLimits::default()
//!         })
//!         .connection_limits(ConnLimits {
//!             socket_read_timeout: Duration::from_secs(5),
//!             ..ConnLimits::default()
//!         })
//!         .request_limits(ReqLimits {
//!             buffer_size: 4 * 1024,
//!             ..ReqLimits::default()
//!         })
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```

use std::time::Duration;

/// Server-level concurrency and admission behavior.
///
/// # Connection management
/// ```text
///          [------------]
///          [ Tcp accept ]
///          [------------]
///                ||
///                \/
///   /---------------------------\   No   /--------------------\  Full  [---------]
///   | Free slot (max_connections)| =====> | Reject queue full? | =====> [ Dropped ]
///   \---------------------------/        \--------------------/        [---------]
///                ||                              || No
///                ||                              \/
///                ||                     [ 503 handlers: count_503_handlers ]
///                || Yes
///                \/
///   [ tokio::spawn: one exchange, then close ]
/// ```
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Maximum number of exchanges processed at the same time (default: `1024`).
    ///
    /// Connections accepted above this number receive an immediate
    /// [503](crate::StatusCode::ServiceUnavailable) and are closed.
    pub max_connections: usize,

    /// Number of read buffers kept for reuse between connections (default: `128`).
    ///
    /// A connection that finds the pool empty allocates a fresh buffer; a
    /// buffer returned to a full pool is dropped.
    pub buffer_pool_size: usize,

    /// Rejected connections waiting for a `503` handler (default: `250`).
    ///
    /// When the queue is full, further rejected connections are closed
    /// without a response.
    pub max_pending_rejects: usize,

    /// Tasks that send the [503](crate::StatusCode::ServiceUnavailable)
    /// response to rejected connections (default: `1`).
    ///
    /// Set to 0 to close rejected connections silently.
    pub count_503_handlers: usize,

    /// Format for `400` and `503` responses generated by the server (default: `true`)
    ///
    /// # Examples
    /// If `true`:
    /// ```text
    /// HTTP/1.1 400 Bad Request\r
    /// Connection: close\r
    /// Content-Type: application/json\r
    /// Content-Length: 56\r
    /// \r
    /// {"error":"Malformed request","code":"MALFORMED_REQUEST"}
    /// ```
    /// If `false`:
    /// ```text
    /// HTTP/1.1 400 Bad Request\r
    /// Connection: close\r
    /// Content-Length: 0\r
    /// \r
    /// ```
    pub json_errors: bool,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_connections: 1024,
            buffer_pool_size: 128,
            max_pending_rejects: 250,
            count_503_handlers: 1,
            json_errors: true,

            _priv: (),
        }
    }
}

/// Per-connection deadlines.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Maximum duration to wait for the request bytes (default: `2 seconds`)
    ///
    /// A client that sends nothing within this time is dropped without a
    /// response.
    pub socket_read_timeout: Duration,

    /// Maximum duration to write the whole response (default: `3 seconds`)
    pub socket_write_timeout: Duration,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            socket_read_timeout: Duration::from_secs(2),
            socket_write_timeout: Duration::from_secs(3),

            _priv: (),
        }
    }
}

/// Request parsing limits.
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Size of the buffer filled by the single read of a request (default: `1024`).
    ///
    /// Head and body must both fit; anything the client sends beyond it is
    /// never read.
    pub buffer_size: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            buffer_size: 1024,

            _priv: (),
        }
    }
}

/// Response buffer sizing.
#[derive(Debug, Clone)]
pub struct RespLimits {
    /// Initial capacity of the serialization buffer (default: `512`).
    ///
    /// Headers and body are appended to one buffer so the response leaves in
    /// a single write.
    pub default_capacity: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for RespLimits {
    fn default() -> Self {
        Self {
            default_capacity: 512,

            _priv: (),
        }
    }
}
