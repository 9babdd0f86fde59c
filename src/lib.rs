//! petal_web - minimal HTTP/1.1 server with a pattern router
//!
//! A small server built around two pieces: a byte-level request parser and a
//! router that matches method + path against registered patterns with a
//! deterministic precedence. Each connection carries exactly one exchange:
//! one read, one response, `Connection: close`.
//!
//! # Routing
//!
//! Patterns are made of `/`-separated segments:
//! - `users`: literal, matches exactly (case-sensitive)
//! - `:id`: parameter, binds one segment
//! - `*path`: catch-all, final only, binds the rest of the path
//!
//! Segment counts must match exactly unless the pattern ends with a catch-all.
//! When several patterns match, the one with more literal segments wins, see
//! [`RouteTable`] for the full ordering.
//!
//! # Examples
//!
//! Quick start:
//! ```no_run
//! use petal_web::{Context, Response, RouteTable, Server, StatusCode};
//!
//! fn echo(ctx: &Context<'_>) -> Response {
//!     Response::text(StatusCode::Ok, ctx.param("msg").unwrap_or_default())
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let routes = RouteTable::builder()
//!         .get("/echo/:msg/:meow", echo)
//!         .get("/user-agent", |ctx: &Context<'_>| {
//!             ctx.text(ctx.header("User-Agent").unwrap_or_default())
//!         })
//!         .build()
//!         .unwrap();
//!
//!     Server::builder()
//!         .listener(Server::bind("127.0.0.1:4221".parse().unwrap()).unwrap())
//!         .routes(routes)
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```
//! Without a socket:
//! ```
//! use petal_web::{limits::ServerLimits, server::exchange, RouteTable};
//!
//! let routes = RouteTable::builder().build().unwrap();
//! let raw = exchange(&routes, b"GET /missing HTTP/1.1\r\n\r\n", &ServerLimits::default());
//!
//! assert!(raw.starts_with(b"HTTP/1.1 404 Not Found\r\n"));
//! ```
//!
//! # Not supported
//!
//! - Keep-alive and pipelining
//! - `Transfer-Encoding: chunked`
//! - TLS
//! - Requests larger than one read buffer ([`limits::ReqLimits::buffer_size`])

pub(crate) mod http {
    pub(crate) mod cookie;
    pub mod query;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub mod server {
    //! Accept loop and the per-connection exchange.

    pub(crate) mod connection;
    pub(crate) mod server_impl;

    pub use connection::exchange;
    pub use server_impl::{Server, ServerBuilder};
}
pub mod errors;
pub mod limits;
pub mod router;

pub use crate::{
    errors::{Error, Malformed},
    http::{
        query,
        request::Request,
        response::Response,
        types::{Cookie, Headers, Method, Params, StatusCode},
    },
    router::{
        handler::{Context, Handler},
        table::{Route, RouteTable, RouteTableBuilder},
    },
    server::{Server, ServerBuilder},
};
