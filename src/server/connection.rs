use crate::{
    errors::{Canned, Error},
    http::{request::Request, response::Response},
    limits::{ConnLimits, ReqLimits, RespLimits, ServerLimits},
    router::{handler::Context, table::RouteTable},
    StatusCode,
};
use crossbeam::queue::ArrayQueue;
use std::{io, sync::Arc};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite},
    time::timeout,
};
use tracing::{debug, warn};

/// State shared by every connection task of one server.
pub(crate) struct HttpConnection {
    routes: Arc<RouteTable>,
    buffers: BufferPool,

    pub(crate) server_limits: ServerLimits,
    pub(crate) conn_limits: ConnLimits,
    resp_limits: RespLimits,
}

impl HttpConnection {
    #[inline]
    pub(crate) fn new(routes: Arc<RouteTable>, limits: AllLimits) -> Self {
        let (server_limits, conn_limits, req_limits, resp_limits) = limits;

        Self {
            routes,
            buffers: BufferPool::new(server_limits.buffer_pool_size, &req_limits),

            server_limits,
            conn_limits,
            resp_limits,
        }
    }

    /// One exchange: a single read, then a single response, then shutdown.
    ///
    /// A peer that closes without sending anything gets no response.
    pub(crate) async fn run<S>(&self, stream: &mut S) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buffer = self.buffers.take();
        let result = self.exchange_over(stream, &mut buffer).await;
        self.buffers.give(buffer);

        Ok(result?)
    }

    #[inline]
    async fn exchange_over<S>(&self, stream: &mut S, buffer: &mut [u8]) -> io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let len = timeout(self.conn_limits.socket_read_timeout, stream.read(buffer)).await??;
        if len == 0 {
            return Ok(());
        }

        let mut out = Vec::with_capacity(self.resp_limits.default_capacity);
        respond(&self.routes, &buffer[..len], &self.server_limits, &mut out);

        writer::write_bytes(stream, &out, self.conn_limits.socket_write_timeout).await
    }

    /// Answers with the canned `503` and closes.
    pub(crate) async fn reject<S>(&self, stream: &mut S) -> io::Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        writer::write_bytes(
            stream,
            Canned::ServiceUnavailable.as_http(self.server_limits.json_errors),
            self.conn_limits.socket_write_timeout,
        )
        .await
    }
}

/// Runs the protocol core on raw request bytes and returns the raw response.
///
/// This is the whole exchange without a socket: parse, route, handle and
/// serialize. Malformed input yields `400`, an unknown route `404`.
///
/// # Examples
/// ```
/// use petal_web::{limits::ServerLimits, server::exchange, Context, Response, RouteTable};
///
/// let table = RouteTable::builder()
///     .get("/user-agent", |ctx: &Context<'_>| ctx.text(ctx.header("User-Agent").unwrap_or_default()))
///     .build()
///     .unwrap();
///
/// let raw = exchange(
///     &table,
///     b"GET /user-agent HTTP/1.1\r\nUser-Agent: curl/8.0\r\n\r\n",
///     &ServerLimits::default(),
/// );
///
/// assert_eq!(
///     raw,
///     b"HTTP/1.1 200 OK\r\n\
///       Content-Type: text/plain\r\n\
///       Content-Length: 8\r\n\
///       Connection: close\r\n\
///       \r\n\
///       curl/8.0"
/// );
/// ```
pub fn exchange(routes: &RouteTable, raw: &[u8], limits: &ServerLimits) -> Vec<u8> {
    let mut out = Vec::new();
    respond(routes, raw, limits, &mut out);
    out
}

fn respond(routes: &RouteTable, raw: &[u8], limits: &ServerLimits, out: &mut Vec<u8>) {
    let mut req = match Request::parse_bytes(raw) {
        Ok(req) => req,
        Err(reason) => {
            warn!(%reason, bytes = raw.len(), "Malformed request");
            out.extend_from_slice(Canned::MalformedRequest.as_http(limits.json_errors));
            return;
        }
    };

    let mut resp = match routes.route(&mut req) {
        Ok(route) => route.handler().handle(&Context::new(&req)),
        Err(_) => Response::text(StatusCode::NotFound, ""),
    };
    resp.close();

    debug!(
        method = %req.method(),
        target = %req.target(),
        status = resp.status().as_u16(),
        body_len = resp.body_bytes().len(),
        "Exchange complete"
    );

    resp.write_to(out);
}

pub(crate) mod writer {
    use std::{io, time::Duration};
    use tokio::{
        io::{AsyncWrite, AsyncWriteExt},
        time::timeout,
    };

    /// Writes the whole response and shuts the write side down.
    #[inline]
    pub(crate) async fn write_bytes<S>(stream: &mut S, response: &[u8], limit: Duration) -> io::Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        timeout(limit, async {
            stream.write_all(response).await?;
            stream.shutdown().await
        })
        .await?
    }
}

/// Read buffers recycled between connections.
pub(crate) struct BufferPool {
    queue: ArrayQueue<Vec<u8>>,
    buffer_size: usize,
}

impl BufferPool {
    #[inline]
    pub(crate) fn new(capacity: usize, limits: &ReqLimits) -> Self {
        Self {
            // `ArrayQueue` rejects a zero capacity.
            queue: ArrayQueue::new(capacity.max(1)),
            buffer_size: limits.buffer_size.max(1),
        }
    }

    #[inline]
    pub(crate) fn take(&self) -> Vec<u8> {
        self.queue
            .pop()
            .unwrap_or_else(|| vec![0; self.buffer_size])
    }

    #[inline]
    pub(crate) fn give(&self, buffer: Vec<u8>) {
        if buffer.len() == self.buffer_size {
            let _ = self.queue.push(buffer);
        }
    }
}

pub(crate) type AllLimits = (ServerLimits, ConnLimits, ReqLimits, RespLimits);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tools::str_op, Method};
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    fn default_limits() -> AllLimits {
        Default::default()
    }

    fn table() -> RouteTable {
        RouteTable::builder()
            .get("/user-agent", |ctx: &Context<'_>| {
                ctx.text(ctx.header("User-Agent").unwrap_or_default())
            })
            .get("/echo/:msg/:meow", |ctx: &Context<'_>| {
                ctx.text(ctx.param("msg").unwrap_or_default())
            })
            .get("/json", |ctx: &Context<'_>| ctx.json(&json!({"name": "John", "age": 30})))
            .route(Method::Post, "/upload", |ctx: &Context<'_>| {
                Response::text(StatusCode::Created, format!("{} bytes", ctx.body().len()))
            })
            .build()
            .unwrap()
    }

    fn connection(limits: AllLimits) -> HttpConnection {
        HttpConnection::new(Arc::new(table()), limits)
    }

    async fn round_trip(conn: &HttpConnection, request: &[u8]) -> (Result<(), Error>, String) {
        let (mut client, mut server): (DuplexStream, DuplexStream) = duplex(8 * 1024);

        client.write_all(request).await.unwrap();
        let result = conn.run(&mut server).await;
        drop(server);

        let mut raw = Vec::new();
        client.read_to_end(&mut raw).await.unwrap();
        (result, String::from_utf8(raw).unwrap())
    }

    #[test]
    fn exchange_user_agent() {
        let out = exchange(
            &table(),
            b"GET /user-agent HTTP/1.1\r\nHost: localhost\r\nUser-Agent: curl/8.0\r\n\r\n",
            &ServerLimits::default(),
        );

        assert_eq!(
            str_op(&out),
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 8\r\nConnection: close\r\n\r\ncurl/8.0"
        );
    }

    #[test]
    fn exchange_statuses() {
        let table = table();
        let limits = ServerLimits::default();

        #[rustfmt::skip]
        let cases: [(&[u8], &str); 7] = [
            (b"GET /nope HTTP/1.1\r\n\r\n",                 "HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"),
            (b"OPTIONS /json HTTP/1.1\r\n\r\n",             "HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"),
            (b"POST /json HTTP/1.1\r\n\r\n",                "HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"),
            (b"GET /echo/hello/world HTTP/1.1\r\n\r\n",     "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello"),
            (b"GET /json HTTP/1.1\r\n\r\n",                 "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 24\r\nConnection: close\r\n\r\n{\"age\":30,\"name\":\"John\"}"),
            (b"POST /upload HTTP/1.1\r\n\r\nabc",           "HTTP/1.1 201 Created\r\nContent-Type: text/plain\r\nContent-Length: 7\r\nConnection: close\r\n\r\n3 bytes"),
            (b"GET /nope HTTP/1.1\r\n",                     str_op(Canned::MalformedRequest.as_http(true))),
        ];

        for (raw, expected) in cases {
            assert_eq!(str_op(&exchange(&table, raw, &limits)), expected, "request: {raw:?}");
        }
    }

    #[test]
    fn exchange_malformed() {
        let table = table();
        let json = ServerLimits::default();
        let plain = ServerLimits {
            json_errors: false,
            ..ServerLimits::default()
        };

        for raw in [
            &b"GET /user-agent HTTP/1.1\r\nUser-Agent: x\r\n"[..],
            b"BREW /pot HTTP/1.1\r\n\r\n",
            b"GET\r\n\r\n",
            b"GET / HTTP/1.1\r\nbroken header\r\n\r\n",
            b"GET /\xff HTTP/1.1\r\n\r\n",
        ] {
            let out = exchange(&table, raw, &json);
            assert!(str_op(&out).starts_with("HTTP/1.1 400 Bad Request\r\n"));
            assert!(str_op(&out).ends_with(r#"{"error":"Malformed request","code":"MALFORMED_REQUEST"}"#));

            assert_eq!(exchange(&table, raw, &plain), Canned::MalformedRequest.as_http(false));
        }
    }

    #[tokio::test]
    async fn run_user_agent() {
        let conn = connection(default_limits());
        let (result, raw) = round_trip(
            &conn,
            b"GET /user-agent HTTP/1.1\r\nUser-Agent: curl/8.0\r\n\r\n",
        )
        .await;

        assert!(result.is_ok());
        assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(raw.contains("Connection: close\r\n"));
        assert!(raw.ends_with("\r\n\r\ncurl/8.0"));
    }

    #[tokio::test]
    async fn run_not_found() {
        let conn = connection(default_limits());
        let (result, raw) = round_trip(&conn, b"GET /nope HTTP/1.1\r\n\r\n").await;

        assert!(result.is_ok());
        assert_eq!(raw, "HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
    }

    #[tokio::test]
    async fn run_missing_delimiter() {
        let conn = connection(default_limits());
        let (result, raw) = round_trip(&conn, b"GET /nope HTTP/1.1\r\nHost: x").await;

        assert!(result.is_ok());
        assert_eq!(raw.as_bytes(), Canned::MalformedRequest.as_http(true));
    }

    #[tokio::test]
    async fn run_request_beyond_buffer() {
        let (server_limits, conn_limits, _, resp_limits) = default_limits();
        let req_limits = ReqLimits {
            buffer_size: 16,
            ..ReqLimits::default()
        };
        let conn = connection((server_limits, conn_limits, req_limits, resp_limits));

        // Only the first 16 bytes are read, so the delimiter is never seen.
        let (result, raw) = round_trip(&conn, b"GET /user-agent HTTP/1.1\r\n\r\n").await;

        assert!(result.is_ok());
        assert!(raw.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn run_peer_closed() {
        let conn = connection(default_limits());
        let (client, mut server) = duplex(64);
        drop(client);

        assert!(conn.run(&mut server).await.is_ok());
    }

    #[tokio::test]
    async fn run_read_timeout() {
        let (server_limits, _, req_limits, resp_limits) = default_limits();
        let conn_limits = ConnLimits {
            socket_read_timeout: Duration::from_millis(20),
            ..ConnLimits::default()
        };
        let conn = connection((server_limits, conn_limits, req_limits, resp_limits));

        let (mut client, mut server) = duplex(64);
        let result = conn.run(&mut server).await;

        match result {
            Err(Error::Transport(err)) => assert_eq!(err.kind(), io::ErrorKind::TimedOut),
            other => panic!("unexpected {other:?}"),
        }

        drop(server);
        let mut raw = Vec::new();
        client.read_to_end(&mut raw).await.unwrap();
        assert!(raw.is_empty());
    }

    #[tokio::test]
    async fn run_write_timeout() {
        let (server_limits, _, req_limits, resp_limits) = default_limits();
        let conn_limits = ConnLimits {
            socket_write_timeout: Duration::from_millis(20),
            ..ConnLimits::default()
        };
        let conn = connection((server_limits, conn_limits, req_limits, resp_limits));

        // The response outgrows the 64-byte pipe and the client never reads it.
        let (mut client, mut server) = duplex(64);
        client.write_all(b"GET /json HTTP/1.1\r\n\r\n").await.unwrap();

        let result = conn.run(&mut server).await;

        match result {
            Err(Error::Transport(err)) => assert_eq!(err.kind(), io::ErrorKind::TimedOut),
            other => panic!("unexpected {other:?}"),
        }
        drop(client);
    }

    #[tokio::test]
    async fn reject_with_503() {
        let conn = connection(default_limits());
        let (mut client, mut server) = duplex(1024);

        conn.reject(&mut server).await.unwrap();
        drop(server);

        let mut raw = Vec::new();
        client.read_to_end(&mut raw).await.unwrap();
        assert_eq!(raw, Canned::ServiceUnavailable.as_http(true));
        assert!(str_op(&raw).starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
    }

    #[test]
    fn buffer_pool_reuse() {
        let pool = BufferPool::new(1, &ReqLimits::default());

        let mut first = pool.take();
        assert_eq!(first.len(), 1024);
        first[0] = 7;
        pool.give(first);

        // Reused as-is; the old contents are never read past the new length.
        assert_eq!(pool.take()[0], 7);
        assert_eq!(pool.take()[0], 0);

        pool.give(vec![0; 8]);
        assert_eq!(pool.take().len(), 1024);
    }
}
