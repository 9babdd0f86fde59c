use crate::{
    errors::Error,
    limits::{ConnLimits, ReqLimits, RespLimits, ServerLimits},
    router::table::RouteTable,
    server::connection::{AllLimits, HttpConnection},
};
use crossbeam::queue::ArrayQueue;
use socket2::{Domain, Protocol, Socket, Type};
use std::{io, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{Notify, Semaphore},
    task::JoinSet,
    time::sleep,
};
use tracing::{debug, info, warn};

/// An HTTP server that answers one request per connection.
///
/// Every accepted connection runs in its own task. At most
/// [`max_connections`](ServerLimits::max_connections) exchanges run at the
/// same time; connections above that are queued for a `503` handler, or
/// closed outright when that queue is full.
///
/// # Examples
///
/// ```no_run
/// use petal_web::{Context, RouteTable, Server};
///
/// #[tokio::main]
/// async fn main() {
///     let routes = RouteTable::builder()
///         .get("/", |ctx: &Context<'_>| ctx.text("Hello world!"))
///         .build()
///         .unwrap();
///
///     Server::builder()
///         .listener(Server::bind("127.0.0.1:4221".parse().unwrap()).unwrap())
///         .routes(routes)
///         .build()
///         .launch()
///         .await
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    connection: Arc<HttpConnection>,
    permits: Arc<Semaphore>,
    rejects: Arc<RejectQueue<(TcpStream, SocketAddr)>>,
}

impl Server {
    const BACKLOG: i32 = 1024;
    const ACCEPT_BACKOFF: Duration = Duration::from_millis(5);
    const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

    /// Creates a new builder for configuring the server instance.
    #[inline]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Binds a listening socket with `SO_REUSEADDR` set.
    ///
    /// # Errors
    /// [`Error::Bind`] if the socket cannot be created, bound or put into
    /// listening mode.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn bind(addr: SocketAddr) -> Result<TcpListener, Error> {
        Self::bind_socket(addr).map_err(|source| Error::Bind { addr, source })
    }

    fn bind_socket(addr: SocketAddr) -> io::Result<TcpListener> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(Self::BACKLOG)?;

        TcpListener::from_std(socket.into())
    }

    #[inline]
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Starts accepting connections. Runs until the task is dropped.
    pub async fn launch(self) {
        info!(
            addr = ?self.listener.local_addr().ok(),
            max_connections = self.connection.server_limits.max_connections,
            count_503_handlers = self.connection.server_limits.count_503_handlers,
            read_timeout_ms = self.connection.conn_limits.socket_read_timeout.as_millis() as u64,
            "Server listening"
        );

        // Dropping the set aborts the handlers together with the accept loop.
        let mut alarmists = JoinSet::new();
        for _ in 0..self.connection.server_limits.count_503_handlers {
            alarmists.spawn(Self::alarmist(self.rejects.clone(), self.connection.clone()));
        }

        let mut failures = 0;
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(value) => {
                    failures = 0;
                    value
                }
                Err(err) => {
                    let backoff = Self::accept_backoff(failures);
                    warn!(error = %err, failures, backoff_ms = backoff.as_millis() as u64, "Accept failed");

                    failures = failures.saturating_add(1);
                    sleep(backoff).await;
                    continue;
                }
            };
            let _ = stream.set_nodelay(true);

            match self.permits.clone().try_acquire_owned() {
                Ok(permit) => {
                    let conn = self.connection.clone();
                    tokio::spawn(async move {
                        let mut stream = stream;
                        if let Err(err) = conn.run(&mut stream).await {
                            warn!(%peer, error = %err, "Connection failed");
                        }
                        drop(permit);
                    });
                }
                Err(_) if alarmists.is_empty() => {
                    debug!(%peer, "Connection limit reached, closing");
                }
                Err(_) => {
                    if self.rejects.push((stream, peer)).is_err() {
                        debug!(%peer, "Reject queue full, closing");
                    }
                }
            }
        }
    }

    async fn alarmist(rejects: Arc<RejectQueue<(TcpStream, SocketAddr)>>, conn: Arc<HttpConnection>) {
        loop {
            let (mut stream, peer) = rejects.pop().await;
            debug!(%peer, "Connection limit reached, sending 503");

            if let Err(err) = conn.reject(&mut stream).await {
                warn!(%peer, error = %err, "Rejection failed");
            }
        }
    }

    /// Delay after `failures` earlier consecutive accept errors,
    /// doubling from 5 ms up to one second.
    #[inline]
    fn accept_backoff(failures: u32) -> Duration {
        Self::ACCEPT_BACKOFF
            .saturating_mul(1 << failures.min(8))
            .min(Self::ACCEPT_BACKOFF_MAX)
    }
}

/// Bounded queue of rejected connections shared by the `503` handlers.
pub(crate) struct RejectQueue<T> {
    queue: ArrayQueue<T>,
    ready: Notify,
}

impl<T> RejectQueue<T> {
    #[inline]
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            ready: Notify::new(),
        }
    }

    /// Hands the value back when the queue is full.
    #[inline]
    pub(crate) fn push(&self, value: T) -> Result<(), T> {
        self.queue.push(value)?;
        self.ready.notify_one();
        Ok(())
    }

    pub(crate) async fn pop(&self) -> T {
        loop {
            if let Some(value) = self.queue.pop() {
                return value;
            }
            self.ready.notified().await;
        }
    }
}

/// Builder for configuring and creating [`Server`] instances.
#[derive(Default)]
pub struct ServerBuilder {
    listener: Option<TcpListener>,
    routes: Option<Arc<RouteTable>>,

    server_limits: Option<ServerLimits>,
    connection_limits: Option<ConnLimits>,
    request_limits: Option<ReqLimits>,
    response_limits: Option<RespLimits>,
}

impl ServerBuilder {
    /// Sets the TCP listener that the server will use to accept connections.
    ///
    /// **This is a required component.** See [`Server::bind`].
    #[inline(always)]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets the route table shared by all connections.
    ///
    /// **This is a required component.**
    #[inline(always)]
    pub fn routes(mut self, routes: impl Into<Arc<RouteTable>>) -> Self {
        self.routes = Some(routes.into());
        self
    }

    /// Configures admission and error formatting.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # #[tokio::main]
    /// # async fn main() {
    /// use petal_web::{limits::ServerLimits, RouteTable, Server};
    ///
    /// let server = Server::builder()
    ///     .listener(Server::bind("127.0.0.1:4221".parse().unwrap()).unwrap())
    ///     .routes(RouteTable::builder().build().unwrap())
    ///     .server_limits(ServerLimits {
    ///         // Your changes
    ///         max_connections: 2500,
    ///         json_errors: false,
    ///         ..ServerLimits::default() // Required line
    ///     })
    ///     .build();
    /// # }
    /// ```
    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    /// Configures the read and write deadlines of each connection.
    #[inline(always)]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.connection_limits = Some(limits);
        self
    }

    /// Configures the read buffer.
    #[inline(always)]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    /// Configures the response buffer.
    #[inline(always)]
    pub fn response_limits(mut self, limits: RespLimits) -> Self {
        self.response_limits = Some(limits);
        self
    }

    /// Finalizes the builder and constructs a [`Server`] instance.
    ///
    /// # Panics
    ///
    /// Error messages:
    /// - ``The `listener` method must be called to create``
    /// - ``The `routes` method must be called to create``
    #[inline]
    #[track_caller]
    pub fn build(self) -> Server {
        let (listener, routes, limits) = self.get_all_parts();
        let permits = Arc::new(Semaphore::new(limits.0.max_connections));
        let rejects = Arc::new(RejectQueue::new(limits.0.max_pending_rejects));

        Server {
            listener,
            connection: Arc::new(HttpConnection::new(routes, limits)),
            permits,
            rejects,
        }
    }

    #[inline]
    #[track_caller]
    fn get_all_parts(self) -> (TcpListener, Arc<RouteTable>, AllLimits) {
        (
            self.listener
                .expect("The `listener` method must be called to create"),
            self.routes
                .expect("The `routes` method must be called to create"),
            (
                self.server_limits.unwrap_or_default(),
                self.connection_limits.unwrap_or_default(),
                self.request_limits.unwrap_or_default(),
                self.response_limits.unwrap_or_default(),
            ),
        )
    }
}
