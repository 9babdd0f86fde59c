//! Demo server with the three stock routes:
//!
//! - `GET /echo/:msg/:meow`: the `msg` segment as text
//! - `GET /user-agent`: the `User-Agent` header as text
//! - `GET /json`: a fixed JSON document

use clap::Parser;
use petal_web::{
    limits::{ConnLimits, ReqLimits, ServerLimits},
    Context, Error, Response, RouteTable, Server, StatusCode,
};
use serde::Serialize;
use std::{
    net::{IpAddr, SocketAddr},
    process::ExitCode,
    time::Duration,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "petal_web")]
#[command(about = "Minimal HTTP/1.1 demo server", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "PETAL_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    #[arg(short, long, env = "PETAL_PORT", default_value_t = 4221)]
    port: u16,

    /// Exchanges processed at the same time before answering 503
    #[arg(long, env = "PETAL_MAX_CONNECTIONS", default_value_t = 1024)]
    max_connections: usize,

    #[arg(long, env = "PETAL_READ_TIMEOUT_MS", default_value_t = 2000)]
    read_timeout_ms: u64,

    #[arg(long, env = "PETAL_WRITE_TIMEOUT_MS", default_value_t = 3000)]
    write_timeout_ms: u64,

    /// Size of the single read buffer; larger requests are cut off
    #[arg(long, env = "PETAL_BUFFER_SIZE", default_value_t = 1024)]
    buffer_size: usize,
}

#[derive(Serialize)]
struct User {
    name: &'static str,
    age: u32,
}

fn echo(ctx: &Context<'_>) -> Response {
    Response::text(StatusCode::Ok, ctx.param("msg").unwrap_or_default())
}

fn user_agent(ctx: &Context<'_>) -> Response {
    Response::text(StatusCode::Ok, ctx.header("User-Agent").unwrap_or_default())
}

fn user(_: &Context<'_>) -> Response {
    Response::json(StatusCode::Ok, &User { name: "John", age: 30 })
}

fn routes() -> Result<RouteTable, Error> {
    RouteTable::builder()
        .get("/echo/:msg/:meow", echo)
        .get("/user-agent", user_agent)
        .get("/json", user)
        .build()
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "petal_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    tracing::info!(
        host = %args.host,
        port = args.port,
        max_connections = args.max_connections,
        read_timeout_ms = args.read_timeout_ms,
        write_timeout_ms = args.write_timeout_ms,
        buffer_size = args.buffer_size,
        "Configuration loaded"
    );

    let routes = match routes() {
        Ok(routes) => routes,
        Err(err) => {
            tracing::error!(error = %err, "Invalid route table");
            return ExitCode::FAILURE;
        }
    };

    let addr = SocketAddr::new(args.host, args.port);
    let listener = match Server::bind(addr) {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    Server::builder()
        .listener(listener)
        .routes(routes)
        .server_limits(ServerLimits {
            max_connections: args.max_connections,
            ..ServerLimits::default()
        })
        .connection_limits(ConnLimits {
            socket_read_timeout: Duration::from_millis(args.read_timeout_ms),
            socket_write_timeout: Duration::from_millis(args.write_timeout_ms),
            ..ConnLimits::default()
        })
        .request_limits(ReqLimits {
            buffer_size: args.buffer_size,
            ..ReqLimits::default()
        })
        .build()
        .launch()
        .await;

    ExitCode::SUCCESS
}
