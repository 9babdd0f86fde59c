//! Echoes the parsed request back as JSON.
//!
//! ```text
//! curl -b 'session=abc; theme=dark' 'localhost:4221/inspect/any/path?debug&page=2'
//! ```

use petal_web::{Context, Response, RouteTable, Server, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize)]
struct Inspection<'a> {
    method: &'a str,
    target: &'a str,
    version: &'a str,
    segments: &'a [String],
    query: BTreeMap<&'a str, &'a str>,
    headers: BTreeMap<&'a str, &'a str>,
    cookies: BTreeMap<&'a str, &'a str>,
    body: Option<&'a str>,
}

fn inspect(ctx: &Context<'_>) -> Response {
    let req = ctx.request();

    ctx.json(&Inspection {
        method: req.method().as_str(),
        target: req.target(),
        version: req.version(),
        segments: req.segments(),
        query: req
            .query_pairs()
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .collect(),
        headers: req.headers().iter().collect(),
        cookies: req.cookies().iter().map(|c| (c.name(), c.value())).collect(),
        body: req.body_str().filter(|body| !body.is_empty()),
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("petal_web=debug"))
        .init();

    let routes = RouteTable::builder()
        .get("/inspect", inspect)
        .get("/inspect/*rest", inspect)
        .post("/inspect", inspect)
        .get("/", |_: &Context<'_>| {
            Response::html(StatusCode::Ok, "<a href=\"/inspect\">inspect</a>")
        })
        .build()
        .expect("valid route patterns");

    Server::builder()
        .listener(Server::bind("127.0.0.1:4221".parse().unwrap()).unwrap())
        .routes(routes)
        .build()
        .launch()
        .await;
}
