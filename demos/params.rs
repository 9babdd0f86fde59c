//! Path parameters and catch-all patterns.
//!
//! ```text
//! curl localhost:4221/users/me            -> current user
//! curl localhost:4221/users/42            -> user 42
//! curl localhost:4221/users/42/posts/7    -> post 7 of user 42
//! curl localhost:4221/files/css/app.css   -> file css/app.css
//! ```

use petal_web::{Context, Handler, Response, RouteTable, Server, StatusCode};

/// Answers with a fixed prefix followed by the bound parameters.
struct Describe(&'static str);

impl Handler for Describe {
    fn handle(&self, ctx: &Context<'_>) -> Response {
        let params: Vec<String> = ctx
            .request()
            .params()
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();

        Response::text(StatusCode::Ok, format!("{} [{}]\n", self.0, params.join(", ")))
    }
}

#[tokio::main]
async fn main() {
    let routes = RouteTable::builder()
        // Registered first, still loses to the literal `/users/me`.
        .get("/users/:id", Describe("user"))
        .get("/users/me", |_: &Context<'_>| {
            Response::text(StatusCode::Ok, "current user\n")
        })
        .get("/users/:id/posts/:post", Describe("post"))
        .get("/files/*path", Describe("file"))
        .delete("/users/:id", |ctx: &Context<'_>| {
            Response::text(StatusCode::Accepted, format!("deleting {}\n", ctx.param("id").unwrap_or_default()))
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
