use crate::{http::types::Cookie, Method, Request, Response, StatusCode};
use serde::Serialize;

/// Turns a routed request into a response.
///
/// Implemented for every `Fn(&Context<'_>) -> Response`, so function items,
/// closures and structs can all be registered.
///
/// # Examples
/// ```
/// use petal_web::{Context, Handler, Response, RouteTable, StatusCode};
///
/// struct Greeter {
///     greeting: &'static str,
/// }
///
/// impl Handler for Greeter {
///     fn handle(&self, ctx: &Context<'_>) -> Response {
///         let name = ctx.param("name").unwrap_or("stranger");
///         Response::text(StatusCode::Ok, format!("{}, {name}!", self.greeting))
///     }
/// }
///
/// fn ping(_: &Context<'_>) -> Response {
///     Response::text(StatusCode::Ok, "pong")
/// }
///
/// let table = RouteTable::builder()
///     .get("/hello/:name", Greeter { greeting: "Hello" })
///     .get("/ping", ping)
///     .get("/health", |_: &Context<'_>| Response::new(StatusCode::NoContent))
///     .build()
///     .unwrap();
///
/// assert_eq!(table.len(), 3);
/// ```
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, ctx: &Context<'_>) -> Response;
}

impl<F> Handler for F
where
    F: Fn(&Context<'_>) -> Response + Send + Sync + 'static,
{
    #[inline]
    fn handle(&self, ctx: &Context<'_>) -> Response {
        self(ctx)
    }
}

/// Read-only view of the routed request passed to a [`Handler`].
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    request: &'a Request,
}

impl<'a> Context<'a> {
    #[inline(always)]
    pub const fn new(request: &'a Request) -> Self {
        Self { request }
    }

    #[inline(always)]
    pub const fn request(&self) -> &'a Request {
        self.request
    }

    #[inline(always)]
    pub const fn method(&self) -> Method {
        self.request.method()
    }

    #[inline(always)]
    pub fn path(&self) -> &'a str {
        self.request.path()
    }

    /// Path parameter bound by the matched pattern.
    #[inline(always)]
    pub fn param(&self, name: &str) -> Option<&'a str> {
        self.request.param(name)
    }

    #[inline(always)]
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.request.header(name)
    }

    #[inline(always)]
    pub fn cookie(&self, name: &str) -> Option<&'a str> {
        self.request.cookie(name)
    }

    #[inline(always)]
    pub fn cookies(&self) -> &'a [Cookie] {
        self.request.cookies()
    }

    #[inline(always)]
    pub fn query(&self, name: &str) -> Option<&'a str> {
        self.request.query(name)
    }

    #[inline(always)]
    pub fn body(&self) -> &'a [u8] {
        self.request.body()
    }

    #[inline(always)]
    pub fn body_str(&self) -> Option<&'a str> {
        self.request.body_str()
    }

    /// `200` shortcut for [`Response::text`].
    #[inline]
    pub fn text(&self, body: impl Into<String>) -> Response {
        Response::text(StatusCode::Ok, body)
    }

    /// `200` shortcut for [`Response::json`].
    #[inline]
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> Response {
        Response::json(StatusCode::Ok, value)
    }
}
