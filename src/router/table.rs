//! Route registration and the immutable route table.

use crate::{errors::Error, http::types::Params, router::handler::Handler, Method};
use std::{cmp::Reverse, collections::HashMap, fmt, sync::Arc};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    /// Matches one segment with exactly this text.
    Literal(String),
    /// `:name`, binds one segment.
    Param(String),
    /// `*name`, final only, binds every remaining segment joined by `/`.
    CatchAll(String),
}

impl Segment {
    fn parse_pattern(pattern: &str) -> Result<Vec<Segment>, Error> {
        let invalid = |reason| Error::InvalidPattern {
            pattern: pattern.to_owned(),
            reason,
        };

        if !pattern.starts_with('/') {
            return Err(invalid("must start with `/`"));
        }

        let parts: Vec<&str> = pattern.split('/').filter(|p| !p.is_empty()).collect();
        let mut segments = Vec::with_capacity(parts.len());

        for (i, part) in parts.iter().enumerate() {
            let segment = if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(invalid("empty parameter name"));
                }
                Segment::Param(name.to_owned())
            } else if let Some(name) = part.strip_prefix('*') {
                if name.is_empty() {
                    return Err(invalid("empty catch-all name"));
                }
                if i + 1 != parts.len() {
                    return Err(invalid("catch-all must be the last segment"));
                }
                Segment::CatchAll(name.to_owned())
            } else {
                Segment::Literal((*part).to_owned())
            };

            if let Some(name) = segment.name() {
                if segments.iter().any(|s: &Segment| s.name() == Some(name)) {
                    return Err(invalid("duplicate parameter name"));
                }
            }

            segments.push(segment);
        }

        Ok(segments)
    }

    #[inline]
    fn name(&self) -> Option<&str> {
        match self {
            Segment::Literal(_) => None,
            Segment::Param(name) | Segment::CatchAll(name) => Some(name),
        }
    }
}

/// A registered pattern with its method and handler.
pub struct Route {
    method: Method,
    pattern: String,
    segments: Vec<Segment>,
    handler: Arc<dyn Handler>,
    order: usize,
}

impl Route {
    #[inline(always)]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// The pattern as registered, e.g. `/echo/:msg/:meow`.
    #[inline(always)]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[inline(always)]
    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }

    #[inline]
    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    #[inline]
    fn has_catch_all(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::CatchAll(_)))
    }

    #[inline]
    fn is_literal(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Binds `path` against the pattern, `None` when it does not match.
    pub(crate) fn bind(&self, path: &[String]) -> Option<Params> {
        let fits = if self.has_catch_all() {
            path.len() >= self.segments.len()
        } else {
            path.len() == self.segments.len()
        };
        if !fits {
            return None;
        }

        let mut params = Params::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(text) if *text == path[i] => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => params.insert(name.as_str(), path[i].as_str()),
                Segment::CatchAll(name) => params.insert(name.as_str(), path[i..].join("/")),
            }
        }

        Some(params)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

/// Immutable set of routes, shared by every connection.
///
/// Built once through [`RouteTable::builder`]. Routes of a method are kept in
/// specificity order:
/// 1. more literal segments first,
/// 2. patterns without a catch-all before patterns with one,
/// 3. longer patterns first,
/// 4. earlier registration first.
///
/// # Examples
/// ```
/// use petal_web::{Context, Method, Response, RouteTable, StatusCode};
///
/// fn echo(ctx: &Context<'_>) -> Response {
///     Response::text(StatusCode::Ok, ctx.param("msg").unwrap_or_default())
/// }
///
/// let table = RouteTable::builder()
///     .get("/echo/:msg/:meow", echo)
///     .get("/echo/fixed/route", echo)
///     .build()
///     .unwrap();
///
/// let path = ["echo".to_owned(), "hello".to_owned(), "world".to_owned()];
/// let (route, params) = table.resolve(Method::Get, &path).unwrap();
///
/// assert_eq!(route.pattern(), "/echo/:msg/:meow");
/// assert_eq!(params.get("meow"), Some("world"));
/// ```
pub struct RouteTable {
    routes: Vec<Route>,
    by_method: HashMap<Method, Vec<usize>>,
    literals: HashMap<String, usize>,
}

impl RouteTable {
    #[inline]
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    #[inline]
    pub(crate) fn literal(&self, method: Method, path: &str) -> Option<&Route> {
        self.literals
            .get(&literal_key(method, path))
            .map(|&i| &self.routes[i])
    }

    /// Routes of `method`, most specific first.
    #[inline]
    pub(crate) fn candidates(&self, method: Method) -> impl Iterator<Item = &Route> {
        self.by_method
            .get(&method)
            .into_iter()
            .flatten()
            .map(|&i| &self.routes[i])
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.routes.iter()).finish()
    }
}

#[inline]
fn literal_key(method: Method, path: &str) -> String {
    format!("{method} {path}")
}

/// `/` followed by the segments joined with `/`.
#[inline]
pub(crate) fn canonical_path<S: AsRef<str>>(segments: &[S]) -> String {
    let len: usize = segments.iter().map(|s| s.as_ref().len() + 1).sum();
    let mut path = String::with_capacity(len.max(1));
    path.push('/');
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            path.push('/');
        }
        path.push_str(segment.as_ref());
    }
    path
}

/// Collects routes and validates them in [`build()`](RouteTableBuilder::build).
///
/// Registering the same method and pattern twice keeps the first position and
/// the last handler.
#[derive(Default)]
pub struct RouteTableBuilder {
    entries: Vec<(Method, String, Arc<dyn Handler>)>,
}

macro_rules! method_shortcuts {
    ($($fn_name:ident => $method:ident),* $(,)?) => { $(
        #[doc = concat!("Registers a `", stringify!($method), "` route.")]
        #[inline]
        pub fn $fn_name<H: Handler>(self, pattern: impl Into<String>, handler: H) -> Self {
            self.route(Method::$method, pattern, handler)
        }
    )* };
}

impl RouteTableBuilder {
    method_shortcuts! {
        get => Get,
        post => Post,
        put => Put,
        head => Head,
        delete => Delete,
        patch => Patch,
    }

    /// Registers `handler` for `method` and `pattern`.
    pub fn route<H: Handler>(mut self, method: Method, pattern: impl Into<String>, handler: H) -> Self {
        let pattern = pattern.into();
        let handler: Arc<dyn Handler> = Arc::new(handler);

        match self
            .entries
            .iter_mut()
            .find(|(m, p, _)| *m == method && *p == pattern)
        {
            Some((_, _, slot)) => *slot = handler,
            None => self.entries.push((method, pattern, handler)),
        }
        self
    }

    /// Validates every pattern and freezes the table.
    ///
    /// # Errors
    /// [`Error::InvalidPattern`] for the first pattern that:
    /// - does not start with `/`
    /// - has an empty parameter name (`/users/:`)
    /// - repeats a parameter name (`/:id/:id`)
    /// - has a catch-all that is not the last segment (`/*rest/tail`)
    pub fn build(self) -> Result<RouteTable, Error> {
        let mut table = RouteTable {
            routes: Vec::with_capacity(self.entries.len()),
            by_method: HashMap::new(),
            literals: HashMap::new(),
        };

        for (order, (method, pattern, handler)) in self.entries.into_iter().enumerate() {
            let segments = Segment::parse_pattern(&pattern)?;
            table.routes.push(Route {
                method,
                pattern,
                segments,
                handler,
                order,
            });
        }

        for (i, route) in table.routes.iter().enumerate() {
            table.by_method.entry(route.method).or_default().push(i);

            if route.is_literal() {
                let key = literal_key(route.method, &canonical_path(&route.literal_texts()[..]));
                table.literals.entry(key).or_insert(i);
            }
        }

        let routes = &table.routes;
        for bucket in table.by_method.values_mut() {
            bucket.sort_by_key(|&i| {
                let route = &routes[i];
                (
                    Reverse(route.literal_count()),
                    route.has_catch_all(),
                    Reverse(route.segments.len()),
                    route.order,
                )
            });
        }

        let routes_summary: Vec<String> = table
            .routes
            .iter()
            .take(10)
            .map(|r| format!("{} {}", r.method, r.pattern))
            .collect();
        info!(
            routes_count = table.routes.len(),
            literal_routes = table.literals.len(),
            routes_summary = ?routes_summary,
            "Route table loaded"
        );

        Ok(table)
    }
}

impl Route {
    #[inline]
    fn literal_texts(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Literal(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}
