//! Method + path resolution against a [`RouteTable`].
//!
//! Resolution takes two steps:
//! 1. Literal-only patterns are looked up directly by method and canonical
//!    path (`/` + segments joined with `/`).
//! 2. Otherwise the routes of the method are tried in specificity order and
//!    the first one that binds wins.
//!
//! Matching is exact on segment count: `/echo/:msg` does not match
//! `/echo/a/b`. Only a trailing `*name` segment consumes the rest of the path.

pub mod handler;
pub mod table;

use crate::{errors::Error, http::types::Params, Method, Request};
use table::{canonical_path, Route, RouteTable};
use tracing::debug;

impl RouteTable {
    /// Finds the route for `method` and the path `segments`, with its bound
    /// parameters.
    ///
    /// # Errors
    /// [`Error::RouteNotFound`] if no pattern of `method` matches.
    pub fn resolve(&self, method: Method, segments: &[String]) -> Result<(&Route, Params), Error> {
        let path = canonical_path(segments);

        if let Some(route) = self.literal(method, &path) {
            debug!(method = %method, path = %path, route_pattern = %route.pattern(), "Route matched");
            return Ok((route, Params::new()));
        }

        for route in self.candidates(method) {
            if let Some(params) = route.bind(segments) {
                debug!(
                    method = %method,
                    path = %path,
                    route_pattern = %route.pattern(),
                    path_params = ?params,
                    "Route matched"
                );
                return Ok((route, params));
            }
        }

        debug!(method = %method, path = %path, "No route matched");
        Err(Error::RouteNotFound { method, path })
    }

    /// Resolves `req` and stores the bound parameters in it.
    #[inline]
    pub fn route(&self, req: &mut Request) -> Result<&Route, Error> {
        let (route, params) = self.resolve(req.method(), req.segments())?;
        req.set_params(params);
        Ok(route)
    }
}
