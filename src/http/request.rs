use crate::{
    errors::{Error, Malformed},
    http::{
        cookie,
        query::Query,
        types::{Cookie, Headers, Params},
    },
    Method,
};
use memchr::{memchr, memmem};

/// A parsed HTTP request, owned by a single exchange.
///
/// # Input data requirements
///
/// The whole request is expected in one buffer. The head (everything before
/// the first blank line) must be `UTF-8`; the body is kept as raw bytes.
///
/// #### General designations
/// - `SP`: ASCII space (0x20)
/// - `CRLF`: exactly `"\r\n"`; a lone `LF` is not a line terminator.
///
/// ## First line
/// ```text
/// [METHOD] SP [TARGET] SP [VERSION] CRLF
/// ```
/// - `[METHOD]`: one of the [Method](crate::Method) tokens, case-sensitive.
/// - `[TARGET]`: path with an optional `?query`. Empty path segments are
///   dropped, so `/a//b/` has the segments `a`, `b`.
/// - `[VERSION]`: stored as sent, never validated. May be missing.
///
/// ## Header
/// ```text
/// [NAME] ":" [VALUE] CRLF
/// ```
/// The value is trimmed of spaces and tabs on both sides. A later line with
/// the same name replaces an earlier one, an empty value removes the name.
///
/// Examples:
/// ```text
/// Content-Type: text/plain\r\n    // ("Content-Type", "text/plain")
/// Name:   padded value \t\r\n     // ("Name", "padded value")
/// X-Empty:\r\n                    // not stored
/// no colon here\r\n               // error
/// ```
///
/// ## Body
///
/// Every byte after the blank line, regardless of `Content-Length`.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    target: String,
    path: String,
    segments: Vec<String>,
    query: Vec<(String, String)>,
    version: String,

    headers: Headers,
    params: Params,
    cookies: Vec<Cookie>,

    body: Vec<u8>,
}

impl Request {
    /// Parses one request from `buf`.
    ///
    /// # Examples
    /// ```rust
    /// use petal_web::Request;
    ///
    /// let req = Request::parse(b"GET /echo/hi?x=1 HTTP/1.1\r\nUser-Agent: demo\r\n\r\n").unwrap();
    ///
    /// assert_eq!(req.path(), "/echo/hi");
    /// assert_eq!(req.segments(), ["echo", "hi"]);
    /// assert_eq!(req.query("x"), Some("1"));
    /// assert_eq!(req.header("User-Agent"), Some("demo"));
    /// ```
    #[inline]
    pub fn parse(buf: &[u8]) -> Result<Self, Error> {
        Ok(Self::parse_bytes(buf)?)
    }

    pub(crate) fn parse_bytes(buf: &[u8]) -> Result<Self, Malformed> {
        let end_head = memmem::find(buf, b"\r\n\r\n").ok_or(Malformed::MissingDelimiter)?;
        let head = simdutf8::basic::from_utf8(&buf[..end_head])
            .map_err(|_| Malformed::InvalidEncoding)?;
        let body = buf[end_head + 4..].to_vec();

        let (first_line, header_block) = head.split_once("\r\n").unwrap_or((head, ""));

        let mut parts = first_line.splitn(3, ' ');
        let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
            return Err(Malformed::RequestLine);
        };
        let version = parts.next().unwrap_or_default();

        let method = Method::from_bytes(method.as_bytes()).ok_or(Malformed::Method)?;

        let (path, query_str) = match memchr(b'?', target.as_bytes()) {
            Some(pos) => (&target[..pos], &target[pos + 1..]),
            None => (target, ""),
        };

        let mut query = Vec::new();
        Query::parse_into(&mut query, query_str);

        let headers = Self::parse_headers(header_block)?;
        let cookies = headers.get("Cookie").map(cookie::parse).unwrap_or_default();

        Ok(Request {
            method,
            target: target.to_owned(),
            path: path.to_owned(),
            segments: split_segments(path),
            query,
            version: version.to_owned(),

            headers,
            params: Params::new(),
            cookies,

            body,
        })
    }

    #[inline]
    fn parse_headers(block: &str) -> Result<Headers, Malformed> {
        let mut headers = Headers::new();

        for line in block.split("\r\n").filter(|line| !line.is_empty()) {
            let colon = memchr(b':', line.as_bytes()).ok_or(Malformed::Header)?;
            let name = &line[..colon];
            if name.is_empty() {
                return Err(Malformed::Header);
            }

            let value = line[colon + 1..].trim_matches(|c| c == ' ' || c == '\t');
            headers.set(name, value);
        }

        Ok(headers)
    }
}

/// Non-empty `/`-separated components of `path`.
#[inline]
pub(crate) fn split_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect()
}

// Public API
impl Request {
    #[inline(always)]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// The request target exactly as sent, including the query.
    #[inline(always)]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The target without its `?query` part.
    #[inline(always)]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline(always)]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// First query value for `name`.
    #[inline]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[inline(always)]
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// The third token of the request line, e.g. `HTTP/1.1`.
    #[inline(always)]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[inline(always)]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Case-sensitive header lookup. See also [`Headers::find`].
    #[inline(always)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Path parameters bound by the router; empty before routing.
    #[inline(always)]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    #[inline(always)]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    #[inline(always)]
    pub(crate) fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    #[inline(always)]
    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Value of the first cookie called `name`.
    #[inline]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name() == name)
            .map(Cookie::value)
    }

    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as text, if it is valid `UTF-8`.
    #[inline]
    pub fn body_str(&self) -> Option<&str> {
        simdutf8::basic::from_utf8(&self.body).ok()
    }
}
