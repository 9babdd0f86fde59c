//! HTTP response value and its wire form.

use crate::{errors::Error, http::types::Headers, StatusCode};
use serde::Serialize;

const CONTENT_LENGTH: &str = "Content-Length";
const CONTENT_TYPE: &str = "Content-Type";

/// HTTP response returned by a [`Handler`](crate::Handler).
///
/// A response is a plain value: status, headers in insertion order and a raw
/// body. `Content-Length` is owned by the response itself and always equals
/// the body length; it is set on construction and rewritten by
/// [`body()`](Response::body).
///
/// # Examples
/// ```
/// use petal_web::{Response, StatusCode};
///
/// let resp = Response::text(StatusCode::Ok, "hello").header("X-Request-Id", "42");
///
/// assert_eq!(
///     resp.to_bytes(),
///     b"HTTP/1.1 200 OK\r\n\
///       Content-Type: text/plain\r\n\
///       Content-Length: 5\r\n\
///       X-Request-Id: 42\r\n\
///       \r\n\
///       hello"
/// );
/// ```
///
/// # Panics
/// Setting `Content-Length` by hand panics in `debug` mode. In `release` mode
/// the call is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
}

impl Response {
    /// Empty response with `Content-Length: 0`.
    #[inline]
    pub fn new(status: StatusCode) -> Self {
        let mut resp = Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
        };
        resp.sync_length();
        resp
    }

    /// `text/plain` response.
    #[inline]
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::typed(status, "text/plain", body.into().into_bytes())
    }

    /// `text/html` response.
    #[inline]
    pub fn html(status: StatusCode, body: impl Into<String>) -> Self {
        Self::typed(status, "text/html", body.into().into_bytes())
    }

    /// `application/json` response with `value` encoded by `serde_json`.
    ///
    /// An encoding failure is answered with a `500` text response carrying the
    /// error message. Use [`try_json`](Response::try_json) to handle it instead.
    ///
    /// # Examples
    /// ```
    /// use petal_web::{Response, StatusCode};
    /// use serde_json::json;
    ///
    /// let resp = Response::json(StatusCode::Ok, &json!({"name": "John", "age": 30}));
    ///
    /// assert_eq!(resp.headers().get("Content-Type"), Some("application/json"));
    /// assert_eq!(resp.body_bytes(), br#"{"age":30,"name":"John"}"#);
    /// ```
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        Self::try_json(status, value).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "response serialization failed");
            Self::text(StatusCode::InternalServerError, err.to_string())
        })
    }

    /// Like [`json`](Response::json), but returns the encoding error.
    #[inline]
    pub fn try_json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Result<Self, Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::typed(status, "application/json", body))
    }

    #[inline]
    fn typed(status: StatusCode, content_type: &str, body: Vec<u8>) -> Self {
        let mut headers = Headers::new();
        headers.set(CONTENT_TYPE, content_type);

        let mut resp = Self {
            status,
            headers,
            body,
        };
        resp.sync_length();
        resp
    }

    #[inline(always)]
    fn sync_length(&mut self) {
        self.headers.set(CONTENT_LENGTH, self.body.len().to_string());
    }
}

// Builder
impl Response {
    /// Adds or replaces a header. An empty `value` removes it.
    ///
    /// PLEASE DO NOT SET `Content-Length`: it is calculated automatically.
    ///
    /// # Panics
    /// Error message: `Content-Length is derived from the body`
    #[inline]
    #[track_caller]
    pub fn header<N, V>(mut self, name: N, value: V) -> Self
    where
        N: Into<String> + AsRef<str>,
        V: Into<String>,
    {
        self.set_header(name, value);
        self
    }

    /// In-place form of [`header()`](Response::header).
    #[track_caller]
    pub fn set_header<N, V>(&mut self, name: N, value: V)
    where
        N: Into<String> + AsRef<str>,
        V: Into<String>,
    {
        let is_length = name.as_ref().eq_ignore_ascii_case(CONTENT_LENGTH);
        debug_assert!(!is_length, "Content-Length is derived from the body");

        if !is_length {
            self.headers.set(name, value);
        }
    }

    /// Replaces the body and recomputes `Content-Length`.
    #[inline]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.sync_length();
        self
    }

    /// Adds `Connection: close` unless a `Connection` header is already present.
    #[inline]
    pub(crate) fn close(&mut self) {
        if self.headers.find("Connection").is_none() {
            self.headers.set("Connection", "close");
        }
    }
}

// Accessors and serialization
impl Response {
    #[inline(always)]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    #[inline(always)]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    #[inline(always)]
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Serializes into a new buffer.
    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(128 + self.body.len());
        self.write_to(&mut buffer);
        buffer
    }

    /// Appends the wire form to `buffer`:
    /// ```text
    /// HTTP/1.1 [CODE] [REASON] CRLF
    /// ([NAME] ": " [VALUE] CRLF)*
    /// CRLF
    /// [BODY]
    /// ```
    pub fn write_to(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(self.status.status_line().as_bytes());
        buffer.extend_from_slice(b"\r\n");

        for (name, value) in self.headers.iter() {
            buffer.extend_from_slice(name.as_bytes());
            buffer.extend_from_slice(b": ");
            buffer.extend_from_slice(value.as_bytes());
            buffer.extend_from_slice(b"\r\n");
        }

        buffer.extend_from_slice(b"\r\n");
        buffer.extend_from_slice(&self.body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::str_op;
    use serde::ser::{Error as _, Serializer};

    #[test]
    fn empty() {
        #[rustfmt::skip]
        let cases = [
            (StatusCode::Ok,        "HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n"),
            (StatusCode::NotFound,  "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n"),
            (StatusCode::NoContent, "HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n"),
        ];

        for (status, expected) in cases {
            assert_eq!(str_op(&Response::new(status).to_bytes()), expected);
        }
    }

    #[test]
    fn text_round_trip() {
        let resp = Response::text(StatusCode::Ok, "hello");
        let bytes = resp.to_bytes();

        assert_eq!(
            str_op(&bytes),
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello"
        );
        assert_eq!(resp.status(), StatusCode::Ok);
        assert_eq!(resp.headers().get("Content-Length"), Some("5"));
        assert_eq!(resp.body_bytes(), b"hello");

        // Serialization does not consume or alter the response.
        assert_eq!(resp.to_bytes(), bytes);
    }

    #[test]
    fn content_length_counts_bytes() {
        #[rustfmt::skip]
        let cases = [
            ("",            "0"),
            ("hello",       "5"),
            ("привет",      "12"),
            ("🌸",          "4"),
        ];

        for (body, length) in cases {
            let resp = Response::text(StatusCode::Ok, body);
            assert_eq!(resp.headers().get("Content-Length"), Some(length));
        }
    }

    #[test]
    fn body_replaces_and_recomputes() {
        let resp = Response::html(StatusCode::Ok, "<h1>Hello World</h1>")
            .header("X-Id", "1")
            .body("short");

        assert_eq!(resp.body_bytes(), b"short");
        assert_eq!(
            resp.headers().iter().collect::<Vec<_>>(),
            [("Content-Type", "text/html"), ("Content-Length", "5"), ("X-Id", "1")]
        );
    }

    #[test]
    fn headers_replace_and_remove() {
        let mut resp = Response::text(StatusCode::Ok, "")
            .header("Content-Type", "text/csv")
            .header("X-Trace", "abc");
        resp.set_header("X-Trace", "");

        assert_eq!(
            str_op(&resp.to_bytes()),
            "HTTP/1.1 200 OK\r\nContent-Type: text/csv\r\nContent-Length: 0\r\n\r\n"
        );
    }

    #[test]
    #[should_panic(expected = "Content-Length is derived from the body")]
    fn manual_content_length() {
        let _ = Response::new(StatusCode::Ok).header("Content-Length", "10");
    }

    #[test]
    #[should_panic(expected = "Content-Length is derived from the body")]
    fn manual_content_length_any_case() {
        Response::new(StatusCode::Ok).set_header("content-length", "10");
    }

    #[derive(Serialize)]
    struct User<'a> {
        name: &'a str,
        age: u8,
    }

    struct Broken;

    impl Serialize for Broken {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("broken value"))
        }
    }

    #[test]
    fn json_body() {
        let resp = Response::json(StatusCode::Created, &User { name: "John", age: 30 });

        assert_eq!(
            str_op(&resp.to_bytes()),
            concat!(
                "HTTP/1.1 201 Created\r\n",
                "Content-Type: application/json\r\n",
                "Content-Length: 24\r\n",
                "\r\n",
                r#"{"name":"John","age":30}"#,
            )
        );
    }

    #[test]
    fn json_failure() {
        let resp = Response::json(StatusCode::Ok, &Broken);

        assert_eq!(resp.status(), StatusCode::InternalServerError);
        assert_eq!(resp.headers().get("Content-Type"), Some("text/plain"));
        assert_eq!(resp.body_bytes(), b"broken value");

        assert!(matches!(
            Response::try_json(StatusCode::Ok, &Broken),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn close_once() {
        let mut resp = Response::new(StatusCode::Ok);
        resp.close();
        resp.close();
        assert_eq!(resp.headers().get("Connection"), Some("close"));
        assert_eq!(resp.headers().len(), 2);

        let mut resp = Response::new(StatusCode::Ok).header("connection", "upgrade");
        resp.close();
        assert_eq!(resp.headers().get("Connection"), None);
    }
}
