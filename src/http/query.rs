//! URL query string splitting.

use memchr::memchr;

/// Splits a query string into ordered `(name, value)` pairs.
///
/// No percent-decoding is performed. A leading `?` is ignored, a piece
/// without `=` yields an empty value, and empty pieces (`a=1&&b=2`) are
/// skipped.
///
/// # Examples
/// ```rust
/// use petal_web::query::Query;
///
/// let params = Query::parse("?debug&name=john&=anon&&city=");
///
/// assert_eq!(params, [("debug", ""), ("name", "john"), ("", "anon"), ("city", "")]);
/// ```
pub struct Query;

impl Query {
    /// Parses into a new vector of borrowed pairs.
    #[inline]
    pub fn parse(query: &str) -> Vec<(&str, &str)> {
        let mut result = Vec::new();
        Self::for_each(query, |name, value| result.push((name, value)));
        result
    }

    /// Parses into owned pairs appended to `result`.
    #[inline]
    pub(crate) fn parse_into(result: &mut Vec<(String, String)>, query: &str) {
        Self::for_each(query, |name, value| {
            result.push((name.to_owned(), value.to_owned()))
        });
    }

    fn for_each<'a, F: FnMut(&'a str, &'a str)>(query: &'a str, mut f: F) {
        let data = query.strip_prefix('?').unwrap_or(query);

        let mut start = 0;
        while start < data.len() {
            let end = memchr(b'&', &data.as_bytes()[start..])
                .map(|pos| start + pos)
                .unwrap_or(data.len());

            let piece = &data[start..end];
            if !piece.is_empty() {
                match memchr(b'=', piece.as_bytes()) {
                    Some(eq) => f(&piece[..eq], &piece[eq + 1..]),
                    None => f(piece, ""),
                }
            }

            start = end + 1;
        }
    }
}
