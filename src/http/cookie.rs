//! Tokenizer for the `Cookie` request header.

use crate::http::types::Cookie;

/// Splits a `Cookie` header value into cookies, in order of appearance.
///
/// Pieces are separated by `;` and trimmed. The name is everything before the
/// first `=` (trimmed once more), the value everything after it; a piece with
/// no `=` becomes a cookie with an empty value. Empty pieces are skipped.
pub(crate) fn parse(header: &str) -> Vec<Cookie> {
    header
        .split(';')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(|piece| match piece.split_once('=') {
            Some((name, value)) => Cookie::new(name.trim(), value),
            None => Cookie::new(piece, ""),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(header: &str) -> Vec<(String, String)> {
        parse(header)
            .into_iter()
            .map(|c| (c.name().to_owned(), c.value().to_owned()))
            .collect()
    }

    #[test]
    fn ordered_pairs() {
        assert_eq!(
            pairs("a=1; b=2"),
            [("a".into(), "1".into()), ("b".into(), "2".into())]
        );
    }

    #[test]
    fn edge_cases() {
        #[rustfmt::skip]
        let cases: [(&str, &[(&str, &str)]); 7] = [
            ("",                      &[]),
            (" ; ;",                  &[]),
            ("flag",                  &[("flag", "")]),
            ("  session = abc ",      &[("session", " abc")]),
            ("token=a=b",             &[("token", "a=b")]),
            ("a=1;;b=2;",             &[("a", "1"), ("b", "2")]),
            ("empty=; x=y",           &[("empty", ""), ("x", "y")]),
        ];

        for (header, expected) in cases {
            let got = parse(header);
            let got: Vec<_> = got.iter().map(|c| (c.name(), c.value())).collect();

            assert_eq!(got, expected, "header: {header:?}");
        }
    }
}
