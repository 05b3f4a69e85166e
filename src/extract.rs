//! Recovery of structured values from human-oriented command output.

use url::Url;

/// Returns the first whitespace-delimited token of `text` accepted by `predicate`.
pub fn extract_first<'a, P>(text: &'a str, predicate: P) -> Option<&'a str>
where
    P: Fn(&str) -> bool,
{
    text.split_whitespace().find(|token| predicate(token))
}

/// Accepts tokens beginning with `prefix`.
pub fn starts_with(prefix: &str) -> impl Fn(&str) -> bool + '_ {
    move |token| token.starts_with(prefix)
}

/// Accepts tokens beginning with `prefix` that also parse as a URL.
pub fn uri_with_prefix(prefix: &str) -> impl Fn(&str) -> bool + '_ {
    move |token| token.starts_with(prefix) && Url::parse(token).is_ok()
}
