//! Link-header pagination.

use reqwest::header::{HeaderMap, LINK};

/// Default number of items per page.
pub const DEFAULT_PER_PAGE: u32 = 100;

/// Maximum number of items per page accepted by the server.
pub const MAX_PER_PAGE: u32 = 100;

/// Extract the `next` target from a `Link` header value such as
/// `<https://host/api/v4/groups?page=2>; rel="next", <...>; rel="last"`.
///
/// Malformed entries and other relations are skipped. The first `next`
/// wins.
pub fn parse_next(header: &str) -> Option<String> {
    for entry in header.split(',') {
        let mut parts = entry.split(';');
        let Some(url) = parts
            .next()
            .map(str::trim)
            .and_then(|t| t.strip_prefix('<'))
            .and_then(|t| t.strip_suffix('>'))
        else {
            continue;
        };

        let is_next = parts.any(|param| {
            param.split_once('=').is_some_and(|(name, value)| {
                name.trim().eq_ignore_ascii_case("rel")
                    && value
                        .trim()
                        .trim_matches('"')
                        .split_whitespace()
                        .any(|rel| rel.eq_ignore_ascii_case("next"))
            })
        });
        if is_next {
            return Some(url.to_string());
        }
    }
    None
}

/// URL of the next page, if the response advertises one.
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get(LINK)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_next)
}
