//! Canonical signing input for each signature version.
//!
//! v1 signs `timestamp || body` and binds neither method nor path. v2 signs a
//! newline-joined tuple:
//!
//! ```text
//! <METHOD>\n
//! <PATH?sorted-query>\n
//! <timestamp>\n
//! <nonce-or-empty>\n
//! <raw-body>
//! ```
//!
//! Both forms are pure functions of their inputs. The body is appended as raw
//! bytes, so non-UTF-8 payloads are signed exactly as received.

/// Build the v1 signing input: the timestamp immediately followed by the body.
///
/// # Examples
///
/// ```
/// use dualsig_auth::canonical::canonical_v1;
///
/// assert_eq!(canonical_v1("1700000000", b"{}"), b"1700000000{}");
/// ```
#[must_use]
pub fn canonical_v1(timestamp: &str, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(timestamp.len() + body.len());
    out.extend_from_slice(timestamp.as_bytes());
    out.extend_from_slice(body);
    out
}

/// Build the v2 signing input.
///
/// The method is uppercased, the query string is re-serialized with its
/// parameters sorted by key, and an absent nonce contributes an empty line.
///
/// # Examples
///
/// ```
/// use dualsig_auth::canonical::canonical_v2;
///
/// let canonical = canonical_v2("get", "/v1/ping?b=2&a=1", "1700000000", None, b"{}");
/// assert_eq!(canonical, b"GET\n/v1/ping?a=1&b=2\n1700000000\n\n{}");
/// ```
#[must_use]
pub fn canonical_v2(
    method: &str,
    path: &str,
    timestamp: &str,
    nonce: Option<&str>,
    body: &[u8],
) -> Vec<u8> {
    let head = format!(
        "{}\n{}\n{timestamp}\n{}\n",
        method.to_ascii_uppercase(),
        canonical_path(path),
        nonce.unwrap_or_default(),
    );

    let mut out = Vec::with_capacity(head.len() + body.len());
    out.extend_from_slice(head.as_bytes());
    out.extend_from_slice(body);
    out
}

/// Canonicalize a request target: the path with its query sorted by key.
///
/// A missing or empty query yields the bare path.
///
/// # Examples
///
/// ```
/// use dualsig_auth::canonical::canonical_path;
///
/// assert_eq!(canonical_path("/items?z=1&a=2"), "/items?a=2&z=1");
/// assert_eq!(canonical_path("/items?"), "/items");
/// assert_eq!(canonical_path("/items"), "/items");
/// ```
#[must_use]
pub fn canonical_path(path: &str) -> String {
    let Some((base, query)) = path.split_once('?') else {
        return path.to_owned();
    };

    let query = canonical_query_string(query);
    if query.is_empty() {
        base.to_owned()
    } else {
        format!("{base}?{query}")
    }
}

/// Re-serialize a query string with parameters sorted by key.
///
/// Parameters are decoded as `application/x-www-form-urlencoded`, stably
/// sorted by key (duplicate keys keep their original relative order), and
/// re-encoded. Differently encoded spellings of the same parameters therefore
/// produce the same output.
///
/// # Examples
///
/// ```
/// use dualsig_auth::canonical::canonical_query_string;
///
/// assert_eq!(canonical_query_string("b=2&a=1"), "a=1&b=2");
/// assert_eq!(canonical_query_string(""), "");
/// ```
#[must_use]
pub fn canonical_query_string(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }

    let mut params: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));

    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish()
}
