//! Route bindings declared by modules.
//!
//! A [`Route`] ties a path pattern and an optional method filter to a handler
//! key the owning module understands. Together, the routes of all initialised
//! modules form the request-time routing table:
//! `(pattern, method) → ordered list of module handlers`.

use http::Method;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Rest,
}

/// A path pattern such as `/blog/:slug` or `/admin/*`.
///
/// - literal segments compare case-sensitively
/// - `:name` captures exactly one segment
/// - a trailing `*` captures the remainder of the path (possibly empty) under
///   the parameter name `*`
///
/// Parsing never fails: a `*` that is not the last segment, or a bare `:`,
/// is treated as a literal. Trailing slashes are ignored on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Percent-decode one request path segment. Invalid UTF-8 stays encoded.
fn decode_segment(segment: &str) -> Cow<'_, str> {
    urlencoding::decode(segment).unwrap_or(Cow::Borrowed(segment))
}

impl RoutePattern {
    /// Parse a pattern.
    #[must_use]
    pub fn new(pattern: &str) -> Self {
        let parts: Vec<&str> = split_path(pattern).collect();
        let last = parts.len().saturating_sub(1);
        let segments = parts
            .iter()
            .enumerate()
            .map(|(i, part)| match *part {
                "*" if i == last => Segment::Rest,
                p if p.len() > 1 && p.starts_with(':') => Segment::Param(p[1..].to_string()),
                p => Segment::Literal(p.to_string()),
            })
            .collect();

        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    /// The pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a request path, returning captured parameters on success.
    ///
    /// Segments are percent-decoded before matching, so literals and
    /// captures see `hello world` for `hello%20world`.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<Cow<'_, str>> = split_path(path).map(decode_segment).collect();
        let mut params = HashMap::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Rest => {
                    let rest = parts.get(i..).unwrap_or_default().join("/");
                    params.insert("*".to_string(), rest);
                    return Some(params);
                },
                Segment::Literal(lit) => {
                    if parts.get(i).map(AsRef::as_ref) != Some(lit.as_str()) {
                        return None;
                    }
                },
                Segment::Param(name) => {
                    let value = parts.get(i)?;
                    params.insert(name.clone(), value.to_string());
                },
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A module route binding.
///
/// # Example
///
/// ```
/// use trellis_core::route::Route;
/// use http::Method;
///
/// let route = Route::get("show", "/blog/:slug");
/// assert!(route.accepts(&Method::GET));
/// assert!(!route.accepts(&Method::POST));
/// assert_eq!(route.matches("/blog/hello").unwrap()["slug"], "hello");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    id: String,
    pattern: RoutePattern,
    methods: Vec<Method>,
}

impl Route {
    /// A route accepting any method.
    #[must_use]
    pub fn new(id: impl Into<String>, pattern: &str) -> Self {
        Self {
            id: id.into(),
            pattern: RoutePattern::new(pattern),
            methods: Vec::new(),
        }
    }

    /// A `GET` route (also accepts `HEAD`).
    #[must_use]
    pub fn get(id: impl Into<String>, pattern: &str) -> Self {
        Self::new(id, pattern).method(Method::GET)
    }

    /// A `POST` route.
    #[must_use]
    pub fn post(id: impl Into<String>, pattern: &str) -> Self {
        Self::new(id, pattern).method(Method::POST)
    }

    /// Add an accepted method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        self
    }

    /// Handler key passed back to the owning module.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Path pattern.
    #[must_use]
    pub const fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Whether the method filter accepts `method`.
    ///
    /// An empty filter accepts everything; `HEAD` is accepted wherever `GET` is.
    #[must_use]
    pub fn accepts(&self, method: &Method) -> bool {
        self.methods.is_empty()
            || self.methods.contains(method)
            || (*method == Method::HEAD && self.methods.contains(&Method::GET))
    }

    /// Match a path against this route's pattern.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        self.pattern.matches(path)
    }
}
