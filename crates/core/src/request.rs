//! The minimal view of an inbound request that the auth layer needs.
//!
//! Handlers adapt their framework's request type to [`RequestContext`]; the
//! CSRF guard and the session/share authority only ever see this trait.

use std::collections::HashMap;

pub trait RequestContext {
    /// HTTP method, upper-case (`"GET"`, `"POST"`, ...).
    fn method(&self) -> &str;

    /// First value of a header, looked up case-insensitively.
    fn header(&self, name: &str) -> Option<&str>;

    /// Decoded value of a query-string parameter.
    fn query_param(&self, name: &str) -> Option<String>;

    /// Every `Cookie` header line. HTTP/2 clients may send one per cookie.
    fn cookie_headers(&self) -> Vec<&str> {
        self.header("cookie").into_iter().collect()
    }

    /// Value of a cookie, searched across all `Cookie` header lines.
    fn cookie(&self, name: &str) -> Option<&str> {
        self.cookie_headers()
            .into_iter()
            .flat_map(|raw| raw.split(';'))
            .find_map(|pair| {
                let (key, value) = pair.trim().split_once('=')?;
                (key.trim() == name).then(|| value.trim())
            })
    }

    /// Whether the method is read-only and therefore exempt from CSRF checks.
    fn is_safe_method(&self) -> bool {
        matches!(self.method(), "GET" | "HEAD" | "OPTIONS" | "TRACE")
    }
}

/// Owned request description, handy for tests and non-HTTP callers.
#[derive(Debug, Clone, Default)]
pub struct StaticRequest {
    pub method: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
}

impl StaticRequest {
    pub fn new(method: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Append a cookie to the `Cookie` header.
    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        let entry = self.headers.entry("cookie".to_string()).or_default();
        if !entry.is_empty() {
            entry.push_str("; ");
        }
        entry.push_str(&format!("{name}={value}"));
        self
    }

    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query.insert(name.to_string(), value.to_string());
        self
    }
}

impl RequestContext for StaticRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    fn query_param(&self, name: &str) -> Option<String> {
        self.query.get(name).cloned()
    }
}
