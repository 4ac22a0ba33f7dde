//! Adapts an axum request to [`RequestContext`].

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::header::COOKIE;
use axum::http::{HeaderMap, Method};
use meterdeck_core::request::RequestContext;

/// Owned snapshot of the parts of a request the auth layer reads.
///
/// Also usable directly as an extractor.
#[derive(Debug, Clone)]
pub struct HttpRequestContext {
    method: Method,
    headers: HeaderMap,
    query: Vec<(String, String)>,
}

impl HttpRequestContext {
    pub fn from_parts(parts: &Parts) -> Self {
        let query = parts
            .uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        Self {
            method: parts.method.clone(),
            headers: parts.headers.clone(),
            query,
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl RequestContext for HttpRequestContext {
    fn method(&self) -> &str {
        self.method.as_str()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn cookie_headers(&self) -> Vec<&str> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    fn query_param(&self, name: &str) -> Option<String> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }
}

impl<S> FromRequestParts<S> for HttpRequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn context(req: Request<()>) -> HttpRequestContext {
        let (parts, _) = req.into_parts();
        HttpRequestContext::from_parts(&parts)
    }

    #[test]
    fn reads_method_headers_cookies_and_query() {
        let ctx = context(
            Request::post("/api/v1/usage?share=abc.def%3D&x=1")
                .header("Cookie", "a=1; meterdeck_session=tok")
                .header("X-Share-Password", "pw")
                .body(())
                .unwrap(),
        );

        assert_eq!(ctx.method(), "POST");
        assert!(!ctx.is_safe_method());
        assert_eq!(ctx.header("x-share-password"), Some("pw"));
        assert_eq!(ctx.cookie("meterdeck_session"), Some("tok"));
        assert_eq!(ctx.query_param("share").as_deref(), Some("abc.def="));
        assert_eq!(ctx.query_param("missing"), None);
    }

    #[test]
    fn cookies_split_across_header_lines_are_found() {
        let ctx = context(
            Request::post("/api/v1/share")
                .header("Cookie", "meterdeck_csrf=nonce.1.sig")
                .header("Cookie", "meterdeck_session=tok")
                .body(())
                .unwrap(),
        );

        assert_eq!(ctx.cookie("meterdeck_csrf"), Some("nonce.1.sig"));
        assert_eq!(ctx.cookie("meterdeck_session"), Some("tok"));
    }

    #[test]
    fn get_is_safe() {
        let ctx = context(Request::get("/").body(()).unwrap());
        assert!(ctx.is_safe_method());
        assert!(ctx.cookie("anything").is_none());
    }
}
