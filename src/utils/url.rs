//! URL utilities for hop links and relay hosts

use crate::error::ResolveError;
use url::Url;

/// Parse an absolute http(s) URL
pub fn parse_http_url(input: &str) -> Result<Url, ResolveError> {
    let parsed = Url::parse(input.trim())?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ResolveError::InvalidRequest(format!(
            "unsupported URL scheme: {}",
            other
        ))),
    }
}

/// Scheme, host and port of a URL, as sent in an `Origin` header
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// Host key used for per-host rate limiting (`host` or `host:port`)
pub fn host_key(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}

/// Resolve an href found on a page against that page's URL.
///
/// Handles absolute, protocol-relative (`//host/path`) and relative links.
pub fn resolve_link(base: &Url, href: &str) -> Result<Url, ResolveError> {
    let href = href.trim();
    if href.is_empty() {
        return Err(ResolveError::InvalidRequest("empty link".to_string()));
    }
    Ok(base.join(href)?)
}

/// Keep the path and query of `url` but move it onto the relay host
pub fn rebase_onto(url: &Url, relay: &Url) -> Result<Url, ResolveError> {
    let mut path_and_query = url.path().to_string();
    if let Some(query) = url.query() {
        path_and_query.push('?');
        path_and_query.push_str(query);
    }
    Ok(relay.join(&path_and_query)?)
}

/// Last non-empty path segment of a URL
pub fn last_path_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(|segment| segment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http_url() {
        assert!(parse_http_url("https://vidsrc.example/embed/movie/1").is_ok());
        assert!(parse_http_url(" http://127.0.0.1:8080/x ").is_ok());
        assert!(parse_http_url("ftp://example.com/file").is_err());
        assert!(parse_http_url("not-a-url").is_err());
    }

    #[test]
    fn test_origin_and_host_key() {
        let url = Url::parse("https://cloudnestra.com/rcp/abc?x=1").unwrap();
        assert_eq!(origin_of(&url), "https://cloudnestra.com");
        assert_eq!(host_key(&url), "cloudnestra.com");

        let local = Url::parse("http://127.0.0.1:4321/prorcp/abc").unwrap();
        assert_eq!(origin_of(&local), "http://127.0.0.1:4321");
        assert_eq!(host_key(&local), "127.0.0.1:4321");
    }

    #[test]
    fn test_resolve_link_variants() {
        let base = Url::parse("https://cloudnestra.com/rcp/H1").unwrap();

        assert_eq!(
            resolve_link(&base, "/prorcp/H2").unwrap().as_str(),
            "https://cloudnestra.com/prorcp/H2"
        );
        assert_eq!(
            resolve_link(&base, "//other.example/srcrcp/H3").unwrap().as_str(),
            "https://other.example/srcrcp/H3"
        );
        assert_eq!(
            resolve_link(&base, "http://abs.example/rcp/H4").unwrap().as_str(),
            "http://abs.example/rcp/H4"
        );
        assert!(resolve_link(&base, "  ").is_err());
    }

    #[test]
    fn test_rebase_onto_relay() {
        let found = Url::parse("https://cloudnestra.com/rcp/H1?ref=a").unwrap();
        let relay = Url::parse("http://127.0.0.1:9000").unwrap();

        assert_eq!(
            rebase_onto(&found, &relay).unwrap().as_str(),
            "http://127.0.0.1:9000/rcp/H1?ref=a"
        );
    }

    #[test]
    fn test_last_path_segment() {
        let url = Url::parse("https://vidsrc.example/embed/tv/tt0944947/1-1/").unwrap();
        assert_eq!(last_path_segment(&url).as_deref(), Some("1-1"));

        let root = Url::parse("https://vidsrc.example/").unwrap();
        assert_eq!(last_path_segment(&root), None);
    }
}
