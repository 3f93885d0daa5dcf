//! Upstream URL resolution.
//!
//! # Responsibilities
//! - Hold the configured upstream base URL, validated once
//! - Join the base with an encoded request path using exactly one `/`
//! - Append the query string untouched
//!
//! # Design Decisions
//! - The configured string is kept verbatim; `as_str` returns it unchanged
//! - No normalisation beyond the single separating slash

use url::Url;

use crate::config::ConfigurationError;

/// A validated upstream base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    raw: String,
}

impl Upstream {
    /// Validate an upstream base URL. Only absolute http(s) URLs with a host
    /// are accepted.
    pub fn parse(proxy: &str, raw: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidUpstream {
            proxy: proxy.to_string(),
            upstream: raw.to_string(),
            reason,
        };

        let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(invalid(format!("unsupported scheme `{}`", other))),
        }
        if url.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("base URL must not carry a query or fragment".to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
        })
    }

    /// The upstream exactly as configured.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Build the outbound URL for an already encoded path and raw query.
    pub fn resolve(&self, encoded_path: &str, query: Option<&str>) -> String {
        let base = self.raw.trim_end_matches('/');
        let path = encoded_path.strip_prefix('/').unwrap_or(encoded_path);

        let mut url = String::with_capacity(base.len() + path.len() + 2);
        url.push_str(base);
        url.push('/');
        url.push_str(path);

        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(raw: &str) -> Upstream {
        Upstream::parse("test", raw).unwrap()
    }

    #[test]
    fn joins_with_single_slash() {
        let plain = upstream("http://example.com");
        assert_eq!(plain.resolve("/~", None), "http://example.com/~");
        assert_eq!(plain.resolve("~", None), "http://example.com/~");

        let trailing = upstream("http://example.com/");
        assert_eq!(trailing.resolve("/+test+test", None), "http://example.com/+test+test");
        assert_eq!(trailing.resolve("", None), "http://example.com/");
    }

    #[test]
    fn only_one_separator_is_dropped() {
        let plain = upstream("http://example.com/");
        assert_eq!(plain.resolve("//a", None), "http://example.com//a");
        assert_eq!(plain.resolve("/a//b/", None), "http://example.com/a//b/");
    }

    #[test]
    fn keeps_base_path() {
        let nested = upstream("https://example.com/app/");
        assert_eq!(nested.resolve("/static/a.css", None), "https://example.com/app/static/a.css");
    }

    #[test]
    fn appends_query_verbatim() {
        let plain = upstream("http://example.com");
        assert_eq!(
            plain.resolve("/search", Some("q=a%20b&x=1")),
            "http://example.com/search?q=a%20b&x=1"
        );
        assert_eq!(plain.resolve("/search", Some("")), "http://example.com/search");
    }

    #[test]
    fn as_str_is_verbatim() {
        assert_eq!(upstream("http://www.google.com/").as_str(), "http://www.google.com/");
    }

    #[test]
    fn rejects_bad_upstreams() {
        assert!(Upstream::parse("t", "example.com").is_err());
        assert!(Upstream::parse("t", "ftp://example.com").is_err());
        assert!(Upstream::parse("t", "http://example.com/?a=1").is_err());
        assert!(matches!(
            Upstream::parse("t", "unix:/tmp/sock"),
            Err(ConfigurationError::InvalidUpstream { .. })
        ));
    }
}
