//! Feed-specific helper functions shared by the registry and the aggregator

/// URL utilities for sources and items
pub mod url {
    use url::Url;

    /// Extract domain from URL
    pub fn extract_domain(url_str: &str) -> Option<String> {
        if let Ok(url) = Url::parse(url_str) {
            url.host_str().map(|d| d.to_string())
        } else {
            None
        }
    }

    /// Parse and normalize a subscription URL.
    ///
    /// The scheme must be one of `allowed_schemes` and a host is required.
    /// Returns the reason as an error string so callers can wrap it.
    pub fn normalize_source_url(raw: &str, allowed_schemes: &[String]) -> Result<Url, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("URL is empty".to_string());
        }

        let url = Url::parse(trimmed).map_err(|e| e.to_string())?;
        check_scheme_and_host(&url, allowed_schemes)?;

        Ok(canonicalize(url))
    }

    /// Resolve an item link and normalize it.
    ///
    /// Relative links such as `/post/1` are joined onto `base`, the source
    /// URL. Without a base the link must be absolute. The result must use one
    /// of `allowed_schemes`. Placeholder links (`#`, `#top`) and links that
    /// resolve back to the source URL itself are rejected.
    pub fn normalize_item_url(
        base: Option<&Url>,
        raw: &str,
        allowed_schemes: &[String],
    ) -> Result<String, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("missing url".to_string());
        }
        if trimmed.starts_with('#') {
            return Err(format!("placeholder link `{}`", trimmed));
        }

        let url = match base {
            Some(base) => base.join(trimmed),
            None => Url::parse(trimmed),
        }
        .map_err(|e| format!("invalid url `{}`: {}", trimmed, e))?;

        check_scheme_and_host(&url, allowed_schemes)?;
        let url = canonicalize(url);

        if base.is_some_and(|base| canonicalize(base.clone()) == url) {
            return Err(format!("link `{}` points at the source itself", trimmed));
        }

        Ok(url.to_string())
    }

    fn check_scheme_and_host(url: &Url, allowed_schemes: &[String]) -> Result<(), String> {
        if !allowed_schemes
            .iter()
            .any(|scheme| scheme.eq_ignore_ascii_case(url.scheme()))
        {
            return Err(format!("scheme `{}` is not allowed", url.scheme()));
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err("URL has no host".to_string());
        }

        Ok(())
    }

    // Host case and default ports are already normalized by the parser.
    fn canonicalize(mut url: Url) -> Url {
        url.set_fragment(None);

        let path = url.path().to_string();
        if path.len() > 1 && path.ends_with('/') {
            url.set_path(path.trim_end_matches('/'));
        }

        url
    }

}

/// Time utilities for item timestamps
pub mod time {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

    /// Parse an ISO-8601 publication time.
    ///
    /// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS` (taken as UTC) and a
    /// bare `YYYY-MM-DD` (midnight UTC).
    pub fn parse_published_at(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }

        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
            return Some(naive.and_utc());
        }

        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

}
