//! HTTP metadata extraction for web-facing ports

use regex::Regex;
use reqwest::redirect;
use std::net::Ipv4Addr;
use std::sync::OnceLock;
use std::time::Duration;

use crate::scanner::ScanContext;

/// User agent presented to probed web servers.
const USER_AGENT: &str = "whosthere/1.0";

/// How much of the response body is searched for a title.
const MAX_BODY_BYTES: usize = 16 * 1024;

/// Longest title kept.
const MAX_TITLE_LEN: usize = 80;

/// Redirects followed before giving up and using the last response.
const MAX_REDIRECTS: usize = 3;

static TITLE_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn title_regex() -> Option<&'static Regex> {
    TITLE_RE
        .get_or_init(|| Regex::new(r"(?is)<title[^>]*>\s*([^<]+?)\s*</title>").ok())
        .as_ref()
}

/// Fetches `/` on the given port and extracts the page title and the
/// Server response header. TLS certificate validation is off; devices on
/// a LAN rarely present valid certificates.
///
/// Returns `(title, server)`, either of which may be empty.
pub async fn fetch_http_info(
    ctx: &ScanContext,
    ip: Ipv4Addr,
    port: u16,
    timeout: Duration,
) -> (String, String) {
    if ctx.is_done() {
        return (String::new(), String::new());
    }

    let scheme = if port == 443 || port == 8443 {
        "https"
    } else {
        "http"
    };
    let url = format!("{scheme}://{ip}:{port}/");

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .redirect(redirect::Policy::custom(|attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.stop()
            } else {
                attempt.follow()
            }
        }))
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build();
    let Ok(client) = client else {
        return (String::new(), String::new());
    };

    let mut response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(_) => return (String::new(), String::new()),
    };

    let server = response
        .headers()
        .get("server")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let mut body = Vec::new();
    while let Ok(Some(chunk)) = response.chunk().await {
        body.extend_from_slice(&chunk);
        if body.len() >= MAX_BODY_BYTES {
            body.truncate(MAX_BODY_BYTES);
            break;
        }
    }

    (extract_title(&body), server)
}

/// Pulls the first `<title>` out of an HTML body, trimmed and capped.
pub fn extract_title(body: &[u8]) -> String {
    if body.is_empty() {
        return String::new();
    }
    let Some(regex) = title_regex() else {
        return String::new();
    };
    let text = String::from_utf8_lossy(body);
    let Some(captures) = regex.captures(&text) else {
        return String::new();
    };
    let title = captures
        .get(1)
        .map(|m| m.as_str().trim())
        .unwrap_or_default();

    if title.chars().count() > MAX_TITLE_LEN {
        let cut: String = title.chars().take(MAX_TITLE_LEN - 3).collect();
        format!("{cut}...")
    } else {
        title.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_simple_title() {
        let body = b"<html><head><title>Router Admin</title></head></html>";
        assert_eq!(extract_title(body), "Router Admin");
    }

    #[test]
    fn title_match_is_case_insensitive_and_trimmed() {
        let body = b"<HTML><TITLE>\n  My NAS  \n</TITLE></HTML>";
        assert_eq!(extract_title(body), "My NAS");
    }

    #[test]
    fn title_attributes_are_tolerated() {
        let body = br#"<title data-page="home">Dashboard</title>"#;
        assert_eq!(extract_title(body), "Dashboard");
    }

    #[test]
    fn missing_title_is_empty() {
        assert_eq!(extract_title(b"<html><body>hi</body></html>"), "");
        assert_eq!(extract_title(b""), "");
    }

    #[test]
    fn long_titles_are_truncated() {
        let long_title = "t".repeat(120);
        let body = format!("<title>{long_title}</title>");
        let title = extract_title(body.as_bytes());
        assert_eq!(title.chars().count(), 80);
        assert!(title.ends_with("..."));
    }
}
