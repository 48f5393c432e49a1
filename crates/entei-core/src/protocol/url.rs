//! `ws://` endpoint parsing.
//!
//! Accepted shape: `ws://host[:port][/path][?query]`. The host is restricted to
//! `[A-Za-z0-9.-]` (no IPv6 literals, no userinfo). `wss://` is recognized but
//! rejected with its own reason since this client speaks plain TCP only.

use crate::error::UrlError;

/// Default port for `ws://`.
pub const DEFAULT_WS_PORT: u16 = 80;

/// Parsed connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Request target for the upgrade line (path plus query, always starts with `/`).
    pub path: String,
}

impl Endpoint {
    /// Parse a WebSocket URL.
    pub fn parse(url: &str) -> Result<Self, UrlError> {
        let url = url.trim();
        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(UrlError::MissingScheme);
        };
        match scheme.to_ascii_lowercase().as_str() {
            "ws" => {}
            "wss" => return Err(UrlError::SecureSchemeUnsupported),
            other => return Err(UrlError::UnsupportedScheme(other.to_string())),
        }

        let split = rest.find(['/', '?']).unwrap_or(rest.len());
        let (authority, target) = rest.split_at(split);

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, parse_port(port)?),
            None => (authority, DEFAULT_WS_PORT),
        };
        validate_host(host)?;

        let path = if target.is_empty() {
            "/".to_string()
        } else if target.starts_with('?') {
            format!("/{target}")
        } else {
            target.to_string()
        };

        Ok(Self {
            host: host.to_string(),
            port,
            path,
        })
    }

    /// `host:port` for address resolution.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Value of the `Host` header (port omitted when it is the default).
    pub fn host_header(&self) -> String {
        if self.port == DEFAULT_WS_PORT {
            self.host.clone()
        } else {
            self.socket_addr()
        }
    }
}

fn parse_port(s: &str) -> Result<u16, UrlError> {
    if s.is_empty() || s.len() > 5 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(UrlError::InvalidPort(s.to_string()));
    }
    match s.parse::<u32>() {
        Ok(p) if (1..=65535).contains(&p) => Ok(p as u16),
        _ => Err(UrlError::InvalidPort(s.to_string())),
    }
}

fn validate_host(host: &str) -> Result<(), UrlError> {
    let bad = || UrlError::InvalidHost(host.to_string());

    if host.is_empty() {
        return Err(bad());
    }
    if !host
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
    {
        return Err(bad());
    }
    if host.starts_with(['.', '-']) || host.ends_with(['.', '-']) {
        return Err(bad());
    }
    if host.contains("..") {
        return Err(bad());
    }
    Ok(())
}
