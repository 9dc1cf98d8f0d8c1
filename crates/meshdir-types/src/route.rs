//! route descriptions and validation.
//!
//! routes arrive as flat json objects with several optional fields. the
//! wire shape deserializes leniently into [`RouteInput`] so that bad
//! values reach the validator instead of dying inside serde; the http
//! layer maps validator failures to the legacy status code. a validated
//! [`Route`] is what the route store persists and serves back.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// errors from route validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// a required field is missing.
    #[error("route is missing required field '{0}'")]
    MissingField(&'static str),

    /// the ip field is not an ipv4 or ipv6 literal.
    #[error("invalid ip address: '{0}'")]
    InvalidIp(String),

    /// the port is outside [1, 65535].
    #[error("invalid port: {0}")]
    InvalidPort(i64),

    /// the scheme is neither http nor https.
    #[error("invalid scheme: '{0}'")]
    InvalidScheme(String),

    /// the type tag is neither ip nor domain.
    #[error("invalid route type: '{0}'")]
    InvalidType(String),

    /// type is domain but no domain hostname was given.
    #[error("route of type 'domain' requires a domain")]
    MissingDomain,

    /// a health check block without a path.
    #[error("health check requires a path")]
    MissingHealthCheckPath,
}

/// url scheme a route terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RouteScheme {
    /// plain http.
    Http,
    /// tls, the default.
    #[default]
    Https,
}

impl RouteScheme {
    fn parse(s: &str) -> Result<Self, RouteError> {
        match s {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(RouteError::InvalidScheme(other.to_string())),
        }
    }
}

/// endpoint kind: a bare ip endpoint or a named domain endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    /// plain ip endpoint, the default.
    #[default]
    Ip,
    /// endpoint reached through a hostname; `domain` carries the name.
    Domain,
}

impl RouteKind {
    fn parse(s: &str) -> Result<Self, RouteError> {
        match s {
            "ip" => Ok(Self::Ip),
            "domain" => Ok(Self::Domain),
            other => Err(RouteError::InvalidType(other.to_string())),
        }
    }
}

/// optional http health check attached to a route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    /// request path to probe.
    pub path: String,
    /// host header override.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub host: Option<String>,
}

/// the lenient wire form of a route.
///
/// every field is optional so that range and format problems surface as
/// validation results rather than deserialization failures.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RouteInput {
    /// endpoint address.
    #[serde(default)]
    pub ip: Option<String>,
    /// endpoint port.
    #[serde(default)]
    pub port: Option<i64>,
    /// preference; lower wins.
    #[serde(default)]
    pub priority: Option<i64>,
    /// url scheme, defaults to https.
    #[serde(default)]
    pub scheme: Option<String>,
    /// origin tag; required, governs lease replacement.
    #[serde(default)]
    pub source: Option<String>,
    /// optional health check.
    #[serde(default)]
    pub health_check: Option<HealthCheck>,
    /// endpoint kind, defaults to ip.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// hostname for domain-kind routes.
    #[serde(default)]
    pub domain: Option<String>,
}

impl RouteInput {
    /// validate the input into a [`Route`].
    pub fn validate(self) -> Result<Route, RouteError> {
        let source = match self.source.as_deref() {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => return Err(RouteError::MissingField("source")),
        };

        let ip = self.ip.ok_or(RouteError::MissingField("ip"))?;
        if ip.parse::<IpAddr>().is_err() {
            return Err(RouteError::InvalidIp(ip));
        }

        let port = self.port.ok_or(RouteError::MissingField("port"))?;
        if !(1..=65535).contains(&port) {
            return Err(RouteError::InvalidPort(port));
        }

        let priority = self.priority.ok_or(RouteError::MissingField("priority"))?;

        let scheme = match self.scheme.as_deref() {
            Some(s) => RouteScheme::parse(s)?,
            None => RouteScheme::default(),
        };

        let kind = match self.kind.as_deref() {
            Some(s) => RouteKind::parse(s)?,
            None => RouteKind::default(),
        };

        let domain = match kind {
            RouteKind::Domain => match self.domain {
                Some(d) if !d.is_empty() => Some(d),
                _ => return Err(RouteError::MissingDomain),
            },
            // a stray domain on an ip route carries no meaning; drop it
            RouteKind::Ip => None,
        };

        if let Some(hc) = &self.health_check {
            if hc.path.is_empty() {
                return Err(RouteError::MissingHealthCheckPath);
            }
        }

        Ok(Route {
            ip,
            port: port as u16,
            priority,
            scheme,
            source,
            health_check: self.health_check,
            kind,
            domain,
        })
    }
}

/// a validated route within a lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// endpoint address, ipv4 or ipv6 literal.
    pub ip: String,
    /// endpoint port.
    pub port: u16,
    /// preference; lower wins. not otherwise interpreted.
    pub priority: i64,
    /// url scheme.
    #[serde(default)]
    pub scheme: RouteScheme,
    /// origin tag governing lease replacement.
    pub source: String,
    /// optional health check.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub health_check: Option<HealthCheck>,
    /// endpoint kind.
    #[serde(rename = "type", default)]
    pub kind: RouteKind,
    /// hostname for domain-kind routes.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub domain: Option<String>,
}

impl Route {
    /// composite identity within a lease; duplicates collapse last-wins.
    pub fn dedup_key(&self) -> (String, u16, RouteScheme, RouteKind, Option<String>) {
        (
            self.ip.clone(),
            self.port,
            self.scheme,
            self.kind,
            self.domain.clone(),
        )
    }
}
