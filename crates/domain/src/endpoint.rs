//! Industrial endpoint addresses.
//!
//! Every address that enters the system: from config, REST queries, or
//! either dispatcher envelope: goes through [`EndpointUrl::parse`], so the
//! `http://` → `opc.tcp://` caller convenience is applied in exactly one place.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;

/// Scheme prefix of the industrial protocol.
pub const OPC_TCP_SCHEME: &str = "opc.tcp://";

/// Generic web scheme accepted from callers and rewritten to [`OPC_TCP_SCHEME`].
pub const HTTP_SCHEME: &str = "http://";

/// A validated `opc.tcp://host[:port][/path]` endpoint address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EndpointUrl(String);

impl EndpointUrl {
    /// Parse and normalize a caller-supplied address.
    ///
    /// A leading `http://` is replaced by `opc.tcp://` (once, without adding
    /// whitespace). Anything else must already use the `opc.tcp://` scheme and
    /// carry a non-empty host; an explicit port must fit in a `u16`.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let normalized = match raw.strip_prefix(HTTP_SCHEME) {
            Some(rest) => format!("{OPC_TCP_SCHEME}{rest}"),
            None => raw.to_owned(),
        };

        let invalid = |reason: &str| Error::InvalidEndpoint {
            address: raw.to_owned(),
            reason: reason.to_owned(),
        };

        let rest = normalized
            .strip_prefix(OPC_TCP_SCHEME)
            .ok_or_else(|| invalid("expected an opc.tcp:// or http:// address"))?;

        let authority = rest.split('/').next().unwrap_or_default();
        if authority.is_empty() {
            return Err(invalid("missing host"));
        }
        if authority.chars().any(char::is_whitespace) {
            return Err(invalid("host must not contain whitespace"));
        }
        if let Some((host, port)) = authority.rsplit_once(':') {
            if host.is_empty() {
                return Err(invalid("missing host"));
            }
            port.parse::<u16>()
                .map_err(|_| invalid("port must be a number between 0 and 65535"))?;
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `host[:port]` segment.
    pub fn authority(&self) -> &str {
        self.0[OPC_TCP_SCHEME.len()..]
            .split('/')
            .next()
            .unwrap_or_default()
    }

    pub fn host(&self) -> &str {
        let authority = self.authority();
        authority
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(authority)
    }

    pub fn port(&self) -> Option<u16> {
        self.authority()
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
    }
}

impl fmt::Display for EndpointUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EndpointUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for EndpointUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for EndpointUrl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_opc_tcp_address() {
        let url = EndpointUrl::parse("opc.tcp://localhost:4840").unwrap();
        assert_eq!(url.as_str(), "opc.tcp://localhost:4840");
        assert_eq!(url.host(), "localhost");
        assert_eq!(url.port(), Some(4840));
    }

    #[test]
    fn rewrites_http_prefix_without_whitespace() {
        let url = EndpointUrl::parse("http://localhost:4841/lifesciences/server/").unwrap();
        assert_eq!(url.as_str(), "opc.tcp://localhost:4841/lifesciences/server/");
        assert_eq!(url.authority(), "localhost:4841");
    }

    #[test]
    fn only_the_leading_scheme_is_rewritten() {
        let url = EndpointUrl::parse("opc.tcp://gateway:4840/proxy/http://inner").unwrap();
        assert_eq!(url.as_str(), "opc.tcp://gateway:4840/proxy/http://inner");
    }

    #[test]
    fn port_is_optional() {
        let url = EndpointUrl::parse("opc.tcp://plc-7").unwrap();
        assert_eq!(url.host(), "plc-7");
        assert_eq!(url.port(), None);
    }

    #[test]
    fn rejects_other_schemes() {
        let err = EndpointUrl::parse("https://localhost:4840").unwrap_err();
        assert!(err.to_string().contains("https://localhost:4840"));
    }

    #[test]
    fn rejects_missing_host() {
        assert!(EndpointUrl::parse("opc.tcp://").is_err());
        assert!(EndpointUrl::parse("opc.tcp://:4840").is_err());
        assert!(EndpointUrl::parse("opc.tcp:///path").is_err());
    }

    #[test]
    fn rejects_bad_port() {
        assert!(EndpointUrl::parse("opc.tcp://localhost:99999").is_err());
        assert!(EndpointUrl::parse("opc.tcp://localhost:abc").is_err());
    }

    #[test]
    fn deserializes_with_normalization() {
        let url: EndpointUrl = serde_json::from_str("\"http://localhost:4842\"").unwrap();
        assert_eq!(url.as_str(), "opc.tcp://localhost:4842");
        assert!(serde_json::from_str::<EndpointUrl>("\"ftp://x\"").is_err());
    }
}
