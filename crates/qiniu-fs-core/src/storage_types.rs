use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// URL scheme used when building download URLs
///
/// Configuration accepts the scheme name or, for older configurations, a
/// boolean where `true` selects https and `false` selects http.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProtocolValue", rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProtocolValue {
    Flag(bool),
    Name(String),
}

impl TryFrom<ProtocolValue> for Protocol {
    type Error = anyhow::Error;

    fn try_from(value: ProtocolValue) -> Result<Self, Self::Error> {
        match value {
            ProtocolValue::Flag(secure) => Ok(Protocol::from(secure)),
            ProtocolValue::Name(name) => name.parse(),
        }
    }
}

impl From<bool> for Protocol {
    fn from(secure: bool) -> Self {
        if secure {
            Protocol::Https
        } else {
            Protocol::Http
        }
    }
}

impl FromStr for Protocol {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            "true" => Ok(Protocol::Https),
            "false" => Ok(Protocol::Http),
            _ => Err(anyhow::anyhow!("Invalid protocol: {}", s)),
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
        }
    }
}

/// Split a configured domain into host (with optional sub-path) and scheme.
///
/// `"https://cdn.example.com/assets/"` becomes `("cdn.example.com/assets", Some(Https))`;
/// a bare host yields no scheme.
pub fn normalize_domain(domain: &str) -> Result<(String, Option<Protocol>), anyhow::Error> {
    let trimmed = domain.trim();
    let (rest, protocol) = match trimmed.find("://") {
        Some(idx) => {
            let protocol: Protocol = trimmed[..idx].parse()?;
            (&trimmed[idx + 3..], Some(protocol))
        }
        None => (trimmed, None),
    };

    let host = rest.trim_matches('/');
    if host.is_empty() || host.starts_with('/') {
        return Err(anyhow::anyhow!("Domain has no host: {:?}", domain));
    }

    Ok((host.to_string(), protocol))
}
