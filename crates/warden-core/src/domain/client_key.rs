use std::fmt;

use super::InboundRequest;

const FORWARDED_FOR: &str = "x-forwarded-for";
/// Single-address headers, checked in order after `x-forwarded-for`.
const REAL_IP_HEADERS: [&str; 2] = ["x-real-ip", "cf-connecting-ip"];

/// Rate limiting identity of a client.
///
/// Derivation order is fixed: explicit user id, then the first
/// `x-forwarded-for` entry, then `x-real-ip` / `cf-connecting-ip`, then the
/// shared `ip:unknown` bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn user(id: &str) -> Self {
        Self(format!("user:{}", id))
    }

    pub fn ip(addr: &str) -> Self {
        Self(format!("ip:{}", addr))
    }

    pub fn unknown() -> Self {
        Self::ip("unknown")
    }

    pub fn derive(request: &InboundRequest, user_hint: Option<&str>) -> Self {
        if let Some(id) = user_hint.map(str::trim).filter(|id| !id.is_empty()) {
            return Self::user(id);
        }

        let forwarded = request
            .header(FORWARDED_FOR)
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(addr) = forwarded {
            return Self::ip(addr);
        }

        REAL_IP_HEADERS
            .iter()
            .filter_map(|name| request.header(name))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(Self::ip)
            .unwrap_or_else(Self::unknown)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClientKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
