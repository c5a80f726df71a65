// Client IP geolocation
//
// Reserved and private ranges never reach the lookup service; they resolve to the
// literal "bogon". A lookup with no answer resolves to "not available".

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::traits::GeoLocator;

pub const BOGON: &str = "bogon";
pub const NOT_AVAILABLE: &str = "not available";

const DEFAULT_IPINFO_URL: &str = "https://ipinfo.io";

/// (network, prefix length)
const BOGON_V4: &[([u8; 4], u32)] = &[
    ([0, 0, 0, 0], 8),
    ([10, 0, 0, 0], 8),
    ([100, 64, 0, 0], 10),
    ([127, 0, 0, 0], 8),
    ([169, 254, 0, 0], 16),
    ([172, 16, 0, 0], 12),
    ([192, 0, 0, 0], 24),
    ([192, 0, 2, 0], 24),
    ([192, 168, 0, 0], 16),
    ([198, 18, 0, 0], 15),
    ([198, 51, 100, 0], 24),
    ([203, 0, 113, 0], 24),
    ([224, 0, 0, 0], 4),
    ([240, 0, 0, 0], 4),
];

const BOGON_V6: &[([u16; 8], u32)] = &[
    ([0, 0, 0, 0, 0, 0, 0, 0], 128),
    ([0, 0, 0, 0, 0, 0, 0, 1], 128),
    ([0x100, 0, 0, 0, 0, 0, 0, 0], 64),
    ([0x2001, 0xdb8, 0, 0, 0, 0, 0, 0], 32),
    ([0xfc00, 0, 0, 0, 0, 0, 0, 0], 7),
    ([0xfe80, 0, 0, 0, 0, 0, 0, 0], 10),
    ([0xfec0, 0, 0, 0, 0, 0, 0, 0], 10),
    ([0xff00, 0, 0, 0, 0, 0, 0, 0], 8),
];

fn in_v4(ip: Ipv4Addr, network: [u8; 4], prefix: u32) -> bool {
    let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
    u32::from(ip) & mask == u32::from(Ipv4Addr::from(network)) & mask
}

fn in_v6(ip: Ipv6Addr, network: [u16; 8], prefix: u32) -> bool {
    let mask = u128::MAX.checked_shl(128 - prefix).unwrap_or(0);
    u128::from(ip) & mask == u128::from(Ipv6Addr::from(network)) & mask
}

/// True for addresses in private, reserved or documentation ranges
pub fn is_bogon(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => BOGON_V4.iter().any(|(net, prefix)| in_v4(v4, *net, *prefix)),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_bogon(IpAddr::V4(v4)),
            None => BOGON_V6.iter().any(|(net, prefix)| in_v6(v6, *net, *prefix)),
        },
    }
}

/// Country label for a client address
pub async fn resolve_country(ip: IpAddr, locator: &dyn GeoLocator) -> Result<String> {
    if is_bogon(ip) {
        debug!(ip = %ip, "bogon address, skipping lookup");
        return Ok(BOGON.to_string());
    }
    Ok(locator
        .lookup_country(ip)
        .await?
        .unwrap_or_else(|| NOT_AVAILABLE.to_string()))
}

// ============================================================================
// IpInfoClient - ipinfo.io country lookups
// ============================================================================

/// Geolocator backed by the ipinfo.io `/{ip}/country` endpoint
#[derive(Clone)]
pub struct IpInfoClient {
    client: Client,
    token: String,
    base_url: String,
}

impl IpInfoClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, DEFAULT_IPINFO_URL)
    }

    /// Point at a different ipinfo-compatible host
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create from the IPINFO_TOKEN environment variable
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("IPINFO_TOKEN")
            .map_err(|_| IngestError::config("IPINFO_TOKEN environment variable not set"))?;
        Ok(match std::env::var("IPINFO_BASE_URL") {
            Ok(base_url) => Self::with_base_url(token, base_url),
            Err(_) => Self::new(token),
        })
    }
}

#[async_trait]
impl GeoLocator for IpInfoClient {
    async fn lookup_country(&self, ip: IpAddr) -> Result<Option<String>> {
        let response = self
            .client
            .get(format!("{}/{}/country", self.base_url, ip))
            .query(&[("token", &self.token)])
            .send()
            .await
            .map_err(|e| IngestError::geolocation(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(IngestError::geolocation(format!(
                "ipinfo error ({}): {}",
                status, error_text
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| IngestError::geolocation(format!("Failed to read response: {}", e)))?;
        let country = body.trim();
        if country.is_empty() || country.eq_ignore_ascii_case("undefined") {
            return Ok(None);
        }
        Ok(Some(country.to_string()))
    }
}
