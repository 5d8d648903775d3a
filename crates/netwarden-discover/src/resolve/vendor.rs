//! Manufacturer resolution from the MAC vendor prefix.

use std::time::Duration;

use async_trait::async_trait;

/// Derive the 6-hex-digit vendor prefix from the first three MAC octets.
/// Separators are stripped and the result is uppercased.
pub fn vendor_prefix(mac: &str) -> Option<String> {
    let hex: String = mac
        .chars()
        .filter(|c| *c != ':' && *c != '-')
        .collect::<String>()
        .to_uppercase();

    if hex.len() < 6 || !hex.chars().take(6).all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(hex[..6].to_string())
}

/// External vendor-lookup collaborator; substituted with a fixture in
/// tests. Lookup is best-effort: failures and timeouts yield `None` and
/// the caller degrades to "Unknown".
#[async_trait]
pub trait VendorLookup: Send + Sync {
    async fn vendor(&self, prefix: &str) -> Option<String>;
}

/// HTTP client for a macvendors-style prefix lookup service.
pub struct HttpVendorLookup {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVendorLookup {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl VendorLookup for HttpVendorLookup {
    async fn vendor(&self, prefix: &str) -> Option<String> {
        let url = format!("{}/{prefix}", self.base_url.trim_end_matches('/'));

        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => resp
                .text()
                .await
                .ok()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            Ok(resp) => {
                tracing::debug!(prefix = %prefix, status = %resp.status(), "Vendor lookup miss");
                None
            }
            Err(e) => {
                tracing::debug!(prefix = %prefix, error = %e, "Vendor lookup failed");
                None
            }
        }
    }
}
