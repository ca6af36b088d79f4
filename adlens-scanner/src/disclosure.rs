//! Fetching and unwrapping the disclosure panel behind an ad's
//! "why am I seeing this" entry.

use crate::error::{Result, ScanError};
use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Anti-hijacking prefix the host puts in front of its JSON responses.
pub const PAYLOAD_PREFIX: &str = "for (;;);";
pub const DEFAULT_BASE_URL: &str = "https://www.facebook.com";

/// Issues the disclosure request for an entry's action target.
///
/// The returned future owns everything it needs so it can be spawned and
/// outlive the extraction that started it.
pub trait DisclosureFetcher {
    fn fetch(&self, action: &str) -> BoxFuture<'static, Result<String>>;
}

impl<F: DisclosureFetcher + ?Sized> DisclosureFetcher for Arc<F> {
    fn fetch(&self, action: &str) -> BoxFuture<'static, Result<String>> {
        (**self).fetch(action)
    }
}

#[derive(Debug, Clone)]
pub struct HttpDisclosureFetcher {
    client: Client,
    base: Url,
}

impl HttpDisclosureFetcher {
    pub fn new(base: &str) -> Result<Self> {
        Self::with_timeout(base, 10)
    }

    pub fn with_timeout(base: &str, timeout_secs: u64) -> Result<Self> {
        let base = Url::parse(base)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", base, e)))?;
        let client = Client::builder()
            .user_agent(concat!("Adlens/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client, base })
    }

    /// Resolves the action target against the base and asks for the dialog
    /// form of the response.
    pub fn request_url(&self, action: &str) -> Result<Url> {
        let mut url = self
            .base
            .join(action)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", action, e)))?;
        url.query_pairs_mut()
            .append_pair("__asyncDialog", "1")
            .append_pair("__a", "1");
        Ok(url)
    }
}

impl DisclosureFetcher for HttpDisclosureFetcher {
    fn fetch(&self, action: &str) -> BoxFuture<'static, Result<String>> {
        let client = self.client.clone();
        let url = self.request_url(action);
        async move {
            let url = url?;
            debug!("Fetching disclosure {}", url);
            let response = client.get(url).send().await?.error_for_status()?;
            Ok(response.text().await?)
        }
        .boxed()
    }
}

/// Pulls the disclosure HTML out of a raw response body.
pub fn decode_payload(body: &str) -> Result<String> {
    let json = body.replacen(PAYLOAD_PREFIX, "", 1);
    let value: Value = serde_json::from_str(&json)?;
    value["jsmods"]["markup"][0][1]["__html"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ScanError::Payload("no markup at jsmods.markup[0][1].__html".to_string()))
}
