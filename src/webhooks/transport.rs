//! HTTP transport for webhook delivery.
//!
//! Builds reqwest clients with the configured timeout and user agent. A
//! proxy is chosen per call: each distinct proxy URL gets its own client,
//! built once and reused, so concurrent calls with different proxies never
//! reconfigure each other's connection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::TransportConfig;
use crate::webhooks::error::{DeliveryError, Result};

/// Shared HTTP transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    config: TransportConfig,
    direct: reqwest::Client,
    proxied: Arc<Mutex<HashMap<String, reqwest::Client>>>,
}

impl HttpTransport {
    /// Creates a transport with a direct (non-proxied) client.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Transport` if the HTTP client cannot be built.
    pub fn new(config: TransportConfig) -> Result<Self> {
        // Direct means direct: ignore HTTP_PROXY and friends
        let direct = Self::builder(&config)
            .no_proxy()
            .build()
            .map_err(DeliveryError::Transport)?;

        Ok(Self {
            config,
            direct,
            proxied: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn builder(config: &TransportConfig) -> reqwest::ClientBuilder {
        let builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
        match config.request_timeout() {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    /// Returns the client to use for a call.
    ///
    /// `None` or an empty string selects the direct client.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ProxyConfiguration` if the proxy URL is invalid
    /// or a client cannot be built around it.
    pub fn client_for(&self, proxy: Option<&str>) -> Result<reqwest::Client> {
        let proxy = match proxy {
            Some(p) if !p.is_empty() => p,
            _ => return Ok(self.direct.clone()),
        };

        let mut proxied = self.proxied.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = proxied.get(proxy) {
            return Ok(client.clone());
        }

        let proxy_error = |e: reqwest::Error| DeliveryError::ProxyConfiguration {
            proxy: proxy.to_string(),
            reason: e.to_string(),
        };
        let client = Self::builder(&self.config)
            .proxy(reqwest::Proxy::all(proxy).map_err(proxy_error)?)
            .build()
            .map_err(proxy_error)?;

        proxied.insert(proxy.to_string(), client.clone());
        tracing::debug!(
            "Built HTTP client for proxy {} ({} cached)",
            proxy,
            proxied.len()
        );
        Ok(client)
    }

    #[cfg(test)]
    fn proxied_clients(&self) -> usize {
        self.proxied.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
