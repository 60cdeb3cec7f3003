//! HTTP client wrapper for metadata requests.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Url};
use tokio::net::{lookup_host, TcpStream};

use crate::error::ProbeError;

/// HTTP client wrapper for metadata service requests.
///
/// Each probe builds its own; nothing is pooled across probes or calls.
#[derive(Debug, Clone)]
pub(crate) struct MetadataClient {
    inner: Client,
    base_url: String,
    host: String,
    port: u16,
}

impl MetadataClient {
    /// Create a new metadata client with the specified request timeout and base URL.
    pub(crate) fn new(timeout: Duration, base_url: &str) -> Result<Self, ProbeError> {
        let base_url = base_url.trim_end_matches('/');
        let url = Url::parse(base_url).map_err(|e| ProbeError::InvalidBaseUrl(e.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| ProbeError::InvalidBaseUrl(format!("{base_url}: missing host")))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = url.port_or_known_default().unwrap_or(80);

        let inner = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner,
            base_url: base_url.to_string(),
            host,
            port,
        })
    }

    /// Get the base URL.
    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Open and immediately drop a TCP connection to the metadata host.
    pub(crate) async fn check_connectivity(&self, timeout: Duration) -> Result<(), ProbeError> {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match tokio::time::timeout(timeout, connect).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(ProbeError::Connect(e)),
            Err(_) => Err(ProbeError::Timeout),
        }
    }

    /// Resolve the metadata hostname without connecting to it.
    pub(crate) async fn resolve(&self, timeout: Duration) -> Result<(), ProbeError> {
        let lookup = lookup_host((self.host.as_str(), self.port));
        let mut addrs = match tokio::time::timeout(timeout, lookup).await {
            Ok(result) => result.map_err(ProbeError::Resolve)?,
            Err(_) => return Err(ProbeError::Timeout),
        };
        if addrs.next().is_none() {
            return Err(ProbeError::Resolve(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} has no addresses", self.host),
            )));
        }
        Ok(())
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.inner.get(format!("{}{}", self.base_url, path))
    }

    pub(crate) fn put(&self, path: &str) -> RequestBuilder {
        self.inner.put(format!("{}{}", self.base_url, path))
    }
}

/// Send a request and return the body of a successful response.
pub(crate) async fn send(request: RequestBuilder) -> Result<Vec<u8>, ProbeError> {
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProbeError::Http(status.as_u16()));
    }

    Ok(response.bytes().await?.to_vec())
}

/// Send a request and return the successful response body as trimmed text.
pub(crate) async fn send_text(request: RequestBuilder) -> Result<String, ProbeError> {
    let body = send(request).await?;
    let text = String::from_utf8(body).map_err(|_| ProbeError::Utf8)?;
    Ok(text.trim().to_string())
}
