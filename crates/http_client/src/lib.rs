//! A single pooled HTTP client capability shared by the repository and
//! search-engine clients.
//!
//! Modeled after the teacher's `cached_http_client_inner`: one `reqwest`
//! client is built once and reused for connection pooling, instead of a
//! bare-OIDC one-purpose client. The two authentication modes the bridge
//! needs (shared secret header vs. mutual TLS) are expressed as a single
//! `Transport` capability with a request-signing hook, per the design notes
//! on avoiding an inheritance-shaped client hierarchy.

use std::time::Duration;

use reqwest::{
    Certificate,
    Client,
    ClientBuilder,
    Identity,
    RequestBuilder,
};
use serde::{
    de::DeserializeOwned,
    Serialize,
};
use thiserror::Error;

/// Authentication mode for a `Transport`, selected by configuration.
#[derive(Clone)]
pub enum AuthMode {
    /// Every request carries a fixed `header: secret` pair.
    Secret { header: String, secret: String },
    /// The client presents a keystore identity and trusts a truststore;
    /// TLS handles authentication, so no extra header is sent.
    MutualTls,
}

/// Settings needed to build a `reqwest::Client` configured for mutual TLS.
pub struct TlsMaterial {
    /// PKCS#12-encoded client identity (keystore contents).
    pub identity_pkcs12: Vec<u8>,
    pub identity_password: String,
    /// PEM-encoded CA certificate to trust (truststore contents).
    pub root_cert_pem: Option<Vec<u8>>,
}

/// Transport-level failure: network, TLS handshake, or non-2xx response.
/// Callers treat every variant as retriable on the next cycle.
#[derive(Error, Debug)]
#[error("transport error calling {path}: {source}")]
pub struct TransportError {
    pub path: String,
    #[source]
    pub source: anyhow::Error,
}

/// A pooled HTTP client bound to one base URL and one auth mode.
///
/// Connections are reused across calls because `reqwest::Client` keeps its
/// own internal connection pool; we build it once per `Transport` and clone
/// the `Arc`-backed client cheaply for every request.
#[derive(Clone)]
pub struct Transport {
    client: Client,
    base_url: String,
    auth: AuthMode,
}

impl Transport {
    pub fn new(base_url: impl Into<String>, auth: AuthMode) -> anyhow::Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            auth,
        })
    }

    pub fn with_tls_material(
        base_url: impl Into<String>,
        auth: AuthMode,
        tls: TlsMaterial,
    ) -> anyhow::Result<Self> {
        let identity = Identity::from_pkcs12_der(&tls.identity_pkcs12, &tls.identity_password)?;
        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_secs(60))
            .identity(identity);
        if let Some(pem) = tls.root_cert_pem {
            builder = builder.add_root_certificate(Certificate::from_pem(&pem)?);
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            auth,
        })
    }

    /// The single request-signing hook the design notes call for: applies
    /// whatever the selected `AuthMode` requires before the request is sent.
    fn sign(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            AuthMode::Secret { header, secret } => builder.header(header.as_str(), secret.clone()),
            AuthMode::MutualTls => builder,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, TransportError> {
        self.execute(self.sign(self.client.get(self.url(path))), path).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        let bytes = self.get_bytes(path).await?;
        serde_json::from_slice(&bytes).map_err(|e| TransportError {
            path: path.to_string(),
            source: anyhow::Error::new(e).context("decoding JSON response"),
        })
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, TransportError> {
        let request = self.sign(self.client.post(self.url(path)).json(body));
        let bytes = self.execute(request, path).await?;
        serde_json::from_slice(&bytes).map_err(|e| TransportError {
            path: path.to_string(),
            source: anyhow::Error::new(e).context("decoding JSON response"),
        })
    }

    /// Posts a raw body under an explicit content type, for wire formats
    /// `reqwest::RequestBuilder::json` doesn't produce, e.g. the bulk API's
    /// newline-delimited JSON.
    pub async fn post_raw<T: DeserializeOwned>(
        &self,
        path: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<T, TransportError> {
        let request = self.sign(
            self.client
                .post(self.url(path))
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body),
        );
        let bytes = self.execute(request, path).await?;
        serde_json::from_slice(&bytes).map_err(|e| TransportError {
            path: path.to_string(),
            source: anyhow::Error::new(e).context("decoding JSON response"),
        })
    }

    pub async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, TransportError> {
        let request = self.sign(self.client.put(self.url(path)).json(body));
        let bytes = self.execute(request, path).await?;
        serde_json::from_slice(&bytes).map_err(|e| TransportError {
            path: path.to_string(),
            source: anyhow::Error::new(e).context("decoding JSON response"),
        })
    }

    pub async fn head_ok(&self, path: &str) -> Result<bool, TransportError> {
        let request = self.sign(self.client.head(self.url(path)));
        let response = request.send().await.map_err(|e| TransportError {
            path: path.to_string(),
            source: e.into(),
        })?;
        Ok(response.status().is_success())
    }

    async fn execute(&self, request: RequestBuilder, path: &str) -> Result<Vec<u8>, TransportError> {
        let response = request.send().await.map_err(|e| TransportError {
            path: path.to_string(),
            source: e.into(),
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError {
                path: path.to_string(),
                source: anyhow::anyhow!("non-2xx response {status}: {body}"),
            });
        }
        response.bytes().await.map(|b| b.to_vec()).map_err(|e| TransportError {
            path: path.to_string(),
            source: e.into(),
        })
    }
}
