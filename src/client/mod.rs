//! HTTP client for the admin API.
//!
//! [`ApiClient`] wraps `reqwest`, unwraps the `{ ok, mensaje, data }`
//! envelope and turns any non-2xx answer into [`ClientError::Api`] carrying
//! the server's message. The typed service functions in [`services`] emit a
//! [`DataEvent`](crate::events::DataEvent) on the client's bus after every
//! confirmed change.

pub mod services;

use crate::events::EventBus;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Error de conexión: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx answer; `mensaje` is the server's own message
    #[error("{mensaje}")]
    Api {
        status: u16,
        mensaje: String,
        errores: Option<BTreeMap<String, String>>,
    },

    #[error("Respuesta no válida: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            ClientError::Decode(_) => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Deserialize)]
struct SuccessEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct FailureEnvelope {
    mensaje: Option<String>,
    errores: Option<BTreeMap<String, String>>,
}

/// Client for one admin API server.
///
/// Cheap to clone; clones share the connection pool, the session token and
/// the event bus.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
    bus: EventBus,
}

impl ApiClient {
    /// `base_url` without the `/api` suffix, e.g. `http://localhost:3000`
    pub fn new(base_url: impl Into<String>, bus: EventBus) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
            bus,
        })
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    pub fn set_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = token;
        }
    }

    /// Send a request and return the envelope's `data`
    pub(crate) async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ClientResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method.clone(), &url);
        if let Some(token) = self.token() {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%method, path, status = status.as_u16(), "API call");

        if !status.is_success() {
            let failure = serde_json::from_str::<FailureEnvelope>(&text).ok();
            let (mensaje, errores) = match failure {
                Some(f) => (f.mensaje, f.errores),
                None => (None, None),
            };
            return Err(ClientError::Api {
                status: status.as_u16(),
                mensaje: mensaje.unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Error del servidor")
                        .to_string()
                }),
                errores,
            });
        }

        serde_json::from_str::<SuccessEnvelope<T>>(&text)
            .map(|envelope| envelope.data)
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.request(Method::GET, path, None).await
    }

    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> ClientResult<T> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub(crate) async fn put<T: DeserializeOwned>(&self, path: &str, body: &Value) -> ClientResult<T> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub(crate) async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.request(Method::DELETE, path, None).await
    }
}
