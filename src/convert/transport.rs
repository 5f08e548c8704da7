//! HTTP seam for the conversion pipeline.
//!
//! The pipeline only needs status codes and raw body text: both services are
//! parsed tolerantly, so the transport never decodes JSON itself.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// JSON body, sent with `Content-Type: application/json`
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    /// Builder: add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header with the given name, case-insensitive.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and raw body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response (network, DNS, TLS, ...).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// `Send + Sync` on native targets, no bound on wasm32.
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSendSync: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync + ?Sized> MaybeSendSync for T {}

#[cfg(target_arch = "wasm32")]
pub trait MaybeSendSync {}
#[cfg(target_arch = "wasm32")]
impl<T: ?Sized> MaybeSendSync for T {}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait HttpTransport: MaybeSendSync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

// =============================================================================
// REQWEST
// =============================================================================

#[cfg(feature = "http")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "http")]
mod reqwest_transport {
    use async_trait::async_trait;
    use reqwest::Client;

    use super::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};

    impl From<reqwest::Error> for TransportError {
        fn from(e: reqwest::Error) -> Self {
            TransportError(e.to_string())
        }
    }

    /// [`HttpTransport`] backed by a shared [`reqwest::Client`].
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestTransport {
        client: Client,
    }

    impl ReqwestTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Reuse an existing client (connection pooling, custom TLS, proxies).
        pub fn with_client(client: Client) -> Self {
            Self { client }
        }
    }

    #[cfg_attr(not(target_arch = "wasm32"), async_trait)]
    #[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
    impl HttpTransport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let mut builder = match request.method {
                HttpMethod::Get => self.client.get(&request.url),
                HttpMethod::Post => self.client.post(&request.url),
            };
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let resp = builder.send().await?;
            let status = resp.status().as_u16();
            let body = resp.text().await?;
            Ok(HttpResponse { status, body })
        }
    }
}

// =============================================================================
// FETCH
// =============================================================================

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub use self::fetch_transport::FetchTransport;

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
mod fetch_transport {
    use async_trait::async_trait;
    use wasm_bindgen::{JsCast, JsValue};
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{Headers, Request, RequestInit, Response};

    use super::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};

    impl From<JsValue> for TransportError {
        fn from(e: JsValue) -> Self {
            TransportError(e.as_string().unwrap_or_else(|| format!("{e:?}")))
        }
    }

    /// [`HttpTransport`] over the page's `fetch`.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct FetchTransport;

    impl FetchTransport {
        pub fn new() -> Self {
            Self
        }
    }

    #[async_trait(?Send)]
    impl HttpTransport for FetchTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let headers = Headers::new()?;
            for (name, value) in &request.headers {
                headers.set(name, value)?;
            }

            let init = RequestInit::new();
            match request.method {
                HttpMethod::Get => init.set_method("GET"),
                HttpMethod::Post => init.set_method("POST"),
            }
            if let Some(body) = &request.body {
                headers.set("Content-Type", "application/json")?;
                init.set_body(&JsValue::from_str(&body.to_string()));
            }
            init.set_headers(&headers);

            let window = web_sys::window().ok_or_else(|| TransportError("fetch needs a window".into()))?;
            let req = Request::new_with_str_and_init(&request.url, &init)?;
            let resp: Response = JsFuture::from(window.fetch_with_request(&req)).await?.dyn_into()?;
            let status = resp.status();
            let body = JsFuture::from(resp.text()?).await?;
            Ok(HttpResponse::new(status, body.as_string().unwrap_or_default()))
        }
    }
}

// =============================================================================
// TEST SUPPORT
// =============================================================================
