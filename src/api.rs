use crate::{
    config::{
        ApiConfig,
        UPGRADE_PRODUCT_ID,
    },
    monitor::{
        NoopObserver,
        RequestObserver,
        RequestRecord,
        ResponseRecord,
    },
    snapshot::AccountSnapshot,
};
use reqwest::{
    RequestBuilder,
    StatusCode,
    header::{
        CONTENT_TYPE,
        COOKIE,
        HeaderMap,
        HeaderValue,
        InvalidHeaderValue,
    },
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    future::Future,
    sync::Arc,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("invalid session cookie: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("invalid account payload from {url}: {source}")]
    Malformed {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub amount: u64,
}

/// Body of `POST /purchase`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub product: Product,
}

impl PurchaseRequest {
    pub fn upgrade(amount: u64) -> Self {
        Self {
            product: Product {
                id: UPGRADE_PRODUCT_ID,
                amount,
            },
        }
    }
}

/// Remote account endpoints the helper depends on.
pub trait AccountApi: Send + Sync {
    /// `GET /me`
    fn status(&self) -> impl Future<Output = Result<AccountSnapshot, ApiError>> + Send;

    /// `POST /purchase`; any non-success status is an [`ApiError::Status`].
    fn purchase(
        &self,
        request: &PurchaseRequest,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

#[derive(Clone)]
pub struct HttpAccountApi {
    base_url: String,
    http: reqwest::Client,
    observer: Arc<dyn RequestObserver>,
}

impl HttpAccountApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.cookie {
            let mut value = HeaderValue::from_str(cookie)?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }
        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("charge-helper/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ApiError::Client)?;
        Ok(Self {
            base_url,
            http,
            observer: Arc::new(NoopObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn RequestObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        method: &'static str,
        url: &str,
        request: RequestBuilder,
    ) -> Result<(StatusCode, Vec<u8>), ApiError> {
        let record = RequestRecord { method, url };
        self.observer.on_request(&record);

        let res = match request.send().await {
            Ok(res) => res,
            Err(source) => {
                self.observer.on_failure(&record, &source.to_string());
                return Err(ApiError::Transport {
                    url: url.to_string(),
                    source,
                });
            }
        };
        let status = res.status();
        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = match res.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(source) => {
                self.observer.on_failure(&record, &source.to_string());
                return Err(ApiError::Transport {
                    url: url.to_string(),
                    source,
                });
            }
        };
        self.observer.on_response(&ResponseRecord {
            method,
            url,
            status: status.as_u16(),
            content_type: content_type.as_deref(),
            body: &body,
        });
        Ok((status, body))
    }

    fn ensure_success(url: &str, status: StatusCode, body: &[u8]) -> Result<(), ApiError> {
        if status.is_success() {
            return Ok(());
        }
        Err(ApiError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: String::from_utf8_lossy(body).into_owned(),
        })
    }
}

impl AccountApi for HttpAccountApi {
    async fn status(&self) -> Result<AccountSnapshot, ApiError> {
        let url = format!("{}/me", self.base_url);
        let (status, body) = self.send("GET", &url, self.http.get(&url)).await?;
        Self::ensure_success(&url, status, &body)?;
        serde_json::from_slice(&body).map_err(|source| ApiError::Malformed { url, source })
    }

    async fn purchase(&self, request: &PurchaseRequest) -> Result<(), ApiError> {
        let url = format!("{}/purchase", self.base_url);
        let (status, body) = self
            .send("POST", &url, self.http.post(&url).json(request))
            .await?;
        Self::ensure_success(&url, status, &body)
    }
}
