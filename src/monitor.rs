use serde_json::Value;
use tracing::{
    info,
    warn,
};

#[derive(Clone, Copy, Debug)]
pub struct RequestRecord<'a> {
    pub method: &'a str,
    pub url: &'a str,
}

#[derive(Clone, Copy, Debug)]
pub struct ResponseRecord<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub status: u16,
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
}

/// Hooks invoked around every request the account client sends.
///
/// Exactly one of `on_response` or `on_failure` follows each `on_request`.
/// Observers only watch; they cannot alter the exchange.
pub trait RequestObserver: Send + Sync {
    fn on_request(&self, request: &RequestRecord<'_>);
    fn on_response(&self, response: &ResponseRecord<'_>);
    fn on_failure(&self, request: &RequestRecord<'_>, error: &str);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl RequestObserver for NoopObserver {
    fn on_request(&self, _request: &RequestRecord<'_>) {}
    fn on_response(&self, _response: &ResponseRecord<'_>) {}
    fn on_failure(&self, _request: &RequestRecord<'_>, _error: &str) {}
}

#[derive(Debug, PartialEq)]
pub enum BodyInspection {
    NotJson,
    Json(Value),
    Malformed(String),
}

/// Inspects a response body the way the monitor reports it: only bodies
/// declared as JSON are parsed.
pub fn inspect_body(content_type: Option<&str>, body: &[u8]) -> BodyInspection {
    let is_json = content_type.is_some_and(|ct| ct.contains("application/json"));
    if !is_json {
        return BodyInspection::NotJson;
    }
    match serde_json::from_slice(body) {
        Ok(value) => BodyInspection::Json(value),
        Err(err) => BodyInspection::Malformed(err.to_string()),
    }
}

/// Logs requests whose URL contains a keyword, case-insensitively.
#[derive(Clone, Debug)]
pub struct TracingObserver {
    keyword: String,
}

impl TracingObserver {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into().to_lowercase(),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        url.to_lowercase().contains(&self.keyword)
    }
}

impl RequestObserver for TracingObserver {
    fn on_request(&self, request: &RequestRecord<'_>) {
        if !self.matches(request.url) {
            return;
        }
        info!(
            keyword = %self.keyword,
            method = request.method,
            url = request.url,
            "request intercepted"
        );
    }

    fn on_response(&self, response: &ResponseRecord<'_>) {
        if !self.matches(response.url) {
            return;
        }
        match inspect_body(response.content_type, response.body) {
            BodyInspection::NotJson => {}
            BodyInspection::Json(body) => info!(
                keyword = %self.keyword,
                method = response.method,
                url = response.url,
                status = response.status,
                content_type = response.content_type.unwrap_or_default(),
                %body,
                "response intercepted"
            ),
            BodyInspection::Malformed(err) => warn!(
                keyword = %self.keyword,
                url = response.url,
                %err,
                "failed to parse intercepted response"
            ),
        }
    }

    fn on_failure(&self, request: &RequestRecord<'_>, error: &str) {
        if !self.matches(request.url) {
            return;
        }
        warn!(
            keyword = %self.keyword,
            method = request.method,
            url = request.url,
            error,
            "intercepted request failed"
        );
    }
}
