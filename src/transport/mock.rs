//! Scripted HTTP client for unit tests

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::AUTHORIZATION;
use reqwest::Method;

use super::client::HttpClient;
use super::types::{ApiRequest, ApiResponse, RequestBody, TransportFailure};

/// What the mock saw for one request
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub json: Option<serde_json::Value>,
    pub file_len: Option<usize>,
}

/// Replays queued responses in order and records every request
#[derive(Default)]
pub struct MockHttpClient {
    responses: Mutex<VecDeque<Result<ApiResponse, TransportFailure>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: ApiResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    pub fn push_json(&self, status: u16, value: serde_json::Value) {
        self.push(ApiResponse::json(status, value));
    }

    pub fn push_failure(&self, failure: TransportFailure) {
        self.responses.lock().push_back(Err(failure));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.path.clone()).collect()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportFailure> {
        let (json, file_len) = match &request.body {
            RequestBody::Empty => (None, None),
            RequestBody::Json(value) => (Some(value.clone()), None),
            RequestBody::File { bytes, .. } => (None, Some(bytes.len())),
        };

        self.calls.lock().push(RecordedCall {
            method: request.method.clone(),
            path: request.path.clone(),
            authorization: request
                .headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            json,
            file_len,
        });

        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportFailure::Network("no response queued".to_string())))
    }
}
