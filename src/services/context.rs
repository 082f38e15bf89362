use crate::models::UploadState;
use axum::http::{HeaderMap, Method, Uri, request::Parts};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Per-request context handed to storage sinks and to every user-supplied
/// key, bucket, destination, file name or client function.
///
/// Sink futures of one request run concurrently and share this context,
/// so the upload state sits behind a mutex. Guards must not be held across
/// an `.await`.
#[derive(Debug, Default)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    state: Mutex<UploadState>,
}

impl RequestContext {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
            state: Mutex::new(UploadState::default()),
        }
    }

    pub fn from_parts(parts: &Parts) -> Self {
        let state = parts
            .extensions
            .get::<UploadState>()
            .cloned()
            .unwrap_or_default();

        Self::new(parts.method.clone(), parts.uri.clone(), parts.headers.clone())
            .with_state(state)
    }

    pub fn with_state(self, state: UploadState) -> Self {
        Self {
            state: Mutex::new(state),
            ..self
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First value of a query string parameter.
    pub fn query(&self, name: &str) -> Option<String> {
        let query = self.uri.query().unwrap_or_default();
        serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .ok()?
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn query_map(&self) -> HashMap<String, String> {
        let query = self.uri.query().unwrap_or_default();
        serde_urlencoded::from_str(query).unwrap_or_default()
    }

    /// Locks the upload state, recovering a poisoned lock.
    pub fn state(&self) -> MutexGuard<'_, UploadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn into_state(self) -> UploadState {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
