//! In-memory backend used by unit tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::dvbviewer::{Query, RemoteApi};
use crate::error::{ServiceError, ServiceResult};

/// Canned responses keyed by path, with a request log
#[derive(Default)]
pub struct FakeApi {
    responses: Mutex<HashMap<String, Result<String, ServiceError>>>,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
    delay: Option<Duration>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch sleeps first, so concurrent callers overlap
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn respond(&self, path: &str, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), Ok(body.to_string()));
    }

    pub fn fail(&self, path: &str, error: ServiceError) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), Err(error));
    }

    pub fn calls(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .count()
    }

    /// Query arguments of every request to `path`, oldest first
    pub fn queries(&self, path: &str) -> Vec<HashMap<String, String>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, q)| q.iter().cloned().collect())
            .collect()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }
}

#[async_trait]
impl RemoteApi for FakeApi {
    async fn fetch(
        &self,
        path: &str,
        query: &Query,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }

        self.requests.lock().unwrap().push((
            path.to_string(),
            query
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = self.responses.lock().unwrap().get(path).cloned();
        match response {
            Some(Ok(body)) => Ok(body.into_bytes()),
            Some(Err(e)) => Err(e),
            None => Err(ServiceError::Http(404)),
        }
    }
}
