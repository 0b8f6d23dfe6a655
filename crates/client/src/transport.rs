// crates/client/src/transport.rs
//! Transport abstraction between the reconciler and the server.
//!
//! The reconciler only knows `subscribe` (push) and `poll` (pull); keeping
//! both behind one trait is what lets the push/poll state machine stay
//! transport-agnostic and run against a fake in tests.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use uuid::Uuid;

use ragline_core::{JobFrame, JobRecord, SseDecoder, TransportError};

/// Stream of decoded push-channel frames.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<JobFrame, TransportError>> + Send>>;

/// Push subscription plus point-in-time polling for one job server.
#[async_trait]
pub trait JobTransport: Send + Sync {
    /// Open the push channel for a job. The stream yields every frame the
    /// server sends; it ends when the server closes the connection.
    async fn subscribe(&self, job_id: Uuid) -> Result<FrameStream, TransportError>;

    /// Fetch the current job snapshot.
    async fn poll(&self, job_id: Uuid) -> Result<JobRecord, TransportError>;
}

/// HTTP implementation against the ragline server API.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn job_url(&self, job_id: Uuid) -> String {
        format!("{}/api/jobs/{job_id}", self.base_url)
    }

    /// POST a JSON body and parse the JSON response.
    pub(crate) async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, TransportError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::PollFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TransportError::PollFailed(format!(
                "status {} for {path}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| TransportError::PollFailed(e.to_string()))
    }

    /// POST a JSON body and return the raw response byte stream.
    pub(crate) async fn post_stream(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<impl Stream<Item = reqwest::Result<bytes::Bytes>> + Unpin, TransportError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::PushFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| TransportError::PushFailed(e.to_string()))?;
        Ok(response.bytes_stream())
    }
}

#[async_trait]
impl JobTransport for HttpTransport {
    async fn subscribe(&self, job_id: Uuid) -> Result<FrameStream, TransportError> {
        let url = format!("{}/stream", self.job_url(job_id));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::PushFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| TransportError::PushFailed(e.to_string()))?;

        let mut chunks = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            while let Some(chunk) = chunks.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(TransportError::PushFailed(e.to_string()));
                        return;
                    }
                };
                for payload in decoder.feed(&chunk) {
                    match serde_json::from_str::<JobFrame>(&payload) {
                        Ok(frame) => yield Ok(frame),
                        Err(e) => {
                            yield Err(TransportError::MalformedFrame(e.to_string()));
                            return;
                        }
                    }
                }
            }
            // Connection closed; a frame cut off mid-line is a dropped
            // transport, not a clean close.
            if decoder.has_partial() {
                yield Err(TransportError::UnexpectedEof);
            }
        };
        Ok(Box::pin(stream))
    }

    async fn poll(&self, job_id: Uuid) -> Result<JobRecord, TransportError> {
        let response = self
            .client
            .get(self.job_url(job_id))
            .send()
            .await
            .map_err(|e| TransportError::PollFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::PollFailed(format!(
                "status {} for job {job_id}",
                response.status()
            )));
        }
        response
            .json::<JobRecord>()
            .await
            .map_err(|e| TransportError::PollFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let transport = HttpTransport::new("http://localhost:8000/");
        let id = Uuid::new_v4();
        assert_eq!(
            transport.job_url(id),
            format!("http://localhost:8000/api/jobs/{id}")
        );
    }
}
