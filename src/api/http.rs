// api/http.rs: reqwest adapter for the breakdown server

use super::types::ErrorBody;
use super::{
    ApiError, Backend, ByteStream, ContextNotesResponse, GenerationRequest, Persona,
    PersonasResponse, SavedId, TocResponse, TranscriptResponse,
};
use crate::deck::{DeckResponse, ExpressionRecord, SavedExpression};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

pub struct HttpBackend {
    client: Client,
    /// Separate client without a total timeout: streams stay open for minutes.
    stream_client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {}", e)))?;
        let stream_client = Client::builder()
            .connect_timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        tracing::info!("Backend client initialized: {}", base_url);

        Ok(Self {
            client,
            stream_client,
            base_url,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B, fallback: &str) -> Result<T, ApiError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        let response = check_status(response, fallback).await?;
        Ok(response.json().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, fallback: &str) -> Result<T, ApiError> {
        let response = self.client.get(self.url(path)).send().await?;
        let response = check_status(response, fallback).await?;
        Ok(response.json().await?)
    }
}

/// Maps a non-success response to `ApiError::Status`, reading `{detail}` when present.
async fn check_status(response: Response, fallback: &str) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.detail)
        .filter(|detail| !detail.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());

    tracing::warn!("Backend returned HTTP {}: {}", status, detail);
    Err(ApiError::Status {
        status: status.as_u16(),
        detail,
    })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn transcript(&self, url: &str) -> Result<TranscriptResponse, ApiError> {
        let response = self
            .client
            .get(self.url("/api/transcript"))
            .query(&[("url", url)])
            .send()
            .await?;
        let response = check_status(response, "Failed to fetch transcript").await?;
        let transcript: TranscriptResponse = response.json().await?;

        tracing::info!(
            "Transcript loaded: video={}, segments={}",
            transcript.video_id,
            transcript.segments.len()
        );
        Ok(transcript)
    }

    async fn personas(&self) -> Result<Vec<Persona>, ApiError> {
        let body: PersonasResponse = self
            .get_json("/api/personas", "Failed to fetch personas")
            .await?;
        Ok(body.personas)
    }

    async fn generate_toc(&self, request: &GenerationRequest) -> Result<TocResponse, ApiError> {
        self.post_json("/api/generate-toc", request, "ToC generation failed")
            .await
    }

    async fn generate_context_notes(
        &self,
        request: &GenerationRequest,
    ) -> Result<ContextNotesResponse, ApiError> {
        self.post_json(
            "/api/generate-context-notes",
            request,
            "Context notes generation failed",
        )
        .await
    }

    async fn open_stream(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<ByteStream, ApiError> {
        tracing::debug!("Opening stream {}", path);

        let response = self
            .stream_client
            .post(self.url(path))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await?;
        let response = check_status(response, "Stream request failed").await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ApiError::Body(e.to_string())))
            .boxed())
    }

    async fn save_expression(&self, record: &ExpressionRecord) -> Result<SavedId, ApiError> {
        let saved: SavedId = self
            .post_json("/api/deck/save", record, "Failed to save expression")
            .await?;
        tracing::info!("Saved '{}' to deck (id={})", record.phrase, saved.id);
        Ok(saved)
    }

    async fn deck(&self) -> Result<Vec<SavedExpression>, ApiError> {
        let body: DeckResponse = self.get_json("/api/deck", "Failed to load deck").await?;
        Ok(body.expressions)
    }

    async fn delete_expression(&self, id: i64) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url(&format!("/api/deck/{}", id)))
            .send()
            .await?;
        check_status(response, "Expression not found").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HIGHLIGHTS_STREAM_PATH;
    use crate::sse::{SseDecoder, SseFrame};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> HttpBackend {
        HttpBackend::new(&server.uri(), 5).unwrap()
    }

    #[tokio::test]
    async fn error_detail_is_read_from_the_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/transcript"))
            .and(query_param("url", "https://youtu.be/abc"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "No transcript available"})),
            )
            .mount(&server)
            .await;

        let err = backend_for(&server)
            .transcript("https://youtu.be/abc")
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(matches!(err, ApiError::Status { ref detail, .. } if detail == "No transcript available"));
    }

    #[tokio::test]
    async fn non_json_error_body_uses_the_fallback_detail() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/deck/9"))
            .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
            .mount(&server)
            .await;

        let err = backend_for(&server).delete_expression(9).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Status { status: 404, ref detail } if detail == "Expression not found"
        ));
    }

    #[tokio::test]
    async fn stream_with_error_status_is_an_error_not_an_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(HIGHLIGHTS_STREAM_PATH))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let opened = backend_for(&server)
            .open_stream(HIGHLIGHTS_STREAM_PATH, json!({"segments": []}))
            .await;

        match opened {
            Err(ApiError::Status { status, detail }) => {
                assert_eq!(status, 502);
                assert_eq!(detail, "Stream request failed");
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected the status to fail the request"),
        }
    }

    #[tokio::test]
    async fn stream_body_is_handed_back_as_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(HIGHLIGHTS_STREAM_PATH))
            .and(body_partial_json(json!({"video_id": "abc"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string("event: progress\ndata: {\"remaining_chunks\":1}\n\n"),
            )
            .mount(&server)
            .await;

        let Ok(mut body) = backend_for(&server)
            .open_stream(HIGHLIGHTS_STREAM_PATH, json!({"segments": [], "video_id": "abc"}))
            .await
        else {
            panic!("stream did not open");
        };

        let mut decoder = SseDecoder::new();
        let mut frames = Vec::new();
        while let Some(bytes) = body.next().await {
            frames.extend(decoder.feed(&bytes.unwrap()));
        }
        frames.extend(decoder.finish());

        assert_eq!(frames, vec![SseFrame::new("progress", "{\"remaining_chunks\":1}")]);
    }
}
