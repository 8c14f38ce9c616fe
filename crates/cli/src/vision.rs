//! HTTP client for an Azure-style computer vision service.

use async_trait::async_trait;
use imgfind_vector_store::{Captioner, ImageEmbedder, TextEmbedder, VectorStoreError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_VERSION: &str = "2023-02-01-preview";
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

type ProviderResult<T> = imgfind_vector_store::Result<T>;

pub(crate) struct VisionClient {
    http: reqwest::Client,
    endpoint: String,
    key: String,
    dimension: usize,
}

#[derive(Deserialize)]
struct VectorResponse {
    vector: Vec<f32>,
}

#[derive(Serialize)]
struct VectorizeTextRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    #[serde(rename = "captionResult")]
    caption_result: Option<CaptionResult>,
}

#[derive(Deserialize)]
struct CaptionResult {
    text: String,
}

impl VisionClient {
    pub(crate) fn new(
        endpoint: &str,
        key: String,
        dimension: usize,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key,
            dimension,
        })
    }

    fn vectorize_image_url(&self) -> String {
        format!(
            "{}/computervision/retrieval:vectorizeImage?api-version={API_VERSION}&modelVersion=latest",
            self.endpoint
        )
    }

    fn vectorize_text_url(&self) -> String {
        format!(
            "{}/computervision/retrieval:vectorizeText?api-version={API_VERSION}&modelVersion=latest",
            self.endpoint
        )
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/computervision/imageanalysis:analyze?api-version={API_VERSION}&features=caption&language=en&gender-neutral-caption=true",
            self.endpoint
        )
    }

    async fn post_image(&self, url: String, subject: &str, bytes: &[u8]) -> ProviderResult<Vec<u8>> {
        let response = self
            .http
            .post(url)
            .header(KEY_HEADER, &self.key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|err| VectorStoreError::provider(subject, err))?;
        read_body(response, subject).await
    }
}

async fn read_body(response: reqwest::Response, subject: &str) -> ProviderResult<Vec<u8>> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|err| VectorStoreError::provider(subject, err))?;
    if !status.is_success() {
        let detail = String::from_utf8_lossy(&body);
        return Err(VectorStoreError::provider(
            subject,
            format!("HTTP {status}: {}", detail.trim()),
        ));
    }
    Ok(body.to_vec())
}

fn parse_vector(body: &[u8], subject: &str) -> ProviderResult<Vec<f32>> {
    let parsed: VectorResponse = serde_json::from_slice(body)
        .map_err(|err| VectorStoreError::provider(subject, format!("bad vector response: {err}")))?;
    Ok(parsed.vector)
}

fn parse_caption(body: &[u8], subject: &str) -> ProviderResult<Option<String>> {
    let parsed: AnalyzeResponse = serde_json::from_slice(body).map_err(|err| {
        VectorStoreError::provider(subject, format!("bad analysis response: {err}"))
    })?;
    Ok(parsed
        .caption_result
        .map(|caption| caption.text)
        .filter(|text| !text.trim().is_empty()))
}

#[async_trait]
impl ImageEmbedder for VisionClient {
    async fn embed_image(&self, image_id: &str, bytes: &[u8]) -> ProviderResult<Vec<f32>> {
        let body = self
            .post_image(self.vectorize_image_url(), image_id, bytes)
            .await?;
        parse_vector(&body, image_id)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[async_trait]
impl TextEmbedder for VisionClient {
    async fn embed_text(&self, query: &str) -> ProviderResult<Vec<f32>> {
        let response = self
            .http
            .post(self.vectorize_text_url())
            .header(KEY_HEADER, &self.key)
            .json(&VectorizeTextRequest { text: query })
            .send()
            .await
            .map_err(|err| VectorStoreError::provider(query, err))?;
        let body = read_body(response, query).await?;
        parse_vector(&body, query)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[async_trait]
impl Captioner for VisionClient {
    async fn caption(&self, image_id: &str, bytes: &[u8]) -> ProviderResult<Option<String>> {
        let body = self.post_image(self.analyze_url(), image_id, bytes).await?;
        parse_caption(&body, image_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> VisionClient {
        VisionClient::new(
            "https://example.cognitiveservices.azure.com/",
            "secret".to_string(),
            1024,
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn urls_follow_the_retrieval_api() {
        let client = client();
        assert_eq!(
            client.vectorize_image_url(),
            "https://example.cognitiveservices.azure.com/computervision/retrieval:vectorizeImage?api-version=2023-02-01-preview&modelVersion=latest"
        );
        assert!(client
            .vectorize_text_url()
            .contains("/computervision/retrieval:vectorizeText?"));
        assert!(client.analyze_url().contains("features=caption"));
    }

    #[test]
    fn responses_are_parsed() {
        let vector = parse_vector(br#"{"modelVersion":"x","vector":[0.5,-1.0]}"#, "a.jpg").unwrap();
        assert_eq!(vector, vec![0.5, -1.0]);

        let caption = parse_caption(
            br#"{"captionResult":{"text":"a dog on a beach","confidence":0.8}}"#,
            "a.jpg",
        )
        .unwrap();
        assert_eq!(caption.as_deref(), Some("a dog on a beach"));

        assert_eq!(parse_caption(br#"{"metadata":{}}"#, "a.jpg").unwrap(), None);

        let err = parse_vector(b"<html>", "a.jpg").unwrap_err();
        assert!(matches!(err, VectorStoreError::ProviderFailure { subject, .. } if subject == "a.jpg"));
    }
}
