//! Knowledge-base ingestion
//!
//! Sends a document to the RAG processing service, which chunks and indexes
//! it and stores the result on IPFS. The returned `index_cid` is what an
//! agent deployment references as its knowledge base.

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{check_status, Result, UploadError};

pub const DEFAULT_CHUNK_SIZE: u32 = 1500;
pub const DEFAULT_CHUNK_OVERLAP: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    pub chunk_size: u32,
    pub chunk_overlap: u32,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkParams {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(UploadError::InvalidParams(
                "chunk size must be positive".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(UploadError::InvalidParams(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResult {
    /// CID of the uploaded documents
    pub cid: String,
    /// CID of the vector index; used as the agent's knowledge base
    pub index_cid: String,
    #[serde(
        rename = "number of documents",
        deserialize_with = "count_from_string_or_number"
    )]
    pub document_count: u64,
}

fn count_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

pub struct RagClient {
    endpoint: String,
    client: Client,
}

impl RagClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            endpoint: endpoint.to_string(),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn ingest_file(&self, path: &Path, params: ChunkParams) -> Result<IngestResult> {
        params.validate()?;
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        self.ingest(data, &file_name, params).await
    }

    pub async fn ingest(
        &self,
        data: Vec<u8>,
        file_name: &str,
        params: ChunkParams,
    ) -> Result<IngestResult> {
        params.validate()?;
        debug!(
            file = file_name,
            bytes = data.len(),
            chunk_size = params.chunk_size,
            chunk_overlap = params.chunk_overlap,
            "uploading document for ingestion"
        );

        let part = Part::bytes(data).file_name(file_name.to_string());
        let form = Form::new()
            .part("file", part)
            .text("chunk_size", params.chunk_size.to_string())
            .text("chunk_overlap", params.chunk_overlap.to_string());

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response).await?;

        let body = response.text().await?;
        let result: IngestResult = serde_json::from_str(&body)
            .map_err(|e| UploadError::InvalidResponse(format!("{}: {}", e, body)))?;

        info!(
            index_cid = %result.index_cid,
            documents = result.document_count,
            "knowledge base ingested"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    #[test]
    fn test_chunk_params_validation() {
        assert!(ChunkParams::default().validate().is_ok());
        assert!(ChunkParams {
            chunk_size: 100,
            chunk_overlap: 100
        }
        .validate()
        .is_err());
        assert!(ChunkParams {
            chunk_size: 0,
            chunk_overlap: 0
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_document_count_formats() {
        let text: IngestResult = serde_json::from_str(
            r#"{"cid":"bafy1","index_cid":"bafy2","number of documents":"12"}"#,
        )
        .unwrap();
        assert_eq!(text.document_count, 12);

        let number: IngestResult = serde_json::from_str(
            r#"{"cid":"bafy1","index_cid":"bafy2","number of documents":3}"#,
        )
        .unwrap();
        assert_eq!(number.document_count, 3);
    }

    #[tokio::test]
    async fn test_ingest_sends_multipart_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/process"))
            .and(|req: &Request| {
                let body = String::from_utf8_lossy(&req.body);
                body.contains("name=\"chunk_size\"")
                    && body.contains("1000")
                    && body.contains("name=\"chunk_overlap\"")
                    && body.contains("filename=\"notes.txt\"")
                    && body.contains("hello knowledge")
            })
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cid": "bafydocs",
                "index_cid": "bafyindex",
                "number of documents": "4"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = RagClient::new(&format!("{}/process", server.uri()), Duration::from_secs(5));
        let result = client
            .ingest(
                b"hello knowledge".to_vec(),
                "notes.txt",
                ChunkParams {
                    chunk_size: 1000,
                    chunk_overlap: 100,
                },
            )
            .await
            .unwrap();

        assert_eq!(result.cid, "bafydocs");
        assert_eq!(result.index_cid, "bafyindex");
        assert_eq!(result.document_count, 4);
    }

    #[tokio::test]
    async fn test_ingest_surfaces_error_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({ "error": "No file uploaded" })),
            )
            .mount(&server)
            .await;

        let client = RagClient::new(&server.uri(), Duration::from_secs(5));
        let err = client
            .ingest(b"x".to_vec(), "a.txt", ChunkParams::default())
            .await
            .unwrap_err();

        match err {
            UploadError::UploadFailed { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "No file uploaded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_params_rejected_before_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = RagClient::new(&server.uri(), Duration::from_secs(5));
        let err = client
            .ingest(
                b"x".to_vec(),
                "a.txt",
                ChunkParams {
                    chunk_size: 10,
                    chunk_overlap: 20,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_ingest_file_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("handbook.md");
        std::fs::write(&file, "# Handbook").unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(|req: &Request| {
                String::from_utf8_lossy(&req.body).contains("filename=\"handbook.md\"")
            })
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cid": "a",
                "index_cid": "b",
                "number of documents": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = RagClient::new(&server.uri(), Duration::from_secs(5));
        let result = client
            .ingest_file(&file, ChunkParams::default())
            .await
            .unwrap();
        assert_eq!(result.document_count, 1);
    }
}
