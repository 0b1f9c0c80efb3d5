//! services/api/src/adapters/storage.rs
//!
//! This module contains the object storage adapter. It implements the
//! `ObjectStorage` port against a GCS-style JSON upload endpoint and returns
//! the object's public URL.

use async_trait::async_trait;
use bizdesk_core::ports::{ObjectStorage, PortError, PortResult};
use reqwest::{header, Client, Url};
use tracing::info;

pub const DEFAULT_STORAGE_BASE_URL: &str = "https://storage.googleapis.com";

#[derive(Clone)]
pub struct GcsStorageAdapter {
    client: Client,
    base_url: String,
    bucket: String,
    token: Option<String>,
}

impl GcsStorageAdapter {
    pub fn new(client: Client, base_url: Option<&str>, bucket: String, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url
                .unwrap_or(DEFAULT_STORAGE_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            bucket,
            token,
        }
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/storage/v1/b/{}/o", self.base_url, self.bucket)
    }

    /// `{base}/{bucket}/{path}`, with every path segment percent-encoded so
    /// filenames holding spaces, `#` or `?` still address the right object.
    pub fn public_url(&self, path: &str) -> PortResult<String> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| PortError::Unexpected(format!("Invalid storage base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| PortError::Unexpected("Storage base URL cannot hold a path".to_string()))?
            .pop_if_empty()
            .push(&self.bucket)
            .extend(path.split('/'));
        Ok(url.into())
    }
}

#[async_trait]
impl ObjectStorage for GcsStorageAdapter {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> PortResult<String> {
        let mut request = self
            .client
            .post(self.upload_url())
            .query(&[
                ("uploadType", "media"),
                ("name", path),
                ("predefinedAcl", "publicRead"),
            ])
            .header(header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Storage upload failed: {}", e)))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Unexpected(format!(
                "Storage returned {}: {}",
                status, body
            )));
        }

        info!(path, bytes = bytes.len(), "Uploaded object");
        self.public_url(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let adapter = GcsStorageAdapter::new(Client::new(), None, "bizdesk".to_string(), None);
        assert_eq!(
            adapter.upload_url(),
            "https://storage.googleapis.com/upload/storage/v1/b/bizdesk/o"
        );
        assert_eq!(
            adapter.public_url("documents/u/20240101_000000_a.pdf").unwrap(),
            "https://storage.googleapis.com/bizdesk/documents/u/20240101_000000_a.pdf"
        );
    }

    #[test]
    fn test_public_url_encodes_user_filenames() {
        let adapter = GcsStorageAdapter::new(Client::new(), None, "bizdesk".to_string(), None);
        let url = adapter
            .public_url("documents/u/20240101_000000_Q3 report #2?é.pdf")
            .unwrap();
        assert_eq!(
            url,
            "https://storage.googleapis.com/bizdesk/documents/u/20240101_000000_Q3%20report%20%232%3F%C3%A9.pdf"
        );

        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.fragment(), None);
        assert_eq!(parsed.query(), None);
        assert_eq!(parsed.path_segments().unwrap().count(), 4);
    }

    #[test]
    fn test_public_url_under_a_custom_base() {
        let adapter = GcsStorageAdapter::new(
            Client::new(),
            Some("http://localhost:4443/"),
            "bizdesk".to_string(),
            None,
        );
        assert_eq!(
            adapter.public_url("a b.txt").unwrap(),
            "http://localhost:4443/bizdesk/a%20b.txt"
        );
    }
}
