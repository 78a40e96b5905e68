//! services/api/src/adapters/storage.rs
//!
//! This module contains the adapter for the hosted backend's object storage.
//! It implements the `StorageService` port from the `core` crate.

use async_trait::async_trait;
use notes_core::ports::{PortError, PortResult, StorageService};
use reqwest::Url;

use super::supabase::SupabaseClient;

/// An adapter that implements the `StorageService` port over `/storage/v1`.
#[derive(Clone)]
pub struct StorageAdapter {
    client: SupabaseClient,
}

impl StorageAdapter {
    /// Creates a new `StorageAdapter`.
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Builds the object URL with every path segment percent-encoded, so a
    /// path can never add segments, a query or a fragment of its own.
    fn object_url(&self, bucket: &str, path: &str) -> PortResult<Url> {
        let mut url = Url::parse(&self.client.url("/storage/v1/object"))
            .map_err(|e| PortError::Unexpected(format!("Invalid storage URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| PortError::Unexpected("Storage URL cannot take a path".to_string()))?
            .push(bucket)
            .extend(
                path.split('/')
                    .filter(|segment| !matches!(*segment, "" | "." | "..")),
            );
        Ok(url)
    }
}

#[async_trait]
impl StorageService for StorageAdapter {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> PortResult<()> {
        let request = self
            .client
            .http()
            .post(self.object_url(bucket, path)?)
            .header("x-upsert", "true")
            .header("Content-Type", content_type)
            .body(bytes);
        let request = self.client.authorize(request).await;
        self.client.send(request).await?;
        Ok(())
    }

    async fn download(&self, bucket: &str, path: &str) -> PortResult<Vec<u8>> {
        let request = self.client.http().get(self.object_url(bucket, path)?);
        let request = self.client.authorize(request).await;
        let response = self.client.send(request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
