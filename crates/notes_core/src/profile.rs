//! crates/notes_core/src/profile.rs
//!
//! Reads and upserts the single profile row of a user, and moves the avatar
//! image in and out of object storage.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{AvatarFile, Profile, ProfileChanges, User, UserId};
use crate::ports::{DataService, PortError, PortResult, StorageService};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("You must be signed in to upload an avatar")]
    NotSignedIn,
    #[error("You must select an image to upload")]
    NoFileSelected,
    #[error("The selected file has no extension: '{0}'")]
    MissingExtension(String),
    #[error("The selected file has an unsupported extension: '{0}'")]
    InvalidExtension(String),
    #[error(transparent)]
    Port(#[from] PortError),
}

pub struct ProfileService {
    data: Arc<dyn DataService>,
    storage: Arc<dyn StorageService>,
    bucket: String,
}

impl ProfileService {
    pub fn new(
        data: Arc<dyn DataService>,
        storage: Arc<dyn StorageService>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            data,
            storage,
            bucket: bucket.into(),
        }
    }

    /// `Ok(None)` when the user has never saved a profile.
    pub async fn load(&self, user_id: UserId) -> PortResult<Option<Profile>> {
        self.data.get_profile(user_id).await
    }

    /// Upserts the name fields.
    pub async fn save(&self, user: &User, full_name: String, username: String) -> PortResult<()> {
        let changes = ProfileChanges {
            id: user.id,
            full_name: Some(full_name),
            username: Some(username),
            avatar_url: None,
            updated_at: Utc::now(),
        };
        self.data.upsert_profile(&changes).await?;
        info!(user_id = %user.id, "Profile saved");
        Ok(())
    }

    /// Uploads the avatar to `{user_id}/avatar.{ext}`, replacing any previous
    /// one, and returns the storage path.
    pub async fn upload_avatar(
        &self,
        user_id: Option<&UserId>,
        file: Option<AvatarFile>,
    ) -> Result<String, ProfileError> {
        let file = file.ok_or(ProfileError::NoFileSelected)?;
        let user_id = *user_id.ok_or(ProfileError::NotSignedIn)?;

        let path = avatar_path(&user_id, &file.file_name)?;
        let content_type = content_type_for(&path);
        self.storage
            .upload(&self.bucket, &path, file.bytes, content_type)
            .await?;
        info!(user_id = %user_id, path = %path, "Avatar uploaded");
        Ok(path)
    }

    /// Uploads the avatar and records its path on the profile.
    ///
    /// A storage failure is logged and yields `Ok(None)`: the profile keeps
    /// no avatar rather than the save being blocked. A failed upsert is
    /// returned as an error.
    pub async fn save_avatar(
        &self,
        user: &User,
        file: AvatarFile,
    ) -> Result<Option<String>, ProfileError> {
        let path = match self.upload_avatar(Some(&user.id), Some(file)).await {
            Ok(path) => path,
            Err(ProfileError::Port(e)) => {
                warn!(user_id = %user.id, error = %e, "Avatar upload failed");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let changes = ProfileChanges {
            id: user.id,
            full_name: None,
            username: None,
            avatar_url: Some(path.clone()),
            updated_at: Utc::now(),
        };
        self.data.upsert_profile(&changes).await?;
        Ok(Some(path))
    }

    /// Downloads the image at `path` and turns it into a self-contained
    /// `data:` URL. Failures are logged and leave the avatar unset.
    pub async fn resolve_display_url(&self, path: &str) -> Option<String> {
        match self.storage.download(&self.bucket, path).await {
            Ok(bytes) => Some(data_url(content_type_for(path), &bytes)),
            Err(e) => {
                warn!(path = %path, error = %e, "Failed to download avatar");
                None
            }
        }
    }
}

/// One avatar per user: every upload lands on the same path.
pub fn avatar_path(user_id: &UserId, file_name: &str) -> Result<String, ProfileError> {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.trim())
        .filter(|ext| !ext.is_empty())
        .ok_or_else(|| ProfileError::MissingExtension(file_name.to_string()))?;
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ProfileError::InvalidExtension(file_name.to_string()));
    }
    Ok(format!("{}/avatar.{}", user_id, ext.to_ascii_lowercase()))
}

fn content_type_for(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
    match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}

fn data_url(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, BASE64.encode(bytes))
}
