use anyhow::Context;
use base64ct::{Base64, Encoding};
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use super::repo_types::DEFAULT_AVATAR;
use crate::{error::AppError, state::AppState};

pub const MAX_AVATAR_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug)]
pub struct AvatarUpload {
    pub body: Bytes,
    pub content_type: &'static str,
}

/// Decodes `data:image/png;base64,...` or bare base64. Bare payloads are
/// typed by their magic bytes.
pub fn decode_avatar(payload: &str) -> Result<AvatarUpload, AppError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(AppError::validation("Avatar image is empty"));
    }

    let (declared, data) = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| AppError::validation("Malformed avatar data URI"))?;
            let mime = header
                .strip_suffix(";base64")
                .ok_or_else(|| AppError::validation("Avatar data URI must be base64"))?;
            (Some(mime.to_ascii_lowercase()), data)
        }
        None => (None, payload),
    };

    let body = Base64::decode_vec(data)
        .map_err(|_| AppError::validation("Avatar is not valid base64"))?;
    if body.is_empty() {
        return Err(AppError::validation("Avatar image is empty"));
    }
    if body.len() > MAX_AVATAR_BYTES {
        return Err(AppError::validation("Avatar image is too large"));
    }

    let content_type = match declared {
        Some(mime) => canonical_mime(&mime),
        None => sniff_mime(&body),
    }
    .ok_or_else(|| AppError::validation("Unsupported avatar image type"))?;

    Ok(AvatarUpload {
        body: Bytes::from(body),
        content_type,
    })
}

/// Uploads a new avatar and returns its storage key.
pub async fn upload_avatar(
    st: &AppState,
    user_id: Uuid,
    upload: AvatarUpload,
) -> anyhow::Result<String> {
    let ext = ext_from_mime(upload.content_type).unwrap_or("bin");
    let key = format!("avatars/{}/{}.{}", user_id, Uuid::new_v4(), ext);
    st.storage
        .put_object(&key, upload.body, upload.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    Ok(key)
}

/// Best-effort removal of an avatar that is no longer referenced. The default
/// sentinel is never sent to storage.
pub async fn discard_avatar(st: &AppState, key: &str) {
    if key == DEFAULT_AVATAR {
        return;
    }
    if let Err(e) = st.storage.delete_object(key).await {
        warn!(error = %e, %key, "failed to delete avatar");
    }
}

fn canonical_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("image/jpeg"),
        "image/png" => Some("image/png"),
        "image/webp" => Some("image/webp"),
        "image/gif" => Some("image/gif"),
        _ => None,
    }
}

fn sniff_mime(body: &[u8]) -> Option<&'static str> {
    match body {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        _ => None,
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}
