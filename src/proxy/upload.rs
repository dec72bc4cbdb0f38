//! Upload body extraction and the upload receipt

use bytes::Bytes;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::constants::{OCTET_STREAM, UPLOAD_FIELD_NAME};
use crate::error::ServiceError;
use crate::image_optimizer::sniff_mime_type;

/// JSON body returned after a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub file: String,
    pub size: usize,
    #[serde(rename = "type")]
    pub mime_type: String,
    /// SHA-256 of the stored bytes, hex encoded
    pub hash: String,
}

impl UploadReceipt {
    pub fn new(file: impl Into<String>, body: &[u8]) -> Self {
        Self {
            file: file.into(),
            size: body.len(),
            mime_type: sniff_mime_type(body),
            hash: hex::encode(Sha256::digest(body)),
        }
    }
}

/// Image bytes from an upload request
///
/// `multipart/form-data` bodies must carry an `image` field; any other (or
/// missing) content type is taken as the raw image.
pub async fn extract_image(content_type: Option<&str>, body: Bytes) -> Result<Bytes, ServiceError> {
    let content_type = content_type
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .unwrap_or(OCTET_STREAM);

    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    let image = if essence == "multipart/form-data" {
        read_multipart_field(content_type, body).await?
    } else {
        body
    };

    if image.is_empty() {
        return Err(ServiceError::BadRequest {
            message: "Empty image body".to_string(),
        });
    }

    Ok(image)
}

async fn read_multipart_field(content_type: &str, body: Bytes) -> Result<Bytes, ServiceError> {
    let bad_request = |message: String| ServiceError::BadRequest { message };

    let boundary =
        multer::parse_boundary(content_type).map_err(|e| bad_request(e.to_string()))?;
    let stream = futures::stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        if field.name() == Some(UPLOAD_FIELD_NAME) {
            return field.bytes().await.map_err(|e| bad_request(e.to_string()));
        }
    }

    Err(bad_request(format!(
        "Missing multipart field '{}'",
        UPLOAD_FIELD_NAME
    )))
}
