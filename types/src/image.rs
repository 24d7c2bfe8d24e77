//! Image attachments (screen captures).
//!
//! Images are held base64-encoded since that is the form both the capture
//! source and the backend wire format use. The payload sits behind an `Arc`
//! so transcript snapshots stay cheap to clone.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

pub const PNG_MIME_TYPE: &str = "image/png";

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("image data is empty")]
    Empty,
    #[error("image data is not valid base64: {0}")]
    InvalidBase64(String),
    #[error("image is not a PNG")]
    NotPng,
    #[error("unsupported data URL: {0}")]
    UnsupportedDataUrl(String),
}

#[derive(Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    mime_type: String,
    data: Arc<str>,
}

impl ImageAttachment {
    /// Encode raw PNG bytes.
    pub fn from_png_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if !bytes.starts_with(PNG_SIGNATURE) {
            return Err(ImageError::NotPng);
        }
        Ok(Self {
            mime_type: PNG_MIME_TYPE.to_string(),
            data: Arc::from(STANDARD.encode(bytes)),
        })
    }

    /// Accept either a `data:<mime>;base64,<payload>` URL or a bare base64 payload.
    ///
    /// Bare payloads are assumed to be PNG.
    pub fn from_data_url(raw: &str) -> Result<Self, ImageError> {
        let raw = raw.trim();
        let (mime_type, payload) = match raw.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| ImageError::UnsupportedDataUrl("missing ','".to_string()))?;
                let mime = header.strip_suffix(";base64").ok_or_else(|| {
                    ImageError::UnsupportedDataUrl(format!("not base64-encoded: {header}"))
                })?;
                if !mime.starts_with("image/") {
                    return Err(ImageError::UnsupportedDataUrl(format!(
                        "not an image type: {mime}"
                    )));
                }
                (mime.to_string(), payload)
            }
            None => (PNG_MIME_TYPE.to_string(), raw),
        };

        if payload.is_empty() {
            return Err(ImageError::Empty);
        }
        STANDARD
            .decode(payload)
            .map_err(|e| ImageError::InvalidBase64(e.to_string()))?;

        Ok(Self {
            mime_type,
            data: Arc::from(payload),
        })
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 payload without any data URL prefix.
    #[must_use]
    pub fn base64_data(&self) -> &str {
        &self.data
    }
}

impl fmt::Debug for ImageAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAttachment")
            .field("mime_type", &self.mime_type)
            .field("base64_len", &self.data.len())
            .finish()
    }
}
