use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cyder_tools::log::{debug, warn};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};

pub const JPEG_QUALITY: u8 = 82;

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub extension: &'static str,
}

impl PreparedImage {
    fn original(bytes: Vec<u8>) -> Self {
        let format = image::guess_format(&bytes).ok();
        Self {
            bytes,
            mime: format.map(|f| f.to_mime_type()).unwrap_or("application/octet-stream"),
            extension: format
                .and_then(|f| f.extensions_str().first().copied())
                .unwrap_or("bin"),
        }
    }
}

pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

fn encode_jpeg(bytes: &[u8], max_edge: u32, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    let img = if img.width() > max_edge || img.height() > max_edge {
        img.thumbnail(max_edge, max_edge)
    } else {
        img
    };
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))?;
    Ok(out)
}

/// Downscales to `max_edge` and re-encodes as JPEG before upload.
/// Never fails: anything the decoder can't handle is returned as it came.
pub async fn compress_image(bytes: Vec<u8>, max_edge: u32) -> PreparedImage {
    let shared = Arc::new(bytes);
    let input = shared.clone();
    let result = tokio::task::spawn_blocking(move || encode_jpeg(&input, max_edge, JPEG_QUALITY)).await;
    let original = Arc::try_unwrap(shared).unwrap_or_else(|bytes| (*bytes).clone());

    match result {
        Ok(Ok(encoded)) => {
            debug!("image compressed {} -> {} bytes", original.len(), encoded.len());
            PreparedImage {
                bytes: encoded,
                mime: ImageFormat::Jpeg.to_mime_type(),
                extension: "jpg",
            }
        }
        Ok(Err(e)) => {
            warn!("image compression failed, uploading original: {}", e);
            PreparedImage::original(original)
        }
        Err(e) => {
            warn!("image compression task failed, uploading original: {}", e);
            PreparedImage::original(original)
        }
    }
}
