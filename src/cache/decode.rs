use bytes::Bytes;
use image::DynamicImage;
use std::fmt;

use crate::transport::{FetchError, Result};

/// In-memory decoded image
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub byte_len: usize,
    pub image: DynamicImage,
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("byte_len", &self.byte_len)
            .finish_non_exhaustive()
    }
}

/// Decode on the blocking pool to keep executor threads free
pub async fn decode(bytes: Bytes) -> Result<DecodedImage> {
    tokio::task::spawn_blocking(move || decode_sync(&bytes))
        .await
        .map_err(|e| FetchError::Decode(e.to_string()))?
}

fn decode_sync(bytes: &[u8]) -> Result<DecodedImage> {
    let image = image::load_from_memory(bytes).map_err(|e| FetchError::Decode(e.to_string()))?;

    Ok(DecodedImage {
        width: image.width(),
        height: image.height(),
        byte_len: bytes.len(),
        image,
    })
}

#[cfg(test)]
pub(crate) fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let pixels = image::RgbaImage::from_pixel(width, height, image::Rgba([12, 80, 160, 255]));
    let mut buffer = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(pixels)
        .write_to(&mut buffer, image::ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}
