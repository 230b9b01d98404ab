use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::GenericImageView;
use manatan_types::BoundingBox;
use serde::Serialize;

use crate::AnkiError;

/// Entry of AnkiConnect's `picture` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Picture {
    pub data: String,
    pub filename: String,
    pub fields: Vec<String>,
}

/// Pixel rectangle of a normalized crop, clamped to the image and at least 1x1.
pub fn crop_pixels(crop: &BoundingBox, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let w = width as f64;
    let h = height as f64;

    let left = (crop.x.clamp(0.0, 1.0) * w).floor();
    let top = (crop.y.clamp(0.0, 1.0) * h).floor();
    let right = (crop.right().clamp(0.0, 1.0) * w).ceil();
    let bottom = (crop.bottom().clamp(0.0, 1.0) * h).ceil();

    let x = (left as u32).min(width.saturating_sub(1));
    let y = (top as u32).min(height.saturating_sub(1));
    let cw = ((right - left).max(1.0) as u32).min(width - x);
    let ch = ((bottom - top).max(1.0) as u32).min(height - y);

    (x, y, cw, ch)
}

/// Decode `bytes`, crop to the normalized rect if given, re-encode as base64 PNG.
pub fn encode_png(bytes: &[u8], crop: Option<&BoundingBox>) -> Result<String, AnkiError> {
    let image = image::load_from_memory(bytes)?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(AnkiError::Image("image has no pixels".to_string()));
    }

    let image = match crop {
        Some(crop) => {
            let (x, y, w, h) = crop_pixels(crop, width, height);
            tracing::debug!("Cropping {width}x{height} to {w}x{h} at {x},{y}");
            image.crop_imm(x, y, w, h)
        }
        None => image,
    };

    let mut png = Cursor::new(Vec::new());
    image.write_to(&mut png, image::ImageFormat::Png)?;

    Ok(BASE64.encode(png.into_inner()))
}

/// Download an image for attaching to a note.
pub async fn fetch_image(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, AnkiError> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// Build the picture entry for `field`, named after the capture time.
pub fn picture(data: String, field: &str, now_ms: u64) -> Picture {
    Picture {
        data,
        filename: format!("manatan_{now_ms}.png"),
        fields: vec![field.to_string()],
    }
}
