use image::{
    DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, RgbaImage,
    codecs::jpeg::JpegEncoder, metadata::Orientation,
};
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

use super::CompositeError;

/// Decode an encoded image on the blocking pool.
pub async fn decode_image(
    bytes: Arc<[u8]>,
    what: impl Into<String>,
) -> Result<DynamicImage, CompositeError> {
    let what = what.into();
    tokio::task::spawn_blocking(move || decode_bytes(&bytes, what))
        .await
        .map_err(|e| CompositeError::Task(e.to_string()))?
}

/// Decode an image and turn it upright according to its EXIF orientation,
/// so dimensions and corners match what a viewer displays.
pub fn decode_bytes(bytes: &[u8], what: String) -> Result<DynamicImage, CompositeError> {
    let reader = match image::ImageReader::new(Cursor::new(bytes)).with_guessed_format() {
        Ok(reader) => reader,
        Err(e) => {
            return Err(CompositeError::Decode {
                what,
                source: image::ImageError::IoError(e),
            });
        }
    };

    let decode_error = |source: image::ImageError| CompositeError::Decode {
        what: what.clone(),
        source,
    };
    let mut decoder = reader.into_decoder().map_err(decode_error)?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut image = DynamicImage::from_decoder(decoder).map_err(decode_error)?;

    if orientation != Orientation::NoTransforms {
        debug!("Applying EXIF orientation {:?} to {}", orientation, what);
        image.apply_orientation(orientation);
    }

    debug!(
        "Decoded {}: {}x{}",
        what,
        image.width(),
        image.height()
    );

    Ok(image)
}

/// Encode a composited surface as baseline JPEG.
pub fn encode_jpeg(surface: RgbaImage, quality: u8) -> Result<Vec<u8>, CompositeError> {
    // JPEG doesn't support alpha channel, so convert to RGB
    let rgb_image = DynamicImage::ImageRgba8(surface).to_rgb8();
    let mut output = Vec::new();

    let encoder = JpegEncoder::new_with_quality(&mut output, quality);
    encoder
        .write_image(
            &rgb_image,
            rgb_image.width(),
            rgb_image.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(CompositeError::Encode)?;

    debug!(
        "JPEG encoded at quality {}: {} bytes",
        quality,
        output.len()
    );

    Ok(output)
}
