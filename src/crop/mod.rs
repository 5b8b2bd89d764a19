use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::RgbaImage;

pub mod detect;

pub use detect::{detect_bounds, CropBounds};

/// Copies the bounds rectangle out of the source bitmap, preserving RGBA
/// channel order.
pub fn crop_image(image: &RgbaImage, bounds: &CropBounds) -> RgbaImage {
    image::imageops::crop_imm(
        image,
        bounds.left,
        bounds.top,
        bounds.width(),
        bounds.height(),
    )
    .to_image()
}

/// PNG-encodes the bitmap and wraps it as a transportable data URI.
pub fn encode_png_data_url(image: &RgbaImage) -> Result<String> {
    let mut buffer = Vec::new();
    image
        .write_to(
            &mut std::io::Cursor::new(&mut buffer),
            image::ImageFormat::Png,
        )
        .with_context(|| "failed to encode cropped image as png")?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(&buffer)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn crop_copies_the_exact_rectangle() {
        let mut source = RgbaImage::from_pixel(400, 300, Rgba([255, 255, 255, 255]));
        source.put_pixel(120, 80, Rgba([10, 20, 30, 255]));
        let bounds = CropBounds {
            top: 50,
            bottom: 280,
            left: 0,
            right: 250,
        };
        let cropped = crop_image(&source, &bounds);
        assert_eq!(cropped.dimensions(), (250, 230));
        assert_eq!(cropped.get_pixel(120, 30), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn data_url_is_base64_png() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        let url = encode_png_data_url(&image).unwrap();
        let payload = url.strip_prefix("data:image/png;base64,").unwrap();
        let decoded = BASE64.decode(payload).unwrap();
        assert_eq!(&decoded[1..4], b"PNG");
    }
}
