//! 图片读取，将文件或内存中的数据解码为固定尺寸的 RGB 图像

use std::borrow::Cow;
use std::path::Path;

use image::error::{ParameterError, ParameterErrorKind};
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageReader, RgbImage};

use crate::error::Result;
use crate::haar::NUM_PIXELS;

/// 从文件读取图片，格式根据文件内容判断
pub fn load_file(path: impl AsRef<Path>) -> Result<DynamicImage> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    check_dimensions(&image)?;
    Ok(image)
}

/// 从内存中的文件数据解码图片
pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    let image = image::load_from_memory(bytes)?;
    check_dimensions(&image)?;
    Ok(image)
}

/// 缩放到 128x128 的 RGB 图像，忽略宽高比
pub fn scaled_rgb(image: &DynamicImage) -> Result<Cow<'_, RgbImage>> {
    check_dimensions(image)?;
    let size = NUM_PIXELS as u32;
    if let DynamicImage::ImageRgb8(rgb) = image {
        if rgb.dimensions() == (size, size) {
            return Ok(Cow::Borrowed(rgb));
        }
    }
    if image.width() == size && image.height() == size {
        return Ok(Cow::Owned(image.to_rgb8()));
    }
    Ok(Cow::Owned(image.resize_exact(size, size, FilterType::Triangle).to_rgb8()))
}

fn check_dimensions(image: &DynamicImage) -> Result<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ImageError::Parameter(ParameterError::from_kind(
            ParameterErrorKind::DimensionMismatch,
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb};

    use super::*;
    use crate::error::Error;

    #[test]
    fn decode_png_bytes() {
        let image = RgbImage::from_pixel(16, 8, Rgb([1, 2, 3]));
        let mut bytes = Cursor::new(vec![]);
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();

        let decoded = decode_bytes(bytes.get_ref()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
        let scaled = scaled_rgb(&decoded).unwrap();
        assert_eq!(scaled.dimensions(), (128, 128));
        assert_eq!(scaled.get_pixel(64, 64), &Rgb([1, 2, 3]));
    }

    #[test]
    fn garbage_is_decode_error() {
        assert!(matches!(decode_bytes(b"definitely not an image"), Err(Error::ImageDecode(_))));
    }

    #[test]
    fn missing_file_is_error() {
        assert!(load_file("/nonexistent/file.png").is_err());
    }

    #[test]
    fn borrowed_when_already_sized() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(128, 128));
        assert!(matches!(scaled_rgb(&image).unwrap(), Cow::Borrowed(_)));
    }
}
