//! services/api/src/adapters/thumbnail.rs
//!
//! PNG previews for ingested files. Images are scaled to fit a 200x200 box;
//! every other type gets a white 200x200 placeholder with the filename and a
//! caption drawn in an 8x8 bitmap font, also kept as PNG text metadata.

use std::io::Cursor;

use async_trait::async_trait;
use bizdesk_core::domain::UploadedFile;
use bizdesk_core::ports::{PortError, PortResult, ThumbnailGenerator};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{ImageFormat, Rgb, RgbImage};

pub const THUMBNAIL_SIZE: u32 = 200;
pub const PLACEHOLDER_CAPTION: &str = "Document uploaded";

const GLYPH_SCALE: u32 = 2;
const GLYPH_SIZE: u32 = 8 * GLYPH_SCALE;
const LINE_HEIGHT: u32 = GLYPH_SIZE + 4;
const TEXT_MARGIN: u32 = 4;
const CHARS_PER_LINE: usize = ((THUMBNAIL_SIZE - 2 * TEXT_MARGIN) / GLYPH_SIZE) as usize;
const MAX_NAME_LINES: usize = 5;
const INK: Rgb<u8> = Rgb([0x20, 0x20, 0x20]);

fn encoding_error(e: impl std::fmt::Display) -> PortError {
    PortError::Unexpected(format!("Failed to encode thumbnail: {}", e))
}

/// Scales an image down (never up) to fit the thumbnail box, keeping its aspect ratio.
pub fn image_thumbnail(bytes: &[u8]) -> PortResult<Vec<u8>> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| PortError::InvalidInput(format!("Unreadable image: {}", e)))?;
    let scaled = if image.width() > THUMBNAIL_SIZE || image.height() > THUMBNAIL_SIZE {
        image.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE)
    } else {
        image
    };
    let mut out = Cursor::new(Vec::new());
    scaled
        .write_to(&mut out, ImageFormat::Png)
        .map_err(encoding_error)?;
    Ok(out.into_inner())
}

/// The filename hard-wrapped to the box width, a blank line, then the caption
/// one word per line.
fn placeholder_lines(filename: &str) -> Vec<String> {
    let chars: Vec<char> = filename.chars().collect();
    let mut lines: Vec<String> = chars
        .chunks(CHARS_PER_LINE)
        .take(MAX_NAME_LINES)
        .map(|line| line.iter().collect())
        .collect();
    lines.push(String::new());
    lines.extend(PLACEHOLDER_CAPTION.split_whitespace().map(str::to_string));
    lines
}

/// Characters outside the basic Latin set are drawn as `?`.
fn draw_text(canvas: &mut RgbImage, lines: &[String]) {
    for (row, line) in lines.iter().enumerate() {
        let top = TEXT_MARGIN + row as u32 * LINE_HEIGHT;
        for (col, ch) in line.chars().enumerate() {
            let left = TEXT_MARGIN + col as u32 * GLYPH_SIZE;
            let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
                continue;
            };
            for (gy, bits) in glyph.iter().enumerate() {
                for gx in 0..8u32 {
                    if *bits & (1u8 << gx) == 0 {
                        continue;
                    }
                    for dy in 0..GLYPH_SCALE {
                        for dx in 0..GLYPH_SCALE {
                            let x = left + gx * GLYPH_SCALE + dx;
                            let y = top + gy as u32 * GLYPH_SCALE + dy;
                            if x < canvas.width() && y < canvas.height() {
                                canvas.put_pixel(x, y, INK);
                            }
                        }
                    }
                }
            }
        }
    }
}

/// A white square showing the filename, with the same name in its `Title`
/// text chunk.
pub fn placeholder_thumbnail(filename: &str) -> PortResult<Vec<u8>> {
    let mut canvas = RgbImage::from_pixel(THUMBNAIL_SIZE, THUMBNAIL_SIZE, Rgb([0xFF, 0xFF, 0xFF]));
    draw_text(&mut canvas, &placeholder_lines(filename));

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, THUMBNAIL_SIZE, THUMBNAIL_SIZE);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);

        // tEXt only holds Latin-1; anything else goes into an international text chunk.
        if filename.chars().all(|c| u32::from(c) < 256) {
            encoder
                .add_text_chunk("Title".to_string(), filename.to_string())
                .map_err(encoding_error)?;
        } else {
            encoder
                .add_itxt_chunk("Title".to_string(), filename.to_string())
                .map_err(encoding_error)?;
        }
        encoder
            .add_text_chunk("Description".to_string(), PLACEHOLDER_CAPTION.to_string())
            .map_err(encoding_error)?;

        let mut writer = encoder.write_header().map_err(encoding_error)?;
        writer
            .write_image_data(canvas.as_raw())
            .map_err(encoding_error)?;
        writer.finish().map_err(encoding_error)?;
    }
    Ok(out)
}

#[derive(Clone, Default)]
pub struct PngThumbnailGenerator;

impl PngThumbnailGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ThumbnailGenerator for PngThumbnailGenerator {
    async fn generate(&self, file: &UploadedFile) -> PortResult<Vec<u8>> {
        let is_image = file.mime_type.starts_with("image");
        let bytes = file.bytes.clone();
        let filename = file.filename.clone();
        tokio::task::spawn_blocking(move || {
            if is_image {
                image_thumbnail(&bytes)
            } else {
                placeholder_thumbnail(&filename)
            }
        })
        .await
        .map_err(|e| PortError::Unexpected(format!("Thumbnail task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GenericImageView, RgbImage};

    fn png_of(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_large_image_fits_the_box() {
        let thumb = image_thumbnail(&png_of(800, 200)).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!(decoded.dimensions(), (200, 50));
    }

    #[test]
    fn test_small_image_is_not_upscaled() {
        let thumb = image_thumbnail(&png_of(40, 30)).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!(decoded.dimensions(), (40, 30));
    }

    #[test]
    fn test_placeholder_carries_filename() {
        let bytes = placeholder_thumbnail("report.pdf").unwrap();
        let decoder = png::Decoder::new(Cursor::new(bytes));
        let reader = decoder.read_info().unwrap();
        let info = reader.info();
        assert_eq!((info.width, info.height), (200, 200));
        assert!(info
            .uncompressed_latin1_text
            .iter()
            .any(|chunk| chunk.keyword == "Title" && chunk.text == "report.pdf"));
    }

    #[test]
    fn test_placeholder_draws_the_filename() {
        let bytes = placeholder_thumbnail("report.pdf").unwrap();
        let canvas = image::load_from_memory(&bytes).unwrap().to_rgb8();
        let white = Rgb([0xFF, 0xFF, 0xFF]);

        let first_line_inked = (TEXT_MARGIN..TEXT_MARGIN + GLYPH_SIZE)
            .flat_map(|y| (0..THUMBNAIL_SIZE).map(move |x| (x, y)))
            .any(|(x, y)| *canvas.get_pixel(x, y) != white);
        assert!(first_line_inked);
        assert_eq!(*canvas.get_pixel(THUMBNAIL_SIZE - 1, THUMBNAIL_SIZE - 1), white);
    }

    #[test]
    fn test_placeholder_lines_wrap_long_names() {
        let lines = placeholder_lines("quarterly_financial_statements.pdf");
        assert_eq!(lines[0], "quarterly_fi");
        assert_eq!(lines[2], "ements.pdf");
        assert_eq!(&lines[3..], ["", "Document", "uploaded"]);

        let longest = placeholder_lines(&"x".repeat(500));
        assert_eq!(longest.len(), MAX_NAME_LINES + 3);
        assert!((longest.len() as u32) * LINE_HEIGHT + TEXT_MARGIN <= THUMBNAIL_SIZE);
    }

    #[test]
    fn test_non_latin_filename_is_still_encoded() {
        assert!(placeholder_thumbnail("報告.docx").is_ok());
    }

    #[tokio::test]
    async fn test_generator_dispatches_on_mime_type() {
        let generator = PngThumbnailGenerator::new();
        let doc = UploadedFile {
            filename: "a.txt".to_string(),
            mime_type: "text/plain".to_string(),
            bytes: b"hello".to_vec(),
        };
        assert!(generator.generate(&doc).await.is_ok());

        let broken_image = UploadedFile {
            filename: "a.png".to_string(),
            mime_type: "image/png".to_string(),
            bytes: b"not a png".to_vec(),
        };
        assert!(matches!(
            generator.generate(&broken_image).await,
            Err(PortError::InvalidInput(_))
        ));
    }
}
