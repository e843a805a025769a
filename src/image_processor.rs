//! # Image Processing Module
//!
//! Questo modulo implementa le due strategie di stripping per le immagini.
//!
//! ## Strategie (in ordine di tentativo)
//!
//! 1. **MetadataClear** (solo JPEG): riscrive lo stream dei marker eliminando
//!    i segmenti di metadata. Tabelle, frame e dati di scan restano identici
//!    byte per byte, quindi nessuna perdita di qualità.
//! 2. **PixelReencode** (tutti i formati): decodifica con `image`, ricodifica
//!    i pixel nello stesso formato. Gli encoder di `image` non scrivono
//!    EXIF né chunk testuali.
//!
//! ## Segmenti JPEG
//!
//! | Marker         | Contenuto                 | Azione   |
//! |----------------|---------------------------|----------|
//! | APP0 (FFE0)    | JFIF                      | mantieni |
//! | APP1 (FFE1)    | EXIF, XMP                 | rimuovi  |
//! | APP2 (FFE2)    | ICC profile / FlashPix    | mantieni solo ICC |
//! | APP3-APP13     | IPTC, Photoshop, vendor   | rimuovi  |
//! | APP14 (FFEE)   | Adobe (trasformazione colore) | mantieni |
//! | APP15 (FFEF)   | vendor                    | rimuovi  |
//! | COM (FFFE)     | commenti                  | rimuovi  |
//!
//! I dati compressi di ogni scan vengono copiati così come sono; i segmenti
//! tra uno scan e l'altro (JPEG progressivi) seguono le stesse regole.
//! Tutto ciò che segue l'EOI principale (immagini secondarie MPF, trailer
//! dei produttori) viene scartato.
//!
//! ## Esempio:
//! ```rust,ignore
//! if ImageProcessor::is_jpeg(&input) {
//!     ImageProcessor::clear_metadata_tables(&input, &output).await?;
//! } else {
//!     ImageProcessor::reencode_pixels(&input, &output).await?;
//! }
//! ```

use crate::error::StripError;
use crate::file_manager::FileManager;
use image::{DynamicImage, ImageFormat};
use std::path::Path;
use tracing::debug;

mod markers {
    pub const PREFIX: u8 = 0xFF;
    pub const SOI: u8 = 0xD8;
    pub const EOI: u8 = 0xD9;
    pub const SOS: u8 = 0xDA;
    pub const RST0: u8 = 0xD0;
    pub const RST7: u8 = 0xD7;
    pub const TEM: u8 = 0x01;
    pub const APP0: u8 = 0xE0;
    pub const APP2: u8 = 0xE2;
    pub const APP14: u8 = 0xEE;
    pub const APP15: u8 = 0xEF;
    pub const COM: u8 = 0xFE;
}

const ICC_SIGNATURE: &[u8] = b"ICC_PROFILE\0";

/// Image metadata stripping strategies
pub struct ImageProcessor;

impl ImageProcessor {
    pub fn is_jpeg(path: &Path) -> bool {
        matches!(FileManager::extension_of(path).as_deref(), Some("jpg" | "jpeg"))
    }

    /// Strategy 1: rewrite the JPEG marker stream without metadata segments
    pub async fn clear_metadata_tables(input_path: &Path, output_path: &Path) -> Result<(), StripError> {
        let data = tokio::fs::read(input_path).await?;
        let cleaned = Self::strip_jpeg_segments(&data)?;
        debug!(
            "Cleared JPEG metadata segments: {} -> {}",
            FileManager::format_size(data.len() as u64),
            FileManager::format_size(cleaned.len() as u64)
        );
        tokio::fs::write(output_path, cleaned).await?;
        Ok(())
    }

    /// Strategy 2: decode and re-encode the pixels into the same container family
    pub async fn reencode_pixels(input_path: &Path, output_path: &Path) -> Result<(), StripError> {
        let input = input_path.to_path_buf();
        let output = output_path.to_path_buf();

        tokio::task::spawn_blocking(move || Self::reencode_blocking(&input, &output))
            .await
            .map_err(|e| StripError::Io(std::io::Error::other(e)))?
    }

    fn reencode_blocking(input_path: &Path, output_path: &Path) -> Result<(), StripError> {
        let format = Self::output_format(input_path)?;
        let decoded = image::io::Reader::open(input_path)?
            .with_guessed_format()?
            .decode()?;

        // Il JPEG non ha canale alpha
        let pixels = if format == ImageFormat::Jpeg {
            DynamicImage::ImageRgb8(decoded.to_rgb8())
        } else {
            decoded
        };

        let mut file = std::fs::File::create(output_path)?;
        pixels.write_to(&mut file, format)?;
        file.sync_all()?;

        debug!("Re-encoded {} as {:?}", input_path.display(), format);
        Ok(())
    }

    fn output_format(input_path: &Path) -> Result<ImageFormat, StripError> {
        ImageFormat::from_path(input_path).map_err(StripError::from)
    }

    /// Remove metadata segments from an in-memory JPEG
    pub fn strip_jpeg_segments(data: &[u8]) -> Result<Vec<u8>, StripError> {
        if data.len() < 4 || data[0] != markers::PREFIX || data[1] != markers::SOI {
            return Err(StripError::InvalidImage("missing JPEG SOI marker".to_string()));
        }

        let mut output = Vec::with_capacity(data.len());
        output.extend_from_slice(&data[..2]);
        let mut pos = 2;

        loop {
            if pos >= data.len() {
                return Err(StripError::InvalidImage("JPEG ended before start of scan".to_string()));
            }
            if data[pos] != markers::PREFIX {
                return Err(StripError::InvalidImage(format!("expected marker at offset {}", pos)));
            }
            // Fill bytes before a marker
            while pos < data.len() && data[pos] == markers::PREFIX {
                pos += 1;
            }
            if pos >= data.len() {
                return Err(StripError::InvalidImage("truncated marker".to_string()));
            }

            let marker = data[pos];
            pos += 1;

            match marker {
                markers::EOI => {
                    output.extend_from_slice(&[markers::PREFIX, markers::EOI]);
                    if pos < data.len() {
                        debug!("Dropping {} bytes trailing the JPEG EOI", data.len() - pos);
                    }
                    return Ok(output);
                }
                markers::TEM | markers::RST0..=markers::RST7 => {
                    output.extend_from_slice(&[markers::PREFIX, marker]);
                    continue;
                }
                _ => {}
            }

            if pos + 2 > data.len() {
                return Err(StripError::InvalidImage("truncated segment header".to_string()));
            }
            let length = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
            if length < 2 || pos + length > data.len() {
                return Err(StripError::InvalidImage(format!(
                    "segment {:#04X} at offset {} has invalid length {}",
                    marker, pos, length
                )));
            }
            let segment = &data[pos..pos + length];

            if marker == markers::SOS {
                output.extend_from_slice(&[markers::PREFIX, markers::SOS]);
                output.extend_from_slice(segment);
                pos += length;
                // Progressive JPEGs have more scans: the loop resumes at the next marker
                let scan_end = Self::entropy_coded_end(data, pos)?;
                output.extend_from_slice(&data[pos..scan_end]);
                pos = scan_end;
                continue;
            }

            if Self::is_metadata_segment(marker, &segment[2..]) {
                debug!("Dropping JPEG segment {:#04X} ({} bytes)", marker, length);
            } else {
                output.extend_from_slice(&[markers::PREFIX, marker]);
                output.extend_from_slice(segment);
            }
            pos += length;
        }
    }

    /// Offset of the first real marker after entropy-coded data starting at `pos`.
    /// Stuffed bytes (`FF00`) and restart markers belong to the scan.
    fn entropy_coded_end(data: &[u8], mut pos: usize) -> Result<usize, StripError> {
        while pos + 1 < data.len() {
            if data[pos] == markers::PREFIX {
                match data[pos + 1] {
                    0x00 | markers::RST0..=markers::RST7 => {
                        pos += 2;
                        continue;
                    }
                    markers::PREFIX => {
                        pos += 1;
                        continue;
                    }
                    _ => return Ok(pos),
                }
            }
            pos += 1;
        }
        Err(StripError::InvalidImage("JPEG scan data ended without EOI".to_string()))
    }

    fn is_metadata_segment(marker: u8, payload: &[u8]) -> bool {
        match marker {
            markers::APP0 | markers::APP14 => false,
            markers::APP2 => !payload.starts_with(ICC_SIGNATURE),
            m if (markers::APP0..=markers::APP15).contains(&m) => true,
            markers::COM => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const EXIF_PAYLOAD: &[u8] = b"Exif\0\0MM\0*GPS 45.0N 9.1E";
    const COMMENT: &[u8] = b"shot by someone";

    fn encoded_jpeg() -> Vec<u8> {
        let img = RgbImage::from_fn(8, 8, |x, y| Rgb([(x * 30) as u8, (y * 30) as u8, 128]));
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut bytes, ImageFormat::Jpeg).unwrap();
        bytes.into_inner()
    }

    fn sibling(path: &Path, name: &str) -> PathBuf {
        path.parent().unwrap().join(name)
    }

    fn crc32(bytes: &[u8]) -> u32 {
        let mut crc = 0xFFFF_FFFFu32;
        for &b in bytes {
            crc ^= b as u32;
            for _ in 0..8 {
                crc = if crc & 1 != 0 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
            }
        }
        !crc
    }

    fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
        let mut seg = vec![0xFF, marker];
        seg.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        seg.extend_from_slice(payload);
        seg
    }

    /// JPEG with EXIF (APP1) and a COM segment spliced in right after SOI
    fn jpeg_with_metadata() -> Vec<u8> {
        let clean = encoded_jpeg();
        let mut bytes = clean[..2].to_vec();
        bytes.extend(segment(0xE1, EXIF_PAYLOAD));
        bytes.extend(segment(0xFE, COMMENT));
        bytes.extend_from_slice(&clean[2..]);
        bytes
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_strip_removes_exif_and_comment() {
        let dirty = jpeg_with_metadata();
        assert!(contains(&dirty, b"Exif"));

        let cleaned = ImageProcessor::strip_jpeg_segments(&dirty).unwrap();
        assert!(!contains(&cleaned, b"Exif"));
        assert!(!contains(&cleaned, COMMENT));
        assert_eq!(cleaned, encoded_jpeg());
    }

    #[test]
    fn test_strip_keeps_icc_profile() {
        let clean = encoded_jpeg();
        let mut icc = ICC_SIGNATURE.to_vec();
        icc.extend_from_slice(b"\x01\x01profile-bytes");
        let mut bytes = clean[..2].to_vec();
        bytes.extend(segment(0xE2, &icc));
        bytes.extend_from_slice(&clean[2..]);

        let cleaned = ImageProcessor::strip_jpeg_segments(&bytes).unwrap();
        assert!(contains(&cleaned, b"ICC_PROFILE"));
    }

    #[test]
    fn test_strip_discards_appended_image_with_exif() {
        let primary = encoded_jpeg();
        let mut trailing = primary[..2].to_vec();
        trailing.extend(segment(0xE1, EXIF_PAYLOAD));
        trailing.extend_from_slice(&primary[2..]);

        let mut bytes = primary.clone();
        bytes.extend_from_slice(&trailing);
        assert!(contains(&bytes, b"Exif"));

        let cleaned = ImageProcessor::strip_jpeg_segments(&bytes).unwrap();
        assert!(!contains(&cleaned, b"Exif"));
        assert_eq!(cleaned, primary);
        assert!(image::load_from_memory(&cleaned).is_ok());
    }

    #[test]
    fn test_strip_drops_segments_between_scans() {
        let clean = encoded_jpeg();
        let eoi = clean.len() - 2;
        let mut bytes = clean[..eoi].to_vec();
        bytes.extend(segment(0xE1, EXIF_PAYLOAD));
        bytes.extend(segment(0xFE, COMMENT));
        bytes.extend_from_slice(&clean[eoi..]);

        let cleaned = ImageProcessor::strip_jpeg_segments(&bytes).unwrap();
        assert!(!contains(&cleaned, b"Exif"));
        assert!(!contains(&cleaned, COMMENT));
        assert_eq!(cleaned, clean);
    }

    #[test]
    fn test_strip_rejects_scan_without_eoi() {
        let clean = encoded_jpeg();
        let truncated = &clean[..clean.len() - 2];
        assert!(matches!(
            ImageProcessor::strip_jpeg_segments(truncated),
            Err(StripError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_strip_rejects_non_jpeg() {
        assert!(matches!(
            ImageProcessor::strip_jpeg_segments(b"\x89PNG\r\n\x1a\n...."),
            Err(StripError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_strip_rejects_truncated_segment() {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE1, 0x40, 0x00];
        bytes.extend_from_slice(b"short");
        assert!(ImageProcessor::strip_jpeg_segments(&bytes).is_err());
    }

    #[tokio::test]
    async fn test_clear_metadata_tables_output_decodes() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("a.jpg");
        let output = sibling(&input, "a_out.jpg");
        std::fs::write(&input, jpeg_with_metadata()).unwrap();

        ImageProcessor::clear_metadata_tables(&input, &output).await.unwrap();

        let written = std::fs::read(&output).unwrap();
        assert!(!contains(&written, b"Exif"));
        let decoded = image::load_from_memory(&written).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
    }

    #[tokio::test]
    async fn test_reencode_png_drops_text_chunks() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("b.png");
        let output = sibling(&input, "b_out.png");

        let img = RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 200]));
        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img.clone()).write_to(&mut png, ImageFormat::Png).unwrap();
        // Insert a tEXt chunk after IHDR (8-byte signature + 25-byte IHDR chunk)
        let png = png.into_inner();
        let mut dirty = png[..33].to_vec();
        let mut chunk = b"tEXt".to_vec();
        chunk.extend_from_slice(b"Author\0someone");
        dirty.extend_from_slice(&((chunk.len() - 4) as u32).to_be_bytes());
        dirty.extend_from_slice(&chunk);
        dirty.extend_from_slice(&crc32(&chunk).to_be_bytes());
        dirty.extend_from_slice(&png[33..]);
        std::fs::write(&input, &dirty).unwrap();

        ImageProcessor::reencode_pixels(&input, &output).await.unwrap();

        let written = std::fs::read(&output).unwrap();
        assert!(!contains(&written, b"tEXt"));
        let decoded = image::load_from_memory(&written).unwrap().to_rgba8();
        assert_eq!(decoded, img);
    }

    #[tokio::test]
    async fn test_reencode_jpeg_drops_exif() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("c.jpg");
        let output = sibling(&input, "c_out.jpg");
        std::fs::write(&input, jpeg_with_metadata()).unwrap();

        ImageProcessor::reencode_pixels(&input, &output).await.unwrap();
        let written = std::fs::read(&output).unwrap();
        assert!(!contains(&written, b"Exif"));
        assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn test_reencode_garbage_fails() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("d.bmp");
        std::fs::write(&input, b"not a bitmap").unwrap();

        let result = ImageProcessor::reencode_pixels(&input, &sibling(&input, "d_out.bmp")).await;
        assert!(matches!(result, Err(StripError::Image(_))));
    }
}
