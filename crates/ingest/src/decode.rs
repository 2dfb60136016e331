use std::fmt;
use std::str::FromStr;

use image::imageops::FilterType;

use crate::frame::{ImageFrame, RawPayload, Resolution};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is empty")]
    Empty,
    #[error("unsupported or malformed image: {0}")]
    Format(#[from] image::ImageError),
    #[error("resize produced {actual} bytes, expected {expected}")]
    Dimensions { expected: usize, actual: usize },
}

/// Resampling filter used when squashing images to the working resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

impl ResizeFilter {
    fn filter_type(self) -> FilterType {
        match self {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl FromStr for ResizeFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "nearest" => Ok(ResizeFilter::Nearest),
            "triangle" | "linear" | "bilinear" => Ok(ResizeFilter::Triangle),
            "catmullrom" | "catmull-rom" | "cubic" => Ok(ResizeFilter::CatmullRom),
            "gaussian" => Ok(ResizeFilter::Gaussian),
            "lanczos3" | "lanczos" => Ok(ResizeFilter::Lanczos3),
            other => Err(format!(
                "unknown resize filter '{other}'; expected nearest, triangle, catmullrom, gaussian, or lanczos3"
            )),
        }
    }
}

impl fmt::Display for ResizeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResizeFilter::Nearest => "nearest",
            ResizeFilter::Triangle => "triangle",
            ResizeFilter::CatmullRom => "catmullrom",
            ResizeFilter::Gaussian => "gaussian",
            ResizeFilter::Lanczos3 => "lanczos3",
        };
        f.write_str(name)
    }
}

/// Turns arbitrary compressed image bytes into RGBA8 frames at a fixed size.
///
/// The format is sniffed from the payload itself; aspect ratio is not
/// preserved, every image is stretched to fill the working resolution.
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    resolution: Resolution,
    filter: ResizeFilter,
}

impl Decoder {
    pub fn new(resolution: Resolution, filter: ResizeFilter) -> Self {
        Self { resolution, filter }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn decode(&self, payload: &RawPayload) -> Result<ImageFrame, DecodeError> {
        if payload.bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let image = image::load_from_memory(&payload.bytes)?;
        let Resolution { width, height } = self.resolution;
        let resized = if image.width() == width && image.height() == height {
            image
        } else {
            image.resize_exact(width, height, self.filter.filter_type())
        };
        let pixels = resized.into_rgba8().into_raw();

        let expected = self.resolution.frame_bytes();
        if pixels.len() != expected {
            return Err(DecodeError::Dimensions {
                expected,
                actual: pixels.len(),
            });
        }

        Ok(ImageFrame {
            sequence: payload.sequence,
            width,
            height,
            pixels,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Cursor;

    use image::{ImageFormat, Rgba, RgbaImage};

    /// Encodes a solid-colour PNG.
    pub(crate) fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut cursor = Cursor::new(Vec::new());
        image
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("encode png");
        cursor.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::png_bytes;
    use super::*;

    fn payload(sequence: u64, bytes: Vec<u8>) -> RawPayload {
        RawPayload { sequence, bytes }
    }

    #[test]
    fn decodes_and_resizes_to_working_resolution() {
        let decoder = Decoder::new(Resolution::new(16, 8), ResizeFilter::Lanczos3);
        let frame = decoder
            .decode(&payload(7, png_bytes(40, 30, [200, 100, 50, 255])))
            .expect("decode");
        assert_eq!(frame.sequence, 7);
        assert_eq!((frame.width, frame.height), (16, 8));
        assert_eq!(frame.pixels.len(), 16 * 8 * 4);
        let [r, g, b, a] = frame.pixel(8, 4).expect("pixel");
        assert!(r.abs_diff(200) <= 1 && g.abs_diff(100) <= 1 && b.abs_diff(50) <= 1);
        assert_eq!(a, 255);
    }

    #[test]
    fn matching_size_skips_resampling() {
        let decoder = Decoder::new(Resolution::new(4, 4), ResizeFilter::Nearest);
        let frame = decoder
            .decode(&payload(0, png_bytes(4, 4, [1, 2, 3, 4])))
            .expect("decode");
        assert!(frame.pixels.chunks(4).all(|px| px == [1, 2, 3, 4]));
    }

    #[test]
    fn rejects_empty_payload() {
        let decoder = Decoder::new(Resolution::default(), ResizeFilter::default());
        let err = decoder.decode(&payload(1, Vec::new())).unwrap_err();
        assert!(matches!(err, DecodeError::Empty));
    }

    #[test]
    fn rejects_garbage_bytes() {
        let decoder = Decoder::new(Resolution::default(), ResizeFilter::default());
        let err = decoder
            .decode(&payload(2, b"definitely not an image".to_vec()))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Format(_)));
    }

    #[test]
    fn parses_filter_names() {
        assert_eq!("Lanczos".parse::<ResizeFilter>(), Ok(ResizeFilter::Lanczos3));
        assert_eq!("catmull-rom".parse::<ResizeFilter>(), Ok(ResizeFilter::CatmullRom));
        assert!("sinc".parse::<ResizeFilter>().is_err());
        assert_eq!(ResizeFilter::Gaussian.to_string(), "gaussian");
    }
}
