use std::fmt;

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: u32 = 4;

/// Fixed working resolution every decoded frame is resized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Builds a resolution, bumping zero dimensions up to one pixel.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Number of bytes an RGBA8 frame at this resolution occupies.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL as usize
    }

    pub fn bytes_per_row(&self) -> u32 {
        self.width * BYTES_PER_PIXEL
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(512, 512)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One compressed image as delivered by the producer.
///
/// The sequence number is stamped at ingress and follows the payload through
/// decoding so logs and diagnostics can refer to a specific image.
#[derive(Clone, PartialEq, Eq)]
pub struct RawPayload {
    pub sequence: u64,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for RawPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawPayload")
            .field("sequence", &self.sequence)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// A decoded RGBA8 image at the working resolution.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFrame {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageFrame {
    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }

    /// True when the frame matches `resolution` and carries a full pixel buffer.
    pub fn matches(&self, resolution: Resolution) -> bool {
        self.resolution() == resolution && self.pixels.len() == resolution.frame_bytes()
    }

    /// RGBA value of a pixel, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y * self.width + x) * BYTES_PER_PIXEL) as usize;
        let px = self.pixels.get(offset..offset + BYTES_PER_PIXEL as usize)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

impl fmt::Debug for ImageFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFrame")
            .field("sequence", &self.sequence)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_resolution_is_bumped_to_one_pixel() {
        let resolution = Resolution::new(0, 0);
        assert_eq!(resolution, Resolution::new(1, 1));
        assert_eq!(resolution.frame_bytes(), 4);
    }

    #[test]
    fn pixel_lookup_respects_bounds() {
        let frame = ImageFrame {
            sequence: 3,
            width: 2,
            height: 1,
            pixels: vec![1, 2, 3, 4, 5, 6, 7, 8],
        };
        assert_eq!(frame.pixel(1, 0), Some([5, 6, 7, 8]));
        assert_eq!(frame.pixel(2, 0), None);
        assert!(frame.matches(Resolution::new(2, 1)));
        assert!(!frame.matches(Resolution::new(1, 2)));
    }
}
