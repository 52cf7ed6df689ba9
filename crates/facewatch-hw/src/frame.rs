//! Frame type and pixel format conversion to packed BGR.

/// A captured camera frame in packed 8-bit BGR.
#[derive(Clone)]
pub struct Frame {
    /// BGR pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Convert packed YUYV (4:2:2) to BGR.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share the
/// chroma pair. Uses the integer BT.601 limited-range transform.
pub fn yuyv_to_bgr(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = (width * height) as usize;
    let expected = pixels * 2;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut bgr = Vec::with_capacity(pixels * 3);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        bgr.extend_from_slice(&ycbcr_to_bgr(y0, u, v));
        bgr.extend_from_slice(&ycbcr_to_bgr(y1, u, v));
    }
    Ok(bgr)
}

/// Replicate 8-bit grayscale into three BGR channels.
pub fn grey_to_bgr(grey: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = (width * height) as usize;
    if grey.len() < pixels {
        return Err(FrameError::InvalidLength {
            expected: pixels,
            actual: grey.len(),
        });
    }
    Ok(grey[..pixels].iter().flat_map(|&g| [g, g, g]).collect())
}

fn ycbcr_to_bgr(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    let r = clamp(298 * c + 409 * e);
    let g = clamp(298 * c - 100 * d - 208 * e);
    let b = clamp(298 * c + 516 * d);
    [b, g, r]
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_neutral_chroma_is_grey() {
        // 2x1 image: [Y0=16, U=128, Y1=235, V=128] → black then white
        let bgr = yuyv_to_bgr(&[16, 128, 235, 128], 2, 1).unwrap();
        assert_eq!(bgr, vec![0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn test_yuyv_red() {
        // BT.601 red: Y=81, U=90, V=240
        let bgr = yuyv_to_bgr(&[81, 90, 81, 240], 2, 1).unwrap();
        let (b, g, r) = (bgr[0], bgr[1], bgr[2]);
        assert!(r > 240 && g < 10 && b < 10, "got b={b} g={g} r={r}");
    }

    #[test]
    fn test_yuyv_output_length() {
        let yuyv: Vec<u8> = vec![128; 4 * 2 * 2];
        let bgr = yuyv_to_bgr(&yuyv, 4, 2).unwrap();
        assert_eq!(bgr.len(), 4 * 2 * 3);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let result = yuyv_to_bgr(&[100, 128], 2, 1);
        assert!(matches!(result, Err(FrameError::InvalidLength { expected: 4, actual: 2 })));
    }

    #[test]
    fn test_grey_to_bgr() {
        let bgr = grey_to_bgr(&[7, 200], 2, 1).unwrap();
        assert_eq!(bgr, vec![7, 7, 7, 200, 200, 200]);
    }

    #[test]
    fn test_grey_invalid_length() {
        assert!(grey_to_bgr(&[1, 2, 3], 2, 2).is_err());
    }
}
