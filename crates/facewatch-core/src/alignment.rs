//! Face crop preparation for the encoder.
//!
//! Faces with landmarks are warped onto the five InsightFace reference points
//! with a least-squares similarity transform (scale, rotation, translation).
//! Faces without landmarks fall back to a plain box crop.

use crate::types::FaceRegion;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// ArcFace reference landmarks for a 112×112 output.
const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

/// Side length of the encoder input crop.
pub const ALIGNED_SIZE: usize = 112;

/// Similarity transform `[a, b, tx, ty]` mapping `(x, y)` to
/// `(a*x - b*y + tx, b*x + a*y + ty)`.
type Similarity = [f32; 4];

/// Least-squares fit of a similarity transform from `src` to `dst`.
fn estimate_similarity_transform(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Similarity {
    // Normal equations AᵀA·p = Aᵀb, two rows per point pair:
    //   [sx, -sy, 1, 0]·p = dx
    //   [sy,  sx, 0, 1]·p = dy
    let mut ata = [[0.0f32; 4]; 4];
    let mut atb = [0.0f32; 4];

    for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
        for (row, rhs) in [([sx, -sy, 1.0, 0.0], dx), ([sy, sx, 0.0, 1.0], dy)] {
            for j in 0..4 {
                for k in 0..4 {
                    ata[j][k] += row[j] * row[k];
                }
                atb[j] += row[j] * rhs;
            }
        }
    }

    solve_4x4(ata, atb).unwrap_or([1.0, 0.0, 0.0, 0.0])
}

/// Gaussian elimination with partial pivoting. `None` if the system is singular.
#[allow(clippy::needless_range_loop)]
fn solve_4x4(mut a: [[f32; 4]; 4], mut b: [f32; 4]) -> Option<[f32; 4]> {
    for col in 0..4 {
        let pivot_row = (col..4).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        let pivot = a[col][col];
        if pivot.abs() < 1e-12 {
            return None;
        }

        for row in (col + 1)..4 {
            let factor = a[row][col] / pivot;
            for j in col..4 {
                a[row][j] -= factor * a[col][j];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        let tail: f32 = ((i + 1)..4).map(|j| a[i][j] * x[j]).sum();
        x[i] = (b[i] - tail) / a[i][i];
    }
    Some(x)
}

/// Warp `image` into an `out_size`² crop through the inverse of `transform`.
///
/// Bilinear sampling; pixels that map outside the source are black.
fn warp_similarity(image: &RgbImage, transform: &Similarity, out_size: usize) -> RgbImage {
    let [a, b, tx, ty] = *transform;
    let mut output = RgbImage::new(out_size as u32, out_size as u32);

    let det = a * a + b * b;
    if det.abs() < 1e-12 {
        return output;
    }
    let (ia, ib) = (a / det, b / det);
    let (w, h) = (image.width() as i64, image.height() as i64);

    let sample = |x: i64, y: i64| -> [f32; 3] {
        if x >= 0 && x < w && y >= 0 && y < h {
            image.get_pixel(x as u32, y as u32).0.map(f32::from)
        } else {
            [0.0; 3]
        }
    };

    for (ox, oy, out) in output.enumerate_pixels_mut() {
        let dx = ox as f32 - tx;
        let dy = oy as f32 - ty;
        let sx = ia * dx + ib * dy;
        let sy = -ib * dx + ia * dy;

        let x0 = sx.floor() as i64;
        let y0 = sy.floor() as i64;
        let fx = sx - x0 as f32;
        let fy = sy - y0 as f32;

        let (tl, tr, bl, br) = (sample(x0, y0), sample(x0 + 1, y0), sample(x0, y0 + 1), sample(x0 + 1, y0 + 1));
        *out = Rgb(std::array::from_fn(|c| {
            let v = tl[c] * (1.0 - fx) * (1.0 - fy)
                + tr[c] * fx * (1.0 - fy)
                + bl[c] * (1.0 - fx) * fy
                + br[c] * fx * fy;
            v.round().clamp(0.0, 255.0) as u8
        }));
    }

    output
}

/// Align a detected face to a canonical 112×112 crop using its five landmarks.
pub fn align_face(image: &RgbImage, landmarks: &[(f32, f32); 5]) -> RgbImage {
    let transform = estimate_similarity_transform(landmarks, &REFERENCE_LANDMARKS_112);
    warp_similarity(image, &transform, ALIGNED_SIZE)
}

/// Crop `region` (clamped to the image) and resize it to 112×112.
///
/// Returns `None` when the clamped region is empty.
pub fn crop_face(image: &RgbImage, region: &FaceRegion) -> Option<RgbImage> {
    let left = region.left.clamp(0, image.width() as i32) as u32;
    let top = region.top.clamp(0, image.height() as i32) as u32;
    let right = region.right.clamp(0, image.width() as i32) as u32;
    let bottom = region.bottom.clamp(0, image.height() as i32) as u32;
    if right <= left || bottom <= top {
        return None;
    }

    let crop = imageops::crop_imm(image, left, top, right - left, bottom - top).to_image();
    Some(imageops::resize(&crop, ALIGNED_SIZE as u32, ALIGNED_SIZE as u32, FilterType::Triangle))
}
