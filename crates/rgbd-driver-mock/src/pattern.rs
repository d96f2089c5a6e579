//! Test patterns for mock frames.
//!
//! The scene is a wall with a horizontal depth gradient and one "person", a
//! disc closer to the sensor that orbits the image center. Every channel is
//! derived from the same disc so body index, depth and skeleton agree.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Wall depth at the left edge, millimeters.
const WALL_NEAR_MM: u16 = 2500;
/// Wall depth at the right edge, millimeters.
const WALL_FAR_MM: u16 = 3500;
/// Depth of the person disc, millimeters.
pub(crate) const BODY_MM: u16 = 1800;
/// Body-index value for pixels without a body.
pub(crate) const NO_BODY: u8 = 255;
/// Invalid (zero-depth) border width in pixels.
const BORDER: usize = 2;

/// Deterministic RNG for one frame of one seed, independent of render order.
#[must_use]
pub fn frame_rng(seed: u64, frame_number: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed ^ frame_number.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Where the person is in depth-image pixels for a given frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDisc {
    /// Center column
    pub cx: f32,
    /// Center row
    pub cy: f32,
    /// Radius in pixels
    pub radius: f32,
}

impl BodyDisc {
    /// Disc position for `frame_number`, orbiting with a period of ~126 frames.
    #[must_use]
    pub fn at(width: u16, height: u16, frame_number: u64) -> Self {
        let (w, h) = (f32::from(width), f32::from(height));
        let short = w.min(h);
        let orbit = short / 6.0;
        let angle = (frame_number as f32 * 0.05) % std::f32::consts::TAU;
        Self {
            cx: w / 2.0 + orbit * angle.cos(),
            cy: h / 2.0 + orbit * angle.sin(),
            radius: (short / 8.0).max(1.0),
        }
    }

    /// Whether pixel `(x, y)` lies on the disc.
    #[must_use]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        let dx = x as f32 + 0.5 - self.cx;
        let dy = y as f32 + 0.5 - self.cy;
        dx * dx + dy * dy <= self.radius * self.radius
    }
}

fn in_border(x: usize, y: usize, w: usize, h: usize) -> bool {
    w > 2 * BORDER && h > 2 * BORDER && (x < BORDER || y < BORDER || x >= w - BORDER || y >= h - BORDER)
}

/// Depth in millimeters: wall gradient, the disc, a zero border and ±4 mm noise.
pub(crate) fn fill_depth(out: &mut [u16], width: u16, disc: &BodyDisc, rng: &mut ChaCha8Rng) {
    let w = usize::from(width);
    let h = out.len() / w.max(1);
    let span = u32::from(WALL_FAR_MM - WALL_NEAR_MM);
    for (i, px) in out.iter_mut().enumerate() {
        let (x, y) = (i % w, i / w);
        *px = if in_border(x, y, w, h) {
            0
        } else {
            let base = if disc.contains(x, y) {
                BODY_MM
            } else {
                WALL_NEAR_MM + (span * x as u32 / w.max(1) as u32) as u16
            };
            base.saturating_add_signed(rng.gen_range(-4..=4))
        };
    }
}

/// Infrared intensity falling off with depth.
pub(crate) fn fill_infrared(out: &mut [u16], depth: &[u16], rng: &mut ChaCha8Rng) {
    for (px, &d) in out.iter_mut().zip(depth) {
        *px = if d == 0 {
            0
        } else {
            let falloff = (1000.0 / f32::from(d)).powi(2);
            let noise: f32 = rng.gen_range(0.97..1.03);
            (65535.0 * falloff * noise).min(65535.0) as u16
        };
    }
}

/// Body index: `0` on the disc, [`NO_BODY`] elsewhere.
pub(crate) fn fill_body_index(out: &mut [u8], width: u16, disc: &BodyDisc) {
    let w = usize::from(width).max(1);
    for (i, px) in out.iter_mut().enumerate() {
        *px = if disc.contains(i % w, i / w) { 0 } else { NO_BODY };
    }
}

/// BGRA checkerboard whose tint cycles with the frame number.
pub(crate) fn fill_color(out: &mut [u8], width: u16, height: u16, frame_number: u64) {
    let w = usize::from(width).max(1);
    let cell = (usize::from(width.min(height)) / 16).max(1);
    let tint = (frame_number % 256) as u8;
    for (i, px) in out.chunks_exact_mut(4).enumerate() {
        let (x, y) = (i % w, i / w);
        let light = (x / cell + y / cell) % 2 == 0;
        let level = if light { 200 } else { 60 };
        px[0] = level;
        px[1] = level / 2 + tint / 2;
        px[2] = level.wrapping_add(tint);
        px[3] = 255;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_and_frame_repeat() {
        let disc = BodyDisc::at(32, 24, 3);
        let mut a = vec![0u16; 32 * 24];
        let mut b = vec![0u16; 32 * 24];
        fill_depth(&mut a, 32, &disc, &mut frame_rng(9, 3));
        fill_depth(&mut b, 32, &disc, &mut frame_rng(9, 3));
        assert_eq!(a, b);

        let mut c = vec![0u16; 32 * 24];
        fill_depth(&mut c, 32, &disc, &mut frame_rng(9, 4));
        assert_ne!(a, c);
    }

    #[test]
    fn test_depth_has_border_and_body() {
        let disc = BodyDisc::at(32, 24, 0);
        let mut depth = vec![0u16; 32 * 24];
        fill_depth(&mut depth, 32, &disc, &mut frame_rng(1, 0));
        assert_eq!(depth[0], 0);
        assert_eq!(depth[32 * 24 - 1], 0);

        let (cx, cy) = (disc.cx as usize, disc.cy as usize);
        let center = depth[cy * 32 + cx];
        assert!((BODY_MM - 4..=BODY_MM + 4).contains(&center), "got {center}");
    }

    #[test]
    fn test_body_index_matches_disc() {
        let disc = BodyDisc::at(32, 24, 10);
        let mut index = vec![0u8; 32 * 24];
        fill_body_index(&mut index, 32, &disc);
        let on = index.iter().filter(|&&v| v == 0).count();
        assert!(on > 0);
        assert!(index.iter().all(|&v| v == 0 || v == NO_BODY));
    }

    #[test]
    fn test_tiny_images_do_not_panic() {
        let disc = BodyDisc::at(1, 1, 0);
        let mut depth = vec![0u16; 1];
        fill_depth(&mut depth, 1, &disc, &mut frame_rng(0, 0));
        let mut color = vec![0u8; 4];
        fill_color(&mut color, 1, 1, 0);
        assert_eq!(color[3], 255);
    }
}
