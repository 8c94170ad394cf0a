//! Synthetic frames for tests.

use image::imageops;
use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BLOCK: u32 = 5;

/// Blurred random-block texture: dense corners, smooth enough for flow.
pub(crate) fn textured_canvas(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let cols = width.div_ceil(BLOCK);
    let rows = height.div_ceil(BLOCK);
    let shades: Vec<u8> = (0..cols * rows).map(|_| rng.gen()).collect();
    let blocks = GrayImage::from_fn(width, height, |x, y| {
        Luma([shades[((y / BLOCK) * cols + x / BLOCK) as usize]])
    });
    imageops::blur(&blocks, 1.2)
}

/// Two `width` x `height` views of one texture; the second is taken `dx`, `dy`
/// pixels further right and down, so content appears to move by `(-dx, -dy)`.
pub(crate) fn shifted_pair(width: u32, height: u32, dx: u32, dy: u32, seed: u64) -> (GrayImage, GrayImage) {
    let canvas = textured_canvas(width + dx, height + dy, seed);
    let prev = imageops::crop_imm(&canvas, 0, 0, width, height).to_image();
    let next = imageops::crop_imm(&canvas, dx, dy, width, height).to_image();
    (prev, next)
}
