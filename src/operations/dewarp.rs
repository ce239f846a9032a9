//! Fisheye lens distortion correction.
//!
//! Currently hardcoded with parameter values suitable for the Wyze v2
//! camera, but could be adapted. Correction is the classic barrel model
//! with subpixel (bilinear) interpolation; the output must be
//! byte-identical for identical input so that content-addressed
//! deduplication stays stable.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use rayon::prelude::*;

use crate::common::WORKER_RAYON_POOL;

const STRENGTH: f64 = 2.35;
const ZOOM: f64 = 1.00;
const EPSILON: f64 = 1e-10;

/// Correct fisheye distortion in a still image and re-encode it as JPEG.
pub fn dewarp_fisheye(bytes: &[u8]) -> Result<Vec<u8>> {
    let src = image::load_from_memory(bytes)
        .context("failed to decode image for dewarp")?
        .to_rgba16();
    let (width, height) = src.dimensions();

    let half_x = f64::from(width / 2);
    let half_y = f64::from(height / 2);
    let corr_rad =
        (f64::from(width) * f64::from(width) + f64::from(height) * f64::from(height)).sqrt() / STRENGTH;
    let max_x = f64::from(width - 1);
    let max_y = f64::from(height - 1);

    // a clamped subpixel sample of the source image
    let sample = |x: f64, y: f64| -> &Rgba<u16> {
        let x = x.clamp(0.0, max_x) as u32;
        let y = y.clamp(0.0, max_y) as u32;
        src.get_pixel(x, y)
    };

    let mut dest: ImageBuffer<Rgba<u16>, Vec<u16>> = ImageBuffer::new(width, height);
    let row_len = width as usize * 4;
    let dest_buf: &mut [u16] = &mut dest;

    WORKER_RAYON_POOL.install(|| {
        dest_buf
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| {
                let abs_y = y as f64 - half_y;
                for x in 0..width as usize {
                    let abs_x = x as f64 - half_x;

                    let dist = (abs_x * abs_x + abs_y * abs_y).sqrt();
                    let r = dist / corr_rad;
                    let theta = if r > EPSILON { r.atan() / r } else { 1.0 };

                    let src_x = half_x + theta * abs_x * ZOOM;
                    let src_y = half_y + theta * abs_y * ZOOM;

                    // (src_x, src_y) points between pixels; weight the four
                    // neighbors by proximity
                    let lo_x = src_x.floor();
                    let d_x = src_x - lo_x;
                    let lo_y = src_y.floor();
                    let d_y = src_y - lo_y;

                    let mut acc = [0.0f64; 4];
                    for (sx, sy, weight) in [
                        (lo_x, lo_y, (1.0 - d_x) * (1.0 - d_y)),
                        (lo_x + 1.0, lo_y, d_x * (1.0 - d_y)),
                        (lo_x, lo_y + 1.0, (1.0 - d_x) * d_y),
                        (lo_x + 1.0, lo_y + 1.0, d_x * d_y),
                    ] {
                        let px = sample(sx, sy);
                        for (channel, value) in acc.iter_mut().zip(px.0) {
                            *channel += f64::from(value) * weight;
                        }
                    }

                    let base = x * 4;
                    for (offset, channel) in acc.iter().enumerate() {
                        row[base + offset] = channel.round() as u16;
                    }
                }
            });
    });

    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba16(dest)
        .to_rgb8()
        .write_to(&mut out, ImageFormat::Jpeg)
        .context("failed to re-encode dewarped image as JPEG")?;
    Ok(out.into_inner())
}
