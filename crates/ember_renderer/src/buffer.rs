//! Progressive frame buffer shared by all tile workers.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use ember_math::{UVec2, Vec2};

use crate::material::Color;

/// Apply gamma correction (gamma 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a linear color to gamma-corrected RGBA bytes.
pub fn color_to_rgba(color: Color) -> [u8; 4] {
    let r = (255.0 * linear_to_gamma(color.x).clamp(0.0, 1.0)) as u8;
    let g = (255.0 * linear_to_gamma(color.y).clamp(0.0, 1.0)) as u8;
    let b = (255.0 * linear_to_gamma(color.z).clamp(0.0, 1.0)) as u8;
    [r, g, b, 255]
}

#[derive(Default)]
struct Pixel {
    rgb: [AtomicU32; 3],
    writes: AtomicU32,
}

/// A fixed-size image written concurrently by tile workers.
///
/// Each pixel is stored as three relaxed atomic floats plus a write counter.
/// Tiles never overlap, so workers never contend on the same pixel.
pub struct RenderBuffer {
    size: UVec2,
    pixels: Vec<Pixel>,
}

impl RenderBuffer {
    /// Create a black buffer. Zero dimensions are clamped to one pixel.
    pub fn new(width: u32, height: u32) -> Self {
        let size = UVec2::new(width.max(1), height.max(1));
        let count = (size.x * size.y) as usize;
        Self {
            size,
            pixels: (0..count).map(|_| Pixel::default()).collect(),
        }
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    /// Width over height.
    pub fn aspect(&self) -> f32 {
        self.size.x as f32 / self.size.y as f32
    }

    fn pixel(&self, position: UVec2) -> &Pixel {
        debug_assert!(position.cmplt(self.size).all(), "pixel {position} out of {}", self.size);
        &self.pixels[(position.y * self.size.x + position.x) as usize]
    }

    pub fn get(&self, position: UVec2) -> Color {
        let pixel = self.pixel(position);
        Color::new(
            f32::from_bits(pixel.rgb[0].load(Ordering::Relaxed)),
            f32::from_bits(pixel.rgb[1].load(Ordering::Relaxed)),
            f32::from_bits(pixel.rgb[2].load(Ordering::Relaxed)),
        )
    }

    pub fn set(&self, position: UVec2, color: Color) {
        let pixel = self.pixel(position);
        for (channel, value) in pixel.rgb.iter().zip(color.to_array()) {
            channel.store(value.to_bits(), Ordering::Relaxed);
        }
        pixel.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// How many times `position` has been written since the last clear.
    pub fn write_count(&self, position: UVec2) -> u32 {
        self.pixel(position).writes.load(Ordering::Relaxed)
    }

    /// Reset every pixel to black and unwritten.
    pub fn clear(&self) {
        for pixel in &self.pixels {
            for channel in &pixel.rgb {
                channel.store(0, Ordering::Relaxed);
            }
            pixel.writes.store(0, Ordering::Relaxed);
        }
    }

    /// Map a (sub)pixel position to an aspect-corrected screen coordinate.
    ///
    /// The result spans [-0.5, 0.5] horizontally with y pointing up, so the
    /// buffer center maps to the origin.
    pub fn to_screen_uv(&self, position: Vec2) -> Vec2 {
        let uv = position / self.size.as_vec2() - Vec2::splat(0.5);
        Vec2::new(uv.x, -uv.y / self.aspect())
    }

    /// Gamma-corrected RGBA8 pixels in row-major order.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for y in 0..self.size.y {
            for x in 0..self.size.x {
                bytes.extend_from_slice(&color_to_rgba(self.get(UVec2::new(x, y))));
            }
        }
        bytes
    }

    /// Write the buffer to an image file; the format follows the extension.
    pub fn save(&self, path: impl AsRef<Path>) -> image::ImageResult<()> {
        image::save_buffer(
            path,
            &self.to_rgba(),
            self.size.x,
            self.size.y,
            image::ColorType::Rgba8,
        )
    }
}

impl std::fmt::Debug for RenderBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderBuffer").field("size", &self.size).finish()
    }
}
