//! Owned pixel buffers.

use common::color::Color;
use common::error::{EngineError, EngineResult};
use common::geometry::{PixelRect, Size};

/// Largest allowed canvas edge. Keeps a bad resize request from trying to
/// reserve tens of gigabytes before `try_reserve` ever sees it.
pub const MAX_SURFACE_DIM: u32 = 16_384;

/// RGBA8 pixel buffer with straight alpha.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterSurface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterSurface {
    /// Allocate a transparent surface.
    ///
    /// Fails with [`EngineError::SurfaceAllocation`] when the dimensions are
    /// out of range or the buffer cannot be reserved.
    pub fn new(width: u32, height: u32) -> EngineResult<Self> {
        let len = surface_len(width, height, 4)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| EngineError::SurfaceAllocation { width, height })?;
        data.resize(len, 0);
        Ok(Self { width, height, data })
    }

    /// Wrap existing RGBA bytes. The byte length must match the dimensions.
    pub fn from_bytes(width: u32, height: u32, data: Vec<u8>) -> EngineResult<Self> {
        let len = surface_len(width, height, 4)?;
        if data.len() != len {
            return Err(EngineError::invalid(format!(
                "pixel data length {} does not match {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self { width, height, data })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    #[inline]
    pub fn bounds(&self) -> PixelRect {
        PixelRect::new(0, 0, self.width, self.height)
    }

    /// Get pixel at position. Out-of-bounds reads are transparent.
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Color {
        if x >= self.width || y >= self.height {
            return Color::TRANSPARENT;
        }
        let offset = ((y * self.width + x) * 4) as usize;
        Color::rgba(
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        )
    }

    /// Set pixel at position. Out-of-bounds writes are dropped.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = ((y * self.width + x) * 4) as usize;
        self.data[offset] = color.r;
        self.data[offset + 1] = color.g;
        self.data[offset + 2] = color.b;
        self.data[offset + 3] = color.a;
    }

    /// Alpha-over blend a pixel onto the surface.
    #[inline]
    pub fn blend_pixel(&mut self, x: u32, y: u32, color: Color) {
        if x >= self.width || y >= self.height || color.a == 0 {
            return;
        }
        let existing = self.get_pixel(x, y);
        self.set_pixel(x, y, color.blend_over(existing));
    }

    /// Fill the whole surface with a color.
    pub fn fill(&mut self, color: Color) {
        for chunk in self.data.chunks_exact_mut(4) {
            chunk[0] = color.r;
            chunk[1] = color.g;
            chunk[2] = color.b;
            chunk[3] = color.a;
        }
    }

    /// Fill a rectangular region, clipped to the surface bounds.
    pub fn fill_rect(&mut self, rect: PixelRect, color: Color) {
        let rect = rect.clamp_to(self.size());
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                self.set_pixel(x as u32, y as u32, color);
            }
        }
    }

    /// Clear to transparent.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Clear a rectangular region to transparent.
    pub fn clear_rect(&mut self, rect: PixelRect) {
        let rect = rect.clamp_to(self.size());
        for y in rect.y..rect.bottom() {
            let row = (y as u32 * self.width + rect.x as u32) as usize * 4;
            self.data[row..row + rect.width as usize * 4].fill(0);
        }
    }

    /// Copy a region from another surface at the same position.
    ///
    /// Clipped to both surfaces' bounds.
    pub fn copy_region(&mut self, src: &RasterSurface, rect: PixelRect) {
        let rect = rect.clamp_to(self.size()).clamp_to(src.size());
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                let (x, y) = (x as u32, y as u32);
                self.set_pixel(x, y, src.get_pixel(x, y));
            }
        }
    }

    /// Raw RGBA bytes, row-major.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Mutable rows for parallel processing: `(row_index, row_bytes)`.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = (u32, &mut [u8])> {
        let width = self.width;
        self.data
            .chunks_exact_mut(width as usize * 4)
            .enumerate()
            .map(|(y, row)| (y as u32, row))
    }
}

/// Single-channel f32 buffer used for masks and height fields.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelSurface {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl ChannelSurface {
    pub fn new(width: u32, height: u32) -> EngineResult<Self> {
        let len = surface_len(width, height, 1)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| EngineError::SurfaceAllocation { width, height })?;
        data.resize(len, 0.0);
        Ok(Self { width, height, data })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Get value at position. Out-of-bounds reads are 0.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.data[(y * self.width + x) as usize]
    }

    /// Get value at position, clamping coordinates to the edge.
    ///
    /// Used for finite-difference gradients at the border.
    #[inline]
    pub fn get_clamped(&self, x: i64, y: i64) -> f32 {
        if self.width == 0 || self.height == 0 {
            return 0.0;
        }
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        self.data[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        if x >= self.width || y >= self.height {
            return;
        }
        self.data[(y * self.width + x) as usize] = value;
    }

    /// Max-composite a value into the channel ("lighten").
    #[inline]
    pub fn set_max(&mut self, x: u32, y: u32, value: f32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = (y * self.width + x) as usize;
        if value > self.data[idx] {
            self.data[idx] = value;
        }
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

fn surface_len(width: u32, height: u32, channels: usize) -> EngineResult<usize> {
    if width == 0 || height == 0 || width > MAX_SURFACE_DIM || height > MAX_SURFACE_DIM {
        return Err(EngineError::SurfaceAllocation { width, height });
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(channels))
        .ok_or(EngineError::SurfaceAllocation { width, height })
}
