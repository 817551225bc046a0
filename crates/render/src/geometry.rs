use crate::kernel::Complex;

/// Rectangular viewing region of the complex plane.
///
/// `lower_left` and `upper_right` are the two corners; pixel (0, 0) of the
/// bitmap is the top-left corner of the image while complex coordinates
/// grow upward, so row indices and imaginary parts run in opposite
/// directions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    /// Corner with the smallest real and imaginary parts.
    pub lower_left: Complex,
    /// Corner with the largest real and imaginary parts.
    pub upper_right: Complex,
}

impl Region {
    /// Constructs a region from its two corners.
    #[inline]
    #[must_use]
    pub const fn new(lower_left: Complex, upper_right: Complex) -> Self {
        Self {
            lower_left,
            upper_right,
        }
    }

    /// Returns the per-pixel step `d` for an image of `width` × `height`
    /// pixels spanning this region.
    #[must_use]
    pub fn pixel_step(&self, width: usize, height: usize) -> Complex {
        Complex::new(
            (self.upper_right.re - self.lower_left.re) / width as f64,
            (self.upper_right.im - self.lower_left.im) / height as f64,
        )
    }

    /// Width of the region along the real axis.
    #[inline]
    #[must_use]
    pub fn span_re(&self) -> f64 {
        self.upper_right.re - self.lower_left.re
    }

    /// Height of the region along the imaginary axis.
    #[inline]
    #[must_use]
    pub fn span_im(&self) -> f64 {
        self.upper_right.im - self.lower_left.im
    }

    /// Returns the region's centre point.
    #[must_use]
    pub fn center(&self) -> Complex {
        Complex::new(
            (self.lower_left.re + self.upper_right.re) / 2.0,
            (self.lower_left.im + self.upper_right.im) / 2.0,
        )
    }

    /// Returns the region scaled by `factor` about its centre.
    ///
    /// Factors below 1 zoom in, factors above 1 zoom out.
    #[must_use]
    pub fn zoomed(&self, factor: f64) -> Self {
        let center = self.center();
        let half_w = (self.upper_right.re - self.lower_left.re) / 2.0 * factor;
        let half_h = (self.upper_right.im - self.lower_left.im) / 2.0 * factor;
        Self::new(
            Complex::new(center.re - half_w, center.im - half_h),
            Complex::new(center.re + half_w, center.im + half_h),
        )
    }

    /// Returns the region translated by `(d_re, d_im)`.
    #[must_use]
    pub fn panned(&self, d_re: f64, d_im: f64) -> Self {
        let shift = Complex::new(d_re, d_im);
        Self::new(self.lower_left + shift, self.upper_right + shift)
    }
}

/// The chunk decomposition of the image.
///
/// A chunk is a rectangular tile computed as one unit of work, addressed by
/// a one-byte chunk id. Ids are assigned `c_row * chunks_in_row + c_col`
/// scanning chunk rows top to bottom; each chunk's complex origin is its
/// own lower-left pixel.
///
/// # Examples
///
/// ```
/// use render::ChunkGrid;
///
/// let grid = ChunkGrid::new(64, 48, 10, 10);
/// assert_eq!(grid.width(), 640);
/// assert_eq!(grid.height(), 480);
/// assert_eq!(grid.chunk_count(), 100);
/// assert_eq!(grid.chunk_id(2, 3), 23);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkGrid {
    chunk_w: u8,
    chunk_h: u8,
    chunks_in_row: u8,
    chunks_in_col: u8,
}

impl ChunkGrid {
    /// Constructs a grid of `chunks_in_row` × `chunks_in_col` chunks, each
    /// `chunk_w` × `chunk_h` pixels.
    #[inline]
    #[must_use]
    pub const fn new(chunk_w: u8, chunk_h: u8, chunks_in_row: u8, chunks_in_col: u8) -> Self {
        Self {
            chunk_w,
            chunk_h,
            chunks_in_row,
            chunks_in_col,
        }
    }

    /// Chunk width in pixels.
    #[inline]
    #[must_use]
    pub const fn chunk_width(&self) -> u8 {
        self.chunk_w
    }

    /// Chunk height in pixels.
    #[inline]
    #[must_use]
    pub const fn chunk_height(&self) -> u8 {
        self.chunk_h
    }

    /// Number of chunks per image row.
    #[inline]
    #[must_use]
    pub const fn chunks_in_row(&self) -> u8 {
        self.chunks_in_row
    }

    /// Number of chunk rows in the image.
    #[inline]
    #[must_use]
    pub const fn chunks_in_col(&self) -> u8 {
        self.chunks_in_col
    }

    /// Image width in pixels.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> usize {
        self.chunk_w as usize * self.chunks_in_row as usize
    }

    /// Image height in pixels.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> usize {
        self.chunk_h as usize * self.chunks_in_col as usize
    }

    /// Total number of chunks.
    #[inline]
    #[must_use]
    pub const fn chunk_count(&self) -> usize {
        self.chunks_in_row as usize * self.chunks_in_col as usize
    }

    /// Number of pixels per chunk.
    #[inline]
    #[must_use]
    pub const fn pixels_per_chunk(&self) -> usize {
        self.chunk_w as usize * self.chunk_h as usize
    }

    /// Returns the id of the chunk at grid position (`c_row`, `c_col`).
    #[inline]
    #[must_use]
    pub const fn chunk_id(&self, c_row: u8, c_col: u8) -> u8 {
        c_row * self.chunks_in_row + c_col
    }

    /// Returns the lower-left complex origin of the chunk at
    /// (`c_row`, `c_col`), given the region corner and pixel step.
    ///
    /// Chunk rows scan top to bottom while imaginary parts grow upward, so
    /// row 0 sits `chunks_in_col - 1` chunk heights above the region's
    /// lower-left corner.
    #[must_use]
    pub fn chunk_origin(&self, lower_left: Complex, step: Complex, c_row: u8, c_col: u8) -> Complex {
        Complex::new(
            lower_left.re + f64::from(c_col) * f64::from(self.chunk_w) * step.re,
            lower_left.im
                + f64::from(self.chunks_in_col - 1 - c_row) * f64::from(self.chunk_h) * step.im,
        )
    }

    /// Maps a burst offset to bitmap coordinates.
    ///
    /// Offset `i` indexes the chunk's iteration buffer in row-major,
    /// bottom-to-top order. Returns `None` when the chunk id or the
    /// resulting pixel falls outside the image.
    #[must_use]
    pub fn pixel_for_burst_offset(&self, chunk_id: u8, i: usize) -> Option<(usize, usize)> {
        if i >= self.pixels_per_chunk() {
            return None;
        }
        let chunk_row = usize::from(chunk_id) / usize::from(self.chunks_in_row);
        let chunk_col = usize::from(chunk_id) % usize::from(self.chunks_in_row);
        let chunk_w = usize::from(self.chunk_w);
        let chunk_h = usize::from(self.chunk_h);

        let ll_row_px = (chunk_row + 1) * chunk_h - 1;
        let ll_col_px = chunk_col * chunk_w;
        let row = ll_row_px.checked_sub(i / chunk_w)?;
        let col = ll_col_px + i % chunk_w;
        (row < self.height() && col < self.width()).then_some((row, col))
    }

    /// Maps a single-pixel result `(i_re, i_im)` within `chunk_id` to
    /// bitmap coordinates, with `i_im` counted from the chunk's bottom.
    #[must_use]
    pub fn pixel_for_chunk_coords(&self, chunk_id: u8, i_re: u8, i_im: u8) -> Option<(usize, usize)> {
        if i_re >= self.chunk_w || i_im >= self.chunk_h {
            return None;
        }
        let chunk_row = usize::from(chunk_id) / usize::from(self.chunks_in_row);
        let chunk_col = usize::from(chunk_id) % usize::from(self.chunks_in_row);

        let row = chunk_row * usize::from(self.chunk_h) + usize::from(self.chunk_h) - 1
            - usize::from(i_im);
        let col = chunk_col * usize::from(self.chunk_w) + usize::from(i_re);
        (row < self.height() && col < self.width()).then_some((row, col))
    }
}
