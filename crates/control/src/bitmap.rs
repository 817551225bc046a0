use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

/// An owned RGB pixel buffer, three bytes per pixel, rows top to bottom.
#[derive(Clone, Debug)]
pub struct Bitmap {
    width: usize,
    height: usize,
    rgb: Vec<u8>,
}

impl Bitmap {
    /// Allocates a black bitmap of `width` × `height` pixels.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            rgb: vec![0; width * height * 3],
        }
    }

    /// Bitmap width in pixels.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Bitmap height in pixels.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Raw RGB bytes, row-major from the top row.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.rgb
    }

    /// Zeroes every pixel.
    pub fn erase(&mut self) {
        self.rgb.fill(0);
    }

    /// Writes one pixel; out-of-bounds coordinates are ignored.
    pub fn set_pixel(&mut self, row: usize, col: usize, rgb: [u8; 3]) {
        if row >= self.height || col >= self.width {
            return;
        }
        let idx = (row * self.width + col) * 3;
        self.rgb[idx..idx + 3].copy_from_slice(&rgb);
    }

    /// Reads one pixel, or `None` outside the bitmap.
    #[must_use]
    pub fn pixel(&self, row: usize, col: usize) -> Option<[u8; 3]> {
        if row >= self.height || col >= self.width {
            return None;
        }
        let idx = (row * self.width + col) * 3;
        Some([self.rgb[idx], self.rgb[idx + 1], self.rgb[idx + 2]])
    }

    /// Encodes the bitmap as an 8-bit RGB PNG at `path`.
    pub fn export_png(&self, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        let mut encoder = png::Encoder::new(
            BufWriter::new(file),
            self.width as u32,
            self.height as u32,
        );
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().map_err(into_io)?;
        writer.write_image_data(&self.rgb).map_err(into_io)?;
        Ok(())
    }
}

fn into_io(err: png::EncodingError) -> io::Error {
    match err {
        png::EncodingError::IoError(err) => err,
        other => io::Error::other(other),
    }
}
