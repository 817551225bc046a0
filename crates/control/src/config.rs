use std::path::PathBuf;

use clap::{Arg, Command};
use render::{ChunkGrid, Complex, Region};
use tracing::warn;

use crate::{CHUNK_HEIGHT, CHUNK_WIDTH, DEFAULT_ITERATIONS};

/// Runtime configuration of the controller.
///
/// Every numeric argument is bounds-checked; anything invalid falls back
/// to its default with a warning so a typo never prevents startup.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlConfig {
    /// FIFO the controller writes (controller to module).
    pub to_module: PathBuf,
    /// FIFO the controller reads (module to controller).
    pub from_module: PathBuf,
    /// Chunk decomposition of the image.
    pub grid: ChunkGrid,
    /// Viewing region of the complex plane.
    pub region: Region,
    /// Recursive constant of the escape-time iteration.
    pub c: Complex,
    /// Iteration cap per pixel.
    pub iterations: u8,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            to_module: PathBuf::from("/tmp/computational_module.in"),
            from_module: PathBuf::from("/tmp/computational_module.out"),
            grid: ChunkGrid::new(CHUNK_WIDTH, CHUNK_HEIGHT, 10, 10),
            region: Region::new(Complex::new(-1.6, -1.1), Complex::new(1.6, 1.1)),
            c: Complex::new(-0.4, 0.6),
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl ControlConfig {
    /// Parses positional arguments:
    /// `[to_module from_module [width height [re_min im_min re_max im_max [c_re c_im [iterations]]]]]`.
    ///
    /// Image dimensions must be multiples of the chunk size with at most
    /// 16 chunks per axis so chunk ids fit one byte; region corners must
    /// be finite with the minimum strictly below the maximum.
    #[must_use]
    pub fn from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let names = [
            "to_module",
            "from_module",
            "width",
            "height",
            "re_min",
            "im_min",
            "re_max",
            "im_max",
            "c_re",
            "c_im",
            "iterations",
        ];
        let mut command = Command::new("control-app")
            .about("Interactive controller; drives the compute module over two named FIFOs");
        for name in names {
            // Region corners and the constant are routinely negative.
            command = command.arg(Arg::new(name).allow_hyphen_values(true));
        }
        let matches = command.get_matches_from(args);
        let get = |name: &str| matches.get_one::<String>(name);

        let mut config = Self::default();

        if let (Some(to_module), Some(from_module)) = (get("to_module"), get("from_module")) {
            config.to_module = PathBuf::from(to_module);
            config.from_module = PathBuf::from(from_module);
        }

        if let (Some(width), Some(height)) = (get("width"), get("height")) {
            match parse_grid(width, height) {
                Some(grid) => config.grid = grid,
                None => warn!(
                    width = width.as_str(),
                    height = height.as_str(),
                    "invalid image dimensions; using defaults"
                ),
            }
        }

        let corners = ["re_min", "im_min", "re_max", "im_max"].map(get);
        if let [Some(re_min), Some(im_min), Some(re_max), Some(im_max)] = corners {
            match parse_region(re_min, im_min, re_max, im_max) {
                Some(region) => config.region = region,
                None => warn!("invalid region corners; using defaults"),
            }
        }

        if let (Some(c_re), Some(c_im)) = (get("c_re"), get("c_im")) {
            match parse_constant(c_re, c_im) {
                Some(c) => config.c = c,
                None => warn!("invalid recursive constant; using default"),
            }
        }

        if let Some(raw) = get("iterations") {
            match raw.parse::<u8>() {
                Ok(n) if n > 0 => config.iterations = n,
                _ => warn!(
                    iterations = raw.as_str(),
                    "invalid iteration cap; using default"
                ),
            }
        }

        config
    }
}

fn parse_grid(width: &str, height: &str) -> Option<ChunkGrid> {
    let width: usize = width.parse().ok()?;
    let height: usize = height.parse().ok()?;
    let chunk_w = usize::from(CHUNK_WIDTH);
    let chunk_h = usize::from(CHUNK_HEIGHT);
    if width == 0 || height == 0 || width % chunk_w != 0 || height % chunk_h != 0 {
        return None;
    }
    let chunks_in_row = width / chunk_w;
    let chunks_in_col = height / chunk_h;
    // 16 x 16 chunks keep every chunk id within one byte.
    if chunks_in_row > 16 || chunks_in_col > 16 {
        return None;
    }
    Some(ChunkGrid::new(
        CHUNK_WIDTH,
        CHUNK_HEIGHT,
        chunks_in_row as u8,
        chunks_in_col as u8,
    ))
}

fn parse_region(re_min: &str, im_min: &str, re_max: &str, im_max: &str) -> Option<Region> {
    let re_min: f64 = re_min.parse().ok()?;
    let im_min: f64 = im_min.parse().ok()?;
    let re_max: f64 = re_max.parse().ok()?;
    let im_max: f64 = im_max.parse().ok()?;
    let all_finite = [re_min, im_min, re_max, im_max]
        .iter()
        .all(|v| v.is_finite());
    if !all_finite || re_min >= re_max || im_min >= im_max {
        return None;
    }
    Some(Region::new(
        Complex::new(re_min, im_min),
        Complex::new(re_max, im_max),
    ))
}

fn parse_constant(c_re: &str, c_im: &str) -> Option<Complex> {
    let c_re: f64 = c_re.parse().ok()?;
    let c_im: f64 = c_im.parse().ok()?;
    if !c_re.is_finite() || !c_im.is_finite() || (c_re == 0.0 && c_im == 0.0) {
        return None;
    }
    Some(Complex::new(c_re, c_im))
}
