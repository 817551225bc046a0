use tracing::{debug, info};

/// Narrow interface to the display surface.
///
/// The actual windowing toolkit lives outside this crate; the controller
/// only ever opens a surface, pushes the full bitmap at it, and closes it.
pub trait Screen: Send {
    /// Brings up a surface of `width` × `height` pixels.
    fn open(&mut self, width: usize, height: usize) -> std::io::Result<()>;

    /// Presents the RGB buffer (row-major from the top row).
    fn redraw(&mut self, width: usize, height: usize, rgb: &[u8]);

    /// Tears the surface down.
    fn close(&mut self);
}

/// Default surface: logs requests instead of opening a window.
///
/// Useful headless and in tests; the PNG export is the pixel-accurate
/// output path.
#[derive(Debug, Default)]
pub struct LogScreen;

impl Screen for LogScreen {
    fn open(&mut self, width: usize, height: usize) -> std::io::Result<()> {
        info!(width, height, "window opened");
        Ok(())
    }

    fn redraw(&mut self, width: usize, height: usize, _rgb: &[u8]) {
        debug!(width, height, "redraw requested");
    }

    fn close(&mut self) {
        info!("window closed");
    }
}

/// Lifecycle of the display surface within one controller session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowState {
    /// No window has been opened yet.
    NotInitiated,
    /// The window is up and accepts redraws.
    Active,
    /// The window was open earlier and has been closed.
    Closed,
}
