use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use dispatch::CancelFlag;
use protocol::{ChunkResult, ComputeParams, Message, PixelResult};
use render::{ChunkGrid, Complex, Region, shade};
use tracing::{debug, info, warn};
use transport::WritePort;

use crate::bitmap::Bitmap;
use crate::dispatcher::Dispatcher;
use crate::keyboard::Key;
use crate::screen::{Screen, WindowState};
use crate::{ControlConfig, EXPORT_PATH};

struct View {
    grid: ChunkGrid,
    region: Region,
    c: Complex,
    n_max: u8,
    bitmap: Bitmap,
}

struct Surface {
    screen: Box<dyn Screen>,
    window: WindowState,
}

/// The controller: view state, chunk dispatch, and command handling.
///
/// One instance is shared between the pipe-reader thread (feeding
/// [`Controller::handle_message`]) and the keyboard thread (feeding
/// [`Controller::handle_key`]); internal locks keep the two sides
/// consistent.
pub struct Controller {
    dispatcher: Dispatcher,
    view: Mutex<View>,
    surface: Mutex<Surface>,
}

impl Controller {
    /// Builds a controller from its configuration and display surface.
    #[must_use]
    pub fn new(config: &ControlConfig, screen: Box<dyn Screen>) -> Self {
        let grid = config.grid;
        Self {
            dispatcher: Dispatcher::new(),
            view: Mutex::new(View {
                grid,
                region: config.region,
                c: config.c,
                n_max: config.iterations,
                bitmap: Bitmap::new(grid.width(), grid.height()),
            }),
            surface: Mutex::new(Surface {
                screen,
                window: WindowState::NotInitiated,
            }),
        }
    }

    /// Access to the dispatch engine, mainly for inspection.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Reads one bitmap pixel; `None` outside the image.
    #[must_use]
    pub fn pixel(&self, row: usize, col: usize) -> Option<[u8; 3]> {
        self.view_lock().bitmap.pixel(row, col)
    }

    /// Reacts to one frame from the module.
    pub fn handle_message(&self, message: Message, out: &WritePort, quit: &CancelFlag) {
        match message {
            Message::Startup(startup) => {
                info!(
                    identifier = %String::from_utf8_lossy(startup.identifier()),
                    workers = startup.worker_count(),
                    "module startup"
                );
                self.dispatcher.on_startup(&startup);
            }
            Message::Ok => info!("module responded OK"),
            Message::Error => warn!("module responded ERROR"),
            Message::Version(version) => info!(%version, "module version"),
            Message::Done => {
                debug!("module finished a chunk");
                self.dispatcher.on_done(out);
                self.redraw_if_active();
            }
            Message::Abort => {
                info!("module aborted computation");
                self.dispatcher.on_abort_confirmed();
            }
            Message::ComputeData(pixel) => self.apply_pixel(pixel),
            Message::ComputeDataBurst(burst) => {
                self.apply_burst(burst);
                self.redraw_if_active();
            }
            Message::Quit => {
                info!("module requested quit");
                quit.raise();
            }
            unexpected => {
                warn!(tag = %unexpected.tag(), "unexpected message from module");
            }
        }
    }

    /// Reacts to one keypress.
    pub fn handle_key(&self, key: Key, out: &WritePort, quit: &CancelFlag) {
        match key {
            Key::Char(b'q') => {
                info!("quitting controller");
                quit.raise();
                if out.send(&Message::Quit).is_err() {
                    warn!("quit notice not delivered to module");
                }
                let mut surface = self.surface_lock();
                if surface.window == WindowState::Active {
                    surface.screen.close();
                    surface.window = WindowState::Closed;
                }
            }
            Key::Char(b'g') => {
                info!("requesting module version");
                self.send(out, &Message::GetVersion);
            }
            Key::Char(b's') => {
                info!("installing computation parameters");
                self.set_compute(out);
            }
            Key::Char(b'1') => {
                let view = self.view_lock();
                self.dispatcher.request_compute(out, &view.grid, &view.region);
            }
            Key::Char(b'a') => {
                info!("requesting abort");
                self.dispatcher.abort(out);
            }
            Key::Char(b'w') => self.open_window(),
            Key::Char(b'r') => self.redraw_or_warn(),
            Key::Char(b'c') => self.close_window(),
            Key::Char(b'e') => {
                info!("erasing bitmap");
                self.view_lock().bitmap.erase();
                self.redraw_if_active();
            }
            Key::Char(b'x') => self.export(Path::new(EXPORT_PATH)),
            Key::Char(b'p') => self.log_parameters(),
            Key::Char(b'+') => self.rescale(out, |region| region.zoomed(0.8)),
            Key::Char(b'-') => self.rescale(out, |region| region.zoomed(1.25)),
            Key::Up => self.rescale(out, |region| region.panned(0.0, region.span_im() * 0.1)),
            Key::Down => self.rescale(out, |region| region.panned(0.0, -region.span_im() * 0.1)),
            Key::Right => self.rescale(out, |region| region.panned(region.span_re() * 0.1, 0.0)),
            Key::Left => self.rescale(out, |region| region.panned(-region.span_re() * 0.1, 0.0)),
            Key::Char(b'h') => {
                eprintln!(
                    "keys: q quit | h help | g version | s set params | 1 compute | a abort\n      w window | r redraw | c close | e erase | x export png | p params\n      +/- zoom | arrows pan"
                );
            }
            Key::Char(_) => {}
        }
    }

    /// Exports the bitmap as PNG.
    pub fn export(&self, path: &Path) {
        let view = self.view_lock();
        match view.bitmap.export_png(path) {
            Ok(()) => info!(path = %path.display(), "bitmap exported"),
            Err(err) => warn!(path = %path.display(), %err, "export failed"),
        }
    }

    fn set_compute(&self, out: &WritePort) {
        self.dispatcher.purge_for_new_parameters();
        let view = self.view_lock();
        let step = view.region.pixel_step(view.grid.width(), view.grid.height());
        let params = ComputeParams {
            c_re: view.c.re,
            c_im: view.c.im,
            d_re: step.re,
            d_im: step.im,
            n: view.n_max,
        };
        drop(view);
        self.send(out, &Message::SetCompute(params));
    }

    /// Applies `transform` to the viewing region, then re-installs the
    /// parameters and starts a fresh computation, as if the user had
    /// pressed `s` and `1`.
    fn rescale(&self, out: &WritePort, transform: impl FnOnce(&Region) -> Region) {
        {
            let mut view = self.view_lock();
            view.region = transform(&view.region);
        }
        self.set_compute(out);
        let view = self.view_lock();
        self.dispatcher.request_compute(out, &view.grid, &view.region);
    }

    fn apply_pixel(&self, pixel: PixelResult) {
        let mut view = self.view_lock();
        let View {
            grid,
            n_max,
            bitmap,
            ..
        } = &mut *view;
        match grid.pixel_for_chunk_coords(pixel.chunk_id, pixel.i_re, pixel.i_im) {
            Some((row, col)) => bitmap.set_pixel(row, col, shade(pixel.iter, *n_max)),
            None => warn!(
                chunk = pixel.chunk_id,
                i_re = pixel.i_re,
                i_im = pixel.i_im,
                "pixel result outside the bitmap"
            ),
        }
    }

    fn apply_burst(&self, burst: ChunkResult) {
        let mut view = self.view_lock();
        let View {
            grid,
            n_max,
            bitmap,
            ..
        } = &mut *view;
        let (chunk_id, iters) = burst.into_parts();
        let mut misplaced = 0usize;
        for (i, &iter) in iters.iter().enumerate() {
            match grid.pixel_for_burst_offset(chunk_id, i) {
                Some((row, col)) => bitmap.set_pixel(row, col, shade(iter, *n_max)),
                None => misplaced += 1,
            }
        }
        if misplaced > 0 {
            warn!(chunk = chunk_id, misplaced, "burst pixels outside the bitmap");
        }
        debug!(chunk = chunk_id, pixels = iters.len(), "burst applied");
    }

    fn open_window(&self) {
        let mut surface = self.surface_lock();
        if surface.window != WindowState::NotInitiated {
            warn!("window has already been initialized in this session");
            return;
        }
        let view = self.view_lock();
        match surface.screen.open(view.bitmap.width(), view.bitmap.height()) {
            Ok(()) => {
                surface.window = WindowState::Active;
                surface
                    .screen
                    .redraw(view.bitmap.width(), view.bitmap.height(), view.bitmap.data());
            }
            Err(err) => warn!(%err, "window initialization failed"),
        }
    }

    fn close_window(&self) {
        let mut surface = self.surface_lock();
        if surface.window != WindowState::Active {
            warn!("window is not active");
            return;
        }
        surface.screen.close();
        surface.window = WindowState::Closed;
    }

    fn redraw_or_warn(&self) {
        let mut surface = self.surface_lock();
        if surface.window != WindowState::Active {
            warn!("window is not active");
            return;
        }
        let view = self.view_lock();
        surface
            .screen
            .redraw(view.bitmap.width(), view.bitmap.height(), view.bitmap.data());
    }

    fn redraw_if_active(&self) {
        let mut surface = self.surface_lock();
        if surface.window == WindowState::Active {
            let view = self.view_lock();
            surface
                .screen
                .redraw(view.bitmap.width(), view.bitmap.height(), view.bitmap.data());
        }
    }

    fn log_parameters(&self) {
        let view = self.view_lock();
        info!(
            width = view.grid.width(),
            height = view.grid.height(),
            re_min = view.region.lower_left.re,
            im_min = view.region.lower_left.im,
            re_max = view.region.upper_right.re,
            im_max = view.region.upper_right.im,
            c_re = view.c.re,
            c_im = view.c.im,
            iterations = view.n_max,
            "current parameters"
        );
    }

    fn send(&self, out: &WritePort, message: &Message) {
        if let Err(err) = out.send(message) {
            warn!(tag = %message.tag(), %err, "message not delivered");
        }
    }

    fn view_lock(&self) -> MutexGuard<'_, View> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn surface_lock(&self) -> MutexGuard<'_, Surface> {
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
