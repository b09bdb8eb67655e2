//! X11 overlay windows
//!
//! Each overlay is an override-redirect ARGB window covering one monitor. The composed
//! frame lives in a server-side pixmap; presenting composites it onto the window through
//! a solid-fill alpha mask, so the whole frame fades as one unit.

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::errors::ConnectionError;
use x11rb::protocol::randr::ConnectionExt as RandrExt;
use x11rb::protocol::render::{Color, ConnectionExt as RenderExt, CreatePictureAux, PictOp, Pictformat, Picture};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as WrapperExt;

use crate::constants::{overlay, x11};
use crate::font::FontRenderer;
use crate::frame::{Canvas, FrameComposer};
use crate::lifecycle::OverlayLifecycle;
use crate::scheduler::{DisplayBackend, OverlaySurface};
use crate::types::DisplayInfo;
use crate::x11_utils::{active_monitors, find_argb_visual, get_pictformat, CachedAtoms};

/// Display backend on a live X11 connection
pub struct X11Backend<'a> {
    conn: &'a RustConnection,
    screen: &'a Screen,
    atoms: CachedAtoms,
    visual: Visualid,
    argb_format: Pictformat,
    font: Option<&'a FontRenderer>,
}

impl<'a> X11Backend<'a> {
    pub fn new(conn: &'a RustConnection, screen: &'a Screen, font: Option<&'a FontRenderer>) -> Result<Self> {
        match conn
            .randr_query_version(x11::RANDR_MAJOR, x11::RANDR_MINOR)
            .map(|cookie| cookie.reply())
        {
            Ok(Ok(version)) => debug!(major = version.major_version, minor = version.minor_version, "RandR available"),
            Ok(Err(e)) => warn!(error = %e, "RandR version query failed, monitor detection may fall back to the whole screen"),
            Err(e) => warn!(error = %e, "RandR extension unavailable, monitor detection will use the whole screen"),
        }

        Ok(Self {
            conn,
            screen,
            atoms: CachedAtoms::new(conn).context("Failed to cache X11 atoms")?,
            visual: find_argb_visual(screen)?,
            argb_format: get_pictformat(conn, x11::ARGB_DEPTH, true)
                .context("Failed to get ARGB picture format for overlays")?,
            font,
        })
    }
}

impl<'a> DisplayBackend for X11Backend<'a> {
    type Surface = OverlayWindow<'a>;

    fn displays(&self) -> Result<Vec<DisplayInfo>> {
        active_monitors(self.conn, self.screen)
    }

    fn create_surface(&self, lifecycle: &OverlayLifecycle) -> Result<OverlayWindow<'a>> {
        OverlayWindow::new(self, lifecycle)
    }
}

/// One overlay window and its render resources
pub struct OverlayWindow<'a> {
    display_name: String,
    width: u16,
    height: u16,

    window: Window,
    colormap: Colormap,
    gc: Gcontext,
    frame_pixmap: Pixmap,
    frame_picture: Picture,
    window_picture: Picture,

    composer: FrameComposer<'a>,
    conn: &'a RustConnection,
}

/// X resource created while building an overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum XResource {
    Colormap(Colormap),
    Window(Window),
    Pixmap(Pixmap),
    Gc(Gcontext),
    Picture(Picture),
}

impl XResource {
    fn free(self, conn: &RustConnection) -> Result<(), ConnectionError> {
        match self {
            XResource::Colormap(id) => conn.free_colormap(id).map(drop),
            XResource::Window(id) => conn.destroy_window(id).map(drop),
            XResource::Pixmap(id) => conn.free_pixmap(id).map(drop),
            XResource::Gc(id) => conn.free_gc(id).map(drop),
            XResource::Picture(id) => conn.render_free_picture(id).map(drop),
        }
    }
}

/// Resources in creation order
#[derive(Debug, Default)]
struct CreatedResources(Vec<XResource>);

impl CreatedResources {
    fn track(&mut self, resource: XResource) {
        self.0.push(resource);
    }

    /// Dependents first, the colormap last
    fn release_order(&self) -> impl Iterator<Item = XResource> + '_ {
        self.0.iter().rev().copied()
    }
}

/// Frees everything created so far if overlay construction fails part way
struct CreationGuard<'a> {
    conn: &'a RustConnection,
    display_name: String,
    created: CreatedResources,
    should_cleanup: bool,
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        if !self.should_cleanup {
            return;
        }
        for resource in self.created.release_order() {
            if let Err(e) = resource.free(self.conn) {
                error!("Failed to free {:?} for '{}' after initialization failure: {}",
                       resource, self.display_name, e);
            }
        }
        // Flush to ensure cleanup is sent to server
        let _ = self.conn.flush();
    }
}

impl<'a> OverlayWindow<'a> {
    fn create_window(backend: &X11Backend, guard: &mut CreationGuard, monitor: &DisplayInfo) -> Result<(Window, Colormap)> {
        let conn = backend.conn;
        let colormap = conn.generate_id()
            .context("Failed to generate X11 colormap ID")?;
        conn.create_colormap(ColormapAlloc::NONE, colormap, backend.screen.root, backend.visual)
            .context(format!("Failed to create colormap for '{}'", monitor.name))?;
        guard.created.track(XResource::Colormap(colormap));

        let window = conn.generate_id()
            .context("Failed to generate X11 window ID")?;
        conn.create_window(
            x11::ARGB_DEPTH,
            window,
            backend.screen.root,
            monitor.x,
            monitor.y,
            monitor.width,
            monitor.height,
            0,
            WindowClass::INPUT_OUTPUT,
            backend.visual,
            &CreateWindowAux::new()
                .background_pixel(0)
                .border_pixel(0)
                .colormap(colormap)
                .override_redirect(x11::OVERRIDE_REDIRECT)
                .event_mask(EventMask::EXPOSURE),
        )
        .context(format!("Failed to create overlay window for '{}'", monitor.name))?;
        guard.created.track(XResource::Window(window));

        Ok((window, colormap))
    }

    /// Window type, WM_CLASS and always-on-top, then raise and map
    fn setup_window_properties(backend: &X11Backend, window: Window, monitor: &DisplayInfo) -> Result<()> {
        let conn = backend.conn;
        let atoms = &backend.atoms;

        conn.change_property8(
            PropMode::REPLACE,
            window,
            atoms.wm_class,
            AtomEnum::STRING,
            x11::WM_CLASS,
        )
        .context(format!("Failed to set WM_CLASS for '{}'", monitor.name))?;

        conn.change_property32(
            PropMode::REPLACE,
            window,
            atoms.net_wm_window_type,
            AtomEnum::ATOM,
            &[atoms.net_wm_window_type_notification],
        )
        .context(format!("Failed to set window type for '{}'", monitor.name))?;

        conn.change_property32(
            PropMode::REPLACE,
            window,
            atoms.net_wm_state,
            AtomEnum::ATOM,
            &[atoms.net_wm_state_above],
        )
        .context(format!("Failed to set window always-on-top for '{}'", monitor.name))?;

        conn.configure_window(window, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))
            .context(format!("Failed to raise overlay window for '{}'", monitor.name))?;
        conn.map_window(window)
            .inspect_err(|e| error!("Failed to map overlay window {}: {:?}", window, e))
            .context(format!("Failed to map overlay window for '{}'", monitor.name))?;
        info!(window, monitor = %monitor.name, "Mapped overlay window");

        Ok(())
    }

    /// Frame pixmap plus pictures for it and the window
    fn create_render_resources(
        backend: &X11Backend,
        guard: &mut CreationGuard,
        window: Window,
        monitor: &DisplayInfo,
    ) -> Result<(Gcontext, Pixmap, Picture, Picture)> {
        let conn = backend.conn;

        let frame_pixmap = conn.generate_id()
            .context("Failed to generate ID for frame pixmap")?;
        conn.create_pixmap(x11::ARGB_DEPTH, frame_pixmap, window, monitor.width, monitor.height)
            .context(format!("Failed to create frame pixmap for '{}'", monitor.name))?;
        guard.created.track(XResource::Pixmap(frame_pixmap));

        let gc = conn.generate_id()
            .context("Failed to generate ID for graphics context")?;
        conn.create_gc(gc, frame_pixmap, &CreateGCAux::new())
            .context(format!("Failed to create graphics context for '{}'", monitor.name))?;
        guard.created.track(XResource::Gc(gc));

        let frame_picture = conn.generate_id()
            .context("Failed to generate ID for frame picture")?;
        conn.render_create_picture(frame_picture, frame_pixmap, backend.argb_format, &CreatePictureAux::new())
            .context(format!("Failed to create frame picture for '{}'", monitor.name))?;
        guard.created.track(XResource::Picture(frame_picture));

        let window_picture = conn.generate_id()
            .context("Failed to generate ID for window picture")?;
        conn.render_create_picture(window_picture, window, backend.argb_format, &CreatePictureAux::new())
            .context(format!("Failed to create window picture for '{}'", monitor.name))?;
        guard.created.track(XResource::Picture(window_picture));

        Ok((gc, frame_pixmap, frame_picture, window_picture))
    }

    pub fn new(backend: &X11Backend<'a>, lifecycle: &OverlayLifecycle) -> Result<Self> {
        let monitor = lifecycle.display();
        if monitor.width == 0 || monitor.height == 0 {
            anyhow::bail!(
                "Invalid overlay dimensions for '{}': {}x{} (must be non-zero)",
                monitor.name, monitor.width, monitor.height
            );
        }
        info!(
            monitor = %monitor.name,
            x = monitor.x,
            y = monitor.y,
            width = monitor.width,
            height = monitor.height,
            primary = monitor.primary,
            "Creating overlay"
        );

        let mut guard = CreationGuard {
            conn: backend.conn,
            display_name: monitor.name.clone(),
            created: CreatedResources::default(),
            should_cleanup: true,
        };

        let (window, colormap) = Self::create_window(backend, &mut guard, monitor)?;
        let (gc, frame_pixmap, frame_picture, window_picture) =
            Self::create_render_resources(backend, &mut guard, window, monitor)?;

        let composer = FrameComposer::new(
            monitor.width as u32,
            monitor.height as u32,
            lifecycle.snapshot().clone(),
            lifecycle.image().map(|image| image.as_ref()),
            backend.font,
        );

        let mut overlay = Self {
            display_name: monitor.name.clone(),
            width: monitor.width,
            height: monitor.height,
            window,
            colormap,
            gc,
            frame_pixmap,
            frame_picture,
            window_picture,
            composer,
            conn: backend.conn,
        };
        // From here on the overlay's Drop owns cleanup
        guard.should_cleanup = false;

        overlay.redraw()
            .context(format!("Failed to render initial frame for '{}'", overlay.display_name))?;
        Self::setup_window_properties(backend, window, monitor)?;

        Ok(overlay)
    }

    /// Copy a frame into the pixmap, split so no request exceeds the server limit
    fn upload(&self, frame: &Canvas) -> Result<()> {
        let bytes = frame.to_bgra_bytes();
        let row_bytes = self.width as usize * 4;
        let budget = self.conn.maximum_request_bytes().saturating_sub(x11::PUT_IMAGE_HEADER_BYTES);
        let rows_per_chunk = (budget / row_bytes).clamp(1, self.height as usize);

        for (index, chunk) in bytes.chunks(rows_per_chunk * row_bytes).enumerate() {
            let rows = chunk.len() / row_bytes;
            let y = index * rows_per_chunk;
            self.conn.put_image(
                ImageFormat::Z_PIXMAP,
                self.frame_pixmap,
                self.gc,
                self.width,
                rows as u16,
                0,
                y as i16,
                0,
                x11::ARGB_DEPTH,
                chunk,
            )
            .context(format!("Failed to upload frame rows {}..{} for '{}'", y, y + rows, self.display_name))?;
        }
        Ok(())
    }
}

impl OverlaySurface for OverlayWindow<'_> {
    fn redraw(&mut self) -> Result<()> {
        let clock = chrono::Local::now().format(overlay::CLOCK_FORMAT).to_string();
        if let Some(frame) = self.composer.compose(&clock) {
            debug!(display = %self.display_name, clock = %clock, "Uploading overlay frame");
            self.upload(&frame)?;
        }
        Ok(())
    }

    fn present(&mut self, opacity: f64) -> Result<()> {
        let alpha = (opacity.clamp(0.0, 1.0) * u16::MAX as f64).round() as u16;
        let mask = self.conn.generate_id()
            .context("Failed to generate ID for opacity mask")?;
        self.conn.render_create_solid_fill(mask, Color { red: 0, green: 0, blue: 0, alpha })
            .context(format!("Failed to create opacity mask for '{}'", self.display_name))?;
        self.conn.render_composite(
            PictOp::SRC,
            self.frame_picture,
            mask,
            self.window_picture,
            0,
            0,
            0,
            0,
            0,
            0,
            self.width,
            self.height,
        )
        .context(format!("Failed to composite frame for '{}'", self.display_name))?;
        self.conn.render_free_picture(mask)
            .context("Failed to free opacity mask")?;
        Ok(())
    }
}

impl Drop for OverlayWindow<'_> {
    fn drop(&mut self) {
        // Each resource is freed independently so one failure doesn't leak the rest

        if let Err(e) = self.conn.render_free_picture(self.window_picture) {
            error!("Failed to free window picture {}: {}", self.window_picture, e);
        }

        if let Err(e) = self.conn.render_free_picture(self.frame_picture) {
            error!("Failed to free frame picture {}: {}", self.frame_picture, e);
        }

        if let Err(e) = self.conn.free_gc(self.gc) {
            error!("Failed to free GC {}: {}", self.gc, e);
        }

        if let Err(e) = self.conn.free_pixmap(self.frame_pixmap) {
            error!("Failed to free pixmap {}: {}", self.frame_pixmap, e);
        }

        if let Err(e) = self.conn.destroy_window(self.window) {
            error!("Failed to destroy window {} for '{}': {}",
                   self.window, self.display_name, e);
        }

        if let Err(e) = self.conn.free_colormap(self.colormap) {
            error!("Failed to free colormap {}: {}", self.colormap, e);
        }

        if let Err(e) = self.conn.flush() {
            error!("Failed to flush X11 connection during cleanup: {}", e);
        }
        info!("Closed overlay on '{}'", self.display_name);
    }
}
