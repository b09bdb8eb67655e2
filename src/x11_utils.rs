use anyhow::{Context, Result};
use tracing::{debug, warn};
use x11rb::protocol::randr::ConnectionExt as RandrExt;
use x11rb::protocol::render::{ConnectionExt as RenderExt, Pictformat};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::constants::x11;
use crate::types::DisplayInfo;

/// Pre-cached X11 atoms to avoid repeated roundtrips
#[derive(Debug, Clone, Copy)]
pub struct CachedAtoms {
    pub wm_class: Atom,
    pub net_wm_state: Atom,
    pub net_wm_state_above: Atom,
    pub net_wm_window_type: Atom,
    pub net_wm_window_type_notification: Atom,
}

impl CachedAtoms {
    pub fn new(conn: &RustConnection) -> Result<Self> {
        // Do all intern_atom roundtrips once at startup
        Ok(Self {
            wm_class: intern(conn, "WM_CLASS")?,
            net_wm_state: intern(conn, "_NET_WM_STATE")?,
            net_wm_state_above: intern(conn, "_NET_WM_STATE_ABOVE")?,
            net_wm_window_type: intern(conn, "_NET_WM_WINDOW_TYPE")?,
            net_wm_window_type_notification: intern(conn, "_NET_WM_WINDOW_TYPE_NOTIFICATION")?,
        })
    }
}

fn intern(conn: &RustConnection, name: &str) -> Result<Atom> {
    Ok(conn
        .intern_atom(false, name.as_bytes())
        .with_context(|| format!("Failed to intern {} atom", name))?
        .reply()
        .with_context(|| format!("Failed to get reply for {} atom", name))?
        .atom)
}

#[tracing::instrument(skip(conn))]
pub fn get_pictformat(conn: &RustConnection, depth: u8, alpha: bool) -> Result<Pictformat> {
    if let Some(format) = conn
        .render_query_pict_formats()
        .context("Failed to query RENDER picture formats")?
        .reply()
        .context("Failed to get reply for RENDER picture formats query")?
        .formats
        .iter()
        .find(|format| {
            format.depth == depth
                && if alpha {
                    format.direct.alpha_mask != 0
                } else {
                    format.direct.alpha_mask == 0
                }
        })
    {
        debug!(
            "using Pictformat: {}, {}",
            format.depth, format.direct.alpha_mask
        );
        Ok(format.id)
    } else {
        anyhow::bail!("Could not find suitable picture format (depth={}, alpha={}). Check RENDER extension support.", depth, alpha)
    }
}

/// First TrueColor visual with 32-bit depth, needed for per-pixel alpha windows
pub fn find_argb_visual(screen: &Screen) -> Result<Visualid> {
    screen
        .allowed_depths
        .iter()
        .filter(|depth| depth.depth == x11::ARGB_DEPTH)
        .flat_map(|depth| depth.visuals.iter())
        .find(|visual| visual.class == VisualClass::TRUE_COLOR)
        .map(|visual| visual.visual_id)
        .context("No 32-bit TrueColor visual available. Is a compositing-capable X server running?")
}

/// Active monitors via RandR, or the whole root window if RandR cannot answer
pub fn active_monitors(conn: &RustConnection, screen: &Screen) -> Result<Vec<DisplayInfo>> {
    let reply = match conn.randr_get_monitors(screen.root, true) {
        Ok(cookie) => cookie.reply(),
        Err(e) => {
            warn!(error = %e, "RandR GetMonitors request failed, using the whole screen");
            return Ok(vec![whole_screen(screen)]);
        }
    };
    let reply = match reply {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "RandR GetMonitors reply failed, using the whole screen");
            return Ok(vec![whole_screen(screen)]);
        }
    };

    let mut displays = Vec::with_capacity(reply.monitors.len());
    for monitor in &reply.monitors {
        if monitor.width == 0 || monitor.height == 0 {
            continue;
        }
        let name = atom_name(conn, monitor.name).unwrap_or_else(|e| {
            debug!(atom = monitor.name, error = ?e, "Monitor name lookup failed");
            format!("monitor-{}", monitor.name)
        });
        displays.push(
            DisplayInfo::new(name, monitor.x, monitor.y, monitor.width, monitor.height)
                .with_primary(monitor.primary),
        );
    }
    Ok(displays)
}

fn whole_screen(screen: &Screen) -> DisplayInfo {
    DisplayInfo::new("screen", 0, 0, screen.width_in_pixels, screen.height_in_pixels).with_primary(true)
}

fn atom_name(conn: &RustConnection, atom: Atom) -> Result<String> {
    let reply = conn
        .get_atom_name(atom)
        .context("Failed to query atom name")?
        .reply()
        .context("Failed to get atom name reply")?;
    Ok(String::from_utf8_lossy(&reply.name).into_owned())
}
