//! X11 platform implementation for overlay windows
//!
//! Uses XCB via x11rb for a transparent, always-on-top window covering one
//! monitor. Input passes through (empty input shape). Requires a compositor
//! for transparency; under Wayland this runs through XWayland.

use std::fs::File;
use std::os::fd::AsFd;

use rustix::fs::{MemfdFlags, memfd_create};
use rustix::mm::{MapFlags, ProtFlags, mmap};
use tracing::debug;
use x11rb::atom_manager;
use x11rb::connection::Connection;
use x11rb::protocol::randr::ConnectionExt as _;
use x11rb::protocol::shape::{self, ConnectionExt as _};
use x11rb::protocol::shm::{self, ConnectionExt as _};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use super::{MonitorInfo, OverlayConfig, OverlayPlatform, PlatformError};

// Atoms needed for EWMH hints
atom_manager! {
    pub AtomCollection: AtomCollectionCookie {
        _NET_WM_WINDOW_TYPE,
        _NET_WM_WINDOW_TYPE_DOCK,
        _NET_WM_STATE,
        _NET_WM_STATE_ABOVE,
        _NET_WM_STATE_SKIP_TASKBAR,
        _NET_WM_STATE_SKIP_PAGER,
        ATOM,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Standalone Monitor Enumeration
// ─────────────────────────────────────────────────────────────────────────────

pub fn get_all_monitors() -> Vec<MonitorInfo> {
    let Ok((conn, screen_num)) = x11rb::connect(None) else {
        return Vec::new();
    };

    let setup = conn.setup();
    let screen = &setup.roots[screen_num];
    let root = screen.root;

    let Ok(monitors) = conn.randr_get_monitors(root, true) else {
        return Vec::new();
    };
    let Ok(monitors) = monitors.reply() else {
        return Vec::new();
    };

    monitors
        .monitors
        .iter()
        .enumerate()
        .map(|(idx, mon)| {
            let id = conn
                .get_atom_name(mon.name)
                .ok()
                .and_then(|r| r.reply().ok())
                .map(|r| String::from_utf8_lossy(&r.name).to_string())
                .unwrap_or_else(|| format!("Monitor {}", idx + 1));

            MonitorInfo {
                id,
                x: mon.x as i32,
                y: mon.y as i32,
                width: mon.width as u32,
                height: mon.height as u32,
                is_primary: mon.primary,
            }
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// X11 Overlay Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// SHM buffer for efficient pixel transfer
struct ShmBuffer {
    seg_id: shm::Seg,
    ptr: *mut u8,
    size: usize,
}

// SAFETY: the mapping is only touched by the thread owning the overlay
unsafe impl Send for ShmBuffer {}

pub struct X11Overlay {
    conn: RustConnection,
    window: Window,
    gc: Gcontext,
    atoms: AtomCollection,
    monitor_id: String,
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    depth: u8,

    pixel_data: Vec<u8>, // premultiplied RGBA from the renderer
    shm_buffer: ShmBuffer,

    needs_redraw: bool,
    running: bool,
}

impl X11Overlay {
    /// Find a 32-bit ARGB visual for transparency
    fn find_argb_visual(screen: &Screen) -> Option<(Visualid, u8)> {
        screen
            .allowed_depths
            .iter()
            .filter(|depth| depth.depth == 32)
            .flat_map(|depth| depth.visuals.iter().map(move |v| (v, depth.depth)))
            .find(|(visual, _)| visual.class == VisualClass::TRUE_COLOR)
            .map(|(visual, depth)| (visual.visual_id, depth))
    }

    /// Create a shared memory buffer for efficient pixel transfer
    fn create_shm_buffer(
        conn: &RustConnection,
        width: u32,
        height: u32,
    ) -> Result<ShmBuffer, PlatformError> {
        let size = (width as usize) * (height as usize) * 4;

        let fd = memfd_create(c"backdrop-x11-buffer", MemfdFlags::CLOEXEC)
            .map_err(|e| PlatformError::BufferError(format!("memfd_create failed: {}", e)))?;

        rustix::fs::ftruncate(&fd, size as u64)
            .map_err(|e| PlatformError::BufferError(format!("ftruncate failed: {}", e)))?;

        // SAFETY: fresh shared mapping of a memfd we just sized; unmapped in Drop
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                fd.as_fd(),
                0,
            )
            .map_err(|e| PlatformError::BufferError(format!("mmap failed: {}", e)))?
        };

        let seg_id = conn
            .generate_id()
            .map_err(|e| PlatformError::BufferError(e.to_string()))?;

        // x11rb shm_attach_fd takes ownership of the fd
        let file = File::from(fd);
        conn.shm_attach_fd(seg_id, file, false)
            .map_err(|e| PlatformError::BufferError(format!("shm_attach_fd failed: {}", e)))?;

        Ok(ShmBuffer {
            seg_id,
            ptr: ptr as *mut u8,
            size,
        })
    }

    /// Dock type, above, skip taskbar/pager
    fn apply_window_hints(&self) -> Result<(), PlatformError> {
        self.conn
            .change_property32(
                PropMode::REPLACE,
                self.window,
                self.atoms._NET_WM_WINDOW_TYPE,
                self.atoms.ATOM,
                &[self.atoms._NET_WM_WINDOW_TYPE_DOCK],
            )
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        self.conn
            .change_property32(
                PropMode::REPLACE,
                self.window,
                self.atoms._NET_WM_STATE,
                self.atoms.ATOM,
                &[
                    self.atoms._NET_WM_STATE_ABOVE,
                    self.atoms._NET_WM_STATE_SKIP_TASKBAR,
                    self.atoms._NET_WM_STATE_SKIP_PAGER,
                ],
            )
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        Ok(())
    }

    /// Empty input region: clicks pass through to whatever is below
    fn apply_input_passthrough(&self) {
        let _ = self.conn.shape_rectangles(
            shape::SO::SET,
            shape::SK::INPUT,
            ClipOrdering::UNSORTED,
            self.window,
            0,
            0,
            &[],
        );
    }

    fn raise(&self) {
        let _ = self.conn.configure_window(
            self.window,
            &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
        );
    }
}

impl OverlayPlatform for X11Overlay {
    fn new(config: OverlayConfig) -> Result<Self, PlatformError> {
        let (conn, screen_num) =
            x11rb::connect(None).map_err(|e| PlatformError::ConnectionFailed(e.to_string()))?;

        let atoms = AtomCollection::new(&conn)
            .map_err(|e| PlatformError::Other(e.to_string()))?
            .reply()
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        let setup = conn.setup();
        let screen = &setup.roots[screen_num];
        let root = screen.root;

        conn.shape_query_version()
            .map_err(|_| PlatformError::UnsupportedFeature("Shape extension".into()))?
            .reply()
            .map_err(|_| PlatformError::UnsupportedFeature("Shape extension".into()))?;

        conn.shm_query_version()
            .map_err(|_| PlatformError::UnsupportedFeature("SHM extension".into()))?
            .reply()
            .map_err(|_| PlatformError::UnsupportedFeature("SHM extension".into()))?;

        let (visual, depth) = Self::find_argb_visual(screen)
            .ok_or_else(|| PlatformError::UnsupportedFeature("32-bit ARGB visual".into()))?;

        let colormap = conn
            .generate_id()
            .map_err(|e| PlatformError::Other(e.to_string()))?;
        conn.create_colormap(ColormapAlloc::NONE, colormap, root, visual)
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        let window = conn
            .generate_id()
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        let win_aux = CreateWindowAux::new()
            .background_pixel(0)
            .border_pixel(0)
            .colormap(colormap)
            .event_mask(EventMask::EXPOSURE | EventMask::STRUCTURE_NOTIFY)
            .override_redirect(1);

        conn.create_window(
            depth,
            window,
            root,
            config.x as i16,
            config.y as i16,
            config.width as u16,
            config.height as u16,
            0,
            WindowClass::INPUT_OUTPUT,
            visual,
            &win_aux,
        )
        .map_err(|e| PlatformError::Other(e.to_string()))?;

        conn.change_property8(
            PropMode::REPLACE,
            window,
            AtomEnum::WM_NAME,
            AtomEnum::STRING,
            config.namespace.as_bytes(),
        )
        .map_err(|e| PlatformError::Other(e.to_string()))?;

        let gc = conn
            .generate_id()
            .map_err(|e| PlatformError::Other(e.to_string()))?;
        conn.create_gc(gc, window, &CreateGCAux::new())
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        let shm_buffer = Self::create_shm_buffer(&conn, config.width, config.height)?;

        let overlay = Self {
            conn,
            window,
            gc,
            atoms,
            monitor_id: config.monitor_id,
            width: config.width,
            height: config.height,
            x: config.x,
            y: config.y,
            depth,
            pixel_data: vec![0u8; shm_buffer.size],
            shm_buffer,
            needs_redraw: false,
            running: true,
        };

        overlay.apply_window_hints()?;
        overlay.apply_input_passthrough();

        overlay
            .conn
            .map_window(window)
            .map_err(|e| PlatformError::Other(e.to_string()))?;
        overlay
            .conn
            .flush()
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        debug!(
            monitor = %overlay.monitor_id,
            x = overlay.x,
            y = overlay.y,
            width = overlay.width,
            height = overlay.height,
            "x11 overlay mapped"
        );
        Ok(overlay)
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel_buffer(&mut self) -> Option<&mut [u8]> {
        Some(&mut self.pixel_data)
    }

    fn commit(&mut self) {
        // SAFETY: ptr/size describe the live mapping created in create_shm_buffer
        let shm_slice =
            unsafe { std::slice::from_raw_parts_mut(self.shm_buffer.ptr, self.shm_buffer.size) };

        // RGBA -> BGRA
        for (src, dst) in self
            .pixel_data
            .chunks_exact(4)
            .zip(shm_slice.chunks_exact_mut(4))
        {
            dst[0] = src[2];
            dst[1] = src[1];
            dst[2] = src[0];
            dst[3] = src[3];
        }

        let _ = self.conn.shm_put_image(
            self.window,
            self.gc,
            self.width as u16,
            self.height as u16,
            0,
            0,
            self.width as u16,
            self.height as u16,
            0,
            0,
            self.depth,
            ImageFormat::Z_PIXMAP.into(),
            false,
            self.shm_buffer.seg_id,
            0,
        );
        let _ = self.conn.flush();
    }

    fn poll_events(&mut self) -> bool {
        while let Ok(Some(event)) = self.conn.poll_for_event() {
            match event {
                x11rb::protocol::Event::Expose(e) if e.count == 0 => {
                    self.needs_redraw = true;
                }
                x11rb::protocol::Event::DestroyNotify(e) if e.window == self.window => {
                    debug!(monitor = %self.monitor_id, "x11 overlay destroyed");
                    self.running = false;
                    return false;
                }
                _ => {}
            }
        }
        self.running
    }

    fn take_needs_redraw(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    fn reassert_attributes(&mut self) {
        if let Err(e) = self.apply_window_hints() {
            debug!(monitor = %self.monitor_id, error = %e, "failed to refresh window hints");
        }
        self.apply_input_passthrough();
        self.raise();
        let _ = self.conn.flush();
    }
}

impl Drop for X11Overlay {
    fn drop(&mut self) {
        let _ = self.conn.shm_detach(self.shm_buffer.seg_id);
        // SAFETY: mapping created in create_shm_buffer, not used after this
        unsafe {
            rustix::mm::munmap(self.shm_buffer.ptr as *mut _, self.shm_buffer.size).ok();
        }

        let _ = self.conn.destroy_window(self.window);
        let _ = self.conn.free_gc(self.gc);
        let _ = self.conn.flush();
    }
}
