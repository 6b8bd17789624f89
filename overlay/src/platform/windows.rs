//! Windows platform implementation for overlay windows
//!
//! Uses a layered, click-through, non-activating tool window kept at
//! HWND_TOPMOST. Pixels go through UpdateLayeredWindow with per-pixel alpha.
#![allow(clippy::too_many_arguments)]

use std::mem;
use std::ptr;

use tracing::{debug, trace, warn};
use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, LRESULT, POINT, RECT, SIZE, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BLENDFUNCTION, CreateCompatibleDC, CreateDIBSection,
    DIB_RGB_COLORS, DeleteDC, DeleteObject, EnumDisplayMonitors, GetDC, GetMonitorInfoW, HBITMAP,
    HDC, HMONITOR, MONITORINFOEXW, ReleaseDC, SelectObject,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GWL_EXSTYLE, HWND_TOPMOST,
    MSG, PM_REMOVE, PeekMessageW, RegisterClassExW, SW_SHOWNOACTIVATE,
    SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE, SetWindowLongPtrW, SetWindowPos, ShowWindow,
    TranslateMessage, ULW_ALPHA, UpdateLayeredWindow, WINDOW_EX_STYLE, WM_DESTROY,
    WM_DISPLAYCHANGE, WM_ERASEBKGND, WM_MOUSEACTIVATE, WM_NCHITTEST, WM_QUIT, WNDCLASSEXW,
    WS_EX_LAYERED, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_EX_TRANSPARENT,
    WS_POPUP,
};
use windows::core::PCWSTR;

use super::{MonitorInfo, OverlayConfig, OverlayPlatform, PlatformError};

const CLASS_NAME: &str = "BackdropOverlayClass";
const MA_NOACTIVATE: isize = 3;
const HTTRANSPARENT: isize = -1;

/// Extended style every overlay window must carry
fn overlay_ex_style() -> WINDOW_EX_STYLE {
    WS_EX_LAYERED | WS_EX_TRANSPARENT | WS_EX_NOACTIVATE | WS_EX_TOOLWINDOW | WS_EX_TOPMOST
}

// ─────────────────────────────────────────────────────────────────────────────
// Standalone Monitor Enumeration
// ─────────────────────────────────────────────────────────────────────────────

/// Callback for EnumDisplayMonitors - collects monitor info into a Vec<MonitorInfo>
unsafe extern "system" fn enum_monitors_callback(
    hmonitor: HMONITOR,
    _hdc: HDC,
    _rect: *mut RECT,
    lparam: LPARAM,
) -> windows::Win32::Foundation::BOOL {
    unsafe {
        let monitors = &mut *(lparam.0 as *mut Vec<MonitorInfo>);

        let mut info = MONITORINFOEXW::default();
        info.monitorInfo.cbSize = mem::size_of::<MONITORINFOEXW>() as u32;

        if GetMonitorInfoW(hmonitor, &mut info.monitorInfo).as_bool() {
            let rc = info.monitorInfo.rcMonitor;

            let name_len = info
                .szDevice
                .iter()
                .position(|&c| c == 0)
                .unwrap_or(info.szDevice.len());

            monitors.push(MonitorInfo {
                id: String::from_utf16_lossy(&info.szDevice[..name_len]),
                x: rc.left,
                y: rc.top,
                width: (rc.right - rc.left).max(0) as u32,
                height: (rc.bottom - rc.top).max(0) as u32,
                is_primary: info.monitorInfo.dwFlags & 1 != 0,
            });
        }

        windows::Win32::Foundation::BOOL::from(true)
    }
}

/// Get all connected monitors without requiring an existing overlay window
pub fn get_all_monitors() -> Vec<MonitorInfo> {
    let mut monitors: Vec<MonitorInfo> = Vec::new();

    unsafe {
        let ptr = &mut monitors as *mut Vec<MonitorInfo>;
        let result = EnumDisplayMonitors(None, None, Some(enum_monitors_callback), LPARAM(ptr as isize));
        if !result.as_bool() {
            warn!("EnumDisplayMonitors failed");
        }
    }

    for m in &monitors {
        debug!(
            id = %m.id,
            x = m.x,
            y = m.y,
            width = m.width,
            height = m.height,
            primary = m.is_primary,
            "found monitor"
        );
    }
    monitors
}

/// Windows overlay implementation
pub struct WindowsOverlay {
    hwnd: HWND,
    hdc_mem: HDC,
    hbitmap: HBITMAP,
    monitor_id: String,
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    pixel_data: Vec<u8>,
    bgra_buffer: *mut u8, // DIB section bits, owned by hbitmap
    content_dirty: bool,
    running: bool,
}

// NOTE: WindowsOverlay intentionally does NOT implement Send.
// The HWND's message queue belongs to the creating thread, so the overlay is
// created inside its surface thread and never leaves it.

impl WindowsOverlay {
    fn register_class() -> Result<(), PlatformError> {
        unsafe {
            let class_name = wide_string(CLASS_NAME);
            let hinstance = GetModuleHandleW(None)
                .map_err(|e| PlatformError::Other(format!("GetModuleHandleW failed: {}", e)))?;

            let wc = WNDCLASSEXW {
                cbSize: mem::size_of::<WNDCLASSEXW>() as u32,
                lpfnWndProc: Some(window_proc),
                hInstance: hinstance.into(),
                lpszClassName: PCWSTR(class_name.as_ptr()),
                ..Default::default()
            };

            let atom = RegisterClassExW(&wc);
            if atom == 0 {
                // One class is shared by every overlay
                let err = std::io::Error::last_os_error();
                if err.raw_os_error() != Some(1410) {
                    // ERROR_CLASS_ALREADY_EXISTS
                    return Err(PlatformError::Other(format!(
                        "RegisterClassExW failed: {}",
                        err
                    )));
                }
            }
        }
        Ok(())
    }

    fn create_dib_section(&mut self) -> Result<(), PlatformError> {
        unsafe {
            let hdc_screen = GetDC(HWND::default());

            self.hdc_mem = CreateCompatibleDC(hdc_screen);
            if self.hdc_mem.is_invalid() {
                ReleaseDC(HWND::default(), hdc_screen);
                return Err(PlatformError::BufferError(
                    "CreateCompatibleDC failed".to_string(),
                ));
            }

            let bmi = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: self.width as i32,
                    biHeight: -(self.height as i32), // Top-down DIB
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };

            let mut bits: *mut std::ffi::c_void = ptr::null_mut();
            let created = CreateDIBSection(hdc_screen, &bmi, DIB_RGB_COLORS, &mut bits, None, 0);
            ReleaseDC(HWND::default(), hdc_screen);
            let hbitmap = created.map_err(|e| {
                PlatformError::BufferError(format!("CreateDIBSection failed: {}", e))
            })?;
            if bits.is_null() {
                return Err(PlatformError::BufferError(
                    "CreateDIBSection returned no bits".to_string(),
                ));
            }

            SelectObject(self.hdc_mem, hbitmap);
            self.hbitmap = hbitmap;
            self.bgra_buffer = bits as *mut u8;
        }
        Ok(())
    }

    fn update_layered_window(&mut self) {
        if !self.content_dirty {
            return;
        }
        self.content_dirty = false;

        let len = self.pixel_data.len();
        // SAFETY: the DIB section is width*height*4 bytes and lives as long as hbitmap
        let bgra = unsafe { std::slice::from_raw_parts_mut(self.bgra_buffer, len) };

        // RGBA -> BGRA, both premultiplied as AC_SRC_ALPHA expects
        for (src, dst) in self.pixel_data.chunks_exact(4).zip(bgra.chunks_exact_mut(4)) {
            dst[0] = src[2];
            dst[1] = src[1];
            dst[2] = src[0];
            dst[3] = src[3];
        }

        unsafe {
            let hdc_screen = GetDC(HWND::default());

            let pt_src = POINT { x: 0, y: 0 };
            let pt_dst = POINT {
                x: self.x,
                y: self.y,
            };
            let size = SIZE {
                cx: self.width as i32,
                cy: self.height as i32,
            };
            let blend = BLENDFUNCTION {
                BlendOp: 0, // AC_SRC_OVER
                BlendFlags: 0,
                SourceConstantAlpha: 255,
                AlphaFormat: 1, // AC_SRC_ALPHA
            };

            if let Err(e) = UpdateLayeredWindow(
                self.hwnd,
                hdc_screen,
                Some(&pt_dst),
                Some(&size),
                self.hdc_mem,
                Some(&pt_src),
                COLORREF(0),
                Some(&blend),
                ULW_ALPHA,
            ) {
                warn!(monitor = %self.monitor_id, error = %e, "UpdateLayeredWindow failed");
            }

            ReleaseDC(HWND::default(), hdc_screen);
        }
    }
}

impl OverlayPlatform for WindowsOverlay {
    fn new(config: OverlayConfig) -> Result<Self, PlatformError> {
        Self::register_class()?;

        let hwnd = unsafe {
            let class_name = wide_string(CLASS_NAME);
            let window_name = wide_string(&config.namespace);
            let hinstance = GetModuleHandleW(None)
                .map_err(|e| PlatformError::Other(format!("GetModuleHandleW failed: {}", e)))?;

            CreateWindowExW(
                overlay_ex_style(),
                PCWSTR(class_name.as_ptr()),
                PCWSTR(window_name.as_ptr()),
                WS_POPUP,
                config.x,
                config.y,
                config.width as i32,
                config.height as i32,
                None,
                None,
                hinstance,
                None,
            )
            .map_err(|e| PlatformError::Other(format!("CreateWindowExW failed: {}", e)))?
        };

        let mut overlay = Self {
            hwnd,
            hdc_mem: HDC::default(),
            hbitmap: HBITMAP::default(),
            monitor_id: config.monitor_id,
            width: config.width,
            height: config.height,
            x: config.x,
            y: config.y,
            pixel_data: vec![0u8; (config.width as usize) * (config.height as usize) * 4],
            bgra_buffer: ptr::null_mut(),
            content_dirty: true,
            running: true,
        };

        overlay.create_dib_section()?;

        unsafe {
            let _ = ShowWindow(hwnd, SW_SHOWNOACTIVATE);
        }

        debug!(
            monitor = %overlay.monitor_id,
            hwnd = ?hwnd,
            x = overlay.x,
            y = overlay.y,
            width = overlay.width,
            height = overlay.height,
            "layered overlay shown"
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
        self.content_dirty = true; // Assume caller will modify the buffer
        Some(&mut self.pixel_data)
    }

    fn commit(&mut self) {
        self.update_layered_window();
    }

    fn poll_events(&mut self) -> bool {
        unsafe {
            let mut msg = MSG::default();
            while PeekMessageW(&mut msg, self.hwnd, 0, 0, PM_REMOVE).as_bool() {
                match msg.message {
                    WM_QUIT | WM_DESTROY => {
                        debug!(monitor = %self.monitor_id, message = msg.message, "overlay closing");
                        self.running = false;
                        return false;
                    }
                    _ => {
                        let _ = TranslateMessage(&msg);
                        DispatchMessageW(&msg);
                    }
                }
            }
        }
        self.running
    }

    fn reassert_attributes(&mut self) {
        unsafe {
            SetWindowLongPtrW(self.hwnd, GWL_EXSTYLE, overlay_ex_style().0 as isize);
            if let Err(e) = SetWindowPos(
                self.hwnd,
                HWND_TOPMOST,
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
            ) {
                trace!(monitor = %self.monitor_id, error = %e, "SetWindowPos failed");
            }
        }
    }
}

impl Drop for WindowsOverlay {
    fn drop(&mut self) {
        unsafe {
            if !self.hdc_mem.is_invalid() {
                let _ = DeleteDC(self.hdc_mem);
            }
            if !self.hbitmap.is_invalid() {
                let _ = DeleteObject(self.hbitmap);
            }
            if !self.hwnd.is_invalid() {
                let _ = DestroyWindow(self.hwnd);
            }
        }
        debug!(monitor = %self.monitor_id, "overlay window destroyed");
    }
}

/// Window procedure for overlay windows
unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        // Mouse input falls through to the window below
        WM_NCHITTEST => LRESULT(HTTRANSPARENT),
        WM_MOUSEACTIVATE => LRESULT(MA_NOACTIVATE),
        WM_ERASEBKGND => LRESULT(1),
        WM_DISPLAYCHANGE => {
            debug!("display configuration changed; overlay geometry is fixed until restart");
            LRESULT(0)
        }
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

/// Convert a &str to a null-terminated wide string
fn wide_string(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}
