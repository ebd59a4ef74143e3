use super::{ForegroundApp, PlatformTracker};
use crate::error::DispatchError;
use log::warn;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{AtomEnum, ClientMessageEvent, ConnectionExt, EventMask, Window};
use x11rb::rust_connection::RustConnection;

/// ICCCM `IconicState`, requested through `WM_CHANGE_STATE`.
const ICONIC_STATE: u32 = 3;

pub struct LinuxTracker {
    conn: Option<RustConnection>,
    root: Window,
}

impl Default for LinuxTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxTracker {
    pub fn new() -> Self {
        match x11rb::connect(None) {
            Ok((conn, screen_num)) => {
                let Some(root) = conn.setup().roots.get(screen_num).map(|s| s.root) else {
                    warn!(
                        "Invalid screen number {screen_num} ({} screens available), \
                         foreground tracking disabled",
                        conn.setup().roots.len()
                    );
                    return Self { conn: None, root: 0 };
                };
                Self {
                    conn: Some(conn),
                    root,
                }
            }
            Err(e) => {
                // Wayland and headless sessions end up here; keep running without events.
                warn!("Failed to connect to X server: {e}. Foreground tracking disabled.");
                Self { conn: None, root: 0 }
            }
        }
    }

    fn connection(&self) -> Result<&RustConnection, DispatchError> {
        self.conn
            .as_ref()
            .ok_or_else(|| DispatchError::Platform("no X11 connection".into()))
    }

    fn get_atom(&self, name: &str) -> Option<u32> {
        self.conn
            .as_ref()?
            .intern_atom(false, name.as_bytes())
            .ok()?
            .reply()
            .ok()
            .map(|r| r.atom)
    }

    fn get_window_property(&self, window: Window, atom: u32) -> Option<Vec<u8>> {
        let reply = self
            .conn
            .as_ref()?
            .get_property(false, window, atom, AtomEnum::ANY, 0, 1024)
            .ok()?
            .reply()
            .ok()?;

        if reply.value.is_empty() {
            return None;
        }

        Some(reply.value)
    }

    fn get_active_window_id(&self) -> Option<Window> {
        let conn = self.conn.as_ref()?;
        let atom = self.get_atom("_NET_ACTIVE_WINDOW")?;
        let reply = conn
            .get_property(false, self.root, atom, AtomEnum::WINDOW, 0, 1)
            .ok()?
            .reply()
            .ok()?;

        reply
            .value32()
            .and_then(|mut values| values.next())
            .filter(|&window| window != 0)
    }

    /// `WM_CLASS` holds "instance\0class\0"; the class is the stable identifier.
    fn package_id_for(&self, window: Window) -> Option<String> {
        let raw = self.get_window_property(window, AtomEnum::WM_CLASS.into())?;
        let raw = String::from_utf8(raw).ok()?;
        let mut parts = raw.split('\0').filter(|s| !s.is_empty());
        let instance = parts.next()?;
        let class = parts.next().unwrap_or(instance);
        Some(class.to_lowercase())
    }
}

impl PlatformTracker for LinuxTracker {
    fn foreground_app(&self) -> Option<ForegroundApp> {
        let window_id = self.get_active_window_id()?;
        let package_id = self.package_id_for(window_id)?;
        Some(ForegroundApp { package_id })
    }

    fn minimize_foreground(&self) -> Result<(), DispatchError> {
        let conn = self.connection()?;
        let window = self
            .get_active_window_id()
            .ok_or_else(|| DispatchError::Platform("no active window".into()))?;
        let change_state = self
            .get_atom("WM_CHANGE_STATE")
            .ok_or_else(|| DispatchError::Platform("WM_CHANGE_STATE atom unavailable".into()))?;

        let event = ClientMessageEvent::new(32, window, change_state, [ICONIC_STATE, 0, 0, 0, 0]);
        conn.send_event(
            false,
            self.root,
            EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
            event,
        )
        .map_err(|e| DispatchError::Platform(e.to_string()))?;
        conn.flush()
            .map_err(|e| DispatchError::Platform(e.to_string()))?;

        Ok(())
    }
}
