//! Win32 platform implementation

mod event;
mod gdi;
mod window;

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tracing::{trace, warn};
use windows::Win32::Foundation::{LPARAM, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, MsgWaitForMultipleObjectsEx, PeekMessageW, PostThreadMessageW,
    TranslateMessage, MSG, MWMO_INPUTAVAILABLE, PM_NOREMOVE, PM_REMOVE, QS_ALLINPUT, WM_APP,
    WM_USER,
};

use super::{NativeMessage, Platform, PlatformError, RawHandle, ResourceKind, ResourceSpec};
use crate::logging::NATIVE_TARGET;

/// Thread message that only interrupts `wait`
const WM_APP_WAKE: u32 = WM_APP + 1;

/// Native primitives backed by user32/gdi32
pub struct Win32Platform {
    // Native id of the attached UI thread, 0 when detached
    ui_thread: AtomicU32,
}

impl Win32Platform {
    pub fn new() -> Self {
        Self {
            ui_thread: AtomicU32::new(0),
        }
    }

    fn check_thread(&self) -> Result<(), PlatformError> {
        let owner = self.ui_thread.load(Ordering::Acquire);
        if owner != 0 && owner == unsafe { GetCurrentThreadId() } {
            Ok(())
        } else {
            Err(PlatformError::WrongThread)
        }
    }
}

impl Default for Win32Platform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for Win32Platform {
    fn name(&self) -> &'static str {
        "win32"
    }

    fn attach(&self) -> Result<(), PlatformError> {
        let current = unsafe { GetCurrentThreadId() };
        if let Err(owner) =
            self.ui_thread
                .compare_exchange(0, current, Ordering::AcqRel, Ordering::Acquire)
        {
            if owner != current {
                return Err(PlatformError::AttachFailed(format!(
                    "already attached to thread {}",
                    owner
                )));
            }
        }

        window::register_window_class().map_err(|e| PlatformError::AttachFailed(e.message()))?;
        // Make sure the thread has a message queue before anyone posts to it
        let mut msg = MSG::default();
        unsafe {
            let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);
        }
        trace!(target: NATIVE_TARGET, "win32: attached to thread {}", current);
        Ok(())
    }

    fn detach(&self) {
        window::clear_pending();
        self.ui_thread.store(0, Ordering::Release);
        trace!(target: NATIVE_TARGET, "win32: detached");
    }

    fn create(&self, spec: &ResourceSpec) -> Result<RawHandle, PlatformError> {
        self.check_thread()?;
        let raw = match spec {
            ResourceSpec::Window {
                title,
                width,
                height,
                parent,
            } => window::create_window(title, *width, *height, *parent)
                .map_err(|e| PlatformError::CreateFailed(e.message()))?,
            ResourceSpec::Font {
                family,
                size,
                weight,
                italic,
            } => gdi::create_font(family, *size, *weight, *italic)?,
            ResourceSpec::Image { width, height } => gdi::create_bitmap(*width, *height)?,
            ResourceSpec::Menu { popup } => gdi::create_menu(*popup)?,
            ResourceSpec::GraphicsContext { target } => gdi::create_context(*target)?,
        };
        trace!(target: NATIVE_TARGET, "win32: create {} -> {:?}", spec.kind(), raw);
        Ok(raw)
    }

    fn destroy(&self, kind: ResourceKind, raw: RawHandle) -> Result<(), PlatformError> {
        self.check_thread()?;
        trace!(target: NATIVE_TARGET, "win32: destroy {} {:?}", kind, raw);
        match kind {
            ResourceKind::Window => window::destroy_window(raw)
                .map_err(|e| PlatformError::ReleaseFailed(e.message())),
            ResourceKind::Font | ResourceKind::Image => gdi::delete_object(raw),
            ResourceKind::Menu => gdi::destroy_menu(raw),
            ResourceKind::GraphicsContext => gdi::delete_context(raw),
        }
    }

    // GDI and USER objects carry no reference count; only non-owning
    // shared views of them are possible
    fn retain(&self, kind: ResourceKind, _raw: RawHandle) -> Result<(), PlatformError> {
        self.check_thread()?;
        Err(PlatformError::Unsupported(kind))
    }

    fn release(&self, kind: ResourceKind, _raw: RawHandle) -> Result<(), PlatformError> {
        self.check_thread()?;
        Err(PlatformError::Unsupported(kind))
    }

    fn set_text(
        &self,
        kind: ResourceKind,
        raw: RawHandle,
        text: &str,
    ) -> Result<(), PlatformError> {
        self.check_thread()?;
        match kind {
            ResourceKind::Window => window::set_window_text(raw, text)
                .map_err(|_| PlatformError::InvalidHandle(raw)),
            other => Err(PlatformError::Unsupported(other)),
        }
    }

    fn poll_native(&self) -> Option<NativeMessage> {
        if self.check_thread().is_err() {
            return None;
        }
        loop {
            if let Some(msg) = window::take_pending() {
                return Some(msg);
            }
            let mut msg = MSG::default();
            if !unsafe { PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE) }.as_bool() {
                return None;
            }
            if msg.message == WM_APP_WAKE {
                continue;
            }
            // The window procedure queues whatever the toolkit should see
            unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }

    fn wait(&self, timeout: Duration) {
        if window::has_pending() {
            return;
        }
        let millis = timeout.as_millis().min(u32::MAX as u128) as u32;
        unsafe {
            MsgWaitForMultipleObjectsEx(None, millis, QS_ALLINPUT, MWMO_INPUTAVAILABLE);
        }
    }

    fn wake(&self) {
        let owner = self.ui_thread.load(Ordering::Acquire);
        if owner == 0 {
            return;
        }
        if let Err(e) = unsafe { PostThreadMessageW(owner, WM_APP_WAKE, WPARAM(0), LPARAM(0)) } {
            warn!(target: NATIVE_TARGET, "win32: wake failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gdi_objects_are_not_reference_counted() {
        let platform = Win32Platform::new();
        platform.attach().unwrap();
        let bitmap = platform
            .create(&ResourceSpec::Image {
                width: 4,
                height: 4,
            })
            .unwrap();

        assert_eq!(
            platform.retain(ResourceKind::Image, bitmap),
            Err(PlatformError::Unsupported(ResourceKind::Image))
        );
        assert_eq!(
            platform.release(ResourceKind::Image, bitmap),
            Err(PlatformError::Unsupported(ResourceKind::Image))
        );
        platform.destroy(ResourceKind::Image, bitmap).unwrap();
        platform.detach();
    }
}
