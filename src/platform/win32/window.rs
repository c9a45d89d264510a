//! Win32 window class, window procedure and window primitives

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::c_void;

use tracing::trace;
use windows::core::{w, Error, PCWSTR};
use windows::Win32::Foundation::{GetLastError, ERROR_CLASS_ALREADY_EXISTS, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Gdi::HBRUSH;
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::*;

use super::event::translate_message;
use crate::logging::NATIVE_TARGET;
use crate::platform::{NativeEvent, NativeMessage, RawHandle};

const WINDOW_CLASS_NAME: PCWSTR = w!("TetherWindowClass");

// Callbacks raised by the window procedure on this thread, oldest first
thread_local! {
    static PENDING: RefCell<VecDeque<NativeMessage>> = RefCell::new(VecDeque::new());
}

pub(crate) fn hwnd(raw: RawHandle) -> HWND {
    HWND(raw.get() as *mut c_void)
}

pub(crate) fn raw_handle(ptr: *mut c_void) -> Option<RawHandle> {
    RawHandle::new(ptr as usize)
}

pub(crate) fn wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Take the oldest callback the window procedure queued on this thread
pub(crate) fn take_pending() -> Option<NativeMessage> {
    PENDING.with(|pending| pending.borrow_mut().pop_front())
}

pub(crate) fn has_pending() -> bool {
    PENDING.with(|pending| !pending.borrow().is_empty())
}

pub(crate) fn clear_pending() {
    PENDING.with(|pending| pending.borrow_mut().clear());
}

/// Window procedure
unsafe extern "system" fn wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if let Some((target, event)) = translate_message(hwnd, msg, wparam, lparam) {
        if let Some(target) = raw_handle(target.0) {
            trace!(target: NATIVE_TARGET, "win32: {:?} -> {:?}", target, event);
            let time = GetMessageTime() as u32 as u64;
            let close = event == NativeEvent::CloseRequest;
            PENDING.with(|pending| {
                pending.borrow_mut().push_back(NativeMessage {
                    target,
                    event,
                    time,
                })
            });
            // The toolkit decides whether the window goes away
            if close {
                return LRESULT(0);
            }
        }
    }
    DefWindowProcW(hwnd, msg, wparam, lparam)
}

/// Register the toolkit window class; registering twice is fine
pub(crate) fn register_window_class() -> Result<(), Error> {
    unsafe {
        let hinstance = GetModuleHandleW(None)?;

        let wc = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            style: CS_HREDRAW | CS_VREDRAW | CS_DBLCLKS,
            lpfnWndProc: Some(wnd_proc),
            cbClsExtra: 0,
            cbWndExtra: 0,
            hInstance: hinstance.into(),
            hIcon: HICON::default(),
            hCursor: LoadCursorW(None, IDC_ARROW)?,
            hbrBackground: HBRUSH::default(),
            lpszMenuName: PCWSTR::null(),
            lpszClassName: WINDOW_CLASS_NAME,
            hIconSm: HICON::default(),
        };

        if RegisterClassExW(&wc) == 0 && GetLastError() != ERROR_CLASS_ALREADY_EXISTS {
            return Err(Error::from_win32());
        }
        Ok(())
    }
}

/// Create a top-level window, or a child window when `parent` is set
pub(crate) fn create_window(
    title: &str,
    width: i32,
    height: i32,
    parent: Option<RawHandle>,
) -> Result<RawHandle, Error> {
    let title = wide(title);
    let (style, parent) = match parent {
        Some(parent) => (WS_CHILD | WS_VISIBLE, hwnd(parent)),
        None => (WS_OVERLAPPEDWINDOW, HWND::default()),
    };

    unsafe {
        let hinstance = GetModuleHandleW(None)?;
        let window = CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            WINDOW_CLASS_NAME,
            PCWSTR(title.as_ptr()),
            style,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            width,
            height,
            parent,
            None,
            hinstance,
            None,
        )?;
        raw_handle(window.0).ok_or_else(Error::from_win32)
    }
}

pub(crate) fn destroy_window(raw: RawHandle) -> Result<(), Error> {
    unsafe { DestroyWindow(hwnd(raw)) }
}

pub(crate) fn set_window_text(raw: RawHandle, text: &str) -> Result<(), Error> {
    let text = wide(text);
    unsafe { SetWindowTextW(hwnd(raw), PCWSTR(text.as_ptr())) }
}
