//! GDI objects and menus

use std::ffi::c_void;

use windows::core::Error;
use windows::Win32::Graphics::Gdi::{
    CreateBitmap, CreateCompatibleDC, CreateFontIndirectW, DeleteDC, DeleteObject, GetDC,
    ReleaseDC, HDC, HGDIOBJ, LOGFONTW,
};
use windows::Win32::UI::WindowsAndMessaging::{CreateMenu, CreatePopupMenu, DestroyMenu, HMENU};

use super::window::{hwnd, raw_handle};
use crate::platform::{PlatformError, RawHandle};

fn ptr(raw: RawHandle) -> *mut c_void {
    raw.get() as *mut c_void
}

fn created(ptr: *mut c_void, what: &str) -> Result<RawHandle, PlatformError> {
    raw_handle(ptr).ok_or_else(|| {
        PlatformError::CreateFailed(format!("{}: {}", what, Error::from_win32().message()))
    })
}

pub(crate) fn create_font(
    family: &str,
    size: f32,
    weight: u16,
    italic: bool,
) -> Result<RawHandle, PlatformError> {
    let mut face = [0u16; 32];
    for (slot, unit) in face.iter_mut().take(31).zip(family.encode_utf16()) {
        *slot = unit;
    }
    let logfont = LOGFONTW {
        // Negative height selects by character height; points at 96 DPI
        lfHeight: -((size * 96.0 / 72.0).round() as i32),
        lfWeight: weight as i32,
        lfItalic: italic as u8,
        lfFaceName: face,
        ..Default::default()
    };
    let font = unsafe { CreateFontIndirectW(&logfont) };
    created(font.0, "CreateFontIndirectW")
}

pub(crate) fn create_bitmap(width: u32, height: u32) -> Result<RawHandle, PlatformError> {
    let bitmap = unsafe { CreateBitmap(width as i32, height as i32, 1, 32, None) };
    created(bitmap.0, "CreateBitmap")
}

pub(crate) fn delete_object(raw: RawHandle) -> Result<(), PlatformError> {
    if unsafe { DeleteObject(HGDIOBJ(ptr(raw))) }.as_bool() {
        Ok(())
    } else {
        Err(PlatformError::ReleaseFailed(format!("DeleteObject {:?}", raw)))
    }
}

pub(crate) fn create_menu(popup: bool) -> Result<RawHandle, PlatformError> {
    let menu = unsafe {
        if popup {
            CreatePopupMenu()
        } else {
            CreateMenu()
        }
    }
    .map_err(|e| PlatformError::CreateFailed(e.message()))?;
    created(menu.0, "CreateMenu")
}

pub(crate) fn destroy_menu(raw: RawHandle) -> Result<(), PlatformError> {
    unsafe { DestroyMenu(HMENU(ptr(raw))) }.map_err(|e| PlatformError::ReleaseFailed(e.message()))
}

/// Memory DC compatible with `target`'s surface, or with the screen
pub(crate) fn create_context(target: Option<RawHandle>) -> Result<RawHandle, PlatformError> {
    unsafe {
        let window = target.map(hwnd).unwrap_or_default();
        let surface = GetDC(window);
        let dc = CreateCompatibleDC(surface);
        ReleaseDC(window, surface);
        created(dc.0, "CreateCompatibleDC")
    }
}

pub(crate) fn delete_context(raw: RawHandle) -> Result<(), PlatformError> {
    if unsafe { DeleteDC(HDC(ptr(raw))) }.as_bool() {
        Ok(())
    } else {
        Err(PlatformError::ReleaseFailed(format!("DeleteDC {:?}", raw)))
    }
}
