//! Win32 message translation

use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
use windows::Win32::UI::Input::KeyboardAndMouse::GetKeyState;
use windows::Win32::UI::WindowsAndMessaging::*;

use crate::platform::{Modifiers, NativeEvent};

/// Modifier state at the time the current message was generated
fn current_modifiers() -> Modifiers {
    unsafe {
        Modifiers {
            shift: GetKeyState(0x10) < 0, // VK_SHIFT
            ctrl: GetKeyState(0x11) < 0,  // VK_CONTROL
            alt: GetKeyState(0x12) < 0,   // VK_MENU
        }
    }
}

fn point(lparam: LPARAM) -> (i32, i32) {
    let x = (lparam.0 & 0xFFFF) as i16 as i32;
    let y = ((lparam.0 >> 16) & 0xFFFF) as i16 as i32;
    (x, y)
}

fn size(lparam: LPARAM) -> (i32, i32) {
    let width = (lparam.0 & 0xFFFF) as u16 as i32;
    let height = ((lparam.0 >> 16) & 0xFFFF) as u16 as i32;
    (width, height)
}

fn button(msg: u32) -> u8 {
    match msg {
        WM_LBUTTONDOWN | WM_LBUTTONUP | WM_LBUTTONDBLCLK => 1,
        WM_MBUTTONDOWN | WM_MBUTTONUP | WM_MBUTTONDBLCLK => 2,
        _ => 3,
    }
}

/// Translate a window message into a native event
///
/// Returns the window the event belongs to, which differs from `hwnd` for
/// control notifications sent to the parent.
pub fn translate_message(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> Option<(HWND, NativeEvent)> {
    let event = match msg {
        WM_KEYDOWN | WM_SYSKEYDOWN => NativeEvent::KeyPress {
            key_code: wparam.0 as u32,
            character: None,
            modifiers: current_modifiers(),
        },
        WM_KEYUP | WM_SYSKEYUP => NativeEvent::KeyRelease {
            key_code: wparam.0 as u32,
            character: None,
            modifiers: current_modifiers(),
        },
        WM_CHAR => {
            // wparam carries a UTF-16 code unit; surrogate halves are dropped
            let ch = char::from_u32(wparam.0 as u16 as u32)?;
            NativeEvent::KeyPress {
                key_code: 0,
                character: Some(ch),
                modifiers: current_modifiers(),
            }
        }
        WM_LBUTTONDOWN | WM_MBUTTONDOWN | WM_RBUTTONDOWN => {
            let (x, y) = point(lparam);
            NativeEvent::ButtonPress {
                x,
                y,
                button: button(msg),
                modifiers: current_modifiers(),
            }
        }
        WM_LBUTTONUP | WM_MBUTTONUP | WM_RBUTTONUP => {
            let (x, y) = point(lparam);
            NativeEvent::ButtonRelease {
                x,
                y,
                button: button(msg),
                modifiers: current_modifiers(),
            }
        }
        WM_LBUTTONDBLCLK | WM_MBUTTONDBLCLK | WM_RBUTTONDBLCLK => {
            let (x, y) = point(lparam);
            NativeEvent::DoubleClick {
                x,
                y,
                button: button(msg),
                modifiers: current_modifiers(),
            }
        }
        WM_MOUSEMOVE => {
            let (x, y) = point(lparam);
            NativeEvent::PointerMotion {
                x,
                y,
                modifiers: current_modifiers(),
            }
        }
        WM_COMMAND if lparam.0 != 0 => {
            // Notification from a child control: it was activated
            let control = HWND(lparam.0 as *mut _);
            return Some((control, NativeEvent::Activate));
        }
        WM_SETFOCUS => NativeEvent::FocusIn,
        WM_KILLFOCUS => NativeEvent::FocusOut,
        WM_MOVE => {
            let (x, y) = point(lparam);
            NativeEvent::Moved { x, y }
        }
        WM_SIZE => {
            let (width, height) = size(lparam);
            NativeEvent::Resized { width, height }
        }
        WM_PAINT => NativeEvent::Expose {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        },
        WM_CLOSE => NativeEvent::CloseRequest,
        WM_DESTROY => NativeEvent::Destroyed,
        _ => return None,
    };
    Some((hwnd, event))
}
