//! Typed events and their delivery to widget listeners
//!
//! Native callbacks arrive on the UI thread as [`NativeMessage`]s, are turned
//! into an [`Event`] by [`translate`] and handed to the target widget's
//! listeners in registration order.
//!
//! [`NativeMessage`]: crate::platform::NativeMessage

use std::fmt;

use crate::platform::Modifiers;
use crate::widget::Widget;

pub mod listener;
mod translate;

pub use listener::{
    ControlListener, DisposeListener, FocusListener, KeyListener, ListenerCapabilities, ListenerId,
    ListenerTable, MouseListener, MouseMoveListener, PaintListener, SelectionListener,
    ShellListener,
};
pub use translate::translate;

/// Event type tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Selection,
    DefaultSelection,
    MouseDown,
    MouseUp,
    MouseDoubleClick,
    MouseMove,
    KeyDown,
    KeyUp,
    FocusIn,
    FocusOut,
    Move,
    Resize,
    Paint,
    Close,
    Dispose,
}

impl EventKind {
    pub const ALL: [EventKind; 15] = [
        EventKind::Selection,
        EventKind::DefaultSelection,
        EventKind::MouseDown,
        EventKind::MouseUp,
        EventKind::MouseDoubleClick,
        EventKind::MouseMove,
        EventKind::KeyDown,
        EventKind::KeyUp,
        EventKind::FocusIn,
        EventKind::FocusOut,
        EventKind::Move,
        EventKind::Resize,
        EventKind::Paint,
        EventKind::Close,
        EventKind::Dispose,
    ];
}

/// A translated native callback
///
/// Fields that do not apply to the kind stay at their defaults.
#[derive(Clone)]
pub struct Event {
    pub kind: EventKind,
    /// Widget the event is delivered to
    pub widget: Option<Widget>,
    /// Platform timestamp in milliseconds
    pub time: u64,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Mouse button, 1 = left
    pub button: u8,
    pub key_code: u32,
    pub character: Option<char>,
    pub modifiers: Modifiers,
    /// Listeners clear this to veto the operation (e.g. closing a shell)
    pub doit: bool,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            widget: None,
            time: 0,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            button: 0,
            key_code: 0,
            character: None,
            modifiers: Modifiers::NONE,
            doit: true,
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("widget", &self.widget.as_ref().map(|w| w.id()))
            .field("time", &self.time)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("button", &self.button)
            .field("key_code", &self.key_code)
            .field("character", &self.character)
            .field("modifiers", &self.modifiers)
            .field("doit", &self.doit)
            .finish()
    }
}
