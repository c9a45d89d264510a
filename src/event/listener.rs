//! Listener registration and capability-based dispatch
//!
//! A widget keeps one [`ListenerTable`]. Entries are either plain closures
//! registered for one [`EventKind`], or typed listener objects that expose a
//! set of capabilities through [`ListenerCapabilities`]. During delivery the
//! adapter asks each typed listener for the capability matching the event
//! and calls only that method.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

use super::{Event, EventKind};
use crate::error::ActionPanic;

/// Plain listener closure
pub type ListenerFn = dyn Fn(&mut Event) + Send + Sync;

pub trait SelectionListener: Send + Sync {
    fn widget_selected(&self, event: &mut Event);
    fn widget_default_selected(&self, _event: &mut Event) {}
}

pub trait MouseListener: Send + Sync {
    fn mouse_down(&self, _event: &mut Event) {}
    fn mouse_up(&self, _event: &mut Event) {}
    fn mouse_double_click(&self, _event: &mut Event) {}
}

pub trait MouseMoveListener: Send + Sync {
    fn mouse_move(&self, event: &mut Event);
}

pub trait KeyListener: Send + Sync {
    fn key_pressed(&self, _event: &mut Event) {}
    fn key_released(&self, _event: &mut Event) {}
}

pub trait FocusListener: Send + Sync {
    fn focus_gained(&self, _event: &mut Event) {}
    fn focus_lost(&self, _event: &mut Event) {}
}

pub trait ControlListener: Send + Sync {
    fn control_moved(&self, _event: &mut Event) {}
    fn control_resized(&self, _event: &mut Event) {}
}

pub trait PaintListener: Send + Sync {
    fn paint_control(&self, event: &mut Event);
}

pub trait ShellListener: Send + Sync {
    /// Clear `event.doit` to keep the shell open
    fn shell_closed(&self, event: &mut Event);
}

pub trait DisposeListener: Send + Sync {
    fn widget_disposed(&self, event: &mut Event);
}

/// The capability set of a typed listener object
///
/// Implement the listener traits you care about and return `Some(self)`
/// from the matching accessor.
pub trait ListenerCapabilities: Send + Sync {
    fn selection(&self) -> Option<&dyn SelectionListener> {
        None
    }
    fn mouse(&self) -> Option<&dyn MouseListener> {
        None
    }
    fn mouse_move(&self) -> Option<&dyn MouseMoveListener> {
        None
    }
    fn key(&self) -> Option<&dyn KeyListener> {
        None
    }
    fn focus(&self) -> Option<&dyn FocusListener> {
        None
    }
    fn control(&self) -> Option<&dyn ControlListener> {
        None
    }
    fn paint(&self) -> Option<&dyn PaintListener> {
        None
    }
    fn shell(&self) -> Option<&dyn ShellListener> {
        None
    }
    fn dispose(&self) -> Option<&dyn DisposeListener> {
        None
    }
}

/// Event kinds a typed listener can receive
pub fn subscribed_kinds(listener: &dyn ListenerCapabilities) -> Vec<EventKind> {
    EventKind::ALL
        .into_iter()
        .filter(|kind| handles(listener, *kind))
        .collect()
}

fn handles(listener: &dyn ListenerCapabilities, kind: EventKind) -> bool {
    match kind {
        EventKind::Selection | EventKind::DefaultSelection => listener.selection().is_some(),
        EventKind::MouseDown | EventKind::MouseUp | EventKind::MouseDoubleClick => {
            listener.mouse().is_some()
        }
        EventKind::MouseMove => listener.mouse_move().is_some(),
        EventKind::KeyDown | EventKind::KeyUp => listener.key().is_some(),
        EventKind::FocusIn | EventKind::FocusOut => listener.focus().is_some(),
        EventKind::Move | EventKind::Resize => listener.control().is_some(),
        EventKind::Paint => listener.paint().is_some(),
        EventKind::Close => listener.shell().is_some(),
        EventKind::Dispose => listener.dispose().is_some(),
    }
}

/// Invoke the typed method matching `event.kind`, if the listener has it
///
/// Returns whether a method was called.
pub fn dispatch_typed(listener: &dyn ListenerCapabilities, event: &mut Event) -> bool {
    let called = match event.kind {
        EventKind::Selection => listener.selection().map(|l| l.widget_selected(event)),
        EventKind::DefaultSelection => {
            listener.selection().map(|l| l.widget_default_selected(event))
        }
        EventKind::MouseDown => listener.mouse().map(|l| l.mouse_down(event)),
        EventKind::MouseUp => listener.mouse().map(|l| l.mouse_up(event)),
        EventKind::MouseDoubleClick => listener.mouse().map(|l| l.mouse_double_click(event)),
        EventKind::MouseMove => listener.mouse_move().map(|l| l.mouse_move(event)),
        EventKind::KeyDown => listener.key().map(|l| l.key_pressed(event)),
        EventKind::KeyUp => listener.key().map(|l| l.key_released(event)),
        EventKind::FocusIn => listener.focus().map(|l| l.focus_gained(event)),
        EventKind::FocusOut => listener.focus().map(|l| l.focus_lost(event)),
        EventKind::Move => listener.control().map(|l| l.control_moved(event)),
        EventKind::Resize => listener.control().map(|l| l.control_resized(event)),
        EventKind::Paint => listener.paint().map(|l| l.paint_control(event)),
        EventKind::Close => listener.shell().map(|l| l.shell_closed(event)),
        EventKind::Dispose => listener.dispose().map(|l| l.widget_disposed(event)),
    };
    called.is_some()
}

/// Identifies one registration; a typed listener gets one id for all its kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A registered listener
#[derive(Clone)]
pub enum Registered {
    Untyped(Arc<ListenerFn>),
    Typed(Arc<dyn ListenerCapabilities>),
}

/// Ordered listener registrations of one widget
#[derive(Default)]
pub struct ListenerTable {
    next_id: u64,
    entries: Vec<(ListenerId, EventKind, Registered)>,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    /// Register a closure for one event kind
    pub fn add(&mut self, kind: EventKind, listener: Arc<ListenerFn>) -> ListenerId {
        let id = self.allocate();
        self.entries.push((id, kind, Registered::Untyped(listener)));
        id
    }

    /// Register a typed listener for every kind its capabilities cover
    pub fn add_typed(&mut self, listener: Arc<dyn ListenerCapabilities>) -> ListenerId {
        let id = self.allocate();
        for kind in subscribed_kinds(listener.as_ref()) {
            self.entries
                .push((id, kind, Registered::Typed(Arc::clone(&listener))));
        }
        id
    }

    /// Remove every entry of a registration
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _, _)| *entry != id);
        self.entries.len() != before
    }

    pub fn is_listening(&self, kind: EventKind) -> bool {
        self.entries.iter().any(|(_, k, _)| *k == kind)
    }

    /// Listeners for `kind`, in registration order
    pub fn snapshot(&self, kind: EventKind) -> Vec<Registered> {
        self.entries
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, listener)| listener.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Deliver an event to each listener in order
///
/// A panicking listener is logged and skipped. Returns how many listeners
/// were invoked.
pub fn deliver(listeners: &[Registered], event: &mut Event) -> usize {
    let mut invoked = 0;
    for listener in listeners {
        let result = panic::catch_unwind(AssertUnwindSafe(|| match listener {
            Registered::Untyped(f) => {
                f(event);
                true
            }
            Registered::Typed(typed) => dispatch_typed(typed.as_ref(), event),
        }));
        match result {
            Ok(true) => invoked += 1,
            Ok(false) => {}
            Err(payload) => {
                invoked += 1;
                error!(
                    "{:?} listener panicked, continuing: {}",
                    event.kind,
                    ActionPanic::from_payload(payload.as_ref()).message
                );
            }
        }
    }
    invoked
}
