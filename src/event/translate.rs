//! Native callback to typed event translation

use super::{Event, EventKind};
use crate::platform::{NativeEvent, NativeMessage};

/// Translate a native callback into an event
///
/// Returns None for callbacks that carry no listener-visible event
/// (`Destroyed` is handled by the display itself).
pub fn translate(msg: &NativeMessage) -> Option<Event> {
    let mut event = match &msg.event {
        NativeEvent::ButtonPress {
            x,
            y,
            button,
            modifiers,
        } => pointer(EventKind::MouseDown, *x, *y, *button, *modifiers),
        NativeEvent::ButtonRelease {
            x,
            y,
            button,
            modifiers,
        } => pointer(EventKind::MouseUp, *x, *y, *button, *modifiers),
        NativeEvent::DoubleClick {
            x,
            y,
            button,
            modifiers,
        } => pointer(EventKind::MouseDoubleClick, *x, *y, *button, *modifiers),
        NativeEvent::PointerMotion { x, y, modifiers } => {
            pointer(EventKind::MouseMove, *x, *y, 0, *modifiers)
        }
        NativeEvent::KeyPress {
            key_code,
            character,
            modifiers,
        } => key(EventKind::KeyDown, *key_code, *character, *modifiers),
        NativeEvent::KeyRelease {
            key_code,
            character,
            modifiers,
        } => key(EventKind::KeyUp, *key_code, *character, *modifiers),
        NativeEvent::Activate => Event::new(EventKind::Selection),
        NativeEvent::DefaultActivate => Event::new(EventKind::DefaultSelection),
        NativeEvent::FocusIn => Event::new(EventKind::FocusIn),
        NativeEvent::FocusOut => Event::new(EventKind::FocusOut),
        NativeEvent::Moved { x, y } => {
            let mut event = Event::new(EventKind::Move);
            event.x = *x;
            event.y = *y;
            event
        }
        NativeEvent::Resized { width, height } => {
            let mut event = Event::new(EventKind::Resize);
            event.width = *width;
            event.height = *height;
            event
        }
        NativeEvent::Expose {
            x,
            y,
            width,
            height,
        } => {
            let mut event = Event::new(EventKind::Paint);
            event.x = *x;
            event.y = *y;
            event.width = *width;
            event.height = *height;
            event
        }
        NativeEvent::CloseRequest => Event::new(EventKind::Close),
        NativeEvent::Destroyed => return None,
    };
    event.time = msg.time;
    Some(event)
}

fn pointer(
    kind: EventKind,
    x: i32,
    y: i32,
    button: u8,
    modifiers: crate::platform::Modifiers,
) -> Event {
    let mut event = Event::new(kind);
    event.x = x;
    event.y = y;
    event.button = button;
    event.modifiers = modifiers;
    event
}

fn key(
    kind: EventKind,
    key_code: u32,
    character: Option<char>,
    modifiers: crate::platform::Modifiers,
) -> Event {
    let mut event = Event::new(kind);
    event.key_code = key_code;
    event.character = character;
    event.modifiers = modifiers;
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Modifiers, RawHandle};

    fn msg(event: NativeEvent) -> NativeMessage {
        NativeMessage {
            target: RawHandle::new(0x40).unwrap(),
            event,
            time: 77,
        }
    }

    #[test]
    fn test_button_press() {
        let event = translate(&msg(NativeEvent::ButtonPress {
            x: 3,
            y: -4,
            button: 2,
            modifiers: Modifiers {
                shift: true,
                ..Modifiers::NONE
            },
        }))
        .unwrap();
        assert_eq!(event.kind, EventKind::MouseDown);
        assert_eq!((event.x, event.y, event.button), (3, -4, 2));
        assert!(event.modifiers.shift);
        assert_eq!(event.time, 77);
        assert!(event.doit);
    }

    #[test]
    fn test_key_press_keeps_character() {
        let event = translate(&msg(NativeEvent::KeyPress {
            key_code: 0x41,
            character: Some('a'),
            modifiers: Modifiers::NONE,
        }))
        .unwrap();
        assert_eq!(event.kind, EventKind::KeyDown);
        assert_eq!(event.key_code, 0x41);
        assert_eq!(event.character, Some('a'));
    }

    #[test]
    fn test_activation_maps_to_selection() {
        assert_eq!(
            translate(&msg(NativeEvent::Activate)).unwrap().kind,
            EventKind::Selection
        );
        assert_eq!(
            translate(&msg(NativeEvent::DefaultActivate)).unwrap().kind,
            EventKind::DefaultSelection
        );
    }

    #[test]
    fn test_geometry_events() {
        let resize = translate(&msg(NativeEvent::Resized {
            width: 200,
            height: 100,
        }))
        .unwrap();
        assert_eq!(resize.kind, EventKind::Resize);
        assert_eq!((resize.width, resize.height), (200, 100));

        let paint = translate(&msg(NativeEvent::Expose {
            x: 1,
            y: 2,
            width: 3,
            height: 4,
        }))
        .unwrap();
        assert_eq!(paint.kind, EventKind::Paint);
        assert_eq!((paint.x, paint.y, paint.width, paint.height), (1, 2, 3, 4));
    }

    #[test]
    fn test_destroyed_is_not_an_event() {
        assert!(translate(&msg(NativeEvent::Destroyed)).is_none());
    }
}
