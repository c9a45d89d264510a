//! Widget kinds and the capability records they carry

use std::fmt;

use crate::platform::ResourceKind;

/// Widget position and size in parent coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Geometry and interaction state of widgets that occupy screen space
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlRecord {
    pub bounds: Rect,
    pub visible: bool,
    pub enabled: bool,
}

impl Default for ControlRecord {
    fn default() -> Self {
        Self {
            bounds: Rect::ZERO,
            visible: true,
            enabled: true,
        }
    }
}

/// What a widget kind supports
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Has bounds, visibility and enablement
    pub control: bool,
    /// Can own child widgets
    pub children: bool,
}

/// Leaf control flavours
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlClass {
    Button,
    Label,
    Text,
    Canvas,
    List,
}

/// The kind of a widget, selecting its capabilities
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    /// Top-level window
    Shell,
    /// Control that holds other controls
    Composite,
    Control(ControlClass),
    Menu,
    /// Menu entry or other child without a window of its own
    Item,
}

impl WidgetKind {
    pub fn name(&self) -> &'static str {
        match self {
            WidgetKind::Shell => "shell",
            WidgetKind::Composite => "composite",
            WidgetKind::Control(ControlClass::Button) => "button",
            WidgetKind::Control(ControlClass::Label) => "label",
            WidgetKind::Control(ControlClass::Text) => "text",
            WidgetKind::Control(ControlClass::Canvas) => "canvas",
            WidgetKind::Control(ControlClass::List) => "list",
            WidgetKind::Menu => "menu",
            WidgetKind::Item => "item",
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            WidgetKind::Shell | WidgetKind::Composite => Capabilities {
                control: true,
                children: true,
            },
            WidgetKind::Control(_) => Capabilities {
                control: true,
                children: false,
            },
            WidgetKind::Menu => Capabilities {
                control: false,
                children: true,
            },
            WidgetKind::Item => Capabilities {
                control: false,
                children: false,
            },
        }
    }

    /// Native resource created together with a widget of this kind
    pub fn native_resource(&self) -> Option<ResourceKind> {
        match self {
            WidgetKind::Shell | WidgetKind::Composite | WidgetKind::Control(_) => {
                Some(ResourceKind::Window)
            }
            WidgetKind::Menu => Some(ResourceKind::Menu),
            WidgetKind::Item => None,
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
