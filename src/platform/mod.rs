//! Platform abstraction layer
//!
//! A [`Platform`] is the set of native primitives one windowing system
//! offers: create/destroy of the native resources the toolkit wraps,
//! retain/release for reference-counted objects, and the message pump.
//! Exactly one implementation is chosen by [`select`] when the application
//! starts; the rest of the crate only sees `Arc<dyn Platform>`.
//!
//! Apart from [`Platform::wake`], every method may only be called on the UI
//! thread of the display that attached the platform.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

pub mod headless;

#[cfg(target_os = "windows")]
pub mod win32;

pub use headless::HeadlessPlatform;

/// Raw native resource reference (HWND, HFONT, HMENU, ...)
///
/// Never null. Carries no ownership; see [`crate::handle`] for that.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle(NonZeroUsize);

impl RawHandle {
    /// Wrap a raw value, rejecting null
    pub fn new(value: usize) -> Option<Self> {
        NonZeroUsize::new(value).map(Self)
    }

    /// The raw value
    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawHandle(0x{:x})", self.0)
    }
}

/// The kinds of native resource the toolkit manages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Window,
    Font,
    Image,
    Menu,
    GraphicsContext,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Window => "window",
            ResourceKind::Font => "font",
            ResourceKind::Image => "image",
            ResourceKind::Menu => "menu",
            ResourceKind::GraphicsContext => "graphics context",
        };
        f.write_str(name)
    }
}

/// Parameters for creating one native resource
#[derive(Clone, Debug, PartialEq)]
pub enum ResourceSpec {
    Window {
        title: String,
        width: i32,
        height: i32,
        /// Native parent window, None for top-level
        parent: Option<RawHandle>,
    },
    Font {
        family: String,
        /// Height in points
        size: f32,
        /// 100..=900, 400 is regular
        weight: u16,
        italic: bool,
    },
    Image {
        width: u32,
        height: u32,
    },
    Menu {
        /// Popup (context) menu rather than a menu bar
        popup: bool,
    },
    GraphicsContext {
        /// Compatible with this window's surface, or the screen
        target: Option<RawHandle>,
    },
}

impl ResourceSpec {
    /// The kind of resource this spec creates
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::Window { .. } => ResourceKind::Window,
            ResourceSpec::Font { .. } => ResourceKind::Font,
            ResourceSpec::Image { .. } => ResourceKind::Image,
            ResourceSpec::Menu { .. } => ResourceKind::Menu,
            ResourceSpec::GraphicsContext { .. } => ResourceKind::GraphicsContext,
        }
    }

    /// Human readable parameters, used in creation errors
    pub fn describe(&self) -> String {
        match self {
            ResourceSpec::Window {
                title,
                width,
                height,
                parent,
            } => format!(
                "title={:?} size={}x{} parent={:?}",
                title, width, height, parent
            ),
            ResourceSpec::Font {
                family,
                size,
                weight,
                italic,
            } => format!(
                "family={:?} size={} weight={} italic={}",
                family, size, weight, italic
            ),
            ResourceSpec::Image { width, height } => format!("size={}x{}", width, height),
            ResourceSpec::Menu { popup } => format!("popup={}", popup),
            ResourceSpec::GraphicsContext { target } => format!("target={:?}", target),
        }
    }
}

/// Modifier key state carried by native input
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
    };
}

/// Native input/notification, already decoded from the platform's message format
#[derive(Clone, Debug, PartialEq)]
pub enum NativeEvent {
    /// Mouse button pressed; buttons are numbered from 1 (left)
    ButtonPress { x: i32, y: i32, button: u8, modifiers: Modifiers },
    ButtonRelease { x: i32, y: i32, button: u8, modifiers: Modifiers },
    DoubleClick { x: i32, y: i32, button: u8, modifiers: Modifiers },
    PointerMotion { x: i32, y: i32, modifiers: Modifiers },
    KeyPress { key_code: u32, character: Option<char>, modifiers: Modifiers },
    KeyRelease { key_code: u32, character: Option<char>, modifiers: Modifiers },
    /// The control was activated (button click, menu item chosen)
    Activate,
    /// Default action (double click in a list, Enter in a field)
    DefaultActivate,
    FocusIn,
    FocusOut,
    Moved { x: i32, y: i32 },
    Resized { width: i32, height: i32 },
    Expose { x: i32, y: i32, width: i32, height: i32 },
    /// The user asked to close a top-level window
    CloseRequest,
    /// The native object was destroyed behind our back
    Destroyed,
}

/// One native callback, addressed to the native resource it was raised on
#[derive(Clone, Debug, PartialEq)]
pub struct NativeMessage {
    pub target: RawHandle,
    pub event: NativeEvent,
    /// Platform timestamp in milliseconds
    pub time: u64,
}

/// Native primitive failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The native factory refused
    #[error("native creation failed: {0}")]
    CreateFailed(String),

    /// The native destroy/release call reported failure
    #[error("native release failed: {0}")]
    ReleaseFailed(String),

    /// Unknown or already destroyed handle
    #[error("invalid native handle {0:?}")]
    InvalidHandle(RawHandle),

    /// Called from a thread that does not own the native state
    #[error("native call made off the UI thread")]
    WrongThread,

    /// Operation not available for this resource kind
    #[error("{0} does not support this operation")]
    Unsupported(ResourceKind),

    /// Platform setup failed
    #[error("platform attach failed: {0}")]
    AttachFailed(String),
}

/// Native primitives of one windowing system
pub trait Platform: Send + Sync + 'static {
    /// Short platform name for logs and errors
    fn name(&self) -> &'static str;

    /// Whether the UI thread must be the process's first thread
    fn requires_main_thread(&self) -> bool {
        false
    }

    /// Whether the calling thread is the process's first thread
    ///
    /// The Rust runtime names the thread that runs `main` "main".
    fn is_main_thread(&self) -> bool {
        std::thread::current().name() == Some("main")
    }

    /// Bind native state to the calling thread (called once by `Display`)
    fn attach(&self) -> Result<(), PlatformError>;

    /// Undo `attach` (called once when the display is disposed)
    fn detach(&self);

    /// Create a native resource
    fn create(&self, spec: &ResourceSpec) -> Result<RawHandle, PlatformError>;

    /// Destroy a resource created by `create`
    fn destroy(&self, kind: ResourceKind, raw: RawHandle) -> Result<(), PlatformError>;

    /// Increment the native reference count of a shared resource
    fn retain(&self, kind: ResourceKind, raw: RawHandle) -> Result<(), PlatformError>;

    /// Decrement the native reference count of a shared resource
    fn release(&self, kind: ResourceKind, raw: RawHandle) -> Result<(), PlatformError>;

    /// Update the visible text of a native resource
    fn set_text(&self, kind: ResourceKind, raw: RawHandle, text: &str)
        -> Result<(), PlatformError>;

    /// Take the next pending native callback, if any
    ///
    /// Platforms with their own dispatch (window procedures) run it here.
    fn poll_native(&self) -> Option<NativeMessage>;

    /// Block until native input arrives, `wake` is called, or `timeout` elapses
    fn wait(&self, timeout: Duration);

    /// Interrupt `wait`. Callable from any thread.
    fn wake(&self);
}

/// Create the platform for this process
///
/// Win32 on Windows, the headless platform elsewhere.
pub fn select() -> Arc<dyn Platform> {
    #[cfg(target_os = "windows")]
    {
        Arc::new(win32::Win32Platform::new())
    }
    #[cfg(not(target_os = "windows"))]
    {
        Arc::new(HeadlessPlatform::new())
    }
}
