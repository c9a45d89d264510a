//! tether-ui: UI-thread dispatch and native resource lifetimes for a widget toolkit
//!
//! A [`Display`] binds one thread as the UI thread. Native resources are
//! wrapped in [`ExclusiveHandle`] or [`SharedHandle`] and released exactly
//! once on that thread. [`Widget`]s form a tree whose disposal cascades from
//! parent to children.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod handle;
pub mod logging;
pub mod platform;
pub mod widget;

pub use config::ToolkitConfig;
pub use dispatch::{Display, DisplayRegistry, TimerId};
pub use error::{ActionPanic, Result, ToolkitError};
pub use event::{Event, EventKind};
pub use handle::{ExclusiveHandle, NativeContext, NativeResource, SharedHandle};
pub use platform::{Platform, RawHandle, ResourceKind, ResourceSpec};
pub use widget::{ControlClass, Lifecycle, Rect, Widget, WidgetKind};
