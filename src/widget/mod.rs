//! Widget tree with cascade disposal
//!
//! A [`Widget`] is a cheap handle onto shared node state. Parents own their
//! children; children only hold a weak back-reference, so a subtree is kept
//! alive by its root shell (which the display owns) and by any handles the
//! application still holds.
//!
//! Model state sits behind a mutex so any thread may read it. Anything that
//! touches native state (construction, setters, disposal) must run on the
//! display's UI thread.

use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::dispatch::{Display, DisplayInner};
use crate::error::{Result, ToolkitError};
use crate::event::listener::{self, ListenerFn};
use crate::event::{translate, Event, EventKind, ListenerCapabilities, ListenerId, ListenerTable};
use crate::handle::{ExclusiveHandle, NativeContext, NativeResource, SharedHandle};
use crate::platform::{NativeEvent, NativeMessage, RawHandle, ResourceKind, ResourceSpec};

mod kind;

pub use kind::{Capabilities, ControlClass, ControlRecord, Rect, WidgetKind};

/// Size given to native windows before the application sets bounds
const DEFAULT_WINDOW_SIZE: (i32, i32) = (200, 100);

/// Identifies a widget within its display
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(pub(crate) u64);

/// Widget lifecycle; `Disposed` is terminal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Live,
    Disposing,
    Disposed,
}

struct WidgetState {
    lifecycle: Lifecycle,
    text: String,
    control: Option<ControlRecord>,
    children: Vec<Widget>,
    // Primary native resource first, then attached ones in attach order
    resources: Vec<NativeResource>,
    listeners: ListenerTable,
    data: HashMap<String, String>,
}

pub(crate) struct WidgetInner {
    id: WidgetId,
    kind: WidgetKind,
    ctx: NativeContext,
    display: Weak<DisplayInner>,
    parent: Option<Weak<WidgetInner>>,
    primary: Option<RawHandle>,
    state: Mutex<WidgetState>,
}

/// A node in the widget tree
#[derive(Clone)]
pub struct Widget {
    inner: Arc<WidgetInner>,
}

impl Widget {
    /// Create a top-level shell owned by `display`
    pub fn top_level(display: &Display, title: &str) -> Result<Widget> {
        display.check_live("Widget::top_level")?;
        let shell = Self::build(display, None, WidgetKind::Shell, title)?;
        display.add_shell(shell.clone());
        Ok(shell)
    }

    /// Create a child of `parent`
    ///
    /// Fails if the parent is disposed, cannot hold children, or if called
    /// off the UI thread.
    pub fn new(parent: &Widget, kind: WidgetKind) -> Result<Widget> {
        parent.check_widget()?;
        parent.inner.ctx.check_thread("Widget::new")?;
        if !parent.inner.kind.capabilities().children {
            return Err(ToolkitError::InvalidParent {
                parent: parent.inner.kind.name(),
                child: kind.name(),
            });
        }
        let display = parent.display()?;

        let child = Self::build(&display, Some(parent), kind, "")?;
        {
            let mut state = parent.inner.state.lock();
            if state.lifecycle != Lifecycle::Live {
                // The parent went away while the native side was being built
                drop(state);
                child.dispose_quietly();
                return Err(ToolkitError::disposed(parent.describe()));
            }
            state.children.push(child.clone());
        }
        Ok(child)
    }

    fn build(
        display: &Display,
        parent: Option<&Widget>,
        kind: WidgetKind,
        text: &str,
    ) -> Result<Widget> {
        let ctx = display.context().clone();
        ctx.check_thread("Widget::new")?;

        let primary = match native_spec(kind, text, parent) {
            Some(spec) => Some(ExclusiveHandle::create(&ctx, &spec)?),
            None => None,
        };
        let primary_raw = match &primary {
            Some(handle) => Some(handle.raw()?),
            None => None,
        };

        let control = kind.capabilities().control.then(|| ControlRecord {
            bounds: Rect::new(0, 0, DEFAULT_WINDOW_SIZE.0, DEFAULT_WINDOW_SIZE.1),
            ..ControlRecord::default()
        });

        let inner = Arc::new(WidgetInner {
            id: display.next_widget_id(),
            kind,
            ctx,
            display: display.downgrade(),
            parent: parent.map(|p| Arc::downgrade(&p.inner)),
            primary: primary_raw,
            state: Mutex::new(WidgetState {
                lifecycle: Lifecycle::Created,
                text: text.to_string(),
                control,
                children: Vec::new(),
                resources: primary.into_iter().map(NativeResource::from).collect(),
                listeners: ListenerTable::new(),
                data: HashMap::new(),
            }),
        });

        if let Some(raw) = primary_raw {
            display.register_route(raw, Arc::downgrade(&inner));
        }
        inner.state.lock().lifecycle = Lifecycle::Live;
        debug!("created {} {:?} ({:?})", kind, inner.id, primary_raw);
        Ok(Widget { inner })
    }

    pub(crate) fn from_inner(inner: Arc<WidgetInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> WidgetId {
        self.inner.id
    }

    pub fn kind(&self) -> WidgetKind {
        self.inner.kind
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.state.lock().lifecycle
    }

    pub fn is_disposed(&self) -> bool {
        self.lifecycle() == Lifecycle::Disposed
    }

    /// Fail with `Disposed` unless the widget is live
    pub fn check_widget(&self) -> Result<()> {
        match self.lifecycle() {
            Lifecycle::Live => Ok(()),
            _ => Err(ToolkitError::disposed(self.describe())),
        }
    }

    fn check_mutation(&self, operation: &'static str) -> Result<()> {
        self.check_widget()?;
        self.inner.ctx.check_thread(operation)
    }

    fn describe(&self) -> String {
        format!("{} {:?}", self.inner.kind, self.inner.id)
    }

    /// The native window or menu of this widget
    pub fn raw_handle(&self) -> Result<Option<RawHandle>> {
        self.check_widget()?;
        Ok(self.inner.primary)
    }

    pub fn text(&self) -> Result<String> {
        self.check_widget()?;
        Ok(self.inner.state.lock().text.clone())
    }

    pub fn set_text(&self, text: &str) -> Result<()> {
        self.check_mutation("Widget::set_text")?;
        if let Some(raw) = self.inner.primary {
            if self.inner.kind.native_resource() == Some(ResourceKind::Window) {
                self.inner
                    .ctx
                    .platform()
                    .set_text(ResourceKind::Window, raw, text)?;
            }
        }
        self.inner.state.lock().text = text.to_string();
        Ok(())
    }

    fn control_record(&self, operation: &'static str) -> Result<ControlRecord> {
        self.check_widget()?;
        self.inner
            .state
            .lock()
            .control
            .ok_or(ToolkitError::Unsupported {
                operation,
                kind: self.inner.kind.name(),
            })
    }

    fn update_control<F>(&self, operation: &'static str, update: F) -> Result<ControlRecord>
    where
        F: FnOnce(&mut ControlRecord),
    {
        self.check_mutation(operation)?;
        let mut state = self.inner.state.lock();
        let record = state.control.as_mut().ok_or(ToolkitError::Unsupported {
            operation,
            kind: self.inner.kind.name(),
        })?;
        let before = *record;
        update(record);
        Ok(before)
    }

    pub fn bounds(&self) -> Result<Rect> {
        Ok(self.control_record("bounds")?.bounds)
    }

    /// Move and resize, notifying `Move`/`Resize` listeners of what changed
    pub fn set_bounds(&self, bounds: Rect) -> Result<()> {
        let before = self.update_control("Widget::set_bounds", |r| r.bounds = bounds)?;
        self.notify_geometry(before.bounds, bounds);
        Ok(())
    }

    fn notify_geometry(&self, before: Rect, after: Rect) {
        if (before.x, before.y) != (after.x, after.y) {
            let mut event = Event::new(EventKind::Move);
            event.x = after.x;
            event.y = after.y;
            self.deliver(event);
        }
        if (before.width, before.height) != (after.width, after.height) {
            let mut event = Event::new(EventKind::Resize);
            event.width = after.width;
            event.height = after.height;
            self.deliver(event);
        }
    }

    pub fn is_visible(&self) -> Result<bool> {
        Ok(self.control_record("visibility")?.visible)
    }

    pub fn set_visible(&self, visible: bool) -> Result<()> {
        self.update_control("Widget::set_visible", |r| r.visible = visible)?;
        Ok(())
    }

    pub fn is_enabled(&self) -> Result<bool> {
        Ok(self.control_record("enablement")?.enabled)
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.update_control("Widget::set_enabled", |r| r.enabled = enabled)?;
        Ok(())
    }

    /// Children in creation order
    pub fn children(&self) -> Result<Vec<Widget>> {
        self.check_widget()?;
        Ok(self.inner.state.lock().children.clone())
    }

    pub fn parent(&self) -> Result<Option<Widget>> {
        self.check_widget()?;
        Ok(self.parent_widget())
    }

    fn parent_widget(&self) -> Option<Widget> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Widget::from_inner)
    }

    /// The nearest enclosing shell, or this widget if it is one
    pub fn shell(&self) -> Result<Widget> {
        self.check_widget()?;
        let mut current = self.clone();
        loop {
            if current.inner.kind == WidgetKind::Shell {
                return Ok(current);
            }
            current = current
                .parent_widget()
                .ok_or_else(|| ToolkitError::disposed(format!("parent of {}", current.describe())))?;
        }
    }

    pub fn display(&self) -> Result<Display> {
        self.inner
            .display
            .upgrade()
            .map(Display::from_inner)
            .ok_or_else(|| ToolkitError::disposed("display"))
    }

    /// Create an extra destroy-once resource owned by this widget
    ///
    /// Released when the widget is disposed, before its own window.
    pub fn attach_resource(&self, spec: &ResourceSpec) -> Result<RawHandle> {
        self.check_mutation("Widget::attach_resource")?;
        let handle = ExclusiveHandle::create(&self.inner.ctx, spec)?;
        let raw = handle.raw()?;
        self.inner.state.lock().resources.push(handle.into());
        Ok(raw)
    }

    /// Wrap a reference-counted native object and tie it to this widget
    pub fn attach_shared(&self, kind: ResourceKind, raw: RawHandle, owns: bool) -> Result<()> {
        self.check_mutation("Widget::attach_shared")?;
        let handle = SharedHandle::from_handle(&self.inner.ctx, kind, raw, owns)?;
        self.inner.state.lock().resources.push(handle.into());
        Ok(())
    }

    pub fn set_data(&self, key: &str, value: impl Into<String>) -> Result<()> {
        self.check_mutation("Widget::set_data")?;
        self.inner
            .state
            .lock()
            .data
            .insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn data(&self, key: &str) -> Result<Option<String>> {
        self.check_widget()?;
        Ok(self.inner.state.lock().data.get(key).cloned())
    }

    /// Register a closure for one event kind
    pub fn add_listener<F>(&self, kind: EventKind, listener: F) -> Result<ListenerId>
    where
        F: Fn(&mut Event) + Send + Sync + 'static,
    {
        self.check_widget()?;
        let listener: Arc<ListenerFn> = Arc::new(listener);
        Ok(self.inner.state.lock().listeners.add(kind, listener))
    }

    /// Register a typed listener for every event kind it has a capability for
    pub fn add_typed_listener(&self, listener: Arc<dyn ListenerCapabilities>) -> Result<ListenerId> {
        self.check_widget()?;
        Ok(self.inner.state.lock().listeners.add_typed(listener))
    }

    pub fn remove_listener(&self, id: ListenerId) -> Result<bool> {
        self.check_widget()?;
        Ok(self.inner.state.lock().listeners.remove(id))
    }

    pub fn is_listening(&self, kind: EventKind) -> Result<bool> {
        self.check_widget()?;
        Ok(self.inner.state.lock().listeners.is_listening(kind))
    }

    /// Deliver `event` to this widget's `kind` listeners and hand it back
    pub fn notify_listeners(&self, kind: EventKind, mut event: Event) -> Result<Event> {
        self.check_mutation("Widget::notify_listeners")?;
        event.kind = kind;
        Ok(self.deliver(event))
    }

    /// Run the listeners for `event.kind` without holding any widget lock
    pub(crate) fn deliver(&self, mut event: Event) -> Event {
        event.widget = Some(self.clone());
        let listeners = self.inner.state.lock().listeners.snapshot(event.kind);
        if !listeners.is_empty() {
            listener::deliver(&listeners, &mut event);
        }
        event
    }

    /// React to a native callback aimed at this widget
    pub(crate) fn handle_native(&self, msg: &NativeMessage) {
        if self.lifecycle() != Lifecycle::Live {
            return;
        }
        match &msg.event {
            NativeEvent::Destroyed => {
                self.native_destroyed();
                return;
            }
            NativeEvent::Moved { x, y } => {
                if let Some(record) = self.inner.state.lock().control.as_mut() {
                    record.bounds.x = *x;
                    record.bounds.y = *y;
                }
            }
            NativeEvent::Resized { width, height } => {
                if let Some(record) = self.inner.state.lock().control.as_mut() {
                    record.bounds.width = *width;
                    record.bounds.height = *height;
                }
            }
            _ => {}
        }

        let Some(event) = translate(msg) else {
            return;
        };
        let event = self.deliver(event);
        if event.kind == EventKind::Close && self.inner.kind == WidgetKind::Shell {
            if event.doit {
                self.dispose_quietly();
            } else {
                debug!("close of {} vetoed", self.describe());
            }
        }
    }

    /// The platform tore the window down on its own: forget it, then dispose
    pub(crate) fn native_destroyed(&self) {
        self.abandon_windows();
        self.dispose_quietly();
    }

    /// Forget the native windows of this subtree without destroying them
    ///
    /// Child windows die with their parent window.
    fn abandon_windows(&self) {
        let children = {
            let state = self.inner.state.lock();
            if self.inner.primary.is_some() {
                if let Some(NativeResource::Exclusive(primary)) = state.resources.first() {
                    if primary.kind() == ResourceKind::Window {
                        primary.abandon();
                    }
                }
            }
            state.children.clone()
        };
        for child in &children {
            child.abandon_windows();
        }
    }

    fn dispose_quietly(&self) {
        if let Err(e) = self.dispose() {
            warn!("failed to dispose {}: {}", self.describe(), e);
        }
    }

    /// Dispose this widget and its subtree
    ///
    /// Delivers `Dispose`, disposes children first, unlinks from the parent
    /// and releases native resources last. Repeat calls do nothing.
    pub fn dispose(&self) -> Result<()> {
        if matches!(self.lifecycle(), Lifecycle::Disposing | Lifecycle::Disposed) {
            return Ok(());
        }
        self.inner.ctx.check_thread("Widget::dispose")?;

        let children = {
            let mut state = self.inner.state.lock();
            if matches!(state.lifecycle, Lifecycle::Disposing | Lifecycle::Disposed) {
                return Ok(());
            }
            state.lifecycle = Lifecycle::Disposing;
            state.children.clone()
        };
        debug!("disposing {}", self.describe());

        self.deliver(Event::new(EventKind::Dispose));

        for child in &children {
            child.dispose_quietly();
        }

        if let Some(parent) = self.parent_widget() {
            parent
                .inner
                .state
                .lock()
                .children
                .retain(|c| c.inner.id != self.inner.id);
        }
        if let Some(display) = self.inner.display.upgrade().map(Display::from_inner) {
            if self.inner.parent.is_none() {
                display.remove_shell(self.inner.id);
            }
            if let Some(raw) = self.inner.primary {
                display.unregister_route(raw);
            }
        }

        let (resources, listeners) = {
            let mut state = self.inner.state.lock();
            state.children.clear();
            (
                mem::take(&mut state.resources),
                mem::take(&mut state.listeners),
            )
        };
        drop(listeners);
        for resource in resources.iter().rev() {
            resource.release();
        }
        drop(resources);

        self.inner.state.lock().lifecycle = Lifecycle::Disposed;
        Ok(())
    }
}

/// Creation parameters for a widget's own native resource
fn native_spec(kind: WidgetKind, text: &str, parent: Option<&Widget>) -> Option<ResourceSpec> {
    match kind {
        WidgetKind::Shell | WidgetKind::Composite | WidgetKind::Control(_) => {
            Some(ResourceSpec::Window {
                title: text.to_string(),
                width: DEFAULT_WINDOW_SIZE.0,
                height: DEFAULT_WINDOW_SIZE.1,
                parent: parent.and_then(|p| p.inner.primary),
            })
        }
        // A menu directly under a shell is its menu bar
        WidgetKind::Menu => Some(ResourceSpec::Menu {
            popup: parent.map_or(true, |p| p.inner.kind != WidgetKind::Shell),
        }),
        WidgetKind::Item => None,
    }
}

impl PartialEq for Widget {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Widget {}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Widget")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("primary", &self.inner.primary)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisplayConfig;
    use crate::dispatch::DisplayRegistry;
    use crate::event::{DisposeListener, SelectionListener};
    use crate::platform::HeadlessPlatform;

    struct Fixture {
        platform: Arc<HeadlessPlatform>,
        display: Display,
        _registry: DisplayRegistry,
    }

    fn fixture() -> Fixture {
        let platform = Arc::new(HeadlessPlatform::new());
        let registry = DisplayRegistry::new(HeadlessPlatform::new);
        let display = registry
            .open_with(platform.clone(), DisplayConfig::default())
            .unwrap();
        Fixture {
            platform,
            display,
            _registry: registry,
        }
    }

    fn raw(widget: &Widget) -> RawHandle {
        widget.raw_handle().unwrap().unwrap()
    }

    #[test]
    fn test_cascade_disposes_children_first_and_releases_handles() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "main").unwrap();
        let button = Widget::new(&shell, WidgetKind::Control(ControlClass::Button)).unwrap();
        let (shell_raw, button_raw) = (raw(&shell), raw(&button));

        shell.dispose().unwrap();

        assert!(shell.is_disposed());
        assert!(button.is_disposed());
        assert!(button.text().unwrap_err().is_disposed());
        assert!(!f.platform.is_live(shell_raw));
        assert!(!f.platform.is_live(button_raw));
        assert_eq!(f.platform.destroy_order(), vec![button_raw, shell_raw]);
        assert!(f.display.shells().is_empty());
        assert_eq!(f.display.find_widget(shell_raw), None);
    }

    #[test]
    fn test_native_destroy_spares_child_windows() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "main").unwrap();
        let group = Widget::new(&shell, WidgetKind::Composite).unwrap();
        let button = Widget::new(&group, WidgetKind::Control(ControlClass::Button)).unwrap();
        let menu = Widget::new(&shell, WidgetKind::Menu).unwrap();
        let font = button
            .attach_resource(&ResourceSpec::Font {
                family: "Sans".to_string(),
                size: 9.0,
                weight: 400,
                italic: false,
            })
            .unwrap();
        let windows = [raw(&shell), raw(&group), raw(&button)];

        f.platform.destroy_natively(raw(&shell));
        while f.display.read_and_dispatch().unwrap() {}

        for widget in [&shell, &group, &button, &menu] {
            assert!(widget.is_disposed());
        }
        for window in windows {
            assert_eq!(f.platform.destroy_calls(window), 0);
        }
        // Resources that are not child windows still get released
        assert_eq!(f.platform.destroy_calls(font), 1);
        assert_eq!(f.platform.live_count(ResourceKind::Menu), 0);
        assert_eq!(f.platform.violations(), 0);
    }

    #[test]
    fn test_mutations_after_dispose_fail() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "main").unwrap();
        let button = Widget::new(&shell, WidgetKind::Control(ControlClass::Button)).unwrap();
        let listener = button.add_listener(EventKind::Selection, |_| {}).unwrap();
        let image = f.platform.adopt(ResourceKind::Image);
        shell.dispose().unwrap();

        let font = ResourceSpec::Font {
            family: "Sans".to_string(),
            size: 9.0,
            weight: 400,
            italic: false,
        };
        let created = f.platform.created_count();
        let results = [
            button.set_text("x"),
            button.set_bounds(Rect::new(1, 2, 3, 4)),
            button.set_visible(false),
            button.set_enabled(false),
            button.set_data("key", "value"),
            button.attach_resource(&font).map(|_| ()),
            button.attach_shared(ResourceKind::Image, image, true),
            button.add_listener(EventKind::Selection, |_| {}).map(|_| ()),
            button.remove_listener(listener).map(|_| ()),
            button
                .notify_listeners(EventKind::Selection, Event::new(EventKind::Selection))
                .map(|_| ()),
            Widget::new(&button, WidgetKind::Item).map(|_| ()),
        ];
        for result in results {
            assert!(result.unwrap_err().is_disposed());
        }
        assert_eq!(f.platform.created_count(), created);
        assert_eq!(f.platform.ref_count(image), Some(1));
    }

    #[test]
    fn test_dispose_twice_is_noop() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "main").unwrap();
        let shell_raw = raw(&shell);
        shell.dispose().unwrap();
        shell.dispose().unwrap();
        assert_eq!(f.platform.destroy_calls(shell_raw), 1);
    }

    #[test]
    fn test_dispose_unlinks_from_parent() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "main").unwrap();
        let first = Widget::new(&shell, WidgetKind::Control(ControlClass::Label)).unwrap();
        let second = Widget::new(&shell, WidgetKind::Control(ControlClass::Text)).unwrap();
        assert_eq!(shell.children().unwrap(), vec![first.clone(), second.clone()]);

        first.dispose().unwrap();
        assert_eq!(shell.children().unwrap(), vec![second]);
        assert!(!shell.is_disposed());
    }

    #[test]
    fn test_construction_under_disposed_parent_fails() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "main").unwrap();
        shell.dispose().unwrap();
        let created_before = f.platform.created_count();

        let err = Widget::new(&shell, WidgetKind::Composite).unwrap_err();
        assert!(err.is_disposed());
        assert_eq!(f.platform.created_count(), created_before);
    }

    #[test]
    fn test_leaf_control_cannot_own_children() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "main").unwrap();
        let label = Widget::new(&shell, WidgetKind::Control(ControlClass::Label)).unwrap();
        assert!(matches!(
            Widget::new(&label, WidgetKind::Item),
            Err(ToolkitError::InvalidParent {
                parent: "label",
                child: "item"
            })
        ));
    }

    #[test]
    fn test_construction_off_ui_thread_is_rejected() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "main").unwrap();
        let remote = shell.clone();
        let result = std::thread::spawn(move || Widget::new(&remote, WidgetKind::Composite).map(|_| ()))
            .join()
            .unwrap();
        assert!(matches!(
            result,
            Err(ToolkitError::CrossThreadViolation { .. })
        ));
        assert!(shell.children().unwrap().is_empty());
    }

    #[test]
    fn test_dispose_event_sees_live_children() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "main").unwrap();
        let child = Widget::new(&shell, WidgetKind::Composite).unwrap();
        let seen = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&seen);
        let observed = child.clone();
        shell
            .add_listener(EventKind::Dispose, move |_e| {
                *slot.lock() = Some(observed.lifecycle());
            })
            .unwrap();

        shell.dispose().unwrap();
        assert_eq!(*seen.lock(), Some(Lifecycle::Live));
    }

    #[test]
    fn test_attached_resources_released_before_window() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "main").unwrap();
        let font = shell
            .attach_resource(&ResourceSpec::Font {
                family: "Mono".to_string(),
                size: 9.0,
                weight: 400,
                italic: false,
            })
            .unwrap();
        let shell_raw = raw(&shell);

        shell.dispose().unwrap();
        assert_eq!(f.platform.destroy_order(), vec![font, shell_raw]);
    }

    #[test]
    fn test_attached_shared_resource_keeps_parity() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "main").unwrap();
        let image = f.platform.adopt(ResourceKind::Image);
        shell.attach_shared(ResourceKind::Image, image, true).unwrap();
        assert_eq!(f.platform.ref_count(image), Some(2));

        shell.dispose().unwrap();
        assert_eq!(f.platform.ref_count(image), Some(1));
    }

    #[test]
    fn test_set_text_reaches_native_window() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "before").unwrap();
        assert_eq!(f.platform.text_of(raw(&shell)).as_deref(), Some("before"));

        shell.set_text("after").unwrap();
        assert_eq!(shell.text().unwrap(), "after");
        assert_eq!(f.platform.text_of(raw(&shell)).as_deref(), Some("after"));
    }

    #[test]
    fn test_setter_off_thread_fails_but_getter_works() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "title").unwrap();
        let remote = shell.clone();
        let (set, get) = std::thread::spawn(move || (remote.set_text("nope"), remote.text()))
            .join()
            .unwrap();
        assert!(matches!(set, Err(ToolkitError::CrossThreadViolation { .. })));
        assert_eq!(get.unwrap(), "title");
    }

    #[test]
    fn test_set_bounds_notifies_move_and_resize() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "main").unwrap();
        let kinds = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::Move, EventKind::Resize] {
            let kinds = Arc::clone(&kinds);
            shell
                .add_listener(kind, move |e| kinds.lock().push(e.kind))
                .unwrap();
        }

        shell.set_bounds(Rect::new(10, 20, 200, 100)).unwrap();
        assert_eq!(*kinds.lock(), vec![EventKind::Move]);
        shell.set_bounds(Rect::new(10, 20, 300, 100)).unwrap();
        assert_eq!(*kinds.lock(), vec![EventKind::Move, EventKind::Resize]);
        assert_eq!(shell.bounds().unwrap(), Rect::new(10, 20, 300, 100));
    }

    #[test]
    fn test_menu_has_no_bounds() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "main").unwrap();
        let menu = Widget::new(&shell, WidgetKind::Menu).unwrap();
        let item = Widget::new(&menu, WidgetKind::Item).unwrap();

        assert!(matches!(
            menu.bounds(),
            Err(ToolkitError::Unsupported { kind: "menu", .. })
        ));
        assert_eq!(item.raw_handle().unwrap(), None);
        assert_eq!(
            f.platform.spec_of(raw(&menu)),
            Some(ResourceSpec::Menu { popup: false })
        );
        item.set_text("Open").unwrap();
        assert_eq!(item.text().unwrap(), "Open");
    }

    #[test]
    fn test_shell_and_parent_navigation() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "main").unwrap();
        let group = Widget::new(&shell, WidgetKind::Composite).unwrap();
        let list = Widget::new(&group, WidgetKind::Control(ControlClass::List)).unwrap();

        assert_eq!(list.shell().unwrap(), shell);
        assert_eq!(list.parent().unwrap(), Some(group.clone()));
        assert_eq!(shell.parent().unwrap(), None);
        assert_eq!(
            f.platform.spec_of(raw(&list)),
            Some(ResourceSpec::Window {
                title: String::new(),
                width: 200,
                height: 100,
                parent: Some(raw(&group)),
            })
        );
    }

    #[test]
    fn test_data_round_trips_until_disposed() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "main").unwrap();
        shell.set_data("model", "row-7").unwrap();
        assert_eq!(shell.data("model").unwrap().as_deref(), Some("row-7"));
        assert_eq!(shell.data("missing").unwrap(), None);
        shell.dispose().unwrap();
        assert!(shell.data("model").unwrap_err().is_disposed());
    }

    struct Clicks {
        selected: Mutex<u32>,
        disposed: Mutex<u32>,
    }

    impl SelectionListener for Clicks {
        fn widget_selected(&self, _event: &mut Event) {
            *self.selected.lock() += 1;
        }
    }

    impl DisposeListener for Clicks {
        fn widget_disposed(&self, _event: &mut Event) {
            *self.disposed.lock() += 1;
        }
    }

    impl ListenerCapabilities for Clicks {
        fn selection(&self) -> Option<&dyn SelectionListener> {
            Some(self)
        }
        fn dispose(&self) -> Option<&dyn DisposeListener> {
            Some(self)
        }
    }

    #[test]
    fn test_typed_listener_receives_matching_events() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "main").unwrap();
        let button = Widget::new(&shell, WidgetKind::Control(ControlClass::Button)).unwrap();
        let clicks = Arc::new(Clicks {
            selected: Mutex::new(0),
            disposed: Mutex::new(0),
        });
        button.add_typed_listener(clicks.clone()).unwrap();

        let event = button
            .notify_listeners(EventKind::Selection, Event::new(EventKind::Selection))
            .unwrap();
        assert_eq!(event.widget, Some(button.clone()));
        button
            .notify_listeners(EventKind::KeyDown, Event::new(EventKind::KeyDown))
            .unwrap();
        shell.dispose().unwrap();

        assert_eq!(*clicks.selected.lock(), 1);
        assert_eq!(*clicks.disposed.lock(), 1);
    }

    #[test]
    fn test_remove_listener() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "main").unwrap();
        let id = shell.add_listener(EventKind::Paint, |_e| {}).unwrap();
        assert!(shell.is_listening(EventKind::Paint).unwrap());
        assert!(shell.remove_listener(id).unwrap());
        assert!(!shell.is_listening(EventKind::Paint).unwrap());
    }

    #[test]
    fn test_native_destroy_disposes_without_second_destroy() {
        let f = fixture();
        let shell = Widget::top_level(&f.display, "main").unwrap();
        let shell_raw = raw(&shell);

        shell.native_destroyed();
        assert!(shell.is_disposed());
        assert_eq!(f.platform.destroy_calls(shell_raw), 0);
    }
}
