//! The display: one UI thread, its event loop and its work queue

use std::collections::HashMap;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::queue::{Action, DispatchQueue, Outcome, WorkItem};
use super::registry::RegistryShared;
use super::timer::{TimerId, TimerQueue};
use crate::config::DisplayConfig;
use crate::error::{Result, ToolkitError};
use crate::handle::{ExclusiveHandle, NativeContext, SharedHandle};
use crate::logging::NATIVE_TARGET;
use crate::platform::{Platform, RawHandle, ResourceKind, ResourceSpec};
use crate::widget::{Widget, WidgetId, WidgetInner};

const LIVE: u8 = 0;
const DISPOSING: u8 = 1;
const DISPOSED: u8 = 2;

/// Identifies a display within its registry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DisplayId(pub(crate) u64);

pub(crate) struct DisplayInner {
    id: DisplayId,
    ctx: NativeContext,
    config: DisplayConfig,
    state: AtomicU8,
    exit_requested: AtomicBool,
    next_widget_id: AtomicU64,
    timers: Mutex<TimerQueue>,
    dispose_hooks: Mutex<Vec<Action>>,
    shells: Mutex<Vec<Widget>>,
    routes: Mutex<HashMap<RawHandle, Weak<WidgetInner>>>,
    registry: Weak<RegistryShared>,
}

impl Drop for DisplayInner {
    fn drop(&mut self) {
        if self.state.load(Ordering::Acquire) != DISPOSED {
            warn!("display {:?} dropped without dispose", self.id);
        }
    }
}

/// Connection between the application and the windowing system
///
/// Cloning yields another reference to the same display. Everything that
/// touches native state runs on the thread that opened it; other threads
/// hand work over with [`Display::sync_exec`] and [`Display::async_exec`].
#[derive(Clone)]
pub struct Display {
    inner: Arc<DisplayInner>,
}

impl Display {
    /// Bind a new display to the calling thread
    pub(crate) fn open(
        platform: Arc<dyn Platform>,
        config: DisplayConfig,
        id: DisplayId,
        registry: Weak<RegistryShared>,
    ) -> Result<Self> {
        if platform.requires_main_thread() && !platform.is_main_thread() {
            return Err(ToolkitError::NotMainThread {
                platform: platform.name(),
            });
        }
        platform.attach()?;

        let waker = Arc::clone(&platform);
        let queue = DispatchQueue::new(move || waker.wake());
        let ui_thread = thread::current().id();
        debug!(
            "{}: opened display {:?} on {:?} ({} platform)",
            config.app_name,
            id,
            ui_thread,
            platform.name()
        );

        Ok(Self {
            inner: Arc::new(DisplayInner {
                id,
                ctx: NativeContext::new(platform, ui_thread, queue),
                config,
                state: AtomicU8::new(LIVE),
                exit_requested: AtomicBool::new(false),
                next_widget_id: AtomicU64::new(0),
                timers: Mutex::new(TimerQueue::default()),
                dispose_hooks: Mutex::new(Vec::new()),
                shells: Mutex::new(Vec::new()),
                routes: Mutex::new(HashMap::new()),
                registry,
            }),
        })
    }

    pub(crate) fn from_inner(inner: Arc<DisplayInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<DisplayInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn id(&self) -> DisplayId {
        self.inner.id
    }

    /// The UI thread
    pub fn thread(&self) -> ThreadId {
        self.inner.ctx.ui_thread()
    }

    pub fn is_ui_thread(&self) -> bool {
        self.inner.ctx.is_ui_thread()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == DISPOSED
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.inner.config
    }

    /// Native context for creating handles outside the widget tree
    pub fn context(&self) -> &NativeContext {
        &self.inner.ctx
    }

    pub fn platform_name(&self) -> &'static str {
        self.inner.ctx.platform().name()
    }

    /// Work items waiting for the UI thread
    pub fn pending_work(&self) -> usize {
        self.inner.ctx.queue().len()
    }

    pub(crate) fn check_live(&self, operation: &str) -> Result<()> {
        if self.is_disposed() {
            Err(ToolkitError::disposed(format!(
                "display {:?} ({})",
                self.inner.id, operation
            )))
        } else {
            Ok(())
        }
    }

    fn check_device(&self, operation: &'static str) -> Result<()> {
        self.check_live(operation)?;
        self.inner.ctx.check_thread(operation)
    }

    fn enqueue(&self, item: WorkItem) -> Result<()> {
        self.inner
            .ctx
            .queue()
            .push(item)
            .map_err(|_| ToolkitError::disposed(format!("display {:?}", self.inner.id)))
    }

    /// Run `action` on the UI thread and return its value
    ///
    /// Runs inline when already on the UI thread. Otherwise blocks until the
    /// event loop has run it; a panic inside the action comes back as
    /// [`ToolkitError::Marshaled`].
    pub fn sync_exec<R, F>(&self, action: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        self.check_live("sync_exec")?;
        if self.is_ui_thread() {
            return Ok(action());
        }

        let slot = Arc::new(Mutex::new(None));
        let result = Arc::clone(&slot);
        let (item, completion) = WorkItem::awaited(move || {
            *result.lock() = Some(action());
        });
        self.enqueue(item)?;

        match completion.wait() {
            Outcome::Finished => slot
                .lock()
                .take()
                .ok_or_else(|| ToolkitError::disposed("sync_exec result")),
            Outcome::Panicked(panic) => Err(ToolkitError::Marshaled(panic)),
            Outcome::Cancelled => Err(ToolkitError::disposed(format!(
                "display {:?}",
                self.inner.id
            ))),
        }
    }

    /// Queue `action` for the UI thread without waiting
    ///
    /// A panic inside the action is logged; the loop carries on.
    pub fn async_exec<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.check_live("async_exec")?;
        self.enqueue(WorkItem::detached(action))
    }

    /// Run `action` on the UI thread once `delay` has passed
    pub fn timer_exec<F>(&self, delay: Duration, action: F) -> Result<TimerId>
    where
        F: FnOnce() + Send + 'static,
    {
        self.check_live("timer_exec")?;
        let id = self
            .inner
            .timers
            .lock()
            .schedule(delay, WorkItem::detached(action), Instant::now());
        // The loop may be sleeping past the new deadline
        self.wake();
        Ok(id)
    }

    /// Returns false if the timer already fired or was cancelled
    pub fn cancel_timer(&self, id: TimerId) -> bool {
        self.inner.timers.lock().cancel(id)
    }

    /// Run `action` on the UI thread when the display is disposed
    pub fn dispose_exec<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.check_live("dispose_exec")?;
        self.inner.dispose_hooks.lock().push(Box::new(action));
        Ok(())
    }

    /// Process one native message, then due timers and queued work
    ///
    /// Returns false when there was nothing to do, in which case the caller
    /// usually calls [`Display::sleep`].
    pub fn read_and_dispatch(&self) -> Result<bool> {
        self.check_device("read_and_dispatch")?;
        let mut busy = false;

        if let Some(msg) = self.inner.ctx.platform().poll_native() {
            busy = true;
            match self.find_widget(msg.target) {
                Some(widget) => widget.handle_native(&msg),
                None => trace!(target: NATIVE_TARGET, "no widget for {:?}", msg.target),
            }
        }

        let due = self.inner.timers.lock().take_due(Instant::now());
        for item in due {
            if self.is_disposed() {
                break;
            }
            busy = true;
            item.run();
        }

        for _ in 0..self.inner.config.batch() {
            // Work may dispose the display
            if self.is_disposed() {
                break;
            }
            let Some(item) = self.inner.ctx.queue().try_pop() else {
                break;
            };
            busy = true;
            item.run();
        }
        Ok(busy)
    }

    /// Block until native input, new work or the next timer, bounded by
    /// `max_wait_ms`
    pub fn sleep(&self) -> Result<()> {
        self.check_device("sleep")?;
        if !self.inner.ctx.queue().is_empty() {
            return Ok(());
        }

        let mut timeout = self.inner.config.max_wait();
        if let Some(deadline) = self.inner.timers.lock().next_deadline() {
            let now = Instant::now();
            if deadline <= now {
                return Ok(());
            }
            timeout = timeout.min(deadline - now);
        }
        self.inner.ctx.platform().wait(timeout);
        Ok(())
    }

    /// Interrupt a UI thread blocked in [`Display::sleep`]; any thread
    pub fn wake(&self) {
        self.inner.ctx.platform().wake();
    }

    /// Make the running event loop return; any thread
    pub fn request_exit(&self) {
        self.inner.exit_requested.store(true, Ordering::Release);
        self.wake();
    }

    /// Dispatch until [`Display::request_exit`] or disposal
    pub fn run_event_loop(&self) -> Result<()> {
        self.run_until(|| false)
    }

    /// Dispatch until `done()` holds, exit is requested or the display is
    /// disposed
    pub fn run_until<F>(&self, mut done: F) -> Result<()>
    where
        F: FnMut() -> bool,
    {
        self.check_device("run_event_loop")?;
        loop {
            if self.inner.exit_requested.swap(false, Ordering::AcqRel)
                || self.is_disposed()
                || done()
            {
                return Ok(());
            }
            if !self.read_and_dispatch()? {
                self.sleep()?;
            }
        }
    }

    /// Tear the display down
    ///
    /// Runs dispose hooks, then queued fire-and-forget work (pending
    /// `sync_exec` callers get `Disposed`), disposes every shell, drops
    /// timers and detaches the platform. Repeat calls do nothing.
    pub fn dispose(&self) -> Result<()> {
        if self.inner.state.load(Ordering::Acquire) != LIVE {
            return Ok(());
        }
        self.inner.ctx.check_thread("Display::dispose")?;
        if self
            .inner
            .state
            .compare_exchange(LIVE, DISPOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        debug!("disposing display {:?}", self.inner.id);

        let hooks = mem::take(&mut *self.inner.dispose_hooks.lock());
        for hook in hooks {
            WorkItem::detached(hook).run();
        }

        let (cancelled, detached): (Vec<_>, Vec<_>) = self
            .inner
            .ctx
            .queue()
            .close()
            .into_iter()
            .partition(WorkItem::is_awaited);
        if !cancelled.is_empty() {
            debug!("cancelling {} pending sync_exec calls", cancelled.len());
        }
        drop(cancelled);
        for item in detached {
            item.run();
        }

        let shells = self.inner.shells.lock().clone();
        for shell in shells {
            if let Err(e) = shell.dispose() {
                warn!("failed to dispose {:?}: {}", shell.id(), e);
            }
        }
        self.inner.shells.lock().clear();

        let timers = self.inner.timers.lock().clear();
        if timers > 0 {
            debug!("dropping {} pending timers", timers);
        }

        self.inner.state.store(DISPOSED, Ordering::Release);
        self.inner.routes.lock().clear();
        self.inner.ctx.platform().detach();
        if let Some(registry) = self.inner.registry.upgrade() {
            registry.remove(self.inner.id);
        }
        debug!("display {:?} disposed", self.inner.id);
        Ok(())
    }

    /// Live top-level shells, oldest first
    pub fn shells(&self) -> Vec<Widget> {
        self.inner.shells.lock().clone()
    }

    /// The live widget owning a native window or menu
    pub fn find_widget(&self, raw: RawHandle) -> Option<Widget> {
        self.inner
            .routes
            .lock()
            .get(&raw)
            .and_then(Weak::upgrade)
            .map(Widget::from_inner)
    }

    /// Create a destroy-once resource outside the widget tree
    pub fn create_resource(&self, spec: &ResourceSpec) -> Result<ExclusiveHandle> {
        self.check_live("create_resource")?;
        ExclusiveHandle::create(&self.inner.ctx, spec)
    }

    /// Wrap a reference-counted native object
    pub fn wrap_shared(&self, kind: ResourceKind, raw: RawHandle, owns: bool) -> Result<SharedHandle> {
        self.check_live("wrap_shared")?;
        SharedHandle::from_handle(&self.inner.ctx, kind, raw, owns)
    }

    pub(crate) fn next_widget_id(&self) -> WidgetId {
        WidgetId(self.inner.next_widget_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub(crate) fn add_shell(&self, shell: Widget) {
        self.inner.shells.lock().push(shell);
    }

    pub(crate) fn remove_shell(&self, id: WidgetId) {
        self.inner.shells.lock().retain(|s| s.id() != id);
    }

    pub(crate) fn register_route(&self, raw: RawHandle, widget: Weak<WidgetInner>) {
        self.inner.routes.lock().insert(raw, widget);
    }

    pub(crate) fn unregister_route(&self, raw: RawHandle) {
        self.inner.routes.lock().remove(&raw);
    }
}

impl PartialEq for Display {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Display {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Display")
            .field("id", &self.inner.id)
            .field("thread", &self.thread())
            .field("state", &self.inner.state.load(Ordering::Relaxed))
            .finish()
    }
}
