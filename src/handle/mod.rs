//! Lifetime-safe wrappers around native resources
//!
//! Two ownership models exist side by side:
//!
//! - [`ExclusiveHandle`]: the toolkit created the resource and destroys it
//!   exactly once (windows, GDI objects, menus).
//! - [`SharedHandle`]: the resource lives under a native retain/release
//!   discipline; an owning wrapper holds one reference, a non-owning wrapper
//!   is only a view.
//!
//! Both release only on the UI thread. `release()` never fails loudly: the
//! outcome is a `bool`, failures are logged. Dropping a live handle off the
//! UI thread marshals its release onto the UI thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use tracing::warn;

use crate::dispatch::queue::{DispatchQueue, WorkItem};
use crate::error::{Result, ToolkitError};
use crate::logging::NATIVE_TARGET;
use crate::platform::{Platform, PlatformError, RawHandle, ResourceKind};

mod exclusive;
mod shared;

pub use exclusive::ExclusiveHandle;
pub use shared::SharedHandle;

/// Access to one display's native state: its platform, UI thread and queue
#[derive(Clone)]
pub struct NativeContext {
    platform: Arc<dyn Platform>,
    ui_thread: ThreadId,
    queue: DispatchQueue,
}

impl NativeContext {
    pub(crate) fn new(platform: Arc<dyn Platform>, ui_thread: ThreadId, queue: DispatchQueue) -> Self {
        Self {
            platform,
            ui_thread,
            queue,
        }
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    pub fn ui_thread(&self) -> ThreadId {
        self.ui_thread
    }

    pub(crate) fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    pub fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.ui_thread
    }

    /// Fail with `CrossThreadViolation` unless called on the UI thread
    pub fn check_thread(&self, operation: &'static str) -> Result<()> {
        let caller = thread::current().id();
        if caller == self.ui_thread {
            Ok(())
        } else {
            Err(ToolkitError::CrossThreadViolation {
                operation,
                ui_thread: self.ui_thread,
                caller,
            })
        }
    }

    /// Queue a native cleanup for the UI thread; false if the display is gone
    pub(crate) fn defer<F>(&self, cleanup: F) -> bool
    where
        F: FnOnce(&dyn Platform) + Send + 'static,
    {
        let platform = Arc::clone(&self.platform);
        self.queue
            .push(WorkItem::detached(move || cleanup(platform.as_ref())))
            .is_ok()
    }
}

/// State shared by both handle flavours
struct HandleCore {
    raw: RawHandle,
    kind: ResourceKind,
    released: AtomicBool,
    ctx: NativeContext,
}

/// What `HandleCore::claim` decided
enum Claim {
    /// This caller won and must perform the native release now
    Release,
    /// Released earlier; nothing to do
    AlreadyReleased,
    /// Called off the UI thread; the handle stays valid
    Refused,
}

impl HandleCore {
    fn new(ctx: &NativeContext, kind: ResourceKind, raw: RawHandle) -> Self {
        Self {
            raw,
            kind,
            released: AtomicBool::new(false),
            ctx: ctx.clone(),
        }
    }

    fn raw(&self) -> Result<RawHandle> {
        if self.is_valid() {
            Ok(self.raw)
        } else {
            Err(ToolkitError::disposed(format!("{} handle {:?}", self.kind, self.raw)))
        }
    }

    fn is_valid(&self) -> bool {
        !self.released.load(Ordering::Acquire)
    }

    fn claim(&self, operation: &'static str) -> Claim {
        if !self.is_valid() {
            return Claim::AlreadyReleased;
        }
        if let Err(e) = self.ctx.check_thread(operation) {
            warn!(target: NATIVE_TARGET, "refusing release of {:?}: {}", self.raw, e);
            return Claim::Refused;
        }
        // Invalid from here on, whatever the native call reports
        match self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Claim::Release,
            Err(_) => Claim::AlreadyReleased,
        }
    }

    /// Report the native result of a release as a bool
    fn settle(&self, what: &str, result: std::result::Result<(), PlatformError>) -> bool {
        match result {
            Ok(()) => {
                tracing::trace!(target: NATIVE_TARGET, "{} {} {:?}", what, self.kind, self.raw);
                true
            }
            Err(e) => {
                warn!(
                    target: NATIVE_TARGET,
                    "{} of {} {:?} failed: {}", what, self.kind, self.raw, e
                );
                false
            }
        }
    }

    /// Drop path: release now on the UI thread, otherwise marshal it there
    fn release_on_drop<F>(&self, native: F)
    where
        F: Fn(&dyn Platform, ResourceKind, RawHandle) -> std::result::Result<(), PlatformError>
            + Send
            + 'static,
    {
        if !self.is_valid() {
            return;
        }
        if self.ctx.is_ui_thread() {
            if let Claim::Release = self.claim("drop") {
                let result = native(self.ctx.platform.as_ref(), self.kind, self.raw);
                self.settle("drop", result);
            }
            return;
        }

        self.released.store(true, Ordering::Release);
        let (kind, raw) = (self.kind, self.raw);
        let queued = self.ctx.defer(move |platform| {
            if let Err(e) = native(platform, kind, raw) {
                warn!(target: NATIVE_TARGET, "deferred release of {} {:?} failed: {}", kind, raw, e);
            }
        });
        if !queued {
            warn!(
                target: NATIVE_TARGET,
                "leaking {} {:?}: dropped off the UI thread after its display was disposed",
                kind,
                raw
            );
        }
    }
}

/// A native resource owned by a widget, of either flavour
pub enum NativeResource {
    Exclusive(ExclusiveHandle),
    Shared(SharedHandle),
}

impl NativeResource {
    pub fn raw(&self) -> Result<RawHandle> {
        match self {
            NativeResource::Exclusive(h) => h.raw(),
            NativeResource::Shared(h) => h.raw(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            NativeResource::Exclusive(h) => h.kind(),
            NativeResource::Shared(h) => h.kind(),
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            NativeResource::Exclusive(h) => h.is_valid(),
            NativeResource::Shared(h) => h.is_valid(),
        }
    }

    pub fn release(&self) -> bool {
        match self {
            NativeResource::Exclusive(h) => h.release(),
            NativeResource::Shared(h) => h.release(),
        }
    }
}

impl From<ExclusiveHandle> for NativeResource {
    fn from(handle: ExclusiveHandle) -> Self {
        NativeResource::Exclusive(handle)
    }
}

impl From<SharedHandle> for NativeResource {
    fn from(handle: SharedHandle) -> Self {
        NativeResource::Shared(handle)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::context;
    use super::*;

    #[test]
    fn test_check_thread() {
        let (_platform, ctx, _queue) = context();
        assert!(ctx.is_ui_thread());
        assert!(ctx.check_thread("test").is_ok());

        let worker = ctx.clone();
        let err = thread::spawn(move || worker.check_thread("poke"))
            .join()
            .unwrap()
            .unwrap_err();
        assert!(matches!(
            err,
            ToolkitError::CrossThreadViolation {
                operation: "poke",
                ..
            }
        ));
    }

    #[test]
    fn test_native_resource_dispatches_to_variant() {
        let (platform, ctx, _queue) = context();
        let window = ExclusiveHandle::create(
            &ctx,
            &crate::platform::ResourceSpec::Window {
                title: "w".to_string(),
                width: 10,
                height: 10,
                parent: None,
            },
        )
        .unwrap();
        let raw = window.raw().unwrap();
        let resource = NativeResource::from(window);
        assert_eq!(resource.kind(), ResourceKind::Window);
        assert!(resource.release());
        assert!(!resource.is_valid());
        assert!(!platform.is_live(raw));
    }
}
