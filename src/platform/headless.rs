//! In-process platform without a windowing system
//!
//! Keeps a ledger of every resource it hands out so callers can check
//! exactly what was created, destroyed, retained and released. Native
//! callbacks are injected with [`HeadlessPlatform::post_native`]. Used on
//! hosts without a supported windowing system and by the test suite.

use std::collections::{HashMap, HashSet, VecDeque};
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use super::{
    NativeEvent, NativeMessage, Platform, PlatformError, RawHandle, ResourceKind, ResourceSpec,
};
use crate::logging::NATIVE_TARGET;

/// A resource known to the ledger
#[derive(Clone, Debug)]
struct Resource {
    kind: ResourceKind,
    spec: Option<ResourceSpec>,
    ref_count: u32,
    text: String,
}

#[derive(Default)]
struct Ledger {
    ui_thread: Option<ThreadId>,
    next_id: usize,
    resources: HashMap<RawHandle, Resource>,
    destroy_calls: HashMap<RawHandle, u32>,
    destroy_order: Vec<RawHandle>,
    created: usize,
    violations: usize,
    fail_create: HashSet<ResourceKind>,
    fail_destroy: HashSet<RawHandle>,
    pending: VecDeque<NativeMessage>,
    clock: u64,
    woken: bool,
    waits: usize,
}

impl Ledger {
    fn allocate(&mut self, resource: Resource) -> RawHandle {
        self.next_id += 1;
        // Never zero: ids start at 1 and the stride keeps them pointer-like
        let raw = RawHandle::new(self.next_id * 0x10).unwrap_or_else(|| unreachable!());
        self.resources.insert(raw, resource);
        raw
    }

    fn push_pending(&mut self, target: RawHandle, event: NativeEvent) {
        self.clock += 1;
        let time = self.clock;
        self.pending.push_back(NativeMessage {
            target,
            event,
            time,
        });
    }

    fn check_thread(&mut self, call: &str) -> Result<(), PlatformError> {
        let current = thread::current().id();
        if self.ui_thread == Some(current) {
            Ok(())
        } else {
            self.violations += 1;
            tracing::warn!(
                target: NATIVE_TARGET,
                "headless: {} from {:?}, UI thread is {:?}",
                call,
                current,
                self.ui_thread
            );
            Err(PlatformError::WrongThread)
        }
    }
}

/// Platform backed by an in-memory ledger
pub struct HeadlessPlatform {
    ledger: Mutex<Ledger>,
    signal: Condvar,
    requires_main_thread: bool,
}

impl HeadlessPlatform {
    /// Create a new headless platform
    pub fn new() -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
            signal: Condvar::new(),
            requires_main_thread: false,
        }
    }

    /// Behave like platforms whose UI thread must be the first thread
    pub fn with_main_thread_requirement(mut self, required: bool) -> Self {
        self.requires_main_thread = required;
        self
    }

    /// Queue a native callback as if the windowing system raised it
    ///
    /// Callable from any thread; wakes a waiting UI thread.
    pub fn post_native(&self, target: RawHandle, event: NativeEvent) {
        self.ledger.lock().push_pending(target, event);
        self.signal.notify_all();
    }

    /// Tear a window down the way the windowing system does on its own
    ///
    /// Child windows go with it. Nothing is counted as a `destroy` call; each
    /// window gets a `Destroyed` callback, parents first.
    pub fn destroy_natively(&self, raw: RawHandle) {
        let mut ledger = self.ledger.lock();
        let mut doomed = vec![raw];
        let mut next = 0;
        while next < doomed.len() {
            let parent = doomed[next];
            let children: Vec<RawHandle> = ledger
                .resources
                .iter()
                .filter(|(_, r)| {
                    matches!(
                        r.spec,
                        Some(ResourceSpec::Window { parent: Some(p), .. }) if p == parent
                    )
                })
                .map(|(child, _)| *child)
                .collect();
            doomed.extend(children);
            next += 1;
        }
        for window in doomed {
            if ledger.resources.remove(&window).is_some() {
                ledger.push_pending(window, NativeEvent::Destroyed);
            }
        }
        trace!(target: NATIVE_TARGET, "headless: {:?} destroyed natively", raw);
        self.signal.notify_all();
    }

    /// Register an object owned by someone else with one reference
    ///
    /// Stands in for a shared native object handed to the toolkit.
    pub fn adopt(&self, kind: ResourceKind) -> RawHandle {
        let mut ledger = self.ledger.lock();
        ledger.allocate(Resource {
            kind,
            spec: None,
            ref_count: 1,
            text: String::new(),
        })
    }

    /// Make the next `create` of this kind fail
    pub fn fail_next_create(&self, kind: ResourceKind) {
        self.ledger.lock().fail_create.insert(kind);
    }

    /// Make every `destroy`/`release` of this handle fail
    pub fn fail_release_of(&self, raw: RawHandle) {
        self.ledger.lock().fail_destroy.insert(raw);
    }

    /// Whether the handle refers to a live native object
    pub fn is_live(&self, raw: RawHandle) -> bool {
        self.ledger.lock().resources.contains_key(&raw)
    }

    /// Current reference count of a live object
    pub fn ref_count(&self, raw: RawHandle) -> Option<u32> {
        self.ledger.lock().resources.get(&raw).map(|r| r.ref_count)
    }

    /// How many times `destroy` reached the native layer for this handle
    pub fn destroy_calls(&self, raw: RawHandle) -> u32 {
        self.ledger
            .lock()
            .destroy_calls
            .get(&raw)
            .copied()
            .unwrap_or(0)
    }

    /// Successfully destroyed handles, oldest first
    pub fn destroy_order(&self) -> Vec<RawHandle> {
        self.ledger.lock().destroy_order.clone()
    }

    /// Live objects of a kind
    pub fn live_count(&self, kind: ResourceKind) -> usize {
        self.ledger
            .lock()
            .resources
            .values()
            .filter(|r| r.kind == kind)
            .count()
    }

    /// Resources created through `create` so far
    pub fn created_count(&self) -> usize {
        self.ledger.lock().created
    }

    /// Native calls refused because they came from the wrong thread
    pub fn violations(&self) -> usize {
        self.ledger.lock().violations
    }

    /// Text last set on a live object
    pub fn text_of(&self, raw: RawHandle) -> Option<String> {
        self.ledger.lock().resources.get(&raw).map(|r| r.text.clone())
    }

    /// Creation parameters of a live object
    pub fn spec_of(&self, raw: RawHandle) -> Option<ResourceSpec> {
        self.ledger
            .lock()
            .resources
            .get(&raw)
            .and_then(|r| r.spec.clone())
    }

    /// Number of times `wait` actually blocked
    pub fn waits(&self) -> usize {
        self.ledger.lock().waits
    }
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for HeadlessPlatform {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn requires_main_thread(&self) -> bool {
        self.requires_main_thread
    }

    fn attach(&self) -> Result<(), PlatformError> {
        let mut ledger = self.ledger.lock();
        let current = thread::current().id();
        match ledger.ui_thread {
            Some(owner) if owner != current => Err(PlatformError::AttachFailed(format!(
                "already attached to {:?}",
                owner
            ))),
            _ => {
                ledger.ui_thread = Some(current);
                trace!(target: NATIVE_TARGET, "headless: attached to {:?}", current);
                Ok(())
            }
        }
    }

    fn detach(&self) {
        let mut ledger = self.ledger.lock();
        ledger.ui_thread = None;
        ledger.pending.clear();
        trace!(target: NATIVE_TARGET, "headless: detached");
    }

    fn create(&self, spec: &ResourceSpec) -> Result<RawHandle, PlatformError> {
        let mut ledger = self.ledger.lock();
        ledger.check_thread("create")?;

        let kind = spec.kind();
        if ledger.fail_create.remove(&kind) {
            return Err(PlatformError::CreateFailed(format!(
                "injected failure for {}",
                kind
            )));
        }

        let text = match spec {
            ResourceSpec::Window { title, .. } => title.clone(),
            _ => String::new(),
        };
        let raw = ledger.allocate(Resource {
            kind,
            spec: Some(spec.clone()),
            ref_count: 1,
            text,
        });
        ledger.created += 1;
        trace!(target: NATIVE_TARGET, "headless: create {} -> {:?}", kind, raw);
        Ok(raw)
    }

    fn destroy(&self, kind: ResourceKind, raw: RawHandle) -> Result<(), PlatformError> {
        let mut ledger = self.ledger.lock();
        ledger.check_thread("destroy")?;

        *ledger.destroy_calls.entry(raw).or_insert(0) += 1;
        if ledger.fail_destroy.contains(&raw) {
            return Err(PlatformError::ReleaseFailed(format!(
                "injected failure for {:?}",
                raw
            )));
        }

        if ledger.resources.get(&raw).map(|r| r.kind) != Some(kind) {
            return Err(PlatformError::InvalidHandle(raw));
        }
        ledger.resources.remove(&raw);
        ledger.destroy_order.push(raw);
        trace!(target: NATIVE_TARGET, "headless: destroy {} {:?}", kind, raw);
        Ok(())
    }

    fn retain(&self, _kind: ResourceKind, raw: RawHandle) -> Result<(), PlatformError> {
        let mut ledger = self.ledger.lock();
        ledger.check_thread("retain")?;

        let resource = ledger
            .resources
            .get_mut(&raw)
            .ok_or(PlatformError::InvalidHandle(raw))?;
        resource.ref_count += 1;
        trace!(
            target: NATIVE_TARGET,
            "headless: retain {:?} -> {}",
            raw,
            resource.ref_count
        );
        Ok(())
    }

    fn release(&self, _kind: ResourceKind, raw: RawHandle) -> Result<(), PlatformError> {
        let mut ledger = self.ledger.lock();
        ledger.check_thread("release")?;

        if ledger.fail_destroy.contains(&raw) {
            return Err(PlatformError::ReleaseFailed(format!(
                "injected failure for {:?}",
                raw
            )));
        }

        let resource = ledger
            .resources
            .get_mut(&raw)
            .ok_or(PlatformError::InvalidHandle(raw))?;
        resource.ref_count -= 1;
        let remaining = resource.ref_count;
        if remaining == 0 {
            ledger.resources.remove(&raw);
        }
        trace!(target: NATIVE_TARGET, "headless: release {:?} -> {}", raw, remaining);
        Ok(())
    }

    fn set_text(
        &self,
        _kind: ResourceKind,
        raw: RawHandle,
        text: &str,
    ) -> Result<(), PlatformError> {
        let mut ledger = self.ledger.lock();
        ledger.check_thread("set_text")?;

        let resource = ledger
            .resources
            .get_mut(&raw)
            .ok_or(PlatformError::InvalidHandle(raw))?;
        resource.text = text.to_string();
        Ok(())
    }

    fn poll_native(&self) -> Option<NativeMessage> {
        let mut ledger = self.ledger.lock();
        if ledger.check_thread("poll_native").is_err() {
            return None;
        }
        ledger.pending.pop_front()
    }

    fn wait(&self, timeout: Duration) {
        let mut ledger = self.ledger.lock();
        if ledger.woken || !ledger.pending.is_empty() {
            ledger.woken = false;
            return;
        }
        ledger.waits += 1;
        let _ = self.signal.wait_for(&mut ledger, timeout);
        ledger.woken = false;
    }

    fn wake(&self) {
        let mut ledger = self.ledger.lock();
        ledger.woken = true;
        self.signal.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    fn attached() -> HeadlessPlatform {
        let platform = HeadlessPlatform::new();
        platform.attach().unwrap();
        platform
    }

    #[test]
    fn test_create_and_destroy() {
        let platform = attached();
        let raw = platform
            .create(&ResourceSpec::Menu { popup: true })
            .unwrap();
        assert!(platform.is_live(raw));
        assert_eq!(platform.live_count(ResourceKind::Menu), 1);

        platform.destroy(ResourceKind::Menu, raw).unwrap();
        assert!(!platform.is_live(raw));
        assert_eq!(platform.destroy_calls(raw), 1);

        // Destroying again is reported, not ignored
        assert_eq!(
            platform.destroy(ResourceKind::Menu, raw),
            Err(PlatformError::InvalidHandle(raw))
        );
        assert_eq!(platform.destroy_calls(raw), 2);
    }

    #[test]
    fn test_calls_off_ui_thread_are_refused() {
        let platform = Arc::new(attached());
        let worker = Arc::clone(&platform);
        let result = std::thread::spawn(move || {
            worker.create(&ResourceSpec::Image {
                width: 1,
                height: 1,
            })
        })
        .join()
        .unwrap();

        assert_eq!(result, Err(PlatformError::WrongThread));
        assert_eq!(platform.violations(), 1);
        assert_eq!(platform.created_count(), 0);
    }

    #[test]
    fn test_retain_release_counts() {
        let platform = attached();
        let raw = platform.adopt(ResourceKind::Image);
        assert_eq!(platform.ref_count(raw), Some(1));

        platform.retain(ResourceKind::Image, raw).unwrap();
        assert_eq!(platform.ref_count(raw), Some(2));

        platform.release(ResourceKind::Image, raw).unwrap();
        platform.release(ResourceKind::Image, raw).unwrap();
        assert!(!platform.is_live(raw));
    }

    #[test]
    fn test_injected_create_failure_is_one_shot() {
        let platform = attached();
        platform.fail_next_create(ResourceKind::Font);
        let spec = ResourceSpec::Font {
            family: "Mono".to_string(),
            size: 9.0,
            weight: 400,
            italic: true,
        };
        assert!(matches!(
            platform.create(&spec),
            Err(PlatformError::CreateFailed(_))
        ));
        assert!(platform.create(&spec).is_ok());
    }

    #[test]
    fn test_wake_interrupts_wait() {
        let platform = Arc::new(attached());
        let waker = Arc::clone(&platform);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            waker.wake();
        });

        let start = Instant::now();
        platform.wait(Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_pending_message_skips_wait() {
        let platform = attached();
        let raw = platform.adopt(ResourceKind::Window);
        platform.post_native(raw, NativeEvent::FocusIn);

        platform.wait(Duration::from_secs(5));
        assert_eq!(platform.waits(), 0);

        let msg = platform.poll_native().unwrap();
        assert_eq!(msg.target, raw);
        assert_eq!(msg.event, NativeEvent::FocusIn);
        assert!(platform.poll_native().is_none());
    }

    #[test]
    fn test_native_timestamps_increase() {
        let platform = attached();
        let raw = platform
            .create(&ResourceSpec::Menu { popup: true })
            .unwrap();
        platform.post_native(raw, NativeEvent::FocusIn);
        let first = platform.poll_native().unwrap();
        platform.post_native(raw, NativeEvent::FocusOut);
        platform.post_native(raw, NativeEvent::FocusIn);
        let second = platform.poll_native().unwrap();
        let third = platform.poll_native().unwrap();
        assert!(first.time < second.time);
        assert!(second.time < third.time);
    }

    #[test]
    fn test_native_destroy_takes_child_windows() {
        let platform = attached();
        let window = |parent| ResourceSpec::Window {
            title: String::new(),
            width: 10,
            height: 10,
            parent,
        };
        let shell = platform.create(&window(None)).unwrap();
        let child = platform.create(&window(Some(shell))).unwrap();
        let grandchild = platform.create(&window(Some(child))).unwrap();
        let other = platform.create(&window(None)).unwrap();

        platform.destroy_natively(shell);

        assert!(!platform.is_live(shell));
        assert!(!platform.is_live(child));
        assert!(!platform.is_live(grandchild));
        assert!(platform.is_live(other));
        assert_eq!(platform.destroy_calls(child), 0);
        let targets: Vec<RawHandle> =
            std::iter::from_fn(|| platform.poll_native()).map(|m| m.target).collect();
        assert_eq!(targets, vec![shell, child, grandchild]);
    }

    #[test]
    fn test_attach_from_second_thread_fails() {
        let platform = Arc::new(attached());
        let other = Arc::clone(&platform);
        let result = std::thread::spawn(move || other.attach()).join().unwrap();
        assert!(matches!(result, Err(PlatformError::AttachFailed(_))));
    }
}
