//! Process-wide table of open displays, keyed by UI thread

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::debug;

use super::display::{Display, DisplayId, DisplayInner};
use crate::config::{DisplayConfig, ToolkitConfig};
use crate::error::{Result, ToolkitError};
use crate::platform::{self, Platform};

type PlatformFactory = Box<dyn Fn() -> Arc<dyn Platform> + Send + Sync>;

struct Entry {
    id: DisplayId,
    thread: ThreadId,
    display: Weak<DisplayInner>,
}

impl Entry {
    fn live(&self) -> Option<Display> {
        self.display
            .upgrade()
            .map(Display::from_inner)
            .filter(|d| !d.is_disposed())
    }
}

pub(crate) struct RegistryShared {
    factory: PlatformFactory,
    next_id: AtomicU64,
    // Opening order
    entries: Mutex<Vec<Entry>>,
}

impl RegistryShared {
    pub(crate) fn remove(&self, id: DisplayId) {
        self.entries.lock().retain(|e| e.id != id);
    }
}

/// Which display belongs to which thread
///
/// Create one per application (or per test) and open displays through it.
/// Each UI thread owns at most one live display.
#[derive(Clone)]
pub struct DisplayRegistry {
    shared: Arc<RegistryShared>,
}

impl DisplayRegistry {
    /// Registry whose displays get a platform from `factory`
    pub fn new<F, P>(factory: F) -> Self
    where
        F: Fn() -> P + Send + Sync + 'static,
        P: Platform,
    {
        Self::from_factory(Box::new(move || Arc::new(factory()) as Arc<dyn Platform>))
    }

    /// Registry using the platform selected for this host
    pub fn with_selected_platform() -> Self {
        Self::from_factory(Box::new(platform::select))
    }

    fn from_factory(factory: PlatformFactory) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                factory,
                next_id: AtomicU64::new(0),
                entries: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Open a display on the calling thread with a fresh platform
    pub fn open(&self, config: &ToolkitConfig) -> Result<Display> {
        let platform = (self.shared.factory)();
        self.open_with(platform, config.display.clone())
    }

    /// Open a display on the calling thread over an existing platform
    pub fn open_with(&self, platform: Arc<dyn Platform>, config: DisplayConfig) -> Result<Display> {
        let thread = thread::current().id();
        let mut entries = self.shared.entries.lock();
        entries.retain(|e| e.live().is_some());
        if entries.iter().any(|e| e.thread == thread) {
            return Err(ToolkitError::DisplayAlreadyOpen { thread });
        }

        let id = DisplayId(self.shared.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let display = Display::open(platform, config, id, Arc::downgrade(&self.shared))?;
        entries.push(Entry {
            id,
            thread,
            display: display.downgrade(),
        });
        debug!("registered display {:?} for {:?}", id, thread);
        Ok(display)
    }

    /// The live display owned by the calling thread
    pub fn current(&self) -> Option<Display> {
        self.find(thread::current().id())
    }

    /// The live display owned by `thread`
    pub fn find(&self, thread: ThreadId) -> Option<Display> {
        self.shared
            .entries
            .lock()
            .iter()
            .filter(|e| e.thread == thread)
            .find_map(Entry::live)
    }

    /// The oldest display still live
    pub fn default_display(&self) -> Option<Display> {
        self.shared.entries.lock().iter().find_map(Entry::live)
    }

    /// Number of live displays
    pub fn len(&self) -> usize {
        self.shared
            .entries
            .lock()
            .iter()
            .filter(|e| e.live().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::HeadlessPlatform;

    fn registry() -> DisplayRegistry {
        DisplayRegistry::new(HeadlessPlatform::new)
    }

    #[test]
    fn test_open_registers_current_thread() {
        let registry = registry();
        assert!(registry.current().is_none());

        let display = registry.open(&ToolkitConfig::default()).unwrap();
        assert_eq!(registry.current(), Some(display.clone()));
        assert_eq!(registry.find(thread::current().id()), Some(display.clone()));
        assert_eq!(registry.len(), 1);
        assert_eq!(display.platform_name(), "headless");
        display.dispose().unwrap();
    }

    #[test]
    fn test_second_display_on_same_thread_is_rejected() {
        let registry = registry();
        let display = registry.open(&ToolkitConfig::default()).unwrap();
        assert!(matches!(
            registry.open(&ToolkitConfig::default()),
            Err(ToolkitError::DisplayAlreadyOpen { .. })
        ));

        // Free again once disposed
        display.dispose().unwrap();
        let reopened = registry.open(&ToolkitConfig::default()).unwrap();
        assert_ne!(reopened.id(), display.id());
        reopened.dispose().unwrap();
    }

    #[test]
    fn test_displays_on_different_threads_coexist() {
        let registry = registry();
        let main = registry.open(&ToolkitConfig::default()).unwrap();

        let remote = registry.clone();
        let main_id = main.id();
        let worker = thread::spawn(move || {
            let own = remote.open(&ToolkitConfig::default()).unwrap();
            let other = remote.default_display().map(|d| d.id());
            let count = remote.len();
            own.dispose().unwrap();
            (other, count)
        });
        let (default_seen, count) = worker.join().unwrap();

        assert_eq!(default_seen, Some(main_id));
        assert_eq!(count, 2);
        assert_eq!(registry.len(), 1);
        main.dispose().unwrap();
        assert!(registry.is_empty());
        assert!(registry.default_display().is_none());
    }

    #[test]
    fn test_registries_are_independent() {
        let first = registry();
        let second = registry();
        let display = first.open(&ToolkitConfig::default()).unwrap();
        assert!(second.current().is_none());
        display.dispose().unwrap();
    }
}
