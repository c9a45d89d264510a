//! Reference-counted native resources

use super::{Claim, HandleCore, NativeContext};
use crate::error::{Result, ToolkitError};
use crate::platform::{RawHandle, ResourceKind};

/// Wrapper around a resource under a native retain/release discipline
///
/// An owning wrapper adds one native reference when it is made and gives it
/// back on release, so wrapping and releasing leaves the count unchanged.
/// A non-owning wrapper never touches the count.
pub struct SharedHandle {
    core: HandleCore,
    owns: bool,
}

impl SharedHandle {
    /// Wrap an existing native object
    ///
    /// With `owns_handle` the native reference count is incremented now,
    /// which must happen on the UI thread.
    pub fn from_handle(
        ctx: &NativeContext,
        kind: ResourceKind,
        raw: RawHandle,
        owns_handle: bool,
    ) -> Result<Self> {
        if owns_handle {
            ctx.check_thread("SharedHandle::from_handle")?;
            ctx.platform()
                .retain(kind, raw)
                .map_err(|e| ToolkitError::ResourceCreation {
                    kind,
                    params: format!("retain {:?}", raw),
                    reason: e.to_string(),
                })?;
        }

        Ok(Self {
            core: HandleCore::new(ctx, kind, raw),
            owns: owns_handle,
        })
    }

    pub fn raw(&self) -> Result<RawHandle> {
        self.core.raw()
    }

    pub fn kind(&self) -> ResourceKind {
        self.core.kind
    }

    pub fn owns_handle(&self) -> bool {
        self.owns
    }

    pub fn is_valid(&self) -> bool {
        self.core.is_valid()
    }

    /// Give back the reference taken at wrap time
    ///
    /// For a non-owning view this only invalidates the wrapper. Repeat
    /// calls do nothing and return true.
    pub fn release(&self) -> bool {
        if !self.owns {
            self.core
                .released
                .store(true, std::sync::atomic::Ordering::Release);
            return true;
        }

        match self.core.claim("SharedHandle::release") {
            Claim::Release => {
                let result = self
                    .core
                    .ctx
                    .platform()
                    .release(self.core.kind, self.core.raw);
                self.core.settle("release", result)
            }
            Claim::AlreadyReleased => true,
            Claim::Refused => false,
        }
    }
}

impl Drop for SharedHandle {
    fn drop(&mut self) {
        if self.owns {
            self.core
                .release_on_drop(|platform, kind, raw| platform.release(kind, raw));
        }
    }
}

impl std::fmt::Debug for SharedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedHandle")
            .field("kind", &self.core.kind)
            .field("raw", &self.core.raw)
            .field("owns", &self.owns)
            .field("valid", &self.core.is_valid())
            .finish()
    }
}
