//! Destroy-once native resources

use tracing::trace;

use super::{Claim, HandleCore, NativeContext};
use crate::error::{Result, ToolkitError};
use crate::logging::NATIVE_TARGET;
use crate::platform::{RawHandle, ResourceKind, ResourceSpec};

/// Owner of a resource the toolkit created and must destroy exactly once
pub struct ExclusiveHandle {
    core: HandleCore,
}

impl ExclusiveHandle {
    /// Create the native resource described by `spec`
    ///
    /// Must run on the UI thread.
    pub fn create(ctx: &NativeContext, spec: &ResourceSpec) -> Result<Self> {
        ctx.check_thread("ExclusiveHandle::create")?;

        let kind = spec.kind();
        let raw = ctx
            .platform()
            .create(spec)
            .map_err(|e| ToolkitError::ResourceCreation {
                kind,
                params: spec.describe(),
                reason: e.to_string(),
            })?;
        trace!(target: NATIVE_TARGET, "created {} {:?}", kind, raw);

        Ok(Self {
            core: HandleCore::new(ctx, kind, raw),
        })
    }

    /// The native reference, or `Disposed` once released
    pub fn raw(&self) -> Result<RawHandle> {
        self.core.raw()
    }

    pub fn kind(&self) -> ResourceKind {
        self.core.kind
    }

    pub fn is_valid(&self) -> bool {
        self.core.is_valid()
    }

    /// Destroy the resource
    ///
    /// Only the first call on the UI thread reaches the platform; later calls
    /// return true without doing anything. Returns false if the native
    /// destroy failed (the handle is invalid regardless) or if called off the
    /// UI thread (the handle stays valid).
    pub fn release(&self) -> bool {
        match self.core.claim("ExclusiveHandle::release") {
            Claim::Release => {
                let result = self
                    .core
                    .ctx
                    .platform()
                    .destroy(self.core.kind, self.core.raw);
                self.core.settle("destroy", result)
            }
            Claim::AlreadyReleased => true,
            Claim::Refused => false,
        }
    }

    /// Invalidate without destroying, for resources the platform already tore down
    ///
    /// Returns false if the handle was already released.
    pub fn abandon(&self) -> bool {
        !self
            .core
            .released
            .swap(true, std::sync::atomic::Ordering::AcqRel)
    }
}

impl Drop for ExclusiveHandle {
    fn drop(&mut self) {
        self.core
            .release_on_drop(|platform, kind, raw| platform.destroy(kind, raw));
    }
}

impl std::fmt::Debug for ExclusiveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExclusiveHandle")
            .field("kind", &self.core.kind)
            .field("raw", &self.core.raw)
            .field("valid", &self.core.is_valid())
            .finish()
    }
}
