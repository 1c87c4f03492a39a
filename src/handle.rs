use core::fmt;
use core::ptr::NonNull;

use crate::block::{self, Control, Placement, Shape};
use crate::error::AllocError;

/// An owning handle to a reference-counted payload.
///
/// A `Strong` keeps the payload value alive. When the last `Strong` is
/// released the payload value is dropped; the control block it points at is
/// only returned to the allocator once every [`Observer`] is gone too. Under
/// [`Placement::Combined`] the payload bytes are embedded in that block, so a
/// surviving observer retains the payload memory even after the payload value
/// itself has been dropped. Under [`Placement::Split`] releasing the last
/// `Strong` frees the payload's own allocation immediately.
///
/// [`release`] is idempotent; dropping the handle releases it as well.
///
/// [`release`]: Strong::release
pub struct Strong {
    ptr: Option<NonNull<Control>>,
}

impl Strong {
    /// Allocate a new payload with the given placement, shape, and size and
    /// return the first owning handle to it.
    ///
    /// The strong count starts at one and the weak count at zero.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the global allocator cannot satisfy the
    /// payload or control block allocation.
    pub fn allocate(
        placement: Placement,
        shape: Shape,
        payload_len: usize,
    ) -> Result<Self, AllocError> {
        let block = block::allocate(placement, shape, payload_len)?;
        Ok(Self { ptr: Some(block) })
    }

    /// Derive a non-owning observer of this handle's payload.
    ///
    /// Observers do not keep the payload value alive, but they do keep the
    /// control block allocated.
    #[must_use]
    pub fn downgrade(&self) -> Observer {
        if let Some(block) = self.ptr {
            // SAFETY: a live `Strong` keeps its control block allocated.
            unsafe { block.as_ref() }.inc_weak();
        }
        Observer { ptr: self.ptr }
    }

    /// Number of owning handles to the payload, or zero if this handle has
    /// been released.
    #[must_use]
    pub fn strong_count(&self) -> usize {
        self.ptr
            .map_or(0, |block| unsafe { block.as_ref() }.strong())
    }

    /// Number of observers of the control block, or zero if this handle has
    /// been released.
    #[must_use]
    pub fn weak_count(&self) -> usize {
        self.ptr.map_or(0, |block| unsafe { block.as_ref() }.weak())
    }

    /// Payload size in bytes, or `None` if this handle has been released.
    #[must_use]
    pub fn payload_len(&self) -> Option<usize> {
        self.ptr
            .map(|block| unsafe { block.as_ref() }.payload_len())
    }

    /// Whether this handle has already been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.ptr.is_none()
    }

    /// Release this owning handle.
    ///
    /// If this was the last owning handle the payload value is dropped. The
    /// control block is freed as well unless observers remain, in which case
    /// it stays allocated until the last of them is released.
    ///
    /// Releasing an already released handle is a no-op.
    pub fn release(&mut self) {
        let Some(block) = self.ptr.take() else {
            return;
        };
        // SAFETY: this handle kept the block allocated until now.
        let control = unsafe { block.as_ref() };
        control.dec_strong();
        if control.strong() > 0 {
            return;
        }
        debug!(
            "last strong handle released; dropping {} / {} payload",
            control.placement().label(),
            control.shape().label()
        );
        let observers = control.weak();
        // SAFETY: strong count is zero and the payload has not been released.
        unsafe {
            Control::release_payload(block);
        }
        if observers == 0 {
            // SAFETY: both counts are zero and `block` is not used again.
            unsafe {
                Control::release_block(block);
            }
        } else {
            debug!("{observers} observer(s) keep the control block allocated");
        }
    }
}

impl Clone for Strong {
    fn clone(&self) -> Self {
        if let Some(block) = self.ptr {
            // SAFETY: a live `Strong` keeps its control block allocated.
            unsafe { block.as_ref() }.inc_strong();
        }
        Self { ptr: self.ptr }
    }
}

impl Drop for Strong {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Strong {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strong")
            .field("released", &self.is_released())
            .field("strong", &self.strong_count())
            .field("weak", &self.weak_count())
            .finish()
    }
}

/// A non-owning observer of a reference-counted payload.
///
/// An `Observer` can check whether the payload is still alive and try to
/// [`upgrade`] back to an owning handle, but it does not keep the payload
/// value alive by itself. It does keep the control block allocated, which is
/// exactly the retention effect the combined-placement scenario demonstrates.
///
/// [`upgrade`]: Observer::upgrade
pub struct Observer {
    ptr: Option<NonNull<Control>>,
}

impl Observer {
    /// Whether any owning handle to the payload remains.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.strong_count() > 0
    }

    /// Attempt to obtain a new owning handle to the payload.
    ///
    /// Returns `None` once the last owning handle has been released (or this
    /// observer itself has been released).
    #[must_use]
    pub fn upgrade(&self) -> Option<Strong> {
        let block = self.ptr?;
        // SAFETY: a live `Observer` keeps its control block allocated.
        let control = unsafe { block.as_ref() };
        if control.strong() == 0 {
            return None;
        }
        control.inc_strong();
        Some(Strong { ptr: Some(block) })
    }

    /// Number of owning handles to the payload, or zero after release.
    #[must_use]
    pub fn strong_count(&self) -> usize {
        self.ptr
            .map_or(0, |block| unsafe { block.as_ref() }.strong())
    }

    /// Number of observers of the control block, or zero after release.
    #[must_use]
    pub fn weak_count(&self) -> usize {
        self.ptr.map_or(0, |block| unsafe { block.as_ref() }.weak())
    }

    /// Whether this observer has already been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.ptr.is_none()
    }

    /// Release this observer.
    ///
    /// If no owning handles and no other observers remain, the control block
    /// (and, under combined placement, the payload bytes embedded in it) is
    /// returned to the allocator.
    ///
    /// Releasing an already released observer is a no-op.
    pub fn release(&mut self) {
        let Some(block) = self.ptr.take() else {
            return;
        };
        // SAFETY: this observer kept the block allocated until now.
        let control = unsafe { block.as_ref() };
        control.dec_weak();
        if control.weak() == 0 && control.strong() == 0 {
            debug!("last observer released; freeing the control block");
            // SAFETY: both counts are zero and `block` is not used again.
            unsafe {
                Control::release_block(block);
            }
        }
    }
}

impl Clone for Observer {
    fn clone(&self) -> Self {
        if let Some(block) = self.ptr {
            // SAFETY: a live `Observer` keeps its control block allocated.
            unsafe { block.as_ref() }.inc_weak();
        }
        Self { ptr: self.ptr }
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("released", &self.is_released())
            .field("strong", &self.strong_count())
            .field("weak", &self.weak_count())
            .finish()
    }
}

#[cfg(test)]
mod tests;
