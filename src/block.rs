use core::cell::Cell;
use core::ptr::{self, NonNull};
use std::alloc::{alloc, dealloc, Layout};
use std::process::abort;

use crate::error::AllocError;

/// Pattern written into every payload byte so the pages are actually touched
/// and show up in the resident set, not just in the virtual size.
const FILL: u8 = 0xA5;

/// How the payload value is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// The payload bytes are the value itself, stored inline wherever the
    /// value lives.
    EmbeddedArray,
    /// The value is a small handle owning a separately allocated byte buffer
    /// which it frees when dropped.
    BufferHandle,
}

impl Shape {
    /// Short label used in scenario banners.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::EmbeddedArray => "embedded array",
            Self::BufferHandle => "buffer handle",
        }
    }
}

/// Where the payload value lives relative to the reference-count bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    /// One allocation holds both the counts and the value.
    Combined,
    /// The counts and the value live in two independent allocations, linked
    /// by an owning pointer from the control block.
    Split,
}

impl Placement {
    /// Short label used in scenario banners.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Combined => "combined allocation",
            Self::Split => "split allocation",
        }
    }
}

// The `DataPtr` analogue: structurally tiny, but owns (and is responsible for
// freeing) a large separately allocated buffer.
pub(crate) struct Buffer {
    ptr: NonNull<u8>,
    len: usize,
}

impl Buffer {
    fn filled(len: usize) -> Result<Self, AllocError> {
        if len == 0 {
            return Ok(Self {
                ptr: NonNull::dangling(),
                len: 0,
            });
        }
        let layout = byte_layout(len)?;
        // SAFETY: `layout` has non-zero size.
        let ptr = unsafe { alloc(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            return Err(AllocError::new(len));
        };
        // SAFETY: the allocation is `len` bytes and freshly owned here.
        unsafe {
            ptr::write_bytes(ptr.as_ptr(), FILL, len);
        }
        Ok(Self { ptr, len })
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        // We do not allocate for zero-length buffers, so deallocation is also
        // not necessary.
        if self.len != 0 {
            // SAFETY: the buffer was allocated with this exact layout and the
            // length was validated at allocation time.
            unsafe {
                dealloc(
                    self.ptr.as_ptr(),
                    Layout::from_size_align_unchecked(self.len, 1),
                );
            }
        }
    }
}

/// The shared control structure both handle kinds point at.
///
/// Payload release and block release are two separate, independently
/// triggered events: the payload value is dropped when `strong` reaches zero;
/// the block memory is returned to the allocator only once `weak` is also
/// zero. Under `Combined` placement the value is laid out immediately after
/// this header inside the same allocation, so dropping an embedded byte
/// payload frees nothing until the block itself goes.
pub(crate) struct Control {
    pub strong: Cell<usize>,
    pub weak: Cell<usize>,
    shape: Shape,
    placement: Placement,
    payload_len: usize,
    // Captured at allocation time so the release paths cannot fail.
    block_layout: Layout,
    value_layout: Layout,
    // `Combined` only: offset of the value from the block start.
    value_offset: usize,
    // `Split` only: the value's own allocation.
    split_value: Cell<Option<NonNull<u8>>>,
}

impl Control {
    #[inline]
    pub(crate) fn strong(&self) -> usize {
        self.strong.get()
    }

    #[inline]
    pub(crate) fn inc_strong(&self) {
        let count = self.strong();
        // Abort on overflow instead of corrupting the count.
        if count == usize::MAX {
            abort();
        }
        self.strong.set(count + 1);
    }

    #[inline]
    pub(crate) fn dec_strong(&self) {
        self.strong.set(self.strong().saturating_sub(1));
    }

    #[inline]
    pub(crate) fn weak(&self) -> usize {
        self.weak.get()
    }

    #[inline]
    pub(crate) fn inc_weak(&self) {
        let count = self.weak();
        if count == usize::MAX {
            abort();
        }
        self.weak.set(count + 1);
    }

    #[inline]
    pub(crate) fn dec_weak(&self) {
        self.weak.set(self.weak().saturating_sub(1));
    }

    #[inline]
    pub(crate) fn shape(&self) -> Shape {
        self.shape
    }

    #[inline]
    pub(crate) fn placement(&self) -> Placement {
        self.placement
    }

    #[inline]
    pub(crate) fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// Drop the payload value.
    ///
    /// For a split placement this also frees the value's own allocation. For
    /// a combined placement the value's drop glue runs in place; embedded
    /// bytes have no drop glue, so their memory stays inside the block until
    /// [`Control::release_block`].
    ///
    /// # Safety
    ///
    /// `block` must point at a live control block whose strong count is zero
    /// and whose payload has not been released yet.
    pub(crate) unsafe fn release_payload(block: NonNull<Self>) {
        let control = block.as_ref();
        debug_assert_eq!(control.strong(), 0);
        match control.placement {
            Placement::Combined => {
                let value = block.as_ptr().cast::<u8>().add(control.value_offset);
                drop_value_in_place(control.shape, value);
            }
            Placement::Split => {
                if let Some(value) = control.split_value.take() {
                    drop_value_in_place(control.shape, value.as_ptr());
                    if control.value_layout.size() != 0 {
                        dealloc(value.as_ptr(), control.value_layout);
                    }
                }
            }
        }
        trace!(
            "released {} payload ({}, {} bytes)",
            control.placement.label(),
            control.shape.label(),
            control.payload_len
        );
    }

    /// Return the block memory to the allocator.
    ///
    /// # Safety
    ///
    /// Both counts must be zero, the payload must already have been released,
    /// and no pointer to the block may be used afterwards.
    pub(crate) unsafe fn release_block(block: NonNull<Self>) {
        let layout = block.as_ref().block_layout;
        dealloc(block.as_ptr().cast::<u8>(), layout);
        trace!("released control block ({} bytes)", layout.size());
    }
}

/// Allocate a control block with a strong count of one and a freshly
/// constructed, pattern-filled payload of `len` bytes.
///
/// The placement decides the allocation topology: `Combined` performs one
/// allocation sized for the header plus the value; `Split` performs two
/// independent allocations linked by an owning pointer.
pub(crate) fn allocate(
    placement: Placement,
    shape: Shape,
    len: usize,
) -> Result<NonNull<Control>, AllocError> {
    let block = match placement {
        Placement::Combined => allocate_combined(shape, len),
        Placement::Split => allocate_split(shape, len),
    }?;
    debug!(
        "allocated {} / {} block: {} payload bytes",
        placement.label(),
        shape.label(),
        len
    );
    Ok(block)
}

fn allocate_combined(shape: Shape, len: usize) -> Result<NonNull<Control>, AllocError> {
    let value_layout = value_layout(shape, len)?;
    let (block_layout, value_offset) = Layout::new::<Control>()
        .extend(value_layout)
        .map_err(|_| AllocError::new(len))?;
    let block_layout = block_layout.pad_to_align();

    // A fallible buffer construction happens before the block allocation so a
    // failure cannot leak the block.
    let buffer = match shape {
        Shape::EmbeddedArray => None,
        Shape::BufferHandle => Some(Buffer::filled(len)?),
    };

    let block = raw_alloc(block_layout)?.cast::<Control>();
    // SAFETY: the allocation is large enough for the header and the value at
    // `value_offset`, per the layout computed above.
    unsafe {
        block.as_ptr().write(Control {
            strong: Cell::new(1),
            weak: Cell::new(0),
            shape,
            placement: Placement::Combined,
            payload_len: len,
            block_layout,
            value_layout,
            value_offset,
            split_value: Cell::new(None),
        });
        let value = block.as_ptr().cast::<u8>().add(value_offset);
        match buffer {
            Some(buffer) => value.cast::<Buffer>().write(buffer),
            None => ptr::write_bytes(value, FILL, len),
        }
    }
    Ok(block)
}

fn allocate_split(shape: Shape, len: usize) -> Result<NonNull<Control>, AllocError> {
    let value_layout = value_layout(shape, len)?;

    let buffer = match shape {
        Shape::EmbeddedArray => None,
        Shape::BufferHandle => Some(Buffer::filled(len)?),
    };

    // Zero-length embedded payloads never allocate; a dangling pointer marks
    // the (empty) value.
    let value = if value_layout.size() == 0 {
        NonNull::dangling()
    } else {
        raw_alloc(value_layout)?
    };
    // SAFETY: the allocation matches `value_layout` and is freshly owned.
    unsafe {
        match buffer {
            Some(buffer) => value.as_ptr().cast::<Buffer>().write(buffer),
            None => ptr::write_bytes(value.as_ptr(), FILL, len),
        }
    }

    let block_layout = Layout::new::<Control>();
    let block = match raw_alloc(block_layout) {
        Ok(block) => block.cast::<Control>(),
        Err(err) => {
            // Unwind the value allocation before propagating.
            unsafe {
                drop_value_in_place(shape, value.as_ptr());
                if value_layout.size() != 0 {
                    dealloc(value.as_ptr(), value_layout);
                }
            }
            return Err(err);
        }
    };
    // SAFETY: the allocation matches `block_layout` and is freshly owned.
    unsafe {
        block.as_ptr().write(Control {
            strong: Cell::new(1),
            weak: Cell::new(0),
            shape,
            placement: Placement::Split,
            payload_len: len,
            block_layout,
            value_layout,
            value_offset: 0,
            split_value: Cell::new(Some(value)),
        });
    }
    Ok(block)
}

// Run the value's drop glue. Embedded bytes have none; a buffer handle frees
// its owned buffer.
unsafe fn drop_value_in_place(shape: Shape, value: *mut u8) {
    match shape {
        Shape::EmbeddedArray => {}
        Shape::BufferHandle => ptr::drop_in_place(value.cast::<Buffer>()),
    }
}

fn value_layout(shape: Shape, len: usize) -> Result<Layout, AllocError> {
    match shape {
        Shape::EmbeddedArray => byte_layout(len),
        Shape::BufferHandle => Ok(Layout::new::<Buffer>()),
    }
}

fn byte_layout(len: usize) -> Result<Layout, AllocError> {
    Layout::array::<u8>(len).map_err(|_| AllocError::new(len))
}

fn raw_alloc(layout: Layout) -> Result<NonNull<u8>, AllocError> {
    // SAFETY: every layout passed here has non-zero size; `Control` is never
    // a ZST and zero-length payloads never reach an allocation call.
    let ptr = unsafe { alloc(layout) };
    NonNull::new(ptr).ok_or_else(|| AllocError::new(layout.size()))
}
