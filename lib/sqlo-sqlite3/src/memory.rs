///
/// Engine-heap buffers for bound text and blob values.
///
/// Text and blob values are bound with the static destructor, so the engine
/// reads them in place and never frees them. Each one is therefore copied
/// into a `ForeignBuffer` allocated from the engine heap, and the statement
/// keeps that buffer alive in its `AllocationTracker` for as long as the
/// engine may reference it.
///
/// A `ForeignBuffer` frees its memory when dropped. A buffer whose bind call
/// failed is never recorded and is freed on the error path by going out of
/// scope.
///

use std::ffi::{c_int, c_void};
use std::ptr::NonNull;

use rusqlite::ffi;
use tracing::trace;

pub(crate) struct ForeignBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

impl ForeignBuffer {
    /// Copies `bytes` into a fresh engine allocation.
    /// Returns `None` when the engine heap is exhausted.
    pub(crate) fn copy_from(bytes: &[u8]) -> Option<Self> {
        // Zero-length values still need a non-null pointer, or the engine
        // binds NULL instead of an empty string or blob.
        let size = bytes.len().max(1) as u64;
        let raw = unsafe { ffi::sqlite3_malloc64(size) }.cast::<u8>();
        let ptr = NonNull::new(raw)?;
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len());
        }
        Some(Self {
            ptr,
            len: bytes.len(),
        })
    }

    pub(crate) fn as_ptr(&self) -> *const c_void {
        self.ptr.as_ptr().cast_const().cast()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

impl Drop for ForeignBuffer {
    fn drop(&mut self) {
        unsafe { ffi::sqlite3_free(self.ptr.as_ptr().cast()) }
    }
}

struct Allocation {
    position: c_int,
    buffer: ForeignBuffer,
}

/// Outstanding engine-heap buffers of one statement, in allocation order.
#[derive(Default)]
pub(crate) struct AllocationTracker {
    allocations: Vec<Allocation>,
}

impl AllocationTracker {
    /// Records the buffer now backing the parameter at `position`.
    ///
    /// The engine has already accepted the new binding, so the buffer that
    /// previously backed the same position is released.
    pub(crate) fn record(&mut self, position: c_int, buffer: ForeignBuffer) {
        self.release_position(position);
        trace!(position, bytes = buffer.len(), "recorded bind buffer");
        self.allocations.push(Allocation { position, buffer });
    }

    /// Releases the buffer backing `position`, if any.
    pub(crate) fn release_position(&mut self, position: c_int) -> usize {
        let before = self.allocations.len();
        self.allocations.retain(|a| a.position != position);
        before - self.allocations.len()
    }

    /// Releases every buffer. Idempotent.
    pub(crate) fn release_all(&mut self) -> usize {
        let released = self.len();
        if !self.is_empty() {
            trace!(released, "released bind buffers");
        }
        self.allocations.clear();
        released
    }

    pub(crate) fn len(&self) -> usize {
        self.allocations.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }
}
