// Tagged pointer operations packing a version counter next to a node address
// inside one atomically updatable word.
//
// Word layout on 64-bit targets (48-bit architectural addresses):
//   [63:48] tag     - version counter, bumped on every successful head/next CAS
//   [47:0]  address - node pointer bits
//
// Word layout on 32-bit targets (nodes are at least 4-aligned):
//   [31:2]  address - node pointer bits
//   [1:0]   tag     - version counter, 2 bits wide
//
// The tag turns the classic ABA hazard into a CAS failure: removing a node and
// reinstating it at the same address advances the tag, so a compare-exchange
// against a stale snapshot no longer matches the full word. Equality of two
// tagged pointers is whole-word equality - address AND tag.
//
// The 2-bit tag on 32-bit targets admits ABA after only four mutations of the
// same word between a snapshot and its CAS; prefer 64-bit targets where the
// margin is 65536.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(not(target_has_atomic = "ptr"))]
compile_error!("moray requires lock-free word-sized atomics");

#[cfg(target_pointer_width = "64")]
mod layout {
    pub const TAG_SHIFT: u32 = 48;
    pub const MAX_TAG: usize = 0xffff;
    pub const TAG_MASK: usize = MAX_TAG << TAG_SHIFT;
}

#[cfg(target_pointer_width = "32")]
mod layout {
    pub const TAG_SHIFT: u32 = 0;
    pub const MAX_TAG: usize = 0b11;
    pub const TAG_MASK: usize = MAX_TAG;
}

#[cfg(not(any(target_pointer_width = "64", target_pointer_width = "32")))]
compile_error!("no spare pointer bits available for tagging on this target");

use layout::{MAX_TAG, TAG_MASK, TAG_SHIFT};

const ADDR_MASK: usize = !TAG_MASK;

/// A node address and a version tag packed into a single word.
///
/// Plain value type; the atomic carrier is [`AtomicTaggedPtr`].
pub(crate) struct TaggedPtr<N> {
    raw: usize,
    _node: PhantomData<*mut N>,
}

// Manual impls to avoid requiring bounds on N.
impl<N> Copy for TaggedPtr<N> {}

impl<N> Clone for TaggedPtr<N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N> PartialEq for TaggedPtr<N> {
    // Whole-word comparison: both the address and the tag must match.
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<N> Eq for TaggedPtr<N> {}

impl<N> fmt::Debug for TaggedPtr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedPtr")
            .field("ptr", &self.ptr())
            .field("tag", &self.tag())
            .finish()
    }
}

impl<N> TaggedPtr<N> {
    /// The largest representable tag; increments wrap past it.
    pub(crate) const MAX_TAG: usize = MAX_TAG;

    // =========================================================================
    // Construction
    // =========================================================================

    /// The null pointer with tag zero.
    #[inline]
    pub(crate) const fn null() -> Self {
        TaggedPtr {
            raw: 0,
            _node: PhantomData,
        }
    }

    /// Pack an address and a tag. The tag is reduced modulo `MAX_TAG + 1`.
    #[inline]
    pub(crate) fn new(ptr: *mut N, tag: usize) -> Self {
        debug_assert_eq!(ptr as usize & TAG_MASK, 0);
        TaggedPtr {
            raw: (ptr as usize) | ((tag & MAX_TAG) << TAG_SHIFT),
            _node: PhantomData,
        }
    }

    #[inline]
    fn from_raw(raw: usize) -> Self {
        TaggedPtr {
            raw,
            _node: PhantomData,
        }
    }

    // =========================================================================
    // Extraction
    // =========================================================================

    /// The address with tag bits masked off (the pointer you dereference).
    #[inline]
    pub(crate) fn ptr(&self) -> *mut N {
        (self.raw & ADDR_MASK) as *mut N
    }

    /// The tag value.
    #[inline]
    pub(crate) fn tag(&self) -> usize {
        (self.raw & TAG_MASK) >> TAG_SHIFT
    }

    #[inline]
    pub(crate) fn is_null(&self) -> bool {
        self.raw & ADDR_MASK == 0
    }

    // =========================================================================
    // Transformers
    // =========================================================================

    /// Same address, tag replaced with `tag` modulo `MAX_TAG + 1`.
    #[inline]
    pub(crate) fn with_tag(&self, tag: usize) -> Self {
        Self::new(self.ptr(), tag)
    }

    /// Same address, tag incremented with wrap-around.
    #[inline]
    pub(crate) fn bump_tag(&self) -> Self {
        self.with_tag(self.tag().wrapping_add(1))
    }
}

/// Atomic carrier for [`TaggedPtr`].
///
/// Orderings are fixed at this seam: Acquire snapshot loads, Release
/// publishing stores, AcqRel/Acquire compare-exchange. That is the
/// Michael-Scott discipline - a successful installing CAS releases the node
/// contents written while the node was private, and every snapshot read
/// acquires them.
pub(crate) struct AtomicTaggedPtr<N> {
    raw: AtomicUsize,
    _node: PhantomData<*mut N>,
}

impl<N> AtomicTaggedPtr<N> {
    #[inline]
    pub(crate) const fn null() -> Self {
        AtomicTaggedPtr {
            raw: AtomicUsize::new(0),
            _node: PhantomData,
        }
    }

    /// Snapshot the word (Acquire ordering).
    #[inline]
    pub(crate) fn load(&self) -> TaggedPtr<N> {
        TaggedPtr::from_raw(self.raw.load(Ordering::Acquire))
    }

    /// Publish the word (Release ordering).
    #[inline]
    pub(crate) fn store(&self, value: TaggedPtr<N>) {
        self.raw.store(value.raw, Ordering::Release)
    }

    /// CAS the full word (AcqRel/Acquire ordering). Both the address and the
    /// tag of `expected` must match for the swap to occur.
    #[inline]
    pub(crate) fn compare_exchange(
        &self,
        expected: TaggedPtr<N>,
        desired: TaggedPtr<N>,
    ) -> Result<TaggedPtr<N>, TaggedPtr<N>> {
        self.raw
            .compare_exchange(expected.raw, desired.raw, Ordering::AcqRel, Ordering::Acquire)
            .map(TaggedPtr::from_raw)
            .map_err(TaggedPtr::from_raw)
    }
}
