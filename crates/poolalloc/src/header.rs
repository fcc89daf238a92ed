//! Per-block header encoding.
//!
//! Headers live inside the page immediately before each block's left pad.
//! All multi-byte fields are little-endian and are accessed bytewise because
//! header offsets carry no alignment guarantee.
//!
//! `Extended` is `Basic` plus a pre-action: clear the caller's extra region
//! and bump a use counter that survives free/reuse cycles.

use crate::config::HeaderKind;
use crate::layout::BASIC_HEADER_SIZE;

/// Heap-owned record backing an `External` header.
///
/// The header slot stores the owning pointer; the record (including its
/// label) is created on allocate and destroyed on free or page teardown.
#[derive(Debug)]
pub struct BlockInfo {
    pub in_use: bool,
    pub label: Option<String>,
    pub allocation_number: u32,
}

/// Encoder/decoder for one pool's header flavor.
#[derive(Clone, Debug)]
pub struct HeaderCodec {
    kind: HeaderKind,
    extra_bytes: usize,
    size: usize,
}

impl HeaderCodec {
    pub fn new(kind: HeaderKind, extra_bytes: usize) -> Self {
        HeaderCodec {
            kind,
            extra_bytes,
            size: crate::layout::header_size(kind, extra_bytes),
        }
    }

    #[inline]
    pub fn kind(&self) -> HeaderKind {
        self.kind
    }

    /// Encoded header size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Reset a header to its initial free state. Called once per block when
    /// a page is initialized; from then on `mark_free` maintains it.
    ///
    /// # Safety
    /// `header` must point to `self.size()` writable bytes.
    pub unsafe fn init(&self, header: *mut u8) {
        core::ptr::write_bytes(header, 0, self.size);
    }

    /// Record an allocation in the header.
    ///
    /// # Safety
    /// `header` must point to `self.size()` writable bytes previously
    /// initialized by `init` or `mark_free`.
    pub unsafe fn mark_used(&self, header: *mut u8, allocation_number: u32, label: Option<&str>) {
        match self.kind {
            HeaderKind::None => {}
            HeaderKind::Basic => {
                self.write_basic(header, allocation_number, 1);
            }
            HeaderKind::Extended => {
                core::ptr::write_bytes(header, 0, self.extra_bytes);
                let counter = read_u16_le(header.add(self.extra_bytes));
                write_u16_le(header.add(self.extra_bytes), counter.wrapping_add(1));
                self.write_basic(header, allocation_number, 1);
            }
            HeaderKind::External => {
                let info = Box::new(BlockInfo {
                    in_use: true,
                    label: label.map(str::to_owned),
                    allocation_number,
                });
                write_ptr_le(header, Box::into_raw(info));
            }
        }
    }

    /// Record a deallocation in the header. For `External` this destroys the
    /// owned record, label included.
    ///
    /// # Safety
    /// Same contract as `mark_used`; an `External` slot must hold either null
    /// or a pointer produced by `mark_used`.
    pub unsafe fn mark_free(&self, header: *mut u8) {
        match self.kind {
            HeaderKind::None => {}
            HeaderKind::Basic => {
                self.write_basic(header, 0, 0);
            }
            HeaderKind::Extended => {
                // The use counter persists across free/reuse.
                core::ptr::write_bytes(header, 0, self.extra_bytes);
                self.write_basic(header, 0, 0);
            }
            HeaderKind::External => {
                let info = read_ptr_le(header);
                if !info.is_null() {
                    drop(Box::from_raw(info));
                }
                write_ptr_le(header, core::ptr::null_mut());
            }
        }
    }

    /// Whether the header records the block as in use. `None` for
    /// `HeaderKind::None`: headerless pools answer this from the free list.
    ///
    /// # Safety
    /// Same contract as `mark_free`.
    pub unsafe fn is_in_use(&self, header: *const u8) -> Option<bool> {
        match self.kind {
            HeaderKind::None => None,
            HeaderKind::Basic | HeaderKind::Extended => {
                Some(header.add(self.size - 1).read() != 0)
            }
            HeaderKind::External => {
                let info = read_ptr_le(header);
                Some(!info.is_null() && (*info).in_use)
            }
        }
    }

    /// Release any heap record still owned by the header. Used on page
    /// teardown, where blocks may still be in use.
    ///
    /// # Safety
    /// Same contract as `mark_free`.
    pub unsafe fn destroy(&self, header: *mut u8) {
        if self.kind == HeaderKind::External {
            let info = read_ptr_le(header);
            if !info.is_null() {
                drop(Box::from_raw(info));
                write_ptr_le(header, core::ptr::null_mut());
            }
        }
    }

    /// The `Basic` fields sit at the tail of every flavor that has them.
    #[inline]
    unsafe fn write_basic(&self, header: *mut u8, allocation_number: u32, flag: u8) {
        let basic = header.add(self.size - BASIC_HEADER_SIZE);
        write_u32_le(basic, allocation_number);
        basic.add(4).write(flag);
    }
}

#[inline]
unsafe fn write_u32_le(ptr: *mut u8, value: u32) {
    let bytes = value.to_le_bytes();
    core::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
}

#[inline]
unsafe fn read_u16_le(ptr: *const u8) -> u16 {
    let mut bytes = [0u8; 2];
    core::ptr::copy_nonoverlapping(ptr, bytes.as_mut_ptr(), bytes.len());
    u16::from_le_bytes(bytes)
}

#[inline]
unsafe fn write_u16_le(ptr: *mut u8, value: u16) {
    let bytes = value.to_le_bytes();
    core::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
}

#[inline]
unsafe fn write_ptr_le(ptr: *mut u8, value: *mut BlockInfo) {
    let bytes = (value as usize).to_le_bytes();
    core::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
}

#[inline]
unsafe fn read_ptr_le(ptr: *const u8) -> *mut BlockInfo {
    let mut bytes = [0u8; core::mem::size_of::<usize>()];
    core::ptr::copy_nonoverlapping(ptr, bytes.as_mut_ptr(), bytes.len());
    usize::from_le_bytes(bytes) as *mut BlockInfo
}
