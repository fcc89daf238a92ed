//! Page layout computation.
//!
//! A page is a single contiguous allocation:
//!
//! ```text
//! [ next-page link | left-align | header | pad | object-0 | pad |
//!   inter-align | header | pad | object-1 | pad | ... ]
//! ```
//!
//! Everything here is pure arithmetic over the configuration; the actual
//! memory is owned by [`PageStore`](crate::page::PageStore).

use crate::config::{Config, HeaderKind};
use crate::error::{PoolError, PoolResult};
use crate::util::{align_pad, LINK_SIZE};

/// Size of a `Basic` header: allocation number (u32) + in-use flag (u8).
pub const BASIC_HEADER_SIZE: usize = 5;

/// Size of the use counter an `Extended` header adds on top of `Basic`.
pub const USE_COUNTER_SIZE: usize = 2;

/// Per-block header size for a given flavor.
pub const fn header_size(kind: HeaderKind, extra_bytes: usize) -> usize {
    match kind {
        HeaderKind::None => 0,
        HeaderKind::Basic => BASIC_HEADER_SIZE,
        HeaderKind::Extended => extra_bytes + USE_COUNTER_SIZE + BASIC_HEADER_SIZE,
        HeaderKind::External => LINK_SIZE,
    }
}

/// Byte-exact layout of one page, derived once from the configuration.
#[derive(Clone, Debug)]
pub struct PageLayout {
    pub object_size: usize,
    pub objects_per_page: usize,
    pub pad_bytes: usize,
    pub header_size: usize,
    pub alignment: usize,
    /// Slack between the page link and the first header so the first object
    /// lands on an `alignment` boundary.
    pub left_align_size: usize,
    /// Slack between consecutive blocks so every stride stays aligned.
    pub inter_align_size: usize,
    /// Offset of the first object from the page base.
    pub left_section_size: usize,
    /// Stride from one object to the next.
    pub inter_section_size: usize,
    pub page_size: usize,
}

impl PageLayout {
    /// Validate the configuration and derive the page layout.
    pub fn compute(object_size: usize, config: &Config) -> PoolResult<Self> {
        if config.objects_per_page == 0 {
            return Err(PoolError::InvalidConfig {
                reason: "objects_per_page must be at least 1",
            });
        }
        if config.alignment > 1 && !config.alignment.is_power_of_two() {
            return Err(PoolError::InvalidConfig {
                reason: "alignment must be 0, 1, or a power of two",
            });
        }
        if object_size < LINK_SIZE {
            return Err(PoolError::InvalidConfig {
                reason: "object_size must be at least pointer-width to embed the free-list link",
            });
        }

        let header_size = header_size(config.header_kind, config.header_extra_bytes);
        let overflow = PoolError::InvalidConfig {
            reason: "page size arithmetic overflows",
        };

        // header + both pads + object: the repeated portion of every block.
        let block_bytes = header_size
            .checked_add(config.pad_bytes.checked_mul(2).ok_or(overflow.clone())?)
            .and_then(|n| n.checked_add(object_size))
            .ok_or(overflow.clone())?;

        let left_align_size = align_pad(LINK_SIZE + header_size + config.pad_bytes, config.alignment);
        let inter_align_size = align_pad(block_bytes, config.alignment);

        let left_section_size = LINK_SIZE + left_align_size + header_size + config.pad_bytes;
        let inter_section_size = block_bytes + inter_align_size;

        let page_size = block_bytes
            .checked_mul(config.objects_per_page)
            .and_then(|n| n.checked_add(LINK_SIZE + left_align_size))
            .and_then(|n| {
                inter_align_size
                    .checked_mul(config.objects_per_page - 1)
                    .and_then(|slack| n.checked_add(slack))
            })
            .ok_or(overflow)?;

        Ok(PageLayout {
            object_size,
            objects_per_page: config.objects_per_page,
            pad_bytes: config.pad_bytes,
            header_size,
            alignment: config.alignment,
            left_align_size,
            inter_align_size,
            left_section_size,
            inter_section_size,
            page_size,
        })
    }

    /// Host-allocator layout for one page. The base alignment is raised to
    /// the configured block alignment so the in-page offsets compose.
    pub fn host_page_layout(&self) -> PoolResult<std::alloc::Layout> {
        let align = self.alignment.max(core::mem::align_of::<*mut u8>());
        std::alloc::Layout::from_size_align(self.page_size, align).map_err(|_| {
            PoolError::InvalidConfig {
                reason: "page size is not representable as a host allocation",
            }
        })
    }

    /// Host-allocator layout for a single object (pass-through mode).
    pub fn host_object_layout(&self) -> PoolResult<std::alloc::Layout> {
        let align = self.alignment.max(1);
        std::alloc::Layout::from_size_align(self.object_size, align).map_err(|_| {
            PoolError::InvalidConfig {
                reason: "object size is not representable as a host allocation",
            }
        })
    }

    /// First object in a page.
    ///
    /// # Safety
    /// `page` must be the base of a live page laid out by this layout.
    #[inline(always)]
    pub unsafe fn first_block(&self, page: *mut u8) -> *mut u8 {
        page.add(self.left_section_size)
    }

    /// Header of a block. For `HeaderKind::None` this is the degenerate
    /// zero-length region at the block's left pad edge.
    ///
    /// # Safety
    /// `block` must be a block start within a live page of this layout.
    #[inline(always)]
    pub unsafe fn header_of(&self, block: *mut u8) -> *mut u8 {
        block.sub(self.pad_bytes + self.header_size)
    }

    /// Block index of `ptr` within `page`, or `None` if `ptr` does not sit
    /// exactly on a block start.
    pub fn block_index(&self, page: *const u8, ptr: *const u8) -> Option<usize> {
        let first = page as usize + self.left_section_size;
        let addr = ptr as usize;
        if addr < first {
            return None;
        }
        let offset = addr - first;
        if offset % self.inter_section_size != 0 {
            return None;
        }
        let index = offset / self.inter_section_size;
        if index < self.objects_per_page {
            Some(index)
        } else {
            None
        }
    }

    /// Iterate a page's blocks in ascending address order as
    /// `(object_ptr, header_ptr)` pairs.
    ///
    /// # Safety
    /// `page` must be the base of a live page laid out by this layout, and
    /// the page must outlive the iterator.
    pub unsafe fn blocks(&self, page: *mut u8) -> Blocks<'_> {
        Blocks {
            layout: self,
            object: self.first_block(page),
            remaining: self.objects_per_page,
        }
    }
}

/// Iterator over a page's `(object_ptr, header_ptr)` pairs.
pub struct Blocks<'a> {
    layout: &'a PageLayout,
    object: *mut u8,
    remaining: usize,
}

impl Iterator for Blocks<'_> {
    type Item = (*mut u8, *mut u8);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let object = self.object;
        // SAFETY: the constructor's contract guarantees `object` points at a
        // block start within the live page for every remaining step.
        let header = unsafe { self.layout.header_of(object) };
        self.remaining -= 1;
        if self.remaining > 0 {
            self.object = unsafe { object.add(self.layout.inter_section_size) };
        }
        Some((object, header))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Blocks<'_> {}
