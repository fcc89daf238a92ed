//! Debug instrumentation: pattern stamping and the runtime guard checks.
//!
//! Every function here is only reached when the pool runs with `debug`
//! enabled; none of them mutate pool state. Checks report through the error
//! taxonomy and are run before the pool commits anything, so a rejected
//! `free` leaves the pool untouched.

use crate::error::{PoolError, PoolResult};
use crate::free_list::FreeList;
use crate::layout::PageLayout;
use crate::page::PageStore;
use crate::util::{
    ALIGN_PATTERN, ALLOCATED_PATTERN, FREED_PATTERN, LINK_SIZE, PAD_PATTERN, UNALLOCATED_PATTERN,
};

/// Stamp a fresh page: everything `UNALLOCATED`, alignment slack `ALIGN`,
/// guard padding `PAD`. Header regions are left to the codec, which zeroes
/// them debug or not.
///
/// # Safety
/// `page` must be a live page of `layout` with no block in use.
pub unsafe fn stamp_page(layout: &PageLayout, page: *mut u8) {
    core::ptr::write_bytes(page, UNALLOCATED_PATTERN, layout.page_size);
    core::ptr::write_bytes(page.add(LINK_SIZE), ALIGN_PATTERN, layout.left_align_size);

    for (index, (object, _header)) in layout.blocks(page).enumerate() {
        core::ptr::write_bytes(object.sub(layout.pad_bytes), PAD_PATTERN, layout.pad_bytes);
        let right_pad = object.add(layout.object_size);
        core::ptr::write_bytes(right_pad, PAD_PATTERN, layout.pad_bytes);
        if index + 1 < layout.objects_per_page {
            core::ptr::write_bytes(
                right_pad.add(layout.pad_bytes),
                ALIGN_PATTERN,
                layout.inter_align_size,
            );
        }
    }
}

/// Fill a block's object region with the allocated pattern.
///
/// # Safety
/// `block` must be a block start within a live page of `layout`.
#[inline]
pub unsafe fn stamp_allocated(layout: &PageLayout, block: *mut u8) {
    core::ptr::write_bytes(block, ALLOCATED_PATTERN, layout.object_size);
}

/// Fill a block's object region with the freed pattern. The caller
/// overwrites the first word with the free-list link afterwards.
///
/// # Safety
/// `block` must be a block start within a live page of `layout`.
#[inline]
pub unsafe fn stamp_freed(layout: &PageLayout, block: *mut u8) {
    core::ptr::write_bytes(block, FREED_PATTERN, layout.object_size);
}

/// Detect a second free of `block`.
///
/// When the object is wider than the embedded link, the byte just past the
/// link still holds the freed pattern from the first free. Otherwise the
/// whole object is the link and the free list is walked instead.
///
/// # Safety
/// `block` must be readable for `layout.object_size` bytes, and every block
/// on the free list must be readable.
pub unsafe fn check_double_free(
    layout: &PageLayout,
    free_list: &FreeList,
    block: *const u8,
) -> PoolResult<()> {
    let freed = if layout.object_size > LINK_SIZE {
        block.add(LINK_SIZE).read() == FREED_PATTERN
    } else {
        free_list.contains(block)
    };
    if freed {
        Err(PoolError::MultipleFree {
            addr: block as usize,
        })
    } else {
        Ok(())
    }
}

/// Verify the guard padding on both sides of `block` still holds the pad
/// pattern. No-op when the pool carries no padding.
///
/// # Safety
/// `block` and its surrounding padding must be readable.
pub unsafe fn check_corruption(layout: &PageLayout, block: *const u8) -> PoolResult<()> {
    if layout.pad_bytes == 0 {
        return Ok(());
    }
    let left = block.sub(layout.pad_bytes);
    let right = block.add(layout.object_size);
    for i in 0..layout.pad_bytes {
        if left.add(i).read() != PAD_PATTERN || right.add(i).read() != PAD_PATTERN {
            return Err(PoolError::CorruptedBlock {
                addr: block as usize,
            });
        }
    }
    Ok(())
}

/// Verify `block` lies inside a live page and sits exactly on a block start.
pub fn check_boundary(
    pages: &PageStore,
    layout: &PageLayout,
    block: *const u8,
) -> PoolResult<()> {
    let page = pages
        .owning_page(block)
        .ok_or(PoolError::BadAddress {
            addr: block as usize,
        })?;
    layout
        .block_index(page, block)
        .map(|_| ())
        .ok_or(PoolError::BadBoundary {
            addr: block as usize,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, HeaderKind};

    fn layout() -> PageLayout {
        let config = Config {
            objects_per_page: 3,
            pad_bytes: 2,
            header_kind: HeaderKind::Basic,
            alignment: 0,
            ..Config::default()
        };
        PageLayout::compute(16, &config).unwrap()
    }

    fn fake_page(layout: &PageLayout) -> Vec<u8> {
        let mut page = vec![0u8; layout.page_size];
        unsafe { stamp_page(layout, page.as_mut_ptr()) };
        page
    }

    #[test]
    fn stamp_page_marks_every_region() {
        let layout = layout();
        let page = fake_page(&layout);
        let base = page.as_ptr();

        unsafe {
            for (object, header) in layout.blocks(base as *mut u8) {
                let object_off = object as usize - base as usize;
                let header_off = header as usize - base as usize;
                assert_eq!(header_off + layout.header_size + layout.pad_bytes, object_off);

                for i in 0..layout.object_size {
                    assert_eq!(page[object_off + i], UNALLOCATED_PATTERN);
                }
                for i in 1..=layout.pad_bytes {
                    assert_eq!(page[object_off - i], PAD_PATTERN);
                    assert_eq!(page[object_off + layout.object_size + i - 1], PAD_PATTERN);
                }
            }
        }
    }

    #[test]
    fn corruption_check_spots_a_scribbled_pad() {
        let layout = layout();
        let mut page = fake_page(&layout);
        let block = unsafe { layout.first_block(page.as_mut_ptr()) };

        unsafe {
            assert!(check_corruption(&layout, block).is_ok());
            block.sub(1).write(0x00);
            assert_eq!(
                check_corruption(&layout, block),
                Err(PoolError::CorruptedBlock {
                    addr: block as usize
                })
            );
        }
    }

    #[test]
    fn corruption_check_spots_an_overrun() {
        let layout = layout();
        let mut page = fake_page(&layout);
        let block = unsafe { layout.first_block(page.as_mut_ptr()) };

        unsafe {
            block.add(layout.object_size).write(0x00);
            assert!(check_corruption(&layout, block).is_err());
        }
    }

    #[test]
    fn double_free_reads_the_byte_past_the_link() {
        let layout = layout();
        let mut page = fake_page(&layout);
        let block = unsafe { layout.first_block(page.as_mut_ptr()) };
        let free_list = FreeList::new();

        unsafe {
            // Freshly stamped block: unallocated, not freed.
            assert!(check_double_free(&layout, &free_list, block).is_ok());

            stamp_freed(&layout, block);
            assert_eq!(
                check_double_free(&layout, &free_list, block),
                Err(PoolError::MultipleFree {
                    addr: block as usize
                })
            );
        }
    }

    #[test]
    fn link_sized_objects_fall_back_to_the_free_list() {
        let config = Config {
            objects_per_page: 2,
            pad_bytes: 0,
            header_kind: HeaderKind::None,
            ..Config::default()
        };
        let layout = PageLayout::compute(LINK_SIZE, &config).unwrap();
        let mut page = vec![0u8; layout.page_size];
        let block = unsafe { layout.first_block(page.as_mut_ptr()) };

        let mut free_list = FreeList::new();
        unsafe {
            assert!(check_double_free(&layout, &free_list, block).is_ok());
            free_list.push(block);
            assert!(check_double_free(&layout, &free_list, block).is_err());
        }
    }
}
