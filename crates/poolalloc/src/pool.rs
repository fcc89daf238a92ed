//! The pool facade.
//!
//! `Pool` wires the layout planner, page store, free list, header codec and
//! debug guards together behind the public allocate/free surface. All state
//! lives in the pool instance; there is no global state.

use log::{debug, warn};

use crate::config::{Config, HeaderKind};
use crate::error::{PoolError, PoolResult};
use crate::free_list::FreeList;
use crate::guards;
use crate::header::HeaderCodec;
use crate::layout::PageLayout;
use crate::page::PageStore;
use crate::stats::Stats;

/// Fixed-size object pool allocator.
///
/// Hands out raw, uninitialized blocks of one configured size from
/// pool-owned pages. Blocks are recycled through an intrusive free list; an
/// optional debug mode stamps recognizable byte patterns and rejects
/// double frees, out-of-bounds frees and padding corruption.
///
/// The pool is single-threaded and non-reentrant (it holds raw pointers and
/// is deliberately neither `Send` nor `Sync`). Ownership of a block passes
/// to the caller between [`allocate`](Pool::allocate) and the matching
/// [`free`](Pool::free); pages, headers and external header records stay
/// owned by the pool and are released when it drops.
///
/// ```
/// use poolalloc::{Config, Pool};
///
/// let mut pool = Pool::new(64, Config::default())?;
/// let block = pool.allocate(None)?;
/// unsafe { pool.free(block)? };
/// # Ok::<(), poolalloc::PoolError>(())
/// ```
pub struct Pool {
    config: Config,
    layout: PageLayout,
    codec: HeaderCodec,
    pages: PageStore,
    free_list: FreeList,
    stats: Stats,
    host_object_layout: std::alloc::Layout,
}

impl Pool {
    /// Create a pool for objects of `object_size` bytes.
    ///
    /// Validates the configuration (`objects_per_page >= 1`, `alignment`
    /// zero or a power of two, `object_size` at least pointer-width) and
    /// derives the byte-exact page layout. No page is acquired until the
    /// first allocation.
    pub fn new(object_size: usize, config: Config) -> PoolResult<Pool> {
        let layout = PageLayout::compute(object_size, &config)?;
        let host_page_layout = layout.host_page_layout()?;
        let host_object_layout = layout.host_object_layout()?;

        let stats = Stats {
            object_size,
            page_size: layout.page_size,
            ..Stats::default()
        };

        Ok(Pool {
            codec: HeaderCodec::new(config.header_kind, config.header_extra_bytes),
            pages: PageStore::new(host_page_layout, config.max_pages),
            free_list: FreeList::new(),
            stats,
            layout,
            config,
            host_object_layout,
        })
    }

    /// Hand out one block, optionally tagged with `label` (recorded only by
    /// `External` headers; ignored in pass-through mode, which has none).
    ///
    /// Fails with `NoPages` when the page limit is reached and the free list
    /// is empty, or `NoMemory` when the host allocator refuses a page. A
    /// failed allocation leaves every counter untouched.
    pub fn allocate(&mut self, label: Option<&str>) -> PoolResult<*mut u8> {
        if self.config.use_host_allocator {
            // SAFETY: the object layout is non-zero-sized (object_size is at
            // least pointer-width).
            let block = unsafe { std::alloc::alloc(self.host_object_layout) };
            if block.is_null() {
                return Err(PoolError::NoMemory {
                    bytes: self.layout.object_size,
                });
            }
            self.stats.note_allocation();
            return Ok(block);
        }

        if self.free_list.is_empty() {
            self.allocate_new_page()?;
        }

        // SAFETY: every listed block sits in a live page.
        let block = unsafe { self.free_list.pop() };
        debug_assert!(!block.is_null(), "a fresh page populates the free list");
        debug_assert!(
            self.layout.alignment <= 1
                || crate::util::is_aligned(block as usize, self.layout.alignment)
        );

        let allocation_number = self.stats.note_allocation();
        self.stats.free_objects -= 1;

        // SAFETY: `block` came off the free list, so it is a block start in
        // a live page and its header region is valid.
        unsafe {
            self.codec
                .mark_used(self.layout.header_of(block), allocation_number, label);
            if self.config.debug {
                guards::stamp_allocated(&self.layout, block);
            }
        }
        Ok(block)
    }

    /// Return `block` to the pool.
    ///
    /// In debug mode the block is vetted first (double free, then
    /// page/boundary membership, then padding corruption); a rejected free
    /// leaves the pool completely unchanged.
    ///
    /// # Safety
    /// `block` must have been returned by [`allocate`](Pool::allocate) on
    /// this pool and not freed since. In debug mode a wrong pointer is
    /// tolerated and rejected with an error as long as it is readable for
    /// the pool's object extent (the guard checks read the object region and
    /// its padding before deciding).
    pub unsafe fn free(&mut self, block: *mut u8) -> PoolResult<()> {
        if self.config.use_host_allocator {
            std::alloc::dealloc(block, self.host_object_layout);
            self.stats.note_deallocation();
            return Ok(());
        }

        if self.config.debug {
            if let Err(err) = self.vet_free(block) {
                warn!("free({:p}) rejected: {}", block, err);
                return Err(err);
            }
            guards::stamp_freed(&self.layout, block);
        }

        self.codec.mark_free(self.layout.header_of(block));
        self.free_list.push(block);
        self.stats.note_deallocation();
        self.stats.free_objects += 1;
        Ok(())
    }

    /// Invoke `callback(block, object_size)` for every block currently in
    /// use and return how many there were.
    pub fn dump_in_use<F>(&self, mut callback: F) -> usize
    where
        F: FnMut(*const u8, usize),
    {
        let mut count = 0;
        for page in self.pages.iter() {
            // SAFETY: `page` is live; blocks/headers derived from the layout
            // stay in bounds, and free-listed blocks are readable.
            unsafe {
                for (object, header) in self.layout.blocks(page) {
                    let in_use = match self.codec.is_in_use(header) {
                        Some(flag) => flag,
                        // Headerless pools: not on the free list means in use.
                        None => !self.free_list.contains(object),
                    };
                    if in_use {
                        callback(object, self.layout.object_size);
                        count += 1;
                    }
                }
            }
        }
        count
    }

    /// Invoke `callback(block, object_size)` for every block whose guard
    /// padding has been overwritten and return how many there were.
    /// Returns 0 when debug is off or the pool carries no padding.
    pub fn validate_pages<F>(&self, mut callback: F) -> usize
    where
        F: FnMut(*const u8, usize),
    {
        if !self.config.debug || self.layout.pad_bytes == 0 {
            return 0;
        }
        let mut corrupted = 0;
        for page in self.pages.iter() {
            // SAFETY: `page` is live and every pad region is in bounds.
            unsafe {
                for (object, _header) in self.layout.blocks(page) {
                    if guards::check_corruption(&self.layout, object).is_err() {
                        callback(object, self.layout.object_size);
                        corrupted += 1;
                    }
                }
            }
        }
        corrupted
    }

    /// Release every page whose blocks are all on the free list. Returns the
    /// number of pages released.
    pub fn free_empty_pages(&mut self) -> usize {
        if self.config.use_host_allocator {
            return 0;
        }

        // One walk of the free list counts the free blocks per page.
        let mut counts: Vec<(*mut u8, usize)> = self.pages.iter().map(|p| (p, 0)).collect();
        // SAFETY: listed blocks sit in live pages.
        unsafe {
            for block in self.free_list.iter() {
                if let Some(page) = self.pages.owning_page(block) {
                    if let Some(entry) = counts.iter_mut().find(|(p, _)| *p == page) {
                        entry.1 += 1;
                    }
                }
            }
        }

        let mut released = 0;
        for (page, free_count) in counts {
            if free_count != self.layout.objects_per_page {
                continue;
            }

            let base = page as usize;
            let page_size = self.layout.page_size;
            // SAFETY: the page is live; after the retain pass none of its
            // blocks remain reachable through the free list, and destroy()
            // drops any record a header slot still owns.
            unsafe {
                self.free_list
                    .retain(|block| !(base..base + page_size).contains(&(block as usize)));
                for (_object, header) in self.layout.blocks(page) {
                    self.codec.destroy(header);
                }
                self.pages.release_page(page);
            }
            self.stats.pages_in_use -= 1;
            self.stats.free_objects -= self.layout.objects_per_page;
            released += 1;
        }
        released
    }

    /// Toggle the debug instrumentation.
    ///
    /// Pattern guarantees only cover pages initialized while debug was on,
    /// so this is normally set once, before the first allocation.
    pub fn set_debug(&mut self, enabled: bool) {
        self.config.debug = enabled;
    }

    /// Head of the free list (diagnostics; null when empty).
    pub fn free_list(&self) -> *const u8 {
        self.free_list.head()
    }

    /// Head of the page list (diagnostics; null when no pages are live).
    pub fn page_list(&self) -> *const u8 {
        self.pages.head()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Acquire a page, stamp it, and push every block onto the free list in
    /// ascending address order (so blocks are first handed out descending).
    fn allocate_new_page(&mut self) -> PoolResult<()> {
        let page = self.pages.allocate_page()?;
        self.stats.pages_in_use += 1;
        self.stats.free_objects += self.layout.objects_per_page;

        // SAFETY: the page was just acquired with this layout's size; no
        // block in it is reachable yet.
        unsafe {
            if self.config.debug {
                guards::stamp_page(&self.layout, page);
            }
            for (object, header) in self.layout.blocks(page) {
                self.codec.init(header);
                self.free_list.push(object);
            }
        }
        debug!(
            "page {:p} initialized with {} blocks",
            page, self.layout.objects_per_page
        );
        Ok(())
    }

    /// The debug checks, in the order the free path runs them. Boundary
    /// membership is settled before the padding is probed: pad offsets are
    /// only meaningful relative to a real block start.
    fn vet_free(&self, block: *const u8) -> PoolResult<()> {
        // SAFETY: free()'s contract makes the object extent readable.
        unsafe {
            guards::check_double_free(&self.layout, &self.free_list, block)?;
        }
        guards::check_boundary(&self.pages, &self.layout, block)?;
        // SAFETY: the block start is now known to lie within a live page, so
        // its pad regions are in bounds.
        unsafe { guards::check_corruption(&self.layout, block) }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        // Destroy external records still held by in-use blocks before the
        // page store returns the pages themselves.
        if !self.config.use_host_allocator && self.codec.kind() == HeaderKind::External {
            // SAFETY: every page is live until PageStore::drop runs.
            unsafe {
                for page in self.pages.iter() {
                    for (_object, header) in self.layout.blocks(page) {
                        self.codec.destroy(header);
                    }
                }
            }
        }
    }
}
