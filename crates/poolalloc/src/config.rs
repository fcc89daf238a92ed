/// Per-block header flavor.
///
/// The header is a small metadata region placed immediately before each
/// block's left padding. `Extended` is `Basic` plus a persistent use counter
/// and a caller-defined extra region; `External` stores only an owning
/// pointer to a heap-allocated [`BlockInfo`](crate::header::BlockInfo).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderKind {
    /// No per-block header.
    None,
    /// Allocation number (u32) + in-use flag byte.
    Basic,
    /// Caller extra bytes + use counter (u16) + the `Basic` fields.
    Extended,
    /// Pointer-width slot holding an owning `BlockInfo` pointer.
    External,
}

/// Pool configuration. Immutable after construction except for the `debug`
/// toggle, which [`Pool::set_debug`](crate::Pool::set_debug) flips.
#[derive(Clone, Debug)]
pub struct Config {
    /// Bypass the pool entirely and delegate every request to the host
    /// allocator.
    pub use_host_allocator: bool,
    /// Enable pattern stamping and the runtime guard checks.
    pub debug: bool,
    /// Number of blocks carved out of each page. Must be at least 1.
    pub objects_per_page: usize,
    /// Page limit; 0 means unbounded.
    pub max_pages: usize,
    /// Guard padding inserted on both sides of every object.
    pub pad_bytes: usize,
    /// Per-block header flavor.
    pub header_kind: HeaderKind,
    /// Extra caller bytes in an `Extended` header; ignored otherwise.
    pub header_extra_bytes: usize,
    /// Block alignment. 0 or 1 disables alignment; otherwise must be a
    /// power of two.
    pub alignment: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            use_host_allocator: false,
            debug: false,
            objects_per_page: 4,
            max_pages: 0,
            pad_bytes: 0,
            header_kind: HeaderKind::None,
            header_extra_bytes: 0,
            alignment: 0,
        }
    }
}
