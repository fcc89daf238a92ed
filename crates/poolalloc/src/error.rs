use thiserror::Error;

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors reported by the pool.
///
/// These are reported, not recovered: every error aborts the current
/// operation before any counter or list is mutated, so the pool's invariants
/// hold across a propagated error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The host allocator refused a request.
    #[error("out of memory: host allocator refused a request for {bytes} bytes")]
    NoMemory { bytes: usize },

    /// The configured page limit is reached and the free list is empty.
    #[error("out of pages: max_pages limit of {max_pages} reached")]
    NoPages { max_pages: usize },

    /// A freed pointer lies inside a page but not on a block boundary.
    #[error("bad boundary: {addr:#x} is inside a page but not at a block start")]
    BadBoundary { addr: usize },

    /// A freed pointer lies outside every live page.
    #[error("bad address: {addr:#x} is not inside any page owned by this pool")]
    BadAddress { addr: usize },

    /// A block was freed while already on the free list.
    #[error("multiple free: block {addr:#x} is already on the free list")]
    MultipleFree { addr: usize },

    /// A block's guard padding no longer holds the pad pattern.
    #[error("corrupted block: guard padding around {addr:#x} has been overwritten")]
    CorruptedBlock { addr: usize },

    /// The configuration was rejected at construction.
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: &'static str },
}
