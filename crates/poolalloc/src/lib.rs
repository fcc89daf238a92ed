//! Fixed-size object pool allocator.
//!
//! A [`Pool`] hands out and reclaims raw, uninitialized blocks of one
//! configured size from pool-owned pages, faster and with tighter control
//! than a general-purpose heap. An optional debug mode adds memory-safety
//! diagnostics: byte-pattern stamping plus detection of double frees,
//! out-of-bounds free pointers and guard-padding corruption.
//!
//! ```
//! use poolalloc::{Config, HeaderKind, Pool};
//!
//! let config = Config {
//!     debug: true,
//!     pad_bytes: 2,
//!     header_kind: HeaderKind::Basic,
//!     ..Config::default()
//! };
//! let mut pool = Pool::new(64, config)?;
//!
//! let block = pool.allocate(None)?;
//! assert_eq!(pool.stats().objects_in_use, 1);
//! unsafe { pool.free(block)? };
//! assert_eq!(pool.free_empty_pages(), 1);
//! # Ok::<(), poolalloc::PoolError>(())
//! ```

pub mod config;
pub mod error;
pub mod free_list;
pub mod guards;
pub mod header;
pub mod layout;
pub mod page;
pub mod pool;
pub mod stats;
pub mod util;

pub use config::{Config, HeaderKind};
pub use error::{PoolError, PoolResult};
pub use header::BlockInfo;
pub use pool::Pool;
pub use stats::Stats;
