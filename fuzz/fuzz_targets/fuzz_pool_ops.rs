#![no_main]

use libfuzzer_sys::fuzz_target;
use poolalloc::{Config, HeaderKind, Pool};

/// Fuzz target that interprets a byte slice as a sequence of pool operations
/// against a debug-enabled pool.
///
/// Each operation is encoded as:
///   byte 0: opcode (0=allocate, 1=free, 2=free_empty_pages, 3=validate)
///   byte 1: slot index (which tracked pointer to operate on)
///
/// We track up to 32 live pointers and assert the pool's bookkeeping
/// invariants after every operation.
const MAX_SLOTS: usize = 32;
const OBJECTS_PER_PAGE: usize = 4;

fuzz_target!(|data: &[u8]| {
    let config = Config {
        debug: true,
        objects_per_page: OBJECTS_PER_PAGE,
        max_pages: 16,
        pad_bytes: 2,
        header_kind: HeaderKind::Basic,
        ..Config::default()
    };
    let mut pool = Pool::new(16, config).expect("fuzz config is valid");
    let mut slots: [*mut u8; MAX_SLOTS] = [std::ptr::null_mut(); MAX_SLOTS];

    let mut i = 0;
    while i + 2 <= data.len() {
        let opcode = data[i] & 0x03;
        let slot = (data[i + 1] as usize) % MAX_SLOTS;
        i += 2;

        match opcode {
            0 => {
                // allocate into an empty slot (may hit the page limit)
                if slots[slot].is_null() {
                    if let Ok(p) = pool.allocate(None) {
                        slots[slot] = p;
                        // Dirty the object region, but never the guard pads.
                        unsafe { std::ptr::write_bytes(p, 0x5A, 16) };
                    }
                }
            }
            1 => {
                // free a tracked pointer; a valid free must never fail
                if !slots[slot].is_null() {
                    unsafe { pool.free(slots[slot]).expect("valid free rejected") };
                    slots[slot] = std::ptr::null_mut();
                }
            }
            2 => {
                pool.free_empty_pages();
            }
            3 => {
                // No operation above scribbles outside its object region.
                assert_eq!(pool.validate_pages(|_, _| {}), 0, "padding corrupted");
            }
            _ => unreachable!(),
        }

        // Block conservation and the stats law hold after every operation.
        let stats = pool.stats();
        assert_eq!(
            stats.free_objects + stats.objects_in_use,
            stats.pages_in_use * OBJECTS_PER_PAGE,
            "block conservation violated"
        );
        assert_eq!(
            stats.allocations - stats.deallocations,
            stats.objects_in_use as u32,
            "stats law violated"
        );
        assert!(stats.most_objects >= stats.objects_in_use);
    }

    // Cleanup: return everything still live; the in-use count must drain to 0.
    for slot in &mut slots {
        if !slot.is_null() {
            unsafe { pool.free(*slot).expect("cleanup free rejected") };
            *slot = std::ptr::null_mut();
        }
    }
    assert_eq!(pool.stats().objects_in_use, 0);
});
