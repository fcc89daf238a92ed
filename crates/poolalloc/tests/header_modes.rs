//! Behavior of the four header flavors: allocation numbering, the in-use
//! flag, the persistent use counter, external records, and the headerless
//! free-list fallback.

use poolalloc::{Config, HeaderKind, Pool};

const PAD: usize = 2;

fn config(kind: HeaderKind, extra: usize) -> Config {
    Config {
        debug: true,
        objects_per_page: 4,
        pad_bytes: PAD,
        header_kind: kind,
        header_extra_bytes: extra,
        ..Config::default()
    }
}

unsafe fn read_u32_le(ptr: *const u8) -> u32 {
    let mut bytes = [0u8; 4];
    core::ptr::copy_nonoverlapping(ptr, bytes.as_mut_ptr(), 4);
    u32::from_le_bytes(bytes)
}

unsafe fn read_u16_le(ptr: *const u8) -> u16 {
    let mut bytes = [0u8; 2];
    core::ptr::copy_nonoverlapping(ptr, bytes.as_mut_ptr(), 2);
    u16::from_le_bytes(bytes)
}

// ---------------------------------------------------------------------------
// Basic headers
// ---------------------------------------------------------------------------

#[test]
fn basic_header_records_allocation_numbers() {
    let mut pool = Pool::new(16, config(HeaderKind::Basic, 0)).unwrap();

    for expected in 1u32..=3 {
        let p = pool.allocate(None).unwrap();
        unsafe {
            let header = p.sub(PAD + 5);
            assert_eq!(read_u32_le(header), expected);
            assert_eq!(header.add(4).read(), 1, "in-use flag set");
        }
    }
}

#[test]
fn basic_flag_mirrors_free_list_membership() {
    let mut pool = Pool::new(16, config(HeaderKind::Basic, 0)).unwrap();
    let p = pool.allocate(None).unwrap();
    let header = unsafe { p.sub(PAD + 5) };

    unsafe {
        assert_eq!(header.add(4).read(), 1);
        pool.free(p).unwrap();
        // Freed: the whole basic header is zeroed again.
        assert_eq!(read_u32_le(header), 0);
        assert_eq!(header.add(4).read(), 0);
        assert_eq!(pool.free_list(), p as *const u8);
    }
}

#[test]
fn dump_in_use_reports_flagged_blocks() {
    let mut pool = Pool::new(16, config(HeaderKind::Basic, 0)).unwrap();
    let a = pool.allocate(None).unwrap();
    let b = pool.allocate(None).unwrap();
    unsafe { pool.free(a).unwrap() };

    let mut seen = Vec::new();
    let count = pool.dump_in_use(|block, size| {
        assert_eq!(size, 16);
        seen.push(block);
    });
    assert_eq!(count, 1);
    assert_eq!(seen, vec![b as *const u8]);
}

// ---------------------------------------------------------------------------
// Extended headers
// ---------------------------------------------------------------------------

#[test]
fn extended_use_counter_survives_recycling() {
    const EXTRA: usize = 4;
    let mut pool = Pool::new(16, config(HeaderKind::Extended, EXTRA)).unwrap();

    // LIFO recycling hands the same block back each round.
    let p = pool.allocate(None).unwrap();
    let counter = unsafe { p.sub(PAD + 5 + 2 + EXTRA).add(EXTRA) };
    assert_eq!(unsafe { read_u16_le(counter) }, 1);

    for round in 2u16..=4 {
        unsafe { pool.free(p).unwrap() };
        let again = pool.allocate(None).unwrap();
        assert_eq!(again, p);
        assert_eq!(unsafe { read_u16_le(counter) }, round);
    }
}

#[test]
fn extended_user_region_starts_cleared() {
    const EXTRA: usize = 6;
    let mut pool = Pool::new(16, config(HeaderKind::Extended, EXTRA)).unwrap();

    let p = pool.allocate(None).unwrap();
    let header = unsafe { p.sub(PAD + 5 + 2 + EXTRA) };
    unsafe {
        for i in 0..EXTRA {
            assert_eq!(header.add(i).read(), 0);
        }
        // Scribble into the user region, recycle, and expect it cleared.
        header.write_bytes(0x7E, EXTRA);
        pool.free(p).unwrap();
        let again = pool.allocate(None).unwrap();
        assert_eq!(again, p);
        for i in 0..EXTRA {
            assert_eq!(header.add(i).read(), 0);
        }
    }
}

#[test]
fn extended_allocation_number_sits_past_the_counter() {
    const EXTRA: usize = 4;
    let mut pool = Pool::new(16, config(HeaderKind::Extended, EXTRA)).unwrap();
    let p = pool.allocate(None).unwrap();
    pool.allocate(None).unwrap();

    unsafe {
        let header = p.sub(PAD + 5 + 2 + EXTRA);
        assert_eq!(read_u32_le(header.add(EXTRA + 2)), 1);
        assert_eq!(header.add(EXTRA + 2 + 4).read(), 1);
    }
}

// ---------------------------------------------------------------------------
// External headers
// ---------------------------------------------------------------------------

#[test]
fn external_blocks_show_up_in_dump_until_freed() {
    let mut pool = Pool::new(16, config(HeaderKind::External, 0)).unwrap();

    let p = pool.allocate(Some("foo")).unwrap();
    assert_eq!(pool.dump_in_use(|_, _| {}), 1);

    unsafe { pool.free(p).unwrap() };
    assert_eq!(pool.dump_in_use(|_, _| {}), 0);
}

#[test]
fn external_records_die_with_the_pool() {
    // Blocks left in use at drop still own their records; Drop must release
    // them (observable under a leak checker).
    let mut pool = Pool::new(16, config(HeaderKind::External, 0)).unwrap();
    pool.allocate(Some("left-in-use")).unwrap();
    pool.allocate(None).unwrap();
    drop(pool);
}

#[test]
fn external_page_reclamation_handles_freed_records() {
    let mut pool = Pool::new(16, config(HeaderKind::External, 0)).unwrap();
    let blocks: Vec<*mut u8> = (0..4)
        .map(|i| pool.allocate(Some(&format!("block-{}", i))).unwrap())
        .collect();
    for p in blocks {
        unsafe { pool.free(p).unwrap() };
    }
    assert_eq!(pool.free_empty_pages(), 1);
    assert_eq!(pool.stats().pages_in_use, 0);
}

// ---------------------------------------------------------------------------
// Headerless pools
// ---------------------------------------------------------------------------

#[test]
fn headerless_dump_falls_back_to_the_free_list() {
    let mut pool = Pool::new(16, config(HeaderKind::None, 0)).unwrap();
    let a = pool.allocate(None).unwrap();
    let b = pool.allocate(None).unwrap();
    let _c = pool.allocate(None).unwrap();
    unsafe { pool.free(b).unwrap() };

    let mut seen = Vec::new();
    let count = pool.dump_in_use(|block, _| seen.push(block));
    assert_eq!(count, 2);
    assert!(seen.contains(&(a as *const u8)));
    assert!(!seen.contains(&(b as *const u8)));
}
