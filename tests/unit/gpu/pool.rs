use super::*;

fn pool(max_pool_bytes: usize, max_per_bucket: usize) -> TexturePool {
    TexturePool::new(TexturePoolOpts {
        max_pool_bytes,
        max_per_bucket,
    })
}

#[test]
fn pool_honors_bucket_cap() {
    let mut p = pool(1 << 30, 1);
    let s = Size::new(8, 8);
    let a = p.take(s);
    let b = p.take(s);
    p.give_back(s, a);
    p.give_back(s, b);

    let st = p.stats();
    assert_eq!(st.retained_buffers, 1);
    assert_eq!(st.dropped_on_release, 1);
}

#[test]
fn pool_honors_global_byte_cap() {
    let s = Size::new(8, 8);
    let mut p = pool(s.rgba_len(), 8);
    let a = p.take(s);
    let b = p.take(s);
    p.give_back(s, a);
    p.give_back(s, b);

    let st = p.stats();
    assert_eq!(st.retained_bytes, s.rgba_len());
    assert_eq!(st.retained_buffers, 1);
    assert!(st.dropped_on_release >= 1);
}

#[test]
fn reused_buffers_come_back_zeroed() {
    let s = Size::new(2, 2);
    let mut p = pool(1 << 20, 4);
    let mut a = p.take(s);
    a.fill(0xAB);
    p.give_back(s, a);

    let b = p.take(s);
    assert_eq!(p.stats().reused, 1);
    assert!(b.iter().all(|&v| v == 0));
    assert_eq!(b.len(), s.rgba_len());
}

#[test]
fn buckets_are_per_size() {
    let mut p = pool(1 << 20, 4);
    let small = Size::new(2, 2);
    let big = Size::new(4, 4);
    let a = p.take(small);
    p.give_back(small, a);

    let b = p.take(big);
    assert_eq!(b.len(), big.rgba_len());
    assert_eq!(p.stats().reused, 0);
    assert_eq!(p.stats().retained_buffers, 1);
}
