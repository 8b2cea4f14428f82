//! Integration tests for the LRU replacer

use quarry::buffer::LruReplacer;
use quarry::common::FrameId;

fn f(id: u32) -> FrameId {
    FrameId::new(id)
}

#[test]
fn test_victim_is_least_recently_unpinned() {
    let replacer = LruReplacer::new(10);

    // All three frames were pinned before; unpin order decides eviction order
    replacer.unpin(f(0));
    replacer.unpin(f(1));
    replacer.unpin(f(2));

    assert_eq!(replacer.victim(), Some(f(0)));
    assert_eq!(replacer.victim(), Some(f(1)));
    assert_eq!(replacer.victim(), Some(f(2)));
    assert_eq!(replacer.victim(), None);
}

#[test]
fn test_pin_withdraws_candidate() {
    let replacer = LruReplacer::new(10);

    replacer.unpin(f(0));
    replacer.unpin(f(1));
    replacer.unpin(f(2));
    replacer.pin(f(1));

    assert_eq!(replacer.size(), 2);
    assert_eq!(replacer.victim(), Some(f(0)));
    assert_eq!(replacer.victim(), Some(f(2)));
}

#[test]
fn test_duplicate_unpin_keeps_position() {
    let replacer = LruReplacer::new(10);

    replacer.unpin(f(3));
    replacer.unpin(f(4));
    replacer.unpin(f(3));

    assert_eq!(replacer.size(), 2);
    assert_eq!(replacer.victim(), Some(f(3)));
}

#[test]
fn test_pin_then_unpin_moves_to_back() {
    let replacer = LruReplacer::new(10);

    replacer.unpin(f(0));
    replacer.unpin(f(1));

    // A fetch + release cycle makes frame 0 the most recently unpinned
    replacer.pin(f(0));
    replacer.unpin(f(0));

    assert_eq!(replacer.victim(), Some(f(1)));
    assert_eq!(replacer.victim(), Some(f(0)));
}

#[test]
fn test_pin_absent_and_victim_empty() {
    let replacer = LruReplacer::new(4);

    replacer.pin(f(9));
    assert_eq!(replacer.size(), 0);
    assert_eq!(replacer.victim(), None);
}
