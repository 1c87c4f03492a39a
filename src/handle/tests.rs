use crate::{Placement, Shape, Strong};

// Small payloads; these tests exercise the counting protocol, not resident
// memory.
const LEN: usize = 4 * 1024;

const PLACEMENTS: [Placement; 2] = [Placement::Combined, Placement::Split];
const SHAPES: [Shape; 2] = [Shape::EmbeddedArray, Shape::BufferHandle];

#[test]
fn strong_count_starts_at_one() {
    for placement in PLACEMENTS {
        for shape in SHAPES {
            let strong = Strong::allocate(placement, shape, LEN).unwrap();
            assert_eq!(strong.strong_count(), 1);
            assert_eq!(strong.weak_count(), 0);
            assert_eq!(strong.payload_len(), Some(LEN));
        }
    }
}

#[test]
fn clone_increments_strong() {
    let strong = Strong::allocate(Placement::Combined, Shape::EmbeddedArray, LEN).unwrap();
    let other = strong.clone();
    assert_eq!(strong.strong_count(), 2);
    assert_eq!(other.strong_count(), 2);
    drop(other);
    assert_eq!(strong.strong_count(), 1);
}

#[test]
fn downgrade_increments_weak_only() {
    let strong = Strong::allocate(Placement::Split, Shape::BufferHandle, LEN).unwrap();
    let observer = strong.downgrade();
    assert_eq!(strong.strong_count(), 1);
    assert_eq!(strong.weak_count(), 1);
    assert_eq!(observer.weak_count(), 1);
    let other = observer.clone();
    assert_eq!(strong.weak_count(), 2);
    drop(other);
    assert_eq!(strong.weak_count(), 1);
}

#[test]
fn upgrade_while_live() {
    let strong = Strong::allocate(Placement::Combined, Shape::BufferHandle, LEN).unwrap();
    let observer = strong.downgrade();
    let upgraded = observer.upgrade().expect("upgrade of live payload failed");
    assert_eq!(upgraded.strong_count(), 2);
    drop(upgraded);
    assert_eq!(strong.strong_count(), 1);
}

#[test]
fn upgrade_after_last_strong_release() {
    for placement in PLACEMENTS {
        for shape in SHAPES {
            let mut strong = Strong::allocate(placement, shape, LEN).unwrap();
            let observer = strong.downgrade();
            strong.release();
            assert!(strong.is_released());
            assert!(!observer.is_live());
            assert!(observer.upgrade().is_none());
            // The observer still holds the control block.
            assert_eq!(observer.strong_count(), 0);
            assert_eq!(observer.weak_count(), 1);
        }
    }
}

#[test]
fn strong_release_is_idempotent() {
    let mut strong = Strong::allocate(Placement::Combined, Shape::EmbeddedArray, LEN).unwrap();
    let observer = strong.downgrade();
    strong.release();
    strong.release();
    strong.release();
    assert!(strong.is_released());
    assert_eq!(observer.strong_count(), 0);
    assert_eq!(observer.weak_count(), 1);
}

#[test]
fn observer_release_is_idempotent() {
    let strong = Strong::allocate(Placement::Split, Shape::EmbeddedArray, LEN).unwrap();
    let mut observer = strong.downgrade();
    observer.release();
    observer.release();
    assert!(observer.is_released());
    assert_eq!(strong.strong_count(), 1);
    assert_eq!(strong.weak_count(), 0);
}

#[test]
fn downgrade_of_released_strong_is_dead() {
    let mut strong = Strong::allocate(Placement::Combined, Shape::EmbeddedArray, LEN).unwrap();
    // Keep the block alive through another owner so the released handle's
    // downgrade is exercised in isolation.
    let keeper = strong.clone();
    strong.release();
    let observer = strong.downgrade();
    assert!(observer.is_released());
    assert!(observer.upgrade().is_none());
    assert_eq!(keeper.weak_count(), 0);
}

#[test]
fn clone_of_released_strong_is_released() {
    let mut strong = Strong::allocate(Placement::Split, Shape::BufferHandle, LEN).unwrap();
    let keeper = strong.clone();
    strong.release();
    let clone = strong.clone();
    assert!(clone.is_released());
    assert_eq!(keeper.strong_count(), 1);
}

#[test]
fn release_order_does_not_matter() {
    // Observer first, then strong: the block must go with the strong handle.
    for placement in PLACEMENTS {
        for shape in SHAPES {
            let mut strong = Strong::allocate(placement, shape, LEN).unwrap();
            let mut observer = strong.downgrade();
            observer.release();
            assert_eq!(strong.weak_count(), 0);
            strong.release();
            assert!(strong.is_released());
        }
    }
}

#[test]
fn drop_releases() {
    let strong = Strong::allocate(Placement::Combined, Shape::BufferHandle, LEN).unwrap();
    let observer = strong.downgrade();
    drop(strong);
    assert!(!observer.is_live());
    assert!(observer.upgrade().is_none());
}

#[test]
fn zero_length_payload() {
    for placement in PLACEMENTS {
        for shape in SHAPES {
            let mut strong = Strong::allocate(placement, shape, 0).unwrap();
            assert_eq!(strong.payload_len(), Some(0));
            let mut observer = strong.downgrade();
            strong.release();
            observer.release();
        }
    }
}
