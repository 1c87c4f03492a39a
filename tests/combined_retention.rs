#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// The resident-set assertions depend on the global allocator servicing
// allocations of this size with `mmap` and returning them with `munmap`, so
// the block's lifetime is visible in RSS. glibc malloc is known to do this;
// other platforms get no assertion.
#![cfg(all(target_os = "linux", target_env = "gnu"))]

use weakhold::{sample, Placement, ProcStat, Shape, Strong};

const PAYLOAD_LEN: usize = 100 * 1024 * 1024;
const PAYLOAD_KB: f64 = 102_400.0;
// Slack for allocator and runtime noise when asserting "back to baseline".
const SLACK_KB: f64 = 16.0 * 1024.0;

#[test]
fn combined_allocation_retains_payload_until_observer_release() {
    env_logger::Builder::from_env("WEAKHOLD_LOG").init();

    let source = ProcStat;
    let baseline = sample(&source).unwrap();

    // Embedded payload: the observer retains the payload bytes.
    let mut strong = Strong::allocate(Placement::Combined, Shape::EmbeddedArray, PAYLOAD_LEN)
        .expect("payload allocation failed");
    let mut observer = strong.downgrade();

    let after_create = sample(&source).unwrap();
    assert!(
        after_create.rss_kb - baseline.rss_kb >= PAYLOAD_KB * 0.9,
        "payload not visible in RSS: baseline {} KB, after create {} KB",
        baseline.rss_kb,
        after_create.rss_kb
    );

    strong.release();
    let after_strong = sample(&source).unwrap();
    // The payload value is gone as far as reference counting is concerned,
    // but the bytes live inside the block the observer still holds.
    assert!(observer.upgrade().is_none());
    assert!(!observer.is_live());
    assert_eq!(observer.weak_count(), 1);
    assert!(
        after_strong.rss_kb - baseline.rss_kb >= PAYLOAD_KB * 0.9,
        "combined payload was released despite a live observer: baseline {} KB, after strong release {} KB",
        baseline.rss_kb,
        after_strong.rss_kb
    );

    observer.release();
    let after_observer = sample(&source).unwrap();
    assert!(
        after_observer.rss_kb - baseline.rss_kb <= SLACK_KB,
        "block not freed after last observer release: baseline {} KB, after observer release {} KB",
        baseline.rss_kb,
        after_observer.rss_kb
    );

    // Buffer-handle payload: even under combined placement the bulk of the
    // memory goes with the last strong release, because only the small handle
    // is embedded in the block. This is the divergence from the printed
    // expectation that the demonstration exists to show.
    let mut strong = Strong::allocate(Placement::Combined, Shape::BufferHandle, PAYLOAD_LEN)
        .expect("payload allocation failed");
    let mut observer = strong.downgrade();

    let after_create = sample(&source).unwrap();
    assert!(after_create.rss_kb - baseline.rss_kb >= PAYLOAD_KB * 0.9);

    strong.release();
    let after_strong = sample(&source).unwrap();
    assert!(
        after_strong.rss_kb - baseline.rss_kb <= SLACK_KB,
        "buffer-handle payload retained after strong release: baseline {} KB, after strong release {} KB",
        baseline.rss_kb,
        after_strong.rss_kb
    );

    observer.release();
    let after_observer = sample(&source).unwrap();
    assert!(after_observer.rss_kb - baseline.rss_kb <= SLACK_KB);
}
