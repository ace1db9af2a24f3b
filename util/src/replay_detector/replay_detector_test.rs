use super::*;

#[test]
fn test_sliding_window_detector_in_order() {
    let mut d = SlidingWindowDetector::new(64, (1 << 48) - 1);
    for seq in 0..100u64 {
        assert!(d.check(seq), "seq {seq} should be admitted");
        d.accept();
    }
    // Everything committed is now a replay.
    for seq in 40..100u64 {
        assert!(!d.check(seq), "seq {seq} should be rejected as replay");
    }
}

#[test]
fn test_sliding_window_detector_out_of_order_within_window() {
    let mut d = SlidingWindowDetector::new(64, (1 << 48) - 1);
    assert!(d.check(100));
    d.accept();

    // Out of order but inside the 64-slot window.
    for seq in [99u64, 98, 50, 37] {
        assert!(d.check(seq), "seq {seq} inside window");
        d.accept();
    }
    // Duplicate of an out-of-order admit.
    assert!(!d.check(98));
    // Below the window tail.
    assert!(!d.check(36));
    assert!(!d.check(0));
}

#[test]
fn test_sliding_window_detector_uncommitted_check_is_side_effect_free() {
    let mut d = SlidingWindowDetector::new(64, (1 << 48) - 1);
    assert!(d.check(10));
    // No accept: the same sequence must still be admissible.
    assert!(d.check(10));
    d.accept();
    assert!(!d.check(10));
}

#[test]
fn test_wrapped_detector_wraps() {
    let max = u16::MAX as u64;
    let mut d = WrappedSlidingWindowDetector::new(64, max);
    assert!(d.check(65500));
    d.accept();
    // Wrap past the maximum.
    assert!(d.check(3));
    d.accept();
    // The pre-wrap value is still within the window and not seen.
    assert!(d.check(65510));
    d.accept();
    // Replays on both sides of the wrap.
    assert!(!d.check(65500));
    assert!(!d.check(3));
}

#[test]
fn test_window_size_larger_than_word() {
    let mut d = SlidingWindowDetector::new(129, (1 << 48) - 1);
    assert!(d.check(200));
    d.accept();
    assert!(d.check(200 - 128), "within the 129-bit window");
    d.accept();
    assert!(!d.check(200 - 129), "outside the window tail");
}
