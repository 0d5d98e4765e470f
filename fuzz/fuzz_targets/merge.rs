#![no_main]

use libfuzzer_sys::fuzz_target;
use streaming_estimators::{CountMinSketch, HyperLogLog};
use wyhash::wyhash;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let split_index = wyhash(data, 0) as usize % data.len();
    let (first_half, second_half) = data.split_at(split_index);

    let mut sketch1 = CountMinSketch::<u16>::new(64, 4).unwrap();
    let mut hll1 = HyperLogLog::new(0.05).unwrap();
    for chunk in first_half.chunks(4) {
        assert!(sketch1.increment(chunk) > 0);
        hll1.insert(chunk);
        assert!(hll1.count() > 0);
    }

    let mut sketch2 = CountMinSketch::<u16>::new(64, 4).unwrap();
    let mut hll2 = HyperLogLog::new(0.05).unwrap();
    for chunk in second_half.chunks(4) {
        assert!(sketch2.conservative_increment(chunk) > 0);
        hll2.insert(chunk);
    }

    let mut merged = sketch1.clone();
    merged.merge(&sketch2).unwrap();
    for chunk in data.chunks(4) {
        assert!(merged.count(chunk) >= sketch1.count(chunk));
        assert!(merged.count_mean_min(chunk) <= merged.count(chunk));
    }

    let before = hll1.registers().to_vec();
    hll1.merge(&hll2).unwrap();
    assert!(hll1.registers().iter().zip(&before).all(|(now, was)| now >= was));
    assert!(hll1.registers().iter().zip(hll2.registers()).all(|(now, rhs)| now >= rhs));
});
