#![no_main]

use libfuzzer_sys::fuzz_target;
use streaming_estimators::HyperLogLog;

fuzz_target!(|data: &[u8]| {
    if let Ok(mut estimator) = HyperLogLog::from_bytes(data) {
        estimator.insert(&1);
        estimator.count();
        assert_eq!(HyperLogLog::from_bytes(&estimator.to_bytes()), Ok(estimator));
    }
    if let Ok(mut estimator) = serde_json::from_slice::<HyperLogLog>(data) {
        estimator.insert(&1);
        let json = serde_json::to_string(&estimator).unwrap();
        assert_eq!(serde_json::from_str::<HyperLogLog>(&json).unwrap(), estimator);
    }
});
