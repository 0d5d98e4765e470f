//! # Serde module for HyperLogLog
//!
//! `HyperLogLog` is serialized through its [`HyperLogLogRecord`], a struct
//! with the fields `m`, `k`, `k_comp`, `alpha` and `registers`. All fields are
//! required. During deserialization the record is validated before the
//! estimator is rebuilt, so inconsistent input (e.g. `registers` length not
//! matching `m`) surfaces as a deserialization error instead of an estimator
//! with corrupt state.
//!
//! Refer to the serde documentation for more details on custom serialization and deserialization:
//! - [Serialization](https://serde.rs/impl-serialize.html)
//! - [Deserialization](https://serde.rs/impl-deserialize.html)
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::hyperloglog::HyperLogLog;
use crate::record::HyperLogLogRecord;

impl Serialize for HyperLogLog {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_record().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for HyperLogLog {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let record = HyperLogLogRecord::deserialize(deserializer)?;
        HyperLogLog::try_from(record).map_err(Error::custom)
    }
}
