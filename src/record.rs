//! # Serialized record for HyperLogLog
//!
//! `HyperLogLogRecord` is the external representation of a [`HyperLogLog`]
//! estimator, used for storage and transmission between workers. It carries
//! the derived parameters next to the registers so that the decoded estimator
//! reproduces `count()` bit for bit.
//!
//! Binary encoding (version 1, little-endian):
//! - 0..4      - magic bytes `HLL\0`
//! - 4         - format version
//! - 5..13     - `m: u64`, number of registers
//! - 13..21    - `k: f64`, precision
//! - 21..25    - `k_comp: i32`, rank bits
//! - 25..33    - `alpha: f64`, bias correction constant
//! - 33..41    - `len: u64`, number of register bytes that follow
//! - 41..      - `registers`, one byte per register

use std::io::Read;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use tracing::warn;

use crate::error::{Error, Result};
use crate::hyperloglog::{HyperLogLog, MAX_PRECISION, MIN_PRECISION};

const MAGIC: &[u8; 4] = b"HLL\0";
const VERSION: u8 = 1;
const HEADER_LEN: usize = 41;

/// Flat field-by-field representation of a HyperLogLog estimator
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "with_serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HyperLogLogRecord {
    pub m: u64,
    pub k: f64,
    pub k_comp: i32,
    pub alpha: f64,
    pub registers: Vec<u8>,
}

impl HyperLogLogRecord {
    /// Encode record into versioned binary format
    pub fn encode(&self) -> Vec<u8> {
        let mut header = [0u8; HEADER_LEN];
        header[..4].copy_from_slice(MAGIC);
        header[4] = VERSION;
        LittleEndian::write_u64(&mut header[5..13], self.m);
        LittleEndian::write_f64(&mut header[13..21], self.k);
        LittleEndian::write_i32(&mut header[21..25], self.k_comp);
        LittleEndian::write_f64(&mut header[25..33], self.alpha);
        LittleEndian::write_u64(&mut header[33..41], self.registers.len() as u64);

        let mut buf = Vec::with_capacity(HEADER_LEN + self.registers.len());
        buf.extend_from_slice(&header);
        buf.extend_from_slice(&self.registers);
        buf
    }

    /// Decode record from versioned binary format.
    ///
    /// Only the framing is checked here; parameter consistency is checked when
    /// converting the record into a [`HyperLogLog`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut rdr = bytes;

        let mut magic = [0u8; 4];
        rdr.read_exact(&mut magic).map_err(truncated)?;
        if &magic != MAGIC {
            return Err(malformed(format!("unexpected magic bytes {:?}", magic)));
        }
        let version = rdr.read_u8().map_err(truncated)?;
        if version != VERSION {
            return Err(malformed(format!("unsupported version {}", version)));
        }

        let m = rdr.read_u64::<LittleEndian>().map_err(truncated)?;
        let k = rdr.read_f64::<LittleEndian>().map_err(truncated)?;
        let k_comp = rdr.read_i32::<LittleEndian>().map_err(truncated)?;
        let alpha = rdr.read_f64::<LittleEndian>().map_err(truncated)?;
        let len = rdr.read_u64::<LittleEndian>().map_err(truncated)?;

        if len != rdr.len() as u64 {
            return Err(malformed(format!(
                "expected {} register bytes, found {}",
                len,
                rdr.len()
            )));
        }

        Ok(Self {
            m,
            k,
            k_comp,
            alpha,
            registers: rdr.to_vec(),
        })
    }
}

impl HyperLogLog {
    /// Return serialized record of the estimator
    pub fn to_record(&self) -> HyperLogLogRecord {
        HyperLogLogRecord {
            m: self.num_registers() as u64,
            k: f64::from(self.precision()),
            k_comp: self.k_comp() as i32,
            alpha: self.alpha(),
            registers: self.registers().to_vec(),
        }
    }

    /// Encode estimator into versioned binary format
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_record().encode()
    }

    /// Decode estimator from versioned binary format
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        HyperLogLogRecord::decode(bytes)?.try_into()
    }
}

impl TryFrom<HyperLogLogRecord> for HyperLogLog {
    type Error = Error;

    fn try_from(record: HyperLogLogRecord) -> Result<Self> {
        let HyperLogLogRecord {
            m,
            k,
            k_comp,
            alpha,
            registers,
        } = record;

        if registers.len() as u64 != m {
            return Err(malformed(format!(
                "m = {} but {} registers present",
                m,
                registers.len()
            )));
        }
        if !m.is_power_of_two() {
            return Err(malformed(format!("m = {} is not a power of two", m)));
        }
        let precision = m.trailing_zeros();
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
            return Err(malformed(format!("unsupported register count {}", m)));
        }
        if k != f64::from(precision) {
            return Err(malformed(format!("k = {} does not match m = {}", k, m)));
        }
        if i64::from(k_comp) != 32 - i64::from(precision) {
            return Err(malformed(format!("k_comp = {} does not match k = {}", k_comp, k)));
        }
        if !(alpha.is_finite() && alpha > 0.0) {
            return Err(malformed(format!("invalid alpha {}", alpha)));
        }
        let max_rank = k_comp + 1;
        if let Some(idx) = registers.iter().position(|&r| i32::from(r) > max_rank) {
            return Err(malformed(format!(
                "register {} holds rank {} above maximum {}",
                idx, registers[idx], max_rank
            )));
        }

        Ok(HyperLogLog::from_parts(precision, alpha, registers))
    }
}

fn malformed(msg: String) -> Error {
    warn!(reason = %msg, "rejecting malformed hyperloglog record");
    Error::MalformedRecord(msg)
}

fn truncated(err: std::io::Error) -> Error {
    malformed(format!("truncated record: {}", err))
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use test_case::test_case;

    fn estimator(n: usize) -> HyperLogLog {
        let mut hll = HyperLogLog::new(0.02).unwrap();
        (0..n).for_each(|i| hll.insert(&i));
        hll
    }

    #[test]
    fn test_to_record() {
        let hll = HyperLogLog::new(1.04 / 32.0).unwrap();
        let record = hll.to_record();
        assert_eq!(record.m, 1024);
        assert_eq!(record.k, 10.0);
        assert_eq!(record.k_comp, 22);
        assert_eq!(record.alpha, hll.alpha());
        assert_eq!(record.registers.len(), 1024);
    }

    #[test_case(0; "empty")]
    #[test_case(1; "single element")]
    #[test_case(100; "hundred elements")]
    #[test_case(100_000; "hundred thousand elements")]
    fn test_bytes_round_trip(n: usize) {
        let original = estimator(n);
        let bytes = original.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN + original.num_registers());

        let decoded = HyperLogLog::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.count(), original.count());
    }

    #[test]
    fn test_record_keeps_alpha() {
        // alpha is taken from the record, not recomputed
        let mut record = estimator(10).to_record();
        record.alpha = 0.5;
        let hll = HyperLogLog::try_from(record).unwrap();
        assert_eq!(hll.alpha(), 0.5);
    }

    #[test_case(|r| { r.registers.pop(); } ; "short registers")]
    #[test_case(|r| r.registers.push(0) ; "long registers")]
    #[test_case(|r| { r.m = 1000; r.registers.truncate(1000) } ; "m not power of two")]
    #[test_case(|r| { r.m = 1; r.registers.truncate(1) } ; "single register")]
    #[test_case(|r| r.k = 11.0 ; "k disagrees with m")]
    #[test_case(|r| r.k = 12.5 ; "fractional k")]
    #[test_case(|r| r.k_comp = 21 ; "k_comp disagrees with k")]
    #[test_case(|r| r.alpha = f64::NAN ; "nan alpha")]
    #[test_case(|r| r.alpha = -1.0 ; "negative alpha")]
    #[test_case(|r| r.registers[7] = 22 ; "rank above k_comp plus one")]
    fn test_malformed_record(corrupt: fn(&mut HyperLogLogRecord)) {
        let mut record = estimator(1000).to_record();
        corrupt(&mut record);
        let err = HyperLogLog::try_from(record).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)), "{:?}", err);
    }

    #[test]
    fn test_max_rank_accepted() {
        let mut record = estimator(0).to_record();
        record.registers[0] = 21;
        assert!(HyperLogLog::try_from(record).is_ok());
    }

    #[test_case(&[]; "empty input")]
    #[test_case(b"HLL"; "partial magic")]
    #[test_case(b"LLH\0\x01"; "wrong magic")]
    #[test_case(b"HLL\0\x02"; "unknown version")]
    #[test_case(b"HLL\0\x01\x00\x04"; "truncated header")]
    fn test_decode_invalid(bytes: &[u8]) {
        let err = HyperLogLogRecord::decode(bytes).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)), "{:?}", err);
    }

    #[test]
    fn test_decode_length_mismatch() {
        let bytes = estimator(10).to_bytes();
        assert!(HyperLogLog::from_bytes(&bytes[..bytes.len() - 1]).is_err());

        let mut longer = bytes.clone();
        longer.push(0);
        assert!(HyperLogLog::from_bytes(&longer).is_err());
    }

    #[test]
    fn test_decode_corrupt_parameters() {
        let mut bytes = estimator(10).to_bytes();
        // k_comp field
        LittleEndian::write_i32(&mut bytes[21..25], 3);
        let err = HyperLogLog::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)), "{:?}", err);
    }
}
