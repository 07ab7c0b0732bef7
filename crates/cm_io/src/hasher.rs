//! SHA-256 digests and output id builders.
//!
//! - `sha256_canonical` hashes JSON values/structs through canonical JSON.
//! - `sha256_hex` / `sha256_file` hash raw bytes (input tables are hashed as-is).
//! - `RPT:` ids hash the canonical report; `RUN:` ids hash the canonical run
//!   payload and carry a normalized RFC3339 UTC timestamp.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use cm_core::ids::{ReportId, RunId, Sha256 as Digest64};
use serde::Serialize;
use digest::Digest;
use sha2::Sha256;

use crate::canonical_json::to_canonical_bytes;
use crate::IoError;

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 over the canonical JSON bytes of `value`.
pub fn sha256_canonical<T: Serialize + ?Sized>(value: &T) -> Result<String, IoError> {
    Ok(sha256_hex(&to_canonical_bytes(value)?))
}

pub fn sha256_stream<R: Read>(reader: &mut R) -> Result<String, IoError> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf).map_err(|e| IoError::Hash(e.to_string()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn sha256_file(path: &Path) -> Result<String, IoError> {
    let f = File::open(path).map_err(|e| IoError::Read(format!("{} ({e})", path.display())))?;
    sha256_stream(&mut BufReader::new(f))
}

fn digest64(hex: String) -> Result<Digest64, IoError> {
    hex.parse().map_err(|_| IoError::Hash(format!("not a lowercase sha256: {hex}")))
}

/// `RPT:<hex>` over the canonical report.
pub fn report_id<T: Serialize + ?Sized>(report: &T) -> Result<ReportId, IoError> {
    Ok(ReportId::from_digest(&digest64(sha256_canonical(report)?)?))
}

/// `RUN:<YYYY-MM-DDTHH:MM:SSZ>-<hex>` over the canonical run payload.
pub fn run_id<T: Serialize + ?Sized>(timestamp_utc: &str, payload: &T) -> Result<RunId, IoError> {
    let ts = normalize_rfc3339_utc_seconds(timestamp_utc)?;
    let d = digest64(sha256_canonical(payload)?)?;
    RunId::new(&ts, &d).map_err(|e| IoError::Hash(e.to_string()))
}

/// Normalize to `YYYY-MM-DDTHH:MM:SSZ`. Accepts fractional seconds and a
/// `+00:00`/`-00:00` suffix; any other offset is rejected.
pub fn normalize_rfc3339_utc_seconds(ts: &str) -> Result<String, IoError> {
    let bad = || IoError::Hash(format!("invalid timestamp (expected RFC3339 UTC): {ts}"));
    let num = |r: core::ops::Range<usize>| -> Result<u32, IoError> {
        let s = ts.get(r).ok_or_else(bad)?;
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        s.parse::<u32>().map_err(|_| bad())
    };
    let sep = |i: usize, c: u8| ts.as_bytes().get(i) == Some(&c);

    let y = num(0..4)?;
    let m = num(5..7)?;
    let d = num(8..10)?;
    let hh = num(11..13)?;
    let mm = num(14..16)?;
    let ss = num(17..19)?;
    if !(sep(4, b'-') && sep(7, b'-') && sep(10, b'T') && sep(13, b':') && sep(16, b':')) {
        return Err(bad());
    }
    if !(1..=12).contains(&m) || !(1..=31).contains(&d) || hh > 23 || mm > 59 || ss > 60 {
        return Err(bad());
    }

    let mut idx = 19;
    if sep(idx, b'.') {
        idx += 1;
        let start = idx;
        while ts.as_bytes().get(idx).is_some_and(u8::is_ascii_digit) {
            idx += 1;
        }
        if idx == start || idx - start > 9 {
            return Err(bad());
        }
    }
    match ts.get(idx..) {
        Some("Z" | "+00:00" | "-00:00") => {}
        _ => return Err(bad()),
    }

    Ok(format!("{y:04}-{m:02}-{d:02}T{hh:02}:{mm:02}:{ss:02}Z"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_digest_is_lowercase_hex() {
        assert_eq!(sha256_hex(b"abc"), "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        let mut r: &[u8] = b"abc";
        assert_eq!(sha256_stream(&mut r).unwrap(), sha256_hex(b"abc"));
    }

    #[test]
    fn canonical_digest_ignores_key_order() {
        #[derive(Serialize)]
        struct T {
            b: u32,
            a: u32,
        }
        assert_eq!(sha256_canonical(&T { b: 2, a: 1 }).unwrap(), sha256_canonical(&json!({"a": 1, "b": 2})).unwrap());
    }

    #[test]
    fn ids_have_their_prefix() {
        let rpt = report_id(&json!({"entries": []})).unwrap();
        assert!(rpt.as_str().starts_with("RPT:"));
        let a = run_id("2025-08-12T10:00:00Z", &json!({"x": 1})).unwrap();
        let b = run_id("2025-08-12T10:00:00.250+00:00", &json!({"x": 1})).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.timestamp_utc(), "2025-08-12T10:00:00Z");
    }

    #[test]
    fn timestamps_must_be_utc() {
        assert!(normalize_rfc3339_utc_seconds("2025-08-12T10:00:00+02:00").is_err());
        assert!(normalize_rfc3339_utc_seconds("2025-13-12T10:00:00Z").is_err());
        assert!(normalize_rfc3339_utc_seconds("2025-08-12 10:00:00Z").is_err());
        assert!(normalize_rfc3339_utc_seconds("2025-08-12T10:00:00.Z").is_err());
    }
}
