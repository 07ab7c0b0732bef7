//! Output identifiers: report ids, run ids and raw digests.
//! ASCII-only, strict shapes; no I/O.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Why an identifier string was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdError {
    NonAscii,
    BadShape,
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdError::NonAscii => f.write_str("identifier is not ASCII"),
            IdError::BadShape => f.write_str("identifier has the wrong shape"),
        }
    }
}

impl std::error::Error for IdError {}

const HEX64_LEN: usize = 64;
const TS_LEN: usize = 20;

/// Lowercase hex, exactly 64 chars.
pub fn is_valid_sha256(s: &str) -> bool {
    s.len() == HEX64_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Strict `YYYY-MM-DDTHH:MM:SSZ`.
pub fn is_rfc3339_utc(ts: &str) -> bool {
    let b = ts.as_bytes();
    if b.len() != TS_LEN {
        return false;
    }
    let digits = |r: core::ops::Range<usize>| b[r].iter().all(u8::is_ascii_digit);
    digits(0..4)
        && b[4] == b'-'
        && digits(5..7)
        && b[7] == b'-'
        && digits(8..10)
        && b[10] == b'T'
        && digits(11..13)
        && b[13] == b':'
        && digits(14..16)
        && b[16] == b':'
        && digits(17..19)
        && b[19] == b'Z'
}

macro_rules! output_id {
    ($(#[$m:meta])* $name:ident, $check:expr) => {
        $(#[$m])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str { &self.0 }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
        }

        impl FromStr for $name {
            type Err = IdError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if !s.is_ascii() { return Err(IdError::NonAscii); }
                let check: fn(&str) -> bool = $check;
                if !check(s) { return Err(IdError::BadShape); }
                Ok($name(s.to_owned()))
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;
            fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String { id.0 }
        }
    };
}

output_id!(
    /// Lowercase 64-hex SHA-256 digest.
    Sha256,
    is_valid_sha256
);

output_id!(
    /// `"RPT:" + 64-hex` over the canonical report bytes.
    ReportId,
    |s| s.len() == 4 + HEX64_LEN && s.starts_with("RPT:") && is_valid_sha256(&s[4..])
);

output_id!(
    /// `"RUN:" + YYYY-MM-DDTHH:MM:SSZ + "-" + 64-hex`.
    RunId,
    |s| {
        s.len() == 4 + TS_LEN + 1 + HEX64_LEN
            && s.starts_with("RUN:")
            && is_rfc3339_utc(&s[4..4 + TS_LEN])
            && s.as_bytes()[4 + TS_LEN] == b'-'
            && is_valid_sha256(&s[4 + TS_LEN + 1..])
    }
);

impl Sha256 {
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl ReportId {
    pub fn from_digest(d: &Sha256) -> Self {
        ReportId(format!("RPT:{}", d.as_hex()))
    }

    pub fn as_hex(&self) -> &str {
        &self.0[4..]
    }
}

impl RunId {
    /// Build from an already validated timestamp and digest.
    pub fn new(timestamp_utc: &str, d: &Sha256) -> Result<Self, IdError> {
        format!("RUN:{timestamp_utc}-{}", d.as_hex()).parse()
    }

    pub fn timestamp_utc(&self) -> &str {
        &self.0[4..4 + TS_LEN]
    }

    pub fn as_hex(&self) -> &str {
        &self.0[4 + TS_LEN + 1..]
    }
}
