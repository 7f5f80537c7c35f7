//! Wire representation for 64-bit values.
//!
//! The remote API sends ids and permission bitsets as decimal strings so
//! they survive clients with 53-bit numbers. Plain numbers are accepted too.

use serde::Deserialize;
use std::num::ParseIntError;

#[doc(hidden)]
#[derive(Deserialize)]
#[serde(untagged)]
pub enum U64Repr {
    Number(u64),
    Text(String),
}

impl U64Repr {
    pub fn into_u64(self) -> Result<u64, ParseIntError> {
        match self {
            Self::Number(n) => Ok(n),
            Self::Text(s) => s.trim().parse(),
        }
    }
}
