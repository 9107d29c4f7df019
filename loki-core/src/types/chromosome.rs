/// Chromosome codes as stored in the knowledge tables
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::LokiError;

/// Numeric chromosome code: 1-22 autosomes, then X, Y, XY (pseudoautosomal) and MT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Chromosome(u8);

impl Chromosome {
    pub const X: Self = Self(23);
    pub const Y: Self = Self(24);
    pub const XY: Self = Self(25);
    pub const MT: Self = Self(26);

    pub fn from_code(code: i64) -> Option<Self> {
        if (1..=26).contains(&code) {
            Some(Self(code as u8))
        } else {
            None
        }
    }

    pub fn code(&self) -> i64 {
        self.0 as i64
    }

    pub fn name(&self) -> String {
        match self.0 {
            23 => "X".to_string(),
            24 => "Y".to_string(),
            25 => "XY".to_string(),
            26 => "MT".to_string(),
            n => n.to_string(),
        }
    }

    /// All codes in storage order
    pub fn all() -> impl Iterator<Item = Chromosome> {
        (1..=26u8).map(Chromosome)
    }
}

impl FromStr for Chromosome {
    type Err = LokiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let bare = match trimmed.get(..3) {
            Some(prefix) if prefix.eq_ignore_ascii_case("chr") => &trimmed[3..],
            _ => trimmed,
        };
        match bare.to_ascii_uppercase().as_str() {
            "X" => Ok(Self::X),
            "Y" => Ok(Self::Y),
            "XY" => Ok(Self::XY),
            "M" | "MT" => Ok(Self::MT),
            other => other
                .parse::<i64>()
                .ok()
                .filter(|n| (1..=22).contains(n))
                .and_then(Self::from_code)
                .ok_or_else(|| LokiError::Parse(format!("Unrecognized chromosome: {}", s))),
        }
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chr{}", self.name())
    }
}

#[cfg(feature = "sqlite")]
impl rusqlite::types::ToSql for Chromosome {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        Ok(rusqlite::types::ToSqlOutput::from(self.code()))
    }
}

#[cfg(feature = "sqlite")]
impl rusqlite::types::FromSql for Chromosome {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        let code = i64::column_result(value)?;
        Chromosome::from_code(code).ok_or(rusqlite::types::FromSqlError::OutOfRange(code))
    }
}
