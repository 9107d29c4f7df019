/// Genome build identifiers
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::LokiError;

/// A UCSC `hg` assembly number (hg18, hg19, hg38 ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Build(pub u32);

impl Build {
    pub fn new(hg: u32) -> Self {
        Self(hg)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Build {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hg{}", self.0)
    }
}

impl FromStr for Build {
    type Err = LokiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = match trimmed.get(..2) {
            Some(prefix) if prefix.eq_ignore_ascii_case("hg") => &trimmed[2..],
            _ => trimmed,
        };
        digits
            .parse::<u32>()
            .map(Build)
            .map_err(|_| LokiError::Parse(format!("Unrecognized genome build: {}", s)))
    }
}

#[cfg(feature = "sqlite")]
impl rusqlite::types::ToSql for Build {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        Ok(rusqlite::types::ToSqlOutput::from(self.0 as i64))
    }
}

#[cfg(feature = "sqlite")]
impl rusqlite::types::FromSql for Build {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        let hg = i64::column_result(value)?;
        u32::try_from(hg)
            .map(Build)
            .map_err(|_| rusqlite::types::FromSqlError::OutOfRange(hg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!("hg19".parse::<Build>().unwrap(), Build(19));
        assert_eq!("HG38".parse::<Build>().unwrap(), Build(38));
        assert_eq!("18".parse::<Build>().unwrap(), Build(18));
        assert!("grch37".parse::<Build>().is_err());
        assert_eq!(Build(19).to_string(), "hg19");
    }
}
