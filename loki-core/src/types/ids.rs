/// Row identifiers for the knowledge tables
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[derive(Default)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "sqlite")]
        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.0))
            }
        }

        #[cfg(feature = "sqlite")]
        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

id_type!(
    /// Provenance tag carried by every stored row
    SourceId
);
id_type!(NamespaceId);
id_type!(
    /// Biopolymer type (`gene`, `protein`, ...); named to avoid `std::any::TypeId`
    EntityTypeId
);
id_type!(RoleId);
id_type!(LdProfileId);
id_type!(RelationshipId);
id_type!(BiopolymerId);
id_type!(GroupId);
id_type!(ChainId);

impl SourceId {
    /// Rows computed by the update cascade rather than written by a loader
    pub const DERIVED: Self = Self(0);

    pub fn is_derived(&self) -> bool {
        self.0 == 0
    }
}

impl NamespaceId {
    /// Wildcard used by translation and member hints: any namespace
    pub const ANY: Self = Self(0);
}

impl EntityTypeId {
    /// Wildcard used by translation and member hints: any type
    pub const ANY: Self = Self(0);
}

impl LdProfileId {
    /// The unnamed default profile
    pub const DEFAULT: Self = Self(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards() {
        assert_eq!(NamespaceId::ANY.value(), 0);
        assert_eq!(EntityTypeId::ANY, EntityTypeId::new(0));
        assert!(SourceId::DERIVED.is_derived());
        assert!(!SourceId::new(3).is_derived());
    }

    #[test]
    fn test_conversions() {
        let id: BiopolymerId = 42.into();
        assert_eq!(i64::from(id), 42);
        assert_eq!(id.to_string(), "42");
    }
}
