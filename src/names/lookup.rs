/// Direct name lookup against stored names
///
/// The namespace token selects how a name is matched:
/// - `=`: the name is an internal numeric id
/// - `-`: the name is a canonical label
/// - empty or `*`: the name in any namespace
/// - anything else: the name within that namespace
use std::collections::BTreeSet;

use anyhow::Result;
use loki_core::EntityTypeId;
use loki_storage::rusqlite::{params, Connection, OptionalExtension};

/// Which entity family a lookup targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityFamily {
    Biopolymer,
    Group,
}

impl EntityFamily {
    fn entity_table(&self) -> &'static str {
        match self {
            EntityFamily::Biopolymer => "biopolymer",
            EntityFamily::Group => "\"group\"",
        }
    }

    fn name_table(&self) -> &'static str {
        match self {
            EntityFamily::Biopolymer => "biopolymer_name",
            EntityFamily::Group => "group_name",
        }
    }

    fn id_column(&self) -> &'static str {
        match self {
            EntityFamily::Biopolymer => "biopolymer_id",
            EntityFamily::Group => "group_id",
        }
    }
}

/// How to interpret a namespace token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameQuery {
    ById,
    ByLabel,
    AnyNamespace,
    Namespace(String),
}

impl NameQuery {
    pub fn from_token(token: &str) -> Self {
        match token.trim() {
            "=" => NameQuery::ById,
            "-" => NameQuery::ByLabel,
            "" | "*" => NameQuery::AnyNamespace,
            other => NameQuery::Namespace(other.to_lowercase()),
        }
    }
}

/// Accepted range of match counts; `max: None` is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchBounds {
    pub min: usize,
    pub max: Option<usize>,
}

impl MatchBounds {
    pub const EXACTLY_ONE: Self = Self {
        min: 1,
        max: Some(1),
    };

    pub const ANY: Self = Self { min: 0, max: None };

    pub fn new(min: usize, max: Option<usize>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }
}

impl Default for MatchBounds {
    fn default() -> Self {
        Self::EXACTLY_ONE
    }
}

/// Counts of inputs by how many entities they matched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupTally {
    pub zero: usize,
    pub one: usize,
    pub many: usize,
}

impl LookupTally {
    pub fn record(&mut self, matches: usize) {
        match matches {
            0 => self.zero += 1,
            1 => self.one += 1,
            _ => self.many += 1,
        }
    }
}

/// One input and the entity ids it matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatch {
    pub namespace: String,
    pub name: String,
    pub ids: Vec<i64>,
}

/// Input that fell outside the requested match bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupMiss<'a> {
    pub index: usize,
    pub namespace: &'a str,
    pub name: &'a str,
    pub matches: usize,
}

impl LookupMiss<'_> {
    pub fn describe(&self) -> String {
        match self.matches {
            0 => format!("no matches at index {}", self.index),
            1 => format!("1 match at index {}", self.index),
            n => format!("{} matches at index {}", n, self.index),
        }
    }
}

pub struct NameLookup<'a> {
    conn: &'a Connection,
    family: EntityFamily,
    entity_type: Option<EntityTypeId>,
}

impl<'a> NameLookup<'a> {
    pub fn biopolymers(conn: &'a Connection) -> Self {
        Self {
            conn,
            family: EntityFamily::Biopolymer,
            entity_type: None,
        }
    }

    pub fn groups(conn: &'a Connection) -> Self {
        Self {
            conn,
            family: EntityFamily::Group,
            entity_type: None,
        }
    }

    /// Restrict matches to one entity type
    pub fn of_type(mut self, entity_type: EntityTypeId) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    /// Distinct entity ids matching one `(namespace token, name)` pair
    pub fn lookup(&self, namespace: &str, name: &str) -> Result<Vec<i64>> {
        let entity = self.family.entity_table();
        let id = self.family.id_column();
        let type_id = self.entity_type.map(|t| t.value());
        let mut ids = BTreeSet::new();

        match NameQuery::from_token(namespace) {
            NameQuery::ById => {
                let Ok(wanted) = name.trim().parse::<i64>() else {
                    return Ok(Vec::new());
                };
                let sql = format!(
                    "SELECT {id} FROM {entity} WHERE {id} = ?1 AND (?2 IS NULL OR type_id = ?2)"
                );
                let found: Option<i64> = self
                    .conn
                    .query_row(&sql, params![wanted, type_id], |row| row.get(0))
                    .optional()?;
                ids.extend(found);
            }
            NameQuery::ByLabel => {
                let sql = format!(
                    "SELECT {id} FROM {entity} WHERE label = ?1 AND (?2 IS NULL OR type_id = ?2)"
                );
                let mut stmt = self.conn.prepare_cached(&sql)?;
                let rows = stmt.query_map(params![name, type_id], |row| row.get(0))?;
                for row in rows {
                    ids.insert(row?);
                }
            }
            query => {
                let namespace = match query {
                    NameQuery::Namespace(ns) => Some(ns),
                    _ => None,
                };
                let names = self.family.name_table();
                let sql = format!(
                    "SELECT DISTINCT e.{id} FROM {names} AS en \
                     JOIN namespace AS n ON n.namespace_id = en.namespace_id \
                     JOIN {entity} AS e ON e.{id} = en.{id} \
                     WHERE en.name = ?1 AND (?2 IS NULL OR n.namespace = ?2) \
                     AND (?3 IS NULL OR e.type_id = ?3)"
                );
                let mut stmt = self.conn.prepare_cached(&sql)?;
                let rows = stmt.query_map(params![name, namespace, type_id], |row| row.get(0))?;
                for row in rows {
                    ids.insert(row?);
                }
            }
        }
        Ok(ids.into_iter().collect())
    }

    /// Look up a batch of `(namespace token, name)` pairs
    ///
    /// Inputs whose match count falls outside `bounds` are reported through
    /// `on_miss` and left out of the result; the batch always completes.
    pub fn lookup_all<'q, I, F>(
        &self,
        queries: I,
        bounds: MatchBounds,
        mut on_miss: F,
    ) -> Result<(Vec<NameMatch>, LookupTally)>
    where
        I: IntoIterator<Item = (&'q str, &'q str)>,
        F: FnMut(LookupMiss<'q>),
    {
        let mut tally = LookupTally::default();
        let mut results = Vec::new();
        for (index, (namespace, name)) in queries.into_iter().enumerate() {
            let ids = self.lookup(namespace, name)?;
            tally.record(ids.len());
            if bounds.contains(ids.len()) {
                results.push(NameMatch {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    ids,
                });
            } else {
                on_miss(LookupMiss {
                    index,
                    namespace,
                    name,
                    matches: ids.len(),
                });
            }
        }
        Ok((results, tally))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceWriter;
    use crate::updater::TableTracker;
    use loki_storage::{catalog, KnowledgeDb, Schema};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn seeded() -> KnowledgeDb {
        let db = KnowledgeDb::open_in_memory(Schema::knowledge()).unwrap();
        {
            let conn = db.connection();
            let source = catalog::add_source(conn, "genes").unwrap();
            let mut tracker = TableTracker::new();
            let mut writer = SourceWriter::new(conn, db.schema(), &mut tracker, source, "genes");
            let types = writer.add_types(&["gene", "protein"]).unwrap();
            let ns = writer.add_namespaces(&[("symbol", false), ("entrez_gid", false)]).unwrap();
            let genes = writer
                .add_biopolymers(types["gene"], &[("A1BG", "alpha-1-B"), ("NAT2", "acetyltransferase")])
                .unwrap();
            let protein = writer
                .add_biopolymers(types["protein"], &[("NAT2", "protein form")])
                .unwrap();
            writer
                .add_biopolymer_names(ns["symbol"], &[(genes[0], "A1BG"), (genes[1], "NAT2"), (protein[0], "NAT2")])
                .unwrap();
            writer
                .add_biopolymer_names(ns["entrez_gid"], &[(genes[0], "1"), (genes[1], "10")])
                .unwrap();
        }
        db
    }

    #[test_case("=", "1", 1 ; "by id")]
    #[test_case("=", "abc", 0 ; "by non numeric id")]
    #[test_case("-", "NAT2", 2 ; "by label")]
    #[test_case("symbol", "NAT2", 2 ; "by namespace")]
    #[test_case("SYMBOL", "A1BG", 1 ; "namespace is case insensitive")]
    #[test_case("entrez_gid", "NAT2", 0 ; "wrong namespace")]
    #[test_case("*", "10", 1 ; "any namespace")]
    #[test_case("", "A1BG", 1 ; "empty namespace")]
    fn test_lookup(namespace: &str, name: &str, expected: usize) {
        let db = seeded();
        let ids = NameLookup::biopolymers(db.connection()).lookup(namespace, name).unwrap();
        assert_eq!(ids.len(), expected);
    }

    #[test]
    fn test_lookup_of_type() {
        let db = seeded();
        let gene = catalog::type_id(db.connection(), "gene").unwrap().unwrap();
        let ids = NameLookup::biopolymers(db.connection())
            .of_type(gene)
            .lookup("symbol", "NAT2")
            .unwrap();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_lookup_all_reports_out_of_bounds() {
        let db = seeded();
        let mut misses = Vec::new();
        let (matches, tally) = NameLookup::biopolymers(db.connection())
            .lookup_all(
                vec![("symbol", "A1BG"), ("symbol", "NAT2"), ("symbol", "BRCA1")],
                MatchBounds::EXACTLY_ONE,
                |miss| misses.push((miss.name.to_string(), miss.describe())),
            )
            .unwrap();

        assert_eq!(tally, LookupTally { zero: 1, one: 1, many: 1 });
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].ids, vec![1]);
        assert_eq!(
            misses,
            vec![
                ("NAT2".to_string(), "2 matches at index 1".to_string()),
                ("BRCA1".to_string(), "no matches at index 2".to_string()),
            ]
        );
    }

    #[test]
    fn test_bounds() {
        assert!(MatchBounds::ANY.contains(0));
        assert!(MatchBounds::new(1, None).contains(40));
        assert!(!MatchBounds::EXACTLY_ONE.contains(2));
    }
}
