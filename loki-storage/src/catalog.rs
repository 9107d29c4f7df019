//! Upserts and lookups for the small named catalogs (namespaces, types, roles ...)
//!
//! Every catalog entry is keyed by its lowercased name, so repeated adds from
//! different sources converge on the same id.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use loki_core::{
    Build, EntityTypeId, LdProfileId, NamespaceId, RelationshipId, RoleId, SourceId,
};
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, Clone, PartialEq)]
pub struct RoleSpec {
    pub name: String,
    pub description: Option<String>,
    pub coding: Option<bool>,
    pub exon: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LdProfileSpec {
    pub name: String,
    pub description: Option<String>,
    pub metric: Option<String>,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceInfo {
    pub id: NamespaceId,
    pub name: String,
    pub polygenic: bool,
}

/// One row of the `source` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub id: SourceId,
    pub name: String,
    pub updated: Option<String>,
    pub version: Option<String>,
    pub grch: Option<i64>,
    pub ucschg: Option<Build>,
    pub current_ucschg: Option<Build>,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

fn lookup_id(conn: &Connection, table: &str, column: &str, id_column: &str, name: &str) -> Result<Option<i64>> {
    let sql = format!("SELECT {} FROM \"{}\" WHERE {} = ?1", id_column, table, column);
    Ok(conn
        .query_row(&sql, params![normalize(name)], |row| row.get(0))
        .optional()?)
}

/// Insert-or-ignore each name, then read every id back
fn upsert_names<T: From<i64>>(
    conn: &Connection,
    table: &str,
    column: &str,
    id_column: &str,
    names: &[&str],
) -> Result<IndexMap<String, T>> {
    let mut insert = conn.prepare_cached(&format!(
        "INSERT OR IGNORE INTO \"{}\" ({}) VALUES (?1)",
        table, column
    ))?;
    for name in names {
        insert.execute(params![normalize(name)])?;
    }
    let mut ids = IndexMap::with_capacity(names.len());
    for name in names {
        let key = normalize(name);
        let id = lookup_id(conn, table, column, id_column, &key)?
            .with_context(|| format!("Failed to read back {} '{}'", column, key))?;
        ids.insert(key, T::from(id));
    }
    Ok(ids)
}

pub fn add_types(conn: &Connection, names: &[&str]) -> Result<IndexMap<String, EntityTypeId>> {
    upsert_names(conn, "type", "type", "type_id", names)
}

pub fn add_relationships(
    conn: &Connection,
    names: &[&str],
) -> Result<IndexMap<String, RelationshipId>> {
    upsert_names(conn, "relationship", "relationship", "relationship_id", names)
}

/// `(name, polygenic)` pairs; the first writer of a name decides its polygenic flag
pub fn add_namespaces(
    conn: &Connection,
    namespaces: &[(&str, bool)],
) -> Result<IndexMap<String, NamespaceId>> {
    {
        let mut insert = conn.prepare_cached(
            "INSERT OR IGNORE INTO namespace (namespace, polygenic) VALUES (?1, ?2)",
        )?;
        for (name, polygenic) in namespaces {
            insert.execute(params![normalize(name), *polygenic as i64])?;
        }
    }
    let names: Vec<&str> = namespaces.iter().map(|(name, _)| *name).collect();
    upsert_names(conn, "namespace", "namespace", "namespace_id", &names)
}

pub fn add_roles(conn: &Connection, roles: &[RoleSpec]) -> Result<IndexMap<String, RoleId>> {
    {
        let mut insert = conn.prepare_cached(
            "INSERT OR IGNORE INTO role (role, description, coding, exon) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for role in roles {
            insert.execute(params![
                normalize(&role.name),
                role.description,
                role.coding.map(i64::from),
                role.exon.map(i64::from)
            ])?;
        }
    }
    let names: Vec<&str> = roles.iter().map(|role| role.name.as_str()).collect();
    upsert_names(conn, "role", "role", "role_id", &names)
}

pub fn add_ld_profiles(
    conn: &Connection,
    profiles: &[LdProfileSpec],
) -> Result<IndexMap<String, LdProfileId>> {
    {
        let mut insert = conn.prepare_cached(
            "INSERT OR IGNORE INTO ldprofile (ldprofile, description, metric, value) \
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for profile in profiles {
            insert.execute(params![
                normalize(&profile.name),
                profile.description,
                profile.metric,
                profile.value
            ])?;
        }
    }
    let names: Vec<&str> = profiles.iter().map(|p| p.name.as_str()).collect();
    upsert_names(conn, "ldprofile", "ldprofile", "ldprofile_id", &names)
}

pub fn add_source(conn: &Connection, name: &str) -> Result<SourceId> {
    let ids = upsert_names::<SourceId>(conn, "source", "source", "source_id", &[name])?;
    ids.into_values()
        .next()
        .with_context(|| format!("Failed to register source '{}'", name))
}

pub fn namespace_id(conn: &Connection, name: &str) -> Result<Option<NamespaceId>> {
    Ok(lookup_id(conn, "namespace", "namespace", "namespace_id", name)?.map(NamespaceId))
}

pub fn type_id(conn: &Connection, name: &str) -> Result<Option<EntityTypeId>> {
    Ok(lookup_id(conn, "type", "type", "type_id", name)?.map(EntityTypeId))
}

pub fn role_id(conn: &Connection, name: &str) -> Result<Option<RoleId>> {
    Ok(lookup_id(conn, "role", "role", "role_id", name)?.map(RoleId))
}

pub fn relationship_id(conn: &Connection, name: &str) -> Result<Option<RelationshipId>> {
    Ok(lookup_id(conn, "relationship", "relationship", "relationship_id", name)?
        .map(RelationshipId))
}

pub fn ld_profile_id(conn: &Connection, name: &str) -> Result<Option<LdProfileId>> {
    Ok(lookup_id(conn, "ldprofile", "ldprofile", "ldprofile_id", name)?.map(LdProfileId))
}

pub fn source_id(conn: &Connection, name: &str) -> Result<Option<SourceId>> {
    Ok(lookup_id(conn, "source", "source", "source_id", name)?.map(SourceId))
}

pub fn namespaces(conn: &Connection) -> Result<Vec<NamespaceInfo>> {
    let mut stmt = conn.prepare(
        "SELECT namespace_id, namespace, polygenic FROM namespace ORDER BY namespace",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(NamespaceInfo {
            id: row.get(0)?,
            name: row.get(1)?,
            polygenic: row.get::<_, i64>(2)? != 0,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn sources(conn: &Connection) -> Result<Vec<SourceRecord>> {
    let mut stmt = conn.prepare(
        "SELECT source_id, source, updated, version, grch, ucschg, current_ucschg \
         FROM source ORDER BY source",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(SourceRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            updated: row.get(2)?,
            version: row.get(3)?,
            grch: row.get(4)?,
            ucschg: row.get(5)?,
            current_ucschg: row.get(6)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn source(conn: &Connection, name: &str) -> Result<Option<SourceRecord>> {
    let key = normalize(name);
    Ok(sources(conn)?.into_iter().find(|record| record.name == key))
}

/// `(grch, ucschg, current_ucschg)` as recorded for one source
pub fn source_builds(
    conn: &Connection,
    source: SourceId,
) -> Result<Option<(Option<i64>, Option<Build>, Option<Build>)>> {
    Ok(conn
        .query_row(
            "SELECT grch, ucschg, current_ucschg FROM source WHERE source_id = ?1",
            params![source],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?)
}
