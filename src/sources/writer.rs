/// Table-write operations available to source loaders
///
/// A `SourceWriter` is bound to one source's provenance id and to the
/// transaction scope the update run opened for that source. Every insert is
/// `INSERT OR IGNORE`, so re-adding an existing row is a no-op.
use anyhow::{Context, Result};
use indexmap::IndexMap;
use loki_core::{
    BiopolymerId, Build, ChainId, EntityTypeId, GroupId, LdProfileId, NamespaceId,
    RelationshipId, RoleId, Rs, SourceId,
};
use loki_storage::rusqlite::{params, Connection};
use loki_storage::{catalog, settings, LdProfileSpec, RoleSpec, Schema, Table};
use tracing::debug;

use super::records::{
    ChainRecord, GroupMemberHint, GroupRelationship, GwasAnnotation, NameTranslation,
    RegionRecord, SnpLocus,
};
use crate::liftover::ChainSegment;
use crate::updater::TableTracker;

pub struct SourceWriter<'a> {
    conn: &'a Connection,
    schema: &'a Schema,
    tables: &'a mut TableTracker,
    source_id: SourceId,
    source_name: String,
}

impl<'a> SourceWriter<'a> {
    pub fn new(
        conn: &'a Connection,
        schema: &'a Schema,
        tables: &'a mut TableTracker,
        source_id: SourceId,
        source_name: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            schema,
            tables,
            source_id,
            source_name: source_name.into(),
        }
    }

    pub fn source_id(&self) -> SourceId {
        self.source_id
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Read access for loaders that need to look things up while writing
    pub fn connection(&self) -> &Connection {
        self.conn
    }

    fn prepare(&mut self, table: Table) -> Result<()> {
        self.tables.prepare_for_update(self.conn, self.schema, table)
    }

    fn log_added(&self, what: &str, added: usize, offered: usize) {
        debug!(
            "{}: added {} of {} {}",
            self.source_name, added, offered, what
        );
    }

    /// Delete every row this source wrote, across all provenance tables
    pub fn delete_all(&mut self) -> Result<usize> {
        let tables: Vec<Table> = self.schema.provenance_tables().map(|def| def.table).collect();
        self.delete_from(&tables)
    }

    /// Delete this source's rows from the given tables only
    pub fn delete_from(&mut self, tables: &[Table]) -> Result<usize> {
        let mut total = 0;
        for table in tables {
            let deleted = self
                .conn
                .execute(
                    &format!("DELETE FROM {} WHERE source_id = ?1", table.ident()),
                    params![self.source_id],
                )
                .with_context(|| format!("Failed to delete old rows from '{}'", table))?;
            if deleted > 0 {
                self.tables.flag_updated(*table);
                total += deleted;
            }
        }
        debug!("{}: deleted {} old rows", self.source_name, total);
        Ok(total)
    }

    pub fn add_namespaces(&mut self, namespaces: &[(&str, bool)]) -> Result<IndexMap<String, NamespaceId>> {
        catalog::add_namespaces(self.conn, namespaces)
    }

    pub fn add_types(&mut self, names: &[&str]) -> Result<IndexMap<String, EntityTypeId>> {
        catalog::add_types(self.conn, names)
    }

    pub fn add_roles(&mut self, roles: &[RoleSpec]) -> Result<IndexMap<String, RoleId>> {
        catalog::add_roles(self.conn, roles)
    }

    pub fn add_relationships(&mut self, names: &[&str]) -> Result<IndexMap<String, RelationshipId>> {
        catalog::add_relationships(self.conn, names)
    }

    pub fn add_ld_profiles(&mut self, profiles: &[LdProfileSpec]) -> Result<IndexMap<String, LdProfileId>> {
        catalog::add_ld_profiles(self.conn, profiles)
    }

    /// Record the genome build this source's coordinates are in
    pub fn set_source_builds(&mut self, grch: Option<i64>, ucschg: Option<Build>) -> Result<()> {
        self.conn.execute(
            "UPDATE source SET grch = ?1, ucschg = ?2, current_ucschg = ?2 WHERE source_id = ?3",
            params![grch, ucschg, self.source_id],
        )?;
        Ok(())
    }

    /// Change the zone tile size; forces a zone rebuild
    pub fn set_zone_size(&mut self, size: i64) -> Result<()> {
        settings::set(self.conn, settings::ZONE_SIZE, &size.to_string())?;
        self.tables.flag_updated(Table::BiopolymerRegion);
        Ok(())
    }

    pub fn add_warning(&mut self, warning: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO warning (source_id, warning) VALUES (?1, ?2)",
            params![self.source_id, warning],
        )?;
        Ok(())
    }

    pub fn add_snp_merges(&mut self, merges: &[(Rs, Rs)]) -> Result<usize> {
        self.prepare(Table::SnpMerge)?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO snp_merge (rs_merged, rs_current, source_id) VALUES (?1, ?2, ?3)",
        )?;
        let mut added = 0;
        for (merged, current) in merges {
            added += stmt.execute(params![merged, current, self.source_id])?;
        }
        self.log_added("SNP merges", added, merges.len());
        Ok(added)
    }

    pub fn add_snp_loci(&mut self, loci: &[SnpLocus]) -> Result<usize> {
        self.prepare(Table::SnpLocus)?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO snp_locus (rs, chr, pos, validated, source_id) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        let mut added = 0;
        for locus in loci {
            added += stmt.execute(params![
                locus.rs,
                locus.chr,
                locus.pos,
                locus.validated as i64,
                self.source_id
            ])?;
        }
        self.log_added("SNP loci", added, loci.len());
        Ok(added)
    }

    /// `(rs, entrez gene id, role)` links, resolved to biopolymers after the run
    pub fn add_snp_entrez_roles(&mut self, roles: &[(Rs, i64, RoleId)]) -> Result<usize> {
        self.prepare(Table::SnpEntrezRole)?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO snp_entrez_role (rs, entrez_id, role_id, source_id) VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut added = 0;
        for (rs, entrez, role) in roles {
            added += stmt.execute(params![rs, entrez, role, self.source_id])?;
        }
        self.log_added("SNP roles", added, roles.len());
        Ok(added)
    }

    /// Add biopolymers of one type; ids come back in input order
    pub fn add_biopolymers(
        &mut self,
        entity_type: EntityTypeId,
        entities: &[(&str, &str)],
    ) -> Result<Vec<BiopolymerId>> {
        let typed: Vec<_> = entities
            .iter()
            .map(|(label, description)| (entity_type, *label, *description))
            .collect();
        self.add_typed_biopolymers(&typed)
    }

    pub fn add_typed_biopolymers(
        &mut self,
        entities: &[(EntityTypeId, &str, &str)],
    ) -> Result<Vec<BiopolymerId>> {
        self.prepare(Table::Biopolymer)?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO biopolymer (type_id, label, description, source_id) VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut ids = Vec::with_capacity(entities.len());
        for (entity_type, label, description) in entities {
            stmt.execute(params![entity_type, label, description, self.source_id])?;
            ids.push(BiopolymerId(self.conn.last_insert_rowid()));
        }
        self.log_added("biopolymers", ids.len(), entities.len());
        Ok(ids)
    }

    pub fn add_biopolymer_names(
        &mut self,
        namespace: NamespaceId,
        names: &[(BiopolymerId, &str)],
    ) -> Result<usize> {
        let namespaced: Vec<_> = names
            .iter()
            .map(|(biopolymer, name)| (*biopolymer, namespace, *name))
            .collect();
        self.add_namespaced_biopolymer_names(&namespaced)
    }

    pub fn add_namespaced_biopolymer_names(
        &mut self,
        names: &[(BiopolymerId, NamespaceId, &str)],
    ) -> Result<usize> {
        self.prepare(Table::BiopolymerName)?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO biopolymer_name (biopolymer_id, namespace_id, name, source_id) VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut added = 0;
        for (biopolymer, namespace, name) in names {
            added += stmt.execute(params![biopolymer, namespace, name, self.source_id])?;
        }
        self.log_added("biopolymer names", added, names.len());
        Ok(added)
    }

    pub fn add_name_translations(&mut self, translations: &[NameTranslation]) -> Result<usize> {
        self.prepare(Table::BiopolymerNameName)?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO biopolymer_name_name \
             (namespace_id, name, type_id, new_namespace_id, new_name, source_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        let mut added = 0;
        for t in translations {
            added += stmt.execute(params![
                t.namespace,
                t.name,
                t.entity_type,
                t.new_namespace,
                t.new_name,
                self.source_id
            ])?;
        }
        self.log_added("name translations", added, translations.len());
        Ok(added)
    }

    pub fn add_biopolymer_regions(&mut self, regions: &[RegionRecord]) -> Result<usize> {
        self.prepare(Table::BiopolymerRegion)?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO biopolymer_region \
             (biopolymer_id, ldprofile_id, chr, pos_min, pos_max, source_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        let mut added = 0;
        for region in regions {
            added += stmt.execute(params![
                region.biopolymer,
                region.ld_profile,
                region.chr,
                region.pos_min,
                region.pos_max,
                self.source_id
            ])?;
        }
        self.log_added("regions", added, regions.len());
        Ok(added)
    }

    pub fn add_groups(
        &mut self,
        group_type: EntityTypeId,
        groups: &[(&str, &str)],
    ) -> Result<Vec<GroupId>> {
        self.prepare(Table::Group)?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO \"group\" (type_id, label, description, source_id) VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut ids = Vec::with_capacity(groups.len());
        for (label, description) in groups {
            stmt.execute(params![group_type, label, description, self.source_id])?;
            ids.push(GroupId(self.conn.last_insert_rowid()));
        }
        self.log_added("groups", ids.len(), groups.len());
        Ok(ids)
    }

    pub fn add_group_names(
        &mut self,
        namespace: NamespaceId,
        names: &[(GroupId, &str)],
    ) -> Result<usize> {
        self.prepare(Table::GroupName)?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO group_name (group_id, namespace_id, name, source_id) VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut added = 0;
        for (group, name) in names {
            added += stmt.execute(params![group, namespace, name, self.source_id])?;
        }
        self.log_added("group names", added, names.len());
        Ok(added)
    }

    /// Each relationship is stored in both directions with mirrored containment
    pub fn add_group_relationships(&mut self, relationships: &[GroupRelationship]) -> Result<usize> {
        self.prepare(Table::GroupGroup)?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO group_group \
             (group_id, related_group_id, relationship_id, direction, contains, source_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        let mut added = 0;
        for rel in relationships {
            let (forward, reverse) = rel.containment.polarity();
            added += stmt.execute(params![
                rel.group,
                rel.related,
                rel.relationship,
                1,
                forward,
                self.source_id
            ])?;
            added += stmt.execute(params![
                rel.related,
                rel.group,
                rel.relationship,
                -1,
                reverse,
                self.source_id
            ])?;
        }
        self.log_added("group relationship rows", added, relationships.len() * 2);
        Ok(added)
    }

    /// Explicit memberships, stored with full confidence
    pub fn add_group_biopolymers(&mut self, links: &[(GroupId, BiopolymerId)]) -> Result<usize> {
        self.prepare(Table::GroupBiopolymer)?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO group_biopolymer \
             (group_id, biopolymer_id, specificity, implication, quality, source_id) \
             VALUES (?1, ?2, 100, 100, 100, ?3)",
        )?;
        let mut added = 0;
        for (group, biopolymer) in links {
            added += stmt.execute(params![group, biopolymer, self.source_id])?;
        }
        self.log_added("group memberships", added, links.len());
        Ok(added)
    }

    pub fn add_group_member_names(&mut self, hints: &[GroupMemberHint]) -> Result<usize> {
        self.prepare(Table::GroupMemberName)?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO group_member_name \
             (group_id, member, type_id, namespace_id, name, source_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        let mut added = 0;
        for hint in hints {
            added += stmt.execute(params![
                hint.group,
                hint.member,
                hint.entity_type,
                hint.namespace,
                hint.name,
                self.source_id
            ])?;
        }
        self.log_added("group member names", added, hints.len());
        Ok(added)
    }

    pub fn add_gwas_annotations(&mut self, annotations: &[GwasAnnotation]) -> Result<usize> {
        self.prepare(Table::Gwas)?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO gwas \
             (rs, chr, pos, trait, snps, orbeta, allele95ci, risk_afreq, pubmed_id, source_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        let mut added = 0;
        for a in annotations {
            added += stmt.execute(params![
                a.rs,
                a.chr,
                a.pos,
                a.trait_name,
                a.snps,
                a.orbeta,
                a.allele95ci,
                a.risk_afreq,
                a.pubmed_id,
                self.source_id
            ])?;
        }
        self.log_added("GWAS annotations", added, annotations.len());
        Ok(added)
    }

    /// Add chain headers for one build pair; ids come back in input order
    pub fn add_chains(
        &mut self,
        old_build: Build,
        new_build: Build,
        chains: &[ChainRecord],
    ) -> Result<Vec<ChainId>> {
        self.prepare(Table::Chain)?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO chain \
             (old_ucschg, old_chr, old_start, old_end, new_ucschg, new_chr, new_start, new_end, score, is_fwd, source_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;
        let mut ids = Vec::with_capacity(chains.len());
        for c in chains {
            stmt.execute(params![
                old_build,
                c.old_chr,
                c.old_start,
                c.old_end,
                new_build,
                c.new_chr,
                c.new_start,
                c.new_end,
                c.score,
                c.is_forward as i64,
                self.source_id
            ])?;
            ids.push(ChainId(self.conn.last_insert_rowid()));
        }
        self.log_added("chains", ids.len(), chains.len());
        Ok(ids)
    }

    pub fn add_chain_segments(&mut self, segments: &[(ChainId, ChainSegment)]) -> Result<usize> {
        self.prepare(Table::ChainData)?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO chain_data (chain_id, old_start, old_end, new_start, source_id) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        let mut added = 0;
        for (chain, seg) in segments {
            added += stmt.execute(params![
                chain,
                seg.old_start,
                seg.old_end,
                seg.new_start,
                self.source_id
            ])?;
        }
        self.log_added("chain segments", added, segments.len());
        Ok(added)
    }
}
