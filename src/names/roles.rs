/// Translation of SNP-gene roles from Entrez ids to biopolymers
use anyhow::Result;
use loki_storage::catalog;
use loki_storage::rusqlite::{params, Connection};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleResolutionStats {
    pub roles: usize,
    pub snps: usize,
    pub genes: usize,
    pub unrecognized: usize,
    pub duplicates: usize,
}

/// Rebuild `snp_biopolymer_role` from `snp_entrez_role`
///
/// Entrez ids are matched through the `entrez_gid` namespace against
/// biopolymers of type `gene`. Without that namespace or type nothing can be
/// matched and the table is left empty.
pub fn resolve_snp_roles(conn: &Connection) -> Result<RoleResolutionStats> {
    let mut stats = RoleResolutionStats::default();
    conn.execute("DELETE FROM snp_biopolymer_role", [])?;

    let gene = catalog::type_id(conn, "gene")?;
    let entrez = catalog::namespace_id(conn, "entrez_gid")?;
    match (gene, entrez) {
        (Some(gene), Some(entrez)) => {
            // entrez_id is cast to text so the name index applies
            conn.execute(
                "INSERT INTO snp_biopolymer_role (rs, biopolymer_id, role_id, source_id) \
                 SELECT ser.rs, bn.biopolymer_id, ser.role_id, ser.source_id \
                 FROM snp_entrez_role AS ser \
                 JOIN biopolymer_name AS bn ON bn.namespace_id = ?1 AND bn.name = '' || ser.entrez_id \
                 JOIN biopolymer AS b ON b.biopolymer_id = bn.biopolymer_id AND b.type_id = ?2",
                params![entrez, gene],
            )?;
            let unrecognized: i64 = conn.query_row(
                "SELECT COUNT() FROM snp_entrez_role AS ser \
                 WHERE NOT EXISTS ( \
                   SELECT 1 FROM biopolymer_name AS bn \
                   JOIN biopolymer AS b ON b.biopolymer_id = bn.biopolymer_id AND b.type_id = ?2 \
                   WHERE bn.namespace_id = ?1 AND bn.name = '' || ser.entrez_id)",
                params![entrez, gene],
                |row| row.get(0),
            )?;
            stats.unrecognized = unrecognized as usize;
        }
        _ => warn!("Cannot resolve SNP roles without the 'gene' type and 'entrez_gid' namespace"),
    }

    stats.duplicates = conn.execute(
        "DELETE FROM snp_biopolymer_role WHERE rowid NOT IN ( \
           SELECT MIN(rowid) FROM snp_biopolymer_role GROUP BY rs, biopolymer_id, role_id)",
        [],
    )?;

    let (roles, snps, genes): (i64, i64, i64) = conn.query_row(
        "SELECT COUNT(), COUNT(DISTINCT rs), COUNT(DISTINCT biopolymer_id) FROM snp_biopolymer_role",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;
    stats.roles = roles as usize;
    stats.snps = snps as usize;
    stats.genes = genes as usize;

    info!(
        "{} SNP roles ({} SNPs, {} genes; {} unrecognized)",
        stats.roles, stats.snps, stats.genes, stats.unrecognized
    );
    Ok(stats)
}
