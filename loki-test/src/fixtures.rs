//! Synthetic sources for end-to-end tests
//!
//! Each fixture is a [`SourceLoader`] whose rows are built in code instead of
//! parsed from downloaded files. Like a real loader, every transform starts by
//! deleting what the source wrote last time.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use loki::liftover::ChainSegment;
use loki::sources::{
    ChainRecord, GroupMemberHint, NameTranslation, RegionRecord, SnpLocus, SourceLoader,
    SourceOptions, SourceWriter,
};
use loki_core::{BiopolymerId, Build, Chromosome, EntityTypeId, LdProfileId, NamespaceId, Rs};
use loki_storage::catalog::RoleSpec;

fn chr(code: i64) -> Chromosome {
    Chromosome::from_code(code).unwrap_or_else(|| panic!("invalid chromosome code {}", code))
}

/// Register `names` (deduplicated, in order) and return their ids
fn register_namespaces<'a, I>(writer: &mut SourceWriter<'_>, names: I, polygenic: &[String]) -> Result<IndexMap<String, NamespaceId>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut wanted: Vec<(&str, bool)> = Vec::new();
    for name in names {
        if !wanted.iter().any(|(seen, _)| *seen == name) {
            wanted.push((name, polygenic.iter().any(|p| p == name)));
        }
    }
    writer.add_namespaces(&wanted)
}

fn lookup<T: Copy>(ids: &IndexMap<String, T>, name: &str) -> Result<T> {
    ids.get(name).copied().with_context(|| format!("'{}' was not registered", name))
}

/// One gene: a label, an Entrez id, symbols and a single region
#[derive(Debug, Clone, PartialEq)]
pub struct GeneSpec {
    pub label: String,
    pub entrez: i64,
    pub symbols: Vec<String>,
    pub chr: Chromosome,
    pub start: i64,
    pub end: i64,
}

impl GeneSpec {
    /// A gene whose label doubles as its first symbol
    pub fn new(label: &str, entrez: i64, chr_code: i64, start: i64, end: i64) -> Self {
        Self {
            label: label.to_string(),
            entrez,
            symbols: vec![label.to_string()],
            chr: chr(chr_code),
            start,
            end,
        }
    }

    pub fn with_symbol(mut self, symbol: &str) -> Self {
        self.symbols.push(symbol.to_string());
        self
    }
}

/// Genes with names in `symbol` and `entrez_gid`, plus translation hints
#[derive(Debug, Clone, Default)]
pub struct GeneFixture {
    name: String,
    version: String,
    build: Option<Build>,
    genes: Vec<GeneSpec>,
    translations: Vec<(String, String, String, String)>,
    explicit: Vec<(String, String, String)>,
    polygenic: Vec<String>,
    zone_size: Option<i64>,
}

impl GeneFixture {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: "1".to_string(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Build the gene regions are reported in
    pub fn with_build(mut self, build: Build) -> Self {
        self.build = Some(build);
        self
    }

    pub fn gene(mut self, gene: GeneSpec) -> Self {
        self.genes.push(gene);
        self
    }

    /// `name` in `namespace` is also `new_name` in `new_namespace`
    pub fn translation(mut self, namespace: &str, name: &str, new_namespace: &str, new_name: &str) -> Self {
        self.translations.push((
            namespace.to_string(),
            name.to_string(),
            new_namespace.to_string(),
            new_name.to_string(),
        ));
        self
    }

    /// An explicit name for the gene labelled `label`
    pub fn explicit_name(mut self, label: &str, namespace: &str, name: &str) -> Self {
        self.explicit
            .push((label.to_string(), namespace.to_string(), name.to_string()));
        self
    }

    pub fn polygenic_namespace(mut self, namespace: &str) -> Self {
        self.polygenic.push(namespace.to_string());
        self
    }

    /// Zone tile size the source asks the store to use
    pub fn with_zone_size(mut self, size: i64) -> Self {
        self.zone_size = Some(size);
        self
    }
}

impl SourceLoader for GeneFixture {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> String {
        self.version.clone()
    }

    fn transform(&self, _: &SourceOptions, _: &Path, writer: &mut SourceWriter<'_>) -> Result<()> {
        writer.delete_all()?;
        let types = writer.add_types(&["gene"])?;
        let gene = lookup(&types, "gene")?;

        let used = ["symbol", "entrez_gid"]
            .into_iter()
            .chain(self.translations.iter().flat_map(|(ns, _, new_ns, _)| [ns.as_str(), new_ns.as_str()]))
            .chain(self.explicit.iter().map(|(_, ns, _)| ns.as_str()));
        let namespaces = register_namespaces(writer, used, &self.polygenic)?;
        writer.set_source_builds(None, self.build)?;
        if let Some(size) = self.zone_size {
            writer.set_zone_size(size)?;
        }

        let entities: Vec<(&str, &str)> = self.genes.iter().map(|g| (g.label.as_str(), "")).collect();
        let ids = writer.add_biopolymers(gene, &entities)?;
        let by_label: HashMap<&str, BiopolymerId> =
            self.genes.iter().map(|g| g.label.as_str()).zip(ids.iter().copied()).collect();

        let symbol = lookup(&namespaces, "symbol")?;
        let entrez = lookup(&namespaces, "entrez_gid")?;
        let entrez_names: Vec<String> = self.genes.iter().map(|g| g.entrez.to_string()).collect();

        let mut names: Vec<(BiopolymerId, NamespaceId, &str)> = Vec::new();
        for ((spec, id), entrez_name) in self.genes.iter().zip(&ids).zip(&entrez_names) {
            names.push((*id, entrez, entrez_name.as_str()));
            names.extend(spec.symbols.iter().map(|s| (*id, symbol, s.as_str())));
        }
        for (label, ns, name) in &self.explicit {
            let id = by_label
                .get(label.as_str())
                .copied()
                .with_context(|| format!("no gene labelled '{}'", label))?;
            names.push((id, lookup(&namespaces, ns)?, name.as_str()));
        }
        writer.add_namespaced_biopolymer_names(&names)?;

        let regions: Vec<RegionRecord> = self
            .genes
            .iter()
            .zip(&ids)
            .map(|(spec, id)| RegionRecord {
                biopolymer: *id,
                ld_profile: LdProfileId::DEFAULT,
                chr: spec.chr,
                pos_min: spec.start,
                pos_max: spec.end,
            })
            .collect();
        writer.add_biopolymer_regions(&regions)?;

        let translations = self
            .translations
            .iter()
            .map(|(ns, name, new_ns, new_name)| {
                Ok(NameTranslation {
                    namespace: lookup(&namespaces, ns)?,
                    name: name.clone(),
                    entity_type: EntityTypeId::ANY,
                    new_namespace: lookup(&namespaces, new_ns)?,
                    new_name: new_name.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        writer.add_name_translations(&translations)?;
        Ok(())
    }
}

/// SNP positions, merges and Entrez roles
#[derive(Debug, Clone, Default)]
pub struct SnpFixture {
    name: String,
    version: String,
    build: Option<Build>,
    loci: Vec<(Rs, Chromosome, i64)>,
    merges: Vec<(Rs, Rs)>,
    roles: Vec<(Rs, i64, String)>,
}

impl SnpFixture {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: "1".to_string(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_build(mut self, build: Build) -> Self {
        self.build = Some(build);
        self
    }

    pub fn locus(mut self, rs: Rs, chr_code: i64, pos: i64) -> Self {
        self.loci.push((rs, chr(chr_code), pos));
        self
    }

    /// `merged` was folded into `current`
    pub fn merge(mut self, merged: Rs, current: Rs) -> Self {
        self.merges.push((merged, current));
        self
    }

    pub fn role(mut self, rs: Rs, entrez: i64, role: &str) -> Self {
        self.roles.push((rs, entrez, role.to_string()));
        self
    }
}

impl SourceLoader for SnpFixture {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> String {
        self.version.clone()
    }

    fn transform(&self, _: &SourceOptions, _: &Path, writer: &mut SourceWriter<'_>) -> Result<()> {
        writer.delete_all()?;
        writer.set_source_builds(None, self.build)?;

        writer.add_snp_merges(&self.merges)?;
        let loci: Vec<SnpLocus> = self
            .loci
            .iter()
            .map(|&(rs, chr, pos)| SnpLocus {
                rs,
                chr,
                pos,
                validated: true,
            })
            .collect();
        writer.add_snp_loci(&loci)?;

        if !self.roles.is_empty() {
            let mut specs: Vec<RoleSpec> = Vec::new();
            for (_, _, role) in &self.roles {
                if !specs.iter().any(|spec| &spec.name == role) {
                    specs.push(RoleSpec {
                        name: role.clone(),
                        description: None,
                        coding: None,
                        exon: None,
                    });
                }
            }
            let role_ids = writer.add_roles(&specs)?;
            let roles = self
                .roles
                .iter()
                .map(|(rs, entrez, role)| Ok((*rs, *entrez, lookup(&role_ids, role)?)))
                .collect::<Result<Vec<_>>>()?;
            writer.add_snp_entrez_roles(&roles)?;
        }
        Ok(())
    }
}

/// Alignment chains between two builds
#[derive(Debug, Clone)]
pub struct ChainFixture {
    name: String,
    old_build: Build,
    new_build: Build,
    chains: Vec<(ChainRecord, Vec<ChainSegment>)>,
}

impl ChainFixture {
    pub fn new(name: &str, old_build: Build, new_build: Build) -> Self {
        Self {
            name: name.to_string(),
            old_build,
            new_build,
            chains: Vec::new(),
        }
    }

    /// One forward, gap-free chain moving `[start, end]` by `shift` bases
    pub fn offset(self, chr_code: i64, start: i64, end: i64, shift: i64, score: i64) -> Self {
        let chr = chr(chr_code);
        let record = ChainRecord {
            old_chr: chr,
            old_start: start,
            old_end: end,
            new_chr: chr,
            new_start: start + shift,
            new_end: end + shift,
            score,
            is_forward: true,
        };
        self.chain(record, vec![ChainSegment::new(start, end, start + shift)])
    }

    pub fn chain(mut self, record: ChainRecord, segments: Vec<ChainSegment>) -> Self {
        self.chains.push((record, segments));
        self
    }
}

impl SourceLoader for ChainFixture {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> String {
        "1".to_string()
    }

    fn transform(&self, _: &SourceOptions, _: &Path, writer: &mut SourceWriter<'_>) -> Result<()> {
        writer.delete_all()?;
        let records: Vec<ChainRecord> = self.chains.iter().map(|(record, _)| *record).collect();
        let ids = writer.add_chains(self.old_build, self.new_build, &records)?;
        let segments: Vec<_> = ids
            .iter()
            .zip(&self.chains)
            .flat_map(|(id, (_, segments))| segments.iter().map(move |s| (*id, *s)))
            .collect();
        writer.add_chain_segments(&segments)?;
        Ok(())
    }
}

/// Pathway-style groups whose members are given only by name
#[derive(Debug, Clone, Default)]
pub struct GroupFixture {
    name: String,
    groups: Vec<(String, Vec<Vec<(String, String)>>)>,
}

impl GroupFixture {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// A group whose members each carry one or more `(namespace, name)` hints
    pub fn group(mut self, label: &str, members: &[&[(&str, &str)]]) -> Self {
        let members = members
            .iter()
            .map(|hints| hints.iter().map(|(ns, name)| (ns.to_string(), name.to_string())).collect())
            .collect();
        self.groups.push((label.to_string(), members));
        self
    }
}

impl SourceLoader for GroupFixture {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> String {
        "1".to_string()
    }

    fn transform(&self, _: &SourceOptions, _: &Path, writer: &mut SourceWriter<'_>) -> Result<()> {
        writer.delete_all()?;
        let types = writer.add_types(&["gene", "pathway"])?;
        let (gene, pathway) = (lookup(&types, "gene")?, lookup(&types, "pathway")?);

        let used = std::iter::once("pathway").chain(
            self.groups
                .iter()
                .flat_map(|(_, members)| members.iter().flatten().map(|(ns, _)| ns.as_str())),
        );
        let namespaces = register_namespaces(writer, used, &[])?;

        let labels: Vec<(&str, &str)> = self.groups.iter().map(|(label, _)| (label.as_str(), "")).collect();
        let ids = writer.add_groups(pathway, &labels)?;
        let names: Vec<_> = ids.iter().copied().zip(labels.iter().map(|(label, _)| *label)).collect();
        writer.add_group_names(lookup(&namespaces, "pathway")?, &names)?;

        let mut hints = Vec::new();
        for (group, (_, members)) in ids.iter().zip(&self.groups) {
            for (member, member_hints) in members.iter().enumerate() {
                for (ns, name) in member_hints {
                    hints.push(GroupMemberHint {
                        group: *group,
                        member: member as i64 + 1,
                        entity_type: gene,
                        namespace: lookup(&namespaces, ns)?,
                        name: name.clone(),
                    });
                }
            }
        }
        writer.add_group_member_names(&hints)?;
        Ok(())
    }
}
