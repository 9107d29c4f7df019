//! Row shapes accepted by [`super::SourceWriter`]

use loki_core::{
    BiopolymerId, Chromosome, EntityTypeId, GroupId, LdProfileId, NamespaceId, RelationshipId,
    Rs,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnpLocus {
    pub rs: Rs,
    pub chr: Chromosome,
    pub pos: i64,
    pub validated: bool,
}

/// A genomic span owned by a biopolymer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionRecord {
    pub biopolymer: BiopolymerId,
    pub ld_profile: LdProfileId,
    pub chr: Chromosome,
    pub pos_min: i64,
    pub pos_max: i64,
}

/// "`name` in `namespace` may also be called `new_name` in `new_namespace`"
///
/// `NamespaceId::ANY` and `EntityTypeId::ANY` act as wildcards when resolving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTranslation {
    pub namespace: NamespaceId,
    pub name: String,
    pub entity_type: EntityTypeId,
    pub new_namespace: NamespaceId,
    pub new_name: String,
}

/// An unresolved claim that member `member` of `group` is known by `name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMemberHint {
    pub group: GroupId,
    pub member: i64,
    pub entity_type: EntityTypeId,
    pub namespace: NamespaceId,
    pub name: String,
}

/// Direction of containment between two related groups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    /// The first group contains the second
    Parent,
    /// The second group contains the first
    Child,
    Sibling,
    Unknown,
}

impl Containment {
    /// Stored `contains` value for the forward row and the mirrored row
    pub fn polarity(&self) -> (Option<i64>, Option<i64>) {
        match self {
            Containment::Parent => (Some(1), Some(-1)),
            Containment::Child => (Some(-1), Some(1)),
            Containment::Sibling => (Some(0), Some(0)),
            Containment::Unknown => (None, None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupRelationship {
    pub group: GroupId,
    pub related: GroupId,
    pub relationship: RelationshipId,
    pub containment: Containment,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GwasAnnotation {
    pub rs: Option<Rs>,
    pub chr: Option<Chromosome>,
    pub pos: Option<i64>,
    pub trait_name: String,
    pub snps: Option<String>,
    pub orbeta: Option<String>,
    pub allele95ci: Option<String>,
    pub risk_afreq: Option<String>,
    pub pubmed_id: Option<i64>,
}

/// Chain header, 1-based closed coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainRecord {
    pub old_chr: Chromosome,
    pub old_start: i64,
    pub old_end: i64,
    pub new_chr: Chromosome,
    pub new_start: i64,
    pub new_end: i64,
    pub score: i64,
    pub is_forward: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_containment_polarity_mirrors() {
        for containment in [
            Containment::Parent,
            Containment::Child,
            Containment::Sibling,
        ] {
            let (forward, reverse) = containment.polarity();
            assert_eq!(forward.map(|c| -c), reverse);
        }
        assert_eq!(Containment::Unknown.polarity(), (None, None));
    }
}
