/// Name lookup and resolution
pub mod lookup;
pub mod members;
pub mod roles;
pub mod translate;

pub use lookup::{EntityFamily, LookupMiss, LookupTally, MatchBounds, NameLookup, NameMatch, NameQuery};
pub use members::{resolve_group_members, score_member, MemberHint, MemberResolutionStats, MemberScore};
pub use roles::{resolve_snp_roles, RoleResolutionStats};
pub use translate::{resolve_biopolymer_names, select_candidates, NameCandidate, NameResolutionStats};
