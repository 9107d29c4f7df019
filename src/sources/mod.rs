/// Source loaders and the write surface they use
pub mod chainfiles;
pub mod loader;
pub mod options;
pub mod records;
pub mod registry;
pub mod writer;

pub use chainfiles::{ChainFileOptions, ChainFileSource};
pub use loader::SourceLoader;
pub use options::{LoaderOptions, OptionError, OptionSpec, SourceOptions};
pub use records::{
    ChainRecord, Containment, GroupMemberHint, GroupRelationship, GwasAnnotation,
    NameTranslation, RegionRecord, SnpLocus,
};
pub use registry::{SourceRegistry, SourceRegistryBuilder};
pub use writer::SourceWriter;
