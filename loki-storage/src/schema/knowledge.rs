use super::{IndexDef, Schema, Table, TableDef};
use rusqlite::types::Value;

pub(super) const SCHEMA_VERSION: u32 = 1;

impl TableDef {
    fn new(table: Table, columns: &'static str) -> Self {
        Self {
            table,
            columns,
            indexes: Vec::new(),
            seed: Vec::new(),
            has_provenance: false,
            intermediate: false,
        }
    }

    fn index(mut self, name: &'static str, columns: &'static str) -> Self {
        self.indexes.push(IndexDef { name, columns });
        self
    }

    fn seed_row(mut self, row: Vec<Value>) -> Self {
        self.seed.push(row);
        self
    }

    fn provenance(mut self) -> Self {
        self.has_provenance = true;
        self
    }

    fn intermediate(mut self) -> Self {
        self.intermediate = true;
        self
    }
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub(super) fn definition() -> Schema {
    let mut setting = TableDef::new(
        Table::Setting,
        "setting VARCHAR(32) PRIMARY KEY NOT NULL, value VARCHAR(256)",
    );
    for (key, value) in [
        ("schema", SCHEMA_VERSION.to_string()),
        ("ucschg", String::new()),
        ("zone_size", "100000".to_string()),
        ("optimized", "0".to_string()),
        ("finalized", "0".to_string()),
    ] {
        let value = if value.is_empty() { Value::Null } else { text(&value) };
        setting = setting.seed_row(vec![text(key), value]);
    }

    let mut grch_ucschg = TableDef::new(
        Table::GrchUcschg,
        "grch INTEGER PRIMARY KEY NOT NULL, ucschg INTEGER NOT NULL",
    );
    for (grch, ucschg) in [(34, 16), (35, 17), (36, 18), (37, 19), (38, 38)] {
        grch_ucschg = grch_ucschg.seed_row(vec![Value::Integer(grch), Value::Integer(ucschg)]);
    }

    let tables = vec![
        setting,
        grch_ucschg,
        TableDef::new(
            Table::LdProfile,
            "ldprofile_id INTEGER PRIMARY KEY NOT NULL, \
             ldprofile VARCHAR(32) UNIQUE NOT NULL, \
             description VARCHAR(128), \
             metric VARCHAR(32), \
             value DOUBLE",
        ),
        TableDef::new(
            Table::Namespace,
            "namespace_id INTEGER PRIMARY KEY NOT NULL, \
             namespace VARCHAR(32) UNIQUE NOT NULL, \
             polygenic TINYINT NOT NULL DEFAULT 0",
        ),
        TableDef::new(
            Table::Relationship,
            "relationship_id INTEGER PRIMARY KEY NOT NULL, \
             relationship VARCHAR(32) UNIQUE NOT NULL",
        ),
        TableDef::new(
            Table::Role,
            "role_id INTEGER PRIMARY KEY NOT NULL, \
             role VARCHAR(32) UNIQUE NOT NULL, \
             description VARCHAR(128), \
             coding TINYINT, \
             exon TINYINT",
        ),
        TableDef::new(
            Table::Source,
            "source_id INTEGER PRIMARY KEY NOT NULL, \
             source VARCHAR(32) UNIQUE NOT NULL, \
             updated DATETIME, \
             version VARCHAR(32), \
             grch INTEGER, \
             ucschg INTEGER, \
             current_ucschg INTEGER",
        ),
        TableDef::new(
            Table::SourceOption,
            "source_id INTEGER NOT NULL, \
             option VARCHAR(32) NOT NULL, \
             value VARCHAR(64), \
             PRIMARY KEY (source_id, option)",
        ),
        TableDef::new(
            Table::SourceFile,
            "source_id INTEGER NOT NULL, \
             filename VARCHAR(256) NOT NULL, \
             size BIGINT, \
             modified DATETIME, \
             checksum VARCHAR(64), \
             PRIMARY KEY (source_id, filename)",
        ),
        TableDef::new(
            Table::Type,
            "type_id INTEGER PRIMARY KEY NOT NULL, type VARCHAR(32) UNIQUE NOT NULL",
        ),
        TableDef::new(
            Table::Warning,
            "warning_id INTEGER PRIMARY KEY NOT NULL, \
             source_id INTEGER NOT NULL, \
             warning VARCHAR(8192)",
        )
        .index("source", "source_id"),
        TableDef::new(
            Table::SnpMerge,
            "rs_merged INTEGER NOT NULL, rs_current INTEGER NOT NULL, source_id INTEGER NOT NULL",
        )
        .index("merged_current", "rs_merged, rs_current")
        .provenance(),
        TableDef::new(
            Table::SnpLocus,
            "rs INTEGER NOT NULL, \
             chr TINYINT NOT NULL, \
             pos BIGINT NOT NULL, \
             validated TINYINT NOT NULL, \
             source_id INTEGER NOT NULL",
        )
        .index("rs_chr_pos", "rs, chr, pos")
        .index("chr_pos_rs", "chr, pos, rs")
        .provenance(),
        TableDef::new(
            Table::SnpEntrezRole,
            "rs INTEGER NOT NULL, \
             entrez_id INTEGER NOT NULL, \
             role_id INTEGER NOT NULL, \
             source_id INTEGER NOT NULL",
        )
        .index("rs_entrez_role", "rs, entrez_id, role_id")
        .provenance()
        .intermediate(),
        TableDef::new(
            Table::SnpBiopolymerRole,
            "rs INTEGER NOT NULL, \
             biopolymer_id INTEGER NOT NULL, \
             role_id INTEGER NOT NULL, \
             source_id INTEGER NOT NULL",
        )
        .index("rs_biopolymer_role", "rs, biopolymer_id, role_id")
        .index("biopolymer_rs_role", "biopolymer_id, rs, role_id"),
        TableDef::new(
            Table::Biopolymer,
            "biopolymer_id INTEGER PRIMARY KEY NOT NULL, \
             type_id INTEGER NOT NULL, \
             label VARCHAR(64) NOT NULL, \
             description VARCHAR(256), \
             source_id INTEGER NOT NULL",
        )
        .index("type", "type_id")
        .index("label_type", "label, type_id")
        .provenance(),
        TableDef::new(
            Table::BiopolymerName,
            "biopolymer_id INTEGER NOT NULL, \
             namespace_id INTEGER NOT NULL, \
             name VARCHAR(256) NOT NULL, \
             source_id INTEGER NOT NULL, \
             PRIMARY KEY (biopolymer_id, namespace_id, name)",
        )
        .index("name_namespace_biopolymer", "name, namespace_id, biopolymer_id")
        .provenance(),
        TableDef::new(
            Table::BiopolymerNameName,
            "namespace_id INTEGER NOT NULL, \
             name VARCHAR(256) NOT NULL, \
             type_id INTEGER NOT NULL, \
             new_namespace_id INTEGER NOT NULL, \
             new_name VARCHAR(256) NOT NULL, \
             source_id INTEGER NOT NULL, \
             PRIMARY KEY (new_namespace_id, new_name, type_id, namespace_id, name)",
        )
        .provenance()
        .intermediate(),
        TableDef::new(
            Table::BiopolymerRegion,
            "biopolymer_id INTEGER NOT NULL, \
             ldprofile_id INTEGER NOT NULL, \
             chr TINYINT NOT NULL, \
             pos_min BIGINT NOT NULL, \
             pos_max BIGINT NOT NULL, \
             source_id INTEGER NOT NULL, \
             PRIMARY KEY (biopolymer_id, ldprofile_id, chr, pos_min, pos_max)",
        )
        .index("ldprofile_chr_min", "ldprofile_id, chr, pos_min")
        .index("ldprofile_chr_max", "ldprofile_id, chr, pos_max")
        .provenance(),
        TableDef::new(
            Table::BiopolymerZone,
            "biopolymer_id INTEGER NOT NULL, \
             chr TINYINT NOT NULL, \
             zone INTEGER NOT NULL, \
             PRIMARY KEY (biopolymer_id, chr, zone)",
        )
        .index("zone", "chr, zone, biopolymer_id"),
        TableDef::new(
            Table::Group,
            "group_id INTEGER PRIMARY KEY NOT NULL, \
             type_id INTEGER NOT NULL, \
             label VARCHAR(64) NOT NULL, \
             description VARCHAR(256), \
             source_id INTEGER NOT NULL",
        )
        .index("type", "type_id")
        .index("label_type", "label, type_id")
        .provenance(),
        TableDef::new(
            Table::GroupName,
            "group_id INTEGER NOT NULL, \
             namespace_id INTEGER NOT NULL, \
             name VARCHAR(256) NOT NULL, \
             source_id INTEGER NOT NULL, \
             PRIMARY KEY (group_id, namespace_id, name)",
        )
        .index("name_namespace_group", "name, namespace_id, group_id")
        .index("source", "source_id")
        .provenance(),
        TableDef::new(
            Table::GroupGroup,
            "group_id INTEGER NOT NULL, \
             related_group_id INTEGER NOT NULL, \
             relationship_id INTEGER NOT NULL, \
             direction TINYINT NOT NULL, \
             contains TINYINT, \
             source_id INTEGER NOT NULL, \
             PRIMARY KEY (group_id, related_group_id, relationship_id, direction)",
        )
        .index("related", "related_group_id, group_id")
        .provenance(),
        TableDef::new(
            Table::GroupBiopolymer,
            "group_id INTEGER NOT NULL, \
             biopolymer_id INTEGER NOT NULL, \
             specificity TINYINT NOT NULL, \
             implication TINYINT NOT NULL, \
             quality TINYINT NOT NULL, \
             source_id INTEGER NOT NULL, \
             PRIMARY KEY (group_id, biopolymer_id, source_id)",
        )
        .index("biopolymer", "biopolymer_id, group_id")
        .provenance(),
        TableDef::new(
            Table::GroupMemberName,
            "group_id INTEGER NOT NULL, \
             member INTEGER NOT NULL, \
             type_id INTEGER NOT NULL, \
             namespace_id INTEGER NOT NULL, \
             name VARCHAR(256) NOT NULL, \
             source_id INTEGER NOT NULL, \
             PRIMARY KEY (group_id, member, type_id, namespace_id, name)",
        )
        .provenance()
        .intermediate(),
        TableDef::new(
            Table::Gwas,
            "gwas_id INTEGER PRIMARY KEY NOT NULL, \
             rs INTEGER, \
             chr TINYINT, \
             pos BIGINT, \
             trait VARCHAR(256) NOT NULL, \
             snps VARCHAR(256), \
             orbeta VARCHAR(8), \
             allele95ci VARCHAR(16), \
             risk_afreq VARCHAR(16), \
             pubmed_id INTEGER, \
             source_id INTEGER NOT NULL",
        )
        .index("rs", "rs")
        .index("chr_pos", "chr, pos")
        .provenance(),
        TableDef::new(
            Table::Chain,
            "chain_id INTEGER PRIMARY KEY NOT NULL, \
             old_ucschg INTEGER NOT NULL, \
             old_chr TINYINT NOT NULL, \
             old_start BIGINT NOT NULL, \
             old_end BIGINT NOT NULL, \
             new_ucschg INTEGER NOT NULL, \
             new_chr TINYINT NOT NULL, \
             new_start BIGINT NOT NULL, \
             new_end BIGINT NOT NULL, \
             score BIGINT NOT NULL, \
             is_fwd TINYINT NOT NULL, \
             source_id INTEGER NOT NULL",
        )
        .index("old", "old_ucschg, new_ucschg, old_chr, old_start, old_end, chain_id")
        .provenance(),
        TableDef::new(
            Table::ChainData,
            "chain_id INTEGER NOT NULL, \
             old_start BIGINT NOT NULL, \
             old_end BIGINT NOT NULL, \
             new_start BIGINT NOT NULL, \
             source_id INTEGER NOT NULL, \
             PRIMARY KEY (chain_id, old_start)",
        )
        .index("end", "chain_id, old_end")
        .provenance(),
    ];

    Schema::new(SCHEMA_VERSION, tables)
}
