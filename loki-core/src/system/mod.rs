pub mod paths;

pub use paths::{generate_utc_timestamp, loki_cache_dir, loki_home, source_work_dir};
