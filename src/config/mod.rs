pub mod loader;
pub mod schema;

pub use loader::{
    discover, load_from_path, load_from_str, ConfigError, ConfigSource, CONFIG_ENV, LOCAL_CONFIG,
};
pub use schema::{
    PathSettings, Settings, UpstreamSettings, ValidationError, ValidationIssue,
    DEFAULT_DOCS_ROOT, DEFAULT_MAX_SECTIONS, DEFAULT_STORAGE_DIR,
};
