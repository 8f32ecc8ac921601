// Demand Triage - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod normalize;      // Text Normalizer
pub mod parser;         // Tabular Parser
pub mod fields;         // Header Resolver - canonical fields + synonyms
pub mod rules;          // Classification Engine - rules as data
pub mod item;           // Item - the reconciled unit
pub mod builder;        // Item Builder
pub mod reconciliation; // Reconciliation - merge policy + name resolution
pub mod db;             // Snapshot persistence + audit trail (SQLite)
pub mod export;         // Export Serializer
pub mod store;          // Owned item store + mutation API
pub mod import;         // Import pipeline
pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use normalize::{clean_group_label, normalize_text};
pub use parser::{load_file, parse_rows, rows_to_records, RawRecord, TabularParser};
pub use fields::{resolve, CanonicalField, FieldDefinition, FieldRegistry, HeaderResolver};
pub use rules::{
    ApproachClass, Classification, EffortClass, EffortType, ImpactClass, PrincipalImpactClass,
    ScopeClass,
};
pub use item::{Item, ItemId};
pub use builder::{BuildOutput, ItemBuilder, PendingLinks};
pub use reconciliation::{
    prune_dangling, resolve_links, MergePolicy, PriorIndex, ReconciliationEngine,
    ReconciliationReport,
};
pub use db::{setup_database, Event, Snapshot, SnapshotStore, SNAPSHOT_VERSION};
pub use export::{export_to_file, serialize, CellValue, ExportSerializer};
pub use store::{FieldUpdate, ItemFilter, ItemStore};
pub use import::{import_file, import_text, ImportMode, ImportOptions, ImportReport};
pub use config::TriageConfig;
pub use error::TriageError;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
