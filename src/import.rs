// 📥 Import Pipeline
// text → records → items → (merge against prior) → links → prune → atomic replace → snapshot
//
// The prior collection is read once at the start and written once at the end.
// Everything in between is in-memory and cannot fail.

use crate::builder::ItemBuilder;
use crate::db::{Event, SnapshotStore};
use crate::item::Item;
use crate::parser::{load_file, TabularParser};
use crate::reconciliation::{prune_dangling, resolve_links, MergePolicy, ReconciliationEngine, ReconciliationReport};
use crate::store::ItemStore;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// OPTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImportMode {
    /// Raw survey export
    #[default]
    Fresh,

    /// A file previously produced by the export serializer
    Classified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    pub mode: ImportMode,

    /// Reconcile against the prior collection (otherwise replace outright)
    pub merge: bool,
}

impl ImportOptions {
    pub fn new() -> Self {
        ImportOptions {
            mode: ImportMode::Fresh,
            merge: true,
        }
    }

    pub fn with_mode(mut self, mode: ImportMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub options: ImportOptions,
    pub items: usize,
    /// Rows whose Grupo/Urgencia cells were swapped back
    pub repaired: usize,
    pub unresolved_links: usize,
    pub pruned_links: usize,
    pub reconciliation: ReconciliationReport,
    /// Audit event written for this batch (when persisted)
    pub event_id: Option<String>,
}

impl ImportReport {
    pub fn summary(&self) -> String {
        format!(
            "Imported {} items ({:?}, merge={}): {} matched, {} new, {} dropped",
            self.items,
            self.options.mode,
            self.options.merge,
            self.reconciliation.matched,
            self.reconciliation.unmatched,
            self.reconciliation.dropped
        )
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Import already-read text into the store
///
/// Prior state comes from `snapshots` when given, else from the store itself.
/// Only the final snapshot write can fail.
pub fn import_text(
    store: &mut ItemStore,
    text: &str,
    options: ImportOptions,
    snapshots: Option<&SnapshotStore>,
) -> Result<ImportReport> {
    let records = TabularParser::new().parse_records(text);
    debug!(records = records.len(), "parsed import");

    let build = ItemBuilder::new().build(records, options.mode);
    let mut items = build.items;

    let prior: Vec<Item> = match (options.merge, snapshots) {
        (false, _) => Vec::new(),
        (true, Some(snapshots)) => snapshots.load(),
        (true, None) => store.items().to_vec(),
    };

    let reconciliation = if options.merge {
        ReconciliationEngine::new(options.mode).reconcile(&mut items, &prior)
    } else {
        ReconciliationReport::unmerged(&items, MergePolicy::from(options.mode))
    };

    let unresolved_links = match options.mode {
        ImportMode::Classified => resolve_links(&mut items, &build.links, &reconciliation.matches, &prior),
        ImportMode::Fresh => 0,
    };
    let pruned_links = prune_dangling(&mut items);
    for item in items.iter_mut() {
        item.enforce_invariants();
    }

    store.replace_all(items);

    let mut report = ImportReport {
        options,
        items: store.len(),
        repaired: build.repaired,
        unresolved_links,
        pruned_links,
        reconciliation,
        event_id: None,
    };

    if let Some(snapshots) = snapshots {
        snapshots.save(store.items())?;

        let event = Event::new(
            "import",
            "snapshot",
            snapshots.key(),
            serde_json::json!({
                "mode": options.mode,
                "merge": options.merge,
                "items": report.items,
                "matched": report.reconciliation.matched,
                "dropped": report.reconciliation.dropped,
                "repaired": report.repaired,
            }),
            "import",
        );
        snapshots.record(&event)?;
        report.event_id = Some(event.event_id);
    }

    info!("{}", report.summary());
    Ok(report)
}

/// Read a file (the single I/O boundary) and import it
pub fn import_file(
    store: &mut ItemStore,
    path: &Path,
    options: ImportOptions,
    snapshots: Option<&SnapshotStore>,
) -> Result<ImportReport> {
    let text = load_file(path)?;
    import_text(store, &text, options, snapshots)
}

// ============================================================================
// TESTS
// ============================================================================
