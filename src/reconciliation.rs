// ⚖️ Reconciliation Engine - carry local edits across re-imports
// Join key: normalized demand name. Prior collection is read once, never mutated.
//
// Two precedence policies:
//   Fresh re-import       → prior edits win (classes, squad/group, notes, relations)
//   Classified re-import  → the file wins; only id (and empty relations) carry over

use crate::builder::PendingLinks;
use crate::import::ImportMode;
use crate::item::{Item, ItemId};
use crate::normalize::normalize_text;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

// ============================================================================
// MERGE POLICY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergePolicy {
    /// Local edits take precedence over values re-derived from the raw survey
    PreserveEdits,

    /// The imported file is an authoritative backup
    BackupWins,
}

impl From<ImportMode> for MergePolicy {
    fn from(mode: ImportMode) -> Self {
        match mode {
            ImportMode::Fresh => MergePolicy::PreserveEdits,
            ImportMode::Classified => MergePolicy::BackupWins,
        }
    }
}

// ============================================================================
// PRIOR INDEX
// ============================================================================

/// Normalized name → prior item. Later items overwrite earlier ones on collision.
pub struct PriorIndex<'p> {
    by_name: HashMap<String, &'p Item>,
}

impl<'p> PriorIndex<'p> {
    pub fn new(prior: &'p [Item]) -> Self {
        let mut by_name = HashMap::with_capacity(prior.len());
        for item in prior {
            by_name.insert(item.normalized_name(), item);
        }
        PriorIndex { by_name }
    }

    pub fn get(&self, normalized_name: &str) -> Option<&'p Item> {
        self.by_name.get(normalized_name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub policy: MergePolicy,
    pub fresh_count: usize,
    pub prior_count: usize,

    /// Fresh items that found a prior item by name
    pub matched: usize,

    /// Fresh items with no prior counterpart
    pub unmatched: usize,

    /// Prior items nobody matched (gone after this import)
    pub dropped: usize,

    /// Matches whose prior id was already claimed by an earlier row
    pub id_collisions: usize,

    /// (built id, final id) per fresh item, in batch order
    pub id_map: Vec<(ItemId, ItemId)>,

    /// Matched prior id per fresh item, index-aligned with the batch
    pub matches: Vec<Option<ItemId>>,

    pub reconciled_at: DateTime<Utc>,
}

impl ReconciliationReport {
    /// Report for a batch that was not merged (ids unchanged, nothing matched)
    pub fn unmerged(items: &[Item], policy: MergePolicy) -> Self {
        ReconciliationReport {
            policy,
            fresh_count: items.len(),
            prior_count: 0,
            matched: 0,
            unmatched: items.len(),
            dropped: 0,
            id_collisions: 0,
            id_map: items.iter().map(|i| (i.id, i.id)).collect(),
            matches: vec![None; items.len()],
            reconciled_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Reconciled {} fresh against {} prior ({:?}): {} matched, {} new, {} dropped, {} id collisions",
            self.fresh_count,
            self.prior_count,
            self.policy,
            self.matched,
            self.unmatched,
            self.dropped,
            self.id_collisions
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine {
    pub policy: MergePolicy,
}

impl ReconciliationEngine {
    pub fn new(mode: ImportMode) -> Self {
        ReconciliationEngine {
            policy: MergePolicy::from(mode),
        }
    }

    pub fn with_policy(policy: MergePolicy) -> Self {
        ReconciliationEngine { policy }
    }

    /// Merge a freshly built batch against the prior collection, in place
    ///
    /// Identity:
    /// - a matched item takes the prior id (first row wins a contested id)
    /// - every other item is renumbered after the largest prior id, so ids of
    ///   dropped items are never handed out again in the same pass
    pub fn reconcile(&self, fresh: &mut [Item], prior: &[Item]) -> ReconciliationReport {
        let index = PriorIndex::new(prior);

        let mut report = ReconciliationReport {
            policy: self.policy,
            fresh_count: fresh.len(),
            prior_count: prior.len(),
            matched: 0,
            unmatched: 0,
            dropped: 0,
            id_collisions: 0,
            id_map: Vec::with_capacity(fresh.len()),
            matches: Vec::with_capacity(fresh.len()),
            reconciled_at: Utc::now(),
        };

        // Pass 1: match by name and claim prior ids
        let mut claimed: HashSet<ItemId> = HashSet::new();
        let mut final_ids: Vec<Option<ItemId>> = Vec::with_capacity(fresh.len());

        for item in fresh.iter_mut() {
            match index.get(&item.normalized_name()) {
                Some(prior_item) => {
                    report.matched += 1;
                    report.matches.push(Some(prior_item.id));
                    self.merge_fields(item, prior_item);

                    if claimed.insert(prior_item.id) {
                        final_ids.push(Some(prior_item.id));
                    } else {
                        report.id_collisions += 1;
                        final_ids.push(None);
                    }
                }
                None => {
                    report.unmatched += 1;
                    report.matches.push(None);
                    final_ids.push(None);
                }
            }
        }

        // Pass 2: everything without a claimed id goes after every prior id
        let mut next_id = prior.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        for (item, final_id) in fresh.iter_mut().zip(final_ids) {
            let id = final_id.unwrap_or_else(|| {
                let id = next_id;
                next_id += 1;
                id
            });
            report.id_map.push((item.id, id));
            item.id = id;
        }

        let matched_prior: HashSet<ItemId> = report.matches.iter().flatten().copied().collect();
        report.dropped = prior
            .iter()
            .filter(|p| !matched_prior.contains(&p.id))
            .count();

        info!("{}", report.summary());
        report
    }

    fn merge_fields(&self, item: &mut Item, prior: &Item) {
        match self.policy {
            MergePolicy::PreserveEdits => {
                item.parent_id = prior.parent_id;
                item.related_ids = prior.related_ids.clone();
                item.notes = prior.notes.clone();

                item.effort = prior.effort;
                item.impact = prior.impact;
                item.approach = prior.approach;
                item.scope = prior.scope;
                item.principal_impact = prior.principal_impact;
                item.effort_type = prior.effort_type;

                item.group = prior.group.clone();
                item.sub_squad = prior.sub_squad.clone();
                item.squad = prior.squad.clone();
            }
            // Relations fall back to the prior item in resolve_links
            MergePolicy::BackupWins => {}
        }
    }
}

// ============================================================================
// RELATION NAME RESOLUTION
// ============================================================================

/// Resolve relation names (classified files) to ids over the final batch
///
/// - lookup by normalized name, last item wins on collision
/// - unresolved names are dropped with a warning, self references silently
/// - a field that resolves empty falls back to the matched prior item's value
pub fn resolve_links(
    items: &mut [Item],
    links: &[PendingLinks],
    matches: &[Option<ItemId>],
    prior: &[Item],
) -> usize {
    let by_name: HashMap<String, ItemId> = items
        .iter()
        .map(|item| (item.normalized_name(), item.id))
        .collect();
    let prior_by_id: HashMap<ItemId, &Item> = prior.iter().map(|p| (p.id, p)).collect();

    let lookup = |name: &str| by_name.get(&normalize_text(name)).copied();
    let mut unresolved = 0usize;

    for (idx, item) in items.iter_mut().enumerate() {
        let Some(pending) = links.get(idx) else {
            continue;
        };

        let mut parent = None;
        if let Some(name) = &pending.parent {
            match lookup(name) {
                Some(id) if id != item.id => parent = Some(id),
                Some(_) => {}
                None => {
                    warn!(item = item.id, name = %name, "parent name did not match any demand");
                    unresolved += 1;
                }
            }
        }

        let mut related = BTreeSet::new();
        for name in &pending.related {
            match lookup(name) {
                Some(id) if id != item.id => {
                    related.insert(id);
                }
                Some(_) => {}
                None => {
                    warn!(item = item.id, name = %name, "related name did not match any demand");
                    unresolved += 1;
                }
            }
        }

        let prior_item = matches
            .get(idx)
            .copied()
            .flatten()
            .and_then(|id| prior_by_id.get(&id).copied());

        if let Some(prior_item) = prior_item {
            if parent.is_none() {
                parent = prior_item.parent_id;
            }
            if related.is_empty() {
                related = prior_item.related_ids.clone();
            }
        }

        item.parent_id = parent;
        item.related_ids = related;
    }

    debug!(unresolved, "resolved relation names");
    unresolved
}

/// Drop references to ids outside the collection, and self references
pub fn prune_dangling(items: &mut [Item]) -> usize {
    let ids: HashSet<ItemId> = items.iter().map(|i| i.id).collect();
    let mut pruned = 0usize;

    for item in items.iter_mut() {
        if let Some(parent) = item.parent_id {
            if parent == item.id || !ids.contains(&parent) {
                item.parent_id = None;
                pruned += 1;
            }
        }

        let before = item.related_ids.len();
        let own_id = item.id;
        item.related_ids.retain(|id| *id != own_id && ids.contains(id));
        pruned += before - item.related_ids.len();
    }

    if pruned > 0 {
        debug!(pruned, "pruned dangling relations");
    }
    pruned
}

// ============================================================================
// TESTS
// ============================================================================
