// 📋 Item - the reconciled, editable unit of the backlog
// Identity = sequential id; merge key = normalized demand name (derived, never stored)

use crate::normalize::normalize_text;
use crate::parser::RawRecord;
use crate::rules::{
    ApproachClass, EffortClass, EffortType, ImpactClass, PrincipalImpactClass, ScopeClass,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type ItemId = u64;

/// Upper bounds for the numeric fields
pub const MAX_PROGRESS: u8 = 100;
pub const MAX_URGENCY: u8 = 5;

/// Item - one demand on the triage board
///
/// Every field added after the first snapshot format carries
/// `#[serde(default)]` so older snapshots still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    // ========================================================================
    // IDENTITY
    // ========================================================================
    pub id: ItemId,

    // ========================================================================
    // FREE TEXT
    // ========================================================================
    #[serde(default)]
    pub demand: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub squad: String,

    #[serde(default)]
    pub sub_squad: String,

    /// Short label, trimmed, at most 60 characters
    #[serde(default)]
    pub group: String,

    /// Free-form notes typed by the team
    #[serde(default)]
    pub notes: String,

    /// "Observações complementares" from the survey (read-only)
    #[serde(default)]
    pub additional_notes: String,

    // ========================================================================
    // CLASSIFICATION
    // ========================================================================
    #[serde(default)]
    pub effort: Option<EffortClass>,

    #[serde(default)]
    pub impact: Option<ImpactClass>,

    #[serde(default)]
    pub approach: ApproachClass,

    #[serde(default)]
    pub scope: ScopeClass,

    #[serde(default)]
    pub principal_impact: PrincipalImpactClass,

    #[serde(default)]
    pub effort_type: Option<EffortType>,

    // ========================================================================
    // STATUS
    // ========================================================================
    /// 0..=100
    #[serde(default)]
    pub progress: u8,

    #[serde(default)]
    pub ongoing: bool,

    /// 0..=5
    #[serde(default)]
    pub urgency: u8,

    // ========================================================================
    // RELATIONS (one-directional, by id)
    // ========================================================================
    #[serde(default)]
    pub parent_id: Option<ItemId>,

    #[serde(default)]
    pub related_ids: BTreeSet<ItemId>,

    // ========================================================================
    // PROVENANCE
    // ========================================================================
    /// Row this item was built or last reconciled from
    #[serde(default)]
    pub original: RawRecord,
}

impl Item {
    /// Empty item with defaults everywhere
    pub fn new(id: ItemId, demand: impl Into<String>) -> Self {
        Item {
            id,
            demand: demand.into(),
            description: String::new(),
            squad: String::new(),
            sub_squad: String::new(),
            group: String::new(),
            notes: String::new(),
            additional_notes: String::new(),
            effort: None,
            impact: None,
            approach: ApproachClass::Other,
            scope: ScopeClass::Other,
            principal_impact: PrincipalImpactClass::Other,
            effort_type: None,
            progress: 0,
            ongoing: false,
            urgency: 0,
            parent_id: None,
            related_ids: BTreeSet::new(),
            original: RawRecord::new(),
        }
    }

    /// Merge key: demand name trimmed, case-folded, without diacritics
    pub fn normalized_name(&self) -> String {
        normalize_text(&self.demand)
    }

    /// Board cell (effort, impact) when both are set, otherwise None = backlog
    pub fn board_position(&self) -> Option<(EffortClass, ImpactClass)> {
        match (self.effort, self.impact) {
            (Some(effort), Some(impact)) => Some((effort, impact)),
            _ => None,
        }
    }

    pub fn is_on_board(&self) -> bool {
        self.board_position().is_some()
    }

    pub fn has_relations(&self) -> bool {
        self.parent_id.is_some() || !self.related_ids.is_empty()
    }

    /// Re-establish the per-item invariants (clamped numbers, no self links)
    pub fn enforce_invariants(&mut self) {
        self.progress = self.progress.min(MAX_PROGRESS);
        self.urgency = self.urgency.min(MAX_URGENCY);
        self.related_ids.remove(&self.id);
        if self.parent_id == Some(self.id) {
            self.parent_id = None;
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
