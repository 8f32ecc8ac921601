// 🗂️ Item Store - the owned, ordered item collection
// Replaced atomically by an import; mutated one field at a time by collaborators.

use crate::builder::split_names;
use crate::error::TriageError;
use crate::item::{Item, ItemId, MAX_PROGRESS, MAX_URGENCY};
use crate::normalize::{clean_group_label, normalize_text};
use crate::rules::{
    classify_approach, classify_effort, classify_effort_type, classify_impact,
    classify_principal_impact, classify_scope, parse_ongoing, parse_progress, parse_urgency,
    ApproachClass, EffortClass, EffortType, ImpactClass, PrincipalImpactClass, ScopeClass,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

// ============================================================================
// FIELD UPDATE (total replacement of one field)
// ============================================================================

/// One field mutation requested by an editing collaborator
///
/// JSON shape: `{"field": "urgency", "value": 4}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldUpdate {
    Demand(String),
    Description(String),
    Squad(String),
    SubSquad(String),
    Group(String),
    Notes(String),
    Effort(Option<EffortClass>),
    Impact(Option<ImpactClass>),
    Approach(ApproachClass),
    Scope(ScopeClass),
    PrincipalImpact(PrincipalImpactClass),
    EffortType(Option<EffortType>),
    /// Clamped to 0..=100
    Progress(i64),
    Ongoing(bool),
    /// Clamped to 0..=5
    Urgency(i64),
    Parent(Option<ItemId>),
    Related(BTreeSet<ItemId>),
}

impl FieldUpdate {
    /// Field names accepted by `parse`
    pub const FIELDS: [&'static str; 17] = [
        "demand",
        "description",
        "squad",
        "sub_squad",
        "group",
        "notes",
        "effort",
        "impact",
        "approach",
        "scope",
        "principal_impact",
        "effort_type",
        "progress",
        "ongoing",
        "urgency",
        "parent",
        "related",
    ];

    /// Build an update from text (CLI); class values go through the classifiers
    ///
    /// An empty value clears optional fields.
    pub fn parse(field: &str, value: &str) -> Result<FieldUpdate, TriageError> {
        let trimmed = value.trim();
        let invalid = || TriageError::invalid(field, value);

        // Same readings as an import cell; text without any digit is rejected
        let has_digit = trimmed.chars().any(|c| c.is_ascii_digit());
        let parse_optional_id = || -> Result<Option<ItemId>, TriageError> {
            if trimmed.is_empty() {
                Ok(None)
            } else {
                trimmed.parse::<ItemId>().map(Some).map_err(|_| invalid())
            }
        };

        let update = match field {
            "demand" => FieldUpdate::Demand(trimmed.to_string()),
            "description" => FieldUpdate::Description(value.to_string()),
            "squad" => FieldUpdate::Squad(trimmed.to_string()),
            "sub_squad" => FieldUpdate::SubSquad(trimmed.to_string()),
            "group" => FieldUpdate::Group(trimmed.to_string()),
            "notes" => FieldUpdate::Notes(value.to_string()),
            "effort" => FieldUpdate::Effort(optional_class(trimmed, classify_effort).ok_or_else(invalid)?),
            "impact" => FieldUpdate::Impact(optional_class(trimmed, classify_impact).ok_or_else(invalid)?),
            "effort_type" => {
                FieldUpdate::EffortType(optional_class(trimmed, classify_effort_type).ok_or_else(invalid)?)
            }
            "approach" => FieldUpdate::Approach(classify_approach(Some(trimmed))),
            "scope" => FieldUpdate::Scope(classify_scope(Some(trimmed))),
            "principal_impact" => FieldUpdate::PrincipalImpact(classify_principal_impact(Some(trimmed))),
            "progress" if has_digit => FieldUpdate::Progress(i64::from(parse_progress(Some(trimmed)))),
            "urgency" if has_digit => FieldUpdate::Urgency(i64::from(parse_urgency(Some(trimmed)))),
            "progress" | "urgency" => return Err(invalid()),
            "ongoing" => FieldUpdate::Ongoing(parse_ongoing(Some(trimmed))),
            "parent" => FieldUpdate::Parent(parse_optional_id()?),
            "related" => {
                let mut ids = BTreeSet::new();
                for part in split_names(&trimmed.replace(',', ";")) {
                    ids.insert(part.parse::<ItemId>().map_err(|_| invalid())?);
                }
                FieldUpdate::Related(ids)
            }
            other => return Err(TriageError::UnknownField(other.to_string())),
        };

        Ok(update)
    }

    pub fn field_name(&self) -> &'static str {
        match self {
            FieldUpdate::Demand(_) => "demand",
            FieldUpdate::Description(_) => "description",
            FieldUpdate::Squad(_) => "squad",
            FieldUpdate::SubSquad(_) => "sub_squad",
            FieldUpdate::Group(_) => "group",
            FieldUpdate::Notes(_) => "notes",
            FieldUpdate::Effort(_) => "effort",
            FieldUpdate::Impact(_) => "impact",
            FieldUpdate::Approach(_) => "approach",
            FieldUpdate::Scope(_) => "scope",
            FieldUpdate::PrincipalImpact(_) => "principal_impact",
            FieldUpdate::EffortType(_) => "effort_type",
            FieldUpdate::Progress(_) => "progress",
            FieldUpdate::Ongoing(_) => "ongoing",
            FieldUpdate::Urgency(_) => "urgency",
            FieldUpdate::Parent(_) => "parent",
            FieldUpdate::Related(_) => "related",
        }
    }
}

/// "" → Some(None) (clear), recognized → Some(Some(class)), unrecognized → None
fn optional_class<T>(text: &str, classify: fn(Option<&str>) -> Option<T>) -> Option<Option<T>> {
    if text.is_empty() {
        return Some(None);
    }
    classify(Some(text)).map(Some)
}

// ============================================================================
// FILTERS
// ============================================================================

/// Board/planning filters; `None` = "all"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemFilter {
    pub approach: Option<ApproachClass>,
    pub scope: Option<ScopeClass>,
    pub effort: Option<EffortClass>,
    pub impact: Option<ImpactClass>,
    /// Compared by normalized text
    pub squad: Option<String>,
    pub sub_squad: Option<String>,
}

impl ItemFilter {
    pub fn matches(&self, item: &Item) -> bool {
        let same_text = |wanted: &Option<String>, actual: &str| {
            wanted
                .as_ref()
                .map_or(true, |w| normalize_text(w) == normalize_text(actual))
        };

        self.approach.map_or(true, |a| item.approach == a)
            && self.scope.map_or(true, |s| item.scope == s)
            && self.effort.map_or(true, |e| item.effort == Some(e))
            && self.impact.map_or(true, |i| item.impact == Some(i))
            && same_text(&self.squad, &item.squad)
            && same_text(&self.sub_squad, &item.sub_squad)
    }
}

// ============================================================================
// ITEM STORE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    items: Vec<Item>,
}

impl ItemStore {
    pub fn new() -> Self {
        ItemStore { items: Vec::new() }
    }

    pub fn from_items(items: Vec<Item>) -> Self {
        ItemStore { items }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    fn get_mut(&mut self, id: ItemId) -> Result<&mut Item, TriageError> {
        self.items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(TriageError::UnknownItem(id))
    }

    fn contains(&self, id: ItemId) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    /// Swap in a whole new collection (end of an import)
    pub fn replace_all(&mut self, items: Vec<Item>) -> Vec<Item> {
        debug!(old = self.items.len(), new = items.len(), "replacing item collection");
        std::mem::replace(&mut self.items, items)
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Apply one field replacement, validating and clamping first
    pub fn apply(&mut self, id: ItemId, update: FieldUpdate) -> Result<(), TriageError> {
        if !self.contains(id) {
            return Err(TriageError::UnknownItem(id));
        }

        // Relations are checked against the whole collection before borrowing the item
        let update = match update {
            FieldUpdate::Parent(Some(parent)) if parent == id => {
                return Err(TriageError::SelfReference(id));
            }
            FieldUpdate::Parent(Some(parent)) if !self.contains(parent) => {
                return Err(TriageError::UnknownParent(parent));
            }
            FieldUpdate::Related(ids) => {
                let known: HashSet<ItemId> = self.items.iter().map(|i| i.id).collect();
                FieldUpdate::Related(
                    ids.into_iter()
                        .filter(|rid| *rid != id && known.contains(rid))
                        .collect(),
                )
            }
            other => other,
        };

        let item = self.get_mut(id)?;
        match update {
            FieldUpdate::Demand(v) => item.demand = v,
            FieldUpdate::Description(v) => item.description = v,
            FieldUpdate::Squad(v) => item.squad = v,
            FieldUpdate::SubSquad(v) => item.sub_squad = v,
            FieldUpdate::Group(v) => item.group = clean_group_label(&v),
            FieldUpdate::Notes(v) => item.notes = v,
            FieldUpdate::Effort(v) => item.effort = v,
            FieldUpdate::Impact(v) => item.impact = v,
            FieldUpdate::Approach(v) => item.approach = v,
            FieldUpdate::Scope(v) => item.scope = v,
            FieldUpdate::PrincipalImpact(v) => item.principal_impact = v,
            FieldUpdate::EffortType(v) => item.effort_type = v,
            FieldUpdate::Progress(v) => item.progress = v.clamp(0, MAX_PROGRESS as i64) as u8,
            FieldUpdate::Ongoing(v) => item.ongoing = v,
            FieldUpdate::Urgency(v) => item.urgency = v.clamp(0, MAX_URGENCY as i64) as u8,
            FieldUpdate::Parent(v) => item.parent_id = v,
            FieldUpdate::Related(v) => item.related_ids = v,
        }

        debug!(id, "applied field update");
        Ok(())
    }

    /// Drop an item onto a board cell
    pub fn place(&mut self, id: ItemId, effort: EffortClass, impact: ImpactClass) -> Result<(), TriageError> {
        let item = self.get_mut(id)?;
        item.effort = Some(effort);
        item.impact = Some(impact);
        Ok(())
    }

    /// Send an item back to the backlog (clears both axes)
    pub fn to_backlog(&mut self, id: ItemId) -> Result<(), TriageError> {
        let item = self.get_mut(id)?;
        item.effort = None;
        item.impact = None;
        Ok(())
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn board(&self) -> Vec<&Item> {
        self.items.iter().filter(|i| i.is_on_board()).collect()
    }

    pub fn backlog(&self) -> Vec<&Item> {
        self.items.iter().filter(|i| !i.is_on_board()).collect()
    }

    /// Items in one board cell, in collection order
    pub fn cell(&self, effort: EffortClass, impact: ImpactClass) -> Vec<&Item> {
        self.items
            .iter()
            .filter(|i| i.board_position() == Some((effort, impact)))
            .collect()
    }

    pub fn filter(&self, filter: &ItemFilter) -> Vec<&Item> {
        self.items.iter().filter(|i| filter.matches(i)).collect()
    }

    /// Planning order: impact Altíssimo→Baixo→unset, effort Baixo→Alto→unset, then name
    ///
    /// Unclassified items sort after every classified one, so the top of the
    /// list is always something already triaged.
    pub fn sorted_backlog(&self) -> Vec<&Item> {
        let mut sorted: Vec<&Item> = self.items.iter().collect();
        sorted.sort_by(|a, b| planning_order(a, b));
        sorted
    }

    /// Distinct non-empty squads, sorted
    pub fn squads(&self) -> Vec<String> {
        distinct(self.items.iter().map(|i| i.squad.as_str()))
    }

    pub fn sub_squads(&self) -> Vec<String> {
        distinct(self.items.iter().map(|i| i.sub_squad.as_str()))
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn planning_order(a: &Item, b: &Item) -> Ordering {
    // Descending impact, unset last
    let impact_rank = |i: &Item| i.impact.map_or(4, |c| 3 - c as u8);
    // Ascending effort, unset last
    let effort_rank = |i: &Item| i.effort.map_or(3, |c| c as u8);

    impact_rank(a)
        .cmp(&impact_rank(b))
        .then_with(|| effort_rank(a).cmp(&effort_rank(b)))
        .then_with(|| a.normalized_name().cmp(&b.normalized_name()))
}

// ============================================================================
// TESTS
// ============================================================================
