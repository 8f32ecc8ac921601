// 🧱 Item Builder
// Resolved record + classification → Item with a sequential id (1-based, record order)

use crate::fields::{CanonicalField, FieldRegistry, HeaderResolver};
use crate::import::ImportMode;
use crate::item::{Item, ItemId};
use crate::normalize::clean_group_label;
use crate::parser::RawRecord;
use crate::rules::{is_bare_urgency, Classification, RawAnswers};
use tracing::{debug, warn};

// ============================================================================
// BUILD OUTPUT
// ============================================================================

/// Relation names read from a classified file, resolved to ids later
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingLinks {
    pub parent: Option<String>,
    pub related: Vec<String>,
}

impl PendingLinks {
    pub fn is_empty(&self) -> bool {
        self.parent.is_none() && self.related.is_empty()
    }
}

/// Items plus, index-aligned, the relation names each one carried
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub items: Vec<Item>,
    pub links: Vec<PendingLinks>,
    /// Rows whose Grupo/Urgencia cells were swapped back
    pub repaired: usize,
}

// ============================================================================
// ITEM BUILDER
// ============================================================================

pub struct ItemBuilder {
    registry: FieldRegistry,
}

impl ItemBuilder {
    pub fn new() -> Self {
        ItemBuilder {
            registry: FieldRegistry::new(),
        }
    }

    pub fn with_registry(registry: FieldRegistry) -> Self {
        ItemBuilder { registry }
    }

    /// Build one item per record; ids are 1..=n in record order
    pub fn build(&self, records: Vec<RawRecord>, mode: ImportMode) -> BuildOutput {
        let mut output = BuildOutput {
            items: Vec::with_capacity(records.len()),
            links: Vec::with_capacity(records.len()),
            repaired: 0,
        };

        for (idx, record) in records.into_iter().enumerate() {
            let id = idx as ItemId + 1;
            let (item, links, repaired) = self.build_one(id, record, mode);
            if repaired {
                output.repaired += 1;
            }
            output.items.push(item);
            output.links.push(links);
        }

        debug!(
            items = output.items.len(),
            repaired = output.repaired,
            ?mode,
            "built items"
        );
        output
    }

    fn build_one(&self, id: ItemId, record: RawRecord, mode: ImportMode) -> (Item, PendingLinks, bool) {
        let resolver = HeaderResolver::new(&record);
        let get = |field: CanonicalField| resolver.field(&self.registry, field, mode);

        let mut group = get(CanonicalField::Group);
        let mut urgency = get(CanonicalField::Urgency);
        let repaired = mode == ImportMode::Classified && swap_legacy_group_urgency(&mut group, &mut urgency);
        if repaired {
            warn!(
                id,
                demand = get(CanonicalField::Demand).unwrap_or(""),
                "Grupo/Urgencia look swapped, repairing"
            );
        }

        let classification = Classification::from_answers(&RawAnswers {
            effort: get(CanonicalField::EffortRaw),
            impact: get(CanonicalField::ImpactRaw),
            approach: get(CanonicalField::ApproachRaw),
            scope: get(CanonicalField::ScopeRaw),
            principal_impact: get(CanonicalField::PrincipalImpactRaw),
            effort_type: get(CanonicalField::EffortType),
            ongoing: get(CanonicalField::Ongoing),
            progress: get(CanonicalField::Progress),
            urgency,
        });

        let text = |field: CanonicalField| get(field).map(|v| v.trim().to_string()).unwrap_or_default();

        let mut item = Item::new(id, text(CanonicalField::Demand));
        item.description = text(CanonicalField::Description);
        item.squad = text(CanonicalField::Squad);
        item.sub_squad = text(CanonicalField::SubSquad);
        item.group = group.map(clean_group_label).unwrap_or_default();
        item.notes = text(CanonicalField::Notes);
        item.additional_notes = text(CanonicalField::AdditionalNotes);

        item.effort = classification.effort;
        item.impact = classification.impact;
        item.approach = classification.approach;
        item.scope = classification.scope;
        item.principal_impact = classification.principal_impact;
        item.effort_type = classification.effort_type;
        item.progress = classification.progress;
        item.ongoing = classification.ongoing;
        item.urgency = classification.urgency;

        let links = match mode {
            ImportMode::Classified => PendingLinks {
                parent: get(CanonicalField::Parent)
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string),
                related: split_names(get(CanonicalField::Related).unwrap_or("")),
            },
            ImportMode::Fresh => PendingLinks::default(),
        };

        item.original = record;
        (item, links, repaired)
    }
}

impl Default for ItemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a "; "-joined relation cell into names
pub fn split_names(cell: &str) -> Vec<String> {
    cell.split(';')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Legacy exports wrote the urgency number under Grupo and the group label
/// under Urgencia. Swap back when Urgencia has no digit and Grupo is 0..=5.
fn swap_legacy_group_urgency<'a>(group: &mut Option<&'a str>, urgency: &mut Option<&'a str>) -> bool {
    let urgency_has_digit = urgency.map_or(false, |u| u.chars().any(|c| c.is_ascii_digit()));
    let group_is_urgency = group.map_or(false, is_bare_urgency);

    if !urgency_has_digit && group_is_urgency {
        std::mem::swap(group, urgency);
        true
    } else {
        false
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::TabularParser;
    use crate::rules::{ApproachClass, EffortClass, EffortType, ImpactClass, ScopeClass};

    fn records(text: &str) -> Vec<RawRecord> {
        TabularParser::new().parse_records(text)
    }

    #[test]
    fn test_ids_are_sequential_in_record_order() {
        let output = ItemBuilder::new().build(
            records("Demanda\nA\nB\nC\n"),
            ImportMode::Fresh,
        );
        let ids: Vec<ItemId> = output.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(output.links.len(), 3);
    }

    #[test]
    fn test_fresh_survey_row() {
        let text = "Demanda,Squad,Esforço técnico para entregar em produção,Qual o impacto econômico que poderá trazer?,Tipo de abordagem,Tipo de escopo,Qual o tipo de esforço?,A demanda já está em andamento?,Qual o progresso atual da demanda?,Qual o nível de urgência?\n\
                    Revisar contrato,Pagamentos,Baixo,Altíssimo  ,Resolver um problema,Operação do core,Tarefa,Sim,0.75,nível 3\n";
        let output = ItemBuilder::new().build(records(text), ImportMode::Fresh);
        let item = &output.items[0];

        assert_eq!(item.demand, "Revisar contrato");
        assert_eq!(item.squad, "Pagamentos");
        assert_eq!(item.effort, Some(EffortClass::Low));
        assert_eq!(item.impact, Some(ImpactClass::VeryHigh));
        assert_eq!(item.approach, ApproachClass::Problem);
        assert_eq!(item.scope, ScopeClass::Operation);
        assert_eq!(item.effort_type, Some(EffortType::Task));
        assert!(item.ongoing);
        assert_eq!(item.progress, 75);
        assert_eq!(item.urgency, 3);
        assert_eq!(item.original.get("Squad").map(String::as_str), Some("Pagamentos"));
        assert!(output.links[0].is_empty());
    }

    #[test]
    fn test_missing_columns_give_defaults() {
        let output = ItemBuilder::new().build(records("Demanda\nSó o nome\n"), ImportMode::Fresh);
        let item = &output.items[0];

        assert_eq!(item.effort, None);
        assert_eq!(item.impact, None);
        assert_eq!(item.approach, ApproachClass::Other);
        assert_eq!(item.progress, 0);
        assert_eq!(item.urgency, 0);
        assert_eq!(item.squad, "");
    }

    #[test]
    fn test_group_label_is_capped() {
        let text = format!("Demanda,Grupo\nA,{}\n", "x".repeat(90));
        let output = ItemBuilder::new().build(records(&text), ImportMode::Fresh);
        assert_eq!(output.items[0].group.chars().count(), 60);
    }

    #[test]
    fn test_classified_mode_reads_relation_names() {
        let text = "Demanda,Pai,Relacionamentos\nFilho,Mãe, \nMãe,,Filho; Outro ;\n";
        let output = ItemBuilder::new().build(records(text), ImportMode::Classified);

        assert_eq!(output.links[0].parent.as_deref(), Some("Mãe"));
        assert!(output.links[0].related.is_empty());
        assert_eq!(output.links[1].parent, None);
        assert_eq!(output.links[1].related, vec!["Filho", "Outro"]);
    }

    #[test]
    fn test_fresh_mode_ignores_relation_names() {
        let output = ItemBuilder::new().build(records("Demanda,Pai\nFilho,Mãe\n"), ImportMode::Fresh);
        assert!(output.links[0].is_empty());
    }

    #[test]
    fn test_classified_mode_prefers_derived_columns() {
        let text = "Demanda,Qual o impacto econômico que poderá trazer?,Impacto_Class\nA,Baixo,Altíssimo\n";
        let fresh = ItemBuilder::new().build(records(text), ImportMode::Fresh);
        let classified = ItemBuilder::new().build(records(text), ImportMode::Classified);

        assert_eq!(fresh.items[0].impact, Some(ImpactClass::Low));
        assert_eq!(classified.items[0].impact, Some(ImpactClass::VeryHigh));
    }

    #[test]
    fn test_legacy_group_urgency_swap() {
        let text = "Demanda,Grupo,Urgencia\nA,4,Cobrança\nB,Cobrança,2\n";
        let output = ItemBuilder::new().build(records(text), ImportMode::Classified);

        assert_eq!(output.repaired, 1);
        assert_eq!(output.items[0].urgency, 4);
        assert_eq!(output.items[0].group, "Cobrança");
        assert_eq!(output.items[1].urgency, 2);
        assert_eq!(output.items[1].group, "Cobrança");
    }

    #[test]
    fn test_legacy_swap_only_in_classified_mode() {
        let text = "Demanda,Grupo,Urgencia\nA,4,Cobrança\n";
        let output = ItemBuilder::new().build(records(text), ImportMode::Fresh);

        assert_eq!(output.repaired, 0);
        assert_eq!(output.items[0].group, "4");
        assert_eq!(output.items[0].urgency, 0);
    }

    #[test]
    fn test_split_names() {
        assert_eq!(split_names("A; B;;  C "), vec!["A", "B", "C"]);
        assert!(split_names("  ").is_empty());
    }
}
