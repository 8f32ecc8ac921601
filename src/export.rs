// 📤 Export Serializer
// Items → delimited text: provenance columns (deduplicated by normalized header)
// followed by the derived columns. A derived column whose name matches an
// original column overrides that column's cells in place.

use crate::item::{Item, ItemId};
use crate::normalize::normalize_text;
use anyhow::{Context, Result};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// CELL VALUES
// ============================================================================

/// Value of one derived cell, resolved per column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Bool(bool),
}

impl CellValue {
    pub fn render(&self) -> String {
        match self {
            CellValue::Text(text) => text.clone(),
            CellValue::Integer(n) => n.to_string(),
            CellValue::Bool(true) => "Sim".to_string(),
            CellValue::Bool(false) => "Não".to_string(),
        }
    }
}

/// id → demand name, for rendering relations as names
pub struct NameIndex<'a> {
    by_id: HashMap<ItemId, &'a str>,
}

impl<'a> NameIndex<'a> {
    pub fn new(items: &'a [Item]) -> Self {
        NameIndex {
            by_id: items.iter().map(|i| (i.id, i.demand.as_str())).collect(),
        }
    }

    pub fn name(&self, id: ItemId) -> Option<&'a str> {
        self.by_id.get(&id).copied()
    }
}

// ============================================================================
// DERIVED COLUMNS
// ============================================================================

pub struct DerivedColumn {
    pub name: &'static str,
    pub value: fn(&Item, &NameIndex) -> CellValue,
}

fn text(value: &str) -> CellValue {
    CellValue::Text(value.to_string())
}

fn label_or_empty(label: Option<&'static str>) -> CellValue {
    text(label.unwrap_or(""))
}

fn demand(item: &Item, _: &NameIndex) -> CellValue {
    text(&item.demand)
}

fn squad(item: &Item, _: &NameIndex) -> CellValue {
    text(&item.squad)
}

fn sub_squad(item: &Item, _: &NameIndex) -> CellValue {
    text(&item.sub_squad)
}

fn group(item: &Item, _: &NameIndex) -> CellValue {
    text(&item.group)
}

fn description(item: &Item, _: &NameIndex) -> CellValue {
    text(&item.description)
}

fn effort(item: &Item, _: &NameIndex) -> CellValue {
    label_or_empty(item.effort.map(|c| c.label()))
}

fn impact(item: &Item, _: &NameIndex) -> CellValue {
    label_or_empty(item.impact.map(|c| c.label()))
}

fn approach(item: &Item, _: &NameIndex) -> CellValue {
    text(item.approach.label())
}

fn scope(item: &Item, _: &NameIndex) -> CellValue {
    text(item.scope.label())
}

fn principal_impact(item: &Item, _: &NameIndex) -> CellValue {
    text(item.principal_impact.label())
}

fn effort_type(item: &Item, _: &NameIndex) -> CellValue {
    label_or_empty(item.effort_type.map(|c| c.label()))
}

// "N%": a bare 1 would come back as a fraction (100%)
fn progress(item: &Item, _: &NameIndex) -> CellValue {
    CellValue::Text(format!("{}%", item.progress))
}

fn ongoing(item: &Item, _: &NameIndex) -> CellValue {
    CellValue::Bool(item.ongoing)
}

fn urgency(item: &Item, _: &NameIndex) -> CellValue {
    CellValue::Integer(item.urgency as i64)
}

fn parent(item: &Item, names: &NameIndex) -> CellValue {
    text(item.parent_id.and_then(|id| names.name(id)).unwrap_or(""))
}

fn related(item: &Item, names: &NameIndex) -> CellValue {
    let joined = item
        .related_ids
        .iter()
        .filter_map(|id| names.name(*id))
        .collect::<Vec<_>>()
        .join("; ");
    CellValue::Text(joined)
}

fn notes(item: &Item, _: &NameIndex) -> CellValue {
    text(&item.notes)
}

fn additional_notes(item: &Item, _: &NameIndex) -> CellValue {
    text(&item.additional_notes)
}

fn id(item: &Item, _: &NameIndex) -> CellValue {
    CellValue::Integer(item.id as i64)
}

/// Derived columns, in output order
pub static DERIVED_COLUMNS: &[DerivedColumn] = &[
    DerivedColumn { name: "Demanda", value: demand },
    DerivedColumn { name: "Squad", value: squad },
    DerivedColumn { name: "SubSquad", value: sub_squad },
    DerivedColumn { name: "Grupo", value: group },
    DerivedColumn { name: "Descricao", value: description },
    DerivedColumn { name: "Esforco_Class", value: effort },
    DerivedColumn { name: "Impacto_Class", value: impact },
    DerivedColumn { name: "Abordagem_Class", value: approach },
    DerivedColumn { name: "Escopo_Class", value: scope },
    DerivedColumn { name: "ImpactoPrincipal_Class", value: principal_impact },
    DerivedColumn { name: "TipoEsforco", value: effort_type },
    DerivedColumn { name: "Progresso", value: progress },
    DerivedColumn { name: "Andamento", value: ongoing },
    DerivedColumn { name: "Urgencia", value: urgency },
    DerivedColumn { name: "Pai", value: parent },
    DerivedColumn { name: "Relacionamentos", value: related },
    DerivedColumn { name: "Notas", value: notes },
    DerivedColumn { name: "Observacao_Complementar", value: additional_notes },
    DerivedColumn { name: "Id", value: id },
];

// ============================================================================
// LAYOUT
// ============================================================================

enum ColumnSource {
    /// Passthrough from `Item::original`, looked up by normalized header
    Original(String),
    Derived(&'static DerivedColumn),
}

struct Column {
    header: String,
    source: ColumnSource,
}

/// Original headers (first occurrence per normalized key) then non-colliding derived ones
fn layout(items: &[Item]) -> Vec<Column> {
    let derived_by_key: HashMap<String, &'static DerivedColumn> = DERIVED_COLUMNS
        .iter()
        .map(|d| (normalize_text(d.name), d))
        .collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut overridden: HashSet<&'static str> = HashSet::new();
    let mut columns = Vec::new();

    for item in items {
        for header in item.original.keys() {
            let key = normalize_text(header);
            if !seen.insert(key.clone()) {
                continue;
            }

            let source = match derived_by_key.get(&key) {
                Some(&derived) => {
                    overridden.insert(derived.name);
                    ColumnSource::Derived(derived)
                }
                None => ColumnSource::Original(key),
            };
            columns.push(Column {
                header: header.clone(),
                source,
            });
        }
    }

    for derived in DERIVED_COLUMNS {
        if !overridden.contains(derived.name) {
            columns.push(Column {
                header: derived.name.to_string(),
                source: ColumnSource::Derived(derived),
            });
        }
    }

    columns
}

/// Normalized header → value, first occurrence wins
fn original_cells(item: &Item) -> HashMap<String, &str> {
    let mut cells = HashMap::with_capacity(item.original.len());
    for (header, value) in &item.original {
        cells.entry(normalize_text(header)).or_insert(value.as_str());
    }
    cells
}

// ============================================================================
// EXPORT SERIALIZER
// ============================================================================

#[derive(Debug, Clone)]
pub struct ExportSerializer {
    delimiter: u8,
}

impl ExportSerializer {
    pub fn new() -> Self {
        ExportSerializer { delimiter: b',' }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Header names in output order
    pub fn headers(&self, items: &[Item]) -> Vec<String> {
        layout(items).into_iter().map(|c| c.header).collect()
    }

    pub fn serialize(&self, items: &[Item]) -> Result<String> {
        let columns = layout(items);
        let names = NameIndex::new(items);

        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer.write_record(columns.iter().map(|c| c.header.as_str()))?;

        for item in items {
            let originals = original_cells(item);
            let row: Vec<String> = columns
                .iter()
                .map(|column| match &column.source {
                    ColumnSource::Original(key) => {
                        originals.get(key).map(|v| v.to_string()).unwrap_or_default()
                    }
                    ColumnSource::Derived(derived) => (derived.value)(item, &names).render(),
                })
                .collect();
            writer.write_record(&row)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush export buffer: {}", e))?;
        let text = String::from_utf8(bytes).context("Export produced invalid UTF-8")?;

        debug!(rows = items.len(), columns = columns.len(), "serialized export");
        Ok(text)
    }
}

impl Default for ExportSerializer {
    fn default() -> Self {
        Self::new()
    }
}

/// `serialize(items) -> text` with the default comma delimiter
pub fn serialize(items: &[Item]) -> Result<String> {
    ExportSerializer::new().serialize(items)
}

pub fn export_to_file(items: &[Item], path: &Path) -> Result<()> {
    let text = serialize(items)?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write export: {}", path.display()))?;

    info!(path = %path.display(), items = items.len(), "exported items");
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_rows, RawRecord};
    use crate::rules::{EffortClass, ImpactClass};
    use tempfile::TempDir;

    fn record(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_headers_originals_then_derived() {
        let mut item = Item::new(1, "A");
        item.original = record(&[("Qual o nível de urgência?", "3"), ("Extra", "x")]);

        let headers = ExportSerializer::new().headers(&[item]);

        assert_eq!(headers[0], "Qual o nível de urgência?");
        assert_eq!(headers[1], "Extra");
        assert_eq!(headers[2], "Demanda");
        assert_eq!(headers.last().map(String::as_str), Some("Id"));
        assert_eq!(headers.len(), 2 + DERIVED_COLUMNS.len());
    }

    #[test]
    fn test_colliding_original_column_is_overridden_in_place() {
        let mut item = Item::new(1, "Revisar contrato");
        item.squad = "Squad editado".to_string();
        item.urgency = 4;
        item.original = record(&[
            ("Demanda", "Revisar contrato"),
            ("squad", "Squad antigo"),
            ("Urgência", "1"),
        ]);

        let text = serialize(&[item]).unwrap();
        let rows = parse_rows(&text);

        // No duplicate Squad/Urgencia/Demanda columns
        assert_eq!(rows[0].len(), 3 + DERIVED_COLUMNS.len() - 3);
        assert_eq!(rows[0][1], "squad");
        assert_eq!(rows[1][1], "Squad editado");
        assert_eq!(rows[0][2], "Urgência");
        assert_eq!(rows[1][2], "4");
        assert!(!rows[0].iter().any(|h| h == "Urgencia"));
    }

    #[test]
    fn test_original_columns_deduplicated_across_items() {
        let mut a = Item::new(1, "A");
        a.original = record(&[("Extra", "1")]);
        let mut b = Item::new(2, "B");
        b.original = record(&[("EXTRA ", "2"), ("Outra", "y")]);

        let rows = parse_rows(&serialize(&[a, b]).unwrap());

        let extra_columns = rows[0].iter().filter(|h| normalize_text(h) == "extra").count();
        assert_eq!(extra_columns, 1);
        assert_eq!(rows[0][0], "Extra");
        assert_eq!(rows[2][0], "2");
        assert_eq!(rows[1][1], "");
    }

    #[test]
    fn test_rendering_of_derived_values() {
        let mut a = Item::new(1, "Mãe");
        a.effort = Some(EffortClass::Medium);
        a.impact = Some(ImpactClass::VeryHigh);
        a.progress = 1;
        a.ongoing = true;
        let mut b = Item::new(2, "Filho");
        b.parent_id = Some(1);
        b.related_ids = [1, 3].into_iter().collect();
        let mut c = Item::new(3, "Outro");
        c.related_ids = [1, 2].into_iter().collect();

        let items = vec![a, b, c];
        let rows = parse_rows(&serialize(&items).unwrap());
        let col = |name: &str| rows[0].iter().position(|h| h == name).unwrap();

        assert_eq!(rows[1][col("Esforco_Class")], "Médio");
        assert_eq!(rows[1][col("Impacto_Class")], "Altíssimo");
        assert_eq!(rows[1][col("Progresso")], "1%");
        assert_eq!(rows[1][col("Andamento")], "Sim");
        assert_eq!(rows[1][col("Abordagem_Class")], "Outros");
        assert_eq!(rows[2][col("Esforco_Class")], "");
        assert_eq!(rows[2][col("Andamento")], "Não");
        assert_eq!(rows[2][col("Pai")], "Mãe");
        assert_eq!(rows[2][col("Relacionamentos")], "Mãe; Outro");
        assert_eq!(rows[3][col("Relacionamentos")], "Mãe; Filho");
        assert_eq!(rows[3][col("Id")], "3");
    }

    #[test]
    fn test_cells_are_quote_escaped() {
        let mut item = Item::new(1, "Revisar, \"urgente\"");
        item.notes = "linha 1\nlinha 2".to_string();

        let text = serialize(&[item]).unwrap();
        assert!(text.contains("\"Revisar, \"\"urgente\"\"\""));
        assert!(text.contains("\"linha 1\nlinha 2\""));

        let rows = parse_rows(&text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0], "Revisar, \"urgente\"");
    }

    #[test]
    fn test_empty_collection_writes_header_only() {
        let text = serialize(&[]).unwrap();
        let rows = parse_rows(&text);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), DERIVED_COLUMNS.len());
    }

    #[test]
    fn test_export_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("base_classificada.csv");

        export_to_file(&[Item::new(1, "A")], &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Demanda,"));
    }
}
