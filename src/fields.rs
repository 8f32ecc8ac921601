// 🏛️ Header Resolver - Field Registry
// Maps whatever headers a spreadsheet carries onto the engine's canonical fields

use crate::import::ImportMode;
use crate::normalize::normalize_text;
use crate::parser::RawRecord;
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::HashMap;

// ============================================================================
// CANONICAL FIELDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalField {
    Demand,
    Squad,
    SubSquad,
    Group,
    EffortRaw,
    ImpactRaw,
    ApproachRaw,
    ScopeRaw,
    PrincipalImpactRaw,
    Description,
    AdditionalNotes,
    Progress,
    Ongoing,
    EffortType,
    Urgency,
    // Only present in files produced by the export serializer
    Notes,
    Parent,
    Related,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 18] = [
        CanonicalField::Demand,
        CanonicalField::Squad,
        CanonicalField::SubSquad,
        CanonicalField::Group,
        CanonicalField::EffortRaw,
        CanonicalField::ImpactRaw,
        CanonicalField::ApproachRaw,
        CanonicalField::ScopeRaw,
        CanonicalField::PrincipalImpactRaw,
        CanonicalField::Description,
        CanonicalField::AdditionalNotes,
        CanonicalField::Progress,
        CanonicalField::Ongoing,
        CanonicalField::EffortType,
        CanonicalField::Urgency,
        CanonicalField::Notes,
        CanonicalField::Parent,
        CanonicalField::Related,
    ];

    /// Short internal key
    pub fn key(&self) -> &'static str {
        match self {
            CanonicalField::Demand => "demand",
            CanonicalField::Squad => "squad",
            CanonicalField::SubSquad => "sub_squad",
            CanonicalField::Group => "group",
            CanonicalField::EffortRaw => "effort_raw",
            CanonicalField::ImpactRaw => "impact_raw",
            CanonicalField::ApproachRaw => "approach_raw",
            CanonicalField::ScopeRaw => "scope_raw",
            CanonicalField::PrincipalImpactRaw => "principal_impact_raw",
            CanonicalField::Description => "description",
            CanonicalField::AdditionalNotes => "additional_notes",
            CanonicalField::Progress => "progress",
            CanonicalField::Ongoing => "ongoing",
            CanonicalField::EffortType => "effort_type",
            CanonicalField::Urgency => "urgency",
            CanonicalField::Notes => "notes",
            CanonicalField::Parent => "parent",
            CanonicalField::Related => "related",
        }
    }
}

// ============================================================================
// FIELD DEFINITION
// ============================================================================

/// FieldDefinition - which headers feed one canonical field
///
/// `header` is the exact survey question text; `synonyms` are accepted
/// aliases in precedence order; `export_column` is the column the export
/// serializer writes this field to (if it writes it at all).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub field: CanonicalField,
    pub header: String,
    pub synonyms: Vec<String>,
    pub export_column: Option<String>,
}

impl FieldDefinition {
    pub fn new(field: CanonicalField, header: impl Into<String>) -> Self {
        FieldDefinition {
            field,
            header: header.into(),
            synonyms: Vec::new(),
            export_column: None,
        }
    }

    /// Builder: add an accepted alias (checked after the ones already added)
    pub fn with_synonym(mut self, synonym: impl Into<String>) -> Self {
        self.synonyms.push(synonym.into());
        self
    }

    /// Builder: name of the column written by the export serializer
    pub fn with_export_column(mut self, column: impl Into<String>) -> Self {
        self.export_column = Some(column.into());
        self
    }

    /// Candidate header keys in lookup order
    ///
    /// A classified file is our own export: its derived column is the
    /// authoritative value, so it is probed before the raw survey column.
    pub fn candidates(&self, mode: ImportMode) -> Vec<&str> {
        let mut keys = Vec::with_capacity(self.synonyms.len() + 2);
        if mode == ImportMode::Classified {
            if let Some(column) = &self.export_column {
                keys.push(column.as_str());
            }
        }
        keys.push(self.header.as_str());
        keys.extend(self.synonyms.iter().map(String::as_str));
        keys
    }
}

// ============================================================================
// FIELD REGISTRY
// ============================================================================

/// FieldRegistry - the fixed demand schema
pub struct FieldRegistry {
    definitions: HashMap<CanonicalField, FieldDefinition>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        let mut registry = FieldRegistry {
            definitions: HashMap::new(),
        };
        registry.register_demand_fields();
        registry
    }

    fn register_demand_fields(&mut self) {
        // ====================================================================
        // IDENTITY & OWNERSHIP
        // ====================================================================

        self.register(
            FieldDefinition::new(CanonicalField::Demand, "Demanda")
                .with_synonym("demanda")
                .with_synonym("Nome da demanda")
                .with_synonym("Título")
                .with_export_column("Demanda"),
        );

        self.register(
            FieldDefinition::new(CanonicalField::Squad, "Squad")
                .with_synonym("squad")
                .with_synonym("Time")
                .with_synonym("Equipe")
                .with_export_column("Squad"),
        );

        self.register(
            FieldDefinition::new(CanonicalField::SubSquad, "Sub-squad")
                .with_synonym("SubSquad")
                .with_synonym("Sub squad")
                .with_export_column("SubSquad"),
        );

        self.register(
            FieldDefinition::new(CanonicalField::Group, "Grupo")
                .with_synonym("grupo")
                .with_synonym("Agrupamento")
                .with_export_column("Grupo"),
        );

        // ====================================================================
        // SURVEY QUESTIONS (classified)
        // ====================================================================

        self.register(
            FieldDefinition::new(
                CanonicalField::EffortRaw,
                "Esforço técnico para entregar em produção",
            )
            .with_synonym("Esforço técnico")
            .with_synonym("Esforço")
            .with_export_column("Esforco_Class"),
        );

        self.register(
            FieldDefinition::new(
                CanonicalField::ImpactRaw,
                "Qual o impacto econômico que poderá trazer?",
            )
            .with_synonym("Impacto econômico")
            .with_synonym("Impacto")
            .with_export_column("Impacto_Class"),
        );

        self.register(
            FieldDefinition::new(
                CanonicalField::ApproachRaw,
                "Qual o tipo de abordagem (tratar como problema ou oportunidade) [problema = interno e repetido; oportunidade = externo e competição]",
            )
            .with_synonym("Tipo de abordagem")
            .with_synonym("Abordagem")
            .with_export_column("Abordagem_Class"),
        );

        self.register(
            FieldDefinition::new(
                CanonicalField::ScopeRaw,
                "Qual o tipo de escopo (operação: core ou o que já fazemos, melhorias, correções; inovação não temos ou conhecemos parcialmente)?",
            )
            .with_synonym("Tipo de escopo")
            .with_synonym("Escopo")
            .with_export_column("Escopo_Class"),
        );

        self.register(
            FieldDefinition::new(
                CanonicalField::PrincipalImpactRaw,
                "Qual o principal impacto esperado com a entrega?",
            )
            .with_synonym("Principal impacto")
            .with_synonym("Impacto principal")
            .with_export_column("ImpactoPrincipal_Class"),
        );

        self.register(
            FieldDefinition::new(CanonicalField::EffortType, "Qual o tipo de esforço?")
                .with_synonym("Tipo de esforço")
                .with_synonym("TipoEsforco")
                .with_export_column("TipoEsforco"),
        );

        // ====================================================================
        // FREE TEXT
        // ====================================================================

        self.register(
            FieldDefinition::new(CanonicalField::Description, "Descreva a demanda")
                .with_synonym("Descrição")
                .with_synonym("descricao")
                .with_export_column("Descricao"),
        );

        self.register(
            FieldDefinition::new(CanonicalField::AdditionalNotes, "Observações complementares")
                .with_synonym("Observação complementar")
                .with_synonym("Observações")
                .with_export_column("Observacao_Complementar"),
        );

        self.register(
            FieldDefinition::new(CanonicalField::Notes, "Notas")
                .with_synonym("Anotações")
                .with_export_column("Notas"),
        );

        // ====================================================================
        // STATUS
        // ====================================================================

        self.register(
            FieldDefinition::new(CanonicalField::Progress, "Qual o progresso atual da demanda?")
                .with_synonym("Progresso")
                .with_synonym("% concluído")
                .with_export_column("Progresso"),
        );

        self.register(
            FieldDefinition::new(CanonicalField::Ongoing, "A demanda já está em andamento?")
                .with_synonym("Em andamento")
                .with_synonym("Andamento")
                .with_export_column("Andamento"),
        );

        self.register(
            FieldDefinition::new(CanonicalField::Urgency, "Qual o nível de urgência?")
                .with_synonym("Urgência")
                .with_synonym("Nível de urgência")
                .with_export_column("Urgencia"),
        );

        // ====================================================================
        // RELATIONS (exported as names)
        // ====================================================================

        self.register(
            FieldDefinition::new(CanonicalField::Parent, "Pai")
                .with_synonym("Demanda pai")
                .with_export_column("Pai"),
        );

        self.register(
            FieldDefinition::new(CanonicalField::Related, "Relacionamentos")
                .with_synonym("Demandas relacionadas")
                .with_export_column("Relacionamentos"),
        );
    }

    pub fn register(&mut self, definition: FieldDefinition) {
        self.definitions.insert(definition.field, definition);
    }

    pub fn get(&self, field: CanonicalField) -> Option<&FieldDefinition> {
        self.definitions.get(&field)
    }

    pub fn field_count(&self) -> usize {
        self.definitions.len()
    }

    /// Derived export column for a field, if the serializer writes one
    pub fn export_column(&self, field: CanonicalField) -> Option<&str> {
        self.get(field).and_then(|d| d.export_column.as_deref())
    }

    /// Ordered candidate keys for a field under an import mode
    pub fn candidates(&self, field: CanonicalField, mode: ImportMode) -> Vec<&str> {
        self.get(field)
            .map(|d| d.candidates(mode))
            .unwrap_or_default()
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// HEADER RESOLUTION
// ============================================================================

/// HeaderResolver - lookup view over one record
///
/// Exact key match first; the normalized-key index is built at most once
/// per record, and only if some exact lookup misses.
pub struct HeaderResolver<'a> {
    record: &'a RawRecord,
    normalized: OnceCell<HashMap<String, &'a str>>,
}

impl<'a> HeaderResolver<'a> {
    pub fn new(record: &'a RawRecord) -> Self {
        HeaderResolver {
            record,
            normalized: OnceCell::new(),
        }
    }

    pub fn record(&self) -> &'a RawRecord {
        self.record
    }

    /// First candidate to match wins; None when nothing matches
    pub fn resolve(&self, candidates: &[&str]) -> Option<&'a str> {
        for key in candidates {
            if let Some(value) = self.record.get(*key) {
                return Some(value.as_str());
            }
        }

        let index = self.normalized.get_or_init(|| {
            let mut index = HashMap::with_capacity(self.record.len());
            for key in self.record.keys() {
                // Later duplicates (after normalization) win, like a plain map insert
                index.insert(normalize_text(key), key.as_str());
            }
            index
        });

        for key in candidates {
            if let Some(original_key) = index.get(&normalize_text(key)) {
                return self.record.get(*original_key).map(String::as_str);
            }
        }

        None
    }

    /// Resolve a canonical field through the registry
    pub fn field(
        &self,
        registry: &FieldRegistry,
        field: CanonicalField,
        mode: ImportMode,
    ) -> Option<&'a str> {
        self.resolve(&registry.candidates(field, mode))
    }
}

/// One-shot lookup: `resolve(record, candidates) -> value | unset`
pub fn resolve<'a>(record: &'a RawRecord, candidates: &[&str]) -> Option<&'a str> {
    HeaderResolver::new(record).resolve(candidates)
}

// ============================================================================
// TESTS
// ============================================================================
