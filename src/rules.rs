// 🏷️ Classification Rules - Rules as Data
// Ordered, normalized prefix/substring tables mapping survey answers to closed enums

use crate::normalize::normalize_opt;
use serde::{Deserialize, Serialize};

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Normalized text starts with the pattern
    Prefix,
    /// Normalized text contains the pattern anywhere
    Contains,
}

/// PatternRule - one (pattern → value) entry of an ordered rule table
///
/// Patterns are written already normalized (lowercase, no diacritics).
#[derive(Debug, Clone, Copy)]
pub struct PatternRule<T: 'static> {
    pub kind: MatchKind,
    pub pattern: &'static str,
    pub value: T,
}

impl<T: Copy> PatternRule<T> {
    pub const fn prefix(pattern: &'static str, value: T) -> Self {
        PatternRule {
            kind: MatchKind::Prefix,
            pattern,
            value,
        }
    }

    pub const fn contains(pattern: &'static str, value: T) -> Self {
        PatternRule {
            kind: MatchKind::Contains,
            pattern,
            value,
        }
    }

    /// Check if the rule matches an already-normalized text
    pub fn matches(&self, normalized: &str) -> bool {
        match self.kind {
            MatchKind::Prefix => normalized.starts_with(self.pattern),
            MatchKind::Contains => normalized.contains(self.pattern),
        }
    }
}

/// Walk a rule table in order; first match wins
pub fn first_match<T: Copy>(rules: &[PatternRule<T>], normalized: &str) -> Option<T> {
    if normalized.is_empty() {
        return None;
    }
    rules
        .iter()
        .find(|rule| rule.matches(normalized))
        .map(|rule| rule.value)
}

// ============================================================================
// CLASSES
// ============================================================================

/// Label used for every "no match" default
pub const OTHER_LABEL: &str = "Outros";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EffortClass {
    Low,
    Medium,
    High,
}

impl EffortClass {
    pub const ALL: [EffortClass; 3] = [EffortClass::Low, EffortClass::Medium, EffortClass::High];

    pub fn label(&self) -> &'static str {
        match self {
            EffortClass::Low => "Baixo",
            EffortClass::Medium => "Médio",
            EffortClass::High => "Alto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ImpactClass {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ImpactClass {
    pub const ALL: [ImpactClass; 4] = [
        ImpactClass::Low,
        ImpactClass::Medium,
        ImpactClass::High,
        ImpactClass::VeryHigh,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ImpactClass::Low => "Baixo",
            ImpactClass::Medium => "Médio",
            ImpactClass::High => "Alto",
            ImpactClass::VeryHigh => "Altíssimo",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ApproachClass {
    Opportunity,
    Problem,
    #[default]
    Other,
}

impl ApproachClass {
    pub fn label(&self) -> &'static str {
        match self {
            ApproachClass::Opportunity => "Oportunidade",
            ApproachClass::Problem => "Problema",
            ApproachClass::Other => OTHER_LABEL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScopeClass {
    Innovation,
    Operation,
    #[default]
    Other,
}

impl ScopeClass {
    pub fn label(&self) -> &'static str {
        match self {
            ScopeClass::Innovation => "Inovação",
            ScopeClass::Operation => "Operação",
            ScopeClass::Other => OTHER_LABEL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PrincipalImpactClass {
    Market,
    Platform,
    Experience,
    #[default]
    Other,
}

impl PrincipalImpactClass {
    pub fn label(&self) -> &'static str {
        match self {
            PrincipalImpactClass::Market => "Mercado",
            PrincipalImpactClass::Platform => "Plataforma",
            PrincipalImpactClass::Experience => "Experiência",
            PrincipalImpactClass::Other => OTHER_LABEL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffortType {
    Task,
    Initiative,
    Idea,
    FollowUp,
}

impl EffortType {
    pub fn label(&self) -> &'static str {
        match self {
            EffortType::Task => "Tarefa",
            EffortType::Initiative => "Iniciativa",
            EffortType::Idea => "Ideia",
            EffortType::FollowUp => "Follow-up",
        }
    }
}

// ============================================================================
// RULE TABLES
// ============================================================================

const EFFORT_RULES: &[PatternRule<EffortClass>] = &[
    PatternRule::prefix("baixo", EffortClass::Low),
    PatternRule::prefix("medio", EffortClass::Medium),
    PatternRule::prefix("alto", EffortClass::High),
];

// "altissimo" MUST come before "alto": the shorter stem would shadow it
const IMPACT_RULES: &[PatternRule<ImpactClass>] = &[
    PatternRule::prefix("baix", ImpactClass::Low),
    PatternRule::prefix("medi", ImpactClass::Medium),
    PatternRule::prefix("altissimo", ImpactClass::VeryHigh),
    PatternRule::prefix("alto", ImpactClass::High),
];

const APPROACH_RULES: &[PatternRule<ApproachClass>] = &[
    PatternRule::contains("oportunidade", ApproachClass::Opportunity),
    PatternRule::contains("problema", ApproachClass::Problem),
];

const SCOPE_RULES: &[PatternRule<ScopeClass>] = &[
    PatternRule::contains("inovacao", ScopeClass::Innovation),
    PatternRule::contains("operacao", ScopeClass::Operation),
    PatternRule::contains("operacional", ScopeClass::Operation),
    PatternRule::contains("core", ScopeClass::Operation),
];

// Keyword groups, checked group by group: Market, then Platform, then Experience
const PRINCIPAL_IMPACT_RULES: &[PatternRule<PrincipalImpactClass>] = &[
    PatternRule::contains("mercado", PrincipalImpactClass::Market),
    PatternRule::contains("legal", PrincipalImpactClass::Market),
    PatternRule::contains("regulat", PrincipalImpactClass::Market),
    PatternRule::contains("cliente", PrincipalImpactClass::Market),
    PatternRule::contains("concorr", PrincipalImpactClass::Market),
    PatternRule::contains("plataforma", PrincipalImpactClass::Platform),
    PatternRule::contains("tecnolog", PrincipalImpactClass::Platform),
    PatternRule::contains("escala", PrincipalImpactClass::Platform),
    PatternRule::contains("disponibilidade", PrincipalImpactClass::Platform),
    PatternRule::contains("produtividade", PrincipalImpactClass::Platform),
    PatternRule::contains("arquitetura", PrincipalImpactClass::Platform),
    PatternRule::contains("barreira", PrincipalImpactClass::Platform),
    PatternRule::contains("experiencia", PrincipalImpactClass::Experience),
    PatternRule::contains("jornada", PrincipalImpactClass::Experience),
    PatternRule::contains("engajamento", PrincipalImpactClass::Experience),
    PatternRule::contains("retencao", PrincipalImpactClass::Experience),
    PatternRule::contains("usuario", PrincipalImpactClass::Experience),
];

const EFFORT_TYPE_RULES: &[PatternRule<EffortType>] = &[
    PatternRule::contains("tarefa", EffortType::Task),
    PatternRule::contains("iniciat", EffortType::Initiative),
    PatternRule::contains("idei", EffortType::Idea),
    PatternRule::contains("follow", EffortType::FollowUp),
];

// ============================================================================
// CLASSIFIERS
// ============================================================================

/// Effort: missing or unrecognized stays unset
pub fn classify_effort(raw: Option<&str>) -> Option<EffortClass> {
    first_match(EFFORT_RULES, &normalize_opt(raw))
}

pub fn classify_impact(raw: Option<&str>) -> Option<ImpactClass> {
    first_match(IMPACT_RULES, &normalize_opt(raw))
}

pub fn classify_approach(raw: Option<&str>) -> ApproachClass {
    first_match(APPROACH_RULES, &normalize_opt(raw)).unwrap_or_default()
}

pub fn classify_scope(raw: Option<&str>) -> ScopeClass {
    first_match(SCOPE_RULES, &normalize_opt(raw)).unwrap_or_default()
}

pub fn classify_principal_impact(raw: Option<&str>) -> PrincipalImpactClass {
    first_match(PRINCIPAL_IMPACT_RULES, &normalize_opt(raw)).unwrap_or_default()
}

pub fn classify_effort_type(raw: Option<&str>) -> Option<EffortType> {
    first_match(EFFORT_TYPE_RULES, &normalize_opt(raw))
}

/// "Sim...", "true" or "1" → true
pub fn parse_ongoing(raw: Option<&str>) -> bool {
    let n = normalize_opt(raw);
    n.starts_with("sim") || n == "true" || n == "1"
}

/// Progress as an integer percentage in [0, 100]
///
/// "50%" → 50, "0.75" → 75 (fraction, no %), "150" → 100, "-5" → 0, "abc" → 0
pub fn parse_progress(raw: Option<&str>) -> u8 {
    let text = match raw {
        Some(t) => t.trim(),
        None => return 0,
    };

    let (number, has_percent) = match text.strip_suffix('%') {
        Some(stripped) => (stripped.trim(), true),
        None => (text, false),
    };

    let value: f64 = match number.replace(',', ".").parse() {
        Ok(v) => v,
        Err(_) => return 0,
    };
    if !value.is_finite() {
        return 0;
    }

    let percent = if !has_percent && (0.0..=1.0).contains(&value) {
        value * 100.0
    } else {
        value
    };

    percent.round().clamp(0.0, 100.0) as u8
}

/// Urgency: first run of digits, clamped to [0, 5]
///
/// "nível 3" → 3, "9" → 5, "alta" → 0
pub fn parse_urgency(raw: Option<&str>) -> u8 {
    let text = raw.unwrap_or("");
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    match digits.parse::<u64>() {
        Ok(v) => v.min(5) as u8,
        // Digit runs too long for u64 are out of bounds anyway
        Err(_) if !digits.is_empty() => 5,
        Err(_) => 0,
    }
}

/// Is the text a bare integer in the urgency range? (used by legacy repair)
pub fn is_bare_urgency(raw: &str) -> bool {
    let t = raw.trim();
    !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()) && t.parse::<u8>().map_or(false, |v| v <= 5)
}

// ============================================================================
// CLASSIFICATION RESULT
// ============================================================================

/// Classification - every classifier applied to one record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    pub effort: Option<EffortClass>,
    pub impact: Option<ImpactClass>,
    pub approach: ApproachClass,
    pub scope: ScopeClass,
    pub principal_impact: PrincipalImpactClass,
    pub effort_type: Option<EffortType>,
    pub ongoing: bool,
    pub progress: u8,
    pub urgency: u8,
}

/// Raw survey answers for one record (absent = header not found)
#[derive(Debug, Clone, Copy, Default)]
pub struct RawAnswers<'a> {
    pub effort: Option<&'a str>,
    pub impact: Option<&'a str>,
    pub approach: Option<&'a str>,
    pub scope: Option<&'a str>,
    pub principal_impact: Option<&'a str>,
    pub effort_type: Option<&'a str>,
    pub ongoing: Option<&'a str>,
    pub progress: Option<&'a str>,
    pub urgency: Option<&'a str>,
}

impl Classification {
    pub fn from_answers(answers: &RawAnswers<'_>) -> Self {
        Classification {
            effort: classify_effort(answers.effort),
            impact: classify_impact(answers.impact),
            approach: classify_approach(answers.approach),
            scope: classify_scope(answers.scope),
            principal_impact: classify_principal_impact(answers.principal_impact),
            effort_type: classify_effort_type(answers.effort_type),
            ongoing: parse_ongoing(answers.ongoing),
            progress: parse_progress(answers.progress),
            urgency: parse_urgency(answers.urgency),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effort_prefixes() {
        assert_eq!(classify_effort(Some("Baixo - poucos dias")), Some(EffortClass::Low));
        assert_eq!(classify_effort(Some("MÉDIO")), Some(EffortClass::Medium));
        assert_eq!(classify_effort(Some("  alto (meses)")), Some(EffortClass::High));
    }

    #[test]
    fn test_effort_empty_or_unknown_is_unset() {
        assert_eq!(classify_effort(Some("")), None);
        assert_eq!(classify_effort(None), None);
        assert_eq!(classify_effort(Some("não sei")), None);
        // prefix, not substring
        assert_eq!(classify_effort(Some("muito alto")), None);
    }

    #[test]
    fn test_impact_very_high_checked_before_high() {
        assert_eq!(classify_impact(Some("Altíssimo  ")), Some(ImpactClass::VeryHigh));
        assert_eq!(classify_impact(Some("ALTISSIMO")), Some(ImpactClass::VeryHigh));
        assert_eq!(classify_impact(Some("altíssimo, muda o ano")), Some(ImpactClass::VeryHigh));
        assert_eq!(classify_impact(Some("Alto")), Some(ImpactClass::High));
    }

    #[test]
    fn test_impact_short_stems() {
        assert_eq!(classify_impact(Some("baixa")), Some(ImpactClass::Low));
        assert_eq!(classify_impact(Some("Média")), Some(ImpactClass::Medium));
        assert_eq!(classify_impact(Some("")), None);
    }

    #[test]
    fn test_classification_ignores_case_and_diacritics() {
        for (a, b) in [("Médio", "medio"), ("OPERAÇÃO", "operacao"), ("Inovação", "INOVACAO")] {
            assert_eq!(classify_effort(Some(a)), classify_effort(Some(b)));
            assert_eq!(classify_impact(Some(a)), classify_impact(Some(b)));
            assert_eq!(classify_scope(Some(a)), classify_scope(Some(b)));
            assert_eq!(classify_approach(Some(a)), classify_approach(Some(b)));
        }
    }

    #[test]
    fn test_approach_substrings_and_default() {
        assert_eq!(
            classify_approach(Some("Tratar como oportunidade de mercado")),
            ApproachClass::Opportunity
        );
        assert_eq!(classify_approach(Some("É um problema recorrente")), ApproachClass::Problem);
        // oportunidade is checked first
        assert_eq!(
            classify_approach(Some("problema que vira oportunidade")),
            ApproachClass::Opportunity
        );
        assert_eq!(classify_approach(Some("")), ApproachClass::Other);
        assert_eq!(classify_approach(None), ApproachClass::Other);
    }

    #[test]
    fn test_scope_rules() {
        assert_eq!(classify_scope(Some("Inovação: não temos")), ScopeClass::Innovation);
        assert_eq!(classify_scope(Some("Operação")), ScopeClass::Operation);
        assert_eq!(classify_scope(Some("melhoria operacional")), ScopeClass::Operation);
        assert_eq!(classify_scope(Some("faz parte do core")), ScopeClass::Operation);
        assert_eq!(classify_scope(Some("outro")), ScopeClass::Other);
    }

    #[test]
    fn test_principal_impact_group_order() {
        assert_eq!(
            classify_principal_impact(Some("Ganho de mercado")),
            PrincipalImpactClass::Market
        );
        assert_eq!(
            classify_principal_impact(Some("Escala da plataforma")),
            PrincipalImpactClass::Platform
        );
        assert_eq!(
            classify_principal_impact(Some("Experiência do usuário")),
            PrincipalImpactClass::Experience
        );
        // Market group wins over Experience when both appear
        assert_eq!(
            classify_principal_impact(Some("Retenção de clientes")),
            PrincipalImpactClass::Market
        );
        assert_eq!(classify_principal_impact(Some("")), PrincipalImpactClass::Other);
    }

    #[test]
    fn test_effort_type() {
        assert_eq!(classify_effort_type(Some("Tarefa simples")), Some(EffortType::Task));
        assert_eq!(classify_effort_type(Some("Iniciativa")), Some(EffortType::Initiative));
        assert_eq!(classify_effort_type(Some("Ideia")), Some(EffortType::Idea));
        assert_eq!(classify_effort_type(Some("Follow-up")), Some(EffortType::FollowUp));
        assert_eq!(classify_effort_type(Some("projeto")), None);
    }

    #[test]
    fn test_labels_reclassify_to_themselves() {
        for class in EffortClass::ALL {
            assert_eq!(classify_effort(Some(class.label())), Some(class));
        }
        for class in ImpactClass::ALL {
            assert_eq!(classify_impact(Some(class.label())), Some(class));
        }
        for class in [ApproachClass::Opportunity, ApproachClass::Problem, ApproachClass::Other] {
            assert_eq!(classify_approach(Some(class.label())), class);
        }
        for class in [ScopeClass::Innovation, ScopeClass::Operation, ScopeClass::Other] {
            assert_eq!(classify_scope(Some(class.label())), class);
        }
        for class in [
            PrincipalImpactClass::Market,
            PrincipalImpactClass::Platform,
            PrincipalImpactClass::Experience,
            PrincipalImpactClass::Other,
        ] {
            assert_eq!(classify_principal_impact(Some(class.label())), class);
        }
        for kind in [EffortType::Task, EffortType::Initiative, EffortType::Idea, EffortType::FollowUp] {
            assert_eq!(classify_effort_type(Some(kind.label())), Some(kind));
        }
    }

    #[test]
    fn test_ongoing() {
        assert!(parse_ongoing(Some("Sim, desde março")));
        assert!(parse_ongoing(Some("TRUE")));
        assert!(parse_ongoing(Some("1")));
        assert!(!parse_ongoing(Some("Não")));
        assert!(!parse_ongoing(Some("")));
        assert!(!parse_ongoing(None));
    }

    #[test]
    fn test_progress_clamping() {
        assert_eq!(parse_progress(Some("150")), 100);
        assert_eq!(parse_progress(Some("-5")), 0);
        assert_eq!(parse_progress(Some("0.5")), 50);
        assert_eq!(parse_progress(Some("50%")), 50);
        assert_eq!(parse_progress(Some("0.75")), 75);
        assert_eq!(parse_progress(Some("1%")), 1);
        assert_eq!(parse_progress(Some("1")), 100);
        assert_eq!(parse_progress(Some("0,25")), 25);
        assert_eq!(parse_progress(Some("33.6")), 34);
        assert_eq!(parse_progress(Some("abc")), 0);
        assert_eq!(parse_progress(None), 0);
    }

    #[test]
    fn test_urgency() {
        assert_eq!(parse_urgency(Some("nível 3")), 3);
        assert_eq!(parse_urgency(Some("4 - alta")), 4);
        assert_eq!(parse_urgency(Some("9")), 5);
        assert_eq!(parse_urgency(Some("alta")), 0);
        assert_eq!(parse_urgency(Some("")), 0);
        assert_eq!(parse_urgency(Some("99999999999999999999999")), 5);
    }

    #[test]
    fn test_bare_urgency_detection() {
        assert!(is_bare_urgency(" 3 "));
        assert!(!is_bare_urgency("7"));
        assert!(!is_bare_urgency("Pagamentos"));
        assert!(!is_bare_urgency(""));
    }

    #[test]
    fn test_first_match_respects_table_order() {
        let rules = [PatternRule::contains("a", 1), PatternRule::contains("ab", 2)];
        assert_eq!(first_match(&rules, "abc"), Some(1));
        assert_eq!(first_match(&rules, ""), None);
    }
}
