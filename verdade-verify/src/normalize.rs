//! Turns free-form model output into a [`VerdictRecord`].
//!
//! [`normalize`] is total: fenced, prose-wrapped, truncated or entirely
//! non-JSON replies all produce a well-formed record. Missing or invalid
//! fields are replaced field by field; if no JSON object can be recovered at
//! all the reply is downgraded to an unverified record quoting the raw text.

use serde_json::{Map, Value};

use crate::types::{Verdict, VerdictRecord};

/// Confidence used when the model omits it or the reply cannot be parsed.
pub const FALLBACK_CONFIDENCE: u8 = 50;
/// How much of an unparseable reply is echoed back as the explanation.
pub const RAW_EXCERPT_CHARS: usize = 500;

pub const DEFAULT_SUMMARY: &str = "Análise realizada.";
pub const DEFAULT_EXPLANATION: &str = "Análise detalhada não fornecida.";
pub const DEFAULT_TIP: &str = "Verifique sempre em fontes oficiais.";

const DEGRADED_SUMMARY: &str = "Análise realizada mas formato de resposta inesperado.";
const DEGRADED_EMPTY_EXPLANATION: &str = "O modelo não retornou conteúdo.";
const RETRY_TIP: &str = "Tente novamente ou reformule a pergunta.";

const VERDICT_KEYS: &[&str] = &["veredito", "verdict"];
const CONFIDENCE_KEYS: &[&str] = &["confianca", "confiança", "confidence"];
const SUMMARY_KEYS: &[&str] = &["resumo", "summary"];
const EXPLANATION_KEYS: &[&str] = &["analise", "análise", "explanation"];
const SOURCES_KEYS: &[&str] = &["fontes_consultadas", "sources", "sourcesConsulted"];
const TIPS_KEYS: &[&str] = &["dicas", "tips"];
const LEGAL_KEYS: &[&str] = &["contexto_juridico", "context", "legalContext"];

/// Normalize a raw model reply. Never fails.
///
/// ```
/// use verdade_verify::normalize::normalize;
/// use verdade_verify::Verdict;
///
/// let record = normalize("```json\n{\"veredito\":\"FALSO\",\"confianca\":97}\n```");
/// assert_eq!(record.verdict, Verdict::False);
/// assert_eq!(record.confidence, 97);
///
/// let record = normalize("Não consigo responder em JSON.");
/// assert_eq!(record.verdict, Verdict::Unverified);
/// assert_eq!(record.confidence, 50);
/// ```
pub fn normalize(raw: &str) -> VerdictRecord {
    match extract_object(raw) {
        Some(obj) => from_object(&obj),
        None => {
            tracing::warn!(
                raw_len = raw.len(),
                "normalize.unparseable_model_output"
            );
            degraded(raw)
        }
    }
}

/// Recover the first-`{` .. last-`}` object, first from the reply as-is and
/// then with code fences removed.
fn extract_object(raw: &str) -> Option<Map<String, Value>> {
    let stripped = strip_fences(raw);
    let found = [raw.trim(), stripped.as_str()]
        .into_iter()
        .find_map(|candidate| match serde_json::from_str(json_span(candidate)) {
            Ok(Value::Object(obj)) => Some(obj),
            _ => None,
        });
    found
}

/// Remove every ```` ``` ```` marker along with a directly following `json` tag.
fn strip_fences(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(idx) = rest.find("```") {
        out.push_str(&rest[..idx]);
        rest = &rest[idx + 3..];
        if rest
            .get(..4)
            .is_some_and(|tag| tag.eq_ignore_ascii_case("json"))
        {
            rest = &rest[4..];
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

fn json_span(s: &str) -> &str {
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if start < end => &s[start..=end],
        _ => s,
    }
}

fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k)).filter(|v| !v.is_null())
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Accept a list of strings or a single string; drop blanks and non-strings.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn confidence(value: Option<&Value>) -> u8 {
    value
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite())
        .map(|n| n.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(FALLBACK_CONFIDENCE)
}

fn from_object(obj: &Map<String, Value>) -> VerdictRecord {
    let verdict = field(obj, VERDICT_KEYS)
        .and_then(Value::as_str)
        .and_then(Verdict::from_label)
        .unwrap_or(Verdict::Unverified);

    let mut tips = string_list(field(obj, TIPS_KEYS));
    if tips.is_empty() {
        tips.push(DEFAULT_TIP.to_string());
    }

    let legal_context = non_blank(field(obj, LEGAL_KEYS))
        .filter(|s| !s.trim().eq_ignore_ascii_case("null"));

    VerdictRecord {
        verdict,
        confidence: confidence(field(obj, CONFIDENCE_KEYS)),
        summary: non_blank(field(obj, SUMMARY_KEYS)).unwrap_or_else(|| DEFAULT_SUMMARY.to_string()),
        explanation: non_blank(field(obj, EXPLANATION_KEYS))
            .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string()),
        sources_consulted: string_list(field(obj, SOURCES_KEYS)),
        tips,
        legal_context,
        demo_mode: false,
    }
}

/// Record for replies with no recoverable JSON object.
pub fn degraded(raw: &str) -> VerdictRecord {
    let explanation = if raw.trim().is_empty() {
        DEGRADED_EMPTY_EXPLANATION.to_string()
    } else {
        raw.chars().take(RAW_EXCERPT_CHARS).collect()
    };

    VerdictRecord {
        verdict: Verdict::Unverified,
        confidence: FALLBACK_CONFIDENCE,
        summary: DEGRADED_SUMMARY.to_string(),
        explanation,
        sources_consulted: Vec::new(),
        tips: vec![RETRY_TIP.to_string()],
        legal_context: None,
        demo_mode: false,
    }
}
