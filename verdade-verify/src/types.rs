//! Request and verdict types exchanged with callers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::VerifyError;

/// Truthfulness label assigned to submitted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "VERDADEIRO")]
    True,
    #[serde(rename = "FALSO")]
    False,
    #[serde(rename = "ENGANOSO")]
    Misleading,
    #[serde(rename = "SEM_EVIDENCIAS")]
    Unverified,
}

impl Verdict {
    pub const ALL: [Verdict; 4] = [
        Verdict::True,
        Verdict::False,
        Verdict::Misleading,
        Verdict::Unverified,
    ];

    /// Wire label, as the model is instructed to emit it.
    pub fn label(self) -> &'static str {
        match self {
            Verdict::True => "VERDADEIRO",
            Verdict::False => "FALSO",
            Verdict::Misleading => "ENGANOSO",
            Verdict::Unverified => "SEM_EVIDENCIAS",
        }
    }

    /// Match a label leniently (surrounding whitespace, case).
    ///
    /// ```
    /// use verdade_verify::Verdict;
    ///
    /// assert_eq!(Verdict::from_label(" falso "), Some(Verdict::False));
    /// assert_eq!(Verdict::from_label("TRUE"), None);
    /// ```
    pub fn from_label(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.label().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalized fact-check result returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictRecord {
    #[serde(rename = "veredito")]
    pub verdict: Verdict,
    /// Always within `0..=100`.
    #[serde(rename = "confianca")]
    pub confidence: u8,
    #[serde(rename = "resumo")]
    pub summary: String,
    #[serde(rename = "analise")]
    pub explanation: String,
    #[serde(rename = "fontes_consultadas")]
    pub sources_consulted: Vec<String>,
    #[serde(rename = "dicas")]
    pub tips: Vec<String>,
    #[serde(rename = "contexto_juridico")]
    pub legal_context: Option<String>,
    #[serde(
        rename = "modo_demo",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub demo_mode: bool,
}

/// Informational hint about what the submitted text is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    #[default]
    Text,
    Url,
}

impl InputKind {
    /// Parse the form hint; unknown values are treated as plain text.
    pub fn from_hint(hint: Option<&str>) -> Self {
        match hint.map(|h| h.trim().to_ascii_lowercase()).as_deref() {
            Some("url") => InputKind::Url,
            _ => InputKind::Text,
        }
    }
}

/// Raw uploaded image with its declared MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// A validated verification request: at least one of `text` or `image`.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    text: Option<String>,
    image: Option<ImageUpload>,
    kind: InputKind,
}

impl VerificationRequest {
    /// Validate inputs. Blank text and empty images count as absent.
    ///
    /// ```
    /// use verdade_verify::{InputKind, VerificationRequest, VerifyError};
    ///
    /// let req = VerificationRequest::new(Some("  A Terra é plana ".into()), None, InputKind::Text)
    ///     .unwrap();
    /// assert_eq!(req.text(), Some("A Terra é plana"));
    ///
    /// let err = VerificationRequest::new(Some("   ".into()), None, InputKind::Text).unwrap_err();
    /// assert!(matches!(err, VerifyError::MissingInput));
    /// ```
    pub fn new(
        text: Option<String>,
        image: Option<ImageUpload>,
        kind: InputKind,
    ) -> Result<Self, VerifyError> {
        let text = text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let image = image.filter(|img| !img.bytes.is_empty());

        if text.is_none() && image.is_none() {
            return Err(VerifyError::MissingInput);
        }

        Ok(Self { text, image, kind })
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn image(&self) -> Option<&ImageUpload> {
        self.image.as_ref()
    }

    pub fn kind(&self) -> InputKind {
        self.kind
    }
}
