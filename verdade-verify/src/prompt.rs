//! Prompt assembly for the upstream model.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use verdade_llm::traits::{ContentPart, ImageMediaType, InlineImage, LlmRequest};

use crate::types::VerificationRequest;

/// Built-in system instruction. Deployments can replace it through
/// configuration (`prompt.system` / `prompt.system_file`).
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"Você é um verificador de fatos especializado, cético e rigoroso. Seu trabalho é analisar textos, URLs, imagens e afirmações para determinar sua veracidade.

## PRINCÍPIOS DE ANÁLISE:

1. **Ceticismo Metodológico**: afirmações extraordinárias exigem evidências extraordinárias.
2. **Verificação Temporal**: verifique se a informação está desatualizada ou se refere a eventos antigos apresentados como novos.
3. **Análise de Fonte**: considere a credibilidade da fonte. Prefira fontes primárias (documentos oficiais, estudos científicos, comunicados institucionais).
4. **Detecção de Manipulação**: identifique citações fora de contexto, imagens manipuladas ou descontextualizadas, estatísticas distorcidas, apelos emocionais sem base factual e teorias conspiratórias.
5. **Contexto Jurídico/Técnico**: quando relevante, explique implicações legais ou técnicas de forma simples.
6. **Viés Político**: seja absolutamente neutro.

## FORMATO DE RESPOSTA:

Responda EXCLUSIVAMENTE com um objeto JSON válido, sem texto antes ou depois e sem markdown:

{
  "veredito": "VERDADEIRO" | "FALSO" | "ENGANOSO" | "SEM_EVIDENCIAS",
  "confianca": número inteiro de 0 a 100,
  "resumo": "no máximo 2 frases curtas sobre o veredito",
  "analise": "análise mais detalhada em 2-4 frases, incluindo contexto relevante",
  "fontes_consultadas": ["fontes ou bases de conhecimento usadas"],
  "dicas": ["dicas práticas para o usuário verificar isso sozinho no futuro"],
  "contexto_juridico": "implicações legais relevantes, ou null"
}

## DEFINIÇÕES DOS VEREDITOS:

- VERDADEIRO: informação factualmente correta, verificável e em contexto adequado.
- FALSO: informação comprovadamente incorreta ou fabricada.
- ENGANOSO: contém elementos verdadeiros apresentados de forma distorcida, fora de contexto ou com conclusões incorretas.
- SEM_EVIDENCIAS: não é possível confirmar ou refutar com as informações disponíveis.

## IMPORTANTE:

- Seja direto e claro. Evite jargões.
- Em temas de saúde, recomende consultar profissionais.
- Em questões jurídicas, indique a necessidade de consulta especializada.
- NUNCA invente fatos ou fontes. Se não souber, prefira "SEM_EVIDENCIAS"."#;

const JSON_ONLY: &str = "Responda APENAS com o JSON no formato especificado.";

/// Exact payload handed to the model client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    pub system: String,
    /// Image part first (when present), then the text instruction.
    pub parts: Vec<ContentPart>,
}

impl PromptPayload {
    pub fn into_request(self, max_tokens: Option<u32>, temperature: Option<f32>) -> LlmRequest {
        LlmRequest {
            system: Some(self.system),
            parts: self.parts,
            max_tokens,
            temperature,
        }
    }
}

/// Build the system instruction and ordered content parts for a request.
///
/// ```
/// use verdade_verify::prompt::build_prompt;
/// use verdade_verify::{InputKind, VerificationRequest};
///
/// let req = VerificationRequest::new(Some("A vacina causa autismo".into()), None, InputKind::Text)
///     .unwrap();
/// let payload = build_prompt(&req, "sys");
/// assert_eq!(payload.system, "sys");
/// assert_eq!(payload.parts.len(), 1);
/// ```
pub fn build_prompt(request: &VerificationRequest, system: &str) -> PromptPayload {
    let mut parts = Vec::with_capacity(2);

    if let Some(image) = request.image() {
        parts.push(ContentPart::Image(InlineImage {
            media_type: ImageMediaType::from_mime(image.content_type.as_deref()),
            data: STANDARD.encode(&image.bytes),
        }));
    }

    parts.push(ContentPart::text(user_instruction(
        request.text(),
        request.image().is_some(),
    )));

    PromptPayload {
        system: system.to_string(),
        parts,
    }
}

fn user_instruction(text: Option<&str>, has_image: bool) -> String {
    match (text, has_image) {
        (Some(text), true) => format!(
            "Analise a imagem enviada em conjunto com a seguinte informação e verifique sua veracidade. \
             Transcreva o texto visível na imagem quando houver.\n\n\"{text}\"\n\n{JSON_ONLY}"
        ),
        (Some(text), false) => {
            format!("Analise e verifique a seguinte informação:\n\n\"{text}\"\n\n{JSON_ONLY}")
        }
        (None, _) => format!(
            "Analise a imagem enviada e verifique se o conteúdo apresentado é verdadeiro. \
             Transcreva o texto visível e faça a verificação. {JSON_ONLY}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImageUpload, InputKind};

    fn request(text: Option<&str>, mime: Option<&str>) -> VerificationRequest {
        let image = mime.map(|m| ImageUpload {
            bytes: b"hello".to_vec(),
            content_type: Some(m.to_string()),
        });
        VerificationRequest::new(text.map(str::to_string), image, InputKind::Text).unwrap()
    }

    fn image_part(payload: &PromptPayload) -> &InlineImage {
        match &payload.parts[0] {
            ContentPart::Image(img) => img,
            other => panic!("expected image part first, got {other:?}"),
        }
    }

    fn text_part(payload: &PromptPayload) -> &str {
        match payload.parts.last() {
            Some(ContentPart::Text { text }) => text,
            other => panic!("expected trailing text part, got {other:?}"),
        }
    }

    #[test]
    fn png_is_tagged_png_and_base64_encoded() {
        let payload = build_prompt(&request(None, Some("image/png")), DEFAULT_SYSTEM_PROMPT);
        let img = image_part(&payload);
        assert_eq!(img.media_type, ImageMediaType::Png);
        assert_eq!(img.data, "aGVsbG8=");
    }

    #[test]
    fn unknown_image_type_falls_back_to_jpeg() {
        let payload = build_prompt(&request(None, Some("image/bmp")), DEFAULT_SYSTEM_PROMPT);
        assert_eq!(image_part(&payload).media_type, ImageMediaType::Jpeg);
    }

    #[test]
    fn text_only_wraps_claim_in_instruction() {
        let payload = build_prompt(&request(Some("O céu é verde"), None), "sys");
        assert_eq!(payload.parts.len(), 1);
        let text = text_part(&payload);
        assert!(text.contains("\"O céu é verde\""));
        assert!(text.ends_with(JSON_ONLY));
    }

    #[test]
    fn text_and_image_reference_both_with_image_first() {
        let payload = build_prompt(&request(Some("legenda"), Some("image/webp")), "sys");
        assert_eq!(payload.parts.len(), 2);
        assert_eq!(image_part(&payload).media_type, ImageMediaType::Webp);
        let text = text_part(&payload);
        assert!(text.contains("imagem"));
        assert!(text.contains("\"legenda\""));
    }

    #[test]
    fn image_only_asks_for_transcription() {
        let payload = build_prompt(&request(None, Some("image/gif")), "sys");
        assert!(text_part(&payload).contains("Transcreva"));
    }

    #[test]
    fn default_prompt_names_all_labels() {
        for verdict in crate::Verdict::ALL {
            assert!(DEFAULT_SYSTEM_PROMPT.contains(verdict.label()));
        }
    }

    #[test]
    fn into_request_carries_system_and_limits() {
        let payload = build_prompt(&request(Some("x"), None), "sys");
        let req = payload.into_request(Some(1024), Some(0.2));
        assert_eq!(req.system.as_deref(), Some("sys"));
        assert_eq!(req.max_tokens, Some(1024));
        assert_eq!(req.parts.len(), 1);
    }
}
