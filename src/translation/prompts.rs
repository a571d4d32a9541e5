/*!
 * Prompt templates and batch marker handling.
 *
 * A batch request packs several fragments into one completion by tagging
 * each with `<<ENTRY_k>>` and closing the list with `<<END>>`. The model is
 * told to keep the markers, which lets the answer be split back per item.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::ProviderError;
use crate::language_utils;

/// Closing marker of a batch
pub const END_MARKER: &str = "<<END>>";

static ENTRY_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"<<ENTRY_(\d+)>>").expect("valid marker pattern"));

/// System prompt template with `{source_language}`/`{target_language}` placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// The default system prompt for document fragment translation.
    pub const DOCUMENT_TRANSLATOR: &'static str = "You are a professional translator. Translate the user's text from \
{source_language} to {target_language}.

- Return only the translation, without notes or explanations
- Preserve numbers, URLs, placeholders and inline formatting
- Keep the length close to the original; slide text is short and must stay readable
- When the text contains markers such as <<ENTRY_0>> and <<END>>, copy every marker unchanged \
and put the translation of each entry right after its marker";

    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Render the template for a language pair
    pub fn render(&self, source_language: &str, target_language: &str) -> String {
        self.template
            .replace("{source_language}", &language_utils::display_name(source_language))
            .replace("{target_language}", &language_utils::display_name(target_language))
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(Self::DOCUMENT_TRANSLATOR)
    }
}

/// Build the system prompt for one request
pub fn build_system_prompt(
    template: &PromptTemplate,
    source_language: &str,
    target_language: &str,
    instructions: Option<&str>,
) -> String {
    let mut prompt = template.render(source_language, target_language);
    if let Some(extra) = instructions.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str("\n\n");
        prompt.push_str(extra);
    }
    prompt
}

/// Pack texts into a marked batch
pub fn build_batch_content<S: AsRef<str>>(texts: &[S]) -> String {
    let mut content = String::new();
    for (idx, text) in texts.iter().enumerate() {
        content.push_str(&format!("<<ENTRY_{}>>", idx));
        content.push('\n');
        content.push_str(text.as_ref());
        content.push('\n');
    }
    content.push_str(END_MARKER);
    content
}

/// Split marked text into `(index, segment)` pairs, ignoring anything past `<<END>>`
///
/// Returns `None` when the closing marker is missing.
pub fn split_marked(text: &str) -> Option<Vec<(usize, &str)>> {
    let end = text.find(END_MARKER)?;
    let body = &text[..end];

    let markers: Vec<(usize, usize, usize)> = ENTRY_MARKER
        .captures_iter(body)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let index = caps.get(1)?.as_str().parse().ok()?;
            Some((index, whole.start(), whole.end()))
        })
        .collect();

    let segments = markers
        .iter()
        .enumerate()
        .map(|(pos, &(index, _, content_start))| {
            let content_end = markers.get(pos + 1).map_or(body.len(), |next| next.1);
            (index, body[content_start..content_end].trim())
        })
        .collect();

    Some(segments)
}

/// Parse a batch answer into exactly `expected` aligned, non-empty items
pub fn parse_batch_response(response: &str, expected: usize) -> Result<Vec<String>, ProviderError> {
    let segments = split_marked(response)
        .ok_or_else(|| ProviderError::ParseError("Missing <<END>> marker in batch response".to_string()))?;

    if segments.len() != expected {
        return Err(ProviderError::ParseError(format!(
            "Expected {} entries in batch response, found {}",
            expected,
            segments.len()
        )));
    }

    segments
        .into_iter()
        .enumerate()
        .map(|(position, (index, segment))| {
            if index != position {
                Err(ProviderError::ParseError(format!(
                    "Entry marker {} found where {} was expected",
                    index, position
                )))
            } else if segment.is_empty() {
                Err(ProviderError::ParseError(format!("Entry {} is empty", index)))
            } else {
                Ok(segment.to_string())
            }
        })
        .collect()
}
