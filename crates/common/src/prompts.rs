//! Prompt resolution for model-gateway calls
//!
//! Prompts may be configured per deployment through a JSON template file;
//! built-in defaults cover every purpose when no configuration exists.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::ProcessingError;

/// What the prompt will be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptPurpose {
    KeyframeDescription,
    TranscriptCleanup,
    SegmentSummary,
}

impl PromptPurpose {
    /// Key used in the prompt configuration file
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::KeyframeDescription => "keyframe_description",
            Self::TranscriptCleanup => "transcript_cleanup",
            Self::SegmentSummary => "segment_summary",
        }
    }
}

/// Built-in fallback prompt for a purpose and category.
#[must_use]
pub fn default_prompt(purpose: PromptPurpose, category_name: &str) -> String {
    match purpose {
        PromptPurpose::KeyframeDescription => format!(
            "You are an assistant that explains what is happening in a video frame. \
             Provide a concise, vivid description tailored to the category '{category_name}'."
        ),
        PromptPurpose::TranscriptCleanup => {
            "Clean up the transcription for clarity while preserving meaning. \
             Fix punctuation, casing, and remove filler words where obvious."
                .to_string()
        }
        PromptPurpose::SegmentSummary => format!(
            "Summarise the segment in 1-2 sentences highlighting key ideas relevant \
             to {category_name}."
        ),
    }
}

/// Configured prompt templates keyed by purpose.
///
/// Templates may contain a `{category}` placeholder.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptLibrary {
    #[serde(flatten)]
    templates: HashMap<String, String>,
}

impl PromptLibrary {
    /// Load templates from a JSON file of `{"purpose": "template"}` entries.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ProcessingError> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| ProcessingError::Validation(format!("invalid prompt file: {e}")))
    }

    /// Load from the `VIDEOSEEK_PROMPTS` file when configured; otherwise empty.
    ///
    /// An unreadable configured file degrades to the built-in defaults.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var("VIDEOSEEK_PROMPTS") {
            Ok(path) => match Self::from_file(Path::new(&path)) {
                Ok(library) => library,
                Err(e) => {
                    tracing::warn!("Failed to load prompt file {}: {}", path, e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Resolve a prompt, falling back to the built-in default template.
    #[must_use]
    pub fn fetch(&self, purpose: PromptPurpose, category_name: &str) -> String {
        match self.templates.get(purpose.key()) {
            Some(template) if !template.is_empty() => {
                if template.contains("{category}") {
                    template.replace("{category}", category_name)
                } else {
                    template.clone()
                }
            }
            _ => default_prompt(purpose, category_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompt_mentions_category() {
        let prompt = default_prompt(PromptPurpose::KeyframeDescription, "cooking");
        assert!(prompt.contains("cooking"));
    }

    #[test]
    fn test_empty_library_falls_back_to_defaults() {
        let library = PromptLibrary::default();
        assert_eq!(
            library.fetch(PromptPurpose::TranscriptCleanup, "general"),
            default_prompt(PromptPurpose::TranscriptCleanup, "general")
        );
    }

    #[test]
    fn test_configured_template_with_placeholder() {
        let library: PromptLibrary = serde_json::from_str(
            r#"{"keyframe_description": "Describe this {category} frame."}"#,
        )
        .unwrap();
        assert_eq!(
            library.fetch(PromptPurpose::KeyframeDescription, "sports"),
            "Describe this sports frame."
        );
        // Unconfigured purposes still use the default.
        assert_eq!(
            library.fetch(PromptPurpose::SegmentSummary, "sports"),
            default_prompt(PromptPurpose::SegmentSummary, "sports")
        );
    }
}
