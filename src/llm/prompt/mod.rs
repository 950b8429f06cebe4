#[cfg(test)]
mod tests;

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::config::{ConfigError, PromptConfig};

/// Identifiers of the templates that ship with the binary
pub const BUILTIN_TEMPLATES: &[&str] = &["retrieval-qa-chat", "retrieval-qa-strict"];

const CONTEXT: &str = "{context}";
const INPUT: &str = "{input}";

const QA_CHAT_SYSTEM: &str =
    "Answer any use questions based solely on the context below:\n\n<context>\n{context}\n</context>";

const QA_STRICT_SYSTEM: &str = "You are an assistant for question-answering tasks. \
Use only the retrieved context below to answer the question. \
If the context does not contain the answer, say that you don't know. \
Keep the answer concise.\n\n<context>\n{context}\n</context>";

/// A two-message prompt with `{context}` and `{input}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub name: String,
    pub system: String,
    pub human: String,
}

#[derive(Debug, Deserialize)]
struct TemplateFile {
    name: Option<String>,
    system: String,
    human: String,
}

impl PromptTemplate {
    /// Build a template, requiring both placeholders somewhere in it
    pub fn new(
        name: impl Into<String>,
        system: impl Into<String>,
        human: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let template = Self {
            name: name.into(),
            system: system.into(),
            human: human.into(),
        };

        for placeholder in [CONTEXT, INPUT] {
            if !template.system.contains(placeholder) && !template.human.contains(placeholder) {
                return Err(ConfigError::InvalidTemplate(format!(
                    "template '{}' is missing the {} placeholder",
                    template.name, placeholder
                )));
            }
        }

        Ok(template)
    }

    pub fn builtin(id: &str) -> Option<Self> {
        let system = match id {
            "retrieval-qa-chat" => QA_CHAT_SYSTEM,
            "retrieval-qa-strict" => QA_STRICT_SYSTEM,
            _ => return None,
        };
        Some(Self {
            name: id.to_string(),
            system: system.to_string(),
            human: INPUT.to_string(),
        })
    }

    /// Read a TOML file with `system` and `human` fields
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let file: TemplateFile = toml::from_str(&content)?;

        let name = file.name.unwrap_or_else(|| {
            path.file_stem()
                .map_or_else(|| "custom".to_string(), |s| s.to_string_lossy().to_string())
        });

        Self::new(name, file.system, file.human)
    }

    /// Pick the template named by the configuration
    ///
    /// Relative template files are resolved against `base_dir`.
    pub fn resolve(config: &PromptConfig, base_dir: &Path) -> Result<Self, ConfigError> {
        match &config.template_file {
            Some(file) if file.is_absolute() => Self::from_file(file),
            Some(file) => Self::from_file(base_dir.join(file)),
            None => Self::builtin(&config.template).ok_or_else(|| {
                ConfigError::InvalidTemplate(format!(
                    "unknown template '{}' (available: {})",
                    config.template,
                    BUILTIN_TEMPLATES.join(", ")
                ))
            }),
        }
    }

    /// Fill both messages, returning `(system, human)`
    pub fn render(&self, context: &str, input: &str) -> (String, String) {
        (
            fill(&self.system, context, input),
            fill(&self.human, context, input),
        )
    }
}

/// Join retrieved documents the way they are placed into `{context}`
#[inline]
pub fn join_context(documents: &[String]) -> String {
    documents.join("\n\n")
}

/// Substitute placeholders in one pass so values are never re-expanded
fn fill(template: &str, context: &str, input: &str) -> String {
    let mut output = String::with_capacity(template.len() + context.len() + input.len());
    let mut rest = template;

    while let Some(pos) = rest.find('{') {
        output.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix(CONTEXT) {
            output.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(INPUT) {
            output.push_str(input);
            rest = after;
        } else {
            output.push('{');
            rest = &tail[1..];
        }
    }

    output.push_str(rest);
    output
}
