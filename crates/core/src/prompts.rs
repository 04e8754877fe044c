// crates/core/src/prompts.rs
//! Prompt templates with `{name}` placeholders.
//!
//! Built-in templates ship with the binary; a prompts directory can override
//! any of them with a `<name>.txt` file.

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt file not found: {name}")]
    NotFound { name: String },

    #[error("Error loading prompt {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing required variable in prompt template: {0}")]
    MissingVariable(String),
}

const AGENT_GOAL: &str = "\
You are a UX researcher exploring the {category} app \"{app_name}\" on an Android device.
Walk through the main screens and flows the way a first-time user would.
For every screen, note its name, how you reached it, and how many taps it took.
Record what works well, what is confusing, and anything that fails silently.
Finish with a structured report of screens visited, navigation depth, and UX findings.";

const ANALYSIS_PROMPT: &str = "\
You are a senior UX analyst. Below is an exploration report for a {category} app.
Return ONLY a JSON object with these keys: summary, positive, issues, recommendations,
app_metadata, exploration_coverage, navigation_metrics, interaction_feedback,
visual_hierarchy, consistency, error_handling, confidence_score, complexity_score.
Issues carry a severity of High, Medium or Low. complexity_score is 0-10.

REPORT:
{report_content}";

const HTML_GENERATION_PROMPT: &str = "\
Generate a complete, self-contained HTML page presenting this UX analysis.
Use clear sections for summary, metrics, positive findings, issues and recommendations.
Report generated at {timestamp}. Return only HTML.

ANALYSIS DATA:
{analysis_data}";

fn builtin(name: &str) -> Option<&'static str> {
    match name {
        "agent_goal" => Some(AGENT_GOAL),
        "analysis_prompt" => Some(ANALYSIS_PROMPT),
        "html_generation_prompt" => Some(HTML_GENERATION_PROMPT),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    dir: Option<PathBuf>,
}

impl PromptLibrary {
    /// Library backed only by the built-in templates.
    pub fn builtin() -> Self {
        Self { dir: None }
    }

    /// Library that prefers `<dir>/<name>.txt` over the built-ins.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Load a template by name, with or without the `.txt` extension.
    pub fn load(&self, name: &str) -> Result<String, PromptError> {
        let stem = name.strip_suffix(".txt").unwrap_or(name);
        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{stem}.txt"));
            match std::fs::read_to_string(&path) {
                Ok(text) => return Ok(text),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(PromptError::Io { path, source }),
            }
        }
        builtin(stem)
            .map(str::to_string)
            .ok_or_else(|| PromptError::NotFound {
                name: stem.to_string(),
            })
    }

    pub fn load_and_format(&self, name: &str, vars: &[(&str, &str)]) -> Result<String, PromptError> {
        let template = self.load(name)?;
        format_prompt(&template, vars)
    }
}

/// Substitute `{key}` placeholders. `{{` and `}}` are literal braces.
///
/// Every placeholder must have a value; unused variables are fine.
pub fn format_prompt(template: &str, vars: &[(&str, &str)]) -> Result<String, PromptError> {
    let vars: HashMap<&str, &str> = vars.iter().copied().collect();
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut key = String::new();
                let mut closed = false;
                for k in chars.by_ref() {
                    if k == '}' {
                        closed = true;
                        break;
                    }
                    key.push(k);
                }
                if !closed {
                    out.push('{');
                    out.push_str(&key);
                    continue;
                }
                let value = vars
                    .get(key.as_str())
                    .ok_or_else(|| PromptError::MissingVariable(key.clone()))?;
                out.push_str(value);
            }
            other => out.push(other),
        }
    }
    Ok(out)
}
