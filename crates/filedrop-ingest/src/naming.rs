//! Storage file naming.
//!
//! A caller may supply a naming template per form field through the
//! `<prefix><field>.name` header. The template is rendered by a [`TemplateEngine`],
//! made storage-safe, lower-cased, and suffixed with the original extension. Without a
//! usable template the name is `<yyyymmddHHMMSS>-<random u32><ext>`.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

const MAX_STEM_LENGTH: usize = 200;
const MAX_EXTENSION_LENGTH: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder '{{{0}}}'")]
    UnknownPlaceholder(String),

    #[error("unbalanced brace at offset {0}")]
    Unbalanced(usize),

    #[error("template rejected: {0}")]
    Rejected(String),
}

/// Values a template may refer to.
#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    pub field_name: Option<&'a str>,
    /// Original file name without directories and without extension.
    pub stem: &'a str,
    /// Original extension without the leading dot.
    pub extension: &'a str,
    pub now: DateTime<Utc>,
}

/// Evaluates caller-supplied naming templates.
pub trait TemplateEngine: Send + Sync {
    fn render(&self, template: &str, ctx: &TemplateContext<'_>) -> Result<String, TemplateError>;
}

/// `{placeholder}` substitution with `{{` / `}}` escapes.
///
/// Supported placeholders: `name`, `ext`, `field`, `date` (`%Y%m%d`), `time`
/// (`%H%M%S`), `timestamp` (`%Y%m%d%H%M%S`), `uuid`, `random`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderTemplate;

impl PlaceholderTemplate {
    fn value(placeholder: &str, ctx: &TemplateContext<'_>) -> Result<String, TemplateError> {
        let value = match placeholder.trim() {
            "name" => ctx.stem.to_string(),
            "ext" => ctx.extension.to_string(),
            "field" => ctx.field_name.unwrap_or_default().to_string(),
            "date" => ctx.now.format("%Y%m%d").to_string(),
            "time" => ctx.now.format("%H%M%S").to_string(),
            "timestamp" => ctx.now.format("%Y%m%d%H%M%S").to_string(),
            "uuid" => uuid::Uuid::new_v4().to_string(),
            "random" => rand::random::<u32>().to_string(),
            other => return Err(TemplateError::UnknownPlaceholder(other.to_string())),
        };
        Ok(value)
    }
}

impl TemplateEngine for PlaceholderTemplate {
    fn render(&self, template: &str, ctx: &TemplateContext<'_>) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    out.push('{');
                }
                '{' => {
                    let mut placeholder = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((inner, '{')) => return Err(TemplateError::Unbalanced(inner)),
                            Some((_, ch)) => placeholder.push(ch),
                            None => return Err(TemplateError::Unbalanced(offset)),
                        }
                    }
                    out.push_str(&Self::value(&placeholder, ctx)?);
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    out.push('}');
                }
                '}' => return Err(TemplateError::Unbalanced(offset)),
                other => out.push(other),
            }
        }

        Ok(out)
    }
}

/// Turns declared file names and optional templates into storage names.
#[derive(Clone)]
pub struct NamingResolver {
    engine: Arc<dyn TemplateEngine>,
}

impl Default for NamingResolver {
    fn default() -> Self {
        Self::new(Arc::new(PlaceholderTemplate))
    }
}

impl NamingResolver {
    pub fn new(engine: Arc<dyn TemplateEngine>) -> Self {
        Self { engine }
    }

    pub fn resolve(
        &self,
        field_name: Option<&str>,
        original_name: &str,
        template: Option<&str>,
    ) -> Result<String, TemplateError> {
        self.resolve_at(field_name, original_name, template, Utc::now())
    }

    pub fn resolve_at(
        &self,
        field_name: Option<&str>,
        original_name: &str,
        template: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<String, TemplateError> {
        let (stem, extension) = split_file_name(original_name);
        let suffix = if extension.is_empty() {
            String::new()
        } else {
            format!(".{}", extension)
        };

        if let Some(template) = template.filter(|t| !t.trim().is_empty()) {
            let ctx = TemplateContext {
                field_name,
                stem,
                extension,
                now,
            };
            let rendered = self.engine.render(template, &ctx)?;
            let stem = sanitize_stem(&rendered.to_lowercase());
            if !stem.is_empty() {
                return Ok(format!("{}{}", stem, suffix));
            }
            tracing::debug!(
                template = %template,
                "Naming template rendered to an empty name, using generated name"
            );
        }

        Ok(fallback_name(&suffix, now))
    }
}

/// `<yyyymmddHHMMSS>-<random u32><suffix>`; `suffix` includes the leading dot.
pub fn fallback_name(suffix: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}-{}{}",
        now.format("%Y%m%d%H%M%S"),
        rand::random::<u32>(),
        suffix
    )
}

/// Split a client-declared file name into (stem, extension) after dropping any
/// directory part browsers may send. The extension is empty unless it is short and
/// alphanumeric.
pub fn split_file_name(original_name: &str) -> (&str, &str) {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name)
        .trim();

    match base.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LENGTH
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            (stem, ext)
        }
        _ => (base, ""),
    }
}

/// Reduce rendered template output to a single safe path segment.
fn sanitize_stem(rendered: &str) -> String {
    let mapped: String = rendered
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_LENGTH)
        .collect();

    // no hidden files, no "." / ".." segments
    let trimmed = mapped.trim_matches('.');
    if trimmed.chars().all(|c| c == '_') {
        return String::new();
    }
    trimmed.to_string()
}
