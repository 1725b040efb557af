//! Per-file property correlation.
//!
//! Properties reach a file through two channels: request headers and sibling form
//! fields, both named `<prefix><field><sep><property>` where `<sep>` is `-` or `.`.
//! Because a form field may arrive before or after the file it describes, nothing is
//! attached while the body is being read. Once the body is exhausted the collector
//! gathers every candidate (pass one) and then assigns each to its file (pass two).

use filedrop_core::constants::NAME_TEMPLATE_SUFFIX;
use filedrop_core::{FailureKind, FileDescriptor, PartFailure};
use filedrop_storage::{Storage, StoragePath};
use http::HeaderMap;

/// A stored file together with the disposition name it was uploaded under.
#[derive(Debug, Clone)]
pub struct RegisteredFile {
    pub field_name: Option<String>,
    pub descriptor: FileDescriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertySource {
    Header,
    FormField,
}

/// A prefixed name/value pair not yet tied to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyCandidate {
    pub source: PropertySource,
    /// Lower-cased name with the prefix removed, e.g. `avatar-caption`.
    pub target: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct PropertyCollector {
    prefix: String,
}

impl PropertyCollector {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_lowercase(),
        }
    }

    fn strip_prefix(&self, name: &str) -> Option<String> {
        let lowered = name.to_lowercase();
        lowered
            .strip_prefix(&self.prefix)
            .filter(|rest| !rest.is_empty())
            .map(str::to_string)
    }

    /// Whether any header could contribute a property.
    pub fn has_header_candidates(&self, headers: &HeaderMap) -> bool {
        !self.header_candidates(headers).is_empty()
    }

    fn header_candidates(&self, headers: &HeaderMap) -> Vec<PropertyCandidate> {
        headers
            .iter()
            .filter_map(|(name, value)| {
                let target = self.strip_prefix(name.as_str())?;
                // `<field>.name` carries a naming template, not a property
                if target.ends_with(NAME_TEMPLATE_SUFFIX) {
                    return None;
                }
                Some(PropertyCandidate {
                    source: PropertySource::Header,
                    target,
                    value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
                })
            })
            .collect()
    }

    /// Pass one: every candidate, headers first so form fields override them.
    pub fn collect(
        &self,
        headers: &HeaderMap,
        form_fields: &[(String, String)],
    ) -> Vec<PropertyCandidate> {
        let mut candidates = self.header_candidates(headers);
        candidates.extend(form_fields.iter().filter_map(|(name, value)| {
            Some(PropertyCandidate {
                source: PropertySource::FormField,
                target: self.strip_prefix(name)?,
                value: value.clone(),
            })
        }));
        candidates
    }

    /// Pass two: attach candidates to files. Returns the indices of files that gained
    /// at least one property.
    ///
    /// A candidate `avatar-caption` matches every file uploaded under `avatar`. When
    /// several field names prefix the same candidate (`a` and `a-b` for `a-b-c`), the
    /// longest one wins.
    pub fn assign(&self, candidates: &[PropertyCandidate], files: &mut [RegisteredFile]) -> Vec<usize> {
        let names: Vec<Option<String>> = files
            .iter()
            .map(|f| f.field_name.as_ref().map(|n| n.to_lowercase()))
            .collect();

        let mut touched = Vec::new();
        for candidate in candidates {
            let Some((field, property)) = best_match(&candidate.target, &names) else {
                tracing::debug!(
                    target_name = %candidate.target,
                    source = ?candidate.source,
                    "Property does not match any uploaded file"
                );
                continue;
            };

            for (index, file) in files.iter_mut().enumerate() {
                if names[index].as_deref() == Some(field.as_str()) {
                    file.descriptor.properties.insert(property, candidate.value.clone());
                    if !touched.contains(&index) {
                        touched.push(index);
                    }
                }
            }
        }
        touched.sort_unstable();
        touched
    }

    /// Collect, assign, and persist properties. Persistence failures are returned, one
    /// per affected file, and never stop the remaining files from being updated.
    pub async fn correlate(
        &self,
        headers: &HeaderMap,
        form_fields: &[(String, String)],
        files: &mut [RegisteredFile],
        storage: &dyn Storage,
    ) -> Vec<PartFailure> {
        let candidates = self.collect(headers, form_fields);
        let touched = self.assign(&candidates, files);

        let mut failures = Vec::new();
        for index in touched {
            let descriptor = &files[index].descriptor;
            let result = match StoragePath::parse(&descriptor.path) {
                Ok(path) => storage
                    .set_metadata(&path, descriptor.properties.as_map())
                    .await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => tracing::debug!(
                    key = %descriptor.key,
                    properties = descriptor.properties.len(),
                    "Stored file properties"
                ),
                Err(e) => {
                    tracing::warn!(
                        key = %descriptor.key,
                        path = %descriptor.path,
                        error = %e,
                        "Failed to store file properties"
                    );
                    failures.push(PartFailure::new(
                        descriptor.key.clone(),
                        FailureKind::MetadataCorrelationFailure,
                        e.to_string(),
                    ));
                }
            }
        }
        failures
    }
}

/// Find the longest field name `n` such that `target` is `n`, a separator, and a
/// non-empty property name.
fn best_match<'a>(target: &'a str, names: &[Option<String>]) -> Option<(String, &'a str)> {
    names
        .iter()
        .flatten()
        .filter_map(|name| {
            let rest = target.strip_prefix(name.as_str())?;
            let property = rest.strip_prefix('-').or_else(|| rest.strip_prefix('.'))?;
            (!property.is_empty()).then_some((name, property))
        })
        .max_by_key(|(name, _)| name.len())
        .map(|(name, property)| (name.clone(), property))
}
