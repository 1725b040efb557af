//! Per-request ingestion state machine.
//!
//! `Reading` consumes parts strictly in arrival order, finishing each file's
//! write-stream before the next part is read. `PostProcessing` decodes buffered form
//! fields and back-fills declared sizes. `Correlating` attaches deferred properties.
//! Any request-fatal error moves the coordinator to `Failed`.

use bytes::Bytes;
use chrono::Utc;
use filedrop_core::constants::NAME_TEMPLATE_SUFFIX;
use filedrop_core::{FailureKind, FileDescriptor, IngestOutcome, PartFailure, PropertyBag};
use filedrop_storage::{keys, StoragePath};
use multer::{Field, Multipart};

use crate::classifier::{self, PartHead, PartKind, StreamError};
use crate::error::IngestError;
use crate::properties::{PropertyCollector, RegisteredFile};
use crate::request::UploadRequest;
use crate::service::IngestService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Reading,
    PostProcessing,
    Correlating,
    Done,
    Failed,
}

/// What was recorded for each part, in arrival order.
#[derive(Debug)]
enum PartRecord {
    FormField { name: Option<String>, data: Bytes },
    /// `slot` indexes `files`; `None` when the file was skipped or rolled back.
    File {
        slot: Option<usize>,
        declared_size: Option<u64>,
    },
}

pub struct IngestionCoordinator<'a> {
    service: &'a IngestService,
    request: &'a UploadRequest,
    directory: String,
    state: IngestState,
    parts: Vec<PartRecord>,
    files: Vec<RegisteredFile>,
    form_fields: Vec<(String, String)>,
    failures: Vec<PartFailure>,
}

impl<'a> IngestionCoordinator<'a> {
    pub fn new(service: &'a IngestService, request: &'a UploadRequest, directory: String) -> Self {
        Self {
            service,
            request,
            directory,
            state: IngestState::Reading,
            parts: Vec::new(),
            files: Vec::new(),
            form_fields: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn transition(&mut self, next: IngestState) {
        tracing::debug!(from = ?self.state, to = ?next, "Ingestion state change");
        self.state = next;
    }

    /// Drive the whole request to completion.
    pub async fn run(mut self, mut multipart: Multipart<'_>) -> Result<IngestOutcome, IngestError> {
        if let Err(e) = self.read_parts(&mut multipart).await {
            self.transition(IngestState::Failed);
            tracing::warn!(
                error = %e,
                stored_before_failure = self.files.len(),
                "Upload aborted"
            );
            return Err(e);
        }

        self.transition(IngestState::PostProcessing);
        self.post_process();

        let collector = PropertyCollector::new(&self.service.options().custom_header_prefix);
        if !self.form_fields.is_empty() || collector.has_header_candidates(&self.request.headers) {
            self.transition(IngestState::Correlating);
            let failures = collector
                .correlate(
                    &self.request.headers,
                    &self.form_fields,
                    &mut self.files,
                    self.service.storage(),
                )
                .await;
            self.failures.extend(failures);
        }

        self.transition(IngestState::Done);
        tracing::info!(
            files = self.files.len(),
            form_fields = self.form_fields.len(),
            failures = self.failures.len(),
            identity = self.request.identity.as_deref().unwrap_or("-"),
            "Upload ingested"
        );

        Ok(IngestOutcome {
            files: self.files.into_iter().map(|f| f.descriptor).collect(),
            failures: self.failures,
        })
    }

    async fn read_parts(&mut self, multipart: &mut Multipart<'_>) -> Result<(), IngestError> {
        while let Some(mut field) = multipart.next_field().await? {
            let head = PartHead::from_field(&field);
            let kind = classifier::classify(&head);
            tracing::debug!(
                index = head.index,
                name = head.name.as_deref().unwrap_or("-"),
                file_name = head.file_name.as_deref().unwrap_or("-"),
                kind = ?kind,
                "Classified part"
            );

            match kind {
                PartKind::FormField => {
                    let data = classifier::buffer_field(
                        &mut field,
                        self.service.options().max_form_field_bytes,
                    )
                    .await?;
                    self.parts.push(PartRecord::FormField {
                        name: head.name,
                        data,
                    });
                }
                PartKind::FileUpload => {
                    let slot = self.store_file(&head, &mut field).await?;
                    self.parts.push(PartRecord::File {
                        slot,
                        declared_size: head.declared_size,
                    });
                }
            }
        }
        Ok(())
    }

    fn template_for(&self, field_name: Option<&str>) -> Option<String> {
        let field_name = field_name?;
        let header = format!(
            "{}{}{}",
            self.service.options().custom_header_prefix,
            field_name,
            NAME_TEMPLATE_SUFFIX
        )
        .to_lowercase();
        self.request
            .headers
            .get(header.as_str())
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
    }

    fn key_taken(&self, key: &str) -> bool {
        self.files.iter().any(|f| f.descriptor.key == key)
    }

    /// Disposition name, else the file name, else the object key. When all of them are
    /// taken the object key gets a numeric suffix, so keys never repeat in one outcome.
    fn descriptor_key(&self, head: &PartHead, file_name: &str, path: &StoragePath) -> String {
        if let Some(key) = [head.name.as_deref(), Some(file_name), Some(path.key())]
            .into_iter()
            .flatten()
            .find(|candidate| !self.key_taken(candidate))
        {
            return key.to_string();
        }
        (2..)
            .map(|n| format!("{}-{}", path.key(), n))
            .find(|candidate| !self.key_taken(candidate))
            .unwrap_or_else(|| path.key().to_string())
    }

    fn record_failure(&mut self, head: &PartHead, kind: FailureKind, message: String) {
        tracing::warn!(part = %head.label(), kind = %kind, error = %message, "Upload part skipped");
        self.failures.push(PartFailure::new(head.label(), kind, message));
    }

    /// Remove the descriptor registered at `slot` for a part whose stream did not
    /// complete. Only the most recent registration is ever rolled back, so earlier slots
    /// stay valid. Bytes already handed to storage are left for the backend to deal with.
    fn rollback(&mut self, slot: usize) {
        if slot + 1 == self.files.len() {
            if let Some(removed) = self.files.pop() {
                tracing::debug!(
                    key = %removed.descriptor.key,
                    path = %removed.descriptor.path,
                    "Rolled back descriptor"
                );
            }
        }
    }

    /// Route a file part into storage and return its slot in `files`. `Ok(None)` means
    /// the part was skipped and the failure recorded; `Err` is request-fatal.
    async fn store_file(
        &mut self,
        head: &PartHead,
        field: &mut Field<'_>,
    ) -> Result<Option<usize>, IngestError> {
        let service = self.service;
        let original_name = head.file_name.as_deref().unwrap_or_default();
        let template = self.template_for(head.name.as_deref());

        let file_name = match service
            .naming()
            .resolve(head.name.as_deref(), original_name, template.as_deref())
        {
            Ok(name) => name,
            Err(e) => {
                self.record_failure(head, FailureKind::NamingTemplateFailure, e.to_string());
                classifier::drain(field).await?;
                return Ok(None);
            }
        };

        let storage = service.storage();
        let target = keys::join_key(&self.directory, &file_name)
            .and_then(|key| storage.qualify(&key))
            .and_then(|path| storage.url(&path).map(|url| (path, url)));
        let (path, url) = match target {
            Ok(target) => target,
            Err(e) => {
                self.record_failure(head, FailureKind::StorageWriteFailure, e.to_string());
                classifier::drain(field).await?;
                return Ok(None);
            }
        };

        let key = self.descriptor_key(head, &file_name, &path);
        self.files.push(RegisteredFile {
            field_name: head.name.clone(),
            descriptor: FileDescriptor {
                key: key.clone(),
                path: path.to_string(),
                size: 0,
                created_at: Utc::now(),
                url,
                content_type: head.content_type.clone(),
                properties: PropertyBag::new(),
            },
        });
        let slot = self.files.len() - 1;

        let mut writer = match storage.open_write(&path).await {
            Ok(writer) => writer,
            Err(e) => {
                self.rollback(slot);
                self.record_failure(head, FailureKind::StorageWriteFailure, e.to_string());
                classifier::drain(field).await?;
                return Ok(None);
            }
        };

        match classifier::stream_into(field, &mut writer).await {
            Ok(written) => {
                if let Some(file) = self.files.get_mut(slot) {
                    file.descriptor.size = written;
                }
                tracing::info!(
                    key = %key,
                    path = %path,
                    size_bytes = written,
                    "Stored uploaded file"
                );
                Ok(Some(slot))
            }
            Err(StreamError::Sink(e)) => {
                drop(writer);
                self.rollback(slot);
                self.record_failure(head, FailureKind::StorageWriteFailure, e.to_string());
                classifier::drain(field).await?;
                Ok(None)
            }
            Err(StreamError::Source(e)) => Err(e),
        }
    }

    fn post_process(&mut self) {
        for part in &self.parts {
            match part {
                PartRecord::FormField {
                    name: Some(name),
                    data,
                } => {
                    self.form_fields
                        .push((name.clone(), String::from_utf8_lossy(data).into_owned()));
                }
                PartRecord::FormField { name: None, .. } => {
                    tracing::debug!("Ignoring form field without a name");
                }
                PartRecord::File {
                    slot: Some(slot),
                    declared_size: Some(size),
                } => {
                    if let Some(file) = self.files.get_mut(*slot) {
                        file.descriptor.size = *size;
                    }
                }
                PartRecord::File { .. } => {}
            }
        }
    }
}
