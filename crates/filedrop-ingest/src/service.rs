//! Upload entry point shared by every transport.

use filedrop_core::{Config, IngestOutcome};
use filedrop_storage::Storage;
use futures::Stream;
use multer::{Constraints, Multipart, SizeLimit};
use std::sync::Arc;

use crate::coordinator::IngestionCoordinator;
use crate::error::IngestError;
use crate::naming::{NamingResolver, TemplateEngine};
use crate::request::UploadRequest;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Lower-cased prefix of naming-template and property names.
    pub custom_header_prefix: String,
    pub max_upload_size_bytes: u64,
    pub max_form_field_bytes: usize,
}

impl IngestOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            custom_header_prefix: config.custom_header_prefix().to_lowercase(),
            max_upload_size_bytes: config.max_upload_size_bytes(),
            max_form_field_bytes: config.max_form_field_bytes(),
        }
    }
}

#[derive(Clone)]
pub struct IngestService {
    storage: Arc<dyn Storage>,
    naming: NamingResolver,
    options: IngestOptions,
}

impl IngestService {
    pub fn new(storage: Arc<dyn Storage>, options: IngestOptions) -> Self {
        Self {
            storage,
            naming: NamingResolver::default(),
            options,
        }
    }

    pub fn with_template_engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.naming = NamingResolver::new(engine);
        self
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn naming(&self) -> &NamingResolver {
        &self.naming
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Consume one multipart upload. Content-Type, declared length and target directory
    /// are checked before the first body byte is read.
    pub async fn ingest<S, O, E>(
        &self,
        request: &UploadRequest,
        body: S,
    ) -> Result<IngestOutcome, IngestError>
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<bytes::Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let boundary = request.boundary()?;
        request.check_declared_length(self.options.max_upload_size_bytes)?;
        let directory = request.directory()?;

        let constraints = Constraints::new()
            .size_limit(SizeLimit::new().whole_stream(self.options.max_upload_size_bytes));
        let multipart = Multipart::with_constraints(body, boundary, constraints);

        tracing::debug!(
            directory = %directory,
            backend = %self.storage.backend_type(),
            identity = request.identity.as_deref().unwrap_or("-"),
            "Starting upload"
        );

        IngestionCoordinator::new(self, request, directory)
            .run(multipart)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{chunked, FaultyStorage, MultipartBody};
    use filedrop_core::FailureKind;
    use filedrop_storage::{MemoryStorage, StoragePath};
    use crate::naming::{TemplateContext, TemplateError};
    use futures::StreamExt;
    use http::header::CONTENT_TYPE;
    use http::{HeaderMap, HeaderValue};
    use regex::Regex;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn options() -> IngestOptions {
        IngestOptions {
            custom_header_prefix: "x-custom-".to_string(),
            max_upload_size_bytes: 1024 * 1024,
            max_form_field_bytes: 1024,
        }
    }

    fn service(storage: Arc<dyn Storage>) -> IngestService {
        IngestService::new(storage, options())
    }

    fn request(content_type: &str, dir: &str, extra: &[(&'static str, &'static str)]) -> UploadRequest {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        for (name, value) in extra {
            headers.insert(*name, HeaderValue::from_static(*value));
        }
        UploadRequest::new(headers, dir)
    }

    async fn run(
        service: &IngestService,
        body: MultipartBody,
        dir: &str,
        headers: &[(&'static str, &'static str)],
    ) -> Result<IngestOutcome, IngestError> {
        let request = request(&body.content_type(), dir, headers);
        service.ingest(&request, chunked(body.finish(), 7)).await
    }

    #[tokio::test]
    async fn single_file_without_headers() {
        let storage = MemoryStorage::new("http://files.test");
        let service = service(Arc::new(storage.clone()));

        let body = MultipartBody::new().file("avatar", "me.png", b"PNGDATA");
        let outcome = run(&service, body, "avatars", &[]).await.unwrap();

        assert_eq!(outcome.files.len(), 1);
        assert!(outcome.failures.is_empty());
        let file = outcome.file("avatar").unwrap();
        assert_eq!(file.size, 7);
        assert!(file.properties.is_empty());
        assert_eq!(file.content_type.as_deref(), Some("application/octet-stream"));

        let shape = Regex::new(r"^memory://avatars/\d{14}-\d+\.png$").unwrap();
        assert!(shape.is_match(&file.path), "unexpected path {}", file.path);
        assert!(file.url.starts_with("http://files.test/avatars/"));

        let path = StoragePath::parse(&file.path).unwrap();
        assert_eq!(storage.contents(&path).unwrap(), b"PNGDATA");
    }

    #[tokio::test]
    async fn declared_size_is_back_filled() {
        let storage = MemoryStorage::new("/files");
        let service = service(Arc::new(storage));

        let body = MultipartBody::new().file_with_disposition(
            r#"form-data; name="avatar"; filename="me.png"; size=4096"#,
            b"abc",
        );
        let outcome = run(&service, body, "", &[]).await.unwrap();
        assert_eq!(outcome.file("avatar").unwrap().size, 4096);
    }

    #[tokio::test]
    async fn form_field_property_is_correlated() {
        let storage = MemoryStorage::new("/files");
        let service = service(Arc::new(storage.clone()));

        let body = MultipartBody::new()
            .file("avatar", "me.png", b"PNG")
            .field("x-custom-avatar-caption", "Hello");
        let outcome = run(&service, body, "", &[]).await.unwrap();

        let file = outcome.file("avatar").unwrap();
        assert_eq!(file.properties.get("caption"), Some("Hello"));

        let path = StoragePath::parse(&file.path).unwrap();
        let metadata = storage.get_metadata(&path).await.unwrap();
        assert_eq!(metadata.get("caption").map(String::as_str), Some("Hello"));
    }

    #[tokio::test]
    async fn correlation_is_order_independent() {
        let before = MultipartBody::new()
            .field("x-custom-avatar-caption", "Hello")
            .file("avatar", "me.png", b"PNG");
        let after = MultipartBody::new()
            .file("avatar", "me.png", b"PNG")
            .field("x-custom-avatar-caption", "Hello");

        for body in [before, after] {
            let service = service(Arc::new(MemoryStorage::new("/files")));
            let outcome = run(&service, body, "", &[]).await.unwrap();
            let file = outcome.file("avatar").unwrap();
            assert_eq!(file.properties.get("caption"), Some("Hello"));
            assert_eq!(file.properties.len(), 1);
        }
    }

    #[tokio::test]
    async fn header_properties_and_templates() {
        let service = service(Arc::new(MemoryStorage::new("/files")));
        let body = MultipartBody::new()
            .file("avatar", "Holiday.JPG", b"JPEG")
            .field("x-custom-avatar-alt", "from form");
        let outcome = run(
            &service,
            body,
            "users/42",
            &[
                ("x-custom-avatar.name", "Profile-{field}"),
                ("x-custom-avatar-alt", "from header"),
                ("x-custom-avatar-owner", "42"),
            ],
        )
        .await
        .unwrap();

        let file = outcome.file("avatar").unwrap();
        assert_eq!(file.path, "memory://users/42/profile-avatar.JPG");
        assert_eq!(file.properties.get("alt"), Some("from form"));
        assert_eq!(file.properties.get("owner"), Some("42"));
        assert!(!file.properties.contains_key("name"));
    }

    #[tokio::test]
    async fn json_body_is_rejected_before_reading() {
        let service = service(Arc::new(MemoryStorage::new("/files")));
        let request = request("application/json", "", &[]);
        let body = futures::stream::iter(vec![Err::<bytes::Bytes, std::io::Error>(
            std::io::Error::new(std::io::ErrorKind::Other, "body must not be read"),
        )]);

        let result = service.ingest(&request, body).await;
        assert!(matches!(result, Err(IngestError::UnsupportedMediaType(_))));
    }

    #[tokio::test]
    async fn existing_object_is_skipped_and_others_succeed() {
        let storage = MemoryStorage::new("/files");
        storage.insert("docs/taken.txt", b"old".to_vec()).unwrap();
        let service = service(Arc::new(storage.clone()));

        let body = MultipartBody::new()
            .file("first", "a.txt", b"first")
            .file("second", "b.txt", b"second");
        let request = request(
            &body.content_type(),
            "docs",
            &[("x-custom-first.name", "taken")],
        );
        let outcome = service
            .ingest(&request, chunked(body.finish(), 5))
            .await
            .unwrap();

        assert_eq!(outcome.files.len(), 1);
        assert!(outcome.file("second").is_some());
        assert!(outcome.file("first").is_none());
        let failures: Vec<_> = outcome.failures_of(FailureKind::StorageWriteFailure).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].part, "first");

        let taken = StoragePath::parse("memory://docs/taken.txt").unwrap();
        assert_eq!(storage.contents(&taken).unwrap(), b"old");
    }

    #[tokio::test]
    async fn mid_stream_failure_rolls_back_only_that_part() {
        let inner = MemoryStorage::new("/files");
        let storage = FaultyStorage::new(inner).break_writes_for("broken.bin");
        let service = service(Arc::new(storage));

        let body = MultipartBody::new()
            .file("bad", "x.bin", &[7u8; 300])
            .file("good", "y.bin", b"fine")
            .field("x-custom-bad-caption", "lost");
        let request = request(
            &body.content_type(),
            "",
            &[("x-custom-bad.name", "broken")],
        );
        let outcome = service
            .ingest(&request, chunked(body.finish(), 64))
            .await
            .unwrap();

        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.file("good").unwrap().size, 4);
        let failure = &outcome.failures[0];
        assert_eq!(failure.kind, FailureKind::StorageWriteFailure);
        assert!(failure.message.contains("disk quota exceeded"));
    }

    #[tokio::test]
    async fn naming_failure_skips_part() {
        let service = service(Arc::new(MemoryStorage::new("/files")));
        let body = MultipartBody::new()
            .file("avatar", "me.png", b"PNG")
            .file("banner", "b.png", b"PNG");
        let outcome = run(&service, body, "", &[("x-custom-avatar.name", "{unknown}")])
            .await
            .unwrap();

        assert_eq!(outcome.files.len(), 1);
        assert!(outcome.file("banner").is_some());
        let failures: Vec<_> = outcome
            .failures_of(FailureKind::NamingTemplateFailure)
            .collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].part, "avatar");
    }

    #[tokio::test]
    async fn never_more_files_than_file_parts() {
        let service = service(Arc::new(MemoryStorage::new("/files")));
        let body = MultipartBody::new()
            .field("title", "holiday")
            .file("photos", "1.jpg", b"one")
            .file("photos", "2.jpg", b"two")
            .field("x-custom-photos-album", "summer")
            .file_with_disposition(r#"form-data; filename="3.jpg""#, b"three")
            .file_with_disposition(r#"form-data; name="empty"; filename="""#, b"");
        let outcome = run(&service, body, "", &[]).await.unwrap();

        assert_eq!(outcome.files.len(), 3);
        // duplicate and missing disposition names fall back to the generated file name
        assert!(outcome.file("photos").is_some());
        let shape = Regex::new(r"^\d{14}-\d+\.jpg$").unwrap();
        let generated: Vec<_> = outcome
            .files
            .iter()
            .filter(|f| f.key != "photos")
            .collect();
        assert_eq!(generated.len(), 2);
        for file in &generated {
            assert!(shape.is_match(&file.key), "unexpected key {}", file.key);
        }
        // both files uploaded under `photos` carry the property
        let album_count = outcome
            .files
            .iter()
            .filter(|f| f.properties.get("album") == Some("summer"))
            .count();
        assert_eq!(album_count, 2);
    }

    #[tokio::test]
    async fn malformed_body_fails_the_request() {
        let service = service(Arc::new(MemoryStorage::new("/files")));
        let body = MultipartBody::new().file("avatar", "me.png", b"PNG");
        let mut bytes = body.finish();
        let content_type = MultipartBody::new().content_type();
        // drop the closing delimiter
        bytes.truncate(bytes.len() - 30);

        let request = request(&content_type, "", &[]);
        let result = service.ingest(&request, chunked(bytes, 16)).await;
        assert!(matches!(result, Err(IngestError::MalformedMultipart(_))));
    }

    #[tokio::test]
    async fn oversized_body_fails_the_request() {
        let service = IngestService::new(
            Arc::new(MemoryStorage::new("/files")),
            IngestOptions {
                max_upload_size_bytes: 256,
                ..options()
            },
        );
        let body = MultipartBody::new().file("avatar", "me.png", &[1u8; 1024]);
        let result = run(&service, body, "", &[]).await;
        assert!(matches!(result, Err(IngestError::PayloadTooLarge(_))));
    }

    #[tokio::test]
    async fn oversized_form_field_fails_the_request() {
        let service = service(Arc::new(MemoryStorage::new("/files")));
        let body = MultipartBody::new().field("notes", &"x".repeat(2048));
        let result = run(&service, body, "", &[]).await;
        assert!(matches!(result, Err(IngestError::PayloadTooLarge(_))));
    }

    #[tokio::test]
    async fn invalid_directory_is_rejected() {
        let service = service(Arc::new(MemoryStorage::new("/files")));
        let body = MultipartBody::new().file("avatar", "me.png", b"PNG");
        let result = run(&service, body, "a/../../b", &[]).await;
        assert!(matches!(result, Err(IngestError::InvalidTarget(_))));
    }

    #[tokio::test]
    async fn repeated_names_keep_every_stored_file() {
        let storage = MemoryStorage::new("/files");
        let service = service(Arc::new(storage.clone()));

        let body = MultipartBody::new()
            .file("docs", "a.pdf", b"AAAA")
            .file("docs", "b.png", b"BBBB")
            .file("docs", "c.png", b"CCCCCC");
        let outcome = run(&service, body, "", &[("x-custom-docs.name", "fixed")])
            .await
            .unwrap();

        assert_eq!(outcome.files.len(), 2);
        let pdf = outcome.file("docs").unwrap();
        assert_eq!(pdf.path, "memory://fixed.pdf");
        assert_eq!(pdf.size, 4);
        let png = outcome.file("fixed.png").unwrap();
        assert_eq!(png.path, "memory://fixed.png");
        assert_eq!(png.size, 4);

        let failures: Vec<_> = outcome.failures_of(FailureKind::StorageWriteFailure).collect();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("fixed.png"));

        let path = StoragePath::parse("memory://fixed.png").unwrap();
        assert_eq!(storage.contents(&path).unwrap(), b"BBBB");
    }

    #[tokio::test]
    async fn dropped_upload_closes_open_writer() {
        let storage = FaultyStorage::new(MemoryStorage::new("/files"));
        let live = storage.live_writers();
        let opened = storage.opened_writers();
        let service = service(Arc::new(storage));

        let full = MultipartBody::new().file("avatar", "me.png", &[9u8; 512]);
        let content_type = full.content_type();
        let mut partial = full.finish();
        partial.truncate(200);
        // the client stalls halfway through the file part
        let body = futures::stream::iter(vec![Ok::<_, std::io::Error>(bytes::Bytes::from(partial))])
            .chain(futures::stream::pending());

        let request = request(&content_type, "", &[]);
        let result = tokio::time::timeout(
            Duration::from_millis(100),
            service.ingest(&request, body),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    struct FixedName(&'static str);

    impl TemplateEngine for FixedName {
        fn render(&self, _template: &str, ctx: &TemplateContext<'_>) -> Result<String, TemplateError> {
            Ok(format!("{}-{}", self.0, ctx.field_name.unwrap_or_default()))
        }
    }

    #[tokio::test]
    async fn custom_template_engine_names_files() {
        let service = service(Arc::new(MemoryStorage::new("/files")))
            .with_template_engine(Arc::new(FixedName("Engine")));
        let body = MultipartBody::new()
            .file("avatar", "me.png", b"PNG")
            .file("banner", "b.png", b"PNG");
        let outcome = run(&service, body, "", &[("x-custom-avatar.name", "ignored")])
            .await
            .unwrap();

        assert_eq!(outcome.file("avatar").unwrap().path, "memory://engine-avatar.png");
        let shape = Regex::new(r"^memory://\d{14}-\d+\.png$").unwrap();
        assert!(shape.is_match(&outcome.file("banner").unwrap().path));
    }
}
