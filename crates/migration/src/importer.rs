//! Creation of one document per HTML file in a job archive.

use tracing::{error, info, instrument, warn};

use padmigrate_core::Job;

use crate::assets::AssetMigrator;
use crate::context::MigrationContext;
use crate::error::MigrationError;
use crate::ports::{ApiCredentials, ArchiveEntry, NewDocument};
use crate::transform::{self, Prepared};

/// Content type of every created document.
pub const HTML_CONTENT_TYPE: &str = "text/html";

/// Per-job import counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Documents the API confirmed with an id.
    pub created: usize,
    /// HTML files not created: default documents and rejected calls.
    pub skipped: usize,
    /// Entries sniffed as HTML.
    pub html_files: usize,
    /// Entries of any other type; never sent anywhere.
    pub ignored_files: usize,
}

impl ImportSummary {
    /// Files that reached a final created/skipped decision.
    pub fn processed(&self) -> usize {
        self.created + self.skipped
    }
}

/// Result for one HTML file.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileOutcome {
    Created(String),
    Skipped,
}

pub struct DocumentImporter {
    ctx: MigrationContext,
    assets: AssetMigrator,
}

impl DocumentImporter {
    pub fn new(ctx: MigrationContext) -> Self {
        let assets = AssetMigrator::new(
            ctx.asset_store.clone(),
            ctx.asset_fetcher.clone(),
            ctx.settings.legacy_asset_prefix.clone(),
        );
        Self { ctx, assets }
    }

    /// Unpack the job archive and create a document for every HTML entry.
    #[instrument(skip_all, fields(job_id = %job.id()))]
    pub fn import(
        &self,
        job: &Job,
        credentials: &ApiCredentials,
    ) -> Result<ImportSummary, MigrationError> {
        let entries = self
            .ctx
            .archives
            .extract(job.id(), job.archive())
            .map_err(|source| MigrationError::Archive {
                job_id: job.id().clone(),
                source,
            })?;
        if let Err(error) = self.ctx.archives.discard(job.id()) {
            warn!(%error, "extracted files left behind");
        }

        let mut summary = ImportSummary::default();
        for entry in &entries {
            if !entry.is_html() {
                summary.ignored_files += 1;
                info!(file = %entry.name, kind = ?entry.kind, "not an html document; ignored");
                continue;
            }
            summary.html_files += 1;

            match self.import_file(job, credentials, entry) {
                FileOutcome::Created(document_id) => {
                    summary.created += 1;
                    info!(file = %entry.name, %document_id, "document created");
                }
                FileOutcome::Skipped => summary.skipped += 1,
            }
        }

        if summary.processed() != summary.html_files {
            return Err(MigrationError::CountMismatch {
                job_id: job.id().clone(),
                created: summary.created,
                skipped: summary.skipped,
                html_files: summary.html_files,
            });
        }

        info!(
            created = summary.created,
            skipped = summary.skipped,
            ignored = summary.ignored_files,
            "archive imported"
        );
        Ok(summary)
    }

    fn import_file(
        &self,
        job: &Job,
        credentials: &ApiCredentials,
        entry: &ArchiveEntry,
    ) -> FileOutcome {
        let raw = String::from_utf8_lossy(&entry.contents);

        let (title, body) = match transform::prepare(&entry.name, &raw) {
            Prepared::Empty => {
                info!(file = %entry.name, "default empty document; skipped");
                return FileOutcome::Skipped;
            }
            Prepared::Document { title, body } => (title, body),
        };

        let body = self.assets.migrate(job.id().as_str(), &entry.name, &body);
        let document = NewDocument {
            title,
            body,
            subtitle: String::new(),
            content_type: HTML_CONTENT_TYPE.to_string(),
        };

        match self.ctx.documents.create_document(credentials, &document) {
            Ok(result) => match result.document_id() {
                Some(id) => FileOutcome::Created(id.to_string()),
                None => {
                    error!(
                        job_id = %job.id(),
                        file = %entry.name,
                        "create call returned no document id"
                    );
                    FileOutcome::Skipped
                }
            },
            Err(err) => {
                error!(job_id = %job.id(), file = %entry.name, error = %err, "create call failed");
                FileOutcome::Skipped
            }
        }
    }
}

impl std::fmt::Debug for DocumentImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentImporter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::MigrationSettings;
    use crate::ports::{
        ArchiveEntry, InMemoryAccountStore, InMemoryAssetStore, InMemoryClientIds,
        RecordingDocumentApi, RecordingNotifier, StaticArchives, StaticAssetFetcher,
    };
    use crate::transform::EMPTY_DOCUMENT_TEMPLATE;
    use padmigrate_core::{ClientId, JobPayload};

    const ARCHIVE: &str = "/spool/exp1.zip";

    fn job() -> Job {
        Job::from_payload(JobPayload {
            from: "Jane <jane@x.com>".into(),
            email_address: "jane@x.com".into(),
            attachment: ARCHIVE.into(),
        })
        .unwrap()
    }

    fn credentials() -> ApiCredentials {
        ApiCredentials {
            client_id: ClientId::new("client-1").unwrap(),
            secret: "s".repeat(32),
        }
    }

    fn importer(
        entries: Vec<ArchiveEntry>,
        documents: RecordingDocumentApi,
    ) -> (DocumentImporter, Arc<RecordingDocumentApi>) {
        let documents = Arc::new(documents);
        let ctx = MigrationContext {
            accounts: Arc::new(InMemoryAccountStore::new()),
            client_ids: Arc::new(InMemoryClientIds::new()),
            documents: documents.clone(),
            asset_store: Arc::new(InMemoryAssetStore::new("https://assets.test")),
            asset_fetcher: Arc::new(StaticAssetFetcher::new()),
            archives: Arc::new(StaticArchives::new().with(ARCHIVE, entries)),
            notifier: Arc::new(RecordingNotifier::new()),
            settings: MigrationSettings::default(),
        };
        (DocumentImporter::new(ctx), documents)
    }

    #[test]
    fn counts_cover_every_html_entry_and_skip_other_types() {
        let entries = vec![
            ArchiveEntry::html("a.html", "<html><body><h1>A</h1></body></html>"),
            ArchiveEntry::html("b.html", "<html><body><p>b</p></body></html>"),
            ArchiveEntry::html("c.html", EMPTY_DOCUMENT_TEMPLATE),
            ArchiveEntry::other("logo.png", "image/png", vec![0x89, b'P', b'N', b'G']),
            ArchiveEntry::other("notes.txt", "text/plain", b"hi".to_vec()),
        ];
        let (importer, documents) = importer(entries, RecordingDocumentApi::new());

        let summary = importer.import(&job(), &credentials()).unwrap();

        assert_eq!(summary.html_files, 3);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.ignored_files, 2);
        assert_eq!(summary.processed(), summary.html_files);

        let titles: Vec<String> = documents.calls().into_iter().map(|(_, d)| d.title).collect();
        assert_eq!(titles, vec!["A", "b"]);
    }

    #[test]
    fn empty_template_never_reaches_the_api() {
        let (importer, documents) = importer(
            vec![ArchiveEntry::html("Untitled.html", EMPTY_DOCUMENT_TEMPLATE)],
            RecordingDocumentApi::new(),
        );

        let summary = importer.import(&job(), &credentials()).unwrap();

        assert_eq!((summary.created, summary.skipped), (0, 1));
        assert!(documents.calls().is_empty());
    }

    #[test]
    fn create_call_without_id_counts_as_skipped() {
        let (importer, documents) = importer(
            vec![
                ArchiveEntry::html("ok.html", "<body><h1>Kept</h1></body>"),
                ArchiveEntry::html("bad.html", "<body><h1>Refused</h1></body>"),
            ],
            RecordingDocumentApi::new().rejecting("Refused"),
        );

        let summary = importer.import(&job(), &credentials()).unwrap();

        assert_eq!((summary.created, summary.skipped), (1, 1));
        assert_eq!(documents.calls().len(), 2);
    }

    #[test]
    fn document_is_sent_as_html_with_empty_subtitle() {
        let (importer, documents) = importer(
            vec![ArchiveEntry::html(
                "plan.html",
                "<html><head></head><body>\n<h1>Plan</h1>\n</body></html>",
            )],
            RecordingDocumentApi::new(),
        );

        importer.import(&job(), &credentials()).unwrap();

        let (creds, document) = documents.calls().remove(0);
        assert_eq!(creds, credentials());
        assert_eq!(document.body, "<h1>Plan</h1>");
        assert_eq!(document.subtitle, "");
        assert_eq!(document.content_type, "text/html");
    }

    #[test]
    fn missing_archive_is_an_archive_error() {
        let (importer, _) = importer(vec![], RecordingDocumentApi::new());
        let other = Job::from_payload(JobPayload {
            from: String::new(),
            email_address: "jane@x.com".into(),
            attachment: "/spool/unknown.zip".into(),
        })
        .unwrap();

        let err = importer.import(&other, &credentials()).unwrap_err();
        assert!(matches!(err, MigrationError::Archive { .. }));
    }

    #[test]
    fn extracted_files_are_discarded_once_read() {
        let archives = StaticArchives::new().with(
            ARCHIVE,
            vec![ArchiveEntry::html("a.html", "<body><h1>A</h1></body>")],
        );
        let ctx = MigrationContext {
            accounts: Arc::new(InMemoryAccountStore::new()),
            client_ids: Arc::new(InMemoryClientIds::new()),
            documents: Arc::new(RecordingDocumentApi::new()),
            asset_store: Arc::new(InMemoryAssetStore::new("https://assets.test")),
            asset_fetcher: Arc::new(StaticAssetFetcher::new()),
            archives: Arc::new(archives.clone()),
            notifier: Arc::new(RecordingNotifier::new()),
            settings: MigrationSettings::default(),
        };

        let summary = DocumentImporter::new(ctx)
            .import(&job(), &credentials())
            .unwrap();

        assert_eq!(summary.created, 1);
        assert_eq!(archives.discarded(), vec![job().id().clone()]);
    }
}
