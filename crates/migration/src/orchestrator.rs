//! Per-job state machine.
//!
//! A job runs provisioning, client lookup, import and notification in that
//! order and stops at the first failure. Nothing already written is rolled
//! back; the dispatcher leaves failed jobs in processing for an operator.

use tracing::{error, info, instrument, warn};

use padmigrate_core::{Job, display_name};

use crate::context::MigrationContext;
use crate::error::MigrationError;
use crate::importer::{DocumentImporter, ImportSummary};
use crate::notification;
use crate::ports::{ApiCredentials, Email};
use crate::provisioner::AccountProvisioner;

pub struct JobOrchestrator {
    ctx: MigrationContext,
    provisioner: AccountProvisioner,
    importer: DocumentImporter,
}

impl JobOrchestrator {
    pub fn new(ctx: MigrationContext) -> Self {
        let provisioner = AccountProvisioner::new(ctx.accounts.clone(), ctx.settings.domain_id);
        let importer = DocumentImporter::new(ctx.clone());
        Self {
            ctx,
            provisioner,
            importer,
        }
    }

    /// Drive one job to completion and notify the customer or the operator.
    #[instrument(skip_all, fields(job_id = %job.id()))]
    pub fn run(&self, job: &Job) -> Result<ImportSummary, MigrationError> {
        match self.migrate(job) {
            Ok(summary) => Ok(summary),
            Err(err) => {
                error!(job_id = %job.id(), kind = err.kind(), error = %err, "migration job failed");
                self.notify(&notification::failure_email(&self.ctx.settings, job, &err));
                Err(err)
            }
        }
    }

    fn migrate(&self, job: &Job) -> Result<ImportSummary, MigrationError> {
        let name = display_name(job.sender(), job.email());
        let provisioning = self.provisioner.provision(job.email(), &name)?;

        let client_id = self
            .ctx
            .client_ids
            .client_id(provisioning.account_id)?
            .ok_or(MigrationError::ClientIdentityMissing {
                account_id: provisioning.account_id,
            })?;

        let credentials = ApiCredentials {
            client_id,
            secret: provisioning.secret,
        };
        let summary = self.importer.import(job, &credentials)?;

        if summary.processed() == 0 {
            return Err(MigrationError::NoFilesProcessed {
                job_id: job.id().clone(),
            });
        }

        info!(
            account_id = %provisioning.account_id,
            account_created = provisioning.account_created,
            created = summary.created,
            skipped = summary.skipped,
            "migration job finished"
        );
        self.notify(&notification::success_email(
            &self.ctx.settings,
            job,
            &summary,
            provisioning.account_created,
            &name,
        ));
        Ok(summary)
    }

    fn notify(&self, email: &Email) {
        if let Err(err) = self.ctx.notifier.send(email) {
            warn!(to = %email.to, error = %err, "notification not sent");
        }
    }
}

impl std::fmt::Debug for JobOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobOrchestrator")
            .field("settings", &self.ctx.settings)
            .finish_non_exhaustive()
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
    use padmigrate_core::{AccountId, ClientId, DEFAULT_DOMAIN_ID, JobPayload};

    const ARCHIVE: &str = "/spool/exp1.zip";

    struct Harness {
        orchestrator: JobOrchestrator,
        accounts: Arc<InMemoryAccountStore>,
        documents: Arc<RecordingDocumentApi>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness(client_ids: InMemoryClientIds, entries: Vec<ArchiveEntry>) -> Harness {
        let accounts = Arc::new(InMemoryAccountStore::new());
        let documents = Arc::new(RecordingDocumentApi::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let ctx = MigrationContext {
            accounts: accounts.clone(),
            client_ids: Arc::new(client_ids),
            documents: documents.clone(),
            asset_store: Arc::new(InMemoryAssetStore::new("https://assets.test")),
            asset_fetcher: Arc::new(StaticAssetFetcher::new()),
            archives: Arc::new(StaticArchives::new().with(ARCHIVE, entries)),
            notifier: notifier.clone(),
            settings: MigrationSettings::default(),
        };
        Harness {
            orchestrator: JobOrchestrator::new(ctx),
            accounts,
            documents,
            notifier,
        }
    }

    fn job() -> Job {
        Job::from_payload(JobPayload {
            from: "Doe, Jane <jane@x.com>".into(),
            email_address: "jane@x.com".into(),
            attachment: ARCHIVE.into(),
        })
        .unwrap()
    }

    // Fresh stores hand out account ids from 1000.
    fn first_account_client() -> InMemoryClientIds {
        InMemoryClientIds::new().with(AccountId::new(1000), ClientId::new("client-1").unwrap())
    }

    #[test]
    fn successful_job_creates_documents_and_notifies_customer() {
        let h = harness(
            first_account_client(),
            vec![
                ArchiveEntry::html("a.html", "<body><h1>A</h1></body>"),
                ArchiveEntry::html("b.html", "<body><h1>B</h1></body>"),
                ArchiveEntry::html("c.html", EMPTY_DOCUMENT_TEMPLATE),
            ],
        );

        let summary = h.orchestrator.run(&job()).unwrap();

        assert_eq!((summary.created, summary.skipped), (2, 1));
        let account = h.accounts.account("jane@x.com", DEFAULT_DOMAIN_ID).unwrap();
        assert_eq!(account.display_name, "Jane Doe");

        let calls = h.documents.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0.client_id.as_str(), "client-1");
        assert_eq!(calls[0].0.secret.len(), 32);

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "jane@x.com");
        assert!(sent[0].text.contains("Documents created: 2"));
        assert!(sent[0].text.contains("account was created"));
    }

    #[test]
    fn missing_client_id_aborts_and_reports_to_operator() {
        let h = harness(
            InMemoryClientIds::new(),
            vec![ArchiveEntry::html("a.html", "<body><h1>A</h1></body>")],
        );

        let err = h.orchestrator.run(&job()).unwrap_err();

        assert!(matches!(err, MigrationError::ClientIdentityMissing { .. }));
        assert!(h.documents.calls().is_empty());
        // account and credential stay in place
        assert_eq!(h.accounts.writes(), 2);

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, MigrationSettings::default().operator_email);
        assert!(sent[0].text.contains("exp1"));
    }

    #[test]
    fn archive_without_html_is_a_failure() {
        let h = harness(
            first_account_client(),
            vec![ArchiveEntry::other("logo.png", "image/png", vec![1, 2, 3])],
        );

        let err = h.orchestrator.run(&job()).unwrap_err();

        assert!(matches!(err, MigrationError::NoFilesProcessed { .. }));
        assert_eq!(err.kind(), "integrity");
        assert_eq!(h.notifier.sent()[0].to, MigrationSettings::default().operator_email);
    }

    #[test]
    fn rerun_reuses_account_and_credential() {
        let h = harness(
            first_account_client(),
            vec![ArchiveEntry::html("a.html", "<body><h1>A</h1></body>")],
        );

        h.orchestrator.run(&job()).unwrap();
        h.orchestrator.run(&job()).unwrap();

        assert_eq!(h.accounts.writes(), 2);
        let calls = h.documents.calls();
        assert_eq!(calls[0].0, calls[1].0);
        assert!(!h.notifier.sent()[1].text.contains("account was created"));
    }
}
