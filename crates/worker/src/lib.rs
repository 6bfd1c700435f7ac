//! `padmigrate-worker`: wires the adapters together and runs operator
//! commands.

pub mod cli;

use std::sync::Arc;

use anyhow::{Context, bail};
use tracing::info;

use padmigrate_core::{Job, JobId};
use padmigrate_infra::external::{HttpAssetFetcher, HttpAssetStore, HttpDocumentApi, SmtpNotifier};
use padmigrate_infra::jobs::{JobDispatcher, JobHandler, JobQueue};
use padmigrate_infra::{
    FileClientIdTable, MySqlAccountStore, RedisJobQueue, Settings, ZipArchiveExtractor,
};
use padmigrate_migration::{JobOrchestrator, MigrationContext};

use cli::{Cli, Command};

/// Run the command selected on the command line.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let queue = RedisJobQueue::new(&cli.redis_url, Some(&cli.queue_prefix))
        .context("opening the job queue")?;

    match cli.command() {
        Command::Run => {
            let settings = Settings::from_env().context("loading configuration")?;
            run(&settings, Arc::new(queue))
        }
        Command::Requeue { job_id } => requeue(&queue, &job_id),
        Command::Status => status(&queue),
    }
}

/// Recover interrupted claims and dispatch jobs forever.
pub fn run(settings: &Settings, queue: Arc<RedisJobQueue>) -> anyhow::Result<()> {
    let recovered = queue.recover().context("recovering claimed jobs")?;
    if recovered > 0 {
        info!(recovered, "interrupted claims moved to processing");
    }

    let ctx = build_context(settings)?;
    let orchestrator = Arc::new(JobOrchestrator::new(ctx));
    let handler: JobHandler = Arc::new(move |job: &Job| orchestrator.run(job));

    info!(
        queue = %queue.keys().pending,
        max_concurrent = settings.max_concurrent,
        "worker ready"
    );
    JobDispatcher::new(queue, handler).run(settings.dispatcher_config());
    Ok(())
}

/// Build the production adapters for a migration.
pub fn build_context(settings: &Settings) -> anyhow::Result<MigrationContext> {
    let accounts = MySqlAccountStore::connect(
        &settings.mysql_url,
        settings.mysql_max_connections,
        settings.http_timeout,
    )
    .context("connecting to the account database")?;
    let documents = HttpDocumentApi::new(&settings.api_url, settings.http_timeout)
        .context("building the document API client")?;
    let asset_store = HttpAssetStore::new(settings.asset_store_config())
        .context("building the asset store client")?;
    let asset_fetcher =
        HttpAssetFetcher::new(settings.http_timeout).context("building the asset fetcher")?;
    let notifier =
        SmtpNotifier::new(&settings.smtp_config()).context("configuring the mail relay")?;

    Ok(MigrationContext {
        accounts: Arc::new(accounts),
        client_ids: Arc::new(FileClientIdTable::new(
            &settings.client_id_dir,
            &settings.client_id_key,
        )),
        documents: Arc::new(documents),
        asset_store: Arc::new(asset_store),
        asset_fetcher: Arc::new(asset_fetcher),
        archives: Arc::new(ZipArchiveExtractor::new(&settings.work_dir)),
        notifier: Arc::new(notifier),
        settings: settings.migration_settings(),
    })
}

/// Put a job left in processing back onto the pending list.
pub fn requeue(queue: &dyn JobQueue, job_id: &str) -> anyhow::Result<()> {
    let job_id = JobId::new(job_id)?;
    if !queue.requeue(&job_id).context("requeueing job")? {
        bail!("job {job_id} is not in processing");
    }
    info!(%job_id, "job requeued");
    println!("requeued {job_id}");
    Ok(())
}

/// Print queue counts as JSON.
pub fn status(queue: &dyn JobQueue) -> anyhow::Result<()> {
    let stats = queue.stats().context("reading queue counts")?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
