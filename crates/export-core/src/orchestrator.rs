//! Export orchestration
//!
//! Drives the deployment state machine for one campaign at a time:
//! validation, destination preparation, batched lead delivery, persistence.
//! Remote runs leave the platform campaign in draft/paused state; activation
//! is an explicit user action outside this pipeline.

use crate::destinations::{DeliveryReport, ExportDestination, ExportOutput};
use crate::error::{ExportError, Result};
use crate::repository::ExportRepository;
use crate::validation::advanced;
use chrono::Utc;
use export_types::{
    CampaignBlock, DeploymentStep, ExportRecord, ExportRecordPatch, ExportStatus, IssueKind,
    LeadExportInfo, ValidationIssue,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Step names streamed to the caller, one per pipeline stage
pub mod steps {
    pub const VALIDATING: &str = "validating";
    pub const CREATING_CAMPAIGN: &str = "creating_campaign";
    pub const ASSOCIATING_ACCOUNTS: &str = "associating_accounts";
    pub const UPLOADING_LEADS: &str = "uploading_leads";
    pub const PERSISTING: &str = "persisting";
    pub const RESOLVING_VARIABLES: &str = "resolving_variables";
    pub const SERIALIZING: &str = "serializing";
}

/// Everything one export run needs, threaded in explicitly
///
/// Tenant identity and destination credentials arrive as parameters (the
/// adapters carry the credentials), so a run is a pure function of its
/// inputs and testable without a live session.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub campaign_id: String,
    pub campaign_name: String,
    pub tenant_id: String,
    pub blocks: Vec<CampaignBlock>,
    pub leads: Vec<LeadExportInfo>,
    pub sending_accounts: Vec<String>,
    /// External id of a prior export at this destination; set by the
    /// orchestrator from the repository, turns create into ensure/overwrite
    pub prior_external_id: Option<String>,
}

/// Cooperative cancellation flag, honored between steps and batches
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Collects step updates for the run and streams them to the caller
pub struct StepReporter {
    tx: Option<mpsc::UnboundedSender<DeploymentStep>>,
    steps: Mutex<Vec<DeploymentStep>>,
}

impl StepReporter {
    pub fn new(tx: mpsc::UnboundedSender<DeploymentStep>) -> Self {
        Self {
            tx: Some(tx),
            steps: Mutex::new(Vec::new()),
        }
    }

    /// Reporter that only records, for callers that do not stream
    pub fn silent() -> Self {
        Self {
            tx: None,
            steps: Mutex::new(Vec::new()),
        }
    }

    /// Record a step transition and push it to the stream
    pub fn update(&self, step: DeploymentStep) {
        {
            let mut steps = self.steps.lock().unwrap();
            if let Some(existing) = steps.iter_mut().find(|s| s.name == step.name) {
                *existing = step.clone();
            } else {
                steps.push(step.clone());
            }
        }

        if let Some(tx) = &self.tx {
            // Receiver dropping mid-run just stops the live stream.
            let _ = tx.send(step);
        }
    }

    /// Latest state of every step, in first-seen order
    pub fn snapshot(&self) -> Vec<DeploymentStep> {
        self.steps.lock().unwrap().clone()
    }
}

/// Terminal result of a successful (possibly partial) export run
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    /// Persisted record; remote destinations only
    pub record: Option<ExportRecord>,
    pub output: ExportOutput,
    /// Non-blocking findings surfaced to the user (partial failure counts)
    pub warnings: Vec<ValidationIssue>,
    pub steps: Vec<DeploymentStep>,
}

/// Single orchestration component; owns the in-progress run registry
pub struct ExportOrchestrator {
    repository: Arc<ExportRepository>,
    active: Mutex<HashMap<String, CancelFlag>>,
}

impl ExportOrchestrator {
    pub fn new(repository: Arc<ExportRepository>) -> Self {
        Self {
            repository,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Whether an export run is currently in flight for the campaign
    pub fn is_active(&self, campaign_id: &str) -> bool {
        self.active.lock().unwrap().contains_key(campaign_id)
    }

    /// Request cancellation of an active run; takes effect between steps
    pub fn cancel(&self, campaign_id: &str) -> bool {
        match self.active.lock().unwrap().get(campaign_id) {
            Some(flag) => {
                flag.cancel();
                log::info!("Cancellation requested for campaign {}", campaign_id);
                true
            }
            None => false,
        }
    }

    /// Run one export end to end
    pub async fn export(
        &self,
        destination: Arc<dyn ExportDestination>,
        mut job: ExportJob,
        progress: &StepReporter,
    ) -> Result<ExportOutcome> {
        let run_id = Uuid::new_v4();
        let kind = destination.kind();
        log::info!(
            "Export run {} started: campaign {} -> {} ({} leads, {} blocks)",
            run_id,
            job.campaign_id,
            kind,
            job.leads.len(),
            job.blocks.len()
        );

        let cancel = self.claim(&job.campaign_id)?;
        let result = self
            .run_pipeline(destination, &mut job, progress, &cancel)
            .await;
        self.release(&job.campaign_id);

        match &result {
            Ok(_) => log::info!("Export run {} finished", run_id),
            Err(e) => log::error!("Export run {} failed: {}", run_id, e),
        }

        result
    }

    fn claim(&self, campaign_id: &str) -> Result<CancelFlag> {
        let mut active = self.active.lock().unwrap();
        if active.contains_key(campaign_id) {
            return Err(ExportError::Export(format!(
                "An export is already running for campaign {}",
                campaign_id
            )));
        }

        let flag = CancelFlag::new();
        active.insert(campaign_id.to_string(), flag.clone());
        Ok(flag)
    }

    fn release(&self, campaign_id: &str) {
        self.active.lock().unwrap().remove(campaign_id);
    }

    async fn run_pipeline(
        &self,
        destination: Arc<dyn ExportDestination>,
        job: &mut ExportJob,
        progress: &StepReporter,
        cancel: &CancelFlag,
    ) -> Result<ExportOutcome> {
        let kind = destination.kind();

        // Stage 1: validation gate. Blocking errors never reach the network.
        progress.update(DeploymentStep::in_progress(steps::VALIDATING));
        let summary = advanced::validate(&job.blocks, &job.leads, &job.sending_accounts, kind);
        if !summary.valid {
            let detail = summary
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            progress.update(DeploymentStep::failed(steps::VALIDATING, detail.clone()));
            return Err(ExportError::Validation(detail));
        }
        progress.update(DeploymentStep::success(steps::VALIDATING));
        let mut warnings = summary.warnings;

        if kind.is_remote() {
            self.run_remote(destination, job, progress, cancel, &mut warnings)
                .await
        } else {
            self.run_local(destination, job, progress, &mut warnings).await
        }
    }

    /// Remote pipeline: create/ensure campaign, associate accounts, upload
    /// leads in batches, persist the record.
    async fn run_remote(
        &self,
        destination: Arc<dyn ExportDestination>,
        job: &mut ExportJob,
        progress: &StepReporter,
        cancel: &CancelFlag,
        warnings: &mut Vec<ValidationIssue>,
    ) -> Result<ExportOutcome> {
        let kind = destination.kind();

        // Re-export without a prior clear reuses the existing remote campaign.
        let prior = self.repository.get_record(&job.campaign_id)?;
        if prior.destination == Some(kind) {
            job.prior_external_id = prior.external_id.clone();
            if let Some(id) = &job.prior_external_id {
                log::info!(
                    "Campaign {} already exported to {} as {}; updating in place",
                    job.campaign_id,
                    kind,
                    id
                );
            }
        }

        self.repository.upsert(
            &job.campaign_id,
            ExportRecordPatch {
                status: Some(ExportStatus::Pending),
                ..Default::default()
            },
        )?;

        let prepared = match destination.prepare(job, progress).await {
            Ok(p) => p,
            Err(e) => {
                // Failure before lead upload aborts the whole run. A storage
                // failure here is logged but must not mask the cause.
                if let Err(persist_err) =
                    self.persist_status(&job.campaign_id, ExportStatus::Failed, progress)
                {
                    log::error!("Failed to record aborted export: {}", persist_err);
                }
                return Err(e);
            }
        };

        let external_id = prepared.external_id.clone().ok_or_else(|| {
            ExportError::Export(format!("{} returned no campaign identifier", kind))
        })?;

        self.repository.upsert(
            &job.campaign_id,
            ExportRecordPatch {
                external_id: Some(external_id.clone()),
                destination: Some(kind),
                ..Default::default()
            },
        )?;

        // Cancellation between prepare and deliver keeps the created draft
        // campaign; the partial outcome is persisted, not discarded.
        let report = if cancel.is_cancelled() {
            progress.update(DeploymentStep::skipped(steps::UPLOADING_LEADS));
            DeliveryReport {
                total_leads: job.leads.iter().filter(|l| l.has_email()).count(),
                cancelled: true,
                skipped_leads: job.leads.iter().filter(|l| l.has_email()).count(),
                ..Default::default()
            }
        } else {
            match destination.deliver(job, &prepared, progress, cancel).await {
                Ok(report) => report,
                Err(e) => {
                    // The remote campaign exists; from here on the run is a
                    // partial failure, never a rollback.
                    if let Err(persist_err) = self.persist_status(
                        &job.campaign_id,
                        ExportStatus::PartialFailure,
                        progress,
                    ) {
                        log::error!("Failed to record partial failure: {}", persist_err);
                    }
                    return Err(e);
                }
            }
        };

        let status = if report.is_complete_success() {
            ExportStatus::Success
        } else {
            ExportStatus::PartialFailure
        };

        if report.failed_leads > 0 {
            warnings.push(
                ValidationIssue::new(
                    IssueKind::UploadFailure,
                    format!(
                        "{} of {} leads failed to upload (batches {:?}); successfully uploaded leads were kept",
                        report.failed_leads, report.total_leads, report.failed_batches
                    ),
                )
                .with_count(report.failed_leads)
                .with_action("Re-run the export to retry the failed leads"),
            );
        }
        if report.cancelled {
            warnings.push(
                ValidationIssue::new(
                    IssueKind::UploadFailure,
                    format!(
                        "Export cancelled: {} of {} leads were never attempted",
                        report.skipped_leads, report.total_leads
                    ),
                )
                .with_count(report.skipped_leads),
            );
        }

        let output = destination.finalize(job, &prepared, &report, progress).await?;
        self.persist_status(&job.campaign_id, status, progress)?;

        let record = self.repository.get_record(&job.campaign_id)?;
        Ok(ExportOutcome {
            record: Some(record),
            output,
            warnings: std::mem::take(warnings),
            steps: progress.snapshot(),
        })
    }

    /// Local pipeline: resolve variables, serialize. No network, no partial
    /// failure state, no record writes.
    async fn run_local(
        &self,
        destination: Arc<dyn ExportDestination>,
        job: &ExportJob,
        progress: &StepReporter,
        warnings: &mut Vec<ValidationIssue>,
    ) -> Result<ExportOutcome> {
        let prepared = destination.prepare(job, progress).await?;
        let report = destination
            .deliver(job, &prepared, progress, &CancelFlag::new())
            .await?;
        let output = destination.finalize(job, &prepared, &report, progress).await?;

        Ok(ExportOutcome {
            record: None,
            output,
            warnings: std::mem::take(warnings),
            steps: progress.snapshot(),
        })
    }

    fn persist_status(
        &self,
        campaign_id: &str,
        status: ExportStatus,
        progress: &StepReporter,
    ) -> Result<()> {
        progress.update(DeploymentStep::in_progress(steps::PERSISTING));

        let result = self.repository.upsert(
            campaign_id,
            ExportRecordPatch {
                status: Some(status),
                exported_at: Some(Utc::now()),
                ..Default::default()
            },
        );

        match result {
            Ok(_) => {
                progress.update(
                    DeploymentStep::success(steps::PERSISTING)
                        .with_detail(status.as_str().to_string()),
                );
                Ok(())
            }
            Err(e) => {
                // Storage failures are fatal to the run and logged in full;
                // the caller surfaces a generic retry-safe message.
                log::error!(
                    "Failed to persist export record for campaign {}: {}",
                    campaign_id,
                    e
                );
                progress.update(DeploymentStep::failed(steps::PERSISTING, e.to_string()));
                Err(ExportError::Storage(format!(
                    "Failed to persist export record: {}",
                    e
                )))
            }
        }
    }
}
