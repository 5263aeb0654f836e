//! Export destination adapters
//!
//! Each destination (remote sending platform or local output format)
//! implements the `ExportDestination` capability trait. The orchestrator
//! drives `prepare` / `deliver` / `finalize` and never branches on a
//! destination name.

pub mod clipboard;
pub mod csv_file;
pub mod instantly;
pub mod smartlead;

// Re-export all adapter types
pub use clipboard::ClipboardDestination;
pub use csv_file::CsvFileDestination;
pub use instantly::InstantlyDestination;
pub use smartlead::SmartleadDestination;

use crate::error::Result;
use crate::orchestrator::{CancelFlag, ExportJob, StepReporter};
use crate::registry;
use crate::resolver::EmailContent;
use async_trait::async_trait;
use export_types::Destination;
use serde_json::Value;

/// Outcome of `prepare`: the remote campaign shell or locally resolved content
#[derive(Debug, Clone, Default)]
pub struct Prepared {
    /// Identifier of the remote campaign; `None` for local outputs
    pub external_id: Option<String>,
    /// Per-lead resolved email content; populated by local outputs only
    pub resolved: Vec<ResolvedLead>,
}

/// One lead's fully resolved email sequence
#[derive(Debug, Clone)]
pub struct ResolvedLead {
    pub lead: export_types::LeadExportInfo,
    /// Resolved content per email block, in block order
    pub emails: Vec<EmailContent>,
}

/// Aggregated result of the lead delivery stage
///
/// Partial failure is data, not an error path: `deliver` returns `Ok` with
/// failure counts whenever anything was delivered at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryReport {
    pub total_leads: usize,
    pub uploaded_leads: usize,
    pub failed_leads: usize,
    /// Leads never attempted because the run was cancelled between batches
    pub skipped_leads: usize,
    /// Zero-based indices of failed batches, in stable batch order
    pub failed_batches: Vec<usize>,
    pub cancelled: bool,
}

impl DeliveryReport {
    pub fn is_complete_success(&self) -> bool {
        self.failed_leads == 0 && self.skipped_leads == 0 && !self.cancelled
    }
}

/// Terminal artifact of an export run
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutput {
    /// Campaign deployed to a remote platform, left in draft/paused state
    Remote { external_id: String },
    /// Downloadable tabular file
    File { filename: String, content: String },
    /// Plain text for client-side clipboard copy
    Text { content: String },
}

/// Capability interface implemented once per destination
#[async_trait]
pub trait ExportDestination: Send + Sync {
    fn kind(&self) -> Destination;

    /// Set up the destination side: create or reuse the remote campaign and
    /// associate sending accounts, or resolve content for local output.
    async fn prepare(&self, job: &ExportJob, progress: &StepReporter) -> Result<Prepared>;

    /// Move the leads to the destination, honoring cancellation between
    /// batches. Never activates the campaign.
    async fn deliver(
        &self,
        job: &ExportJob,
        prepared: &Prepared,
        progress: &StepReporter,
        cancel: &CancelFlag,
    ) -> Result<DeliveryReport>;

    /// Produce the terminal artifact; remote campaigns stay paused.
    async fn finalize(
        &self,
        job: &ExportJob,
        prepared: &Prepared,
        report: &DeliveryReport,
        progress: &StepReporter,
    ) -> Result<ExportOutput>;
}

/// Resolve every lead's content against the campaign's email blocks, in
/// position order. Shared by the local output adapters.
pub(crate) fn resolve_for_leads(job: &ExportJob) -> Vec<ResolvedLead> {
    let mut blocks = job.blocks.clone();
    blocks.sort_by_key(|b| b.position());
    let emails: Vec<_> = blocks.iter().filter_map(|b| b.as_email()).collect();

    job.leads
        .iter()
        .map(|lead| ResolvedLead {
            lead: lead.clone(),
            emails: emails
                .iter()
                .map(|block| {
                    crate::resolver::resolve(
                        &EmailContent {
                            subject: block.subject.clone(),
                            body: block.body.clone(),
                        },
                        lead,
                    )
                })
                .collect(),
        })
        .collect()
}

/// Translate registry tags in `text` to a destination's native placeholder
/// syntax. Tags the mapper declines and registry-unknown tags stay verbatim.
pub(crate) fn map_registry_tags<F>(text: &str, mapper: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut mapped = text.to_string();
    for variable in registry::variables() {
        if let Some(native) = mapper(variable.name) {
            mapped = mapped.replace(&variable.template_tag, &native);
        }
    }
    mapped
}

/// Drive batched lead upload with a fixed concurrency window
///
/// Batches are attempted in stable order; failures within a window are
/// aggregated before the next window starts, so "first N succeeded,
/// remainder failed" reporting is deterministic. Cancellation is honored
/// between windows, never mid-call.
pub(crate) async fn run_lead_batches<F, Fut>(
    rows: Vec<Value>,
    batch_size: usize,
    concurrency: usize,
    cancel: &CancelFlag,
    upload: F,
) -> DeliveryReport
where
    F: Fn(usize, Vec<Value>) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let total_leads = rows.len();
    let batches: Vec<Vec<Value>> = rows
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect();

    let mut report = DeliveryReport {
        total_leads,
        ..Default::default()
    };

    let mut next_index = 0;
    for window in batches.chunks(concurrency.max(1)) {
        if cancel.is_cancelled() {
            report.cancelled = true;
            report.skipped_leads = batches[next_index..].iter().map(Vec::len).sum();
            log::warn!(
                "Lead upload cancelled after {} of {} batches",
                next_index,
                batches.len()
            );
            break;
        }

        let uploads = window
            .iter()
            .enumerate()
            .map(|(offset, batch)| upload(next_index + offset, batch.clone()));
        let results = futures::future::join_all(uploads).await;

        for (offset, result) in results.into_iter().enumerate() {
            let batch_len = window[offset].len();
            match result {
                Ok(()) => report.uploaded_leads += batch_len,
                Err(e) => {
                    log::error!("Lead batch {} failed: {}", next_index + offset, e);
                    report.failed_leads += batch_len;
                    report.failed_batches.push(next_index + offset);
                }
            }
        }

        next_index += window.len();
    }

    report
}
