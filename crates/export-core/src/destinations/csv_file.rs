//! CSV file destination
//!
//! Local output: resolves every lead and serializes the campaign into
//! comma-separated UTF-8 rows for download. No network steps, so the export
//! either fully succeeds or fails atomically.

use super::{resolve_for_leads, DeliveryReport, ExportDestination, ExportOutput, Prepared};
use crate::error::Result;
use crate::orchestrator::{steps, CancelFlag, ExportJob, StepReporter};
use async_trait::async_trait;
use export_types::{DeploymentStep, Destination};

const MAX_FILENAME_LEN: usize = 100;

pub struct CsvFileDestination;

impl CsvFileDestination {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvFileDestination {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive a download filename from the campaign name: filesystem-unsafe
/// characters stripped, lower-cased, spaces to hyphens, truncated to 100
/// characters.
pub fn derive_filename(campaign_name: &str) -> String {
    let mut stem: String = campaign_name
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    stem.truncate(MAX_FILENAME_LEN);
    if stem.is_empty() {
        stem = "campaign".to_string();
    }

    format!("{}.csv", stem)
}

/// Quote a field per RFC 4180 when it carries separators or quotes
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[async_trait]
impl ExportDestination for CsvFileDestination {
    fn kind(&self) -> Destination {
        Destination::CsvFile
    }

    async fn prepare(&self, job: &ExportJob, progress: &StepReporter) -> Result<Prepared> {
        progress.update(DeploymentStep::in_progress(steps::RESOLVING_VARIABLES));
        let resolved = resolve_for_leads(job);
        progress.update(
            DeploymentStep::success(steps::RESOLVING_VARIABLES)
                .with_detail(format!("{} leads resolved", resolved.len())),
        );

        Ok(Prepared {
            external_id: None,
            resolved,
        })
    }

    async fn deliver(
        &self,
        _job: &ExportJob,
        prepared: &Prepared,
        _progress: &StepReporter,
        _cancel: &CancelFlag,
    ) -> Result<DeliveryReport> {
        // No transport; every resolved lead lands in the file.
        Ok(DeliveryReport {
            total_leads: prepared.resolved.len(),
            uploaded_leads: prepared.resolved.len(),
            ..Default::default()
        })
    }

    async fn finalize(
        &self,
        job: &ExportJob,
        prepared: &Prepared,
        _report: &DeliveryReport,
        progress: &StepReporter,
    ) -> Result<ExportOutput> {
        progress.update(DeploymentStep::in_progress(steps::SERIALIZING));

        let step_count = prepared
            .resolved
            .first()
            .map(|r| r.emails.len())
            .unwrap_or(0);

        let mut header: Vec<String> = [
            "email",
            "first_name",
            "last_name",
            "company_name",
            "title",
            "phone",
            "icebreaker",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        for step in 1..=step_count {
            header.push(format!("step_{}_subject", step));
            header.push(format!("step_{}_body", step));
        }

        let mut lines = vec![header.join(",")];
        for resolved in &prepared.resolved {
            let lead = &resolved.lead;
            let mut row: Vec<String> = [
                lead.email.as_deref().unwrap_or(""),
                lead.first_name.as_deref().unwrap_or(""),
                lead.last_name.as_deref().unwrap_or(""),
                lead.company_name.as_deref().unwrap_or(""),
                lead.title.as_deref().unwrap_or(""),
                lead.phone.as_deref().unwrap_or(""),
                lead.icebreaker_text.as_deref().unwrap_or(""),
            ]
            .iter()
            .map(|f| csv_escape(f))
            .collect();

            for email in &resolved.emails {
                row.push(csv_escape(&email.subject));
                row.push(csv_escape(&email.body));
            }

            lines.push(row.join(","));
        }

        let filename = derive_filename(&job.campaign_name);
        let content = lines.join("\r\n");

        progress.update(
            DeploymentStep::success(steps::SERIALIZING).with_detail(filename.clone()),
        );
        log::info!(
            "Serialized campaign {} to {} ({} rows)",
            job.campaign_id,
            filename,
            prepared.resolved.len()
        );

        Ok(ExportOutput::File { filename, content })
    }
}
