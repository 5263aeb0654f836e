//! Clipboard destination
//!
//! Local output: renders the resolved campaign as human-readable block text.
//! The actual clipboard copy happens client-side; this adapter only produces
//! the text.

use super::{resolve_for_leads, DeliveryReport, ExportDestination, ExportOutput, Prepared};
use crate::error::Result;
use crate::orchestrator::{steps, CancelFlag, ExportJob, StepReporter};
use async_trait::async_trait;
use export_types::{CampaignBlock, DelayUnit, DeploymentStep, Destination};

pub struct ClipboardDestination;

impl ClipboardDestination {
    pub fn new() -> Self {
        Self
    }

    fn render_lead(
        blocks: &[CampaignBlock],
        resolved: &super::ResolvedLead,
        out: &mut String,
    ) {
        let lead_label = resolved
            .lead
            .email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or("(no email)");
        out.push_str(&format!("Lead: {}\n", lead_label));

        let mut email_index = 0;
        for (step, block) in blocks.iter().enumerate() {
            match block {
                CampaignBlock::Email(_) => {
                    if let Some(content) = resolved.emails.get(email_index) {
                        out.push_str(&format!(
                            "\nStep {}: Email\nSubject: {}\n{}\n",
                            step + 1,
                            content.subject,
                            content.body
                        ));
                    }
                    email_index += 1;
                }
                CampaignBlock::Delay(delay) => {
                    let unit = match delay.unit {
                        DelayUnit::Minutes => "minute(s)",
                        DelayUnit::Hours => "hour(s)",
                        DelayUnit::Days => "day(s)",
                    };
                    out.push_str(&format!(
                        "\nStep {}: Wait {} {}\n",
                        step + 1,
                        delay.amount,
                        unit
                    ));
                }
            }
        }
    }
}

impl Default for ClipboardDestination {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExportDestination for ClipboardDestination {
    fn kind(&self) -> Destination {
        Destination::Clipboard
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

        let mut blocks = job.blocks.clone();
        blocks.sort_by_key(|b| b.position());

        let mut content = format!("Campaign: {}\n", job.campaign_name);
        for resolved in &prepared.resolved {
            content.push_str("\n----------------------------------------\n");
            Self::render_lead(&blocks, resolved, &mut content);
        }

        progress.update(DeploymentStep::success(steps::SERIALIZING));

        Ok(ExportOutput::Text { content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::StepReporter;
    use export_types::{DelayBlock, EmailBlock, LeadExportInfo};

    #[tokio::test]
    async fn test_rendering_resolves_and_labels_blocks() {
        let job = ExportJob {
            campaign_id: "cmp-1".to_string(),
            campaign_name: "Launch".to_string(),
            tenant_id: "t-1".to_string(),
            blocks: vec![
                CampaignBlock::Email(EmailBlock {
                    id: "e1".to_string(),
                    position: 1,
                    subject: "Hi {{first_name}}".to_string(),
                    body: "Body".to_string(),
                }),
                CampaignBlock::Delay(DelayBlock {
                    id: "d1".to_string(),
                    position: 2,
                    amount: 3,
                    unit: DelayUnit::Days,
                }),
            ],
            leads: vec![LeadExportInfo {
                email: Some("ana@acme.com".to_string()),
                first_name: Some("Ana".to_string()),
                ..Default::default()
            }],
            sending_accounts: Vec::new(),
            prior_external_id: None,
        };

        let destination = ClipboardDestination::new();
        let progress = StepReporter::silent();
        let prepared = destination.prepare(&job, &progress).await.unwrap();
        let report = destination
            .deliver(&job, &prepared, &progress, &CancelFlag::new())
            .await
            .unwrap();
        let output = destination
            .finalize(&job, &prepared, &report, &progress)
            .await
            .unwrap();

        match output {
            ExportOutput::Text { content } => {
                assert!(content.contains("Campaign: Launch"));
                assert!(content.contains("Lead: ana@acme.com"));
                assert!(content.contains("Subject: Hi Ana"));
                assert!(content.contains("Wait 3 day(s)"));
            }
            other => panic!("expected text output, got {:?}", other),
        }
    }
}
