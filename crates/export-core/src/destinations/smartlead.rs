//! Smartlead destination adapter
//!
//! Smartlead's capability model differs from Instantly's in two ways this
//! adapter absorbs: authentication travels as an `api_key` query parameter,
//! and the sequence has no standalone wait steps; delays fold into each
//! email's `seq_delay_details`. Registry tags already match Smartlead's
//! snake_case placeholder syntax and pass through unchanged.

use super::{run_lead_batches, DeliveryReport, ExportDestination, ExportOutput, Prepared};
use crate::config::{ExportLimits, SmartleadConfig};
use crate::error::{ExportError, Result};
use crate::orchestrator::{steps, CancelFlag, ExportJob, StepReporter};
use async_trait::async_trait;
use export_types::{CampaignBlock, DelayUnit, DeploymentStep, Destination, LeadExportInfo};
use reqwest::Client as HttpClient;
use serde_json::{json, Value};

pub struct SmartleadDestination {
    config: SmartleadConfig,
    limits: ExportLimits,
    http_client: HttpClient,
}

impl SmartleadDestination {
    pub fn new(config: SmartleadConfig, limits: ExportLimits) -> Self {
        let http_client = HttpClient::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            limits,
            http_client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}{}?api_key={}",
            self.config.base_url, path, self.config.api_key
        )
    }

    /// Smartlead sequence: one entry per email, preceding delays folded into
    /// `delay_in_days` (rounded up to whole days, minimum 1 between steps)
    fn build_sequence(blocks: &[CampaignBlock]) -> Vec<Value> {
        let mut sorted = blocks.to_vec();
        sorted.sort_by_key(|b| b.position());

        let mut sequence = Vec::new();
        let mut pending_delay_days: u32 = 0;

        for block in &sorted {
            match block {
                CampaignBlock::Delay(delay) => {
                    pending_delay_days += match delay.unit {
                        DelayUnit::Days => delay.amount,
                        DelayUnit::Hours => delay.amount.div_ceil(24),
                        DelayUnit::Minutes => delay.amount.div_ceil(24 * 60),
                    };
                }
                CampaignBlock::Email(email) => {
                    let seq_number = sequence.len() + 1;
                    let delay_in_days = if seq_number == 1 {
                        0
                    } else {
                        pending_delay_days.max(1)
                    };

                    sequence.push(json!({
                        "seq_number": seq_number,
                        "seq_delay_details": { "delay_in_days": delay_in_days },
                        "subject": email.subject,
                        "email_body": email.body,
                    }));
                    pending_delay_days = 0;
                }
            }
        }

        sequence
    }

    fn lead_row(lead: &LeadExportInfo) -> Value {
        json!({
            "email": lead.email.as_deref().unwrap_or(""),
            "first_name": lead.first_name.as_deref().unwrap_or(""),
            "last_name": lead.last_name.as_deref().unwrap_or(""),
            "company_name": lead.company_name.as_deref().unwrap_or(""),
            "phone_number": lead.phone.as_deref().unwrap_or(""),
            "custom_fields": {
                "title": lead.title.as_deref().unwrap_or(""),
                "icebreaker": lead.icebreaker_text.as_deref().unwrap_or(""),
            },
        })
    }

    async fn parse_response(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("Smartlead API error (status {}): {}", status, body);
            return Err(ExportError::Api {
                destination: Destination::Smartlead,
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    async fn upsert_campaign(&self, job: &ExportJob) -> Result<String> {
        let campaign_id = match &job.prior_external_id {
            Some(existing_id) => {
                log::info!("Reusing Smartlead campaign {}", existing_id);
                existing_id.clone()
            }
            None => {
                let created = self
                    .parse_response(
                        self.http_client
                            .post(self.url("/campaigns/create"))
                            .json(&json!({ "name": job.campaign_name }))
                            .send()
                            .await?,
                    )
                    .await?;

                // Smartlead returns numeric campaign ids.
                let id = created["id"]
                    .as_i64()
                    .map(|id| id.to_string())
                    .or_else(|| created["id"].as_str().map(str::to_string))
                    .ok_or_else(|| {
                        ExportError::Export("Smartlead response carried no campaign id".to_string())
                    })?;
                log::info!("Created Smartlead campaign {}", id);
                id
            }
        };

        // Saving sequences overwrites any prior sequence for the campaign,
        // which is what re-export-in-place needs.
        let sequence = Self::build_sequence(&job.blocks);
        self.parse_response(
            self.http_client
                .post(self.url(&format!("/campaigns/{}/sequences", campaign_id)))
                .json(&json!({ "sequences": sequence }))
                .send()
                .await?,
        )
        .await?;

        Ok(campaign_id)
    }

    async fn associate_accounts(&self, campaign_id: &str, accounts: &[String]) -> Result<()> {
        self.parse_response(
            self.http_client
                .post(self.url(&format!("/campaigns/{}/email-accounts", campaign_id)))
                .json(&json!({ "email_account_ids": accounts }))
                .send()
                .await?,
        )
        .await?;

        log::info!(
            "Mapped {} email account(s) to Smartlead campaign {}",
            accounts.len(),
            campaign_id
        );
        Ok(())
    }

    async fn upload_batch(&self, campaign_id: &str, batch: Vec<Value>) -> Result<()> {
        self.parse_response(
            self.http_client
                .post(self.url(&format!("/campaigns/{}/leads", campaign_id)))
                .json(&json!({
                    "lead_list": batch,
                    "settings": { "ignore_duplicate_leads_in_other_campaign": false },
                }))
                .send()
                .await?,
        )
        .await?;

        Ok(())
    }

    /// Test connection to the Smartlead API
    pub async fn test_connection(&self) -> Result<bool> {
        let response = self.http_client.get(self.url("/campaigns")).send().await;

        match response {
            Ok(resp) => {
                let ok = resp.status().is_success();
                if !ok {
                    log::warn!("Smartlead connection test failed: status {}", resp.status());
                }
                Ok(ok)
            }
            Err(e) => {
                log::error!("Failed to connect to Smartlead: {}", e);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl ExportDestination for SmartleadDestination {
    fn kind(&self) -> Destination {
        Destination::Smartlead
    }

    async fn prepare(&self, job: &ExportJob, progress: &StepReporter) -> Result<Prepared> {
        progress.update(DeploymentStep::in_progress(steps::CREATING_CAMPAIGN));
        let external_id = match self.upsert_campaign(job).await {
            Ok(id) => id,
            Err(e) => {
                progress.update(DeploymentStep::failed(steps::CREATING_CAMPAIGN, e.to_string()));
                return Err(e);
            }
        };
        progress.update(
            DeploymentStep::success(steps::CREATING_CAMPAIGN).with_detail(external_id.clone()),
        );

        progress.update(DeploymentStep::in_progress(steps::ASSOCIATING_ACCOUNTS));
        if let Err(e) = self
            .associate_accounts(&external_id, &job.sending_accounts)
            .await
        {
            progress.update(DeploymentStep::failed(
                steps::ASSOCIATING_ACCOUNTS,
                e.to_string(),
            ));
            return Err(e);
        }
        progress.update(DeploymentStep::success(steps::ASSOCIATING_ACCOUNTS));

        Ok(Prepared {
            external_id: Some(external_id),
            resolved: Vec::new(),
        })
    }

    async fn deliver(
        &self,
        job: &ExportJob,
        prepared: &Prepared,
        progress: &StepReporter,
        cancel: &CancelFlag,
    ) -> Result<DeliveryReport> {
        let campaign_id = prepared
            .external_id
            .as_deref()
            .ok_or_else(|| ExportError::Export("deliver called before prepare".to_string()))?;

        progress.update(DeploymentStep::in_progress(steps::UPLOADING_LEADS));

        let rows: Vec<Value> = job
            .leads
            .iter()
            .filter(|l| l.has_email())
            .map(Self::lead_row)
            .collect();

        let report = run_lead_batches(
            rows,
            self.limits.lead_batch_size,
            self.limits.batch_concurrency,
            cancel,
            |_, batch| self.upload_batch(campaign_id, batch),
        )
        .await;

        let step = if report.uploaded_leads == 0 && report.total_leads > 0 {
            DeploymentStep::failed(
                steps::UPLOADING_LEADS,
                format!("0 of {} leads uploaded", report.total_leads),
            )
        } else {
            DeploymentStep::success(steps::UPLOADING_LEADS).with_detail(format!(
                "{} of {} leads uploaded",
                report.uploaded_leads, report.total_leads
            ))
        };
        progress.update(step);

        Ok(report)
    }

    async fn finalize(
        &self,
        _job: &ExportJob,
        prepared: &Prepared,
        report: &DeliveryReport,
        _progress: &StepReporter,
    ) -> Result<ExportOutput> {
        let external_id = prepared
            .external_id
            .clone()
            .ok_or_else(|| ExportError::Export("finalize called before prepare".to_string()))?;

        log::info!(
            "Smartlead campaign {} left in drafted state ({} leads uploaded)",
            external_id,
            report.uploaded_leads
        );
        Ok(ExportOutput::Remote { external_id })
    }
}
