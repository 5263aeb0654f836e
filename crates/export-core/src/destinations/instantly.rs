//! Instantly destination adapter
//!
//! Deploys campaigns through the Instantly v2 API: bearer authentication,
//! draft campaign with an embedded step sequence, explicit sending-account
//! association, batched lead upload. Registry tags are translated to
//! Instantly's camelCase placeholder syntax before any content is sent.

use super::{
    map_registry_tags, run_lead_batches, DeliveryReport, ExportDestination, ExportOutput, Prepared,
};
use crate::config::{ExportLimits, InstantlyConfig};
use crate::error::{ExportError, Result};
use crate::orchestrator::{steps, CancelFlag, ExportJob, StepReporter};
use async_trait::async_trait;
use export_types::{CampaignBlock, DelayUnit, DeploymentStep, Destination, LeadExportInfo};
use reqwest::Client as HttpClient;
use serde_json::{json, Value};

pub struct InstantlyDestination {
    config: InstantlyConfig,
    limits: ExportLimits,
    http_client: HttpClient,
}

impl InstantlyDestination {
    pub fn new(config: InstantlyConfig, limits: ExportLimits) -> Self {
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

    /// Registry name -> Instantly native placeholder
    fn native_tag(name: &str) -> Option<String> {
        let native = match name {
            "first_name" => "{{firstName}}",
            "last_name" => "{{lastName}}",
            "company_name" => "{{companyName}}",
            "title" => "{{title}}",
            "email" => "{{email}}",
            "phone" => "{{phone}}",
            "icebreaker" => "{{personalization}}",
            _ => return None,
        };
        Some(native.to_string())
    }

    /// Campaign step sequence in Instantly's wire shape; delay blocks become
    /// explicit wait steps
    fn build_sequence(blocks: &[CampaignBlock]) -> Vec<Value> {
        let mut sorted = blocks.to_vec();
        sorted.sort_by_key(|b| b.position());

        sorted
            .iter()
            .map(|block| match block {
                CampaignBlock::Email(email) => json!({
                    "type": "email",
                    "subject": map_registry_tags(&email.subject, Self::native_tag),
                    "body": map_registry_tags(&email.body, Self::native_tag),
                }),
                CampaignBlock::Delay(delay) => json!({
                    "type": "wait",
                    "amount": delay.amount,
                    "unit": match delay.unit {
                        DelayUnit::Minutes => "minutes",
                        DelayUnit::Hours => "hours",
                        DelayUnit::Days => "days",
                    },
                }),
            })
            .collect()
    }

    fn lead_row(lead: &LeadExportInfo) -> Value {
        json!({
            "email": lead.email.as_deref().unwrap_or(""),
            "first_name": lead.first_name.as_deref().unwrap_or(""),
            "last_name": lead.last_name.as_deref().unwrap_or(""),
            "company_name": lead.company_name.as_deref().unwrap_or(""),
            "phone": lead.phone.as_deref().unwrap_or(""),
            "personalization": lead.icebreaker_text.as_deref().unwrap_or(""),
            "custom_variables": {
                "title": lead.title.as_deref().unwrap_or(""),
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
            log::error!("Instantly API error (status {}): {}", status, body);
            return Err(ExportError::Api {
                destination: Destination::Instantly,
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Create a new draft campaign or overwrite an existing one in place
    async fn upsert_campaign(&self, job: &ExportJob) -> Result<String> {
        let sequence = Self::build_sequence(&job.blocks);

        if let Some(existing_id) = &job.prior_external_id {
            let url = format!("{}/campaigns/{}", self.config.base_url, existing_id);
            let body = json!({
                "name": job.campaign_name,
                "sequences": [{ "steps": sequence }],
            });

            self.parse_response(
                self.http_client
                    .patch(&url)
                    .bearer_auth(&self.config.api_key)
                    .json(&body)
                    .send()
                    .await?,
            )
            .await?;

            log::info!("Updated Instantly campaign {} in place", existing_id);
            return Ok(existing_id.clone());
        }

        let url = format!("{}/campaigns", self.config.base_url);
        let body = json!({
            "name": job.campaign_name,
            // New campaigns start paused; activation is a separate user action.
            "status": "paused",
            "sequences": [{ "steps": sequence }],
        });

        let created = self
            .parse_response(
                self.http_client
                    .post(&url)
                    .bearer_auth(&self.config.api_key)
                    .json(&body)
                    .send()
                    .await?,
            )
            .await?;

        let id = created["id"]
            .as_str()
            .ok_or_else(|| {
                ExportError::Export("Instantly response carried no campaign id".to_string())
            })?
            .to_string();

        log::info!("Created Instantly draft campaign {}", id);
        Ok(id)
    }

    async fn associate_accounts(&self, campaign_id: &str, accounts: &[String]) -> Result<()> {
        let url = format!("{}/campaigns/{}/accounts", self.config.base_url, campaign_id);
        let body = json!({ "accounts": accounts });

        self.parse_response(
            self.http_client
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(&body)
                .send()
                .await?,
        )
        .await?;

        log::info!(
            "Associated {} sending account(s) with Instantly campaign {}",
            accounts.len(),
            campaign_id
        );
        Ok(())
    }

    async fn upload_batch(&self, campaign_id: &str, batch: Vec<Value>) -> Result<()> {
        let url = format!("{}/leads/list", self.config.base_url);
        let body = json!({
            "campaign_id": campaign_id,
            "skip_if_in_campaign": true,
            "leads": batch,
        });

        self.parse_response(
            self.http_client
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(&body)
                .send()
                .await?,
        )
        .await?;

        Ok(())
    }

    /// Test connection to the Instantly API
    pub async fn test_connection(&self) -> Result<bool> {
        let url = format!("{}/accounts?limit=1", self.config.base_url);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await;

        match response {
            Ok(resp) => {
                let ok = resp.status().is_success();
                if !ok {
                    log::warn!("Instantly connection test failed: status {}", resp.status());
                }
                Ok(ok)
            }
            Err(e) => {
                log::error!("Failed to connect to Instantly: {}", e);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl ExportDestination for InstantlyDestination {
    fn kind(&self) -> Destination {
        Destination::Instantly
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
            "Instantly campaign {} left in paused state ({} leads uploaded)",
            external_id,
            report.uploaded_leads
        );
        Ok(ExportOutput::Remote { external_id })
    }
}
