//! HTTP surface of the export pipeline
//!
//! Campaign content persistence lives with an external collaborator, so the
//! UI ships the current block/lead state in each request body. Remote
//! exports answer with an NDJSON stream of step updates ending in the
//! terminal record; local outputs answer with the artifact itself.

use actix_web::{web, HttpResponse};
use bytes::Bytes;
use export_core::destinations::ExportOutput;
use export_core::orchestrator::{ExportJob, ExportOrchestrator, StepReporter};
use export_core::repository::{is_valid_campaign_id, ExportRepository};
use export_core::validation::advanced;
use export_core::{classifier, ExportDestination, ExportError};
use export_types::{CampaignBlock, Destination, ExportRecordPatch, LeadExportInfo};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Shared server state; adapters are built once at startup
pub struct AppState {
    pub repository: Arc<ExportRepository>,
    pub orchestrator: Arc<ExportOrchestrator>,
    pub instantly: Arc<export_core::InstantlyDestination>,
    pub smartlead: Arc<export_core::SmartleadDestination>,
    pub csv_file: Arc<export_core::CsvFileDestination>,
    pub clipboard: Arc<export_core::ClipboardDestination>,
}

impl AppState {
    fn destination_for(&self, destination: Destination) -> Arc<dyn ExportDestination> {
        match destination {
            Destination::Instantly => self.instantly.clone(),
            Destination::Smartlead => self.smartlead.clone(),
            Destination::CsvFile => self.csv_file.clone(),
            Destination::Clipboard => self.clipboard.clone(),
        }
    }
}

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/campaigns/{campaign_id}")
                    .route(
                        "/export/validation",
                        web::post().to(validate_export_endpoint),
                    )
                    .route("/export", web::post().to(begin_export_endpoint))
                    .route("/export/cancel", web::post().to(cancel_export_endpoint))
                    .route("/export-status", web::get().to(get_export_status_endpoint))
                    .route(
                        "/export-status",
                        web::put().to(update_export_status_endpoint),
                    ),
            ),
    )
    .route("/health", web::get().to(health_endpoint));
}

#[derive(Debug, Deserialize)]
struct ValidationRequest {
    destination: Destination,
    #[serde(default)]
    blocks: Vec<CampaignBlock>,
    #[serde(default)]
    leads: Vec<LeadExportInfo>,
    #[serde(default)]
    sending_accounts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ExportRequest {
    destination: Destination,
    campaign_name: String,
    tenant_id: String,
    #[serde(default)]
    blocks: Vec<CampaignBlock>,
    #[serde(default)]
    leads: Vec<LeadExportInfo>,
    #[serde(default)]
    sending_accounts: Vec<String>,
}

/// Status patch or clear instruction for the PUT endpoint
#[derive(Debug, Deserialize)]
struct StatusUpdateRequest {
    #[serde(default)]
    clear: bool,
    #[serde(flatten)]
    patch: ExportRecordPatch,
}

fn bad_request(field: &str, message: impl std::fmt::Display) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "error": "validation_error",
        "field": field,
        "message": message.to_string(),
    }))
}

fn check_campaign_id(campaign_id: &str) -> Result<(), HttpResponse> {
    if is_valid_campaign_id(campaign_id) {
        Ok(())
    } else {
        Err(bad_request("campaign_id", "Malformed campaign identifier"))
    }
}

/// POST /api/campaigns/{id}/export/validation
async fn validate_export_endpoint(
    path: web::Path<String>,
    body: web::Bytes,
) -> HttpResponse {
    let campaign_id = path.into_inner();
    if let Err(response) = check_campaign_id(&campaign_id) {
        return response;
    }

    let request: ValidationRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return bad_request("body", e),
    };

    let summary = advanced::validate(
        &request.blocks,
        &request.leads,
        &request.sending_accounts,
        request.destination,
    );

    HttpResponse::Ok().json(summary)
}

/// POST /api/campaigns/{id}/export
async fn begin_export_endpoint(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Bytes,
) -> HttpResponse {
    let campaign_id = path.into_inner();
    if let Err(response) = check_campaign_id(&campaign_id) {
        return response;
    }

    let request: ExportRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return bad_request("body", e),
    };

    if state.orchestrator.is_active(&campaign_id) {
        return HttpResponse::Conflict().json(json!({
            "error": "export_in_progress",
            "message": "An export is already running for this campaign",
        }));
    }

    let destination = request.destination;
    let job = ExportJob {
        campaign_id: campaign_id.clone(),
        campaign_name: request.campaign_name,
        tenant_id: request.tenant_id,
        blocks: request.blocks,
        leads: request.leads,
        sending_accounts: request.sending_accounts,
        prior_external_id: None,
    };
    let adapter = state.destination_for(destination);

    if destination.is_remote() {
        stream_remote_export(state, adapter, job, destination)
    } else {
        run_local_export(state, adapter, job).await
    }
}

/// Remote exports stream one NDJSON line per step update, then a terminal
/// line carrying the record or the classified error.
fn stream_remote_export(
    state: web::Data<AppState>,
    adapter: Arc<dyn ExportDestination>,
    job: ExportJob,
    destination: Destination,
) -> HttpResponse {
    let (step_tx, mut step_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Bytes>();

    let forward_tx = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(step) = step_rx.recv().await {
            let _ = forward_tx.send(ndjson_line(&json!({ "step": step })));
        }
    });

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        let progress = StepReporter::new(step_tx);
        let result = orchestrator.export(adapter, job, &progress).await;

        // Close the step channel so the forwarder drains before the
        // terminal line goes out.
        drop(progress);
        let _ = forwarder.await;

        let terminal = match result {
            Ok(outcome) => json!({
                "record": outcome.record,
                "warnings": outcome.warnings,
            }),
            Err(e) => {
                let classified = classify_for_response(&e, destination);
                json!({ "error": classified })
            }
        };
        let _ = out_tx.send(ndjson_line(&terminal));
    });

    HttpResponse::Ok()
        .content_type("application/x-ndjson")
        .streaming(
            UnboundedReceiverStream::new(out_rx).map(Ok::<_, actix_web::Error>),
        )
}

async fn run_local_export(
    state: web::Data<AppState>,
    adapter: Arc<dyn ExportDestination>,
    job: ExportJob,
) -> HttpResponse {
    let progress = StepReporter::silent();
    let outcome = match state.orchestrator.export(adapter, job, &progress).await {
        Ok(outcome) => outcome,
        Err(ExportError::Validation(message)) => {
            return HttpResponse::UnprocessableEntity().json(json!({
                "error": "validation_failed",
                "message": message,
            }));
        }
        Err(e) => {
            log::error!("Local export failed: {}", e);
            return HttpResponse::InternalServerError().json(json!({
                "error": "export_failed",
                "message": "The export failed unexpectedly. It is safe to retry.",
            }));
        }
    };

    match outcome.output {
        ExportOutput::File { filename, content } => HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .insert_header((
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", filename),
            ))
            .body(content),
        ExportOutput::Text { content } => HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .body(content),
        ExportOutput::Remote { .. } => {
            // Local adapters never produce a remote output.
            HttpResponse::InternalServerError().json(json!({
                "error": "export_failed",
                "message": "Unexpected output for a local destination",
            }))
        }
    }
}

/// POST /api/campaigns/{id}/export/cancel
async fn cancel_export_endpoint(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let campaign_id = path.into_inner();
    if let Err(response) = check_campaign_id(&campaign_id) {
        return response;
    }

    if state.orchestrator.cancel(&campaign_id) {
        HttpResponse::Ok().json(json!({ "cancelled": true }))
    } else {
        HttpResponse::NotFound().json(json!({
            "error": "no_active_export",
            "message": "No export is currently running for this campaign",
        }))
    }
}

/// GET /api/campaigns/{id}/export-status
async fn get_export_status_endpoint(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let campaign_id = path.into_inner();
    if let Err(response) = check_campaign_id(&campaign_id) {
        return response;
    }

    match state.repository.get_record(&campaign_id) {
        Ok(record) => HttpResponse::Ok().json(record),
        Err(e) => storage_error(&campaign_id, e),
    }
}

/// PUT /api/campaigns/{id}/export-status
async fn update_export_status_endpoint(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Bytes,
) -> HttpResponse {
    let campaign_id = path.into_inner();
    if let Err(response) = check_campaign_id(&campaign_id) {
        return response;
    }

    let request: StatusUpdateRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return bad_request("body", e),
    };

    if request.clear {
        return match state.repository.clear(&campaign_id) {
            Ok(()) => HttpResponse::Ok().json(json!({ "cleared": true })),
            Err(e) => storage_error(&campaign_id, e),
        };
    }

    match state.repository.upsert(&campaign_id, request.patch) {
        Ok(record) => HttpResponse::Ok().json(record),
        Err(ExportError::Storage(message)) if message.contains("must be set together") => {
            bad_request("external_id", message)
        }
        Err(e) => storage_error(&campaign_id, e),
    }
}

/// GET /health
async fn health_endpoint() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

fn ndjson_line(value: &serde_json::Value) -> Bytes {
    Bytes::from(format!("{}\n", value))
}

fn classify_for_response(
    error: &ExportError,
    destination: Destination,
) -> export_core::ClassifiedError {
    match error {
        ExportError::Validation(message) => export_core::ClassifiedError {
            title: "Validation failed".to_string(),
            message: message.clone(),
            can_retry: false,
            can_fallback: false,
        },
        ExportError::Storage(_) | ExportError::Io(_) => {
            // Full detail stays in the server log; the user sees a generic
            // retry-safe message.
            log::error!("Storage failure during export: {}", error);
            export_core::ClassifiedError {
                title: "Export failed".to_string(),
                message: "Saving the export state failed. It is safe to retry.".to_string(),
                can_retry: true,
                can_fallback: true,
            }
        }
        other => classifier::classify(other, destination),
    }
}

fn storage_error(campaign_id: &str, error: ExportError) -> HttpResponse {
    log::error!("Storage error for campaign {}: {}", campaign_id, error);
    HttpResponse::InternalServerError().json(json!({
        "error": "storage_error",
        "message": "Reading or writing the export record failed. It is safe to retry.",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use export_core::config::{ExportConfig, ExportLimits};
    use export_core::ExportOrchestrator;

    fn test_state(dir: &tempfile::TempDir) -> web::Data<AppState> {
        let config = ExportConfig::from_json_str(
            r#"{
                "instantly": { "api_key": "k1" },
                "smartlead": { "api_key": "k2" }
            }"#,
        )
        .unwrap();
        let limits: ExportLimits = config.export.clone();

        let repository = Arc::new(ExportRepository::new(dir.path()).unwrap());
        web::Data::new(AppState {
            repository: repository.clone(),
            orchestrator: Arc::new(ExportOrchestrator::new(repository)),
            instantly: Arc::new(export_core::InstantlyDestination::new(
                config.instantly.clone(),
                limits.clone(),
            )),
            smartlead: Arc::new(export_core::SmartleadDestination::new(
                config.smartlead.clone(),
                limits,
            )),
            csv_file: Arc::new(export_core::CsvFileDestination::new()),
            clipboard: Arc::new(export_core::ClipboardDestination::new()),
        })
    }

    #[actix_web::test]
    async fn test_validation_endpoint_flags_missing_emails() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(test_state(&dir))
                .configure(init_app),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/api/campaigns/cmp-1/export/validation")
            .set_json(json!({
                "destination": "instantly",
                "blocks": [
                    {"type": "email", "id": "b1", "position": 1, "subject": "S", "body": "B"}
                ],
                "leads": [ {"email": null} ],
                "sending_accounts": ["sender@outflow.app"]
            }))
            .to_request();

        let body: serde_json::Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["valid"], false);
        let errors = body["errors"].as_array().unwrap();
        assert!(errors.iter().any(|e| e["message"]
            .as_str()
            .unwrap()
            .contains("email")));
    }

    #[actix_web::test]
    async fn test_malformed_campaign_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(test_state(&dir))
                .configure(init_app),
        )
        .await;

        let request = test::TestRequest::get()
            .uri("/api/campaigns/bad%20id/export-status")
            .to_request();

        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), 400);
    }

    #[actix_web::test]
    async fn test_status_patch_and_clear_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(test_state(&dir))
                .configure(init_app),
        )
        .await;

        let patch = test::TestRequest::put()
            .uri("/api/campaigns/cmp-1/export-status")
            .set_json(json!({
                "external_id": "remote-1",
                "destination": "instantly",
                "status": "success"
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, patch).await;
        assert_eq!(body["external_id"], "remote-1");
        assert_eq!(body["status"], "success");

        let clear = test::TestRequest::put()
            .uri("/api/campaigns/cmp-1/export-status")
            .set_json(json!({ "clear": true }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, clear).await;
        assert_eq!(body["cleared"], true);

        let status = test::TestRequest::get()
            .uri("/api/campaigns/cmp-1/export-status")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, status).await;
        assert_eq!(body["external_id"], serde_json::Value::Null);
    }

    #[actix_web::test]
    async fn test_patch_without_destination_is_structured_400() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(test_state(&dir))
                .configure(init_app),
        )
        .await;

        let request = test::TestRequest::put()
            .uri("/api/campaigns/cmp-1/export-status")
            .set_json(json!({ "external_id": "remote-1" }))
            .to_request();

        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), 400);
    }

    #[actix_web::test]
    async fn test_csv_export_returns_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(test_state(&dir))
                .configure(init_app),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/api/campaigns/cmp-1/export")
            .set_json(json!({
                "destination": "csv_file",
                "campaign_name": "Q3 Launch",
                "tenant_id": "tenant-1",
                "blocks": [
                    {"type": "email", "id": "b1", "position": 1,
                     "subject": "Hi {{first_name}}", "body": "{{icebreaker}}"}
                ],
                "leads": [
                    {"email": "ana@acme.com", "first_name": "Ana", "icebreaker_text": "saw it"}
                ]
            }))
            .to_request();

        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), 200);
        let disposition = response
            .headers()
            .get("Content-Disposition")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains("q3-launch.csv"));

        let body = test::read_body(response).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("Hi Ana"));
    }
}
