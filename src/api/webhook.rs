//! Webhook handler for GitHub push events

use axum::{
    Json,
    body::Bytes,
    extract::State as AxumState,
    http::HeaderMap,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::ApiError;
use crate::SharedState;
use crate::classifier::{Disposition, classify};
use crate::error::DeployError;
use crate::job::Deployment;
use crate::signature::{self, SIGNATURE_HEADER};
use crate::webhook::{EVENT_HEADER, PushPayload};

/// Body of every 200 response from `/webhook`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
    pub timestamp: String,
}

impl WebhookResponse {
    fn new(message: String) -> Self {
        Self {
            message,
            branch: None,
            deployment_id: None,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Parses the captured body. An empty body yields no payload and is left
/// for the signature check to reject.
fn parse_payload(body: &[u8]) -> Result<Option<PushPayload>, DeployError> {
    if body.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(body)?))
}

/// Handles the GitHub webhook POST request.
///
/// The body is taken as raw bytes so the signature is checked against exactly
/// what was sent. The response never waits for the deployment.
pub async fn handle_webhook(
    AxumState(state): AxumState<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let event_type = header_value(&headers, EVENT_HEADER);

    let payload = parse_payload(&body).map_err(|e| {
        info!("Could not parse JSON body: {}", e);
        ApiError::from(e)
    })?;

    let verification = signature::check(
        &body,
        header_value(&headers, SIGNATURE_HEADER),
        &state.config.secret,
    );
    if !verification.is_ok() {
        warn!(
            "Rejected {:?} webhook: signature check failed ({})",
            event_type,
            verification.reason()
        );
        return Err(ApiError::InvalidSignature);
    }

    if state.config.verbose_logging {
        debug!("Verified {:?} webhook: {:?}", event_type, payload);
        if let Some(p) = &payload {
            info!(
                "Webhook for repository '{}' pushed by {} <{}>",
                p.repository_name().unwrap_or("(unknown)"),
                p.pusher_name().unwrap_or("(unknown)"),
                p.pusher_email().unwrap_or("-")
            );
        }
    }

    let git_ref = payload.as_ref().and_then(|p| p.git_ref.as_deref());
    match classify(event_type, git_ref, &state.config.allowed_branches) {
        Disposition::IgnoredEvent(event) => {
            info!("Not push event; Received '{}' event", event);
            Ok(Json(WebhookResponse::new(format!(
                "Event '{}' ignored",
                event
            ))))
        }
        Disposition::IgnoredBranch(branch) => {
            info!("Push to branch '{}' is not configured for deployment", branch);
            let mut response = WebhookResponse::new(format!("Branch '{}' ignored", branch));
            response.branch = Some(branch);
            Ok(Json(response))
        }
        Disposition::Accept { branch } => {
            if branch.is_none() {
                warn!("Push payload has no ref; deploying without branch filtering");
            }
            let deployment = Deployment::from_push(branch.clone(), payload.as_ref());
            let mut response = WebhookResponse::new("Deployment triggered".to_string());
            response.branch = branch;
            response.deployment_id = Some(deployment.id.clone());

            // Detached: the handle is dropped and the task keeps running.
            state.deployer.trigger(deployment);
            Ok(Json(response))
        }
    }
}
