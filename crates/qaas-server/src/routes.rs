//! HTTP intake.
//!
//! Methods and paths are checked by hand rather than by the router so that
//! every malformed request gets the same plain-text error body.

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use qaas_core::{
    CONFIGURATION_PATH, ConfigOperation, Owner, ValidationError, WEBHOOK_PATH,
    identifier_from_path, is_valid_config_path, is_valid_webhook_path,
};
use qaas_transport::Transport;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use crate::error::QaasError;
use crate::service::WebhookService;

/// Body of a configuration request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigRequest {
    pub hash: String,
    pub groupname: String,
    pub username: String,
    pub description: Option<String>,
}

impl ConfigRequest {
    fn parse(body: &[u8]) -> Result<Self, QaasError> {
        serde_json::from_slice(body).map_err(|e| ValidationError::Body(e.to_string()).into())
    }

    fn owner(&self) -> Result<Owner, QaasError> {
        Ok(Owner::new(self.groupname.as_str(), self.username.as_str())?)
    }
}

pub fn build_router<T: Transport>(service: WebhookService<T>) -> Router {
    Router::new()
        .route(CONFIGURATION_PATH, any(configuration::<T>))
        .route("/configuration/{*rest}", any(configuration::<T>))
        .route(WEBHOOK_PATH, any(webhook::<T>))
        .route("/webhook/{*rest}", any(webhook::<T>))
        .fallback(fallback)
        .with_state(service)
}

impl IntoResponse for QaasError {
    fn into_response(self) -> Response {
        let (status, label) = match &self {
            Self::Validation(_) | Self::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };
        if self.is_client_error() {
            warn!(error = %self, "Request rejected");
        } else {
            error!(error = %self, "Request failed");
        }
        (
            status,
            format!("Error {} - {label}: {self}", status.as_u16()),
        )
            .into_response()
    }
}

/// `PUT|GET|DELETE /configuration[/{id}]`
async fn configuration<T: Transport>(
    State(service): State<WebhookService<T>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    handle_configuration(&service, &method, uri.path(), &body)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn handle_configuration<T: Transport>(
    service: &WebhookService<T>,
    method: &Method,
    path: &str,
    body: &[u8],
) -> Result<Response, QaasError> {
    let operation = match *method {
        Method::PUT => ConfigOperation::Add,
        Method::GET if path == CONFIGURATION_PATH => ConfigOperation::List,
        Method::GET => ConfigOperation::Info,
        Method::DELETE => ConfigOperation::Delete,
        _ => return Err(ValidationError::Method(method.to_string()).into()),
    };
    if !is_valid_config_path(path, operation) {
        return Err(ValidationError::Path(path.to_string()).into());
    }

    match operation {
        ConfigOperation::Add => {
            let request = ConfigRequest::parse(body)?;
            let owner = request.owner()?;
            let url = service
                .register_webhook(
                    &request.hash,
                    &owner,
                    request.description.as_deref().unwrap_or_default(),
                )
                .await?;
            Ok(Json(json!({ "webhook": url })).into_response())
        }
        ConfigOperation::List => {
            let owner = ConfigRequest::parse(body)?.owner()?;
            let webhooks = service.list_webhooks(&owner).await?;
            Ok(Json(json!({ "webhooks": webhooks })).into_response())
        }
        ConfigOperation::Info => {
            let identifier = path_identifier(path, CONFIGURATION_PATH)?;
            let webhook = service.get_webhook(identifier).await?;
            Ok(Json(json!({ "webhook": webhook })).into_response())
        }
        ConfigOperation::Delete => {
            let identifier = path_identifier(path, CONFIGURATION_PATH)?;
            let owner = ConfigRequest::parse(body)?.owner()?;
            service.delete_webhook(identifier, &owner).await?;
            Ok(Json(json!({ "webhook": identifier })).into_response())
        }
    }
}

/// `POST /webhook/{id}`
async fn webhook<T: Transport>(
    State(service): State<WebhookService<T>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    handle_webhook(&service, &method, uri.path(), body)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn handle_webhook<T: Transport>(
    service: &WebhookService<T>,
    method: &Method,
    path: &str,
    body: Bytes,
) -> Result<Response, QaasError> {
    if *method != Method::POST {
        return Err(ValidationError::Method(method.to_string()).into());
    }
    if !is_valid_webhook_path(path) {
        return Err(ValidationError::Path(path.to_string()).into());
    }
    let identifier = path_identifier(path, WEBHOOK_PATH)?;
    service.deliver_webhook(identifier, body.to_vec()).await?;
    Ok((StatusCode::OK, "Webhook handled successfully").into_response())
}

fn path_identifier<'a>(path: &'a str, prefix: &str) -> Result<&'a str, QaasError> {
    identifier_from_path(path, prefix).ok_or_else(|| ValidationError::Path(path.to_string()).into())
}

async fn fallback(uri: Uri) -> Response {
    QaasError::from(ValidationError::Path(uri.path().to_string())).into_response()
}
