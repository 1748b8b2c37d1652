//! The SPARQL protocol surface: `/sparql` and the read-only `/public/sparql`.
//!
//! Reads execute synchronously within the request; updates are authorized,
//! enqueued and acknowledged immediately, with actual execution happening
//! later on the update channel's workers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use gateway_triple_store::{classify, classify_read_only, Operation, ReadOperation, StoreError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::middleware::Principal;
use crate::config::SecurityConfig;
use crate::context::Context;
use crate::error::GatewayError;

/// Operation parameters, from the query string or a form body. `query` and
/// `update` are mutually exclusive per call; with neither, the call is a
/// no-op ping.
#[derive(Debug, Default, Deserialize)]
pub struct SparqlParams {
    pub query: Option<String>,
    pub update: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateAccepted {
    pub status: &'static str,
    pub correlation_id: Uuid,
}

pub struct SparqlController;

impl SparqlController {
    pub async fn handle_request(
        State(context): State<Arc<Context>>,
        method: Method,
        headers: HeaderMap,
        Query(params): Query<SparqlParams>,
        Extension(principal): Extension<Principal>,
        body: String,
    ) -> Response {
        Self::execute(context, method, headers, params, principal, body, false).await
    }

    pub async fn handle_public_request(
        State(context): State<Arc<Context>>,
        method: Method,
        headers: HeaderMap,
        Query(params): Query<SparqlParams>,
        Extension(principal): Extension<Principal>,
        body: String,
    ) -> Response {
        Self::execute(context, method, headers, params, principal, body, true).await
    }

    async fn execute(
        context: Arc<Context>,
        method: Method,
        headers: HeaderMap,
        params: SparqlParams,
        principal: Principal,
        body: String,
        force_read: bool,
    ) -> Response {
        let params = match merge_params(&method, &headers, params, body) {
            Ok(params) => params,
            Err(e) => return e.into_response(),
        };

        let text = params
            .query
            .filter(|q| !q.trim().is_empty())
            .or(params.update)
            .filter(|q| !q.trim().is_empty());
        let Some(text) = text else {
            return StatusCode::NO_CONTENT.into_response();
        };

        let accept = headers
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok());

        let result = if force_read {
            match classify_read_only(&text) {
                Ok(op) => Self::execute_read(&context, &op, accept).await,
                Err(e) => Err(e.into()),
            }
        } else {
            match classify(&text) {
                Ok(Operation::Read(op)) => Self::execute_read(&context, &op, accept).await,
                Ok(Operation::Update(op)) => {
                    Self::execute_update(&context, &principal, op.text()).await
                }
                Err(e) => Err(e.into()),
            }
        };

        result.unwrap_or_else(IntoResponse::into_response)
    }

    async fn execute_read(
        context: &Context,
        op: &ReadOperation,
        accept: Option<&str>,
    ) -> Result<Response, GatewayError> {
        context.read_mirror().publish(op.text());

        let result = context.executor().read(op, accept).await?;
        Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, result.content_type)],
            result.body,
        )
            .into_response())
    }

    async fn execute_update(
        context: &Context,
        principal: &Principal,
        update_text: &str,
    ) -> Result<Response, GatewayError> {
        authorize(&context.config().security, principal)?;

        let correlation_id = context
            .update_scheduler()
            .enqueue(update_text.to_string())
            .await?;

        tracing::debug!(correlation_id = %correlation_id, "update accepted for processing");
        Ok((
            StatusCode::OK,
            Json(UpdateAccepted {
                status: "accepted",
                correlation_id,
            }),
        )
            .into_response())
    }
}

fn authorize(security: &SecurityConfig, principal: &Principal) -> Result<(), GatewayError> {
    if !security.enabled || principal.has_any_role(&security.allowed_roles) {
        Ok(())
    } else {
        Err(GatewayError::Authorization)
    }
}

/// Merge body-borne parameters into the query-string ones. Form bodies and
/// the direct `application/sparql-query`/`-update` body types are accepted
/// on POST; query-string parameters always win.
fn merge_params(
    method: &Method,
    headers: &HeaderMap,
    params: SparqlParams,
    body: String,
) -> Result<SparqlParams, GatewayError> {
    if params.query.is_some() || params.update.is_some() || *method != Method::POST || body.is_empty()
    {
        return Ok(params);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .unwrap_or("")
        .trim();

    match content_type {
        "application/x-www-form-urlencoded" => {
            serde_urlencoded::from_str(&body).map_err(|e| {
                StoreError::Parse {
                    reason: format!("invalid form body: {e}"),
                }
                .into()
            })
        }
        "application/sparql-query" => Ok(SparqlParams {
            query: Some(body),
            update: None,
        }),
        "application/sparql-update" => Ok(SparqlParams {
            query: None,
            update: Some(body),
        }),
        _ => Ok(params),
    }
}
