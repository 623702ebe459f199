//! `POST /slave/results` — the ingestion handler: decode, authenticate,
//! validate, persist a traceroute and its hop chain in one transaction.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rusqlite::params;
use uuid::Uuid;

use disttrace_auth::check_agent_credentials;
use disttrace_proto::{SubmitResultRequest, SubmitResultResponse};
use disttrace_registry::TargetRegistry;

use crate::state::CoordinatorState;

pub async fn submit_results(
    State(state): State<CoordinatorState>,
    body: Result<Json<SubmitResultRequest>, JsonRejection>,
) -> Response {
    let result = match body {
        Ok(Json(result)) => result,
        Err(e) => {
            tracing::warn!(error = %e, "couldn't decode slave results body");
            return (
                StatusCode::BAD_REQUEST,
                Json(SubmitResultResponse::rejected(format!(
                    "Couldn't decode request body into JSON: {e}"
                ))),
            )
                .into_response();
        }
    };

    if let Err(e) = check_agent_credentials(&state.store, &result.slave).await {
        tracing::warn!(agent = %result.slave.name, error = %e, "slave results rejected");
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    tracing::info!(
        agent = %result.slave.name,
        target = %result.target.name,
        success = result.success,
        hops = result.hop_count,
        "received traceroute result"
    );

    if let Err(e) = result.validate() {
        tracing::warn!(error = %e, "result validation failed");
        return (
            StatusCode::BAD_REQUEST,
            Json(SubmitResultResponse::rejected(format!(
                "Result validation failed: {e}"
            ))),
        )
            .into_response();
    }

    // Spec invariant: every traceroute references an existing target at
    // ingestion time, enforced here rather than by a foreign key.
    match TargetRegistry::new(&state.store).get(result.target.id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            tracing::warn!(target_id = %result.target.id, "submitted target unknown");
            return (
                StatusCode::BAD_REQUEST,
                Json(SubmitResultResponse::rejected(
                    "Target does not exist".to_string(),
                )),
            )
                .into_response();
        }
        Err(e) => {
            tracing::warn!(error = %e, "target lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SubmitResultResponse::transient_failure("Database error")),
            )
                .into_response();
        }
    }

    let outcome = state.store.transaction(|tx| {
        let trace_id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO traceroutes (id, agent_id, target_id, start_time, annotations)
             VALUES (?1, ?2, ?3, ?4, '')",
            params![
                trace_id.to_string(),
                result.slave.id.to_string(),
                result.target.id.to_string(),
                result.date_time.to_rfc3339(),
            ],
        )?;

        // Linkage follows submission order, not the TTL field: the original
        // walks the hop array as sent and keys nullness off `TTL == 0`, so an
        // out-of-order or gappy TTL sequence still links by iteration.
        let mut previous_hop_id: Option<Uuid> = None;
        for hop in &result.hops {
            let hop_id = Uuid::new_v4();
            let dns_name = (!hop.host.is_empty()).then(|| hop.host.clone());
            let elapsed_secs = hop.elapsed_time_nanos as f64 / 1_000_000_000.0;
            let linked_previous = if hop.ttl == 0 { None } else { previous_hop_id };

            tx.execute(
                "INSERT INTO hops (id, traceroute_id, hop_index, ip_address, dns_name, duration_secs, previous_hop_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    hop_id.to_string(),
                    trace_id.to_string(),
                    hop.ttl,
                    hop.address.to_string(),
                    dns_name,
                    elapsed_secs,
                    linked_previous.map(|id| id.to_string()),
                ],
            )?;

            previous_hop_id = Some(hop_id);
        }

        Ok(trace_id)
    });

    match outcome {
        Ok(trace_id) => {
            tracing::debug!(trace_id = %trace_id, "traceroute persisted");
            (StatusCode::OK, Json(SubmitResultResponse::ok())).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "ingestion transaction failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SubmitResultResponse::transient_failure("Database error")),
            )
                .into_response()
        }
    }
}
