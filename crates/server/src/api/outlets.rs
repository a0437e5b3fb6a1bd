use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use kopi_core::domain::outlet::OutletRecord;
use kopi_core::guard::VettedOutletQuery;

use super::{api_error, query_error, ApiError, ApiState};

#[derive(Debug, Deserialize)]
pub struct OutletsParams {
    pub query: String,
}

pub fn sql_prompt(query: &str) -> String {
    format!(
        "Given this schema:\n\
         CREATE TABLE outlets(city TEXT, outlet TEXT, open_time TEXT, close_time TEXT);\n\n\
         Write ONE SQL SELECT that returns EXACTLY these columns:\n\
         city, outlet, open_time, close_time\n\
         FROM the outlets table only.\n\
         You may add a WHERE clause on city and/or outlet if present in the user query.\n\
         Do NOT use JOIN, PRAGMA, ATTACH, INSERT, UPDATE, DELETE, DROP, ALTER, UNION or comments.\n\
         Return ONLY the SQL.\n\
         User query: {query}"
    )
}

/// Free-text outlet lookup. The completion service writes the SQL; only a
/// statement that passes the guard is ever executed.
pub async fn lookup(
    State(state): State<ApiState>,
    params: Result<Query<OutletsParams>, QueryRejection>,
) -> Result<Json<Vec<OutletRecord>>, ApiError> {
    let Query(params) = params.map_err(query_error)?;
    let query = params.query.trim();
    let correlation_id = Uuid::new_v4().to_string();
    if query.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Query cannot be empty"));
    }

    let Some(llm) = state.llm.as_ref() else {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Outlet lookup needs a completion service; none is configured.",
        ));
    };

    let generated = llm.complete(&sql_prompt(query)).await.map_err(|llm_error| {
        error!(
            event_name = "outlets.query.generation_failed",
            correlation_id = %correlation_id,
            thread_id = "unknown",
            error = %llm_error,
            "outlet query generation failed"
        );
        api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Outlets query error: {llm_error}"))
    })?;

    let vetted = VettedOutletQuery::from_generated(&generated).map_err(|guard_error| {
        warn!(
            event_name = "outlets.query.rejected",
            correlation_id = %correlation_id,
            thread_id = "unknown",
            reason = %guard_error,
            "generated outlet query rejected"
        );
        api_error(StatusCode::BAD_REQUEST, guard_error.to_string())
    })?;

    let rows = state.outlets.lookup(&vetted).await.map_err(|repository_error| {
        error!(
            event_name = "outlets.query.failed",
            correlation_id = %correlation_id,
            thread_id = "unknown",
            error = %repository_error,
            "outlet lookup failed"
        );
        api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Outlets query error: {repository_error}"))
    })?;

    if rows.is_empty() {
        return Err(api_error(StatusCode::NOT_FOUND, "No outlets found for the query."));
    }

    info!(
        event_name = "outlets.query.completed",
        correlation_id = %correlation_id,
        thread_id = "unknown",
        sql = %vetted.as_str(),
        rows = rows.len(),
        "outlet lookup completed"
    );

    Ok(Json(rows))
}
