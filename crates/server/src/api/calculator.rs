use axum::extract::rejection::QueryRejection;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use kopi_core::calculator::{evaluate, Number};

use super::{api_error, query_error, ApiError};

#[derive(Debug, Deserialize)]
pub struct CalculatorParams {
    pub expr: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalculatorResponse {
    pub ok: bool,
    pub expr: String,
    pub result: Number,
}

pub async fn calculate(
    params: Result<Query<CalculatorParams>, QueryRejection>,
) -> Result<Json<CalculatorResponse>, ApiError> {
    let Query(params) = params.map_err(query_error)?;
    let expr = params.expr.trim();
    let correlation_id = Uuid::new_v4().to_string();

    let result = evaluate(expr).map_err(|error| {
        info!(
            event_name = "calculator.expression.rejected",
            correlation_id = %correlation_id,
            thread_id = "unknown",
            expr = %expr,
            reason = %error,
            "calculator rejected expression"
        );
        api_error(StatusCode::BAD_REQUEST, error.to_string())
    })?;

    Ok(Json(CalculatorResponse { ok: true, expr: expr.to_string(), result }))
}
