use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use kopi_agent::LlmClient;
use kopi_core::domain::product::{format_ringgit, ProductHit, ProductRecord, ProductSearchResponse};

use super::{api_error, query_error, ApiError, ApiState};

pub const DEFAULT_K: i64 = 5;
pub const MAX_K: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct ProductsParams {
    pub query: String,
    pub k: Option<i64>,
}

pub async fn search(
    State(state): State<ApiState>,
    params: Result<Query<ProductsParams>, QueryRejection>,
) -> Result<Json<ProductSearchResponse>, ApiError> {
    let Query(params) = params.map_err(query_error)?;
    let query = params.query.trim();
    let correlation_id = Uuid::new_v4().to_string();
    if query.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Query cannot be empty."));
    }
    let k = params.k.unwrap_or(DEFAULT_K);
    if !(1..=MAX_K).contains(&k) {
        return Err(api_error(StatusCode::BAD_REQUEST, format!("k must be between 1 and {MAX_K}.")));
    }

    let records = state.products.search(query, k as usize).await.map_err(|repository_error| {
        error!(
            event_name = "products.search.failed",
            correlation_id = %correlation_id,
            thread_id = "unknown",
            error = %repository_error,
            "product search failed"
        );
        api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Products retrieval error: {repository_error}"))
    })?;
    let hits = records.iter().map(ProductRecord::to_hit).collect::<Vec<_>>();

    let summary = match (&state.llm, hits.is_empty()) {
        (Some(llm), false) => summarize(llm.as_ref(), query, &hits, &correlation_id).await,
        _ => None,
    };

    info!(
        event_name = "products.search.completed",
        correlation_id = %correlation_id,
        thread_id = "unknown",
        hits = hits.len(),
        summarized = summary.is_some(),
        "product search completed"
    );

    Ok(Json(ProductSearchResponse { ok: true, query: query.to_string(), k: k as u32, hits, summary }))
}

pub fn summary_prompt(query: &str, hits: &[ProductHit]) -> String {
    let candidates = hits
        .iter()
        .map(|hit| {
            format!(
                "- {} ({}) \u{2014} {}",
                hit.title.as_deref().unwrap_or("Unknown item"),
                hit.price_rm.map(format_ringgit).unwrap_or_else(|| "N/A".to_string()),
                hit.url.as_deref().unwrap_or("no link"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Summarize the most relevant ZUS drinkware for the user's need.\n\
         User query: {query}\n\
         Candidates:\n{candidates}\n\n\
         Return 2\u{2013}4 concise bullets focusing on what to choose and why \
         (capacity, insulation, leak-proof, special lids, price hints)."
    )
}

async fn summarize(
    llm: &dyn LlmClient,
    query: &str,
    hits: &[ProductHit],
    correlation_id: &str,
) -> Option<String> {
    match llm.complete(&summary_prompt(query, hits)).await {
        Ok(summary) if !summary.trim().is_empty() => Some(summary.trim().to_string()),
        Ok(_) => None,
        Err(llm_error) => {
            warn!(
                event_name = "products.summary.failed",
                correlation_id = %correlation_id,
                thread_id = "unknown",
                error = %llm_error,
                "product summary skipped"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use rust_decimal::Decimal;

    use kopi_agent::ToolRegistry;
    use kopi_core::domain::product::{ProductId, ProductRecord};
    use kopi_db::ProductRepository;

    use super::summary_prompt;
    use crate::api::router;
    use crate::api::test_support::{get_json, seeded_pool, state, ScriptedCompletion};
    use crate::api::ApiState;

    fn record(id: &str, title: &str, price: Option<Decimal>) -> ProductRecord {
        ProductRecord {
            id: ProductId(id.to_string()),
            title: title.to_string(),
            price_rm: price,
            url: Some(format!("https://shop.example/{id}")),
            image: None,
            document: format!("Title: {title}\nDescription: {}", "Keeps drinks hot. ".repeat(20)),
        }
    }

    async fn catalog_state(with_llm: bool) -> ApiState {
        let llm = with_llm.then(|| Arc::new(ScriptedCompletion) as Arc<dyn kopi_agent::LlmClient>);
        let state = state(seeded_pool().await, llm, ToolRegistry::default());
        for product in [
            record("tumbler", "All-Can Tumbler 600ml", Some(Decimal::new(7900, 2))),
            record("mug", "Ceramic Mug", None),
            record("bottle", "Frozee Cold Bottle", Some(Decimal::new(5500, 2))),
        ] {
            state.products.save(product).await.expect("product should save");
        }
        state
    }

    #[tokio::test]
    async fn ranks_hits_and_omits_summary_without_completion() {
        let app = router(catalog_state(false).await);

        let (status, body) = get_json(app, "/api/v1/products?query=tumbler&k=2").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["k"], 2);
        assert_eq!(body["hits"][0]["title"], "All-Can Tumbler 600ml");
        assert_eq!(body["hits"][0]["price_rm"], 79.0);
        assert!(body["hits"][0]["chunk_preview"].as_str().is_some_and(|preview| preview.ends_with("...")));
        assert!(body["summary"].is_null());
    }

    #[tokio::test]
    async fn summary_is_added_when_completion_is_configured() {
        let app = router(catalog_state(true).await);

        let (status, body) = get_json(app, "/api/v1/products?query=cold%20bottle").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hits"][0]["title"], "Frozee Cold Bottle");
        assert_eq!(body["summary"], "- Pick the tumbler for long commutes.");
    }

    #[tokio::test]
    async fn validates_query_and_k() {
        let app = router(catalog_state(false).await);

        let (status, body) = get_json(app.clone(), "/api/v1/products?query=%20%20").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Query cannot be empty.");

        for uri in ["/api/v1/products?query=mug&k=0", "/api/v1/products?query=mug&k=11"] {
            let (status, body) = get_json(app.clone(), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["detail"], "k must be between 1 and 10.");
        }
    }

    #[test]
    fn prompt_lists_candidates_with_prices() {
        let hits = vec![
            record("tumbler", "All-Can Tumbler", Some(Decimal::new(123450, 2))).to_hit(),
            record("mug", "Ceramic Mug", None).to_hit(),
        ];

        let prompt = summary_prompt("gift under RM100", &hits);

        assert!(prompt.contains("User query: gift under RM100"));
        assert!(prompt.contains("- All-Can Tumbler (RM1,234.50) \u{2014} https://shop.example/tumbler"));
        assert!(prompt.contains("- Ceramic Mug (N/A)"));
    }
}
