//! Thin HTTP clients for the calculator, products and outlets services.
//!
//! Every client turns the current slots into one request under a bounded
//! timeout. Failures never escape a dispatch: [`ToolRegistry::dispatch`] folds
//! them into a [`ToolOutcome::Error`] carrying the tool's error prefix.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use kopi_core::calculator::Number;
use kopi_core::config::ServicesConfig;
use kopi_core::domain::slots::{SlotKey, Slots};
use kopi_core::domain::tool::{
    CalculatorResult, OutletsResult, ProductItem, ProductsResult, ToolOutcome, ToolResult,
};
use kopi_core::domain::turn::ToolName;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    MissingInput(&'static str),
    #[error("{service} API error: {detail}")]
    Api { service: &'static str, detail: String },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("No outlet data returned.")]
    NoOutletData,
    #[error("tool is not configured")]
    NotRegistered,
}

impl ToolError {
    fn from_reqwest(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            Self::Timeout(timeout)
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

pub fn error_label(tool: ToolName) -> &'static str {
    match tool {
        ToolName::Calculator => "Calculator",
        ToolName::Products => "Products",
        ToolName::Outlets => "Outlets",
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> ToolName;
    async fn execute(&self, slots: &Slots) -> Result<ToolResult, ToolError>;
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<ToolName, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name(), Arc::new(tool));
    }

    pub fn from_config(config: &ServicesConfig) -> Self {
        let endpoint = ServiceEndpoint::new(&config.base_url);
        let mut registry = Self::default();
        registry.register(HttpCalculatorTool::new(
            endpoint.clone(),
            Duration::from_secs(config.calculator_timeout_secs),
        ));
        registry.register(HttpProductsTool::new(
            endpoint.clone(),
            Duration::from_secs(config.products_timeout_secs),
            config.products_top_k,
        ));
        registry.register(HttpOutletsTool::new(
            endpoint,
            Duration::from_secs(config.outlets_timeout_secs),
        ));
        registry
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn dispatch(&self, name: ToolName, slots: &Slots) -> ToolOutcome {
        let result = match self.tools.get(&name) {
            Some(tool) => tool.execute(slots).await,
            None => Err(ToolError::NotRegistered),
        };

        match result {
            Ok(result) => ToolOutcome::Result(result),
            Err(error) => ToolOutcome::Error(format!("{} error: {error}", error_label(name))),
        }
    }
}

/// Base URL shared by the three service clients.
#[derive(Clone, Debug)]
pub struct ServiceEndpoint {
    http: Client,
    base_url: String,
}

impl ServiceEndpoint {
    pub fn new(base_url: &str) -> Self {
        Self { http: Client::new(), base_url: base_url.trim().trim_end_matches('/').to_string() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{path}", self.base_url)
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<Response, ToolError> {
        self.http
            .get(self.url(path))
            .query(query)
            .timeout(timeout)
            .send()
            .await
            .map_err(|error| ToolError::from_reqwest(error, timeout))
    }
}

async fn api_error(service: &'static str, response: Response) -> ToolError {
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value.get("detail").cloned())
        .map(|detail| match detail {
            Value::String(text) => text,
            other => other.to_string(),
        })
        .unwrap_or(body);
    ToolError::Api { service, detail }
}

fn required<'a>(slots: &'a Slots, key: SlotKey, message: &'static str) -> Result<&'a str, ToolError> {
    slots.get(key).filter(|value| !value.is_empty()).ok_or(ToolError::MissingInput(message))
}

pub struct HttpCalculatorTool {
    endpoint: ServiceEndpoint,
    timeout: Duration,
}

#[derive(Deserialize)]
struct CalculatorResponse {
    expr: Option<String>,
    result: Option<Number>,
}

impl HttpCalculatorTool {
    pub fn new(endpoint: ServiceEndpoint, timeout: Duration) -> Self {
        Self { endpoint, timeout }
    }
}

#[async_trait]
impl Tool for HttpCalculatorTool {
    fn name(&self) -> ToolName {
        ToolName::Calculator
    }

    async fn execute(&self, slots: &Slots) -> Result<ToolResult, ToolError> {
        let expr = required(slots, SlotKey::Expr, "No expression provided.")?;

        let response =
            self.endpoint.get("calculator", &[("expr", expr.to_string())], self.timeout).await?;
        if !response.status().is_success() {
            return Err(api_error("Calculator", response).await);
        }

        let body = response
            .json::<CalculatorResponse>()
            .await
            .map_err(|error| ToolError::from_reqwest(error, self.timeout))?;
        let result = body.result.ok_or_else(|| ToolError::Decode("missing result".to_string()))?;

        Ok(ToolResult::Calculator(CalculatorResult {
            expr: body.expr.unwrap_or_else(|| expr.to_string()),
            result,
        }))
    }
}

pub struct HttpProductsTool {
    endpoint: ServiceEndpoint,
    timeout: Duration,
    top_k: u32,
}

#[derive(Deserialize)]
struct ProductsResponse {
    #[serde(default)]
    hits: Vec<ProductHitBody>,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Deserialize)]
struct ProductHitBody {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    price_rm: Option<Value>,
    #[serde(default)]
    url: Option<String>,
}

/// Only JSON numbers count as prices; strings and other shapes are dropped.
fn numeric_price(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::Number(number) => Decimal::from_str(&number.to_string())
            .or_else(|_| Decimal::from_scientific(&number.to_string()))
            .ok(),
        _ => None,
    }
}

impl HttpProductsTool {
    pub fn new(endpoint: ServiceEndpoint, timeout: Duration, top_k: u32) -> Self {
        Self { endpoint, timeout, top_k }
    }
}

#[async_trait]
impl Tool for HttpProductsTool {
    fn name(&self) -> ToolName {
        ToolName::Products
    }

    async fn execute(&self, slots: &Slots) -> Result<ToolResult, ToolError> {
        let query = required(slots, SlotKey::ProductQuery, "No product query provided.")?;

        let response = self
            .endpoint
            .get(
                "products",
                &[("query", query.to_string()), ("k", self.top_k.to_string())],
                self.timeout,
            )
            .await?;
        if !response.status().is_success() {
            return Err(api_error("Products", response).await);
        }

        let body = response
            .json::<ProductsResponse>()
            .await
            .map_err(|error| ToolError::from_reqwest(error, self.timeout))?;
        let items = body
            .hits
            .into_iter()
            .map(|hit| ProductItem {
                title: hit.title,
                price: numeric_price(hit.price_rm.as_ref()),
                url: hit.url,
            })
            .collect();

        Ok(ToolResult::Products(ProductsResult {
            query: query.to_string(),
            items,
            summary: body.summary,
        }))
    }
}

pub struct HttpOutletsTool {
    endpoint: ServiceEndpoint,
    timeout: Duration,
}

#[derive(Deserialize)]
struct OutletRow {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    outlet: Option<String>,
    #[serde(default)]
    open_time: Option<String>,
    #[serde(default)]
    close_time: Option<String>,
}

/// Natural-language request sent to the outlet lookup service.
pub fn outlet_lookup_query(city: Option<&str>, outlet: Option<&str>) -> Option<String> {
    match (city, outlet) {
        (Some(city), Some(outlet)) => Some(format!("Show opening hours for {outlet} in {city}")),
        (Some(city), None) => Some(format!("Show all outlets in {city}")),
        (None, Some(outlet)) => Some(format!("Show opening hours for {outlet}")),
        (None, None) => None,
    }
}

impl HttpOutletsTool {
    pub fn new(endpoint: ServiceEndpoint, timeout: Duration) -> Self {
        Self { endpoint, timeout }
    }
}

#[async_trait]
impl Tool for HttpOutletsTool {
    fn name(&self) -> ToolName {
        ToolName::Outlets
    }

    async fn execute(&self, slots: &Slots) -> Result<ToolResult, ToolError> {
        let present = |key| slots.get(key).filter(|value: &&str| !value.is_empty());
        let query = outlet_lookup_query(present(SlotKey::City), present(SlotKey::Outlet))
            .ok_or(ToolError::MissingInput("Missing city or outlet information."))?;

        let response = self.endpoint.get("outlets", &[("query", query)], self.timeout).await?;
        if !response.status().is_success() {
            return Err(api_error("Outlets", response).await);
        }

        let rows = response
            .json::<Vec<OutletRow>>()
            .await
            .map_err(|error| ToolError::from_reqwest(error, self.timeout))?;
        let first = rows.into_iter().next().ok_or(ToolError::NoOutletData)?;

        Ok(ToolResult::Outlets(OutletsResult {
            hours: format!(
                "Opens {} / Closes {}",
                first.open_time.as_deref().unwrap_or("unknown"),
                first.close_time.as_deref().unwrap_or("unknown"),
            ),
            city: first.city,
            outlet: first.outlet,
        }))
    }
}
