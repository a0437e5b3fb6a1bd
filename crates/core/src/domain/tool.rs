use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculator::Number;
use crate::domain::turn::ToolName;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalculatorResult {
    pub expr: String,
    pub result: Number,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductItem {
    pub title: Option<String>,
    pub price: Option<Decimal>,
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductsResult {
    pub query: String,
    pub items: Vec<ProductItem>,
    pub summary: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutletsResult {
    pub city: Option<String>,
    pub outlet: Option<String>,
    pub hours: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResult {
    Calculator(CalculatorResult),
    Products(ProductsResult),
    Outlets(OutletsResult),
}

impl ToolResult {
    pub fn tool_name(&self) -> ToolName {
        match self {
            Self::Calculator(_) => ToolName::Calculator,
            Self::Products(_) => ToolName::Products,
            Self::Outlets(_) => ToolName::Outlets,
        }
    }
}

/// Outcome of one dispatch: a result or an error text, never both.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Result(ToolResult),
    Error(String),
}

impl ToolOutcome {
    pub fn result(&self) -> Option<&ToolResult> {
        match self {
            Self::Result(result) => Some(result),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Result(_) => None,
            Self::Error(message) => Some(message),
        }
    }
}
