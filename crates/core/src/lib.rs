pub mod calculator;
pub mod config;
pub mod domain;
pub mod errors;
pub mod guard;

pub use calculator::{evaluate, CalcError, Expr, Number};
pub use domain::message::{Message, Role};
pub use domain::outlet::OutletRecord;
pub use domain::product::{
    format_ringgit, ProductHit, ProductId, ProductRecord, ProductSearchResponse, ScrapedProduct,
};
pub use domain::session::{SessionState, ThreadId};
pub use domain::slots::{SlotKey, Slots};
pub use domain::tool::{
    CalculatorResult, OutletsResult, ProductItem, ProductsResult, ToolOutcome, ToolResult,
};
pub use domain::turn::{Intent, NextAction, ToolName};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use guard::{GuardError, VettedOutletQuery};
