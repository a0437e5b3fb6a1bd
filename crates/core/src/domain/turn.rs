use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Products,
    OutletQuery,
    Calc,
    Chitchat,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::OutletQuery => "outlet_query",
            Self::Calc => "calc",
            Self::Chitchat => "chitchat",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    AskClarify,
    UseTool,
    ReplyOnly,
}

impl NextAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AskClarify => "ask_clarify",
            Self::UseTool => "use_tool",
            Self::ReplyOnly => "reply_only",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    Calculator,
    Products,
    Outlets,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calculator => "calculator",
            Self::Products => "products",
            Self::Outlets => "outlets",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for NextAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
