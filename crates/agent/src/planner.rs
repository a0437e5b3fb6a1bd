//! Turn planning: the (intent, slots) decision table and the per-turn state
//! machine that drives a turn from planning to its reply.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use kopi_core::domain::slots::{SlotKey, Slots};
use kopi_core::domain::turn::{Intent, NextAction, ToolName};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub intent: Intent,
    pub next_action: NextAction,
    pub tool: Option<ToolName>,
}

impl Plan {
    fn clarify(intent: Intent) -> Self {
        Self { intent, next_action: NextAction::AskClarify, tool: None }
    }

    fn use_tool(intent: Intent, tool: ToolName) -> Self {
        Self { intent, next_action: NextAction::UseTool, tool: Some(tool) }
    }
}

pub fn plan(intent: Intent, slots: &Slots) -> Plan {
    match intent {
        Intent::OutletQuery if slots.contains(SlotKey::City) || slots.contains(SlotKey::Outlet) => {
            Plan::use_tool(intent, ToolName::Outlets)
        }
        Intent::OutletQuery => Plan::clarify(intent),
        Intent::Calc if slots.contains(SlotKey::Expr) => Plan::use_tool(intent, ToolName::Calculator),
        Intent::Calc => Plan::clarify(intent),
        Intent::Products if slots.contains(SlotKey::ProductQuery) => {
            Plan::use_tool(intent, ToolName::Products)
        }
        Intent::Products => Plan::clarify(intent),
        Intent::Chitchat => Plan { intent, next_action: NextAction::ReplyOnly, tool: None },
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnState {
    Planning,
    Clarifying,
    DispatchingCalculator,
    DispatchingProducts,
    DispatchingOutlets,
    Responding,
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Responding)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnEvent {
    Planned(Plan),
    ClarificationComposed,
    ToolCompleted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnTransition {
    pub from: TurnState,
    pub to: TurnState,
    pub event: TurnEvent,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnTransitionError {
    #[error("turn already reached {state:?}; no further transitions are allowed")]
    Terminal { state: TurnState },
    #[error("invalid turn transition from {state:?} using event {event:?}")]
    InvalidTransition { state: TurnState, event: TurnEvent },
}

pub fn transition(current: TurnState, event: TurnEvent) -> Result<TurnTransition, TurnTransitionError> {
    use TurnState::{
        Clarifying, DispatchingCalculator, DispatchingOutlets, DispatchingProducts, Planning,
        Responding,
    };

    if current.is_terminal() {
        return Err(TurnTransitionError::Terminal { state: current });
    }

    let to = match (current, event) {
        (Planning, TurnEvent::Planned(plan)) => match (plan.next_action, plan.tool) {
            (NextAction::AskClarify, None) => Clarifying,
            (NextAction::ReplyOnly, None) => Responding,
            (NextAction::UseTool, Some(ToolName::Calculator)) => DispatchingCalculator,
            (NextAction::UseTool, Some(ToolName::Products)) => DispatchingProducts,
            (NextAction::UseTool, Some(ToolName::Outlets)) => DispatchingOutlets,
            _ => return Err(TurnTransitionError::InvalidTransition { state: current, event }),
        },
        (Clarifying, TurnEvent::ClarificationComposed) => Responding,
        (DispatchingCalculator | DispatchingProducts | DispatchingOutlets, TurnEvent::ToolCompleted) => {
            Responding
        }
        _ => return Err(TurnTransitionError::InvalidTransition { state: current, event }),
    };

    Ok(TurnTransition { from: current, to, event })
}
