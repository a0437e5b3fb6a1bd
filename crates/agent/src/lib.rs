//! Chat orchestrator for the kopi assistant.
//!
//! One turn runs a fixed pipeline:
//! 1. **Intent** (`intent`) - classify the latest user text.
//! 2. **Slots** (`slots`) - merge what the text says into the carried-over slots,
//!    then prune the keys the new intent does not use.
//! 3. **Plan** (`planner`) - pick ask-clarify, use-tool or reply-only and walk the
//!    per-turn state machine.
//! 4. **Act** (`tools`) - at most one call to the calculator, products or outlets
//!    service. Failures come back as data.
//! 5. **Compose** (`compose`) - render the reply, using the completion service
//!    (`llm`) only for small talk.
//!
//! `runtime::AgentRuntime` ties the steps together, serializes turns per thread
//! and persists session state through `kopi_db::SessionRepository`.

pub mod compose;
pub mod intent;
pub mod llm;
pub mod planner;
pub mod runtime;
pub mod slots;
pub mod tools;

pub use compose::{compose, Composition, GREETING};
pub use llm::{client_from_config, LlmClient, LlmError, OpenAiCompatibleClient};
pub use planner::{plan, Plan, TurnState};
pub use runtime::{AgentRuntime, TurnInput, TurnOutcome};
pub use tools::{Tool, ToolError, ToolRegistry};
