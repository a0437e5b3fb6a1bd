use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use kopi_core::domain::message::Message;
use kopi_core::domain::session::{SessionState, ThreadId};
use kopi_core::domain::slots::Slots;
use kopi_core::domain::tool::{ToolOutcome, ToolResult};
use kopi_core::domain::turn::{Intent, NextAction, ToolName};
use kopi_core::errors::{ApplicationError, DomainError};
use kopi_db::SessionRepository;

use crate::compose::{compose, finish_completion, Composition};
use crate::intent::classify;
use crate::llm::{LlmClient, LlmError};
use crate::planner::{plan, transition, Plan, TurnEvent, TurnState, TurnTransitionError};
use crate::slots;
use crate::tools::ToolRegistry;

/// Everything one turn needs, passed by value.
#[derive(Clone, Debug, Default)]
pub struct TurnInput {
    pub prior: SessionState,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub intent: Intent,
    pub next_action: NextAction,
    pub tool: Option<ToolName>,
    pub error: Option<String>,
    pub slots: Slots,
    pub tool_result: Option<ToolResult>,
    #[serde(skip)]
    pub state: SessionState,
}

pub struct AgentRuntime {
    sessions: Arc<dyn SessionRepository>,
    tools: ToolRegistry,
    llm: Option<Arc<dyn LlmClient>>,
    thread_locks: Mutex<HashMap<ThreadId, Arc<Mutex<()>>>>,
}

impl AgentRuntime {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        tools: ToolRegistry,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Self {
        Self { sessions, tools, llm, thread_locks: Mutex::new(HashMap::new()) }
    }

    /// Runs one turn for `thread_id` and persists the resulting session state.
    /// Turns on the same thread are serialized; other threads proceed in parallel.
    pub async fn handle_message(
        &self,
        thread_id: &ThreadId,
        text: &str,
        correlation_id: &str,
    ) -> Result<TurnOutcome, ApplicationError> {
        if thread_id.as_str().trim().is_empty() {
            return Err(DomainError::EmptySessionId.into());
        }
        if text.trim().is_empty() {
            return Err(DomainError::EmptyMessage.into());
        }

        let thread_lock = self.thread_lock(thread_id).await;
        let _guard = thread_lock.lock().await;

        let prior = self
            .sessions
            .get(thread_id)
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?
            .unwrap_or_default();

        let outcome = self
            .run_turn(TurnInput { prior, text: text.to_string() }, thread_id, correlation_id)
            .await?;

        self.sessions
            .put(thread_id, outcome.state.clone())
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;

        info!(
            event_name = "agent.turn.completed",
            correlation_id = %correlation_id,
            thread_id = %thread_id.as_str(),
            intent = %outcome.intent,
            next_action = %outcome.next_action,
            failed = outcome.error.is_some(),
            "turn completed"
        );

        Ok(outcome)
    }

    /// Classify, update slots, plan, act and compose. Does not touch the session store.
    pub async fn run_turn(
        &self,
        input: TurnInput,
        thread_id: &ThreadId,
        correlation_id: &str,
    ) -> Result<TurnOutcome, ApplicationError> {
        let TurnInput { mut prior, text } = input;

        info!(
            event_name = "agent.turn.started",
            correlation_id = %correlation_id,
            thread_id = %thread_id.as_str(),
            prior_messages = prior.messages.len(),
            "turn started"
        );

        let intent = classify(&text);
        let slots = slots::update(&prior.slots, &text, intent);
        let plan = plan(intent, &slots);

        info!(
            event_name = "agent.turn.planned",
            correlation_id = %correlation_id,
            thread_id = %thread_id.as_str(),
            intent = %plan.intent,
            next_action = %plan.next_action,
            tool = plan.tool.map(|tool| tool.as_str()),
            slot_keys = ?slots.keys(),
            "turn planned"
        );

        let step = transition(TurnState::Planning, TurnEvent::Planned(plan)).map_err(invariant)?;
        let (reply, outcome) = match step.to {
            TurnState::Clarifying => {
                let reply = self.compose_reply(&plan, &slots, None).await;
                transition(step.to, TurnEvent::ClarificationComposed).map_err(invariant)?;
                (reply, None)
            }
            TurnState::DispatchingCalculator
            | TurnState::DispatchingProducts
            | TurnState::DispatchingOutlets => {
                let outcome = self.dispatch(&plan, &slots, thread_id, correlation_id).await;
                transition(step.to, TurnEvent::ToolCompleted).map_err(invariant)?;
                (self.compose_reply(&plan, &slots, outcome.as_ref()).await, outcome)
            }
            TurnState::Responding => (self.compose_reply(&plan, &slots, None).await, None),
            TurnState::Planning => {
                return Err(invariant(TurnTransitionError::InvalidTransition {
                    state: step.from,
                    event: step.event,
                }));
            }
        };

        prior.push(Message::user(text));
        prior.push(Message::assistant(reply.clone()));
        prior.slots = slots.clone();

        Ok(TurnOutcome {
            reply,
            intent: plan.intent,
            next_action: plan.next_action,
            tool: plan.tool,
            error: outcome.as_ref().and_then(ToolOutcome::error).map(str::to_string),
            slots,
            tool_result: outcome.as_ref().and_then(ToolOutcome::result).cloned(),
            state: prior,
        })
    }

    async fn dispatch(
        &self,
        plan: &Plan,
        slots: &Slots,
        thread_id: &ThreadId,
        correlation_id: &str,
    ) -> Option<ToolOutcome> {
        let tool = plan.tool?;
        let outcome = self.tools.dispatch(tool, slots).await;

        if let ToolOutcome::Error(error) = &outcome {
            warn!(
                event_name = "agent.tool.failed",
                correlation_id = %correlation_id,
                thread_id = %thread_id.as_str(),
                tool = %tool,
                error = %error,
                "tool call failed"
            );
        }

        Some(outcome)
    }

    async fn compose_reply(&self, plan: &Plan, slots: &Slots, outcome: Option<&ToolOutcome>) -> String {
        match compose(plan, slots, outcome) {
            Composition::Text(text) => text,
            Composition::Completion(messages) => {
                let completion = match &self.llm {
                    Some(llm) => llm.chat(&messages).await,
                    None => Err(LlmError::Disabled),
                };
                finish_completion(completion)
            }
        }
    }

    async fn thread_lock(&self, thread_id: &ThreadId) -> Arc<Mutex<()>> {
        let mut locks = self.thread_locks.lock().await;
        locks.entry(thread_id.clone()).or_default().clone()
    }
}

fn invariant(error: TurnTransitionError) -> ApplicationError {
    DomainError::InvariantViolation(error.to_string()).into()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use kopi_core::calculator::evaluate;
    use kopi_core::domain::message::{Message, Role};
    use kopi_core::domain::session::{SessionState, ThreadId};
    use kopi_core::domain::slots::{SlotKey, Slots};
    use kopi_core::domain::tool::{CalculatorResult, OutletsResult, ProductsResult, ToolResult};
    use kopi_core::domain::turn::{Intent, NextAction, ToolName};
    use kopi_core::errors::{ApplicationError, DomainError};
    use kopi_db::{InMemorySessionRepository, SessionRepository};

    use super::{AgentRuntime, TurnInput};
    use crate::compose::GREETING;
    use crate::llm::{LlmClient, LlmError};
    use crate::tools::{Tool, ToolError, ToolRegistry};

    struct LocalCalculator;

    #[async_trait]
    impl Tool for LocalCalculator {
        fn name(&self) -> ToolName {
            ToolName::Calculator
        }

        async fn execute(&self, slots: &Slots) -> Result<ToolResult, ToolError> {
            let expr = slots.get(SlotKey::Expr).ok_or(ToolError::MissingInput("No expression provided."))?;
            let result = evaluate(expr).map_err(|error| ToolError::Api {
                service: "Calculator",
                detail: error.to_string(),
            })?;
            Ok(ToolResult::Calculator(CalculatorResult { expr: expr.to_string(), result }))
        }
    }

    struct EmptyCatalog {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Tool for Arc<EmptyCatalog> {
        fn name(&self) -> ToolName {
            ToolName::Products
        }

        async fn execute(&self, slots: &Slots) -> Result<ToolResult, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ToolResult::Products(ProductsResult {
                query: slots.get(SlotKey::ProductQuery).unwrap_or_default().to_string(),
                items: Vec::new(),
                summary: None,
            }))
        }
    }

    struct FixedHours;

    #[async_trait]
    impl Tool for FixedHours {
        fn name(&self) -> ToolName {
            ToolName::Outlets
        }

        async fn execute(&self, slots: &Slots) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::Outlets(OutletsResult {
                city: slots.get(SlotKey::City).map(str::to_string),
                outlet: slots.get(SlotKey::Outlet).map(str::to_string),
                hours: "Opens 08:00 / Closes 21:00".to_string(),
            }))
        }
    }

    struct EchoCompletion;

    #[async_trait]
    impl LlmClient for EchoCompletion {
        async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
            Ok(format!("  Hello! ({} messages)  ", messages.len()))
        }
    }

    struct FailingCompletion;

    #[async_trait]
    impl LlmClient for FailingCompletion {
        async fn chat(&self, _messages: &[Message]) -> Result<String, LlmError> {
            Err(LlmError::EmptyChoices)
        }
    }

    struct Harness {
        runtime: AgentRuntime,
        sessions: Arc<InMemorySessionRepository>,
        catalog: Arc<EmptyCatalog>,
    }

    fn harness(llm: Option<Arc<dyn LlmClient>>) -> Harness {
        let sessions = Arc::new(InMemorySessionRepository::default());
        let catalog = Arc::new(EmptyCatalog { calls: AtomicUsize::new(0) });
        let mut tools = ToolRegistry::default();
        tools.register(LocalCalculator);
        tools.register(catalog.clone());
        tools.register(FixedHours);

        Harness {
            runtime: AgentRuntime::new(sessions.clone(), tools, llm),
            sessions,
            catalog,
        }
    }

    fn thread(id: &str) -> ThreadId {
        ThreadId(id.to_string())
    }

    #[tokio::test]
    async fn calculation_turn_answers_directly() {
        let harness = harness(None);

        let outcome = harness
            .runtime
            .handle_message(&thread("a"), "12*3", "corr-a")
            .await
            .expect("turn should succeed");

        assert_eq!(outcome.intent, Intent::Calc);
        assert_eq!(outcome.slots.get(SlotKey::Expr), Some("12*3"));
        assert_eq!(outcome.tool, Some(ToolName::Calculator));
        assert_eq!(outcome.reply, "The answer to 12*3 is 36.");
        assert_eq!(outcome.error, None);
    }

    #[tokio::test]
    async fn outlet_turn_uses_both_slots() {
        let harness = harness(None);

        let outcome = harness
            .runtime
            .handle_message(&thread("b"), "Show opening hours for wangsa maju in Kuala Lumpur", "corr-b")
            .await
            .expect("turn should succeed");

        assert_eq!(outcome.intent, Intent::OutletQuery);
        assert_eq!(outcome.slots.get(SlotKey::City), Some("Kuala Lumpur"));
        assert_eq!(outcome.slots.get(SlotKey::Outlet), Some("Wangsa Maju"));
        assert_eq!(outcome.next_action, NextAction::UseTool);
        assert_eq!(outcome.reply, "Wangsa Maju in Kuala Lumpur: Opens 08:00 / Closes 21:00.");
    }

    #[tokio::test]
    async fn broad_product_question_with_no_hits_apologises() {
        let harness = harness(None);

        let outcome = harness
            .runtime
            .handle_message(&thread("c"), "What drinkware do you have?", "corr-c")
            .await
            .expect("turn should succeed");

        assert_eq!(outcome.slots.get(SlotKey::ProductQuery), Some("What drinkware do you have?"));
        assert_eq!(outcome.next_action, NextAction::UseTool);
        assert_eq!(outcome.error, None);
        assert!(outcome.reply.starts_with("I couldn't find matching drinkware."));
        assert_eq!(harness.catalog.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn switching_from_products_to_calc_prunes_the_query() {
        let harness = harness(None);
        let id = thread("e");

        let first = harness.runtime.handle_message(&id, "bottle", "corr-e1").await.expect("first turn");
        assert_eq!(first.intent, Intent::Products);

        let second = harness.runtime.handle_message(&id, "12*3", "corr-e2").await.expect("second turn");
        assert_eq!(second.intent, Intent::Calc);
        assert_eq!(second.slots.get(SlotKey::Expr), Some("12*3"));
        assert!(!second.slots.contains(SlotKey::ProductQuery));

        let stored = harness.sessions.get(&id).await.expect("read session").expect("session stored");
        assert_eq!(stored.messages.len(), 4);
        assert_eq!(stored.messages[0].role, Role::User);
        assert_eq!(stored.messages[3].content, "The answer to 12*3 is 36.");
        assert_eq!(stored.slots, second.slots);
    }

    #[tokio::test]
    async fn calculator_errors_become_replies() {
        let harness = harness(None);

        let outcome = harness
            .runtime
            .handle_message(&thread("err"), "what is 10/0", "corr-err")
            .await
            .expect("a failed tool call is still a turn");

        let error = outcome.error.expect("tool error recorded");
        assert!(error.starts_with("Calculator error: "), "{error}");
        assert!(outcome.reply.ends_with(". Could you rephrase or provide the correct info?"));
    }

    #[tokio::test]
    async fn replaying_a_clarification_asks_the_same_question() {
        let harness = harness(None);
        let input = TurnInput { prior: SessionState::default(), text: "Where is your outlet?".to_string() };

        let first = harness.runtime.run_turn(input.clone(), &thread("r"), "corr-r1").await.expect("first");
        let second = harness.runtime.run_turn(input, &thread("r"), "corr-r2").await.expect("second");

        assert_eq!(first.next_action, NextAction::AskClarify);
        assert_eq!(first.reply, "Which city do you mean? (e.g., Petaling Jaya)");
        assert_eq!(first.reply, second.reply);
        assert_eq!(first.slots, second.slots);
    }

    #[tokio::test]
    async fn chitchat_uses_completion_and_falls_back_to_greeting() {
        let echoing = harness(Some(Arc::new(EchoCompletion)));
        let outcome = echoing.runtime.handle_message(&thread("h1"), "hello", "corr-h1").await.expect("turn");
        assert_eq!(outcome.next_action, NextAction::ReplyOnly);
        assert_eq!(outcome.reply, "Hello! (3 messages)");

        let failing = harness(Some(Arc::new(FailingCompletion)));
        let outcome = failing.runtime.handle_message(&thread("h2"), "hello", "corr-h2").await.expect("turn");
        assert_eq!(outcome.reply, GREETING);

        let disabled = harness(None);
        let outcome = disabled.runtime.handle_message(&thread("h3"), "hello", "corr-h3").await.expect("turn");
        assert_eq!(outcome.reply, GREETING);
    }

    #[tokio::test]
    async fn empty_inputs_are_rejected_before_classification() {
        let harness = harness(None);

        let error = harness.runtime.handle_message(&thread("x"), "   ", "corr-x").await.expect_err("empty text");
        assert_eq!(error, ApplicationError::Domain(DomainError::EmptyMessage));

        let error = harness.runtime.handle_message(&thread(""), "12*3", "corr-y").await.expect_err("empty id");
        assert_eq!(error, ApplicationError::Domain(DomainError::EmptySessionId));

        assert!(harness.sessions.get(&thread("x")).await.expect("read").is_none());
    }

    #[tokio::test]
    async fn concurrent_turns_on_one_thread_are_all_recorded() {
        let harness = Arc::new(harness(None));
        let id = thread("busy");

        let turns = (0..8).map(|index| {
            let harness = harness.clone();
            let id = id.clone();
            tokio::spawn(async move {
                harness
                    .runtime
                    .handle_message(&id, &format!("{index}+1"), "corr-busy")
                    .await
                    .expect("turn should succeed")
            })
        });
        for turn in turns.collect::<Vec<_>>() {
            turn.await.expect("task joins");
        }

        let stored = harness.sessions.get(&id).await.expect("read").expect("stored");
        assert_eq!(stored.messages.len(), 16);
    }
}
