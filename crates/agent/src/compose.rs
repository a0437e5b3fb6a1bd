//! Turns a plan, the current slots and an optional tool outcome into the
//! assistant's reply. Everything here is pure; the one path that needs the
//! completion service hands back the message sequence instead of calling it.

use serde_json::json;

use kopi_core::domain::message::Message;
use kopi_core::domain::product::format_ringgit;
use kopi_core::domain::slots::{SlotKey, Slots};
use kopi_core::domain::tool::{
    CalculatorResult, OutletsResult, ProductItem, ProductsResult, ToolOutcome, ToolResult,
};
use kopi_core::domain::turn::{Intent, NextAction};

use crate::llm::LlmError;
use crate::planner::Plan;

pub const GREETING: &str = "Hi! I can help with calculations, ZUS drinkware products, or outlet opening hours. What would you like to do?";

const SYSTEM_INSTRUCTION: &str = "You are a helpful ZUS Coffee assistant. Be concise. If tool_result is present, you may reference it, otherwise do not invent facts. Offer how you can help: calculator, products, outlets.";
const REPLY_PROMPT: &str = "How would you briefly respond to the user now?";
const TOOL_UNAVAILABLE: &str = "I couldn\u{2019}t use the tool just now. Could you rephrase or try again?";
const NO_PRODUCTS: &str = "I couldn't find matching drinkware. Want to try a different description (size, insulation, budget)?";
const PRODUCT_REFINE: &str = "Want to refine by size, insulation, or budget?";
const MAX_PRODUCT_LINES: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Composition {
    Text(String),
    /// Messages to send to the completion service; finish with [`finish_completion`].
    Completion(Vec<Message>),
}

pub fn compose(plan: &Plan, slots: &Slots, outcome: Option<&ToolOutcome>) -> Composition {
    match plan.next_action {
        NextAction::AskClarify => Composition::Text(clarifying_question(plan.intent, slots)),
        NextAction::UseTool => Composition::Text(tool_reply(slots, outcome)),
        NextAction::ReplyOnly => Composition::Completion(reply_messages(plan, slots, outcome)),
    }
}

/// Trimmed completion text, or the greeting when the call failed or said nothing.
pub fn finish_completion(result: Result<String, LlmError>) -> String {
    match result {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => GREETING.to_string(),
    }
}

pub fn clarifying_question(intent: Intent, slots: &Slots) -> String {
    match intent {
        Intent::OutletQuery if !slots.contains(SlotKey::City) => {
            "Which city do you mean? (e.g., Petaling Jaya)".to_string()
        }
        Intent::OutletQuery if !slots.contains(SlotKey::Outlet) => {
            format!("Which outlet in {}? (e.g., SS2)", slots.get(SlotKey::City).unwrap_or_default())
        }
        Intent::OutletQuery => "Could you share the missing details?".to_string(),
        Intent::Calc => "Please provide a valid arithmetic expression (e.g., 12*3).".to_string(),
        Intent::Products => "What drinkware are you looking for? (e.g., bottle, tumbler)".to_string(),
        Intent::Chitchat => "Could you clarify your request?".to_string(),
    }
}

fn tool_reply(slots: &Slots, outcome: Option<&ToolOutcome>) -> String {
    match outcome {
        Some(ToolOutcome::Error(error)) => {
            format!("{error}. Could you rephrase or provide the correct info?")
        }
        Some(ToolOutcome::Result(ToolResult::Calculator(result))) => calculator_reply(result),
        Some(ToolOutcome::Result(ToolResult::Products(result))) => products_reply(result),
        Some(ToolOutcome::Result(ToolResult::Outlets(result))) => outlets_reply(result, slots),
        None => TOOL_UNAVAILABLE.to_string(),
    }
}

fn calculator_reply(result: &CalculatorResult) -> String {
    format!("The answer to {} is {}.", result.expr, result.result)
}

fn products_reply(result: &ProductsResult) -> String {
    if let Some(summary) = result.summary.as_deref().filter(|summary| !summary.trim().is_empty()) {
        return summary.to_string();
    }
    if result.items.is_empty() {
        return NO_PRODUCTS.to_string();
    }

    let lines = result.items.iter().take(MAX_PRODUCT_LINES).map(product_line).collect::<Vec<_>>();
    format!("Here are some options:\n{}\n{PRODUCT_REFINE}", lines.join("\n"))
}

fn product_line(item: &ProductItem) -> String {
    let mut line = format!("- {}", item.title.as_deref().unwrap_or("Unknown item"));
    if let Some(price) = item.price {
        line.push_str(&format!(" ({})", format_ringgit(price)));
    }
    if let Some(url) = item.url.as_deref().filter(|url| !url.is_empty()) {
        line.push_str(&format!(" \u{2014} {url}"));
    }
    line
}

fn outlets_reply(result: &OutletsResult, slots: &Slots) -> String {
    let outlet = result.outlet.as_deref().or(slots.get(SlotKey::Outlet)).unwrap_or_default();
    let city = result.city.as_deref().or(slots.get(SlotKey::City)).unwrap_or_default();
    let hours = if result.hours.is_empty() { "Hours unavailable" } else { result.hours.as_str() };
    format!("{outlet} in {city}: {hours}.").trim().to_string()
}

fn reply_messages(plan: &Plan, slots: &Slots, outcome: Option<&ToolOutcome>) -> Vec<Message> {
    let context = json!({
        "intent": plan.intent,
        "next_action": plan.next_action,
        "tool": plan.tool,
        "slots": slots,
        "error": outcome.and_then(ToolOutcome::error),
    });

    vec![
        Message::system(SYSTEM_INSTRUCTION),
        Message::system(format!("Planner context: {context}")),
        Message::user(REPLY_PROMPT),
    ]
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use kopi_core::calculator::Number;
    use kopi_core::domain::message::Role;
    use kopi_core::domain::slots::{SlotKey, Slots};
    use kopi_core::domain::tool::{
        CalculatorResult, OutletsResult, ProductItem, ProductsResult, ToolOutcome, ToolResult,
    };
    use kopi_core::domain::turn::{Intent, NextAction, ToolName};

    use super::{compose, finish_completion, Composition, GREETING};
    use crate::llm::LlmError;
    use crate::planner::{plan, Plan};

    fn slots(entries: &[(SlotKey, &str)]) -> Slots {
        let mut slots = Slots::default();
        for (key, value) in entries {
            slots.set(*key, *value);
        }
        slots
    }

    fn text(composition: Composition) -> String {
        match composition {
            Composition::Text(text) => text,
            Composition::Completion(_) => panic!("expected a direct reply"),
        }
    }

    fn tool_plan(intent: Intent, tool: ToolName) -> Plan {
        Plan { intent, next_action: NextAction::UseTool, tool: Some(tool) }
    }

    #[test]
    fn outlet_clarification_asks_for_city_then_outlet() {
        let empty = slots(&[]);
        assert_eq!(
            text(compose(&plan(Intent::OutletQuery, &empty), &empty, None)),
            "Which city do you mean? (e.g., Petaling Jaya)"
        );

        let with_city = slots(&[(SlotKey::City, "Ampang")]);
        let clarify = Plan { intent: Intent::OutletQuery, next_action: NextAction::AskClarify, tool: None };
        assert_eq!(text(compose(&clarify, &with_city, None)), "Which outlet in Ampang? (e.g., SS2)");

        let both = slots(&[(SlotKey::City, "Ampang"), (SlotKey::Outlet, "Ampang Point")]);
        assert_eq!(text(compose(&clarify, &both, None)), "Could you share the missing details?");
    }

    #[test]
    fn clarification_is_stable_across_replays() {
        let empty = slots(&[]);
        let first = compose(&plan(Intent::Calc, &empty), &empty, None);
        let second = compose(&plan(Intent::Calc, &empty), &empty, None);

        assert_eq!(first, second);
        assert_eq!(text(first), "Please provide a valid arithmetic expression (e.g., 12*3).");
        assert_eq!(
            text(compose(&plan(Intent::Products, &empty), &empty, None)),
            "What drinkware are you looking for? (e.g., bottle, tumbler)"
        );
    }

    #[test]
    fn tool_errors_ask_for_a_rephrase() {
        let outcome = ToolOutcome::Error("Calculator error: Division by zero.".to_string());
        let reply = text(compose(
            &tool_plan(Intent::Calc, ToolName::Calculator),
            &slots(&[(SlotKey::Expr, "1/0")]),
            Some(&outcome),
        ));

        assert_eq!(
            reply,
            "Calculator error: Division by zero.. Could you rephrase or provide the correct info?"
        );
    }

    #[test]
    fn calculator_and_outlet_replies() {
        let outcome = ToolOutcome::Result(ToolResult::Calculator(CalculatorResult {
            expr: "12*3".to_string(),
            result: Number::Int(36),
        }));
        assert_eq!(
            text(compose(&tool_plan(Intent::Calc, ToolName::Calculator), &Slots::default(), Some(&outcome))),
            "The answer to 12*3 is 36."
        );

        let outcome = ToolOutcome::Result(ToolResult::Outlets(OutletsResult {
            city: None,
            outlet: Some("SS2".to_string()),
            hours: "Opens 09:00 / Closes 21:00".to_string(),
        }));
        let known = slots(&[(SlotKey::City, "Petaling Jaya")]);
        assert_eq!(
            text(compose(&tool_plan(Intent::OutletQuery, ToolName::Outlets), &known, Some(&outcome))),
            "SS2 in Petaling Jaya: Opens 09:00 / Closes 21:00."
        );
    }

    #[test]
    fn product_listing_formats_prices_and_links() {
        let outcome = ToolOutcome::Result(ToolResult::Products(ProductsResult {
            query: "tumbler".to_string(),
            items: vec![
                ProductItem {
                    title: Some("All-Can Tumbler".to_string()),
                    price: Some(Decimal::new(12345, 1)),
                    url: Some("https://shop.example/a".to_string()),
                },
                ProductItem { title: None, price: None, url: None },
            ],
            summary: None,
        }));

        let reply = text(compose(&tool_plan(Intent::Products, ToolName::Products), &Slots::default(), Some(&outcome)));

        assert_eq!(
            reply,
            "Here are some options:\n- All-Can Tumbler (RM1,234.50) \u{2014} https://shop.example/a\n\
             - Unknown item\nWant to refine by size, insulation, or budget?"
        );
    }

    #[test]
    fn product_summary_wins_and_empty_hits_apologise() {
        let plan = tool_plan(Intent::Products, ToolName::Products);
        let summarised = ToolOutcome::Result(ToolResult::Products(ProductsResult {
            query: "bottle".to_string(),
            items: vec![],
            summary: Some("- Try the All Day Cup".to_string()),
        }));
        assert_eq!(text(compose(&plan, &Slots::default(), Some(&summarised))), "- Try the All Day Cup");

        let empty = ToolOutcome::Result(ToolResult::Products(ProductsResult {
            query: "What drinkware do you have?".to_string(),
            items: vec![],
            summary: None,
        }));
        assert!(text(compose(&plan, &Slots::default(), Some(&empty))).starts_with("I couldn't find matching drinkware."));
    }

    #[test]
    fn reply_only_hands_back_planner_context() {
        let current = slots(&[(SlotKey::City, "Ampang")]);
        let composition = compose(&plan(Intent::Chitchat, &current), &current, None);

        let Composition::Completion(messages) = composition else {
            panic!("chitchat should need a completion");
        };
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[1].content.starts_with("Planner context: {"));
        assert!(messages[1].content.contains(r#""intent":"chitchat""#));
        assert!(messages[1].content.contains(r#""city":"Ampang""#));
        assert_eq!(messages[2].role, Role::User);
    }

    #[test]
    fn completion_falls_back_to_greeting() {
        assert_eq!(finish_completion(Ok("  Hello there!  ".to_string())), "Hello there!");
        assert_eq!(finish_completion(Ok("   ".to_string())), GREETING);
        assert_eq!(finish_completion(Err(LlmError::Disabled)), GREETING);
    }
}
