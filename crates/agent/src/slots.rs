//! Slot extraction from the latest utterance, merge with the carried-over
//! slots, and intent-conditioned pruning.

use std::sync::LazyLock;

use regex::Regex;

use kopi_core::domain::slots::{SlotKey, Slots};
use kopi_core::domain::turn::Intent;

static CITY_ALIASES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\bkuala\s+lumpur\b|\bkl\b", "Kuala Lumpur"),
        (r"\bpetaling\s+jaya\b|\bpj\b", "Petaling Jaya"),
        (r"\bampang\b", "Ampang"),
    ]
    .into_iter()
    .map(|(pattern, city)| (Regex::new(pattern).expect("valid city regex"), city))
    .collect()
});

static NAMED_OUTLETS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\bwangsa\s+maju\b", "Wangsa Maju"),
        (r"\bdamansara\s+perdana\b", "Damansara Perdana"),
        (r"\bbandar\s+baru\s+ampang\b", "Bandar Baru Ampang"),
    ]
    .into_iter()
    .map(|(pattern, outlet)| (Regex::new(pattern).expect("valid outlet regex"), outlet))
    .collect()
});

static LEADING_OPERAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+").expect("valid operand regex"));

static CHAINED_OPERAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-+*/]\s*-?\d+").expect("valid chained operand regex"));

static PRODUCT_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(drink|beverage)\b").expect("valid product word regex"));

const PRODUCT_SUBSTRINGS: &[&str] =
    &["drinkware", "bottle", "tumbler", "cup", "thermos", "insulated", "vacuum"];

pub fn extract_city(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    CITY_ALIASES.iter().find(|(pattern, _)| pattern.is_match(&lower)).map(|(_, city)| *city)
}

/// Every named outlet is tested; the last matching entry of the list wins.
pub fn extract_outlet(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    NAMED_OUTLETS
        .iter()
        .filter(|(pattern, _)| pattern.is_match(&lower))
        .last()
        .map(|(_, outlet)| *outlet)
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Finds the first chain of signed integers joined by `+ - * /` that is not
/// glued to word characters on either side, with whitespace removed.
pub fn extract_expr(text: &str) -> Option<String> {
    for (start, _) in text.char_indices() {
        if text[..start].chars().next_back().is_some_and(is_word_char) {
            continue;
        }

        let rest = &text[start..];
        let Some(leading) = LEADING_OPERAND.find(rest) else {
            continue;
        };

        let mut end = leading.end();
        let mut accepted = None;
        while let Some(chained) = CHAINED_OPERAND.find(&rest[end..]) {
            end += chained.end();
            if !rest[end..].chars().next().is_some_and(is_word_char) {
                accepted = Some(end);
            }
        }

        if let Some(end) = accepted {
            return Some(rest[..end].chars().filter(|ch| !ch.is_whitespace()).collect());
        }
    }

    None
}

pub fn extract_product_query(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let mentioned = PRODUCT_SUBSTRINGS.iter().any(|keyword| lower.contains(keyword))
        || PRODUCT_WORDS.is_match(&lower);
    mentioned.then(|| text.trim().to_string())
}

/// Applies what the latest text says on top of `existing`. A text without an
/// arithmetic match clears any stored expression.
pub fn merge(existing: &Slots, text: &str) -> Slots {
    let mut slots = existing.clone();

    if let Some(city) = extract_city(text) {
        slots.set(SlotKey::City, city);
    }
    if let Some(outlet) = extract_outlet(text) {
        slots.set(SlotKey::Outlet, outlet);
    }
    match extract_expr(text) {
        Some(expr) => slots.set(SlotKey::Expr, expr),
        None => {
            slots.remove(SlotKey::Expr);
        }
    }
    if let Some(query) = extract_product_query(text) {
        slots.set(SlotKey::ProductQuery, query);
    }

    slots
}

pub fn stale_keys(intent: Intent) -> &'static [SlotKey] {
    match intent {
        Intent::Products => &[SlotKey::Expr, SlotKey::City, SlotKey::Outlet],
        Intent::OutletQuery => &[SlotKey::Expr, SlotKey::ProductQuery],
        Intent::Calc => &[SlotKey::ProductQuery, SlotKey::City, SlotKey::Outlet],
        Intent::Chitchat => &[],
    }
}

pub fn prune(mut slots: Slots, intent: Intent) -> Slots {
    for key in stale_keys(intent) {
        slots.remove(*key);
    }
    slots
}

/// Merge first, then prune, so the keys an intent drops never survive the turn.
pub fn update(existing: &Slots, text: &str, intent: Intent) -> Slots {
    prune(merge(existing, text), intent)
}

#[cfg(test)]
mod tests {
    use kopi_core::domain::slots::{SlotKey, Slots};
    use kopi_core::domain::turn::Intent;

    use super::{extract_city, extract_expr, extract_outlet, extract_product_query, merge, update};

    #[test]
    fn city_aliases_resolve_in_table_order() {
        assert_eq!(extract_city("outlets in KL please"), Some("Kuala Lumpur"));
        assert_eq!(extract_city("Petaling   Jaya stores"), Some("Petaling Jaya"));
        assert_eq!(extract_city("pj or ampang?"), Some("Petaling Jaya"));
        assert_eq!(extract_city("klang"), None);
    }

    #[test]
    fn last_listed_outlet_wins_when_several_match() {
        assert_eq!(extract_outlet("wangsa maju"), Some("Wangsa Maju"));
        assert_eq!(
            extract_outlet("bandar baru ampang or wangsa maju or damansara perdana"),
            Some("Bandar Baru Ampang")
        );
        assert_eq!(extract_outlet("Wangsa Maju and Damansara Perdana"), Some("Damansara Perdana"));
    }

    #[test]
    fn expr_is_stripped_of_whitespace() {
        assert_eq!(extract_expr("12*3").as_deref(), Some("12*3"));
        assert_eq!(extract_expr("what is 12 * 3 + 4?").as_deref(), Some("12*3+4"));
        assert_eq!(extract_expr("-5 - -2").as_deref(), Some("-5--2"));
    }

    #[test]
    fn expr_must_not_touch_word_characters() {
        assert_eq!(extract_expr("abc12*3"), None);
        assert_eq!(extract_expr("3+4*5x").as_deref(), Some("3+4"));
        assert_eq!(extract_expr("no numbers here"), None);
        assert_eq!(extract_expr("just 42"), None);
    }

    #[test]
    fn product_query_uses_substrings_and_whole_words() {
        assert_eq!(
            extract_product_query("  What drinkware do you have?  ").as_deref(),
            Some("What drinkware do you have?")
        );
        assert_eq!(extract_product_query("a cold drink").as_deref(), Some("a cold drink"));
        assert_eq!(extract_product_query("drinking straws"), None);
    }

    #[test]
    fn merge_overwrites_city_and_clears_expr() {
        let mut existing = Slots::default();
        existing.set(SlotKey::City, "Kuala Lumpur");
        existing.set(SlotKey::Expr, "1+1");

        let merged = merge(&existing, "actually in PJ");

        assert_eq!(merged.get(SlotKey::City), Some("Petaling Jaya"));
        assert!(!merged.contains(SlotKey::Expr));
        assert_eq!(existing.get(SlotKey::City), Some("Kuala Lumpur"));
    }

    #[test]
    fn calc_turn_never_keeps_location_or_product_slots() {
        let mut existing = Slots::default();
        existing.set(SlotKey::City, "Ampang");
        existing.set(SlotKey::Outlet, "Bandar Baru Ampang");
        existing.set(SlotKey::ProductQuery, "bottle");

        let updated = update(&existing, "12*3", Intent::Calc);

        assert_eq!(updated.keys(), vec![SlotKey::Expr]);
        assert_eq!(updated.get(SlotKey::Expr), Some("12*3"));
    }

    #[test]
    fn outlet_turn_drops_expr_and_product_query() {
        let mut existing = Slots::default();
        existing.set(SlotKey::ProductQuery, "tumbler");

        let updated = update(&existing, "Show opening hours for wangsa maju in Kuala Lumpur", Intent::OutletQuery);

        assert_eq!(updated.get(SlotKey::City), Some("Kuala Lumpur"));
        assert_eq!(updated.get(SlotKey::Outlet), Some("Wangsa Maju"));
        assert!(!updated.contains(SlotKey::ProductQuery));
        assert!(!updated.contains(SlotKey::Expr));
    }

    #[test]
    fn chitchat_keeps_everything_it_merged() {
        let mut existing = Slots::default();
        existing.set(SlotKey::City, "Ampang");

        let updated = update(&existing, "thanks!", Intent::Chitchat);

        assert_eq!(updated.get(SlotKey::City), Some("Ampang"));
    }
}
