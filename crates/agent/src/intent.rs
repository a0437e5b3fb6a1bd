use std::sync::LazyLock;

use regex::Regex;

use kopi_core::domain::turn::Intent;

/// Substrings that mark a product request. They win over every other rule.
pub const PRODUCT_KEYWORDS: &[&str] = &[
    "drinkware", "bottle", "tumbler", "cup", "thermos", "insulated", "vacuum", "drink", "beverage",
];

static OUTLET_VOCABULARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\boutlet(s)?\b|\bbranch(es)?\b|\bstore(s)?\b|\blocation(s)?\b|\bopening hours?\b|\bclosing time\b|\bhours?\b",
    )
    .expect("valid outlet vocabulary regex")
});

static ARITHMETIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\s*[-+*/]\s*\d+").expect("valid arithmetic regex"));

pub fn classify(text: &str) -> Intent {
    let lower = text.to_lowercase();

    if PRODUCT_KEYWORDS.iter().any(|keyword| lower.contains(keyword)) {
        Intent::Products
    } else if OUTLET_VOCABULARY.is_match(&lower) {
        Intent::OutletQuery
    } else if ARITHMETIC.is_match(&lower) {
        Intent::Calc
    } else {
        Intent::Chitchat
    }
}

#[cfg(test)]
mod tests {
    use kopi_core::domain::turn::Intent;

    use super::classify;

    #[test]
    fn product_keyword_beats_outlet_vocabulary() {
        assert_eq!(classify("Which store sells the insulated tumbler?"), Intent::Products);
        assert_eq!(classify("Any BOTTLES at the SS2 outlet?"), Intent::Products);
    }

    #[test]
    fn outlet_vocabulary_is_word_bounded() {
        assert_eq!(classify("Show opening hours for wangsa maju"), Intent::OutletQuery);
        assert_eq!(classify("what are your hours"), Intent::OutletQuery);
        assert_eq!(classify("list the branches in PJ"), Intent::OutletQuery);
        assert_eq!(classify("restored my account"), Intent::Chitchat);
    }

    #[test]
    fn arithmetic_needs_two_integers_around_an_operator() {
        assert_eq!(classify("12*3"), Intent::Calc);
        assert_eq!(classify("what is 100 / 4"), Intent::Calc);
        assert_eq!(classify("12 apples"), Intent::Chitchat);
    }

    #[test]
    fn arithmetic_in_an_outlet_question_is_an_outlet_query() {
        assert_eq!(classify("store hours 9-5?"), Intent::OutletQuery);
    }

    #[test]
    fn everything_else_is_chitchat() {
        assert_eq!(classify("hello there"), Intent::Chitchat);
        assert_eq!(classify(""), Intent::Chitchat);
    }
}
