use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKey {
    City,
    Outlet,
    Expr,
    ProductQuery,
}

impl SlotKey {
    pub const ALL: [SlotKey; 4] = [Self::City, Self::Outlet, Self::Expr, Self::ProductQuery];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::City => "city",
            Self::Outlet => "outlet",
            Self::Expr => "expr",
            Self::ProductQuery => "product_query",
        }
    }
}

/// Structured details carried across turns of one conversation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outlet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_query: Option<String>,
}

impl Slots {
    pub fn get(&self, key: SlotKey) -> Option<&str> {
        match key {
            SlotKey::City => self.city.as_deref(),
            SlotKey::Outlet => self.outlet.as_deref(),
            SlotKey::Expr => self.expr.as_deref(),
            SlotKey::ProductQuery => self.product_query.as_deref(),
        }
    }

    pub fn set(&mut self, key: SlotKey, value: impl Into<String>) {
        *self.slot_mut(key) = Some(value.into());
    }

    pub fn remove(&mut self, key: SlotKey) -> Option<String> {
        self.slot_mut(key).take()
    }

    /// A slot holding an empty string counts as absent.
    pub fn contains(&self, key: SlotKey) -> bool {
        self.get(key).is_some_and(|value| !value.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        SlotKey::ALL.iter().all(|key| !self.contains(*key))
    }

    pub fn keys(&self) -> Vec<SlotKey> {
        SlotKey::ALL.into_iter().filter(|key| self.contains(*key)).collect()
    }

    fn slot_mut(&mut self, key: SlotKey) -> &mut Option<String> {
        match key {
            SlotKey::City => &mut self.city,
            SlotKey::Outlet => &mut self.outlet,
            SlotKey::Expr => &mut self.expr,
            SlotKey::ProductQuery => &mut self.product_query,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SlotKey, Slots};

    #[test]
    fn serializes_only_present_keys() {
        let mut slots = Slots::default();
        slots.set(SlotKey::City, "Ampang");

        let json = serde_json::to_value(&slots).expect("slots serialize");
        assert_eq!(json, serde_json::json!({ "city": "Ampang" }));
    }

    #[test]
    fn empty_values_do_not_count_as_present() {
        let mut slots = Slots::default();
        slots.set(SlotKey::Outlet, "");

        assert!(!slots.contains(SlotKey::Outlet));
        assert!(slots.is_empty());
        assert_eq!(slots.remove(SlotKey::Outlet).as_deref(), Some(""));
    }
}
