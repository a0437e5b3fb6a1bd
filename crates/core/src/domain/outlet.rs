use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutletRecord {
    pub outlet: String,
    pub city: String,
    pub open_time: String,
    pub close_time: String,
}

impl OutletRecord {
    pub fn hours(&self) -> String {
        format!("Opens {} / Closes {}", self.open_time, self.close_time)
    }
}
