use serde::{
    Deserialize,
    Serialize,
};

/// The durable marker of "largest transaction id already processed".
/// Absence in the control index is interpreted as `0` (the next fetch
/// starts at transaction `1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub last_transaction_id: i64,
}

impl Cursor {
    pub const ABSENT: Cursor = Cursor { last_transaction_id: 0 };

    pub fn new(last_transaction_id: i64) -> Self {
        Self { last_transaction_id }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::ABSENT
    }
}
