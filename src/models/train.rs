use serde::{Deserialize, Serialize};

use crate::models::TimetableEntry;

/// Train category, used for minimum-stop-time lookup and display colouring
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrainType {
    pub name: String,
    /// Traffic category code (`nv`, `fv`, `gv`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl TrainType {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            category: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Train {
    pub id: i64,
    /// Display number
    pub nr: u32,
    pub train_type: TrainType,
    /// Timetable entries ordered by `sorttime`
    pub timetable: Vec<TimetableEntry>,
}
