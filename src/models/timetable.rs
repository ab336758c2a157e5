use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// One visit of a train at a location.
///
/// Three parallel (arrival, departure, track) triples: `*_plan` is the
/// published schedule, `*_want` the effective schedule including session
/// edits, `*_real` the observed events. `*_pred` is the output channel of
/// the prediction engine and is recomputed on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub train_id: i64,
    pub loc: String,
    /// Ordering key within the train's timetable, independent of the
    /// arrival/departure fields
    pub sorttime: NaiveTime,

    pub arr_plan: Option<NaiveTime>,
    pub dep_plan: Option<NaiveTime>,
    pub track_plan: Option<u32>,

    pub arr_want: Option<NaiveTime>,
    pub dep_want: Option<NaiveTime>,
    pub track_want: Option<u32>,

    pub arr_real: Option<NaiveTime>,
    pub dep_real: Option<NaiveTime>,
    pub track_real: Option<u32>,

    #[serde(default)]
    pub arr_pred: Option<NaiveTime>,
    #[serde(default)]
    pub dep_pred: Option<NaiveTime>,

    /// Minimum ride time to the next stop, in seconds
    pub min_ridetime: Option<u32>,
    /// Minimum dwell at this stop, in seconds
    pub min_stoptime: Option<u32>,
}

impl Default for TimetableEntry {
    fn default() -> Self {
        Self {
            train_id: 0,
            loc: String::new(),
            sorttime: NaiveTime::MIN,
            arr_plan: None,
            dep_plan: None,
            track_plan: None,
            arr_want: None,
            dep_want: None,
            track_want: None,
            arr_real: None,
            dep_real: None,
            track_real: None,
            arr_pred: None,
            dep_pred: None,
            min_ridetime: None,
            min_stoptime: None,
        }
    }
}

impl TimetableEntry {
    /// Whether the train has already been observed at this entry
    #[must_use]
    pub fn has_real_event(&self) -> bool {
        self.arr_real.is_some() || self.dep_real.is_some()
    }

    pub fn clear_predictions(&mut self) {
        self.arr_pred = None;
        self.dep_pred = None;
    }
}
