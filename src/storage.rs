//! CSV-backed, read-only store of trains, timetable entries and
//! minimum-stop-time rules. The prediction engine only ever reads from it;
//! predictions live on the trains handed out, never in the store.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveTime;
use serde::Deserialize;

use crate::error::Error;
use crate::models::{MinimumStopTime, MinimumStopTimes, TimetableEntry, Train, TrainType};

/// Row of the trains document: `id,nr,type,category`
#[derive(Debug, Deserialize)]
struct TrainRecord {
    id: i64,
    nr: u32,
    #[serde(rename = "type")]
    train_type: String,
    category: Option<String>,
}

/// Row of the stop-time rules document: `seconds,train_type,loc,track`
#[derive(Debug, Deserialize)]
struct StopTimeRecord {
    seconds: u32,
    train_type: Option<String>,
    loc: Option<String>,
    track: Option<u32>,
}

pub struct TimetableStore {
    trains: Vec<Train>,
    stop_times: MinimumStopTimes,
}

impl TimetableStore {
    /// Parse the three CSV documents into a store.
    ///
    /// Timetable rows are grouped per train and sorted by `sorttime`; rows
    /// for unknown train ids are dropped.
    ///
    /// # Errors
    ///
    /// Fails on CSV errors and with [`Error::NoDefault`] when the rule set
    /// has no global fallback.
    pub fn from_csv(trains_csv: &str, timetable_csv: &str, stop_times_csv: &str) -> Result<Self, Error> {
        let mut trains = Vec::new();
        let mut reader = csv::Reader::from_reader(trains_csv.as_bytes());
        for record in reader.deserialize() {
            let record: TrainRecord = record?;
            trains.push(Train {
                id: record.id,
                nr: record.nr,
                train_type: TrainType {
                    name: record.train_type,
                    category: record.category,
                },
                timetable: Vec::new(),
            });
        }

        let by_id: HashMap<i64, usize> =
            trains.iter().enumerate().map(|(idx, t)| (t.id, idx)).collect();

        let mut reader = csv::Reader::from_reader(timetable_csv.as_bytes());
        for record in reader.deserialize() {
            let entry: TimetableEntry = record?;
            let Some(&idx) = by_id.get(&entry.train_id) else {
                log::warn!("timetable row for unknown train {}, dropping it", entry.train_id);
                continue;
            };
            trains[idx].timetable.push(entry);
        }

        for train in &mut trains {
            train.timetable.sort_by_key(|e| e.sorttime);
        }

        let mut rules = Vec::new();
        let mut reader = csv::Reader::from_reader(stop_times_csv.as_bytes());
        for record in reader.deserialize() {
            let record: StopTimeRecord = record?;
            rules.push(MinimumStopTime {
                seconds: record.seconds,
                train_type: record.train_type,
                loc: record.loc,
                track: record.track,
            });
        }

        Ok(Self {
            trains,
            stop_times: MinimumStopTimes::new(rules)?,
        })
    }

    /// Read the three CSV documents from disk.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors and like [`TimetableStore::from_csv`].
    pub fn from_files(
        trains_path: &Path,
        timetable_path: &Path,
        stop_times_path: &Path,
    ) -> Result<Self, Error> {
        Self::from_csv(
            &std::fs::read_to_string(trains_path)?,
            &std::fs::read_to_string(timetable_path)?,
            &std::fs::read_to_string(stop_times_path)?,
        )
    }

    /// An empty store with only the built-in default dwell rule
    #[must_use]
    pub fn empty() -> Self {
        Self {
            trains: Vec::new(),
            stop_times: MinimumStopTimes::new(vec![MinimumStopTime::new(45, None, None, None)])
                .unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn trains(&self) -> &[Train] {
        &self.trains
    }

    #[must_use]
    pub fn train(&self, id: i64) -> Option<&Train> {
        self.trains.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn stop_times(&self) -> &MinimumStopTimes {
        &self.stop_times
    }

    /// Ids of trains with at least one timetable entry sorted into
    /// `[start, end]`
    #[must_use]
    pub fn train_ids_within_timeframe(&self, start: NaiveTime, end: NaiveTime) -> Vec<i64> {
        self.trains
            .iter()
            .filter(|t| t.timetable.iter().any(|e| e.sorttime >= start && e.sorttime <= end))
            .map(|t| t.id)
            .collect()
    }

    /// Cloned trains for [`TimetableStore::train_ids_within_timeframe`],
    /// ready to have predictions written into them
    #[must_use]
    pub fn trains_within_timeframe(&self, start: NaiveTime, end: NaiveTime) -> Vec<Train> {
        self.trains
            .iter()
            .filter(|t| t.timetable.iter().any(|e| e.sorttime >= start && e.sorttime <= end))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRAINS_CSV: &str = "\
id,nr,type,category
1,700,ICE,fv
3,2342,RE,nv
";

    const TIMETABLE_CSV: &str = "\
train_id,loc,sorttime,arr_plan,dep_plan,track_plan,arr_want,dep_want,track_want,arr_real,dep_real,track_real,min_ridetime,min_stoptime
1,XLG,15:34:00,15:34:00,15:34:00,1,15:34:00,15:34:00,1,,,,,
1,XWF,15:30:00,,15:30:00,1,,15:30:00,1,,,,,
1,XBG,15:36:00,15:35:00,15:36:00,1,15:35:00,15:36:00,1,,,,,120
1,XDE,15:39:00,15:39:00,,1,15:39:00,,1,,,,,
3,XPN,16:21:00,,16:21:00,2,,16:21:00,2,,,,,
3,XLG,16:23:00,16:23:00,16:23:00,1,16:23:00,16:23:00,1,,,,,
";

    const STOP_TIMES_CSV: &str = "\
seconds,train_type,loc,track
45,,,
200,ICE,,
100,,XPN,
";

    fn store() -> TimetableStore {
        TimetableStore::from_csv(TRAINS_CSV, TIMETABLE_CSV, STOP_TIMES_CSV).expect("valid fixture")
    }

    fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).expect("valid time")
    }

    #[test]
    fn test_trains_are_loaded_with_sorted_timetables() {
        let store = store();
        assert_eq!(store.trains().len(), 2);

        let train = store.train(1).expect("train 1 exists");
        assert_eq!(train.nr, 700);
        assert_eq!(train.train_type.name, "ICE");
        assert_eq!(train.train_type.category.as_deref(), Some("fv"));

        // rows arrive unordered; the store sorts by sorttime
        let locs: Vec<&str> = train.timetable.iter().map(|e| e.loc.as_str()).collect();
        assert_eq!(locs, vec!["XWF", "XLG", "XBG", "XDE"]);
    }

    #[test]
    fn test_optional_fields_survive_the_round_trip() {
        let store = store();
        let train = store.train(1).expect("train 1 exists");

        assert_eq!(train.timetable[0].arr_want, None);
        assert_eq!(train.timetable[0].dep_want, Some(hms(15, 30, 0)));
        assert_eq!(train.timetable[0].track_want, Some(1));
        assert_eq!(train.timetable[2].min_stoptime, Some(120));
        assert_eq!(train.timetable[2].min_ridetime, None);
    }

    #[test]
    fn test_stop_time_rules_are_loaded() {
        let store = store();
        assert_eq!(store.stop_times().lookup("ICE", None, None), 200);
        assert_eq!(store.stop_times().lookup("RE", Some("XPN"), None), 100);
        assert_eq!(store.stop_times().lookup("RE", Some("XDE"), None), 45);
    }

    #[test]
    fn test_rules_without_global_default_fail() {
        let result = TimetableStore::from_csv(TRAINS_CSV, TIMETABLE_CSV, "seconds,train_type,loc,track\n200,ICE,,\n");
        assert!(matches!(result, Err(Error::NoDefault)));
    }

    #[test]
    fn test_timeframe_selection() {
        let store = store();
        assert_eq!(store.train_ids_within_timeframe(hms(15, 40, 0), hms(16, 0, 0)), Vec::<i64>::new());
        assert_eq!(store.train_ids_within_timeframe(hms(15, 35, 0), hms(16, 0, 0)), vec![1]);
        assert_eq!(store.train_ids_within_timeframe(hms(15, 35, 0), hms(16, 21, 0)), vec![1, 3]);

        let trains = store.trains_within_timeframe(hms(16, 0, 0), hms(16, 30, 0));
        assert_eq!(trains.len(), 1);
        assert_eq!(trains[0].id, 3);
    }
}
