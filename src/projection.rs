//! Projection of predicted trains into the shape the time-graph frontend
//! consumes: per-line segments of consecutive locations, tagged with the
//! travel direction.

use chrono::NaiveTime;
use serde::Serialize;

use crate::models::{Line, TimetableEntry, Train};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryInfo {
    /// Element id on the line (`CODE#variant`)
    pub loc: String,
    pub arr_plan: Option<NaiveTime>,
    pub dep_plan: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arr_pred: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dep_pred: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_plan: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentInfo {
    pub direction: Direction,
    pub timetable: Vec<EntryInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainInfo {
    pub id: i64,
    pub nr: u32,
    #[serde(rename = "type")]
    pub train_type: String,
    pub category: Option<String>,
    pub segments: Vec<SegmentInfo>,
    /// First and last location codes of the whole route, on the line or not
    pub start: String,
    pub end: String,
    pub transition_to: Option<i64>,
    pub transition_from: Option<i64>,
}

/// Project a train onto a line.
///
/// The train's route is cut into segments of consecutive locations that lie
/// on the line, split where the train leaves the line or reverses. Returns
/// `None` for trains that touch fewer than two of the line's locations;
/// nothing of them would be visible on the graph.
#[must_use]
pub fn project_train(train: &Train, line: &Line) -> Option<TrainInfo> {
    let first = train.timetable.first()?;
    let last = train.timetable.last()?;

    let mut segments: Vec<SegmentInfo> = Vec::new();
    let mut current: Vec<(EntryInfo, f64)> = Vec::new();
    let mut direction: Option<Direction> = None;

    for entry in &train.timetable {
        let Some((id, pos)) = locate(line, &entry.loc) else {
            flush(&mut current, direction.take(), &mut segments);
            continue;
        };

        if let Some(&(_, prev_pos)) = current.last() {
            if pos != prev_pos {
                let step = if pos > prev_pos { Direction::Right } else { Direction::Left };
                match direction {
                    None => direction = Some(step),
                    Some(d) if d != step => {
                        // the train reverses here; the turning location
                        // belongs to both segments
                        let turning = current.last().cloned();
                        flush(&mut current, Some(d), &mut segments);
                        current.extend(turning);
                        direction = Some(step);
                    }
                    Some(_) => {}
                }
            }
        }

        current.push((entry_info(entry, id), pos));
    }
    flush(&mut current, direction, &mut segments);

    if segments.is_empty() {
        return None;
    }

    Some(TrainInfo {
        id: train.id,
        nr: train.nr,
        train_type: train.train_type.name.clone(),
        category: train.train_type.category.clone(),
        segments,
        start: first.loc.clone(),
        end: last.loc.clone(),
        transition_to: None,
        transition_from: None,
    })
}

/// Project every train that is visible on the line
#[must_use]
pub fn project_trains(trains: &[Train], line: &Line) -> Vec<TrainInfo> {
    trains.iter().filter_map(|t| project_train(t, line)).collect()
}

fn locate<'l>(line: &'l Line, code: &str) -> Option<(&'l str, f64)> {
    line.locations()
        .find(|e| e.code() == Some(code))
        .map(|e| (e.id(), e.pos()))
}

fn entry_info(entry: &TimetableEntry, id: &str) -> EntryInfo {
    EntryInfo {
        loc: id.to_string(),
        arr_plan: entry.arr_plan,
        dep_plan: entry.dep_plan,
        arr_pred: entry.arr_pred,
        dep_pred: entry.dep_pred,
        track_plan: entry.track_plan,
    }
}

fn flush(
    current: &mut Vec<(EntryInfo, f64)>,
    direction: Option<Direction>,
    segments: &mut Vec<SegmentInfo>,
) {
    if current.len() < 2 {
        current.clear();
        return;
    }

    segments.push(SegmentInfo {
        // a run without any position change defaults to rightward
        direction: direction.unwrap_or(Direction::Right),
        timetable: current.drain(..).map(|(info, _)| info).collect(),
    });
}
