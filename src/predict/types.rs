//! Action/response protocol between journeys and the dispatcher.

use std::fmt;

use chrono::NaiveTime;

/// A location code plus the (nullable) track within it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub code: String,
    pub track: Option<u32>,
}

impl Location {
    #[must_use]
    pub fn new(code: &str, track: Option<u32>) -> Self {
        Self {
            code: code.to_string(),
            track,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.track {
            Some(track) => write!(f, "{}[{track}]", self.code),
            None => write!(f, "{}[-]", self.code),
        }
    }
}

/// A request a journey wants the dispatcher to admit.
///
/// `time` is when the journey wishes to carry the action out; for actions
/// that already happened it is the observed time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Arrive at a location, occupying its track and releasing whatever the
    /// preceding ride held
    Arrive { time: NaiveTime, at: Location },
    /// Ride from `start` to `end`, occupying both ends and the line between
    /// them. `succ` is the location after `end` where known; it is carried
    /// for routing context only.
    Ride {
        time: NaiveTime,
        start: Location,
        end: Location,
        succ: Option<Location>,
    },
}

impl Action {
    #[must_use]
    pub fn time(&self) -> NaiveTime {
        match self {
            Action::Arrive { time, .. } | Action::Ride { time, .. } => *time,
        }
    }

    /// The track elements that must be free (or already ours) before this
    /// action can be admitted
    #[must_use]
    pub fn required_elements(&self) -> Vec<ResourceKey> {
        match self {
            Action::Arrive { at, .. } => vec![ResourceKey::point(at)],
            Action::Ride { start, end, .. } => vec![
                ResourceKey::point(start),
                ResourceKey::Segment {
                    from: start.code.clone(),
                    to: end.code.clone(),
                },
                ResourceKey::point(end),
            ],
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Arrive { time, at } => write!(f, "arrive {time} at {at}"),
            Action::Ride { time, start, end, .. } => {
                write!(f, "ride {time} from {start} to {end}")
            }
        }
    }
}

/// The dispatcher's verdict on a proposed action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// The action may be carried out as requested
    Admitted,
    /// The required track elements are in use; retry no earlier than
    /// `expected_release_time`
    NotFree { expected_release_time: NaiveTime },
}

/// Identifier of a mutually-exclusive track-level entity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    /// A (possibly tracked) point at a location: movement endpoints and
    /// arrival targets
    Point { loc: String, track: Option<u32> },
    /// The trackage between two adjacent locations
    Segment { from: String, to: String },
}

impl ResourceKey {
    #[must_use]
    pub fn point(at: &Location) -> Self {
        ResourceKey::Point {
            loc: at.code.clone(),
            track: at.track,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::Point { loc, track: Some(track) } => write!(f, "point {loc}[{track}]"),
            ResourceKey::Point { loc, track: None } => write!(f, "point {loc}[-]"),
            ResourceKey::Segment { from, to } => write!(f, "line {from}-{to}"),
        }
    }
}

/// Which journey holds a track element, and when it expects to let go
#[derive(Debug, Clone)]
pub struct Occupancy {
    pub journey: usize,
    pub expected_release_time: Option<NaiveTime>,
}
