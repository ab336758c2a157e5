use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One dwell-minimum rule. A `None` field matches anything; the lookup
/// prefers the most specific rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimumStopTime {
    pub seconds: u32,
    pub train_type: Option<String>,
    pub loc: Option<String>,
    pub track: Option<u32>,
}

impl MinimumStopTime {
    #[must_use]
    pub fn new(seconds: u32, train_type: Option<&str>, loc: Option<&str>, track: Option<u32>) -> Self {
        Self {
            seconds,
            train_type: train_type.map(ToString::to_string),
            loc: loc.map(ToString::to_string),
            track,
        }
    }

    fn is_global(&self) -> bool {
        self.train_type.is_none() && self.loc.is_none() && self.track.is_none()
    }
}

/// Rule table with specificity-ordered lookup.
///
/// Specificity order: (type, loc, track) > (type, loc) > (loc, track) >
/// (loc) > (type) > global.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinimumStopTimes {
    rules: Vec<MinimumStopTime>,
}

impl MinimumStopTimes {
    /// # Errors
    ///
    /// Fails with [`Error::NoDefault`] when the rule set has no global
    /// fallback; every later lookup relies on it.
    pub fn new(rules: Vec<MinimumStopTime>) -> Result<Self, Error> {
        if !rules.iter().any(MinimumStopTime::is_global) {
            return Err(Error::NoDefault);
        }
        Ok(Self { rules })
    }

    /// Dwell minimum in seconds for a train type at a location and track
    #[must_use]
    pub fn lookup(&self, train_type: &str, loc: Option<&str>, track: Option<u32>) -> u32 {
        let find = |pred: &dyn Fn(&MinimumStopTime) -> bool| {
            self.rules.iter().find(|r| pred(r)).map(|r| r.seconds)
        };

        let type_matches = |r: &MinimumStopTime| r.train_type.as_deref() == Some(train_type);
        let loc_matches = |r: &MinimumStopTime| r.loc.as_deref() == loc && loc.is_some();
        let track_matches = |r: &MinimumStopTime| r.track == track && track.is_some();

        find(&|r| type_matches(r) && loc_matches(r) && track_matches(r))
            .or_else(|| find(&|r| type_matches(r) && loc_matches(r) && r.track.is_none()))
            .or_else(|| find(&|r| r.train_type.is_none() && loc_matches(r) && track_matches(r)))
            .or_else(|| find(&|r| r.train_type.is_none() && loc_matches(r) && r.track.is_none()))
            .or_else(|| find(&|r| type_matches(r) && r.loc.is_none() && r.track.is_none()))
            .or_else(|| find(&|r| r.is_global()))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MinimumStopTimes {
        MinimumStopTimes::new(vec![
            MinimumStopTime::new(45, None, None, None),
            MinimumStopTime::new(200, Some("IC"), None, None),
            MinimumStopTime::new(100, None, Some("XPN"), None),
            MinimumStopTime::new(101, None, Some("XPN"), Some(1)),
            MinimumStopTime::new(103, None, Some("XPN"), Some(3)),
            MinimumStopTime::new(203, Some("IC"), Some("XPN"), Some(3)),
        ])
        .expect("has global rule")
    }

    #[test]
    fn test_lookup_without_location() {
        let t = table();
        assert_eq!(t.lookup("IC", None, None), 200);
        assert_eq!(t.lookup("RE", None, None), 45);
    }

    #[test]
    fn test_lookup_location_beats_bare_type() {
        let t = table();
        assert_eq!(t.lookup("IC", Some("XPN"), None), 100);
        assert_eq!(t.lookup("RE", Some("XPN"), None), 100);
    }

    #[test]
    fn test_lookup_unmatched_track_falls_back_to_location() {
        let t = table();
        assert_eq!(t.lookup("IC", Some("XPN"), Some(2)), 100);
        assert_eq!(t.lookup("RE", Some("XPN"), Some(2)), 100);
    }

    #[test]
    fn test_lookup_track_specific() {
        let t = table();
        assert_eq!(t.lookup("IC", Some("XPN"), Some(3)), 203);
        assert_eq!(t.lookup("RE", Some("XPN"), Some(3)), 103);
        assert_eq!(t.lookup("RE", Some("XPN"), Some(1)), 101);
    }

    #[test]
    fn test_lookup_unknown_location_uses_type_then_global() {
        let t = table();
        assert_eq!(t.lookup("IC", Some("XDE"), None), 200);
        assert_eq!(t.lookup("IC", Some("XDE"), Some(1)), 200);
        assert_eq!(t.lookup("RE", Some("XDE"), None), 45);
        assert_eq!(t.lookup("RE", Some("XDE"), Some(1)), 45);
    }

    #[test]
    fn test_setup_without_global_rule_fails() {
        let result = MinimumStopTimes::new(vec![MinimumStopTime::new(200, Some("IC"), None, None)]);
        assert!(matches!(result, Err(Error::NoDefault)));
    }
}
