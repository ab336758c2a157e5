use chrono::{Duration, NaiveTime};

use crate::error::Error;
use crate::models::{MinimumStopTimes, TimetableEntry, Train};
use crate::predict::types::{Action, Location, Response};
use crate::time::{timeadd, timediff};

/// One train's prediction trajectory across its timetable.
///
/// The journey walks the timetable location by location as an explicit state
/// machine: each [`Journey::step`] yields the next [`Action`] the train
/// wants to carry out, and consumes the dispatcher's [`Response`] to the
/// previous one. Predicted times are written back into the train's
/// timetable entries as they are computed.
pub struct Journey<'a> {
    train_id: i64,
    train_type: String,
    timetable: &'a mut Vec<TimetableEntry>,
    stop_times: &'a MinimumStopTimes,
    now: NaiveTime,
    travel_time_ratio: f64,
    /// Cursor into the timetable; starts at the last entry with an observed
    /// event
    position: usize,
    phase: Phase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    AwaitArrive,
    AwaitRide { historical: bool },
    Done,
}

impl<'a> Journey<'a> {
    /// Set up the journey: clear stale predictions and find the resume
    /// position.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::DegenerateTimetable`] when the train has no
    /// timetable entries at all.
    pub fn new(
        train: &'a mut Train,
        now: NaiveTime,
        travel_time_ratio: f64,
        stop_times: &'a MinimumStopTimes,
    ) -> Result<Self, Error> {
        if train.timetable.is_empty() {
            return Err(Error::DegenerateTimetable {
                train_id: train.id,
                reason: "empty timetable".to_string(),
            });
        }

        // Predictions are derived from *_want and *_real only; whatever a
        // previous run left behind must not leak into this one.
        for entry in &mut train.timetable {
            entry.clear_predictions();
        }

        let position = train
            .timetable
            .iter()
            .rposition(TimetableEntry::has_real_event)
            .unwrap_or(0);

        Ok(Self {
            train_id: train.id,
            train_type: train.train_type.name.clone(),
            timetable: &mut train.timetable,
            stop_times,
            now,
            travel_time_ratio,
            position,
            phase: Phase::Start,
        })
    }

    #[must_use]
    pub fn train_id(&self) -> i64 {
        self.train_id
    }

    /// Advance the state machine.
    ///
    /// The first call must pass `None`; every later call passes the
    /// dispatcher's response to the action yielded before. Returns the next
    /// action, or `None` once the journey has ended.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Protocol`] when the response does not fit the
    /// pending action (a denial of an arrival or of a ride that has already
    /// happened), and with [`Error::DegenerateTimetable`] when the timetable
    /// ends before the train does.
    pub fn step(&mut self, response: Option<Response>) -> Result<Option<Action>, Error> {
        match self.phase {
            Phase::Start => {
                if response.is_some() {
                    return Err(Error::Protocol("response before any action".to_string()));
                }
                self.enter_position()
            }
            Phase::AwaitArrive => match response {
                Some(Response::Admitted) => {
                    if self.timetable[self.position].dep_want.is_none() {
                        // the train ends here
                        self.phase = Phase::Done;
                        Ok(None)
                    } else {
                        self.ride_action()
                    }
                }
                other => Err(Error::Protocol(format!(
                    "train {}: expected admission of an arrival, got {other:?}",
                    self.train_id
                ))),
            },
            Phase::AwaitRide { historical } => match response {
                Some(Response::Admitted) => {
                    self.position += 1;
                    self.enter_position()
                }
                Some(Response::NotFree { expected_release_time }) if !historical => {
                    let entry = &mut self.timetable[self.position];
                    log::debug!(
                        "train {}: departure from {} at {:?} blocked until {expected_release_time}",
                        self.train_id,
                        entry.loc,
                        entry.dep_pred
                    );
                    entry.dep_pred = Some(expected_release_time);
                    Ok(Some(self.build_ride(expected_release_time)))
                }
                other => Err(Error::Protocol(format!(
                    "train {}: expected admission of a ride that already happened, got {other:?}",
                    self.train_id
                ))),
            },
            Phase::Done => Ok(None),
        }
    }

    /// Start handling the entry under the cursor: the arrival phase, or
    /// directly the ride phase at the very first entry.
    fn enter_position(&mut self) -> Result<Option<Action>, Error> {
        if self.position >= self.timetable.len() {
            self.phase = Phase::Done;
            return Ok(None);
        }
        if self.position == 0 {
            return self.ride_action();
        }

        let entry = &self.timetable[self.position];
        let action = if let Some(arr) = entry.arr_real {
            // already happened, but the dispatcher still has to mark the
            // track as occupied
            Action::Arrive {
                time: arr,
                at: Location::new(&entry.loc, entry.track_real),
            }
        } else {
            let arr = self.earliest_arrival()?;
            let entry = &mut self.timetable[self.position];
            entry.arr_pred = Some(arr);
            Action::Arrive {
                time: arr,
                at: Location::new(&entry.loc, entry.track_want),
            }
        };

        self.phase = Phase::AwaitArrive;
        Ok(Some(action))
    }

    /// Propose the ride to the next location, or end the journey at the
    /// last entry.
    fn ride_action(&mut self) -> Result<Option<Action>, Error> {
        if self.timetable.get(self.position + 1).is_none() {
            if self.position == 0 {
                return Err(Error::DegenerateTimetable {
                    train_id: self.train_id,
                    reason: "fewer than two stops".to_string(),
                });
            }
            self.phase = Phase::Done;
            return Ok(None);
        }

        let dep = if let Some(dep) = self.timetable[self.position].dep_real {
            self.phase = Phase::AwaitRide { historical: true };
            dep
        } else {
            let dep = self.earliest_departure()?;
            self.timetable[self.position].dep_pred = Some(dep);
            self.phase = Phase::AwaitRide { historical: false };
            dep
        };

        Ok(Some(self.build_ride(dep)))
    }

    fn build_ride(&self, time: NaiveTime) -> Action {
        let entry = &self.timetable[self.position];
        let next = &self.timetable[self.position + 1];
        let succ = self
            .timetable
            .get(self.position + 2)
            .map(|e| Location::new(&e.loc, e.track_want));

        Action::Ride {
            time,
            start: Location::new(&entry.loc, entry.track_want),
            end: Location::new(&next.loc, next.track_want),
            succ,
        }
    }

    /// Earliest arrival at the entry under the cursor: departure at the
    /// previous location plus the ride time, but never before `now`.
    ///
    /// An on-time departure assumes the planned ride time; a delayed one may
    /// catch up down to the minimum ride time.
    fn earliest_arrival(&self) -> Result<NaiveTime, Error> {
        let prev = &self.timetable[self.position - 1];
        let cur = &self.timetable[self.position];

        let last_dep = prev.dep_real.or(prev.dep_pred).ok_or_else(|| {
            Error::Protocol(format!(
                "train {}: arriving at {} with no departure known for {}",
                self.train_id, cur.loc, prev.loc
            ))
        })?;
        let dep_want = prev.dep_want.ok_or_else(|| {
            Error::Protocol(format!(
                "train {}: rode away from {} which has no scheduled departure",
                self.train_id, prev.loc
            ))
        })?;
        let arr_want = cur.arr_want.ok_or_else(|| {
            Error::Protocol(format!(
                "train {}: intermediate stop {} has no scheduled arrival",
                self.train_id, cur.loc
            ))
        })?;

        let ride = if last_dep <= dep_want {
            timediff(arr_want, dep_want)?
        } else if let Some(seconds) = prev.min_ridetime {
            Duration::seconds(i64::from(seconds))
        } else {
            shortened_ride(timediff(arr_want, dep_want)?, self.travel_time_ratio)
        };

        Ok(self.now.max(timeadd(last_dep, ride)?))
    }

    /// Earliest departure from the entry under the cursor: arrival plus the
    /// minimum dwell, but never before the scheduled departure or `now`.
    fn earliest_departure(&self) -> Result<NaiveTime, Error> {
        let entry = &self.timetable[self.position];
        let dep_want = entry.dep_want.ok_or_else(|| Error::DegenerateTimetable {
            train_id: self.train_id,
            reason: format!("first stop {} has no scheduled departure", entry.loc),
        })?;

        let Some(arr_want) = entry.arr_want else {
            // the train's first stop: only the schedule constrains it
            debug_assert!(entry.arr_real.is_none());
            return Ok(self.now.max(dep_want));
        };

        let arr = entry.arr_real.or(entry.arr_pred).ok_or_else(|| {
            Error::Protocol(format!(
                "train {}: departing {} with no arrival known",
                self.train_id, entry.loc
            ))
        })?;

        let min_stop = match entry.min_stoptime {
            Some(seconds) => Duration::seconds(i64::from(seconds)),
            None => Duration::seconds(i64::from(self.stop_times.lookup(
                &self.train_type,
                Some(&entry.loc),
                entry.track_real.or(entry.track_want),
            ))),
        };
        // never dwell longer than the schedule plans to
        let min_stop = min_stop.min(timediff(dep_want, arr_want)?);

        Ok(self.now.max(dep_want).max(timeadd(arr, min_stop)?))
    }
}

/// Minimum ride time when a delayed train may catch up: the planned ride
/// time scaled down, rounded up to whole seconds.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn shortened_ride(planned: Duration, ratio: f64) -> Duration {
    Duration::seconds((planned.num_seconds() as f64 * ratio).ceil() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MinimumStopTime, TimetableEntry, TrainType};

    fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).expect("valid time")
    }

    fn entry(loc: &str, track: Option<u32>, arr: Option<NaiveTime>, dep: Option<NaiveTime>) -> TimetableEntry {
        TimetableEntry {
            train_id: 1,
            loc: loc.to_string(),
            sorttime: arr.or(dep).expect("entry needs a time"),
            arr_want: arr,
            dep_want: dep,
            track_want: track,
            ..TimetableEntry::default()
        }
    }

    fn test_train(entries: Vec<TimetableEntry>) -> Train {
        Train {
            id: 1,
            nr: 102,
            train_type: TrainType::new("ICE"),
            timetable: entries,
        }
    }

    fn global_stop_times() -> MinimumStopTimes {
        MinimumStopTimes::new(vec![MinimumStopTime::new(45, None, None, None)])
            .expect("has global rule")
    }

    fn two_stop_train() -> Train {
        test_train(vec![
            entry("XWF", Some(1), None, Some(hms(15, 30, 0))),
            entry("XLG", Some(1), Some(hms(15, 34, 0)), None),
        ])
    }

    #[test]
    fn test_yields_ride_then_arrive_then_ends() {
        let stop_times = global_stop_times();
        let mut train = two_stop_train();
        let mut journey = Journey::new(&mut train, hms(15, 29, 0), 0.9, &stop_times)
            .expect("valid journey");

        let first = journey.step(None).expect("first step").expect("an action");
        assert_eq!(
            first,
            Action::Ride {
                time: hms(15, 30, 0),
                start: Location::new("XWF", Some(1)),
                end: Location::new("XLG", Some(1)),
                succ: None,
            }
        );

        let second = journey
            .step(Some(Response::Admitted))
            .expect("second step")
            .expect("an action");
        assert_eq!(
            second,
            Action::Arrive { time: hms(15, 34, 0), at: Location::new("XLG", Some(1)) }
        );

        let end = journey.step(Some(Response::Admitted)).expect("third step");
        assert_eq!(end, None);

        assert_eq!(train.timetable[0].dep_pred, Some(hms(15, 30, 0)));
        assert_eq!(train.timetable[1].arr_pred, Some(hms(15, 34, 0)));
        assert_eq!(train.timetable[1].dep_pred, None);
    }

    #[test]
    fn test_denied_ride_is_retried_later() {
        let stop_times = global_stop_times();
        let mut train = two_stop_train();
        let mut journey = Journey::new(&mut train, hms(15, 29, 0), 0.9, &stop_times)
            .expect("valid journey");

        let first = journey.step(None).expect("first step").expect("an action");
        assert_eq!(first.time(), hms(15, 30, 0));

        let retry = journey
            .step(Some(Response::NotFree { expected_release_time: hms(15, 31, 10) }))
            .expect("retry step")
            .expect("an action");
        assert_eq!(retry.time(), hms(15, 31, 10));

        let retry = journey
            .step(Some(Response::NotFree { expected_release_time: hms(15, 32, 0) }))
            .expect("retry step")
            .expect("an action");
        assert_eq!(retry.time(), hms(15, 32, 0));

        let arrive = journey
            .step(Some(Response::Admitted))
            .expect("after admission")
            .expect("an action");
        assert!(matches!(arrive, Action::Arrive { .. }));

        // the retries moved the departure prediction along
        assert_eq!(train.timetable[0].dep_pred, Some(hms(15, 32, 0)));
    }

    #[test]
    fn test_denied_arrival_is_a_protocol_error() {
        let stop_times = global_stop_times();
        let mut train = two_stop_train();
        let mut journey = Journey::new(&mut train, hms(15, 29, 0), 0.9, &stop_times)
            .expect("valid journey");

        journey.step(None).expect("first step");
        let result = journey.step(Some(Response::NotFree {
            expected_release_time: hms(15, 40, 0),
        }));
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn test_denied_historical_ride_is_a_protocol_error() {
        let stop_times = global_stop_times();
        let mut train = two_stop_train();
        train.timetable[0].dep_real = Some(hms(15, 32, 0));
        let mut journey = Journey::new(&mut train, hms(15, 33, 0), 0.9, &stop_times)
            .expect("valid journey");

        let first = journey.step(None).expect("first step").expect("an action");
        assert_eq!(first.time(), hms(15, 32, 0));

        let result = journey.step(Some(Response::NotFree {
            expected_release_time: hms(15, 40, 0),
        }));
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn test_empty_timetable_is_degenerate() {
        let stop_times = global_stop_times();
        let mut train = test_train(vec![]);
        let result = Journey::new(&mut train, hms(15, 0, 0), 0.9, &stop_times);
        assert!(matches!(result, Err(Error::DegenerateTimetable { .. })));
    }

    #[test]
    fn test_single_stop_timetable_is_degenerate() {
        let stop_times = global_stop_times();
        let mut train = test_train(vec![entry("XWF", Some(1), None, Some(hms(15, 30, 0)))]);
        let mut journey = Journey::new(&mut train, hms(15, 0, 0), 0.9, &stop_times)
            .expect("construction succeeds");
        let result = journey.step(None);
        assert!(matches!(result, Err(Error::DegenerateTimetable { .. })));
    }

    #[test]
    fn test_stale_predictions_are_cleared() {
        let stop_times = global_stop_times();
        let mut train = two_stop_train();
        train.timetable[0].dep_pred = Some(hms(9, 0, 0));
        train.timetable[1].arr_pred = Some(hms(9, 10, 0));

        let _journey = Journey::new(&mut train, hms(15, 29, 0), 0.9, &stop_times)
            .expect("valid journey");
        assert_eq!(train.timetable[0].dep_pred, None);
        assert_eq!(train.timetable[1].arr_pred, None);
    }

    #[test]
    fn test_resumes_at_last_observed_entry() {
        let stop_times = global_stop_times();
        let mut train = test_train(vec![
            entry("XWF", Some(1), None, Some(hms(15, 30, 0))),
            entry("XLG", Some(1), Some(hms(15, 34, 0)), Some(hms(15, 34, 0))),
            entry("XBG", Some(1), Some(hms(15, 35, 0)), Some(hms(15, 36, 0))),
            entry("XDE", Some(1), Some(hms(15, 39, 0)), None),
        ]);
        train.timetable[0].dep_real = Some(hms(15, 30, 0));
        train.timetable[1].arr_real = Some(hms(15, 34, 30));
        train.timetable[1].track_real = Some(2);

        let mut journey = Journey::new(&mut train, hms(15, 35, 0), 0.9, &stop_times)
            .expect("valid journey");

        // the first action replays the observed arrival, on the track the
        // train was actually seen on
        let first = journey.step(None).expect("first step").expect("an action");
        assert_eq!(
            first,
            Action::Arrive { time: hms(15, 34, 30), at: Location::new("XLG", Some(2)) }
        );
    }

    #[test]
    fn test_actions_are_monotonic_in_time() {
        let stop_times = global_stop_times();
        let mut train = test_train(vec![
            entry("XWF", Some(1), None, Some(hms(15, 30, 0))),
            entry("XLG", Some(1), Some(hms(15, 34, 0)), Some(hms(15, 34, 0))),
            entry("XBG", Some(1), Some(hms(15, 35, 0)), Some(hms(15, 36, 0))),
            entry("XDE", Some(1), Some(hms(15, 39, 0)), None),
        ]);
        let mut journey = Journey::new(&mut train, hms(15, 31, 0), 0.9, &stop_times)
            .expect("valid journey");

        let mut times = Vec::new();
        let mut action = journey.step(None).expect("first step");
        while let Some(current) = action {
            times.push(current.time());
            action = journey.step(Some(Response::Admitted)).expect("step");
        }

        assert!(times.windows(2).all(|w| w[0] <= w[1]), "actions went backwards: {times:?}");
    }

    #[test]
    fn test_per_entry_overrides_beat_the_rule_table() {
        let stop_times = global_stop_times();
        let mut train = test_train(vec![
            entry("XWF", Some(1), None, Some(hms(15, 30, 0))),
            entry("XBG", Some(1), Some(hms(15, 40, 0)), Some(hms(15, 42, 0))),
            entry("XDE", Some(1), Some(hms(15, 50, 0)), None),
        ]);
        // delayed start; overrides shorter than both rule table and ratio
        train.timetable[0].min_ridetime = Some(300);
        train.timetable[1].min_stoptime = Some(10);

        let mut journey = Journey::new(&mut train, hms(15, 35, 0), 0.9, &stop_times)
            .expect("valid journey");

        let mut action = journey.step(None).expect("first step");
        while let Some(_current) = action {
            action = journey.step(Some(Response::Admitted)).expect("step");
        }

        // ride uses the 300 s override instead of ceil(600 * 0.9)
        assert_eq!(train.timetable[0].dep_pred, Some(hms(15, 35, 0)));
        assert_eq!(train.timetable[1].arr_pred, Some(hms(15, 40, 0)));
        // dwell uses the 10 s override instead of the 45 s rule
        assert_eq!(train.timetable[1].dep_pred, Some(hms(15, 42, 0)));
    }
}
