//! The prediction engine: journeys propose arrivals and rides, the manager
//! arbitrates them over a shared occupancy table in simulated-time order.

mod journey;
mod types;

pub use journey::Journey;
pub use types::{Action, Location, Occupancy, Response, ResourceKey};

use chrono::{Duration, NaiveTime};
use indexmap::IndexMap;

use crate::config::Config;
use crate::constants::RELEASE_MARGIN;
use crate::error::Error;
use crate::models::{MinimumStopTimes, Train};
use crate::storage::TimetableStore;
use crate::time::timeadd;

/// Earliest-action-first scheduler over a set of journeys.
///
/// The manager owns the occupancy table. Journeys never touch it: they
/// propose actions, the manager admits or denies them, and an admitted
/// action atomically occupies what it needs and releases what its journey
/// no longer holds.
pub struct Manager<'a> {
    journeys: Vec<Journey<'a>>,
    elements: IndexMap<ResourceKey, Occupancy>,
}

struct QueueEntry {
    journey: usize,
    next_action: Action,
}

impl<'a> Manager<'a> {
    /// One journey per train, sharing one occupancy table.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::DegenerateTimetable`] when any train has an empty
    /// timetable.
    pub fn from_trains(
        trains: &'a mut [Train],
        now: NaiveTime,
        config: &Config,
        stop_times: &'a MinimumStopTimes,
    ) -> Result<Self, Error> {
        let journeys = trains
            .iter_mut()
            .map(|train| Journey::new(train, now, config.minimum_travel_time_ratio, stop_times))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            journeys,
            elements: IndexMap::new(),
        })
    }

    /// Drive every journey to completion, writing predictions into the
    /// trains' timetable entries.
    ///
    /// Deterministic: actions are processed in ascending time, ties broken
    /// by journey insertion order.
    ///
    /// # Errors
    ///
    /// Propagates journey errors ([`Error::DegenerateTimetable`],
    /// [`Error::Protocol`], [`Error::OutOfRange`]); the occupancy state and
    /// any partially written predictions must be discarded afterwards.
    pub fn run(&mut self) -> Result<(), Error> {
        let mut queue = Vec::with_capacity(self.journeys.len());
        for (index, journey) in self.journeys.iter_mut().enumerate() {
            if let Some(action) = journey.step(None)? {
                queue.push(QueueEntry {
                    journey: index,
                    next_action: action,
                });
            }
        }

        while !queue.is_empty() {
            // stable sort: equal times keep their insertion order
            queue.sort_by_key(|entry| entry.next_action.time());

            let journey_index = queue[0].journey;
            let action = queue[0].next_action.clone();
            let response = self.respond(journey_index, &action)?;
            log::debug!(
                "train {}: {action} -> {response:?}",
                self.journeys[journey_index].train_id()
            );

            match self.journeys[journey_index].step(Some(response))? {
                Some(next_action) => {
                    // everything the journey holds stays held until its next
                    // action; let waiting journeys know when that will be
                    self.set_expected_release(journey_index, next_action.time());
                    queue[0].next_action = next_action;
                }
                None => {
                    queue.remove(0);
                }
            }
        }

        Ok(())
    }

    /// Admit the action, or deny it with a retry time derived from the
    /// blocking occupations.
    fn respond(&mut self, journey_index: usize, action: &Action) -> Result<Response, Error> {
        let required = action.required_elements();

        let mut blocked = false;
        let mut latest_release: Option<NaiveTime> = None;
        for key in &required {
            let Some(occupancy) = self.elements.get(key) else { continue };
            if occupancy.journey == journey_index {
                continue;
            }
            blocked = true;
            latest_release = latest_release.max(occupancy.expected_release_time);
        }

        if blocked {
            let Some(latest) = latest_release else {
                return Err(Error::Protocol(format!(
                    "{action} blocked by an occupation with no expected release"
                )));
            };
            let expected_release_time = timeadd(latest, RELEASE_MARGIN)?;
            if expected_release_time <= action.time() {
                return Err(Error::Protocol(format!(
                    "release estimate {expected_release_time} does not advance past {action}"
                )));
            }
            return Ok(Response::NotFree { expected_release_time });
        }

        for key in &required {
            self.elements.insert(
                key.clone(),
                Occupancy {
                    journey: journey_index,
                    expected_release_time: None,
                },
            );
        }
        // an admitted action implicitly releases whatever its journey no
        // longer needs; this is how an arrival frees the ride's segment
        self.elements
            .retain(|key, occupancy| occupancy.journey != journey_index || required.contains(key));

        Ok(Response::Admitted)
    }

    fn set_expected_release(&mut self, journey_index: usize, time: NaiveTime) {
        for occupancy in self.elements.values_mut() {
            if occupancy.journey == journey_index {
                occupancy.expected_release_time = Some(time);
            }
        }
    }
}

/// Predict all trains that run within `PREDICTION_INTERVAL` of `now`.
///
/// Reads the trains from the store, runs a manager over them and returns
/// them with `arr_pred`/`dep_pred` filled in; the store is not modified.
///
/// # Errors
///
/// Fails when the interval end cannot be computed ([`Error::OutOfRange`]) or
/// the manager run fails.
pub fn predict_from_timestamp(
    store: &TimetableStore,
    config: &Config,
    now: NaiveTime,
) -> Result<Vec<Train>, Error> {
    let end = timeadd(now, Duration::seconds(i64::from(config.prediction_interval)))?;
    let mut trains = store.trains_within_timeframe(now, end);

    Manager::from_trains(&mut trains, now, config, store.stop_times())?.run()?;

    Ok(trains)
}
