use serde::{Deserialize, Serialize};

use crate::constants::MAX_TIME_SPAN;
use crate::error::Error;

fn default_prediction_interval() -> u32 {
    7200
}

fn default_travel_time_ratio() -> f64 {
    0.9
}

fn default_clock_server() -> String {
    "127.0.0.1:9995".to_string()
}

/// Engine configuration. Every key has a default, so an empty document (or
/// environment) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Seconds past `now` to include trains for
    #[serde(default = "default_prediction_interval")]
    pub prediction_interval: u32,
    /// Fraction of the planned ride time a delayed train can catch up to,
    /// used when an entry has no explicit minimum ride time
    #[serde(default = "default_travel_time_ratio")]
    pub minimum_travel_time_ratio: f64,
    /// `host:port` of the simulation clock server
    #[serde(default = "default_clock_server")]
    pub clock_server: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prediction_interval: default_prediction_interval(),
            minimum_travel_time_ratio: default_travel_time_ratio(),
            clock_server: default_clock_server(),
        }
    }
}

impl Config {
    /// Read the configuration from the environment, falling back to the
    /// defaults for unset keys.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidConfig`] on unparsable or out-of-range
    /// values.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("PREDICTION_INTERVAL") {
            config.prediction_interval = value
                .parse()
                .map_err(|_| Error::InvalidConfig(format!("PREDICTION_INTERVAL={value}")))?;
        }
        if let Ok(value) = std::env::var("MINIMUM_TRAVEL_TIME_RATIO") {
            config.minimum_travel_time_ratio = value
                .parse()
                .map_err(|_| Error::InvalidConfig(format!("MINIMUM_TRAVEL_TIME_RATIO={value}")))?;
        }
        if let Ok(value) = std::env::var("CLOCK_SERVER") {
            config.clock_server = value;
        }

        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Fails with [`Error::InvalidConfig`] when the travel-time ratio leaves
    /// (0, 1] or the prediction interval leaves the supported arithmetic
    /// window.
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.minimum_travel_time_ratio > 0.0 && self.minimum_travel_time_ratio <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "minimum_travel_time_ratio {} not in (0, 1]",
                self.minimum_travel_time_ratio
            )));
        }
        if i64::from(self.prediction_interval) > MAX_TIME_SPAN.num_seconds() {
            return Err(Error::InvalidConfig(format!(
                "prediction_interval {} s exceeds the 8 hour window",
                self.prediction_interval
            )));
        }
        Ok(())
    }
}
