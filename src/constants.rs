use chrono::Duration;

/// Largest span the time arithmetic will bridge within one day
pub const MAX_TIME_SPAN: Duration = Duration::seconds(8 * 60 * 60);

/// Safety margin added to an expected release time when denying an action
pub const RELEASE_MARGIN: Duration = Duration::seconds(1);
