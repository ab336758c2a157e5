mod element;
mod line;
mod min_stop;
mod timetable;
mod train;

pub use element::{Element, OpenLine, OperatingPoint, SignalDirection, SignalPoint};
pub use line::Line;
pub use min_stop::{MinimumStopTime, MinimumStopTimes};
pub use timetable::TimetableEntry;
pub use train::{Train, TrainType};
