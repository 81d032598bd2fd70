//! Input tables: daily load, humidity and temperature.

mod loader;

pub use loader::{load_inputs, parse_date, read_daily, DailyInputs, DailyObservation, InputPaths, LoadError};
