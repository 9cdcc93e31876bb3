pub mod duration;
pub mod io;
pub mod model;
pub mod validation;

pub use duration::{format_duration, parse_duration};
pub use io::{read_scenario, write_scenario};
pub use model::{RunSettings, ScenarioConfig, Stage};
pub use validation::{ensure_valid, validate_scenario};
