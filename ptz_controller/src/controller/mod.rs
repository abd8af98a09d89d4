pub mod input;

pub use input::{Axis, PtzInput, StatusListener};
