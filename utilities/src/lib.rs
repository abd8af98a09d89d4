pub mod coalescing_channel;
pub mod interval;
pub mod moving_average;
