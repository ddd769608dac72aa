pub mod servers;
pub mod stats;
