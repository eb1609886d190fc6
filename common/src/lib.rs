pub mod config;
pub mod error;
pub mod plot;
pub mod stats;
pub mod table;
pub mod util;

pub const KIB_TO_MIB: f64 = 1.0 / 1024.0;
