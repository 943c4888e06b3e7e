//! Server statistics

pub mod server_stats;

pub use server_stats::{ServerStats, ServerStatsSnapshot};
