pub mod connection;
pub mod fixtures;
pub mod metrics;
pub mod migrations;
pub mod repositories;
pub mod workflow;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{seed_orders, SeedReport};
pub use metrics::{MetricsAggregator, MetricsSnapshot};
pub use workflow::{EscalationWorkflow, ResolutionOutcome};
