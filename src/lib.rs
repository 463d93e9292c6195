// storepulse - store/inventory analytics engine
// Exposes all modules for use in the CLI and tests

pub mod db;
pub mod metrics;
pub mod forecast;
pub mod consistency;
pub mod alerts;
pub mod sales;
pub mod export;

// Re-export commonly used types
pub use db::{
    correct_store_aggregates, get_events_for_entity, insert_event, load_snapshot,
    parse_timestamp_or_now, save_snapshot, setup_database, stable_id, Event, Product, SalesPoint,
    Snapshot, Store, EXPIRY_WINDOW_DAYS, LOW_STOCK_THRESHOLD,
};
pub use metrics::{
    inventory_cost_value, FinancialMetrics, GlobalMetrics, MetricsAggregator, PerformanceTier,
    StoreMetrics, OPERATIONAL_EXPENSE_RATE,
};
pub use forecast::{fit_line, GrowthForecaster, GrowthPrediction, Trend};
pub use consistency::{
    sync_store_aggregates, ConsistencyReport, InconsistencyDetector, InconsistencyKind, Severity,
    SyncReport, SystemInconsistency,
};
pub use alerts::{
    AlertAction, AlertGenerator, Notification, NotificationKind, Priority, MAX_OPEN_ALERTS,
};
pub use sales::{build_sale, Invoice, Sale, SaleLine, TAX_RATE};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
