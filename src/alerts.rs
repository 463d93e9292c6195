// Notification/Alert Generator - threshold scans over the snapshot
// Ids are content-derived so the same condition never produces two open
// alerts; the emission timestamp lives in its own field.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{stable_id, Snapshot};
use crate::metrics::inventory_cost_value;

/// Most recent open alerts kept after a merge.
pub const MAX_OPEN_ALERTS: usize = 50;

/// Stores below this monthly sales figure are flagged as underperforming.
pub const UNDERPERFORMING_SALES: f64 = 80_000.0;

/// Stores above this monthly sales figure get a high-performer notice.
pub const HIGH_PERFORMER_SALES: f64 = 200_000.0;

/// Global inventory cost value that triggers the capital-tied-up notice.
pub const HIGH_INVENTORY_VALUE: f64 = 1_000_000.0;

// ============================================================================
// NOTIFICATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    Critical,
    Warning,
    Info,
    Success,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// What the UI should offer for an alert. Data, not callbacks: the UI layer
/// resolves these to whatever navigation it has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertAction {
    ViewProduct { product_id: String },
    ViewStore { store_id: String },
    ReviewInventory,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Stable digest of (category, entity); see `db::stable_id`.
    pub id: String,
    pub kind: NotificationKind,
    pub category: String,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub action: AlertAction,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// GENERATOR
// ============================================================================

pub struct AlertGenerator {
    pub max_open_alerts: usize,
}

impl AlertGenerator {
    pub fn new() -> Self {
        AlertGenerator {
            max_open_alerts: MAX_OPEN_ALERTS,
        }
    }

    /// Scan the snapshot and emit the currently-warranted alerts.
    /// Pure derivation: no dedup against history, no I/O.
    pub fn scan(&self, snapshot: &Snapshot, today: NaiveDate) -> Vec<Notification> {
        let now = Utc::now();
        let mut alerts = Vec::new();

        for product in &snapshot.products {
            let store_name = snapshot
                .find_store(&product.store_id)
                .map(|s| s.name.as_str())
                .unwrap_or("unknown store");

            // Out of stock wins over low stock for the same product
            if product.quantity == 0 {
                alerts.push(Notification {
                    id: stable_id("out_of_stock", &product.id),
                    kind: NotificationKind::Critical,
                    category: "out_of_stock".to_string(),
                    title: "Out of stock".to_string(),
                    message: format!("'{}' is out of stock at {}", product.name, store_name),
                    priority: Priority::High,
                    action: AlertAction::ViewProduct {
                        product_id: product.id.clone(),
                    },
                    created_at: now,
                });
            } else if product.quantity > 0 && product.quantity <= 5 {
                alerts.push(Notification {
                    id: stable_id("low_stock", &product.id),
                    kind: NotificationKind::Warning,
                    category: "low_stock".to_string(),
                    title: "Low stock".to_string(),
                    message: format!(
                        "Only {} units of '{}' left at {}",
                        product.quantity, product.name, store_name
                    ),
                    priority: Priority::High,
                    action: AlertAction::ViewProduct {
                        product_id: product.id.clone(),
                    },
                    created_at: now,
                });
            }

            let days = product.days_until_expiry(today);
            if days <= 0 {
                alerts.push(Notification {
                    id: stable_id("expired", &product.id),
                    kind: NotificationKind::Critical,
                    category: "expired".to_string(),
                    title: "Product expired".to_string(),
                    message: format!("'{}' at {} has expired", product.name, store_name),
                    priority: Priority::High,
                    action: AlertAction::ViewProduct {
                        product_id: product.id.clone(),
                    },
                    created_at: now,
                });
            } else if days <= 7 {
                alerts.push(Notification {
                    id: stable_id("expiring_soon", &product.id),
                    kind: NotificationKind::Warning,
                    category: "expiring_soon".to_string(),
                    title: "Expiring soon".to_string(),
                    message: format!(
                        "'{}' at {} expires in {} days",
                        product.name, store_name, days
                    ),
                    priority: Priority::Medium,
                    action: AlertAction::ViewProduct {
                        product_id: product.id.clone(),
                    },
                    created_at: now,
                });
            } else if days <= 30 {
                alerts.push(Notification {
                    id: stable_id("expiring_month", &product.id),
                    kind: NotificationKind::Info,
                    category: "expiring_month".to_string(),
                    title: "Expiring within 30 days".to_string(),
                    message: format!(
                        "'{}' at {} expires in {} days",
                        product.name, store_name, days
                    ),
                    priority: Priority::Low,
                    action: AlertAction::ViewProduct {
                        product_id: product.id.clone(),
                    },
                    created_at: now,
                });
            }
        }

        for store in &snapshot.stores {
            if store.monthly_sales < UNDERPERFORMING_SALES {
                alerts.push(Notification {
                    id: stable_id("underperforming", &store.id),
                    kind: NotificationKind::Warning,
                    category: "underperforming".to_string(),
                    title: "Underperforming store".to_string(),
                    message: format!(
                        "{} sold ${:.2} this month, below the ${:.0} target",
                        store.name, store.monthly_sales, UNDERPERFORMING_SALES
                    ),
                    priority: Priority::Low,
                    action: AlertAction::ViewStore {
                        store_id: store.id.clone(),
                    },
                    created_at: now,
                });
            } else if store.monthly_sales > HIGH_PERFORMER_SALES {
                alerts.push(Notification {
                    id: stable_id("high_performer", &store.id),
                    kind: NotificationKind::Success,
                    category: "high_performer".to_string(),
                    title: "High performer".to_string(),
                    message: format!(
                        "{} sold ${:.2} this month",
                        store.name, store.monthly_sales
                    ),
                    priority: Priority::Low,
                    action: AlertAction::ViewStore {
                        store_id: store.id.clone(),
                    },
                    created_at: now,
                });
            }
        }

        // Global rule, emitted once per scan
        let cost_value = inventory_cost_value(snapshot);
        if cost_value > HIGH_INVENTORY_VALUE {
            alerts.push(Notification {
                id: stable_id("high_inventory_value", "global"),
                kind: NotificationKind::Info,
                category: "high_inventory_value".to_string(),
                title: "High inventory value".to_string(),
                message: format!("${:.2} of capital is tied up in inventory", cost_value),
                priority: Priority::Low,
                action: AlertAction::ReviewInventory,
                created_at: now,
            });
        }

        alerts
    }

    /// Merge fresh alerts into the still-open set.
    ///
    /// An open alert with the same id absorbs the fresh one and keeps its
    /// original `created_at` (the condition is ongoing, not new). The result
    /// is capped to the most recent `max_open_alerts`.
    pub fn merge_open(&self, open: &[Notification], fresh: Vec<Notification>) -> Vec<Notification> {
        let mut merged: Vec<Notification> = Vec::with_capacity(open.len() + fresh.len());

        for alert in fresh {
            match open.iter().find(|o| o.id == alert.id) {
                Some(existing) => merged.push(existing.clone()),
                None => merged.push(alert),
            }
        }

        merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        merged.truncate(self.max_open_alerts);
        merged
    }
}

impl Default for AlertGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
