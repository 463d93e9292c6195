// Metrics Aggregator - per-store and global financials from a snapshot
// Pure read-over of the snapshot; every ratio guards its denominator.

use serde::{Deserialize, Serialize};

use crate::db::Snapshot;
use crate::forecast::GrowthForecaster;

/// Operational expenses as a fraction of revenue. Fixed policy constant.
pub const OPERATIONAL_EXPENSE_RATE: f64 = 0.10;

// ============================================================================
// FINANCIAL METRICS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialMetrics {
    pub total_revenue: f64,
    pub total_costs: f64,
    pub gross_profit: f64,
    /// Percentage; 0 when revenue is 0.
    pub profit_margin: f64,
    pub operational_expenses: f64,
    pub net_profit: f64,
    pub cash_flow: f64,
    /// Percent change between the last two months of sales history;
    /// 0 when fewer than two points exist.
    pub monthly_growth: f64,
}

impl FinancialMetrics {
    pub fn zero() -> Self {
        FinancialMetrics {
            total_revenue: 0.0,
            total_costs: 0.0,
            gross_profit: 0.0,
            profit_margin: 0.0,
            operational_expenses: 0.0,
            net_profit: 0.0,
            cash_flow: 0.0,
            monthly_growth: 0.0,
        }
    }

    pub fn performance_tier(&self) -> PerformanceTier {
        PerformanceTier::from_margin(self.profit_margin)
    }

    pub fn summary(&self) -> String {
        format!(
            "revenue ${:.2}, costs ${:.2}, gross ${:.2} ({:.2}% margin, {:?})",
            self.total_revenue,
            self.total_costs,
            self.gross_profit,
            self.profit_margin,
            self.performance_tier()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceTier {
    Excellent,
    Good,
    Average,
    Poor,
}

impl PerformanceTier {
    pub fn from_margin(profit_margin: f64) -> Self {
        if profit_margin > 30.0 {
            PerformanceTier::Excellent
        } else if profit_margin > 20.0 {
            PerformanceTier::Good
        } else if profit_margin > 10.0 {
            PerformanceTier::Average
        } else {
            PerformanceTier::Poor
        }
    }
}

// ============================================================================
// GLOBAL REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalMetrics {
    /// Sums across stores. `profit_margin` here is recomputed from summed
    /// revenue and cost, not averaged from per-store margins.
    pub combined: FinancialMetrics,

    /// Mean of per-store margins, for callers that want the other reducer.
    pub avg_profit_margin: f64,

    pub store_count: usize,
    pub per_store: Vec<StoreMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMetrics {
    pub store_id: String,
    pub store_name: String,
    pub metrics: FinancialMetrics,
}

// ============================================================================
// AGGREGATOR
// ============================================================================

pub struct MetricsAggregator {
    forecaster: GrowthForecaster,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        MetricsAggregator {
            forecaster: GrowthForecaster::new(),
        }
    }

    /// Financials for one store from the current product snapshot.
    pub fn store_metrics(&self, snapshot: &Snapshot, store_id: &str) -> FinancialMetrics {
        let products = snapshot.products_for_store(store_id);

        let total_revenue: f64 = products
            .iter()
            .map(|p| p.selling_price * p.quantity as f64)
            .sum();
        let total_costs: f64 = products
            .iter()
            .map(|p| p.cost_price * p.quantity as f64)
            .sum();

        let gross_profit = total_revenue - total_costs;
        let profit_margin = percent(gross_profit, total_revenue);
        let operational_expenses = total_revenue * OPERATIONAL_EXPENSE_RATE;
        let net_profit = gross_profit - operational_expenses;

        FinancialMetrics {
            total_revenue,
            total_costs,
            gross_profit,
            profit_margin,
            operational_expenses,
            net_profit,
            cash_flow: net_profit,
            monthly_growth: last_month_growth(&snapshot.sales_for_store(store_id)),
        }
    }

    /// Financials across all stores.
    pub fn global_metrics(&self, snapshot: &Snapshot) -> GlobalMetrics {
        let per_store: Vec<StoreMetrics> = snapshot
            .stores
            .iter()
            .map(|store| StoreMetrics {
                store_id: store.id.clone(),
                store_name: store.name.clone(),
                metrics: self.store_metrics(snapshot, &store.id),
            })
            .collect();

        let total_revenue: f64 = per_store.iter().map(|s| s.metrics.total_revenue).sum();
        let total_costs: f64 = per_store.iter().map(|s| s.metrics.total_costs).sum();
        let gross_profit = total_revenue - total_costs;
        let operational_expenses = total_revenue * OPERATIONAL_EXPENSE_RATE;
        let net_profit = gross_profit - operational_expenses;

        let avg_profit_margin = mean(per_store.iter().map(|s| s.metrics.profit_margin));
        let monthly_growth = mean(per_store.iter().map(|s| s.metrics.monthly_growth));

        GlobalMetrics {
            combined: FinancialMetrics {
                total_revenue,
                total_costs,
                gross_profit,
                profit_margin: percent(gross_profit, total_revenue),
                operational_expenses,
                net_profit,
                cash_flow: net_profit,
                monthly_growth,
            },
            avg_profit_margin,
            store_count: per_store.len(),
            per_store,
        }
    }

    /// Next-month revenue prediction for one store's sales history.
    pub fn store_forecast(&self, snapshot: &Snapshot, store_id: &str) -> crate::forecast::GrowthPrediction {
        self.forecaster.predict(&snapshot.sales_for_store(store_id))
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Total cost value of all inventory in the snapshot. Used by the alert
/// rules for the global high-inventory-value threshold.
pub fn inventory_cost_value(snapshot: &Snapshot) -> f64 {
    snapshot
        .products
        .iter()
        .map(|p| p.cost_price * p.quantity as f64)
        .sum()
}

fn percent(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator * 100.0
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let collected: Vec<f64> = values.collect();
    if collected.is_empty() {
        0.0
    } else {
        collected.iter().sum::<f64>() / collected.len() as f64
    }
}

fn last_month_growth(series: &[f64]) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }
    let previous = series[series.len() - 2];
    let latest = series[series.len() - 1];
    percent(latest - previous, previous)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Product, SalesPoint, Snapshot, Store};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn store(id: &str) -> Store {
        Store {
            id: id.to_string(),
            name: format!("Store {}", id),
            address: String::new(),
            phone: String::new(),
            email: String::new(),
            monthly_sales: 0.0,
            critical_stock: 0,
            expiring_products: 0,
        }
    }

    fn product(store_id: &str, quantity: i64, selling: f64, cost: f64) -> Product {
        Product {
            id: uuid::Uuid::new_v4().to_string(),
            store_id: store_id.to_string(),
            name: "Item".to_string(),
            code: "IT-001".to_string(),
            category: "General".to_string(),
            cost_price: cost,
            selling_price: selling,
            quantity,
            entry_date: date(2025, 1, 1),
            expiry_date: date(2026, 1, 1),
            image_url: None,
        }
    }

    #[test]
    fn test_store_with_no_products_is_all_zero() {
        let snapshot = Snapshot {
            stores: vec![store("a")],
            products: vec![],
            sales_history: vec![],
        };

        let metrics = MetricsAggregator::new().store_metrics(&snapshot, "a");

        assert_eq!(metrics.total_revenue, 0.0);
        assert_eq!(metrics.total_costs, 0.0);
        assert_eq!(metrics.gross_profit, 0.0);
        assert_eq!(metrics.profit_margin, 0.0);
        assert_eq!(metrics.performance_tier(), PerformanceTier::Poor);
    }

    #[test]
    fn test_store_metrics_worked_example() {
        // 3 x $1000 (cost $500) + 50 x $200 (cost $190)
        let snapshot = Snapshot {
            stores: vec![store("a")],
            products: vec![
                product("a", 3, 1000.0, 500.0),
                product("a", 50, 200.0, 190.0),
            ],
            sales_history: vec![],
        };

        let metrics = MetricsAggregator::new().store_metrics(&snapshot, "a");

        assert_eq!(metrics.total_revenue, 13_000.0);
        assert_eq!(metrics.total_costs, 11_000.0);
        assert_eq!(metrics.gross_profit, 2_000.0);
        assert!((metrics.profit_margin - 15.384615).abs() < 1e-4);
        assert_eq!(metrics.performance_tier(), PerformanceTier::Average);

        assert!((metrics.operational_expenses - 1_300.0).abs() < 1e-9);
        assert!((metrics.net_profit - 700.0).abs() < 1e-9);
        assert_eq!(metrics.cash_flow, metrics.net_profit);
    }

    #[test]
    fn test_global_margin_uses_aggregate_reducer() {
        // Store a: revenue 100, cost 50 -> 50% margin
        // Store b: revenue 900, cost 900 -> 0% margin
        let snapshot = Snapshot {
            stores: vec![store("a"), store("b")],
            products: vec![product("a", 1, 100.0, 50.0), product("b", 1, 900.0, 900.0)],
            sales_history: vec![],
        };

        let global = MetricsAggregator::new().global_metrics(&snapshot);

        // Aggregate: 50 profit over 1000 revenue
        assert!((global.combined.profit_margin - 5.0).abs() < 1e-9);
        // Mean of per-store margins is a very different number
        assert!((global.avg_profit_margin - 25.0).abs() < 1e-9);
        assert_eq!(global.store_count, 2);
        assert_eq!(global.per_store.len(), 2);
    }

    #[test]
    fn test_monthly_growth_from_history() {
        let snapshot = Snapshot {
            stores: vec![store("a")],
            products: vec![],
            sales_history: vec![
                SalesPoint {
                    store_id: "a".to_string(),
                    month: "Ene".to_string(),
                    amount: 100_000.0,
                },
                SalesPoint {
                    store_id: "a".to_string(),
                    month: "Feb".to_string(),
                    amount: 125_000.0,
                },
            ],
        };

        let metrics = MetricsAggregator::new().store_metrics(&snapshot, "a");
        assert!((metrics.monthly_growth - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_monthly_growth_guards() {
        // Single point: no growth computable
        let one_point = vec![SalesPoint {
            store_id: "a".to_string(),
            month: "Ene".to_string(),
            amount: 50_000.0,
        }];
        let snapshot = Snapshot {
            stores: vec![store("a")],
            products: vec![],
            sales_history: one_point,
        };
        let metrics = MetricsAggregator::new().store_metrics(&snapshot, "a");
        assert_eq!(metrics.monthly_growth, 0.0);

        // Zero previous month must not divide by zero
        assert_eq!(last_month_growth(&[0.0, 500.0]), 0.0);
    }

    #[test]
    fn test_performance_tier_boundaries() {
        assert_eq!(PerformanceTier::from_margin(35.0), PerformanceTier::Excellent);
        assert_eq!(PerformanceTier::from_margin(30.0), PerformanceTier::Good);
        assert_eq!(PerformanceTier::from_margin(20.0), PerformanceTier::Average);
        assert_eq!(PerformanceTier::from_margin(10.0), PerformanceTier::Poor);
        assert_eq!(PerformanceTier::from_margin(-5.0), PerformanceTier::Poor);
    }

    #[test]
    fn test_inventory_cost_value() {
        let snapshot = Snapshot {
            stores: vec![store("a")],
            products: vec![product("a", 10, 20.0, 15.0), product("a", 2, 99.0, 80.0)],
            sales_history: vec![],
        };
        assert!((inventory_cost_value(&snapshot) - 310.0).abs() < 1e-9);
    }
}
