// Inconsistency Detector - cached aggregates vs. recomputed ground truth
// Every check runs against every store/product; nothing short-circuits.
// The sync operation is the only mutation in the analytics core.

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{self, stable_id, Snapshot};

// ============================================================================
// FINDINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InconsistencyKind {
    DataMismatch,
    MissingData,
    CalculationError,
    OutdatedInfo,
}

impl InconsistencyKind {
    fn as_str(&self) -> &'static str {
        match self {
            InconsistencyKind::DataMismatch => "data_mismatch",
            InconsistencyKind::MissingData => "missing_data",
            InconsistencyKind::CalculationError => "calculation_error",
            InconsistencyKind::OutdatedInfo => "outdated_info",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Weight used by the quality score.
    pub fn weight(&self) -> u32 {
        match self {
            Severity::Critical => 4,
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
        }
    }
}

/// One detected disagreement between stored and recomputed state.
///
/// `auto_fixable` marks findings whose correction is a pure
/// recomputation-and-overwrite; everything else needs a human.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInconsistency {
    pub id: String,
    pub kind: InconsistencyKind,
    pub severity: Severity,
    pub description: String,
    pub affected_entity: String,
    pub current_value: serde_json::Value,
    pub suggested_value: serde_json::Value,
    pub auto_fixable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub inconsistencies: Vec<SystemInconsistency>,
    /// 0-100, weighted by severity over all checked entities.
    pub quality_score: f64,
    pub total_entities: usize,
}

impl ConsistencyReport {
    pub fn has_critical(&self) -> bool {
        self.inconsistencies
            .iter()
            .any(|i| i.severity == Severity::Critical)
    }

    pub fn auto_fixable_count(&self) -> usize {
        self.inconsistencies.iter().filter(|i| i.auto_fixable).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} inconsistencies over {} entities, quality score {:.1} ({} auto-fixable)",
            self.inconsistencies.len(),
            self.total_entities,
            self.quality_score,
            self.auto_fixable_count()
        )
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

pub struct InconsistencyDetector;

impl InconsistencyDetector {
    pub fn new() -> Self {
        InconsistencyDetector
    }

    /// Run every check over the snapshot. `today` anchors expiry arithmetic
    /// so results are reproducible for a given date.
    pub fn detect(&self, snapshot: &Snapshot, today: NaiveDate) -> ConsistencyReport {
        let mut findings = Vec::new();

        for store in &snapshot.stores {
            self.check_critical_stock(snapshot, &store.id, &mut findings);
            self.check_expiring_products(snapshot, &store.id, today, &mut findings);
            self.check_sales_history_presence(snapshot, &store.id, &mut findings);
        }

        for product in &snapshot.products {
            self.check_price_inversion(product, &mut findings);
            self.check_date_order(product, &mut findings);
            self.check_already_expired(product, today, &mut findings);
            self.check_negative_quantity(product, &mut findings);
        }

        let total_entities = snapshot.stores.len() + snapshot.products.len();
        let quality_score = quality_score(&findings, total_entities);

        ConsistencyReport {
            inconsistencies: findings,
            quality_score,
            total_entities,
        }
    }

    fn check_critical_stock(
        &self,
        snapshot: &Snapshot,
        store_id: &str,
        findings: &mut Vec<SystemInconsistency>,
    ) {
        let store = match snapshot.find_store(store_id) {
            Some(s) => s,
            None => return,
        };
        let recomputed = snapshot.recomputed_critical_stock(store_id);
        if store.critical_stock != recomputed {
            findings.push(SystemInconsistency {
                id: stable_id("critical_stock_mismatch", store_id),
                kind: InconsistencyKind::DataMismatch,
                severity: Severity::High,
                description: format!(
                    "Store '{}' caches critical_stock = {} but {} products are low on stock",
                    store.name, store.critical_stock, recomputed
                ),
                affected_entity: store_id.to_string(),
                current_value: serde_json::json!(store.critical_stock),
                suggested_value: serde_json::json!(recomputed),
                auto_fixable: true,
            });
        }
    }

    fn check_expiring_products(
        &self,
        snapshot: &Snapshot,
        store_id: &str,
        today: NaiveDate,
        findings: &mut Vec<SystemInconsistency>,
    ) {
        let store = match snapshot.find_store(store_id) {
            Some(s) => s,
            None => return,
        };
        let recomputed = snapshot.recomputed_expiring_products(store_id, today);
        if store.expiring_products != recomputed {
            findings.push(SystemInconsistency {
                id: stable_id("expiring_products_mismatch", store_id),
                kind: InconsistencyKind::DataMismatch,
                severity: Severity::Medium,
                description: format!(
                    "Store '{}' caches expiring_products = {} but {} products expire within {} days",
                    store.name,
                    store.expiring_products,
                    recomputed,
                    db::EXPIRY_WINDOW_DAYS
                ),
                affected_entity: store_id.to_string(),
                current_value: serde_json::json!(store.expiring_products),
                suggested_value: serde_json::json!(recomputed),
                auto_fixable: true,
            });
        }
    }

    fn check_sales_history_presence(
        &self,
        snapshot: &Snapshot,
        store_id: &str,
        findings: &mut Vec<SystemInconsistency>,
    ) {
        let store = match snapshot.find_store(store_id) {
            Some(s) => s,
            None => return,
        };
        if store.monthly_sales > 0.0 && snapshot.sales_for_store(store_id).is_empty() {
            findings.push(SystemInconsistency {
                id: stable_id("missing_sales_history", store_id),
                kind: InconsistencyKind::MissingData,
                severity: Severity::Critical,
                description: format!(
                    "Store '{}' reports monthly sales of ${:.2} but has no sales history",
                    store.name, store.monthly_sales
                ),
                affected_entity: store_id.to_string(),
                current_value: serde_json::json!(store.monthly_sales),
                suggested_value: serde_json::Value::Null,
                auto_fixable: false,
            });
        }
    }

    fn check_price_inversion(
        &self,
        product: &crate::db::Product,
        findings: &mut Vec<SystemInconsistency>,
    ) {
        if product.selling_price < product.cost_price {
            findings.push(SystemInconsistency {
                id: stable_id("price_inversion", &product.id),
                kind: InconsistencyKind::CalculationError,
                severity: Severity::High,
                description: format!(
                    "Product '{}' sells at ${:.2}, below its cost of ${:.2}",
                    product.name, product.selling_price, product.cost_price
                ),
                affected_entity: product.id.clone(),
                current_value: serde_json::json!(product.selling_price),
                suggested_value: serde_json::Value::Null,
                auto_fixable: false,
            });
        }
    }

    fn check_date_order(
        &self,
        product: &crate::db::Product,
        findings: &mut Vec<SystemInconsistency>,
    ) {
        if product.entry_date > product.expiry_date {
            findings.push(SystemInconsistency {
                id: stable_id("date_order", &product.id),
                kind: InconsistencyKind::DataMismatch,
                severity: Severity::Critical,
                description: format!(
                    "Product '{}' entered on {} after its expiry date {}",
                    product.name, product.entry_date, product.expiry_date
                ),
                affected_entity: product.id.clone(),
                current_value: serde_json::json!(product.entry_date.to_string()),
                suggested_value: serde_json::Value::Null,
                auto_fixable: false,
            });
        }
    }

    fn check_already_expired(
        &self,
        product: &crate::db::Product,
        today: NaiveDate,
        findings: &mut Vec<SystemInconsistency>,
    ) {
        let days = product.days_until_expiry(today);
        if days < 0 {
            findings.push(SystemInconsistency {
                id: stable_id("expired_on_shelf", &product.id),
                kind: InconsistencyKind::OutdatedInfo,
                severity: Severity::Critical,
                description: format!(
                    "Product '{}' expired {} days ago and is still in the catalog",
                    product.name,
                    -days
                ),
                affected_entity: product.id.clone(),
                current_value: serde_json::json!(product.expiry_date.to_string()),
                suggested_value: serde_json::Value::Null,
                auto_fixable: false,
            });
        }
    }

    fn check_negative_quantity(
        &self,
        product: &crate::db::Product,
        findings: &mut Vec<SystemInconsistency>,
    ) {
        if product.quantity < 0 {
            findings.push(SystemInconsistency {
                id: stable_id("negative_quantity", &product.id),
                kind: InconsistencyKind::DataMismatch,
                severity: Severity::High,
                description: format!(
                    "Product '{}' has negative stock quantity {}",
                    product.name, product.quantity
                ),
                affected_entity: product.id.clone(),
                current_value: serde_json::json!(product.quantity),
                suggested_value: serde_json::json!(0),
                auto_fixable: false,
            });
        }
    }
}

impl Default for InconsistencyDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Weighted severity sum over the worst possible total, inverted to 0-100.
/// No entities means nothing to be inconsistent about: score 100.
fn quality_score(findings: &[SystemInconsistency], total_entities: usize) -> f64 {
    if total_entities == 0 {
        return 100.0;
    }
    let weighted: u32 = findings.iter().map(|f| f.severity.weight()).sum();
    let worst = (total_entities * 4) as f64;
    (100.0 - weighted as f64 / worst * 100.0).max(0.0)
}

// ============================================================================
// SYNC (auto-fix)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub corrected_stores: usize,
    /// True when the persisted snapshot changed; the caller decides whether
    /// to re-read it. No forced reloads here.
    pub snapshot_dirty: bool,
}

/// Recompute the two cached counters for every store and overwrite the ones
/// that drifted. Idempotent: a second run on the corrected snapshot makes
/// zero changes.
pub fn sync_store_aggregates(
    conn: &Connection,
    snapshot: &mut Snapshot,
    today: NaiveDate,
) -> Result<SyncReport> {
    let mut corrected = 0;

    let store_ids: Vec<String> = snapshot.stores.iter().map(|s| s.id.clone()).collect();
    for store_id in store_ids {
        let critical = snapshot.recomputed_critical_stock(&store_id);
        let expiring = snapshot.recomputed_expiring_products(&store_id, today);

        let drifted = snapshot
            .find_store(&store_id)
            .map(|s| s.critical_stock != critical || s.expiring_products != expiring)
            .unwrap_or(false);

        if drifted {
            db::correct_store_aggregates(conn, snapshot, &store_id, critical, expiring)?;
            corrected += 1;
        }
    }

    Ok(SyncReport {
        corrected_stores: corrected,
        snapshot_dirty: corrected > 0,
    })
}

// ============================================================================
// TESTS
// ============================================================================
