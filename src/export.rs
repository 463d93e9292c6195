// JSON/CSV writers for analysis outputs
// Raw values only; currency and percentage formatting belongs to the UI.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::alerts::Notification;
use crate::consistency::SystemInconsistency;
use crate::metrics::GlobalMetrics;

/// Write any serializable report as pretty-printed JSON.
pub fn write_json<T: Serialize, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    std::fs::write(path.as_ref(), json)
        .with_context(|| format!("Failed to write JSON report: {:?}", path.as_ref()))?;
    Ok(())
}

// CSV rows are flattened by hand: the report types carry nested values
// (JSON payloads, enums) that have no single-cell representation.

#[derive(Serialize)]
struct InconsistencyRow {
    id: String,
    kind: String,
    severity: String,
    affected_entity: String,
    description: String,
    current_value: String,
    suggested_value: String,
    auto_fixable: bool,
}

pub fn write_inconsistencies_csv<P: AsRef<Path>>(
    path: P,
    findings: &[SystemInconsistency],
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())
        .with_context(|| format!("Failed to create CSV file: {:?}", path.as_ref()))?;

    for finding in findings {
        writer.serialize(InconsistencyRow {
            id: finding.id.clone(),
            kind: format!("{:?}", finding.kind),
            severity: format!("{:?}", finding.severity),
            affected_entity: finding.affected_entity.clone(),
            description: finding.description.clone(),
            current_value: finding.current_value.to_string(),
            suggested_value: finding.suggested_value.to_string(),
            auto_fixable: finding.auto_fixable,
        })?;
    }

    writer.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

#[derive(Serialize)]
struct NotificationRow {
    id: String,
    kind: String,
    category: String,
    priority: String,
    title: String,
    message: String,
    created_at: String,
}

pub fn write_notifications_csv<P: AsRef<Path>>(path: P, alerts: &[Notification]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())
        .with_context(|| format!("Failed to create CSV file: {:?}", path.as_ref()))?;

    for alert in alerts {
        writer.serialize(NotificationRow {
            id: alert.id.clone(),
            kind: format!("{:?}", alert.kind),
            category: alert.category.clone(),
            priority: format!("{:?}", alert.priority),
            title: alert.title.clone(),
            message: alert.message.clone(),
            created_at: alert.created_at.to_rfc3339(),
        })?;
    }

    writer.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

#[derive(Serialize)]
struct StoreMetricsRow {
    store_id: String,
    store_name: String,
    total_revenue: f64,
    total_costs: f64,
    gross_profit: f64,
    profit_margin: f64,
    operational_expenses: f64,
    net_profit: f64,
    monthly_growth: f64,
    performance_tier: String,
}

pub fn write_store_metrics_csv<P: AsRef<Path>>(path: P, global: &GlobalMetrics) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())
        .with_context(|| format!("Failed to create CSV file: {:?}", path.as_ref()))?;

    for store in &global.per_store {
        writer.serialize(StoreMetricsRow {
            store_id: store.store_id.clone(),
            store_name: store.store_name.clone(),
            total_revenue: store.metrics.total_revenue,
            total_costs: store.metrics.total_costs,
            gross_profit: store.metrics.gross_profit,
            profit_margin: store.metrics.profit_margin,
            operational_expenses: store.metrics.operational_expenses,
            net_profit: store.metrics.net_profit,
            monthly_growth: store.metrics.monthly_growth,
            performance_tier: format!("{:?}", store.metrics.performance_tier()),
        })?;
    }

    writer.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consistency::{InconsistencyKind, Severity};
    use std::fs;

    fn finding() -> SystemInconsistency {
        SystemInconsistency {
            id: "abc123".to_string(),
            kind: InconsistencyKind::DataMismatch,
            severity: Severity::High,
            description: "cached count drifted".to_string(),
            affected_entity: "store-1".to_string(),
            current_value: serde_json::json!(7),
            suggested_value: serde_json::json!(1),
            auto_fixable: true,
        }
    }

    #[test]
    fn test_write_json() {
        let dir = std::env::temp_dir().join("storepulse-test-json");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("findings.json");

        write_json(&path, &vec![finding()]).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let parsed: Vec<SystemInconsistency> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, "abc123");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_write_inconsistencies_csv() {
        let dir = std::env::temp_dir().join("storepulse-test-csv");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("findings.csv");

        write_inconsistencies_csv(&path, &[finding()]).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let mut lines = raw.lines();
        let header = lines.next().unwrap();
        assert!(header.contains("severity"));
        assert!(header.contains("auto_fixable"));

        let row = lines.next().unwrap();
        assert!(row.contains("abc123"));
        assert!(row.contains("DataMismatch"));
        assert!(row.contains("true"));

        fs::remove_dir_all(&dir).ok();
    }
}
