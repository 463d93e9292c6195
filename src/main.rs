use anyhow::Result;
use chrono::{Duration, Utc};
use rusqlite::Connection;
use std::env;
use std::path::{Path, PathBuf};

use storepulse::{
    build_sale, load_snapshot, save_snapshot, setup_database, sync_store_aggregates,
    AlertGenerator, InconsistencyDetector, Invoice, MetricsAggregator, Product, SalesPoint,
    Snapshot, Store,
};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("seed") => run_seed(),
        Some("analyze") => run_analyze(),
        Some("sync") => run_sync(),
        Some("export") => {
            let dir = args.get(2).map(String::as_str).unwrap_or("reports");
            run_export(Path::new(dir))
        }
        _ => {
            println!("storepulse {}", storepulse::VERSION);
            println!("Usage: storepulse <seed|analyze|sync|export [dir]>");
            Ok(())
        }
    }
}

fn db_path() -> PathBuf {
    env::var("STOREPULSE_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("storepulse.db"))
}

fn open_database() -> Result<Connection> {
    let conn = Connection::open(db_path())?;
    setup_database(&conn)?;
    Ok(conn)
}

fn run_seed() -> Result<()> {
    println!("Seeding demo snapshot into {:?}", db_path());

    let conn = open_database()?;
    let snapshot = demo_snapshot();
    save_snapshot(&conn, &snapshot)?;

    println!(
        "✓ Saved {} stores, {} products, {} sales points",
        snapshot.stores.len(),
        snapshot.products.len(),
        snapshot.sales_history.len()
    );
    Ok(())
}

fn run_analyze() -> Result<()> {
    let conn = open_database()?;
    let snapshot = load_snapshot(&conn)?;
    let today = Utc::now().date_naive();

    if snapshot.stores.is_empty() {
        println!("No data. Run: storepulse seed");
        return Ok(());
    }

    println!("Analyzing {} stores...\n", snapshot.stores.len());

    // Financials
    let aggregator = MetricsAggregator::new();
    let global = aggregator.global_metrics(&snapshot);
    println!("Global: {}", global.combined.summary());
    println!("  avg per-store margin: {:.2}%", global.avg_profit_margin);
    for store in &global.per_store {
        println!("  {}: {}", store.store_name, store.metrics.summary());
    }

    // Forecasts
    println!("\nForecasts:");
    for store in &snapshot.stores {
        let prediction = aggregator.store_forecast(&snapshot, &store.id);
        println!("  {}: {}", store.name, prediction.summary());
    }

    // Consistency
    let report = InconsistencyDetector::new().detect(&snapshot, today);
    println!("\nConsistency: {}", report.summary());
    for finding in &report.inconsistencies {
        println!("  [{:?}] {}", finding.severity, finding.description);
    }

    // Alerts
    let alerts = AlertGenerator::new().scan(&snapshot, today);
    println!("\nAlerts ({}):", alerts.len());
    for alert in &alerts {
        println!("  [{:?}/{:?}] {}", alert.kind, alert.priority, alert.message);
    }

    Ok(())
}

fn run_sync() -> Result<()> {
    let conn = open_database()?;
    let mut snapshot = load_snapshot(&conn)?;
    let today = Utc::now().date_naive();

    println!("Syncing cached store aggregates...");
    let report = sync_store_aggregates(&conn, &mut snapshot, today)?;
    println!("✓ Corrected {} stores", report.corrected_stores);

    if report.snapshot_dirty {
        println!("Snapshot changed; re-run analyze to see the corrected state.");
    }
    Ok(())
}

fn run_export(dir: &Path) -> Result<()> {
    let conn = open_database()?;
    let snapshot = load_snapshot(&conn)?;
    let today = Utc::now().date_naive();

    std::fs::create_dir_all(dir)?;

    let aggregator = MetricsAggregator::new();
    let global = aggregator.global_metrics(&snapshot);
    let findings = InconsistencyDetector::new().detect(&snapshot, today);
    let alerts = AlertGenerator::new().scan(&snapshot, today);

    storepulse::export::write_json(dir.join("metrics.json"), &global)?;
    storepulse::export::write_store_metrics_csv(dir.join("metrics.csv"), &global)?;
    storepulse::export::write_json(dir.join("inconsistencies.json"), &findings.inconsistencies)?;
    storepulse::export::write_inconsistencies_csv(
        dir.join("inconsistencies.csv"),
        &findings.inconsistencies,
    )?;
    storepulse::export::write_json(dir.join("alerts.json"), &alerts)?;
    storepulse::export::write_notifications_csv(dir.join("alerts.csv"), &alerts)?;

    println!("✓ Reports written to {:?}", dir);

    // Demo invoice showing the sale flow end to end
    if let Some(product) = snapshot.products.first() {
        let sale = build_sale(
            &snapshot,
            &product.store_id,
            &[(product.id.clone(), 1)],
        );
        let invoice = Invoice::from_sale(sale, None);
        storepulse::export::write_json(dir.join("sample_invoice.json"), &invoice)?;
    }

    Ok(())
}

/// Two-store demo dataset with a few deliberately drifted aggregates so
/// analyze/sync have something to find.
fn demo_snapshot() -> Snapshot {
    let today = Utc::now().date_naive();

    let stores = vec![
        Store {
            id: "store-centro".to_string(),
            name: "Sucursal Centro".to_string(),
            address: "Av. Juárez 100".to_string(),
            phone: "555-0100".to_string(),
            email: "centro@storepulse.example".to_string(),
            monthly_sales: 145_000.0,
            critical_stock: 0, // drifted: ground truth differs
            expiring_products: 0,
        },
        Store {
            id: "store-norte".to_string(),
            name: "Sucursal Norte".to_string(),
            address: "Blvd. Norte 2200".to_string(),
            phone: "555-0200".to_string(),
            email: "norte@storepulse.example".to_string(),
            monthly_sales: 62_000.0,
            critical_stock: 1,
            expiring_products: 0,
        },
    ];

    let product = |id: &str, store: &str, name: &str, code: &str, cost: f64, sell: f64,
                   qty: i64, expiry_days: i64| Product {
        id: id.to_string(),
        store_id: store.to_string(),
        name: name.to_string(),
        code: code.to_string(),
        category: "Abarrotes".to_string(),
        cost_price: cost,
        selling_price: sell,
        quantity: qty,
        entry_date: today - Duration::days(30),
        expiry_date: today + Duration::days(expiry_days),
        image_url: None,
    };

    let products = vec![
        product("p-leche", "store-centro", "Leche Entera 1L", "LE-001", 18.0, 26.5, 3, 12),
        product("p-arroz", "store-centro", "Arroz 1kg", "AR-001", 22.0, 31.0, 48, 300),
        product("p-cafe", "store-centro", "Café 500g", "CF-001", 95.0, 142.0, 0, 200),
        product("p-yogur", "store-centro", "Yogur Natural", "YG-001", 12.0, 9.5, 15, 5),
        product("p-pan", "store-norte", "Pan de Caja", "PN-001", 28.0, 39.0, 2, 3),
        product("p-frijol", "store-norte", "Frijol 900g", "FJ-001", 30.0, 42.0, 60, 365),
        product("p-aceite", "store-norte", "Aceite 1L", "AC-001", 38.0, 52.0, 25, -4),
    ];

    let history = |store: &str, amounts: &[f64]| -> Vec<SalesPoint> {
        const MONTHS: [&str; 6] = ["Ene", "Feb", "Mar", "Abr", "May", "Jun"];
        amounts
            .iter()
            .zip(MONTHS.iter())
            .map(|(amount, month)| SalesPoint {
                store_id: store.to_string(),
                month: month.to_string(),
                amount: *amount,
            })
            .collect()
    };

    let mut sales_history = history(
        "store-centro",
        &[98_000.0, 104_000.0, 117_000.0, 126_000.0, 138_000.0, 145_000.0],
    );
    sales_history.extend(history(
        "store-norte",
        &[80_000.0, 76_000.0, 71_000.0, 69_000.0, 65_000.0, 62_000.0],
    ));

    Snapshot {
        stores,
        products,
        sales_history,
    }
}
