// Data model + snapshot persistence
// Stores and Products are the only durable entities; everything the
// analysis modules produce is recomputable from a Snapshot.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Quantity below which a product counts as low stock.
pub const LOW_STOCK_THRESHOLD: i64 = 5;

/// Expiry window (days) for the "expiring products" cached counter.
pub const EXPIRY_WINDOW_DAYS: i64 = 30;

// ============================================================================
// STORE
// ============================================================================

/// A store with contact info and three cached aggregate fields.
///
/// `critical_stock` and `expiring_products` are derived counts that can
/// drift from the product list; nothing keeps them in sync automatically.
/// The consistency module checks them and `correct_store_aggregates` is the
/// only code that rewrites them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    #[serde(default = "default_uuid")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub monthly_sales: f64,
    #[serde(default)]
    pub critical_stock: i64,
    #[serde(default)]
    pub expiring_products: i64,
}

// ============================================================================
// PRODUCT
// ============================================================================

/// A catalog product owned by one store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(default = "default_uuid")]
    pub id: String,
    pub store_id: String,
    pub name: String,
    pub code: String,
    pub category: String,
    pub cost_price: f64,
    pub selling_price: f64,
    pub quantity: i64,
    pub entry_date: NaiveDate,
    pub expiry_date: NaiveDate,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Product {
    /// Signed days from `today` until expiry. Negative means already expired.
    pub fn days_until_expiry(&self, today: NaiveDate) -> i64 {
        (self.expiry_date - today).num_days()
    }

    /// Low stock means quantity strictly below the threshold (and includes 0).
    pub fn is_low_stock(&self) -> bool {
        self.quantity < LOW_STOCK_THRESHOLD
    }

    /// Expiring within the 30-day window but not yet expired.
    pub fn is_expiring(&self, today: NaiveDate) -> bool {
        let days = self.days_until_expiry(today);
        days > 0 && days <= EXPIRY_WINDOW_DAYS
    }
}

fn default_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// SALES HISTORY
// ============================================================================

/// One point of a store's monthly revenue series. Regression input only,
/// not a ledger of individual transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesPoint {
    pub store_id: String,
    pub month: String,
    pub amount: f64,
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Full in-memory state at one instant: the sole input to every analysis
/// function. Analysis never reaches past a snapshot into the database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub stores: Vec<Store>,
    pub products: Vec<Product>,
    pub sales_history: Vec<SalesPoint>,
}

impl Snapshot {
    pub fn products_for_store<'a>(&'a self, store_id: &str) -> Vec<&'a Product> {
        self.products
            .iter()
            .filter(|p| p.store_id == store_id)
            .collect()
    }

    /// Ordered monthly amounts for one store, in stored order.
    pub fn sales_for_store(&self, store_id: &str) -> Vec<f64> {
        self.sales_history
            .iter()
            .filter(|s| s.store_id == store_id)
            .map(|s| s.amount)
            .collect()
    }

    /// Ground truth for `Store::critical_stock`.
    pub fn recomputed_critical_stock(&self, store_id: &str) -> i64 {
        self.products
            .iter()
            .filter(|p| p.store_id == store_id && p.is_low_stock())
            .count() as i64
    }

    /// Ground truth for `Store::expiring_products`.
    pub fn recomputed_expiring_products(&self, store_id: &str, today: NaiveDate) -> i64 {
        self.products
            .iter()
            .filter(|p| p.store_id == store_id && p.is_expiring(today))
            .count() as i64
    }

    pub fn find_store(&self, store_id: &str) -> Option<&Store> {
        self.stores.iter().find(|s| s.id == store_id)
    }
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

/// Audit trail row. Every aggregate correction and import is an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Stable identity for derived records (findings, alerts): a digest of the
/// category and the affected entity, NOT of the emission time. Re-running an
/// analysis over the same snapshot reproduces the same ids, which is what
/// makes deduplication possible.
pub fn stable_id(category: &str, entity_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.as_bytes());
    hasher.update(b":");
    hasher.update(entity_id.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Parse a stored RFC3339 timestamp, falling back to now on malformed input.
/// Old backups occasionally carry locale-formatted strings; they must not
/// take down a report run.
pub fn parse_timestamp_or_now(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ============================================================================
// PERSISTENCE (key-value JSON blobs + events)
// ============================================================================

const KEY_STORES: &str = "stores";
const KEY_PRODUCTS: &str = "products";
const KEY_SALES_HISTORY: &str = "sales_history";

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

fn put_blob<T: Serialize>(conn: &Connection, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)
        .with_context(|| format!("Failed to serialize blob for key '{}'", key))?;
    conn.execute(
        "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
        params![key, json, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn get_blob<T: for<'de> Deserialize<'de> + Default>(conn: &Connection, key: &str) -> Result<T> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM kv_store WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;

    match raw {
        Some(json) => serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse stored blob for key '{}'", key)),
        None => Ok(T::default()),
    }
}

/// Persist the full snapshot as three JSON blobs.
pub fn save_snapshot(conn: &Connection, snapshot: &Snapshot) -> Result<()> {
    put_blob(conn, KEY_STORES, &snapshot.stores)?;
    put_blob(conn, KEY_PRODUCTS, &snapshot.products)?;
    put_blob(conn, KEY_SALES_HISTORY, &snapshot.sales_history)?;
    Ok(())
}

/// Load a snapshot; missing keys come back as empty collections.
pub fn load_snapshot(conn: &Connection) -> Result<Snapshot> {
    Ok(Snapshot {
        stores: get_blob(conn, KEY_STORES)?,
        products: get_blob(conn, KEY_PRODUCTS)?,
        sales_history: get_blob(conn, KEY_SALES_HISTORY)?,
    })
}

/// Overwrite the two cached counters on one store and record an audit event.
///
/// This is the only write path the analytics core uses. It rewrites nothing
/// but `critical_stock` and `expiring_products`.
pub fn correct_store_aggregates(
    conn: &Connection,
    snapshot: &mut Snapshot,
    store_id: &str,
    critical_stock: i64,
    expiring_products: i64,
) -> Result<()> {
    let store = snapshot
        .stores
        .iter_mut()
        .find(|s| s.id == store_id)
        .with_context(|| format!("Unknown store id: {}", store_id))?;

    let previous = (store.critical_stock, store.expiring_products);
    store.critical_stock = critical_stock;
    store.expiring_products = expiring_products;

    put_blob(conn, KEY_STORES, &snapshot.stores)?;

    let event = Event::new(
        "store_aggregates_corrected",
        "store",
        store_id,
        serde_json::json!({
            "critical_stock": { "from": previous.0, "to": critical_stock },
            "expiring_products": { "from": previous.1, "to": expiring_products },
        }),
        "consistency_sync",
    );
    insert_event(conn, &event)?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    conn.execute(
        "INSERT INTO events (event_id, timestamp, event_type, entity_type, entity_id, data, actor)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            serde_json::to_string(&event.data)?,
            event.actor,
        ],
    )?;
    Ok(())
}

/// Fetch audit events for one entity, oldest first.
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![entity_type, entity_id], |row| {
        let timestamp: String = row.get(1)?;
        let data: String = row.get(5)?;
        Ok(Event {
            event_id: row.get(0)?,
            timestamp: parse_timestamp_or_now(&timestamp),
            event_type: row.get(2)?,
            entity_type: row.get(3)?,
            entity_id: row.get(4)?,
            data: serde_json::from_str(&data).unwrap_or(serde_json::Value::Null),
            actor: row.get(6)?,
        })
    })?;

    let mut events = Vec::new();
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_snapshot() -> Snapshot {
        Snapshot {
            stores: vec![Store {
                id: "store-1".to_string(),
                name: "Centro".to_string(),
                address: "Av. Principal 100".to_string(),
                phone: "555-0100".to_string(),
                email: "centro@example.com".to_string(),
                monthly_sales: 120_000.0,
                critical_stock: 1,
                expiring_products: 1,
            }],
            products: vec![
                Product {
                    id: "prod-1".to_string(),
                    store_id: "store-1".to_string(),
                    name: "Leche Entera 1L".to_string(),
                    code: "LE-001".to_string(),
                    category: "Lácteos".to_string(),
                    cost_price: 18.0,
                    selling_price: 26.5,
                    quantity: 3,
                    entry_date: date(2025, 1, 2),
                    expiry_date: date(2025, 2, 1),
                    image_url: None,
                },
                Product {
                    id: "prod-2".to_string(),
                    store_id: "store-1".to_string(),
                    name: "Arroz 1kg".to_string(),
                    code: "AR-001".to_string(),
                    category: "Abarrotes".to_string(),
                    cost_price: 22.0,
                    selling_price: 31.0,
                    quantity: 40,
                    entry_date: date(2025, 1, 2),
                    expiry_date: date(2026, 1, 2),
                    image_url: None,
                },
            ],
            sales_history: vec![
                SalesPoint {
                    store_id: "store-1".to_string(),
                    month: "Ene".to_string(),
                    amount: 100_000.0,
                },
                SalesPoint {
                    store_id: "store-1".to_string(),
                    month: "Feb".to_string(),
                    amount: 120_000.0,
                },
            ],
        }
    }

    #[test]
    fn test_days_until_expiry_signs() {
        let snapshot = sample_snapshot();
        let milk = &snapshot.products[0];

        assert_eq!(milk.days_until_expiry(date(2025, 1, 22)), 10);
        assert_eq!(milk.days_until_expiry(date(2025, 2, 1)), 0);
        assert_eq!(milk.days_until_expiry(date(2025, 2, 5)), -4);
    }

    #[test]
    fn test_recomputed_aggregates() {
        let snapshot = sample_snapshot();

        assert_eq!(snapshot.recomputed_critical_stock("store-1"), 1);
        assert_eq!(
            snapshot.recomputed_expiring_products("store-1", date(2025, 1, 22)),
            1
        );
        // Past the milk's expiry nothing is "expiring" anymore
        assert_eq!(
            snapshot.recomputed_expiring_products("store-1", date(2025, 2, 10)),
            0
        );
    }

    #[test]
    fn test_sales_for_store_order() {
        let snapshot = sample_snapshot();
        assert_eq!(
            snapshot.sales_for_store("store-1"),
            vec![100_000.0, 120_000.0]
        );
        assert!(snapshot.sales_for_store("store-2").is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let snapshot = sample_snapshot();
        save_snapshot(&conn, &snapshot).unwrap();

        let loaded = load_snapshot(&conn).unwrap();
        assert_eq!(loaded.stores.len(), 1);
        assert_eq!(loaded.products.len(), 2);
        assert_eq!(loaded.sales_history.len(), 2);
        assert_eq!(loaded.stores[0].name, "Centro");
        assert_eq!(loaded.products[1].quantity, 40);
    }

    #[test]
    fn test_load_empty_database() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let snapshot = load_snapshot(&conn).unwrap();
        assert!(snapshot.stores.is_empty());
        assert!(snapshot.products.is_empty());
        assert!(snapshot.sales_history.is_empty());
    }

    #[test]
    fn test_correct_store_aggregates_writes_event() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let mut snapshot = sample_snapshot();
        save_snapshot(&conn, &snapshot).unwrap();

        correct_store_aggregates(&conn, &mut snapshot, "store-1", 4, 2).unwrap();

        assert_eq!(snapshot.stores[0].critical_stock, 4);
        assert_eq!(snapshot.stores[0].expiring_products, 2);

        // Persisted copy matches the in-memory correction
        let reloaded = load_snapshot(&conn).unwrap();
        assert_eq!(reloaded.stores[0].critical_stock, 4);

        let events = get_events_for_entity(&conn, "store", "store-1").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "store_aggregates_corrected");
    }

    #[test]
    fn test_correct_unknown_store_fails() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let mut snapshot = sample_snapshot();
        assert!(correct_store_aggregates(&conn, &mut snapshot, "nope", 0, 0).is_err());
    }

    #[test]
    fn test_parse_timestamp_fallback() {
        let good = parse_timestamp_or_now("2025-03-01T10:00:00+00:00");
        assert_eq!(good.to_rfc3339(), "2025-03-01T10:00:00+00:00");

        // Malformed input falls back to roughly now instead of failing
        let before = Utc::now();
        let bad = parse_timestamp_or_now("01/03/2025 10:00");
        assert!(bad >= before);
    }
}
