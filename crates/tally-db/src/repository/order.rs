//! # Order Repository
//!
//! Reads orders by time window and publishes every write to the change feed.
//!
//! ## Storage Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  orders                                                                 │
//! │  ─────────────────────────────────────────────────────────────────────  │
//! │  id              TEXT PK                                                │
//! │  status          TEXT       'Pending' | 'Preparing' | 'Delivered' | ... │
//! │  total_cents     INTEGER                                                │
//! │  placed_at_ms    INTEGER?   epoch millis, NULL = malformed              │
//! │  payment_method  TEXT?      'Cash' | 'Online' | anything else → None    │
//! │  recipient       TEXT                                                   │
//! │  items_json      TEXT?      [OrderItem] as JSON, NULL/bad = malformed   │
//! │  created_at_ms   INTEGER?                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows are decoded leniently: a bad `items_json` or unknown status never
//! fails the whole query. The analytics engine decides what to skip.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;
use tally_core::{ChangeKind, Order, OrderChange, OrderItem, OrderStatus, PaymentMethod};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::error::{DbError, DbResult};

/// Columns selected by every read, in `OrderRow` order.
const ORDER_COLUMNS: &str = "id, status, total_cents, placed_at_ms, payment_method, \
                             recipient, items_json, created_at_ms";

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    status: String,
    total_cents: i64,
    placed_at_ms: Option<i64>,
    payment_method: Option<String>,
    recipient: String,
    items_json: Option<String>,
    created_at_ms: Option<i64>,
}

impl OrderRow {
    fn into_order(self) -> Order {
        let status = self
            .status
            .parse::<OrderStatus>()
            .unwrap_or(OrderStatus::Unknown);

        let payment_method = self
            .payment_method
            .as_deref()
            .and_then(|p| p.parse::<PaymentMethod>().ok());

        let items = self.items_json.as_deref().and_then(|json| {
            match serde_json::from_str::<Vec<OrderItem>>(json) {
                Ok(items) => Some(items),
                Err(e) => {
                    warn!(order_id = %self.id, error = %e, "Unreadable items_json");
                    None
                }
            }
        });

        Order {
            id: self.id,
            status,
            total_cents: self.total_cents,
            date: self.placed_at_ms.and_then(from_millis),
            payment_method,
            recipient: self.recipient,
            items,
            created_at: self.created_at_ms.and_then(from_millis),
        }
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
    changes: broadcast::Sender<OrderChange>,
}

impl OrderRepository {
    /// Creates a new OrderRepository publishing to `changes`.
    pub fn new(pool: SqlitePool, changes: broadcast::Sender<OrderChange>) -> Self {
        OrderRepository { pool, changes }
    }

    fn publish(&self, kind: ChangeKind, order: Order) {
        let id = order.id.clone();
        // Err only means nobody is subscribed
        if self.changes.send(OrderChange { kind, order }).is_err() {
            trace!(order_id = %id, ?kind, "No change feed subscribers");
        }
    }

    /// Inserts a new order and publishes `Added`.
    ///
    /// ## Errors
    /// - `UniqueViolation` if the id already exists
    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        debug!(order_id = %order.id, status = %order.status, "Inserting order");

        let items_json = order
            .items
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let now_ms = Utc::now().timestamp_millis();

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, status, total_cents, placed_at_ms, payment_method,
                recipient, items_json, created_at_ms, updated_at_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&order.id)
        .bind(order.status.as_str())
        .bind(order.total_cents)
        .bind(order.date.map(|d| d.timestamp_millis()))
        .bind(order.payment_method.map(|p| p.as_str()))
        .bind(&order.recipient)
        .bind(items_json)
        .bind(order.created_at.map(|d| d.timestamp_millis()).unwrap_or(now_ms))
        .bind(now_ms)
        .execute(&self.pool)
        .await?;

        self.publish(ChangeKind::Added, order.clone());
        Ok(())
    }

    /// Moves an order to a new status and publishes `Modified`.
    ///
    /// ## Returns
    /// The order as stored after the update.
    pub async fn update_status(&self, id: &str, status: OrderStatus) -> DbResult<Order> {
        debug!(order_id = %id, %status, "Updating order status");

        let result = sqlx::query("UPDATE orders SET status = ?2, updated_at_ms = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status.as_str())
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }

        let order = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))?;

        self.publish(ChangeKind::Modified, order.clone());
        Ok(order)
    }

    /// Deletes an order and publishes `Removed`.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let order = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))?;

        sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.publish(ChangeKind::Removed, order);
        Ok(())
    }

    /// Gets an order by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS);
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(OrderRow::into_order))
    }

    /// Delivered orders placed within `[start, end]` (inclusive), oldest first.
    pub async fn fetch_delivered_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders \
             WHERE status = ?1 AND placed_at_ms BETWEEN ?2 AND ?3 \
             ORDER BY placed_at_ms ASC, id ASC",
            ORDER_COLUMNS
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(OrderStatus::Delivered.as_str())
            .bind(start.timestamp_millis())
            .bind(end.timestamp_millis())
            .fetch_all(&self.pool)
            .await?;

        debug!(count = rows.len(), %start, %end, "Fetched delivered orders");
        Ok(rows.into_iter().map(OrderRow::into_order).collect())
    }

    /// Orders of any status placed within `[start, end]` (inclusive), oldest first.
    pub async fn fetch_placed_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders \
             WHERE placed_at_ms BETWEEN ?1 AND ?2 \
             ORDER BY placed_at_ms ASC, id ASC",
            ORDER_COLUMNS
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(start.timestamp_millis())
            .bind(end.timestamp_millis())
            .fetch_all(&self.pool)
            .await?;

        debug!(count = rows.len(), %start, %end, "Fetched orders");
        Ok(rows.into_iter().map(OrderRow::into_order).collect())
    }

    /// Orders placed at or after `since`, newest first, at most `limit`.
    pub async fn recent_since(&self, since: DateTime<Utc>, limit: u32) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders \
             WHERE placed_at_ms >= ?1 \
             ORDER BY placed_at_ms DESC, id ASC \
             LIMIT ?2",
            ORDER_COLUMNS
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(since.timestamp_millis())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(OrderRow::into_order).collect())
    }

    /// Counts all orders.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, hour, 0, 0).unwrap()
    }

    fn order(recipient: &str, day: u32, status: OrderStatus) -> Order {
        Order::checkout(
            recipient,
            at(day, 12),
            PaymentMethod::Cash,
            vec![OrderItem::new("Adobo", 15000, 2)],
        )
        .with_status(status)
    }

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let db = db().await;
        let original = order("Juan", 3, OrderStatus::Delivered);
        db.orders().insert(&original).await.unwrap();

        let stored = db.orders().get_by_id(&original.id).await.unwrap().unwrap();
        assert_eq!(stored, original);
        assert_eq!(db.orders().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let db = db().await;
        let o = order("Juan", 3, OrderStatus::Delivered);
        db.orders().insert(&o).await.unwrap();

        let err = db.orders().insert(&o).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_delivered_window_is_inclusive_and_filtered() {
        let db = db().await;
        let repo = db.orders();
        let on_start = order("A", 1, OrderStatus::Delivered).with_date(at(1, 0));
        let inside = order("B", 2, OrderStatus::Delivered);
        let pending = order("C", 2, OrderStatus::Pending);
        let after = order("D", 5, OrderStatus::Delivered);
        for o in [&on_start, &inside, &pending, &after] {
            repo.insert(o).await.unwrap();
        }

        let delivered = repo.fetch_delivered_between(at(1, 0), at(3, 0)).await.unwrap();
        let ids: Vec<&str> = delivered.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec![on_start.id.as_str(), inside.id.as_str()]);

        let placed = repo.fetch_placed_between(at(1, 0), at(3, 0)).await.unwrap();
        assert_eq!(placed.len(), 3);
    }

    #[tokio::test]
    async fn test_recent_since_newest_first_with_limit() {
        let db = db().await;
        let repo = db.orders();
        for day in 1..=4 {
            repo.insert(&order("A", day, OrderStatus::Pending)).await.unwrap();
        }

        let recent = repo.recent_since(at(2, 0), 2).await.unwrap();
        let days: Vec<DateTime<Utc>> = recent.iter().filter_map(|o| o.date).collect();
        assert_eq!(days, vec![at(4, 12), at(3, 12)]);
    }

    #[tokio::test]
    async fn test_writes_publish_changes() {
        let db = db().await;
        let mut feed = db.subscribe_changes();
        let repo = db.orders();

        let o = order("Juan", 3, OrderStatus::Preparing);
        repo.insert(&o).await.unwrap();
        let updated = repo.update_status(&o.id, OrderStatus::Delivered).await.unwrap();
        repo.delete(&o.id).await.unwrap();

        let added = feed.recv().await.unwrap();
        assert_eq!(added.kind, ChangeKind::Added);
        let modified = feed.recv().await.unwrap();
        assert_eq!(modified.kind, ChangeKind::Modified);
        assert_eq!(modified.order.status, OrderStatus::Delivered);
        assert_eq!(updated.status, OrderStatus::Delivered);
        assert_eq!(feed.recv().await.unwrap().kind, ChangeKind::Removed);
    }

    #[tokio::test]
    async fn test_update_missing_order_is_not_found() {
        let db = db().await;
        let err = db
            .orders()
            .update_status("missing", OrderStatus::Delivered)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_lenient_decoding_of_foreign_rows() {
        let db = db().await;
        sqlx::query(
            "INSERT INTO orders (id, status, total_cents, placed_at_ms, payment_method, \
             recipient, items_json, updated_at_ms) \
             VALUES ('x', 'OutForDelivery', 500, NULL, 'GCash', 'Ana', 'not json', 0)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let o = db.orders().get_by_id("x").await.unwrap().unwrap();
        assert_eq!(o.status, OrderStatus::Unknown);
        assert_eq!(o.payment_method, None);
        assert_eq!(o.items, None);
        assert_eq!(o.date, None);
    }
}
