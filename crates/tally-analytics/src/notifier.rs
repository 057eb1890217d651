//! # Change Notifier
//!
//! Watches the live order feed and keeps the report cache honest.
//!
//! ## Event Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Change Notifier Task                              │
//! │                                                                         │
//! │  start()                                                                │
//! │    ├── subscribe to feed                                                │
//! │    └── prime status memory: recent_orders(start_of_today, feed_limit)   │
//! │                                                                         │
//! │  OrderChange ──► Removed? ──► forget status                             │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  status became Delivered (was unknown or different)                     │
//! │  AND placed today?                                                      │
//! │        │ yes                                                            │
//! │        ▼                                                                │
//! │  invalidate Daily[today], all Monthly, all Product                      │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  wait callback_delay ──► every DeliveryListener                         │
//! │                                                                         │
//! │  Lagged ──► same invalidation (changes were missed)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The callback delay only gives dashboards time to finish a transition
//! animation; it does not affect correctness.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tally_core::{ChangeKind, Money, OrderChange, OrderStatus, ReportCalendar};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::cache::{CacheCategory, CacheStore};
use crate::clock::ReportClock;
use crate::config::NotifierSettings;
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::source::OrderFeed;

// =============================================================================
// Listener
// =============================================================================

/// An order placed today that just became Delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryEvent {
    pub order_id: String,
    pub recipient: String,
    pub total: Money,
    pub placed_at: DateTime<Utc>,
}

/// Called after the cache has been invalidated for a new delivery.
pub trait DeliveryListener: Send + Sync {
    fn on_order_delivered(&self, event: &DeliveryEvent);
}

impl<F> DeliveryListener for F
where
    F: Fn(&DeliveryEvent) + Send + Sync,
{
    fn on_order_delivered(&self, event: &DeliveryEvent) {
        self(event)
    }
}

/// Listener that does nothing.
pub struct NoOpListener;

impl DeliveryListener for NoOpListener {
    fn on_order_delivered(&self, _event: &DeliveryEvent) {}
}

// =============================================================================
// Handle
// =============================================================================

/// Handle for controlling a running notifier.
#[derive(Clone)]
pub struct NotifierHandle {
    cmd_tx: mpsc::Sender<NotifierCommand>,
}

enum NotifierCommand {
    /// Register a listener; acknowledged once it will see the next change.
    AddListener {
        listener: Arc<dyn DeliveryListener>,
        ack: oneshot::Sender<()>,
    },
    Shutdown,
}

impl NotifierHandle {
    /// Registers a listener for new deliveries.
    pub async fn on_order_delivered<L>(&self, listener: L) -> AnalyticsResult<()>
    where
        L: DeliveryListener + 'static,
    {
        let (ack, acked) = oneshot::channel();
        self.cmd_tx
            .send(NotifierCommand::AddListener {
                listener: Arc::new(listener),
                ack,
            })
            .await
            .map_err(|_| AnalyticsError::ChannelError("Notifier channel closed".into()))?;

        acked.await.map_err(|_| AnalyticsError::ShuttingDown)
    }

    /// Stops the notifier task.
    pub async fn shutdown(&self) -> AnalyticsResult<()> {
        self.cmd_tx
            .send(NotifierCommand::Shutdown)
            .await
            .map_err(|_| AnalyticsError::ChannelError("Notifier channel closed".into()))
    }

    /// True until the task has stopped.
    pub fn is_running(&self) -> bool {
        !self.cmd_tx.is_closed()
    }
}

// =============================================================================
// Notifier
// =============================================================================

/// Feed consumer that invalidates reports affected by new deliveries.
pub struct ChangeNotifier {
    feed: Arc<dyn OrderFeed>,
    cache: Arc<CacheStore>,
    settings: NotifierSettings,
    clock: ReportClock,
    listeners: Vec<Arc<dyn DeliveryListener>>,
    /// Last seen status per order, for the day in `statuses_day`.
    statuses: HashMap<String, OrderStatus>,
    statuses_day: Option<NaiveDate>,
}

impl ChangeNotifier {
    pub fn new(
        feed: Arc<dyn OrderFeed>,
        cache: Arc<CacheStore>,
        settings: NotifierSettings,
        clock: ReportClock,
    ) -> Self {
        ChangeNotifier {
            feed,
            cache,
            settings,
            clock,
            listeners: Vec::new(),
            statuses: HashMap::new(),
            statuses_day: None,
        }
    }

    /// Registers a listener before the task starts.
    pub fn with_listener(mut self, listener: impl DeliveryListener + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Subscribes, primes status memory and spawns the task.
    ///
    /// Changes published after this returns are guaranteed to be seen.
    pub async fn start(mut self) -> NotifierHandle {
        let changes = self.feed.subscribe();
        self.prime().await;

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        tokio::spawn(async move {
            self.run(changes, cmd_rx).await;
        });

        NotifierHandle { cmd_tx }
    }

    async fn prime(&mut self) {
        let calendar = self.clock.calendar();
        self.roll_day(&calendar);

        match self
            .feed
            .recent_orders(calendar.start_of_today(), self.settings.feed_limit)
            .await
        {
            Ok(orders) => {
                for order in orders {
                    self.statuses.insert(order.id, order.status);
                }
                debug!(primed = self.statuses.len(), "Primed order statuses");
            }
            Err(e) => {
                warn!(error = %e, "Failed to prime order statuses, every delivery will count as new");
            }
        }
    }

    /// Main notifier loop.
    async fn run(
        mut self,
        mut changes: broadcast::Receiver<OrderChange>,
        mut cmd_rx: mpsc::Receiver<NotifierCommand>,
    ) {
        info!(listeners = self.listeners.len(), "Change notifier started");

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(NotifierCommand::AddListener { listener, ack }) => {
                            self.listeners.push(listener);
                            let _ = ack.send(());
                        }
                        Some(NotifierCommand::Shutdown) | None => {
                            info!("Change notifier shutting down");
                            break;
                        }
                    }
                }
                change = changes.recv() => {
                    match change {
                        Ok(change) => self.handle_change(change).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Order feed lagged, invalidating today's reports");
                            let calendar = self.clock.calendar();
                            self.invalidate(&calendar).await;
                        }
                        Err(RecvError::Closed) => {
                            info!("Order feed closed, stopping change notifier");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn handle_change(&mut self, change: OrderChange) {
        let calendar = self.clock.calendar();
        self.roll_day(&calendar);

        let order = change.order;
        if change.kind == ChangeKind::Removed {
            self.statuses.remove(&order.id);
            return;
        }

        let previous = self.statuses.insert(order.id.clone(), order.status);
        if order.status != OrderStatus::Delivered || previous == Some(OrderStatus::Delivered) {
            return;
        }

        let Some(placed_at) = order.date.filter(|d| *d >= calendar.start_of_today()) else {
            debug!(order_id = %order.id, "Delivered order not placed today, ignoring");
            return;
        };

        info!(
            order_id = %order.id,
            total = %order.total(),
            "Order delivered, invalidating reports"
        );
        self.invalidate(&calendar).await;

        tokio::time::sleep(self.settings.callback_delay()).await;

        let event = DeliveryEvent {
            order_id: order.id,
            recipient: order.recipient,
            total: Money::from_cents(order.total_cents),
            placed_at,
        };
        for listener in &self.listeners {
            listener.on_order_delivered(&event);
        }
    }

    async fn invalidate(&self, calendar: &ReportCalendar) {
        let today = calendar.today().to_string();
        self.cache
            .invalidate(CacheCategory::Daily, Some(&today))
            .await;
        self.cache.invalidate(CacheCategory::Monthly, None).await;
        self.cache.invalidate(CacheCategory::Product, None).await;
    }

    /// Status memory only covers today; start over when the date changes.
    fn roll_day(&mut self, calendar: &ReportCalendar) {
        let today = calendar.today();
        if self.statuses_day != Some(today) {
            self.statuses.clear();
            self.statuses_day = Some(today);
        }
    }
}
