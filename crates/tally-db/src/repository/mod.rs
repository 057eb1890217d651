//! # Repository Module
//!
//! Database repository implementations for Tally.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Ingestion adapter / cache layer                                       │
//! │       │                                                                 │
//! │       │  db.orders().fetch_delivered_between(start, end)               │
//! │       ▼                                                                 │
//! │  OrderRepository                          CacheMirrorRepository        │
//! │  ├── insert / update_status / delete      ├── store (size-capped)      │
//! │  ├── fetch_delivered_between              ├── load_all                 │
//! │  ├── fetch_placed_between                 ├── remove / remove_category │
//! │  └── recent_since                         └── clear                    │
//! │       │                                        │                        │
//! │       ▼                                        ▼                        │
//! │  orders table                             analytics_cache table        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`OrderRepository`](order::OrderRepository) - Order reads/writes + change feed
//! - [`CacheMirrorRepository`](cache::CacheMirrorRepository) - Durable report cache

pub mod cache;
pub mod order;
