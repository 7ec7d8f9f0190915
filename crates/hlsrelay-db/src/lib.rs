//! hlsrelay-db: overlay storage on SQLite.
//!
//! Overlays are persisted with rusqlite behind an r2d2 connection pool.
//! The schema is created by embedded migrations when a pool is opened.
//!
//! # Modules
//!
//! - `migrations` - Versioned schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rows as Rust types
//! - `queries` - Overlay CRUD operations
//!
//! # Example
//!
//! ```
//! use hlsrelay_common::OverlayKind;
//! use hlsrelay_db::models::NewOverlay;
//! use hlsrelay_db::pool::{get_conn, init_memory_pool};
//! use hlsrelay_db::queries::overlays;
//!
//! let pool = init_memory_pool().unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let overlay = overlays::create_overlay(
//!     &conn,
//!     &NewOverlay::new("cam-1", OverlayKind::Text, "Lobby"),
//! )
//! .unwrap();
//! assert_eq!(overlays::list_overlays(&conn, Some("cam-1")).unwrap(), vec![overlay]);
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
