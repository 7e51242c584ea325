//! # CardSales Sync
//!
//! Offline write queue with background synchronization for CardSales Pro.
//!
//! Data-access code hands its writes to a [`SyncManager`]. When the remote
//! data store is reachable the write goes straight through; when it is not
//! (or the attempt fails) the write is appended to a durable queue and
//! replayed on a timer once connectivity returns. Nothing a failing remote
//! does ever surfaces as an error to the caller: the write simply stays
//! queued until it is delivered.
//!
//! ## Core Concepts
//!
//! ### Pending operations
//!
//! A [`PendingOperation`] is one insert, update or delete against a named
//! collection. The [`PendingQueue`] keeps them oldest first and is
//! rewritten in full to [`DurableStorage`] after every change.
//!
//! ### Collaborators
//!
//! - [`RemoteStore`] - the backing store (see [`HttpRemoteStore`])
//! - [`DurableStorage`] - where the queue lives between runs
//! - [`Connectivity`] - online/offline signal
//! - [`Notifier`] - user-facing toasts
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cardsales_sync::{
//!     payload_from_value, Connectivity, FileStorage, HttpConfig, HttpRemoteStore,
//!     OperationKind, SyncConfig, SyncManager, TracingNotifier,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let remote = HttpRemoteStore::new(&HttpConfig::new("http://localhost:3000"))?;
//! let manager = SyncManager::new(
//!     SyncConfig::default(),
//!     Arc::new(FileStorage::open("./data")?),
//!     Arc::new(remote),
//!     Arc::new(TracingNotifier),
//!     Connectivity::new(true),
//! );
//!
//! // Written now, or queued and synced later.
//! let record = manager
//!     .perform_operation(
//!         "customers",
//!         OperationKind::Insert,
//!         payload_from_value(json!({"name": "Asha", "cibil_score": 760})),
//!         None,
//!     )
//!     .await?;
//!
//! if record.is_none() {
//!     println!("{} change(s) waiting to sync", manager.pending_operations_count());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connectivity;
pub mod error;
pub mod global;
pub mod http;
pub mod manager;
pub mod notify;
pub mod operation;
pub mod queue;
pub mod remote;
pub mod storage;

// Re-export main types at crate root
pub use config::{ConfigError, HttpConfig, SyncConfig};
pub use connectivity::{Connectivity, ConnectivityProbe};
pub use error::{Error, RemoteError};
pub use http::HttpRemoteStore;
pub use manager::{SyncManager, SyncReport};
pub use notify::{ChannelNotifier, Level, Notification, Notifier, TracingNotifier};
pub use operation::{payload_from_value, OperationKind, PendingOperation, RecordId};
pub use queue::PendingQueue;
pub use remote::{dispatch, RemoteResult, RemoteStore};
pub use storage::{DurableStorage, FileStorage, MemoryStorage, NullStorage};

/// Type aliases for clarity
pub type CollectionName = String;
pub type Payload = serde_json::Map<String, serde_json::Value>;
