//! # homesync-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement:
//!   - `AccessoryGateway`: inventory, subscriptions, reads and writes
//!     against the external home-automation framework
//!   - `EventPublisher`: fan-out of store change events
//! - Hold the **accessory state store** (latest readings, home selection,
//!   pending writes)
//! - Run the **automation engine** (window rule plus write de-duplication)
//! - Run the **sync service**, the single task allowed to mutate the store
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `homesync-domain` only (plus `tokio` for channels and tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod automation_engine;
pub mod event_bus;
pub mod ports;
pub mod services;
pub mod state_store;
