//! # homesync-domain
//!
//! Pure domain model for homesync, a shim that mirrors the state of remote
//! smart-home accessories and applies a window automation rule.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Homes** (accessory groupings with a hub state)
//! - Define **Accessories** (devices exposing temperature / window services)
//! - Define **Characteristics** (kinds, values, positions, readings)
//! - Define the **window rule** (temperature threshold → target position)
//! - Define **change events** published to the presentation layer
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod accessory;
pub mod automation;
pub mod characteristic;
pub mod event;
pub mod home;
