//! Application services: use-cases that orchestrate ports and domain logic.

pub mod sync_service;
