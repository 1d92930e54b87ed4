//! Event Outbox - Transactional outbox with at-least-once delivery
//!
//! Producers record events in an `outbox` table in the same transaction as
//! their domain changes. The relay drains pending rows, publishes them to the
//! broker with classified retries, and reports each outcome as metrics.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
