//! Point ledger and privilege benefits for a member loyalty program.
//!
//! - [`domain`] holds the pure ledger rules: lot allocation, balances, tiers and benefit
//!   computation.
//! - [`ports`] describes the record stores the ledger depends on, and [`adapters`] provides
//!   in-memory implementations.
//! - [`commands`] exposes the operations on [`commands::DomainLogic`], each running as a single
//!   unit of work per member.

pub mod adapters;
pub mod commands;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
