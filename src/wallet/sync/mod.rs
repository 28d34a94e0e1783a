//! Account Synchronization Module
//!
//! This module drives a transaction feed into an account. It is composed of several submodules,
//! each responsible for a specific aspect of the sync process:
//!
//! - `orchestrator`: The main entry point. It wires the services together and owns the config.
//! - `events`: Defines the event types and event handling traits used between sync components.
//! - `progress_tracker`: Tracks the chain head and counts observations for the run summary.
//! - `transaction_processor`: Decodes and checks the raw transactions carried by the feed.

/// Event system for decoupled communication during sync
pub mod events;
/// Main coordinator for the account sync process
pub mod orchestrator;
/// Tracks synchronization progress and statistics
pub mod progress_tracker;
/// Transaction parsing and validation service
pub mod transaction_processor;

pub use orchestrator::*;
