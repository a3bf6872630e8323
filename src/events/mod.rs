//! Notification system for user-facing events
//!
//! This module provides:
//! - `Level`: closed severity set (info, warn, error)
//! - `NotificationBus`: named-listener registry with synchronous broadcast
//! - `Notification`: owned record of one emission, for listeners that keep history

mod bus;
mod types;

pub use bus::{BusError, Handler, NotificationBus};
pub use types::{Level, Notification};
