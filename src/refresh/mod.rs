//! Rule refresh - replace engine state from remote sources or storage.
//!
//! Provides two entry points:
//! 1. **Remote refresh** (`RefreshService::refresh_all`): fetch rules and
//!    settings, swap them in, persist them
//! 2. **Startup restore** (`RefreshService::restore`): rebuild engine state
//!    from the persistent store
//!
//! Timing of refreshes is left to the host.

pub mod service;

pub use service::{RefreshReport, RefreshService, RefreshStats};
