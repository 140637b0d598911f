//! Workspace umbrella crate.
//!
//! Host applications can depend on `upnext-workspace` with the
//! `desktop-shims` feature and reach the service façade from here, instead
//! of wiring `core-service` and `bridge-desktop` individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
