//! Complaint lifecycle and contractor-assignment engine for civic
//! infrastructure complaints (roads, sewage, sanitation).

pub mod assignment;
pub mod clock;
pub mod command;
pub mod complaint;
pub mod config;
pub mod contractor;
pub mod delay;
pub mod engine;
pub mod error;
pub mod event;
pub mod geo;
pub mod lifecycle;
pub mod notify;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod types;
