//! Orchestration services shared by the phase strategies.

pub mod auth_config;
pub mod context;
pub mod poller;
pub mod reporting;
pub mod scan_driver;
pub mod sequential;
pub mod staging;
pub mod threshold;
