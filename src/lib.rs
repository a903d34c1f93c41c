pub mod browser;
pub mod config;
pub mod emissary;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod strategies;

#[cfg(test)]
pub(crate) mod testing;

pub use pipeline::{Pipeline, PipelineOutcome, StrategySelection};
pub use services::context::SessionContext;
