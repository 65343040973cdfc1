pub mod config;
pub mod display;
pub mod features;
pub mod fetch;
pub mod ingest;
pub mod ledger;
pub mod pipeline;
pub mod portfolio;
pub mod sampler;
pub mod scoring;
