pub mod agent;
pub mod clients;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod logging;
pub mod pipeline;
pub mod workspace;
