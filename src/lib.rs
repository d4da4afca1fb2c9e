pub mod app;
pub mod campaign;
pub mod classify;
pub mod config;
pub mod domain;
pub mod error;
pub mod geo;
pub mod join;
pub mod output;
pub mod package;
pub mod store;
pub mod units;
