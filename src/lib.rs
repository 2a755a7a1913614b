//! Appends yesterday's CJ commission transactions to a Google spreadsheet

pub mod commissions;
pub mod config;
pub mod data;
pub mod error;
pub mod job;
pub mod secrets;
pub mod server;
pub mod sheets;
