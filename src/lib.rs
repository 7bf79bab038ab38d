//! OKX spot/margin auto-trading bot
//!
//! This library provides the trading decision-and-execution engine: risk
//! management, trailing stops, price alerts, strategy evaluation (DCA,
//! support/resistance, grid) and the polling loop that ties them together
//! against the OKX REST API.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
