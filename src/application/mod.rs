pub mod backtest;
pub mod engine;
