pub mod risk_manager;
pub mod strategy_engine;
pub mod trailing_stop;
