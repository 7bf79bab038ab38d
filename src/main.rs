use clap::{Parser, Subcommand};
use okxbot::application::backtest::Backtester;
use okxbot::application::engine::TradingEngine;
use okxbot::config::AppConfig;
use okxbot::domain::entities::alert::{Alert, AlertDirection};
use okxbot::domain::services::strategy_engine::StrategyKind;
use okxbot::infrastructure::gateway::MarketDataGateway;
use okxbot::infrastructure::okx_client::{OkxClient, OkxConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "okxbot", about = "Spot trading bot for the OKX exchange", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show journal statistics and open positions
    Status,
    /// Print the current price of a symbol
    Price { symbol: String },
    /// Market-buy a quote-currency amount of a symbol
    Buy { symbol: String, amount: f64 },
    /// Market-sell a base-unit size of a symbol
    Sell { symbol: String, size: f64 },
    /// Register a price alert
    Alert {
        symbol: String,
        price: f64,
        direction: AlertDirection,
    },
    /// List registered alerts
    Alerts,
    /// Show stop-loss and take-profit levels at the current price
    Tpsl { symbol: String },
    /// Execute exactly one tick
    Run,
    /// Run the trading loop until interrupted
    Loop {
        /// Override the tick interval in seconds
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Evaluate only the DCA strategy once
    Dca,
    /// Evaluate only the support strategy once
    Support,
    /// Evaluate only the resistance strategy once
    Resistance,
    /// Replay a CSV price series through the strategy engine
    Backtest {
        /// CSV file with timestamp,open,high,low,close columns
        #[arg(long)]
        data: PathBuf,
        /// Starting balance in quote currency
        #[arg(long, default_value_t = 1000.0)]
        balance: f64,
    },
}

fn build_engine(config: AppConfig) -> Result<TradingEngine<OkxClient, OkxClient>, Box<dyn std::error::Error>> {
    let okx = OkxClient::new(OkxConfig::from_env()?)?;
    Ok(TradingEngine::new(okx.clone(), okx, config)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "okxbot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;

    match cli.command {
        Command::Status => {
            let engine = build_engine(config.clone())?;
            let stats = engine.statistics();
            println!("trades: {} total, {} open, {} closed", stats.total_trades, stats.open_trades, stats.closed_trades);
            match stats.win_rate {
                Some(rate) => println!("win rate: {:.1}%", rate * 100.0),
                None => println!("win rate: n/a"),
            }
            match stats.profit_factor {
                Some(pf) => println!("profit factor: {:.2}", pf),
                None => println!("profit factor: inf"),
            }
            println!("total pnl: {:.2}", stats.total_pnl);
            for position in engine.journal().open_positions(&config.strategy.symbol) {
                println!(
                    "open: {} {} {:.6} @ {:.2}",
                    position.symbol, position.side, position.size.value(), position.entry_price.value()
                );
            }
        }
        Command::Price { symbol } => {
            let okx = OkxClient::new(OkxConfig::from_env().unwrap_or_else(|_| OkxConfig::anonymous()))?;
            let ticker = okx.get_ticker(&symbol).await?;
            println!("{}: {:.2} (24h high {:.2}, low {:.2})", symbol, ticker.last, ticker.high_24h, ticker.low_24h);
            if symbol == config.strategy.symbol {
                for level in &config.strategy.support.levels {
                    let distance = (ticker.last - level) / level * 100.0;
                    println!("  support {:.2}: {:+.2}%", level, distance);
                }
            }
        }
        Command::Buy { symbol, amount } => {
            let mut engine = build_engine(config)?;
            if engine.manual_buy(&symbol, amount).await? {
                println!("buy submitted");
            } else {
                println!("buy not submitted, see log");
            }
        }
        Command::Sell { symbol, size } => {
            let mut engine = build_engine(config)?;
            if engine.manual_sell(&symbol, size).await? {
                println!("sell submitted");
            } else {
                println!("sell not submitted, see log");
            }
        }
        Command::Alert { symbol, price, direction } => {
            let mut engine = build_engine(config)?;
            engine.alerts().add(Alert::new(symbol, price, direction)?)?;
            println!("alert registered");
        }
        Command::Alerts => {
            let mut engine = build_engine(config)?;
            for alert in engine.alerts().all() {
                println!(
                    "{} {} {:.2} [{}]",
                    alert.symbol,
                    alert.direction,
                    alert.threshold,
                    if alert.fired { "fired" } else { "armed" }
                );
            }
        }
        Command::Tpsl { symbol } => {
            let engine = build_engine(config)?;
            match engine.protective_levels(&symbol).await {
                Some((price, stop, target)) => {
                    println!("{}: price {:.2}, stop loss {:.2}, take profit {:.2}", symbol, price, stop, target);
                }
                None => println!("price unavailable for {}", symbol),
            }
        }
        Command::Run => {
            let mut engine = build_engine(config)?;
            let report = engine.tick().await?;
            info!(?report, "single tick finished");
        }
        Command::Loop { interval } => {
            if let Some(secs) = interval {
                config.engine.interval_secs = secs;
                config.validate()?;
            }
            let mut engine = build_engine(config)?;
            engine.run_loop().await?;
        }
        Command::Dca => {
            let mut engine = build_engine(config)?;
            let report = engine.tick_with_filter(Some(StrategyKind::Dca)).await?;
            info!(?report, "dca evaluation finished");
        }
        Command::Support => {
            let mut engine = build_engine(config)?;
            let report = engine.tick_with_filter(Some(StrategyKind::Support)).await?;
            info!(?report, "support evaluation finished");
        }
        Command::Resistance => {
            let mut engine = build_engine(config)?;
            let report = engine.tick_with_filter(Some(StrategyKind::Resistance)).await?;
            info!(?report, "resistance evaluation finished");
        }
        Command::Backtest { data, balance } => {
            let report = Backtester::new(config.clone(), balance).run_file(&data)?;
            let report_path = PathBuf::from(&config.engine.data_dir).join("backtest_report.json");
            okxbot::persistence::save_json(&report_path, &report)?;
            println!("ticks: {}", report.ticks);
            println!("buys: {}, sells: {}", report.buys, report.sells);
            println!("final equity: {:.2}", report.final_equity);
            println!("total return: {:.2}%", report.total_return * 100.0);
            match report.win_rate {
                Some(rate) => println!("win rate: {:.1}%", rate * 100.0),
                None => println!("win rate: n/a"),
            }
            match report.profit_factor {
                Some(pf) => println!("profit factor: {:.2}", pf),
                None => println!("profit factor: inf"),
            }
            println!("max drawdown: {:.2}%", report.max_drawdown * 100.0);
        }
    }
    Ok(())
}
