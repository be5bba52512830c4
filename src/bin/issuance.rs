//! Issuance Engine CLI
//!
//! Runs the engine against in-memory collaborators: mint/redeem scenarios,
//! the timelocked oracle migration, and configuration inspection.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::{style, Term};

use issuance::prelude::*;
use issuance::utils::constants::{COLLATERAL_DECIMALS, PRICE_DECIMALS};

/// Controlled issuance engine - oracle-priced mint/redeem with risk controls
#[derive(Parser)]
#[command(name = "issuance")]
#[command(version = issuance::VERSION)]
#[command(about = "Command-line interface for the issuance engine", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// JSON configuration file; defaults plus ISSUANCE_* variables when absent
    #[arg(short, long, env = "ISSUANCE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run mint/redeem rounds against in-memory collaborators
    Simulate {
        /// Oracle price with 6 decimals
        #[arg(short, long, default_value = "4500000000")]
        price: u64,

        /// Collateral per mint with 18 decimals
        #[arg(short = 'a', long, default_value = "1000000000000000000")]
        collateral: u128,

        /// Number of mint/redeem rounds
        #[arg(short, long, default_value = "3")]
        rounds: u32,

        /// Pseudo-fluctuation range in basis points (0 disables)
        #[arg(short, long, default_value = "0")]
        fluctuation_bps: u64,
    },

    /// Walk through propose / execute of an oracle replacement
    Migrate {
        /// Price quoted by the current oracle
        #[arg(long, default_value = "4500000000")]
        from_price: u64,

        /// Price quoted by the candidate oracle
        #[arg(long, default_value = "4550000000")]
        to_price: u64,
    },

    /// Print the effective configuration as JSON
    Config {
        /// Also write it to this file
        #[arg(short, long)]
        save: Option<PathBuf>,
    },
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let term = Term::stdout();

    if let Err(e) = run_command(&cli, &term) {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run_command(cli: &Cli, term: &Term) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    match &cli.command {
        Commands::Simulate {
            price,
            collateral,
            rounds,
            fluctuation_bps,
        } => cmd_simulate(cli, &config, *price, *collateral, *rounds, *fluctuation_bps, term),
        Commands::Migrate { from_price, to_price } => cmd_migrate(&config, *from_price, *to_price, term),
        Commands::Config { save } => cmd_config(&config, save.as_deref(), term),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => EngineConfig::from_env().context("reading ISSUANCE_* environment"),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE WIRING
// ═══════════════════════════════════════════════════════════════════════════════

struct Engine {
    controller: IssuanceController,
    oracle: Arc<ConfigurableOracle>,
    ledger: Arc<TokenLedger>,
    bank: Arc<CollateralBank>,
    registry: Arc<IssuerRegistry>,
    roles: Arc<RoleRegistry>,
    clock: ManualClock,
    admin: Address,
}

fn build_engine(config: &EngineConfig, price: Price) -> anyhow::Result<Engine> {
    let admin = Address::from_label("admin");
    let address = Address::from_label("controller");
    let clock = ManualClock::new(SystemClock.now());

    let roles = Arc::new(RoleRegistry::with_admin(admin));
    roles.grant_role(&admin, Role::Controller, address)?;

    let oracle = Arc::new(ConfigurableOracle::new(
        Address::from_label("oracle"),
        price,
        roles.clone(),
        Arc::new(clock.clone()),
    ));
    let ledger = Arc::new(TokenLedger::new("USDX", roles.clone()));
    let bank = Arc::new(CollateralBank::new());
    let registry = Arc::new(IssuerRegistry::new(
        &config.registry,
        roles.clone(),
        Arc::new(clock.clone()),
    ));
    registry.add_issuer(&admin, address, "simulation", config.registry.global_daily_limit)?;

    let controller = IssuanceController::new(
        address,
        config.controller.clone(),
        oracle.clone(),
        ledger.clone(),
        Arc::new(bank.account(address)),
        roles.clone(),
        Arc::new(clock.clone()),
    )?
    .with_registry(registry.clone(), address);

    Ok(Engine {
        controller,
        oracle,
        ledger,
        bank,
        registry,
        roles,
        clock,
        admin,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_simulate(
    cli: &Cli,
    config: &EngineConfig,
    price: u64,
    collateral: u128,
    rounds: u32,
    fluctuation_bps: u64,
    term: &Term,
) -> anyhow::Result<()> {
    let engine = build_engine(config, price)?;
    let user = Address::from_label("user");
    let cooldown = config.controller.cooldown_secs;

    if fluctuation_bps > 0 {
        engine.oracle.enable_fluctuation(
            &engine.admin,
            fluctuation_bps,
            config.oracle.fluctuation_window_secs,
        )?;
    }

    term.write_line(&format!(
        "{} Simulating {} rounds at {} (cooldown {}s)",
        style("→").cyan(),
        rounds,
        style(format_units(price as u128, PRICE_DECIMALS)).green().bold(),
        cooldown
    ))?;

    for round in 1..=rounds {
        // The user deposits, then the mint pulls the deposit
        engine.bank.credit(&user, collateral);
        match engine.controller.mint(&user, collateral) {
            Ok(issued) => term.write_line(&format!(
                "  {} round {}: minted {} for {} collateral",
                style("✓").green(),
                round,
                style(format_units(issued, PRICE_DECIMALS)).green(),
                format_units(collateral, COLLATERAL_DECIMALS)
            ))?,
            Err(e) => term.write_line(&format!(
                "  {} round {}: mint rejected: {}",
                style("⚠").yellow(),
                round,
                e
            ))?,
        }

        engine.clock.advance(cooldown.max(1));
        let half = engine.ledger.balance_of(&user) / 2;
        if half > 0 {
            match engine.controller.redeem(&user, half) {
                Ok(out) => term.write_line(&format!(
                    "  {} round {}: redeemed {} for {} collateral",
                    style("✓").green(),
                    round,
                    format_units(half, PRICE_DECIMALS),
                    style(format_units(out, COLLATERAL_DECIMALS)).yellow()
                ))?,
                Err(e) => term.write_line(&format!(
                    "  {} round {}: redeem rejected: {}",
                    style("⚠").yellow(),
                    round,
                    e
                ))?,
            }
        }
        engine.clock.advance(cooldown.max(1));
    }

    term.write_line(&format!("\n{} Final state", style("ℹ").blue()))?;
    term.write_line(&format!(
        "  Reserve:        {}",
        format_units(engine.controller.reserve_balance(), COLLATERAL_DECIMALS)
    ))?;
    term.write_line(&format!(
        "  Supply:         {}",
        format_units(engine.ledger.total_supply(), PRICE_DECIMALS)
    ))?;
    term.write_line(&format!(
        "  User balance:   {}",
        format_units(engine.ledger.balance_of(&user), PRICE_DECIMALS)
    ))?;
    term.write_line(&format!(
        "  Global allowance left: {}",
        format_units(engine.registry.get_remaining_global_limit(), PRICE_DECIMALS)
    ))?;
    term.write_line(&format!(
        "  Last price:     {}",
        format_units(engine.controller.price_history().last_price as u128, PRICE_DECIMALS)
    ))?;

    if cli.verbose {
        term.write_line(&format!("\n{} Events", style("ℹ").blue()))?;
        for event in engine.controller.events() {
            term.write_line(&format!("  {}", serde_json::to_string(&event)?))?;
        }
    }
    Ok(())
}

fn cmd_migrate(config: &EngineConfig, from_price: u64, to_price: u64, term: &Term) -> anyhow::Result<()> {
    let engine = build_engine(config, from_price)?;
    let candidate = Arc::new(ConfigurableOracle::new(
        Address::from_label("oracle-next"),
        to_price,
        engine.roles.clone(),
        Arc::new(engine.clock.clone()),
    ));

    let eta = engine.controller.propose_oracle(&engine.admin, candidate)?;
    term.write_line(&format!(
        "{} Proposed {} (eta {})",
        style("→").cyan(),
        style(Address::from_label("oracle-next").short()).yellow(),
        eta
    ))?;

    engine.clock.set(eta - 1);
    match engine.controller.execute_oracle(&engine.admin) {
        Ok(_) => anyhow::bail!("oracle activated before its eta"),
        Err(e) => term.write_line(&format!("  {} one second early: {}", style("✓").green(), e))?,
    }

    engine.clock.set(eta);
    let price = engine.controller.execute_oracle(&engine.admin)?;
    term.write_line(&format!(
        "  {} activated at eta, first price {}",
        style("✓").green(),
        style(format_units(price as u128, PRICE_DECIMALS)).green().bold()
    ))?;

    match engine.controller.execute_oracle(&engine.admin) {
        Ok(_) => anyhow::bail!("oracle activated twice"),
        Err(e) => term.write_line(&format!("  {} repeat execute: {}", style("✓").green(), e))?,
    }

    term.write_line(&format!(
        "{} Active oracle: {}",
        style("ℹ").blue(),
        engine.controller.active_oracle().description()
    ))?;
    Ok(())
}

fn cmd_config(config: &EngineConfig, save: Option<&std::path::Path>, term: &Term) -> anyhow::Result<()> {
    term.write_line(&serde_json::to_string_pretty(config)?)?;
    if let Some(path) = save {
        config.save(path)?;
        term.write_line(&format!(
            "{} Saved to {}",
            style("✓").green(),
            path.display()
        ))?;
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn format_units(amount: u128, decimals: u32) -> String {
    let scale = 10u128.pow(decimals);
    let whole = amount / scale;
    let frac = amount % scale;
    format!("{}.{:0width$}", whole, frac, width = decimals as usize)
}
