use bridge_quotes::{
    AggregatorError, BridgeQuoter, BridgeRequest, Config, DisplayPayload, RankedResult, Result,
};
use clap::{Parser, Subcommand};
use colored::*;
use comfy_table::{presets::UTF8_FULL, Table};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bridge")]
#[command(about = "Bridge quote aggregator - compare cross-chain bridge quotes across providers", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(short, long, global = true)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Quote a bridge command, e.g. `bridge quote 10 usdc from base to mantle`
    Quote {
        /// Command text; the leading "bridge" keyword is optional
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Run a follow-up action token (refresh or execute)
    Action {
        /// Token as shown under "Actions", e.g. r1:10:usdc:base:mantle
        token: String,
    },

    /// List supported chains and tokens
    Chains {
        /// Write the registry as JSON to this path
        #[arg(long)]
        export: Option<String>,
    },
}

#[derive(Serialize)]
struct QuoteReport<'a> {
    timestamp: String,
    request: &'a BridgeRequest,
    result: &'a RankedResult,
    payload: &'a DisplayPayload,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            eprintln!("\nCheck the provider and address settings in your .env file.");
            std::process::exit(1);
        }
    };

    let quoter = match BridgeQuoter::new(config) {
        Ok(quoter) => quoter,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Quote { text } => handle_quote(&quoter, &text.join(" "), cli.json).await,
        Commands::Action { token } => handle_action(&quoter, &token, cli.json).await,
        Commands::Chains { export } => handle_chains(&quoter, export.as_deref(), cli.json),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool, json: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.without_time().try_init()
    };

    if let Err(e) = installed {
        eprintln!("{} failed to install logger: {}", "Warning:".yellow().bold(), e);
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| AggregatorError::Other(anyhow::anyhow!("JSON error: {}", e)))
}

fn spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

async fn handle_quote(quoter: &BridgeQuoter, text: &str, json_output: bool) -> Result<()> {
    let text = if text.trim_start().to_lowercase().starts_with("bridge") {
        text.to_string()
    } else {
        format!("bridge {}", text)
    };

    let request = match quoter.try_parse(&text) {
        Ok(request) => request,
        Err(e) => {
            if json_output {
                println!("{}", serde_json::json!({"success": false, "error": e.to_string()}));
            } else {
                println!("\n{}", "━".repeat(60).bright_yellow());
                println!("  {}", "Command Not Understood".bright_yellow().bold());
                println!("{}", "━".repeat(60).bright_yellow());
                println!("  {}", e.to_string().bright_black());
                println!("\n  {}", "Usage:".bright_white().bold());
                println!("  {}", "bridge quote 10 usdc from base to mantle".bright_cyan());
                println!();
            }
            return Ok(());
        }
    };

    if !json_output {
        println!("\n{}", "━".repeat(60).bright_cyan());
        println!("  {}", "Searching for Bridge Quotes".bright_cyan().bold());
        println!("{}", "━".repeat(60).bright_cyan());
        println!(
            "  Amount:    {} {}",
            request.amount.bright_white().bold(),
            request.token.to_uppercase().bright_white()
        );
        println!("  Route:     {}", request.route_label().bright_yellow());
        println!(
            "  Providers: {}",
            quoter
                .providers()
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", ")
                .bright_black()
        );
        println!();
    }

    let progress = (!json_output).then(|| spinner("Querying providers...".to_string()));
    let result = quoter.quote(&request).await;
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    let payload = quoter.render(&request, &result);

    if json_output {
        let report = QuoteReport {
            timestamp: chrono::Utc::now().to_rfc3339(),
            request: &request,
            result: &result,
            payload: &payload,
        };
        println!("{}", to_json(&report)?);
    } else {
        print_ranked(&result);
        print_actions(&payload);
    }

    Ok(())
}

async fn handle_action(quoter: &BridgeQuoter, token: &str, json_output: bool) -> Result<()> {
    let progress = (!json_output).then(|| spinner(format!("Running {}...", token)));
    let payload = quoter.handle_action(token).await;
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    if json_output {
        println!("{}", to_json(&payload)?);
    } else {
        println!("\n{}", "━".repeat(60).bright_blue());
        println!("  {}", "Action Result".bright_blue().bold());
        println!("{}", "━".repeat(60).bright_blue());
        println!();
        for line in payload.text.lines() {
            println!("  {}", line);
        }
        println!();
        print_actions(&payload);
    }

    Ok(())
}

fn handle_chains(quoter: &BridgeQuoter, export: Option<&str>, json_output: bool) -> Result<()> {
    let registry = quoter.registry();

    if let Some(path) = export {
        registry.export_to_file(path)?;
        if json_output {
            println!("{}", serde_json::json!({"chains_exported": registry.len(), "path": path}));
        } else {
            println!("\n  {}", "Registry Exported".bright_green().bold());
            println!("  Chains:   {}", registry.len().to_string().bright_yellow().bold());
            println!("  Location: {}", path.bright_cyan());
            println!();
        }
        return Ok(());
    }

    if json_output {
        println!("{}", to_json(registry)?);
        return Ok(());
    }

    println!("\n{}", "━".repeat(60).bright_cyan());
    println!(
        "  {} - {} chains",
        "Supported Chains".bright_cyan().bold(),
        registry.len().to_string().bright_yellow().bold()
    );
    println!("{}", "━".repeat(60).bright_cyan());
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Chain".bright_white().bold().to_string(),
        "Chain ID".bright_white().bold().to_string(),
        "Tokens".bright_white().bold().to_string(),
        "RPC".bright_white().bold().to_string(),
    ]);

    for chain in registry.chains() {
        let tokens = chain
            .tokens
            .keys()
            .map(|t| t.to_uppercase())
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            chain.name.bright_cyan().to_string(),
            chain.chain_id.to_string(),
            tokens.bright_green().to_string(),
            chain
                .rpc_url
                .as_deref()
                .unwrap_or("-")
                .bright_black()
                .to_string(),
        ]);
    }

    println!("{}", table);
    println!();
    Ok(())
}

fn print_ranked(result: &RankedResult) {
    if !result.has_quotes() {
        println!("{}", "━".repeat(60).bright_red());
        println!("  {}", "No Quotes Available".bright_red().bold());
        println!("{}", "━".repeat(60).bright_red());
    } else {
        println!("{}", "━".repeat(60).bright_green());
        println!("  {}", "Ranked Quotes".bright_green().bold());
        println!("{}", "━".repeat(60).bright_green());
        println!();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec![
            "Rank".bright_white().bold().to_string(),
            "Provider".bright_white().bold().to_string(),
            "Output".bright_white().bold().to_string(),
            "Gas".bright_white().bold().to_string(),
            "Total Fees".bright_white().bold().to_string(),
            "Loss".bright_white().bold().to_string(),
            "Time".bright_white().bold().to_string(),
            "Score".bright_white().bold().to_string(),
        ]);

        for (ranking, outcome) in result.ranked_outcomes() {
            let Some(quote) = outcome.quote.as_ref() else {
                continue;
            };
            let rank = if ranking.rank == 1 {
                "⭐ 1".bright_yellow().bold().to_string()
            } else {
                ranking.rank.to_string()
            };
            let loss = format!("{}%", quote.bridge_loss_percentage);
            let loss = if quote.bridge_loss_percentage.is_sign_positive()
                && quote.bridge_loss_percentage > rust_decimal::Decimal::ONE
            {
                loss.bright_red()
            } else {
                loss.bright_green()
            };

            table.add_row(vec![
                rank,
                outcome.provider.as_str().bright_cyan().bold().to_string(),
                quote.dest_amount_formatted.bright_green().to_string(),
                format!("${}", quote.gas_fee_usd.round_dp(4)),
                quote
                    .total_fees_usd
                    .map(|t| format!("${}", t.round_dp(4)))
                    .unwrap_or_else(|| "-".to_string()),
                loss.to_string(),
                format!("{}s", quote.duration_seconds),
                format!("{:.4}", ranking.score).bright_yellow().to_string(),
            ]);
        }

        println!("{}", table);
    }

    let failures: Vec<_> = result.failures().collect();
    if !failures.is_empty() {
        println!();
        println!("  {}", "Unavailable:".bright_white().bold());
        for failure in failures {
            println!(
                "    {} {}: {}",
                "•".bright_red(),
                failure.provider.as_str().bright_white(),
                failure.error.as_deref().unwrap_or("unknown error").bright_black()
            );
        }
    }
    println!();
}

fn print_actions(payload: &DisplayPayload) {
    if payload.actions.is_empty() {
        return;
    }

    println!("{}", "━".repeat(60).bright_magenta());
    println!("  {}", "Actions".bright_magenta().bold());
    println!("{}", "━".repeat(60).bright_magenta());
    for action in &payload.actions {
        println!(
            "  {:<24} {}",
            action.label,
            format!("bridge action {}", action.data).bright_cyan()
        );
    }
    println!();
}
