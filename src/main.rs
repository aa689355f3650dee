mod auth;
mod composer;
mod config;
mod error;
mod labels;
mod llm;
mod orchestrator;
mod providers;
mod scanner;
mod sender;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gmail-autoreply")]
#[command(about = "Reply automatically to unread Gmail messages from allow-listed senders")]
struct Cli {
    /// Dry run mode - show what would happen without sending or labelling
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the inbox once and reply to eligible messages (default)
    Run {
        /// Maximum number of unread messages to look at
        #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..))]
        max: Option<u32>,
    },
    /// Authorize Gmail access in the browser and cache the token
    Login,
    /// Show or change settings
    Config {
        /// Name of the label marking replied messages
        #[arg(long)]
        label: Option<String>,
        /// Allowed sender address (repeatable; replaces the current list)
        #[arg(long = "allow")]
        allow: Vec<String>,
        /// Reply body source: static or generated
        #[arg(long)]
        mode: Option<config::ReplyMode>,
        /// Default batch size
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max: Option<u32>,
        /// Model used for generated replies
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let dry_run = cli.dry_run;

    if dry_run {
        println!("🔍 DRY RUN MODE - no replies will be sent\n");
    }

    match cli.command.unwrap_or(Commands::Run { max: None }) {
        Commands::Run { max } => {
            commands::run(max, dry_run).await?;
        }
        Commands::Login => {
            commands::login().await?;
        }
        Commands::Config {
            label,
            allow,
            mode,
            max,
            model,
        } => {
            commands::config(label, allow, mode, max, model)?;
        }
    }

    Ok(())
}

mod commands {
    use crate::auth;
    use crate::composer::{self, ReplyWriter, StaticReply};
    use crate::config::{self, Config, ReplyMode};
    use crate::orchestrator::Orchestrator;
    use crate::providers::gmail::GmailProvider;
    use anyhow::Result;

    pub async fn run(max: Option<u32>, dry_run: bool) -> Result<()> {
        let mut cfg = Config::load()?;
        if let Some(max) = max {
            cfg.max_results = max;
        }
        if cfg.max_results == 0 {
            anyhow::bail!("max_results must be at least 1");
        }
        if cfg.allowed_senders.is_empty() {
            eprintln!("Warning: no allowed senders configured. Use 'gmail-autoreply config --allow <address>'");
        }

        // A dry run never calls the model, so it works without an API key
        let writer: Box<dyn ReplyWriter> = if dry_run && cfg.reply_mode == ReplyMode::Generated {
            Box::new(StaticReply)
        } else {
            composer::writer_for(&cfg)?
        };

        let access_token = auth::authenticate(&config::credentials_path(), &config::token_path(), false).await?;
        let gmail = GmailProvider::new(access_token);

        let report = Orchestrator::new(&gmail, writer.as_ref(), &cfg)
            .dry_run(dry_run)
            .run()
            .await?;

        if report.scanned > 0 {
            let verb = if dry_run { "would reply" } else { "replied" };
            println!(
                "Scanned {} | {} {} | skipped {} already replied, {} not allowed",
                report.scanned, verb, report.replied, report.already_replied, report.not_allowed
            );
        }
        Ok(())
    }

    pub async fn login() -> Result<()> {
        auth::authenticate(&config::credentials_path(), &config::token_path(), true).await?;
        println!("Gmail login successful! Token saved to {}", config::token_path().display());
        Ok(())
    }

    pub fn config(
        label: Option<String>,
        allow: Vec<String>,
        mode: Option<ReplyMode>,
        max: Option<u32>,
        model: Option<String>,
    ) -> Result<()> {
        let mut cfg = Config::load()?;
        let changed = label.is_some() || !allow.is_empty() || mode.is_some() || max.is_some() || model.is_some();

        if let Some(label) = label {
            cfg.label_name = label;
        }
        if !allow.is_empty() {
            cfg.allowed_senders = allow;
        }
        if let Some(mode) = mode {
            cfg.reply_mode = mode;
        }
        if let Some(max) = max {
            cfg.max_results = max;
        }
        if let Some(model) = model {
            cfg.model = model;
        }

        if changed {
            cfg.save()?;
            println!("Settings saved.");
        }

        println!("Current settings:");
        println!("  label:           {}", cfg.label_name);
        println!("  allowed senders: {}", cfg.allowed_senders.join(", "));
        println!("  reply mode:      {}", cfg.reply_mode);
        println!("  max results:     {}", cfg.max_results);
        println!("  model:           {}", cfg.model);
        Ok(())
    }
}
