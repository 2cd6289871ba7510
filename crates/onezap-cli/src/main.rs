// ============================================================================
// onezap - CLI for the OneZap store and contracts
// ============================================================================
// Usage:
//   onezap stats                              Show database statistics
//   onezap list-content [--user ID]           List content (newest first)
//   onezap export --format json               Export full database as JSON
//   onezap prune [--dry-run]                  Prune expired sessions/nonces
//   onezap access SUBSCRIBER CREATOR          Check subscription access
//   onezap creator WALLET                     Look up a registered creator
//   onezap creator-count                      Number of registered creators
//   onezap register-creator USERNAME          Register the signer as creator
//   onezap subscribe CREATOR                  Approve (if needed) and subscribe
//   onezap withdraw ID [--immediate]          Request a withdrawal
//   onezap watch FEED                         Stream contract events until Ctrl-C
// ============================================================================

use anyhow::{anyhow, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use onezap_core::access::{format_token_amount, subscription_price};
use onezap_core::chain::{format_wallet, parse_wallet, WithdrawalType};
use onezap_core::events::{
    watch, ContractEvent, EventFilter, PenaltyDistributedEvent, SubscribedEvent, WatchHandle,
    WithdrawalProcessedEvent, WithdrawalRequestedEvent,
};
use onezap_core::submit::{confirmation_result, ApprovalMode, SubscribeOptions, SubscriptionSubmitter};
use onezap_core::{AccessResolver, Address, ChainClient, ContentDb, EthersChainClient, OneZapConfig, U256};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// OneZap store and contract tool
#[derive(Parser)]
#[command(name = "onezap", version, about = "Inspect the OneZap store and drive the subscription contracts")]
struct Cli {
    /// Path to the database file (default: ~/.onezap/onezap.redb)
    #[arg(long, global = true)]
    db_path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show database statistics (content, users, sessions)
    Stats,

    /// List content, newest first
    ListContent {
        /// Only content owned by this user id
        #[arg(long)]
        user: Option<String>,

        /// Only premium content
        #[arg(long)]
        premium: bool,
    },

    /// Export full database contents as JSON
    Export {
        /// Output format (currently only json is supported)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Delete expired sessions and sign-in nonces
    Prune {
        /// Show what would be pruned without actually deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Check whether SUBSCRIBER has access to CREATOR's premium content
    Access { subscriber: String, creator: String },

    /// Look up a creator in the registry
    Creator { wallet: String },

    /// Number of registered creators
    CreatorCount,

    /// Register (or with --update, rename) the signer as a creator
    RegisterCreator {
        username: String,

        /// Payout wallet (default: the signer)
        #[arg(long)]
        wallet: Option<String>,

        #[arg(long)]
        update: bool,
    },

    /// Subscribe the signer to CREATOR, approving the token first if needed
    Subscribe {
        creator: String,

        /// Send the approval without waiting for it to be mined
        #[arg(long)]
        no_wait_approval: bool,

        /// Skip the registry pre-check
        #[arg(long)]
        skip_registry_check: bool,
    },

    /// Request withdrawal of a subscription
    Withdraw {
        id: u64,

        /// Withdraw now and pay the penalty instead of at epoch end
        #[arg(long)]
        immediate: bool,
    },

    /// Print contract events as they arrive, until Ctrl-C
    Watch {
        #[arg(value_enum)]
        feed: Feed,

        /// Only events for this creator
        #[arg(long, conflicts_with = "subscriber")]
        creator: Option<String>,

        /// Only events for this subscriber
        #[arg(long)]
        subscriber: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Feed {
    Subscriptions,
    Withdrawals,
    Processed,
    Penalties,
}

fn format_timestamp_millis(ts: i64) -> String {
    Utc.timestamp_millis_opt(ts)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("(invalid: {})", ts))
}

fn wallet_arg(raw: &str) -> Result<Address> {
    parse_wallet(raw).map_err(|e| anyhow!("{}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = OneZapConfig::from_env();

    match cli.command {
        Commands::Stats => cmd_stats(&open_db(&cli.db_path, &config)?),
        Commands::ListContent { user, premium } => {
            cmd_list_content(&open_db(&cli.db_path, &config)?, user.as_deref(), premium)
        }
        Commands::Export { format } => cmd_export(&open_db(&cli.db_path, &config)?, &format),
        Commands::Prune { dry_run } => cmd_prune(&open_db(&cli.db_path, &config)?, dry_run),
        Commands::Access {
            subscriber,
            creator,
        } => cmd_access(&config, &subscriber, &creator).await,
        Commands::Creator { wallet } => cmd_creator(&config, &wallet).await,
        Commands::CreatorCount => cmd_creator_count(&config).await,
        Commands::RegisterCreator {
            username,
            wallet,
            update,
        } => cmd_register_creator(&config, &username, wallet.as_deref(), update).await,
        Commands::Subscribe {
            creator,
            no_wait_approval,
            skip_registry_check,
        } => cmd_subscribe(&config, &creator, no_wait_approval, skip_registry_check).await,
        Commands::Withdraw { id, immediate } => cmd_withdraw(&config, id, immediate).await,
        Commands::Watch {
            feed,
            creator,
            subscriber,
        } => cmd_watch(&config, feed, creator.as_deref(), subscriber.as_deref()).await,
    }
}

fn open_db(path: &Option<String>, config: &OneZapConfig) -> Result<ContentDb> {
    ContentDb::open(path.as_deref().or(config.db_path.as_deref()))
}

fn connect(config: &OneZapConfig) -> Result<Arc<dyn ChainClient>> {
    Ok(Arc::new(EthersChainClient::connect(&config.chain)?))
}

// ============================================================================
// Database commands
// ============================================================================

fn cmd_stats(db: &ContentDb) -> Result<()> {
    let stats = db.stats()?;

    println!("=== OneZap Database Stats ===");
    match db.path() {
        Some(path) => println!("Database: {}", path.display()),
        None => println!("Database: (in memory)"),
    }
    println!();
    println!("Content:  {} total, {} premium", stats.total_content, stats.premium_content);
    println!("Users:    {} total, {} with profile", stats.total_users, stats.users_with_profile);
    println!(
        "Sessions: {} active, {} expired",
        stats.active_sessions, stats.expired_sessions
    );
    println!("Nonces:   {} pending", stats.pending_nonces);

    Ok(())
}

fn cmd_list_content(db: &ContentDb, user: Option<&str>, premium_only: bool) -> Result<()> {
    let items: Vec<_> = db
        .list_content()?
        .into_iter()
        .filter(|c| user.map_or(true, |u| c.user_id == u))
        .filter(|c| !premium_only || c.is_premium)
        .collect();

    if items.is_empty() {
        println!("No content found.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<7}  {:<22}  {}",
        "CONTENT ID", "PREMIUM", "CREATED AT", "TITLE"
    );
    println!("{}", "-".repeat(90));

    for item in &items {
        let title = item.title.chars().take(30).collect::<String>();
        println!(
            "{:<36}  {:<7}  {:<22}  {}",
            item.id,
            if item.is_premium { "yes" } else { "no" },
            format_timestamp_millis(item.created_at),
            title
        );
    }

    println!("\nTotal: {} items", items.len());
    Ok(())
}

fn cmd_export(db: &ContentDb, format: &str) -> Result<()> {
    if format != "json" {
        anyhow::bail!("Unsupported format '{}'. Only 'json' is supported.", format);
    }

    // Session tokens are credentials; export only their metadata
    let sessions: Vec<_> = db
        .list_sessions()?
        .into_iter()
        .map(|s| {
            serde_json::json!({
                "user_id": s.user_id,
                "wallet_address": s.wallet_address,
                "created_at": s.created_at,
                "expires_at": s.expires_at,
            })
        })
        .collect();

    let export = serde_json::json!({
        "exported_at": Utc::now().to_rfc3339(),
        "stats": db.stats()?,
        "content": db.list_content()?,
        "users": db.list_users()?,
        "sessions": sessions,
    });

    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}

fn cmd_prune(db: &ContentDb, dry_run: bool) -> Result<()> {
    let now = Utc::now().timestamp();

    if dry_run {
        println!("=== DRY RUN: no data will be deleted ===\n");
        let report = db.count_expired(now)?;
        println!("Would prune {} expired sessions", report.sessions);
        println!("Would prune {} expired nonces", report.nonces);
    } else {
        let report = db.prune_expired(now)?;
        println!("Pruned {} expired sessions", report.sessions);
        println!("Pruned {} expired nonces", report.nonces);
    }

    Ok(())
}

// ============================================================================
// Chain commands
// ============================================================================

async fn cmd_access(config: &OneZapConfig, subscriber: &str, creator: &str) -> Result<()> {
    let subscriber = wallet_arg(subscriber)?;
    let creator = wallet_arg(creator)?;
    let resolver = AccessResolver::with_retry(connect(config)?, config.retry.clone());

    let granted = resolver.has_access(Some(subscriber), creator).await;
    println!(
        "{} -> {}: {}",
        format_wallet(&subscriber),
        format_wallet(&creator),
        if granted { "ACCESS" } else { "NO ACCESS" }
    );

    if granted {
        if let Some(record) = resolver.find_active_subscription(subscriber, creator).await? {
            println!("Subscription #{} ({})", record.subscription_id, record.status.label());
        }
    }
    Ok(())
}

async fn cmd_creator(config: &OneZapConfig, wallet: &str) -> Result<()> {
    let wallet = wallet_arg(wallet)?;
    let chain = connect(config)?;

    if !chain.is_creator(wallet).await? {
        println!("{} is not a registered creator", format_wallet(&wallet));
        return Ok(());
    }

    let record = chain.get_creator(wallet).await?;
    let decimals = chain.token_decimals().await?;
    println!("Username:       {}", record.username);
    println!("Wallet:         {}", format_wallet(&record.wallet));
    println!(
        "Total earnings: {}",
        format_token_amount(record.total_earnings, decimals)
    );
    Ok(())
}

async fn cmd_creator_count(config: &OneZapConfig) -> Result<()> {
    let count = connect(config)?.get_creator_count().await?;
    println!("{} registered creators", count);
    Ok(())
}

fn submitter(config: &OneZapConfig) -> Result<(SubscriptionSubmitter, Address)> {
    let chain = connect(config)?;
    let sender = chain
        .sender()
        .ok_or_else(|| anyhow!("ONEZAP_SIGNER_KEY is required for this command"))?;
    Ok((SubscriptionSubmitter::with_config(chain, config.retry.clone()), sender))
}

async fn cmd_register_creator(
    config: &OneZapConfig,
    username: &str,
    wallet: Option<&str>,
    update: bool,
) -> Result<()> {
    let (submitter, sender) = submitter(config)?;
    let wallet = wallet.map(wallet_arg).transpose()?.unwrap_or(sender);

    let hash = if update {
        submitter.update_creator(username, wallet).await?
    } else {
        submitter.register_creator(username, wallet).await?
    };
    println!("Submitted {:#x}, waiting for confirmation...", hash);

    let hash = confirmation_result(submitter.wait_for_confirmation(hash).await)?;
    println!("Confirmed {:#x}: {} -> {}", hash, username, format_wallet(&wallet));
    Ok(())
}

async fn cmd_subscribe(
    config: &OneZapConfig,
    creator: &str,
    no_wait_approval: bool,
    skip_registry_check: bool,
) -> Result<()> {
    let creator = wallet_arg(creator)?;
    let (submitter, _) = submitter(config)?;
    let decimals = submitter.chain().token_decimals().await?;
    let price = subscription_price(decimals)?;

    let options = SubscribeOptions {
        approval: if no_wait_approval {
            ApprovalMode::FireAndForget
        } else {
            ApprovalMode::WaitForConfirmation
        },
        check_registry: !skip_registry_check,
    };

    println!(
        "Subscribing to {} for {}",
        format_wallet(&creator),
        format_token_amount(price, decimals)
    );
    let submission = submitter.subscribe(creator, options).await?;
    if let Some(approval) = submission.approval {
        println!("Approval: {:#x}", approval);
    }
    println!("Subscribe: {:#x}, waiting for confirmation...", submission.subscribe);

    let hash = confirmation_result(submitter.wait_for_confirmation(submission.subscribe).await)?;
    println!("Confirmed {:#x}", hash);
    Ok(())
}

async fn cmd_withdraw(config: &OneZapConfig, id: u64, immediate: bool) -> Result<()> {
    let (submitter, _) = submitter(config)?;
    let withdrawal_type = if immediate {
        WithdrawalType::Immediate
    } else {
        WithdrawalType::CompleteEpoch
    };

    let hash = submitter
        .request_withdrawal(U256::from(id), withdrawal_type)
        .await?;
    println!(
        "Requested {} withdrawal of #{}: {:#x}",
        withdrawal_type.label(),
        id,
        hash
    );

    let hash = confirmation_result(submitter.wait_for_confirmation(hash).await)?;
    println!("Confirmed {:#x}", hash);
    Ok(())
}

async fn start_printer<E: ContractEvent + Serialize>(
    chain: Arc<dyn ChainClient>,
    filter: EventFilter,
    poll: Duration,
) -> Result<WatchHandle> {
    let handle = watch(chain, filter, poll, |event: E| {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("Could not render event: {}", e),
        }
    })
    .await?;
    Ok(handle)
}

async fn cmd_watch(
    config: &OneZapConfig,
    feed: Feed,
    creator: Option<&str>,
    subscriber: Option<&str>,
) -> Result<()> {
    let filter = match (creator, subscriber) {
        (Some(c), _) => EventFilter::Creator(wallet_arg(c)?),
        (None, Some(s)) => EventFilter::Subscriber(wallet_arg(s)?),
        (None, None) => EventFilter::All,
    };
    let chain = connect(config)?;
    let poll = Duration::from_millis(config.event_poll_ms);

    let handle = match feed {
        Feed::Subscriptions => start_printer::<SubscribedEvent>(chain, filter, poll).await?,
        Feed::Withdrawals => start_printer::<WithdrawalRequestedEvent>(chain, filter, poll).await?,
        Feed::Processed => start_printer::<WithdrawalProcessedEvent>(chain, filter, poll).await?,
        Feed::Penalties => start_printer::<PenaltyDistributedEvent>(chain, filter, poll).await?,
    };
    eprintln!("Watching, press Ctrl-C to stop");

    let signal = tokio::signal::ctrl_c().await;
    handle.unwatch();
    signal.map_err(|e| anyhow!("Failed to listen for Ctrl-C: {}", e))
}
