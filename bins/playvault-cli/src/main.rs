//! playvault-cli — operator interface for Playvault key custody.
//!
//! Manages encrypted wallet records on local disk, signs messages through
//! a session key cache, verifies signatures, and previews swap plans.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use zeroize::Zeroizing;

use playvault_core::amount::TokenAmount;
use playvault_core::constants::NATIVE_TOKEN_ID;
use playvault_core::crypto::{KeyPair, PublicKey, SecretSeed, Signature};
use playvault_core::types::{AccountId, OwnerId, TokenInfo};
use playvault_swap::plan::build_plan;
use playvault_swap::quote::{QuoteInput, SwapQuote};
use playvault_wallet::{
    CredentialStore, EnvelopeKey, JsonFilePersistence, LocalWalletFetcher, NewWallet, SeedInput,
    SessionRegistry, SignPayload, SignRequest, Signer,
};

use crate::config::{CliConfig, LogFormat, default_config_path};

/// Playvault key custody command-line interface.
#[derive(Parser)]
#[command(name = "playvault-cli")]
#[command(version, about = "Encrypted wallet custody, signing and swap planning")]
struct Cli {
    /// Path to the configuration file (default: ~/.playvault/config.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a fresh envelope data key.
    DataKey,
    /// Wallet record management.
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },
    /// Sign a message with an owner's wallet.
    Sign(SignArgs),
    /// Verify an ed25519 signature.
    Verify(VerifyArgs),
    /// Preview the actions a swap would submit.
    Plan(PlanArgs),
}

#[derive(Subcommand)]
enum WalletAction {
    /// Generate and store a new wallet.
    Provision(ProvisionArgs),
    /// Store an existing seed.
    Import(ImportArgs),
    /// Show the public part of a wallet record.
    Show(OwnerArgs),
    /// Delete a wallet record.
    Revoke(OwnerArgs),
}

#[derive(Args)]
struct OwnerArgs {
    /// Owner id the wallet belongs to.
    #[arg(short, long)]
    owner: String,
}

#[derive(Args)]
struct ProvisionArgs {
    #[arg(short, long)]
    owner: String,

    /// Chain account id.
    #[arg(short, long)]
    account: String,

    /// Record lifetime in seconds (default: from configuration).
    #[arg(long)]
    ttl_secs: Option<i64>,
}

#[derive(Args)]
struct ImportArgs {
    #[arg(short, long)]
    owner: String,

    #[arg(short, long)]
    account: String,

    /// Record lifetime in seconds (default: from configuration).
    #[arg(long)]
    ttl_secs: Option<i64>,
}

#[derive(Args)]
struct SignArgs {
    #[arg(short, long)]
    owner: String,

    /// Message text to sign.
    #[arg(short, long, conflicts_with = "hex")]
    message: Option<String>,

    /// Hex-encoded message bytes to sign.
    #[arg(long)]
    hex: Option<String>,
}

#[derive(Args)]
struct VerifyArgs {
    /// Public key, `ed25519:<base58>`.
    #[arg(short, long)]
    public_key: String,

    /// Message text that was signed.
    #[arg(short, long)]
    message: String,

    /// Base64 signature.
    #[arg(short, long)]
    signature: String,
}

#[derive(Args)]
struct PlanArgs {
    /// Signing account id.
    #[arg(short, long)]
    account: String,

    /// Input token: `near` or `<contract>:<decimals>`.
    #[arg(long)]
    from: String,

    /// Output token: `near` or `<contract>:<decimals>`.
    #[arg(long)]
    to: String,

    /// Input amount, e.g. `1.5`.
    #[arg(long)]
    amount: String,

    /// Quoted output amount.
    #[arg(long)]
    expected_out: String,

    /// The account already has storage on the output token.
    #[arg(long)]
    registered: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let cfg = CliConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    init_tracing(cfg.log_format);

    match cli.command {
        Commands::DataKey => data_key(),
        Commands::Wallet { action } => match action {
            WalletAction::Provision(args) => wallet_provision(&cfg, args),
            WalletAction::Import(args) => wallet_import(&cfg, args),
            WalletAction::Show(args) => wallet_show(&cfg, args),
            WalletAction::Revoke(args) => wallet_revoke(&cfg, args),
        },
        Commands::Sign(args) => sign(&cfg, args).await,
        Commands::Verify(args) => verify(args),
        Commands::Plan(args) => plan(&cfg, args),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn open_store(cfg: &CliConfig) -> Result<CredentialStore<JsonFilePersistence>> {
    let persistence = JsonFilePersistence::open(&cfg.data_dir)
        .with_context(|| format!("Failed to open data dir {}", cfg.data_dir.display()))?;
    Ok(CredentialStore::new(persistence, cfg.envelope_key()?))
}

fn ttl(cfg: &CliConfig, override_secs: Option<i64>) -> Result<chrono::Duration> {
    match override_secs {
        Some(secs) if secs <= 0 => bail!("--ttl-secs must be positive"),
        Some(secs) => Ok(chrono::Duration::seconds(secs)),
        None => Ok(cfg.wallet_ttl()),
    }
}

/// Print a fresh data key. It is shown once and never stored.
fn data_key() -> Result<()> {
    let key = EnvelopeKey::generate();
    println!("{}", key.to_base64().as_str());
    eprintln!("Store this as PLAYVAULT__DATA_KEY. Losing it makes every record unreadable.");
    Ok(())
}

fn wallet_provision(cfg: &CliConfig, args: ProvisionArgs) -> Result<()> {
    let store = open_store(cfg)?;
    let record = store
        .provision(
            &OwnerId::new(args.owner),
            AccountId::new(args.account),
            cfg.network,
            ttl(cfg, args.ttl_secs)?,
        )
        .context("Failed to provision wallet")?;

    println!("Account:    {}", record.account_id);
    println!("Public key: {}", record.public_key);
    println!("Network:    {}", record.network);
    println!("Expires:    {}", record.expires_at.to_rfc3339());
    Ok(())
}

fn wallet_import(cfg: &CliConfig, args: ImportArgs) -> Result<()> {
    let store = open_store(cfg)?;
    let seed_hex = Zeroizing::new(prompt_password("Enter seed (64 hex characters)")?);
    let seed_bytes = Zeroizing::new(
        hex::decode(seed_hex.trim()).context("Seed must be hex-encoded")?,
    );
    let seed = SecretSeed::from_slice(&seed_bytes).context("Seed must be 32 bytes")?;
    let public_key = KeyPair::from_seed(&seed).public_key();

    let record = store
        .put(
            &OwnerId::new(args.owner),
            NewWallet {
                account_id: AccountId::new(args.account),
                public_key,
                seed: SeedInput::Plaintext(seed),
                network: cfg.network,
                expires_at: chrono::Utc::now() + ttl(cfg, args.ttl_secs)?,
            },
        )
        .context("Failed to store wallet")?;

    println!("Imported {} ({})", record.account_id, record.public_key);
    Ok(())
}

fn wallet_show(cfg: &CliConfig, args: OwnerArgs) -> Result<()> {
    let store = open_store(cfg)?;
    let record = store
        .get(&OwnerId::new(args.owner.as_str()))
        .with_context(|| format!("No wallet for {}", args.owner))?;

    println!("Owner:      {}", record.owner_id);
    println!("Account:    {}", record.account_id);
    println!("Public key: {}", record.public_key);
    println!("Network:    {}", record.network);
    println!("Created:    {}", record.created_at.to_rfc3339());
    println!("Last used:  {}", record.last_used_at.to_rfc3339());
    println!("Expires:    {}", record.expires_at.to_rfc3339());
    Ok(())
}

fn wallet_revoke(cfg: &CliConfig, args: OwnerArgs) -> Result<()> {
    let store = open_store(cfg)?;
    if store.revoke(&OwnerId::new(args.owner.as_str()))? {
        println!("Revoked wallet for {}", args.owner);
    } else {
        println!("No wallet for {}", args.owner);
    }
    Ok(())
}

async fn sign(cfg: &CliConfig, args: SignArgs) -> Result<()> {
    let message = match (args.message, args.hex) {
        (Some(text), None) => SignPayload::Text(text),
        (None, Some(hex_text)) => {
            SignPayload::Bytes(hex::decode(hex_text.trim()).context("--hex must be hex")?)
        }
        _ => bail!("Provide exactly one of --message or --hex"),
    };

    let store = Arc::new(open_store(cfg)?);
    let registry = SessionRegistry::new(Arc::new(LocalWalletFetcher::new(store, true)));
    let owner = OwnerId::new(args.owner);

    registry
        .login(&owner)
        .await
        .with_context(|| format!("Failed to load session for {owner}"))?;
    let response = registry.handle_sign(&SignRequest {
        owner_id: owner.clone(),
        message,
    });
    registry.logout(&owner);

    let response = response.context("Signing failed")?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn verify(args: VerifyArgs) -> Result<()> {
    let public_key: PublicKey = args.public_key.parse().context("Invalid public key")?;
    let signature = Signature::from_base64(&args.signature).context("Invalid signature")?;
    if Signer::verify(&public_key, args.message.as_bytes(), &signature) {
        println!("valid");
        Ok(())
    } else {
        bail!("signature does not verify")
    }
}

fn plan(cfg: &CliConfig, args: PlanArgs) -> Result<()> {
    let token_in = parse_token(&args.from)?;
    let token_out = parse_token(&args.to)?;
    let input = QuoteInput::new(&token_in, &token_out, &args.amount)?;
    let expected_out = TokenAmount::parse_human(&args.expected_out, token_out.decimals)
        .context("Invalid --expected-out")?;

    let quote = SwapQuote {
        token_in: input.token_in,
        token_out: input.token_out,
        amount_text: input.amount_text,
        amount_in: input.amount_in,
        expected_out,
        seq: 0,
    };
    let settings = cfg.swap_settings()?;
    let plan = build_plan(
        &quote,
        &settings,
        &AccountId::new(args.account),
        token_out.requires_registration && !token_out.is_native() && !args.registered,
    );

    println!("Amount in:       {}", plan.amount_in);
    println!("Expected out:    {}", plan.expected_out);
    println!(
        "Minimum receive: {} ({} bps slippage)",
        plan.minimum_receive,
        settings.slippage.bps()
    );
    let outlay = plan.native_outlay().context("Native outlay overflows")?;
    println!(
        "Native outlay:   {}",
        TokenAmount::from_minor(outlay, TokenInfo::native().decimals)
    );
    println!("{}", serde_json::to_string_pretty(&plan.actions)?);
    Ok(())
}

/// `near` or `<contract>:<decimals>`.
fn parse_token(text: &str) -> Result<TokenInfo> {
    if text.eq_ignore_ascii_case(NATIVE_TOKEN_ID) {
        return Ok(TokenInfo::native());
    }
    let Some((id, decimals)) = text.rsplit_once(':') else {
        bail!("Token must be '{NATIVE_TOKEN_ID}' or '<contract>:<decimals>', got '{text}'");
    };
    let decimals: u8 = decimals
        .parse()
        .with_context(|| format!("Invalid decimals in '{text}'"))?;
    let symbol = id.split('.').next().unwrap_or(id).to_uppercase();
    Ok(TokenInfo::fungible(id, symbol, decimals))
}

fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(format!("{prompt}: ")).context("Failed to read input")
}
