//! Command-line scripts for vault transfers
//!
//! Credentials come from `FIREBLOCKS_API_KEY` and `FIREBLOCKS_SECRET_KEY`
//! (or `FIREBLOCKS_SECRET_KEY_PATH`), optionally through a `.env` file.
//! Transfers from one vault must run one at a time: each reads the pending
//! nonce of the vault address.

use clap::{Parser, Subcommand};
use eyre::{eyre, Result, WrapErr};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vault_transfer::service::SigningService;
use vault_transfer::{
    calculate_utxo_balance, filter_utxos_by_amount, select_utxos_for_amount, AlloyRpc, Amount,
    BtcDestination, BtcTransferIntent, FireblocksClient, NetworkConfig, PollingConfig,
    ResumeSigning, ServiceConfig, TransactionPoller, TransferEngine, TransferError,
    TransferIntent, TransferOutcome, TransferRequest, UtxoInput, UtxoTransferBuilder, VaultId,
    VaultWallet,
};

#[derive(Parser)]
#[command(name = "vault-transfer")]
#[command(about = "Move funds out of custodial vaults through the signing service")]
struct Cli {
    /// Delay between status checks, in milliseconds
    #[arg(long, global = true, default_value_t = 1_000)]
    poll_interval_ms: u64,

    /// Give up waiting after this many seconds
    #[arg(long, global = true, default_value_t = 600)]
    timeout_secs: u64,

    /// Do not cancel transactions that end FAILED/BLOCKED/REJECTED
    #[arg(long, global = true)]
    no_auto_cancel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Native, ERC-20 or internal vault-to-vault transfer
    Transfer {
        /// Source vault id
        #[arg(long)]
        vault: VaultId,
        /// Asset id in the signing service (e.g. ETH, USDC)
        #[arg(long)]
        asset: String,
        /// Amount in human units; 0 sends the full balance
        #[arg(long, default_value = "0")]
        amount: Amount,
        /// On-chain recipient address
        #[arg(long)]
        to: Option<String>,
        /// Destination vault for an internal transfer
        #[arg(long)]
        destination_vault: Option<VaultId>,
        /// ERC-20 token contract
        #[arg(long)]
        contract: Option<String>,
        /// Reference copied into the transaction note
        #[arg(long)]
        reference: Option<String>,
        /// Chain RPC endpoint (defaults to RPC_URL)
        #[arg(long)]
        rpc_url: Option<String>,
        /// Continue this earlier signing attempt instead of submitting a new one
        #[arg(long, value_name = "TRANSACTION_ID")]
        resume: Option<String>,
        /// Nonce of the resumed attempt, as logged when it was submitted
        #[arg(long, requires = "resume")]
        nonce: Option<u64>,
        /// Gas price in wei of the resumed attempt
        #[arg(long, requires = "resume")]
        gas_price: Option<u128>,
        /// Gas limit of the resumed attempt (ERC-20 only)
        #[arg(long, requires = "resume")]
        gas_limit: Option<u64>,
    },
    /// UTXO transfer to one or more vaults
    BtcTransfer {
        #[arg(long)]
        vault: VaultId,
        #[arg(long, default_value = "BTC")]
        asset: String,
        /// Destination as VAULT:AMOUNT, repeatable
        #[arg(long = "dest", value_parser = parse_destination, required = true)]
        destinations: Vec<BtcDestination>,
        /// Input to spend as TXHASH:INDEX, repeatable
        #[arg(long = "utxo", value_parser = parse_utxo)]
        utxos: Vec<UtxoInput>,
        #[arg(long)]
        reference: Option<String>,
    },
    /// List unspent outputs of a vault
    Utxos {
        #[arg(long)]
        vault: VaultId,
        #[arg(long, default_value = "BTC")]
        asset: String,
        /// Only show outputs worth at least this much
        #[arg(long)]
        min: Option<Decimal>,
        /// Show the largest-first selection covering this amount
        #[arg(long)]
        target: Option<Decimal>,
    },
    /// Show a transaction, optionally waiting for a terminal status
    Status {
        transaction_id: String,
        #[arg(long)]
        wait: bool,
    },
    /// Request cancellation of a transaction
    Cancel { transaction_id: String },
    /// Show the balance of an asset in a vault
    Balance {
        #[arg(long)]
        vault: VaultId,
        #[arg(long)]
        asset: String,
    },
    /// List deposit addresses of an asset in a vault
    Addresses {
        #[arg(long)]
        vault: VaultId,
        #[arg(long)]
        asset: String,
    },
}

fn parse_destination(raw: &str) -> std::result::Result<BtcDestination, String> {
    let (vault, amount) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected VAULT:AMOUNT, got '{}'", raw))?;
    Ok(BtcDestination::new(vault.trim(), amount.trim()))
}

fn parse_utxo(raw: &str) -> std::result::Result<UtxoInput, String> {
    let (tx_hash, index) = raw
        .rsplit_once(':')
        .ok_or_else(|| format!("expected TXHASH:INDEX, got '{}'", raw))?;
    let index = index
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid output index '{}': {}", index, e))?;
    Ok(UtxoInput::new(tx_hash.trim(), index))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = run(Cli::parse()).await;
    // the remote transaction may still finish; its id is needed to check or resume it
    if let Some(id) = result
        .as_ref()
        .err()
        .and_then(|err| err.downcast_ref::<TransferError>())
        .and_then(TransferError::transaction_id)
    {
        eprintln!("Transaction id: {}", id);
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    let polling = PollingConfig::default()
        .with_interval(Duration::from_millis(cli.poll_interval_ms))
        .with_timeout(Duration::from_secs(cli.timeout_secs))
        .with_auto_cancel(!cli.no_auto_cancel)
        .on_status_change(|id, status| println!("  {} -> {}", id, status));
    polling.validate()?;

    let config =
        ServiceConfig::from_env().wrap_err("Failed to load signing service credentials")?;
    let service = Arc::new(FireblocksClient::new(&config)?);

    match cli.command {
        Commands::Transfer {
            vault,
            asset,
            amount,
            to,
            destination_vault,
            contract,
            reference,
            rpc_url,
            resume,
            nonce,
            gas_price,
            gas_limit,
        } => {
            let mut request = TransferRequest::new(vault, asset.clone(), amount);
            if let Some(destination_vault) = destination_vault {
                request = request.with_destination_vault(destination_vault);
            }
            if let Some(to) = to {
                request = request.with_recipient(to);
            }
            if let Some(contract) = contract {
                request = request.with_contract(contract);
            }
            if let Some(reference) = reference {
                request = request.with_reference(reference);
            }
            if let Some(resume) = resume {
                let mut pinned = ResumeSigning::new(resume);
                if let Some(nonce) = nonce {
                    pinned = pinned.with_nonce(nonce);
                }
                if let Some(gas_price) = gas_price {
                    pinned = pinned.with_gas_price(gas_price);
                }
                if let Some(gas_limit) = gas_limit {
                    pinned = pinned.with_gas_limit(gas_limit);
                }
                request = request.with_resume(pinned);
            }
            // fail on bad input before any remote call
            let intent = request.intent()?;

            // exact internal moves need no chain, so UTXO assets work here too
            let ledger_only = matches!(intent, TransferIntent::Internal { .. })
                && matches!(intent.amount(), Amount::Exact(_));
            let engine = if ledger_only {
                TransferEngine::<_, AlloyRpc>::ledger(service, vault, asset.clone(), polling)
            } else {
                let network = match rpc_url {
                    Some(rpc_url) => NetworkConfig::new(rpc_url),
                    None => NetworkConfig::from_env()?,
                };
                let rpc = Arc::new(AlloyRpc::new(&network.rpc_url)?);
                let wallet = VaultWallet::connect(service.as_ref(), vault, &asset).await?;
                println!("Vault {} ({}) address: {}", vault, asset, wallet.address());
                TransferEngine::new(service, rpc, wallet, polling)
            };

            match engine.transfer(&request).await? {
                TransferOutcome::Internal { transaction, amount } => {
                    println!(
                        "Internal transfer of {} {} completed: {}",
                        amount, asset, transaction.id
                    );
                }
                TransferOutcome::Broadcast {
                    signing_transaction_id,
                    tx_hash,
                    amount,
                    ..
                } => {
                    println!(
                        "Signed via {} (amount {} base units)",
                        signing_transaction_id, amount
                    );
                    println!("Broadcast: {}", tx_hash);
                }
            }
        }
        Commands::BtcTransfer {
            vault,
            asset,
            destinations,
            utxos,
            reference,
        } => {
            let mut intent =
                BtcTransferIntent::new(vault, asset, destinations).with_utxos(utxos);
            if let Some(reference) = reference {
                intent = intent.with_reference(reference);
            }
            let builder = UtxoTransferBuilder::new(service, polling);
            let info = builder.sign_btc_transaction(&intent).await?;
            println!("Transaction {} completed", info.id);
            if let Some(tx_hash) = info.tx_hash {
                println!("Hash: {}", tx_hash);
            }
        }
        Commands::Utxos {
            vault,
            asset,
            min,
            target,
        } => {
            let builder = UtxoTransferBuilder::new(service, polling);
            let mut utxos = builder.get_available_utxos(vault, &asset).await?;
            if let Some(min) = min {
                utxos = filter_utxos_by_amount(&utxos, min);
            }
            for utxo in &utxos {
                println!(
                    "{}:{}  {}  {}",
                    utxo.tx_hash,
                    utxo.index,
                    utxo.amount_or_zero(),
                    utxo.address.as_deref().unwrap_or("-")
                );
            }
            println!(
                "{} outputs, total {} {}",
                utxos.len(),
                calculate_utxo_balance(&utxos)?,
                asset
            );

            if let Some(target) = target {
                let selected = select_utxos_for_amount(&utxos, target)?;
                let inputs: Vec<String> = selected
                    .iter()
                    .map(|u| format!("--utxo {}:{}", u.tx_hash, u.index))
                    .collect();
                println!(
                    "Selected {} outputs ({} {}): {}",
                    selected.len(),
                    calculate_utxo_balance(&selected)?,
                    asset,
                    inputs.join(" ")
                );
            }
        }
        Commands::Status {
            transaction_id,
            wait,
        } => {
            if wait {
                let result = TransactionPoller::new(service, polling)
                    .poll(&transaction_id)
                    .await?;
                println!(
                    "Transaction {} finished as {} ({:?}, cancelled: {})",
                    transaction_id,
                    result.final_status,
                    result.bucket(),
                    result.cancelled
                );
            } else {
                let info = service.get_transaction_by_id(&transaction_id).await?;
                println!("Transaction {}: {}", info.id, info.status);
                if let Some(sub_status) = info.sub_status {
                    println!("Sub-status: {}", sub_status);
                }
                if let Some(tx_hash) = info.tx_hash {
                    println!("Hash: {}", tx_hash);
                }
            }
        }
        Commands::Cancel { transaction_id } => {
            service.cancel_transaction_by_id(&transaction_id).await?;
            println!("Cancellation requested for {}", transaction_id);
        }
        Commands::Balance { vault, asset } => {
            let balance = service.get_vault_asset(vault, &asset).await?;
            println!(
                "Vault {} {}: total {}, available {}, pending {}",
                vault,
                balance.id,
                balance.total.as_deref().unwrap_or("0"),
                balance.available.as_deref().unwrap_or("0"),
                balance.pending.as_deref().unwrap_or("0")
            );
        }
        Commands::Addresses { vault, asset } => {
            let addresses = service.get_deposit_addresses(vault, &asset).await?;
            if addresses.is_empty() {
                return Err(eyre!("No deposit addresses for {} in vault {}", asset, vault));
            }
            for address in addresses {
                match address.tag {
                    Some(tag) if !tag.is_empty() => println!("{} (tag {})", address.address, tag),
                    _ => println!("{}", address.address),
                }
            }
        }
    }

    Ok(())
}
