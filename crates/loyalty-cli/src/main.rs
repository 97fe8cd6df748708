use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use loyalty_client::{
    AccountContext, AccountRole, ConfirmationPoller, FeePolicy, InvocationOutcome,
    JsonRpcTransport, LoyaltyClient, LoyaltyConfig, NetworkClient, PollConfig, ReadInvoker,
    RetryPolicy, TransportConfig, UNIVERSAL_DEPLOYER_ADDRESS,
};
use loyalty_codec::U256;
use loyalty_crypto::StarkKeySigner;
use loyalty_types::{felt_from_hex, ClassHash, ContractAddress, Felt, ResourceBounds, TxHash};
use serde_json::json;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "loyalty-cli", about = "Loyalty platform on-chain operations")]
struct Cli {
    /// StarkNet JSON-RPC endpoint.
    #[arg(long, env = "LOYALTY_RPC_URL", default_value = "http://127.0.0.1:5050/rpc")]
    rpc_url: String,

    /// Per-request timeout in milliseconds.
    #[arg(long, env = "LOYALTY_REQUEST_TIMEOUT_MS", default_value = "10000")]
    request_timeout_ms: u64,

    /// Retries for transient transport failures.
    #[arg(long, default_value = "2")]
    max_retries: u32,

    /// Seconds between confirmation status checks.
    #[arg(long, env = "LOYALTY_POLL_INTERVAL_SECS", default_value = "5")]
    poll_interval_secs: u64,

    /// Status checks before giving up on confirmation.
    #[arg(long, env = "LOYALTY_POLL_ATTEMPTS", default_value = "5")]
    poll_attempts: u32,

    /// Default L1 gas amount bound for invocations.
    #[arg(long, default_value = "50000")]
    l1_gas_max_amount: u64,

    /// Default L1 gas price bound (fri per unit).
    #[arg(long, default_value = "100000000000000")]
    l1_gas_max_price: u128,

    #[command(flatten)]
    operator: OperatorArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct OperatorArgs {
    /// Operator account address (pays for provisioning, funding and minting).
    #[arg(long, env = "LOYALTY_OPERATOR_ADDRESS")]
    operator_address: Option<ContractAddress>,

    /// Operator signing key.
    #[arg(long, env = "LOYALTY_OPERATOR_PRIVATE_KEY", hide_env_values = true)]
    operator_private_key: Option<String>,

    /// Fee token used by `fund`.
    #[arg(long, env = "LOYALTY_FEE_TOKEN")]
    fee_token: Option<ContractAddress>,

    /// Account class deployed by `provision`.
    #[arg(long, env = "LOYALTY_ACCOUNT_CLASS_HASH")]
    account_class_hash: Option<ClassHash>,

    #[arg(long, env = "LOYALTY_UNIVERSAL_DEPLOYER", default_value = UNIVERSAL_DEPLOYER_ADDRESS)]
    universal_deployer: ContractAddress,
}

#[derive(Args, Debug)]
struct HolderArgs {
    /// Account that signs the transaction.
    #[arg(long)]
    holder: ContractAddress,

    #[arg(long, env = "LOYALTY_HOLDER_PRIVATE_KEY", hide_env_values = true)]
    holder_private_key: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Wait for a transaction to reach a final status.
    TxStatus {
        #[arg(long)]
        tx_hash: TxHash,
    },
    DescribeCollectible {
        #[arg(long)]
        contract: ContractAddress,
    },
    DescribePoints {
        #[arg(long)]
        contract: ContractAddress,
    },
    /// Points balance of `owner`.
    Balance {
        #[arg(long)]
        points: ContractAddress,
        #[arg(long)]
        owner: ContractAddress,
    },
    /// Deploy a user or merchant account for `public_key`.
    Provision {
        #[arg(long, value_parser = parse_felt)]
        public_key: Felt,
        #[arg(long, value_parser = parse_felt)]
        salt: Felt,
    },
    /// Send fee tokens from the operator.
    Fund {
        #[arg(long)]
        recipient: ContractAddress,
        #[arg(long)]
        amount: U256,
    },
    MintPoints {
        #[arg(long)]
        points: ContractAddress,
        #[arg(long)]
        recipient: ContractAddress,
        #[arg(long)]
        amount: U256,
    },
    TransferPoints {
        #[command(flatten)]
        holder: HolderArgs,
        #[arg(long)]
        points: ContractAddress,
        #[arg(long)]
        recipient: ContractAddress,
        #[arg(long)]
        amount: U256,
    },
    BurnPoints {
        #[command(flatten)]
        holder: HolderArgs,
        #[arg(long)]
        points: ContractAddress,
        #[arg(long)]
        amount: U256,
    },
    MintCollectible {
        #[arg(long)]
        collectible: ContractAddress,
        #[arg(long)]
        recipient: ContractAddress,
        #[arg(long)]
        token_id: U256,
        #[arg(long)]
        amount: U256,
    },
    RedeemCollectible {
        #[command(flatten)]
        holder: HolderArgs,
        #[arg(long)]
        collectible: ContractAddress,
        #[arg(long)]
        token_id: U256,
        #[arg(long)]
        amount: U256,
    },
    PurchaseCollectible {
        #[command(flatten)]
        holder: HolderArgs,
        #[arg(long)]
        collectible: ContractAddress,
        #[arg(long)]
        token_id: U256,
        #[arg(long)]
        amount: U256,
    },
}

fn parse_felt(raw: &str) -> Result<Felt, String> {
    felt_from_hex(raw).map_err(|err| err.to_string())
}

impl Cli {
    fn poll_config(&self) -> PollConfig {
        let interval = Duration::from_secs(self.poll_interval_secs);
        PollConfig {
            interval,
            max_attempts: self.poll_attempts,
            deadline: interval * self.poll_attempts + Duration::from_secs(30),
        }
    }

    fn fee_policy(&self) -> FeePolicy {
        FeePolicy {
            l1_gas: ResourceBounds {
                max_amount: self.l1_gas_max_amount,
                max_price_per_unit: self.l1_gas_max_price,
            },
            ..FeePolicy::default()
        }
    }
}

async fn connect_account(
    network: &JsonRpcTransport,
    address: ContractAddress,
    private_key: &str,
    role: AccountRole,
) -> Result<AccountContext, Box<dyn std::error::Error>> {
    let signer = StarkKeySigner::from_hex(private_key)?;
    Ok(AccountContext::connect(network, address, signer, role).await?)
}

async fn loyalty_client(
    cli: &Cli,
    network: Arc<JsonRpcTransport>,
) -> Result<LoyaltyClient<JsonRpcTransport>, Box<dyn std::error::Error>> {
    let operator = &cli.operator;
    let address = operator
        .operator_address
        .ok_or("--operator-address is required")?;
    let private_key = operator
        .operator_private_key
        .as_deref()
        .ok_or("--operator-private-key is required")?;
    let account = connect_account(&network, address, private_key, AccountRole::Operator).await?;
    let config = LoyaltyConfig {
        fee_token: operator.fee_token.unwrap_or_default(),
        universal_deployer: operator.universal_deployer,
        account_class_hash: operator.account_class_hash.unwrap_or_default(),
    };
    Ok(LoyaltyClient::new(
        network,
        account,
        config,
        cli.fee_policy(),
        cli.poll_config(),
    ))
}

fn outcome_json(outcome: &InvocationOutcome) -> serde_json::Value {
    json!({
        "tx_hash": outcome.tx_hash,
        "nonce": outcome.nonce,
        "receipt": outcome.receipt,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let network = Arc::new(JsonRpcTransport::new(TransportConfig {
        rpc_url: cli.rpc_url.clone(),
        request_timeout_ms: cli.request_timeout_ms,
        retry_policy: RetryPolicy {
            max_retries: cli.max_retries,
            ..RetryPolicy::default()
        },
    })?);
    let chain_id = network.chain_id().await?;
    info!(rpc_url = %cli.rpc_url, chain_id = %chain_id, "connected");

    let output = match &cli.command {
        Command::TxStatus { tx_hash } => {
            let poller = ConfirmationPoller::new(Arc::clone(&network), cli.poll_config());
            let receipt = poller.wait_for(*tx_hash).await?;
            serde_json::to_value(receipt)?
        }
        Command::DescribeCollectible { contract } => {
            let details = ReadInvoker::new(Arc::clone(&network))
                .describe_collectible(*contract)
                .await?;
            serde_json::to_value(details)?
        }
        Command::DescribePoints { contract } => {
            let details = ReadInvoker::new(Arc::clone(&network))
                .describe_points(*contract)
                .await?;
            serde_json::to_value(details)?
        }
        Command::Balance { points, owner } => {
            let balance = ReadInvoker::new(Arc::clone(&network))
                .balance_of(*points, *owner)
                .await?;
            json!({ "owner": owner, "balance": balance })
        }
        Command::Provision { public_key, salt } => {
            if cli.operator.account_class_hash.is_none() {
                return Err("--account-class-hash is required for provision".into());
            }
            let client = loyalty_client(&cli, Arc::clone(&network)).await?;
            let provisioned = client.provision_account(*public_key, *salt).await?;
            json!({
                "address": provisioned.address,
                "deployment": outcome_json(&provisioned.outcome),
            })
        }
        Command::Fund { recipient, amount } => {
            if cli.operator.fee_token.is_none() {
                return Err("--fee-token is required for fund".into());
            }
            let client = loyalty_client(&cli, Arc::clone(&network)).await?;
            outcome_json(&client.fund_account(*recipient, *amount).await?)
        }
        Command::MintPoints {
            points,
            recipient,
            amount,
        } => {
            let client = loyalty_client(&cli, Arc::clone(&network)).await?;
            outcome_json(&client.mint_points(*points, *recipient, *amount).await?)
        }
        Command::TransferPoints {
            holder,
            points,
            recipient,
            amount,
        } => {
            let client = loyalty_client(&cli, Arc::clone(&network)).await?;
            let account = connect_account(
                &network,
                holder.holder,
                &holder.holder_private_key,
                AccountRole::Principal,
            )
            .await?;
            outcome_json(
                &client
                    .transfer_points(&account, *points, *recipient, *amount)
                    .await?,
            )
        }
        Command::BurnPoints {
            holder,
            points,
            amount,
        } => {
            let client = loyalty_client(&cli, Arc::clone(&network)).await?;
            let account = connect_account(
                &network,
                holder.holder,
                &holder.holder_private_key,
                AccountRole::Principal,
            )
            .await?;
            outcome_json(&client.burn_points(&account, *points, *amount).await?)
        }
        Command::MintCollectible {
            collectible,
            recipient,
            token_id,
            amount,
        } => {
            let client = loyalty_client(&cli, Arc::clone(&network)).await?;
            outcome_json(
                &client
                    .mint_collectible(*collectible, *recipient, *token_id, *amount)
                    .await?,
            )
        }
        Command::RedeemCollectible {
            holder,
            collectible,
            token_id,
            amount,
        } => {
            let client = loyalty_client(&cli, Arc::clone(&network)).await?;
            let account = connect_account(
                &network,
                holder.holder,
                &holder.holder_private_key,
                AccountRole::Principal,
            )
            .await?;
            outcome_json(
                &client
                    .redeem_collectible(&account, *collectible, *token_id, *amount)
                    .await?,
            )
        }
        Command::PurchaseCollectible {
            holder,
            collectible,
            token_id,
            amount,
        } => {
            let client = loyalty_client(&cli, Arc::clone(&network)).await?;
            let account = connect_account(
                &network,
                holder.holder,
                &holder.holder_private_key,
                AccountRole::Principal,
            )
            .await?;
            outcome_json(
                &client
                    .purchase_collectible(&account, *collectible, *token_id, *amount)
                    .await?,
            )
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use loyalty_codec::U256;

    use super::{Cli, Command};

    #[test]
    fn parses_wide_amounts_and_addresses() {
        let cli = Cli::try_parse_from([
            "loyalty-cli",
            "mint-points",
            "--points",
            "0x9015",
            "--recipient",
            "0xb0b",
            "--amount",
            "340282366920938463463374607431768211456",
        ])
        .unwrap();
        match cli.command {
            Command::MintPoints { points, amount, .. } => {
                assert_eq!(
                    points.to_string(),
                    "0x0000000000000000000000000000000000000000000000000000000000009015"
                );
                assert_eq!(amount, U256::from_limbs(0, 1));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.poll_attempts, 5);
        assert_eq!(cli.poll_config().interval.as_secs(), 5);
    }

    #[test]
    fn rejects_negative_amount() {
        let err = Cli::try_parse_from([
            "loyalty-cli",
            "fund",
            "--recipient",
            "0xb0b",
            "--amount",
            "-5",
        ]);
        assert!(err.is_err());
    }
}
