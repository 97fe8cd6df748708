use std::sync::Arc;
use std::time::Duration;

use loyalty_client::{
    AccountContext, AccountRole, FeePolicy, LoyaltyClient, LoyaltyConfig, MockTransport,
    PollConfig,
};
use loyalty_codec::U256;
use loyalty_crypto::StarkKeySigner;
use loyalty_network_mock::DemoScenario;
use loyalty_types::{ClassHash, Felt};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_target(false)
        .compact()
        .init();

    let scenario = DemoScenario::new()?;
    let accounts = scenario.accounts;
    let transport = MockTransport::new(scenario.network.clone()).with_latency(Duration::from_millis(20));
    let operator = AccountContext::connect(
        &transport,
        accounts.operator,
        scenario.operator_key.clone(),
        AccountRole::Operator,
    )
    .await?;
    let client = LoyaltyClient::new(
        Arc::new(transport.clone()),
        operator,
        LoyaltyConfig {
            fee_token: accounts.fee_token,
            universal_deployer: accounts.universal_deployer,
            account_class_hash: ClassHash::new(Felt::from(0xacc0_u64)),
        },
        FeePolicy::default(),
        PollConfig {
            interval: Duration::from_millis(500),
            ..PollConfig::default()
        },
    );

    let details = client.describe_collectible(accounts.collectible).await?;
    info!(
        name = %details.name,
        issuer = %details.issuer,
        tokens = details.token_ids.len(),
        "collectible described"
    );
    for token in details.tokens() {
        info!(id = %token.token_id, price = %token.price, expiry = token.expiry_date, "{}", token.description);
    }

    info!("Provisioning a user account");
    let user_key = StarkKeySigner::from_private_key(Felt::from(0x5eed_u64))?;
    let provisioned = client
        .provision_account(user_key.public_key(), Felt::from(42u64))
        .await?;
    transport
        .network()
        .lock()
        .map_err(|_| "mock network poisoned")?
        .add_account(provisioned.address, user_key.public_key(), 0);
    info!(address = %provisioned.address, tx_hash = %provisioned.outcome.tx_hash, "account deployed");

    info!("Funding and minting concurrently from the operator");
    let (funded, minted) = tokio::join!(
        client.fund_account(provisioned.address, U256::from(1_000_000_000_000_000u64)),
        client.mint_points(accounts.points, provisioned.address, U256::from(250u64)),
    );
    info!(nonce = funded?.nonce, "funded");
    info!(nonce = minted?.nonce, "minted");

    let user = AccountContext::connect(&transport, provisioned.address, user_key, AccountRole::Principal).await?;
    let purchase = client
        .purchase_collectible(&user, accounts.collectible, U256::from(1u64), U256::from(1u64))
        .await?;
    info!(tx_hash = %purchase.tx_hash, fee = purchase.receipt.actual_fee, "collectible purchased");

    let balance = client
        .points_balance(accounts.points, accounts.principal)
        .await?;
    info!(balance = %balance, "principal points balance");

    Ok(())
}
