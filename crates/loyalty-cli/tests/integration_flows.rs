//! End-to-end loyalty flows against the in-memory network.

use std::sync::Arc;
use std::time::Duration;

use loyalty_client::{
    AccountContext, AccountError, AccountRole, FeePolicy, InvokeError, LoyaltyClient,
    LoyaltyConfig, MockTransport, PollConfig, ReadError,
};
use loyalty_codec::{canonicalize_address_str, Encode, U256, DESCRIBE_ENTRY_POINT};
use loyalty_crypto::StarkKeySigner;
use loyalty_network_mock::{codes, DemoScenario, MockRpcError, Outcome, TxScript};
use loyalty_types::{ClassHash, DecodingError, Felt, ResourceBounds};

const ACCOUNT_CLASS: u64 = 0xacc0;

fn make_client(
    transport: &MockTransport,
    scenario: &DemoScenario,
    fee_policy: FeePolicy,
) -> LoyaltyClient<MockTransport> {
    let operator = AccountContext::new(
        scenario.accounts.operator,
        scenario.operator_key.clone(),
        scenario.chain_id,
        AccountRole::Operator,
        Some(scenario.operator_key.public_key()),
    )
    .unwrap();
    LoyaltyClient::new(
        Arc::new(transport.clone()),
        operator,
        LoyaltyConfig {
            fee_token: scenario.accounts.fee_token,
            universal_deployer: scenario.accounts.universal_deployer,
            account_class_hash: ClassHash::new(Felt::from(ACCOUNT_CLASS)),
        },
        fee_policy,
        PollConfig::default(),
    )
}

fn principal(scenario: &DemoScenario) -> AccountContext {
    AccountContext::new(
        scenario.accounts.principal,
        scenario.principal_key.clone(),
        scenario.chain_id,
        AccountRole::Principal,
        None,
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn provision_fund_and_spend_as_new_user() {
    let scenario = DemoScenario::new().unwrap();
    let transport = MockTransport::new(scenario.network.clone());
    let client = make_client(&transport, &scenario, FeePolicy::default());

    let user_key = StarkKeySigner::from_private_key(Felt::from(0x5eed_u64)).unwrap();
    let provisioned = client
        .provision_account(user_key.public_key(), Felt::from(42u64))
        .await
        .unwrap();
    assert_eq!(
        provisioned.address,
        client.account_address(user_key.public_key(), Felt::from(42u64))
    );
    transport
        .network()
        .lock()
        .unwrap()
        .add_account(provisioned.address, user_key.public_key(), 0);

    client
        .fund_account(provisioned.address, U256::from(10_000_000u64))
        .await
        .unwrap();
    client
        .mint_points(scenario.accounts.points, provisioned.address, U256::from(300u64))
        .await
        .unwrap();

    let user = AccountContext::connect(
        &transport,
        provisioned.address,
        user_key,
        AccountRole::Principal,
    )
    .await
    .unwrap();
    let outcome = client
        .purchase_collectible(&user, scenario.accounts.collectible, U256::from(1u64), U256::from(1u64))
        .await
        .unwrap();
    assert!(outcome.receipt.succeeded());

    let network = transport.network();
    let network = network.lock().unwrap();
    assert_eq!(network.nonces_for(scenario.accounts.operator), vec![0, 1, 2]);
    assert_eq!(network.nonces_for(provisioned.address), vec![0]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_operator_requests_never_share_a_nonce() {
    let mut scenario = DemoScenario::new().unwrap();
    scenario.network.nonce_lag = true;
    let transport =
        MockTransport::new(scenario.network.clone()).with_latency(Duration::from_millis(25));
    let client = make_client(&transport, &scenario, FeePolicy::default());
    let points = scenario.accounts.points;
    let principal = scenario.accounts.principal;

    let handles = (0..4u64)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .mint_points(points, principal, U256::from(10 + i))
                    .await
            })
        })
        .collect::<Vec<_>>();
    let mut nonces = Vec::new();
    for handle in handles {
        nonces.push(handle.await.unwrap().unwrap().nonce);
    }
    nonces.sort_unstable();
    assert_eq!(nonces, vec![0, 1, 2, 3]);

    let network = transport.network();
    let network = network.lock().unwrap();
    let mut submitted = network.nonces_for(scenario.accounts.operator);
    submitted.sort_unstable();
    assert_eq!(submitted, vec![0, 1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn different_accounts_proceed_independently() {
    let mut scenario = DemoScenario::new().unwrap();
    scenario.network.nonce_lag = true;
    let transport =
        MockTransport::new(scenario.network.clone()).with_latency(Duration::from_millis(25));
    let client = make_client(&transport, &scenario, FeePolicy::default());
    let user = principal(&scenario);

    let (minted, burned) = tokio::join!(
        client.mint_points(scenario.accounts.points, scenario.accounts.principal, U256::from(5u64)),
        client.burn_points(&user, scenario.accounts.points, U256::from(5u64)),
    );
    assert_eq!(minted.unwrap().nonce, 0);
    assert_eq!(burned.unwrap().nonce, 0);
}

#[tokio::test(start_paused = true)]
async fn funding_bumps_fee_once() {
    let scenario = DemoScenario::new().unwrap();
    let transport = MockTransport::new(scenario.network.clone());
    let tight = FeePolicy {
        l1_gas: ResourceBounds {
            max_amount: 900,
            max_price_per_unit: 100,
        },
        ..FeePolicy::default()
    };
    let client = make_client(&transport, &scenario, tight);

    client
        .fund_account(scenario.accounts.principal, U256::from(1u64))
        .await
        .unwrap();
    assert_eq!(transport.network().lock().unwrap().estimate_calls, 1);

    // minting does not opt into the bump and the tight ceiling is refused
    let err = client
        .mint_points(scenario.accounts.points, scenario.accounts.principal, U256::from(1u64))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        InvokeError::Broadcast { code: Some(code), .. } if code == codes::INSUFFICIENT_MAX_FEE
    ));
    assert_eq!(transport.network().lock().unwrap().estimate_calls, 1);
}

#[tokio::test(start_paused = true)]
async fn redeem_revert_carries_reason() {
    let mut scenario = DemoScenario::new().unwrap();
    scenario
        .network
        .push_script(TxScript::after_polls(2, Outcome::Revert("Token expired".into())));
    let transport = MockTransport::new(scenario.network.clone());
    let client = make_client(&transport, &scenario, FeePolicy::default());

    let err = client
        .redeem_collectible(
            &principal(&scenario),
            scenario.accounts.collectible,
            U256::from(3u64),
            U256::from(1u64),
        )
        .await
        .unwrap_err();
    assert_eq!(err.detail(), Some("Token expired"));
    assert_eq!(err.http_status(), 500);
}

#[tokio::test(start_paused = true)]
async fn broadcast_failure_can_be_retried_with_fresh_nonce() {
    let mut scenario = DemoScenario::new().unwrap();
    scenario.network.fail_next_broadcast(MockRpcError {
        code: codes::DUPLICATE_TX,
        message: "A transaction with the same hash already exists in the mempool".into(),
    });
    let transport = MockTransport::new(scenario.network.clone());
    let client = make_client(&transport, &scenario, FeePolicy::default());

    let err = client
        .mint_points(scenario.accounts.points, scenario.accounts.principal, U256::from(1u64))
        .await
        .unwrap_err();
    assert!(matches!(err, InvokeError::Broadcast { code: Some(59), .. }));
    assert_eq!(err.http_status(), 502);

    let outcome = client
        .mint_points(scenario.accounts.points, scenario.accounts.principal, U256::from(1u64))
        .await
        .unwrap();
    assert_eq!(outcome.nonce, 0);
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_transaction_reports_timeout() {
    let mut scenario = DemoScenario::new().unwrap();
    scenario.network.set_default_script(TxScript::immediate(Outcome::Never));
    let transport = MockTransport::new(scenario.network.clone());
    let client = make_client(&transport, &scenario, FeePolicy::default());

    let err = client
        .mint_collectible(
            scenario.accounts.collectible,
            scenario.accounts.principal,
            U256::from(1u64),
            U256::from(1u64),
        )
        .await
        .unwrap_err();
    let (tx_hash, attempts) = match err {
        InvokeError::ConfirmationTimeout { tx_hash, attempts } => (tx_hash, attempts),
        other => panic!("expected timeout, got {other:?}"),
    };
    assert_eq!(attempts, 5);
    assert_eq!(transport.network().lock().unwrap().status_polls(tx_hash), 5);
}

#[tokio::test]
async fn describe_and_balance_reads() {
    let scenario = DemoScenario::new().unwrap();
    let transport = MockTransport::new(scenario.network.clone());
    let client = make_client(&transport, &scenario, FeePolicy::default());

    let collectible = client
        .describe_collectible(scenario.accounts.collectible)
        .await
        .unwrap();
    assert_eq!(collectible.descriptions[2], "Special Edition");
    let issuer = collectible.issuer.to_string();
    assert_eq!(canonicalize_address_str(&issuer).unwrap(), issuer);

    let points = client.describe_points(scenario.accounts.points).await.unwrap();
    assert_eq!(points.total_supply, U256::from(1_000_000u64));

    let json = serde_json::to_value(&collectible).unwrap();
    assert_eq!(json["issuer"], issuer);
    assert_eq!(json["token_ids"][0], "1");
}

#[tokio::test]
async fn trailing_felt_is_a_cursor_mismatch() {
    let mut scenario = DemoScenario::new().unwrap();
    let mut felts = scenario.points.encode_to_vec();
    let produced = felts.len();
    felts.push(Felt::ZERO);
    scenario
        .network
        .set_view(scenario.accounts.points, DESCRIBE_ENTRY_POINT, felts);
    let transport = MockTransport::new(scenario.network.clone());
    let client = make_client(&transport, &scenario, FeePolicy::default());

    let err = client
        .describe_points(scenario.accounts.points)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ReadError::Decoding(DecodingError::CursorMismatch {
            expected: produced + 1,
            actual: produced,
        })
    );
}

#[tokio::test]
async fn connect_rejects_wrong_key() {
    let scenario = DemoScenario::new().unwrap();
    let transport = MockTransport::new(scenario.network.clone());
    let err = AccountContext::connect(
        &transport,
        scenario.accounts.principal,
        scenario.operator_key.clone(),
        AccountRole::Principal,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AccountError::InvalidCredentials(_)));
}
