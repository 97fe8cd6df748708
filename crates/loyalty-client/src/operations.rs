//! LoyaltyClient: business operations of the loyalty platform expressed as
//! contract invocations and reads.

use std::sync::Arc;

use loyalty_codec::{Calldata, CollectibleDetails, PointsDetails, U256};
use loyalty_crypto::compute_contract_address;
use loyalty_types::{Call, ClassHash, ContractAddress, Felt, TransactionReceipt, TxHash};

use crate::{
    account::AccountContext,
    invoker::{FeePolicy, InvocationOutcome, InvokeError, InvokeOptions, TransactionInvoker},
    poller::PollConfig,
    reader::{ReadError, ReadInvoker},
    transport::NetworkClient,
    tx_builder::contract_call,
};

/// Universal Deployer Contract address on public StarkNet networks.
pub const UNIVERSAL_DEPLOYER_ADDRESS: &str =
    "0x041a78e741e5af2fec34b695679bc6891742439f7afb8484ecd7766661ad02bf";

/// Addresses and class hashes the operations depend on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoyaltyConfig {
    pub fee_token: ContractAddress,
    pub universal_deployer: ContractAddress,
    /// Class deployed for new user and merchant accounts.
    pub account_class_hash: ClassHash,
}

/// A freshly deployed account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedAccount {
    pub address: ContractAddress,
    pub public_key: Felt,
    pub outcome: InvocationOutcome,
}

pub struct LoyaltyClient<N: ?Sized> {
    invoker: TransactionInvoker<N>,
    reader: ReadInvoker<N>,
    operator: AccountContext,
    config: LoyaltyConfig,
}

impl<N: ?Sized> Clone for LoyaltyClient<N> {
    fn clone(&self) -> Self {
        Self {
            invoker: self.invoker.clone(),
            reader: self.reader.clone(),
            operator: self.operator.clone(),
            config: self.config.clone(),
        }
    }
}

impl<N> LoyaltyClient<N>
where
    N: NetworkClient + ?Sized,
{
    pub fn new(
        network: Arc<N>,
        operator: AccountContext,
        config: LoyaltyConfig,
        fee_policy: FeePolicy,
        poll_config: PollConfig,
    ) -> Self {
        Self {
            invoker: TransactionInvoker::new(Arc::clone(&network), fee_policy, poll_config),
            reader: ReadInvoker::new(network),
            operator,
            config,
        }
    }

    pub fn operator(&self) -> &AccountContext {
        &self.operator
    }

    pub fn config(&self) -> &LoyaltyConfig {
        &self.config
    }

    pub fn invoker(&self) -> &TransactionInvoker<N> {
        &self.invoker
    }

    pub fn reader(&self) -> &ReadInvoker<N> {
        &self.reader
    }

    /// Address an account for `public_key` deployed with `salt` will get.
    pub fn account_address(&self, public_key: Felt, salt: Felt) -> ContractAddress {
        compute_contract_address(
            salt,
            self.config.account_class_hash,
            &[public_key],
            ContractAddress::ZERO,
        )
    }

    /// Deploy a user or merchant account through the Universal Deployer,
    /// paid by the operator.
    pub async fn provision_account(
        &self,
        public_key: Felt,
        salt: Felt,
    ) -> Result<ProvisionedAccount, InvokeError> {
        let address = self.account_address(public_key, salt);
        let calldata = Calldata::new()
            .push(&self.config.account_class_hash)
            .push(&salt)
            .push(&false)
            .push(&vec![public_key])
            .into_vec();
        let call = contract_call(self.config.universal_deployer, "deployContract", calldata);
        tracing::info!(address = %address, "provisioning account");
        let outcome = self.operator_invoke(call, InvokeOptions::default()).await?;
        Ok(ProvisionedAccount {
            address,
            public_key,
            outcome,
        })
    }

    /// Send fee tokens from the operator so `recipient` can pay for its own
    /// transactions.
    pub async fn fund_account(
        &self,
        recipient: ContractAddress,
        amount: U256,
    ) -> Result<InvocationOutcome, InvokeError> {
        let call = transfer_call(self.config.fee_token, recipient, amount);
        self.operator_invoke(call, InvokeOptions::with_fee_bump())
            .await
    }

    pub async fn mint_points(
        &self,
        points: ContractAddress,
        recipient: ContractAddress,
        amount: U256,
    ) -> Result<InvocationOutcome, InvokeError> {
        let calldata = Calldata::new().push(&recipient).push(&amount).into_vec();
        self.operator_invoke(contract_call(points, "mint", calldata), InvokeOptions::default())
            .await
    }

    pub async fn transfer_points(
        &self,
        holder: &AccountContext,
        points: ContractAddress,
        recipient: ContractAddress,
        amount: U256,
    ) -> Result<InvocationOutcome, InvokeError> {
        self.invoke_as(holder, transfer_call(points, recipient, amount))
            .await
    }

    pub async fn burn_points(
        &self,
        holder: &AccountContext,
        points: ContractAddress,
        amount: U256,
    ) -> Result<InvocationOutcome, InvokeError> {
        let calldata = Calldata::new().push(&amount).into_vec();
        self.invoke_as(holder, contract_call(points, "burn", calldata))
            .await
    }

    pub async fn mint_collectible(
        &self,
        collectible: ContractAddress,
        recipient: ContractAddress,
        token_id: U256,
        amount: U256,
    ) -> Result<InvocationOutcome, InvokeError> {
        let calldata = Calldata::new()
            .push(&recipient)
            .push(&token_id)
            .push(&amount)
            .into_vec();
        self.operator_invoke(
            contract_call(collectible, "mint", calldata),
            InvokeOptions::default(),
        )
        .await
    }

    pub async fn redeem_collectible(
        &self,
        holder: &AccountContext,
        collectible: ContractAddress,
        token_id: U256,
        amount: U256,
    ) -> Result<InvocationOutcome, InvokeError> {
        let calldata = Calldata::new().push(&token_id).push(&amount).into_vec();
        self.invoke_as(holder, contract_call(collectible, "redeem", calldata))
            .await
    }

    /// Buy collectible units with points; the collectible contract charges
    /// the listed price.
    pub async fn purchase_collectible(
        &self,
        buyer: &AccountContext,
        collectible: ContractAddress,
        token_id: U256,
        amount: U256,
    ) -> Result<InvocationOutcome, InvokeError> {
        let calldata = Calldata::new().push(&token_id).push(&amount).into_vec();
        self.invoke_as(buyer, contract_call(collectible, "purchase", calldata))
            .await
    }

    pub async fn describe_collectible(
        &self,
        collectible: ContractAddress,
    ) -> Result<CollectibleDetails, ReadError> {
        self.reader.describe_collectible(collectible).await
    }

    pub async fn describe_points(
        &self,
        points: ContractAddress,
    ) -> Result<PointsDetails, ReadError> {
        self.reader.describe_points(points).await
    }

    pub async fn points_balance(
        &self,
        points: ContractAddress,
        owner: ContractAddress,
    ) -> Result<U256, ReadError> {
        self.reader.balance_of(points, owner).await
    }

    /// Wait for a transaction broadcast earlier.
    pub async fn confirm(&self, tx_hash: TxHash) -> Result<TransactionReceipt, InvokeError> {
        self.invoker.wait_for(tx_hash).await
    }

    async fn operator_invoke(
        &self,
        call: Call,
        options: InvokeOptions,
    ) -> Result<InvocationOutcome, InvokeError> {
        self.invoker.invoke(&self.operator, vec![call], options).await
    }

    async fn invoke_as(
        &self,
        account: &AccountContext,
        call: Call,
    ) -> Result<InvocationOutcome, InvokeError> {
        self.invoker
            .invoke(account, vec![call], InvokeOptions::default())
            .await
    }
}

fn transfer_call(token: ContractAddress, recipient: ContractAddress, amount: U256) -> Call {
    let calldata = Calldata::new().push(&recipient).push(&amount).into_vec();
    contract_call(token, "transfer", calldata)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use loyalty_codec::{selector_from_name, U256};
    use loyalty_crypto::compute_contract_address;
    use loyalty_network_mock::DemoScenario;
    use loyalty_types::{ClassHash, ContractAddress, Felt};

    use super::{LoyaltyClient, LoyaltyConfig, UNIVERSAL_DEPLOYER_ADDRESS};
    use crate::account::{AccountContext, AccountRole};
    use crate::invoker::FeePolicy;
    use crate::poller::PollConfig;
    use crate::transport::MockTransport;

    fn client(scenario: &DemoScenario) -> (MockTransport, LoyaltyClient<MockTransport>) {
        let transport = MockTransport::new(scenario.network.clone());
        let operator = AccountContext::new(
            scenario.accounts.operator,
            scenario.operator_key.clone(),
            scenario.chain_id,
            AccountRole::Operator,
            None,
        )
        .unwrap();
        let config = LoyaltyConfig {
            fee_token: scenario.accounts.fee_token,
            universal_deployer: scenario.accounts.universal_deployer,
            account_class_hash: ClassHash::new(Felt::from(0xacc0u64)),
        };
        let client = LoyaltyClient::new(
            Arc::new(transport.clone()),
            operator,
            config,
            FeePolicy::default(),
            PollConfig::default(),
        );
        (transport, client)
    }

    #[test]
    fn udc_address_parses() {
        let udc = ContractAddress::from_hex(UNIVERSAL_DEPLOYER_ADDRESS).unwrap();
        assert_eq!(udc.to_string(), UNIVERSAL_DEPLOYER_ADDRESS);
    }

    #[tokio::test(start_paused = true)]
    async fn provision_deploys_through_udc() {
        let scenario = DemoScenario::new().unwrap();
        let (transport, client) = client(&scenario);
        let public_key = Felt::from(0x1234u64);
        let provisioned = client
            .provision_account(public_key, Felt::from(7u64))
            .await
            .unwrap();
        assert_eq!(
            provisioned.address,
            compute_contract_address(
                Felt::from(7u64),
                ClassHash::new(Felt::from(0xacc0u64)),
                &[public_key],
                ContractAddress::ZERO,
            )
        );

        let network = transport.network();
        let network = network.lock().unwrap();
        let calldata = &network.submitted[0].calldata;
        assert_eq!(calldata[0], Felt::ONE);
        assert_eq!(calldata[1], scenario.accounts.universal_deployer.felt());
        assert_eq!(calldata[2], selector_from_name("deployContract"));
        assert_eq!(
            &calldata[3..],
            &[
                Felt::from(5u64),
                Felt::from(0xacc0u64),
                Felt::from(7u64),
                Felt::ZERO,
                Felt::ONE,
                public_key,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fund_encodes_wide_amount() {
        let scenario = DemoScenario::new().unwrap();
        let (transport, client) = client(&scenario);
        let amount: U256 = "340282366920938463463374607431768211457".parse().unwrap();
        client
            .fund_account(scenario.accounts.principal, amount)
            .await
            .unwrap();

        let network = transport.network();
        let network = network.lock().unwrap();
        assert_eq!(network.estimate_calls, 1);
        let calldata = &network.submitted[0].calldata;
        assert_eq!(calldata[2], selector_from_name("transfer"));
        // recipient, low, high
        assert_eq!(
            &calldata[3..],
            &[
                Felt::from(3u64),
                scenario.accounts.principal.felt(),
                Felt::ONE,
                Felt::ONE,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn principal_operations_are_signed_by_principal() {
        let scenario = DemoScenario::new().unwrap();
        let (transport, client) = client(&scenario);
        let principal = AccountContext::new(
            scenario.accounts.principal,
            scenario.principal_key.clone(),
            scenario.chain_id,
            AccountRole::Principal,
            Some(scenario.principal_key.public_key()),
        )
        .unwrap();
        let points = scenario.accounts.points;
        let collectible = scenario.accounts.collectible;

        client
            .transfer_points(&principal, points, scenario.accounts.operator, U256::from(5u64))
            .await
            .unwrap();
        client
            .burn_points(&principal, points, U256::from(1u64))
            .await
            .unwrap();
        client
            .purchase_collectible(&principal, collectible, U256::from(2u64), U256::from(1u64))
            .await
            .unwrap();
        client
            .redeem_collectible(&principal, collectible, U256::from(2u64), U256::from(1u64))
            .await
            .unwrap();

        let network = transport.network();
        let network = network.lock().unwrap();
        assert_eq!(network.nonces_for(scenario.accounts.principal), vec![0, 1, 2, 3]);
        assert!(network.nonces_for(scenario.accounts.operator).is_empty());
    }

    #[tokio::test]
    async fn reads_go_through_reader() {
        let scenario = DemoScenario::new().unwrap();
        let (_, client) = client(&scenario);
        let details = client
            .describe_collectible(scenario.accounts.collectible)
            .await
            .unwrap();
        assert_eq!(details.name, "Gold Tier");
        let balance = client
            .points_balance(scenario.accounts.points, scenario.accounts.principal)
            .await
            .unwrap();
        assert_eq!(balance, U256::from(1_500u64));
    }
}
