use loyalty_codec::{CollectibleDetails, Encode, PointsDetails, U256, DESCRIBE_ENTRY_POINT};
use loyalty_crypto::StarkKeySigner;
use loyalty_types::{ChainId, ContractAddress, FeeEstimate, Felt, SigningError};

use crate::mock_network::MockNetwork;

pub const OPERATOR_PRIVATE_KEY: &str =
    "0x0139fe4d6f02e666e86a6f58e65060f115cd3c185bd9e98bd829636931458f79";
pub const PRINCIPAL_PRIVATE_KEY: &str =
    "0x071d7bb07b9a64f6f78ac4c816aff4da9d6a8ec5bd51c2a01bbc8ad1bd6da7a4";

#[derive(Debug, Clone, Copy)]
pub struct DemoAccounts {
    pub operator: ContractAddress,
    pub principal: ContractAddress,
    pub fee_token: ContractAddress,
    pub points: ContractAddress,
    pub collectible: ContractAddress,
    pub universal_deployer: ContractAddress,
}

#[derive(Debug, Clone)]
pub struct DemoScenario {
    pub chain_id: ChainId,
    pub accounts: DemoAccounts,
    pub operator_key: StarkKeySigner,
    pub principal_key: StarkKeySigner,
    pub collectible: CollectibleDetails,
    pub points: PointsDetails,
    pub network: MockNetwork,
}

impl DemoScenario {
    pub fn new() -> Result<Self, SigningError> {
        let chain_id = ChainId::new(Felt::from_bytes_be_slice(b"SN_SEPOLIA"));
        let accounts = DemoAccounts {
            operator: ContractAddress::new(Felt::from(0x0a11ce_u64)),
            principal: ContractAddress::new(Felt::from(0x0b0b_u64)),
            fee_token: ContractAddress::new(Felt::from(0xfee_u64)),
            points: ContractAddress::new(Felt::from(0x9015_u64)),
            collectible: ContractAddress::new(Felt::from(0xc011_u64)),
            universal_deployer: ContractAddress::new(Felt::from(0x0d0c_u64)),
        };
        let operator_key = StarkKeySigner::from_hex(OPERATOR_PRIVATE_KEY)?;
        let principal_key = StarkKeySigner::from_hex(PRINCIPAL_PRIVATE_KEY)?;
        let collectible = demo_collectible(accounts.operator);
        let points = demo_points(accounts.operator);

        let mut network = MockNetwork::new(chain_id);
        network.add_account(accounts.operator, operator_key.public_key(), 0);
        network.add_account(accounts.principal, principal_key.public_key(), 0);
        network.set_view(accounts.collectible, DESCRIBE_ENTRY_POINT, collectible.encode_to_vec());
        network.set_view(accounts.points, DESCRIBE_ENTRY_POINT, points.encode_to_vec());
        network.set_view(
            accounts.points,
            "balance_of",
            U256::from(1_500u64).encode_to_vec(),
        );
        network.set_view(
            accounts.fee_token,
            "balance_of",
            U256::from(5_000_000_000_000_000u64).encode_to_vec(),
        );
        network.contracts.insert(accounts.universal_deployer);
        network.set_fee_estimate(FeeEstimate {
            l1_gas_consumed: 1_000,
            l1_gas_price: 100,
            l2_gas_consumed: 0,
            l2_gas_price: 0,
            l1_data_gas_consumed: 0,
            l1_data_gas_price: 0,
            overall_fee: 100_000,
        });

        Ok(Self {
            chain_id,
            accounts,
            operator_key,
            principal_key,
            collectible,
            points,
            network,
        })
    }
}

fn demo_collectible(issuer: ContractAddress) -> CollectibleDetails {
    CollectibleDetails {
        name: "Gold Tier".to_string(),
        issuer,
        token_ids: vec![U256::from(1u64), U256::from(2u64), U256::from(3u64)],
        prices: vec![U256::from(100u64), U256::from(250u64), U256::from(1_000u64)],
        expiry_dates: vec![1_767_225_600, 1_798_761_600, 1_830_297_600],
        descriptions: vec![
            "Lounge access".to_string(),
            "Free upgrade".to_string(),
            "Special Edition".to_string(),
        ],
    }
}

fn demo_points(owner: ContractAddress) -> PointsDetails {
    PointsDetails {
        name: "Loyalty Miles".to_string(),
        symbol: "MILES".to_string(),
        owner,
        decimals: 0,
        total_supply: U256::from(1_000_000u64),
    }
}
