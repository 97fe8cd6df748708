use loyalty_types::{
    ChainId, ClassHash, ContractAddress, Felt, InvokeTransactionV3, ResourceBounds, TxHash,
};
use num_bigint::BigUint;
use starknet_crypto::{pedersen_hash, poseidon_hash_many};

const INVOKE_TAG: &[u8] = b"invoke";
const CONTRACT_ADDRESS_TAG: &[u8] = b"STARKNET_CONTRACT_ADDRESS";
const L1_GAS_NAME: &[u8] = b"L1_GAS";
const L2_GAS_NAME: &[u8] = b"L2_GAS";
const L1_DATA_GAS_NAME: &[u8] = b"L1_DATA";

pub const INVOKE_VERSION: u64 = 3;

/// Hashing rules used by this module:
/// 1. Tags and resource names are Cairo short strings (big-endian ASCII).
/// 2. Variable-length felt lists are committed as one Poseidon hash each.
/// 3. Each resource bound packs into one felt:
///    `name (8 bytes, left padded) || max_amount (u64) || max_price (u128)`.
/// 4. Data-availability modes pack as `nonce_mode << 32 | fee_mode`.
pub fn compute_invoke_v3_hash(tx: &InvokeTransactionV3, chain_id: ChainId) -> TxHash {
    let bounds = &tx.resource_bounds;
    let fee_fields = vec![
        Felt::from(tx.tip),
        resource_bound_word(L1_GAS_NAME, &bounds.l1_gas),
        resource_bound_word(L2_GAS_NAME, &bounds.l2_gas),
        resource_bound_word(L1_DATA_GAS_NAME, &bounds.l1_data_gas),
    ];
    let da_modes = (tx.nonce_data_availability_mode.as_u64() << 32)
        + tx.fee_data_availability_mode.as_u64();

    let enc = vec![
        short_tag(INVOKE_TAG),
        Felt::from(INVOKE_VERSION),
        tx.sender_address.felt(),
        poseidon_hash_many(&fee_fields),
        poseidon_hash_many(&tx.paymaster_data),
        chain_id.felt(),
        tx.nonce,
        Felt::from(da_modes),
        poseidon_hash_many(&tx.account_deployment_data),
        poseidon_hash_many(&tx.calldata),
    ];
    TxHash::new(poseidon_hash_many(&enc))
}

pub fn resource_bound_word(name: &[u8], bounds: &ResourceBounds) -> Felt {
    let mut word = [0u8; 32];
    let name = &name[name.len().saturating_sub(8)..];
    word[8 - name.len()..8].copy_from_slice(name);
    word[8..16].copy_from_slice(&bounds.max_amount.to_be_bytes());
    word[16..32].copy_from_slice(&bounds.max_price_per_unit.to_be_bytes());
    Felt::from_bytes_be(&word)
}

/// Pedersen chain over `data` followed by its length.
pub fn compute_hash_on_elements(data: &[Felt]) -> Felt {
    let acc = data
        .iter()
        .fold(Felt::ZERO, |acc, item| pedersen_hash(&acc, item));
    pedersen_hash(&acc, &Felt::from(data.len() as u64))
}

/// Address a contract deployed with the given parameters will land at.
pub fn compute_contract_address(
    salt: Felt,
    class_hash: ClassHash,
    constructor_calldata: &[Felt],
    deployer: ContractAddress,
) -> ContractAddress {
    let raw = compute_hash_on_elements(&[
        short_tag(CONTRACT_ADDRESS_TAG),
        deployer.felt(),
        salt,
        class_hash.felt(),
        compute_hash_on_elements(constructor_calldata),
    ]);
    ContractAddress::new(normalize_address(raw))
}

// Addresses live below 2^251 - 256.
fn normalize_address(raw: Felt) -> Felt {
    let bound = (BigUint::from(1u8) << 251u32) - BigUint::from(256u32);
    let value = BigUint::from_bytes_be(&raw.to_bytes_be()) % bound;
    Felt::from_bytes_be_slice(&value.to_bytes_be())
}

fn short_tag(tag: &[u8]) -> Felt {
    Felt::from_bytes_be_slice(tag)
}

#[cfg(test)]
mod tests {
    use loyalty_types::{
        ChainId, ClassHash, ContractAddress, DataAvailabilityMode, Felt, InvokeTransactionV3,
        ResourceBounds, ResourceBoundsMapping,
    };
    use num_bigint::BigUint;
    use starknet_crypto::pedersen_hash;

    use super::{
        compute_contract_address, compute_hash_on_elements, compute_invoke_v3_hash,
        resource_bound_word,
    };

    fn sample_tx() -> InvokeTransactionV3 {
        InvokeTransactionV3 {
            sender_address: ContractAddress::new(Felt::from(0x1234u64)),
            calldata: vec![Felt::ONE, Felt::from(0xabcu64), Felt::from(7u64)],
            signature: Vec::new(),
            nonce: Felt::from(4u64),
            resource_bounds: ResourceBoundsMapping {
                l1_gas: ResourceBounds {
                    max_amount: 0x186a0,
                    max_price_per_unit: 0x5af3107a4000,
                },
                ..ResourceBoundsMapping::default()
            },
            tip: 0,
            paymaster_data: Vec::new(),
            account_deployment_data: Vec::new(),
            nonce_data_availability_mode: DataAvailabilityMode::L1,
            fee_data_availability_mode: DataAvailabilityMode::L1,
        }
    }

    #[test]
    fn resource_bound_word_layout() {
        let word = resource_bound_word(
            b"L1_GAS",
            &ResourceBounds {
                max_amount: 0x186a0,
                max_price_per_unit: 0x5af3107a4000,
            },
        );
        let bytes = word.to_bytes_be();
        assert_eq!(&bytes[..8], &[0, 0, b'L', b'1', b'_', b'G', b'A', b'S']);
        assert_eq!(&bytes[8..16], &0x186a0u64.to_be_bytes());
        assert_eq!(&bytes[16..], &0x5af3107a4000u128.to_be_bytes());

        let data = resource_bound_word(b"L1_DATA", &ResourceBounds::ZERO).to_bytes_be();
        assert_eq!(&data[..8], &[0, b'L', b'1', b'_', b'D', b'A', b'T', b'A']);
    }

    #[test]
    fn invoke_hash_is_deterministic_and_field_sensitive() {
        let chain = ChainId::from_name("SN_SEPOLIA").unwrap();
        let tx = sample_tx();
        let base = compute_invoke_v3_hash(&tx, chain);
        assert_eq!(base, compute_invoke_v3_hash(&tx, chain));

        let mut bumped = tx.clone();
        bumped.nonce = Felt::from(5u64);
        assert_ne!(base, compute_invoke_v3_hash(&bumped, chain));

        let mut wider = tx.clone();
        wider.resource_bounds.l1_gas.max_amount += 1;
        assert_ne!(base, compute_invoke_v3_hash(&wider, chain));

        let mainnet = ChainId::from_name("SN_MAIN").unwrap();
        assert_ne!(base, compute_invoke_v3_hash(&tx, mainnet));
    }

    #[test]
    fn signature_is_not_part_of_the_hash() {
        let chain = ChainId::from_name("SN_SEPOLIA").unwrap();
        let mut tx = sample_tx();
        let unsigned = compute_invoke_v3_hash(&tx, chain);
        tx.signature = vec![Felt::ONE, Felt::ONE];
        assert_eq!(unsigned, compute_invoke_v3_hash(&tx, chain));
    }

    #[test]
    fn hash_on_elements_appends_length() {
        assert_eq!(
            compute_hash_on_elements(&[]),
            pedersen_hash(&Felt::ZERO, &Felt::ZERO)
        );
        let one = pedersen_hash(&Felt::ZERO, &Felt::from(9u64));
        assert_eq!(
            compute_hash_on_elements(&[Felt::from(9u64)]),
            pedersen_hash(&one, &Felt::ONE)
        );
    }

    #[test]
    fn contract_address_depends_on_salt_and_stays_in_range() {
        let class_hash = ClassHash::new(Felt::from(0xc1a55u64));
        let calldata = [Felt::from(0x99u64)];
        let a = compute_contract_address(Felt::ONE, class_hash, &calldata, ContractAddress::ZERO);
        let b = compute_contract_address(Felt::from(2u64), class_hash, &calldata, ContractAddress::ZERO);
        assert_ne!(a, b);
        assert_eq!(
            a,
            compute_contract_address(Felt::ONE, class_hash, &calldata, ContractAddress::ZERO)
        );
        let bound = (BigUint::from(1u8) << 251u32) - BigUint::from(256u32);
        assert!(BigUint::from_bytes_be(&a.felt().to_bytes_be()) < bound);
    }
}
