use crate::decoder::{AccessListEntry, TransactionKind};

pub const TX_BASE_COST: u64 = 21_000;
pub const TX_DATA_ZERO_COST: u64 = 4;
pub const TX_DATA_NON_ZERO_COST: u64 = 16;
pub const ACCESS_LIST_ADDRESS_COST: u64 = 2_400;
pub const ACCESS_LIST_STORAGE_KEY_COST: u64 = 1_900;
pub const TX_CREATE_COST: u64 = 32_000;

/// Calculate gas cost for calldata (transaction input data)
pub fn calculate_calldata_cost(data: &[u8]) -> u64 {
    data.iter()
        .map(|byte| {
            if *byte == 0 {
                TX_DATA_ZERO_COST
            } else {
                TX_DATA_NON_ZERO_COST
            }
        })
        .sum()
}

/// Calculate access list cost (EIP-2930). Legacy transactions carry none.
pub fn calculate_access_list_cost(kind: TransactionKind, access_list: &[AccessListEntry]) -> u64 {
    if !kind.has_access_list() {
        return 0;
    }
    access_list
        .iter()
        .map(|entry| {
            ACCESS_LIST_ADDRESS_COST
                + entry.storage_keys.len() as u64 * ACCESS_LIST_STORAGE_KEY_COST
        })
        .sum()
}

/// Calculate contract creation surcharge
pub fn calculate_contract_creation_cost(is_creation: bool) -> u64 {
    if is_creation {
        TX_CREATE_COST
    } else {
        0
    }
}

/// Protocol minimum gas for a transaction of this shape.
///
/// Init-code word cost (EIP-3860) and calldata floor pricing (EIP-7623) are
/// not part of this figure.
pub fn estimate_intrinsic_gas(
    kind: TransactionKind,
    input: &[u8],
    access_list: &[AccessListEntry],
    is_creation: bool,
) -> u64 {
    TX_BASE_COST
        + calculate_calldata_cost(input)
        + calculate_access_list_cost(kind, access_list)
        + calculate_contract_creation_cost(is_creation)
}
