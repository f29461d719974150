use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::DecodeError;
use crate::raw::RawAccessListItem;

/// One pre-warmed address and its storage keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListEntry {
    pub address: String,
    pub storage_keys: Vec<String>,
}

/// Normalize a raw access list. Absent and empty lists both come back as an
/// empty vector. Key order and duplicates are kept as given.
pub fn normalize_access_list(
    raw: Option<&[RawAccessListItem]>,
) -> Result<Vec<AccessListEntry>, DecodeError> {
    raw.unwrap_or_default()
        .iter()
        .map(|item| {
            let storage_keys = item
                .storage_keys
                .iter()
                .map(|key| codec::hash("accessList.storageKeys", key))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AccessListEntry {
                address: codec::address("accessList.address", &item.address)?,
                storage_keys,
            })
        })
        .collect()
}
