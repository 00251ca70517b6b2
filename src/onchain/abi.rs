//! Function selectors, event topics and minimal ABI word codec.
//!
//! Treasury forks rename their methods (`getDollarPrice()` vs `getTombPrice()`),
//! so selectors and topics are derived from signature strings at startup
//! instead of being baked in as constants.

use alloy::primitives::{Bytes, B256, U256};

// ─── Common signatures ──────────────────────────────────────────────────────

pub const DECIMALS: &str = "decimals()";
pub const TOTAL_SUPPLY: &str = "totalSupply()";
pub const EPOCH: &str = "epoch()";
pub const NEXT_EPOCH_POINT: &str = "nextEpochPoint()";
pub const PERIOD: &str = "PERIOD()";
pub const MAX_SUPPLY_EXPANSION_PERCENT: &str = "maxSupplyExpansionPercent()";
/// Curve-style stableswap quote.
pub const GET_DY: &str = "get_dy(int128,int128,uint256)";

/// ABI word size in bytes.
pub const WORD: usize = 32;

/// Compute keccak256 hash of a byte slice.
pub fn keccak256(data: &[u8]) -> B256 {
    use tiny_keccak::{Hasher, Keccak};
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    B256::from(output)
}

/// 4-byte function selector for a canonical signature like `"epoch()"`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// topic0 for a canonical event signature like `"BoardroomFunded(uint256,uint256)"`.
pub fn topic(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

/// Encode calldata for a method whose arguments are all static 32-byte words.
pub fn encode_call(signature: &str, args: &[U256]) -> Bytes {
    let mut data = Vec::with_capacity(4 + args.len() * WORD);
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(&arg.to_be_bytes::<32>());
    }
    Bytes::from(data)
}

/// Read the `index`-th 32-byte word of an ABI payload.
pub fn word(data: &[u8], index: usize) -> Option<U256> {
    let start = index.checked_mul(WORD)?;
    let end = start.checked_add(WORD)?;
    let bytes: [u8; 32] = data.get(start..end)?.try_into().ok()?;
    Some(U256::from_be_bytes(bytes))
}

/// Split a fully static ABI payload into words. Returns `None` when the
/// payload is not word-aligned (i.e. not the shape we expect).
pub fn words(data: &[u8]) -> Option<Vec<U256>> {
    if data.len() % WORD != 0 {
        return None;
    }
    Some((0..data.len() / WORD).filter_map(|i| word(data, i)).collect())
}

/// Whether `input` is a call to the method identified by `selector`.
pub fn calls_selector(input: &[u8], selector: &[u8; 4]) -> bool {
    input.len() >= 4 && input[..4] == selector[..]
}
