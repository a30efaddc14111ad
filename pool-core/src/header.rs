use serde::{Deserialize, Serialize};

use crate::error::HeaderError;

/// The subset of a candidate block's header that mining actually touches.
///
/// `previous_block_hash` is an opaque chain identifier (hex); `target` is the
/// 32-byte big-endian target encoded as 64 hex chars; `randomness` is the
/// miner-supplied nonce (hex, variable length); `graffiti` is a fixed 32-byte
/// miner tag (hex).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub previous_block_hash: String,
    pub target: String,
    pub timestamp: u64,
    pub randomness: String,
    pub graffiti: String,
}

/// A candidate block template as delivered by the upstream node.
///
/// `extra` carries whatever additional fields the upstream attaches that this
/// core does not interpret; they must round-trip byte-for-byte through a
/// clone/mutate/republish cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTemplate {
    pub header: BlockHeader,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

const TARGET_LEN: usize = 32;
const GRAFFITI_LEN: usize = 32;

fn decode_hex_field(field: &'static str, value: &str) -> Result<Vec<u8>, HeaderError> {
    hex::decode(value).map_err(|source| HeaderError::InvalidHex { field, source })
}

fn decode_fixed_hex_field(
    field: &'static str,
    value: &str,
    expected: usize,
) -> Result<Vec<u8>, HeaderError> {
    let bytes = decode_hex_field(field, value)?;
    if bytes.len() != expected {
        return Err(HeaderError::WrongLength {
            field,
            expected,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

/// Produce the canonical byte image over which proof-of-work is measured.
///
/// Deterministic and injective over well-formed headers: fields are encoded
/// length-prefixed, in a fixed order, followed by `extra` in sorted key
/// order so two templates differing only in additional-field insertion order
/// hash identically.
pub fn serialize_mineable_header(
    header: &BlockHeader,
    extra: &serde_json::Map<String, serde_json::Value>,
) -> Result<Vec<u8>, HeaderError> {
    let previous_hash = decode_hex_field("previousBlockHash", &header.previous_block_hash)?;
    let target = decode_fixed_hex_field("target", &header.target, TARGET_LEN)?;
    let randomness = decode_hex_field("randomness", &header.randomness)?;
    let graffiti = decode_fixed_hex_field("graffiti", &header.graffiti, GRAFFITI_LEN)?;

    let mut out = Vec::with_capacity(
        8 + previous_hash.len() + target.len() + 8 + 8 + randomness.len() + graffiti.len(),
    );
    write_len_prefixed(&mut out, &previous_hash);
    write_len_prefixed(&mut out, &target);
    out.extend_from_slice(&header.timestamp.to_le_bytes());
    write_len_prefixed(&mut out, &randomness);
    write_len_prefixed(&mut out, &graffiti);

    let mut keys: Vec<&String> = extra.keys().collect();
    keys.sort();
    for key in keys {
        let value = &extra[key];
        write_len_prefixed(&mut out, key.as_bytes());
        let value_bytes = serde_json::to_vec(value).expect("serde_json::Value always encodes");
        write_len_prefixed(&mut out, &value_bytes);
    }

    Ok(out)
}

fn write_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

/// BLAKE3 digest of a serialized header, as a big-endian 256-bit integer.
pub fn hash(bytes: &[u8]) -> [u8; 32] {
    *blake3::hash(bytes).as_bytes()
}

/// "digest meets target T" iff the numeric value of digest <= T. Both sides
/// are the same fixed width, so lexicographic byte compare is equivalent to
/// the numeric compare.
pub fn digest_meets_target(digest: &[u8; 32], target: &[u8; 32]) -> bool {
    digest.as_slice() <= target.as_slice()
}

/// Decode a header's `target` field back into a fixed-width array, for
/// callers that already hold a validated header and need the raw bytes for
/// comparison against a digest.
pub fn decode_target_hex(value: &str) -> Result<[u8; 32], HeaderError> {
    let bytes = decode_fixed_hex_field("target", value, TARGET_LEN)?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}
