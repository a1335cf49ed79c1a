use num_bigint::BigUint;
use starknet::core::types::Felt;

use crate::error::DecodeError;

/// One 32-byte big-endian slot of the command buffer.
pub type Word = [u8; 32];

pub fn parse_felt(value: &str) -> Result<Felt, DecodeError> {
    if value.starts_with("0x") {
        Felt::from_hex(value).map_err(|err| DecodeError::InvalidFelt(err.to_string()))
    } else {
        Felt::from_dec_str(value).map_err(|err| DecodeError::InvalidFelt(err.to_string()))
    }
}

/// Rejects words at or above the field modulus, so decoding never reduces.
pub fn felt_from_word(word: &Word, offset: usize) -> Result<Felt, DecodeError> {
    let felt = Felt::from_bytes_be(word);
    if &felt.to_bytes_be() != word {
        return Err(DecodeError::NonCanonicalWord { offset });
    }
    Ok(felt)
}

pub fn felt_to_word(value: &Felt) -> Word {
    value.to_bytes_be()
}

pub fn felt_to_u32(value: &Felt) -> Option<u32> {
    let bytes = value.to_bytes_be();
    if bytes[..28].iter().any(|b| *b != 0) {
        return None;
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[28..32]);
    Some(u32::from_be_bytes(buf))
}

/// `0 - amount`; the only way a debit is expressed.
pub fn negate(amount: Felt) -> Felt {
    Felt::ZERO - amount
}

pub fn felt_to_biguint(value: &Felt) -> BigUint {
    BigUint::from_bytes_be(&value.to_bytes_be())
}

/// Caller guarantees `value` is below the modulus.
pub fn biguint_to_felt(value: &BigUint) -> Felt {
    let bytes = value.to_bytes_be();
    let mut out = [0u8; 32];
    let start = 32usize.saturating_sub(bytes.len());
    out[start..].copy_from_slice(&bytes[bytes.len().saturating_sub(32)..]);
    Felt::from_bytes_be(&out)
}

pub fn felt_to_hex(value: Felt) -> String {
    format!("0x{:x}", value)
}

pub fn felt_to_decimal(value: Felt) -> String {
    felt_to_biguint(&value).to_str_radix(10)
}

pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn hex_to_bytes(value: &str) -> Result<Vec<u8>, DecodeError> {
    let trimmed = value.trim();
    let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    Ok(hex::decode(stripped)?)
}
