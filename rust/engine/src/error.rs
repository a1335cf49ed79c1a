use std::fmt;

/// Caller contract violations found while turning bytes into a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    Length { expected: usize, got: usize },
    UnknownOpcode(u8),
    NonCanonicalWord { offset: usize },
    NonZeroPadding { offset: usize },
    InvalidHex(String),
    InvalidFelt(String),
    Address(AddressError),
    SameToken { token: u32 },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Length { expected, got } => {
                write!(f, "command length mismatch: expected {expected} bytes, got {got}")
            }
            DecodeError::UnknownOpcode(op) => write!(f, "unknown opcode {op}"),
            DecodeError::NonCanonicalWord { offset } => {
                write!(f, "word at offset {offset} is not a canonical field element")
            }
            DecodeError::NonZeroPadding { offset } => {
                write!(f, "unused bytes at offset {offset} must be zero")
            }
            DecodeError::InvalidHex(msg) => write!(f, "invalid hex: {msg}"),
            DecodeError::InvalidFelt(msg) => write!(f, "invalid felt: {msg}"),
            DecodeError::Address(err) => write!(f, "impossible slot: {err}"),
            DecodeError::SameToken { token } => {
                write!(f, "pool pair uses token {token} on both sides")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<hex::FromHexError> for DecodeError {
    fn from(err: hex::FromHexError) -> Self {
        DecodeError::InvalidHex(err.to_string())
    }
}

impl From<AddressError> for DecodeError {
    fn from(err: AddressError) -> Self {
        DecodeError::Address(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    OutOfRange {
        field: &'static str,
        value: u64,
        bits: u32,
    },
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::OutOfRange { field, value, bits } => {
                write!(f, "{field} {value} does not fit in {bits} bits")
            }
        }
    }
}

impl std::error::Error for AddressError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    Address(AddressError),
    Corrupt(String),
    UnregisteredPool(u32),
    Backend(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Address(err) => write!(f, "address error: {err}"),
            StorageError::Corrupt(msg) => write!(f, "corrupt leaf: {msg}"),
            StorageError::UnregisteredPool(pool) => write!(f, "pool {pool} is not registered"),
            StorageError::Backend(msg) => write!(f, "node store error: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<AddressError> for StorageError {
    fn from(err: AddressError) -> Self {
        StorageError::Address(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    Decode(DecodeError),
    Storage(StorageError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Decode(err) => write!(f, "decode error: {err}"),
            EngineError::Storage(err) => write!(f, "storage error: {err}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<DecodeError> for EngineError {
    fn from(err: DecodeError) -> Self {
        EngineError::Decode(err)
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        EngineError::Storage(err)
    }
}
