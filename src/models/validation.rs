use hex::FromHexError;

use crate::error::CodecError;

pub const DEVICE_TOKEN_BYTES: usize = 32;

/// Decodes a hex device token into its 32-byte binary form. Whitespace inside
/// the token is ignored.
pub fn decode_device_token(token: &str) -> Result<[u8; DEVICE_TOKEN_BYTES], CodecError> {
    let digits: String = token.chars().filter(|c| !c.is_whitespace()).collect();

    if digits.len() != DEVICE_TOKEN_BYTES * 2 {
        return Err(CodecError::InvalidTokenLength {
            length: digits.chars().count(),
        });
    }

    let mut bytes = [0u8; DEVICE_TOKEN_BYTES];
    hex::decode_to_slice(&digits, &mut bytes).map_err(|e| match e {
        FromHexError::InvalidHexCharacter { c, .. } => CodecError::InvalidTokenCharacter(c),
        FromHexError::OddLength | FromHexError::InvalidStringLength => {
            CodecError::InvalidTokenLength {
                length: digits.chars().count(),
            }
        }
    })?;

    Ok(bytes)
}

pub fn encode_device_token(bytes: &[u8]) -> String {
    hex::encode(bytes)
}
