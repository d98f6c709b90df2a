use solana_sdk::pubkey::Pubkey;

use crate::indexer::error::IndexerError;

pub trait Base58Conversions {
    fn to_base58(&self) -> String;
    fn from_base58(s: &str) -> Result<Self, IndexerError>
    where
        Self: Sized;
}

impl Base58Conversions for [u8; 32] {
    fn to_base58(&self) -> String {
        bs58::encode(self).into_string()
    }

    fn from_base58(s: &str) -> Result<Self, IndexerError> {
        decode_base58_to_fixed_array(s)
    }
}

impl Base58Conversions for Pubkey {
    fn to_base58(&self) -> String {
        self.to_string()
    }

    fn from_base58(s: &str) -> Result<Self, IndexerError> {
        decode_base58_to_fixed_array(s).map(Pubkey::new_from_array)
    }
}

pub fn decode_base58_to_fixed_array<const N: usize>(input: &str) -> Result<[u8; N], IndexerError> {
    let mut buffer = [0u8; N];
    let decoded_len = bs58::decode(input)
        .onto(&mut buffer)
        .map_err(|e| IndexerError::base58_decode_error(input, e))?;

    if decoded_len != N {
        return Err(IndexerError::InvalidResponseData(format!(
            "expected {} bytes, decoded {} from {}",
            N, decoded_len, input
        )));
    }

    Ok(buffer)
}

pub fn decode_base58_option_to_pubkey(
    value: &Option<String>,
) -> Result<Option<Pubkey>, IndexerError> {
    value
        .as_ref()
        .map(|s| decode_base58_to_fixed_array(s).map(Pubkey::new_from_array))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pubkey_round_trips_through_base58() {
        let key = Pubkey::new_unique();
        assert_eq!(Pubkey::from_base58(&key.to_base58()).unwrap(), key);
    }

    #[test]
    fn short_input_is_rejected() {
        let short = bs58::encode([1u8; 16]).into_string();
        assert!(matches!(
            decode_base58_to_fixed_array::<32>(&short),
            Err(IndexerError::InvalidResponseData(_))
        ));
        assert!(matches!(
            decode_base58_to_fixed_array::<32>("0OIl"),
            Err(IndexerError::Base58DecodeError { .. })
        ));
    }
}
