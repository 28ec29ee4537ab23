//! Codecs turn structured values into the bytes a backend stores.

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Encoding used for memoized results and typed values.
pub trait Codec: Send + Sync + 'static {
    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes>;

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T>;
}

/// JSON via serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;

    #[test]
    fn test_json_codec() {
        let bytes = JsonCodec::encode(&vec![1, 2, 3]).unwrap();
        assert_eq!(&bytes[..], b"[1,2,3]");

        let decoded: Vec<i32> = JsonCodec::decode(&bytes).unwrap();
        assert_eq!(decoded, vec![1, 2, 3]);
    }

    #[test]
    fn test_decode_mismatch_is_codec_error() {
        let result: Result<u64> = JsonCodec::decode(b"\"text\"");
        assert!(matches!(result, Err(CacheError::Codec(_))));
    }
}
