//! Stored response records.
//!
//! A cached response is packed into a single backend value so one round trip
//! fetches both body and content type:
//!
//! ```text
//! [0u8][body]                              no content type
//! [1u8][u32 BE length][content type][body] with content type
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CacheError, Result};

const NO_CONTENT_TYPE: u8 = 0;
const WITH_CONTENT_TYPE: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRecord {
    pub body: Bytes,
    pub content_type: Option<String>,
}

impl ResponseRecord {
    pub fn new(body: impl Into<Bytes>, content_type: Option<String>) -> Self {
        Self {
            body: body.into(),
            content_type,
        }
    }

    pub fn encode(&self) -> Bytes {
        match &self.content_type {
            None => {
                let mut buf = BytesMut::with_capacity(1 + self.body.len());
                buf.put_u8(NO_CONTENT_TYPE);
                buf.put_slice(&self.body);
                buf.freeze()
            }
            Some(content_type) => {
                let mut buf = BytesMut::with_capacity(5 + content_type.len() + self.body.len());
                buf.put_u8(WITH_CONTENT_TYPE);
                buf.put_u32(content_type.len() as u32);
                buf.put_slice(content_type.as_bytes());
                buf.put_slice(&self.body);
                buf.freeze()
            }
        }
    }

    pub fn decode(mut raw: Bytes) -> Result<Self> {
        let malformed = |reason: &str| CacheError::InvalidInput(format!("malformed response record: {}", reason));

        if !raw.has_remaining() {
            return Err(malformed("empty value"));
        }
        match raw.get_u8() {
            NO_CONTENT_TYPE => Ok(Self::new(raw, None)),
            WITH_CONTENT_TYPE => {
                if raw.remaining() < 4 {
                    return Err(malformed("truncated header"));
                }
                let len = raw.get_u32() as usize;
                if raw.remaining() < len {
                    return Err(malformed("truncated content type"));
                }
                let content_type = raw.split_to(len);
                let content_type = String::from_utf8(content_type.to_vec())
                    .map_err(|_| malformed("content type is not UTF-8"))?;
                Ok(Self::new(raw, Some(content_type)))
            }
            flag => Err(malformed(&format!("unknown flag {}", flag))),
        }
    }
}
