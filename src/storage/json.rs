//! JSON recording codec

use super::Codec;
use crate::error::Result;
use crate::transaction::Transaction;

/// Baseline codec: pretty-printed JSON for reviewable diffs
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn suffix(&self) -> &'static str {
        "json"
    }

    fn encode(&self, transactions: &[Transaction]) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(transactions)?)
    }

    fn decode(&self, raw: &[u8]) -> Result<Vec<Transaction>> {
        Ok(serde_json::from_slice(raw)?)
    }
}
