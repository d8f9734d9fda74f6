//! YAML recording codec

use super::Codec;
use crate::error::Result;
use crate::transaction::Transaction;

/// Alternate codec: same logical structure as JSON, `.yaml` suffix
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn suffix(&self) -> &'static str {
        "yaml"
    }

    fn encode(&self, transactions: &[Transaction]) -> Result<Vec<u8>> {
        Ok(serde_yaml::to_string(transactions)?.into_bytes())
    }

    fn decode(&self, raw: &[u8]) -> Result<Vec<Transaction>> {
        Ok(serde_yaml::from_slice(raw)?)
    }
}
