use crate::crypto::PublicKey;
use crate::ledger::{Block, BlockKind};
use crate::utils::serde_helpers::{base64_bytes, decimal_f64, decimal_u64};
use crate::utils::Result;
use serde::{Deserialize, Serialize};

/// The self-describing map a block travels as. Key names are part of the
/// protocol and are shared with every peer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BlockMessage {
    #[serde(rename = "pubKeyStr", with = "base64_bytes")]
    pub pub_key: Vec<u8>,
    #[serde(rename = "fromId")]
    pub from_id: String,
    #[serde(rename = "toId")]
    pub to_id: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
    #[serde(rename = "previousDigest", with = "base64_bytes")]
    pub previous_digest: Vec<u8>,
    #[serde(rename = "timeStamp", with = "decimal_f64")]
    pub timestamp: f64,
    #[serde(with = "decimal_u64")]
    pub nonce: u64,
    #[serde(rename = "blockType")]
    pub block_type: String,
}

impl BlockMessage {
    pub fn from_block(block: &Block) -> Self {
        Self {
            pub_key: block.sender_key.as_pem().to_vec(),
            from_id: block.from_id.clone(),
            to_id: block.to_id.clone(),
            data: block.payload.clone(),
            signature: block.signature.clone(),
            previous_digest: block.previous_digest.clone(),
            timestamp: block.timestamp,
            nonce: block.nonce,
            block_type: block.kind.as_str().to_string(),
        }
    }

    pub fn to_block(&self) -> Result<Block> {
        let kind: BlockKind = self.block_type.parse()?;
        Ok(Block {
            kind,
            sender_key: PublicKey::from_pem(self.pub_key.clone()),
            from_id: self.from_id.clone(),
            to_id: self.to_id.clone(),
            payload: self.data.clone(),
            signature: self.signature.clone(),
            previous_digest: self.previous_digest.clone(),
            timestamp: self.timestamp,
            nonce: self.nonce,
        })
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl From<&Block> for BlockMessage {
    fn from(block: &Block) -> Self {
        BlockMessage::from_block(block)
    }
}

/// Frames exchanged between peer processes.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// first frame on every connection
    Hello { voter_id: u32 },
    Block(BlockMessage),
}
