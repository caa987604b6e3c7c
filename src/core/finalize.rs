//! Transaction finalization: sign, broadcast, wait, extract.
//!
//! Broadcasting blocks until the node reports inclusion; timeouts belong to
//! the node client. Failures are surfaced as-is and never retried.

use tracing::{debug, info};

use crate::adapters::{TxReceipt, TxRequest};

use super::context::RunContext;
use super::error::JobError;

/// The part of a receipt a job records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Hash,
    Address,
    Return,
    BlockHash,
}

impl Facet {
    fn label(self) -> &'static str {
        match self {
            Facet::Hash => "transaction hash",
            Facet::Address => "contract address",
            Facet::Return => "return value",
            Facet::BlockHash => "block hash",
        }
    }
}

/// Sign `request` as the active account and broadcast it, waiting for
/// inclusion
pub async fn sign_and_broadcast(
    ctx: &RunContext,
    mut request: TxRequest,
) -> Result<TxReceipt, JobError> {
    request.chain_id = ctx.chain_id.clone();

    let public_key = match &ctx.public_key {
        Some(key) => key.clone(),
        None => ctx.keys.public_key(&request.from).await?,
    };

    let unsigned = ctx.node.build_tx(&request, &public_key).await?;
    let signature = ctx.keys.sign(&request.from, &unsigned.sign_bytes).await?;

    info!(from = %request.from, "Broadcasting transaction");
    let receipt = ctx.node.broadcast(unsigned, &signature).await?;
    debug!(hash = %hex::encode_upper(&receipt.hash), "Transaction included");

    Ok(receipt)
}

/// Raw bytes of one facet; a missing or empty facet is [`JobError::NoResult`]
pub fn extract(receipt: &TxReceipt, facet: Facet) -> Result<&[u8], JobError> {
    let bytes = match facet {
        Facet::Hash => Some(receipt.hash.as_slice()),
        Facet::Address => receipt.address.as_deref(),
        Facet::Return => receipt.return_data.as_deref(),
        Facet::BlockHash => receipt.block_hash.as_deref(),
    };

    match bytes {
        Some(b) if !b.is_empty() => Ok(b),
        _ => Err(JobError::NoResult(facet.label())),
    }
}

/// A facet rendered as upper-case hex
pub fn extract_hex(receipt: &TxReceipt, facet: Facet) -> Result<String, JobError> {
    extract(receipt, facet).map(hex::encode_upper)
}

/// Sign, broadcast and render one facet of the receipt
pub async fn finalize(
    ctx: &RunContext,
    request: TxRequest,
    facet: Facet,
) -> Result<String, JobError> {
    let receipt = sign_and_broadcast(ctx, request).await?;
    extract_hex(&receipt, facet)
}
