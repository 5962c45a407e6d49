//! Turns a fetched ledger transaction into a `TransactionRecord`

use super::types::{TransactionKind, TransactionRecord};
use crate::errors::ExtractionError;
use crate::rpc::utils::lamports_to_sol;
use crate::rpc::FetchedTransaction;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Extract the normalized record.
///
/// Amount is the absolute change of the first account's balance; missing
/// balance data yields `0.0`. Sender and receiver are account keys 0 and 1.
pub fn extract_transaction(tx: FetchedTransaction) -> Result<TransactionRecord, ExtractionError> {
    let signature = tx
        .first_signature()
        .ok_or(ExtractionError::MissingSignature)?
        .to_string();

    let sender = required_key(&tx, &signature, 0)?;
    let receiver = required_key(&tx, &signature, 1)?;

    let amount = tx
        .meta
        .as_ref()
        .and_then(|meta| {
            let pre = *meta.pre_balances.first()?;
            let post = *meta.post_balances.first()?;
            Some(lamports_to_sol(pre.abs_diff(post)))
        })
        .unwrap_or(0.0);

    let kind = classify(&tx);

    let timestamp = tx
        .block_time
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now);

    Ok(TransactionRecord {
        signature,
        timestamp,
        sender,
        receiver,
        amount,
        kind,
        raw: Some(Arc::new(tx)),
    })
}

fn required_key(
    tx: &FetchedTransaction,
    signature: &str,
    index: usize,
) -> Result<String, ExtractionError> {
    tx.account_key(index)
        .map(str::to_string)
        .ok_or_else(|| ExtractionError::MissingAccountKey {
            signature: signature.to_string(),
            index,
        })
}

/// Kind of the first instruction's program; `Unknown` without meta or instructions
fn classify(tx: &FetchedTransaction) -> TransactionKind {
    if tx.meta.is_none() {
        return TransactionKind::Unknown;
    }
    let Some(first) = tx.transaction.message.instructions.first() else {
        return TransactionKind::Unknown;
    };

    let program_id = first
        .program_id
        .as_deref()
        .or_else(|| first.program_id_index.and_then(|i| tx.account_key(i)));

    match program_id {
        Some(id) => TransactionKind::from_program_id(id),
        None => TransactionKind::Unknown,
    }
}
