//! Canonical binary encoding for hashing.
//!
//! Every node must produce identical bytes for identical values, since
//! header hashes and the transaction/receipt roots are computed over this
//! encoding. All numeric values are little-endian.
//!
//! Encoding format:
//! - Fixed-size fields (Hash, Address, u64, u128, bool) are written directly
//! - Variable-length fields (bytes) are length-prefixed (u32 LE)
//! - Repeated fields are count-prefixed (u32 LE) then concatenated
//! - Tagged unions: 1-byte tag followed by the variant's fields

use crate::bloom::BLOOM_BYTES;
use crate::block::{Header, Log, Receipt, Transaction, TxPayload};
use crate::state::Account;
use crate::types::Hash;

const PAYLOAD_TRANSFER: u8 = 0x01;
const PAYLOAD_EMIT: u8 = 0x02;

const RECEIPT_POST_STATE: u8 = 0x00;
const RECEIPT_STATUS: u8 = 0x01;

// ── Encoding helpers ──

fn write_u8(buf: &mut Vec<u8>, v: u8) {
    buf.push(v);
}

fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn write_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn write_u128(buf: &mut Vec<u8>, v: u128) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn write_bool(buf: &mut Vec<u8>, v: bool) {
    buf.push(if v { 1 } else { 0 });
}

fn write_hash(buf: &mut Vec<u8>, h: &Hash) {
    buf.extend_from_slice(h);
}

fn write_var_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    write_u32(buf, data.len() as u32);
    buf.extend_from_slice(data);
}

fn write_count(buf: &mut Vec<u8>, count: usize) {
    write_u32(buf, count as u32);
}

// ── Header ──

fn write_header(buf: &mut Vec<u8>, header: &Header) {
    write_hash(buf, &header.parent_hash);
    write_hash(buf, &header.uncle_hash);
    write_hash(buf, &header.coinbase);
    write_hash(buf, &header.state_root);
    write_hash(buf, &header.tx_root);
    write_hash(buf, &header.receipt_root);
    buf.extend_from_slice(header.bloom.as_bytes());
    write_u64(buf, header.difficulty);
    write_u64(buf, header.number);
    write_u64(buf, header.gas_limit);
    write_u64(buf, header.gas_used);
    write_u64(buf, header.timestamp);
    write_var_bytes(buf, &header.extra_data);
}

/// Encode a header.
pub fn encode_header(header: &Header) -> Vec<u8> {
    let mut buf = Vec::with_capacity(512 + header.extra_data.len());
    write_header(&mut buf, header);
    buf
}

/// Encode a header list (count-prefixed), used for the uncle hash.
pub fn encode_headers(headers: &[Header]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_count(&mut buf, headers.len());
    for header in headers {
        write_header(&mut buf, header);
    }
    buf
}

// ── Transaction ──

fn write_unsigned_transaction(buf: &mut Vec<u8>, tx: &Transaction) {
    write_u64(buf, tx.nonce);
    write_u64(buf, tx.gas_price);
    write_u64(buf, tx.gas_limit);
    match &tx.payload {
        TxPayload::Transfer { to, value } => {
            write_u8(buf, PAYLOAD_TRANSFER);
            write_hash(buf, to);
            write_u128(buf, *value);
        }
        TxPayload::Emit { topics, data } => {
            write_u8(buf, PAYLOAD_EMIT);
            write_count(buf, topics.len());
            for topic in topics {
                write_hash(buf, topic);
            }
            write_var_bytes(buf, data);
        }
    }
    write_hash(buf, &tx.from);
}

fn write_transaction(buf: &mut Vec<u8>, tx: &Transaction) {
    write_unsigned_transaction(buf, tx);
    buf.extend_from_slice(&tx.signature);
}

/// Encode the signed portion of a transaction (everything but the signature).
pub fn encode_unsigned_transaction(tx: &Transaction) -> Vec<u8> {
    let mut buf = Vec::with_capacity(160);
    write_unsigned_transaction(&mut buf, tx);
    buf
}

/// Encode a signed transaction.
pub fn encode_transaction(tx: &Transaction) -> Vec<u8> {
    let mut buf = Vec::with_capacity(224);
    write_transaction(&mut buf, tx);
    buf
}

// ── Receipt ──

fn write_log(buf: &mut Vec<u8>, log: &Log) {
    write_hash(buf, &log.address);
    write_count(buf, log.topics.len());
    for topic in &log.topics {
        write_hash(buf, topic);
    }
    write_var_bytes(buf, &log.data);
}

/// Encode the consensus fields of a receipt.
///
/// Back-references (tx hash, block hash, indexes) are derived data and are
/// not part of the receipt root.
pub fn encode_receipt(receipt: &Receipt) -> Vec<u8> {
    let mut buf = Vec::with_capacity(BLOOM_BYTES + 64);
    match &receipt.post_state {
        Some(root) => {
            write_u8(&mut buf, RECEIPT_POST_STATE);
            write_hash(&mut buf, root);
        }
        None => {
            write_u8(&mut buf, RECEIPT_STATUS);
            write_bool(&mut buf, receipt.status);
        }
    }
    write_u64(&mut buf, receipt.cumulative_gas_used);
    buf.extend_from_slice(receipt.bloom.as_bytes());
    write_count(&mut buf, receipt.logs.len());
    for log in &receipt.logs {
        write_log(&mut buf, log);
    }
    buf
}

// ── Account ──

/// Encode an account leaf for the state root.
pub fn encode_account(account: &Account) -> Vec<u8> {
    let mut buf = Vec::with_capacity(24);
    write_u64(&mut buf, account.nonce);
    write_u128(&mut buf, account.balance);
    buf
}
