//! Append-only JSONL audit trail: the trade ledger, the equity series, and
//! the session summary record (§6.2, grounded in `mqk-audit`'s
//! `AuditWriter`/hash-chain verification, specialized to the backtest's
//! own record types instead of a generic topic/payload event).

use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use orb_types::CompletedTrade;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// One line of the equity series (§6.2): running totals after a trade
/// closes, sampled at trade granularity rather than bar granularity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquitySample {
    pub trade_seq: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub cumulative_r: f64,
    pub cumulative_dollars: f64,
    pub balance: f64,
    pub peak_balance: f64,
}

/// End-of-run aggregate record (§6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub run_id: Uuid,
    pub config_hash: String,
    pub total_trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub total_r: f64,
    pub total_dollars: f64,
    pub final_balance: f64,
    pub max_drawdown: f64,
}

/// One entry in the ledger's optional hash chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub event_id: Uuid,
    pub run_id: Uuid,
    pub seq: u64,
    pub trade: CompletedTrade,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// Append-only JSONL writer for the trade ledger. One `CompletedTrade`
/// per line, in closing order. The hash chain, when enabled, makes any
/// after-the-fact edit to a closed trade detectable (§6.2, §8 scenario on
/// audit tamper detection).
pub struct LedgerWriter {
    path: PathBuf,
    run_id: Uuid,
    hash_chain: bool,
    last_hash: Option<String>,
    seq: u64,
}

impl LedgerWriter {
    pub fn new(path: impl AsRef<Path>, run_id: Uuid, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {parent:?}"))?;
        }
        Ok(Self {
            path,
            run_id,
            hash_chain,
            last_hash: None,
            seq: 0,
        })
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn last_hash(&self) -> Option<String> {
        self.last_hash.clone()
    }

    /// Append one closed trade. No RNG: the event id is derived from the
    /// chain state, the trade's own id, and the sequence counter, so a
    /// re-run against identical inputs reproduces identical ledger lines
    /// apart from wall-clock fields.
    pub fn append(&mut self, trade: CompletedTrade) -> Result<LedgerEntry> {
        let event_id = derive_event_id(self.last_hash.as_deref(), trade.trade_id, self.seq);
        let mut entry = LedgerEntry {
            event_id,
            run_id: self.run_id,
            seq: self.seq,
            trade,
            hash_prev: None,
            hash_self: None,
        };
        self.seq += 1;

        if self.hash_chain {
            entry.hash_prev = self.last_hash.clone();
            let self_hash = compute_entry_hash(&entry)?;
            entry.hash_self = Some(self_hash.clone());
            self.last_hash = Some(self_hash);
        }

        let line = canonical_json_line(&entry)?;
        append_line(&self.path, &line)?;
        Ok(entry)
    }
}

/// Append-only JSONL writer for the equity series. Shares the ledger's
/// line-per-record, create-parents-on-open conventions but carries no
/// hash chain of its own — it is derived data, reconstructable from the
/// ledger.
pub struct EquityWriter {
    path: PathBuf,
}

impl EquityWriter {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {parent:?}"))?;
        }
        Ok(Self { path })
    }

    pub fn append(&mut self, sample: &EquitySample) -> Result<()> {
        let line = canonical_json_line(sample)?;
        append_line(&self.path, &line)
    }
}

/// Write the single end-of-run summary record, overwriting any prior
/// file at `path` (unlike the ledger and equity series, this is not
/// append-only — it is one record per run).
pub fn write_session_summary(path: impl AsRef<Path>, summary: &SessionSummary) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create_dir_all {parent:?}"))?;
    }
    let line = canonical_json_line(summary)?;
    fs::write(path, line).with_context(|| format!("write session summary {path:?}"))
}

/// Deterministic event id: SHA-256 over `(prev_hash, trade_id, seq)`,
/// truncated to 16 bytes and interpreted as a UUID. No timestamp or RNG
/// input, so identical chain state plus identical trade always derives
/// the same id.
fn derive_event_id(prev_hash: Option<&str>, trade_id: Uuid, seq: u64) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.unwrap_or("").as_bytes());
    hasher.update(trade_id.as_bytes());
    hasher.update(seq.to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

fn compute_entry_hash(entry: &LedgerEntry) -> Result<String> {
    let mut clone = entry.clone();
    clone.hash_self = None;
    let canonical = canonical_json_line(&clone)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {path:?}"))?;
    f.write_all(line.as_bytes()).context("write line")?;
    f.write_all(b"\n").context("write newline")?;
    Ok(())
}

fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize")?;
    serde_json::to_string(&sort_keys(&raw)).context("stringify")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for k in keys {
                sorted.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Outcome of verifying a ledger file's hash chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    Broken { line: usize, reason: String },
}

pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read ledger {:?}", path.as_ref()))?;
    verify_hash_chain_str(&content)
}

pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut line_count = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let entry: LedgerEntry = serde_json::from_str(trimmed)
            .with_context(|| format!("parse ledger entry at line {}", i + 1))?;
        line_count += 1;

        if entry.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, entry.hash_prev
                ),
            });
        }
        if let Some(ref claimed) = entry.hash_self {
            let recomputed = compute_entry_hash(&entry)?;
            if *claimed != recomputed {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!(
                        "hash_self mismatch: claimed {claimed}, recomputed {recomputed}"
                    ),
                });
            }
        }
        prev_hash = entry.hash_self.clone();
    }

    Ok(VerifyResult::Valid { lines: line_count })
}
