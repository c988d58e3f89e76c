//! Persistent activation counters.
//!
//! The record lives in two alternating storage slots:
//!
//! ```text
//!   slot "ctr.a" ─┐                        ┌─ [seq: u32 LE][{"instance":N,"overall":M}]
//!                 ├─ highest valid seq ────┤
//!   slot "ctr.b" ─┘                        └─ the other slot is the next write target
//! ```
//!
//! A save always writes the slot that does *not* hold the committed
//! record, with `seq + 1`.  A torn or failed write therefore leaves the
//! committed record untouched, and the next load still finds it.
//!
//! Storage faults never stop counting: the store keeps the session's
//! counters in memory, reports [`StoreHealth::Volatile`], and the next
//! successful save brings flash back in sync.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::ports::{StorageError, StoragePort};
use crate::error::Fault;

pub const COUNTER_NAMESPACE: &str = "counter";
const SLOT_KEYS: [&str; 2] = ["ctr.a", "ctr.b"];

const SEQ_LEN: usize = 4;
/// Longest record the store can produce: both counters at `u64::MAX`.
const MAX_RECORD_LEN: usize =
    r#"{"instance":18446744073709551615,"overall":18446744073709551615}"#.len();
/// Upper bound of one encoded slot.
const MAX_SLOT_LEN: usize = SEQ_LEN + MAX_RECORD_LEN;

/// The two activation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActivationCounters {
    /// Activations since the last instance reset.
    pub instance: u64,
    /// Activations since the last full reset.
    pub overall: u64,
}

impl ActivationCounters {
    pub const ZERO: Self = Self { instance: 0, overall: 0 };

    /// The counters after one more activation.  Saturates instead of wrapping.
    pub fn incremented(self) -> Self {
        Self {
            instance: self.instance.saturating_add(1),
            overall: self.overall.saturating_add(1),
        }
    }
}

/// Whether the in-memory counters are backed by flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreHealth {
    Durable,
    Volatile,
}

/// Result of [`CounterStore::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub counters: ActivationCounters,
    /// A fresh zero record was written because none existed.
    pub provisioned: bool,
    /// Non-fatal fault hit while loading.
    pub fault: Option<Fault>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Committed {
    slot: usize,
    seq: u32,
}

/// Outcome of scanning both slots.
enum Scan {
    Found(Committed, ActivationCounters),
    Empty,
    Unavailable,
}

/// Owner of the counter record.
pub struct CounterStore<S: StoragePort> {
    storage: S,
    current: ActivationCounters,
    committed: Option<Committed>,
    health: StoreHealth,
}

impl<S: StoragePort> CounterStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            current: ActivationCounters::ZERO,
            committed: None,
            health: StoreHealth::Volatile,
        }
    }

    /// Read the counters from flash.
    ///
    /// - no record: provision `{0,0}` and persist it;
    /// - storage cannot be opened: keep the in-memory counters and report
    ///   [`Fault::StorageUnavailable`].
    pub fn load(&mut self) -> LoadReport {
        match self.scan() {
            Scan::Found(committed, counters) => {
                self.committed = Some(committed);
                self.current = counters;
                self.health = StoreHealth::Durable;
                info!(
                    "CounterStore: loaded instance={} overall={} (slot {}, seq {})",
                    counters.instance, counters.overall, committed.slot, committed.seq
                );
                LoadReport { counters, provisioned: false, fault: None }
            }
            Scan::Empty => {
                info!("CounterStore: no record, provisioning zero counters");
                self.current = ActivationCounters::ZERO;
                let fault = self.persist().err();
                LoadReport { counters: self.current, provisioned: fault.is_none(), fault }
            }
            Scan::Unavailable => {
                warn!("CounterStore: storage unavailable, counting in memory");
                self.health = StoreHealth::Volatile;
                LoadReport {
                    counters: self.current,
                    provisioned: false,
                    fault: Some(Fault::StorageUnavailable),
                }
            }
        }
    }

    /// Replace the counters and persist them.
    ///
    /// The in-memory value is updated even when the write fails.
    pub fn save(&mut self, counters: ActivationCounters) -> Result<(), Fault> {
        self.current = counters;
        self.persist()
    }

    /// The serialized record, byte-identical to what is persisted.
    pub fn raw(&self) -> Vec<u8> {
        encode_counters(&self.current)
    }

    pub fn counters(&self) -> ActivationCounters {
        self.current
    }

    pub fn health(&self) -> StoreHealth {
        self.health
    }

    pub fn reset_instance(&mut self) -> Result<(), Fault> {
        self.save(ActivationCounters { instance: 0, ..self.current })
    }

    pub fn reset_overall(&mut self) -> Result<(), Fault> {
        self.save(ActivationCounters { overall: 0, ..self.current })
    }

    pub fn reset_all(&mut self) -> Result<(), Fault> {
        self.save(ActivationCounters::ZERO)
    }

    /// Count one activation on both counters and persist.
    pub fn record_activation(&mut self) -> Result<(), Fault> {
        self.save(self.current.incremented())
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    // ── Slot protocol ──────────────────────────────────────────

    fn persist(&mut self) -> Result<(), Fault> {
        // A store that never saw flash must learn which slot is committed
        // first, or a stale slot with a higher seq could win the next load.
        if self.committed.is_none() {
            if let Scan::Found(committed, _) = self.scan() {
                self.committed = Some(committed);
            }
        }

        let (slot, seq) = match self.committed {
            Some(c) => (1 - c.slot, c.seq.wrapping_add(1)),
            None => (0, 1),
        };

        let mut blob = Vec::with_capacity(MAX_SLOT_LEN);
        blob.extend_from_slice(&seq.to_le_bytes());
        blob.extend_from_slice(&encode_counters(&self.current));
        if blob.len() > MAX_SLOT_LEN {
            warn!("CounterStore: record of {} bytes exceeds slot size {}", blob.len(), MAX_SLOT_LEN);
            self.health = StoreHealth::Volatile;
            return Err(Fault::StorageWriteFailed);
        }

        match self.storage.write(COUNTER_NAMESPACE, SLOT_KEYS[slot], &blob) {
            Ok(()) => {
                self.committed = Some(Committed { slot, seq });
                if self.health == StoreHealth::Volatile {
                    info!("CounterStore: flash back in sync");
                }
                self.health = StoreHealth::Durable;
                Ok(())
            }
            Err(e) => {
                warn!("CounterStore: write to {} failed: {}", SLOT_KEYS[slot], e);
                self.health = StoreHealth::Volatile;
                Err(Fault::from(e))
            }
        }
    }

    fn scan(&self) -> Scan {
        let mut best: Option<(Committed, ActivationCounters)> = None;
        let mut unavailable = 0;

        for (slot, key) in SLOT_KEYS.iter().enumerate() {
            let mut buf = [0u8; MAX_SLOT_LEN];
            let len = match self.storage.read(COUNTER_NAMESPACE, key, &mut buf) {
                Ok(len) => len,
                Err(StorageError::NotFound) => continue,
                Err(StorageError::Unavailable) => {
                    unavailable += 1;
                    continue;
                }
                Err(e) => {
                    warn!("CounterStore: slot {} unreadable: {}", key, e);
                    continue;
                }
            };
            let Some((seq, counters)) = decode_slot(&buf[..len]) else {
                warn!("CounterStore: slot {} corrupted, ignoring", key);
                continue;
            };
            let newer = match best {
                Some((c, _)) => seq_newer(seq, c.seq),
                None => true,
            };
            if newer {
                best = Some((Committed { slot, seq }, counters));
            }
        }

        match best {
            Some((c, counters)) => Scan::Found(c, counters),
            None if unavailable == SLOT_KEYS.len() => Scan::Unavailable,
            None => Scan::Empty,
        }
    }
}

/// Serial-number comparison so the sequence can wrap.
fn seq_newer(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}

fn encode_counters(c: &ActivationCounters) -> Vec<u8> {
    serde_json::to_vec(c).unwrap_or_default()
}

fn decode_slot(bytes: &[u8]) -> Option<(u32, ActivationCounters)> {
    if bytes.len() <= SEQ_LEN {
        return None;
    }
    let (head, body) = bytes.split_at(SEQ_LEN);
    let seq = u32::from_le_bytes([head[0], head[1], head[2], head[3]]);
    let counters = serde_json::from_slice(body).ok()?;
    Some((seq, counters))
}
