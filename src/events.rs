//! Recent-events aggregation
//!
//! Each block's raw event list is filtered, collapsed into one entry per
//! `(section, method)` and stored newest first. A second batch for a height
//! already in the store (a reorg, or a re-announced block) replaces the
//! earlier entries for that height instead of piling up next to them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{BlockHash, EventBatch, RawEvent};

/// One exclusion rule: matching sections, optionally narrowed to methods
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludeRule {
    pub sections: Vec<String>,
    /// `None` excludes every method of the listed sections
    #[serde(default)]
    pub methods: Option<Vec<String>>,
}

impl ExcludeRule {
    fn matches(&self, ev: &RawEvent) -> bool {
        self.sections.iter().any(|s| *s == ev.section)
            && self
                .methods
                .as_ref()
                .map_or(true, |ms| ms.iter().any(|m| *m == ev.method))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    #[serde(default)]
    pub exclude: Vec<ExcludeRule>,
}

fn rule(sections: &[&str], methods: Option<&[&str]>) -> ExcludeRule {
    ExcludeRule {
        sections: sections.iter().map(|s| s.to_string()).collect(),
        methods: methods.map(|ms| ms.iter().map(|m| m.to_string()).collect()),
    }
}

impl Default for EventFilter {
    /// Housekeeping noise present in nearly every block
    fn default() -> Self {
        EventFilter {
            exclude: vec![
                rule(&["system"], None),
                rule(
                    &["balances", "treasury"],
                    Some(&["Deposit", "UpdatedInactive", "Withdraw"]),
                ),
                rule(&["transactionPayment"], Some(&["TransactionFeePaid"])),
                rule(
                    &["paraInclusion", "parasInclusion", "inclusion"],
                    Some(&["CandidateBacked", "CandidateIncluded"]),
                ),
                rule(&["relayChainInfo"], Some(&["CurrentBlockNumbers"])),
            ],
        }
    }
}

impl EventFilter {
    /// Keeps nothing out
    pub fn none() -> Self {
        EventFilter { exclude: Vec::new() }
    }

    /// Load rules from a TOML file:
    ///
    /// ```toml
    /// [[exclude]]
    /// sections = ["system"]
    ///
    /// [[exclude]]
    /// sections = ["balances"]
    /// methods = ["Deposit", "Withdraw"]
    /// ```
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading event filter {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("parsing event filter {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn is_excluded(&self, ev: &RawEvent) -> bool {
        self.exclude.iter().any(|r| r.matches(ev))
    }
}

/// Events of one `(section, method)` pair within a block
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IndexedEvent {
    /// Positions in the block's raw list, ascending
    pub indexes: Vec<usize>,
    /// First record of the group
    pub record: RawEvent,
}

/// Filter and group one block's raw events, most recently introduced group first
pub fn aggregate(records: &[RawEvent], filter: &EventFilter) -> Vec<IndexedEvent> {
    let mut groups: Vec<IndexedEvent> = Vec::new();
    for (index, record) in records.iter().enumerate() {
        if filter.is_excluded(record) {
            continue;
        }
        match groups
            .iter_mut()
            .find(|g| g.record.section == record.section && g.record.method == record.method)
        {
            Some(g) => g.indexes.push(index),
            None => groups.push(IndexedEvent {
                indexes: vec![index],
                record: record.clone(),
            }),
        }
    }
    groups.reverse();
    groups
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregatedEvent {
    pub key: String,
    pub block_number: u64,
    pub block_hash: BlockHash,
    pub indexes: Vec<usize>,
    pub record: RawEvent,
}

impl AggregatedEvent {
    fn new(block_number: u64, block_hash: BlockHash, ev: IndexedEvent) -> Self {
        let joined = ev
            .indexes
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(".");
        AggregatedEvent {
            key: format!("{block_number}-{block_hash}-{joined}"),
            block_number,
            block_hash,
            indexes: ev.indexes,
            record: ev.record,
        }
    }

    pub fn section(&self) -> &str {
        &self.record.section
    }

    pub fn method(&self) -> &str {
        &self.record.method
    }
}

/// Bounded store of aggregated events, newest block first
#[derive(Clone, Debug)]
pub struct EventStore {
    events: Vec<AggregatedEvent>,
    event_count: usize,
    last_block: Option<BlockHash>,
    cap: usize,
    filter: EventFilter,
}

impl EventStore {
    pub fn new(cap: usize, filter: EventFilter) -> Self {
        EventStore {
            events: Vec::new(),
            event_count: 0,
            last_block: None,
            cap: cap.max(1),
            filter,
        }
    }

    /// Fold one block's batch into the store.
    ///
    /// Deduplication is by block identity only. Two consecutive blocks may
    /// carry identical-looking aggregates (same transfers, same amounts) and
    /// both must show up.
    pub fn process(&mut self, block_number: u64, block_hash: BlockHash, records: &[RawEvent]) {
        self.event_count = records.len();

        if self.last_block == Some(block_hash) {
            log::debug!("events for #{block_number} {block_hash} already applied");
            return;
        }
        self.last_block = Some(block_hash);

        // An empty batch still supersedes whatever was shown at its height
        let mut next: Vec<AggregatedEvent> = aggregate(records, &self.filter)
            .into_iter()
            .map(|ev| AggregatedEvent::new(block_number, block_hash, ev))
            .collect();
        next.extend(
            std::mem::take(&mut self.events)
                .into_iter()
                .filter(|old| old.block_number != block_number),
        );
        next.truncate(self.cap);
        self.events = next;
    }

    pub fn apply_batch(&mut self, batch: &EventBatch) {
        self.process(batch.block_number, batch.block_hash, &batch.records);
    }

    pub fn events(&self) -> &[AggregatedEvent] {
        &self.events
    }

    /// Raw (unfiltered) event count of the most recent batch
    pub fn event_count(&self) -> usize {
        self.event_count
    }
}
