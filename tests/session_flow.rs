//! End-to-end session flow against an in-memory runtime

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use headwatch::digest::{DigestLog, EngineId};
use headwatch::runtime::{execute, resolve_batch, ChainRuntime};
use headwatch::types::AuthorityId;
use headwatch::{fold, AppEvent, AuxData, BlockHash, BlockHeader, Command, RawEvent, Session, SessionConfig};

struct MockRuntime {
    aux: Option<AuxData>,
    era: Option<Vec<(AuthorityId, u32)>>,
    headers: HashMap<BlockHash, BlockHeader>,
    aux_calls: AtomicUsize,
    era_calls: AtomicUsize,
}

impl MockRuntime {
    fn new(aux: Option<AuxData>) -> Self {
        MockRuntime {
            aux,
            era: None,
            headers: HashMap::new(),
            aux_calls: AtomicUsize::new(0),
            era_calls: AtomicUsize::new(0),
        }
    }

    fn with_era(mut self, points: Vec<(AuthorityId, u32)>) -> Self {
        self.era = Some(points);
        self
    }

    fn with_header(mut self, header: BlockHeader) -> Self {
        self.headers.insert(header.hash, header);
        self
    }
}

#[async_trait]
impl ChainRuntime for MockRuntime {
    async fn aux_data(&self) -> Result<AuxData> {
        self.aux_calls.fetch_add(1, Ordering::SeqCst);
        self.aux.clone().ok_or_else(|| anyhow!("state_call unavailable"))
    }

    async fn era_points(&self) -> Result<Vec<(AuthorityId, u32)>> {
        self.era_calls.fetch_add(1, Ordering::SeqCst);
        self.era.clone().ok_or_else(|| anyhow!("era points unavailable"))
    }

    async fn header(&self, hash: &BlockHash) -> Result<BlockHeader> {
        self.headers
            .get(hash)
            .cloned()
            .ok_or_else(|| anyhow!("unknown block {hash}"))
    }
}

fn authority(b: u8) -> AuthorityId {
    AuthorityId([b; 32])
}

fn aux() -> AuxData {
    AuxData {
        authorities: vec![authority(1), authority(2), authority(3)],
        session_length: 10,
    }
}

fn head(number: u64, fork: u8, slot: u64) -> BlockHeader {
    BlockHeader {
        number,
        hash: BlockHash([fork; 32]),
        parent_hash: BlockHash::default(),
        digest: vec![DigestLog::PreRuntime {
            engine: EngineId::AURA,
            data: slot.to_le_bytes().to_vec(),
        }],
    }
}

fn ev(section: &str, method: &str) -> RawEvent {
    RawEvent {
        section: section.into(),
        method: method.into(),
        data: serde_json::Value::Null,
    }
}

/// Apply an event, run any commands against the runtime, and feed results back
async fn drive(session: &mut Session, runtime: &MockRuntime, ev: AppEvent) {
    let mut pending = session.apply(ev);
    while let Some(cmd) = pending.pop() {
        let result = execute(runtime, cmd).await;
        pending.extend(session.apply(result));
    }
}

#[tokio::test]
async fn authority_set_fetched_lazily_then_used() {
    let runtime = MockRuntime::new(Some(aux()));
    let mut session = Session::new(SessionConfig::default());

    // The first head has no cache yet and stays unattributed
    drive(&mut session, &runtime, AppEvent::NewHead(head(100, 1, 0))).await;
    assert_eq!(runtime.aux_calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.heads().headers()[0].author, None);
    assert!(session.heads().aux().is_some());

    drive(&mut session, &runtime, AppEvent::NewHead(head(101, 2, 25))).await;
    assert_eq!(session.heads().last_author(), Some(&authority(3)));
    assert_eq!(session.heads().last_number(), Some("101"));
    assert_eq!(runtime.aux_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_fetch_leaves_authors_unknown_and_retries() {
    let runtime = MockRuntime::new(None);
    let mut session = Session::new(SessionConfig::default());

    drive(&mut session, &runtime, AppEvent::NewHead(head(1, 1, 0))).await;
    drive(&mut session, &runtime, AppEvent::NewHead(head(2, 2, 1))).await;

    assert_eq!(runtime.aux_calls.load(Ordering::SeqCst), 2);
    assert!(session.heads().aux().is_none());
    assert!(!session.heads().aux_in_flight());
    assert_eq!(session.heads().last_author(), None);
    assert_eq!(session.heads().headers().len(), 2);
}

#[tokio::test]
async fn era_points_refetched_per_head_and_shown_by_author() {
    let runtime = MockRuntime::new(Some(aux())).with_era(vec![(authority(1), 1500), (authority(3), 20)]);
    let mut session = Session::new(SessionConfig::default());

    drive(&mut session, &runtime, AppEvent::NewHead(head(100, 1, 0))).await;
    drive(&mut session, &runtime, AppEvent::NewHead(head(101, 2, 1))).await;
    assert_eq!(runtime.era_calls.load(Ordering::SeqCst), 2);

    let points = session.heads().era_points();
    assert_eq!(points.len(), 2);
    assert_eq!(points[&authority(1)], "1,500");
    assert_eq!(points[&authority(3)], "20");
    assert!(!points.contains_key(&authority(2)));
}

#[tokio::test]
async fn era_points_unavailable_does_not_block_heads() {
    let runtime = MockRuntime::new(Some(aux()));
    let mut session = Session::new(SessionConfig::default());

    drive(&mut session, &runtime, AppEvent::NewHead(head(100, 1, 0))).await;
    drive(&mut session, &runtime, AppEvent::NewHead(head(101, 2, 1))).await;

    // One failure holds further requests until the rotation moves on
    assert_eq!(runtime.era_calls.load(Ordering::SeqCst), 1);
    assert!(session.heads().era_points().is_empty());
    assert_eq!(session.heads().headers().len(), 2);
    assert_eq!(session.heads().last_author(), Some(&authority(1)));
}

#[tokio::test]
async fn relayed_events_are_paired_with_their_height() {
    let runtime = MockRuntime::new(Some(aux())).with_header(head(42, 9, 0));
    let batch = resolve_batch(&runtime, BlockHash([9; 32]), vec![ev("balances", "Transfer")])
        .await
        .unwrap();
    assert_eq!(batch.block_number, 42);
    assert_eq!(batch.block_hash, BlockHash([9; 32]));

    let missing = resolve_batch(&runtime, BlockHash([8; 32]), Vec::new()).await;
    assert!(missing.is_err());
}

#[test]
fn event_redelivery_is_idempotent() {
    let batch = headwatch::EventBatch {
        block_number: 7,
        block_hash: BlockHash([7; 32]),
        records: vec![ev("balances", "Transfer"), ev("staking", "Rewarded"), ev("balances", "Transfer")],
    };
    let (once, _) = fold(
        Session::new(SessionConfig::default()),
        vec![AppEvent::Events(batch.clone())],
    );
    let (twice, _) = fold(
        Session::new(SessionConfig::default()),
        vec![AppEvent::Events(batch.clone()), AppEvent::Events(batch)],
    );
    assert_eq!(once.events(), twice.events());
    assert_eq!(once.events().len(), 2);
}

#[test]
fn reorg_at_same_height_replaces_events() {
    let first = headwatch::EventBatch {
        block_number: 7,
        block_hash: BlockHash([1; 32]),
        records: vec![ev("balances", "Transfer")],
    };
    let second = headwatch::EventBatch {
        block_number: 7,
        block_hash: BlockHash([2; 32]),
        records: vec![ev("staking", "Bonded")],
    };
    let (s, _) = fold(
        Session::new(SessionConfig::default()),
        vec![AppEvent::Events(first), AppEvent::Events(second)],
    );
    assert_eq!(s.events().len(), 1);
    assert_eq!(s.events()[0].block_hash, BlockHash([2; 32]));
    assert_eq!(s.events()[0].method(), "Bonded");
}

#[test]
fn reorg_replaces_header_and_adds_candidate_author() {
    let (s, cmds) = fold(
        Session::new(SessionConfig::default()),
        vec![
            AppEvent::AuxData(aux()),
            AppEvent::NewHead(head(10, 1, 0)),
            AppEvent::NewHead(head(11, 2, 1)),
            AppEvent::NewHead(head(11, 3, 10)),
        ],
    );
    // Era points are still in flight when the boundary triggers the refetch
    assert_eq!(cmds, vec![Command::FetchEraPoints, Command::FetchAuxData]);
    let hashes: Vec<BlockHash> = s.heads().headers().iter().map(|r| r.header.hash).collect();
    assert_eq!(hashes, vec![BlockHash([3; 32]), BlockHash([1; 32])]);
    assert_eq!(s.heads().round_authors(), &[authority(1), authority(2)]);
}

#[test]
fn paused_view_ignores_new_heads_until_resumed() {
    let mut s = Session::new(SessionConfig::default());
    for n in 1..=3 {
        s.apply(AppEvent::NewHead(head(n, n as u8, n)));
    }
    s.pause();
    s.toggle_order();
    s.apply(AppEvent::NewHead(head(4, 4, 4)));

    let frozen: Vec<u64> = s.header_rows().iter().map(|r| r.header.number).collect();
    assert_eq!(frozen, vec![1, 2, 3]);

    s.resume();
    let live: Vec<u64> = s.header_rows().iter().map(|r| r.header.number).collect();
    assert_eq!(live, vec![1, 2, 3, 4]);
}
