//! Node calls the session depends on, behind a trait so the driver can be
//! exercised without a live node

use anyhow::Result;
use async_trait::async_trait;

use crate::rpc_utils::{fetch_aux_data, fetch_era_points, get_header};
use crate::session::Command;
use crate::types::{AppEvent, AuthorityId, AuxData, BlockHash, BlockHeader, EventBatch, RawEvent};

#[async_trait]
pub trait ChainRuntime: Send + Sync {
    /// Authority set and session length
    async fn aux_data(&self) -> Result<AuxData>;

    /// Points earned by each authority in the current era
    async fn era_points(&self) -> Result<Vec<(AuthorityId, u32)>>;

    /// Header of a block by hash
    async fn header(&self, hash: &BlockHash) -> Result<BlockHeader>;
}

/// HTTP JSON-RPC implementation
#[derive(Clone, Debug)]
pub struct RpcRuntime {
    pub url: String,
    pub aux_data_method: String,
    pub era_points_method: String,
    pub timeout_ms: u64,
}

#[async_trait]
impl ChainRuntime for RpcRuntime {
    async fn aux_data(&self) -> Result<AuxData> {
        fetch_aux_data(&self.url, &self.aux_data_method, self.timeout_ms).await
    }

    async fn era_points(&self) -> Result<Vec<(AuthorityId, u32)>> {
        fetch_era_points(&self.url, &self.era_points_method, self.timeout_ms).await
    }

    async fn header(&self, hash: &BlockHash) -> Result<BlockHeader> {
        get_header(&self.url, hash, self.timeout_ms).await
    }
}

/// Attach height and hash to a relayed event list via the companion header lookup
pub async fn resolve_batch<R: ChainRuntime + ?Sized>(
    runtime: &R,
    at: BlockHash,
    records: Vec<RawEvent>,
) -> Result<EventBatch> {
    let header = runtime.header(&at).await?;
    Ok(EventBatch {
        block_number: header.number,
        block_hash: at,
        records,
    })
}

/// Run one session command to completion, producing the event to feed back
pub async fn execute<R: ChainRuntime + ?Sized>(runtime: &R, cmd: Command) -> AppEvent {
    match cmd {
        Command::FetchAuxData => match runtime.aux_data().await {
            Ok(aux) => AppEvent::AuxData(aux),
            Err(e) => AppEvent::AuxDataFailed(format!("{e:#}")),
        },
        Command::FetchEraPoints => match runtime.era_points().await {
            Ok(points) => AppEvent::EraPoints(points),
            Err(e) => AppEvent::EraPointsFailed(format!("{e:#}")),
        },
    }
}
