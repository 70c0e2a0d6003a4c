//! Migration engine: outbound queue + sender worker pool (§4.4, §9).
//!
//! The queue decouples reconfiguration (which just scans keys and enqueues
//! jobs) from handoff latency (which is all network I/O), and its bound
//! gives natural backpressure if migrations can't keep up with churn.

use crate::state::NodeState;
use loopcache_corelib::node::NodeId;
use loopcache_streaming::protocol::PUT_FLAG_MIGRATION;
use loopcache_streaming::{frame, Message, DEFAULT_MAX_PAYLOAD_BYTES};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::Semaphore;
use tracing::{info, warn};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_WORKER_COUNT: usize = 4;

#[derive(Debug, Clone)]
pub struct MigrationJob {
    pub key: String,
    pub value: Vec<u8>,
    pub target: NodeId,
}

pub fn channel(capacity: usize) -> (Sender<MigrationJob>, Receiver<MigrationJob>) {
    mpsc::channel(capacity)
}

/// Drain `rx` with up to `worker_count` handoffs in flight at once. Runs
/// until the channel is closed (i.e. for the process lifetime).
pub async fn run_sender_pool(
    mut rx: Receiver<MigrationJob>,
    worker_count: usize,
    state: Arc<NodeState>,
    requeue: Sender<MigrationJob>,
) {
    let semaphore = Arc::new(Semaphore::new(worker_count));
    while let Some(job) = rx.recv().await {
        let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
        let state = state.clone();
        let requeue = requeue.clone();
        tokio::spawn(async move {
            send_job(job, &state, &requeue).await;
            drop(permit);
        });
    }
}

async fn send_job(job: MigrationJob, state: &Arc<NodeState>, requeue: &Sender<MigrationJob>) {
    match hand_off(&job).await {
        Ok(true) => {
            state.delete(&job.key);
            info!(key = %job.key, target = %job.target, "migrated key");
        }
        Ok(false) => {
            if let Err(err) = state.refresh_from_master().await {
                warn!(%err, "failed to refresh ring after NotOwner during migration");
            }
            requeue_with_fresh_target(job, state, requeue);
        }
        Err(err) => {
            warn!(key = %job.key, %err, "migration handoff failed, will retry");
            if requeue.try_send(job).is_err() {
                warn!("migration requeue failed; key stays local");
            }
        }
    }
}

/// After a `NotOwner` bounce, re-resolve the owner against the (now
/// refreshed) cached ring instead of resending to the node that just
/// rejected it — otherwise a stale target livelocks forever. Drops the
/// job if the key has no owner or has come back to us.
fn requeue_with_fresh_target(job: MigrationJob, state: &Arc<NodeState>, requeue: &Sender<MigrationJob>) {
    let Some(target) = state.ring().owner(job.key.as_bytes()) else {
        warn!(key = %job.key, "no owner for key under refreshed ring; dropping migration job");
        return;
    };
    if target == state.id {
        return;
    }
    let job = MigrationJob { target, ..job };
    if requeue.try_send(job).is_err() {
        warn!("migration requeue failed; key stays local");
    }
}

/// Returns `Ok(true)` on a successful handoff, `Ok(false)` on `NotOwner`.
async fn hand_off(job: &MigrationJob) -> anyhow::Result<bool> {
    let mut stream = TcpStream::connect((job.target.host.as_str(), job.target.port as u16)).await?;
    let (code, payload) = Message::PutObject {
        key: job.key.clone(),
        value: job.value.clone(),
        flags: PUT_FLAG_MIGRATION,
    }
    .encode();
    frame::write_frame(&mut stream, code, &payload).await?;
    let response = frame::read_frame(&mut stream, DEFAULT_MAX_PAYLOAD_BYTES).await?;
    match Message::decode(response.message_type, &response.payload)? {
        Message::Ok => Ok(true),
        Message::NotOwner(_) => Ok(false),
        other => anyhow::bail!("unexpected migration response: {other:?}"),
    }
}
