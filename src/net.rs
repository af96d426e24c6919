//! Authority contracts: the edit mutation channel and the edit feed.
//!
//! Transport and wire encoding are out of scope. Submissions run on a
//! dedicated client thread so the owning thread never blocks on a round-trip;
//! outcomes come back over a channel drained once per tick.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::{Deserialize, Serialize};
use strata_blocks::BlockType;
use strata_geom::BlockPos;

/// An edit as seen by the authority: absolute block plus new type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEdit {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    #[serde(rename = "type")]
    pub ty: BlockType,
}

impl BlockEdit {
    pub fn new(pos: BlockPos, ty: BlockType) -> Self {
        Self {
            x: pos.x,
            y: pos.y,
            z: pos.z,
            ty,
        }
    }

    #[inline]
    pub fn pos(&self) -> BlockPos {
        BlockPos::new(self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityError {
    Unreachable(String),
    Rejected(String),
}

impl std::fmt::Display for AuthorityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorityError::Unreachable(msg) => write!(f, "authority unreachable: {}", msg),
            AuthorityError::Rejected(msg) => write!(f, "edit rejected: {}", msg),
        }
    }
}

impl std::error::Error for AuthorityError {}

/// Remote source of truth for block edits. Repeating a confirmed edit must be
/// harmless.
pub trait Authority: Send + Sync + 'static {
    fn submit_block_edit(&self, world_id: &str, edit: BlockEdit)
    -> Result<BlockType, AuthorityError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditKind {
    Break,
    Place,
}

#[derive(Clone, Debug)]
pub struct EditRequest {
    pub id: u64,
    pub kind: EditKind,
    pub edit: BlockEdit,
    /// Block type at submission time; what a break yields.
    pub previous: BlockType,
}

#[derive(Debug)]
pub struct EditOutcome {
    pub request: EditRequest,
    pub result: Result<BlockType, AuthorityError>,
}

/// Background client that forwards edit requests to an [`Authority`].
pub struct EditClient {
    req_tx: Sender<EditRequest>,
    out_rx: Receiver<EditOutcome>,
}

impl EditClient {
    pub fn spawn(world_id: String, authority: Arc<dyn Authority>) -> Self {
        let (req_tx, req_rx) = unbounded::<EditRequest>();
        let (out_tx, out_rx) = unbounded::<EditOutcome>();
        let spawned = thread::Builder::new()
            .name("strata-net".into())
            .spawn(move || {
                while let Ok(request) = req_rx.recv() {
                    let result = authority.submit_block_edit(&world_id, request.edit);
                    if out_tx.send(EditOutcome { request, result }).is_err() {
                        break;
                    }
                }
            });
        if let Err(err) = spawned {
            log::error!(target: "edit", "failed to start edit client: {}", err);
        }
        Self { req_tx, out_rx }
    }

    /// Hand a request to the client thread. Fails only when the thread is
    /// gone, returning the request.
    pub fn submit(&self, request: EditRequest) -> Result<(), EditRequest> {
        self.req_tx.send(request).map_err(|e| e.into_inner())
    }

    pub fn drain(&self) -> Vec<EditOutcome> {
        self.out_rx.try_iter().collect()
    }

    /// Block until at least one outcome arrives or `timeout` passes.
    pub fn wait(&self, timeout: std::time::Duration) -> Vec<EditOutcome> {
        let mut out: Vec<EditOutcome> = self.out_rx.recv_timeout(timeout).into_iter().collect();
        out.extend(self.drain());
        out
    }
}

/// In-process authority: upserts edits keyed by `world:x:y:z` and fans them out
/// to every subscriber of that world.
#[derive(Default)]
pub struct LoopbackAuthority {
    records: Mutex<HashMap<String, (String, BlockEdit)>>,
    subscribers: Mutex<Vec<(String, Sender<BlockEdit>)>>,
    offline: AtomicBool,
    submissions: AtomicU64,
}

impl LoopbackAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, world_id: &str) -> Receiver<BlockEdit> {
        let (tx, rx) = unbounded();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push((world_id.to_string(), tx));
        }
        rx
    }

    /// Simulate a transport outage: every submission fails until cleared.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    /// Total submissions received, failed ones included.
    pub fn submissions(&self) -> u64 {
        self.submissions.load(Ordering::Relaxed)
    }

    /// Stored edits for one world, sorted by position.
    pub fn edits_for(&self, world_id: &str) -> Vec<BlockEdit> {
        let Ok(records) = self.records.lock() else {
            return Vec::new();
        };
        let mut out: Vec<BlockEdit> = records
            .values()
            .filter(|(w, _)| w == world_id)
            .map(|(_, e)| *e)
            .collect();
        out.sort_by_key(|e| (e.x, e.y, e.z));
        out
    }
}

impl Authority for LoopbackAuthority {
    fn submit_block_edit(
        &self,
        world_id: &str,
        edit: BlockEdit,
    ) -> Result<BlockType, AuthorityError> {
        self.submissions.fetch_add(1, Ordering::Relaxed);
        if self.offline.load(Ordering::Relaxed) {
            return Err(AuthorityError::Unreachable("loopback offline".into()));
        }
        let key = format!("{}:{}", world_id, edit.pos().rep());
        self.records
            .lock()
            .map_err(|_| AuthorityError::Rejected("store poisoned".into()))?
            .insert(key, (world_id.to_string(), edit));
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.retain(|(w, tx)| w != world_id || tx.send(edit).is_ok());
        }
        Ok(edit.ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn loopback_upserts_and_notifies_same_world_only() {
        let auth = LoopbackAuthority::new();
        let rx_a = auth.subscribe("a");
        let rx_b = auth.subscribe("b");
        let e = BlockEdit::new(BlockPos::new(1, 2, 3), BlockType::STONE);
        assert_eq!(auth.submit_block_edit("a", e), Ok(BlockType::STONE));
        let e2 = BlockEdit { ty: BlockType::AIR, ..e };
        auth.submit_block_edit("a", e2).unwrap();
        assert_eq!(auth.edits_for("a"), vec![e2]);
        assert_eq!(rx_a.try_iter().count(), 2);
        assert_eq!(rx_b.try_iter().count(), 0);
    }

    #[test]
    fn offline_submission_fails() {
        let auth = LoopbackAuthority::new();
        auth.set_offline(true);
        let e = BlockEdit::new(BlockPos::new(0, 0, 0), BlockType::DIRT);
        assert!(matches!(
            auth.submit_block_edit("w", e),
            Err(AuthorityError::Unreachable(_))
        ));
        assert_eq!(auth.submissions(), 1);
        assert!(auth.edits_for("w").is_empty());
    }

    #[test]
    fn client_round_trip() {
        let auth = Arc::new(LoopbackAuthority::new());
        let client = EditClient::spawn("w".into(), auth.clone());
        let req = EditRequest {
            id: 1,
            kind: EditKind::Place,
            edit: BlockEdit::new(BlockPos::new(4, 5, 6), BlockType::GLASS),
            previous: BlockType::AIR,
        };
        client.submit(req).unwrap();
        let out = client.wait(Duration::from_secs(2));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].request.id, 1);
        assert_eq!(out[0].result, Ok(BlockType::GLASS));
    }

    #[test]
    fn edit_serializes_with_type_field() {
        let e = BlockEdit::new(BlockPos::new(1, -2, 3), BlockType::SAND);
        let s = toml::to_string(&e).unwrap();
        assert!(s.contains("type = 4"));
    }
}
