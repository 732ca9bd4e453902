//! Cell commit actors.
//!
//! A commit carries a snapshot of one row, the field path and the new value. The actor performs the
//! read/compare/write and replies with a [`CommitReply`]. The table only talks to the
//! [`CommitActor`] trait, so tests can resolve commits inline.

use super::error::CommitError;
use super::filter::stringify;
use super::path::FieldPath;
use serde_json::Value;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::TryRecvError;
use std::thread;

#[derive(Clone, Debug, PartialEq)]
pub struct CommitRequest {
    /// Row object as it was when the commit was sent.
    pub row_data: Value,
    pub accessor: FieldPath,
    pub val: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CommitReply {
    /// The stored value already stringifies the same; nothing to apply.
    Unchanged,
    UpdatedRow(Value),
    Error(String),
}

/// Performs the deep-path compare and write for `req`.
///
/// Both actors use this, and the table falls back to it when an actor fails.
pub fn apply_commit(req: &CommitRequest) -> Result<CommitReply, CommitError> {
    let current = req.accessor.get(&req.row_data);
    let present = current.is_some_and(|v| !v.is_null());
    if present == !req.val.is_null() && stringify(current) == stringify(Some(&req.val)) {
        return Ok(CommitReply::Unchanged);
    }
    let mut row = req.row_data.clone();
    req.accessor.set(&mut row, req.val.clone())?;
    Ok(CommitReply::UpdatedRow(row))
}

/// A commit that may not have resolved yet.
#[derive(Debug)]
pub enum PendingCommit {
    Ready(Option<Result<CommitReply, CommitError>>),
    Waiting(Receiver<CommitReply>),
}

impl PendingCommit {
    /// Polls for the reply. Returns it exactly once.
    pub fn try_recv(&mut self) -> Option<Result<CommitReply, CommitError>> {
        match self {
            PendingCommit::Ready(reply) => reply.take(),
            PendingCommit::Waiting(rx) => match rx.try_recv() {
                Ok(reply) => {
                    *self = PendingCommit::Ready(None);
                    Some(Ok(reply))
                }
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => {
                    *self = PendingCommit::Ready(None);
                    Some(Err(CommitError::Disconnected))
                }
            },
        }
    }
}

pub trait CommitActor {
    fn commit(&self, req: CommitRequest) -> PendingCommit;
}

/// Resolves every commit on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineCommitActor;

impl CommitActor for InlineCommitActor {
    fn commit(&self, req: CommitRequest) -> PendingCommit {
        PendingCommit::Ready(Some(apply_commit(&req)))
    }
}

/// Spawns one short-lived thread per commit.
///
/// The thread receives exactly one request, replies once and exits, so commits to different cells
/// never share a worker.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadCommitActor;

impl CommitActor for ThreadCommitActor {
    fn commit(&self, req: CommitRequest) -> PendingCommit {
        let (req_tx, req_rx) = mpsc::channel::<CommitRequest>();
        let (reply_tx, reply_rx) = mpsc::channel::<CommitReply>();
        let spawned = thread::Builder::new()
            .name("datatable-commit".to_string())
            .spawn(move || {
                let Ok(req) = req_rx.recv() else {
                    return;
                };
                let reply = match apply_commit(&req) {
                    Ok(reply) => reply,
                    Err(err) => CommitReply::Error(err.to_string()),
                };
                let _ = reply_tx.send(reply);
            });
        if let Err(err) = spawned {
            log::warn!("could not spawn commit worker: {err}");
            return PendingCommit::Ready(Some(Err(CommitError::Disconnected)));
        }
        if req_tx.send(req).is_err() {
            return PendingCommit::Ready(Some(Err(CommitError::Disconnected)));
        }
        PendingCommit::Waiting(reply_rx)
    }
}
