//! Per-node completion ledger.
//!
//! Each (node, task) invocation reports its terminal state to the ledger;
//! the splice post-stage is gated on the ledger showing every expected node
//! complete, rather than on positional inference from node or task indices.
//! Entries live in one file per node so that no two queue jobs ever write
//! the same path.

use std::fs;
use std::path::{Path, PathBuf};

use fh_core::errors::{ErrorInfo, FhError};
use fh_core::NodeId;
use serde::{Deserialize, Serialize};

use crate::serde_io::from_json_slice;

/// Terminal state recorded for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeState {
    /// No invocation has finished the node yet.
    Pending,
    /// The node's final profile exists; no further restarts are needed.
    Complete,
    /// The last invocation exited non-zero.
    Failed,
}

/// Ledger entry owned exclusively by one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    /// Node partition index.
    pub node: NodeId,
    /// Terminal state of the node.
    pub state: NodeState,
    /// Task index of the invocation that recorded this entry.
    pub task: u32,
    /// Final log-probability profile, present once complete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ln_prob_file: Option<PathBuf>,
    /// Error message captured when the node failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Queryable registry of per-node completion entries.
#[derive(Debug, Clone)]
pub struct CompletionLedger {
    dir: PathBuf,
    expected: usize,
}

fn io_error(code: &str, path: &Path, err: impl ToString) -> FhError {
    FhError::Serde(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

impl CompletionLedger {
    /// Opens (creating if necessary) the ledger directory for a run that
    /// expects `expected` node entries.
    pub fn open(dir: &Path, expected: usize) -> Result<Self, FhError> {
        fs::create_dir_all(dir).map_err(|err| io_error("ledger-mkdir", dir, err))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            expected,
        })
    }

    /// Number of node entries expected before the post-stage may run.
    pub fn expected(&self) -> usize {
        self.expected
    }

    fn entry_path(&self, node: NodeId) -> PathBuf {
        self.dir.join(format!("node{node}.json"))
    }

    /// Reads the entry for a node, if one has been recorded.
    pub fn entry(&self, node: NodeId) -> Result<Option<NodeEntry>, FhError> {
        let path = self.entry_path(node);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|err| io_error("ledger-read", &path, err))?;
        Ok(Some(from_json_slice(&bytes)?))
    }

    fn write_entry(&self, entry: &NodeEntry) -> Result<(), FhError> {
        let path = self.entry_path(entry.node);
        let json = serde_json::to_string_pretty(entry)
            .map_err(|err| io_error("ledger-serialize", &path, err))?;
        fs::write(&path, json).map_err(|err| io_error("ledger-write", &path, err))
    }

    /// Records a node as complete with its final profile location.
    pub fn mark_complete(
        &self,
        node: NodeId,
        task: u32,
        ln_prob_file: &Path,
    ) -> Result<(), FhError> {
        self.write_entry(&NodeEntry {
            node,
            state: NodeState::Complete,
            task,
            ln_prob_file: Some(ln_prob_file.to_path_buf()),
            error: None,
        })
    }

    /// Records a node as failed.
    pub fn mark_failed(&self, node: NodeId, task: u32, error: &str) -> Result<(), FhError> {
        self.write_entry(&NodeEntry {
            node,
            state: NodeState::Failed,
            task,
            ln_prob_file: None,
            error: Some(error.to_string()),
        })
    }

    /// Whether every expected node has recorded completion.
    pub fn all_complete(&self) -> Result<bool, FhError> {
        for idx in 0..self.expected {
            match self.entry(NodeId::from_raw(idx as u32))? {
                Some(entry) if entry.state == NodeState::Complete => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Returns every node's final profile path in ascending node order.
    ///
    /// Fails unless the ledger shows all expected nodes complete; callers
    /// must gate the splice stage on this.
    pub fn profiles_in_order(&self) -> Result<Vec<PathBuf>, FhError> {
        let mut profiles = Vec::with_capacity(self.expected);
        for idx in 0..self.expected {
            let node = NodeId::from_raw(idx as u32);
            let entry = self.entry(node)?.ok_or_else(|| {
                FhError::Splice(
                    ErrorInfo::new("ledger-incomplete", "node has not completed")
                        .with_context("node", node.to_string()),
                )
            })?;
            match (entry.state, entry.ln_prob_file) {
                (NodeState::Complete, Some(path)) => profiles.push(path),
                _ => {
                    return Err(FhError::Splice(
                        ErrorInfo::new("ledger-incomplete", "node has not completed")
                            .with_context("node", node.to_string()),
                    ))
                }
            }
        }
        Ok(profiles)
    }
}
