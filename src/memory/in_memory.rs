// src/memory/in_memory.rs

//! Memory bridge that keeps everything in process.
//!
//! Used by the CLI when no external memory service is configured, and by the
//! tests to observe how the executor drives sessions, episodes and records.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::memory::{
    Episode, EpisodeId, MemoryBridge, MemoryError, MergeReport, MergeStrategy, RecordId,
    RecordMetadata, RecordStatus, SessionId, SessionScope, TaskDefinition,
};
use crate::types::AgentId;

/// Inspectable state of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub owner: AgentId,
    pub scope: SessionScope,
    pub merged_with: Option<MergeStrategy>,
    pub closed: bool,
}

/// Inspectable state of one task record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordInfo {
    pub definition: TaskDefinition,
    pub status: RecordStatus,
    pub metadata: RecordMetadata,
    /// Every status the record went through, oldest first.
    pub history: Vec<RecordStatus>,
}

#[derive(Debug, Default)]
struct BridgeState {
    sessions: HashMap<String, SessionInfo>,
    episodes: Vec<(EpisodeId, Episode)>,
    records: BTreeMap<String, RecordInfo>,
    version: u64,
}

#[derive(Debug, Default)]
pub struct InMemoryMemoryBridge {
    state: Mutex<BridgeState>,
    fail_sessions: AtomicBool,
}

impl InMemoryMemoryBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `create_session` calls fail with `Unavailable`.
    pub fn fail_session_creation(&self, fail: bool) {
        self.fail_sessions.store(fail, Ordering::SeqCst);
    }

    pub fn episodes(&self) -> Vec<Episode> {
        self.state
            .lock()
            .episodes
            .iter()
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.state.lock().sessions.values().cloned().collect()
    }

    /// Sessions that were opened but never closed.
    pub fn open_sessions(&self) -> usize {
        self.state
            .lock()
            .sessions
            .values()
            .filter(|s| !s.closed)
            .count()
    }

    pub fn records(&self) -> Vec<RecordInfo> {
        self.state.lock().records.values().cloned().collect()
    }

    /// Record whose definition title matches `title`.
    pub fn record_titled(&self, title: &str) -> Option<RecordInfo> {
        self.state
            .lock()
            .records
            .values()
            .find(|r| r.definition.title == title)
            .cloned()
    }
}

#[async_trait]
impl MemoryBridge for InMemoryMemoryBridge {
    async fn create_session(
        &self,
        owner: &AgentId,
        scope: SessionScope,
    ) -> Result<SessionId, MemoryError> {
        if self.fail_sessions.load(Ordering::SeqCst) {
            return Err(MemoryError::Unavailable(
                "session creation disabled".to_string(),
            ));
        }

        let id = format!("session-{}", Uuid::new_v4());
        self.state.lock().sessions.insert(
            id.clone(),
            SessionInfo {
                owner: owner.clone(),
                scope,
                merged_with: None,
                closed: false,
            },
        );
        debug!(session = %id, owner = %owner, "opened session");
        Ok(SessionId::new(id))
    }

    async fn merge_session(
        &self,
        session: &SessionId,
        strategy: MergeStrategy,
    ) -> Result<MergeReport, MemoryError> {
        let mut state = self.state.lock();
        let info = state
            .sessions
            .get_mut(session.as_str())
            .filter(|s| !s.closed)
            .ok_or_else(|| MemoryError::SessionNotFound(session.to_string()))?;
        info.merged_with = Some(strategy);

        state.version += 1;
        let new_version = state.version;
        debug!(session = %session, %strategy, new_version, "merged session");
        Ok(MergeReport {
            changes_merged: 0,
            conflicts_resolved: 0,
            new_version,
        })
    }

    async fn close_session(&self, session: SessionId, owner: &AgentId) -> Result<(), MemoryError> {
        let mut state = self.state.lock();
        let info = state
            .sessions
            .get_mut(session.as_str())
            .filter(|s| &s.owner == owner)
            .ok_or_else(|| MemoryError::SessionNotFound(session.to_string()))?;
        info.closed = true;
        debug!(session = %session, owner = %owner, "closed session");
        Ok(())
    }

    async fn store_episode(&self, episode: Episode) -> Result<EpisodeId, MemoryError> {
        let id = EpisodeId(format!("episode-{}", Uuid::new_v4()));
        debug!(episode = %id, task = %episode.task_id, outcome = ?episode.outcome, "stored episode");
        self.state.lock().episodes.push((id.clone(), episode));
        Ok(id)
    }

    async fn create_task_record(&self, definition: TaskDefinition) -> Result<RecordId, MemoryError> {
        let id = format!("record-{}", Uuid::new_v4());
        self.state.lock().records.insert(
            id.clone(),
            RecordInfo {
                definition,
                status: RecordStatus::Pending,
                metadata: RecordMetadata::default(),
                history: vec![RecordStatus::Pending],
            },
        );
        Ok(RecordId(id))
    }

    async fn update_task_record(
        &self,
        id: &RecordId,
        status: RecordStatus,
        metadata: RecordMetadata,
    ) -> Result<(), MemoryError> {
        let mut state = self.state.lock();
        let record = state
            .records
            .get_mut(&id.0)
            .ok_or_else(|| MemoryError::RecordNotFound(id.clone()))?;
        record.status = status;
        record.metadata = metadata;
        record.history.push(status);
        Ok(())
    }
}
