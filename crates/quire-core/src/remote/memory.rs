//! In-process remote store
//!
//! Behaves like the real document store (durable IDs, `NotFound` on unknown
//! records) and adds knobs for reachability, latency and injected failures.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{RecordQuery, RemoteError, RemoteResult, RemoteStore};
use crate::models::{GroupDraft, GroupId, Note, NoteDraft, NotePatch, RecordId};

/// Remote operation selector for injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    CreateRecord,
    UpdateRecord,
    QueryRecords,
    CreateGroup,
}

#[derive(Default)]
struct State {
    records: HashMap<String, Note>,
    groups: HashMap<String, GroupDraft>,
    next_id: u64,
    injected: HashMap<RemoteOp, VecDeque<RemoteError>>,
    latency: Option<Duration>,
}

/// Counts of calls made against a [`MemoryRemoteStore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub create_record: usize,
    pub update_record: usize,
    pub query_records: usize,
    pub create_group: usize,
}

#[derive(Default)]
pub struct MemoryRemoteStore {
    state: Mutex<State>,
    unreachable: AtomicBool,
    create_record_calls: AtomicUsize,
    update_record_calls: AtomicUsize,
    query_records_calls: AtomicUsize,
    create_group_calls: AtomicUsize,
}

impl MemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing or regaining the network
    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    /// Fail the next `op` call with `error`; injected errors are consumed in order
    pub fn fail_next(&self, op: RemoteOp, error: RemoteError) {
        self.lock().injected.entry(op).or_default().push_back(error);
    }

    /// Seed a record as if another device had created it
    pub fn insert(&self, note: Note) {
        self.lock()
            .records
            .insert(note.id.as_str().to_string(), note);
    }

    /// Drop a record as if another device had purged it
    pub fn remove(&self, id: &RecordId) -> Option<Note> {
        self.lock().records.remove(id.as_str())
    }

    pub fn record(&self, id: &RecordId) -> Option<Note> {
        self.lock().records.get(id.as_str()).cloned()
    }

    pub fn records(&self) -> Vec<Note> {
        self.lock().records.values().cloned().collect()
    }

    pub fn group(&self, id: &GroupId) -> Option<GroupDraft> {
        self.lock().groups.get(id.as_str()).cloned()
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            create_record: self.create_record_calls.load(Ordering::SeqCst),
            update_record: self.update_record_calls.load(Ordering::SeqCst),
            query_records: self.query_records_calls.load(Ordering::SeqCst),
            create_group: self.create_group_calls.load(Ordering::SeqCst),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Shared preamble of every call: latency, reachability, injected failure
    async fn enter(&self, op: RemoteOp) -> RemoteResult<()> {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteError::NetworkUnavailable(
                "remote store unreachable".to_string(),
            ));
        }
        let injected = self
            .lock()
            .injected
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        injected.map_or(Ok(()), Err)
    }

    fn mint(state: &mut State, prefix: &str) -> String {
        state.next_id += 1;
        format!("{prefix}-{}", state.next_id)
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn create_record(&self, draft: &NoteDraft) -> RemoteResult<RecordId> {
        self.create_record_calls.fetch_add(1, Ordering::SeqCst);
        self.enter(RemoteOp::CreateRecord).await?;

        let mut state = self.lock();
        let id = RecordId::Durable(Self::mint(&mut state, "n"));
        state
            .records
            .insert(id.as_str().to_string(), draft.clone().into_note(id.clone()));
        Ok(id)
    }

    async fn update_record(&self, id: &RecordId, patch: &NotePatch) -> RemoteResult<()> {
        self.update_record_calls.fetch_add(1, Ordering::SeqCst);
        self.enter(RemoteOp::UpdateRecord).await?;

        let mut state = self.lock();
        let record = state
            .records
            .get_mut(id.as_str())
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        patch.apply_to(record);
        Ok(())
    }

    async fn query_records(&self, query: &RecordQuery) -> RemoteResult<Vec<Note>> {
        self.query_records_calls.fetch_add(1, Ordering::SeqCst);
        self.enter(RemoteOp::QueryRecords).await?;

        let state = self.lock();
        Ok(state
            .records
            .values()
            .filter(|note| query.matches(note))
            .cloned()
            .collect())
    }

    async fn create_group(&self, draft: &GroupDraft) -> RemoteResult<GroupId> {
        self.create_group_calls.fetch_add(1, Ordering::SeqCst);
        self.enter(RemoteOp::CreateGroup).await?;

        let mut state = self.lock();
        let id = GroupId::Durable(Self::mint(&mut state, "g"));
        state.groups.insert(id.as_str().to_string(), draft.clone());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContainerId;

    fn draft() -> NoteDraft {
        Note::new_local(ContainerId::new("nb"), GroupId::Staple)
            .with_title("Hello")
            .draft(&GroupId::Staple)
    }

    #[tokio::test]
    async fn create_then_update_record() {
        let remote = MemoryRemoteStore::new();
        let id = remote.create_record(&draft()).await.unwrap();
        assert!(!id.is_temporary());

        let patch = NotePatch {
            title: Some("Renamed".into()),
            ..NotePatch::default()
        };
        remote.update_record(&id, &patch).await.unwrap();
        assert_eq!(remote.record(&id).unwrap().title, "Renamed");
        assert_eq!(remote.calls().update_record, 1);
    }

    #[tokio::test]
    async fn update_of_unknown_record_is_not_found() {
        let remote = MemoryRemoteStore::new();
        let error = remote
            .update_record(&RecordId::durable("missing"), &NotePatch::default())
            .await
            .unwrap_err();
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn unreachable_store_fails_with_network_error() {
        let remote = MemoryRemoteStore::new();
        remote.set_reachable(false);
        let error = remote.create_record(&draft()).await.unwrap_err();
        assert!(matches!(error, RemoteError::NetworkUnavailable(_)));
        assert!(remote.records().is_empty());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_once() {
        let remote = MemoryRemoteStore::new();
        remote.fail_next(RemoteOp::CreateRecord, RemoteError::Unknown("boom".into()));

        let query = RecordQuery::container(ContainerId::new("nb"));
        assert!(remote.query_records(&query).await.is_ok());
        assert!(remote.create_record(&draft()).await.is_err());
        assert!(remote.create_record(&draft()).await.is_ok());
        assert_eq!(remote.calls().create_record, 2);
    }
}
