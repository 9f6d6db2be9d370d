use crate::error::RpcError;
use crate::handle::Handle;
use crate::value::{ApiFunction, ApiValue};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::trace;

/// Registry of locally exported functions, keyed by wire handle.
///
/// Append-only while the session lives: serialization inserts, nothing
/// removes short of transport teardown. Handles are never reused.
#[derive(Default)]
pub struct MethodTable {
    entries: DashMap<Handle, Arc<dyn ApiFunction>>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under a fresh handle and return the handle.
    pub fn register(&self, function: Arc<dyn ApiFunction>) -> Handle {
        let handle = Handle::generate();
        self.entries.insert(handle.clone(), function);
        trace!(method_id = %handle, "registered exported function");
        handle
    }

    pub fn get(&self, handle: &Handle) -> Option<Arc<dyn ApiFunction>> {
        self.entries.get(handle).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

pub type ReplySender = oneshot::Sender<Result<ApiValue, RpcError>>;
pub type ReplyReceiver = oneshot::Receiver<Result<ApiValue, RpcError>>;

/// Pending settlements for outbound invocations, keyed by reply handle.
///
/// Exactly one entry exists per in-flight proxy call; settling removes it.
#[derive(Default)]
pub struct ReplyTable {
    entries: DashMap<Handle, ReplySender>,
}

impl ReplyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a reply handle and park a settlement slot for it.
    pub fn insert_new(&self) -> (Handle, ReplyReceiver) {
        let handle = Handle::generate();
        let (tx, rx) = oneshot::channel();
        self.entries.insert(handle.clone(), tx);
        (handle, rx)
    }

    /// Settle the entry for `handle`. Returns false for orphans: replies
    /// whose entry was already settled or never existed.
    pub fn settle(&self, handle: &Handle, outcome: Result<ApiValue, RpcError>) -> bool {
        match self.entries.remove(handle) {
            Some((_, tx)) => {
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Reject every pending entry. Used at transport teardown.
    pub fn reject_all(&self, error: &RpcError) {
        let handles: Vec<Handle> = self.entries.iter().map(|e| e.key().clone()).collect();
        for handle in handles {
            if let Some((_, tx)) = self.entries.remove(&handle) {
                let _ = tx.send(Err(error.clone()));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registered_methods_stay_callable() {
        let table = MethodTable::new();
        let greet = ApiValue::function(|_| async { Ok(ApiValue::from("bar")) });
        let handle = table.register(greet.as_function().unwrap());

        let function = table.get(&handle).unwrap();
        let result = function.call(vec![]).await.unwrap();
        assert_eq!(result.as_str(), Some("bar"));
    }

    #[test]
    fn each_registration_gets_its_own_handle() {
        let table = MethodTable::new();
        let f = ApiValue::function(|_| async { Ok(ApiValue::from(1i64)) })
            .as_function()
            .unwrap();
        let a = table.register(f.clone());
        let b = table.register(f);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn settling_removes_the_entry() {
        let table = ReplyTable::new();
        let (handle, rx) = table.insert_new();
        assert_eq!(table.len(), 1);

        assert!(table.settle(&handle, Ok(ApiValue::from("done"))));
        assert!(table.is_empty());
        assert_eq!(rx.await.unwrap().unwrap().as_str(), Some("done"));

        // A second settlement for the same handle is an orphan.
        assert!(!table.settle(&handle, Ok(ApiValue::from("again"))));
    }

    #[tokio::test]
    async fn reject_all_fails_every_pending_call() {
        let table = ReplyTable::new();
        let (_, rx1) = table.insert_new();
        let (_, rx2) = table.insert_new();

        table.reject_all(&RpcError::transport_closed("stream dropped"));
        assert!(table.is_empty());

        for rx in [rx1, rx2] {
            let err = rx.await.unwrap().unwrap_err();
            assert!(matches!(err, RpcError::TransportClosed(_)));
        }
    }
}
