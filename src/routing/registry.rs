//! Function registry caching the last known descriptor of every function.

use crate::function::FunctionDescriptor;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Concurrent map from function name to descriptor.
///
/// Reads take the shared lock, writes the exclusive one. Callers always
/// receive owned clones, never references into the map.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: RwLock<HashMap<String, FunctionDescriptor>>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the descriptor for `descriptor.service`,
    /// returning the one it replaced.
    pub async fn add_function(&self, descriptor: FunctionDescriptor) -> Option<FunctionDescriptor> {
        let mut functions = self.functions.write().await;
        debug!("Caching function: {}", descriptor.service);
        functions.insert(descriptor.service.clone(), descriptor)
    }

    /// Insert or overwrite a batch of descriptors under a single write lock.
    ///
    /// Later entries win when a name appears more than once.
    pub async fn upsert_all<I>(&self, descriptors: I) -> usize
    where
        I: IntoIterator<Item = FunctionDescriptor>,
    {
        let mut functions = self.functions.write().await;
        let mut count = 0;
        for descriptor in descriptors {
            functions.insert(descriptor.service.clone(), descriptor);
            count += 1;
        }
        count
    }

    /// Get a copy of the descriptor for `name`.
    pub async fn get_function(&self, name: &str) -> Option<FunctionDescriptor> {
        let functions = self.functions.read().await;
        functions.get(name).cloned()
    }

    /// Snapshot of every cached descriptor, in no particular order.
    pub async fn get_functions(&self) -> Vec<FunctionDescriptor> {
        let functions = self.functions.read().await;
        functions.values().cloned().collect()
    }

    /// Remove the descriptor for `name`, returning it if it was cached.
    pub async fn remove_function(&self, name: &str) -> Option<FunctionDescriptor> {
        let mut functions = self.functions.write().await;
        let removed = functions.remove(name);
        if removed.is_some() {
            debug!("Evicted function: {}", name);
        }
        removed
    }

    /// Put `previous` back in place of `written`, unless another writer
    /// replaced `written` in the meantime.
    ///
    /// With `previous` set to `None` the entry is removed. Returns whether
    /// the registry changed.
    pub async fn restore_function(
        &self,
        written: &FunctionDescriptor,
        previous: Option<FunctionDescriptor>,
    ) -> bool {
        let mut functions = self.functions.write().await;
        if functions.get(&written.service) != Some(written) {
            debug!("Not restoring {}, entry changed", written.service);
            return false;
        }

        match previous {
            Some(previous) => {
                functions.insert(written.service.clone(), previous);
            }
            None => {
                functions.remove(&written.service);
            }
        }
        true
    }

    /// Number of cached functions.
    pub async fn len(&self) -> usize {
        self.functions.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.functions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::CreateFunctionRequest;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_add_and_get() {
        let registry = FunctionRegistry::new();
        let descriptor = CreateFunctionRequest::new("echo", "functions/echo:1");

        registry.add_function(descriptor.clone()).await;

        assert_eq!(registry.get_function("echo").await, Some(descriptor));
        assert!(registry.get_function("other").await.is_none());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let registry = FunctionRegistry::new();
        registry
            .add_function(CreateFunctionRequest::new("echo", "functions/echo:1"))
            .await;
        registry
            .add_function(CreateFunctionRequest::new("echo", "functions/echo:2"))
            .await;

        assert_eq!(registry.len().await, 1);
        let stored = registry.get_function("echo").await.unwrap();
        assert_eq!(stored.image, "functions/echo:2");
    }

    #[tokio::test]
    async fn test_get_functions_returns_snapshot() {
        let registry = FunctionRegistry::new();
        registry
            .add_function(CreateFunctionRequest::new("a", "img/a"))
            .await;
        registry
            .add_function(CreateFunctionRequest::new("b", "img/b"))
            .await;

        let snapshot = registry.get_functions().await;
        registry
            .add_function(CreateFunctionRequest::new("c", "img/c"))
            .await;

        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.len().await, 3);
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = FunctionRegistry::new();
        registry
            .add_function(CreateFunctionRequest::new("echo", "img/echo"))
            .await;

        assert!(registry.remove_function("echo").await.is_some());
        assert!(registry.remove_function("echo").await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_restore_function() {
        let registry = FunctionRegistry::new();
        let first = CreateFunctionRequest::new("echo", "img/echo:1");
        let second = CreateFunctionRequest::new("echo", "img/echo:2");

        assert!(registry.add_function(first.clone()).await.is_none());
        assert_eq!(registry.add_function(second.clone()).await, Some(first.clone()));
        assert!(registry.restore_function(&second, Some(first.clone())).await);
        assert_eq!(registry.get_function("echo").await, Some(first.clone()));

        registry.add_function(second.clone()).await;
        assert!(registry.restore_function(&second, None).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_restore_skips_entry_replaced_by_another_writer() {
        let registry = FunctionRegistry::new();
        let rejected = CreateFunctionRequest::new("echo", "img/echo:bad");
        let accepted = CreateFunctionRequest::new("echo", "img/echo:good");

        registry.add_function(rejected.clone()).await;
        registry.add_function(accepted.clone()).await;

        assert!(!registry.restore_function(&rejected, None).await);
        assert_eq!(registry.get_function("echo").await, Some(accepted));
    }

    #[tokio::test]
    async fn test_upsert_all_later_entry_wins() {
        let registry = FunctionRegistry::new();
        let count = registry
            .upsert_all(vec![
                CreateFunctionRequest::new("dup", "img/first"),
                CreateFunctionRequest::new("dup", "img/second"),
                CreateFunctionRequest::new("solo", "img/solo"),
            ])
            .await;

        assert_eq!(count, 3);
        assert_eq!(registry.len().await, 2);
        assert_eq!(
            registry.get_function("dup").await.unwrap().image,
            "img/second"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_and_readers() {
        let registry = Arc::new(FunctionRegistry::new());
        let mut handles = Vec::new();

        for i in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let name = format!("fn-{}", i);
                for round in 0..50 {
                    let image = format!("img/{}:{}", name, round);
                    registry
                        .add_function(
                            CreateFunctionRequest::new(&name, &image)
                                .with_env_process(&image),
                        )
                        .await;
                    let seen = registry.get_function(&name).await.unwrap();
                    // image and env_process are written together
                    assert_eq!(seen.image, seen.env_process);
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(registry.len().await, 16);
    }
}
