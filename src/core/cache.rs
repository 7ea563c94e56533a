use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Shared in-memory cache of provider responses, keyed by ticker.
#[derive(Clone)]
pub struct Cache<K, V>
where
    K: Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<HashMap<K, V>>>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let cache = self.inner.lock().await;
        let value = cache.get(key).cloned();
        if value.is_some() {
            debug!(?key, "Cache HIT");
        } else {
            debug!(?key, "Cache MISS");
        }
        value
    }

    pub async fn put(&self, key: K, value: V) {
        debug!(?key, "Cache PUT");
        self.inner.lock().await.insert(key, value);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Eq + Hash + Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_get_put() {
        let cache = Cache::<String, f64>::new();
        assert!(cache.is_empty().await);
        assert!(cache.get(&"AAPL".to_string()).await.is_none());

        cache.put("AAPL".to_string(), 1.25).await;
        assert_eq!(cache.get(&"AAPL".to_string()).await, Some(1.25));
        assert!(cache.get(&"MSFT".to_string()).await.is_none());

        // Overwrite keeps a single entry
        cache.put("AAPL".to_string(), 1.5).await;
        assert_eq!(cache.get(&"AAPL".to_string()).await, Some(1.5));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache = Cache::<String, u32>::new();
        let other = cache.clone();
        other.put("KO".to_string(), 7).await;
        assert_eq!(cache.get(&"KO".to_string()).await, Some(7));
    }
}
