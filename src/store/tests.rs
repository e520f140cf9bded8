#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::store::LruStore;
    use std::sync::Arc;

    // ============================================================
    // BASIC OPERATIONS
    // ============================================================

    #[test]
    fn test_put_then_get_returns_value() {
        let store = LruStore::new(4).unwrap();
        store.put("alpha", "1");
        assert_eq!(store.get("alpha"), Some("1".to_string()));
    }

    #[test]
    fn test_get_missing_key_returns_none() {
        let store = LruStore::new(4).unwrap();
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let store = LruStore::new(4).unwrap();
        store.put("k", "v1");
        store.put("k", "v2");
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k"), Some("v2".to_string()));
    }

    #[test]
    fn test_repeated_put_never_grows_size() {
        let store = LruStore::new(4).unwrap();
        for i in 0..50 {
            store.put("same", &i.to_string());
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        match LruStore::new(0) {
            Err(Error::InvalidCapacity(0)) => {}
            other => panic!("expected InvalidCapacity, got {:?}", other),
        }
    }

    // ============================================================
    // EVICTION AND RECENCY
    // ============================================================

    #[test]
    fn test_eviction_keeps_size_at_capacity() {
        let store = LruStore::new(3).unwrap();
        for i in 0..10 {
            store.put(&format!("key{}", i), "v");
        }
        assert_eq!(store.len(), 3);
        // The survivors are the last three distinct keys inserted.
        assert!(store.get("key9").is_some());
        assert!(store.get("key8").is_some());
        assert!(store.get("key7").is_some());
        assert!(store.get("key6").is_none());
    }

    #[test]
    fn test_get_refreshes_recency() {
        let store = LruStore::new(2).unwrap();
        store.put("a", "1");
        store.put("b", "2");

        // Touch "a" so "b" becomes the eviction candidate.
        assert_eq!(store.get("a"), Some("1".to_string()));
        store.put("c", "3");

        assert_eq!(store.get("b"), None);
        assert_eq!(store.get("a"), Some("1".to_string()));
        assert_eq!(store.get("c"), Some("3".to_string()));
    }

    #[test]
    fn test_recency_order_is_observable() {
        let store = LruStore::new(3).unwrap();
        store.put("a", "1");
        store.put("b", "2");
        store.put("c", "3");
        store.get("a");

        assert_eq!(
            store.keys_by_recency(),
            vec!["a".to_string(), "c".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_capacity_two_scenario() {
        let store = LruStore::new(2).unwrap();
        store.put("2", "1");
        store.put("2", "2");
        assert_eq!(store.get("2"), Some("2".to_string()));
        store.put("1", "1");
        store.put("4", "1");
        assert_eq!(store.get("2"), None);
    }

    // ============================================================
    // CONCURRENCY
    // ============================================================

    #[test]
    fn test_concurrent_access_is_safe_and_bounded() {
        let store = Arc::new(LruStore::new(32).unwrap());
        let threads = 8;
        let iters = 500;
        let mut handles = Vec::new();

        for t in 0..threads {
            let s = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..iters {
                    let key = format!("key{}", (i + t * 7) % 128);
                    s.put(&key, &format!("{}:{}", t, i));
                    let _ = s.get(&key);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert!(store.len() <= 32, "size {} exceeds capacity", store.len());

        // Index and recency list must agree after the storm.
        let order = store.keys_by_recency();
        assert_eq!(order.len(), store.len());
        for key in order {
            assert!(store.get(&key).is_some());
        }
    }
}
