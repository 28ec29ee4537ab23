//! Memoization controls and the per-callable key index.

use std::collections::HashMap;
use std::fmt;

use crate::backend::{InsertionOrder, Timeout};
use crate::keys::CallableId;

/// Index size per callable when the cache has no capacity threshold.
pub const UNBOUNDED_MEMO_INDEX_LIMIT: usize = 10_000;

pub type Predicate = Box<dyn Fn() -> bool + Send + Sync>;
pub type ResultFilter<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

// == Memoize Options ==
/// Per-call controls of [`crate::Cache::memoize_with`].
///
/// ```ignore
/// let options = MemoizeOptions::new()
///     .timeout(Timeout::Seconds(60))
///     .response_filter(|report: &Report| report.complete);
/// ```
pub struct MemoizeOptions<T> {
    pub(crate) timeout: Timeout,
    pub(crate) unless: Option<Predicate>,
    pub(crate) forced_update: Option<Predicate>,
    pub(crate) response_filter: Option<ResultFilter<T>>,
    pub(crate) cache_none: bool,
}

impl<T> MemoizeOptions<T> {
    pub fn new() -> Self {
        Self {
            timeout: Timeout::Default,
            unless: None,
            forced_update: None,
            response_filter: None,
            cache_none: false,
        }
    }

    pub fn timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Skips the cache entirely, reading and writing nothing, while
    /// `unless` returns true.
    pub fn unless(mut self, unless: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.unless = Some(Box::new(unless));
        self
    }

    /// Recomputes and overwrites the stored result while `forced_update`
    /// returns true, even if a live result exists.
    pub fn forced_update(mut self, forced_update: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.forced_update = Some(Box::new(forced_update));
        self
    }

    /// Results rejected by `filter` are returned but not stored.
    pub fn response_filter(mut self, filter: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.response_filter = Some(Box::new(filter));
        self
    }

    /// Stores results encoding to the codec's "none" value (a `None` or
    /// unit result). Off by default: such results are recomputed every call.
    pub fn cache_none(mut self, cache_none: bool) -> Self {
        self.cache_none = cache_none;
        self
    }

    pub(crate) fn bypassed(&self) -> bool {
        self.unless.as_ref().is_some_and(|unless| unless())
    }

    pub(crate) fn forced(&self) -> bool {
        self.forced_update.as_ref().is_some_and(|forced| forced())
    }

    pub(crate) fn accepts(&self, value: &T) -> bool {
        self.response_filter.as_ref().map_or(true, |filter| filter(value))
    }
}

impl<T> Default for MemoizeOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MemoizeOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizeOptions")
            .field("timeout", &self.timeout)
            .field("unless", &self.unless.is_some())
            .field("forced_update", &self.forced_update.is_some())
            .field("response_filter", &self.response_filter.is_some())
            .field("cache_none", &self.cache_none)
            .finish()
    }
}

// == Memo Index ==
#[derive(Debug, Default)]
struct CallableKeys {
    /// Memo key -> receiver it was bound to
    receivers: HashMap<String, Option<String>>,
    order: InsertionOrder,
}

/// Memo keys observed per callable name.
///
/// Each callable keeps at most `limit` keys; the oldest observed key is
/// forgotten first. A forgotten key stays in the backend until it expires or
/// is evicted there.
#[derive(Debug)]
pub(crate) struct MemoIndex {
    limit: usize,
    callables: HashMap<String, CallableKeys>,
}

impl MemoIndex {
    /// `threshold` is the cache capacity; 0 falls back to
    /// [`UNBOUNDED_MEMO_INDEX_LIMIT`].
    pub fn new(threshold: usize) -> Self {
        let limit = if threshold == 0 {
            UNBOUNDED_MEMO_INDEX_LIMIT
        } else {
            threshold
        };
        Self {
            limit,
            callables: HashMap::new(),
        }
    }

    pub fn remember(&mut self, callable: &CallableId, key: String) {
        let keys = self
            .callables
            .entry(callable.name().to_string())
            .or_default();
        if keys.receivers.contains_key(&key) {
            return;
        }

        while keys.receivers.len() >= self.limit {
            match keys.order.pop_oldest() {
                Some(oldest) => {
                    keys.receivers.remove(&oldest);
                }
                None => break,
            }
        }
        keys.order.observe(&key);
        keys.receivers
            .insert(key, callable.receiver().map(str::to_string));
    }

    pub fn forget(&mut self, callable_name: &str, key: &str) {
        if let Some(keys) = self.callables.get_mut(callable_name) {
            if keys.receivers.remove(key).is_some() {
                keys.order.remove(key);
            }
            if keys.receivers.is_empty() {
                self.callables.remove(callable_name);
            }
        }
    }

    /// Removes and returns every key of `callable`, restricted to its
    /// receiver when it has one.
    pub fn take(&mut self, callable: &CallableId) -> Vec<String> {
        let Some(keys) = self.callables.get_mut(callable.name()) else {
            return Vec::new();
        };

        let selected: Vec<String> = keys
            .receivers
            .iter()
            .filter(|(_, receiver)| {
                callable.receiver().is_none() || receiver.as_deref() == callable.receiver()
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in &selected {
            keys.receivers.remove(key);
            keys.order.remove(key);
        }
        if keys.receivers.is_empty() {
            self.callables.remove(callable.name());
        }
        selected
    }

    pub fn clear(&mut self) {
        self.callables.clear();
    }

    /// Total number of indexed keys.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.callables.values().map(|keys| keys.receivers.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_is_bounded_per_callable() {
        let mut index = MemoIndex::new(3);
        let f = CallableId::function("tests::f");
        let g = CallableId::function("tests::g");

        for i in 0..10 {
            index.remember(&f, format!("f:{}", i));
        }
        index.remember(&g, "g:0".to_string());

        assert_eq!(index.len(), 4);
        let mut kept = index.take(&f);
        kept.sort();
        assert_eq!(kept, vec!["f:7", "f:8", "f:9"]);
    }

    #[test]
    fn test_remembering_twice_keeps_one_entry() {
        let mut index = MemoIndex::new(10);
        let f = CallableId::function("tests::f");
        index.remember(&f, "k".to_string());
        index.remember(&f, "k".to_string());

        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_take_respects_receiver() {
        let mut index = MemoIndex::new(10);
        let on_a = CallableId::method_with_id("tests::T::m", "a");
        let on_b = CallableId::method_with_id("tests::T::m", "b");
        index.remember(&on_a, "ka".to_string());
        index.remember(&on_b, "kb".to_string());

        assert_eq!(index.take(&on_a), vec!["ka".to_string()]);
        assert_eq!(index.take(&on_b.unbound()), vec!["kb".to_string()]);
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_forget_and_clear() {
        let mut index = MemoIndex::new(0);
        let f = CallableId::function("tests::f");
        index.remember(&f, "a".to_string());
        index.remember(&f, "b".to_string());

        index.forget("tests::f", "a");
        assert_eq!(index.len(), 1);
        index.clear();
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_zero_threshold_uses_fallback_limit() {
        assert_eq!(MemoIndex::new(0).limit, UNBOUNDED_MEMO_INDEX_LIMIT);
        assert_eq!(MemoIndex::new(25).limit, 25);
    }

    #[test]
    fn test_options_predicates() {
        let options: MemoizeOptions<u32> = MemoizeOptions::new()
            .unless(|| true)
            .response_filter(|value| *value > 1);

        assert!(options.bypassed());
        assert!(!options.forced());
        assert!(options.accepts(&2));
        assert!(!options.accepts(&1));
        assert!(format!("{:?}", options).contains("unless: true"));
    }
}
