//! Translation stage: trait, retry and memo decorators, and mock.

use crate::config::RetryConfig;
use crate::defaults;
use crate::error::{RelayError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Trait for machine translation.
///
/// `source` is a language hint; implementations auto-detect when it is
/// `None`. Results need not be deterministic across identical calls.
pub trait Translator: Send + Sync {
    fn translate(&self, text: &str, source: Option<&str>, target: &str) -> Result<String>;

    fn name(&self) -> &str;

    /// Number of memoized translations held by this translator.
    fn cached_translations(&self) -> usize {
        0
    }

    /// Drop all memoized translations. Returns how many were dropped.
    fn clear_cached_translations(&self) -> usize {
        0
    }
}

impl<T: Translator + ?Sized> Translator for Arc<T> {
    fn translate(&self, text: &str, source: Option<&str>, target: &str) -> Result<String> {
        (**self).translate(text, source, target)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn cached_translations(&self) -> usize {
        (**self).cached_translations()
    }

    fn clear_cached_translations(&self) -> usize {
        (**self).clear_cached_translations()
    }
}

/// How often and how patiently a failed translation is retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Delay before the second attempt.
    pub delay: Duration,
    /// Factor applied to the delay after each retry (1.0 = fixed delay).
    pub backoff: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            delay: Duration::from_millis(config.delay_ms),
            backoff: config.backoff.max(1.0),
            max_delay: Duration::from_millis(defaults::STAGE_TIMEOUT_MS),
        }
    }
}

impl RetryPolicy {
    /// No retries.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
            backoff: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Cap every delay at `max_delay`.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based),
    /// never more than `max_delay`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if self.delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        Duration::try_from_secs_f64(self.delay.as_secs_f64() * self.backoff.powi(exponent))
            .ok()
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Retries the wrapped translator according to a [`RetryPolicy`].
///
/// Sleeps between attempts, so it must run off the async executor.
pub struct RetryingTranslator<T: Translator> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Translator> RetryingTranslator<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<T: Translator> Translator for RetryingTranslator<T> {
    fn translate(&self, text: &str, source: Option<&str>, target: &str) -> Result<String> {
        let mut attempt = 1;
        loop {
            match self.inner.translate(text, source, target) {
                Ok(translated) => return Ok(translated),
                Err(e) if attempt < self.policy.attempts => {
                    let delay = self.policy.delay_after(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.policy.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "translation attempt failed, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn cached_translations(&self) -> usize {
        self.inner.cached_translations()
    }

    fn clear_cached_translations(&self) -> usize {
        self.inner.clear_cached_translations()
    }
}

type CacheKey = (String, String, String);

#[derive(Debug, Default)]
struct TranslationMemo {
    entries: HashMap<CacheKey, String>,
    /// Keys in insertion order, oldest first
    order: VecDeque<CacheKey>,
}

/// Memoizes successful translations of identical requests.
///
/// Keyed by text, source hint (`auto` when absent) and target. When full,
/// the oldest `evict_batch` entries are dropped at once. Failures are
/// never cached.
pub struct CachingTranslator<T: Translator> {
    inner: T,
    capacity: usize,
    evict_batch: usize,
    memo: Mutex<TranslationMemo>,
}

impl<T: Translator> CachingTranslator<T> {
    pub fn new(inner: T, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            evict_batch: defaults::TRANSLATION_CACHE_EVICT_BATCH,
            memo: Mutex::new(TranslationMemo::default()),
        }
    }

    /// Number of entries dropped when the cache is full.
    pub fn with_evict_batch(mut self, evict_batch: usize) -> Self {
        self.evict_batch = evict_batch.max(1);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, TranslationMemo> {
        self.memo.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T: Translator> Translator for CachingTranslator<T> {
    fn translate(&self, text: &str, source: Option<&str>, target: &str) -> Result<String> {
        if self.capacity == 0 {
            return self.inner.translate(text, source, target);
        }

        let key = (
            text.to_string(),
            source.unwrap_or("auto").to_string(),
            target.to_string(),
        );
        if let Some(hit) = self.lock().entries.get(&key) {
            tracing::debug!(target_lang = %target, "translation cache hit");
            return Ok(hit.clone());
        }

        // Not held across the call: translation is slow and may retry.
        let translated = self.inner.translate(text, source, target)?;

        let mut memo = self.lock();
        if !memo.entries.contains_key(&key) {
            if memo.entries.len() >= self.capacity {
                for _ in 0..self.evict_batch.min(memo.order.len()) {
                    if let Some(oldest) = memo.order.pop_front() {
                        memo.entries.remove(&oldest);
                    }
                }
            }
            memo.order.push_back(key.clone());
        }
        memo.entries.insert(key, translated.clone());
        Ok(translated)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn cached_translations(&self) -> usize {
        self.lock().entries.len()
    }

    fn clear_cached_translations(&self) -> usize {
        let mut memo = self.lock();
        memo.order.clear();
        let cleared = memo.entries.len();
        memo.entries.clear();
        cleared
    }
}

/// Mock translator for testing
#[derive(Debug)]
pub struct MockTranslator {
    name: String,
    response: Option<String>,
    failures_left: Mutex<usize>,
    always_fail: bool,
    calls: AtomicUsize,
    last_source: Mutex<Option<String>>,
}

impl MockTranslator {
    /// Create a mock that echoes its input unchanged
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            response: None,
            failures_left: Mutex::new(0),
            always_fail: false,
            calls: AtomicUsize::new(0),
            last_source: Mutex::new(None),
        }
    }

    /// Always return `response`
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = Some(response.to_string());
        self
    }

    /// Fail every call
    pub fn with_failure(mut self) -> Self {
        self.always_fail = true;
        self
    }

    /// Fail the first `count` calls, then succeed
    pub fn failing_times(self, count: usize) -> Self {
        *self.failures_left.lock().unwrap_or_else(|e| e.into_inner()) = count;
        self
    }

    /// Number of translate calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Source hint passed to the most recent call
    pub fn last_source(&self) -> Option<String> {
        self.last_source
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Translator for MockTranslator {
    fn translate(&self, text: &str, source: Option<&str>, _target: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_source.lock().unwrap_or_else(|e| e.into_inner()) = source.map(str::to_string);

        if self.always_fail {
            return Err(RelayError::Translation {
                message: "mock translation failure".to_string(),
            });
        }
        {
            let mut failures_left = self.failures_left.lock().unwrap_or_else(|e| e.into_inner());
            if *failures_left > 0 {
                *failures_left -= 1;
                return Err(RelayError::Translation {
                    message: "mock transient failure".to_string(),
                });
            }
        }
        Ok(self.response.clone().unwrap_or_else(|| text.to_string()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant_retries(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            delay: Duration::ZERO,
            backoff: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_mock_translator_echoes_by_default() {
        let translator = MockTranslator::new("echo");
        let result = translator.translate("hello", None, "hi").unwrap();
        assert_eq!(result, "hello");
        assert_eq!(translator.calls(), 1);
    }

    #[test]
    fn test_mock_translator_records_source_hint() {
        let translator = MockTranslator::new("mock").with_response("hola");
        translator.translate("hello", Some("en"), "es").unwrap();
        assert_eq!(translator.last_source(), Some("en".to_string()));
    }

    #[test]
    fn test_retry_recovers_from_transient_failures() {
        let translator = RetryingTranslator::new(
            MockTranslator::new("flaky")
                .with_response("नमस्ते")
                .failing_times(2),
            instant_retries(3),
        );

        assert_eq!(translator.translate("hello", None, "hi").unwrap(), "नमस्ते");
        assert_eq!(translator.inner.calls(), 3);
    }

    #[test]
    fn test_retry_gives_up_after_attempts() {
        let translator = RetryingTranslator::new(
            MockTranslator::new("broken").with_failure(),
            instant_retries(3),
        );

        let result = translator.translate("hello", None, "hi");
        assert!(matches!(result, Err(RelayError::Translation { .. })));
        assert_eq!(translator.inner.calls(), 3);
    }

    #[test]
    fn test_no_retry_policy_calls_once() {
        let translator =
            RetryingTranslator::new(MockTranslator::new("broken").with_failure(), RetryPolicy::none());
        assert!(translator.translate("hello", None, "hi").is_err());
        assert_eq!(translator.inner.calls(), 1);
    }

    #[test]
    fn test_retry_policy_backoff() {
        let policy = RetryPolicy {
            attempts: 4,
            delay: Duration::from_millis(100),
            backoff: 2.0,
            max_delay: Duration::from_secs(1),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        // 800ms, then capped
        assert_eq!(policy.delay_after(4), Duration::from_millis(800));
        assert_eq!(policy.delay_after(5), Duration::from_secs(1));
    }

    #[test]
    fn test_retry_policy_huge_backoff_is_capped() {
        let policy = RetryPolicy::from(&RetryConfig {
            attempts: 3,
            delay_ms: 1000,
            backoff: 1e300,
        })
        .with_max_delay(Duration::from_secs(30));

        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(30));
        assert_eq!(policy.delay_after(u32::MAX), Duration::from_secs(30));

        let policy = RetryPolicy {
            backoff: f64::INFINITY,
            ..policy
        };
        assert_eq!(policy.delay_after(2), Duration::from_secs(30));
    }

    #[test]
    fn test_cache_returns_memoized_translation() {
        let translator = CachingTranslator::new(MockTranslator::new("mt").with_response("नमस्ते"), 10);

        assert_eq!(translator.translate("hello", Some("en"), "hi").unwrap(), "नमस्ते");
        assert_eq!(translator.translate("hello", Some("en"), "hi").unwrap(), "नमस्ते");
        assert_eq!(translator.inner.calls(), 1);
        assert_eq!(translator.cached_translations(), 1);

        // Different target or hint is a different entry.
        translator.translate("hello", Some("en"), "ta").unwrap();
        translator.translate("hello", None, "hi").unwrap();
        assert_eq!(translator.inner.calls(), 3);
        assert_eq!(translator.cached_translations(), 3);
    }

    #[test]
    fn test_cache_does_not_store_failures() {
        let translator = CachingTranslator::new(
            MockTranslator::new("flaky").with_response("hola").failing_times(1),
            10,
        );

        assert!(translator.translate("hello", None, "es").is_err());
        assert_eq!(translator.cached_translations(), 0);
        assert_eq!(translator.translate("hello", None, "es").unwrap(), "hola");
        assert_eq!(translator.inner.calls(), 2);
    }

    #[test]
    fn test_cache_evicts_oldest_batch_when_full() {
        let translator = CachingTranslator::new(MockTranslator::new("echo"), 5).with_evict_batch(2);
        for i in 0..5 {
            translator.translate(&format!("text {i}"), None, "hi").unwrap();
        }
        assert_eq!(translator.cached_translations(), 5);

        translator.translate("text 5", None, "hi").unwrap();
        // "text 0" and "text 1" dropped, "text 5" added
        assert_eq!(translator.cached_translations(), 4);

        let calls = translator.inner.calls();
        translator.translate("text 2", None, "hi").unwrap();
        assert_eq!(translator.inner.calls(), calls, "text 2 should still be cached");
        translator.translate("text 0", None, "hi").unwrap();
        assert_eq!(translator.inner.calls(), calls + 1, "text 0 should have been evicted");
    }

    #[test]
    fn test_cache_clear_and_disabled() {
        let translator = CachingTranslator::new(MockTranslator::new("echo"), 10);
        translator.translate("a b", None, "hi").unwrap();
        translator.translate("c d", None, "hi").unwrap();
        assert_eq!(translator.clear_cached_translations(), 2);
        assert_eq!(translator.cached_translations(), 0);

        let disabled = CachingTranslator::new(MockTranslator::new("echo"), 0);
        disabled.translate("a b", None, "hi").unwrap();
        disabled.translate("a b", None, "hi").unwrap();
        assert_eq!(disabled.inner.calls(), 2);
        assert_eq!(disabled.cached_translations(), 0);
    }

    #[test]
    fn test_cache_size_visible_through_wrappers() {
        let translator: Arc<dyn Translator> = Arc::new(CachingTranslator::new(
            RetryingTranslator::new(MockTranslator::new("mt"), RetryPolicy::none()),
            10,
        ));
        translator.translate("hello", None, "hi").unwrap();
        assert_eq!(translator.cached_translations(), 1);
        assert_eq!(translator.name(), "mt");
        assert_eq!(translator.clear_cached_translations(), 1);
    }

    #[test]
    fn test_retry_policy_fixed_delay_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(1));
    }

    #[test]
    fn test_retry_policy_from_config_clamps() {
        let policy = RetryPolicy::from(&RetryConfig {
            attempts: 0,
            delay_ms: 50,
            backoff: 0.2,
        });
        assert_eq!(policy.attempts, 1);
        assert_eq!(policy.backoff, 1.0);
    }

    #[test]
    fn test_retrying_translator_keeps_inner_name() {
        let translator = RetryingTranslator::new(MockTranslator::new("gemini"), RetryPolicy::none());
        assert_eq!(translator.name(), "gemini");
        assert_eq!(translator.policy().attempts, 1);
    }
}
