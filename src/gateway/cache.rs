//! In-memory LRU quote cache with TTL, keyed by blake3 of (step | title).
//! Both backend queries are idempotent, so serving a recent answer for the
//! same title is always safe. Session-local only; nothing persists.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use super::{GatewayError, PriceQuote, QueryStep, TitleGateway};

struct CacheEntry {
    quote: PriceQuote,
    inserted_at: Instant,
}

pub struct QuoteCache {
    inner: Mutex<LruCache<[u8; 32], CacheEntry>>,
    ttl: Duration,
}

impl QuoteCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).expect("cache capacity must be > 0"),
            )),
            ttl,
        }
    }

    /// Compute the cache key for a query.
    pub fn compute_key(step: QueryStep, title: &str) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(step.as_param().unwrap_or("combined").as_bytes());
        hasher.update(b"|");
        hasher.update(title.as_bytes());
        *hasher.finalize().as_bytes()
    }

    /// Look up a cached quote. Returns None if absent or expired.
    pub fn get(&self, key: &[u8; 32]) -> Option<PriceQuote> {
        let mut cache = self.inner.lock();
        if let Some(entry) = cache.get(key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.quote.clone());
            }
            // Expired — remove it
            cache.pop(key);
        }
        None
    }

    pub fn insert(&self, key: [u8; 32], quote: PriceQuote) {
        let mut cache = self.inner.lock();
        cache.put(key, CacheEntry { quote, inserted_at: Instant::now() });
    }
}

/// Gateway wrapper that consults the cache before going to the network.
/// Failures are never cached; only answered quotes are.
pub struct CachedGateway<G> {
    inner: G,
    cache: QuoteCache,
}

impl<G: TitleGateway> CachedGateway<G> {
    pub fn new(inner: G, capacity: usize, ttl: Duration) -> Self {
        Self { inner, cache: QuoteCache::new(capacity, ttl) }
    }

    async fn cached<F>(
        &self,
        step: QueryStep,
        title: &str,
        fetch: F,
    ) -> Result<PriceQuote, GatewayError>
    where
        F: std::future::Future<Output = Result<PriceQuote, GatewayError>>,
    {
        let key = QuoteCache::compute_key(step, title);
        if let Some(quote) = self.cache.get(&key) {
            debug!(step = ?step, "quote_cache_hit");
            return Ok(quote);
        }
        let quote = fetch.await?;
        self.cache.insert(key, quote.clone());
        Ok(quote)
    }
}

impl<G: TitleGateway> TitleGateway for CachedGateway<G> {
    async fn correct_title(&self, raw_title: &str) -> Result<PriceQuote, GatewayError> {
        self.cached(QueryStep::Correct, raw_title, self.inner.correct_title(raw_title))
            .await
    }

    async fn search_price(&self, title: &str) -> Result<PriceQuote, GatewayError> {
        self.cached(QueryStep::Search, title, self.inner.search_price(title))
            .await
    }

    async fn lookup(&self, raw_title: &str) -> Result<PriceQuote, GatewayError> {
        self.cached(QueryStep::Combined, raw_title, self.inner.lookup(raw_title))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn quote(title: &str, price: Option<f64>) -> PriceQuote {
        PriceQuote {
            corrected_title: Some(title.to_string()),
            price,
            search_results: Vec::new(),
            query: None,
        }
    }

    #[test]
    fn keys_separate_steps_and_titles() {
        let a = QuoteCache::compute_key(QueryStep::Correct, "foo");
        let b = QuoteCache::compute_key(QueryStep::Search, "foo");
        let c = QuoteCache::compute_key(QueryStep::Correct, "bar");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, QuoteCache::compute_key(QueryStep::Correct, "foo"));
    }

    #[test]
    fn insert_then_get_round_trips() {
        let cache = QuoteCache::new(4, Duration::from_secs(60));
        let key = QuoteCache::compute_key(QueryStep::Search, "Python入門");
        assert!(cache.get(&key).is_none());
        cache.insert(key, quote("Python入門", Some(1500.0)));
        assert_eq!(cache.get(&key), Some(quote("Python入門", Some(1500.0))));
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = QuoteCache::new(4, Duration::from_millis(0));
        let key = QuoteCache::compute_key(QueryStep::Search, "old");
        cache.insert(key, quote("old", None));
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = QuoteCache::new(2, Duration::from_secs(60));
        let k1 = QuoteCache::compute_key(QueryStep::Search, "one");
        let k2 = QuoteCache::compute_key(QueryStep::Search, "two");
        let k3 = QuoteCache::compute_key(QueryStep::Search, "three");
        cache.insert(k1, quote("one", None));
        cache.insert(k2, quote("two", None));
        cache.insert(k3, quote("three", None));
        assert!(cache.get(&k1).is_none());
        assert!(cache.get(&k3).is_some());
    }

    struct CountingGateway {
        calls: AtomicUsize,
    }

    impl TitleGateway for CountingGateway {
        async fn correct_title(&self, raw: &str) -> Result<PriceQuote, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(quote(raw, Some(100.0)))
        }

        async fn search_price(&self, title: &str) -> Result<PriceQuote, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(quote(title, Some(100.0)))
        }

        async fn lookup(&self, raw: &str) -> Result<PriceQuote, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(quote(raw, Some(100.0)))
        }
    }

    #[tokio::test]
    async fn cached_gateway_hits_the_network_once_per_title() {
        let gateway = CachedGateway::new(
            CountingGateway { calls: AtomicUsize::new(0) },
            8,
            Duration::from_secs(60),
        );
        let first = gateway.search_price("Python入門").await.unwrap();
        let second = gateway.search_price("Python入門").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(gateway.inner.calls.load(Ordering::SeqCst), 1);

        gateway.correct_title("Python入門").await.unwrap();
        assert_eq!(gateway.inner.calls.load(Ordering::SeqCst), 2);
    }
}
