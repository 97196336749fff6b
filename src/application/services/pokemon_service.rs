//! Cache-aside aggregation of reference pages into resolved entities.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::application::circuit_breaker::{CircuitBreaker, CircuitBreakers, CircuitError};
use crate::domain::cache_key::{CacheKey, KeyPattern};
use crate::domain::entities::{Pokemon, Reference};
use crate::domain::errors::{FetchError, FetchResult, UpstreamError};
use crate::domain::repositories::{EntityFetcher, ReferenceLister};
use crate::infrastructure::cache::ResultCache;

/// Breaker guarding the reference listing call.
pub const LIST_BREAKER: &str = "list_pokemon";

/// Breaker shared by every per-reference detail call.
pub const FETCH_BREAKER: &str = "fetch_pokemon";

const FALLBACK_PREFIX: &str = "Service is currently unavailable due to: ";

/// Result of [`PokemonService::fetch_page`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Entities served from (or freshly written to) the cache.
    Entities(Vec<Pokemon>),
    /// Upstream is failing; carries a human readable diagnostic.
    Degraded(String),
}

/// Tunables of the aggregation flow.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// TTL applied to every cached entity.
    pub cache_ttl: Duration,
    /// Maximum number of detail fetches in flight per request.
    pub fetch_concurrency: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60),
            fetch_concurrency: 32,
        }
    }
}

impl From<CircuitError<UpstreamError>> for FetchError {
    fn from(err: CircuitError<UpstreamError>) -> Self {
        match err {
            CircuitError::Open { name } => FetchError::CircuitOpen { name },
            CircuitError::Call(upstream) => FetchError::Upstream(upstream),
        }
    }
}

/// Builds the diagnostic returned in place of a failed call.
pub fn fallback_message(cause: &impl fmt::Display) -> String {
    format!("{FALLBACK_PREFIX}{cause}")
}

/// Entities resolved by one fan-out.
#[derive(Debug, Default)]
struct Resolved {
    entities: Vec<Pokemon>,
    failed_fetches: usize,
    failed_writes: usize,
    last_failure: Option<FetchError>,
}

/// Service aggregating a page of references into cached entities.
///
/// # Request Flow
///
/// 1. Enumerate the cache under `pokemon<limit>:*`; any match is returned as is
/// 2. On miss, list references through the [`LIST_BREAKER`] breaker
/// 3. Resolve every reference concurrently through the [`FETCH_BREAKER`] breaker
/// 4. Write each resolved entity under `pokemon<limit>:*<id>` with the configured TTL
/// 5. Re-read the pattern so the response reflects the shared cache state
///
/// Upstream and open-circuit failures never escape: a failed listing turns into
/// [`PageOutcome::Degraded`], a failed detail call only omits that entity.
/// A page where every detail call failed is degraded as well, carrying the
/// last failure, so an empty listing stays distinguishable from an outage.
/// When the cache itself is unavailable the service serves what it resolved
/// from upstream directly.
pub struct PokemonService {
    lister: Arc<dyn ReferenceLister>,
    fetcher: Arc<dyn EntityFetcher>,
    cache: Arc<dyn ResultCache>,
    list_breaker: Arc<CircuitBreaker>,
    fetch_breaker: Arc<CircuitBreaker>,
    settings: ServiceSettings,
}

impl PokemonService {
    /// Creates a new aggregation service.
    pub fn new(
        lister: Arc<dyn ReferenceLister>,
        fetcher: Arc<dyn EntityFetcher>,
        cache: Arc<dyn ResultCache>,
        breakers: &CircuitBreakers,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            lister,
            fetcher,
            cache,
            list_breaker: breakers.get(LIST_BREAKER),
            fetch_breaker: breakers.get(FETCH_BREAKER),
            settings,
        }
    }

    /// Returns the first `limit` entities, from cache when possible.
    pub async fn fetch_page(&self, limit: u32) -> PageOutcome {
        let pattern = KeyPattern::page(limit);

        let cache_available = match self.cache.enumerate(&pattern).await {
            Ok(cached) if !cached.is_empty() => {
                metrics::counter!("cache_lookups_total", "result" => "hit").increment(1);
                debug!(limit, entries = cached.len(), "Serving page from cache");
                return PageOutcome::Entities(cached);
            }
            Ok(_) => {
                metrics::counter!("cache_lookups_total", "result" => "miss").increment(1);
                true
            }
            Err(e) => {
                metrics::counter!("cache_lookups_total", "result" => "error").increment(1);
                warn!(limit, error = %e, "Cache lookup failed, serving from upstream only");
                false
            }
        };

        let listing = self
            .list_breaker
            .call_or_else(
                || async move { self.lister.list_references(limit).await.map(Ok::<_, String>) },
                |cause| {
                    warn!(limit, error = %cause, "Reference listing failed, returning fallback");
                    Err(fallback_message(&cause))
                },
            )
            .await;
        let page = match listing {
            Ok(page) => page,
            Err(message) => return PageOutcome::Degraded(message),
        };

        let requested = page.results.len();
        let resolved = self
            .resolve_all(limit, page.results, cache_available)
            .await;

        info!(
            limit,
            requested,
            resolved = resolved.entities.len(),
            failed = resolved.failed_fetches,
            "Resolved reference page"
        );

        if resolved.entities.is_empty()
            && let Some(cause) = &resolved.last_failure
        {
            warn!(limit, requested, error = %cause, "Every detail fetch failed, returning fallback");
            return PageOutcome::Degraded(fallback_message(cause));
        }

        if !cache_available || resolved.failed_writes > 0 {
            return PageOutcome::Entities(resolved.entities);
        }

        match self.cache.enumerate(&pattern).await {
            Ok(entities) if !entities.is_empty() => PageOutcome::Entities(entities),
            Ok(_) => {
                warn!(limit, "Cache re-read came back empty, serving resolved entities");
                PageOutcome::Entities(resolved.entities)
            }
            Err(e) => {
                warn!(limit, error = %e, "Cache re-read failed, serving resolved entities");
                PageOutcome::Entities(resolved.entities)
            }
        }
    }

    /// Resolves a single reference through the shared fetch breaker.
    ///
    /// Used by the queue consumer, which reports failures instead of
    /// substituting a fallback.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::CircuitOpen`] when the fetch breaker is open and
    /// [`FetchError::Upstream`] when the call itself fails.
    pub async fn fetch_by_reference(&self, reference: &Reference) -> FetchResult<Pokemon> {
        self.fetch_breaker
            .call(|| self.fetcher.fetch_by_reference(reference))
            .await
            .map_err(FetchError::from)
    }

    /// Fans out one detail fetch per reference, unordered, bounded by
    /// `fetch_concurrency`, writing each success to the cache when `populate`.
    async fn resolve_all(&self, limit: u32, references: Vec<Reference>, populate: bool) -> Resolved {
        let mut fetches = stream::iter(references)
            .map(|reference| self.resolve_one(limit, reference, populate))
            .buffer_unordered(self.settings.fetch_concurrency.max(1));

        let mut resolved = Resolved::default();
        while let Some(outcome) = fetches.next().await {
            match outcome {
                Ok((pokemon, stored)) => {
                    if !stored {
                        resolved.failed_writes += 1;
                    }
                    resolved.entities.push(pokemon);
                }
                Err(cause) => {
                    resolved.failed_fetches += 1;
                    resolved.last_failure = Some(cause);
                }
            }
        }

        resolved
    }

    /// Returns the resolved entity and whether it was written to the cache.
    async fn resolve_one(
        &self,
        limit: u32,
        reference: Reference,
        populate: bool,
    ) -> FetchResult<(Pokemon, bool)> {
        let pokemon = self
            .fetch_by_reference(&reference)
            .await
            .inspect_err(|cause| warn!(url = %reference.url, "{}", fallback_message(cause)))?;

        if !populate {
            return Ok((pokemon, false));
        }

        let key = CacheKey::entry(limit, pokemon.id);
        match self.cache.set(&key, &pokemon, self.settings.cache_ttl).await {
            Ok(()) => Ok((pokemon, true)),
            Err(e) => {
                warn!(key = %key, error = %e, "Cache write failed");
                Ok((pokemon, false))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::circuit_breaker::{CircuitBreakerConfig, CircuitState};
    use crate::domain::entities::ReferencePage;
    use crate::domain::repositories::{MockEntityFetcher, MockReferenceLister};
    use crate::infrastructure::cache::{CacheError, MemoryCache, MockResultCache};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BASE: &str = "https://pokeapi.co/api/v2/pokemon";

    fn pokemon(id: i64) -> Pokemon {
        Pokemon::new(id, format!("pokemon-{id}"), 10 * id as i32, id as i32, format!("{BASE}/{id}/encounters"), 50)
    }

    fn page(ids: &[i64]) -> ReferencePage {
        ReferencePage::with_results(
            ids.iter()
                .map(|id| Reference::new(format!("{BASE}/{id}/")))
                .collect(),
        )
    }

    fn fetcher_resolving_all() -> MockEntityFetcher {
        let mut fetcher = MockEntityFetcher::new();
        fetcher.expect_fetch_by_reference().returning(|reference| {
            Ok(pokemon(reference.resource_id().parse().unwrap()))
        });
        fetcher
    }

    fn service(
        lister: impl ReferenceLister + 'static,
        fetcher: impl EntityFetcher + 'static,
        cache: Arc<dyn ResultCache>,
    ) -> (PokemonService, CircuitBreakers) {
        let breakers = CircuitBreakers::new(CircuitBreakerConfig::default());
        let service = PokemonService::new(
            Arc::new(lister),
            Arc::new(fetcher),
            cache,
            &breakers,
            ServiceSettings::default(),
        );
        (service, breakers)
    }

    fn sorted_ids(outcome: PageOutcome) -> Vec<i64> {
        match outcome {
            PageOutcome::Entities(entities) => {
                let mut ids: Vec<i64> = entities.iter().map(|p| p.id).collect();
                ids.sort_unstable();
                ids
            }
            PageOutcome::Degraded(message) => panic!("unexpected fallback: {message}"),
        }
    }

    #[tokio::test]
    async fn test_cache_miss_populates_then_hit_skips_upstream() {
        let mut lister = MockReferenceLister::new();
        lister
            .expect_list_references()
            .withf(|limit| *limit == 2)
            .times(1)
            .returning(|_| Ok(page(&[1, 2])));

        let mut fetcher = MockEntityFetcher::new();
        fetcher
            .expect_fetch_by_reference()
            .times(2)
            .returning(|reference| Ok(pokemon(reference.resource_id().parse().unwrap())));

        let cache = Arc::new(MemoryCache::default());
        let (service, _breakers) = service(lister, fetcher, cache.clone());

        assert_eq!(sorted_ids(service.fetch_page(2).await), vec![1, 2]);
        assert!(cache.get(&CacheKey::entry(2, 1)).await.unwrap().is_some());
        assert!(cache.get(&CacheKey::entry(2, 2)).await.unwrap().is_some());

        // Served from cache: the mocks reject any further upstream call.
        assert_eq!(sorted_ids(service.fetch_page(2).await), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_cache_hit_is_size_agnostic() {
        let cache = Arc::new(MemoryCache::default());
        cache
            .set(&CacheKey::entry(20, 4), &pokemon(4), Duration::from_secs(60))
            .await
            .unwrap();

        let mut lister = MockReferenceLister::new();
        lister.expect_list_references().times(0);
        let mut fetcher = MockEntityFetcher::new();
        fetcher.expect_fetch_by_reference().times(0);

        let (service, _breakers) = service(lister, fetcher, cache);

        assert_eq!(sorted_ids(service.fetch_page(20).await), vec![4]);
    }

    #[tokio::test]
    async fn test_limits_are_cached_independently() {
        let mut lister = MockReferenceLister::new();
        lister
            .expect_list_references()
            .withf(|limit| *limit == 1)
            .times(1)
            .returning(|_| Ok(page(&[1])));
        lister
            .expect_list_references()
            .withf(|limit| *limit == 3)
            .times(1)
            .returning(|_| Ok(page(&[1, 2, 3])));

        let (service, _breakers) = service(
            lister,
            fetcher_resolving_all(),
            Arc::new(MemoryCache::default()),
        );

        assert_eq!(sorted_ids(service.fetch_page(1).await), vec![1]);
        assert_eq!(sorted_ids(service.fetch_page(3).await), vec![1, 2, 3]);
        assert_eq!(sorted_ids(service.fetch_page(1).await), vec![1]);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_isolated() {
        let mut lister = MockReferenceLister::new();
        lister
            .expect_list_references()
            .returning(|_| Ok(page(&[1, 2, 3])));

        let mut fetcher = MockEntityFetcher::new();
        fetcher
            .expect_fetch_by_reference()
            .times(3)
            .returning(|reference| match reference.resource_id() {
                "2" => Err(UpstreamError::Status {
                    status: 500,
                    url: reference.url.clone(),
                }),
                id => Ok(pokemon(id.parse().unwrap())),
            });

        let cache = Arc::new(MemoryCache::default());
        let (service, _breakers) = service(lister, fetcher, cache.clone());

        assert_eq!(sorted_ids(service.fetch_page(3).await), vec![1, 3]);
        assert!(cache.get(&CacheKey::entry(3, 2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_all_fetches_failing_returns_fallback() {
        let mut lister = MockReferenceLister::new();
        lister
            .expect_list_references()
            .times(1)
            .returning(|_| Ok(page(&[1, 2])));

        let mut fetcher = MockEntityFetcher::new();
        fetcher
            .expect_fetch_by_reference()
            .times(2)
            .returning(|reference| {
                Err(UpstreamError::Status {
                    status: 503,
                    url: reference.url.clone(),
                })
            });

        let cache = Arc::new(MemoryCache::default());
        let (service, _breakers) = service(lister, fetcher, cache.clone());

        match service.fetch_page(2).await {
            PageOutcome::Degraded(message) => {
                assert!(message.starts_with(FALLBACK_PREFIX));
                assert!(message.contains("upstream returned 503"));
            }
            other => panic!("expected fallback, got {other:?}"),
        }
        assert!(cache.enumerate(&KeyPattern::page(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_fetch_circuit_degrades_whole_page() {
        let mut lister = MockReferenceLister::new();
        lister
            .expect_list_references()
            .times(2)
            .returning(|_| Ok(page(&[1, 2, 3, 4, 5, 6])));

        // The breaker opens after five failures; nothing reaches upstream after that.
        let mut fetcher = MockEntityFetcher::new();
        fetcher
            .expect_fetch_by_reference()
            .times(5)
            .returning(|_| Err(UpstreamError::Network("connection reset".to_string())));

        let (service, breakers) = service(lister, fetcher, Arc::new(MemoryCache::default()));

        assert!(matches!(service.fetch_page(6).await, PageOutcome::Degraded(_)));
        assert_eq!(breakers.get(FETCH_BREAKER).state(), CircuitState::Open);

        match service.fetch_page(6).await {
            PageOutcome::Degraded(message) => {
                assert!(message.starts_with(FALLBACK_PREFIX));
                assert!(message.contains("'fetch_pokemon' is OPEN"));
            }
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_listing_is_not_degraded() {
        let mut lister = MockReferenceLister::new();
        lister
            .expect_list_references()
            .returning(|_| Ok(page(&[])));
        let mut fetcher = MockEntityFetcher::new();
        fetcher.expect_fetch_by_reference().times(0);

        let (service, _breakers) = service(lister, fetcher, Arc::new(MemoryCache::default()));

        assert_eq!(service.fetch_page(5).await, PageOutcome::Entities(Vec::new()));
    }

    #[tokio::test]
    async fn test_list_failure_returns_fallback() {
        let mut lister = MockReferenceLister::new();
        lister
            .expect_list_references()
            .times(1)
            .returning(|_| Err(UpstreamError::Network("connection refused".to_string())));
        let mut fetcher = MockEntityFetcher::new();
        fetcher.expect_fetch_by_reference().times(0);

        let (service, _breakers) = service(lister, fetcher, Arc::new(MemoryCache::default()));

        assert_eq!(
            service.fetch_page(20).await,
            PageOutcome::Degraded(
                "Service is currently unavailable due to: upstream request failed: connection refused"
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_open_list_circuit_short_circuits() {
        let mut lister = MockReferenceLister::new();
        lister
            .expect_list_references()
            .times(5)
            .returning(|_| Err(UpstreamError::Network("timed out".to_string())));

        let (service, breakers) = service(
            lister,
            MockEntityFetcher::new(),
            Arc::new(MemoryCache::default()),
        );

        for _ in 0..5 {
            assert!(matches!(service.fetch_page(20).await, PageOutcome::Degraded(_)));
        }
        assert_eq!(breakers.get(LIST_BREAKER).state(), CircuitState::Open);

        match service.fetch_page(20).await {
            PageOutcome::Degraded(message) => {
                assert!(message.starts_with(FALLBACK_PREFIX));
                assert!(message.contains("'list_pokemon' is OPEN"));
            }
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cache_unavailable_falls_back_to_upstream() {
        let mut cache = MockResultCache::new();
        cache
            .expect_enumerate()
            .times(1)
            .returning(|_| Err(CacheError::Unavailable("connection refused".to_string())));
        cache.expect_set().times(0);

        let mut lister = MockReferenceLister::new();
        lister
            .expect_list_references()
            .times(1)
            .returning(|_| Ok(page(&[4, 5])));

        let (service, _breakers) = service(lister, fetcher_resolving_all(), Arc::new(cache));

        assert_eq!(sorted_ids(service.fetch_page(2).await), vec![4, 5]);
    }

    #[tokio::test]
    async fn test_cache_write_failure_serves_resolved_entities() {
        let mut cache = MockResultCache::new();
        cache
            .expect_enumerate()
            .withf(|pattern| pattern.as_str() == "pokemon2:*")
            .times(1)
            .returning(|_| Ok(Vec::new()));
        cache
            .expect_set()
            .times(2)
            .returning(|_, _, _| Err(CacheError::Unavailable("READONLY".to_string())));

        let mut lister = MockReferenceLister::new();
        lister
            .expect_list_references()
            .returning(|_| Ok(page(&[7, 8])));

        let (service, _breakers) = service(lister, fetcher_resolving_all(), Arc::new(cache));

        assert_eq!(sorted_ids(service.fetch_page(2).await), vec![7, 8]);
    }

    #[tokio::test]
    async fn test_populate_uses_entry_keys_and_ttl() {
        let mut cache = MockResultCache::new();
        let mut reads = 0;
        cache.expect_enumerate().times(2).returning(move |_| {
            reads += 1;
            if reads == 1 {
                Ok(Vec::new())
            } else {
                Ok(vec![pokemon(9)])
            }
        });
        cache
            .expect_set()
            .withf(|key, pokemon, ttl| {
                key.as_str() == "pokemon1:*9" && pokemon.id == 9 && *ttl == Duration::from_secs(60)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut lister = MockReferenceLister::new();
        lister.expect_list_references().returning(|_| Ok(page(&[9])));

        let (service, _breakers) = service(lister, fetcher_resolving_all(), Arc::new(cache));

        assert_eq!(sorted_ids(service.fetch_page(1).await), vec![9]);
    }

    struct SlowFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EntityFetcher for SlowFetcher {
        async fn fetch_by_reference(
            &self,
            reference: &Reference,
        ) -> Result<Pokemon, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(pokemon(reference.resource_id().parse().unwrap()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_run_concurrently_once_per_reference() {
        let ids: Vec<i64> = (1..=10).collect();
        let mut lister = MockReferenceLister::new();
        let listed = page(&ids);
        lister
            .expect_list_references()
            .returning(move |_| Ok(listed.clone()));

        let fetcher = Arc::new(SlowFetcher {
            calls: AtomicUsize::new(0),
        });
        let breakers = CircuitBreakers::new(CircuitBreakerConfig::default());
        let service = PokemonService::new(
            Arc::new(lister),
            fetcher.clone(),
            Arc::new(MemoryCache::default()),
            &breakers,
            ServiceSettings::default(),
        );

        let started = tokio::time::Instant::now();
        let result = sorted_ids(service.fetch_page(10).await);

        assert_eq!(result, ids);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 10);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_fetch_by_reference_reports_errors() {
        let mut fetcher = MockEntityFetcher::new();
        fetcher.expect_fetch_by_reference().returning(|reference| {
            Err(UpstreamError::Status {
                status: 404,
                url: reference.url.clone(),
            })
        });

        let (service, _breakers) = service(
            MockReferenceLister::new(),
            fetcher,
            Arc::new(MemoryCache::default()),
        );

        let result = service
            .fetch_by_reference(&Reference::new("https://pokeapi.co/api/v2"))
            .await;

        assert!(matches!(
            result,
            Err(FetchError::Upstream(UpstreamError::Status { status: 404, .. }))
        ));
    }
}
