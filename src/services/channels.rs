//! Channel Directory Service
//!
//! Channel lookups by id, handle and search query in front of the channel-data
//! provider. Slow-changing profiles and counters are cached separately, every
//! remote call is charged against the daily quota, and identical concurrent
//! fetches share one provider call.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::batch::{
    content_key, id_set_key, BatchOrchestrator, BatchProcessor, BatchSummary, ProgressSink,
};
use crate::cache::{shared, CacheRegistry, CacheStore, SharedCache};
use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::providers::{
    ChannelProfile, ChannelProviders, ChannelRecord, ChannelStatistics, SearchPage, Variant,
};
use crate::quota::{ops, SharedQuota};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::sync::{InFlight, KeyedMutex};

const HOUR: u64 = 60 * 60;
const STATIC_TTL: Duration = Duration::from_secs(24 * HOUR);
const STATS_TTL: Duration = Duration::from_secs(6 * HOUR);
const SEARCH_TTL: Duration = Duration::from_secs(15 * 60);
const HANDLE_TTL: Duration = Duration::from_secs(24 * HOUR);
const HANDLE_NOT_FOUND_TTL: Duration = Duration::from_secs(5 * 60);
const BATCHES_TTL: Duration = Duration::from_secs(6 * HOUR);

// == Cache Keys ==
pub fn static_key(channel_id: &str, variant: Variant) -> String {
    format!("channel_static_{}_{}", channel_id, variant)
}

pub fn stats_key(channel_id: &str, variant: Variant) -> String {
    format!("channel_stats_{}_{}", channel_id, variant)
}

pub fn username_key(username: &str, variant: Variant) -> String {
    format!("username_{}_{}", username, variant)
}

/// `UC` followed by 22 characters of `[A-Za-z0-9_-]`.
pub fn is_valid_channel_id(id: &str) -> bool {
    id.len() == 24
        && id.starts_with("UC")
        && id.bytes().skip(2).all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Trims, drops malformed ids and de-duplicates, keeping first occurrences.
pub fn normalize_ids(ids: &[String]) -> Result<Vec<String>> {
    if ids.iter().any(|id| id.trim().is_empty()) {
        return Err(RelayError::InvalidRequest(
            "Channel ids must be non-empty strings".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let valid: Vec<String> = ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| is_valid_channel_id(id))
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect();

    if valid.is_empty() {
        return Err(RelayError::InvalidRequest(
            "No valid channel ids provided".to_string(),
        ));
    }
    Ok(valid)
}

// == Channel Service ==
#[derive(Clone)]
pub struct ChannelService {
    providers: ChannelProviders,
    quota: SharedQuota,
    statics: SharedCache<ChannelProfile>,
    stats: SharedCache<ChannelStatistics>,
    searches: SharedCache<SearchPage>,
    handles: SharedCache<Option<String>>,
    batches: SharedCache<Vec<ChannelRecord>>,
    in_flight: Arc<InFlight<Vec<ChannelRecord>>>,
    mutex: Arc<KeyedMutex>,
    retry: RetryPolicy,
    batch_size: usize,
    rate_limit_delay: Duration,
}

impl ChannelService {
    /// Creates the service and registers its caches.
    pub fn new(
        providers: ChannelProviders,
        quota: SharedQuota,
        mutex: Arc<KeyedMutex>,
        registry: &mut CacheRegistry,
        config: &Config,
    ) -> Self {
        Self {
            providers,
            quota,
            statics: registry.register(shared(CacheStore::new("ChannelStatic", 10_000, STATIC_TTL))),
            stats: registry.register(shared(CacheStore::new("ChannelStats", 10_000, STATS_TTL))),
            searches: registry.register(shared(CacheStore::new("Search", 5_000, SEARCH_TTL))),
            handles: registry.register(shared(CacheStore::new("UsernameToId", 10_000, HANDLE_TTL))),
            batches: registry.register(shared(CacheStore::new("ChannelBatches", 1_000, BATCHES_TTL))),
            in_flight: Arc::new(InFlight::new()),
            mutex,
            retry: RetryPolicy::new(config.max_retries, config.retry_delay()),
            batch_size: config.channel_batch_size.clamp(1, 50),
            rate_limit_delay: config.rate_limit_delay(),
        }
    }

    // == Get Channels By Ids ==
    /// Fetches channels in provider-sized batches, concurrently.
    ///
    /// Failed batches are dropped from the result. Only when every batch
    /// failed is the first failure returned.
    pub async fn get_channels_by_ids(
        &self,
        ids: &[String],
        variant: Variant,
    ) -> Result<Vec<ChannelRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = normalize_ids(ids)?;

        let results = join_all(
            ids.chunks(self.batch_size)
                .map(|batch| self.fetch_batch(batch, variant)),
        )
        .await;

        let mut records = Vec::with_capacity(ids.len());
        let mut first_error = None;
        let mut succeeded = 0;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(batch) => {
                    succeeded += 1;
                    records.extend(batch);
                }
                Err(err) => {
                    warn!(batch = index + 1, error = %err, "channel batch failed, dropping");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) if succeeded == 0 => Err(err),
            _ => Ok(records),
        }
    }

    // == Fetch Batch ==
    /// Serves cached channels and fetches the rest; results follow request order.
    pub async fn fetch_batch(&self, ids: &[String], variant: Variant) -> Result<Vec<ChannelRecord>> {
        let mut found: HashMap<String, ChannelRecord> = HashMap::with_capacity(ids.len());
        let mut missing = Vec::new();
        {
            let mut statics = self.statics.write().await;
            let mut stats = self.stats.write().await;
            for id in ids {
                let profile = statics.get(&static_key(id, variant));
                let statistics = stats.get(&stats_key(id, variant));
                match (profile, statistics) {
                    (Some(profile), Some(statistics)) => {
                        found.insert(id.clone(), ChannelRecord { profile, statistics });
                    }
                    _ => missing.push(id.clone()),
                }
            }
        }
        debug!(cached = found.len(), missing = missing.len(), "channel batch lookup");

        if !missing.is_empty() {
            let key = InFlight::<Vec<ChannelRecord>>::canonical_key("channels", &missing, variant.as_str());
            let this = self.clone();
            let fetched = self
                .in_flight
                .run(&key, move || async move { this.fetch_remote(missing, variant).await })
                .await?;
            for record in fetched {
                found.insert(record.id().to_string(), record);
            }
        }

        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }

    async fn fetch_remote(&self, ids: Vec<String>, variant: Variant) -> Result<Vec<ChannelRecord>> {
        let records = retry_with_backoff(self.retry, || self.list_once(&ids, variant)).await?;

        let mut statics = self.statics.write().await;
        let mut stats = self.stats.write().await;
        for record in &records {
            statics.set(static_key(record.id(), variant), record.profile.clone(), None);
            stats.set(stats_key(record.id(), variant), record.statistics, None);
        }
        info!(requested = ids.len(), fetched = records.len(), variant = %variant, "channels fetched");
        Ok(records)
    }

    async fn list_once(&self, ids: &[String], variant: Variant) -> Result<Vec<ChannelRecord>> {
        self.reserve(ops::CHANNELS_LIST).await?;
        let records = self.providers.get(variant).list_channels(ids).await?;
        self.quota.write().await.record_usage(ops::CHANNELS_LIST);
        Ok(records)
    }

    /// Fails with a quota error when `operation` no longer fits today's budget.
    async fn reserve(&self, operation: &str) -> Result<()> {
        let mut quota = self.quota.write().await;
        if quota.can_make_request(operation) {
            return Ok(());
        }
        let retry_after = quota.seconds_until_reset();
        warn!(operation, retry_after, "daily quota exhausted");
        Err(RelayError::quota_exhausted(
            "Daily quota exceeded",
            Some(retry_after),
        ))
    }

    // == Resolve Handle ==
    /// Channel id behind a handle. Unknown handles are remembered briefly;
    /// lookup failures resolve to `None`.
    pub async fn resolve_handle(&self, username: &str, variant: Variant) -> Option<String> {
        let handle = username.trim().trim_start_matches('@');
        if handle.is_empty() {
            return None;
        }
        let key = username_key(handle, variant);
        let cached = self.handles.write().await.get(&key);
        if let Some(id) = cached {
            return id;
        }

        match retry_with_backoff(self.retry, || self.resolve_once(handle, variant)).await {
            Ok(Some(id)) => {
                self.handles.write().await.set(key, Some(id.clone()), None);
                Some(id)
            }
            Ok(None) => {
                debug!(handle, "handle not found");
                self.handles
                    .write()
                    .await
                    .set(key, None, Some(HANDLE_NOT_FOUND_TTL));
                None
            }
            Err(err) => {
                warn!(handle, error = %err, "handle resolution failed");
                None
            }
        }
    }

    async fn resolve_once(&self, handle: &str, variant: Variant) -> Result<Option<String>> {
        self.reserve(ops::CHANNELS_LIST).await?;
        let id = self.providers.get(variant).resolve_handle(handle).await?;
        self.quota.write().await.record_usage(ops::CHANNELS_LIST);
        Ok(id)
    }

    // == Get Channels By Usernames ==
    pub async fn get_channels_by_usernames(
        &self,
        usernames: &[String],
        variant: Variant,
    ) -> Result<Vec<ChannelRecord>> {
        let usernames: Vec<&str> = usernames
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .collect();
        if usernames.is_empty() {
            return Ok(Vec::new());
        }

        let key = id_set_key("usernames", &usernames, variant.as_str());
        let cached = self.batches.write().await.get(&key);
        if let Some(records) = cached {
            debug!(count = usernames.len(), "username batch served from cache");
            return Ok(records);
        }

        let resolved = join_all(
            usernames
                .iter()
                .map(|name| self.resolve_handle(name, variant)),
        )
        .await;
        let ids: Vec<String> = resolved.into_iter().flatten().collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.get_channels_by_ids(&ids, variant).await?;
        if !records.is_empty() {
            self.batches.write().await.set(key, records.clone(), None);
        }
        Ok(records)
    }

    // == Search Channels ==
    pub async fn search_channels(
        &self,
        query: &str,
        page_token: Option<&str>,
        variant: Variant,
    ) -> Result<SearchPage> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RelayError::InvalidRequest(
                "Search query is required".to_string(),
            ));
        }
        let key = format!("search_{}_{}_{}", query, page_token.unwrap_or(""), variant);
        let cached = self.searches.write().await.get(&key);
        if let Some(page) = cached {
            return Ok(page);
        }

        let page = retry_with_backoff(self.retry, || self.search_once(query, page_token, variant)).await?;
        self.searches.write().await.set(key, page.clone(), None);
        Ok(page)
    }

    async fn search_once(
        &self,
        query: &str,
        page_token: Option<&str>,
        variant: Variant,
    ) -> Result<SearchPage> {
        self.reserve(ops::SEARCH_LIST).await?;
        let page = self.providers.get(variant).search(query, page_token).await?;
        self.quota.write().await.record_usage(ops::SEARCH_LIST);
        Ok(page)
    }

    // == Invalidate Channel ==
    /// Drops the cached profile and counters of one channel, along with every
    /// cached batch that lists it.
    pub async fn invalidate_channel(&self, channel_id: &str, variant: Variant) -> bool {
        let profile = self.statics.write().await.delete(&static_key(channel_id, variant));
        let counters = self.stats.write().await.delete(&stats_key(channel_id, variant));
        // Batch entries hold no variant tag, so matches are dropped for both
        let batches = self
            .batches
            .write()
            .await
            .remove_where(|records| records.iter().any(|record| record.id() == channel_id));
        info!(channel_id, variant = %variant, batches, "channel cache invalidated");
        profile || counters || batches > 0
    }

    // == Stream Channels ==
    /// Fetches channels batch by batch, reporting each batch to `sink`.
    pub async fn stream_channels(
        &self,
        ids: &[String],
        variant: Variant,
        sink: &dyn ProgressSink<ChannelRecord>,
    ) -> Result<BatchSummary> {
        let mut seen = HashSet::new();
        let ids: Vec<String> = ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| seen.insert(id.clone()))
            .collect();

        // Ids are retried per provider call already
        let orchestrator = BatchOrchestrator::new(
            self.batches.clone(),
            self.mutex.clone(),
            RetryPolicy::once(),
            self.rate_limit_delay,
        );
        let processor = ChannelBatchProcessor {
            service: self,
            variant,
        };
        orchestrator
            .run(&processor, &ids, self.batch_size, sink)
            .await
    }
}

struct ChannelBatchProcessor<'a> {
    service: &'a ChannelService,
    variant: Variant,
}

#[async_trait]
impl<'a> BatchProcessor for ChannelBatchProcessor<'a> {
    type Item = String;
    type Output = ChannelRecord;

    fn label(&self) -> &'static str {
        "channels"
    }

    fn validate(&self, items: &[String]) -> Result<()> {
        match items.iter().find(|id| !is_valid_channel_id(id)) {
            Some(id) => Err(RelayError::InvalidRequest(format!(
                "Invalid channel id: {:?}",
                id
            ))),
            None => Ok(()),
        }
    }

    fn batch_key(&self, batch: &[String]) -> String {
        content_key("channels", &(batch, self.variant.as_str()))
    }

    async fn process(&self, batch: &[String]) -> Result<Vec<ChannelRecord>> {
        self.service.fetch_batch(batch, self.variant).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::batch::{RecordingSink, StreamEvent};
    use crate::providers::{ChannelProvider, SearchHit};
    use crate::quota::QuotaTracker;

    fn channel_id(n: u32) -> String {
        format!("UC{:0>22}", n)
    }

    fn record(id: &str) -> ChannelRecord {
        ChannelRecord {
            profile: ChannelProfile {
                id: id.to_string(),
                title: format!("Channel {}", id),
                description: String::new(),
                handle: None,
                published_at: None,
                thumbnail: None,
                uploads_playlist: None,
                keywords: None,
                topics: vec![],
            },
            statistics: ChannelStatistics {
                subscriber_count: 10,
                ..ChannelStatistics::default()
            },
        }
    }

    #[derive(Default)]
    struct FakeProvider {
        list_calls: AtomicUsize,
        handle_calls: AtomicUsize,
        search_calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl ChannelProvider for FakeProvider {
        async fn list_channels(&self, ids: &[String]) -> Result<Vec<ChannelRecord>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(ids.iter().map(|id| record(id)).collect())
        }

        async fn resolve_handle(&self, handle: &str) -> Result<Option<String>> {
            self.handle_calls.fetch_add(1, Ordering::SeqCst);
            Ok(match handle {
                "alpha" => Some(channel_id(1)),
                "beta" => Some(channel_id(2)),
                _ => None,
            })
        }

        async fn search(&self, query: &str, _page_token: Option<&str>) -> Result<SearchPage> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            Ok(SearchPage {
                data: vec![SearchHit {
                    channel_id: channel_id(9),
                    channel_name: query.to_string(),
                    channel_description: String::new(),
                }],
                next_page_token: Some("next".to_string()),
            })
        }
    }

    fn service(provider: Arc<FakeProvider>, config: &Config) -> (ChannelService, SharedQuota) {
        let quota = QuotaTracker::new(config.daily_quota, config.quota_low_threshold).shared();
        let mut registry = CacheRegistry::new();
        let service = ChannelService::new(
            ChannelProviders::single(provider),
            quota.clone(),
            Arc::new(KeyedMutex::new(config.mutex_max_age())),
            &mut registry,
            config,
        );
        (service, quota)
    }

    #[test]
    fn test_channel_id_format() {
        assert!(is_valid_channel_id("UC_x5XG1OV2P6uZZ5FSM9Ttw"));
        assert!(!is_valid_channel_id("UU_x5XG1OV2P6uZZ5FSM9Ttw"));
        assert!(!is_valid_channel_id("UC_x5XG1OV2P6uZZ5FSM9Tt"));
        assert!(!is_valid_channel_id("UC_x5XG1OV2P6uZZ5FSM9T!w"));
    }

    #[test]
    fn test_normalize_ids() {
        let ids = vec![
            format!(" {} ", channel_id(2)),
            "bogus".to_string(),
            channel_id(1),
            channel_id(2),
        ];
        assert_eq!(normalize_ids(&ids).unwrap(), vec![channel_id(2), channel_id(1)]);

        assert!(matches!(
            normalize_ids(&["  ".to_string()]),
            Err(RelayError::InvalidRequest(_))
        ));
        assert!(matches!(
            normalize_ids(&["bogus".to_string()]),
            Err(RelayError::InvalidRequest(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_fetched_once_then_cached() {
        let provider = Arc::new(FakeProvider::default());
        let (service, quota) = service(provider.clone(), &Config::default());
        let ids = vec![channel_id(3), channel_id(1), channel_id(3)];

        let first = service.get_channels_by_ids(&ids, Variant::Production).await.unwrap();
        let second = service.get_channels_by_ids(&ids, Variant::Production).await.unwrap();

        let order: Vec<&str> = first.iter().map(|r| r.id()).collect();
        assert_eq!(order, vec![channel_id(3).as_str(), channel_id(1).as_str()]);
        assert_eq!(first, second);
        assert_eq!(provider.list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(quota.write().await.status().used, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_split_into_provider_batches() {
        let provider = Arc::new(FakeProvider::default());
        let config = Config {
            channel_batch_size: 2,
            ..Config::default()
        };
        let (service, _) = service(provider.clone(), &config);
        let ids: Vec<String> = (1..=5).map(channel_id).collect();

        let records = service.get_channels_by_ids(&ids, Variant::Production).await.unwrap();

        assert_eq!(records.len(), 5);
        assert_eq!(provider.list_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_identical_fetches_share_one_call() {
        let provider = Arc::new(FakeProvider {
            delay: Duration::from_millis(50),
            ..FakeProvider::default()
        });
        let (service, _) = service(provider.clone(), &Config::default());
        let ids = vec![channel_id(1), channel_id(2)];
        let reversed = vec![channel_id(2), channel_id(1)];

        let (a, b) = tokio::join!(
            service.get_channels_by_ids(&ids, Variant::Production),
            service.get_channels_by_ids(&reversed, Variant::Production)
        );

        assert_eq!(a.unwrap().len(), 2);
        assert_eq!(b.unwrap()[0].id(), channel_id(2));
        assert_eq!(provider.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_quota_fails_without_provider_call() {
        let provider = Arc::new(FakeProvider::default());
        let config = Config {
            daily_quota: 0,
            ..Config::default()
        };
        let (service, _) = service(provider.clone(), &config);

        let result = service
            .get_channels_by_ids(&[channel_id(1)], Variant::Production)
            .await;

        assert!(matches!(
            result,
            Err(RelayError::RateLimited { status: 403, .. })
        ));
        assert_eq!(provider.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_handle_cached_briefly() {
        let provider = Arc::new(FakeProvider::default());
        let (service, _) = service(provider.clone(), &Config::default());

        assert_eq!(service.resolve_handle("@ghost", Variant::Production).await, None);
        assert_eq!(service.resolve_handle("ghost", Variant::Production).await, None);
        assert_eq!(provider.handle_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(6 * 60)).await;
        assert_eq!(service.resolve_handle("ghost", Variant::Production).await, None);
        assert_eq!(provider.handle_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_usernames_resolve_then_fetch() {
        let provider = Arc::new(FakeProvider::default());
        let (service, _) = service(provider.clone(), &Config::default());
        let names = vec!["beta".to_string(), "alpha".to_string(), "ghost".to_string()];

        let records = service
            .get_channels_by_usernames(&names, Variant::Production)
            .await
            .unwrap();
        let again = service
            .get_channels_by_usernames(&names, Variant::Production)
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records, again);
        assert_eq!(provider.handle_calls.load(Ordering::SeqCst), 3);
        assert_eq!(provider.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_is_cached_and_weighted() {
        let provider = Arc::new(FakeProvider::default());
        let (service, quota) = service(provider.clone(), &Config::default());

        let page = service
            .search_channels("rust", None, Variant::Production)
            .await
            .unwrap();
        service
            .search_channels(" rust ", None, Variant::Production)
            .await
            .unwrap();

        assert_eq!(page.next_page_token.as_deref(), Some("next"));
        assert_eq!(provider.search_calls.load(Ordering::SeqCst), 1);
        assert_eq!(quota.write().await.status().used, 100);

        let blank = service.search_channels("  ", None, Variant::Production).await;
        assert!(matches!(blank, Err(RelayError::InvalidRequest(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refetch() {
        let provider = Arc::new(FakeProvider::default());
        let (service, _) = service(provider.clone(), &Config::default());
        let ids = vec![channel_id(1)];

        service.get_channels_by_ids(&ids, Variant::Production).await.unwrap();
        assert!(service.invalidate_channel(&channel_id(1), Variant::Production).await);
        assert!(!service.invalidate_channel(&channel_id(1), Variant::Development).await);
        service.get_channels_by_ids(&ids, Variant::Production).await.unwrap();

        assert_eq!(provider.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_reports_batches() {
        let provider = Arc::new(FakeProvider::default());
        let config = Config {
            channel_batch_size: 2,
            ..Config::default()
        };
        let (service, _) = service(provider, &config);
        let ids: Vec<String> = (1..=3).map(channel_id).collect();
        let sink = RecordingSink::<ChannelRecord>::new();

        let summary = service
            .stream_channels(&ids, Variant::Production, &sink)
            .await
            .unwrap();

        assert_eq!(summary.total_batches, 2);
        assert_eq!(summary.processed_items, 3);
        let names: Vec<&str> = sink.events().await.iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec!["started", "progress", "batch", "progress", "batch", "complete"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidated_channel_is_refetched_by_stream() {
        let provider = Arc::new(FakeProvider::default());
        let (service, _) = service(provider.clone(), &Config::default());
        let ids = vec![channel_id(1)];

        let first = RecordingSink::<ChannelRecord>::new();
        service
            .stream_channels(&ids, Variant::Production, &first)
            .await
            .unwrap();
        assert!(service.invalidate_channel(&ids[0], Variant::Production).await);

        let second = RecordingSink::<ChannelRecord>::new();
        let summary = service
            .stream_channels(&ids, Variant::Production, &second)
            .await
            .unwrap();

        assert_eq!(summary.cached_batches, 0);
        assert_eq!(provider.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_rejects_malformed_ids() {
        let provider = Arc::new(FakeProvider::default());
        let (service, _) = service(provider.clone(), &Config::default());
        let sink = RecordingSink::<ChannelRecord>::new();

        let result = service
            .stream_channels(&[channel_id(1), "nope".to_string()], Variant::Production, &sink)
            .await;

        assert!(matches!(result, Err(RelayError::InvalidRequest(_))));
        let events = sink.events().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::Error { .. }));
        assert_eq!(provider.list_calls.load(Ordering::SeqCst), 0);
    }
}
