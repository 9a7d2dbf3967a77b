//! Relay Context
//!
//! Everything one process shares: configuration, the cache registry, quota and
//! cost trackers, the keyed mutex and the services built on top of them. It is
//! created once at startup and handed to the HTTP layer and background tasks.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheRegistry;
use crate::config::Config;
use crate::cost::{CostTracker, SharedCosts};
use crate::error::Result;
use crate::providers::{
    ApifyClient, ChannelProvider, ChannelProviders, EmailDiscovery, EmailValidator,
    InferenceProvider, LeadMagicClient, OpenAiClient, YouTubeClient,
};
use crate::quota::{QuotaTracker, SharedQuota};
use crate::services::{AnalysisService, ChannelService, EmailValidationService};
use crate::sync::KeyedMutex;

/// The remote collaborators of the relay.
#[derive(Clone)]
pub struct Providers {
    pub channels: ChannelProviders,
    pub inference: Arc<dyn InferenceProvider>,
    pub discovery: Arc<dyn EmailDiscovery>,
    pub validator: Arc<dyn EmailValidator>,
}

impl Providers {
    /// HTTP clients for every provider. Missing credentials are not an error
    /// here; calls through an unconfigured provider fail instead.
    pub fn from_config(config: &Config) -> Result<Self> {
        let production: Arc<dyn ChannelProvider> =
            Arc::new(YouTubeClient::new(config.youtube_api_key.clone())?);
        let development = match &config.dev_youtube_api_key {
            Some(key) => {
                Some(Arc::new(YouTubeClient::new(Some(key.clone()))?) as Arc<dyn ChannelProvider>)
            }
            None => None,
        };

        Ok(Self {
            channels: ChannelProviders::new(production, development),
            inference: Arc::new(OpenAiClient::new(
                config.openai_api_key.clone(),
                config.openai_model.clone(),
                Duration::from_secs(config.openai_timeout),
            )?),
            discovery: Arc::new(ApifyClient::new(
                config.apify_api_token.clone(),
                Duration::from_secs(config.apify_timeout),
            )?),
            validator: Arc::new(LeadMagicClient::new(
                config.leadmagic_api_key.clone(),
                Duration::from_secs(config.leadmagic_timeout),
                config.leadmagic_accept_catch_all,
            )?),
        })
    }
}

// == Relay Context ==
pub struct RelayContext {
    pub config: Config,
    pub registry: CacheRegistry,
    pub quota: SharedQuota,
    pub costs: SharedCosts,
    pub mutex: Arc<KeyedMutex>,
    pub channels: ChannelService,
    pub analysis: AnalysisService,
    pub emails: EmailValidationService,
}

impl RelayContext {
    pub fn new(config: Config, providers: Providers) -> Self {
        let mut registry = CacheRegistry::new();
        let quota = QuotaTracker::new(config.daily_quota, config.quota_low_threshold).shared();
        let costs = CostTracker::new().shared();
        let mutex = Arc::new(KeyedMutex::new(config.mutex_max_age()));

        let channels = ChannelService::new(
            providers.channels,
            quota.clone(),
            mutex.clone(),
            &mut registry,
            &config,
        );
        let analysis = AnalysisService::new(
            providers.inference,
            providers.discovery,
            costs.clone(),
            mutex.clone(),
            &mut registry,
            &config,
        );
        let emails = EmailValidationService::new(providers.validator, &config);

        Self {
            config,
            registry,
            quota,
            costs,
            mutex,
            channels,
            analysis,
            emails,
        }
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let providers = Providers::from_config(&config)?;
        Ok(Self::new(config, providers))
    }
}
