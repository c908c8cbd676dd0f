//! The alert manager.
//!
//! This module provides the [`AlertManager`], the entry point of the
//! alerting system. It owns the channel set, the dispatch settings and the
//! worker pool used by the parallel strategy, and turns each dispatch call
//! into a [`DispatchResult`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::channels::Channel;
use crate::config::{AlertsConfig, ChannelConfig, DispatchSettings};
use crate::error::{AlertError, Result};
use crate::registry::ChannelRegistry;
use crate::retry::ChannelEntry;
use crate::strategy::{self, DispatchResult, DispatchStrategy};
use crate::types::{Alert, Severity};

/// Coordinates alert delivery across the configured channels.
///
/// The manager is a cheap handle over shared state: clones see the same
/// channels and settings. Construct one at startup and pass it to every
/// call site (and to an [`AlertLayer`](crate::AlertLayer)).
///
/// Each dispatch works on a snapshot of the channel set taken when the call
/// starts, so channels added or cleared meanwhile do not affect it.
#[derive(Debug)]
pub struct AlertManager {
    /// Dispatch parameters.
    settings: Arc<RwLock<DispatchSettings>>,
    /// Channel set, sorted by descending priority.
    channels: Arc<RwLock<Arc<Vec<ChannelEntry>>>>,
    /// Channel constructors.
    registry: Arc<RwLock<ChannelRegistry>>,
    /// Permits for the parallel strategy.
    pool: Arc<RwLock<Arc<Semaphore>>>,
    /// Set once by `shutdown`.
    shut_down: Arc<AtomicBool>,
}

impl AlertManager {
    /// Creates a manager with default settings and no channels.
    #[must_use]
    pub fn new() -> Self {
        Self::build(DispatchSettings::default())
    }

    /// Creates a manager with custom settings.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidSettings` if the settings are rejected by
    /// [`DispatchSettings::validate`].
    pub fn with_settings(settings: DispatchSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self::build(settings))
    }

    /// Creates a manager from a file-level configuration, building every
    /// configured channel.
    ///
    /// # Errors
    ///
    /// Returns the first settings or channel construction error.
    pub fn from_config(config: &AlertsConfig) -> Result<Self> {
        let manager = Self::with_settings(config.dispatch_settings()?)?;
        for channel in config.channel_configs() {
            manager.add_channel(channel)?;
        }
        Ok(manager)
    }

    fn build(settings: DispatchSettings) -> Self {
        Self {
            pool: Arc::new(RwLock::new(Arc::new(Semaphore::new(settings.workers)))),
            settings: Arc::new(RwLock::new(settings)),
            channels: Arc::new(RwLock::new(Arc::new(Vec::new()))),
            registry: Arc::new(RwLock::new(ChannelRegistry::new())),
            shut_down: Arc::new(AtomicBool::new(false)),
        }
    }

    // ============ Settings ============

    /// Replaces the dispatch settings for subsequent dispatches.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidSettings` if the settings are invalid, or
    /// `AlertError::ShutDown` after [`shutdown`](Self::shutdown).
    pub fn configure(&self, settings: DispatchSettings) -> Result<()> {
        settings.validate()?;
        self.ensure_running()?;

        let mut current = self.settings.write();
        if current.workers != settings.workers {
            *self.pool.write() = Arc::new(Semaphore::new(settings.workers));
        }
        info!(
            strategy = %settings.strategy,
            max_retries = settings.max_retries,
            retry_delay = ?settings.retry_delay,
            timeout = ?settings.timeout,
            workers = settings.workers,
            "alert dispatch configured"
        );
        *current = settings;
        Ok(())
    }

    /// Changes only the dispatch strategy.
    pub fn set_strategy(&self, strategy: DispatchStrategy) {
        self.settings.write().strategy = strategy;
        info!(strategy = %strategy, "alert strategy changed");
    }

    /// Returns the current dispatch settings.
    #[must_use]
    pub fn settings(&self) -> DispatchSettings {
        self.settings.read().clone()
    }

    // ============ Channel Management ============

    /// Registers a constructor for a channel kind.
    ///
    /// A registered kind takes precedence over a built-in kind of the same
    /// name.
    pub fn register<F>(&self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&ChannelConfig) -> Result<Arc<dyn Channel>> + Send + Sync + 'static,
    {
        let kind = kind.into();
        info!(kind = %kind, "registered channel kind");
        self.registry.write().register(kind, factory);
    }

    /// Returns every channel kind that [`add_channel`](Self::add_channel)
    /// accepts.
    #[must_use]
    pub fn registered_kinds(&self) -> Vec<String> {
        self.registry.read().kinds()
    }

    /// Builds a channel from its configuration and adds it to the set.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::UnknownChannelKind` if no constructor matches the
    /// kind, or `AlertError::InvalidChannelConfig` if the settings are
    /// invalid.
    pub fn add_channel(&self, config: ChannelConfig) -> Result<()> {
        validate_channel(&config)?;
        let channel = self.registry.read().build(&config)?;
        self.insert(ChannelEntry::new(config, channel));
        Ok(())
    }

    /// Adds an already-built channel to the set.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannelConfig` if the configuration's
    /// generic fields are invalid.
    pub fn add_channel_instance(&self, config: ChannelConfig, channel: Arc<dyn Channel>) -> Result<()> {
        validate_channel(&config)?;
        self.insert(ChannelEntry::new(config, channel));
        Ok(())
    }

    fn insert(&self, entry: ChannelEntry) {
        let mut channels = self.channels.write();
        let mut next = Vec::clone(&channels);

        // after every entry of equal or higher priority
        let position = next
            .iter()
            .position(|e| e.priority() < entry.priority())
            .unwrap_or(next.len());

        info!(
            channel = %entry.name(),
            kind = %entry.config.kind,
            priority = entry.priority(),
            enabled = entry.config.enabled,
            "added alert channel"
        );
        next.insert(position, entry);
        *channels = Arc::new(next);
    }

    /// Removes every channel.
    pub fn clear_channels(&self) {
        let mut channels = self.channels.write();
        let removed = channels.len();
        *channels = Arc::new(Vec::new());
        info!(removed, "cleared alert channels");
    }

    /// Returns the number of channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    /// Returns channel names in dispatch order.
    #[must_use]
    pub fn channel_names(&self) -> Vec<String> {
        self.channels
            .read()
            .iter()
            .map(|e| e.name().to_string())
            .collect()
    }

    /// Returns a snapshot of the channel set in dispatch order.
    #[must_use]
    pub fn channels(&self) -> Arc<Vec<ChannelEntry>> {
        Arc::clone(&self.channels.read())
    }

    // ============ Dispatch ============

    /// Builds an alert and dispatches it.
    ///
    /// `force` sets the override: `Some(true)` sends regardless of channel
    /// levels, `Some(false)` suppresses, `None` lets each channel decide.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::ShutDown` after [`shutdown`](Self::shutdown).
    /// Per-channel failures are reported in the result, never as errors.
    pub async fn dispatch(
        &self,
        level: Severity,
        message: impl Into<String>,
        force: Option<bool>,
        fields: BTreeMap<String, serde_json::Value>,
    ) -> Result<DispatchResult> {
        let alert = Alert::builder(level, message)
            .fields(fields)
            .override_flag(force)
            .build();
        self.dispatch_alert(alert).await
    }

    /// Dispatches a pre-built alert.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::ShutDown` after [`shutdown`](Self::shutdown).
    pub async fn dispatch_alert(&self, alert: Alert) -> Result<DispatchResult> {
        self.ensure_running()?;

        let entries = self.channels();
        let settings = self.settings();
        let pool = Arc::clone(&self.pool.read());

        if entries.is_empty() {
            debug!(alert_id = %alert.id(), "no alert channels configured");
            return Ok(DispatchResult::empty(settings.strategy));
        }

        debug!(
            alert_id = %alert.id(),
            level = %alert.level(),
            strategy = %settings.strategy,
            channels = entries.len(),
            "dispatching alert"
        );

        let alert = Arc::new(alert);
        let result = strategy::run(&entries, &alert, &settings, &pool).await;

        if result.failed > 0 {
            warn!(
                alert_id = %alert.id(),
                succeeded = result.succeeded,
                failed = result.failed,
                skipped = result.skipped,
                "alert dispatch finished with failures"
            );
        } else {
            debug!(
                alert_id = %alert.id(),
                succeeded = result.succeeded,
                skipped = result.skipped,
                "alert dispatch finished"
            );
        }
        Ok(result)
    }

    // ============ Lifecycle ============

    /// Releases the worker pool. Later dispatches fail with
    /// `AlertError::ShutDown`; in-flight dispatches are not interrupted.
    pub fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            self.pool.read().close();
            info!("alert manager shut down");
        }
    }

    /// Returns true once [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_shut_down() {
            Err(AlertError::ShutDown)
        } else {
            Ok(())
        }
    }
}

fn validate_channel(config: &ChannelConfig) -> Result<()> {
    if config.max_retries == Some(0) {
        return Err(AlertError::invalid_channel(
            &config.kind,
            "max_retries must be at least 1",
        ));
    }
    Ok(())
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for AlertManager {
    fn clone(&self) -> Self {
        Self {
            settings: Arc::clone(&self.settings),
            channels: Arc::clone(&self.channels),
            registry: Arc::clone(&self.registry),
            pool: Arc::clone(&self.pool),
            shut_down: Arc::clone(&self.shut_down),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedChannel;
    use std::time::Duration;

    fn scripted(manager: &AlertManager, name: &str, priority: i32) -> Arc<ScriptedChannel> {
        let channel = Arc::new(ScriptedChannel::succeeding(name));
        let config = ChannelConfig::new("scripted")
            .with_levels([Severity::Error, Severity::Critical])
            .with_priority(priority);
        manager.add_channel_instance(config, channel.clone()).unwrap();
        channel
    }

    mod manager_creation_tests {
        use super::*;

        #[test]
        fn new_manager_is_empty() {
            let manager = AlertManager::new();
            assert_eq!(manager.channel_count(), 0);
            assert_eq!(manager.settings(), DispatchSettings::default());
            assert!(!manager.is_shut_down());
        }

        #[test]
        fn invalid_settings_rejected() {
            let result = AlertManager::with_settings(DispatchSettings::default().with_workers(0));
            assert!(matches!(result, Err(AlertError::InvalidSettings { .. })));
        }

        #[test]
        fn from_config_builds_channels() {
            let config: AlertsConfig = serde_json::from_value(serde_json::json!({
                "strategy": "sequential",
                "max_retries": 2,
                "channels": [
                    { "type": "log", "name": "low", "priority": 1 },
                    { "type": "log", "name": "high", "priority": 9 }
                ]
            }))
            .unwrap();

            let manager = AlertManager::from_config(&config).unwrap();

            assert_eq!(manager.settings().strategy, DispatchStrategy::Sequential);
            assert_eq!(manager.settings().max_retries, 2);
            assert_eq!(manager.channel_names(), vec!["high", "low"]);
        }

        #[test]
        fn from_config_reports_bad_channel() {
            let config: AlertsConfig = serde_json::from_value(serde_json::json!({
                "channels": [{ "type": "pager" }]
            }))
            .unwrap();

            let err = AlertManager::from_config(&config).unwrap_err();
            assert!(matches!(err, AlertError::UnknownChannelKind { .. }));
        }

        #[test]
        fn clones_share_state() {
            let manager = AlertManager::new();
            let clone = manager.clone();
            scripted(&manager, "a", 0);
            assert_eq!(clone.channel_count(), 1);
        }
    }

    mod channel_management_tests {
        use super::*;

        #[test]
        fn channels_sorted_by_descending_priority_stable() {
            let manager = AlertManager::new();
            scripted(&manager, "mid-1", 50);
            scripted(&manager, "low", 0);
            scripted(&manager, "high", 100);
            scripted(&manager, "mid-2", 50);

            assert_eq!(manager.channel_names(), vec!["high", "mid-1", "mid-2", "low"]);
        }

        #[test]
        fn clear_channels_empties_set() {
            let manager = AlertManager::new();
            scripted(&manager, "a", 0);
            scripted(&manager, "b", 0);
            manager.clear_channels();
            assert_eq!(manager.channel_count(), 0);
        }

        #[test]
        fn snapshot_is_unaffected_by_later_changes() {
            let manager = AlertManager::new();
            scripted(&manager, "a", 0);
            let snapshot = manager.channels();
            manager.clear_channels();
            assert_eq!(snapshot.len(), 1);
        }

        #[test]
        fn unknown_kind_rejected() {
            let manager = AlertManager::new();
            let err = manager.add_channel(ChannelConfig::new("pager")).unwrap_err();
            assert!(matches!(err, AlertError::UnknownChannelKind { .. }));
            assert_eq!(manager.channel_count(), 0);
        }

        #[test]
        fn zero_channel_retries_rejected() {
            let manager = AlertManager::new();
            let err = manager
                .add_channel(ChannelConfig::new("log").with_max_retries(0))
                .unwrap_err();
            assert!(matches!(err, AlertError::InvalidChannelConfig { .. }));
        }

        #[test]
        fn registered_kind_is_buildable() {
            let manager = AlertManager::new();
            manager.register("scripted", |config: &ChannelConfig| {
                Ok(Arc::new(ScriptedChannel::succeeding(config.display_name())) as Arc<dyn Channel>)
            });

            manager
                .add_channel(ChannelConfig::new("scripted").with_name("custom"))
                .unwrap();

            assert_eq!(manager.channel_names(), vec!["custom"]);
            assert!(manager.registered_kinds().contains(&"scripted".to_string()));
        }
    }

    mod dispatch_tests {
        use super::*;

        #[tokio::test]
        async fn empty_channel_set_returns_note() {
            let manager = AlertManager::new();
            let result = manager
                .dispatch(Severity::Error, "db down", None, BTreeMap::new())
                .await
                .unwrap();

            assert_eq!(result.total, 0);
            assert!(result.note.is_some());
        }

        #[tokio::test]
        async fn matching_level_is_sent() {
            let manager = AlertManager::new();
            let channel = scripted(&manager, "a", 0);

            let result = manager
                .dispatch(Severity::Error, "db down", None, BTreeMap::new())
                .await
                .unwrap();

            assert_eq!((result.succeeded, result.skipped), (1, 0));
            assert_eq!(channel.calls(), 1);
        }

        #[tokio::test]
        async fn forced_info_is_sent() {
            let manager = AlertManager::new();
            let channel = scripted(&manager, "a", 0);

            let result = manager
                .dispatch(Severity::Info, "deploy finished", Some(true), BTreeMap::new())
                .await
                .unwrap();

            assert_eq!(result.succeeded, 1);
            assert_eq!(channel.calls(), 1);
        }

        #[tokio::test]
        async fn suppressed_error_is_skipped() {
            let manager = AlertManager::new();
            let channel = scripted(&manager, "a", 0);

            let result = manager
                .dispatch(Severity::Critical, "noisy", Some(false), BTreeMap::new())
                .await
                .unwrap();

            assert_eq!(result.skipped, 1);
            assert_eq!(channel.calls(), 0);
        }

        #[tokio::test(start_paused = true)]
        async fn configure_changes_strategy() {
            let manager = AlertManager::new();
            scripted(&manager, "a", 0);
            scripted(&manager, "b", 0);

            manager
                .configure(
                    DispatchSettings::default()
                        .with_strategy(DispatchStrategy::Failover)
                        .with_retry_delay(Duration::from_millis(1)),
                )
                .unwrap();

            let result = manager
                .dispatch(Severity::Error, "x", None, BTreeMap::new())
                .await
                .unwrap();

            assert_eq!(result.strategy, DispatchStrategy::Failover);
            assert_eq!(result.attempted(), 1);
        }

        #[tokio::test]
        async fn dispatch_after_shutdown_fails() {
            let manager = AlertManager::new();
            scripted(&manager, "a", 0);
            manager.shutdown();
            manager.shutdown();

            let err = manager
                .dispatch(Severity::Error, "x", None, BTreeMap::new())
                .await
                .unwrap_err();
            assert!(matches!(err, AlertError::ShutDown));
            assert!(manager.configure(DispatchSettings::default()).is_err());
        }

        #[test]
        fn configure_rejects_invalid_settings() {
            let manager = AlertManager::new();
            let result = manager.configure(DispatchSettings::default().with_max_retries(0));
            assert!(result.is_err());
            assert_eq!(manager.settings().max_retries, 3);
        }
    }
}
