//! Scripted channels for unit tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::channels::{Channel, SendFuture};
use crate::error::ChannelError;
use crate::types::Alert;

/// Fails a fixed number of times, then succeeds.
#[derive(Debug)]
pub struct ScriptedChannel {
    name: String,
    failures: u32,
    delay: Duration,
    calls: AtomicU32,
}

impl ScriptedChannel {
    pub fn succeeding(name: &str) -> Self {
        Self::flaky(name, 0)
    }

    pub fn failing(name: &str) -> Self {
        Self::flaky(name, u32::MAX)
    }

    pub fn flaky(name: &str, failures: u32) -> Self {
        Self {
            name: name.to_string(),
            failures,
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Channel for ScriptedChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send<'a>(&'a self, _alert: &'a Alert) -> SendFuture<'a> {
        Box::pin(async move {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if call <= self.failures {
                Err(ChannelError::Other("scripted failure".to_string()))
            } else {
                Ok(())
            }
        })
    }
}

/// Panics on every send.
#[derive(Debug)]
pub struct PanickingChannel;

impl Channel for PanickingChannel {
    fn name(&self) -> &str {
        "panicking"
    }

    #[allow(clippy::panic)]
    fn send<'a>(&'a self, alert: &'a Alert) -> SendFuture<'a> {
        Box::pin(async move {
            if alert.message().is_empty() {
                return Ok::<(), ChannelError>(());
            }
            panic!("channel exploded")
        })
    }
}
