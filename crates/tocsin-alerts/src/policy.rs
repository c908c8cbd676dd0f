//! The decision policy: should this channel send this alert?
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. A disabled channel never sends.
//! 2. An explicit override forces or forbids delivery.
//! 3. A channel without levels, or with an empty set, never triggers.
//! 4. Otherwise the alert's level must be in the channel's levels.

use std::fmt;

use crate::config::ChannelConfig;
use crate::types::{Alert, Override};

/// Why a channel did or did not send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// The channel is disabled.
    Disabled,
    /// The caller suppressed delivery.
    Suppressed,
    /// The caller forced delivery.
    Forced,
    /// The channel has no triggering levels.
    NoLevels,
    /// The alert's level is not one of the channel's levels.
    LevelNotMatched,
    /// The alert's level is one of the channel's levels.
    LevelMatched,
}

impl Reason {
    /// Returns a short snake-case label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Suppressed => "suppressed",
            Self::Forced => "forced",
            Self::NoLevels => "no_levels",
            Self::LevelNotMatched => "level_not_matched",
            Self::LevelMatched => "level_matched",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verdict together with the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the channel should send.
    pub send: bool,
    /// The rule that decided.
    pub reason: Reason,
}

impl Decision {
    const fn send(reason: Reason) -> Self {
        Self { send: true, reason }
    }

    const fn skip(reason: Reason) -> Self {
        Self {
            send: false,
            reason,
        }
    }
}

/// Evaluates the policy and reports which rule decided.
#[must_use]
pub fn decide(config: &ChannelConfig, alert: &Alert) -> Decision {
    if !config.enabled {
        return Decision::skip(Reason::Disabled);
    }

    match alert.override_flag() {
        Override::ForceSend => return Decision::send(Reason::Forced),
        Override::ForceSuppress => return Decision::skip(Reason::Suppressed),
        Override::Unset => {}
    }

    match &config.levels {
        None => Decision::skip(Reason::NoLevels),
        Some(levels) if levels.is_empty() => Decision::skip(Reason::NoLevels),
        Some(levels) if levels.contains(&alert.level()) => Decision::send(Reason::LevelMatched),
        Some(_) => Decision::skip(Reason::LevelNotMatched),
    }
}

/// Returns whether the channel should send the alert.
#[must_use]
pub fn should_send(config: &ChannelConfig, alert: &Alert) -> bool {
    decide(config, alert).send
}
