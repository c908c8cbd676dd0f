//! Bridge from `tracing` events to alert dispatch.
//!
//! [`AlertLayer`] is a [`tracing_subscriber::Layer`] that turns every event
//! into an [`Alert`] and hands it to an [`AlertManager`] on the current Tokio
//! runtime. Logging itself is never delayed or affected by delivery.
//!
//! Two event fields are interpreted:
//!
//! - `alert = true | false` forces or suppresses delivery;
//! - `severity = "success" | "critical" | ...` overrides the level, for the
//!   severities `tracing` has no macro for.
//!
//! Events from this crate and from the transport crates it sends through
//! (`hyper`, `reqwest`, `lettre` and their TLS stacks) are ignored, so a
//! delivery never raises further alerts.
//!
//! ```no_run
//! use tocsin_alerts::{AlertLayer, AlertManager};
//! use tracing_subscriber::prelude::*;
//!
//! let manager = AlertManager::new();
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer())
//!     .with(AlertLayer::new(manager))
//!     .init();
//!
//! tracing::error!(host = "db-1", "database unreachable");
//! tracing::info!(alert = true, "deploy finished");
//! tracing::error!(severity = "critical", "disk full");
//! ```

use std::collections::BTreeMap;
use std::fmt;

use tokio::runtime::Handle;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber, debug};
use tracing_subscriber::layer::{Context, Layer};

use crate::manager::AlertManager;
use crate::types::{Alert, Severity, SourceLocation};

/// Crates whose events never become alerts.
const IGNORED_TARGETS: &[&str] = &[
    "tocsin_alerts",
    "hyper",
    "hyper_util",
    "h2",
    "reqwest",
    "lettre",
    "rustls",
    "native_tls",
    "tokio_native_tls",
];

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|&krate| {
        target
            .strip_prefix(krate)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

/// A layer that dispatches an alert for each `tracing` event.
#[derive(Debug, Clone)]
pub struct AlertLayer {
    manager: AlertManager,
    min_level: Option<Severity>,
}

impl AlertLayer {
    /// Creates a layer that forwards every event to `manager`.
    #[must_use]
    pub const fn new(manager: AlertManager) -> Self {
        Self {
            manager,
            min_level: None,
        }
    }

    /// Ignores events below `level` unless they carry `alert = true`.
    #[must_use]
    pub const fn with_min_level(mut self, level: Severity) -> Self {
        self.min_level = Some(level);
        self
    }
}

impl<S: Subscriber> Layer<S> for AlertLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_ignored(metadata.target()) {
            return;
        }

        let mut visitor = AlertVisitor::default();
        event.record(&mut visitor);

        let level = visitor
            .severity
            .unwrap_or_else(|| Severity::from_tracing(*metadata.level()));
        if let Some(min) = self.min_level {
            if level < min && visitor.force != Some(true) {
                return;
            }
        }

        let Ok(handle) = Handle::try_current() else {
            return;
        };

        let alert = Alert::builder(level, visitor.message.unwrap_or_default())
            .fields(visitor.fields)
            .source(SourceLocation {
                module: metadata.module_path().map(str::to_string),
                function: None,
                line: metadata.line(),
            })
            .override_flag(visitor.force)
            .build();

        let manager = self.manager.clone();
        handle.spawn(async move {
            if let Err(e) = manager.dispatch_alert(alert).await {
                debug!(error = %e, "alert from tracing event was not dispatched");
            }
        });
    }
}

#[derive(Debug, Default)]
struct AlertVisitor {
    message: Option<String>,
    severity: Option<Severity>,
    force: Option<bool>,
    fields: BTreeMap<String, serde_json::Value>,
}

impl AlertVisitor {
    fn insert(&mut self, field: &Field, value: serde_json::Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for AlertVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            "severity" => match value.parse() {
                Ok(severity) => self.severity = Some(severity),
                Err(_) => self.insert(field, value.into()),
            },
            _ => self.insert(field, value.into()),
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        match field.name() {
            "alert" | "_alert" => self.force = Some(value),
            _ => self.insert(field, value.into()),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, value.into());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, value.to_string().into());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.insert(field, rendered.into());
        }
    }
}
