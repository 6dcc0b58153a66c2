//! Audit trail of updater runs.
//!
//! Unattended runs are investigated after the fact, so every significant step
//! is reported twice: as a `tracing` event for whoever is watching stdout, and
//! as an [`AuditEvent`] appended to each configured [`AuditLog`] sink. A sink
//! that fails only produces a warning; auditing never aborts an update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::config::UpdaterConfig;
use crate::constants::{EVENT_LOG_NAME, EVENT_LOG_SOURCE};
use crate::core::UpdaterError;
use crate::utils::powershell;
use crate::utils::process::CommandRunner;
use crate::utils::security::powershell_literal;

/// Severity of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Normal progress
    Information,
    /// Something unexpected that did not stop the run
    Warning,
    /// The run was aborted
    Error,
}

impl Severity {
    /// Windows event log entry type.
    #[must_use]
    pub const fn entry_type(self) -> &'static str {
        match self {
            Self::Information => "Information",
            Self::Warning => "Warning",
            Self::Error => "Error",
        }
    }

    /// Event id used in the Windows event log.
    #[must_use]
    pub const fn event_id(self) -> u16 {
        match self {
            Self::Information => 1,
            Self::Warning => 2,
            Self::Error => 3,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_type())
    }
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event was reported
    pub timestamp: DateTime<Utc>,
    /// How serious it is
    pub severity: Severity,
    /// Human readable message
    pub message: String,
}

impl AuditEvent {
    /// Create an event stamped with the current time.
    pub fn now(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            message: message.into(),
        }
    }
}

/// Destination for audit events.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Persist `event`.
    async fn record(&self, event: &AuditEvent) -> Result<(), UpdaterError>;

    /// Short name used in warnings.
    fn name(&self) -> &str;
}

/// Appends events as JSON lines.
#[derive(Debug, Clone)]
pub struct FileAuditLog {
    path: PathBuf,
}

impl FileAuditLog {
    /// Log to `path`; parent directories are created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Location of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditLog for FileAuditLog {
    async fn record(&self, event: &AuditEvent) -> Result<(), UpdaterError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(event)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        line.push('\n');

        let mut file =
            tokio::fs::OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Writes events to the `Certbot` Windows event log.
pub struct WindowsEventLog {
    runner: Arc<dyn CommandRunner>,
}

impl WindowsEventLog {
    /// Event log sink using `runner` to launch PowerShell.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
        }
    }

    /// PowerShell that registers the event source if needed and writes `event`.
    #[must_use]
    pub fn script(event: &AuditEvent) -> String {
        let log = powershell_literal(EVENT_LOG_NAME);
        let source = powershell_literal(EVENT_LOG_SOURCE);
        format!(
            "if (-not [System.Diagnostics.EventLog]::SourceExists({source})) {{ \
             New-EventLog -LogName {log} -Source {source} }}; \
             Write-EventLog -LogName {log} -Source {source} -EntryType {} -EventId {} -Message {}",
            event.severity.entry_type(),
            event.severity.event_id(),
            powershell_literal(&event.message)
        )
    }
}

#[async_trait]
impl AuditLog for WindowsEventLog {
    async fn record(&self, event: &AuditEvent) -> Result<(), UpdaterError> {
        powershell::run_script(self.runner.as_ref(), &Self::script(event))
            .await?
            .check(powershell::POWERSHELL)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "event log"
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Recorded events of the given severity.
    #[must_use]
    pub fn with_severity(&self, severity: Severity) -> Vec<AuditEvent> {
        self.events().into_iter().filter(|e| e.severity == severity).collect()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn record(&self, event: &AuditEvent) -> Result<(), UpdaterError> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Fans audit messages out to tracing and every sink.
#[derive(Clone, Default)]
pub struct Reporter {
    sinks: Vec<Arc<dyn AuditLog>>,
}

impl Reporter {
    /// Reporter that only emits tracing events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink, builder style.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn AuditLog>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Sinks selected by `config`: the JSON-lines file and, if enabled, the event log.
    pub fn from_config(config: &UpdaterConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let mut reporter = Self::new();
        if let Some(path) = &config.audit_log_path {
            reporter = reporter.with_sink(Arc::new(FileAuditLog::new(path)));
        }
        if config.event_log {
            reporter = reporter.with_sink(Arc::new(WindowsEventLog::new(runner)));
        }
        reporter
    }

    /// Number of sinks.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Report progress.
    pub async fn info(&self, message: impl Into<String>) {
        self.report(Severity::Information, message.into()).await;
    }

    /// Report an anomaly that does not stop the run.
    pub async fn warn(&self, message: impl Into<String>) {
        self.report(Severity::Warning, message.into()).await;
    }

    /// Report a failure.
    pub async fn error(&self, message: impl Into<String>) {
        self.report(Severity::Error, message.into()).await;
    }

    async fn report(&self, severity: Severity, message: String) {
        match severity {
            Severity::Information => info!("{}", message),
            Severity::Warning => warn!("{}", message),
            Severity::Error => error!("{}", message),
        }

        let event = AuditEvent::now(severity, message);
        for sink in &self.sinks {
            if let Err(e) = sink.record(&event).await {
                warn!("Failed to write audit event to {} sink: {}", sink.name(), e);
            }
        }
    }
}
