use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use tokio_util::sync::CancellationToken;

use super::host;
use crate::config::{HostConfig, HostMode};
use crate::error::HostError;
use crate::group::WorkerGroup;
use crate::log::{ConsoleLog, EventLog, LogEntry, LogSink, Severity, TelemetrySink};
use crate::process::FatalTrap;

/// Source used for broadcasts when no group is attached yet.
const HOST_SOURCE: &str = "workvisor";

/// State shared by every [`ControlManager`] handle and referenced weakly by
/// the groups it manages.
pub(crate) struct ManagerShared {
    mode: HostMode,
    args: Vec<String>,
    event_log: Arc<dyn LogSink>,
    console: Option<Arc<dyn LogSink>>,
    telemetry: OnceLock<TelemetrySink>,
    groups: OnceLock<Vec<Arc<WorkerGroup>>>,
    trap: OnceLock<Arc<FatalTrap>>,
    stop: CancellationToken,
}

impl ManagerShared {
    /// Routes one entry according to the hosting mode.
    ///
    /// | mode        | console sink | destination                 |
    /// |-------------|--------------|-----------------------------|
    /// | Interactive | yes          | console                     |
    /// | Interactive | no           | event log (+ telemetry)     |
    /// | Service     | n/a          | event log (+ telemetry)     |
    ///
    /// Telemetry is mirrored whenever the entry goes to the event log and an
    /// instrumentation key is set.
    pub(crate) fn log(&self, source: &Arc<str>, message: String, severity: Severity) {
        let entry = LogEntry::new(source.clone(), message, severity);
        match (self.mode, &self.console) {
            (HostMode::Interactive, Some(console)) => console.write(&entry),
            (HostMode::Interactive, None) | (HostMode::Service, _) => {
                self.event_log.write(&entry);
                if let Some(telemetry) = self.telemetry.get() {
                    telemetry.write(&entry);
                }
            }
        }
    }

    /// Writes `message` once per managed group.
    pub(crate) fn broadcast(&self, message: &str, severity: Severity) {
        match self.groups.get() {
            Some(groups) => {
                for g in groups {
                    g.log_message(message, severity);
                }
            }
            None => self.log(&Arc::from(HOST_SOURCE), message.to_string(), severity),
        }
    }

    pub(crate) fn trap(&self) -> Option<&Arc<FatalTrap>> {
        self.trap.get()
    }
}

/// Binds worker groups to a hosting mode and routes their messages.
///
/// Cheap to clone; all clones share one state and one stop token.
///
/// # Example
/// ```no_run
/// use workvisor::{ControlManager, HostConfig, HostMode};
///
/// # async fn demo(groups: Vec<std::sync::Arc<workvisor::WorkerGroup>>) -> Result<(), workvisor::HostError> {
/// let manager = ControlManager::builder(HostConfig {
///     mode: Some(HostMode::Service),
///     ..HostConfig::default()
/// })
/// .build();
///
/// let stop = manager.stop_token();
/// tokio::spawn(async move {
///     tokio::time::sleep(std::time::Duration::from_secs(10)).await;
///     stop.cancel();
/// });
/// manager.run(groups).await
/// # }
/// ```
#[derive(Clone)]
pub struct ControlManager {
    shared: Arc<ManagerShared>,
}

impl ControlManager {
    /// Starts building a manager from `config`.
    pub fn builder(config: HostConfig) -> ControlManagerBuilder {
        ControlManagerBuilder::new(config)
    }

    /// Builds a manager from `config` with the default sinks.
    pub fn new(config: HostConfig) -> Self {
        Self::builder(config).build()
    }

    /// Hosting mode chosen at construction.
    pub fn mode(&self) -> HostMode {
        self.shared.mode
    }

    /// Arguments forwarded to every worker's start hook.
    pub fn args(&self) -> &[String] {
        &self.shared.args
    }

    /// Token that ends [`run`](Self::run) when cancelled.
    pub fn stop_token(&self) -> CancellationToken {
        self.shared.stop.clone()
    }

    /// Enables the telemetry mirror for service-mode messages. Allowed once;
    /// blank keys are ignored.
    pub fn set_instrumentation_key(&self, key: impl Into<String>) -> Result<(), HostError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Ok(());
        }
        self.shared
            .telemetry
            .set(TelemetrySink::new(key))
            .map_err(|_| HostError::AlreadyConfigured {
                setting: "instrumentation key",
            })
    }

    /// Groups bound by [`run`](Self::run), in the order given.
    pub fn groups(&self) -> &[Arc<WorkerGroup>] {
        self.shared.groups.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Binds `groups`, starts them in the hosting mode, and returns once they
    /// have been stopped again.
    ///
    /// ### Errors
    /// - [`HostError::NoGroups`] for an empty list
    /// - [`HostError::ManagerAlreadySet`] if a group already has a manager
    /// - [`HostError::AlreadyConfigured`] if this manager already ran
    /// - the first worker start error (after stopping what was started)
    pub async fn run(&self, groups: Vec<Arc<WorkerGroup>>) -> Result<(), HostError> {
        self.attach(groups)?;
        tracing::debug!(mode = %self.mode(), groups = self.groups().len(), "control manager running");
        match self.mode() {
            HostMode::Service => host::run_service(self).await,
            HostMode::Interactive => host::run_interactive(self).await,
        }
    }

    /// Writes a message attributed to `group` to the sink for the current mode.
    pub fn log_message(&self, group: &WorkerGroup, message: impl Into<String>, severity: Severity) {
        self.shared
            .log(&Arc::from(group.name()), message.into(), severity);
    }

    /// Writes `message` once per managed group.
    pub fn log_message_broadcast(&self, message: &str, severity: Severity) {
        self.shared.broadcast(message, severity);
    }

    pub(crate) fn attach(&self, groups: Vec<Arc<WorkerGroup>>) -> Result<(), HostError> {
        if groups.is_empty() {
            return Err(HostError::NoGroups);
        }
        if self.shared.groups.get().is_some() {
            return Err(HostError::AlreadyConfigured { setting: "groups" });
        }
        if let Some(g) = groups.iter().find(|g| g.has_manager()) {
            return Err(HostError::ManagerAlreadySet {
                group: g.name().to_string(),
            });
        }

        let weak = Arc::downgrade(&self.shared);
        for g in &groups {
            g.set_manager(weak.clone())?;
        }
        self.shared
            .groups
            .set(groups)
            .map_err(|_| HostError::AlreadyConfigured { setting: "groups" })
    }

    pub(crate) fn install_trap(&self, trap: Arc<FatalTrap>) -> Result<(), HostError> {
        self.shared
            .trap
            .set(trap)
            .map_err(|_| HostError::AlreadyConfigured { setting: "fatal trap" })
    }

    pub(crate) fn downgrade(&self) -> Weak<ManagerShared> {
        Arc::downgrade(&self.shared)
    }
}

impl fmt::Debug for ControlManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlManager")
            .field("mode", &self.shared.mode)
            .field("groups", &self.groups().len())
            .field("telemetry", &self.shared.telemetry.get().map(TelemetrySink::key))
            .field("stopped", &self.shared.stop.is_cancelled())
            .finish()
    }
}

/// Builder for [`ControlManager`].
pub struct ControlManagerBuilder {
    config: HostConfig,
    event_log: Option<Arc<dyn LogSink>>,
    console: Option<Arc<dyn LogSink>>,
}

impl ControlManagerBuilder {
    fn new(config: HostConfig) -> Self {
        Self {
            config,
            event_log: None,
            console: None,
        }
    }

    /// Replaces the host log sink (default: [`EventLog`]).
    pub fn with_event_log(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.event_log = Some(sink);
        self
    }

    /// Replaces the console sink (default: [`ConsoleLog`] with the configured style).
    ///
    /// Only used in interactive mode with `redirect_log` set.
    pub fn with_console(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.console = Some(sink);
        self
    }

    /// Builds the manager, resolving the hosting mode.
    pub fn build(self) -> ControlManager {
        let mode = self.config.resolved_mode();
        let console = if self.config.redirect_log {
            let style = self.config.console.clone();
            Some(
                self.console
                    .unwrap_or_else(|| Arc::new(ConsoleLog::new(style)) as Arc<dyn LogSink>),
            )
        } else {
            None
        };

        let telemetry = OnceLock::new();
        if let Some(key) = self.config.telemetry_key() {
            let _ = telemetry.set(TelemetrySink::new(key));
        }

        ControlManager {
            shared: Arc::new(ManagerShared {
                mode,
                args: self.config.args,
                event_log: self
                    .event_log
                    .unwrap_or_else(|| Arc::new(EventLog::new()) as Arc<dyn LogSink>),
                console,
                telemetry,
                groups: OnceLock::new(),
                trap: OnceLock::new(),
                stop: CancellationToken::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Intervals;
    use crate::error::WorkError;
    use crate::testing::{wait_until_async, with_tracing, MemoryLog};
    use crate::worker::{WorkFn, Worker};
    use std::time::Duration;

    fn config(mode: HostMode) -> HostConfig {
        HostConfig {
            mode: Some(mode),
            ..HostConfig::default()
        }
    }

    fn sinks(mode: HostMode) -> (ControlManager, Arc<MemoryLog>, Arc<MemoryLog>) {
        let event = MemoryLog::new();
        let console = MemoryLog::new();
        let manager = ControlManager::builder(config(mode))
            .with_event_log(event.clone())
            .with_console(console.clone())
            .build();
        (manager, event, console)
    }

    fn ticking(name: &str) -> Worker {
        Worker::new(
            name,
            Intervals::from_millis(10, 10),
            WorkFn::arc(|_ctx: CancellationToken| async { Ok::<(), WorkError>(()) }),
        )
    }

    #[test]
    fn test_service_routes_to_event_log() {
        let (manager, event, console) = sinks(HostMode::Service);
        let group = WorkerGroup::new("feeds", vec![]).unwrap();
        manager.attach(vec![group.clone()]).unwrap();

        group.log_message("hello", Severity::Information);
        manager.log_message(&group, "direct", Severity::Warning);

        assert_eq!(event.messages(), vec!["hello", "direct"]);
        assert!(console.entries().is_empty());
        assert_eq!(&*event.entries()[1].source, "feeds");
    }

    #[test]
    fn test_interactive_routes_to_console() {
        let (manager, event, console) = sinks(HostMode::Interactive);
        let group = WorkerGroup::new("feeds", vec![]).unwrap();
        manager.attach(vec![group.clone()]).unwrap();

        group.log_message("hello", Severity::Information);

        assert_eq!(console.messages(), vec!["hello"]);
        assert!(event.entries().is_empty());
    }

    #[test]
    fn test_interactive_without_redirect_uses_event_log() {
        let event = MemoryLog::new();
        let manager = ControlManager::builder(HostConfig {
            redirect_log: false,
            ..config(HostMode::Interactive)
        })
        .with_event_log(event.clone())
        .build();
        let group = WorkerGroup::new("feeds", vec![]).unwrap();
        manager.attach(vec![group.clone()]).unwrap();

        group.log_message("hello", Severity::Error);
        assert_eq!(event.count(Severity::Error), 1);
    }

    fn telemetry_lines(logs: &str) -> Vec<&str> {
        logs.lines()
            .filter(|l| l.contains("workvisor::telemetry"))
            .collect()
    }

    #[test]
    fn test_service_mirrors_to_telemetry_with_key() {
        let (manager, event, _) = sinks(HostMode::Service);
        manager.set_instrumentation_key("key-1").unwrap();
        let group = WorkerGroup::new("feeds", vec![]).unwrap();
        manager.attach(vec![group.clone()]).unwrap();

        let logs = with_tracing(|| {
            group.log_message("quotes resumed", Severity::Information);
            manager.log_message(&group, "quotes lagging", Severity::Warning);
        });

        let lines = telemetry_lines(&logs);
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.contains("key-1")));
        assert!(lines[1].contains("quotes lagging"));
        assert_eq!(event.messages().len(), 2);
    }

    #[test]
    fn test_console_routing_skips_telemetry() {
        let (manager, _, console) = sinks(HostMode::Interactive);
        manager.set_instrumentation_key("key-1").unwrap();
        let group = WorkerGroup::new("feeds", vec![]).unwrap();
        manager.attach(vec![group.clone()]).unwrap();

        let logs = with_tracing(|| group.log_message("hello", Severity::Information));

        assert!(telemetry_lines(&logs).is_empty());
        assert_eq!(console.messages(), vec!["hello"]);
    }

    #[test]
    fn test_interactive_without_redirect_mirrors_to_telemetry() {
        let event = MemoryLog::new();
        let manager = ControlManager::builder(HostConfig {
            redirect_log: false,
            ..config(HostMode::Interactive)
        })
        .with_event_log(event.clone())
        .build();
        manager.set_instrumentation_key("key-1").unwrap();
        let group = WorkerGroup::new("feeds", vec![]).unwrap();
        manager.attach(vec![group.clone()]).unwrap();

        let logs = with_tracing(|| group.log_message("hello", Severity::Warning));

        let lines = telemetry_lines(&logs);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("key-1"));
        assert_eq!(event.count(Severity::Warning), 1);
    }

    #[test]
    fn test_broadcast_reaches_every_group() {
        let (manager, event, _) = sinks(HostMode::Service);
        let a = WorkerGroup::new("a", vec![]).unwrap();
        let b = WorkerGroup::new("b", vec![]).unwrap();
        manager.attach(vec![a, b]).unwrap();

        manager.log_message_broadcast("shutting down", Severity::Warning);

        let sources: Vec<String> = event.entries().iter().map(|e| e.source.to_string()).collect();
        assert_eq!(sources, vec!["a", "b"]);
        assert_eq!(event.count(Severity::Warning), 2);
    }

    #[test]
    fn test_broadcast_before_attach_uses_host_source() {
        let (manager, event, _) = sinks(HostMode::Service);
        manager.log_message_broadcast("early", Severity::Information);
        assert_eq!(&*event.entries()[0].source, HOST_SOURCE);
    }

    #[test]
    fn test_group_bound_to_one_manager() {
        let (first, _, _) = sinks(HostMode::Service);
        let (second, _, _) = sinks(HostMode::Service);
        let group = WorkerGroup::new("g", vec![]).unwrap();

        first.attach(vec![group.clone()]).unwrap();
        let err = second.attach(vec![group]).unwrap_err();
        assert_eq!(err.as_label(), "host_manager_already_set");
    }

    #[test]
    fn test_instrumentation_key_is_set_once() {
        let (manager, _, _) = sinks(HostMode::Service);
        manager.set_instrumentation_key("  ").unwrap();
        manager.set_instrumentation_key("key-1").unwrap();
        let err = manager.set_instrumentation_key("key-2").unwrap_err();
        assert_eq!(err.as_label(), "host_already_configured");
    }

    #[tokio::test]
    async fn test_run_without_groups_fails() {
        let (manager, _, _) = sinks(HostMode::Service);
        let err = manager.run(Vec::new()).await.unwrap_err();
        assert_eq!(err.as_label(), "host_no_groups");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_service_run_until_stop_token() {
        let (manager, event, _) = sinks(HostMode::Service);
        let group = WorkerGroup::new("feeds", vec![ticking("a"), ticking("b")]).unwrap();
        let stop = manager.stop_token();

        let host = tokio::spawn({
            let manager = manager.clone();
            let group = group.clone();
            async move { manager.run(vec![group]).await }
        });

        assert!(
            wait_until_async(Duration::from_secs(5), || {
                event
                    .messages()
                    .contains(&"Worker (b) started successfully.".to_string())
            })
            .await
        );
        stop.cancel();
        host.await.unwrap().unwrap();

        let messages = event.messages();
        assert!(messages.contains(&"Worker (a) stopped successfully.".to_string()));
        assert!(messages.contains(&"Worker (b) stopped successfully.".to_string()));
        assert_eq!(event.count(Severity::Error), 0);
    }
}
