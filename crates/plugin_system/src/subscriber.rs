//! Routes world events to the plugins subscribed to them and forwards what
//! the plugins emit to the broadcast layer.

use crate::error::PluginSystemError;
use crate::handler::BoxError;
use crate::host::PluginHost;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use world_event_system::{migrate_legacy_stream, EmitEvent, Event};

/// Receives events emitted by plugins. Implemented by the broadcast layer.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit_plugin_event(&self, plugin: &str, event: EmitEvent) -> Result<(), BoxError>;
}

#[derive(Debug, Clone)]
struct Subscription {
    plugin: String,
    stream: String,
    /// Empty means every type
    event_types: HashSet<String>,
}

impl Subscription {
    fn matches(&self, stream: &str, event_type: &str) -> bool {
        self.stream == stream
            && (self.event_types.is_empty() || self.event_types.contains(event_type))
    }
}

/// Fans incoming events out to subscribed plugins.
///
/// Every matching delivery runs as its own task, bounded by the host's event
/// timeout. Failures are logged and never stop the dispatch loop.
pub struct Subscriber {
    host: Arc<PluginHost>,
    sink: Arc<dyn EventSink>,
    subscriptions: RwLock<Vec<Subscription>>,
    dispatch_loop: Mutex<Option<JoinHandle<()>>>,
}

impl Subscriber {
    pub fn new(host: Arc<PluginHost>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            host,
            sink,
            subscriptions: RwLock::new(Vec::new()),
            dispatch_loop: Mutex::new(None),
        }
    }

    /// Subscribes `plugin` to events on `stream`.
    ///
    /// # Arguments
    ///
    /// * `plugin` - Name the plugin is loaded under in the host
    /// * `stream` - Exact stream name; legacy `char:` names are migrated
    /// * `event_types` - Types to receive; empty means all
    pub fn subscribe<I, S>(&self, plugin: impl Into<String>, stream: &str, event_types: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let subscription = Subscription {
            plugin: plugin.into(),
            stream: migrate_legacy_stream(stream).into_owned(),
            event_types: event_types.into_iter().map(Into::into).collect(),
        };
        debug!(plugin = %subscription.plugin, stream = %subscription.stream, "subscribed");
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscription);
    }

    /// Drops every subscription held by `plugin`.
    pub fn unsubscribe(&self, plugin: &str) {
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|s| s.plugin != plugin);
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Starts consuming `events`. The loop ends once every sender is dropped
    /// and in-flight deliveries have finished.
    pub async fn start(self: &Arc<Self>, mut events: mpsc::Receiver<Event>) {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut in_flight = JoinSet::new();
            loop {
                tokio::select! {
                    received = events.recv() => match received {
                        Some(event) => this.dispatch(event, &mut in_flight),
                        None => break,
                    },
                    Some(finished) = in_flight.join_next(), if !in_flight.is_empty() => {
                        log_join_failure(finished);
                    }
                }
            }

            while let Some(finished) = in_flight.join_next().await {
                log_join_failure(finished);
            }
            info!("📭 Event subscriber stopped");
        });

        if let Some(previous) = self.dispatch_loop.lock().await.replace(handle) {
            warn!("Subscriber restarted while a previous loop was still registered");
            previous.abort();
        }
    }

    /// Waits for the dispatch loop and its in-flight deliveries to finish.
    pub async fn stop(&self) {
        let handle = self.dispatch_loop.lock().await.take();
        if let Some(handle) = handle {
            log_join_failure(handle.await);
        }
    }

    fn dispatch(&self, mut event: Event, in_flight: &mut JoinSet<()>) {
        event.stream = migrate_legacy_stream(&event.stream).into_owned();

        let targets: Vec<String> = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.matches(&event.stream, &event.event_type))
            .map(|s| s.plugin.clone())
            .collect();

        for plugin in targets {
            let host = Arc::clone(&self.host);
            let sink = Arc::clone(&self.sink);
            let event = event.clone();
            in_flight.spawn(async move { deliver(host, sink, plugin, event).await });
        }
    }
}

async fn deliver(host: Arc<PluginHost>, sink: Arc<dyn EventSink>, plugin: String, event: Event) {
    let emits = match host.deliver_event(&plugin, event.clone()).await {
        Ok(emits) => emits,
        Err(PluginSystemError::Timeout { timeout, .. }) => {
            warn!(
                plugin = %plugin,
                event_id = %event.id,
                stream = %event.stream,
                event_type = %event.event_type,
                ?timeout,
                "plugin event delivery timed out"
            );
            return;
        }
        Err(e) => {
            error!(
                plugin = %plugin,
                event_id = %event.id,
                stream = %event.stream,
                event_type = %event.event_type,
                error = %e,
                "failed to deliver event to plugin"
            );
            return;
        }
    };

    for emit in emits {
        let stream = emit.stream.clone();
        if let Err(e) = sink.emit_plugin_event(&plugin, emit).await {
            error!(plugin = %plugin, stream = %stream, error = %e, "failed to emit plugin event");
        }
    }
}

fn log_join_failure(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!("event delivery task panicked: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::host::HostOptions;
    use std::time::Duration;
    use world_event_system::ActorKind;

    #[derive(Default)]
    struct CollectingSink {
        received: std::sync::Mutex<Vec<(String, EmitEvent)>>,
    }

    impl CollectingSink {
        fn take(&self) -> Vec<(String, EmitEvent)> {
            let mut received = std::mem::take(&mut *self.received.lock().unwrap());
            received.sort_by(|a, b| a.0.cmp(&b.0));
            received
        }
    }

    #[async_trait]
    impl EventSink for CollectingSink {
        async fn emit_plugin_event(&self, plugin: &str, event: EmitEvent) -> Result<(), BoxError> {
            self.received.lock().unwrap().push((plugin.to_string(), event));
            Ok(())
        }
    }

    /// Replies with one event tagged with its own name.
    struct Tagger(&'static str);

    #[async_trait]
    impl Handler for Tagger {
        async fn handle_event(&self, event: Event) -> Result<Vec<EmitEvent>, BoxError> {
            Ok(vec![EmitEvent::new(event.stream, self.0, "{}")])
        }
    }

    struct Hang;

    #[async_trait]
    impl Handler for Hang {
        async fn handle_event(&self, _event: Event) -> Result<Vec<EmitEvent>, BoxError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    fn setup() -> (Arc<Subscriber>, Arc<CollectingSink>, Arc<PluginHost>) {
        let host = Arc::new(PluginHost::new(HostOptions {
            event_timeout: Duration::from_millis(100),
            ..HostOptions::default()
        }));
        let sink = Arc::new(CollectingSink::default());
        let subscriber = Arc::new(Subscriber::new(Arc::clone(&host), sink.clone()));
        (subscriber, sink, host)
    }

    fn event(stream: &str, event_type: &str) -> Event {
        Event::new(stream, event_type, ActorKind::Character, "c1", "{}")
    }

    #[tokio::test]
    async fn test_dispatch_by_stream_and_type() {
        let (subscriber, sink, host) = setup();
        host.register_local("all", Arc::new(Tagger("all"))).unwrap();
        host.register_local("says", Arc::new(Tagger("says"))).unwrap();
        host.register_local("elsewhere", Arc::new(Tagger("elsewhere"))).unwrap();

        subscriber.subscribe("all", "location:lobby", Vec::<String>::new());
        subscriber.subscribe("says", "location:lobby", ["say"]);
        subscriber.subscribe("elsewhere", "location:attic", ["say"]);

        let (tx, rx) = mpsc::channel(8);
        subscriber.start(rx).await;
        tx.send(event("location:lobby", "say")).await.unwrap();
        tx.send(event("location:lobby", "pose")).await.unwrap();
        drop(tx);
        subscriber.stop().await;

        let received = sink.take();
        let plugins: Vec<&str> = received.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(plugins, ["all", "all", "says"]);
        assert!(received.iter().all(|(_, e)| e.stream == "location:lobby"));
    }

    #[tokio::test]
    async fn test_legacy_streams_are_migrated() {
        let (subscriber, sink, host) = setup();
        host.register_local("p", Arc::new(Tagger("p"))).unwrap();
        subscriber.subscribe("p", "char:42", ["say"]);

        let (tx, rx) = mpsc::channel(8);
        subscriber.start(rx).await;
        tx.send(event("character:42", "say")).await.unwrap();
        tx.send(event("char:42", "say")).await.unwrap();
        drop(tx);
        subscriber.stop().await;

        let received = sink.take();
        assert_eq!(received.len(), 2);
        assert!(received.iter().all(|(_, e)| e.stream == "character:42"));
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_loop() {
        let (subscriber, sink, host) = setup();
        host.register_local("hang", Arc::new(Hang)).unwrap();
        host.register_local("ok", Arc::new(Tagger("ok"))).unwrap();
        subscriber.subscribe("hang", "global", Vec::<String>::new());
        subscriber.subscribe("missing", "global", Vec::<String>::new());
        subscriber.subscribe("ok", "global", Vec::<String>::new());

        let (tx, rx) = mpsc::channel(8);
        subscriber.start(rx).await;
        tx.send(event("global", "system")).await.unwrap();
        tx.send(event("global", "system")).await.unwrap();
        drop(tx);
        subscriber.stop().await;

        let received = sink.take();
        assert_eq!(received.len(), 2);
        assert!(received.iter().all(|(p, _)| p == "ok"));
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let (subscriber, _sink, _host) = setup();
        subscriber.subscribe("a", "global", ["say"]);
        subscriber.subscribe("a", "location:x", ["say"]);
        subscriber.subscribe("b", "global", ["say"]);
        assert_eq!(subscriber.subscription_count(), 3);

        subscriber.unsubscribe("a");
        assert_eq!(subscriber.subscription_count(), 1);
    }
}
