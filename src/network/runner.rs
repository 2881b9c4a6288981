//! Network Runner
//!
//! One task per configured network. It keeps the transport connected,
//! feeds inbound events to the engine and drains the network's outbound
//! queue into the transport.
//!
//! ```text
//! connect ──► registering ──► registered ──► (closed) ──► wait 5s ──► connect
//! ```
//!
//! Registration completes on the server's welcome, after 100 inbound
//! messages, or after 30 seconds, whichever comes first. On completion the
//! configured channels are joined and scheduled.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use super::transport::{NetworkEvent, Transport, TransportError};
use crate::core::key::same_nick;
use crate::engine::GameEngine;
use crate::messaging::Outbound;

/// Pause between connection attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Registration is forced after this long.
pub const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Registration is forced after this many inbound messages.
pub const REGISTRATION_MESSAGE_LIMIT: usize = 100;

/// Registration progress of one connection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    inbound: usize,
    done: bool,
}

impl Registration {
    /// Whether channels have been joined on this connection.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Count an inbound event. Returns true exactly once, when the
    /// connection becomes registered.
    pub fn observe(&mut self, event: &NetworkEvent) -> bool {
        if self.done {
            return false;
        }
        self.inbound += 1;
        if matches!(event, NetworkEvent::Registered) || self.inbound >= REGISTRATION_MESSAGE_LIMIT {
            self.done = true;
            return true;
        }
        false
    }

    /// Complete registration on timeout. Returns true if it was pending.
    pub fn force(&mut self) -> bool {
        !std::mem::replace(&mut self.done, true)
    }
}

enum Step {
    Shutdown,
    RegistrationTimeout,
    Inbound(Result<Option<NetworkEvent>, TransportError>),
    Outbound(Outbound),
}

/// Drives one network connection.
pub struct NetworkRunner<T: Transport> {
    network: String,
    channels: Vec<String>,
    engine: Arc<GameEngine>,
    transport: T,
    outbound: mpsc::Receiver<Outbound>,
    shutdown: broadcast::Receiver<()>,
    joined: Vec<String>,
}

impl<T: Transport> NetworkRunner<T> {
    /// Runner for `network`, joining `channels` after each registration.
    pub fn new(
        network: &str,
        channels: Vec<String>,
        engine: Arc<GameEngine>,
        transport: T,
        outbound: mpsc::Receiver<Outbound>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            network: network.to_string(),
            channels,
            engine,
            transport,
            outbound,
            shutdown,
            joined: Vec::new(),
        }
    }

    /// Run until the shutdown signal.
    #[instrument(skip(self), fields(network = %self.network))]
    pub async fn run(mut self) {
        loop {
            if !self.connect().await {
                break;
            }
            info!("connected");

            let reconnect = self.session().await;
            self.leave_channels();
            if !reconnect {
                break;
            }
            warn!(delay = ?RECONNECT_DELAY, "connection lost, reconnecting");
            if !self.pause(RECONNECT_DELAY).await {
                break;
            }
        }
        info!("runner stopped");
    }

    /// Connect, retrying every [`RECONNECT_DELAY`]. Returns false on shutdown.
    async fn connect(&mut self) -> bool {
        loop {
            let result = tokio::select! {
                _ = self.shutdown.recv() => return false,
                result = self.transport.connect() => result,
            };
            match result {
                Ok(()) => return true,
                Err(e) => {
                    error!(error = %e, "connect failed");
                    if !self.pause(RECONNECT_DELAY).await {
                        return false;
                    }
                }
            }
        }
    }

    /// Wait unless shutdown arrives first. Returns false on shutdown.
    async fn pause(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.recv() => false,
            _ = sleep(delay) => true,
        }
    }

    /// Serve one connection. Returns false on shutdown, true to reconnect.
    async fn session(&mut self) -> bool {
        let mut registration = Registration::default();
        let deadline = sleep(REGISTRATION_TIMEOUT);
        tokio::pin!(deadline);

        loop {
            let registered = registration.is_done();
            let step = tokio::select! {
                _ = self.shutdown.recv() => Step::Shutdown,
                _ = &mut deadline, if !registered => Step::RegistrationTimeout,
                event = self.transport.next_event() => Step::Inbound(event),
                Some(message) = self.outbound.recv(), if registered => Step::Outbound(message),
            };

            match step {
                Step::Shutdown => return false,
                Step::RegistrationTimeout => {
                    if registration.force() {
                        warn!("registration timed out, joining anyway");
                        if self.join_channels().await.is_err() {
                            return true;
                        }
                    }
                }
                Step::Inbound(Ok(Some(event))) => {
                    if registration.observe(&event) {
                        info!("registered");
                        if self.join_channels().await.is_err() {
                            return true;
                        }
                    }
                    self.dispatch(event);
                }
                Step::Inbound(Ok(None)) => {
                    info!("server closed the connection");
                    return true;
                }
                Step::Inbound(Err(e)) => {
                    error!(error = %e, "read failed");
                    return true;
                }
                Step::Outbound(message) => {
                    if let Err(e) = self.transport.send(message).await {
                        error!(error = %e, "send failed");
                        return true;
                    }
                }
            }
        }
    }

    async fn join_channels(&mut self) -> Result<(), TransportError> {
        for channel in self.channels.clone() {
            if let Err(e) = self.transport.join(&channel).await {
                error!(channel = %channel, error = %e, "join failed");
                return Err(e);
            }
            self.engine.on_bot_join(&self.network, &channel);
            self.joined.push(channel);
        }
        Ok(())
    }

    fn leave_channels(&mut self) {
        for channel in self.joined.drain(..) {
            self.engine.on_bot_part(&self.network, &channel);
        }
    }

    fn dispatch(&mut self, event: NetworkEvent) {
        let network = self.network.as_str();
        let bot = self.engine.config().bot_nick.clone();
        match event {
            NetworkEvent::Message {
                channel,
                nick,
                authenticated,
                text,
            } => self.engine.handle_line(network, &channel, &nick, authenticated, &text),
            NetworkEvent::Join { channel, nick } => {
                if same_nick(&nick, &bot) {
                    self.engine.on_bot_join(network, &channel);
                } else {
                    self.engine.on_user_join(network, &channel, &nick);
                }
            }
            NetworkEvent::Part { channel, nick } => {
                if same_nick(&nick, &bot) {
                    self.engine.on_bot_part(network, &channel);
                    self.joined.retain(|c| !c.eq_ignore_ascii_case(&channel));
                } else {
                    self.engine.on_user_part(network, &channel, &nick);
                }
            }
            NetworkEvent::Quit { nick } => self.engine.on_user_quit(network, &nick),
            NetworkEvent::NickChange { old, new } => self.engine.on_nick_change(network, &old, &new),
            NetworkEvent::Names { channel, nicks } => self.engine.on_names(network, &channel, &nicks),
            NetworkEvent::Registered | NetworkEvent::Other => {
                debug!("event ignored");
            }
        }
    }
}

/// Tick the engine every `period` until shutdown. Late ticks are skipped,
/// not replayed.
pub async fn run_ticker(engine: Arc<GameEngine>, period: Duration, mut shutdown: broadcast::Receiver<()>) {
    let mut ticks = interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticks.tick() => {
                engine.tick();
            }
        }
    }
    debug!("ticker stopped");
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::*;
    use crate::config::GameConfig;
    use crate::core::clock::SystemClock;
    use crate::core::rng::GameRng;
    use crate::game::events::DUCK_ART;
    use crate::game::level::LevelTable;
    use crate::messaging::OutboundRouter;
    use crate::persistence::TableStore;

    /// Replays canned events, then idles.
    struct ScriptedTransport {
        events: VecDeque<NetworkEvent>,
        joined: Arc<Mutex<Vec<String>>>,
        sent: Arc<Mutex<Vec<Outbound>>>,
    }

    impl Transport for ScriptedTransport {
        async fn connect(&mut self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn next_event(&mut self) -> Result<Option<NetworkEvent>, TransportError> {
            match self.events.pop_front() {
                Some(event) => Ok(Some(event)),
                None => std::future::pending().await,
            }
        }

        async fn join(&mut self, channel: &str) -> Result<(), TransportError> {
            self.joined.lock().push(channel.to_string());
            Ok(())
        }

        async fn send(&mut self, message: Outbound) -> Result<(), TransportError> {
            self.sent.lock().push(message);
            Ok(())
        }
    }

    fn setup(events: Vec<NetworkEvent>) -> (
        Arc<GameEngine>,
        NetworkRunner<ScriptedTransport>,
        Arc<Mutex<Vec<String>>>,
        Arc<Mutex<Vec<Outbound>>>,
        broadcast::Sender<()>,
    ) {
        let mut config = GameConfig::default();
        config.networks.insert(
            "net".into(),
            crate::config::NetworkConfig {
                channels: vec!["#ducks".into()],
                owners: vec!["boss".into()],
                ..Default::default()
            },
        );
        let router = Arc::new(OutboundRouter::new());
        let outbound = router.attach("net");
        let engine = Arc::new(GameEngine::new(
            config,
            Arc::new(TableStore::new(LevelTable::default())),
            router,
            Arc::new(SystemClock),
            Box::new(GameRng::new(3)),
        ));
        let joined = Arc::new(Mutex::new(Vec::new()));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = ScriptedTransport {
            events: events.into(),
            joined: joined.clone(),
            sent: sent.clone(),
        };
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let runner = NetworkRunner::new(
            "net",
            vec!["#ducks".into()],
            engine.clone(),
            transport,
            outbound,
            shutdown_rx,
        );
        (engine, runner, joined, sent, shutdown_tx)
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..200 {
            if done() {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[test]
    fn test_registration_by_welcome_or_count() {
        let mut welcome = Registration::default();
        assert!(!welcome.observe(&NetworkEvent::Other));
        assert!(welcome.observe(&NetworkEvent::Registered));
        assert!(!welcome.observe(&NetworkEvent::Registered));

        let mut counted = Registration::default();
        for _ in 0..REGISTRATION_MESSAGE_LIMIT - 1 {
            assert!(!counted.observe(&NetworkEvent::Other));
        }
        assert!(counted.observe(&NetworkEvent::Other));
        assert!(counted.is_done());

        let mut forced = Registration::default();
        assert!(forced.force());
        assert!(!forced.force());
    }

    #[tokio::test]
    async fn test_runner_joins_and_relays() {
        let (engine, runner, joined, sent, shutdown) = setup(vec![
            NetworkEvent::Registered,
            NetworkEvent::Names {
                channel: "#ducks".into(),
                nicks: vec!["@DuckHunt".into(), "alice".into()],
            },
            NetworkEvent::Message {
                channel: "#ducks".into(),
                nick: "boss".into(),
                authenticated: true,
                text: "!spawngold".into(),
            },
        ]);
        let task = tokio::spawn(runner.run());

        wait_until(|| {
            sent.lock()
                .iter()
                .any(|m| m.text() == DUCK_ART)
        })
        .await;
        assert_eq!(joined.lock().clone(), vec!["#ducks".to_string()]);
        assert_eq!(engine.channels().len(), 1);

        shutdown.send(()).expect("runner listening");
        task.await.expect("runner finished");
        assert!(engine.channels().is_empty());
    }

    #[tokio::test]
    async fn test_message_limit_forces_registration() {
        let events = vec![NetworkEvent::Other; REGISTRATION_MESSAGE_LIMIT];
        let (engine, runner, joined, _sent, shutdown) = setup(events);
        let task = tokio::spawn(runner.run());

        wait_until(|| !joined.lock().is_empty()).await;
        assert_eq!(engine.channels().len(), 1);

        shutdown.send(()).expect("runner listening");
        task.await.expect("runner finished");
    }

    #[tokio::test]
    async fn test_ticker_stops_on_shutdown() {
        let (engine, _runner, _joined, _sent, shutdown) = setup(Vec::new());
        let task = tokio::spawn(run_ticker(engine, Duration::from_millis(5), shutdown.subscribe()));
        sleep(Duration::from_millis(20)).await;
        shutdown.send(()).expect("ticker listening");
        task.await.expect("ticker finished");
    }
}
