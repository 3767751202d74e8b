//! Ad Session - signal bridge for one playback session
//!
//! Coordinates:
//! - Translating inbound events into state machine transitions
//! - Handing timer firings back to the machine
//! - Broadcasting the current ad state to UI and analytics consumers
//!
//! The session performs no ad logic of its own. One session per playback
//! surface; sessions share nothing, so a process can host many.

use crate::{
    machine::{AdStateMachine, SessionContext, Transition},
    surface::PlaybackSurface,
    timer::{Timer, TimerToken, TokioTimer},
    types::*,
    Result,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument};

/// Ad session bound to one playback surface
pub struct AdSession<S, T> {
    /// Unique session ID
    id: SessionId,
    /// Ad break state machine
    machine: AdStateMachine,
    /// Playback surface the machine acts on
    surface: S,
    /// Scheduler for deferred firings
    timer: T,
    /// State change broadcaster
    state_tx: watch::Sender<AdState>,
}

impl<S, T> AdSession<S, T>
where
    S: PlaybackSurface,
    T: Timer,
{
    /// Create a new ad session
    pub fn new(surface: S, timer: T, config: AdsConfig) -> Self {
        let machine = AdStateMachine::new(config);
        let (state_tx, _) = watch::channel(machine.state());
        let id = SessionId::new();

        info!(session_id = %id, "Ad session created");

        Self {
            id,
            machine,
            surface,
            timer,
            state_tx,
        }
    }

    /// Get session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get current ad state
    pub fn state(&self) -> AdState {
        self.machine.state()
    }

    /// Subscribe to ad state changes
    pub fn subscribe_state(&self) -> watch::Receiver<AdState> {
        self.state_tx.subscribe()
    }

    pub fn machine(&self) -> &AdStateMachine {
        &self.machine
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Mutable access for the host, e.g. when the ad provider swaps sources
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    /// Feed one signal into the machine
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn dispatch(&mut self, signal: Signal) -> Transition {
        let mut cx = SessionContext::new(&mut self.surface, &mut self.timer);
        let transition = self.machine.handle(signal, &mut cx);
        self.publish(transition);
        transition
    }

    /// Feed a signal by its event name
    pub fn dispatch_name(&mut self, name: &str) -> Result<Transition> {
        let signal: Signal = name.parse()?;
        Ok(self.dispatch(signal))
    }

    /// Hand a timer firing back to the machine
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn fire_timer(&mut self, token: TimerToken) -> Transition {
        let mut cx = SessionContext::new(&mut self.surface, &mut self.timer);
        let transition = self.machine.on_timer(token, &mut cx);
        self.publish(transition);
        transition
    }

    /// Tear the session down, returning the surface and timer
    pub fn into_parts(self) -> (S, T) {
        (self.surface, self.timer)
    }

    fn publish(&self, transition: Transition) {
        if transition.changed() {
            // send_replace stores the value even while nobody is subscribed
            self.state_tx.send_replace(transition.to);
        }
    }
}

/// Input for [`run`]
pub enum SessionCommand<S> {
    /// Inbound lifecycle signal
    Signal(Signal),
    /// Change applied to the surface by the host or ad provider
    Surface(Box<dyn FnOnce(&mut S) + Send>),
}

impl<S> SessionCommand<S> {
    pub fn surface(apply: impl FnOnce(&mut S) + Send + 'static) -> Self {
        SessionCommand::Surface(Box::new(apply))
    }
}

impl<S> std::fmt::Debug for SessionCommand<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionCommand::Signal(signal) => f.debug_tuple("Signal").field(signal).finish(),
            SessionCommand::Surface(_) => f.write_str("Surface(..)"),
        }
    }
}

/// Drive a session from a command channel and tokio timers
///
/// Commands and timer firings are handled one at a time; commands keep
/// their send order. Returns once the command channel is closed and no
/// time restoration is pending.
pub async fn run<S>(
    mut session: AdSession<S, TokioTimer>,
    mut commands: mpsc::Receiver<SessionCommand<S>>,
    mut firings: mpsc::UnboundedReceiver<TimerToken>,
) -> AdSession<S, TokioTimer>
where
    S: PlaybackSurface,
{
    let mut open = true;

    loop {
        if !open && !session.machine().is_restoring() {
            break;
        }

        tokio::select! {
            command = commands.recv(), if open => match command {
                Some(SessionCommand::Signal(signal)) => {
                    session.dispatch(signal);
                }
                Some(SessionCommand::Surface(apply)) => apply(session.surface_mut()),
                None => {
                    debug!(session_id = %session.id(), "Command channel closed");
                    open = false;
                }
            },
            Some(token) = firings.recv() => {
                session.fire_timer(token);
            }
            else => break,
        }
    }

    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SimulatedSurface;
    use crate::timer::ManualTimer;

    fn session() -> AdSession<SimulatedSurface, ManualTimer> {
        AdSession::new(
            SimulatedSurface::new("content.mp4"),
            ManualTimer::new(),
            AdsConfig::default(),
        )
    }

    #[test]
    fn test_session_creation() {
        let session = session();
        assert_eq!(session.state(), AdState::ContentPlayback);
        assert_eq!(*session.subscribe_state().borrow(), AdState::ContentPlayback);
    }

    #[test]
    fn test_state_is_published() {
        let mut session = session();
        let mut rx = session.subscribe_state();

        session.dispatch(Signal::AdsReady);
        assert!(!rx.has_changed().unwrap());

        session.dispatch(Signal::Play);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), AdState::PrerollWait);

        session.dispatch(Signal::AdStart);
        assert_eq!(*rx.borrow_and_update(), AdState::AdPlayback);
    }

    #[test]
    fn test_late_subscriber_sees_current_state() {
        let mut session = session();
        session.dispatch(Signal::AdStart);
        assert_eq!(*session.subscribe_state().borrow(), AdState::AdPlayback);
    }

    #[test]
    fn test_dispatch_by_name() {
        let mut session = session();
        let transition = session.dispatch_name("adstart").unwrap();
        assert_eq!(transition.to, AdState::AdPlayback);
        assert!(session.dispatch_name("adpause").is_err());
    }

    #[tokio::test]
    async fn test_run_restores_time_with_tokio_timers() {
        let (timer, firings) = TokioTimer::new();
        let config = AdsConfig {
            seek_retry_delay_ms: 1,
            ..Default::default()
        };
        let session = AdSession::new(SimulatedSurface::new("content.mp4"), timer, config);
        let (tx, rx) = mpsc::channel(32);

        let commands = vec![
            SessionCommand::Signal(Signal::AdsReady),
            SessionCommand::Signal(Signal::Play),
            SessionCommand::surface(|s: &mut SimulatedSurface| s.advance_to(100.0)),
            SessionCommand::Signal(Signal::AdStart),
            SessionCommand::surface(|s: &mut SimulatedSurface| {
                s.set_source(&MediaSource::new("ad.mp4"));
                s.set_seekable(Vec::new());
            }),
            SessionCommand::Signal(Signal::AdEnd),
            SessionCommand::Signal(Signal::LoadedMetadata),
            SessionCommand::surface(|s: &mut SimulatedSurface| {
                s.set_seekable(vec![TimeRange::new(0.0, 600.0)]);
            }),
        ];
        for command in commands {
            tx.send(command).await.unwrap();
        }
        drop(tx);

        let session = run(session, rx, firings).await;

        assert_eq!(session.state(), AdState::ContentPlayback);
        assert_eq!(session.surface().current_src().as_deref(), Some("content.mp4"));
        assert_eq!(session.surface().current_time(), 100.0);
        assert!(!session.surface().is_paused());
    }
}
