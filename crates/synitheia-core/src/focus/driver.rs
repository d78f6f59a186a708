//! Async host for a [`FocusSession`].
//!
//! One task owns the session. It feeds a [`FocusInput::Tick`] every period and
//! applies inputs from an mpsc channel in arrival order, so ticks and user
//! actions are serialized. After each input the queued events go out on a
//! broadcast channel and the latest snapshot on a watch channel.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::machine::{FocusInput, FocusSession};
use crate::error::{CoreError, Result};
use crate::events::{FocusEvent, FocusSnapshot};

const INPUT_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 256;

pub struct FocusDriver {
    inputs: mpsc::Sender<FocusInput>,
    snapshots: watch::Receiver<FocusSnapshot>,
    events: broadcast::Sender<FocusEvent>,
    task: JoinHandle<FocusSession>,
}

impl FocusDriver {
    /// Run `session` with one tick per second. Must be called inside a tokio
    /// runtime.
    pub fn spawn(session: FocusSession) -> Self {
        Self::spawn_with_period(session, Duration::from_secs(1))
    }

    pub fn spawn_with_period(session: FocusSession, period: Duration) -> Self {
        let (input_tx, input_rx) = mpsc::channel(INPUT_CAPACITY);
        let (snap_tx, snap_rx) = watch::channel(session.snapshot());
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let task = tokio::spawn(run(session, period, input_rx, snap_tx, event_tx.clone()));

        Self {
            inputs: input_tx,
            snapshots: snap_rx,
            events: event_tx,
            task,
        }
    }

    pub async fn send(&self, input: FocusInput) -> Result<()> {
        self.inputs
            .send(input)
            .await
            .map_err(|_| CoreError::Custom("focus session has stopped".into()))
    }

    /// A sender for inputs from other tasks or threads.
    pub fn sender(&self) -> mpsc::Sender<FocusInput> {
        self.inputs.clone()
    }

    pub fn snapshots(&self) -> watch::Receiver<FocusSnapshot> {
        self.snapshots.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FocusEvent> {
        self.events.subscribe()
    }

    /// Stop accepting input and return the session once the loop exits.
    /// Clones handed out by [`sender`](Self::sender) keep the loop alive
    /// until they are dropped.
    pub async fn shutdown(self) -> Result<FocusSession> {
        drop(self.inputs);
        self.task
            .await
            .map_err(|e| CoreError::Custom(format!("focus task failed: {e}")))
    }
}

async fn run(
    mut session: FocusSession,
    period: Duration,
    mut inputs: mpsc::Receiver<FocusInput>,
    snapshots: watch::Sender<FocusSnapshot>,
    events: broadcast::Sender<FocusEvent>,
) -> FocusSession {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        let input = tokio::select! {
            _ = ticker.tick() => FocusInput::Tick,
            received = inputs.recv() => match received {
                Some(input) => input,
                None => break,
            },
        };

        session.handle(input);
        for event in session.drain_events() {
            // No subscribers is fine.
            let _ = events.send(event);
        }
        snapshots.send_replace(session.snapshot());
    }

    tracing::debug!("focus driver stopped");
    session
}
