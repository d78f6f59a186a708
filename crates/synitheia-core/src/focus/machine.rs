//! Focus session state machine.
//!
//! The session does not own a thread or a timer. Every stimulus (one-second
//! ticks, visibility and display changes, button presses) arrives as a
//! [`FocusInput`] through [`FocusSession::handle`], which takes `&mut self`;
//! two transitions can therefore never interleave.
//!
//! Delayed work (starting the next break, the return grace window after a
//! break) lives in a single pending slot on the session's own clock. A new
//! schedule replaces the old one and every path that makes it moot clears it,
//! so a stale timeout can never fire a second penalty.
//!
//! ## Phases
//!
//! ```text
//! Setup -> FocusRunning <-> FocusInterrupted
//!              |   ^
//!              v   |
//!         BreakRunning -> BreakEndedAwaitingUser
//!              ^
//!              |
//!      AllSessionsComplete
//! ```
//!
//! Any penalty, reset or "finish" returns to `Setup`.

use std::sync::Arc;

use serde::Serialize;

use super::collaborators::{ExclusiveDisplay, HabitCheckIn, Notifier};
use super::presence::PresenceEnforcer;
use super::settings::FocusSettings;
use crate::events::{FocusEvent, FocusSnapshot, PenaltyReason};
use crate::ledger::RewardLedger;
use crate::service::UserContext;
use crate::timer::{Countdown, SessionType, Tick};

/// Length of one `Tick` on the session clock.
pub const TICK_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Setup,
    FocusRunning,
    /// The user left exclusive display; the exit confirmation is showing.
    FocusInterrupted,
    BreakRunning,
    /// Break time is over. Either the resume prompt is showing or the
    /// return grace window is running.
    BreakEndedAwaitingUser,
    AllSessionsComplete,
}

impl Phase {
    /// Phases that hold a prompt or a cooldown. The countdown is gated.
    fn blocks_timer(self) -> bool {
        matches!(
            self,
            Phase::FocusInterrupted | Phase::BreakEndedAwaitingUser | Phase::AllSessionsComplete
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Prompt {
    ExitConfirmation,
    Resume,
    ContinueSessions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusInput {
    /// One second elapsed.
    Tick,
    VisibilityChanged { visible: bool },
    DisplayChanged { active: bool },
    /// "Start focus session" on the setup screen.
    Start,
    ConfirmExit,
    CancelExit,
    ResumeWithExclusiveDisplay,
    ContinueWithoutExclusiveDisplay,
    ContinueSessions,
    FinishSessions,
    SelectSession(SessionType),
    StartTimer,
    PauseTimer,
    Reset,
    SelectHabit(Option<String>),
    SetDuration { session: SessionType, minutes: u32 },
    SetTotalSessions(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeoutAction {
    StartBreak,
    GraceExpired,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    due_at_ms: u64,
    action: TimeoutAction,
}

/// Everything outside the session it talks to.
pub struct Collaborators {
    pub notifier: Arc<dyn Notifier>,
    pub display: Arc<dyn ExclusiveDisplay>,
    pub habits: Arc<dyn HabitCheckIn>,
    pub ledger: RewardLedger,
}

pub struct FocusSession {
    settings: FocusSettings,
    user: UserContext,
    notifier: Arc<dyn Notifier>,
    habits: Arc<dyn HabitCheckIn>,
    ledger: RewardLedger,
    presence: PresenceEnforcer,
    timer: Countdown,

    phase: Phase,
    session_type: SessionType,
    pomodoro_count: u32,
    total_sessions: u32,
    breaks_taken: u32,
    /// The current interruption was already counted.
    interruption_handled: bool,
    /// Focus time left when a manual break was taken.
    remembered_focus_secs: u64,
    selected_habit: Option<String>,
    /// Break ended while hidden and the grace window is running.
    awaiting_return: bool,
    /// Exclusive display is expected to be on for the running focus.
    display_expected: bool,
    visible: bool,
    break_warning_sent: bool,

    pending: Option<Pending>,
    clock_ms: u64,
    hint: Option<String>,
    events: Vec<FocusEvent>,
}

impl FocusSession {
    pub fn new(settings: FocusSettings, user: UserContext, collaborators: Collaborators) -> Self {
        let presence = PresenceEnforcer::new(collaborators.display, settings.settle_window_ms);
        Self {
            timer: Countdown::new(settings.durations.focus_secs),
            total_sessions: settings.total_sessions.max(1),
            settings,
            user,
            notifier: collaborators.notifier,
            habits: collaborators.habits,
            ledger: collaborators.ledger,
            presence,
            phase: Phase::Setup,
            session_type: SessionType::Focus,
            pomodoro_count: 0,
            breaks_taken: 0,
            interruption_handled: false,
            remembered_focus_secs: 0,
            selected_habit: None,
            awaiting_return: false,
            display_expected: false,
            visible: true,
            break_warning_sent: false,
            pending: None,
            clock_ms: 0,
            hint: None,
            events: Vec::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session_type(&self) -> SessionType {
        self.session_type
    }

    pub fn time_left_secs(&self) -> u64 {
        self.timer.remaining_secs()
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }

    pub fn pomodoro_count(&self) -> u32 {
        self.pomodoro_count
    }

    pub fn total_sessions(&self) -> u32 {
        self.total_sessions
    }

    pub fn breaks_taken(&self) -> u32 {
        self.breaks_taken
    }

    pub fn selected_habit(&self) -> Option<&str> {
        self.selected_habit.as_deref()
    }

    pub fn settings(&self) -> &FocusSettings {
        &self.settings
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn prompt(&self) -> Option<Prompt> {
        match self.phase {
            Phase::FocusInterrupted => Some(Prompt::ExitConfirmation),
            Phase::BreakEndedAwaitingUser if !self.awaiting_return => Some(Prompt::Resume),
            Phase::AllSessionsComplete => Some(Prompt::ContinueSessions),
            _ => None,
        }
    }

    pub fn break_cooldown_active(&self) -> bool {
        self.awaiting_return
    }

    pub fn snapshot(&self) -> FocusSnapshot {
        FocusSnapshot {
            phase: self.phase,
            session_type: self.session_type,
            time_left_secs: self.timer.remaining_secs(),
            is_running: self.timer.is_running(),
            pomodoro_count: self.pomodoro_count,
            total_sessions: self.total_sessions,
            breaks_taken: self.breaks_taken,
            selected_habit_id: self.selected_habit.clone(),
            prompt: self.prompt(),
            break_cooldown_active: self.awaiting_return,
            hint: self.hint.clone(),
        }
    }

    /// Events queued since the last call.
    pub fn drain_events(&mut self) -> Vec<FocusEvent> {
        std::mem::take(&mut self.events)
    }

    // ── Reducer ──────────────────────────────────────────────────────

    pub fn handle(&mut self, input: FocusInput) {
        tracing::trace!(?input, phase = ?self.phase, "focus input");
        if input != FocusInput::Tick {
            self.hint = None;
        }

        match input {
            FocusInput::Tick => self.on_tick(),
            FocusInput::VisibilityChanged { visible } => self.on_visibility(visible),
            FocusInput::DisplayChanged { active } => self.on_display(active),
            FocusInput::Start => self.start(),
            FocusInput::ConfirmExit => self.confirm_exit(),
            FocusInput::CancelExit => self.cancel_exit(),
            FocusInput::ResumeWithExclusiveDisplay => self.resume(true),
            FocusInput::ContinueWithoutExclusiveDisplay => self.resume(false),
            FocusInput::ContinueSessions => self.continue_sessions(),
            FocusInput::FinishSessions => self.finish_sessions(),
            FocusInput::SelectSession(target) => self.select_session(target),
            FocusInput::StartTimer => self.start_timer(),
            FocusInput::PauseTimer => self.pause_timer(),
            FocusInput::Reset => self.full_reset(),
            FocusInput::SelectHabit(id) => {
                self.selected_habit = id.filter(|s| !s.trim().is_empty());
            }
            FocusInput::SetDuration { session, minutes } => self.set_duration(session, minutes),
            FocusInput::SetTotalSessions(n) => self.total_sessions = n.max(1),
        }

        self.timer.set_gate(self.phase.blocks_timer());
    }

    fn on_tick(&mut self) {
        self.clock_ms += TICK_MS;
        if self.presence.settle(self.clock_ms).is_some() {
            self.recheck_display();
        }

        match self.timer.tick() {
            Tick::Idle => {}
            Tick::Elapsed { remaining_secs } => self.maybe_warn_break_end(remaining_secs),
            Tick::Completed => self.on_countdown_completed(),
        }

        if let Some(p) = self.pending {
            if self.clock_ms >= p.due_at_ms {
                self.pending = None;
                self.run_timeout(p.action);
            }
        }
    }

    fn run_timeout(&mut self, action: TimeoutAction) {
        match action {
            TimeoutAction::StartBreak => {
                if self.phase == Phase::BreakRunning {
                    self.start_countdown();
                }
            }
            TimeoutAction::GraceExpired => {
                if self.phase == Phase::BreakEndedAwaitingUser && self.awaiting_return && !self.visible
                {
                    self.penalize(
                        PenaltyReason::DidNotReturnAfterBreak,
                        "Focus Violation!",
                        &format!(
                            "{} points deducted for not returning after break cooldown!",
                            self.settings.violation_penalty_points
                        ),
                    );
                    self.full_reset();
                }
            }
        }
    }

    // ── Environment ──────────────────────────────────────────────────

    fn on_visibility(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;

        if !visible {
            let violation = match self.phase {
                Phase::FocusRunning => {
                    self.session_type == SessionType::Focus && self.timer.is_running()
                }
                Phase::FocusInterrupted | Phase::AllSessionsComplete => true,
                Phase::BreakEndedAwaitingUser => !self.awaiting_return,
                Phase::Setup | Phase::BreakRunning => false,
            };
            if violation {
                self.penalize(
                    PenaltyReason::TabHidden,
                    "Focus Violation!",
                    &format!(
                        "{} points deducted for leaving focus mode (tab switched/hidden). Session reset.",
                        self.settings.violation_penalty_points
                    ),
                );
                self.breaks_taken += 1;
                self.full_reset();
            }
        } else if self.awaiting_return {
            self.cancel_pending();
            self.awaiting_return = false;
            tracing::debug!("user returned within grace window");
            self.events.push(FocusEvent::PromptShown {
                prompt: Prompt::Resume,
            });
        }
    }

    fn on_display(&mut self, active: bool) {
        if self.presence.attempt_in_progress(self.clock_ms) {
            tracing::debug!(active, "display change from own request ignored");
            return;
        }

        let focus_running = self.phase == Phase::FocusRunning
            && self.session_type == SessionType::Focus
            && self.timer.is_running();

        if !active {
            if focus_running && self.display_expected && !self.interruption_handled {
                self.timer.pause();
                self.phase = Phase::FocusInterrupted;
                tracing::info!("exclusive display left during focus");
                self.events.push(FocusEvent::PromptShown {
                    prompt: Prompt::ExitConfirmation,
                });
            }
            self.display_expected = false;
        } else if focus_running {
            self.display_expected = true;
            self.interruption_handled = false;
        } else if matches!(
            self.phase,
            Phase::Setup | Phase::BreakRunning | Phase::FocusRunning
        ) {
            self.presence.release(self.clock_ms);
        }
    }

    /// The display was expected on, but a change reported inside the settle
    /// window may have been the user leaving it.
    fn recheck_display(&mut self) {
        if self.display_expected && !self.presence.is_active() {
            tracing::debug!("exclusive display lost during own transition");
            self.on_display(false);
        }
    }

    // ── User actions ─────────────────────────────────────────────────

    fn start(&mut self) {
        if self.phase != Phase::Setup {
            tracing::debug!(phase = ?self.phase, "start ignored");
            return;
        }
        self.pomodoro_count = 0;
        self.session_type = SessionType::Focus;
        self.timer.reset(Some(self.settings.durations.focus_secs));
        self.phase = Phase::FocusRunning;
        self.enter_exclusive(
            "Fullscreen Request Failed",
            "Please click 'Go FullScreen' manually to enforce focus mode.",
        );
        self.start_countdown();
    }

    fn confirm_exit(&mut self) {
        if self.phase != Phase::FocusInterrupted {
            return;
        }
        self.events.push(FocusEvent::PromptResolved {
            prompt: Prompt::ExitConfirmation,
        });
        self.penalize(
            PenaltyReason::LeftExclusiveDisplay,
            "Focus Violation!",
            &format!(
                "{} points deducted for leaving fullscreen during focus mode!",
                self.settings.violation_penalty_points
            ),
        );
        self.breaks_taken += 1;
        self.interruption_handled = true;
        self.full_reset();
    }

    fn cancel_exit(&mut self) {
        if self.phase != Phase::FocusInterrupted {
            return;
        }
        self.events.push(FocusEvent::PromptResolved {
            prompt: Prompt::ExitConfirmation,
        });
        self.phase = Phase::FocusRunning;
        self.interruption_handled = false;
        self.enter_exclusive(
            "Fullscreen Reminder",
            "Click 'Go FullScreen' to re-enter fullscreen for focus mode.",
        );
        self.start_countdown();
    }

    fn resume(&mut self, with_display: bool) {
        if self.prompt() != Some(Prompt::Resume) {
            return;
        }
        self.cancel_pending();
        self.events.push(FocusEvent::PromptResolved {
            prompt: Prompt::Resume,
        });
        self.phase = Phase::FocusRunning;

        if with_display {
            self.enter_exclusive(
                "Fullscreen Request Failed",
                "Please click 'Go FullScreen' manually if you wish to enforce focus.",
            );
        } else {
            self.penalize(
                PenaltyReason::ContinuedWithoutExclusiveDisplay,
                "Focus Interruption!",
                &format!(
                    "{} points deducted for continuing focus mode outside of fullscreen. Stay focused!",
                    self.settings.violation_penalty_points
                ),
            );
            self.breaks_taken += 1;
            self.display_expected = false;
        }
        self.start_countdown();
    }

    fn continue_sessions(&mut self) {
        if self.phase != Phase::AllSessionsComplete {
            return;
        }
        self.events.push(FocusEvent::PromptResolved {
            prompt: Prompt::ContinueSessions,
        });
        self.total_sessions += 1;
        self.queue_next_break(self.settings.continue_delay_secs);
    }

    fn finish_sessions(&mut self) {
        if self.phase != Phase::AllSessionsComplete {
            return;
        }
        self.events.push(FocusEvent::PromptResolved {
            prompt: Prompt::ContinueSessions,
        });
        self.full_reset();
    }

    fn select_session(&mut self, target: SessionType) {
        if !matches!(self.phase, Phase::FocusRunning | Phase::BreakRunning) {
            tracing::debug!(phase = ?self.phase, "session switch ignored");
            return;
        }
        self.timer.pause();
        self.cancel_pending();

        if self.phase == Phase::FocusRunning
            && self.session_type == SessionType::Focus
            && target.is_break()
            && !self.interruption_handled
        {
            self.breaks_taken += 1;
            self.remembered_focus_secs = self.timer.remaining_secs();
            self.interruption_handled = true;
            self.events.push(FocusEvent::InterruptionRecorded {
                breaks_taken: self.breaks_taken,
            });
            self.notify(
                "Focus Mode Alert!",
                "You manually started a break. This counts as an interruption!",
            );
        }

        if target == SessionType::Focus {
            self.session_type = SessionType::Focus;
            self.restore_focus_time();
            self.breaks_taken = 0;
            self.interruption_handled = false;
            self.phase = Phase::FocusRunning;
        } else {
            self.session_type = target;
            self.timer
                .reset(Some(self.settings.durations.for_session(target)));
            self.phase = Phase::BreakRunning;
            self.release_display();
            self.start_countdown();
        }
        self.selected_habit = None;
    }

    fn start_timer(&mut self) {
        if !matches!(self.phase, Phase::FocusRunning | Phase::BreakRunning) {
            return;
        }
        if matches!(
            self.pending,
            Some(Pending {
                action: TimeoutAction::StartBreak,
                ..
            })
        ) {
            self.cancel_pending();
        }
        self.start_countdown();
    }

    fn pause_timer(&mut self) {
        if matches!(self.phase, Phase::FocusRunning | Phase::BreakRunning) {
            self.timer.pause();
        }
    }

    fn set_duration(&mut self, session: SessionType, minutes: u32) {
        let secs = self.settings.set_minutes(session, minutes);
        if self.session_type == session && !self.timer.is_running() && !self.phase.blocks_timer() {
            self.timer.set_duration(secs);
            self.timer.retarget(secs);
        }
    }

    // ── Countdown completion ─────────────────────────────────────────

    fn on_countdown_completed(&mut self) {
        self.release_display();
        self.interruption_handled = false;
        match self.session_type {
            SessionType::Focus => self.complete_focus(),
            SessionType::ShortBreak | SessionType::LongBreak => self.complete_break(),
        }
    }

    fn complete_focus(&mut self) {
        let points = self.settings.payout(self.breaks_taken);
        self.adjust_points(i64::from(points));
        self.breaks_taken = 0;
        self.pomodoro_count += 1;
        tracing::info!(points, pomodoros = self.pomodoro_count, "focus session complete");

        let mut body =
            format!("Great job! You earned {points} points for this focus session. Take a break.");
        if let Some(habit_id) = self.selected_habit.clone() {
            if let Some(name) = self.habits.habit_name(&habit_id) {
                let success = match self.habits.check_in(&habit_id) {
                    Ok(_) => {
                        body.push_str(&format!(" (Habit \"{name}\" Checked In!)"));
                        true
                    }
                    Err(e) => {
                        tracing::warn!(habit_id = %habit_id, "linked habit check-in failed: {e}");
                        body.push_str(&format!(" (Failed to check in \"{name}\")"));
                        false
                    }
                };
                self.events.push(FocusEvent::HabitCheckIn { habit_id, success });
            }
        }

        self.events.push(FocusEvent::SessionCompleted {
            session_type: SessionType::Focus,
            points_awarded: Some(points),
        });
        self.notify("Focus Session Complete!", &body);

        if self.pomodoro_count >= self.total_sessions {
            self.timer.pause();
            self.phase = Phase::AllSessionsComplete;
            self.events.push(FocusEvent::PromptShown {
                prompt: Prompt::ContinueSessions,
            });
        } else {
            self.queue_next_break(self.settings.break_start_delay_secs);
        }
    }

    fn complete_break(&mut self) {
        let finished = self.session_type;
        self.events.push(FocusEvent::SessionCompleted {
            session_type: finished,
            points_awarded: None,
        });

        self.session_type = SessionType::Focus;
        self.restore_focus_time();
        self.cancel_pending();
        self.phase = Phase::BreakEndedAwaitingUser;

        if self.visible {
            self.awaiting_return = false;
            self.events.push(FocusEvent::PromptShown {
                prompt: Prompt::Resume,
            });
            self.notify(
                "Break Over!",
                "Time to get back to focus. Please choose to resume.",
            );
        } else {
            let secs = self.settings.grace_window_secs;
            self.awaiting_return = true;
            self.schedule(secs, TimeoutAction::GraceExpired);
            self.events.push(FocusEvent::GraceWindowStarted { secs });
            self.notify(
                "Break Over!",
                &format!("You have {secs} seconds to return or you will be penalized!"),
            );
        }
    }

    fn maybe_warn_break_end(&mut self, remaining_secs: u64) {
        let warn_at = self.settings.break_warning_secs;
        if !self.session_type.is_break()
            || self.break_warning_sent
            || warn_at == 0
            || remaining_secs != warn_at
        {
            return;
        }
        self.break_warning_sent = true;
        self.events.push(FocusEvent::BreakEndingSoon {
            session_type: self.session_type,
            secs: warn_at,
        });
        self.notify(
            &format!("{} Ending Soon!", self.session_type.label()),
            &format!("You have {warn_at} seconds left. Get ready to focus!"),
        );
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Set up the break that follows the last completed focus and start it
    /// after `delay_secs`.
    fn queue_next_break(&mut self, delay_secs: u64) {
        let next = self.settings.break_after(self.pomodoro_count);
        self.session_type = next;
        self.timer
            .reset(Some(self.settings.durations.for_session(next)));
        self.phase = Phase::BreakRunning;
        self.schedule(delay_secs, TimeoutAction::StartBreak);
    }

    /// Focus countdown set to the time left before a manual break, or to a
    /// full focus session.
    fn restore_focus_time(&mut self) {
        self.timer
            .reset(Some(self.settings.durations.focus_secs));
        if self.remembered_focus_secs > 0 {
            self.timer.set_duration(self.remembered_focus_secs);
        }
        self.remembered_focus_secs = 0;
    }

    fn start_countdown(&mut self) {
        if self.timer.start() {
            if self.session_type.is_break() {
                self.break_warning_sent = false;
            }
            self.events.push(FocusEvent::SessionStarted {
                session_type: self.session_type,
                duration_secs: self.timer.remaining_secs(),
            });
        }
    }

    fn schedule(&mut self, delay_secs: u64, action: TimeoutAction) {
        if delay_secs == 0 {
            self.pending = None;
            self.run_timeout(action);
            return;
        }
        self.pending = Some(Pending {
            due_at_ms: self.clock_ms + delay_secs * 1_000,
            action,
        });
    }

    fn cancel_pending(&mut self) {
        if let Some(p) = self.pending.take() {
            tracing::debug!(action = ?p.action, "pending timeout cancelled");
        }
    }

    fn enter_exclusive(&mut self, title: &str, hint: &str) {
        match self.presence.request_exclusive(self.clock_ms) {
            Ok(()) => self.display_expected = true,
            Err(e) => {
                tracing::warn!("exclusive display unavailable: {e}");
                self.display_expected = false;
                self.hint = Some(hint.to_string());
                self.events.push(FocusEvent::Hint {
                    message: hint.to_string(),
                });
                self.notify(title, hint);
            }
        }
    }

    fn release_display(&mut self) {
        self.display_expected = false;
        self.presence.release(self.clock_ms);
    }

    fn full_reset(&mut self) {
        self.cancel_pending();
        self.timer
            .reset(Some(self.settings.durations.focus_secs));
        self.session_type = SessionType::Focus;
        self.pomodoro_count = 0;
        self.selected_habit = None;
        self.breaks_taken = 0;
        self.interruption_handled = false;
        self.remembered_focus_secs = 0;
        self.awaiting_return = false;
        self.break_warning_sent = false;
        self.release_display();
        self.phase = Phase::Setup;
        self.events.push(FocusEvent::Reset);
        tracing::debug!("focus session reset");
    }

    fn penalize(&mut self, reason: PenaltyReason, title: &str, body: &str) {
        let points = self.settings.violation_penalty_points;
        self.adjust_points(-i64::from(points));
        tracing::info!(?reason, points, "focus penalty");
        self.events.push(FocusEvent::PenaltyApplied { points, reason });
        self.notify(title, body);
    }

    fn adjust_points(&mut self, delta: i64) -> Option<u32> {
        match self.ledger.earn_or_penalize(self.user.user_id(), delta) {
            Ok(balance) => Some(balance),
            Err(e) => {
                tracing::warn!(delta, "could not update points: {e}");
                self.hint = Some(format!("Could not update points: {e}"));
                None
            }
        }
    }

    fn notify(&self, title: &str, body: &str) {
        if !self.settings.notifications_enabled {
            return;
        }
        if !self.notifier.request_permission() {
            tracing::warn!(title, "notification permission denied");
            return;
        }
        self.notifier.send(title, body, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Capability, CoreError, Result};
    use crate::storage::{CheckInProgress, Database};
    use crate::habit::CheckIn;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingNotifier {
        fn titles(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
        }

        fn last_body(&self) -> String {
            self.sent.lock().unwrap().last().map(|(_, b)| b.clone()).unwrap_or_default()
        }
    }

    impl Notifier for RecordingNotifier {
        fn request_permission(&self) -> bool {
            true
        }

        fn send(&self, title: &str, body: &str, _delay_minutes: u32) {
            self.sent.lock().unwrap().push((title.into(), body.into()));
        }
    }

    #[derive(Default)]
    struct ScriptedDisplay {
        active: AtomicBool,
        deny: AtomicBool,
        requests: AtomicU32,
    }

    impl ExclusiveDisplay for ScriptedDisplay {
        fn request(&self) -> Result<()> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if self.deny.load(Ordering::SeqCst) {
                return Err(CoreError::CapabilityDenied {
                    capability: Capability::ExclusiveDisplay,
                    reason: "not triggered by a user gesture".into(),
                });
            }
            self.active.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn exit(&self) -> Result<()> {
            self.active.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct FakeHabits {
        fail: AtomicBool,
        check_ins: AtomicU32,
    }

    impl HabitCheckIn for FakeHabits {
        fn habit_name(&self, habit_id: &str) -> Option<String> {
            (habit_id == "h1").then(|| "Read".to_string())
        }

        fn check_in(&self, habit_id: &str) -> Result<CheckInProgress> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(CoreError::precondition("already fully completed"));
            }
            let count = self.check_ins.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(CheckInProgress {
                check_in: CheckIn {
                    habit_id: habit_id.into(),
                    owner_id: "alice".into(),
                    date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    daily_completion_count: count,
                    reward_collected: false,
                },
                times_per_day: 5,
            })
        }
    }

    struct Harness {
        session: FocusSession,
        notifier: Arc<RecordingNotifier>,
        display: Arc<ScriptedDisplay>,
        habits: Arc<FakeHabits>,
        ledger: RewardLedger,
    }

    impl Harness {
        fn new() -> Self {
            let mut settings = FocusSettings::default();
            settings.set_minutes(SessionType::Focus, 1);
            settings.set_minutes(SessionType::ShortBreak, 1);
            settings.set_minutes(SessionType::LongBreak, 2);
            Self::with_settings(settings)
        }

        fn with_settings(settings: FocusSettings) -> Self {
            let notifier = Arc::new(RecordingNotifier::default());
            let display = Arc::new(ScriptedDisplay::default());
            let habits = Arc::new(FakeHabits::default());
            let ledger = RewardLedger::new(Arc::new(Database::open_memory().unwrap()));
            let session = FocusSession::new(
                settings,
                UserContext::new("alice"),
                Collaborators {
                    notifier: notifier.clone(),
                    display: display.clone(),
                    habits: habits.clone(),
                    ledger: ledger.clone(),
                },
            );
            Self {
                session,
                notifier,
                display,
                habits,
                ledger,
            }
        }

        fn ticks(&mut self, n: u32) {
            for _ in 0..n {
                self.session.handle(FocusInput::Tick);
            }
        }

        fn balance(&self) -> u32 {
            self.ledger.balance("alice").unwrap()
        }

        fn fund(&self, points: i64) {
            self.ledger.earn_or_penalize("alice", points).unwrap();
        }

        fn penalties(events: &[FocusEvent]) -> usize {
            events
                .iter()
                .filter(|e| matches!(e, FocusEvent::PenaltyApplied { .. }))
                .count()
        }

        /// Start and run the first focus session to completion, then wait
        /// out the delay until the break countdown runs.
        fn through_focus_into_break(&mut self) {
            self.session.handle(FocusInput::SetTotalSessions(2));
            self.session.handle(FocusInput::Start);
            self.ticks(60);
            assert_eq!(self.session.phase(), Phase::BreakRunning);
            self.ticks(2);
            assert!(self.session.is_running());
        }
    }

    #[test]
    fn start_runs_focus_and_requests_display() {
        let mut h = Harness::new();
        h.session.handle(FocusInput::Start);
        assert_eq!(h.session.phase(), Phase::FocusRunning);
        assert!(h.session.is_running());
        assert_eq!(h.session.time_left_secs(), 60);
        assert!(h.display.is_active());
        h.ticks(3);
        assert_eq!(h.session.time_left_secs(), 57);
    }

    #[test]
    fn display_denied_still_starts_with_hint() {
        let mut h = Harness::new();
        h.display.deny.store(true, Ordering::SeqCst);
        h.session.handle(FocusInput::Start);
        assert!(h.session.is_running());
        assert!(h.session.hint().is_some());
        assert!(h.notifier.titles().contains(&"Fullscreen Request Failed".to_string()));
    }

    #[test]
    fn tab_hidden_during_focus_penalizes_once_and_resets() {
        let mut h = Harness::new();
        h.fund(50);
        h.session.handle(FocusInput::Start);
        h.ticks(5);
        h.session.drain_events();

        h.session
            .handle(FocusInput::VisibilityChanged { visible: false });
        let events = h.session.drain_events();
        assert_eq!(Harness::penalties(&events), 1);
        assert_eq!(h.balance(), 30);
        assert_eq!(h.session.phase(), Phase::Setup);
        assert_eq!(h.session.pomodoro_count(), 0);
        assert!(!h.session.is_running());
        assert!(!h.display.is_active());

        h.ticks(30);
        assert_eq!(Harness::penalties(&h.session.drain_events()), 0);
        assert_eq!(h.balance(), 30);
    }

    #[test]
    fn own_display_transition_is_not_an_exit() {
        let mut h = Harness::new();
        h.session.handle(FocusInput::Start);
        h.session.handle(FocusInput::DisplayChanged { active: true });
        h.session.handle(FocusInput::DisplayChanged { active: false });
        assert_eq!(h.session.phase(), Phase::FocusRunning);
        assert!(h.session.is_running());
    }

    #[test]
    fn hidden_before_first_tick_penalizes_once() {
        let mut h = Harness::new();
        h.fund(50);
        h.session.handle(FocusInput::Start);
        h.session
            .handle(FocusInput::VisibilityChanged { visible: false });
        assert_eq!(Harness::penalties(&h.session.drain_events()), 1);
        assert_eq!(h.balance(), 30);
        assert_eq!(h.session.phase(), Phase::Setup);
        assert!(!h.session.is_running());

        h.ticks(30);
        assert_eq!(Harness::penalties(&h.session.drain_events()), 0);
        assert_eq!(h.session.time_left_secs(), 60);
        assert_eq!(h.balance(), 30);
    }

    #[test]
    fn hidden_right_after_cancelled_exit_penalizes() {
        let mut h = Harness::new();
        h.fund(50);
        h.session.handle(FocusInput::Start);
        h.ticks(2);
        h.display.active.store(false, Ordering::SeqCst);
        h.session.handle(FocusInput::DisplayChanged { active: false });
        h.session.handle(FocusInput::CancelExit);
        h.session.drain_events();

        h.session
            .handle(FocusInput::VisibilityChanged { visible: false });
        assert_eq!(Harness::penalties(&h.session.drain_events()), 1);
        assert_eq!(h.balance(), 30);
        assert_eq!(h.session.phase(), Phase::Setup);
    }

    #[test]
    fn exit_inside_settle_window_is_caught_on_next_tick() {
        let mut h = Harness::new();
        h.session.handle(FocusInput::Start);
        h.display.active.store(false, Ordering::SeqCst);
        h.session.handle(FocusInput::DisplayChanged { active: false });
        assert_eq!(h.session.phase(), Phase::FocusRunning);

        h.ticks(1);
        assert_eq!(h.session.phase(), Phase::FocusInterrupted);
        assert_eq!(h.session.prompt(), Some(Prompt::ExitConfirmation));
        let left = h.session.time_left_secs();
        h.ticks(5);
        assert_eq!(h.session.time_left_secs(), left);
    }

    #[test]
    fn manual_exit_shows_confirmation_and_freezes_time() {
        let mut h = Harness::new();
        h.session.handle(FocusInput::Start);
        h.ticks(2);
        h.display.active.store(false, Ordering::SeqCst);
        h.session.handle(FocusInput::DisplayChanged { active: false });
        assert_eq!(h.session.phase(), Phase::FocusInterrupted);
        assert_eq!(h.session.prompt(), Some(Prompt::ExitConfirmation));

        let left = h.session.time_left_secs();
        h.ticks(10);
        assert_eq!(h.session.time_left_secs(), left);
    }

    #[test]
    fn confirming_exit_penalizes_and_resets() {
        let mut h = Harness::new();
        h.fund(40);
        h.session.handle(FocusInput::Start);
        h.ticks(2);
        h.session.handle(FocusInput::DisplayChanged { active: false });
        h.session.handle(FocusInput::ConfirmExit);
        assert_eq!(h.balance(), 20);
        assert_eq!(h.session.phase(), Phase::Setup);

        // A second resolution of the dismissed prompt does nothing.
        h.session.handle(FocusInput::ConfirmExit);
        assert_eq!(h.balance(), 20);
    }

    #[test]
    fn cancelling_exit_resumes_with_display() {
        let mut h = Harness::new();
        h.session.handle(FocusInput::Start);
        h.ticks(2);
        h.display.active.store(false, Ordering::SeqCst);
        h.session.handle(FocusInput::DisplayChanged { active: false });
        h.session.handle(FocusInput::CancelExit);
        assert_eq!(h.session.phase(), Phase::FocusRunning);
        assert!(h.session.is_running());
        assert_eq!(h.display.requests.load(Ordering::SeqCst), 2);
        let left = h.session.time_left_secs();
        h.ticks(1);
        assert_eq!(h.session.time_left_secs(), left - 1);
    }

    #[test]
    fn hidden_during_exit_prompt_penalizes() {
        let mut h = Harness::new();
        h.fund(40);
        h.session.handle(FocusInput::Start);
        h.ticks(2);
        h.session.handle(FocusInput::DisplayChanged { active: false });
        h.session
            .handle(FocusInput::VisibilityChanged { visible: false });
        assert_eq!(h.balance(), 20);
        assert_eq!(h.session.phase(), Phase::Setup);
    }

    #[test]
    fn focus_completion_pays_and_queues_short_break() {
        let mut h = Harness::new();
        h.session.handle(FocusInput::SetTotalSessions(2));
        h.session.handle(FocusInput::Start);
        h.ticks(60);
        assert_eq!(h.balance(), 20);
        assert_eq!(h.session.pomodoro_count(), 1);
        assert_eq!(h.session.phase(), Phase::BreakRunning);
        assert_eq!(h.session.session_type(), SessionType::ShortBreak);
        assert!(!h.session.is_running());
        assert!(!h.display.is_active());

        h.ticks(1);
        assert!(!h.session.is_running());
        h.ticks(1);
        assert!(h.session.is_running());
        assert_eq!(h.session.time_left_secs(), 60);
    }

    #[test]
    fn linked_habit_is_checked_in_on_completion() {
        let mut h = Harness::new();
        h.session
            .handle(FocusInput::SelectHabit(Some("h1".into())));
        h.session.handle(FocusInput::Start);
        h.ticks(60);
        assert_eq!(h.habits.check_ins.load(Ordering::SeqCst), 1);
        assert!(h.notifier.last_body().contains("Habit \"Read\" Checked In!"));
    }

    #[test]
    fn failed_habit_check_in_is_reported_not_fatal() {
        let mut h = Harness::new();
        h.habits.fail.store(true, Ordering::SeqCst);
        h.session
            .handle(FocusInput::SelectHabit(Some("h1".into())));
        h.session.handle(FocusInput::Start);
        h.ticks(60);
        assert_eq!(h.balance(), 20);
        assert!(h.notifier.last_body().contains("Failed to check in \"Read\""));
        assert_eq!(h.session.phase(), Phase::AllSessionsComplete);
    }

    #[test]
    fn last_session_prompts_continue_or_finish() {
        let mut h = Harness::new();
        h.session.handle(FocusInput::Start);
        h.ticks(60);
        assert_eq!(h.session.prompt(), Some(Prompt::ContinueSessions));

        h.session.handle(FocusInput::ContinueSessions);
        assert_eq!(h.session.total_sessions(), 2);
        assert_eq!(h.session.phase(), Phase::BreakRunning);
        h.ticks(1);
        assert!(h.session.is_running());

        let mut h = Harness::new();
        h.session.handle(FocusInput::Start);
        h.ticks(60);
        h.session.handle(FocusInput::FinishSessions);
        assert_eq!(h.session.phase(), Phase::Setup);
        assert_eq!(h.session.pomodoro_count(), 0);
    }

    #[test]
    fn hidden_during_continue_prompt_penalizes() {
        let mut h = Harness::new();
        h.session.handle(FocusInput::Start);
        h.ticks(60);
        assert_eq!(h.balance(), 20);
        h.ticks(1);
        h.session
            .handle(FocusInput::VisibilityChanged { visible: false });
        assert_eq!(h.balance(), 0);
        assert_eq!(h.session.phase(), Phase::Setup);
    }

    #[test]
    fn every_nth_focus_earns_long_break() {
        let mut settings = FocusSettings::default();
        settings.set_minutes(SessionType::Focus, 1);
        settings.set_minutes(SessionType::ShortBreak, 1);
        settings.long_break_every = 2;
        settings.total_sessions = 3;
        let mut h = Harness::with_settings(settings);

        h.session.handle(FocusInput::Start);
        h.ticks(60 + 2 + 60);
        assert_eq!(h.session.prompt(), Some(Prompt::Resume));
        h.session.handle(FocusInput::ResumeWithExclusiveDisplay);
        h.ticks(60);
        assert_eq!(h.session.pomodoro_count(), 2);
        assert_eq!(h.session.session_type(), SessionType::LongBreak);
    }

    #[test]
    fn break_end_while_visible_shows_resume_prompt() {
        let mut h = Harness::new();
        h.through_focus_into_break();
        h.ticks(60);
        assert_eq!(h.session.phase(), Phase::BreakEndedAwaitingUser);
        assert_eq!(h.session.prompt(), Some(Prompt::Resume));
        assert_eq!(h.session.session_type(), SessionType::Focus);
        assert!(!h.session.is_running());

        h.session.handle(FocusInput::ResumeWithExclusiveDisplay);
        assert_eq!(h.session.phase(), Phase::FocusRunning);
        assert!(h.session.is_running());
        assert!(h.display.is_active());
        assert_eq!(h.session.time_left_secs(), 60);
    }

    #[test]
    fn return_within_grace_window_cancels_penalty() {
        let mut h = Harness::new();
        h.fund(100);
        h.through_focus_into_break();
        h.session
            .handle(FocusInput::VisibilityChanged { visible: false });
        h.ticks(60);
        assert!(h.session.break_cooldown_active());
        assert_eq!(h.session.prompt(), None);

        h.ticks(5);
        h.session
            .handle(FocusInput::VisibilityChanged { visible: true });
        assert_eq!(h.session.prompt(), Some(Prompt::Resume));
        assert!(!h.session.break_cooldown_active());

        h.ticks(20);
        assert_eq!(h.balance(), 120);
        assert_eq!(h.session.phase(), Phase::BreakEndedAwaitingUser);
    }

    #[test]
    fn grace_window_expiry_penalizes_exactly_once() {
        let mut h = Harness::new();
        h.fund(100);
        h.through_focus_into_break();
        h.session
            .handle(FocusInput::VisibilityChanged { visible: false });
        h.ticks(60);
        h.session.drain_events();

        // Still away: repeated hidden notifications are not new violations.
        h.session
            .handle(FocusInput::VisibilityChanged { visible: false });
        h.ticks(9);
        assert_eq!(h.balance(), 120);
        h.ticks(1);
        assert_eq!(h.balance(), 100);
        assert_eq!(h.session.phase(), Phase::Setup);

        h.ticks(30);
        assert_eq!(Harness::penalties(&h.session.drain_events()), 1);
        assert_eq!(h.balance(), 100);
    }

    #[test]
    fn continuing_without_display_costs_and_counts() {
        let mut h = Harness::new();
        h.fund(100);
        h.through_focus_into_break();
        h.ticks(60);
        h.session
            .handle(FocusInput::ContinueWithoutExclusiveDisplay);
        assert_eq!(h.balance(), 100);
        assert_eq!(h.session.breaks_taken(), 1);
        assert!(h.session.is_running());
        assert!(!h.display.is_active());
    }

    #[test]
    fn two_interruptions_pay_ten_points() {
        let mut h = Harness::new();
        h.fund(100);
        h.session.handle(FocusInput::Start);
        h.ticks(10);

        // Manual break: first interruption, focus time remembered.
        h.session
            .handle(FocusInput::SelectSession(SessionType::ShortBreak));
        assert_eq!(h.session.breaks_taken(), 1);
        assert!(h.session.is_running());
        h.ticks(60);
        assert_eq!(h.session.prompt(), Some(Prompt::Resume));
        assert_eq!(h.session.time_left_secs(), 50);

        // Second interruption, with a 20 point penalty.
        h.session
            .handle(FocusInput::ContinueWithoutExclusiveDisplay);
        assert_eq!(h.session.breaks_taken(), 2);
        assert_eq!(h.balance(), 80);

        h.session.drain_events();
        h.ticks(50);
        let events = h.session.drain_events();
        assert!(events.contains(&FocusEvent::SessionCompleted {
            session_type: SessionType::Focus,
            points_awarded: Some(10),
        }));
        assert_eq!(h.balance(), 90);
    }

    #[test]
    fn manual_switch_back_to_focus_restores_time_without_starting() {
        let mut h = Harness::new();
        h.session.handle(FocusInput::Start);
        h.ticks(15);
        h.session
            .handle(FocusInput::SelectSession(SessionType::LongBreak));
        assert_eq!(h.session.session_type(), SessionType::LongBreak);
        h.ticks(3);

        h.session
            .handle(FocusInput::SelectSession(SessionType::Focus));
        assert_eq!(h.session.session_type(), SessionType::Focus);
        assert_eq!(h.session.time_left_secs(), 45);
        assert!(!h.session.is_running());
        assert_eq!(h.session.breaks_taken(), 0);

        h.session.handle(FocusInput::StartTimer);
        assert!(h.session.is_running());
    }

    #[test]
    fn manual_break_clears_selected_habit() {
        let mut h = Harness::new();
        h.session
            .handle(FocusInput::SelectHabit(Some("h1".into())));
        h.session.handle(FocusInput::Start);
        h.session
            .handle(FocusInput::SelectSession(SessionType::ShortBreak));
        assert_eq!(h.session.selected_habit(), None);
        assert!(h.notifier.titles().contains(&"Focus Mode Alert!".to_string()));
    }

    #[test]
    fn break_warning_fires_once() {
        let mut h = Harness::new();
        h.through_focus_into_break();
        h.session.drain_events();
        h.ticks(50);
        let warnings = h
            .session
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, FocusEvent::BreakEndingSoon { .. }))
            .count();
        assert_eq!(warnings, 1);
        assert!(h
            .notifier
            .titles()
            .contains(&"Short Break Ending Soon!".to_string()));
    }

    #[test]
    fn duration_change_waits_for_running_session() {
        let mut h = Harness::new();
        h.session.handle(FocusInput::SetDuration {
            session: SessionType::Focus,
            minutes: 2,
        });
        assert_eq!(h.session.time_left_secs(), 120);

        h.session.handle(FocusInput::Start);
        assert_eq!(h.session.time_left_secs(), 120);
        h.ticks(1);
        h.session.handle(FocusInput::SetDuration {
            session: SessionType::Focus,
            minutes: 5,
        });
        assert_eq!(h.session.time_left_secs(), 179);
        assert_eq!(h.session.settings().durations.focus_secs, 300);
    }

    #[test]
    fn zero_total_sessions_is_clamped() {
        let mut h = Harness::new();
        h.session.handle(FocusInput::SetTotalSessions(0));
        assert_eq!(h.session.total_sessions(), 1);
    }

    #[test]
    fn reset_clears_everything() {
        let mut h = Harness::new();
        h.session
            .handle(FocusInput::SelectHabit(Some("h1".into())));
        h.session.handle(FocusInput::Start);
        h.ticks(5);
        h.session.handle(FocusInput::Reset);
        let snap = h.session.snapshot();
        assert_eq!(snap.phase, Phase::Setup);
        assert_eq!(snap.time_left_secs, 60);
        assert!(!snap.is_running);
        assert_eq!(snap.selected_habit_id, None);
        assert!(!h.display.is_active());
    }
}
