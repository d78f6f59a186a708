use rand::seq::SliceRandom;

use crate::timer::SessionType;

const FOCUS: &[&str] = &[
    "Deep work fuels great achievements.",
    "Stay sharp, stay focused.",
    "Every minute counts. Make it count for you.",
    "Distraction is the enemy of progress.",
    "You've got this!",
];

const SHORT_BREAK: &[&str] = &[
    "Breathe. Recharge. Reset.",
    "A quick pause makes you stronger.",
    "Stretch it out, you earned it.",
    "Ready for the next sprint?",
];

const LONG_BREAK: &[&str] = &[
    "Enjoy your well-deserved rest.",
    "Relax, reflect, re-energize.",
    "You're building momentum!",
];

const FALLBACK: &str = "Stay focused and productive!";

fn messages_for(session: SessionType) -> &'static [&'static str] {
    match session {
        SessionType::Focus => FOCUS,
        SessionType::ShortBreak => SHORT_BREAK,
        SessionType::LongBreak => LONG_BREAK,
    }
}

/// A random encouragement for the session on screen.
pub fn motivational_message(session: SessionType) -> &'static str {
    messages_for(session)
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(FALLBACK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_comes_from_the_session_list() {
        for session in [SessionType::Focus, SessionType::ShortBreak, SessionType::LongBreak] {
            let msg = motivational_message(session);
            assert!(messages_for(session).contains(&msg));
        }
    }
}
