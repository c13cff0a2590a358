//! Reply handlers.
//!
//! Each handler is a pure function of the profile snapshot and sender data
//! and always produces a reply carrying the main menu keyboard.

use crate::channels::OutgoingResponse;
use crate::keyboard::{ReplyKeyboard, labels};
use crate::profile::UserProfile;

/// Shown in place of a missing goal.
pub const GOAL_NOT_SET: &str = "not set";

/// Where users are pointed for help.
pub const SUPPORT_CONTACT: &str = "support@example.com";

fn reply(text: String) -> OutgoingResponse {
    OutgoingResponse::text(text).with_keyboard(ReplyKeyboard::main_menu())
}

/// `/start` greeting.
pub fn start(display_name: &str) -> OutgoingResponse {
    reply(format!(
        "Hi, {display_name}! I'm a study companion for IT courses.\n\
         I can show your progress, help you set a goal and give recommendations.\n\n\
         Pick an item in the menu 👇"
    ))
}

/// `/about`.
pub fn about() -> OutgoingResponse {
    reply(
        "I help school and university students keep their studies on track:\n\
         — remind you of your goal\n\
         — suggest the next step\n\
         — answer quick questions about the service\n\n\
         The menu is below 👇"
            .to_string(),
    )
}

/// Progress view. Demo mode: only the weekly goal is known.
pub fn progress(profile: &UserProfile) -> OutgoingResponse {
    let goal = profile.week_goal.as_deref().unwrap_or(GOAL_NOT_SET);
    reply(format!(
        "{progress}\n\
         Running in demo mode (not connected to the course site).\n\
         Your goal for the week: {goal}\n\n\
         Want to set one? Tap «{week_goal}».",
        progress = labels::PROGRESS,
        week_goal = labels::WEEK_GOAL,
    ))
}

/// Opening prompt of the goal conversation.
pub fn goal_prompt() -> OutgoingResponse {
    reply(
        "🎯 Write your goal for the week in one sentence.\n\
         For example: «solve 20 Python tasks» or «complete 3 algorithms lessons».\n\
         Send /cancel to stop."
            .to_string(),
    )
}

/// Confirmation after the goal conversation stored an answer.
pub fn goal_saved(goal: Option<&str>) -> OutgoingResponse {
    let goal = goal.unwrap_or(GOAL_NOT_SET);
    reply(format!(
        "Got it ✅ Your goal for the week: {goal}\n\
         Want a plan for it? Tap «{recommendations}».",
        recommendations = labels::RECOMMENDATIONS,
    ))
}

/// Study recommendations for the stored goal.
///
/// Without a goal, the user is sent to set one first.
pub fn recommendations(profile: &UserProfile) -> OutgoingResponse {
    let Some(goal) = profile.week_goal.as_deref() else {
        return reply(format!(
            "{recommendations}\n\
             Set a goal for the week first — the recommendations will be more precise.\n\
             Tap «{week_goal}».",
            recommendations = labels::RECOMMENDATIONS,
            week_goal = labels::WEEK_GOAL,
        ));
    };

    reply(format!(
        "🧠 Recommendations for your goal\n\
         Goal: {goal}\n\n\
         1) Break the goal into 3–5 small steps.\n\
         2) Set aside 20–40 minutes a day (regular beats rare and long).\n\
         3) After each session, write down what you did and what is left.\n\
         4) If you get stuck, ask a question and attach an example or screenshot.\n\n\
         Tell me what you are studying right now (Python / algorithms / web, etc.)."
    ))
}

/// Static FAQ.
pub fn faq() -> OutgoingResponse {
    reply(format!(
        "{faq}\n\
         1) How do I use the service? — Set a goal and track your progress.\n\
         2) What if I don't understand a topic? — Write where exactly you are stuck.\n\
         3) How do I reach support? — Write to {SUPPORT_CONTACT}.\n\n\
         If your question is unusual, describe the problem in one message.",
        faq = labels::FAQ,
    ))
}

/// Acknowledgement for `/cancel`.
pub fn cancelled() -> OutgoingResponse {
    reply("Ok, cancelled.".to_string())
}

/// Reply for anything the router did not recognize.
pub fn fallback() -> OutgoingResponse {
    reply(
        "I didn't fully understand 😅\n\
         Pick an action in the menu or phrase your question more specifically.\n\
         For example: «how do I set a goal», «show progress», «give recommendations»."
            .to_string(),
    )
}
