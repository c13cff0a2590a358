//! Main menu: the reply-keyboard labels and the keyboard sent with every reply.

use serde::{Deserialize, Serialize};

/// Canonical menu labels. Incoming text is compared against these by exact
/// string equality.
pub mod labels {
    pub const PROGRESS: &str = "📊 My progress";
    pub const WEEK_GOAL: &str = "🎯 Goal for the week";
    pub const RECOMMENDATIONS: &str = "🧠 Recommendations";
    pub const FAQ: &str = "❓ FAQ / Support";
}

/// A single keyboard button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardButton {
    pub text: String,
}

/// Reply keyboard layout, serialized in the Bot API `ReplyKeyboardMarkup` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyKeyboard {
    #[serde(rename = "keyboard")]
    pub rows: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
}

impl ReplyKeyboard {
    /// Build a keyboard from rows of labels.
    pub fn from_rows<R, L>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = L>,
        L: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|label| KeyboardButton { text: label.into() })
                        .collect()
                })
                .collect(),
            resize_keyboard: true,
        }
    }

    /// The fixed two-row main menu.
    pub fn main_menu() -> Self {
        Self::from_rows([
            [labels::PROGRESS, labels::WEEK_GOAL],
            [labels::RECOMMENDATIONS, labels::FAQ],
        ])
    }

    /// All button labels, row by row.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(|b| b.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_menu_has_two_rows_of_two() {
        let kb = ReplyKeyboard::main_menu();
        assert_eq!(kb.rows.len(), 2);
        assert!(kb.rows.iter().all(|row| row.len() == 2));
        assert!(kb.resize_keyboard);
        assert_eq!(
            kb.labels().collect::<Vec<_>>(),
            vec![
                labels::PROGRESS,
                labels::WEEK_GOAL,
                labels::RECOMMENDATIONS,
                labels::FAQ
            ]
        );
    }

    #[test]
    fn serializes_as_reply_keyboard_markup() {
        let json = serde_json::to_value(ReplyKeyboard::main_menu()).unwrap();
        assert_eq!(json["resize_keyboard"], true);
        assert_eq!(json["keyboard"][0][0]["text"], labels::PROGRESS);
        assert_eq!(json["keyboard"][1][1]["text"], labels::FAQ);
    }
}
