//! Line-oriented input parsing and transcript rendering.

use interview_core::backend::InterviewStatus;
use interview_core::session_state::{InterviewSummary, RoundResult, ScoreGrade, Turn};
use std::fmt::Write;

pub const HELP: &str = "\
Commands:
  /start            begin a new interview
  /submit           submit the answer typed so far
  /continue         move on to the next question
  /end              finish the interview and show the summary
  /say, /hush       read the question aloud, or stop reading
  /mic              toggle speech input
  /camera [on|off]  toggle the camera preview
  /clear            discard the answer typed so far
  /status           show the backend's view of the interview
  /help             show this list
  /quit             leave
Any other line is added to your answer.";

const PREVIEW_CHARS: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Start,
    Submit,
    Continue,
    End,
    Narrate,
    Hush,
    Microphone,
    Camera(Option<bool>),
    Clear,
    Status,
    Help,
    Quit,
    Answer(String),
    Unknown(String),
}

impl Action {
    /// `None` for a blank line.
    pub fn parse(line: &str) -> Option<Action> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Some(Action::Answer(line.to_string()));
        };

        let mut words = command.split_whitespace();
        let action = match (words.next().unwrap_or_default(), words.next()) {
            ("start", None) => Action::Start,
            ("submit", None) => Action::Submit,
            ("continue" | "next", None) => Action::Continue,
            ("end", None) => Action::End,
            ("say", None) => Action::Narrate,
            ("hush", None) => Action::Hush,
            ("mic", None) => Action::Microphone,
            ("camera", None) => Action::Camera(None),
            ("camera", Some("on")) => Action::Camera(Some(true)),
            ("camera", Some("off")) => Action::Camera(Some(false)),
            ("clear", None) => Action::Clear,
            ("status", None) => Action::Status,
            ("help", None) => Action::Help,
            ("quit" | "exit", None) => Action::Quit,
            _ => Action::Unknown(line.to_string()),
        };
        Some(action)
    }
}

pub fn question(round_number: u32, question: &str) -> String {
    format!("\nQuestion {round_number}\n  {question}\n")
}

pub fn result(result: &RoundResult) -> String {
    format!(
        "\nScore: {}/5 ({})\nFeedback: {}\nType /continue for the next question.",
        result.score,
        ScoreGrade::from_score(result.score).label(),
        result.feedback
    )
}

fn history(out: &mut String, turns: &[Turn]) {
    for (i, turn) in turns.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {:>2}. [{}/5] {}",
            i + 1,
            turn.score,
            turn.question_preview(PREVIEW_CHARS)
        );
    }
}

pub fn summary(summary: &InterviewSummary) -> String {
    let mut out = format!(
        "\nInterview complete: {} round(s), total score {}, average {:.2}\n",
        summary.total_rounds, summary.total_score, summary.average_score
    );
    history(&mut out, &summary.history);
    out
}

pub fn status(status: &InterviewStatus) -> String {
    let mut out = match &status.current_question {
        Some(question) => format!(
            "Round {}, total score {}\nCurrent question: {question}\n",
            status.round_number, status.total_score
        ),
        None => "No interview in progress.\n".to_string(),
    };
    history(&mut out, &status.history);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_and_answers_are_told_apart() {
        assert_eq!(Action::parse("   "), None);
        assert_eq!(Action::parse("/start"), Some(Action::Start));
        assert_eq!(Action::parse(" /next "), Some(Action::Continue));
        assert_eq!(Action::parse("/camera off"), Some(Action::Camera(Some(false))));
        assert_eq!(Action::parse("/camera"), Some(Action::Camera(None)));
        assert_eq!(
            Action::parse("Gradient descent minimises loss."),
            Some(Action::Answer("Gradient descent minimises loss.".to_string()))
        );
        assert_eq!(
            Action::parse("/start now"),
            Some(Action::Unknown("/start now".to_string()))
        );
    }

    #[test]
    fn results_show_the_grade() {
        let rendered = result(&RoundResult {
            score: 3,
            feedback: "Mostly right.".to_string(),
        });
        assert!(rendered.contains("Score: 3/5 (Good)"));
        assert!(rendered.contains("Mostly right."));
    }

    #[test]
    fn summaries_list_truncated_questions() {
        let rendered = summary(&InterviewSummary {
            total_rounds: 1,
            total_score: 4.0,
            average_score: 4.0,
            history: vec![Turn {
                question: "x".repeat(80),
                answer: "a".to_string(),
                score: 4,
                feedback: "f".to_string(),
            }],
        });
        assert!(rendered.contains("1 round(s), total score 4, average 4.00"));
        assert!(rendered.contains(&format!("[4/5] {}...", "x".repeat(60))));
    }
}
