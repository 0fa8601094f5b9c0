// ============================================
// src/screens/results.rs
// 結果画面: 得点・所要時間・問題ごとの正誤
// ============================================

use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    prelude::*,
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use serde::Serialize;
use tracing::info;

use super::{Action, Route};
use crate::error::Result;
use crate::session::{AnswerOutcome, QUESTION_COUNT, QuizSession};
use crate::store::SessionStore;
use crate::timer::format_elapsed;

// --------------------------------------------------
// 集計結果（画面表示と `quizwiz results` で共用）
// --------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ResultsReport {
    pub email: String,
    pub score: usize,
    pub total: usize,
    pub percentage: u32,
    pub correct: usize,
    pub incorrect: usize,
    pub unanswered: usize,
    pub elapsed_secs: i64,
    pub elapsed: String,
    pub questions: Vec<QuestionReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionReport {
    pub id: usize,
    pub question: String,
    pub outcome: AnswerOutcome,
    pub your_answer: Option<String>,
    pub correct_answer: String,
    pub choices: Vec<String>,
}

impl ResultsReport {
    /// 所要時間は表示した時点までの経過時間（提出時刻では固定しない）
    pub fn new(session: &QuizSession, now: DateTime<Utc>) -> Self {
        let elapsed_secs = session.elapsed_secs(now);
        Self {
            email: session.email.clone(),
            score: session.score(),
            total: QUESTION_COUNT,
            percentage: session.percentage(),
            correct: session.count_outcome(AnswerOutcome::Correct),
            incorrect: session.count_outcome(AnswerOutcome::Incorrect),
            unanswered: session.count_outcome(AnswerOutcome::Unanswered),
            elapsed_secs,
            elapsed: format_elapsed(elapsed_secs),
            questions: session
                .items
                .iter()
                .map(|item| QuestionReport {
                    id: item.id,
                    question: item.question_text.clone(),
                    outcome: item.outcome(),
                    your_answer: item.user_answer.clone(),
                    correct_answer: item.correct_answer.clone(),
                    choices: item.choices.clone(),
                })
                .collect(),
        }
    }
}

pub fn outcome_label(outcome: AnswerOutcome) -> &'static str {
    match outcome {
        AnswerOutcome::Correct => "Correct",
        AnswerOutcome::Incorrect => "Incorrect",
        AnswerOutcome::Unanswered => "Not Answered",
    }
}

fn outcome_color(outcome: AnswerOutcome) -> Color {
    match outcome {
        AnswerOutcome::Correct => Color::Green,
        AnswerOutcome::Incorrect => Color::Red,
        AnswerOutcome::Unanswered => Color::Gray,
    }
}

// --------------------------------------------------
// 画面
// --------------------------------------------------

pub struct ResultsScreen {
    report: ResultsReport,
    scroll: u16,
}

impl ResultsScreen {
    /// 結果画面はセッションを読むだけで変更しない
    pub fn new(session: &QuizSession, now: DateTime<Utc>) -> Self {
        let report = ResultsReport::new(session, now);
        info!(score = report.score, elapsed = report.elapsed_secs, "results shown");
        Self { report, scroll: 0 }
    }

    #[cfg(test)]
    pub fn report(&self) -> &ResultsReport {
        &self.report
    }

    pub fn handle_key(&mut self, key: KeyEvent, store: &SessionStore) -> Result<Action> {
        let action = match key.code {
            KeyCode::Esc | KeyCode::Char('q') => Action::Quit,
            KeyCode::Up | KeyCode::Char('k') => {
                self.scroll = self.scroll.saturating_sub(1);
                Action::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.scroll = self.scroll.saturating_add(1);
                Action::None
            }
            KeyCode::PageUp => {
                self.scroll = self.scroll.saturating_sub(10);
                Action::None
            }
            KeyCode::PageDown => {
                self.scroll = self.scroll.saturating_add(10);
                Action::None
            }
            KeyCode::Char('r') => self.restart(store)?,
            _ => Action::None,
        };
        Ok(action)
    }

    /// ストアを空にして最初の画面へ
    pub fn restart(&self, store: &SessionStore) -> Result<Action> {
        store.clear()?;
        info!("session cleared, restarting");
        Ok(Action::Navigate(Route::Start))
    }

    // --------------------------------------------------
    // 描画
    // --------------------------------------------------

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Quiz Results");
        let inner = block.inner(area);
        f.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(5), // [0] サマリー
                Constraint::Min(3),    // [1] 問題ごとの結果
                Constraint::Length(1), // [2] 操作説明
            ])
            .split(inner);

        let r = &self.report;
        let summary = vec![
            Line::from(format!("{}   •   Completed in {}", r.email, r.elapsed)),
            Line::from(format!("{}/{}", r.score, r.total)).style(Style::default().bold()),
            Line::from(format!("{}% Score", r.percentage)),
            Line::from(vec![
                Span::styled(format!("{} Correct", r.correct), Style::default().fg(Color::Green)),
                Span::raw("   "),
                Span::styled(format!("{} Incorrect", r.incorrect), Style::default().fg(Color::Red)),
                Span::raw("   "),
                Span::styled(format!("{} Not Answered", r.unanswered), Style::default().fg(Color::Gray)),
            ]),
        ];
        f.render_widget(Paragraph::new(summary).centered(), chunks[0]);

        f.render_widget(
            Paragraph::new(self.detail_lines())
                .wrap(Wrap { trim: false })
                .scroll((self.scroll, 0))
                .block(Block::default().borders(Borders::TOP).title("Detailed Results")),
            chunks[1],
        );

        f.render_widget(
            Paragraph::new("[↑/↓] Scroll   [r] Take Quiz Again   [q] Quit")
                .style(Style::default().fg(Color::DarkGray))
                .centered(),
            chunks[2],
        );
    }

    fn detail_lines(&self) -> Vec<Line<'_>> {
        let mut lines = Vec::new();
        for q in &self.report.questions {
            lines.push(Line::from(vec![
                Span::styled(format!("Question {}  ", q.id), Style::default().bold()),
                Span::styled(
                    format!("[{}]", outcome_label(q.outcome)),
                    Style::default().fg(outcome_color(q.outcome)),
                ),
            ]));
            lines.push(Line::from(q.question.as_str()));

            for choice in &q.choices {
                let is_correct = *choice == q.correct_answer;
                let is_yours = q.your_answer.as_deref() == Some(choice.as_str());

                let style = if is_correct {
                    Style::default().fg(Color::Green)
                } else if is_yours {
                    Style::default().fg(Color::Red)
                } else {
                    Style::default()
                };
                let mut spans = vec![Span::styled(format!("  • {choice}"), style)];
                if is_correct {
                    spans.push(Span::styled("  (correct answer)", Style::default().fg(Color::Green)));
                }
                if is_yours {
                    spans.push(Span::styled("  (your answer)", style.italic()));
                }
                lines.push(Line::from(spans));
            }
            lines.push(Line::default());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::QuestionId;
    use crate::session::tests::sample_session;
    use crate::store::tests::temp_store;
    use chrono::Duration;
    use crossterm::event::KeyModifiers;

    #[test]
    fn report_classifies_every_question() {
        let start = Utc::now();
        let mut session = sample_session(start);
        let first = session.item(QuestionId::FIRST).correct_answer.clone();
        session.select_answer(QuestionId::FIRST, &first);
        session.select_answer(QuestionId::new(2).unwrap(), "wrong 2b");
        session.complete();

        let report = ResultsReport::new(&session, start + Duration::seconds(125));
        assert_eq!(report.score, 1);
        assert_eq!(report.percentage, 7);
        assert_eq!(report.elapsed, "2m 5s");
        assert_eq!((report.correct, report.incorrect, report.unanswered), (1, 1, 13));
        assert_eq!(report.questions[0].outcome, AnswerOutcome::Correct);
        assert_eq!(report.questions[1].outcome, AnswerOutcome::Incorrect);
        assert_eq!(report.questions[2].outcome, AnswerOutcome::Unanswered);
    }

    #[test]
    fn elapsed_keeps_growing_after_submission() {
        let start = Utc::now();
        let mut session = sample_session(start);
        session.complete();
        let early = ResultsReport::new(&session, start + Duration::seconds(60));
        let later = ResultsReport::new(&session, start + Duration::seconds(600));
        assert!(later.elapsed_secs > early.elapsed_secs);
    }

    #[test]
    fn restart_clears_the_store() {
        let store = temp_store();
        let mut session = sample_session(Utc::now());
        session.complete();
        store.save(&session).unwrap();

        let mut screen = ResultsScreen::new(&session, Utc::now());
        let action = screen
            .handle_key(KeyEvent::new(KeyCode::Char('r'), KeyModifiers::NONE), &store)
            .unwrap();
        assert_eq!(action, Action::Navigate(Route::Start));
        assert_eq!(store.load().unwrap(), None);
    }
}
