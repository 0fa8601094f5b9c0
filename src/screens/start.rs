// ============================================
// src/screens/start.rs
// スタート画面: メールアドレス入力と問題の取得
// ============================================

use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError};

use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    prelude::*,
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use tracing::{error, info};

use super::{Action, Route};
use crate::error::{QuizError, Result};
use crate::session::{QUESTION_COUNT, QuestionId, QuizSession};
use crate::source::{QuestionSource, TriviaQuestion, spawn_fetch};
use crate::store::SessionStore;

type FetchResult = Result<Vec<TriviaQuestion>>;

/// 最低限のチェックだけ（空でない・@ を含む）
pub fn is_valid_email(email: &str) -> bool {
    !email.is_empty() && email.contains('@')
}

#[derive(Default)]
pub struct StartScreen {
    email: String,
    /// 取得中なら Some
    pending: Option<Receiver<FetchResult>>,
    error: Option<String>,
    show_hint: bool,
}

impl StartScreen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    #[cfg(test)]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn handle_key(&mut self, key: KeyEvent, source: &Arc<dyn QuestionSource>) -> Action {
        match key.code {
            KeyCode::Esc => return Action::Quit,
            // 取得中は入力を受け付けない
            _ if self.is_loading() => {}
            KeyCode::Enter => self.submit(source),
            KeyCode::Backspace => {
                self.email.pop();
                self.show_hint = false;
            }
            KeyCode::Char(c) if !c.is_control() => {
                self.email.push(c);
                self.show_hint = false;
            }
            _ => {}
        }
        Action::None
    }

    /// 問題の取得を別スレッドで始める。二重には走らせない
    pub fn submit(&mut self, source: &Arc<dyn QuestionSource>) {
        if self.is_loading() {
            return;
        }
        let email = self.email.trim().to_string();
        if !is_valid_email(&email) {
            self.show_hint = true;
            return;
        }

        info!("starting quiz, fetching questions");
        self.email = email;
        self.error = None;
        self.show_hint = false;
        self.pending = Some(spawn_fetch(Arc::clone(source), QUESTION_COUNT));
    }

    /// 取得結果が届いていればセッションを作って1問目へ
    pub fn poll(&mut self, store: &SessionStore) -> Action {
        let Some(rx) = &self.pending else {
            return Action::None;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return Action::None,
            Err(TryRecvError::Disconnected) => {
                Err(QuizError::Payload("question fetch stopped unexpectedly".to_string()))
            }
        };
        self.pending = None;
        self.finish(result, store)
    }

    fn finish(&mut self, result: FetchResult, store: &SessionStore) -> Action {
        let seeded = result.and_then(|questions| {
            let session =
                QuizSession::from_questions(self.email.clone(), questions, Utc::now(), &mut rand::rng())?;
            store.save(&session)?;
            Ok(session)
        });

        match seeded {
            Ok(session) => {
                info!(items = session.items.len(), "quiz session created");
                Action::Navigate(Route::Question(QuestionId::FIRST))
            }
            Err(e) => {
                error!(error = %e, "failed to fetch questions");
                self.error = Some(format!("Could not load questions: {e}"));
                Action::None
            }
        }
    }

    /// 取得完了まで待つ（テスト用）
    #[cfg(test)]
    pub fn wait(&mut self, store: &SessionStore) -> Action {
        let Some(rx) = self.pending.take() else {
            return Action::None;
        };
        let result = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap_or_else(|_| Err(QuizError::Payload("timed out".to_string())));
        self.finish(result, store)
    }

    // --------------------------------------------------
    // 描画
    // --------------------------------------------------

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Quiz Wiz !");
        let inner = block.inner(area);
        f.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // [0] 空白
                Constraint::Length(1), // [1] タイトル
                Constraint::Length(3), // [2] 説明
                Constraint::Length(1), // [3] 空白
                Constraint::Length(3), // [4] メール入力欄
                Constraint::Length(1), // [5] 状態表示
                Constraint::Min(1),    // [6] 操作説明
            ])
            .split(inner);

        f.render_widget(
            Paragraph::new("Quiz Application")
                .style(Style::default().fg(Color::Cyan).bold())
                .centered(),
            chunks[1],
        );

        f.render_widget(
            Paragraph::new(format!(
                "Welcome! Enter your email address to start the {QUESTION_COUNT}-question quiz. \
                 You'll have 30 minutes to complete it."
            ))
            .wrap(Wrap { trim: true })
            .centered(),
            chunks[2],
        );

        let input = Paragraph::new(Line::from(vec![
            Span::raw(self.email.as_str()),
            Span::styled("_", Style::default().fg(Color::Gray).slow_blink()),
        ]))
        .block(Block::default().borders(Borders::ALL).title("Email Address"));
        f.render_widget(input, centered(chunks[4], 50));

        let status = if self.is_loading() {
            Line::from("Loading questions...").style(Style::default().fg(Color::Yellow))
        } else if let Some(error) = &self.error {
            Line::from(error.as_str()).style(Style::default().fg(Color::Red))
        } else if self.show_hint {
            Line::from("Please enter a valid email address.").style(Style::default().fg(Color::Red))
        } else {
            Line::default()
        };
        f.render_widget(Paragraph::new(status).centered(), chunks[5]);

        f.render_widget(
            Paragraph::new("[Enter] Start Quiz   [Esc] Quit")
                .style(Style::default().fg(Color::DarkGray))
                .centered(),
            chunks[6],
        );
    }
}

/// 横幅 `width` で中央寄せ
fn centered(area: Rect, width: u16) -> Rect {
    let width = width.min(area.width);
    Rect {
        x: area.x + (area.width - width) / 2,
        width,
        ..area
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::sample_questions;
    use crate::source::MockQuestionSource;
    use crate::store::tests::temp_store;
    use crossterm::event::KeyModifiers;

    fn source_returning(result: fn() -> FetchResult) -> Arc<dyn QuestionSource> {
        let mut mock = MockQuestionSource::new();
        mock.expect_fetch()
            .withf(|amount| *amount == QUESTION_COUNT)
            .times(1)
            .returning(move |_| result());
        Arc::new(mock)
    }

    fn type_email(screen: &mut StartScreen, email: &str, source: &Arc<dyn QuestionSource>) {
        for c in email.chars() {
            screen.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE), source);
        }
    }

    #[test]
    fn email_validation_is_minimal() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("@"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("plainaddress"));
    }

    #[test]
    fn invalid_email_does_not_fetch() {
        let mut mock = MockQuestionSource::new();
        mock.expect_fetch().never();
        let source: Arc<dyn QuestionSource> = Arc::new(mock);

        let mut screen = StartScreen::new();
        type_email(&mut screen, "nobody", &source);
        screen.submit(&source);
        assert!(!screen.is_loading());
    }

    #[test]
    fn successful_fetch_seeds_the_store() {
        let store = temp_store();
        let source = source_returning(|| Ok(sample_questions()));

        let mut screen = StartScreen::new();
        type_email(&mut screen, "a@b.com", &source);
        screen.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE), &source);
        assert!(screen.is_loading());

        let action = screen.wait(&store);
        assert_eq!(action, Action::Navigate(Route::Question(QuestionId::FIRST)));

        let session = store.load().unwrap().unwrap();
        assert_eq!(session.email, "a@b.com");
        assert_eq!(session.items.len(), QUESTION_COUNT);
        assert!(session.items.iter().all(|item| !item.attempted));
        assert!(!session.completed);
    }

    #[test]
    fn failed_fetch_stays_on_start_with_visible_error() {
        let store = temp_store();
        let source = source_returning(|| Err(QuizError::Payload("no questions in response".to_string())));

        let mut screen = StartScreen::new();
        type_email(&mut screen, "a@b.com", &source);
        screen.submit(&source);

        assert_eq!(screen.wait(&store), Action::None);
        assert!(screen.error().unwrap().contains("no questions"));
        assert!(!screen.is_loading());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn esc_quits() {
        let source: Arc<dyn QuestionSource> = Arc::new(MockQuestionSource::new());
        let mut screen = StartScreen::new();
        let action = screen.handle_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE), &source);
        assert_eq!(action, Action::Quit);
    }
}
