// ============================================
// src/screens/question.rs
// 問題画面: 1問ずつの回答・移動・残り時間・問題一覧
// ============================================

use std::time::Instant;

use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    prelude::*,
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
};
use tracing::{debug, info};

use super::{Action, Route};
use crate::error::Result;
use crate::session::{ItemStatus, QUESTION_COUNT, QuestionId, QuizSession};
use crate::store::SessionStore;
use crate::timer::{Countdown, format_clock};

/// 概要パネルの1行あたりの問題数
const OVERVIEW_COLUMNS: usize = 3;

pub struct QuestionScreen {
    session: QuizSession,
    current: QuestionId,
    /// カーソルがある選択肢
    highlighted: usize,
    countdown: Countdown,
    /// `g` で開くジャンプ入力。開いていなければ None
    jump_input: Option<String>,
}

impl QuestionScreen {
    /// 画面に入る: 訪問済みにして保存し、残り時間を計算し直す
    pub fn enter(mut session: QuizSession, id: QuestionId, store: &SessionStore) -> Result<Self> {
        session.mark_visited(id);
        store.save(&session)?;

        let highlighted = session.item(id).answer_index().unwrap_or(0);
        let countdown = Countdown::for_session(&session, Utc::now(), Instant::now());
        debug!(question = %id, remaining = countdown.remaining(), "question entered");

        Ok(Self {
            session,
            current: id,
            highlighted,
            countdown,
            jump_input: None,
        })
    }

    pub fn current(&self) -> QuestionId {
        self.current
    }

    #[cfg(test)]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    #[cfg(test)]
    pub fn remaining_secs(&self) -> u64 {
        self.countdown.remaining()
    }

    // --------------------------------------------------
    // 入力
    // --------------------------------------------------

    pub fn handle_key(&mut self, key: KeyEvent, store: &SessionStore) -> Result<Action> {
        if self.jump_input.is_some() {
            return Ok(self.handle_jump_key(key));
        }

        let action = match key.code {
            KeyCode::Esc | KeyCode::Char('q') => Action::Quit,
            KeyCode::Up | KeyCode::Char('k') => {
                self.highlighted = self.highlighted.saturating_sub(1);
                Action::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let last = self.session.item(self.current).choices.len().saturating_sub(1);
                self.highlighted = (self.highlighted + 1).min(last);
                Action::None
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                self.select(self.highlighted, store)?;
                Action::None
            }
            KeyCode::Char(c @ '1'..='9') => {
                if let Some(digit) = c.to_digit(10) {
                    self.select(digit as usize - 1, store)?;
                }
                Action::None
            }
            KeyCode::Left | KeyCode::Char('h') => self.previous(),
            KeyCode::Right | KeyCode::Char('l') => self.next(store)?,
            KeyCode::Char('g') => {
                self.jump_input = Some(String::new());
                Action::None
            }
            KeyCode::Char('s') => self.submit(store)?,
            _ => Action::None,
        };
        Ok(action)
    }

    fn handle_jump_key(&mut self, key: KeyEvent) -> Action {
        let Some(input) = self.jump_input.as_mut() else {
            return Action::None;
        };
        match key.code {
            KeyCode::Esc => self.jump_input = None,
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Char(c) if c.is_ascii_digit() && input.len() < 2 => input.push(c),
            KeyCode::Enter => {
                // 範囲外や空の入力は無視して入力欄を閉じる
                let target = input.parse::<usize>().ok().and_then(QuestionId::new);
                self.jump_input = None;
                if let Some(id) = target {
                    return self.jump_to(id);
                }
            }
            _ => {}
        }
        Action::None
    }

    /// 回答を選ぶとすぐに保存する
    pub fn select(&mut self, choice: usize, store: &SessionStore) -> Result<()> {
        let Some(answer) = self.session.item(self.current).choices.get(choice).cloned() else {
            return Ok(());
        };
        self.highlighted = choice;
        if self.session.select_answer(self.current, &answer) {
            store.save(&self.session)?;
            debug!(question = %self.current, choice, "answer selected");
        }
        Ok(())
    }

    /// 1問目では何もしない
    pub fn previous(&self) -> Action {
        self.current
            .prev()
            .map_or(Action::None, |id| Action::Navigate(Route::Question(id)))
    }

    /// 最後の問題で「次へ」を押すと提出になる
    pub fn next(&mut self, store: &SessionStore) -> Result<Action> {
        match self.current.next() {
            Some(id) => Ok(Action::Navigate(Route::Question(id))),
            None => self.submit(store),
        }
    }

    /// 回答状況に関係なくどの問題にも移動できる
    pub fn jump_to(&self, id: QuestionId) -> Action {
        Action::Navigate(Route::Question(id))
    }

    pub fn submit(&mut self, store: &SessionStore) -> Result<Action> {
        self.session.complete();
        store.save(&self.session)?;
        info!(
            attempted = self.session.attempted_count(),
            remaining = self.countdown.remaining(),
            "quiz submitted"
        );
        Ok(Action::Navigate(Route::Results))
    }

    /// 時間切れになったら一度だけ提出する
    pub fn tick(&mut self, at: Instant, store: &SessionStore) -> Result<Action> {
        if self.countdown.tick(at) {
            info!(question = %self.current, "time is up");
            return self.submit(store);
        }
        Ok(Action::None)
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
                Constraint::Length(1), // [0] 状況 + 残り時間
                Constraint::Length(1), // [1] 進捗ゲージ
                Constraint::Length(1), // [2] 空白
                Constraint::Min(8),    // [3] 一覧 + 問題
                Constraint::Length(1), // [4] 操作説明 / ジャンプ入力
            ])
            .split(inner);

        self.render_header(f, chunks[0], chunks[1]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(22), Constraint::Min(30)])
            .split(chunks[3]);

        f.render_widget(
            Paragraph::new(self.overview_lines())
                .block(Block::default().borders(Borders::ALL).title("Questions")),
            body[0],
        );
        f.render_widget(
            Paragraph::new(self.question_lines())
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::ALL).title(format!("Question {}", self.current))),
            body[1],
        );

        f.render_widget(self.footer(), chunks[4]);
    }

    fn render_header(&self, f: &mut Frame, status_area: Rect, gauge_area: Rect) {
        let halves = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(10), Constraint::Length(14)])
            .split(status_area);

        let status = format!(
            "Question {} of {} • {} attempted",
            self.current,
            QUESTION_COUNT,
            self.session.attempted_count()
        );
        f.render_widget(Paragraph::new(status), halves[0]);

        let remaining = self.countdown.remaining();
        // 残り5分を切ったら点滅
        let clock_style = if remaining < 5 * 60 {
            Style::default().fg(Color::Red).bold().slow_blink()
        } else {
            Style::default().fg(Color::Red).bold()
        };
        f.render_widget(
            Paragraph::new(format!("⏱ {}", format_clock(remaining)))
                .style(clock_style)
                .right_aligned(),
            halves[1],
        );

        let ratio = self.current.get() as f64 / QUESTION_COUNT as f64;
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(Color::Cyan).bg(Color::Black))
            .ratio(ratio)
            .label(format!("{} / {}", self.current, QUESTION_COUNT));
        f.render_widget(gauge, gauge_area);
    }

    /// 3列の問題一覧と凡例
    fn overview_lines(&self) -> Vec<Line<'static>> {
        let ids: Vec<QuestionId> = QuestionId::all().collect();
        let mut lines = Vec::new();

        for row in ids.chunks(OVERVIEW_COLUMNS) {
            let mut spans = Vec::new();
            for &id in row {
                let label = if id == self.current {
                    format!("[{:>2}]", id.get())
                } else {
                    format!(" {:>2} ", id.get())
                };
                spans.push(Span::styled(label, status_style(self.session.item(id).status())));
                spans.push(Span::raw(" "));
            }
            lines.push(Line::from(spans));
        }

        lines.push(Line::default());
        for (status, text) in [
            (ItemStatus::Attempted, "Attempted"),
            (ItemStatus::Visited, "Visited"),
            (ItemStatus::NotVisited, "Not visited"),
        ] {
            lines.push(Line::from(vec![
                Span::styled("  ", status_style(status)),
                Span::raw(format!(" {text}")),
            ]));
        }
        lines
    }

    fn question_lines(&self) -> Vec<Line<'_>> {
        let item = self.session.item(self.current);
        let mut lines = vec![
            Line::from(item.question_text.as_str()).style(Style::default().bold()),
            Line::default(),
        ];

        for (i, choice) in item.choices.iter().enumerate() {
            let selected = item.user_answer.as_deref() == Some(choice.as_str());
            let marker = if selected { "(●)" } else { "( )" };
            let cursor = if i == self.highlighted { "›" } else { " " };

            let mut style = Style::default();
            if selected {
                style = style.fg(Color::Green);
            }
            if i == self.highlighted {
                style = style.add_modifier(Modifier::BOLD);
            }
            lines.push(Line::from(vec![
                Span::raw(format!("{cursor} {}. ", i + 1)),
                Span::styled(format!("{marker} {choice}"), style),
            ]));
        }
        lines
    }

    fn footer(&self) -> Paragraph<'_> {
        if let Some(input) = &self.jump_input {
            return Paragraph::new(format!(
                "Jump to question (1-{QUESTION_COUNT}): {input}_   [Enter] Go   [Esc] Cancel"
            ))
            .style(Style::default().fg(Color::Yellow));
        }

        let next = if self.current == QuestionId::LAST {
            "[→] Submit"
        } else {
            "[→] Next"
        };
        Paragraph::new(format!(
            "[←] Previous   {next}   [1-4/Enter] Answer   [g] Jump   [s] Submit Quiz   [q] Quit"
        ))
        .style(Style::default().fg(Color::DarkGray))
    }
}

fn status_style(status: ItemStatus) -> Style {
    match status {
        ItemStatus::Attempted => Style::default().fg(Color::Black).bg(Color::Green),
        ItemStatus::Visited => Style::default().fg(Color::Black).bg(Color::Yellow),
        ItemStatus::NotVisited => Style::default().fg(Color::Gray).bg(Color::DarkGray),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::sample_session;
    use crate::store::tests::temp_store;
    use chrono::Duration;
    use crossterm::event::KeyModifiers;

    fn press(screen: &mut QuestionScreen, code: KeyCode, store: &SessionStore) -> Action {
        screen.handle_key(KeyEvent::new(code, KeyModifiers::NONE), store).unwrap()
    }

    fn enter_at(n: usize, store: &SessionStore) -> QuestionScreen {
        let session = sample_session(Utc::now());
        QuestionScreen::enter(session, QuestionId::new(n).unwrap(), store).unwrap()
    }

    #[test]
    fn entering_marks_visited_and_persists() {
        let store = temp_store();
        let screen = enter_at(3, &store);
        assert!(screen.session().items[2].visited);

        let stored = store.load().unwrap().unwrap();
        assert!(stored.items[2].visited);
        assert!(!stored.items[3].visited);
        assert!(screen.remaining_secs() > 1790);
    }

    #[test]
    fn selecting_persists_immediately() {
        let store = temp_store();
        let mut screen = enter_at(1, &store);
        press(&mut screen, KeyCode::Char('2'), &store);

        let stored = store.load().unwrap().unwrap();
        let item = &stored.items[0];
        assert!(item.attempted);
        assert_eq!(item.user_answer.as_deref(), Some(item.choices[1].as_str()));
    }

    #[test]
    fn selecting_the_same_answer_twice_changes_nothing() {
        let store = temp_store();
        let mut screen = enter_at(1, &store);
        press(&mut screen, KeyCode::Char('3'), &store);
        let once = store.load().unwrap().unwrap();
        press(&mut screen, KeyCode::Char('3'), &store);
        assert_eq!(store.load().unwrap().unwrap(), once);
    }

    #[test]
    fn highlight_and_enter_select_a_choice() {
        let store = temp_store();
        let mut screen = enter_at(1, &store);
        press(&mut screen, KeyCode::Down, &store);
        press(&mut screen, KeyCode::Down, &store);
        press(&mut screen, KeyCode::Enter, &store);
        let item = &screen.session().items[0];
        assert_eq!(item.user_answer.as_deref(), Some(item.choices[2].as_str()));
    }

    #[test]
    fn out_of_range_choice_is_ignored() {
        let store = temp_store();
        let mut screen = enter_at(1, &store);
        press(&mut screen, KeyCode::Char('9'), &store);
        assert!(!screen.session().items[0].attempted);
    }

    #[test]
    fn previous_and_next_are_clamped() {
        let store = temp_store();
        let mut screen = enter_at(1, &store);
        assert_eq!(press(&mut screen, KeyCode::Left, &store), Action::None);
        assert_eq!(
            press(&mut screen, KeyCode::Right, &store),
            Action::Navigate(Route::Question(QuestionId::new(2).unwrap()))
        );
    }

    #[test]
    fn next_on_last_question_submits() {
        let store = temp_store();
        let mut screen = enter_at(15, &store);
        assert_eq!(press(&mut screen, KeyCode::Right, &store), Action::Navigate(Route::Results));
        assert!(store.load().unwrap().unwrap().completed);
    }

    #[test]
    fn jump_prompt_navigates_anywhere() {
        let store = temp_store();
        let mut screen = enter_at(2, &store);
        press(&mut screen, KeyCode::Char('g'), &store);
        press(&mut screen, KeyCode::Char('1'), &store);
        press(&mut screen, KeyCode::Char('2'), &store);
        assert_eq!(
            press(&mut screen, KeyCode::Enter, &store),
            Action::Navigate(Route::Question(QuestionId::new(12).unwrap()))
        );
    }

    #[test]
    fn jump_prompt_ignores_invalid_numbers() {
        let store = temp_store();
        let mut screen = enter_at(2, &store);
        press(&mut screen, KeyCode::Char('g'), &store);
        press(&mut screen, KeyCode::Char('4'), &store);
        press(&mut screen, KeyCode::Char('0'), &store);
        assert_eq!(press(&mut screen, KeyCode::Enter, &store), Action::None);
        // 入力欄は閉じているので通常のキーに戻る
        assert_eq!(press(&mut screen, KeyCode::Char('q'), &store), Action::Quit);
    }

    #[test]
    fn expired_timer_submits_once() {
        let store = temp_store();
        let session = sample_session(Utc::now() - Duration::minutes(31));
        let mut screen = QuestionScreen::enter(session, QuestionId::new(3).unwrap(), &store).unwrap();
        assert_eq!(screen.remaining_secs(), 0);

        let now = Instant::now();
        assert_eq!(screen.tick(now, &store).unwrap(), Action::Navigate(Route::Results));
        assert_eq!(screen.tick(now, &store).unwrap(), Action::None);
        assert!(store.load().unwrap().unwrap().completed);
    }
}
