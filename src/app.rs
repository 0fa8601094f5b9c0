// ============================================
// src/app.rs
// アプリ全体の状態と画面遷移
// ============================================

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use crossterm::event::KeyEvent;
use ratatui::{
    prelude::*,
    style::{Color, Style},
    widgets::Paragraph,
};
use tracing::{error, warn};

use crate::error::Result;
use crate::screens::question::QuestionScreen;
use crate::screens::results::ResultsScreen;
use crate::screens::start::StartScreen;
use crate::screens::{Action, Route};
use crate::session::{QuestionId, QuizSession};
use crate::source::QuestionSource;
use crate::store::SessionStore;

/// 表示中の画面
enum Screen {
    Start(StartScreen),
    Question(QuestionScreen),
    Results(ResultsScreen),
}

/// 画面に入ろうとした結果
enum Entered {
    Screen(Screen),
    Redirect(Route),
}

pub struct App {
    store: SessionStore,
    source: Arc<dyn QuestionSource>,
    screen: Screen,
    /// 保存失敗などを画面下に出す
    notice: Option<String>,
    should_quit: bool,
}

impl App {
    pub fn new(store: SessionStore, source: Arc<dyn QuestionSource>, route: Route) -> Self {
        let mut app = Self {
            store,
            source,
            screen: Screen::Start(StartScreen::new()),
            notice: None,
            should_quit: false,
        };
        app.navigate(route);
        app
    }

    /// 起動時の画面: 完了済みなら結果、途中なら問題、なければスタート
    pub fn initial_route(store: &SessionStore, question: QuestionId) -> Route {
        match store.load() {
            Ok(Some(session)) if session.completed => Route::Results,
            Ok(Some(_)) => Route::Question(question),
            Ok(None) => Route::Start,
            Err(e) => {
                warn!(error = %e, "could not read stored session");
                Route::Start
            }
        }
    }

    pub fn route(&self) -> Route {
        match &self.screen {
            Screen::Start(_) => Route::Start,
            Screen::Question(screen) => Route::Question(screen.current()),
            Screen::Results(_) => Route::Results,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    // --------------------------------------------------
    // 画面遷移
    // --------------------------------------------------

    /// リダイレクトを解決しながら画面を切り替える（スタート画面は必ず入れる）
    pub fn navigate(&mut self, route: Route) {
        let mut route = route;
        loop {
            match self.enter(route) {
                Ok(Entered::Screen(screen)) => {
                    self.screen = screen;
                    return;
                }
                Ok(Entered::Redirect(next)) => {
                    warn!(from = ?route, to = ?next, "redirected");
                    route = next;
                }
                Err(e) => {
                    error!(error = %e, ?route, "failed to open screen");
                    self.notice = Some(e.to_string());
                    route = Route::Start;
                }
            }
        }
    }

    fn enter(&self, route: Route) -> Result<Entered> {
        match route {
            Route::Start => Ok(Entered::Screen(Screen::Start(StartScreen::new()))),
            Route::Question(id) => match self.load_session() {
                None => Ok(Entered::Redirect(Route::Start)),
                Some(session) if session.completed => Ok(Entered::Redirect(Route::Results)),
                Some(session) => {
                    let screen = QuestionScreen::enter(session, id, &self.store)?;
                    Ok(Entered::Screen(Screen::Question(screen)))
                }
            },
            Route::Results => match self.load_session() {
                Some(session) if session.completed => {
                    Ok(Entered::Screen(Screen::Results(ResultsScreen::new(&session, Utc::now()))))
                }
                _ => Ok(Entered::Redirect(Route::Start)),
            },
        }
    }

    /// 読めないセッションは「セッションなし」と同じ扱い
    fn load_session(&self) -> Option<QuizSession> {
        self.store.load().unwrap_or_else(|e| {
            warn!(error = %e, "could not read stored session");
            None
        })
    }

    fn apply(&mut self, result: Result<Action>) {
        match result {
            Ok(Action::None) => {}
            Ok(Action::Navigate(route)) => {
                self.notice = None;
                self.navigate(route);
            }
            Ok(Action::Quit) => self.should_quit = true,
            Err(e) => {
                error!(error = %e, "action failed");
                self.notice = Some(e.to_string());
            }
        }
    }

    // --------------------------------------------------
    // 入力と時間経過
    // --------------------------------------------------

    pub fn handle_key(&mut self, key: KeyEvent) {
        let result = match &mut self.screen {
            Screen::Start(screen) => Ok(screen.handle_key(key, &self.source)),
            Screen::Question(screen) => screen.handle_key(key, &self.store),
            Screen::Results(screen) => screen.handle_key(key, &self.store),
        };
        self.apply(result);
    }

    /// イベントループから毎回呼ぶ: 取得結果の受け取りとカウントダウン
    pub fn tick(&mut self) {
        let result = match &mut self.screen {
            Screen::Start(screen) => Ok(screen.poll(&self.store)),
            Screen::Question(screen) => screen.tick(Instant::now(), &self.store),
            Screen::Results(_) => Ok(Action::None),
        };
        self.apply(result);
    }

    // --------------------------------------------------
    // 描画
    // --------------------------------------------------

    pub fn render(&self, f: &mut Frame) {
        let size = f.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),    // [0] 画面本体
                Constraint::Length(1), // [1] お知らせ
            ])
            .split(size);

        match &self.screen {
            Screen::Start(screen) => screen.render(f, chunks[0]),
            Screen::Question(screen) => screen.render(f, chunks[0]),
            Screen::Results(screen) => screen.render(f, chunks[0]),
        }

        if let Some(notice) = &self.notice {
            f.render_widget(
                Paragraph::new(notice.as_str()).style(Style::default().fg(Color::Red)),
                chunks[1],
            );
        }
    }
}
