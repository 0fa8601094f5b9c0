// ============================================
// src/screens/mod.rs
// 画面（スタート・問題・結果）と画面遷移
// ============================================

pub mod question;
pub mod results;
pub mod start;

use crate::session::QuestionId;

/// 表示中の画面
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Start,
    Question(QuestionId),
    Results,
}

/// キー入力や tick の結果、アプリに求める動作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Navigate(Route),
    Quit,
}
