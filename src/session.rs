// ============================================
// src/session.rs
// クイズ1回分のセッション（問題・回答・開始時刻・完了フラグ）
// ============================================

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{QuizError, Result};
use crate::source::TriviaQuestion;

/// 1セッションの問題数
pub const QUESTION_COUNT: usize = 15;
/// 制限時間（秒）
pub const TIME_LIMIT_SECS: i64 = 30 * 60;

// --------------------------------------------------
// 問題番号 (1..=15)
// --------------------------------------------------

/// 範囲外にならない問題番号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QuestionId(u8);

impl QuestionId {
    pub const FIRST: Self = Self(1);
    pub const LAST: Self = Self(QUESTION_COUNT as u8);

    /// 1..=15 の範囲内なら Some
    pub fn new(n: usize) -> Option<Self> {
        (1..=QUESTION_COUNT).contains(&n).then_some(Self(n as u8))
    }

    /// 範囲外の番号は端に寄せる
    pub fn clamped(n: i64) -> Self {
        Self(n.clamp(1, QUESTION_COUNT as i64) as u8)
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// `items` 上のインデックス
    pub fn index(self) -> usize {
        self.get() - 1
    }

    /// 1問目では None（折り返さない）
    pub fn prev(self) -> Option<Self> {
        Self::new(self.get() - 1)
    }

    /// 15問目では None
    pub fn next(self) -> Option<Self> {
        Self::new(self.get() + 1)
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (1..=QUESTION_COUNT as u8).map(Self)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// --------------------------------------------------
// 問題1つ分
// --------------------------------------------------

/// 概要パネルでの表示状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Attempted,
    Visited,
    NotVisited,
}

/// 結果画面での判定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Correct,
    Incorrect,
    Unanswered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizItem {
    pub id: usize,
    pub question_text: String,
    /// 作成時に一度だけシャッフルし、以後は固定
    pub choices: Vec<String>,
    pub correct_answer: String,
    pub user_answer: Option<String>,
    pub visited: bool,
    pub attempted: bool,
}

impl QuizItem {
    /// 不正解リストの末尾に正解を足して、一様にシャッフルする
    pub fn new<R: Rng + ?Sized>(id: usize, question: TriviaQuestion, rng: &mut R) -> Self {
        let mut choices = question.incorrect_answers;
        choices.push(question.correct_answer.clone());
        choices.shuffle(rng);

        Self {
            id,
            question_text: question.question,
            choices,
            correct_answer: question.correct_answer,
            user_answer: None,
            visited: false,
            attempted: false,
        }
    }

    pub fn status(&self) -> ItemStatus {
        if self.attempted {
            ItemStatus::Attempted
        } else if self.visited {
            ItemStatus::Visited
        } else {
            ItemStatus::NotVisited
        }
    }

    /// 未回答は正解と一致しない
    pub fn is_correct(&self) -> bool {
        self.user_answer.as_deref() == Some(self.correct_answer.as_str())
    }

    pub fn outcome(&self) -> AnswerOutcome {
        match &self.user_answer {
            None => AnswerOutcome::Unanswered,
            Some(_) if self.is_correct() => AnswerOutcome::Correct,
            Some(_) => AnswerOutcome::Incorrect,
        }
    }

    /// 選択肢のうち今の回答の位置
    pub fn answer_index(&self) -> Option<usize> {
        let answer = self.user_answer.as_deref()?;
        self.choices.iter().position(|c| c == answer)
    }

    fn check(&self, expected_id: usize) -> Result<()> {
        if self.id != expected_id {
            return Err(QuizError::InvalidSession(format!(
                "item {} found where item {} was expected",
                self.id, expected_id
            )));
        }
        let hits = self.choices.iter().filter(|c| **c == self.correct_answer).count();
        if hits != 1 {
            return Err(QuizError::InvalidSession(format!(
                "item {} lists its correct answer {} times",
                self.id, hits
            )));
        }
        if self.attempted != self.user_answer.is_some() {
            return Err(QuizError::InvalidSession(format!(
                "item {} has inconsistent attempt flags",
                self.id
            )));
        }
        Ok(())
    }
}

// --------------------------------------------------
// セッション全体
// --------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSession {
    pub email: String,
    pub items: Vec<QuizItem>,
    pub start_timestamp: DateTime<Utc>,
    pub completed: bool,
}

impl QuizSession {
    /// 取得した問題からセッションを作る（id は取得順に 1..=15）
    pub fn from_questions<R: Rng + ?Sized>(
        email: impl Into<String>,
        questions: Vec<TriviaQuestion>,
        start_timestamp: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Self> {
        let items = questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| QuizItem::new(i + 1, q, rng))
            .collect();

        let session = Self {
            email: email.into(),
            items,
            start_timestamp,
            completed: false,
        };
        session.validate()?;
        Ok(session)
    }

    /// 問題数・id の並び・各問題のフラグを検査する
    pub fn validate(&self) -> Result<()> {
        if self.items.len() != QUESTION_COUNT {
            return Err(QuizError::InvalidSession(format!(
                "expected {} items, found {}",
                QUESTION_COUNT,
                self.items.len()
            )));
        }
        for (i, item) in self.items.iter().enumerate() {
            item.check(i + 1)?;
        }
        Ok(())
    }

    pub fn item(&self, id: QuestionId) -> &QuizItem {
        &self.items[id.index()]
    }

    /// 一度訪問した問題は未訪問に戻らない
    pub fn mark_visited(&mut self, id: QuestionId) {
        self.items[id.index()].visited = true;
    }

    /// 選択肢にない回答は無視して false を返す
    pub fn select_answer(&mut self, id: QuestionId, answer: &str) -> bool {
        let item = &mut self.items[id.index()];
        if !item.choices.iter().any(|c| c == answer) {
            return false;
        }
        item.user_answer = Some(answer.to_string());
        item.attempted = true;
        true
    }

    pub fn complete(&mut self) {
        self.completed = true;
    }

    pub fn score(&self) -> usize {
        self.items.iter().filter(|item| item.is_correct()).count()
    }

    /// 四捨五入したパーセント
    pub fn percentage(&self) -> u32 {
        ((self.score() as f64 / QUESTION_COUNT as f64) * 100.0).round() as u32
    }

    pub fn attempted_count(&self) -> usize {
        self.items.iter().filter(|item| item.attempted).count()
    }

    pub fn count_outcome(&self, outcome: AnswerOutcome) -> usize {
        self.items.iter().filter(|item| item.outcome() == outcome).count()
    }

    /// 開始からの経過秒数（時計が戻っても負にしない）
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_timestamp).num_seconds().max(0)
    }

    /// 残り時間（秒）。0 未満にはならない
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        (TIME_LIMIT_SECS - self.elapsed_secs(now)).max(0) as u64
    }
}
