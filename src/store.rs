// ============================================
// src/store.rs
// セッションの保存・読み込み・削除
// ============================================

use bincode::config::standard;
use bincode::{Decode, Encode};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use tracing::{debug, warn};

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{QuizError, Result};
use crate::session::{QuizItem, QuizSession};

const SESSION_FILE_BIN: &str = "session.bin";
const SESSION_FILE_JSON: &str = "session.json"; // デバッグ用

// --------------------------------------------------
// bincode 用の内部表現（DateTime をミリ秒の i64 に変換）
// --------------------------------------------------

#[derive(Encode, Decode)]
struct QuizItemBin {
    id: u32,
    question_text: String,
    choices: Vec<String>,
    correct_answer: String,
    user_answer: Option<String>,
    visited: bool,
    attempted: bool,
}

impl From<&QuizItem> for QuizItemBin {
    fn from(item: &QuizItem) -> Self {
        Self {
            id: item.id as u32,
            question_text: item.question_text.clone(),
            choices: item.choices.clone(),
            correct_answer: item.correct_answer.clone(),
            user_answer: item.user_answer.clone(),
            visited: item.visited,
            attempted: item.attempted,
        }
    }
}

impl From<QuizItemBin> for QuizItem {
    fn from(bin: QuizItemBin) -> Self {
        Self {
            id: bin.id as usize,
            question_text: bin.question_text,
            choices: bin.choices,
            correct_answer: bin.correct_answer,
            user_answer: bin.user_answer,
            visited: bin.visited,
            attempted: bin.attempted,
        }
    }
}

#[derive(Encode, Decode)]
struct QuizSessionBin {
    email: String,
    items: Vec<QuizItemBin>,
    start_timestamp_millis: i64,
    completed: bool,
}

impl From<&QuizSession> for QuizSessionBin {
    fn from(session: &QuizSession) -> Self {
        Self {
            email: session.email.clone(),
            items: session.items.iter().map(QuizItemBin::from).collect(),
            start_timestamp_millis: session.start_timestamp.timestamp_millis(),
            completed: session.completed,
        }
    }
}

impl TryFrom<QuizSessionBin> for QuizSession {
    type Error = QuizError;

    fn try_from(bin: QuizSessionBin) -> Result<Self> {
        let start_timestamp = DateTime::<Utc>::from_timestamp_millis(bin.start_timestamp_millis)
            .ok_or_else(|| QuizError::InvalidSession("start timestamp out of range".to_string()))?;
        Ok(Self {
            email: bin.email,
            items: bin.items.into_iter().map(QuizItem::from).collect(),
            start_timestamp,
            completed: bin.completed,
        })
    }
}

// --------------------------------------------------
// ストア本体
// --------------------------------------------------

/// セッション1件を丸ごと1つのドキュメントとして保存する
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    // MARK:OS ごとのデータ保存用ディレクトリ
    pub fn default_dir() -> PathBuf {
        if let Some(proj_dirs) = ProjectDirs::from("com", "quizwiz", "QUIZ_WIZ") {
            return proj_dirs.data_dir().to_path_buf();
        }
        // 取得できなかったらカレントディレクトリに（フォールバック）
        PathBuf::from(".")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn bin_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE_BIN)
    }

    fn json_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE_JSON)
    }

    /// MARK:セッションを読み込む (バイナリ優先、JSON フォールバック)
    ///
    /// 壊れたファイルや不整合なセッションは「セッションなし」として扱う。
    pub fn load(&self) -> Result<Option<QuizSession>> {
        let session = match self.load_bin()? {
            Some(session) => Some(session),
            None => self.load_json()?,
        };

        match session {
            Some(session) => match session.validate() {
                Ok(()) => Ok(Some(session)),
                Err(e) => {
                    warn!(error = %e, "stored session is inconsistent, ignoring it");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    fn load_bin(&self) -> Result<Option<QuizSession>> {
        let Some(buffer) = read_if_exists(&self.bin_path())? else {
            return Ok(None);
        };
        let decoded = bincode::decode_from_slice::<QuizSessionBin, _>(&buffer, standard())
            .map_err(QuizError::from)
            .and_then(|(bin, _)| QuizSession::try_from(bin));
        match decoded {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(error = %e, "binary session file unreadable, trying JSON mirror");
                Ok(None)
            }
        }
    }

    fn load_json(&self) -> Result<Option<QuizSession>> {
        let Some(buffer) = read_if_exists(&self.json_path())? else {
            return Ok(None);
        };
        match serde_json::from_slice(&buffer) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(error = %e, "JSON session file unreadable");
                Ok(None)
            }
        }
    }

    /// MARK:セッションを保存する (バイナリ + JSON)
    ///
    /// 一時ファイルに書いてから rename するので、途中で落ちても
    /// 前回の内容か今回の内容のどちらかが残る。
    pub fn save(&self, session: &QuizSession) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let encoded = bincode::encode_to_vec(QuizSessionBin::from(session), standard())?;
        write_atomic(&self.bin_path(), &encoded)?;

        let json = serde_json::to_vec_pretty(session)?;
        write_atomic(&self.json_path(), &json)?;

        debug!(
            attempted = session.attempted_count(),
            completed = session.completed,
            "session saved"
        );
        Ok(())
    }

    /// MARK:セッションを消す。何もなくてもエラーにしない
    pub fn clear(&self) -> Result<()> {
        for path in [self.bin_path(), self.json_path()] {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(buffer) => Ok(Some(buffer)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    // session.bin → session.bin.tmp のようにファイルごとに別の一時ファイル
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
