// ============================================
// src/config.rs
// コマンドライン引数と環境変数
// ============================================

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::{QuizError, Result};
use crate::session::QuestionId;
use crate::source::DEFAULT_API_URL;
use crate::store::SessionStore;

#[derive(Debug, Parser)]
#[command(name = "quizwiz", version, about = "QUIZ WiZ. 15 questions, 30 minutes.")]
pub struct Cli {
    /// セッションとログの保存先
    #[arg(long, env = "QUIZWIZ_DATA_DIR", global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// 問題 API の URL
    #[arg(long, env = "QUIZWIZ_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// 再開時に開く問題番号（範囲外は 1..=15 に寄せる）
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub question: Option<i64>,

    /// ログのフィルタ (例: "info", "quizwiz=debug")
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 保存されているセッションを削除する
    Reset {
        /// 確認せずに削除する
        #[arg(short, long)]
        yes: bool,
    },
    /// 完了したセッションの結果を表示する
    Results {
        /// JSON で出力する
        #[arg(long)]
        json: bool,
    },
}

/// 引数を解決した設定値
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub api_url: String,
    pub start_question: QuestionId,
    pub log_filter: String,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let api_url = cli.api_url.trim().to_string();
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(QuizError::Config(format!(
                "API URL must start with http:// or https://, got {api_url:?}"
            )));
        }

        Ok(Self {
            data_dir: cli.data_dir.clone().unwrap_or_else(SessionStore::default_dir),
            api_url,
            start_question: cli.question.map_or(QuestionId::FIRST, QuestionId::clamped),
            log_filter: cli.log_level.clone(),
        })
    }
}
