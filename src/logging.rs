// ============================================
// src/logging.rs
// ログはファイルに出す（TUI の画面を崩さないため）
// ============================================

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::{QuizError, Result};

const LOG_FILE: &str = "quizwiz.log";

pub fn init(dir: &Path, filter: &str) -> Result<()> {
    fs::create_dir_all(dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))?;

    let filter = EnvFilter::try_new(filter)
        .map_err(|e| QuizError::Config(format!("invalid log filter {filter:?}: {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| QuizError::Config(format!("logger already initialised: {e}")))?;
    Ok(())
}
