// ============================================
// src/main.rs (メインファイル)
// ============================================

use std::io::{Result, stdout};
use std::sync::Arc;
use std::time::Duration;

mod app;
mod config;
mod error;
mod logging;
mod sanitize;
mod screens;
mod session;
mod source;
mod store;
mod timer;

use app::App;
use clap::Parser;
use config::{Cli, Command, Config};
use error::QuizError;
use screens::results::{ResultsReport, outcome_label};
use source::{OpenTdbSource, QuestionSource};
use store::SessionStore;

use chrono::Utc;
use console::style;
use dialoguer::Confirm;
use tracing::info;

use crossterm::{
    ExecutableCommand,
    cursor::{Hide, Show},
    event::{self, Event},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};

use ratatui::prelude::*;

// --------------------------------------------------
// メイン関数
// --------------------------------------------------

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_cli(&cli)?;
    logging::init(&config.data_dir, &config.log_filter)?;

    let store = SessionStore::new(&config.data_dir);
    info!(data_dir = %store.dir().display(), "quizwiz starting");

    match cli.command {
        Some(Command::Reset { yes }) => reset(&store, yes),
        Some(Command::Results { json }) => print_results(&store, json),
        None => run_tui(&config, store),
    }
}

/// `quizwiz reset`: 確認してからセッションを消す
fn reset(store: &SessionStore, yes: bool) -> anyhow::Result<()> {
    let confirmed = yes
        || Confirm::new()
            .with_prompt("Clear the stored quiz session?")
            .default(false)
            .interact()?;

    if confirmed {
        store.clear()?;
        info!("session cleared from command line");
        println!("{}", style("Quiz session cleared.").green());
    } else {
        println!("{}", style("Nothing changed.").dim());
    }
    Ok(())
}

/// `quizwiz results`: 完了したセッションの結果を標準出力に出す
fn print_results(store: &SessionStore, json: bool) -> anyhow::Result<()> {
    let session = store
        .load()?
        .filter(|session| session.completed)
        .ok_or(QuizError::NoCompletedSession)?;
    let report = ResultsReport::new(&session, Utc::now());

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", style("Quiz Results").cyan().bold());
    println!("{}  •  Completed in {}", report.email, report.elapsed);
    println!(
        "{}  ({}% Score)",
        style(format!("{}/{}", report.score, report.total)).bold(),
        report.percentage
    );
    println!(
        "{}  {}  {}",
        style(format!("{} Correct", report.correct)).green(),
        style(format!("{} Incorrect", report.incorrect)).red(),
        style(format!("{} Not Answered", report.unanswered)).dim()
    );
    println!();
    for q in &report.questions {
        println!("{:>2}. [{}] {}", q.id, outcome_label(q.outcome), q.question);
        if let Some(answer) = &q.your_answer {
            if *answer != q.correct_answer {
                println!("    your answer:    {}", style(answer).red());
            }
        }
        println!("    correct answer: {}", style(&q.correct_answer).green());
    }
    Ok(())
}

// --------------------------------------------------
// TUI セットアップと実行ループ
// --------------------------------------------------

fn run_tui(config: &Config, store: SessionStore) -> anyhow::Result<()> {
    let source: Arc<dyn QuestionSource> = Arc::new(OpenTdbSource::new(config.api_url.as_str())?);
    let route = App::initial_route(&store, config.start_question);
    let mut app = App::new(store, source, route);

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app);
    // ループがエラーで抜けても端末は必ず元に戻す
    restore_terminal(&mut terminal)?;
    result?;
    Ok(())
}

fn setup_terminal() -> Result<Terminal<impl Backend>> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?; // 代替スクリーンを使用
    stdout().execute(Hide)?; // カーソルを非表示
    let backend = CrosstermBackend::new(stdout());
    Terminal::new(backend)
}

fn restore_terminal(_terminal: &mut Terminal<impl Backend>) -> Result<()> {
    stdout().execute(Show)?; // カーソルを再表示
    stdout().execute(LeaveAlternateScreen)?; // 代替スクリーンを終了
    disable_raw_mode()?;
    Ok(())
}

fn run_app(terminal: &mut Terminal<impl Backend>, app: &mut App) -> Result<()> {
    loop {
        // 取得結果の受け取り・残り時間の更新
        app.tick();
        if app.should_quit() {
            break;
        }

        terminal.draw(|f| app.render(f))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == event::KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}
