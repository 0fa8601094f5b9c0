// ============================================
// src/source.rs
// 問題の取得元 (Open Trivia DB)
// ============================================

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{QuizError, Result};
use crate::sanitize::plain_text;

pub const DEFAULT_API_URL: &str = "https://opentdb.com/api.php";

const HTTP_TIMEOUT: Duration = Duration::from_secs(20);
const INCORRECT_PER_QUESTION: usize = 3;
/// 4択の問題だけを頼む
const QUESTION_TYPE: &str = "multiple";

/// 検証済みの問題1つ（文字列はすべてプレーンテキスト）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriviaQuestion {
    pub question: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
}

/// 問題の取得元。テストではモックに差し替える
#[cfg_attr(test, mockall::automock)]
pub trait QuestionSource: Send + Sync {
    fn fetch(&self, amount: usize) -> Result<Vec<TriviaQuestion>>;
}

// --------------------------------------------------
// API のレスポンス形式
// --------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    response_code: u8,
    #[serde(default)]
    results: Vec<RawQuestion>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    question: String,
    correct_answer: String,
    incorrect_answers: Vec<String>,
}

// --------------------------------------------------
// HTTP 実装
// --------------------------------------------------

pub struct OpenTdbSource {
    client: Client,
    api_url: String,
}

impl OpenTdbSource {
    pub fn new(api_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
        })
    }
}

impl QuestionSource for OpenTdbSource {
    fn fetch(&self, amount: usize) -> Result<Vec<TriviaQuestion>> {
        info!(url = %self.api_url, amount, "fetching questions");
        let body = self
            .client
            .get(&self.api_url)
            .query(&[("amount", amount)])
            .query(&[("type", QUESTION_TYPE)])
            .header(USER_AGENT, concat!("quizwiz/", env!("CARGO_PKG_VERSION")))
            .send()?
            .error_for_status()?
            .text()?;
        debug!(bytes = body.len(), "question payload received");
        parse_response(&body, amount)
    }
}

/// レスポンスを検証して問題リストにする。1問でも不正なら全体を失敗にする
pub fn parse_response(body: &str, amount: usize) -> Result<Vec<TriviaQuestion>> {
    let response: ApiResponse = serde_json::from_str(body)?;

    if response.response_code != 0 {
        return Err(QuizError::Api(response.response_code));
    }
    if response.results.is_empty() {
        return Err(QuizError::Payload("no questions in response".to_string()));
    }
    if response.results.len() != amount {
        return Err(QuizError::Payload(format!(
            "expected {} questions, received {}",
            amount,
            response.results.len()
        )));
    }

    response
        .results
        .into_iter()
        .enumerate()
        .map(|(i, raw)| validate_question(i + 1, raw))
        .collect()
}

fn validate_question(position: usize, raw: RawQuestion) -> Result<TriviaQuestion> {
    let invalid = |reason: &str| QuizError::Payload(format!("question {position}: {reason}"));

    let question = plain_text(&raw.question);
    let correct_answer = plain_text(&raw.correct_answer);
    let incorrect_answers: Vec<String> = raw.incorrect_answers.iter().map(|a| plain_text(a)).collect();

    if question.is_empty() {
        return Err(invalid("empty question text"));
    }
    if correct_answer.is_empty() || incorrect_answers.iter().any(String::is_empty) {
        return Err(invalid("empty answer"));
    }
    if incorrect_answers.len() != INCORRECT_PER_QUESTION {
        warn!(position, count = incorrect_answers.len(), "unexpected number of incorrect answers");
        return Err(invalid("expected exactly 3 incorrect answers"));
    }

    let mut seen = HashSet::new();
    seen.insert(correct_answer.as_str());
    if !incorrect_answers.iter().all(|a| seen.insert(a.as_str())) {
        return Err(invalid("answers are not distinct"));
    }

    Ok(TriviaQuestion {
        question,
        correct_answer,
        incorrect_answers,
    })
}

/// 別スレッドで取得して、結果をチャネルで返す
pub fn spawn_fetch(source: Arc<dyn QuestionSource>, amount: usize) -> Receiver<Result<Vec<TriviaQuestion>>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // 受信側が先に消えていたら結果は捨てる
        let _ = tx.send(source.fetch(amount));
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_item(n: usize) -> serde_json::Value {
        json!({
            "type": "multiple",
            "difficulty": "easy",
            "category": "General Knowledge",
            "question": format!("What is &quot;item&quot; {n}?"),
            "correct_answer": format!("Right {n}"),
            "incorrect_answers": [format!("A{n}"), format!("B{n}"), format!("C{n}")]
        })
    }

    fn body(items: Vec<serde_json::Value>) -> String {
        json!({ "response_code": 0, "results": items }).to_string()
    }

    #[test]
    fn parses_and_sanitises_a_full_batch() {
        let questions = parse_response(&body((1..=15).map(raw_item).collect()), 15).unwrap();
        assert_eq!(questions.len(), 15);
        assert_eq!(questions[0].question, "What is \"item\" 1?");
        assert_eq!(questions[0].correct_answer, "Right 1");
        assert_eq!(questions[14].incorrect_answers, vec!["A15", "B15", "C15"]);
    }

    #[test]
    fn rejects_empty_results() {
        let err = parse_response(&body(vec![]), 15).unwrap_err();
        assert!(matches!(err, QuizError::Payload(_)));
    }

    #[test]
    fn rejects_short_batches() {
        let err = parse_response(&body((1..=3).map(raw_item).collect()), 15).unwrap_err();
        assert!(matches!(err, QuizError::Payload(_)));
    }

    #[test]
    fn reports_api_response_codes() {
        let err = parse_response(r#"{"response_code": 5, "results": []}"#, 15).unwrap_err();
        assert!(matches!(err, QuizError::Api(5)));
    }

    #[test]
    fn rejects_boolean_questions() {
        let mut items: Vec<_> = (1..=15).map(raw_item).collect();
        items[4] = json!({
            "question": "The sky is blue.",
            "correct_answer": "True",
            "incorrect_answers": ["False"]
        });
        let err = parse_response(&body(items), 15).unwrap_err();
        assert!(err.to_string().contains("question 5"));
    }

    #[test]
    fn rejects_duplicate_answers() {
        let mut items: Vec<_> = (1..=15).map(raw_item).collect();
        items[0]["incorrect_answers"] = json!(["Right 1", "B1", "C1"]);
        assert!(parse_response(&body(items), 15).is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse_response(r#"{"results": [{"question": 1}]}"#, 15).unwrap_err();
        assert!(matches!(err, QuizError::Json(_)));
    }

    /// 1回だけ応答するローカルサーバー。受け取ったリクエスト行を返す
    fn serve_once(payload: String) -> (String, thread::JoinHandle<String>) {
        use std::io::{BufRead, BufReader, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/api.php", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            // ヘッダーの終わりまで読み捨てる
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 2 {
                line.clear();
            }
            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                payload.len(),
                payload
            )
            .unwrap();
            request_line.trim_end().to_string()
        });
        (url, handle)
    }

    #[test]
    fn fetch_asks_for_multiple_choice_questions_only() {
        let (url, server) = serve_once(body((1..=15).map(raw_item).collect()));
        let source = OpenTdbSource::new(url).unwrap();

        let questions = source.fetch(15).unwrap();
        let request_line = server.join().unwrap();

        assert_eq!(questions.len(), 15);
        assert!(request_line.starts_with("GET /api.php?"), "{request_line}");
        assert!(request_line.contains("amount=15"), "{request_line}");
        assert!(request_line.contains("type=multiple"), "{request_line}");
    }

    #[test]
    fn spawned_fetch_delivers_the_result() {
        let mut source = MockQuestionSource::new();
        source
            .expect_fetch()
            .withf(|amount| *amount == 15)
            .times(1)
            .returning(|_| Err(QuizError::Api(1)));

        let rx = spawn_fetch(Arc::new(source), 15);
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(result, Err(QuizError::Api(1))));
    }
}
