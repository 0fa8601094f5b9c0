// ============================================
// src/timer.rs
// 制限時間のカウントダウン
// ============================================

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::session::QuizSession;

/// 問題画面が表示されている間だけ動くカウントダウン
///
/// 残り時間は画面に入るたびに保存済みの開始時刻から計算し直すので、
/// アプリを再起動しても時間は巻き戻らない。
#[derive(Debug, Clone)]
pub struct Countdown {
    remaining: u64,
    last_tick: Instant,
    fired: bool,
}

impl Countdown {
    pub fn new(remaining: u64, at: Instant) -> Self {
        Self {
            remaining,
            last_tick: at,
            fired: false,
        }
    }

    /// セッションの開始時刻から残り時間を求める
    pub fn for_session(session: &QuizSession, now: DateTime<Utc>, at: Instant) -> Self {
        Self::new(session.remaining_secs(now), at)
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// 経過した秒数ぶん減らす。0 になった最初の呼び出しだけ true
    pub fn tick(&mut self, at: Instant) -> bool {
        let whole_secs = at.saturating_duration_since(self.last_tick).as_secs();
        if whole_secs > 0 {
            self.remaining = self.remaining.saturating_sub(whole_secs);
            // 端数は次の tick に持ち越す
            self.last_tick += Duration::from_secs(whole_secs);
        }

        if self.remaining == 0 && !self.fired {
            self.fired = true;
            return true;
        }
        false
    }
}

/// 残り時間表示用 "MM:SS"
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// 所要時間表示用 "{m}m {s}s"
pub fn format_elapsed(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{}m {}s", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_once_per_second() {
        let start = Instant::now();
        let mut countdown = Countdown::new(10, start);

        assert!(!countdown.tick(start + Duration::from_millis(900)));
        assert_eq!(countdown.remaining(), 10);
        assert!(!countdown.tick(start + Duration::from_millis(1_100)));
        assert_eq!(countdown.remaining(), 9);
        // 持ち越した端数で 2 秒目に届く
        assert!(!countdown.tick(start + Duration::from_millis(2_000)));
        assert_eq!(countdown.remaining(), 8);
    }

    #[test]
    fn never_increases_and_stops_at_zero() {
        let start = Instant::now();
        let mut countdown = Countdown::new(3, start);
        let mut previous = countdown.remaining();

        for ms in (0..10_000).step_by(250) {
            countdown.tick(start + Duration::from_millis(ms));
            assert!(countdown.remaining() <= previous);
            previous = countdown.remaining();
        }
        assert_eq!(countdown.remaining(), 0);
    }

    #[test]
    fn expiry_fires_exactly_once() {
        let start = Instant::now();
        let mut countdown = Countdown::new(1, start);

        let fired: Vec<bool> = (0..5)
            .map(|s| countdown.tick(start + Duration::from_secs(s)))
            .collect();
        assert_eq!(fired, vec![false, true, false, false, false]);
    }

    #[test]
    fn already_expired_fires_on_first_tick() {
        let start = Instant::now();
        let mut countdown = Countdown::new(0, start);
        assert!(countdown.tick(start));
        assert!(!countdown.tick(start + Duration::from_secs(1)));
    }

    #[test]
    fn formats_time() {
        assert_eq!(format_clock(1800), "30:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_elapsed(125), "2m 5s");
        assert_eq!(format_elapsed(-3), "0m 0s");
    }
}
