//! 진행률/메시지 출력
//!
//! 코어는 화면을 모릅니다. 진행률(0~100)과 사용자 메시지를 이 트레이트로 내보내고,
//! 호출자(CLI 등)가 렌더링합니다.

use std::fmt;

/// 사용자 메시지 수준
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl MessageLevel {
    /// CLI 출력 접두사
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Info => "[*]",
            Self::Success => "[OK]",
            Self::Warning => "[!]",
            Self::Error => "[ERROR]",
        }
    }
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// 진행률 및 메시지 싱크
pub trait Reporter: Send + Sync {
    /// 진행률 (0~100)
    fn progress(&self, percent: u8);

    /// 사용자 메시지
    fn message(&self, level: MessageLevel, text: &str);
}

/// 콘솔 출력
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn progress(&self, percent: u8) {
        println!("    진행률: {}%", percent.min(100));
    }

    fn message(&self, level: MessageLevel, text: &str) {
        match level {
            MessageLevel::Error | MessageLevel::Warning => eprintln!("{} {}", level, text),
            _ => println!("{} {}", level, text),
        }
    }
}

/// 아무것도 출력하지 않음
#[derive(Debug, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn progress(&self, _percent: u8) {}

    fn message(&self, _level: MessageLevel, _text: &str) {}
}

/// 1부터 센 i번째 항목 완료 시점의 진행률
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}

/// 기록용 리포터 (테스트)
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingReporter {
    pub progress: std::sync::Mutex<Vec<u8>>,
    pub messages: std::sync::Mutex<Vec<(MessageLevel, String)>>,
}

#[cfg(test)]
impl Reporter for RecordingReporter {
    fn progress(&self, percent: u8) {
        self.progress.lock().unwrap().push(percent);
    }

    fn message(&self, level: MessageLevel, text: &str) {
        self.messages.lock().unwrap().push((level, text.to_string()));
    }
}
