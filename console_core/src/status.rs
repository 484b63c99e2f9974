//! Transient status line shown under the map.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
    expires_at: Instant,
}

impl StatusMessage {
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }
}

/// Holds at most one message; a newer message replaces the current one and
/// every message disappears once its TTL elapses.
#[derive(Debug, Clone)]
pub struct TransientStatus {
    ttl: Duration,
    current: Option<StatusMessage>,
}

impl TransientStatus {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, current: None }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn info(&mut self, text: impl Into<String>, now: Instant) {
        self.set(StatusLevel::Info, text.into(), now);
    }

    pub fn error(&mut self, text: impl Into<String>, now: Instant) {
        self.set(StatusLevel::Error, text.into(), now);
    }

    fn set(&mut self, level: StatusLevel, text: String, now: Instant) {
        self.current = Some(StatusMessage {
            level,
            text,
            expires_at: now + self.ttl,
        });
    }

    /// Drops the message once expired. Returns true when something was removed.
    pub fn expire(&mut self, now: Instant) -> bool {
        match &self.current {
            Some(message) if now >= message.expires_at => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn current(&self, now: Instant) -> Option<&StatusMessage> {
        self.current
            .as_ref()
            .filter(|message| now < message.expires_at)
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_expires_after_ttl() {
        let start = Instant::now();
        let mut status = TransientStatus::new(Duration::from_secs(4));
        status.error("add tower failed", start);
        assert_eq!(
            status.current(start + Duration::from_secs(3)).map(|m| m.level),
            Some(StatusLevel::Error)
        );
        assert!(status.current(start + Duration::from_secs(4)).is_none());
        assert!(status.expire(start + Duration::from_secs(5)));
        assert!(!status.expire(start + Duration::from_secs(6)));
    }

    #[test]
    fn newer_message_restarts_ttl() {
        let start = Instant::now();
        let mut status = TransientStatus::new(Duration::from_secs(4));
        status.info("saved", start);
        status.info("loaded", start + Duration::from_secs(3));
        let current = status
            .current(start + Duration::from_secs(6))
            .expect("second message still visible");
        assert_eq!(current.text, "loaded");
    }
}
