use std::time::{Duration, Instant};

pub const TOAST_TTL: Duration = Duration::from_secs(3);
pub const PIPELINE_RESET_DELAY: Duration = Duration::from_secs(6);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub severity: Severity,
    visible_until: Instant,
}

/// Holds at most one toast. A newer toast replaces the visible one together
/// with its deadline.
#[derive(Debug, Default)]
pub struct StatusChannel {
    current: Option<StatusMessage>,
}

impl StatusChannel {
    pub fn notify(&mut self, text: impl Into<String>, severity: Severity, now: Instant) {
        self.current = Some(StatusMessage {
            text: text.into(),
            severity,
            visible_until: now + TOAST_TTL,
        });
    }

    pub fn current(&self) -> Option<&StatusMessage> {
        self.current.as_ref()
    }

    /// Returns true when a toast was dismissed.
    pub fn expire(&mut self, now: Instant) -> bool {
        match &self.current {
            Some(message) if now >= message.visible_until => {
                self.current = None;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelinePhase {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl PipelinePhase {
    pub fn label(&self) -> &'static str {
        match self {
            PipelinePhase::Idle => "System Ready",
            PipelinePhase::Running => "Ingestion Running...",
            PipelinePhase::Succeeded => "Data Updated",
            PipelinePhase::Failed => "Connection Failed",
        }
    }
}

/// Phase of the external ingestion job. Terminal phases fall back to idle
/// after [`PIPELINE_RESET_DELAY`].
#[derive(Debug, Default)]
pub struct PipelineStatus {
    phase: PipelinePhase,
    reset_at: Option<Instant>,
}

impl PipelineStatus {
    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    pub fn label(&self) -> &'static str {
        self.phase.label()
    }

    pub fn is_running(&self) -> bool {
        self.phase == PipelinePhase::Running
    }

    pub fn set(&mut self, phase: PipelinePhase, now: Instant) {
        self.phase = phase;
        self.reset_at = match phase {
            PipelinePhase::Succeeded | PipelinePhase::Failed => Some(now + PIPELINE_RESET_DELAY),
            PipelinePhase::Idle | PipelinePhase::Running => None,
        };
    }

    pub fn expire(&mut self, now: Instant) -> bool {
        match self.reset_at {
            Some(reset_at) if now >= reset_at => {
                self.phase = PipelinePhase::Idle;
                self.reset_at = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toast_dismisses_itself() {
        let start = Instant::now();
        let mut channel = StatusChannel::default();
        channel.notify("saved", Severity::Success, start);
        assert!(!channel.expire(start + Duration::from_secs(2)));
        assert!(channel.current().is_some());
        assert!(channel.expire(start + TOAST_TTL));
        assert!(channel.current().is_none());
    }

    #[test]
    fn newer_toast_supersedes_and_restarts_timer() {
        let start = Instant::now();
        let mut channel = StatusChannel::default();
        channel.notify("first", Severity::Neutral, start);
        let later = start + Duration::from_secs(2);
        channel.notify("second", Severity::Error, later);

        // the first toast's deadline no longer applies
        assert!(!channel.expire(start + TOAST_TTL));
        let current = channel.current().expect("second toast visible");
        assert_eq!(current.text, "second");
        assert_eq!(current.severity, Severity::Error);
        assert!(channel.expire(later + TOAST_TTL));
    }

    #[test]
    fn pipeline_returns_to_idle_after_terminal_phase() {
        let start = Instant::now();
        let mut pipeline = PipelineStatus::default();
        assert_eq!(pipeline.label(), "System Ready");

        pipeline.set(PipelinePhase::Running, start);
        assert!(!pipeline.expire(start + Duration::from_secs(60)));
        assert!(pipeline.is_running());

        pipeline.set(PipelinePhase::Succeeded, start);
        assert!(!pipeline.expire(start + TOAST_TTL));
        assert_eq!(pipeline.phase(), PipelinePhase::Succeeded);
        assert!(pipeline.expire(start + PIPELINE_RESET_DELAY));
        assert_eq!(pipeline.phase(), PipelinePhase::Idle);
    }
}
