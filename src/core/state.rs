//! Per-run execution state

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::Stage;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Run has not started
    Pending,
    /// Run is executing stages
    Running,
    /// All enabled stages were attempted without a fatal failure
    Completed,
    /// A fatal stage failed, or the repository identity was unknown
    Failed,
    /// The run's cancellation token fired
    Cancelled,
}

/// Progress bookkeeping for one run
///
/// Each enabled stage is worth `round(100 / k)` percent, where `k` is the
/// number of enabled stages (at least 1). Deploy completion pins the
/// progress to 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: Uuid,

    pub status: ExecutionStatus,

    /// Number of enabled stages
    pub enabled_stages: usize,

    pub completed_stages: usize,

    /// Current progress percentage
    pub progress: u8,
}

impl RunState {
    pub fn new(enabled_stages: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: ExecutionStatus::Pending,
            enabled_stages,
            completed_stages: 0,
            progress: 0,
        }
    }

    /// Progress granted per completed stage
    pub fn step_size(&self) -> u8 {
        let divisor = self.enabled_stages.max(1);
        ((100 + divisor / 2) / divisor).min(100) as u8
    }

    pub fn start(&mut self) {
        self.status = ExecutionStatus::Running;
    }

    /// Record a finished stage and return the new progress
    pub fn complete_stage(&mut self, stage: Stage) -> u8 {
        self.completed_stages += 1;
        self.progress = if stage == Stage::Deploy {
            100
        } else {
            self.progress.saturating_add(self.step_size()).min(100)
        };
        self.progress
    }

    pub fn complete(&mut self) {
        self.status = ExecutionStatus::Completed;
    }

    pub fn fail(&mut self) {
        self.status = ExecutionStatus::Failed;
    }

    pub fn cancel(&mut self) {
        self.status = ExecutionStatus::Cancelled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_size() {
        assert_eq!(RunState::new(0).step_size(), 100);
        assert_eq!(RunState::new(1).step_size(), 100);
        assert_eq!(RunState::new(2).step_size(), 50);
        assert_eq!(RunState::new(3).step_size(), 33);
        assert_eq!(RunState::new(4).step_size(), 25);
    }

    #[test]
    fn test_progress_accumulates() {
        let mut state = RunState::new(3);
        assert_eq!(state.complete_stage(Stage::Fetch), 33);
        assert_eq!(state.complete_stage(Stage::Build), 66);
        assert_eq!(state.complete_stage(Stage::Publish), 99);
        assert_eq!(state.completed_stages, 3);
    }

    #[test]
    fn test_deploy_forces_completion() {
        let mut state = RunState::new(3);
        state.complete_stage(Stage::Fetch);
        state.complete_stage(Stage::Build);
        assert_eq!(state.complete_stage(Stage::Deploy), 100);
    }

    #[test]
    fn test_status_transitions() {
        let mut state = RunState::new(1);
        assert_eq!(state.status, ExecutionStatus::Pending);
        state.start();
        assert_eq!(state.status, ExecutionStatus::Running);
        state.fail();
        assert_eq!(state.status, ExecutionStatus::Failed);
    }
}
