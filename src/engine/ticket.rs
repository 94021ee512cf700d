use crate::store::DemoState;

/// Identity of a scheduled step continuation.
///
/// A ticket is captured when a step is scheduled and re-checked against the
/// store right before every transition. If the run, the cursor or the step
/// moved on in the meantime, the continuation does nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTicket {
    pub epoch: u64,
    pub index: usize,
    pub step_id: String,
}

impl StepTicket {
    /// Ticket for the step under the cursor, if demo mode is on and it exists.
    pub fn capture(state: &DemoState) -> Option<StepTicket> {
        if !state.is_demo_mode {
            return None;
        }
        state.current_step().map(|step| StepTicket {
            epoch: state.epoch,
            index: state.current_step_index,
            step_id: step.id.clone(),
        })
    }

    /// The same run is still active and the cursor is still on this step.
    pub fn is_current(&self, state: &DemoState) -> bool {
        state.is_demo_mode
            && state.epoch == self.epoch
            && state.current_step_index == self.index
            && state
                .steps
                .get(self.index)
                .is_some_and(|s| s.id == self.step_id)
    }

    /// Current, and the step has not been completed yet.
    pub fn is_pending(&self, state: &DemoState) -> bool {
        self.is_current(state) && !state.steps[self.index].completed
    }
}
