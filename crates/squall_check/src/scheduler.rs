use serde::Serialize;

/// A memoryless deterministic scheduler: for every state the local index of
/// the chosen row inside the state's row group. Produced by the min-max
/// solvers in scheduler-tracking mode, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scheduler {
    choices: Vec<usize>,
}

impl Scheduler {
    pub fn new(choices: Vec<usize>) -> Self {
        Self { choices }
    }

    /// The chosen local row index of `state`.
    pub fn choice(&self, state: usize) -> usize {
        self.choices[state]
    }

    pub fn state_count(&self) -> usize {
        self.choices.len()
    }

    pub fn choices(&self) -> &[usize] {
        &self.choices
    }
}
