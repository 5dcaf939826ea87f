//! Lottery task order.

use std::cmp::Ordering;
use std::collections::HashMap;

use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::events::{SchedulerEvent, SchedulerListener};
use crate::policy::TaskOrderPolicy;
use crate::state::{SchedulerState, TaskId};

/// Tickets in `1..=ROOT_TICKETS` win for root tasks, the rest win for tasks with dependencies.
const ROOT_TICKETS: u32 = 60;
const TOTAL_TICKETS: u32 = 100;

/// Orders tasks by the number of lottery draws they won when they became ready, most wins first.
///
/// A root task wins a draw with probability 0.6, a task with dependencies with probability 0.4.
pub struct LotteryTaskOrder {
    rounds: u32,
    rng: Pcg64,
    wins: HashMap<TaskId, u32>,
}

impl LotteryTaskOrder {
    pub fn new(rounds: u32, seed: u64) -> Self {
        Self {
            rounds,
            rng: Pcg64::seed_from_u64(seed),
            wins: HashMap::new(),
        }
    }

    fn play(&mut self, is_root: bool) -> u32 {
        let mut won = 0;
        for _ in 0..self.rounds {
            let ticket = self.rng.gen_range(1..=TOTAL_TICKETS);
            if (ticket <= ROOT_TICKETS) == is_root {
                won += 1;
            }
        }
        won
    }

    pub fn wins(&self, task: TaskId) -> Option<u32> {
        self.wins.get(&task).copied()
    }
}

impl SchedulerListener for LotteryTaskOrder {
    fn on_event(&mut self, event: &SchedulerEvent, state: &SchedulerState) {
        match event {
            SchedulerEvent::TaskReady { task, .. } => {
                let is_root = state.task_spec(*task).map_or(true, |t| t.is_root());
                let won = self.play(is_root);
                self.wins.insert(*task, won);
            }
            SchedulerEvent::TaskAssigned { task, .. } => {
                self.wins.remove(task);
            }
            SchedulerEvent::JobFinished { job, .. } => {
                self.wins.retain(|task, _| task.job != *job);
            }
            _ => {}
        }
    }
}

impl TaskOrderPolicy for LotteryTaskOrder {
    fn compare(&self, a: TaskId, b: TaskId, _state: &SchedulerState) -> Ordering {
        let a = self.wins.get(&a).copied().unwrap_or(0);
        let b = self.wins.get(&b).copied().unwrap_or(0);
        b.cmp(&a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::JobId;
    use crate::tests::state_with_jobs;

    fn draw(seed: u64) -> Vec<u32> {
        let state = state_with_jobs(&[8]);
        let mut policy = LotteryTaskOrder::new(10, seed);
        (0..8)
            .map(|i| {
                let task = TaskId::new(JobId(0), i);
                policy.on_event(&SchedulerEvent::TaskReady { time: 0., task }, &state);
                policy.wins(task).unwrap()
            })
            .collect()
    }

    #[test]
    fn same_seed_same_tickets() {
        assert_eq!(draw(7), draw(7));
        assert!(draw(7).iter().all(|&w| w <= 10));
    }

    #[test]
    fn more_wins_go_first() {
        let state = state_with_jobs(&[2]);
        let mut policy = LotteryTaskOrder::new(5, 0);
        let (x, y) = (TaskId::new(JobId(0), 0), TaskId::new(JobId(0), 1));
        policy.wins.insert(x, 1);
        policy.wins.insert(y, 4);
        assert_eq!(policy.compare(x, y, &state), Ordering::Greater);
        policy.on_event(&SchedulerEvent::TaskAssigned { time: 0., task: y, node: crate::node::NodeId(0) }, &state);
        assert_eq!(policy.wins(y), None);
        assert_eq!(policy.compare(x, y, &state), Ordering::Less);
    }
}
