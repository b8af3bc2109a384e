use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Deterministic dependency-count scheduler over node positions `0..n`.
///
/// Determinism rule: when several nodes are ready, the lowest position (earliest
/// insertion into the model) is returned first. Nodes on a cycle never become ready;
/// they are what [`remaining`](Self::remaining) still counts once `pop_ready` is empty.
pub(crate) struct DagScheduler {
    indeg: Vec<u32>,
    dependents: Vec<Vec<u32>>,
    ready: BinaryHeap<Reverse<u32>>,
    remaining: usize,
}

impl DagScheduler {
    /// `deps[i]` lists the positions node `i` reads from. Duplicates are allowed (one node
    /// feeding two slots of another) and are counted once each.
    pub(crate) fn new(deps: &[Vec<u32>]) -> Self {
        let n = deps.len();
        let mut indeg = vec![0u32; n];
        let mut dependents = vec![Vec::<u32>::new(); n];

        for (i, ds) in deps.iter().enumerate() {
            for &d in ds {
                dependents[d as usize].push(i as u32);
                indeg[i] = indeg[i].saturating_add(1);
            }
        }

        let mut ready = BinaryHeap::<Reverse<u32>>::new();
        for (i, &deg) in indeg.iter().enumerate() {
            if deg == 0 {
                ready.push(Reverse(i as u32));
            }
        }

        Self {
            indeg,
            dependents,
            ready,
            remaining: n,
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.remaining
    }

    pub(crate) fn pop_ready(&mut self) -> Option<u32> {
        let Reverse(i) = self.ready.pop()?;
        Some(i)
    }

    pub(crate) fn mark_done(&mut self, done: u32) {
        self.remaining = self.remaining.saturating_sub(1);
        for &dep in &self.dependents[done as usize] {
            let d = &mut self.indeg[dep as usize];
            *d = d.saturating_sub(1);
            if *d == 0 {
                self.ready.push(Reverse(dep));
            }
        }
    }

    /// Drain the schedule: `(order, blocked)` where `blocked` are positions on or behind a
    /// cycle, ascending.
    pub(crate) fn run(mut self) -> (Vec<u32>, Vec<u32>) {
        let mut order = Vec::with_capacity(self.indeg.len());
        let mut scheduled = vec![false; self.indeg.len()];
        while let Some(next) = self.pop_ready() {
            order.push(next);
            scheduled[next as usize] = true;
            self.mark_done(next);
        }
        let blocked = scheduled
            .iter()
            .enumerate()
            .filter(|(_, s)| !**s)
            .map(|(i, _)| i as u32)
            .collect();
        (order, blocked)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/scheduler.rs"]
mod tests;
