use super::*;

#[test]
fn scheduler_is_topological_and_deterministic() {
    // 0 -> 2, 1 -> 2, 2 -> 3
    let deps = vec![vec![], vec![], vec![0, 1], vec![2]];
    let (order, blocked) = DagScheduler::new(&deps).run();
    assert_eq!(order, vec![0, 1, 2, 3]);
    assert!(blocked.is_empty());
}

#[test]
fn ties_break_by_insertion_position() {
    // 3 has no deps but was inserted last; 0 depends on 3.
    let deps = vec![vec![3], vec![], vec![1], vec![]];
    let (order, _) = DagScheduler::new(&deps).run();
    assert_eq!(order, vec![1, 2, 3, 0]);
}

#[test]
fn cycles_and_their_dependents_are_blocked() {
    // 1 <-> 2, 3 reads 2, 0 is free.
    let deps = vec![vec![], vec![2], vec![1], vec![2]];
    let mut sched = DagScheduler::new(&deps);
    assert_eq!(sched.pop_ready(), Some(0));
    sched.mark_done(0);
    assert_eq!(sched.pop_ready(), None);
    assert_eq!(sched.remaining(), 3);

    let (order, blocked) = DagScheduler::new(&deps).run();
    assert_eq!(order, vec![0]);
    assert_eq!(blocked, vec![1, 2, 3]);
}

#[test]
fn duplicate_edges_release_once_both_are_done() {
    // Node 1 reads node 0 on two slots.
    let deps = vec![vec![], vec![0, 0]];
    let (order, blocked) = DagScheduler::new(&deps).run();
    assert_eq!(order, vec![0, 1]);
    assert!(blocked.is_empty());
}
