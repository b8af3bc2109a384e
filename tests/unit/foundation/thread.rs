use super::*;

#[test]
fn owner_thread_passes() {
    let owner = OwnerThread::current();
    assert!(owner.is_current());
    owner.assert_current("set_model");
}

#[test]
fn foreign_thread_panics() {
    let owner = OwnerThread::current();
    let res = std::thread::spawn(move || owner.assert_current("set_outputs")).join();
    let payload = res.unwrap_err();
    let msg = payload
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_default();
    assert!(msg.contains("set_outputs"), "unexpected panic message: {msg}");
}
