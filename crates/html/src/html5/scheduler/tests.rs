use super::{ParserScheduler, PumpSession, SchedulerConfig};
use crate::html5::testing::ManualHost;
use core_types::TaskId;
use std::time::Duration;

fn token_budget(budget: u64) -> SchedulerConfig {
    SchedulerConfig {
        time_budget: Duration::from_secs(3600),
        token_budget: Some(budget),
        resume_delay: Duration::from_millis(5),
        ..SchedulerConfig::default()
    }
}

#[test]
fn defaults_are_conservative() {
    let config = SchedulerConfig::default();
    assert_eq!(config.time_budget, Duration::from_millis(200));
    assert_eq!(config.check_interval, 256);
    assert_eq!(config.token_budget, None);
    assert_eq!(config.resume_delay, Duration::ZERO);
}

#[test]
fn token_budget_yields_and_arms_one_resume_task() {
    let (host, log) = ManualHost::new();
    let mut scheduler = ParserScheduler::new(token_budget(3), Box::new(host));
    let mut session = PumpSession::new();

    let allowed = (0..10)
        .take_while(|_| scheduler.should_continue_parsing(&mut session))
        .count();
    assert_eq!(allowed, 3);
    assert_eq!(session.tokens_processed(), 3);
    assert!(scheduler.is_scheduled_for_resume());
    assert_eq!(
        log.borrow().posted,
        vec![(TaskId(1), Duration::from_millis(5))]
    );
    assert_eq!(scheduler.stats().yields, 1);
}

#[test]
fn zero_budget_still_makes_progress() {
    let (host, _log) = ManualHost::new();
    let mut scheduler = ParserScheduler::new(token_budget(0), Box::new(host));
    let mut session = PumpSession::new();
    assert!(scheduler.should_continue_parsing(&mut session));
    assert!(!scheduler.should_continue_parsing(&mut session));
}

#[test]
fn elapsed_time_budget_is_checked_every_interval() {
    let (host, _log) = ManualHost::new();
    let config = SchedulerConfig {
        time_budget: Duration::ZERO,
        check_interval: 4,
        ..SchedulerConfig::default()
    };
    let mut scheduler = ParserScheduler::new(config, Box::new(host));
    let mut session = PumpSession::new();
    let allowed = (0..100)
        .take_while(|_| scheduler.should_continue_parsing(&mut session))
        .count();
    // First token is free; the clock is read on the fourth check after it.
    assert_eq!(allowed, 4);
}

#[test]
fn generous_budget_never_yields() {
    let (host, log) = ManualHost::new();
    let mut scheduler = ParserScheduler::new(
        SchedulerConfig {
            time_budget: Duration::from_secs(3600),
            ..SchedulerConfig::default()
        },
        Box::new(host),
    );
    let mut session = PumpSession::new();
    for _ in 0..10_000 {
        assert!(scheduler.should_continue_parsing(&mut session));
    }
    assert!(log.borrow().posted.is_empty());
}

#[test]
fn only_the_armed_task_resumes() {
    let (host, _log) = ManualHost::new();
    let mut scheduler = ParserScheduler::new(token_budget(1), Box::new(host));
    let mut session = PumpSession::new();
    while scheduler.should_continue_parsing(&mut session) {}

    assert!(!scheduler.task_fired(TaskId(99)));
    assert!(scheduler.is_scheduled_for_resume());
    assert!(scheduler.task_fired(TaskId(1)));
    assert!(!scheduler.is_scheduled_for_resume());
    assert!(!scheduler.task_fired(TaskId(1)), "a task resumes at most once");
    assert_eq!(scheduler.stats().resumes, 1);
    assert_eq!(scheduler.stats().stale_tasks, 2);
}

#[test]
fn stop_and_drop_cancel_the_armed_task() {
    let (host, log) = ManualHost::new();
    let mut scheduler = ParserScheduler::new(token_budget(1), Box::new(host.clone()));
    let mut session = PumpSession::new();
    while scheduler.should_continue_parsing(&mut session) {}
    scheduler.stop();
    assert_eq!(log.borrow().cancelled, vec![TaskId(1)]);
    assert!(!scheduler.is_scheduled_for_resume());
    scheduler.stop();
    assert_eq!(log.borrow().cancelled.len(), 1);

    let (host, log) = ManualHost::new();
    {
        let mut scheduler = ParserScheduler::new(token_budget(1), Box::new(host));
        let mut session = PumpSession::new();
        while scheduler.should_continue_parsing(&mut session) {}
    }
    assert_eq!(log.borrow().cancelled, vec![TaskId(1)]);
}

#[test]
#[should_panic(expected = "while a resume is scheduled")]
fn pumping_while_scheduled_panics() {
    let (host, _log) = ManualHost::new();
    let mut scheduler = ParserScheduler::new(token_budget(1), Box::new(host));
    let mut session = PumpSession::new();
    while scheduler.should_continue_parsing(&mut session) {}
    let mut next = PumpSession::new();
    scheduler.should_continue_parsing(&mut next);
}
