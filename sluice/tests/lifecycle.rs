mod common;

use sluice::processors::ResponseScopedAdapter;
use sluice::testing::{Appending, AppendingInterceptor, Journal};
use sluice::{
    Chain, ChainBuilder, Element, Flow, LifecycleError, LifecyclePhase, LifecycleState, ProcessorRef,
};

#[tokio::test]
async fn test_every_processor_completes_lifecycle_once() {
    let plain = Appending::new("1");
    let interceptor = AppendingInterceptor::new("2");
    let nested_plain = Appending::new("a");
    let nested_interceptor = AppendingInterceptor::new("b");
    let response_scoped = Appending::new("r");

    let flow = Flow::builder("lifecycle")
        .processor(plain.clone())
        .chain(interceptor.clone())
        .chain(
            ChainBuilder::new()
                .chain(nested_interceptor.clone())
                .processor(nested_plain.clone()),
        )
        .chain(ResponseScopedAdapter::new(response_scoped.clone()))
        .build()
        .unwrap();

    flow.initialise().unwrap();
    flow.start().unwrap();
    let outcome = flow.process(flow.event("0")).await;
    flow.stop().unwrap();
    flow.dispose().unwrap();

    assert_eq!(common::payload(&outcome), "01before2beforebaafterbrafter2");
    assert!(plain.lifecycle_log().completed_once());
    assert!(interceptor.lifecycle_log().completed_once());
    assert!(nested_plain.lifecycle_log().completed_once());
    assert!(nested_interceptor.lifecycle_log().completed_once());
    assert!(response_scoped.lifecycle_log().completed_once());
}

#[test]
fn test_start_runs_forward_and_stop_runs_backward() {
    let journal = Journal::default();
    let flow = Flow::builder("ordered")
        .processor(Appending::journaled("1", &journal))
        .chain(
            ChainBuilder::new()
                .processor(Appending::journaled("a", &journal))
                .processor(Appending::journaled("b", &journal)),
        )
        .chain(AppendingInterceptor::journaled("2", &journal))
        .build()
        .unwrap();

    flow.initialise().unwrap();
    flow.start().unwrap();
    flow.stop().unwrap();

    assert_eq!(
        *journal.lock(),
        [
            "initialise:1",
            "initialise:a",
            "initialise:b",
            "initialise:2",
            "start:1",
            "start:a",
            "start:b",
            "start:2",
            "stop:2",
            "stop:b",
            "stop:a",
            "stop:1",
        ]
    );
}

#[test]
fn test_failed_start_stops_at_failing_processor() {
    let journal = Journal::default();
    let first = Appending::journaled("1", &journal);
    let second = Appending::journaled("2", &journal);
    let third = Appending::journaled("3", &journal);
    second.lifecycle_log().fail_on(LifecyclePhase::Start);

    let flow = Flow::builder("fail-fast")
        .processor(first)
        .processor(second)
        .processor(third.clone())
        .build()
        .unwrap();
    flow.initialise().unwrap();

    let error = flow.start().unwrap_err();

    assert!(matches!(error, LifecycleError::Failed { phase: LifecyclePhase::Start, .. }));
    assert_eq!(error.component(), "append:2");
    assert_eq!(third.lifecycle_log().count(LifecyclePhase::Start), 0);
}

#[test]
fn test_failed_stop_still_stops_everything_else() {
    let first = Appending::new("1");
    let second = Appending::new("2");
    second.lifecycle_log().fail_on(LifecyclePhase::Stop);

    let flow = Flow::builder("best-effort")
        .processor(first.clone())
        .processor(second.clone())
        .build()
        .unwrap();
    flow.initialise().unwrap();
    flow.start().unwrap();

    let error = flow.stop().unwrap_err();

    assert_eq!(error.component(), "append:2");
    assert_eq!(first.lifecycle_log().count(LifecyclePhase::Stop), 1);
    assert!(flow.chain().steps().all(|step| step.state() == LifecycleState::Stopped));
}

#[test]
fn test_context_and_flow_are_injected_before_initialise() {
    let plain = Appending::new("1");
    let nested = Appending::new("a");
    let flow = Flow::builder("inject")
        .processor(plain.clone())
        .chain(Chain::from_single(nested.clone()))
        .build()
        .unwrap();

    assert!(!plain.lifecycle_log().context_injected());
    flow.initialise().unwrap();

    for log in [plain.lifecycle_log(), nested.lifecycle_log()] {
        assert!(log.context_injected());
        assert!(log.flow_injected());
        assert_eq!(log.count(LifecyclePhase::Initialise), 1);
    }
}

#[test]
fn test_disposed_flow_cannot_restart() {
    let flow = Flow::builder("done")
        .chain(Element::processor(Appending::new("1")))
        .build()
        .unwrap();
    flow.initialise().unwrap();
    flow.start().unwrap();
    flow.stop().unwrap();
    flow.dispose().unwrap();

    let error = flow.start().unwrap_err();

    assert!(matches!(error, LifecycleError::InvalidTransition { .. }));
}

#[test]
fn test_restart_after_stop() {
    let plain = Appending::new("1");
    let flow = Flow::builder("restart").processor(plain.clone()).build().unwrap();
    flow.initialise().unwrap();
    flow.start().unwrap();
    flow.stop().unwrap();

    flow.start().unwrap();

    assert_eq!(plain.lifecycle_log().count(LifecyclePhase::Start), 2);
    assert_eq!(plain.lifecycle_log().count(LifecyclePhase::Initialise), 1);
}

#[tokio::test]
async fn test_shared_instance_runs_lifecycle_once() {
    let shared = Appending::new("s");
    let handle = ProcessorRef::new(shared.clone());
    let flow = Flow::builder("shared")
        .chain(handle.clone())
        .chain(ChainBuilder::new().chain(handle.clone()))
        .chain(ChainBuilder::new().chain(ChainBuilder::new().chain(handle)))
        .build()
        .unwrap();

    flow.initialise().unwrap();
    flow.start().unwrap();
    let outcome = flow.process(flow.event("0")).await;
    flow.stop().unwrap();
    flow.dispose().unwrap();

    assert_eq!(common::payload(&outcome), "0sss");
    assert_eq!(shared.invocations().len(), 3);
    assert!(shared.lifecycle_log().completed_once());
}

#[test]
fn test_members_started_before_nested_failure_are_stopped() {
    let outer = Appending::new("a");
    let started_inner = Appending::new("b");
    let refusing = Appending::new("c");
    refusing.lifecycle_log().fail_on(LifecyclePhase::Start);

    let flow = Flow::builder("partial")
        .processor(outer.clone())
        .chain(
            ChainBuilder::new()
                .processor(started_inner.clone())
                .processor(refusing.clone()),
        )
        .build()
        .unwrap();
    flow.initialise().unwrap();
    assert!(flow.start().is_err());

    flow.stop().unwrap();
    flow.dispose().unwrap();

    for log in [outer.lifecycle_log(), started_inner.lifecycle_log()] {
        assert_eq!(log.count(LifecyclePhase::Start), 1);
        assert_eq!(log.count(LifecyclePhase::Stop), 1);
        assert_eq!(log.count(LifecyclePhase::Dispose), 1);
    }
    assert_eq!(refusing.lifecycle_log().count(LifecyclePhase::Stop), 0);
    assert_eq!(refusing.lifecycle_log().count(LifecyclePhase::Dispose), 1);
}
