mod common;

use common::{appending, intercepting, started};
use sluice::error_handler::{ERROR_VARIABLE, ErrorHandler, OnErrorStrategy};
use sluice::strategy::NonBlockingProcessingStrategy;
use sluice::testing::{Appending, Failing, Journal, ReturnEmpty};
use sluice::{
    Chain, ChainBuilder, ConfigurationError, ExchangePattern, Flow, FlowConstruct, LifecyclePhase,
    Outcome, ReplyHandler, SluiceError, TimeoutError,
};
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn test_handled_failure_continues_with_handler_result() {
    let handling = Appending::new("h");
    let flow = started(
        Flow::builder("handled")
            .chain(appending("1"))
            .processor(Failing::new("boom"))
            .chain(appending("2"))
            .error_handler(
                ErrorHandler::new().on_error(OnErrorStrategy::any(Chain::from_single(handling.clone()))),
            ),
    );

    let outcome = flow.process(flow.event("0")).await;

    let event = outcome.as_event().unwrap();
    assert_eq!(event.payload_text(), "01h");
    assert!(event.variable(ERROR_VARIABLE).is_none());
    let routed = handling.invocations();
    assert_eq!(routed[0].variable(ERROR_VARIABLE).and_then(|v| v.as_str()), Some("boom"));
}

#[tokio::test]
async fn test_strategies_are_tried_in_order() {
    let timeouts = Appending::new("t");
    let by_name = Appending::new("n");
    let fallback = Appending::new("f");
    let handler = ErrorHandler::new()
        .on_error(OnErrorStrategy::of::<TimeoutError>(Chain::from_single(timeouts.clone())))
        .on_error(OnErrorStrategy::when(
            |failure| failure.processor().name() == "failing",
            Chain::from_single(by_name.clone()),
        ))
        .on_error(OnErrorStrategy::any(Chain::from_single(fallback.clone())));
    let flow = started(
        Flow::builder("ordered")
            .processor(Failing::new("boom"))
            .error_handler(handler),
    );

    let outcome = flow.process(flow.event("0")).await;

    assert_eq!(common::payload(&outcome), "0n");
    assert!(!timeouts.invoked());
    assert!(!fallback.invoked());
}

#[tokio::test]
async fn test_propagating_strategy_keeps_the_failure() {
    let failing = Failing::new("boom");
    let notified = Appending::new("n");
    let flow = started(
        Flow::builder("propagating")
            .chain(intercepting("1"))
            .processor(failing.clone())
            .error_handler(
                ErrorHandler::new()
                    .on_error(OnErrorStrategy::any(Chain::from_single(notified.clone())).propagating()),
            ),
    );

    let outcome = flow.process(flow.event("0")).await;

    let error = outcome.as_failure().unwrap();
    assert_eq!(error.cause().to_string(), "boom");
    assert!(sluice::Event::ptr_eq(error.event(), &failing.invocations()[0]));
    assert_eq!(notified.invocations()[0].payload_text(), "0before1");
}

#[tokio::test]
async fn test_unaccepted_failure_reaches_caller() {
    let flow = started(
        Flow::builder("unaccepted")
            .processor(Failing::new("boom"))
            .error_handler(
                ErrorHandler::new()
                    .on_error(OnErrorStrategy::of::<TimeoutError>(Chain::from_single(Appending::new("t")))),
            ),
    );

    let outcome = flow.process(flow.event("0")).await;

    assert_eq!(outcome.as_failure().unwrap().processor().name(), "failing");
}

#[tokio::test]
async fn test_handler_chain_may_end_with_empty() {
    let flow = started(
        Flow::builder("swallowed")
            .processor(Failing::new("boom"))
            .error_handler(ErrorHandler::new().on_error(OnErrorStrategy::any(
                ChainBuilder::new().processor(ReturnEmpty::new()).build().unwrap(),
            ))),
    );

    let outcome = flow.process(flow.event("0")).await;

    assert!(outcome.is_empty());
}

#[derive(Default)]
struct Replies(Mutex<Vec<&'static str>>);

impl ReplyHandler for Replies {
    fn on_reply(&self, outcome: &Outcome) {
        self.0.lock().unwrap().push(outcome.kind());
    }
}

#[tokio::test]
async fn test_reply_carries_handled_outcome() {
    let replies = Arc::new(Replies::default());
    let flow = started(
        Flow::builder("reply")
            .processor(Failing::new("boom"))
            .error_handler(
                ErrorHandler::new().on_error(OnErrorStrategy::any(Chain::from_single(Appending::new("h")))),
            ),
    );

    let event = sluice::Event::builder("0")
        .exchange_pattern(ExchangePattern::RequestResponse)
        .reply_to(replies.clone())
        .build();
    flow.process(event).await;

    assert_eq!(*replies.0.lock().unwrap(), ["value"]);
}

#[tokio::test]
async fn test_handler_chains_follow_flow_lifecycle() {
    let journal = Journal::default();
    let handling = Appending::journaled("h", &journal);
    let flow = Flow::builder("cascade")
        .processor(Appending::journaled("1", &journal))
        .error_handler(ErrorHandler::new().on_error(OnErrorStrategy::any(Chain::from_single(handling.clone()))))
        .build()
        .unwrap();

    flow.initialise().unwrap();
    flow.start().unwrap();
    flow.stop().unwrap();
    flow.dispose().unwrap();

    assert!(handling.lifecycle_log().completed_once());
    assert!(handling.lifecycle_log().context_injected());
    assert!(handling.lifecycle_log().flow_injected());
    assert_eq!(
        *journal.lock(),
        [
            "initialise:1",
            "initialise:h",
            "start:1",
            "start:h",
            "stop:h",
            "stop:1",
            "dispose:h",
            "dispose:1",
        ]
    );
}

#[test]
fn test_failed_handler_start_is_reported() {
    let handling = Appending::new("h");
    handling.lifecycle_log().fail_on(LifecyclePhase::Start);
    let flow = Flow::builder("refused")
        .processor(Appending::new("1"))
        .error_handler(ErrorHandler::new().on_error(OnErrorStrategy::any(Chain::from_single(handling.clone()))))
        .build()
        .unwrap();
    flow.initialise().unwrap();

    let error = flow.start().unwrap_err();

    assert_eq!(error.component(), "append:h");
    assert!(flow.is_stopped());
}

#[test]
fn test_builder_start_reports_configuration_errors() {
    let error = Flow::builder("misconfigured")
        .strategy(Arc::new(NonBlockingProcessingStrategy::with_max_workers(0)))
        .chain(appending("1"))
        .start()
        .unwrap_err();

    assert!(matches!(error, SluiceError::Configuration(ConfigurationError::Strategy { .. })));
}

#[tokio::test]
async fn test_builder_start_returns_running_flow() {
    let flow = Flow::builder("running").chain(appending("1")).start().unwrap();

    let outcome = flow.process(flow.event("0")).await;

    assert_eq!(common::payload(&outcome), "01");
}
