//! Event listener integration suite.
//!
//! Callback-driven completion, composed with the rest of the algebra.
//!
//! Run with: `cargo test --test listener`

#[macro_use]
mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use bide::{Cx, Error, ErrorKind, Event, EventListener, Waited};

fn init_test(name: &str) {
    common::init_test_logging();
    test_phase!(name);
}

#[test]
fn test_callback_triggers_the_waiting_test() {
    init_test("test_callback_triggers_the_waiting_test");
    let received = EventListener::new();
    let on_message = received.clone();
    // Stands in for handing the clone to a client callback registration.
    let producer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(15));
        on_message.trigger("payload");
    });
    let waited = received
        .wait_up_to(&Cx::new(), Duration::from_secs(5))
        .unwrap();
    producer.join().unwrap();
    assert_with_log!(
        waited == Waited::Value("payload"),
        "delivered value",
        Waited::Value("payload"),
        waited
    );
}

#[test]
fn test_error_completion_reaches_every_waiter() {
    init_test("test_error_completion_reaches_every_waiter");
    let listener: EventListener<u32> = EventListener::new();
    listener.trigger_error(Error::new(ErrorKind::Internal).with_message("handshake refused"));
    for _ in 0..2 {
        let err = listener
            .wait_up_to(&Cx::new(), Duration::from_millis(10))
            .unwrap_err();
        assert_with_log!(
            err.to_string().contains("handshake refused"),
            "re-raised error",
            "handshake refused",
            err.to_string()
        );
    }
}

#[test]
fn test_only_the_first_trigger_counts() {
    init_test("test_only_the_first_trigger_counts");
    let listener = EventListener::new();
    let won_first = listener.trigger(1);
    let won_second = listener.trigger(2);
    let won_error = listener.trigger_error(Error::internal("late"));
    assert_with_log!(won_first, "first trigger wins", true, won_first);
    assert_with_log!(!won_second, "second trigger ignored", false, won_second);
    assert_with_log!(!won_error, "late error ignored", false, won_error);
    let waited = listener
        .wait_up_to(&Cx::new(), Duration::from_millis(10))
        .unwrap();
    assert_with_log!(waited == Waited::Value(1), "first value kept", Waited::Value(1), waited);
}

#[test]
fn test_untriggered_listener_times_out_with_its_description() {
    init_test("test_untriggered_listener_times_out_with_its_description");
    let listener = EventListener::<u32>::new().described_as("a webhook delivery");
    let before = Instant::now();
    let err = listener
        .wait_up_to(&Cx::new(), Duration::from_millis(50))
        .unwrap_err();
    assert_with_log!(err.is_timeout(), "timeout", true, err.is_timeout());
    assert_with_log!(
        before.elapsed() >= Duration::from_millis(50),
        "waited the full budget",
        "at least 50ms",
        before.elapsed()
    );
    assert_with_log!(
        err.to_string().contains("a webhook delivery"),
        "description in message",
        "a webhook delivery",
        err.to_string()
    );
}

#[test]
fn test_listener_composes_with_after_and_or() {
    init_test("test_listener_composes_with_after_and_or");
    let reply = EventListener::new();
    let reject = EventListener::new();
    let trigger = reply.clone();
    let waited = reject
        .or(reply)
        .after(move || {
            let trigger = trigger.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                trigger.trigger(5u32);
            });
        })
        .wait_up_to(&Cx::new(), Duration::from_secs(5))
        .unwrap();
    assert_with_log!(waited == Waited::Value(5), "raced reply", Waited::Value(5u32), waited);
}

#[test]
fn test_cancelled_listener_wait_is_a_sentinel() {
    init_test("test_cancelled_listener_wait_is_a_sentinel");
    let listener = EventListener::<u32>::new();
    let cx = Cx::new();
    let remote = cx.clone();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        remote.cancel();
    });
    let before = Instant::now();
    let waited = listener.wait_up_to(&cx, Duration::from_secs(30)).unwrap();
    canceller.join().unwrap();
    assert_with_log!(waited.is_cancelled(), "cancelled", true, waited.is_cancelled());
    assert_with_log!(
        before.elapsed() < Duration::from_secs(5),
        "prompt wake",
        "well under 5s",
        before.elapsed()
    );
}

#[test]
fn test_virtual_clock_callback_can_trigger_a_listener() {
    init_test("test_virtual_clock_callback_can_trigger_a_listener");
    // A scheduled callback fires mid-sleep on the virtual clock; the
    // listener completes while a poll branch is still sleeping.
    let clock = Arc::new(bide::VirtualTimeKeeper::new());
    let shared: Arc<dyn bide::TimeKeeper> = Arc::clone(&clock) as _;
    let listener = EventListener::<u32>::new().with_time_keeper(Arc::clone(&shared));
    let handle = listener.clone();
    clock.schedule_callback(Duration::from_millis(30), move || {
        handle.trigger(77);
    });
    // Sleeping past 30ms virtually delivers the trigger, then the wait
    // observes the completed gate without blocking.
    clock.advance(Duration::from_millis(40));
    let waited = listener
        .wait_up_to(&Cx::new(), Duration::from_millis(1))
        .unwrap();
    assert_with_log!(waited == Waited::Value(77), "triggered by callback", Waited::Value(77u32), waited);
}
