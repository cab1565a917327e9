use biometrics::{Collector, Counter, Moments};

pub(crate) static TURNS_STARTED: Counter = Counter::new("palaver.session.turns_started");
pub(crate) static TURNS_COMPLETED: Counter = Counter::new("palaver.session.turns_completed");
pub(crate) static TURNS_FAILED: Counter = Counter::new("palaver.session.turns_failed");
pub(crate) static COMMANDS: Counter = Counter::new("palaver.session.commands");
pub(crate) static UNKNOWN_COMMANDS: Counter = Counter::new("palaver.session.unknown_commands");

pub(crate) static STREAM_REQUESTS: Counter = Counter::new("palaver.stream.requests");
pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("palaver.stream.fragments");
pub(crate) static STREAM_BYTES: Counter = Counter::new("palaver.stream.bytes");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("palaver.stream.errors");
pub(crate) static STREAM_DURATION: Moments = Moments::new("palaver.stream.duration_seconds");

pub(crate) static STORE_LOADS: Counter = Counter::new("palaver.store.loads");
pub(crate) static STORE_EXPIRED: Counter = Counter::new("palaver.store.expired");
pub(crate) static STORE_LOAD_ERRORS: Counter = Counter::new("palaver.store.load_errors");
pub(crate) static STORE_SAVES: Counter = Counter::new("palaver.store.saves");
pub(crate) static STORE_SAVE_ERRORS: Counter = Counter::new("palaver.store.save_errors");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&TURNS_STARTED);
    collector.register_counter(&TURNS_COMPLETED);
    collector.register_counter(&TURNS_FAILED);
    collector.register_counter(&COMMANDS);
    collector.register_counter(&UNKNOWN_COMMANDS);

    collector.register_counter(&STREAM_REQUESTS);
    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&STORE_LOADS);
    collector.register_counter(&STORE_EXPIRED);
    collector.register_counter(&STORE_LOAD_ERRORS);
    collector.register_counter(&STORE_SAVES);
    collector.register_counter(&STORE_SAVE_ERRORS);
}
