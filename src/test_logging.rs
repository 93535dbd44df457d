//! Log capture for unit tests
//!
//! Installs one process-wide logger that records into a thread-local buffer, so
//! tests running in parallel only see their own records.

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::cell::RefCell;
use std::sync::Once;

struct CapturingLogger;

thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
}

impl Log for CapturingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        RECORDS.with(|records| {
            records
                .borrow_mut()
                .push((record.level(), record.args().to_string()))
        });
    }

    fn flush(&self) {}
}

static LOGGER: CapturingLogger = CapturingLogger;
static INIT: Once = Once::new();

/// Run `f` and return its result with the messages logged at `level` meanwhile
pub fn capture<T>(level: Level, f: impl FnOnce() -> T) -> (T, Vec<String>) {
    INIT.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
    RECORDS.with(|records| records.borrow_mut().clear());

    let result = f();

    let messages = RECORDS.with(|records| {
        records
            .borrow_mut()
            .drain(..)
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message)
            .collect()
    });
    (result, messages)
}
