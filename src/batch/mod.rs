//! Sequential (or bounded-parallel) validation of an address list.
//!
//! [`BatchRunner::run`] validates records in input order, pausing between
//! addresses that reached the SMTP stage so remote servers are not hammered,
//! and collects a [`BatchReport`]. Every record yields exactly one row unless
//! the run is cancelled, in which case the rows completed so far are kept.

mod cancel;
mod report;

pub use cancel::CancelFlag;
pub use report::{BatchReport, Row};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::validator::{Stage, Validate, ValidationResult};

/// A batch input item carrying an address.
pub trait EmailRecord {
    fn email(&self) -> &str;
}

impl EmailRecord for String {
    fn email(&self) -> &str {
        self
    }
}

impl EmailRecord for &str {
    fn email(&self) -> &str {
        self
    }
}

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Pause after each address that reached the SMTP stage.
    pub delay: Duration,
    /// Number of concurrent workers; 1 keeps the run strictly sequential.
    pub workers: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1_500),
            workers: 1,
        }
    }
}

pub struct BatchRunner<V> {
    validator: V,
    options: BatchOptions,
    cancel: CancelFlag,
}

impl<V> BatchRunner<V>
where
    V: Validate + Sync,
{
    pub fn new(validator: V, options: BatchOptions) -> Self {
        Self {
            validator,
            options,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Validates every record and returns the report in input order.
    pub fn run<R, I>(&self, records: I) -> BatchReport<R>
    where
        R: EmailRecord + Send,
        I: IntoIterator<Item = R>,
    {
        if self.options.workers > 1 {
            self.run_pool(records.into_iter().collect())
        } else {
            self.run_sequential(records)
        }
    }

    fn run_sequential<R, I>(&self, records: I) -> BatchReport<R>
    where
        R: EmailRecord,
        I: IntoIterator<Item = R>,
    {
        let mut report = BatchReport::new();
        let mut pause_pending = false;

        for (index, record) in records.into_iter().enumerate() {
            if self.cancel.is_cancelled()
                || (pause_pending && !self.cancel.sleep(self.options.delay))
            {
                info!(completed = index, "batch cancelled");
                report.mark_cancelled();
                break;
            }
            let result = self.check(index, record.email());
            pause_pending = result.stage_reached() == Stage::Smtp;
            report.push(record, result);
        }
        report
    }

    fn run_pool<R>(&self, records: Vec<R>) -> BatchReport<R>
    where
        R: EmailRecord + Send,
    {
        let queue = Mutex::new(records.into_iter().enumerate().peekable());
        let (tx, rx) = mpsc::channel();

        thread::scope(|scope| {
            for _ in 0..self.options.workers {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move || {
                    let mut pause_pending = false;
                    loop {
                        if self.cancel.is_cancelled() {
                            break;
                        }
                        // pause before dequeuing so a cancelled pause never drops a record
                        if pause_pending {
                            let drained = queue
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .peek()
                                .is_none();
                            if drained || !self.cancel.sleep(self.options.delay) {
                                break;
                            }
                        }
                        let next = queue
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .next();
                        let Some((index, record)) = next else {
                            break;
                        };
                        let result = self.check(index, record.email());
                        pause_pending = result.stage_reached() == Stage::Smtp;
                        if tx.send((index, record, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);
        });

        let mut done: Vec<(usize, R, ValidationResult)> = rx.into_iter().collect();
        done.sort_by_key(|(index, _, _)| *index);

        let mut report = BatchReport::new();
        for (_, record, result) in done {
            report.push(record, result);
        }
        if self.cancel.is_cancelled() {
            info!(completed = report.len(), "batch cancelled");
            report.mark_cancelled();
        }
        report
    }

    /// Validates one address, turning a panic inside the validator into an
    /// `internal error` row.
    fn check(&self, index: usize, email: &str) -> ValidationResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.validator.validate(email)));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                let detail = panic_detail(payload.as_ref());
                warn!(index, email, detail, "validator fault");
                ValidationResult::internal_error(email, detail)
            }
        };
        if result.valid() {
            info!(index, email, "valid");
        } else {
            info!(index, email, reason = %result.reason(), "invalid");
        }
        result
    }
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "validator panicked".to_string()
    }
}
