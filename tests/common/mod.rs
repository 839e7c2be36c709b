#![allow(dead_code)]

use ledgerpay::application::batch::{Job, JobResult};
use ledgerpay::domain::charge::{Amount, Charge};
use ledgerpay::domain::ports::ChargeSource;
use ledgerpay::error::Result;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn charge(id: &str, building: &str, user: &str, amount: Decimal, due_at: i64) -> Charge {
    Charge::new(id, building, user, Amount::new(amount).unwrap(), due_at)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Start(usize),
    End(usize),
}

/// Records when jobs start and end, and the peak number of jobs running at once.
#[derive(Default)]
pub struct Tracker {
    active: AtomicUsize,
    max_active: AtomicUsize,
    events: Mutex<Vec<Event>>,
}

impl Tracker {
    fn start(&self, index: usize) {
        self.events.lock().unwrap().push(Event::Start(index));
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
    }

    fn end(&self, index: usize) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(Event::End(index));
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn started(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Start(index) => Some(index),
                Event::End(_) => None,
            })
            .collect()
    }

    pub fn ended(&self, index: usize) -> bool {
        self.events().contains(&Event::End(index))
    }

    pub fn position(&self, event: Event) -> Option<usize> {
        self.events().iter().position(|e| *e == event)
    }
}

/// A job that sleeps for `delay` while tracked, then succeeds or fails.
pub fn tracked_job(tracker: &Arc<Tracker>, index: usize, delay: Duration, fail: bool) -> Job {
    let tracker = tracker.clone();
    Job::new(move || async move {
        tracker.start(index);
        tokio::time::sleep(delay).await;
        tracker.end(index);
        let result: JobResult = if fail {
            Err(format!("boom at {index}").into())
        } else {
            Ok(())
        };
        result
    })
}

pub fn tracked_jobs(tracker: &Arc<Tracker>, count: usize, delay: Duration) -> Vec<Job> {
    (0..count)
        .map(|index| tracked_job(tracker, index, delay, false))
        .collect()
}

/// A charge source that counts how often it is read.
pub struct CountingChargeSource {
    charges: Vec<Charge>,
    reads: Arc<AtomicUsize>,
}

impl CountingChargeSource {
    pub fn new(charges: Vec<Charge>) -> (Self, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        (
            Self {
                charges,
                reads: reads.clone(),
            },
            reads,
        )
    }
}

#[async_trait::async_trait]
impl ChargeSource for CountingChargeSource {
    async fn charges(&self) -> Result<Vec<Charge>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.charges.clone())
    }
}
