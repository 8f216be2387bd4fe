//! Core traits for the engine's external seams
//!
//! Time and randomness are the only inputs the engine does not own. Both are
//! injected through the traits here so tests can pin the date (daily limits,
//! reference prefixes) and script the random draws (collision retries).

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
///
/// Used when replaying historic data and in tests that cross a day boundary.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Source of the random part of reference and account numbers
///
/// Implementations only draw characters; uniqueness is enforced by the store,
/// which asks for another draw on collision.
pub trait ReferenceSource: Send + Sync {
    /// Draw `len` characters, each taken from `alphabet`
    fn draw(&self, alphabet: &[u8], len: usize) -> String;
}

/// Thread-local RNG backed reference source
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomReferences;

impl ReferenceSource for RandomReferences {
    fn draw(&self, alphabet: &[u8], len: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..len)
            .map(|_| char::from(alphabet[rng.gen_range(0..alphabet.len())]))
            .collect()
    }
}
