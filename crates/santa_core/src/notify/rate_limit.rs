//! Send throttling strategies.
//!
//! The dispatcher calls [`RateLimiter::acquire`] before every send and
//! [`RateLimiter::completed`] once the send returns. `acquire` blocks the
//! calling thread until the next send is allowed.

use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

/// Throttle consulted before each outbound send.
pub trait RateLimiter {
    /// Blocks until the next send may start.
    fn acquire(&self);

    /// Records that the send allowed by the last `acquire` has finished.
    fn completed(&self) {}
}

/// No throttling.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unthrottled;

impl RateLimiter for Unthrottled {
    fn acquire(&self) {}
}

/// Fixed minimum pause between the end of one send and the start of the next.
///
/// The first send after construction is never delayed.
#[derive(Debug)]
pub struct FixedInterval {
    interval: Duration,
    last_send: Mutex<Option<Instant>>,
}

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_send: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl RateLimiter for FixedInterval {
    fn acquire(&self) {
        let mut last_send = lock(&self.last_send);
        if let Some(previous) = *last_send {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }
        *last_send = Some(Instant::now());
    }

    fn completed(&self) {
        *lock(&self.last_send) = Some(Instant::now());
    }
}

/// Token bucket: bursts up to `capacity`, then one send per `refill_every`.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    refill_every: Duration,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: u32,
    last_refill: Instant,
}

impl TokenBucket {
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: u32, refill_every: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            refill_every,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        if self.refill_every.is_zero() {
            state.tokens = self.capacity;
            state.last_refill = Instant::now();
            return;
        }
        let earned = state.last_refill.elapsed().as_nanos() / self.refill_every.as_nanos();
        if earned == 0 {
            return;
        }
        let room = self.capacity - state.tokens;
        if earned >= u128::from(room) {
            // Full bucket: partial progress towards the next token is dropped.
            state.tokens = self.capacity;
            state.last_refill = Instant::now();
        } else {
            let earned = earned as u32;
            state.tokens += earned;
            state.last_refill += self.refill_every * earned;
        }
    }
}

impl RateLimiter for TokenBucket {
    fn acquire(&self) {
        let mut state = lock(&self.state);
        loop {
            self.refill(&mut state);
            if state.tokens > 0 {
                state.tokens -= 1;
                return;
            }
            let next_token_in = self
                .refill_every
                .saturating_sub(state.last_refill.elapsed());
            thread::sleep(next_token_in);
        }
    }
}

impl<L: RateLimiter + ?Sized> RateLimiter for Box<L> {
    fn acquire(&self) {
        (**self).acquire()
    }

    fn completed(&self) {
        (**self).completed()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Limiter state stays valid even if a previous holder panicked.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
