//! Two-tier timed waits on the transport.
//!
//! A short poll interval re-logs a warning while the wait goes on; a hard
//! give-up deadline ends the wait. Both waits are busy polls on the
//! transport's buffered byte count.

use crate::protocol::{bytes_to_word, ACK, SENTINEL_WORD};
use crate::transport::Transport;
use crate::Result;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Poll interval and hard deadline for one kind of wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    /// How often a "still waiting" warning is logged.
    pub poll_interval: Duration,
    /// Hard ceiling after which the wait fails.
    pub give_up_after: Duration,
}

impl TimeoutPolicy {
    /// Creates a policy from millisecond values.
    pub const fn from_millis(poll_interval_ms: u64, give_up_after_ms: u64) -> Self {
        Self {
            poll_interval: Duration::from_millis(poll_interval_ms),
            give_up_after: Duration::from_millis(give_up_after_ms),
        }
    }

    /// Default policy for acknowledgment waits.
    pub const fn ack_default() -> Self {
        Self::from_millis(100, 4000)
    }

    /// Default policy for response word waits.
    pub const fn response_default() -> Self {
        Self::from_millis(100, 1000)
    }
}

/// Timing for both waits the dispatcher performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Waiting for the ACK byte.
    pub ack: TimeoutPolicy,
    /// Waiting for response words.
    pub response: TimeoutPolicy,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            ack: TimeoutPolicy::ack_default(),
            response: TimeoutPolicy::response_default(),
        }
    }
}

/// Result of waiting for an acknowledgment byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckWait {
    /// ACK (0x06) was read.
    Ack,
    /// Some other byte was read.
    Failed(u8),
    /// Nothing arrived before the give-up deadline.
    TimedOut,
}

struct Deadline {
    started: Instant,
    next_warning: Instant,
    give_up: Instant,
    poll_interval: Duration,
}

impl Deadline {
    fn start(policy: TimeoutPolicy) -> Self {
        let started = Instant::now();
        Self {
            started,
            next_warning: started + policy.poll_interval,
            give_up: started + policy.give_up_after,
            poll_interval: policy.poll_interval,
        }
    }

    /// Returns false once the give-up deadline has passed.
    fn keep_waiting(&mut self, what: &str) -> bool {
        let now = Instant::now();
        if now >= self.give_up {
            return false;
        }
        if now >= self.next_warning {
            warn!(
                "Timing out waiting for {} ({:?} elapsed)",
                what,
                now - self.started
            );
            self.next_warning = now + self.poll_interval;
        }
        std::hint::spin_loop();
        true
    }
}

/// Blocking waits bounded by a [`TimeoutPolicy`].
#[derive(Debug, Clone, Copy)]
pub struct TimeoutPoller {
    policy: TimeoutPolicy,
}

impl TimeoutPoller {
    /// Creates a poller with the given policy.
    pub fn new(policy: TimeoutPolicy) -> Self {
        Self { policy }
    }

    /// Spins until a byte arrives or the give-up deadline passes.
    pub fn wait_for_byte<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<AckWait> {
        let mut deadline = Deadline::start(self.policy);
        loop {
            if transport.available()? > 0 {
                if let Some(byte) = transport.read()? {
                    if byte == ACK {
                        trace!("Successful ack");
                        return Ok(AckWait::Ack);
                    }
                    return Ok(AckWait::Failed(byte));
                }
            }
            if !deadline.keep_waiting("ACK") {
                return Ok(AckWait::TimedOut);
            }
        }
    }

    /// Reads `count` big-endian words.
    ///
    /// Words that did not arrive before the give-up deadline are returned as
    /// [`SENTINEL_WORD`], so a truncated response shows up positionally at
    /// the tail of the result.
    pub fn wait_for_words<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        count: u16,
    ) -> Result<Vec<u16>> {
        let count = count as usize;
        let mut words = Vec::with_capacity(count);
        let mut deadline = Deadline::start(self.policy);

        while words.len() < count {
            if transport.available()? >= 2 {
                match (transport.read()?, transport.read()?) {
                    (Some(high), Some(low)) => words.push(bytes_to_word(high, low)),
                    _ => break,
                }
                continue;
            }
            if !deadline.keep_waiting("response") {
                break;
            }
        }

        words.resize(count, SENTINEL_WORD);
        Ok(words)
    }
}

/// Number of trailing sentinel words in a response.
pub(crate) fn missing_words(words: &[u16]) -> u16 {
    words.iter().rev().take_while(|&&w| w == SENTINEL_WORD).count() as u16
}
