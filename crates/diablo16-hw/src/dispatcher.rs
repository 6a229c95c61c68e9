//! Command/acknowledgment pipelining.
//!
//! The dispatcher writes one command at a time and decides per command
//! whether to wait for its ACK now or to collect it just before the next
//! command goes out. Whatever the caller chose, every ACK byte and every
//! response word is consumed in order before newer bytes are written, so the
//! stream stays framed across any sequence of calls.

use crate::command::Command;
use crate::error::LinkFault;
use crate::poller::{missing_words, AckWait, LinkConfig, TimeoutPoller};
use crate::protocol::SENTINEL_WORD;
use crate::transport::Transport;
use crate::Result;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn, Level};

/// What the link still owes from earlier commands.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct AckState {
    /// The last command's ACK byte has not been consumed yet.
    ack_owed: bool,
    /// Response words from deferred commands still in the stream.
    response_words_owed: u16,
    /// Last command written, for diagnostics.
    last_command: Option<&'static str>,
}

/// Pipelined command dispatcher.
///
/// Owns the transport exclusively. Calls must not overlap; the dispatcher
/// does no internal locking.
pub struct Dispatcher<P> {
    transport: P,
    ack_poller: TimeoutPoller,
    response_poller: TimeoutPoller,
    state: AckState,
    last_fault: Option<LinkFault>,
}

impl<P: Transport> Dispatcher<P> {
    /// Creates a dispatcher with default timeouts.
    pub fn new(transport: P) -> Self {
        Self::with_config(transport, LinkConfig::default())
    }

    /// Creates a dispatcher with explicit timeouts.
    pub fn with_config(transport: P, config: LinkConfig) -> Self {
        Self {
            transport,
            ack_poller: TimeoutPoller::new(config.ack),
            response_poller: TimeoutPoller::new(config.response),
            state: AckState::default(),
            last_fault: None,
        }
    }

    /// Sends `command` and resolves or defers its acknowledgment.
    ///
    /// Link faults do not produce `Err`: they are logged and the command
    /// yields `T::default()`. A default value may therefore mean "unknown".
    /// A non-blocking command never returns its response; the words are
    /// drained before the next command instead. Only transport I/O failures
    /// are returned as errors.
    pub fn invoke<T: Default>(&mut self, command: Command<T>) -> Result<T> {
        let name = command.name();
        trace!("Invoking: {}", name);
        let mut start = Instant::now();

        if self.state.ack_owed || self.state.response_words_owed > 0 {
            if !self.resolve_debt()? {
                error!(
                    "Not sending {}: {} is still unacknowledged",
                    name,
                    self.state.last_command.unwrap_or("unknown")
                );
                return Ok(T::default());
            }
            trace!("Previous command ack: {:?}", start.elapsed());
            start = Instant::now();
        }

        trace!("Writing request");
        for byte in command.encode() {
            self.transport.write(byte)?;
        }
        self.transport.flush()?;
        self.state.last_command = Some(name);

        let acknowledged = if command.is_blocking() {
            trace!("Blocking for ACK");
            match self.ack_poller.wait_for_byte(&mut self.transport)? {
                AckWait::Ack => true,
                AckWait::Failed(value) => {
                    // The ACK slot is consumed and a rejected command sends no response
                    self.fault(LinkFault::AckFailed {
                        command: name,
                        value,
                    });
                    log_latency(command.level(), name, start.elapsed());
                    return Ok(T::default());
                }
                AckWait::TimedOut => {
                    self.fault(LinkFault::AckTimeout { command: name });
                    false
                }
            }
        } else {
            false
        };

        let expected = command.response_words();
        let value = if acknowledged {
            trace!("Getting response");
            let words = self
                .response_poller
                .wait_for_words(&mut self.transport, expected)?;
            let missing = missing_words(&words);
            if missing > 0 {
                self.fault(LinkFault::ResponseTimeout {
                    command: name,
                    expected,
                    missing,
                });
            }
            command.decode(&words)
        } else {
            self.state.ack_owed = true;
            self.state.response_words_owed =
                self.state.response_words_owed.saturating_add(expected);
            T::default()
        };

        log_latency(command.level(), name, start.elapsed());
        Ok(value)
    }

    /// Collects any ACK and response words still owed, without sending a
    /// command.
    ///
    /// Returns false if the owed ACK did not arrive; the debt then stays in
    /// place for the next attempt.
    pub fn settle(&mut self) -> Result<bool> {
        self.resolve_debt()
    }

    /// Name of the command whose ACK is still owed.
    pub fn pending(&self) -> Option<&'static str> {
        if self.state.ack_owed {
            self.state.last_command
        } else {
            None
        }
    }

    /// Most recent link fault.
    pub fn last_fault(&self) -> Option<&LinkFault> {
        self.last_fault.as_ref()
    }

    /// Mutable access to the transport.
    pub fn transport_mut(&mut self) -> &mut P {
        &mut self.transport
    }

    /// Consumes the dispatcher, returning the transport.
    pub fn into_inner(self) -> P {
        self.transport
    }

    fn resolve_debt(&mut self) -> Result<bool> {
        let previous = self.state.last_command.unwrap_or("unknown");

        if self.state.ack_owed {
            match self.ack_poller.wait_for_byte(&mut self.transport)? {
                AckWait::Ack => {}
                AckWait::Failed(value) => {
                    self.fault(LinkFault::AckFailed {
                        command: previous,
                        value,
                    });
                    self.state.response_words_owed = 0;
                }
                AckWait::TimedOut => {
                    self.fault(LinkFault::AckTimeout { command: previous });
                    return Ok(false);
                }
            }
            self.state.ack_owed = false;
        }

        let owed = self.state.response_words_owed;
        if owed > 0 {
            let mut drained = 0;
            while drained < owed {
                let word = self.response_poller.wait_for_words(&mut self.transport, 1)?[0];
                if word == SENTINEL_WORD {
                    break;
                }
                debug!("Draining stale word 0x{:04X} from {}", word, previous);
                drained += 1;
                self.state.response_words_owed -= 1;
            }
            self.state.response_words_owed = 0;
            if drained > 0 {
                self.fault(LinkFault::StaleResponseDiscarded {
                    command: previous,
                    words: drained,
                });
            }
            if drained < owed {
                self.fault(LinkFault::ResponseTimeout {
                    command: previous,
                    expected: owed,
                    missing: owed - drained,
                });
            }
        }

        Ok(true)
    }

    fn fault(&mut self, fault: LinkFault) {
        match &fault {
            LinkFault::StaleResponseDiscarded { .. } => warn!("{}", fault),
            _ => error!("{}", fault),
        }
        self.last_fault = Some(fault);
    }
}

fn log_latency(level: Level, name: &str, elapsed: Duration) {
    match level {
        Level::ERROR => error!("Latency {}: {:?}", name, elapsed),
        Level::WARN => warn!("Latency {}: {:?}", name, elapsed),
        Level::INFO => info!("Latency {}: {:?}", name, elapsed),
        Level::DEBUG => debug!("Latency {}: {:?}", name, elapsed),
        _ => trace!("Latency {}: {:?}", name, elapsed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::test_support::{counting, LevelCounter};
    use crate::poller::TimeoutPolicy;
    use crate::protocol::Opcode;
    use crate::transport::mock::{Event, MockTransport};

    fn fast_config() -> LinkConfig {
        LinkConfig {
            ack: TimeoutPolicy::from_millis(5, 30),
            response: TimeoutPolicy::from_millis(5, 30),
        }
    }

    fn dispatcher(incoming: &[u8]) -> Dispatcher<MockTransport> {
        Dispatcher::with_config(MockTransport::with_incoming(incoming), fast_config())
    }

    fn clear() -> Command<()> {
        Command::new("clear", Opcode::Clear, &[])
    }

    fn circle() -> Command<()> {
        Command::new("draw_circle", Opcode::DrawCircle, &[10, 10, 5, 0xFFFF])
    }

    fn contrast(level: u16) -> Command<u16> {
        Command::new("contrast", Opcode::Contrast, &[level]).with_response(1, |words| words[0])
    }

    fn first_write_after(events: &[Event], skip_writes: usize) -> usize {
        events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, Event::Write(_)))
            .nth(skip_writes)
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn test_clear_then_circle() {
        let mut d = dispatcher(&[]);

        d.invoke(clear()).unwrap();
        assert_eq!(d.transport_mut().written(), vec![0xFF, 0x82]);
        assert_eq!(d.transport_mut().read_count(), 0);
        assert!(d.state.ack_owed);
        assert_eq!(d.pending(), Some("clear"));

        d.transport_mut().push_incoming(&[0x06]);
        d.invoke(circle()).unwrap();

        assert_eq!(
            d.transport_mut().events,
            vec![
                Event::Write(0xFF),
                Event::Write(0x82),
                Event::Read(0x06),
                Event::Write(0xFF),
                Event::Write(0x78),
                Event::Write(0),
                Event::Write(10),
                Event::Write(0),
                Event::Write(10),
                Event::Write(0),
                Event::Write(5),
                Event::Write(0xFF),
                Event::Write(0xFF),
            ]
        );
        assert!(d.state.ack_owed);
        assert_eq!(d.pending(), Some("draw_circle"));
        assert!(d.last_fault().is_none());
    }

    #[test]
    fn test_blocking_setting_command() {
        let mut d = dispatcher(&[0x06, 0x00, 0x03]);

        let previous = d.invoke(contrast(5).blocking(true)).unwrap();

        assert_eq!(previous, 3);
        assert_eq!(d.transport_mut().written(), vec![0xFF, 0x40, 0, 5]);
        assert_eq!(d.transport_mut().read_count(), 3);
        assert_eq!(
            d.state,
            AckState {
                ack_owed: false,
                response_words_owed: 0,
                last_command: Some("contrast"),
            }
        );
        assert_eq!(d.pending(), None);
    }

    #[test]
    fn test_deferred_ack_read_before_next_write() {
        let mut d = dispatcher(&[0x06, 0x06]);

        d.invoke(clear()).unwrap();
        d.invoke(circle().blocking(true)).unwrap();

        let events = &d.transport_mut().events;
        let first_ack = events.iter().position(|e| *e == Event::Read(0x06)).unwrap();
        // clear is two bytes; the third write is circle's first byte
        assert!(first_ack < first_write_after(events, 2));
        assert_eq!(events.last(), Some(&Event::Read(0x06)));
        assert_eq!(d.pending(), None);
    }

    #[test]
    fn test_deferred_response_is_drained() {
        let mut d = dispatcher(&[]);

        let value = d.invoke(contrast(5)).unwrap();
        assert_eq!(value, 0);
        assert_eq!(d.state.response_words_owed, 1);

        d.transport_mut().push_incoming(&[0x06, 0x00, 0x09, 0x06]);
        d.invoke(clear().blocking(true)).unwrap();

        assert_eq!(
            d.transport_mut().events[4..],
            [
                Event::Read(0x06),
                Event::Read(0x00),
                Event::Read(0x09),
                Event::Write(0xFF),
                Event::Write(0x82),
                Event::Read(0x06),
            ]
        );
        assert_eq!(d.state.response_words_owed, 0);
        assert_eq!(
            d.last_fault(),
            Some(&LinkFault::StaleResponseDiscarded {
                command: "contrast",
                words: 1,
            })
        );
    }

    #[test]
    fn test_unacknowledged_predecessor_aborts_invoke() {
        let mut d = dispatcher(&[]);

        d.invoke(clear()).unwrap();
        d.invoke(circle()).unwrap();

        // circle was never written
        assert_eq!(d.transport_mut().written(), vec![0xFF, 0x82]);
        assert_eq!(d.pending(), Some("clear"));
        assert_eq!(
            d.last_fault(),
            Some(&LinkFault::AckTimeout { command: "clear" })
        );

        // A late ACK lets the next call through
        d.transport_mut().push_incoming(&[0x06]);
        d.invoke(circle()).unwrap();
        assert_eq!(d.transport_mut().written().len(), 12);
        assert_eq!(d.pending(), Some("draw_circle"));
    }

    #[test]
    fn test_aborted_invoke_returns_default() {
        let mut d = dispatcher(&[]);
        d.invoke(clear()).unwrap();
        let value = d.invoke(contrast(7).blocking(true)).unwrap();
        assert_eq!(value, 0);
        assert_eq!(d.transport_mut().written(), vec![0xFF, 0x82]);
    }

    #[test]
    fn test_blocking_timeout_defers_to_next_call() {
        let mut d = dispatcher(&[]);

        let value = d.invoke(contrast(5).blocking(true)).unwrap();
        assert_eq!(value, 0);
        assert!(d.state.ack_owed);
        assert_eq!(d.state.response_words_owed, 1);
        assert_eq!(
            d.last_fault(),
            Some(&LinkFault::AckTimeout { command: "contrast" })
        );

        d.transport_mut().push_incoming(&[0x06, 0x00, 0x07, 0x06]);
        d.invoke(clear().blocking(true)).unwrap();

        assert!(!d.state.ack_owed);
        assert_eq!(d.state.response_words_owed, 0);
        assert_eq!(d.transport_mut().available().unwrap(), 0);
    }

    #[test]
    fn test_failed_ack_returns_default() {
        let mut d = dispatcher(&[0x15]);

        let value = d.invoke(contrast(5).blocking(true)).unwrap();

        assert_eq!(value, 0);
        assert!(!d.state.ack_owed);
        assert_eq!(d.state.response_words_owed, 0);
        assert_eq!(
            d.last_fault(),
            Some(&LinkFault::AckFailed {
                command: "contrast",
                value: 0x15,
            })
        );
    }

    #[test]
    fn test_failed_deferred_ack_drops_owed_response() {
        let mut d = dispatcher(&[]);
        d.invoke(contrast(5)).unwrap();

        d.transport_mut().push_incoming(&[0x15, 0x06]);
        d.invoke(clear().blocking(true)).unwrap();

        assert_eq!(d.state.response_words_owed, 0);
        assert!(!d.state.ack_owed);
        assert_eq!(d.transport_mut().available().unwrap(), 0);
    }

    #[test]
    fn test_drain_stops_at_missing_word() {
        let mut d = dispatcher(&[]);
        d.invoke(
            Command::new("graphics_parameters", Opcode::SetGraphicsParameters, &[18, 0])
                .with_response(2, |words| words[0]),
        )
        .unwrap();

        // ACK and only one of the two owed words
        d.transport_mut().push_incoming(&[0x06, 0x00, 0x01]);
        d.invoke(clear()).unwrap();

        assert_eq!(d.state.response_words_owed, 0);
        assert_eq!(
            d.last_fault(),
            Some(&LinkFault::ResponseTimeout {
                command: "graphics_parameters",
                expected: 2,
                missing: 1,
            })
        );
        assert_eq!(d.pending(), Some("clear"));
        let written = d.transport_mut().written();
        assert_eq!(&written[written.len() - 2..], &[0xFF, 0x82]);
    }

    #[test]
    fn test_missing_stale_response_is_only_a_timeout() {
        // Poll interval past the deadline keeps waits silent
        let quiet = TimeoutPolicy::from_millis(1000, 20);
        let mut d = Dispatcher::with_config(
            MockTransport::new(),
            LinkConfig {
                ack: quiet,
                response: quiet,
            },
        );
        d.invoke(contrast(5)).unwrap();
        d.transport_mut().push_incoming(&[0x06]);

        let warnings = LevelCounter::new(Level::WARN);
        counting(&warnings, || d.invoke(clear()).unwrap());

        assert_eq!(warnings.count(), 0);
        assert_eq!(
            d.last_fault(),
            Some(&LinkFault::ResponseTimeout {
                command: "contrast",
                expected: 1,
                missing: 1,
            })
        );
        assert_eq!(d.pending(), Some("clear"));
    }

    #[test]
    fn test_io_error_mid_drain_keeps_owed_words() {
        let mut d = dispatcher(&[]);
        d.invoke(
            Command::new("graphics_parameters", Opcode::SetGraphicsParameters, &[18, 0])
                .with_response(2, |words| words[0]),
        )
        .unwrap();

        // ACK and the first word are read, then the link fails
        d.transport_mut().push_incoming(&[0x06, 0x00, 0x01, 0x00, 0x02]);
        d.transport_mut().fail_available_after = Some(3);
        assert!(d.invoke(clear()).is_err());
        assert!(!d.state.ack_owed);
        assert_eq!(d.state.response_words_owed, 1);

        // Once the link recovers the remaining word is drained first
        d.transport_mut().fail_available_after = None;
        d.invoke(clear()).unwrap();
        assert_eq!(d.state.response_words_owed, 0);
        assert_eq!(d.transport_mut().available().unwrap(), 0);
        assert_eq!(
            d.last_fault(),
            Some(&LinkFault::StaleResponseDiscarded {
                command: "graphics_parameters",
                words: 1,
            })
        );
        assert_eq!(
            d.transport_mut().written(),
            vec![0xFF, 0x83, 0, 18, 0, 0, 0xFF, 0x82]
        );
    }

    #[test]
    fn test_response_timeout_yields_sentinel() {
        let mut d = dispatcher(&[0x06]);
        let value = d.invoke(contrast(5).blocking(true)).unwrap();
        assert_eq!(value, SENTINEL_WORD);
        assert_eq!(
            d.last_fault(),
            Some(&LinkFault::ResponseTimeout {
                command: "contrast",
                expected: 1,
                missing: 1,
            })
        );
    }

    #[test]
    fn test_settle() {
        let mut d = dispatcher(&[]);
        assert!(d.settle().unwrap());

        d.invoke(clear()).unwrap();
        assert!(!d.settle().unwrap());
        assert_eq!(d.pending(), Some("clear"));

        d.transport_mut().push_incoming(&[0x06]);
        assert!(d.settle().unwrap());
        assert_eq!(d.pending(), None);
    }

    #[test]
    fn test_single_command_in_flight() {
        let mut d = dispatcher(&[]);
        let pattern = [false, true, false, false, true, true, false];

        for (i, &blocking) in pattern.iter().enumerate() {
            // Exactly one ACK per command is ever available
            d.transport_mut().push_incoming(&[0x06]);
            d.invoke(clear().blocking(blocking)).unwrap();

            let transport = d.transport_mut();
            let commands_sent = transport.written().len() / 2;
            assert_eq!(commands_sent, i + 1);
            // Every earlier command's ACK has been read
            assert!(transport.read_count() >= i);
            assert!(!d.state.ack_owed || d.state.last_command.is_some());
            assert_eq!(d.state.ack_owed, !blocking);
        }
        assert_eq!(d.transport_mut().flushes, pattern.len());
    }

    #[test]
    fn test_into_inner() {
        let mut d = dispatcher(&[]);
        d.invoke(clear()).unwrap();
        let transport = d.into_inner();
        assert_eq!(transport.written(), vec![0xFF, 0x82]);
    }
}
