//! Sequential, throttled notification dispatcher.
//!
//! # Invariants
//! - Sends happen one at a time, in input order.
//! - The rate limiter is consulted before every send and told when it ends.
//! - A failed send never stops later sends and is never retried.
//! - A failed probe skips the whole batch.

use crate::config::DispatchConfig;
use crate::logging::mask_address;
use crate::notify::gateway::{GatewayError, MessageGateway};
use crate::notify::rate_limit::{FixedInterval, RateLimiter};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// One text message addressed to one contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub address: String,
    pub text: String,
}

impl OutboundMessage {
    pub fn new(address: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            text: text.into(),
        }
    }
}

/// Failed delivery for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryError {
    pub address: String,
    pub reason: String,
}

/// Aggregated result of one dispatch batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
    pub errors: Vec<DeliveryError>,
    /// Set when the probe failed and no send was attempted.
    pub gateway_unavailable: bool,
}

impl DispatchSummary {
    pub fn unavailable() -> Self {
        Self {
            gateway_unavailable: true,
            ..Self::default()
        }
    }

    /// Number of sends actually attempted.
    pub fn attempted(&self) -> usize {
        self.sent + self.failed
    }

    /// Folds `other` into `self`.
    pub fn merge(&mut self, other: DispatchSummary) {
        self.sent += other.sent;
        self.failed += other.failed;
        self.errors.extend(other.errors);
        self.gateway_unavailable |= other.gateway_unavailable;
    }

    fn record(&mut self, address: &str, outcome: Result<(), GatewayError>) {
        match outcome {
            Ok(()) => self.sent += 1,
            Err(err) => {
                self.failed += 1;
                self.errors.push(DeliveryError {
                    address: address.to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }
}

/// Sends messages through a [`MessageGateway`] one at a time.
pub struct NotificationDispatcher<G: MessageGateway> {
    gateway: G,
    limiter: Box<dyn RateLimiter + Send + Sync>,
    probe_before_send: bool,
}

impl<G: MessageGateway> NotificationDispatcher<G> {
    /// Creates a dispatcher that probes before each batch.
    pub fn new(gateway: G, limiter: impl RateLimiter + Send + Sync + 'static) -> Self {
        Self {
            gateway,
            limiter: Box::new(limiter),
            probe_before_send: true,
        }
    }

    /// Creates a dispatcher with a fixed send interval from config.
    pub fn from_config(gateway: G, config: &DispatchConfig) -> Self {
        Self::new(gateway, FixedInterval::new(config.send_interval))
            .with_probe(config.probe_before_send)
    }

    /// Enables or disables the availability probe before each batch.
    pub fn with_probe(mut self, probe_before_send: bool) -> Self {
        self.probe_before_send = probe_before_send;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Sends one message, waiting for the rate limiter first.
    pub fn send_one(&self, address: &str, text: &str) -> Result<(), GatewayError> {
        self.limiter.acquire();
        let outcome = self.gateway.send_one(address, text);
        self.limiter.completed();
        match &outcome {
            Ok(()) => debug!(
                "event=notify_send module=notify status=ok address={}",
                mask_address(address)
            ),
            Err(err) => warn!(
                "event=notify_send module=notify status=error address={} error={}",
                mask_address(address),
                err
            ),
        }
        outcome
    }

    /// Sends every message and returns the aggregated outcome.
    ///
    /// An empty batch returns an empty summary without probing.
    pub fn dispatch(&self, messages: &[OutboundMessage]) -> DispatchSummary {
        if messages.is_empty() {
            return DispatchSummary::default();
        }

        let started_at = Instant::now();
        if self.probe_before_send && !self.gateway.probe_availability() {
            warn!(
                "event=dispatch module=notify status=skipped reason=gateway_unavailable batch_size={}",
                messages.len()
            );
            return DispatchSummary::unavailable();
        }

        let mut summary = DispatchSummary::default();
        for message in messages {
            let outcome = self.send_one(&message.address, &message.text);
            summary.record(&message.address, outcome);
        }

        info!(
            "event=dispatch module=notify status=ok batch_size={} sent={} failed={} duration_ms={}",
            messages.len(),
            summary.sent,
            summary.failed,
            started_at.elapsed().as_millis()
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::{DispatchSummary, NotificationDispatcher, OutboundMessage};
    use crate::notify::gateway::{GatewayError, MessageGateway};
    use crate::notify::rate_limit::{FixedInterval, Unthrottled};
    use std::cell::{Cell, RefCell};
    use std::thread;
    use std::time::{Duration, Instant};

    struct ScriptedGateway {
        available: bool,
        failing: &'static [&'static str],
        probes: Cell<usize>,
        attempted: RefCell<Vec<String>>,
    }

    impl ScriptedGateway {
        fn new(available: bool, failing: &'static [&'static str]) -> Self {
            Self {
                available,
                failing,
                probes: Cell::new(0),
                attempted: RefCell::new(Vec::new()),
            }
        }
    }

    impl MessageGateway for ScriptedGateway {
        fn probe_availability(&self) -> bool {
            self.probes.set(self.probes.get() + 1);
            self.available
        }

        fn send_one(&self, address: &str, _text: &str) -> Result<(), GatewayError> {
            self.attempted.borrow_mut().push(address.to_string());
            if self.failing.contains(&address) {
                return Err(GatewayError::Rejected {
                    status: 400,
                    message: "number not on whatsapp".to_string(),
                });
            }
            Ok(())
        }
    }

    fn batch(addresses: &[&str]) -> Vec<OutboundMessage> {
        addresses
            .iter()
            .map(|address| OutboundMessage::new(*address, "hello"))
            .collect()
    }

    #[test]
    fn failures_are_recorded_and_do_not_stop_the_batch() {
        let dispatcher =
            NotificationDispatcher::new(ScriptedGateway::new(true, &["b"]), Unthrottled);
        let summary = dispatcher.dispatch(&batch(&["a", "b", "c"]));

        assert_eq!(summary.sent, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].address, "b");
        assert_eq!(summary.errors[0].reason, "number not on whatsapp");
        assert!(!summary.gateway_unavailable);
        assert_eq!(*dispatcher.gateway().attempted.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn unavailable_gateway_skips_every_send() {
        let dispatcher = NotificationDispatcher::new(ScriptedGateway::new(false, &[]), Unthrottled);
        let summary = dispatcher.dispatch(&batch(&["a", "b"]));

        assert_eq!(summary, DispatchSummary::unavailable());
        assert_eq!(summary.sent, 0);
        assert_eq!(summary.failed, 0);
        assert!(dispatcher.gateway().attempted.borrow().is_empty());
    }

    #[test]
    fn probe_can_be_disabled() {
        let dispatcher = NotificationDispatcher::new(ScriptedGateway::new(false, &[]), Unthrottled)
            .with_probe(false);
        let summary = dispatcher.dispatch(&batch(&["a"]));

        assert_eq!(summary.sent, 1);
        assert_eq!(dispatcher.gateway().probes.get(), 0);
    }

    #[test]
    fn empty_batch_does_not_probe() {
        let dispatcher = NotificationDispatcher::new(ScriptedGateway::new(true, &[]), Unthrottled);
        let summary = dispatcher.dispatch(&[]);

        assert_eq!(summary, DispatchSummary::default());
        assert_eq!(dispatcher.gateway().probes.get(), 0);
    }

    #[test]
    fn throttle_spaces_sends() {
        let started = Instant::now();
        let dispatcher = NotificationDispatcher::new(
            ScriptedGateway::new(true, &[]),
            FixedInterval::new(Duration::from_millis(15)),
        );
        let summary = dispatcher.dispatch(&batch(&["a", "b", "c"]));

        assert_eq!(summary.sent, 3);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    struct SlowGateway {
        delay: Duration,
        spans: RefCell<Vec<(Instant, Instant)>>,
    }

    impl MessageGateway for SlowGateway {
        fn probe_availability(&self) -> bool {
            true
        }

        fn send_one(&self, _address: &str, _text: &str) -> Result<(), GatewayError> {
            let started = Instant::now();
            thread::sleep(self.delay);
            self.spans.borrow_mut().push((started, Instant::now()));
            Ok(())
        }
    }

    #[test]
    fn slow_send_still_gets_full_pause_before_next() {
        let interval = Duration::from_millis(40);
        let dispatcher = NotificationDispatcher::new(
            SlowGateway {
                delay: Duration::from_millis(60),
                spans: RefCell::new(Vec::new()),
            },
            FixedInterval::new(interval),
        );
        let summary = dispatcher.dispatch(&batch(&["a", "b", "c"]));

        assert_eq!(summary.sent, 3);
        let spans = dispatcher.gateway().spans.borrow();
        for window in spans.windows(2) {
            let previous_end = window[0].1;
            let next_start = window[1].0;
            assert!(next_start.duration_since(previous_end) >= interval);
        }
    }

    #[test]
    fn merge_adds_counts_and_errors() {
        let mut total = DispatchSummary {
            sent: 2,
            failed: 1,
            errors: vec![super::DeliveryError {
                address: "x".to_string(),
                reason: "boom".to_string(),
            }],
            gateway_unavailable: false,
        };
        total.merge(DispatchSummary {
            sent: 1,
            ..DispatchSummary::default()
        });
        assert_eq!(total.attempted(), 4);
        assert_eq!(total.errors.len(), 1);
    }
}
