use std::sync::mpsc::{self, Receiver, Sender};

/// Level-triggered notifications from the decision loop.
///
/// Implementations must tolerate repeated identical calls.
pub trait AlertSink {
    fn on_movement_changed(&mut self, active: bool);

    fn on_touch_changed(&mut self, active: bool);
}

/// Sink for headless runs and tests that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAlertSink;

impl AlertSink for NoopAlertSink {
    fn on_movement_changed(&mut self, _active: bool) {}

    fn on_touch_changed(&mut self, _active: bool) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertEvent {
    Movement(bool),
    Touch(bool),
}

/// Hands notifications to whichever thread owns presentation.
///
/// Sending never blocks, and a receiver that has gone away is ignored: the
/// decision loop does not depend on anyone listening.
#[derive(Debug, Clone)]
pub struct ChannelAlertSink {
    tx: Sender<AlertEvent>,
}

impl ChannelAlertSink {
    pub fn new() -> (Self, Receiver<AlertEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: AlertEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Alert receiver gone, dropping {:?}", event);
        }
    }
}

impl AlertSink for ChannelAlertSink {
    fn on_movement_changed(&mut self, active: bool) {
        self.send(AlertEvent::Movement(active));
    }

    fn on_touch_changed(&mut self, active: bool) {
        self.send(AlertEvent::Touch(active));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_preserves_order() {
        let (mut sink, rx) = ChannelAlertSink::new();
        sink.on_movement_changed(true);
        sink.on_touch_changed(true);
        sink.on_touch_changed(false);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                AlertEvent::Movement(true),
                AlertEvent::Touch(true),
                AlertEvent::Touch(false)
            ]
        );
    }

    #[test]
    fn closed_channel_is_ignored() {
        let (mut sink, rx) = ChannelAlertSink::new();
        drop(rx);
        sink.on_touch_changed(true);
    }
}
