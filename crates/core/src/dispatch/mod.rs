//! Fan-out of decoded MIDI to registered consumers.
//!
//! Delivery happens synchronously on the thread that calls
//! [`EventDispatcher::dispatch`], in the order notifications were produced.

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Notification delivered to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    /// Something arrived. Sent once per decoded message, before the
    /// message's own notification; drives decaying activity indicators.
    Activity,
    Note { note: u8, velocity_norm: f32 },
    NoteReleased { note: u8 },
    ControlChange { controller: u8, value_norm: f32 },
    /// A timing clock pulse arrived, whether or not the transport runs.
    ClockActivity,
    Beat { beat_number: u64 },
    TransportStarted,
    TransportContinued,
    TransportStopped,
}

/// Consumer of [`Notification`]s.
pub trait MidiListener {
    fn on_notification(&mut self, notification: &Notification);
}

impl<F> MidiListener for F
where
    F: FnMut(&Notification),
{
    fn on_notification(&mut self, notification: &Notification) {
        self(notification)
    }
}

/// Handle returned by [`EventDispatcher::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

enum Subscriber {
    Callback(Box<dyn MidiListener>),
    Channel(Sender<Notification>),
}

/// Registry of listeners.
#[derive(Default)]
pub struct EventDispatcher {
    subscribers: Vec<(ListenerId, Subscriber)>,
    next_id: u64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<L>(&mut self, listener: L) -> ListenerId
    where
        L: MidiListener + 'static,
    {
        self.insert(Subscriber::Callback(Box::new(listener)))
    }

    /// Registers an unbounded channel; useful when the consumer lives on
    /// another thread. Disconnected receivers are pruned on the next dispatch.
    pub fn subscribe_channel(&mut self) -> Receiver<Notification> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.insert(Subscriber::Channel(tx));
        rx
    }

    /// Returns `false` when the id was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        before != self.subscribers.len()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn dispatch(&mut self, notification: &Notification) {
        self.subscribers.retain_mut(|(_, subscriber)| match subscriber {
            Subscriber::Callback(listener) => {
                listener.on_notification(notification);
                true
            }
            Subscriber::Channel(tx) => tx.send(*notification).is_ok(),
        });
    }

    fn insert(&mut self, subscriber: Subscriber) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, subscriber));
        id
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn delivers_in_order_to_every_listener() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();

        for tag in 0..2 {
            let seen = Rc::clone(&seen);
            dispatcher.subscribe(move |n: &Notification| seen.borrow_mut().push((tag, *n)));
        }

        dispatcher.dispatch(&Notification::Activity);
        dispatcher.dispatch(&Notification::Beat { beat_number: 3 });

        assert_eq!(
            *seen.borrow(),
            vec![
                (0, Notification::Activity),
                (1, Notification::Activity),
                (0, Notification::Beat { beat_number: 3 }),
                (1, Notification::Beat { beat_number: 3 }),
            ]
        );
    }

    #[test]
    fn unsubscribed_listeners_stop_receiving() {
        let count = Rc::new(RefCell::new(0));
        let mut dispatcher = EventDispatcher::new();
        let counter = Rc::clone(&count);
        let id = dispatcher.subscribe(move |_: &Notification| *counter.borrow_mut() += 1);

        dispatcher.dispatch(&Notification::ClockActivity);
        assert!(dispatcher.unsubscribe(id));
        assert!(!dispatcher.unsubscribe(id));
        dispatcher.dispatch(&Notification::ClockActivity);

        assert_eq!(*count.borrow(), 1);
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn channel_subscribers_receive_and_get_pruned() {
        let mut dispatcher = EventDispatcher::new();
        let rx = dispatcher.subscribe_channel();

        dispatcher.dispatch(&Notification::TransportStarted);
        assert_eq!(rx.try_recv().ok(), Some(Notification::TransportStarted));

        drop(rx);
        dispatcher.dispatch(&Notification::TransportStopped);
        assert_eq!(dispatcher.len(), 0);
    }
}
