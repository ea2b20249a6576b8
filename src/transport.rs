//! The boundary towards the robotics transport.
//!
//! Delivery itself is somebody else's job: this module only defines the primitives the
//! controllers need, plus an in-process bus that the demo and the tests run on.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, trace};

use crate::messages::{Message, MessageKind};

/// Called for every message delivered on a subscribed channel.
///
/// Callbacks may run between frames, or on another thread entirely, so they should do nothing
/// but stage the message somewhere the frame update will pick it up (see [`crate::mailbox`]).
pub type Callback = Arc<dyn Fn(&Message) + Send + Sync>;

/// Publish/subscribe primitives of the transport.
///
/// Publishing is fire-and-forget: there is no acknowledgement and no backpressure. If the
/// transport cannot deliver, the message is dropped on its side.
pub trait Transport: Send + Sync {
    /// Announce that `channel` will carry messages of `kind`.
    fn advertise(&self, _channel: &str, _kind: MessageKind) {}

    fn publish(&self, channel: &str, message: Message);

    fn subscribe(&self, channel: &str, callback: Callback);
}

/// Messages the bus keeps for inspection unless told otherwise.
pub const DEFAULT_LOG_CAPACITY: usize = 4096;

struct BusState {
    advertised: HashMap<String, MessageKind>,
    subscribers: HashMap<String, Vec<Callback>>,
    log: VecDeque<(String, Message)>,
    log_capacity: usize,
    counts: HashMap<String, usize>,
}

/// A transport that delivers messages synchronously to subscribers in the same process.
///
/// The most recent published messages are also kept in a bounded log, which makes it handy for
/// inspecting what a controller sent. Once the log is full the oldest entries are dropped.
#[derive(Clone)]
pub struct LoopbackBus {
    state: Arc<Mutex<BusState>>,
}

impl Default for LoopbackBus {
    fn default() -> Self {
        Self::with_log_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus that logs at most `capacity` messages. Zero turns the log off.
    pub fn with_log_capacity(capacity: usize) -> Self {
        LoopbackBus {
            state: Arc::new(Mutex::new(BusState {
                advertised: HashMap::new(),
                subscribers: HashMap::new(),
                log: VecDeque::new(),
                log_capacity: capacity,
                counts: HashMap::new(),
            })),
        }
    }

    /// How many messages were ever published on `channel`, logged or not.
    pub fn published_count(&self, channel: &str) -> usize {
        self.lock().counts.get(channel).cloned().unwrap_or(0)
    }

    /// The logged messages published on `channel`, oldest first.
    pub fn published(&self, channel: &str) -> Vec<Message> {
        self.lock()
            .log
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Forget the publication log.
    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    pub fn advertised_kind(&self, channel: &str) -> Option<MessageKind> {
        self.lock().advertised.get(channel).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for LoopbackBus {
    fn advertise(&self, channel: &str, kind: MessageKind) {
        debug!("Advertising {:?} on {}", kind, channel);
        self.lock().advertised.insert(channel.to_string(), kind);
    }

    fn publish(&self, channel: &str, message: Message) {
        // Callbacks are invoked without holding the lock so they are free to publish themselves.
        let callbacks = {
            let mut state = self.lock();
            *state.counts.entry(channel.to_string()).or_insert(0) += 1;
            if state.log_capacity > 0 {
                if state.log.len() == state.log_capacity {
                    state.log.pop_front();
                }
                state.log.push_back((channel.to_string(), message.clone()));
            }
            state.subscribers.get(channel).cloned().unwrap_or_default()
        };

        trace!("{} <- {:?} ({} subscribers)", channel, message.kind(), callbacks.len());

        for cb in callbacks.iter() {
            cb(&message);
        }
    }

    fn subscribe(&self, channel: &str, callback: Callback) {
        debug!("Subscribing to {}", channel);
        self.lock()
            .subscribers
            .entry(channel.to_string())
            .or_insert_with(Vec::new)
            .push(callback);
    }
}

/// Sends values on one fixed channel.
#[derive(Clone)]
pub struct CommandPublisher {
    transport: Arc<dyn Transport>,
    channel: String,
}

impl CommandPublisher {
    /// Create a publisher and advertise its channel.
    pub fn new(transport: Arc<dyn Transport>, channel: &str, kind: MessageKind) -> Self {
        transport.advertise(channel, kind);
        CommandPublisher {
            transport,
            channel: channel.to_string(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn publish<M: Into<Message>>(&self, message: M) {
        self.transport.publish(&self.channel, message.into());
    }
}

/// Decides on which frames a periodic publisher fires.
///
/// Time accumulates while the timer is advanced; once more than the threshold has built up it
/// fires and starts over from zero. The first threshold is `initial_delay`, later ones `period`.
/// Frames slower than the period yield one firing each rather than a catch-up burst.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    period: f32,
    threshold: f32,
    elapsed: f32,
}

impl IntervalTimer {
    pub fn new(period: f32) -> Self {
        Self::with_delay(period, period)
    }

    pub fn with_delay(period: f32, initial_delay: f32) -> Self {
        IntervalTimer {
            period,
            threshold: initial_delay,
            elapsed: 0.0,
        }
    }

    /// Advance by `dt` seconds, returning whether the timer fires on this frame.
    pub fn advance(&mut self, dt: f32) -> bool {
        self.elapsed += dt;
        if self.elapsed > self.threshold {
            self.elapsed = 0.0;
            self.threshold = self.period;
            true
        } else {
            false
        }
    }
}
