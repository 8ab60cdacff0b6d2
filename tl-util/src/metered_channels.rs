//! Crossbeam channel wrappers that publish queue-depth gauges
//!
//! Mirrors the teacher's `util::metered_channels` pattern: every worker
//! queue in the engine (delta events, community jobs) is wrapped so that
//! queue depth is always observable without each call site remembering to
//! emit a metric.

use crossbeam::channel::{Receiver, RecvError, Sender, TryRecvError};

/// A `crossbeam::channel::Sender` that records its queue depth under a fixed
/// metric name on every send
#[derive(Clone, Debug)]
pub struct MeteredSender<T> {
    inner: Sender<T>,
    metric_name: &'static str,
}

impl<T> MeteredSender<T> {
    /// Wrap a sender, labeling its depth gauge with `metric_name`
    pub fn new(inner: Sender<T>, metric_name: &'static str) -> Self {
        Self { inner, metric_name }
    }

    /// Send a value, recording the resulting queue length
    pub fn send(&self, value: T) -> Result<(), crossbeam::channel::SendError<T>> {
        let res = self.inner.send(value);
        metrics::gauge!(self.metric_name, self.inner.len() as f64);
        res
    }

    /// Current queue length
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// A `crossbeam::channel::Receiver` that records its queue depth on every
/// receive
#[derive(Clone, Debug)]
pub struct MeteredReceiver<T> {
    inner: Receiver<T>,
    metric_name: &'static str,
}

impl<T> MeteredReceiver<T> {
    /// Wrap a receiver, labeling its depth gauge with `metric_name`
    pub fn new(inner: Receiver<T>, metric_name: &'static str) -> Self {
        Self { inner, metric_name }
    }

    /// Block until a value is available
    pub fn recv(&self) -> Result<T, RecvError> {
        let res = self.inner.recv();
        metrics::gauge!(self.metric_name, self.inner.len() as f64);
        res
    }

    /// Non-blocking receive
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let res = self.inner.try_recv();
        metrics::gauge!(self.metric_name, self.inner.len() as f64);
        res
    }

    /// Current queue length
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

/// Create a metered unbounded channel pair
pub fn metered_unbounded<T>(metric_name: &'static str) -> (MeteredSender<T>, MeteredReceiver<T>) {
    let (send, recv) = crossbeam::channel::unbounded();
    (MeteredSender::new(send, metric_name), MeteredReceiver::new(recv, metric_name))
}

#[cfg(test)]
mod test {
    use super::metered_unbounded;

    #[test]
    fn round_trips_values() {
        let (tx, rx) = metered_unbounded::<u32>("test_queue");
        tx.send(1).unwrap();
        tx.send(2).unwrap();

        assert_eq!(rx.recv().unwrap(), 1);
        assert_eq!(rx.recv().unwrap(), 2);
    }
}
