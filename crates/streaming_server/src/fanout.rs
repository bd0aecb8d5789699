#![forbid(unsafe_code)]

use tokio::sync::mpsc;

/// Best-effort fan-out listener set for a single room. Each listener is a
/// bounded queue; a slow listener accumulates a lag count instead of
/// backpressuring the publisher, and dead listeners are pruned lazily.
///
/// Generic over the item type so the chat, reaction, and notification
/// engines can each plug their own event enum through the same mechanism.
#[derive(Debug)]
pub struct ListenerSet<T: Clone> {
	subscribers: Vec<mpsc::Sender<FanoutItem<T>>>,
	pending_lag: Vec<u64>,
}

/// What a listener actually receives: either a published item or a marker
/// telling it how many prior items it missed.
#[derive(Debug, Clone)]
pub enum FanoutItem<T> {
	Item(T),
	Lagged { dropped: u64 },
}

impl<T: Clone> Default for ListenerSet<T> {
	fn default() -> Self {
		Self { subscribers: Vec::new(), pending_lag: Vec::new() }
	}
}

impl<T: Clone> ListenerSet<T> {
	pub fn subscribe(&mut self, queue_capacity: usize) -> mpsc::Receiver<FanoutItem<T>> {
		self.prune_closed();
		let (tx, rx) = mpsc::channel(queue_capacity);
		self.subscribers.push(tx);
		self.pending_lag.push(0);
		rx
	}

	pub fn is_empty(&self) -> bool {
		self.subscribers.is_empty()
	}

	pub fn len(&self) -> usize {
		self.subscribers.iter().filter(|s| !s.is_closed()).count()
	}

	/// Publish `item` to every live listener, counting drops instead of blocking.
	pub fn publish(&mut self, item: T) {
		self.prune_closed();

		for (idx, sub) in self.subscribers.iter_mut().enumerate() {
			match sub.try_send(FanoutItem::Item(item.clone())) {
				Ok(()) => {
					if let Some(pending) = self.pending_lag.get_mut(idx)
						&& *pending > 0
						&& sub.try_send(FanoutItem::Lagged { dropped: *pending }).is_ok()
					{
						*pending = 0;
					}
				}
				Err(mpsc::error::TrySendError::Full(_)) => {
					if let Some(pending) = self.pending_lag.get_mut(idx) {
						*pending = pending.saturating_add(1);
					}
				}
				Err(mpsc::error::TrySendError::Closed(_)) => {}
			}
		}

		self.prune_closed();
	}

	fn prune_closed(&mut self) {
		if self.subscribers.len() != self.pending_lag.len() {
			self.pending_lag.resize(self.subscribers.len(), 0);
		}

		let mut new_subs = Vec::with_capacity(self.subscribers.len());
		let mut new_lag = Vec::with_capacity(self.subscribers.len());

		for (idx, s) in self.subscribers.drain(..).enumerate() {
			if !s.is_closed() {
				new_subs.push(s);
				new_lag.push(*self.pending_lag.get(idx).unwrap_or(&0));
			}
		}

		self.subscribers = new_subs;
		self.pending_lag = new_lag;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn publish_reaches_subscriber() {
		let mut set: ListenerSet<u32> = ListenerSet::default();
		let mut rx = set.subscribe(4);
		set.publish(42);
		let item = rx.recv().await.unwrap();
		assert!(matches!(item, FanoutItem::Item(42)));
	}

	#[tokio::test]
	async fn full_queue_marks_lag_without_blocking() {
		let mut set: ListenerSet<u32> = ListenerSet::default();
		let mut rx = set.subscribe(1);
		set.publish(1);
		set.publish(2);
		let first = rx.recv().await.unwrap();
		assert!(matches!(first, FanoutItem::Item(1)));
		let second = rx.recv().await.unwrap();
		assert!(matches!(second, FanoutItem::Lagged { dropped: 1 }));
	}

	#[tokio::test]
	async fn dropped_receiver_is_pruned_on_next_publish() {
		let mut set: ListenerSet<u32> = ListenerSet::default();
		let rx = set.subscribe(1);
		drop(rx);
		set.publish(1);
		assert!(set.is_empty());
	}
}
