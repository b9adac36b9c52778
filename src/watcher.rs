//! Poll-based change dispatch
//!
//! [`ChangeWatcher`] is the single consumer of the pending-work list: an
//! interval-paced loop that drains `reserve()` and hands each record to a
//! [`ChangeHandler`]. The handler decides the reservation's fate; a
//! rejected dispatch is requeued here so a reservation can never leak.

use crate::changed_list::ChangeRecord;
use crate::context::SyncContext;
use crate::logging::*;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Receiver of reserved change records.
///
/// Returning true accepts the dispatch: the handler now owns the
/// reservation and must eventually `release` or `requeue` the path.
/// Returning false rejects it and the watcher requeues.
#[async_trait]
pub trait ChangeHandler: Send + Sync {
	async fn handle_changed_file(&self, record: ChangeRecord) -> bool;
}

/// Interval-paced consumer loop over the pending-work list
pub struct ChangeWatcher {
	ctx: Arc<SyncContext>,
	handler: Arc<dyn ChangeHandler>,
	interval: Duration,
	ended: AtomicBool,
	wake: Notify,
}

impl ChangeWatcher {
	/// Create a watcher polling `ctx`'s list at `interval`
	pub fn new(ctx: Arc<SyncContext>, handler: Arc<dyn ChangeHandler>, interval: Duration) -> Self {
		ChangeWatcher { ctx, handler, interval, ended: AtomicBool::new(false), wake: Notify::new() }
	}

	/// Cooperatively end the watch. Checked at the top of each poll cycle;
	/// an in-flight dispatch is never interrupted.
	pub fn end_watch(&self) {
		self.ended.store(true, Ordering::Release);
		self.wake.notify_one();
	}

	/// Run the poll loop until [`end_watch`] is called.
	///
	/// [`end_watch`]: ChangeWatcher::end_watch
	pub async fn run(&self) {
		let mut ticker = tokio::time::interval(self.interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
		// Version of the list as of the last drain that ended empty; lets a
		// poll cycle skip taking the lock when nothing has changed
		let mut drained_version: Option<u64> = None;

		loop {
			tokio::select! {
				_ = ticker.tick() => {}
				_ = self.wake.notified() => {}
			}
			if self.ended.load(Ordering::Acquire) {
				debug!("Change watch ended");
				return;
			}

			let version = self.ctx.changed.version();
			if drained_version == Some(version) {
				continue;
			}
			self.drain().await;
			drained_version = Some(version);
		}
	}

	/// Reserve-and-dispatch until the list is empty or a dispatch is
	/// rejected. After a rejection the drain stops so the same record is
	/// not spun on within one cycle; the next tick retries.
	async fn drain(&self) {
		while let Some(record) = self.ctx.changed.reserve() {
			let path = record.path.clone();
			trace!("Dispatching {}", path.display());
			let accepted = self.handler.handle_changed_file(record).await;
			if !accepted {
				debug!("Dispatch rejected, requeueing {}", path.display());
				self.ctx.changed.requeue(&path);
				return;
			}
		}
	}
}


// vim: ts=4
