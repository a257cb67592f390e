//! Cancellable delayed tasks driven by the animation loop.
//!
//! Each task occupies a slot; scheduling into an occupied slot replaces the
//! pending task and restarts its countdown, which is exactly a debounce.
//! Countdowns advance only through [`Scheduler::advance`], so tearing down the
//! owner and calling [`Scheduler::cancel_all`] leaves nothing to fire later.

/// Work the engine defers.
#[derive(Clone, Debug, PartialEq)]
pub enum Task {
	/// Write the current viewport to settings.
	SaveViewport,
	/// Publish details for the hovered node.
	HoverDetails(String),
	/// Drop hover emphasis after the pointer left.
	ClearHover,
	/// Run a debounced search; an empty term clears search emphasis.
	Search(String),
	/// Hide the transient notice.
	DismissNotice,
}

/// Debounce slot a task occupies. At most one task per slot is pending.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskSlot {
	Viewport,
	HoverDetails,
	HoverClear,
	Search,
	Notice,
}

impl Task {
	pub fn slot(&self) -> TaskSlot {
		match self {
			Task::SaveViewport => TaskSlot::Viewport,
			Task::HoverDetails(_) => TaskSlot::HoverDetails,
			Task::ClearHover => TaskSlot::HoverClear,
			Task::Search(_) => TaskSlot::Search,
			Task::DismissNotice => TaskSlot::Notice,
		}
	}
}

#[derive(Clone, Debug)]
struct Pending {
	task: Task,
	/// Seconds left before the task is due.
	remaining: f64,
}

/// Pending deferred tasks, at most one per [`TaskSlot`].
#[derive(Clone, Debug, Default)]
pub struct Scheduler {
	pending: Vec<Pending>,
}

impl Scheduler {
	/// Schedule `task` after `delay` seconds, replacing whatever was pending in
	/// its slot.
	pub fn schedule(&mut self, task: Task, delay: f64) {
		let slot = task.slot();
		let remaining = delay.max(0.0);
		match self.pending.iter_mut().find(|p| p.task.slot() == slot) {
			Some(existing) => {
				existing.task = task;
				existing.remaining = remaining;
			}
			None => self.pending.push(Pending { task, remaining }),
		}
	}

	/// Drop the pending task in `slot`. Returns whether one was pending.
	pub fn cancel(&mut self, slot: TaskSlot) -> bool {
		let before = self.pending.len();
		self.pending.retain(|p| p.task.slot() != slot);
		self.pending.len() != before
	}

	pub fn is_pending(&self, slot: TaskSlot) -> bool {
		self.pending.iter().any(|p| p.task.slot() == slot)
	}

	/// Count down by `dt` seconds and return every task that came due,
	/// earliest deadline first.
	pub fn advance(&mut self, dt: f64) -> Vec<Task> {
		let mut due = Vec::new();
		self.pending.retain_mut(|p| {
			p.remaining -= dt;
			if p.remaining <= 0.0 {
				due.push((p.remaining, p.task.clone()));
				false
			} else {
				true
			}
		});
		due.sort_by(|a, b| a.0.total_cmp(&b.0));
		due.into_iter().map(|(_, task)| task).collect()
	}

	/// Drop every pending task. Returns how many were dropped.
	pub fn cancel_all(&mut self) -> usize {
		let dropped = self.pending.len();
		self.pending.clear();
		dropped
	}

	pub fn len(&self) -> usize {
		self.pending.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}
}
