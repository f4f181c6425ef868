// Copyright 2019-2021 Parity Technologies (UK) Ltd.
// This file is part of Parity Bridges Common.

// Parity Bridges Common is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Parity Bridges Common is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Parity Bridges Common.  If not, see <http://www.gnu.org/licenses/>.

//! In-memory record of relay progress.
//!
//! Every watermark in the cache is monotonic and advanced by the sync loop
//! only after the corresponding submission has been confirmed by reading
//! destination chain state. That makes the startup reconciliation and every
//! retry idempotent: replaying the same updates is a sequence of no-ops.

use bp_beacon::{compute_period, BlockRootsTree};
use parking_lot::Mutex;
use relay_utils::HeaderId;
use sp_core::H256;
use std::collections::BTreeMap;
use thiserror::Error;

/// A finalized slot whose block-roots accumulator is locally held. It anchors
/// ancestry proofs for any slot within the coverage window ending at
/// `slot`.
///
/// Checkpoints are never speculative: `slot` is always a finalized slot the
/// destination chain has itself accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinalizedCheckpoint {
	/// Slot of the checkpoint header.
	pub slot: u64,
	/// Block root of the checkpoint header.
	pub block_root: H256,
	/// The block-roots accumulator of the checkpoint.
	pub block_roots_tree: BlockRootsTree,
}

/// Failed checkpoint lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CacheError {
	/// No cached checkpoint slot falls within the coverage window at all.
	/// The caller must look further ahead, in a future period.
	#[error("no finalized checkpoint is available within the coverage window")]
	CheckpointNotAvailable,
	/// The checkpoint slot is known, but its proof body has not been fetched
	/// yet. The caller must fetch and populate this slot now.
	#[error("finalized checkpoint at slot {0} has not been populated yet")]
	CheckpointNotPopulated(u64),
}

#[derive(Default)]
struct CacheState {
	last_synced_finalized: Option<HeaderId<H256, u64>>,
	last_synced_execution_slot: u64,
	last_synced_committee_period: u64,
	initial_checkpoint_slot: u64,
	checkpoints: BTreeMap<u64, Option<(H256, BlockRootsTree)>>,
}

/// Relay progress cache: finality, execution and committee watermarks plus a
/// bounded collection of finalized checkpoints.
///
/// Safe for concurrent use by the sync loop and a status query path. Every
/// operation is one critical section under a single exclusive lock, so no
/// partial update is ever visible.
pub struct BeaconCache {
	slots_per_epoch: u64,
	epochs_per_sync_committee_period: u64,
	capacity: usize,
	state: Mutex<CacheState>,
}

impl BeaconCache {
	/// Creates an empty cache for a chain with the given spec settings,
	/// keeping at most `capacity` checkpoints.
	pub fn new(slots_per_epoch: u64, epochs_per_sync_committee_period: u64, capacity: usize) -> Self {
		BeaconCache {
			slots_per_epoch,
			epochs_per_sync_committee_period,
			capacity,
			state: Mutex::new(CacheState::default()),
		}
	}

	/// Number of slots covered by one block-roots accumulator: a sync
	/// committee period worth of slots.
	pub fn coverage_window(&self) -> u64 {
		self.slots_per_epoch * self.epochs_per_sync_committee_period
	}

	fn period(&self, slot: u64) -> u64 {
		compute_period(slot, self.slots_per_epoch, self.epochs_per_sync_committee_period)
	}

	/// Advances the finalized watermark. Stale and duplicate updates are
	/// silently ignored, which is what makes reconciliation idempotent.
	pub fn set_last_synced_finalized(&self, root: H256, slot: u64) {
		let mut state = self.state.lock();
		if state.last_synced_finalized.map_or(true, |current| slot > current.0) {
			state.last_synced_finalized = Some(HeaderId(slot, root));
		}
	}

	/// Returns the finalized watermark: the latest (slot, root) the
	/// destination chain has accepted.
	pub fn last_synced_finalized(&self) -> Option<HeaderId<H256, u64>> {
		self.state.lock().last_synced_finalized
	}

	/// Advances the execution backfill watermark (monotonic max).
	pub fn set_last_synced_execution_slot(&self, slot: u64) {
		let mut state = self.state.lock();
		if slot > state.last_synced_execution_slot {
			state.last_synced_execution_slot = slot;
		}
	}

	/// Returns the execution backfill watermark.
	pub fn last_synced_execution_slot(&self) -> u64 {
		self.state.lock().last_synced_execution_slot
	}

	/// Advances the sync committee period watermark (monotonic max).
	pub fn set_last_synced_committee_period(&self, period: u64) {
		let mut state = self.state.lock();
		if period > state.last_synced_committee_period {
			state.last_synced_committee_period = period;
		}
	}

	/// Returns the sync committee period watermark.
	pub fn last_synced_committee_period(&self) -> u64 {
		self.state.lock().last_synced_committee_period
	}

	/// Records the slot of the checkpoint the destination chain light client
	/// was bootstrapped from (monotonic max).
	pub fn set_initial_checkpoint_slot(&self, slot: u64) {
		let mut state = self.state.lock();
		if slot > state.initial_checkpoint_slot {
			state.initial_checkpoint_slot = slot;
		}
	}

	/// Returns the initial checkpoint slot.
	pub fn initial_checkpoint_slot(&self) -> u64 {
		self.state.lock().initial_checkpoint_slot
	}

	/// Registers finalized slots as known checkpoint slots without their
	/// proof bodies. A later `closest_checkpoint` call reports them as not
	/// populated, asking the caller to fetch the accumulator.
	pub fn add_checkpoint_slots(&self, slots: &[u64]) {
		let mut state = self.state.lock();
		for slot in slots {
			state.checkpoints.entry(*slot).or_insert(None);
		}
		self.prune(&mut state);
	}

	/// Inserts (or overwrites) the checkpoint at `slot`, then prunes the
	/// oldest entries beyond the capacity. Pruning never removes the most
	/// recent `capacity` slots.
	pub fn add_checkpoint(&self, block_root: H256, block_roots_tree: BlockRootsTree, slot: u64) {
		let mut state = self.state.lock();
		state.checkpoints.insert(slot, Some((block_root, block_roots_tree)));
		self.prune(&mut state);
	}

	fn prune(&self, state: &mut CacheState) {
		while state.checkpoints.len() > self.capacity {
			state.checkpoints.pop_first();
		}
	}

	/// Returns the checkpoint at the smallest cached slot `s` such that
	/// `slot <= s < slot + coverage_window`, i.e. the nearest checkpoint able
	/// to anchor an ancestry proof for `slot`.
	pub fn closest_checkpoint(&self, slot: u64) -> Result<FinalizedCheckpoint, CacheError> {
		let state = self.state.lock();
		let window_end = slot.saturating_add(self.coverage_window());
		match state.checkpoints.range(slot..window_end).next() {
			Some((checkpoint_slot, Some((block_root, block_roots_tree)))) => {
				Ok(FinalizedCheckpoint {
					slot: *checkpoint_slot,
					block_root: *block_root,
					block_roots_tree: block_roots_tree.clone(),
				})
			},
			Some((checkpoint_slot, None)) =>
				Err(CacheError::CheckpointNotPopulated(*checkpoint_slot)),
			None => Err(CacheError::CheckpointNotAvailable),
		}
	}

	/// Returns the populated checkpoint slots, oldest first.
	pub fn checkpoint_slots(&self) -> Vec<u64> {
		self.state
			.lock()
			.checkpoints
			.iter()
			.filter_map(|(slot, checkpoint)| checkpoint.as_ref().map(|_| *slot))
			.collect()
	}

	/// True while the finalized watermark is still in the period of the
	/// initial checkpoint. A bootstrap snapshot carries no next sync
	/// committee, so the very first committee update must close the initial
	/// period itself.
	pub fn is_initial_sync_period(&self) -> bool {
		let state = self.state.lock();
		let finalized_slot = state
			.last_synced_finalized
			.map_or(state.initial_checkpoint_slot, |current| current.0);
		self.period(state.initial_checkpoint_slot) == self.period(finalized_slot)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tree(nonce: u64) -> BlockRootsTree {
		BlockRootsTree {
			block_roots_root: H256::from_low_u64_be(nonce),
			block_roots_branch: vec![],
		}
	}

	// slots_per_epoch 8 x 16 epochs: a 128 slot coverage window
	fn cache() -> BeaconCache {
		BeaconCache::new(8, 16, 50)
	}

	#[test]
	fn watermarks_are_monotonic() {
		let cache = cache();

		cache.set_last_synced_finalized(H256::repeat_byte(1), 100);
		cache.set_last_synced_finalized(H256::repeat_byte(2), 50);
		cache.set_last_synced_finalized(H256::repeat_byte(3), 100);
		assert_eq!(cache.last_synced_finalized(), Some(HeaderId(100, H256::repeat_byte(1))));

		cache.set_last_synced_execution_slot(96);
		cache.set_last_synced_execution_slot(40);
		assert_eq!(cache.last_synced_execution_slot(), 96);

		cache.set_last_synced_committee_period(7);
		cache.set_last_synced_committee_period(6);
		assert_eq!(cache.last_synced_committee_period(), 7);

		cache.set_initial_checkpoint_slot(32);
		cache.set_initial_checkpoint_slot(16);
		assert_eq!(cache.initial_checkpoint_slot(), 32);
	}

	#[test]
	fn first_finalized_watermark_may_be_slot_zero() {
		let cache = cache();
		cache.set_last_synced_finalized(H256::repeat_byte(1), 0);
		assert_eq!(cache.last_synced_finalized(), Some(HeaderId(0, H256::repeat_byte(1))));
	}

	#[test]
	fn prunes_oldest_checkpoints_beyond_capacity() {
		let cache = BeaconCache::new(8, 16, 50);
		for slot in 0..120 {
			cache.add_checkpoint(H256::from_low_u64_be(slot), tree(slot), slot);
		}

		let slots = cache.checkpoint_slots();
		assert_eq!(slots.len(), 50);
		assert_eq!(slots, (70..120).collect::<Vec<_>>());
	}

	#[test]
	fn registered_slots_count_towards_capacity() {
		let cache = BeaconCache::new(8, 16, 3);
		cache.add_checkpoint_slots(&[10, 20, 30, 40]);
		cache.add_checkpoint(H256::repeat_byte(1), tree(50), 50);

		// 10 and 20 are pruned, the most recent three remain
		assert_eq!(cache.closest_checkpoint(5), Err(CacheError::CheckpointNotPopulated(30)));
	}

	#[test]
	fn returns_closest_checkpoint_within_coverage_window() {
		let cache = cache();
		cache.add_checkpoint(H256::repeat_byte(1), tree(100), 100);
		cache.add_checkpoint(H256::repeat_byte(2), tree(228), 228);

		// 100 < 150, so the next candidate within [150, 278) is 228
		assert_eq!(cache.closest_checkpoint(150).map(|c| c.slot), Ok(228));
		// 100 lies within [50, 178)
		assert_eq!(cache.closest_checkpoint(50).map(|c| c.slot), Ok(100));
		// nothing is cached within [250, 378)
		assert_eq!(cache.closest_checkpoint(250), Err(CacheError::CheckpointNotAvailable));
	}

	#[test]
	fn distinguishes_known_but_unpopulated_checkpoints() {
		let cache = cache();
		cache.add_checkpoint_slots(&[200]);

		assert_eq!(cache.closest_checkpoint(180), Err(CacheError::CheckpointNotPopulated(200)));
		assert_eq!(cache.closest_checkpoint(10), Err(CacheError::CheckpointNotAvailable));

		cache.add_checkpoint(H256::repeat_byte(1), tree(200), 200);
		assert_eq!(cache.closest_checkpoint(180).map(|c| c.slot), Ok(200));
	}

	#[test]
	fn initial_sync_period_tracks_finalized_watermark() {
		let cache = cache();
		cache.set_initial_checkpoint_slot(10);
		// watermark not set yet: still in the initial period
		assert!(cache.is_initial_sync_period());

		// period of slot 100 is 0, same as the initial checkpoint
		cache.set_last_synced_finalized(H256::repeat_byte(1), 100);
		assert!(cache.is_initial_sync_period());

		// slot 130 is in period 1
		cache.set_last_synced_finalized(H256::repeat_byte(2), 130);
		assert!(!cache.is_initial_sync_period());
	}
}
