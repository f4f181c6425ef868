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

//! Finding, registering and populating the finalized checkpoint a given slot
//! must be proven against.

use crate::{
	cache::{BeaconCache, CacheError, FinalizedCheckpoint},
	error::Error,
	sync_loop::{BlockRootsAvailability, SourceClient, TargetClient},
};

use bp_beacon::ExecutionHeaderUpdate;

/// Builds the execution header update for the block at `slot`, bound by an
/// ancestry witness to the nearest usable checkpoint.
pub(crate) async fn execution_header_update<SC: SourceClient, TC: TargetClient>(
	cache: &BeaconCache,
	source_client: &SC,
	target_client: &TC,
	slot: u64,
) -> Result<ExecutionHeaderUpdate, Error<SC::Error, TC::Error>> {
	let checkpoint = closest_checkpoint(cache, source_client, target_client, slot).await?;
	source_client.execution_header_update(slot, &checkpoint).await.map_err(Error::Source)
}

/// Finds, or constructs, the nearest checkpoint able to anchor an ancestry
/// proof for `slot`.
pub(crate) async fn closest_checkpoint<SC: SourceClient, TC: TargetClient>(
	cache: &BeaconCache,
	source_client: &SC,
	target_client: &TC,
	slot: u64,
) -> Result<FinalizedCheckpoint, Error<SC::Error, TC::Error>> {
	loop {
		match cache.closest_checkpoint(slot) {
			Ok(checkpoint) => return Ok(checkpoint),
			Err(CacheError::CheckpointNotPopulated(checkpoint_slot)) =>
				populate_checkpoint(cache, source_client, target_client, checkpoint_slot).await?,
			Err(CacheError::CheckpointNotAvailable) => {
				let boundary = next_period_boundary(slot, cache.coverage_window());
				log::debug!(
					target: "bridge",
					"No checkpoint is known for slot {}, registering the period boundary at slot {}",
					slot,
					boundary,
				);
				cache.add_checkpoint_slots(&[boundary]);
			},
		}
	}
}

/// Fetches the proof body of a known checkpoint slot and inserts it into the
/// cache.
async fn populate_checkpoint<SC: SourceClient, TC: TargetClient>(
	cache: &BeaconCache,
	source_client: &SC,
	target_client: &TC,
	checkpoint_slot: u64,
) -> Result<(), Error<SC::Error, TC::Error>> {
	let header = source_client
		.header_at_slot(checkpoint_slot)
		.await
		.map_err(Error::Source)?
		.ok_or(Error::CheckpointUnconfirmed(checkpoint_slot))?;
	let block_root = header.hash_tree_root().map_err(Error::Merkleization)?;

	// Never populate a checkpoint the destination chain has not itself
	// accepted as a finalized header.
	let accepted_slot = target_client
		.finalized_header_slot_by_root(block_root)
		.await
		.map_err(Error::Target)?;
	if accepted_slot != Some(checkpoint_slot) {
		return Err(Error::CheckpointUnconfirmed(checkpoint_slot))
	}

	let block_roots_tree = match source_client
		.block_roots(checkpoint_slot)
		.await
		.map_err(Error::Source)?
	{
		BlockRootsAvailability::Available(block_roots_tree) => block_roots_tree,
		BlockRootsAvailability::NotYetAvailable =>
			return Err(Error::BeaconStateUnavailable(checkpoint_slot)),
	};

	cache.add_checkpoint(block_root, block_roots_tree, checkpoint_slot);
	log::debug!(
		target: "bridge",
		"Populated checkpoint {:?} at slot {}",
		block_root,
		checkpoint_slot,
	);
	Ok(())
}

/// Returns the first sync-committee-period boundary at or after `slot`.
fn next_period_boundary(slot: u64, coverage_window: u64) -> u64 {
	slot.div_ceil(coverage_window) * coverage_window
}
