// SPDX-License-Identifier: Apache-2.0
// SPDX-FileCopyrightText: 2023 Snowfork <hello@snowfork.com>
//! Update payloads submitted to the light client on the destination chain.

use codec::{Decode, Encode};
use scale_info::TypeInfo;
use sp_core::{RuntimeDebug, H256};
use sp_std::prelude::*;

use crate::types::{
	BeaconHeader, BlockRootsTree, ExecutionPayloadHeader, SyncAggregate, SyncCommittee,
};

/// Initial light client snapshot, used to bootstrap an empty destination
/// chain. Unlike every later update it carries the full current sync
/// committee, not just the next one.
#[derive(Clone, Default, Encode, Decode, PartialEq, Eq, RuntimeDebug, TypeInfo)]
pub struct CheckpointUpdate {
	/// The finalized header the snapshot was taken at.
	pub header: BeaconHeader,
	/// Sync committee of the period containing `header`.
	pub current_sync_committee: SyncCommittee,
	/// Branch proving the committee against `header.state_root`.
	pub current_sync_committee_branch: Vec<H256>,
	/// Root of the genesis validator registry, fixed per chain.
	pub validators_root: H256,
	/// Block-roots accumulator of the checkpoint.
	pub block_roots_tree: BlockRootsTree,
}

/// A signed claim by the current sync committee that `finalized_header` is
/// finalized. Not persisted beyond one use: once accepted on-chain it becomes
/// a cached checkpoint.
#[derive(Clone, Default, Encode, Decode, PartialEq, Eq, RuntimeDebug, TypeInfo)]
pub struct FinalizedUpdate {
	/// Header the sync committee actually signed over.
	pub attested_header: BeaconHeader,
	/// Header that `attested_header` proves finalized.
	pub finalized_header: BeaconHeader,
	/// Branch proving `finalized_header` against the attested state root.
	pub finality_branch: Vec<H256>,
	/// Committee attestation over `attested_header`.
	pub sync_aggregate: SyncAggregate,
	/// Slot at which the aggregate signature was created.
	pub signature_slot: u64,
	/// Precomputed block root of `finalized_header`.
	pub finalized_block_root: H256,
	/// Block-roots accumulator of the finalized header.
	pub block_roots_tree: BlockRootsTree,
}

/// Advances which committee the destination chain trusts for the next
/// period. Must be applied in non-decreasing period order; a skipped period
/// makes every later update unverifiable.
#[derive(Clone, Default, Encode, Decode, PartialEq, Eq, RuntimeDebug, TypeInfo)]
pub struct SyncCommitteeUpdate {
	/// Header the sync committee signed over.
	pub attested_header: BeaconHeader,
	/// The committee for the period after the attested one.
	pub next_sync_committee: SyncCommittee,
	/// Branch proving the next committee against the attested state root.
	pub next_sync_committee_branch: Vec<H256>,
	/// Finalized header carried by the update.
	pub finalized_header: BeaconHeader,
	/// Branch proving `finalized_header` against the attested state root.
	pub finality_branch: Vec<H256>,
	/// Committee attestation over `attested_header`.
	pub sync_aggregate: SyncAggregate,
	/// Slot at which the aggregate signature was created.
	pub signature_slot: u64,
}

/// Merkle witness that a block root is part of the block-roots accumulator of
/// a specific finalized checkpoint.
#[derive(Clone, Default, Encode, Decode, PartialEq, Eq, RuntimeDebug, TypeInfo)]
pub struct AncestryProof {
	/// Branch from the proven block root up to the accumulator root.
	pub header_branch: Vec<H256>,
	/// Block root of the checkpoint the proof is anchored in.
	pub finalized_block_root: H256,
}

/// Proves that the block at `header.slot`, and the execution payload inside
/// it, descends from a finalized checkpoint.
#[derive(Clone, Default, Encode, Decode, PartialEq, Eq, RuntimeDebug, TypeInfo)]
pub struct ExecutionHeaderUpdate {
	/// The beacon header being proven.
	pub header: BeaconHeader,
	/// Witness binding `header` to a finalized checkpoint. `None` only when
	/// `header` is itself the latest finalized header.
	pub ancestry_proof: Option<AncestryProof>,
	/// The execution payload header inside the block.
	pub execution_header: ExecutionPayloadHeader,
	/// Branch proving `execution_header` against `header.body_root`.
	pub execution_branch: Vec<H256>,
}
