// SPDX-License-Identifier: Apache-2.0
// SPDX-FileCopyrightText: 2023 Snowfork <hello@snowfork.com>
//! Beacon chain data model.

use codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use sp_core::{RuntimeDebug, H256};
use sp_std::prelude::*;

use crate::{
	config::{PUBKEY_SIZE, SIGNATURE_SIZE},
	ssz::{hash_tree_root, MerkleizationError, SSZBeaconBlockHeader},
};

/// A BLS public key.
#[derive(Copy, Clone, Encode, Decode, PartialEq, Eq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub struct PublicKey(pub [u8; PUBKEY_SIZE]);

impl Default for PublicKey {
	fn default() -> Self {
		PublicKey([0u8; PUBKEY_SIZE])
	}
}

/// A BLS aggregate signature.
#[derive(Copy, Clone, Encode, Decode, PartialEq, Eq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub struct Signature(pub [u8; SIGNATURE_SIZE]);

impl Default for Signature {
	fn default() -> Self {
		Signature([0u8; SIGNATURE_SIZE])
	}
}

/// A beacon block header. Identified by its hash tree root.
#[derive(
	Copy, Clone, Default, Encode, Decode, PartialEq, Eq, RuntimeDebug, TypeInfo, MaxEncodedLen,
)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct BeaconHeader {
	/// The slot this header belongs to.
	pub slot: u64,
	/// The index of the validator that proposed the block.
	pub proposer_index: u64,
	/// The hash tree root of the parent block.
	pub parent_root: H256,
	/// The hash tree root of the post state.
	pub state_root: H256,
	/// The hash tree root of the block body.
	pub body_root: H256,
}

impl BeaconHeader {
	/// Returns the hash tree root ("block root") of this header.
	pub fn hash_tree_root(&self) -> Result<H256, MerkleizationError> {
		hash_tree_root::<SSZBeaconBlockHeader>((*self).into())
	}
}

/// Aggregate attestation of a sync committee over an attested header.
/// Opaque to the relay; verified by the light client on the destination
/// chain.
#[derive(Clone, Default, Encode, Decode, PartialEq, Eq, RuntimeDebug, TypeInfo)]
pub struct SyncAggregate {
	/// Bitfield of the committee members that participated.
	pub sync_committee_bits: Vec<u8>,
	/// Aggregate signature of the participants.
	pub sync_committee_signature: Signature,
}

/// A sync committee: the rotating validator subset attesting to finality for
/// one period of slots.
#[derive(Clone, Default, Encode, Decode, PartialEq, Eq, RuntimeDebug, TypeInfo)]
pub struct SyncCommittee {
	/// Public keys of the committee members.
	pub pubkeys: Vec<PublicKey>,
	/// Aggregate public key of the whole committee.
	pub aggregate_pubkey: PublicKey,
}

/// Block-roots accumulator of a finalized checkpoint: the Merkle structure
/// over recent block roots that makes ancestry proofs possible for any slot
/// within one sync committee period of the checkpoint.
#[derive(Clone, Default, Encode, Decode, PartialEq, Eq, RuntimeDebug, TypeInfo)]
pub struct BlockRootsTree {
	/// Hash tree root of the `block_roots` beacon state field.
	pub block_roots_root: H256,
	/// Branch proving `block_roots_root` against the checkpoint state root.
	pub block_roots_branch: Vec<H256>,
}

/// Compact form of an execution payload header.
#[derive(Clone, Default, Encode, Decode, PartialEq, Eq, RuntimeDebug, TypeInfo)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct ExecutionPayloadHeader {
	/// Parent execution block hash.
	pub parent_hash: H256,
	/// Execution block hash.
	pub block_hash: H256,
	/// Execution block number.
	pub block_number: u64,
	/// Execution state root.
	pub state_root: H256,
	/// Receipts root.
	pub receipts_root: H256,
}

/// Finalized header sync state, as accepted by the destination chain.
#[derive(
	Copy, Clone, Default, Encode, Decode, PartialEq, Eq, RuntimeDebug, TypeInfo, MaxEncodedLen,
)]
pub struct FinalizedHeaderState {
	/// Block root of the latest accepted finalized header.
	pub beacon_block_root: H256,
	/// Slot of the latest accepted finalized header.
	pub beacon_slot: u64,
	/// Slot of the checkpoint the light client was bootstrapped from.
	pub initial_checkpoint_slot: u64,
}

/// Execution header sync state, as accepted by the destination chain.
#[derive(
	Copy, Clone, Default, Encode, Decode, PartialEq, Eq, RuntimeDebug, TypeInfo, MaxEncodedLen,
)]
pub struct ExecutionHeaderState {
	/// Slot of the beacon block carrying the latest accepted execution
	/// header.
	pub beacon_slot: u64,
	/// Number of the latest accepted execution block.
	pub block_number: u64,
}
