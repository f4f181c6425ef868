// SPDX-License-Identifier: Apache-2.0
// SPDX-FileCopyrightText: 2023 Snowfork <hello@snowfork.com>
//! SSZ merkleization of the types the relay must be able to root locally.

use scale_info::TypeInfo;
use sp_core::{RuntimeDebug, H256};
use ssz_rs::prelude::*;
use ssz_rs_derive::SimpleSerialize as SimpleSerializeDerive;

use crate::types::BeaconHeader;

/// Error while computing a hash tree root.
#[derive(Copy, Clone, codec::Encode, codec::Decode, PartialEq, Eq, RuntimeDebug, TypeInfo)]
pub enum MerkleizationError {
	/// Merkleization of the object failed.
	HashTreeRootFailed,
	/// The computed root had an unexpected length.
	InvalidLength,
}

#[derive(Default, SimpleSerializeDerive, Clone, Debug)]
pub struct SSZBeaconBlockHeader {
	pub slot: u64,
	pub proposer_index: u64,
	pub parent_root: [u8; 32],
	pub state_root: [u8; 32],
	pub body_root: [u8; 32],
}

impl From<BeaconHeader> for SSZBeaconBlockHeader {
	fn from(header: BeaconHeader) -> Self {
		SSZBeaconBlockHeader {
			slot: header.slot,
			proposer_index: header.proposer_index,
			parent_root: header.parent_root.to_fixed_bytes(),
			state_root: header.state_root.to_fixed_bytes(),
			body_root: header.body_root.to_fixed_bytes(),
		}
	}
}

/// Returns the hash tree root of an SSZ-encodable object.
pub fn hash_tree_root<T: SimpleSerialize>(mut object: T) -> Result<H256, MerkleizationError> {
	match object.hash_tree_root() {
		Ok(node) => {
			let fixed_bytes: [u8; 32] =
				node.as_ref().try_into().map_err(|_| MerkleizationError::InvalidLength)?;
			Ok(fixed_bytes.into())
		},
		Err(_) => Err(MerkleizationError::HashTreeRootFailed),
	}
}
