// SPDX-License-Identifier: Apache-2.0
// SPDX-FileCopyrightText: 2023 Snowfork <hello@snowfork.com>

/// Returns the epoch containing `slot`.
pub fn compute_epoch(slot: u64, slots_per_epoch: u64) -> u64 {
	slot / slots_per_epoch
}

/// Returns the sync committee period containing `slot`.
pub fn compute_period(slot: u64, slots_per_epoch: u64, epochs_per_period: u64) -> u64 {
	slot / slots_per_epoch / epochs_per_period
}
