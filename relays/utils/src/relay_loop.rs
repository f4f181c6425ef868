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

//! Relay loop runner: drives a single sync loop, reconnecting the failed
//! client whenever the loop reports a lost connection.

use crate::{FailedClient, LoopError, MaybeConnectionError};

use async_trait::async_trait;
use std::{fmt::Debug, future::Future, time::Duration};

/// Delay after a connection-related error before reconnection is attempted.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Client used by a relay loop.
#[async_trait]
pub trait Client: 'static + Clone + Send + Sync {
	/// Type of the error this client returns.
	type Error: 'static + Debug + MaybeConnectionError + Send + Sync;

	/// Try to reconnect to the node.
	async fn reconnect(&mut self) -> Result<(), Self::Error>;
}

/// Returns a builder for a relay loop over the given clients.
pub fn relay_loop<SC, TC>(source_client: SC, target_client: TC) -> Loop<SC, TC> {
	Loop { reconnect_delay: RECONNECT_DELAY, source_client, target_client }
}

/// Relay loop builder and runner.
pub struct Loop<SC, TC> {
	reconnect_delay: Duration,
	source_client: SC,
	target_client: TC,
}

impl<SC: Client, TC: Client> Loop<SC, TC> {
	/// Customize the delay between reconnect attempts.
	pub fn with_reconnect_delay(mut self, reconnect_delay: Duration) -> Self {
		self.reconnect_delay = reconnect_delay;
		self
	}

	/// Run the loop until it completes gracefully or fails with an
	/// unrecoverable error. Lost connections are re-established and the loop
	/// is restarted from scratch, which is safe as long as the loop
	/// reconciles its state with the target chain on startup.
	pub async fn run<R, F, E>(mut self, loop_name: &str, run_loop: R) -> Result<(), E>
	where
		R: Fn(SC, TC) -> F,
		F: Future<Output = Result<(), LoopError<E>>>,
		E: Debug,
	{
		loop {
			let result =
				run_loop(self.source_client.clone(), self.target_client.clone()).await;

			match result {
				Ok(()) => return Ok(()),
				Err(LoopError::Fatal(error)) => {
					log::error!(
						target: "bridge",
						"{} loop has stopped with an unrecoverable error: {:?}",
						loop_name,
						error,
					);
					return Err(error)
				},
				Err(LoopError::Reconnect(failed_client)) => {
					reconnect_failed_client(
						failed_client,
						self.reconnect_delay,
						&mut self.source_client,
						&mut self.target_client,
					)
					.await;
					log::debug!(target: "bridge", "Restarting {} loop", loop_name);
				},
			}
		}
	}
}

/// Reconnect the failed client(s), retrying until reconnection succeeds.
pub async fn reconnect_failed_client(
	failed_client: FailedClient,
	reconnect_delay: Duration,
	source_client: &mut impl Client,
	target_client: &mut impl Client,
) {
	loop {
		async_std::task::sleep(reconnect_delay).await;

		if matches!(failed_client, FailedClient::Source | FailedClient::Both) {
			if let Err(error) = source_client.reconnect().await {
				log::warn!(
					target: "bridge",
					"Failed to reconnect to source client. Going to retry in {}s: {:?}",
					reconnect_delay.as_secs(),
					error,
				);
				continue
			}
		}
		if matches!(failed_client, FailedClient::Target | FailedClient::Both) {
			if let Err(error) = target_client.reconnect().await {
				log::warn!(
					target: "bridge",
					"Failed to reconnect to target client. Going to retry in {}s: {:?}",
					reconnect_delay.as_secs(),
					error,
				);
				continue
			}
		}

		break
	}
}
