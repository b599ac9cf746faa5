//! One-shot payment-token transfer that lets the mint contract pay the
//! oracle fee.

use crate::environment::NetworkEnvironment;
use mint_gateway::contracts::LinkToken;
use mint_gateway::{ContractGateway, GatewayError};
use mint_types::{format_token_amount, Address, U256};
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum FundingError {
	#[error("Funding failed: {0}")]
	FundingFailed(String),
	#[error("Gateway error: {0}")]
	Gateway(#[from] GatewayError),
}

pub struct FundingStep {
	link: LinkToken,
}

impl FundingStep {
	pub fn new(gateway: &ContractGateway, environment: &NetworkEnvironment) -> Self {
		Self {
			link: LinkToken::new(gateway.attach(LinkToken::NAME, environment.link_token)),
		}
	}

	/// Transfers `amount` to `consumer` and returns its balance afterwards.
	#[instrument(skip_all, fields(consumer = %consumer))]
	pub async fn fund(&self, consumer: Address, amount: U256) -> Result<U256, FundingError> {
		let receipt = self.link.transfer(consumer, amount).await?;
		if !receipt.success {
			return Err(FundingError::FundingFailed(format!(
				"transfer of {} to {} reverted in {}",
				amount, consumer, receipt.hash
			)));
		}

		let balance = self.link.balance_of(consumer).await?;
		tracing::info!(
			amount = %format_token_amount(&amount.to_string(), 18),
			balance = %format_token_amount(&balance.to_string(), 18),
			"Funded contract with LINK"
		);
		Ok(balance)
	}
}
