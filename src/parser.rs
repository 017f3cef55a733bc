// Free-text command parsing.
//
// Recognizes `bridge <amount> <token> from <chain> to <chain>` anywhere in a
// message, case-insensitively, and validates it against the chain registry.
// `RequestParser::reconstruct` rebuilds the same request from already
// separated fields, which is how action tokens are turned back into requests.

use crate::registry::ChainRegistry;
use crate::types::{BridgeRequest, RequestError};
use crate::utils;
use ethers::types::Address;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

static BRIDGE_COMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bbridge\s+(\d+(?:\.\d+)?)\s+(\w+)\s+from\s+(\w+)\s+to\s+(\w+)")
        .expect("bridge command pattern is valid")
});

pub struct RequestParser {
    registry: Arc<ChainRegistry>,
    user_address: Address,
}

impl RequestParser {
    pub fn new(registry: Arc<ChainRegistry>, user_address: Address) -> Self {
        Self {
            registry,
            user_address,
        }
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    /// Parse a chat message; `None` means "show the usage hint"
    pub fn parse(&self, text: &str) -> Option<BridgeRequest> {
        match self.try_parse(text) {
            Ok(request) => Some(request),
            Err(e) => {
                debug!("Command not accepted: {}", e);
                None
            }
        }
    }

    /// Parse a chat message, reporting why it was rejected
    pub fn try_parse(&self, text: &str) -> Result<BridgeRequest, RequestError> {
        let captures = BRIDGE_COMMAND
            .captures(text)
            .ok_or(RequestError::Unrecognized)?;

        self.try_reconstruct(&captures[1], &captures[2], &captures[3], &captures[4])
    }

    /// Rebuild a request from its components; identical to parsing the same values
    pub fn reconstruct(
        &self,
        amount: &str,
        token: &str,
        from_chain: &str,
        to_chain: &str,
    ) -> Option<BridgeRequest> {
        self.try_reconstruct(amount, token, from_chain, to_chain).ok()
    }

    pub fn try_reconstruct(
        &self,
        amount: &str,
        token: &str,
        from_chain: &str,
        to_chain: &str,
    ) -> Result<BridgeRequest, RequestError> {
        let from_chain = from_chain.trim().to_lowercase();
        let to_chain = to_chain.trim().to_lowercase();
        let token = token.trim().to_lowercase();
        let amount = amount.trim();

        let from_config = self
            .registry
            .chain(&from_chain)
            .ok_or_else(|| RequestError::UnsupportedChain(from_chain.clone()))?;
        let to_config = self
            .registry
            .chain(&to_chain)
            .ok_or_else(|| RequestError::UnsupportedChain(to_chain.clone()))?;

        if from_chain == to_chain {
            return Err(RequestError::SameChain(from_chain));
        }

        let token_address = from_config.tokens.get(&token).copied().ok_or_else(|| {
            RequestError::UnsupportedToken {
                token: token.clone(),
                chain: from_chain.clone(),
            }
        })?;

        let decimals = self.registry.token_decimals(&token);
        let units = utils::parse_token_amount(amount, decimals)
            .map_err(|e| RequestError::InvalidAmount(format!("{}: {}", amount, e)))?;
        if units.is_zero() {
            return Err(RequestError::InvalidAmount(format!(
                "{}: must be greater than zero",
                amount
            )));
        }

        Ok(BridgeRequest {
            amount: amount.to_string(),
            token,
            from_chain_id: from_config.chain_id,
            to_chain_id: to_config.chain_id,
            from_chain,
            to_chain,
            token_address,
            user_address: self.user_address,
        })
    }
}
