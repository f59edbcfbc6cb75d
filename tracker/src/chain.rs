use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Chain id used when none is given.
pub const DEFAULT_CHAIN_ID: u64 = 8453;

/// Networks the Pendle API serves markets for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Optimism,
    Bnb,
    Mantle,
    #[default]
    Base,
    Arbitrum,
}

impl Chain {
    pub const ALL: [Chain; 6] = [
        Chain::Base,
        Chain::Ethereum,
        Chain::Arbitrum,
        Chain::Bnb,
        Chain::Optimism,
        Chain::Mantle,
    ];

    pub fn id(self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Optimism => 10,
            Chain::Bnb => 56,
            Chain::Mantle => 5000,
            Chain::Base => 8453,
            Chain::Arbitrum => 42161,
        }
    }

    pub fn from_id(id: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            Chain::Ethereum => "Ethereum",
            Chain::Optimism => "Optimism",
            Chain::Bnb => "BNB Chain",
            Chain::Mantle => "Mantle",
            Chain::Base => "Base",
            Chain::Arbitrum => "Arbitrum",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Optimism => "optimism",
            Chain::Bnb => "bsc",
            Chain::Mantle => "mantle",
            Chain::Base => "base",
            Chain::Arbitrum => "arbitrum",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Chain {
    type Err = anyhow::Error;

    /// Parses a numeric chain id or a slug ("base", "eth", "arb", ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if let Ok(id) = s.parse::<u64>() {
            return Self::from_id(id).ok_or_else(|| anyhow!("unsupported chain id: {}", id));
        }
        match s.as_str() {
            "ethereum" | "eth" | "mainnet" => Ok(Chain::Ethereum),
            "optimism" | "op" => Ok(Chain::Optimism),
            "bnb" | "bsc" => Ok(Chain::Bnb),
            "mantle" => Ok(Chain::Mantle),
            "base" => Ok(Chain::Base),
            "arbitrum" | "arb" => Ok(Chain::Arbitrum),
            _ => Err(anyhow!("unknown chain: {}", s)),
        }
    }
}

/// Display name for any chain id, including ones outside [`Chain`].
pub fn chain_name(id: u64) -> &'static str {
    Chain::from_id(id).map(Chain::name).unwrap_or("Unknown")
}
