use std::{
    fmt::{Display, Formatter},
    time::Duration,
};

use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};

use crate::{
    constants::{
        ACCOUNT_COMPRESSION_PROGRAM_ID, COMPRESSED_TOKEN_PROGRAM_ID, CPI_AUTHORITY_PDA_SEED,
        DEFAULT_COMPUTE_UNIT_LIMIT, DEFAULT_CONFIRM_POLL_MS, DEFAULT_CONFIRM_TIMEOUT_MS,
        DEFAULT_NULLIFIER_QUEUE, DEFAULT_PROOF_ATTEMPTS, DEFAULT_REFRESH_INTERVAL_SECS,
        DEFAULT_STATE_TREE, HISTORY_LIMIT, LIGHT_SYSTEM_PROGRAM_ID, MAX_INPUT_ACCOUNTS,
        NOOP_PROGRAM_ID, SOL_POOL_PDA_SEED, TOKEN_BALANCE_PAGE_LIMIT,
    },
    indexer::RetryConfig as IndexerRetryConfig,
    rpc::RetryConfig as RpcRetryConfig,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Devnet,
    Testnet,
    Localnet,
    Custom(String),
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            Network::Mainnet => "https://api.mainnet-beta.solana.com".to_string(),
            Network::Devnet => "https://api.devnet.solana.com".to_string(),
            Network::Testnet => "https://api.testnet.solana.com".to_string(),
            Network::Localnet => "http://localhost:8899".to_string(),
            Network::Custom(url) => url.clone(),
        };
        write!(f, "{}", str)
    }
}

impl Network {
    /// Accepts `mainnet`, `devnet`, `testnet`, `localnet` or a URL.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "mainnet-beta" => Network::Mainnet,
            "devnet" => Network::Devnet,
            "testnet" => Network::Testnet,
            "localnet" | "localhost" => Network::Localnet,
            _ => Network::Custom(value.trim().to_string()),
        }
    }
}

/// Program ids of the compression stack. Defaults are the public deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightProgramIds {
    pub light_system_program: Pubkey,
    pub compressed_token_program: Pubkey,
    pub account_compression_program: Pubkey,
    pub noop_program: Pubkey,
}

impl Default for LightProgramIds {
    fn default() -> Self {
        Self {
            light_system_program: LIGHT_SYSTEM_PROGRAM_ID,
            compressed_token_program: COMPRESSED_TOKEN_PROGRAM_ID,
            account_compression_program: ACCOUNT_COMPRESSION_PROGRAM_ID,
            noop_program: NOOP_PROGRAM_ID,
        }
    }
}

impl LightProgramIds {
    pub fn registered_program_pda(&self) -> Pubkey {
        Pubkey::find_program_address(
            &[self.light_system_program.as_ref()],
            &self.account_compression_program,
        )
        .0
    }

    /// Authority the system program signs with when calling account compression.
    pub fn account_compression_authority(&self) -> Pubkey {
        Pubkey::find_program_address(&[CPI_AUTHORITY_PDA_SEED], &self.light_system_program).0
    }

    /// Authority the token program signs with when calling the system program.
    pub fn token_cpi_authority(&self) -> Pubkey {
        Pubkey::find_program_address(&[CPI_AUTHORITY_PDA_SEED], &self.compressed_token_program).0
    }

    pub fn sol_pool_pda(&self) -> Pubkey {
        Pubkey::find_program_address(&[SOL_POOL_PDA_SEED], &self.light_system_program).0
    }
}

/// A state Merkle tree and the queue its spent leaves are nullified in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTreeInfo {
    pub tree: Pubkey,
    pub queue: Pubkey,
}

impl Default for StateTreeInfo {
    fn default() -> Self {
        Self {
            tree: DEFAULT_STATE_TREE,
            queue: DEFAULT_NULLIFIER_QUEUE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub rpc_url: String,
    pub commitment: CommitmentConfig,
    /// Indexer endpoint. Without one every compressed-state operation fails
    /// with `IndexerUnavailable`.
    pub indexer_url: Option<String>,
    pub indexer_api_key: Option<String>,
    pub rpc_retry: RpcRetryConfig,
    pub indexer_retry: IndexerRetryConfig,
    pub confirm_timeout: Duration,
    pub confirm_poll_interval: Duration,
    pub refresh_interval: Duration,
    pub proof_attempts: u32,
    pub compute_unit_limit: u32,
    pub max_inputs: usize,
    pub token_balance_limit: u16,
    pub history_limit: u16,
    pub programs: LightProgramIds,
    /// Known state trees. The first entry receives new outputs.
    pub state_trees: Vec<StateTreeInfo>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            rpc_url: Network::Devnet.to_string(),
            commitment: CommitmentConfig::confirmed(),
            indexer_url: None,
            indexer_api_key: None,
            rpc_retry: RpcRetryConfig::default(),
            indexer_retry: IndexerRetryConfig::default(),
            confirm_timeout: Duration::from_millis(DEFAULT_CONFIRM_TIMEOUT_MS),
            confirm_poll_interval: Duration::from_millis(DEFAULT_CONFIRM_POLL_MS),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            proof_attempts: DEFAULT_PROOF_ATTEMPTS,
            compute_unit_limit: DEFAULT_COMPUTE_UNIT_LIMIT,
            max_inputs: MAX_INPUT_ACCOUNTS,
            token_balance_limit: TOKEN_BALANCE_PAGE_LIMIT,
            history_limit: HISTORY_LIMIT,
            programs: LightProgramIds::default(),
            state_trees: vec![StateTreeInfo::default()],
        }
    }
}

impl WalletConfig {
    pub fn new(network: Network, indexer_url: Option<String>) -> Self {
        Self {
            rpc_url: network.to_string(),
            indexer_url: indexer_url.filter(|url| !url.trim().is_empty()),
            ..Default::default()
        }
    }

    pub fn output_tree(&self) -> StateTreeInfo {
        self.state_trees.first().copied().unwrap_or_default()
    }

    /// Resolves the queue of a known tree.
    pub fn queue_for_tree(&self, tree: &Pubkey) -> Option<Pubkey> {
        self.state_trees
            .iter()
            .find(|info| info.tree == *tree)
            .map(|info| info.queue)
    }
}
