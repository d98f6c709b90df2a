use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::SystemTime,
};

use solana_sdk::pubkey::Pubkey;
use tracing::{debug, trace, warn};

use crate::{
    constants::{LAMPORTS_PER_SOL, NO_WALLET_LOADED},
    mint::to_ui_amount,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshOptions {
    /// Fetch without raising the loading flag.
    pub silent: bool,
}

impl RefreshOptions {
    pub fn silent() -> Self {
        Self { silent: true }
    }

    pub fn loud() -> Self {
        Self { silent: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalanceEntry {
    pub mint: Pubkey,
    pub balance: u64,
    /// `None` until the mint account has been read.
    pub decimals: Option<u8>,
}

impl TokenBalanceEntry {
    pub fn ui_amount(&self) -> Option<f64> {
        self.decimals.map(|decimals| to_ui_amount(self.balance, decimals))
    }
}

/// Last known balances of one owner. Replaced as a whole, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BalanceSnapshot {
    pub public_lamports: u64,
    pub compressed_lamports: u64,
    pub token_balances: Vec<TokenBalanceEntry>,
    /// `None` until a refresh has fully succeeded.
    pub last_refreshed_at: Option<SystemTime>,
}

impl BalanceSnapshot {
    pub fn total_lamports(&self) -> u64 {
        self.public_lamports.saturating_add(self.compressed_lamports)
    }
}

/// The balance read every other part of the wallet goes through.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BalanceView {
    pub total_lamports: u64,
    pub public_lamports: u64,
    pub compressed_lamports: u64,
    pub error: Option<String>,
}

impl BalanceView {
    pub fn total_sol(&self) -> f64 {
        lamports_to_sol(self.total_lamports)
    }

    pub fn public_sol(&self) -> f64 {
        lamports_to_sol(self.public_lamports)
    }

    pub fn compressed_sol(&self) -> f64 {
        lamports_to_sol(self.compressed_lamports)
    }
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Compressed half of a refresh: SOL held in compressed accounts plus the
/// per-mint token balances.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompressedHalf {
    pub lamports: u64,
    pub token_balances: Vec<TokenBalanceEntry>,
}

/// Issued when a fetch starts; the result is only applied if no newer fetch
/// for the same owner has been applied in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub owner: Pubkey,
    pub seq: u64,
    pub silent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Complete,
    /// One half failed; its last known value was kept.
    Partial,
    /// A newer fetch was already applied, or the owner changed.
    Discarded,
}

#[derive(Debug, Default)]
struct CacheState {
    owner: Option<Pubkey>,
    snapshot: Arc<BalanceSnapshot>,
    error: Option<String>,
    loading_seq: Option<u64>,
    next_seq: u64,
    applied_seq: u64,
}

#[derive(Debug, Default)]
pub struct BalanceCache {
    state: Mutex<CacheState>,
}

impl BalanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn owner(&self) -> Option<Pubkey> {
        self.lock().owner
    }

    pub fn snapshot(&self) -> Arc<BalanceSnapshot> {
        self.lock().snapshot.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading_seq.is_some()
    }

    /// Switches the cached owner. Any change drops the old snapshot and
    /// invalidates fetches still in flight.
    pub fn set_owner(&self, owner: Option<Pubkey>) {
        let mut state = self.lock();
        if state.owner == owner {
            return;
        }
        debug!("Balance cache owner changed to {:?}", owner);
        state.owner = owner;
        state.snapshot = Arc::new(BalanceSnapshot::default());
        state.error = None;
        state.loading_seq = None;
        state.applied_seq = state.next_seq;
    }

    pub fn clear(&self) {
        self.set_owner(None);
    }

    pub fn begin_fetch(&self, owner: Pubkey, options: RefreshOptions) -> FetchTicket {
        let mut state = self.lock();
        state.next_seq += 1;
        let seq = state.next_seq;
        if !options.silent {
            state.loading_seq = Some(seq);
        }
        trace!("Balance fetch {} started for {}", seq, owner);
        FetchTicket {
            owner,
            seq,
            silent: options.silent,
        }
    }

    /// Applies a finished fetch. A failed half keeps its last known value and
    /// its error is recorded instead.
    pub fn apply(
        &self,
        ticket: FetchTicket,
        public: Result<u64, String>,
        compressed: Result<CompressedHalf, String>,
    ) -> ApplyOutcome {
        let mut state = self.lock();
        if state.loading_seq == Some(ticket.seq) {
            state.loading_seq = None;
        }
        if state.owner != Some(ticket.owner) || ticket.seq <= state.applied_seq {
            debug!(
                "Discarding balance fetch {} (applied {})",
                ticket.seq, state.applied_seq
            );
            return ApplyOutcome::Discarded;
        }
        state.applied_seq = ticket.seq;

        let mut snapshot = BalanceSnapshot::clone(&state.snapshot);
        let mut errors = Vec::new();
        match public {
            Ok(lamports) => snapshot.public_lamports = lamports,
            Err(err) => errors.push(format!("public balance: {}", err)),
        }
        match compressed {
            Ok(half) => {
                snapshot.compressed_lamports = half.lamports;
                snapshot.token_balances = half.token_balances;
            }
            Err(err) => errors.push(format!("compressed balance: {}", err)),
        }

        let outcome = if errors.is_empty() {
            snapshot.last_refreshed_at = Some(SystemTime::now());
            state.error = None;
            ApplyOutcome::Complete
        } else {
            let error = errors.join("; ");
            warn!("Balance refresh for {} incomplete: {}", ticket.owner, error);
            state.error = Some(error);
            ApplyOutcome::Partial
        };
        state.snapshot = Arc::new(snapshot);
        outcome
    }

    pub fn view(&self) -> BalanceView {
        let state = self.lock();
        if state.owner.is_none() {
            return BalanceView {
                error: Some(NO_WALLET_LOADED.to_string()),
                ..Default::default()
            };
        }
        BalanceView {
            total_lamports: state.snapshot.total_lamports(),
            public_lamports: state.snapshot.public_lamports,
            compressed_lamports: state.snapshot.compressed_lamports,
            error: state.error.clone(),
        }
    }
}
