use solana_sdk::pubkey::Pubkey;

/// Page request. `cursor` comes from the previous page, `limit` caps the
/// number of items.
#[derive(Debug, Clone, Default)]
pub struct PaginatedOptions {
    pub cursor: Option<String>,
    pub limit: Option<u16>,
}

impl PaginatedOptions {
    pub fn with_limit(limit: u16) -> Self {
        Self {
            cursor: None,
            limit: Some(limit),
        }
    }

    pub fn after(cursor: Option<String>) -> Self {
        Self {
            cursor,
            limit: None,
        }
    }
}

/// Token account page request, optionally restricted to one mint.
#[derive(Debug, Clone, Default)]
pub struct GetCompressedTokenAccountsByOwnerOptions {
    pub mint: Option<Pubkey>,
    pub cursor: Option<String>,
    pub limit: Option<u16>,
}

impl GetCompressedTokenAccountsByOwnerOptions {
    pub fn for_mint(mint: Pubkey, cursor: Option<String>) -> Self {
        Self {
            mint: Some(mint),
            cursor,
            limit: None,
        }
    }
}
