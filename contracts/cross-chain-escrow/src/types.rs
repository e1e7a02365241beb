use soroban_sdk::{contracttype, Address, Symbol, Vec};

/// Largest validator committee an escrow may carry.
pub const MAX_COMMITTEE: u32 = 3;

/// Fee rates are expressed in basis points of the listing price.
pub const FEE_DENOMINATOR: i128 = 10_000;

/// Default marketplace fee (250 bps = 2.5%).
pub const DEFAULT_FEE_BPS: u32 = 250;

/// Fee rate ceiling accepted by `set_fee_bps` (10%).
pub const MAX_FEE_BPS: u32 = 1_000;

/// Escrow ids a single `settle_due` or `pending_escrows` call looks at.
pub const MAX_SWEEP_SCAN: u32 = 200;

/// Ledgers an unresolved dispute waits past its deadline before refunding
/// the buyer (~1 day at 5s ledgers).
pub const DEFAULT_DISPUTE_GRACE: u32 = 17_280;

// ---------------------------------------------------------------------------
// Networks
// ---------------------------------------------------------------------------

/// Closed set of settlement networks an escrow may bridge between.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Network {
    /// The host ledger this contract runs on.
    Native = 1,
    /// Chain-agnostic destination settled through a relayer.
    Generic = 2,
    Ethereum = 3,
    Solana = 4,
}

impl Network {
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(Network::Native),
            2 => Some(Network::Generic),
            3 => Some(Network::Ethereum),
            4 => Some(Network::Solana),
            _ => None,
        }
    }

    pub fn id(self) -> u32 {
        self as u32
    }
}

// ---------------------------------------------------------------------------
// Listing registry mirror
// ---------------------------------------------------------------------------
// Local mirrors of the listing registry's types for cross-contract
// deserialization. Field names and discriminants must match the registry.

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ListingKey {
    pub asset_id: u64,
    pub collection: Address,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ListingStatus {
    Active = 0,
    InEscrow = 1,
    Sold = 2,
    Cancelled = 3,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Listing {
    pub seller: Address,
    pub price: i128,
    pub currency: Symbol,
    pub created_at: u32,
    pub expires_at: u32,
    pub cross_chain: bool,
    pub target_network: u32,
    pub status: ListingStatus,
}

// ---------------------------------------------------------------------------
// Escrow
// ---------------------------------------------------------------------------

/// Escrow lifecycle. Only `Pending`, `Released` and `Refunded` are ever
/// stored; `Confirmed` and `Disputed` are reported by `escrow_status` for a
/// pending escrow whose committee has reached quorum or raised a dispute.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum EscrowStatus {
    Pending = 0,
    Confirmed = 1,
    Disputed = 2,
    Released = 3,
    Refunded = 4,
}

impl EscrowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, EscrowStatus::Released | EscrowStatus::Refunded)
    }
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EscrowRecord {
    pub id: u64,
    pub listing: ListingKey,
    pub seller: Address,
    pub buyer: Address,
    pub price: i128,
    /// Marketplace fee frozen at creation.
    pub fee: i128,
    /// `price + fee`, locked from the buyer at creation.
    pub deposit: i128,
    pub source_network: Network,
    pub target_network: Network,
    pub created_at: u32,
    pub status: EscrowStatus,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EscrowReceipt {
    pub escrow_id: u64,
    pub deposit: i128,
}

// ---------------------------------------------------------------------------
// Validator consensus
// ---------------------------------------------------------------------------

/// Arbiter ruling on a disputed escrow. `Pending` until the arbiter rules.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Ruling {
    Pending = 0,
    Release = 1,
    Refund = 2,
}

/// Outcome of evaluating a committee at a given ledger height.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Decision {
    Undecided,
    ReleaseToSeller,
    RefundToBuyer,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConsensusState {
    pub committee: Vec<Address>,
    pub confirmations: Vec<Address>,
    pub required_confirmations: u32,
    pub dispute_raised: bool,
    pub disputed_by: Option<Address>,
    pub auto_release_height: u32,
    pub dispute_deadline: u32,
    /// Height after which an unresolved dispute refunds the buyer.
    pub resolution_deadline: u32,
    pub ruling: Ruling,
}

// ---------------------------------------------------------------------------
// Configuration and storage keys
// ---------------------------------------------------------------------------

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EscrowConfig {
    /// Administrator and dispute arbiter.
    pub admin: Address,
    /// Settlement token every deposit is denominated in.
    pub token: Address,
    /// Marketplace operator receiving fees.
    pub operator: Address,
    pub registry: Address,
    pub stats: Address,
    pub fee_bps: u32,
    pub dispute_grace: u32,
}

impl EscrowConfig {
    pub fn new(
        admin: Address,
        token: Address,
        operator: Address,
        registry: Address,
        stats: Address,
    ) -> Self {
        Self {
            admin,
            token,
            operator,
            registry,
            stats,
            fee_bps: DEFAULT_FEE_BPS,
            dispute_grace: DEFAULT_DISPUTE_GRACE,
        }
    }
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DataKey {
    Config,
    NextId,
    Escrow(u64),
    Consensus(u64),
    ListingEscrow(ListingKey),
    /// Present while the escrow awaits settlement.
    Pending(u64),
    PendingCount,
    /// No escrow below this id is pending.
    SweepFloor,
    /// Where the last `settle_due` stopped scanning.
    SweepNext,
    Retained,
}
