//! Listing Registry Contract
//!
//! Source of truth for marketplace listings. Sellers create and cancel their
//! own listings; once a cross-chain escrow is opened the escrow contract
//! (the configured bridge) is the only party allowed to move a listing in
//! and out of `InEscrow`.

#![no_std]

use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, Address, Env, Symbol,
};

/// Contract errors
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum ContractError {
    Unauthorized = 1,
    AlreadyInitialized = 2,
    NotInitialized = 3,
    ListingNotFound = 4,
    AlreadyExists = 5,
    InvalidPrice = 6,
    InvalidDuration = 7,
    InvalidChain = 8,
    InvalidTransition = 9,
    BridgeNotSet = 10,
    MathOverflow = 11,
}

/// Networks a cross-chain listing can target: Native=1, Generic=2,
/// Ethereum=3, Solana=4.
const MIN_NETWORK: u32 = 1;
const MAX_NETWORK: u32 = 4;

const ADMIN: Symbol = symbol_short!("admin");
const BRIDGE: Symbol = symbol_short!("bridge");
const COUNT: Symbol = symbol_short!("count");

/// Identifies a listing: an asset within a collection.
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

/// Listing data structure
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Listing {
    pub seller: Address,
    pub price: i128,
    /// Settlement currency code, informational only.
    pub currency: Symbol,
    pub created_at: u32,
    pub expires_at: u32,
    pub cross_chain: bool,
    /// Network id the buyer settles on; 0 for same-chain listings.
    pub target_network: u32,
    pub status: ListingStatus,
}

#[contract]
pub struct ListingRegistry;

#[contractimpl]
impl ListingRegistry {
    /// Initialize the contract with admin address
    ///
    /// # Events
    /// Emits `lst_init`
    pub fn initialize(env: Env, admin: Address) -> Result<(), ContractError> {
        if env.storage().instance().has(&ADMIN) {
            return Err(ContractError::AlreadyInitialized);
        }

        env.storage().instance().set(&ADMIN, &admin);
        env.storage().instance().set(&COUNT, &0u64);

        env.events().publish((symbol_short!("lst_init"),), (admin,));
        Ok(())
    }

    /// Set the escrow contract allowed to change listing status (admin only)
    ///
    /// # Arguments
    /// * `bridge` - Address of the cross-chain escrow contract
    pub fn set_escrow_bridge(env: Env, bridge: Address) -> Result<(), ContractError> {
        Self::admin(&env)?.require_auth();

        env.storage().instance().set(&BRIDGE, &bridge);

        env.events().publish((symbol_short!("lst_brdg"),), (bridge,));
        Ok(())
    }

    /// Create a listing
    ///
    /// # Arguments
    /// * `seller` - Listing owner
    /// * `asset_id` - Asset identifier within `collection`
    /// * `collection` - Collection the asset belongs to
    /// * `price` - Asking price (must be > 0)
    /// * `currency` - Settlement currency code
    /// * `duration` - Ledgers until the listing expires (must be > 0)
    /// * `cross_chain` - Whether the buyer settles on another network
    /// * `target_network` - Buyer's network id, checked when `cross_chain`
    ///
    /// # Returns
    /// The key the listing is stored under
    ///
    /// # Events
    /// Emits `lst_crtd`
    pub fn create_listing(
        env: Env,
        seller: Address,
        asset_id: u64,
        collection: Address,
        price: i128,
        currency: Symbol,
        duration: u32,
        cross_chain: bool,
        target_network: u32,
    ) -> Result<ListingKey, ContractError> {
        seller.require_auth();
        Self::admin(&env)?;

        if price <= 0 {
            return Err(ContractError::InvalidPrice);
        }
        if duration == 0 {
            return Err(ContractError::InvalidDuration);
        }
        if cross_chain && !(MIN_NETWORK..=MAX_NETWORK).contains(&target_network) {
            return Err(ContractError::InvalidChain);
        }

        let key = ListingKey {
            asset_id,
            collection,
        };
        if env.storage().persistent().has(&key) {
            return Err(ContractError::AlreadyExists);
        }

        let now = env.ledger().sequence();
        let listing = Listing {
            seller: seller.clone(),
            price,
            currency,
            created_at: now,
            expires_at: now
                .checked_add(duration)
                .ok_or(ContractError::MathOverflow)?,
            cross_chain,
            target_network: if cross_chain { target_network } else { 0 },
            status: ListingStatus::Active,
        };
        env.storage().persistent().set(&key, &listing);

        let count: u64 = env.storage().instance().get(&COUNT).unwrap_or(0);
        env.storage().instance().set(&COUNT, &(count + 1));

        env.events().publish(
            (symbol_short!("lst_crtd"),),
            (asset_id, seller, price, cross_chain),
        );

        Ok(key)
    }

    /// Withdraw an active listing (seller only)
    pub fn cancel_listing(env: Env, seller: Address, key: ListingKey) -> Result<(), ContractError> {
        seller.require_auth();

        let mut listing = Self::listing(&env, &key)?;
        if listing.seller != seller {
            return Err(ContractError::Unauthorized);
        }
        if listing.status != ListingStatus::Active {
            return Err(ContractError::InvalidTransition);
        }

        listing.status = ListingStatus::Cancelled;
        env.storage().persistent().set(&key, &listing);

        env.events()
            .publish((symbol_short!("lst_cncl"),), (key.asset_id, seller));
        Ok(())
    }

    /// Move a listing through the escrow lifecycle (bridge only)
    ///
    /// Allowed transitions: Active -> InEscrow when an escrow opens,
    /// InEscrow -> Sold on release and InEscrow -> Active on relist.
    ///
    /// # Events
    /// Emits `lst_stat`
    pub fn set_status(
        env: Env,
        key: ListingKey,
        status: ListingStatus,
    ) -> Result<(), ContractError> {
        let bridge: Address = env
            .storage()
            .instance()
            .get(&BRIDGE)
            .ok_or(ContractError::BridgeNotSet)?;

        bridge.require_auth();

        let mut listing = Self::listing(&env, &key)?;
        let allowed = matches!(
            (listing.status, status),
            (ListingStatus::Active, ListingStatus::InEscrow)
                | (ListingStatus::InEscrow, ListingStatus::Sold)
                | (ListingStatus::InEscrow, ListingStatus::Active)
        );
        if !allowed {
            return Err(ContractError::InvalidTransition);
        }

        listing.status = status;
        env.storage().persistent().set(&key, &listing);

        env.events()
            .publish((symbol_short!("lst_stat"),), (key.asset_id, status));
        Ok(())
    }

    pub fn get_listing(env: Env, key: ListingKey) -> Option<Listing> {
        env.storage().persistent().get(&key)
    }

    /// Number of listings ever created
    pub fn listing_count(env: Env) -> u64 {
        env.storage().instance().get(&COUNT).unwrap_or(0)
    }
}

impl ListingRegistry {
    fn admin(env: &Env) -> Result<Address, ContractError> {
        env.storage()
            .instance()
            .get(&ADMIN)
            .ok_or(ContractError::NotInitialized)
    }

    fn listing(env: &Env, key: &ListingKey) -> Result<Listing, ContractError> {
        env.storage()
            .persistent()
            .get(key)
            .ok_or(ContractError::ListingNotFound)
    }
}
