//! Listing <-> escrow bridge.
//!
//! The escrow contract is the only party allowed to move a listing in or out
//! of `InEscrow`. Every status write below is issued from an engine operation
//! after that operation has validated its inputs and committed its own state,
//! so the registry and the escrow records cannot drift apart.

use soroban_sdk::{contractclient, Address, Env};

use crate::errors::ContractError;
use crate::types::{Listing, ListingKey, ListingStatus, Network};

#[contractclient(name = "ListingRegistryClient")]
pub trait ListingRegistryInterface {
    fn get_listing(env: Env, key: ListingKey) -> Option<Listing>;
    fn set_status(env: Env, key: ListingKey, status: ListingStatus);
}

#[contractclient(name = "StatsLedgerClient")]
pub trait StatsLedgerInterface {
    fn record_sale(env: Env, seller: Address, buyer: Address, amount: i128);
}

/// Load `key` and check it can back a new cross-chain escrow opened by
/// `seller` towards `target` at height `now`.
pub fn checkout(
    env: &Env,
    registry: &Address,
    key: &ListingKey,
    seller: &Address,
    target: Network,
    now: u32,
) -> Result<Listing, ContractError> {
    let listing = ListingRegistryClient::new(env, registry)
        .get_listing(key)
        .ok_or(ContractError::ListingNotFound)?;

    // A listing already InEscrow has an outstanding escrow
    if listing.status != ListingStatus::Active {
        return Err(ContractError::ListingNotActive);
    }
    if now >= listing.expires_at {
        return Err(ContractError::ListingExpired);
    }
    if listing.seller != *seller {
        return Err(ContractError::Unauthorized);
    }
    if !listing.cross_chain {
        return Err(ContractError::NotCrossChain);
    }
    if listing.target_network != target.id() {
        return Err(ContractError::InvalidChain);
    }
    if listing.price <= 0 {
        return Err(ContractError::InvalidPrice);
    }

    Ok(listing)
}

pub fn lock(env: &Env, registry: &Address, key: &ListingKey) {
    ListingRegistryClient::new(env, registry).set_status(key, &ListingStatus::InEscrow);
}

pub fn mark_sold(env: &Env, registry: &Address, key: &ListingKey) {
    ListingRegistryClient::new(env, registry).set_status(key, &ListingStatus::Sold);
}

/// Put a listing whose escrow was refunded back on the market.
pub fn reopen(env: &Env, registry: &Address, key: &ListingKey) -> Result<(), ContractError> {
    let client = ListingRegistryClient::new(env, registry);
    let listing = client.get_listing(key).ok_or(ContractError::ListingNotFound)?;
    if listing.status != ListingStatus::InEscrow {
        return Err(ContractError::ListingNotInEscrow);
    }

    client.set_status(key, &ListingStatus::Active);
    Ok(())
}

pub fn record_sale(env: &Env, stats: &Address, seller: &Address, buyer: &Address, amount: i128) {
    StatsLedgerClient::new(env, stats).record_sale(seller, buyer, &amount);
}
