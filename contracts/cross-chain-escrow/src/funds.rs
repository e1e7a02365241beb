//! Fee arithmetic and settlement token movements.

use soroban_sdk::{log, token, Address, Env};

use crate::errors::ContractError;
use crate::types::FEE_DENOMINATOR;

/// Marketplace fee on `price`: `floor(price * fee_bps / 10_000)`.
pub fn fee_for(price: i128, fee_bps: u32) -> Result<i128, ContractError> {
    price
        .checked_mul(fee_bps as i128)
        .map(|scaled| scaled / FEE_DENOMINATOR)
        .ok_or(ContractError::MathOverflow)
}

/// Amount the buyer locks: `price + fee`.
pub fn deposit_for(price: i128, fee: i128) -> Result<i128, ContractError> {
    price.checked_add(fee).ok_or(ContractError::MathOverflow)
}

/// Amount the seller receives on release: `price - fee`.
pub fn seller_payout(price: i128, fee: i128) -> Result<i128, ContractError> {
    price.checked_sub(fee).ok_or(ContractError::MathOverflow)
}

/// Pull `deposit` from `buyer` into the contract. Checks the balance first so
/// a short buyer fails cleanly instead of trapping inside the token.
pub fn lock_deposit(
    env: &Env,
    token: &Address,
    buyer: &Address,
    deposit: i128,
) -> Result<(), ContractError> {
    let client = token::Client::new(env, token);

    let balance = client.balance(buyer);
    if balance < deposit {
        log!(env, "Insufficient balance. Required: {}, Available: {}", deposit, balance);
        return Err(ContractError::InsufficientFunds);
    }

    match client.try_transfer(buyer, &env.current_contract_address(), &deposit) {
        Ok(Ok(())) => Ok(()),
        _ => {
            log!(env, "Deposit transfer failed for amount: {}", deposit);
            Err(ContractError::InsufficientFunds)
        }
    }
}

/// Pay `amount` out of the contract's holdings. Zero amounts are skipped.
pub fn pay_out(
    env: &Env,
    token: &Address,
    to: &Address,
    amount: i128,
) -> Result<(), ContractError> {
    if amount == 0 {
        return Ok(());
    }

    let client = token::Client::new(env, token);
    match client.try_transfer(&env.current_contract_address(), to, &amount) {
        Ok(Ok(())) => Ok(()),
        _ => {
            log!(env, "Failed to transfer {} out of escrow", amount);
            Err(ContractError::TransferFailed)
        }
    }
}
