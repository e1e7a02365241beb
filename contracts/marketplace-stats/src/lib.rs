//! Marketplace Stats Contract
//!
//! Per-user trading profiles and marketplace-wide totals. Sales are recorded
//! only by the configured recorder (the cross-chain escrow contract), once
//! per released escrow. Users may link the addresses they hold on other
//! networks to their profile.

#![no_std]

use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, Address, Bytes, Env,
    Symbol,
};

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum ContractError {
    Unauthorized = 1,
    AlreadyInitialized = 2,
    NotInitialized = 3,
    InvalidAmount = 4,
    InvalidChain = 5,
    InvalidAddress = 6,
    MathOverflow = 7,
}

/// Foreign networks an address can be linked for: Generic=2, Ethereum=3,
/// Solana=4. The native network needs no link.
const MIN_FOREIGN_NETWORK: u32 = 2;
const MAX_FOREIGN_NETWORK: u32 = 4;

/// Longest accepted foreign address encoding.
const MAX_EXTERNAL_LEN: u32 = 64;

const EVT_SALE: Symbol = symbol_short!("sale_rec");
const EVT_LINKED: Symbol = symbol_short!("addr_lnk");

#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UserProfile {
    pub sales_count: u32,
    pub purchase_count: u32,
    pub volume_sold: i128,
    pub volume_bought: i128,
    /// Ledger of the user's most recent sale or purchase.
    pub last_active: u32,
}

#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MarketplaceStats {
    pub total_sales: u64,
    pub total_volume: i128,
    /// Distinct accounts that have bought or sold.
    pub total_traders: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DataKey {
    Admin,
    Recorder,
    Stats,
    Profile(Address),
    Linked(Address, u32),
}

#[contract]
pub struct MarketplaceStatsContract;

#[contractimpl]
impl MarketplaceStatsContract {
    /// Initialize the contract
    ///
    /// # Arguments
    /// * `admin` - Administrator allowed to change the recorder
    /// * `recorder` - Contract allowed to record sales
    pub fn initialize(env: Env, admin: Address, recorder: Address) -> Result<(), ContractError> {
        if env.storage().instance().has(&DataKey::Admin) {
            return Err(ContractError::AlreadyInitialized);
        }

        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::Recorder, &recorder);
        env.storage()
            .instance()
            .set(&DataKey::Stats, &MarketplaceStats::default());

        env.events()
            .publish((symbol_short!("sts_init"),), (admin, recorder));
        Ok(())
    }

    /// Replace the recorder (admin only)
    pub fn set_recorder(env: Env, recorder: Address) -> Result<(), ContractError> {
        let admin: Address = env
            .storage()
            .instance()
            .get(&DataKey::Admin)
            .ok_or(ContractError::NotInitialized)?;
        admin.require_auth();

        env.storage().instance().set(&DataKey::Recorder, &recorder);
        Ok(())
    }

    /// Record a completed sale (recorder only)
    ///
    /// # Arguments
    /// * `seller` - Account credited with the sale
    /// * `buyer` - Account credited with the purchase
    /// * `amount` - Sale price (must be > 0)
    ///
    /// # Events
    /// Emits `sale_rec`
    pub fn record_sale(
        env: Env,
        seller: Address,
        buyer: Address,
        amount: i128,
    ) -> Result<(), ContractError> {
        let recorder: Address = env
            .storage()
            .instance()
            .get(&DataKey::Recorder)
            .ok_or(ContractError::NotInitialized)?;
        recorder.require_auth();

        if amount <= 0 {
            return Err(ContractError::InvalidAmount);
        }

        let now = env.ledger().sequence();
        let mut stats = Self::get_stats(env.clone());

        let mut seller_profile = Self::find_profile(&env, &seller, &mut stats)?;
        seller_profile.sales_count = seller_profile
            .sales_count
            .checked_add(1)
            .ok_or(ContractError::MathOverflow)?;
        seller_profile.volume_sold = seller_profile
            .volume_sold
            .checked_add(amount)
            .ok_or(ContractError::MathOverflow)?;
        seller_profile.last_active = now;
        Self::save_profile(&env, &seller, &seller_profile);

        let mut buyer_profile = Self::find_profile(&env, &buyer, &mut stats)?;
        buyer_profile.purchase_count = buyer_profile
            .purchase_count
            .checked_add(1)
            .ok_or(ContractError::MathOverflow)?;
        buyer_profile.volume_bought = buyer_profile
            .volume_bought
            .checked_add(amount)
            .ok_or(ContractError::MathOverflow)?;
        buyer_profile.last_active = now;
        Self::save_profile(&env, &buyer, &buyer_profile);

        stats.total_sales = stats
            .total_sales
            .checked_add(1)
            .ok_or(ContractError::MathOverflow)?;
        stats.total_volume = stats
            .total_volume
            .checked_add(amount)
            .ok_or(ContractError::MathOverflow)?;
        env.storage().instance().set(&DataKey::Stats, &stats);

        env.events().publish((EVT_SALE,), (seller, buyer, amount));
        Ok(())
    }

    /// Link an address the user holds on a foreign network
    ///
    /// # Arguments
    /// * `user` - Profile owner (must authorize)
    /// * `network` - Foreign network id (2..=4)
    /// * `external` - Address encoding on that network, 1 to 64 bytes
    pub fn link_address(
        env: Env,
        user: Address,
        network: u32,
        external: Bytes,
    ) -> Result<(), ContractError> {
        user.require_auth();

        if !(MIN_FOREIGN_NETWORK..=MAX_FOREIGN_NETWORK).contains(&network) {
            return Err(ContractError::InvalidChain);
        }
        if external.is_empty() || external.len() > MAX_EXTERNAL_LEN {
            return Err(ContractError::InvalidAddress);
        }

        env.storage()
            .persistent()
            .set(&DataKey::Linked(user.clone(), network), &external);

        env.events().publish((EVT_LINKED,), (user, network));
        Ok(())
    }

    /// Trading profile of `user`; zeroed if the user never traded.
    pub fn get_profile(env: Env, user: Address) -> UserProfile {
        env.storage()
            .persistent()
            .get(&DataKey::Profile(user))
            .unwrap_or_default()
    }

    pub fn get_stats(env: Env) -> MarketplaceStats {
        env.storage()
            .instance()
            .get(&DataKey::Stats)
            .unwrap_or_default()
    }

    pub fn get_linked_address(env: Env, user: Address, network: u32) -> Option<Bytes> {
        env.storage()
            .persistent()
            .get(&DataKey::Linked(user, network))
    }
}

impl MarketplaceStatsContract {
    /// Load a profile, counting a first-time trader in `stats`.
    fn find_profile(
        env: &Env,
        user: &Address,
        stats: &mut MarketplaceStats,
    ) -> Result<UserProfile, ContractError> {
        match env
            .storage()
            .persistent()
            .get(&DataKey::Profile(user.clone()))
        {
            Some(profile) => Ok(profile),
            None => {
                stats.total_traders = stats
                    .total_traders
                    .checked_add(1)
                    .ok_or(ContractError::MathOverflow)?;
                Ok(UserProfile::default())
            }
        }
    }

    fn save_profile(env: &Env, user: &Address, profile: &UserProfile) {
        env.storage()
            .persistent()
            .set(&DataKey::Profile(user.clone()), profile);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use soroban_sdk::{testutils::Address as _, testutils::Ledger as _, Address, Env};

    fn setup() -> (Env, MarketplaceStatsContractClient<'static>, Address) {
        let env = Env::default();
        env.mock_all_auths();

        let admin = Address::generate(&env);
        let recorder = Address::generate(&env);
        let contract_id = env.register(MarketplaceStatsContract, ());
        let client = MarketplaceStatsContractClient::new(&env, &contract_id);
        client.initialize(&admin, &recorder);

        // Leak lifetime for test convenience
        let client = unsafe {
            core::mem::transmute::<
                MarketplaceStatsContractClient<'_>,
                MarketplaceStatsContractClient<'static>,
            >(client)
        };

        (env, client, recorder)
    }

    #[test]
    fn test_record_sale_updates_profiles_and_totals() {
        let (env, client, recorder) = setup();
        let seller = Address::generate(&env);
        let buyer = Address::generate(&env);

        env.ledger().with_mut(|li| li.sequence_number = 40);
        client.record_sale(&seller, &buyer, &10_000);

        let auths = env.auths();
        assert_eq!(auths[0].0, recorder);

        let seller_profile = client.get_profile(&seller);
        assert_eq!(seller_profile.sales_count, 1);
        assert_eq!(seller_profile.volume_sold, 10_000);
        assert_eq!(seller_profile.purchase_count, 0);
        assert_eq!(seller_profile.last_active, 40);

        let buyer_profile = client.get_profile(&buyer);
        assert_eq!(buyer_profile.purchase_count, 1);
        assert_eq!(buyer_profile.volume_bought, 10_000);
        assert_eq!(buyer_profile.sales_count, 0);

        let stats = client.get_stats();
        assert_eq!(stats.total_sales, 1);
        assert_eq!(stats.total_volume, 10_000);
        assert_eq!(stats.total_traders, 2);
    }

    #[test]
    fn test_repeat_traders_counted_once() {
        let (env, client, _) = setup();
        let alice = Address::generate(&env);
        let bob = Address::generate(&env);

        client.record_sale(&alice, &bob, &100);
        client.record_sale(&bob, &alice, &250);

        let stats = client.get_stats();
        assert_eq!(stats.total_sales, 2);
        assert_eq!(stats.total_volume, 350);
        assert_eq!(stats.total_traders, 2);

        let alice_profile = client.get_profile(&alice);
        assert_eq!(alice_profile.sales_count, 1);
        assert_eq!(alice_profile.purchase_count, 1);
        assert_eq!(alice_profile.volume_sold, 100);
        assert_eq!(alice_profile.volume_bought, 250);
    }

    #[test]
    fn test_record_sale_rejects_non_positive_amount() {
        let (env, client, _) = setup();
        let seller = Address::generate(&env);
        let buyer = Address::generate(&env);

        assert_eq!(
            client.try_record_sale(&seller, &buyer, &0),
            Err(Ok(ContractError::InvalidAmount))
        );
        assert_eq!(client.get_stats(), MarketplaceStats::default());
    }

    #[test]
    fn test_unknown_profile_is_zeroed() {
        let (env, client, _) = setup();
        let nobody = Address::generate(&env);
        assert_eq!(client.get_profile(&nobody), UserProfile::default());
    }

    #[test]
    fn test_link_address() {
        let (env, client, _) = setup();
        let user = Address::generate(&env);
        let eth = Bytes::from_slice(&env, &[0xab; 20]);

        client.link_address(&user, &3, &eth);
        assert_eq!(client.get_linked_address(&user, &3), Some(eth));
        assert_eq!(client.get_linked_address(&user, &4), None);
    }

    #[test]
    fn test_link_address_validation() {
        let (env, client, _) = setup();
        let user = Address::generate(&env);
        let addr = Bytes::from_slice(&env, &[1; 32]);

        for network in [0u32, 1, 5] {
            assert_eq!(
                client.try_link_address(&user, &network, &addr),
                Err(Ok(ContractError::InvalidChain))
            );
        }
        assert_eq!(
            client.try_link_address(&user, &4, &Bytes::new(&env)),
            Err(Ok(ContractError::InvalidAddress))
        );
        assert_eq!(
            client.try_link_address(&user, &4, &Bytes::from_slice(&env, &[1; 65])),
            Err(Ok(ContractError::InvalidAddress))
        );
    }

    #[test]
    fn test_set_recorder() {
        let (env, client, _) = setup();
        let recorder = Address::generate(&env);
        client.set_recorder(&recorder);

        client.record_sale(&Address::generate(&env), &Address::generate(&env), &5);
        assert_eq!(env.auths()[0].0, recorder);
    }

    #[test]
    #[should_panic(expected = "HostError: Error(Contract, #2)")]
    fn test_initialize_already_initialized() {
        let (env, client, _) = setup();
        let admin = Address::generate(&env);
        client.initialize(&admin, &admin);
    }
}
