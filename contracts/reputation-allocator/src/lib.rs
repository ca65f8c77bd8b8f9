#![no_std]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, log, panic_with_error, symbol_short,
    Address, Env, IntoVal, Symbol, Vec,
};

const ORGANIZATION: Symbol = symbol_short!("org");
const OWNER: Symbol = symbol_short!("owner");
const REPUTATION_REWARD: Symbol = symbol_short!("rep_rwd");
const ENABLED: Symbol = symbol_short!("enabled");
const BENEFICIARY_REWARD: Symbol = symbol_short!("ben_rwd");
const BENEFICIARY_COUNT: Symbol = symbol_short!("ben_cnt");
const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("ver");

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AllocatorError {
    NotOwner = 1,
    NotEnabled = 2,
    NotWhitelisted = 3,
    AlreadyRedeemed = 4,
    /// Enabling with an empty whitelist would divide by zero
    NoBeneficiaries = 5,
    AlreadyEnabled = 6,
    InvalidReward = 7,
    AlreadyInitialized = 8,
    MintFailed = 9,
    NotInitialized = 10,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Beneficiary(Address),     // address -> whitelisted
    BeneficiaryAtIndex(u64),  // index -> Address
    Redeemed(Address),        // address -> already redeemed
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct BeneficiaryAddressAdded {
    #[topic]
    pub beneficiary: Address,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct Redeem {
    #[topic]
    pub beneficiary: Address,
    pub amount: i128,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct AllocationEnabled {
    pub beneficiary_reward: i128,
    pub number_of_beneficiaries: u64,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct OwnershipTransferred {
    pub previous_owner: Address,
    pub new_owner: Address,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

#[contract]
pub struct ReputationAllocator;

#[contractimpl]
impl ReputationAllocator {
    /// Constructor: bind the allocator to an organization with a fixed
    /// reputation budget that is split evenly between beneficiaries.
    pub fn __constructor(env: Env, organization: Address, owner: Address, reputation_reward: i128) {
        if env.storage().instance().has(&VERSION_KEY) {
            panic_with_error!(&env, AllocatorError::AlreadyInitialized);
        }
        if reputation_reward < 0 {
            panic_with_error!(&env, AllocatorError::InvalidReward);
        }
        env.storage().instance().set(&VERSION_KEY, &VERSION);
        ContractUpgraded {
            from: 0,
            to: VERSION,
        }
        .publish(&env);

        env.storage().instance().set(&ORGANIZATION, &organization);
        env.storage().instance().set(&OWNER, &owner);
        env.storage()
            .instance()
            .set(&REPUTATION_REWARD, &reputation_reward);
        env.storage().instance().set(&ENABLED, &false);
    }

    /// Whitelist a beneficiary (owner only, before enabling).
    /// Adding an address that is already whitelisted is a no-op.
    pub fn add_beneficiary(env: Env, caller: Address, beneficiary: Address) {
        Self::require_owner(&env, &caller);
        Self::require_not_enabled(&env);

        Self::whitelist(&env, &beneficiary);
    }

    /// Whitelist several beneficiaries in one call (owner only, before enabling).
    pub fn add_beneficiaries(env: Env, caller: Address, beneficiaries: Vec<Address>) {
        Self::require_owner(&env, &caller);
        Self::require_not_enabled(&env);

        for beneficiary in beneficiaries.iter() {
            Self::whitelist(&env, &beneficiary);
        }
    }

    /// Freeze the whitelist and fix the per-beneficiary reward.
    /// Calling it again once enabled changes nothing.
    pub fn enable(env: Env, caller: Address) {
        Self::require_owner(&env, &caller);

        if Self::is_enabled(env.clone()) {
            return;
        }

        let count = Self::number_of_beneficiaries(env.clone());
        if count == 0 {
            panic_with_error!(&env, AllocatorError::NoBeneficiaries);
        }

        let beneficiary_reward = Self::reputation_reward(env.clone()) / count as i128;

        env.storage().instance().set(&ENABLED, &true);
        env.storage()
            .instance()
            .set(&BENEFICIARY_REWARD, &beneficiary_reward);

        log!(&env, "allocation enabled", beneficiary_reward, count);

        AllocationEnabled {
            beneficiary_reward,
            number_of_beneficiaries: count,
        }
        .publish(&env);
    }

    /// Redeem the fixed share for a whitelisted beneficiary.
    /// Anyone may trigger the redemption; the reputation always goes to `beneficiary`.
    pub fn redeem(env: Env, beneficiary: Address) -> i128 {
        if !Self::is_enabled(env.clone()) {
            panic_with_error!(&env, AllocatorError::NotEnabled);
        }

        if !Self::is_beneficiary(env.clone(), beneficiary.clone()) {
            panic_with_error!(&env, AllocatorError::NotWhitelisted);
        }

        let redeemed_key = DataKey::Redeemed(beneficiary.clone());
        if env.storage().persistent().has(&redeemed_key) {
            panic_with_error!(&env, AllocatorError::AlreadyRedeemed);
        }
        env.storage().persistent().set(&redeemed_key, &true);

        let amount = Self::beneficiary_reward(env.clone());
        let organization = Self::organization(env.clone());

        // Controller is resolved through the organization on every call
        let controller: Address = env.invoke_contract(
            &organization,
            &symbol_short!("owner"),
            soroban_sdk::vec![&env],
        );
        let minted: bool = env.invoke_contract(
            &controller,
            &Symbol::new(&env, "mint_reputation"),
            soroban_sdk::vec![
                &env,
                amount.into_val(&env),
                beneficiary.clone().into_val(&env),
                organization.into_val(&env)
            ],
        );
        if !minted {
            panic_with_error!(&env, AllocatorError::MintFailed);
        }

        log!(&env, "reputation redeemed", beneficiary, amount);

        Redeem {
            beneficiary,
            amount,
        }
        .publish(&env);

        amount
    }

    /// Transfer ownership (current owner only)
    pub fn transfer_ownership(env: Env, new_owner: Address) {
        let previous_owner = Self::owner(env.clone());
        previous_owner.require_auth();

        env.storage().instance().set(&OWNER, &new_owner);

        OwnershipTransferred {
            previous_owner,
            new_owner,
        }
        .publish(&env);
    }

    pub fn reputation_reward(env: Env) -> i128 {
        env.storage()
            .instance()
            .get(&REPUTATION_REWARD)
            .unwrap_or(0)
    }

    pub fn is_enabled(env: Env) -> bool {
        env.storage().instance().get(&ENABLED).unwrap_or(false)
    }

    /// Reward per beneficiary, 0 until the allocation is enabled
    pub fn beneficiary_reward(env: Env) -> i128 {
        env.storage()
            .instance()
            .get(&BENEFICIARY_REWARD)
            .unwrap_or(0)
    }

    pub fn number_of_beneficiaries(env: Env) -> u64 {
        env.storage()
            .instance()
            .get(&BENEFICIARY_COUNT)
            .unwrap_or(0)
    }

    pub fn is_beneficiary(env: Env, address: Address) -> bool {
        env.storage()
            .persistent()
            .get(&DataKey::Beneficiary(address))
            .unwrap_or(false)
    }

    pub fn has_redeemed(env: Env, address: Address) -> bool {
        env.storage()
            .persistent()
            .has(&DataKey::Redeemed(address))
    }

    /// Get a batch of beneficiaries in insertion order
    /// Returns addresses from offset to offset+limit (or end of list)
    pub fn get_beneficiaries(env: Env, offset: u64, limit: u64) -> Vec<Address> {
        let mut beneficiaries = Vec::new(&env);
        let count = Self::number_of_beneficiaries(env.clone());

        let end = core::cmp::min(offset.saturating_add(limit), count);

        for i in offset..end {
            if let Some(beneficiary) = env
                .storage()
                .persistent()
                .get(&DataKey::BeneficiaryAtIndex(i))
            {
                beneficiaries.push_back(beneficiary);
            }
        }

        beneficiaries
    }

    pub fn organization(env: Env) -> Address {
        env.storage()
            .instance()
            .get(&ORGANIZATION)
            .unwrap_or_else(|| panic_with_error!(&env, AllocatorError::NotInitialized))
    }

    pub fn owner(env: Env) -> Address {
        env.storage()
            .instance()
            .get(&OWNER)
            .unwrap_or_else(|| panic_with_error!(&env, AllocatorError::NotInitialized))
    }

    /// Contract version for upgrade tracking.
    pub fn version(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&VERSION_KEY)
            .unwrap_or(VERSION)
    }

    // Internal helpers

    fn require_owner(env: &Env, caller: &Address) {
        caller.require_auth();

        let owner = Self::owner(env.clone());
        if owner != *caller {
            panic_with_error!(env, AllocatorError::NotOwner);
        }
    }

    fn require_not_enabled(env: &Env) {
        if Self::is_enabled(env.clone()) {
            panic_with_error!(env, AllocatorError::AlreadyEnabled);
        }
    }

    fn whitelist(env: &Env, beneficiary: &Address) {
        let key = DataKey::Beneficiary(beneficiary.clone());
        if env.storage().persistent().has(&key) {
            return;
        }
        env.storage().persistent().set(&key, &true);

        let count = Self::number_of_beneficiaries(env.clone());
        env.storage()
            .persistent()
            .set(&DataKey::BeneficiaryAtIndex(count), beneficiary);
        env.storage()
            .instance()
            .set(&BENEFICIARY_COUNT, &(count + 1));

        BeneficiaryAddressAdded {
            beneficiary: beneficiary.clone(),
        }
        .publish(env);
    }
}
