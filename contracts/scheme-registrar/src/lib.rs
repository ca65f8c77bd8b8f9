//! # Scheme Registrar
//!
//! Universal scheme that lets an organization vote on registering or removing
//! other schemes. One deployment serves any number of organizations.
//!
//! ## Flow
//! 1. Anyone stores a `Parameters` record with `set_parameters` and gets back its hash
//! 2. The organization's controller registers this contract with that hash
//! 3. A proposer calls `propose_scheme` or `propose_to_remove_scheme`; the
//!    voting machine named in the parameters hands out the proposal id
//! 4. Once voters decide, the voting machine calls `execute`, which consumes
//!    the proposal and, on a yes decision, forwards it to the controller
//!
//! The organization's `owner()` is its controller. Permission bits are passed
//! to the controller untouched; the controller applies its own mandatory bits.

#![no_std]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, log, panic_with_error, symbol_short,
    xdr::ToXdr, Address, Bytes, BytesN, Env, IntoVal, Symbol,
};

const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("ver");

/// Voting machine decision that approves a proposal
pub const YES: u32 = 1;

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum RegistrarError {
    /// Organization has no parameters registered for this registrar
    NotConfigured = 1,
    ParametersNotFound = 2,
    ProposalNotFound = 3,
    ProposalAlreadyExecuted = 4,
    SchemeNotRegistered = 5,
    AlreadyInitialized = 6,
    ControllerRejected = 7,
    /// Voting machine returned an id that is still pending
    DuplicateProposal = 8,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ProposalType {
    None = 0,
    Register = 1,
    Remove = 2,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Parameters {
    pub register_params: BytesN<32>, // voting params for register proposals
    pub remove_params: BytesN<32>,   // voting params for remove proposals
    pub voting_machine: Address,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SchemeProposal {
    pub scheme: Address,
    pub params_hash: BytesN<32>, // parameters the scheme is registered with
    pub proposal_type: ProposalType,
    pub permissions: u32,
    pub is_registering: bool,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Parameters(BytesN<32>),  // params hash -> Parameters
    Proposal(Address, u64),  // (organization, proposal_id) -> SchemeProposal
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct NewSchemeProposal {
    #[topic]
    pub organization: Address,
    #[topic]
    pub proposal_id: u64,
    pub voting_machine: Address,
    pub scheme: Address,
    pub params_hash: BytesN<32>,
    pub permissions: u32,
    pub is_registering: bool,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct RemoveSchemeProposal {
    #[topic]
    pub organization: Address,
    #[topic]
    pub proposal_id: u64,
    pub voting_machine: Address,
    pub scheme: Address,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ProposalExecuted {
    #[topic]
    pub organization: Address,
    #[topic]
    pub proposal_id: u64,
    pub decision: u32,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

#[contract]
pub struct SchemeRegistrar;

#[contractimpl]
impl SchemeRegistrar {
    pub fn __constructor(env: Env) {
        if env.storage().instance().has(&VERSION_KEY) {
            panic_with_error!(&env, RegistrarError::AlreadyInitialized);
        }
        env.storage().instance().set(&VERSION_KEY, &VERSION);
        ContractUpgraded {
            from: 0,
            to: VERSION,
        }
        .publish(&env);
    }

    /// Store a configuration and return the hash organizations refer to it by.
    /// Storing the same triple twice leaves the record unchanged.
    pub fn set_parameters(
        env: Env,
        register_params: BytesN<32>,
        remove_params: BytesN<32>,
        voting_machine: Address,
    ) -> BytesN<32> {
        let hash = Self::get_parameters_hash(
            env.clone(),
            register_params.clone(),
            remove_params.clone(),
            voting_machine.clone(),
        );

        let params = Parameters {
            register_params,
            remove_params,
            voting_machine,
        };
        env.storage()
            .persistent()
            .set(&DataKey::Parameters(hash.clone()), &params);

        hash
    }

    /// SHA256 over register params, remove params and the voting machine address (in that order)
    pub fn get_parameters_hash(
        env: Env,
        register_params: BytesN<32>,
        remove_params: BytesN<32>,
        voting_machine: Address,
    ) -> BytesN<32> {
        let mut data = Bytes::new(&env);

        data.append(&Bytes::from_array(&env, &register_params.to_array()));
        data.append(&Bytes::from_array(&env, &remove_params.to_array()));
        data.append(&voting_machine.to_xdr(&env));

        env.crypto().sha256(&data).into()
    }

    pub fn get_parameters(env: Env, params_hash: BytesN<32>) -> Parameters {
        env.storage()
            .persistent()
            .get(&DataKey::Parameters(params_hash))
            .unwrap_or_else(|| panic_with_error!(&env, RegistrarError::ParametersNotFound))
    }

    pub fn has_parameters(env: Env, params_hash: BytesN<32>) -> bool {
        env.storage()
            .persistent()
            .has(&DataKey::Parameters(params_hash))
    }

    /// Propose registering `scheme` on `organization` with `permissions`.
    /// Returns the proposal id handed out by the voting machine.
    pub fn propose_scheme(
        env: Env,
        proposer: Address,
        organization: Address,
        scheme: Address,
        params_hash: BytesN<32>,
        permissions: u32,
        is_registering: bool,
    ) -> u64 {
        proposer.require_auth();

        let params = Self::organization_parameters(&env, &organization);
        let proposal_id = Self::open_proposal(
            &env,
            &params.voting_machine,
            &params.register_params,
            &organization,
            &proposer,
        );

        let proposal = SchemeProposal {
            scheme: scheme.clone(),
            params_hash: params_hash.clone(),
            proposal_type: ProposalType::Register,
            permissions,
            is_registering,
        };
        env.storage()
            .persistent()
            .set(&DataKey::Proposal(organization.clone(), proposal_id), &proposal);

        log!(&env, "register proposal opened", organization, proposal_id, scheme);

        NewSchemeProposal {
            organization,
            proposal_id,
            voting_machine: params.voting_machine,
            scheme,
            params_hash,
            permissions,
            is_registering,
        }
        .publish(&env);

        proposal_id
    }

    /// Propose removing a scheme that is currently registered on `organization`.
    pub fn propose_to_remove_scheme(
        env: Env,
        proposer: Address,
        organization: Address,
        scheme: Address,
    ) -> u64 {
        proposer.require_auth();

        let params = Self::organization_parameters(&env, &organization);

        let controller = Self::controller_of(&env, &organization);
        let registered: bool = env.invoke_contract(
            &controller,
            &Symbol::new(&env, "is_scheme_registered"),
            soroban_sdk::vec![&env, scheme.clone().into_val(&env), organization.clone().into_val(&env)],
        );
        if !registered {
            panic_with_error!(&env, RegistrarError::SchemeNotRegistered);
        }

        let proposal_id = Self::open_proposal(
            &env,
            &params.voting_machine,
            &params.remove_params,
            &organization,
            &proposer,
        );

        let proposal = SchemeProposal {
            scheme: scheme.clone(),
            params_hash: BytesN::from_array(&env, &[0u8; 32]),
            proposal_type: ProposalType::Remove,
            permissions: 0,
            is_registering: false,
        };
        env.storage()
            .persistent()
            .set(&DataKey::Proposal(organization.clone(), proposal_id), &proposal);

        log!(&env, "remove proposal opened", organization, proposal_id, scheme);

        RemoveSchemeProposal {
            organization,
            proposal_id,
            voting_machine: params.voting_machine,
            scheme,
        }
        .publish(&env);

        proposal_id
    }

    /// Execution callback, called by the organization's voting machine once a
    /// proposal is decided. Each proposal is consumed exactly once.
    pub fn execute(env: Env, organization: Address, proposal_id: u64, decision: u32) -> bool {
        let params = Self::organization_parameters(&env, &organization);
        params.voting_machine.require_auth();

        let key = DataKey::Proposal(organization.clone(), proposal_id);
        let mut proposal: SchemeProposal = env
            .storage()
            .persistent()
            .get(&key)
            .unwrap_or_else(|| panic_with_error!(&env, RegistrarError::ProposalNotFound));

        let proposal_type = proposal.proposal_type;
        if proposal_type == ProposalType::None {
            panic_with_error!(&env, RegistrarError::ProposalAlreadyExecuted);
        }

        // Consume before touching the controller
        proposal.proposal_type = ProposalType::None;
        env.storage().persistent().set(&key, &proposal);

        if decision == YES {
            let controller = Self::controller_of(&env, &organization);
            let accepted: bool = match proposal_type {
                ProposalType::Register => env.invoke_contract(
                    &controller,
                    &Symbol::new(&env, "register_scheme"),
                    soroban_sdk::vec![
                        &env,
                        proposal.scheme.into_val(&env),
                        proposal.params_hash.into_val(&env),
                        proposal.permissions.into_val(&env),
                        organization.clone().into_val(&env)
                    ],
                ),
                ProposalType::Remove => env.invoke_contract(
                    &controller,
                    &Symbol::new(&env, "unregister_scheme"),
                    soroban_sdk::vec![
                        &env,
                        proposal.scheme.into_val(&env),
                        organization.clone().into_val(&env)
                    ],
                ),
                ProposalType::None => {
                    panic_with_error!(&env, RegistrarError::ProposalAlreadyExecuted)
                }
            };
            if !accepted {
                panic_with_error!(&env, RegistrarError::ControllerRejected);
            }
        }

        log!(&env, "proposal executed", organization, proposal_id, decision);

        ProposalExecuted {
            organization,
            proposal_id,
            decision,
        }
        .publish(&env);

        true
    }

    /// Get the proposal record. Decided proposals keep their record with type `None`.
    pub fn organization_proposal(
        env: Env,
        organization: Address,
        proposal_id: u64,
    ) -> SchemeProposal {
        env.storage()
            .persistent()
            .get(&DataKey::Proposal(organization, proposal_id))
            .unwrap_or_else(|| panic_with_error!(&env, RegistrarError::ProposalNotFound))
    }

    pub fn proposal_type(env: Env, organization: Address, proposal_id: u64) -> ProposalType {
        env.storage()
            .persistent()
            .get::<_, SchemeProposal>(&DataKey::Proposal(organization, proposal_id))
            .map(|proposal| proposal.proposal_type)
            .unwrap_or(ProposalType::None)
    }

    /// Contract version for upgrade tracking.
    pub fn version(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&VERSION_KEY)
            .unwrap_or(VERSION)
    }

    // Internal helpers

    fn controller_of(env: &Env, organization: &Address) -> Address {
        env.invoke_contract(organization, &symbol_short!("owner"), soroban_sdk::vec![env])
    }

    /// Parameters the organization's controller registered this contract with
    fn organization_parameters(env: &Env, organization: &Address) -> Parameters {
        let controller = Self::controller_of(env, organization);
        let params_hash: Option<BytesN<32>> = env.invoke_contract(
            &controller,
            &Symbol::new(env, "get_scheme_params"),
            soroban_sdk::vec![
                env,
                env.current_contract_address().into_val(env),
                organization.clone().into_val(env)
            ],
        );

        let params_hash =
            params_hash.unwrap_or_else(|| panic_with_error!(env, RegistrarError::NotConfigured));

        env.storage()
            .persistent()
            .get(&DataKey::Parameters(params_hash))
            .unwrap_or_else(|| panic_with_error!(env, RegistrarError::NotConfigured))
    }

    fn open_proposal(
        env: &Env,
        voting_machine: &Address,
        vote_params: &BytesN<32>,
        organization: &Address,
        proposer: &Address,
    ) -> u64 {
        let proposal_id: u64 = env.invoke_contract(
            voting_machine,
            &symbol_short!("propose"),
            soroban_sdk::vec![
                env,
                vote_params.into_val(env),
                organization.into_val(env),
                env.current_contract_address().into_val(env),
                proposer.into_val(env)
            ],
        );

        if Self::proposal_type(env.clone(), organization.clone(), proposal_id) != ProposalType::None {
            panic_with_error!(env, RegistrarError::DuplicateProposal);
        }

        proposal_id
    }
}
