//! Who created or canceled an orchestration instance.

use crate::error::{ProcessManagerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A market actor number: a 13 digit GLN or a 16 character EIC code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorNumber(String);

impl ActorNumber {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let is_gln = value.len() == 13 && value.chars().all(|c| c.is_ascii_digit());
        let is_eic =
            value.len() == 16 && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');

        if !(is_gln || is_eic) {
            return Err(ProcessManagerError::ValidationError(format!(
                "Actor number '{value}' is neither a GLN nor an EIC code"
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Market roles an actor can act in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorRole {
    BalanceResponsibleParty,
    DanishEnergyAgency,
    DataHubAdministrator,
    Delegated,
    EnergySupplier,
    GridAccessProvider,
    ImbalanceSettlementResponsible,
    MeteredDataResponsible,
    SystemOperator,
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BalanceResponsibleParty => "BalanceResponsibleParty",
            Self::DanishEnergyAgency => "DanishEnergyAgency",
            Self::DataHubAdministrator => "DataHubAdministrator",
            Self::Delegated => "Delegated",
            Self::EnergySupplier => "EnergySupplier",
            Self::GridAccessProvider => "GridAccessProvider",
            Self::ImbalanceSettlementResponsible => "ImbalanceSettlementResponsible",
            Self::MeteredDataResponsible => "MeteredDataResponsible",
            Self::SystemOperator => "SystemOperator",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ActorRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "BalanceResponsibleParty" => Ok(Self::BalanceResponsibleParty),
            "DanishEnergyAgency" => Ok(Self::DanishEnergyAgency),
            "DataHubAdministrator" => Ok(Self::DataHubAdministrator),
            "Delegated" => Ok(Self::Delegated),
            "EnergySupplier" => Ok(Self::EnergySupplier),
            "GridAccessProvider" => Ok(Self::GridAccessProvider),
            "ImbalanceSettlementResponsible" => Ok(Self::ImbalanceSettlementResponsible),
            "MeteredDataResponsible" => Ok(Self::MeteredDataResponsible),
            "SystemOperator" => Ok(Self::SystemOperator),
            _ => Err(format!("Invalid actor role: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub number: ActorNumber,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(number: ActorNumber, role: ActorRole) -> Self {
        Self { number, role }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new(value: Uuid) -> Self {
        Self(value)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

/// Either a person acting on behalf of an actor, or an actor's system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "identity_type")]
pub enum OperatingIdentity {
    User { user_id: UserId, actor: Actor },
    Actor { actor: Actor },
}

impl OperatingIdentity {
    pub fn user(user_id: UserId, actor: Actor) -> Self {
        Self::User { user_id, actor }
    }

    pub fn actor(actor: Actor) -> Self {
        Self::Actor { actor }
    }

    /// The market actor behind the identity.
    pub fn acting_actor(&self) -> &Actor {
        match self {
            Self::User { actor, .. } => actor,
            Self::Actor { actor } => actor,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User { user_id, .. } => Some(*user_id),
            Self::Actor { .. } => None,
        }
    }
}
