//! SP logout services

pub mod associations;
pub mod collector;
pub mod executor;
pub mod identity;
pub mod orchestrator;

pub use associations::{AssociationValue, Associations};
pub use collector::AssociationCollector;
pub use executor::{LogoutCount, LogoutExecutor};
pub use orchestrator::{
    LogoutBinding, LogoutCollaborators, LogoutOrchestrator, LogoutStep, PartyLogout, SourceLogout,
};
