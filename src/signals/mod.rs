//! External-collaborator ports (spec §1 "Out of scope (external
//! collaborators)", §6 "External signals (consumed)"), expressed as traits
//! the engine consumes, grounded on `venues::Venue` in the teacher codebase:
//! the engine depends on the trait, not on any concrete integration.

pub mod network;
pub mod settlement;

pub use network::NetworkSizeProvider;
pub use settlement::SettlementAuthority;
