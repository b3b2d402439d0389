//! # pairsync-client
//!
//! Concurrent client runtime that keeps a live mirror of every
//! remotely-paired peer: their permission state, their equipped-item state,
//! a denormalized catalog cache, and a transient binding to an in-world
//! render entity once the peer becomes locally observable.
//!
//! # Runtime Requirements
//!
//! This crate requires a tokio runtime. [`Kinkster::apply_ipc_payload`] and
//! presence disposal spawn bounded background tasks; calling them outside a
//! runtime panics in tokio itself.
//!
//! # Architecture
//!
//! ```text
//!   inbound network messages
//!        │
//!        ▼
//!  ┌──────────────────────┐      ┌───────────────────┐
//!  │ PermissionReconciler │─────▶│ PairingDirectory  │
//!  └──────────────────────┘      │  (registry)       │
//!                                └────────┬──────────┘
//!                                         │ Arc<Kinkster> per peer
//!                                         ▼
//!                                ┌───────────────────┐
//!                                │ Kinkster          │
//!                                │  bundle/composite │
//!                                │  cache/summary    │
//!                                └────────┬──────────┘
//!                                         │ optional
//!                                         ▼
//!                                ┌───────────────────┐
//!   entity watcher ─────────────▶│ PresenceHandler   │──▶ overlay IPC
//!                                │  Unbound ⇄ Bound  │
//!                                └───────────────────┘
//! ```
//!
//! Peers are fully independent: no lock spans more than one [`Kinkster`].
//!
//! # Modules
//!
//! - [`collaborators`]: trait surface for the game-side collaborators
//!   (entity resolution, overlay IPC, nicknames, profile cache)
//! - [`directory`]: concurrent registry of all paired peers
//! - [`error`]: the client error taxonomy
//! - [`kinkster`]: the per-peer aggregate
//! - [`presence`]: the presence-binding state machine
//! - [`reconciler`]: applies inbound permission mutations

pub mod collaborators;
pub mod directory;
pub mod error;
pub mod kinkster;
pub mod presence;
pub mod reconciler;

pub use collaborators::{
    ClientDeps, EntityHandle, EntityResolver, NicknameProvider, OverlayError, OverlayIpc,
    ProfileCache,
};
pub use directory::PairingDirectory;
pub use error::PairingError;
pub use kinkster::Kinkster;
pub use presence::{BoundEntity, PresenceHandler};
pub use reconciler::PermissionReconciler;
