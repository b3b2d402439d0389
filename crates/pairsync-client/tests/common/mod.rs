//! In-memory collaborator mocks shared by the integration suites.
#![allow(dead_code)] // Each suite uses a different slice of the helpers.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pairsync_client::collaborators::{
    ClientDeps, EntityHandle, EntityResolver, NicknameProvider, OverlayError, OverlayIpc,
    ProfileCache,
};
use pairsync_core::config::SyncConfig;
use pairsync_core::events::{EventSink, PairEvent};
use pairsync_core::identity::{UserId, UserIdentity};
use pairsync_core::messages::{OverlayPayload, PairDescriptor, PresenceDescriptor};
use pairsync_core::permissions::{
    EffectiveMoodlePerms, GlobalPermissions, PairPermAccess, PairPermissions,
};

/// Simulated game world: spawned entities, overlay IPC, and recorded calls.
#[derive(Default)]
pub struct MockWorld {
    /// ident hash -> (entity, fully loaded).
    entities: Mutex<HashMap<String, (EntityHandle, bool)>>,
    /// Entities claimed by a cooperating third-party system.
    owned: Mutex<HashSet<EntityHandle>>,
    /// Every overlay application, in order.
    pub applied: Mutex<Vec<(EntityHandle, OverlayPayload)>>,
    /// Every overlay revert, in order.
    pub cleared: Mutex<Vec<EntityHandle>>,
    /// Every moodle permission rebroadcast, in order.
    pub moodle_pushes: Mutex<Vec<(UserId, EffectiveMoodlePerms)>>,
}

impl MockWorld {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn spawn_entity(&self, ident_hash: &str, raw: u64, loaded: bool) -> EntityHandle {
        let handle = EntityHandle::new(raw);
        self.entities
            .lock()
            .unwrap()
            .insert(ident_hash.to_string(), (handle, loaded));
        handle
    }

    pub fn finish_loading(&self, ident_hash: &str) {
        if let Some((_, loaded)) = self.entities.lock().unwrap().get_mut(ident_hash) {
            *loaded = true;
        }
    }

    pub fn despawn(&self, ident_hash: &str) -> Option<EntityHandle> {
        self.entities
            .lock()
            .unwrap()
            .remove(ident_hash)
            .map(|(handle, _)| handle)
    }

    pub fn claim_ownership(&self, handle: EntityHandle) {
        self.owned.lock().unwrap().insert(handle);
    }

    pub fn applied_payloads(&self) -> Vec<(EntityHandle, OverlayPayload)> {
        self.applied.lock().unwrap().clone()
    }

    pub fn cleared_entities(&self) -> Vec<EntityHandle> {
        self.cleared.lock().unwrap().clone()
    }

    pub fn pushed_moodles(&self) -> Vec<(UserId, EffectiveMoodlePerms)> {
        self.moodle_pushes.lock().unwrap().clone()
    }
}

impl EntityResolver for MockWorld {
    fn resolve_by_ident_hash(&self, ident_hash: &str) -> Option<EntityHandle> {
        self.entities
            .lock()
            .unwrap()
            .get(ident_hash)
            .map(|(handle, _)| *handle)
    }

    fn is_fully_loaded(&self, entity: EntityHandle) -> bool {
        self.entities
            .lock()
            .unwrap()
            .values()
            .any(|(handle, loaded)| *handle == entity && *loaded)
    }
}

impl OverlayIpc for MockWorld {
    fn apply_overlay(
        &self,
        entity: EntityHandle,
        payload: &OverlayPayload,
    ) -> Result<(), OverlayError> {
        self.applied.lock().unwrap().push((entity, payload.clone()));
        Ok(())
    }

    fn clear_overlay(&self, entity: EntityHandle) -> Result<(), OverlayError> {
        self.cleared.lock().unwrap().push(entity);
        Ok(())
    }

    fn owns_entity(&self, entity: EntityHandle) -> bool {
        self.owned.lock().unwrap().contains(&entity)
    }

    fn push_moodle_perms(&self, peer: &UserId, effective: EffectiveMoodlePerms) {
        self.moodle_pushes
            .lock()
            .unwrap()
            .push((peer.clone(), effective));
    }
}

/// Sink recording every emitted event in order.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<PairEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn recorded(&self) -> Vec<PairEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: PairEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Profile cache recording invalidations.
#[derive(Default)]
pub struct RecordingProfiles {
    pub invalidated: Mutex<Vec<UserId>>,
}

impl RecordingProfiles {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn invalidations(&self) -> Vec<UserId> {
        self.invalidated.lock().unwrap().clone()
    }
}

impl ProfileCache for RecordingProfiles {
    fn invalidate(&self, uid: &UserId) {
        self.invalidated.lock().unwrap().push(uid.clone());
    }
}

/// Static nickname table.
#[derive(Default)]
pub struct Nicknames {
    names: HashMap<UserId, String>,
}

impl Nicknames {
    pub fn none() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(uid: &str, nickname: &str) -> Arc<Self> {
        let mut names = HashMap::new();
        names.insert(UserId::new(uid), nickname.to_string());
        Arc::new(Self { names })
    }
}

impl NicknameProvider for Nicknames {
    fn nickname(&self, uid: &UserId) -> Option<String> {
        self.names.get(uid).cloned()
    }
}

/// Installs a test-writer tracing subscriber once, so failing runs show
/// the runtime's debug output. Safe to call from every test.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Timing config tightened for tests: everything polls fast and times out
/// within a second.
pub fn fast_config() -> SyncConfig {
    SyncConfig {
        ipc_poll_interval: Duration::from_millis(5),
        ipc_apply_timeout: Duration::from_millis(750),
        entity_poll_interval: Duration::from_millis(5),
        entity_load_timeout: Duration::from_millis(750),
        revert_timeout: Duration::from_millis(250),
    }
}

/// Full collaborator bundle over the given mocks.
pub fn deps_with(
    world: &Arc<MockWorld>,
    sink: &Arc<RecordingSink>,
    profiles: &Arc<RecordingProfiles>,
    nicknames: Arc<Nicknames>,
) -> Arc<ClientDeps> {
    Arc::new(ClientDeps {
        resolver: Arc::clone(world) as Arc<dyn EntityResolver>,
        overlay: Arc::clone(world) as Arc<dyn OverlayIpc>,
        events: Arc::clone(sink) as Arc<dyn EventSink>,
        nicknames,
        profiles: Arc::clone(profiles) as Arc<dyn ProfileCache>,
        config: fast_config(),
    })
}

/// Collaborator bundle with default nicknames and a throwaway profile cache.
pub fn deps(world: &Arc<MockWorld>, sink: &Arc<RecordingSink>) -> Arc<ClientDeps> {
    deps_with(world, sink, &RecordingProfiles::new(), Nicknames::none())
}

/// Pairing descriptor with default (fully denied) permissions.
pub fn descriptor(uid: &str) -> PairDescriptor {
    PairDescriptor {
        identity: UserIdentity::new(uid),
        global: GlobalPermissions::default(),
        own_perms: PairPermissions::default(),
        peer_perms: PairPermissions::default(),
        own_access: PairPermAccess::default(),
        peer_access: PairPermAccess::default(),
    }
}

/// Pairing descriptor with a display alias.
pub fn descriptor_with_alias(uid: &str, alias: &str) -> PairDescriptor {
    let mut base = descriptor(uid);
    base.identity = UserIdentity::with_alias(uid, alias);
    base
}

/// Presence descriptor with the given identity hash.
pub fn presence(uid: &str, ident_hash: &str) -> PresenceDescriptor {
    PresenceDescriptor {
        identity: UserIdentity::new(uid),
        ident_hash: ident_hash.to_string(),
    }
}

/// Polls `predicate` every few milliseconds until it holds or a second
/// elapses.
pub async fn eventually(mut predicate: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    predicate()
}
