//! The per-peer aggregate.
//!
//! A [`Kinkster`] owns everything mirrored for one remotely-paired peer: the
//! permission bundle, the composite active-item state, the replicated
//! catalog cache, the derived locked-slot summary, and an optional presence
//! binding. Inbound partial updates mutate it strictly in arrival order;
//! peers are fully independent of each other.
//!
//! # Update Protocol
//!
//! Every per-slot transition writes the authoritative slot value first and
//! emits its notifications only after the write completes. `Swapped` emits
//! two notifications, remove-old then add-new, in that order. `Removed`
//! resets the slot to its empty value and emits one.
//!
//! # Delayed Apply
//!
//! Overlay payloads can arrive before the peer's presence binds. The
//! payload is recorded immediately; a bounded background waiter polls for
//! binding and delivers the most recently recorded payload the moment it
//! happens. Each new payload aborts the previous waiter, so at most one is
//! outstanding per peer and only the latest payload is ever applied.
//!
//! # Locking
//!
//! Construction and destruction of the presence binding serialize on a
//! per-aggregate binding lock, making `create_presence_binding` atomic
//! against a concurrent `mark_offline`. Overlay alterations serialize on
//! the handler's own lock (see [`crate::presence`]). No lock spans two
//! aggregates.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use pairsync_core::composite::{
    ActiveGagSlot, ActiveItemsSummary, ActiveRestrictionSlot, CompositeActiveState,
};
use pairsync_core::events::{ItemCategory, ItemChange, PairEvent, SlotRef};
use pairsync_core::identity::{UserId, UserIdentity};
use pairsync_core::messages::{
    AlarmUpdate, AliasScope, AliasUpdate, CompositeSnapshot, CursedLootUpdate, GagUpdate,
    OverlayPayload, PairDescriptor, PatternUpdate, PresenceDescriptor, RestraintUpdate,
    RestrictionUpdate, TriggerUpdate, UpdateKind,
};
use pairsync_core::cache::ReplicatedCache;
use pairsync_core::permissions::PermissionBundle;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace};

use crate::collaborators::ClientDeps;
use crate::error::PairingError;
use crate::presence::PresenceHandler;

/// Mutable mirrored state, guarded by one lock.
#[derive(Debug, Default)]
struct KinksterState {
    bundle: PermissionBundle,
    composite: CompositeActiveState,
    cache: ReplicatedCache,
    summary: ActiveItemsSummary,
    presence_descriptor: Option<PresenceDescriptor>,
    pending_ipc: Option<OverlayPayload>,
}

/// One remotely-paired peer's full replicated state.
pub struct Kinkster {
    identity: UserIdentity,
    state: RwLock<KinksterState>,
    presence: RwLock<Option<Arc<PresenceHandler>>>,
    /// Serializes presence-binding construction/destruction.
    binding_lock: Mutex<()>,
    /// The outstanding delayed-apply waiter, if any.
    waiter: Mutex<Option<JoinHandle<()>>>,
    /// Bumped per inbound payload; a waiter only delivers its own
    /// generation.
    ipc_generation: AtomicU64,
    deps: Arc<ClientDeps>,
}

impl Kinkster {
    /// Creates an aggregate from an initial pairing descriptor.
    #[must_use]
    pub fn new(descriptor: PairDescriptor, deps: Arc<ClientDeps>) -> Self {
        let PairDescriptor {
            identity,
            global,
            own_perms,
            peer_perms,
            own_access,
            peer_access,
        } = descriptor;
        Self {
            identity,
            state: RwLock::new(KinksterState {
                bundle: PermissionBundle {
                    global,
                    own: own_perms,
                    peer: peer_perms,
                    own_access,
                    peer_access,
                },
                ..KinksterState::default()
            }),
            presence: RwLock::new(None),
            binding_lock: Mutex::new(()),
            waiter: Mutex::new(None),
            ipc_generation: AtomicU64::new(0),
            deps,
        }
    }

    /// The peer's identity.
    #[must_use]
    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    /// The peer's stable uid.
    #[must_use]
    pub fn uid(&self) -> &UserId {
        &self.identity.uid
    }

    // ------------------------------------------------------------------
    // State access
    // ------------------------------------------------------------------

    /// Snapshot of the permission bundle.
    pub async fn permissions(&self) -> PermissionBundle {
        self.state.read().await.bundle.clone()
    }

    /// Runs `f` against the permission bundle under the write lock.
    ///
    /// Used by the reconciler so a failed coercion leaves the bundle
    /// untouched: the closure either fully applies or returns the error
    /// before mutating.
    pub async fn with_bundle_mut<R>(&self, f: impl FnOnce(&mut PermissionBundle) -> R) -> R {
        let mut state = self.state.write().await;
        f(&mut state.bundle)
    }

    /// Snapshot of the composite active-item state.
    pub async fn composite(&self) -> CompositeActiveState {
        self.state.read().await.composite.clone()
    }

    /// Snapshot of the derived locked-slot summary.
    pub async fn summary(&self) -> ActiveItemsSummary {
        self.state.read().await.summary.clone()
    }

    /// Runs `f` against the replicated catalog cache.
    pub async fn with_cache<R>(&self, f: impl FnOnce(&ReplicatedCache) -> R) -> R {
        let state = self.state.read().await;
        f(&state.cache)
    }

    /// True while the peer has a network presence descriptor.
    pub async fn is_online(&self) -> bool {
        self.state.read().await.presence_descriptor.is_some()
    }

    /// True while the peer's presence is bound to a render entity.
    pub async fn is_rendered(&self) -> bool {
        match &*self.presence.read().await {
            Some(handler) => handler.is_bound().await,
            None => false,
        }
    }

    /// The peer's presence handler, if constructed.
    pub async fn presence(&self) -> Option<Arc<PresenceHandler>> {
        self.presence.read().await.clone()
    }

    /// Display name of the bound render entity, if rendered.
    pub async fn player_name(&self) -> Option<String> {
        match self.presence().await {
            Some(handler) => handler.bound_entity().await.map(|e| e.name),
            None => None,
        }
    }

    /// True when this peer's presence descriptor carries `ident_hash`.
    pub async fn matches_ident_hash(&self, ident_hash: &str) -> bool {
        self.state
            .read()
            .await
            .presence_descriptor
            .as_ref()
            .is_some_and(|d| d.ident_hash == ident_hash)
    }

    /// Re-applies a pairing descriptor to the existing aggregate.
    ///
    /// Used by idempotent directory adds: the permission views are replaced
    /// wholesale, everything else is untouched.
    pub(crate) async fn refresh_descriptor(&self, descriptor: PairDescriptor) {
        let mut state = self.state.write().await;
        state.bundle = PermissionBundle {
            global: descriptor.global,
            own: descriptor.own_perms,
            peer: descriptor.peer_perms,
            own_access: descriptor.own_access,
            peer_access: descriptor.peer_access,
        };
    }

    // ------------------------------------------------------------------
    // Composite and slot updates
    // ------------------------------------------------------------------

    /// Replaces the composite state and catalog wholesale.
    ///
    /// Used on reconnect and major resync; safe to apply regardless of
    /// presence state. The locked-slot summary is rebuilt synchronously.
    pub async fn apply_composite(&self, snapshot: CompositeSnapshot) {
        let mut state = self.state.write().await;
        state.composite = snapshot.active;
        state.cache.rebuild(snapshot.catalog);
        let summary = ActiveItemsSummary::build(&state.composite, &state.cache);
        state.summary = summary;
        drop(state);
        debug!(peer = %self.uid(), "Composite snapshot applied");
    }

    /// Applies one gag-slot transition.
    ///
    /// # Errors
    ///
    /// Returns [`PairingError::SlotOutOfRange`] for a bad slot index; the
    /// state is untouched.
    pub async fn apply_gag_update(&self, update: GagUpdate) -> Result<(), PairingError> {
        let mut events = Vec::new();
        {
            let mut state = self.state.write().await;
            let count = state.composite.gag_slots.len();
            let slot = state.composite.gag_slots.get_mut(update.slot).ok_or(
                PairingError::SlotOutOfRange {
                    category: ItemCategory::Gag,
                    index: update.slot,
                    count,
                },
            )?;

            let previous = slot.gag;
            *slot = match update.kind {
                UpdateKind::Removed => ActiveGagSlot::default(),
                _ => update.new_data.clone(),
            };
            let next = slot.gag;
            let summary = ActiveItemsSummary::build(&state.composite, &state.cache);
            state.summary = summary;

            push_slot_events(
                &mut events,
                self.uid().clone(),
                ItemCategory::Gag,
                SlotRef::Index(update.slot),
                update.kind,
                previous,
                next,
                update.enactor,
            );
        }
        self.emit_all(events);
        Ok(())
    }

    /// Applies one restriction-slot transition.
    ///
    /// # Errors
    ///
    /// Returns [`PairingError::SlotOutOfRange`] for a bad slot index; the
    /// state is untouched.
    pub async fn apply_restriction_update(
        &self,
        update: RestrictionUpdate,
    ) -> Result<(), PairingError> {
        let mut events = Vec::new();
        {
            let mut state = self.state.write().await;
            let count = state.composite.restriction_slots.len();
            let slot = state.composite.restriction_slots.get_mut(update.slot).ok_or(
                PairingError::SlotOutOfRange {
                    category: ItemCategory::Restriction,
                    index: update.slot,
                    count,
                },
            )?;

            let previous = slot.restriction;
            *slot = match update.kind {
                UpdateKind::Removed => ActiveRestrictionSlot::default(),
                _ => update.new_data.clone(),
            };
            let next = slot.restriction;
            let summary = ActiveItemsSummary::build(&state.composite, &state.cache);
            state.summary = summary;

            push_slot_events(
                &mut events,
                self.uid().clone(),
                ItemCategory::Restriction,
                SlotRef::Index(update.slot),
                update.kind,
                previous,
                next,
                update.enactor,
            );
        }
        self.emit_all(events);
        Ok(())
    }

    /// Applies a restraint-set transition.
    ///
    /// Removal affects only the active-slot state; the set's catalog entry
    /// stays in the replicated cache.
    pub async fn apply_restraint_update(&self, update: RestraintUpdate) {
        let mut events = Vec::new();
        {
            let mut state = self.state.write().await;
            let previous = state.composite.restraint.set;
            state.composite.restraint = match update.kind {
                UpdateKind::Removed => Default::default(),
                _ => update.new_data.clone(),
            };
            let next = state.composite.restraint.set;
            let summary = ActiveItemsSummary::build(&state.composite, &state.cache);
            state.summary = summary;

            push_slot_events(
                &mut events,
                self.uid().clone(),
                ItemCategory::Restraint,
                SlotRef::Index(0),
                update.kind,
                previous,
                next,
                update.enactor,
            );
        }
        self.emit_all(events);
    }

    /// Applies a cursed-loot transition: `Removed` drops the id from the
    /// active set, anything else inserts it.
    pub async fn apply_cursed_update(&self, update: CursedLootUpdate) {
        let mut events = Vec::new();
        {
            let mut state = self.state.write().await;
            let was_active = state.composite.cursed_items.contains(&update.loot);
            let active = update.kind != UpdateKind::Removed;
            if active {
                state.composite.cursed_items.insert(update.loot);
            } else {
                state.composite.cursed_items.remove(&update.loot);
            }

            events.push(PairEvent::ItemChanged(ItemChange {
                peer: self.uid().clone(),
                category: ItemCategory::CursedLoot,
                kind: update.kind,
                slot: SlotRef::Item(update.loot),
                previous: was_active.then_some(update.loot),
                next: active.then_some(update.loot),
                enactor: update.enactor,
                active,
            }));
        }
        self.emit_all(events);
    }

    /// Applies a pattern transition: `Removed` clears the running pattern,
    /// anything else makes it the running pattern.
    pub async fn apply_pattern_update(&self, update: PatternUpdate) {
        let mut events = Vec::new();
        {
            let mut state = self.state.write().await;
            let previous = state.composite.active_pattern;
            let active = update.kind != UpdateKind::Removed;
            state.composite.active_pattern = active.then_some(update.pattern);

            events.push(PairEvent::ItemChanged(ItemChange {
                peer: self.uid().clone(),
                category: ItemCategory::Pattern,
                kind: update.kind,
                slot: SlotRef::Item(update.pattern),
                previous,
                next: state.composite.active_pattern,
                enactor: update.enactor,
                active,
            }));
        }
        self.emit_all(events);
    }

    /// Applies an alarm transition against the armed-alarm set.
    pub async fn apply_alarm_update(&self, update: AlarmUpdate) {
        let mut events = Vec::new();
        {
            let mut state = self.state.write().await;
            let was_active = state.composite.active_alarms.contains(&update.alarm);
            let active = update.kind != UpdateKind::Removed;
            if active {
                state.composite.active_alarms.insert(update.alarm);
            } else {
                state.composite.active_alarms.remove(&update.alarm);
            }

            events.push(PairEvent::ItemChanged(ItemChange {
                peer: self.uid().clone(),
                category: ItemCategory::Alarm,
                kind: update.kind,
                slot: SlotRef::Item(update.alarm),
                previous: was_active.then_some(update.alarm),
                next: active.then_some(update.alarm),
                enactor: update.enactor,
                active,
            }));
        }
        self.emit_all(events);
    }

    /// Applies a trigger transition against the armed-trigger set.
    pub async fn apply_trigger_update(&self, update: TriggerUpdate) {
        let mut events = Vec::new();
        {
            let mut state = self.state.write().await;
            let was_active = state.composite.active_triggers.contains(&update.trigger);
            let active = update.kind != UpdateKind::Removed;
            if active {
                state.composite.active_triggers.insert(update.trigger);
            } else {
                state.composite.active_triggers.remove(&update.trigger);
            }

            events.push(PairEvent::ItemChanged(ItemChange {
                peer: self.uid().clone(),
                category: ItemCategory::Trigger,
                kind: update.kind,
                slot: SlotRef::Item(update.trigger),
                previous: was_active.then_some(update.trigger),
                next: active.then_some(update.trigger),
                enactor: update.enactor,
                active,
            }));
        }
        self.emit_all(events);
    }

    /// Applies an alias-rule transition: `Removed` deletes by rule id,
    /// anything else upserts the rule into its store.
    pub async fn apply_alias_update(&self, update: AliasUpdate) {
        let mut events = Vec::new();
        {
            let mut state = self.state.write().await;
            let rules = match update.scope {
                AliasScope::Global => &mut state.composite.global_alias_rules,
                AliasScope::Pair => &mut state.composite.pair_alias_rules,
            };
            let existing = rules.iter().position(|r| r.id == update.rule.id);
            let active = update.kind != UpdateKind::Removed && update.rule.enabled;

            match (update.kind, existing) {
                (UpdateKind::Removed, Some(index)) => {
                    rules.remove(index);
                },
                (UpdateKind::Removed, None) => {},
                (_, Some(index)) => rules[index] = update.rule.clone(),
                (_, None) => rules.push(update.rule.clone()),
            }

            events.push(PairEvent::ItemChanged(ItemChange {
                peer: self.uid().clone(),
                category: ItemCategory::Alias,
                kind: update.kind,
                slot: SlotRef::Item(update.rule.id),
                previous: existing.map(|_| update.rule.id),
                next: (update.kind != UpdateKind::Removed).then_some(update.rule.id),
                enactor: update.enactor,
                active,
            }));
        }
        self.emit_all(events);
    }

    // ------------------------------------------------------------------
    // Delayed apply
    // ------------------------------------------------------------------

    /// Records an overlay payload and applies it as soon as presence allows.
    ///
    /// Bound: applied immediately. Unbound: the previous waiter (if any) is
    /// aborted and a bounded poll loop delivers the latest recorded payload
    /// the moment presence binds; nothing is applied past the timeout.
    pub async fn apply_ipc_payload(self: &Arc<Self>, payload: OverlayPayload) {
        let generation = self.ipc_generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.write().await;
            state.pending_ipc = Some(payload.clone());
        }

        if let Some(handler) = self.presence().await {
            if handler.is_bound().await {
                handler.set_overlay_payload(payload).await;
                return;
            }
        }

        let mut waiter = self.waiter.lock().await;
        if let Some(previous) = waiter.take() {
            previous.abort();
        }
        let me = Arc::clone(self);
        *waiter = Some(tokio::spawn(async move {
            me.run_delayed_apply(generation).await;
        }));
    }

    /// Bounded poll loop behind [`Self::apply_ipc_payload`].
    async fn run_delayed_apply(self: Arc<Self>, generation: u64) {
        let deadline = Instant::now() + self.deps.config.ipc_apply_timeout;
        loop {
            if self.ipc_generation.load(Ordering::SeqCst) != generation {
                // Superseded by a newer payload; that payload's waiter owns
                // delivery now.
                return;
            }

            if let Some(handler) = self.presence().await {
                if handler.is_bound().await {
                    let payload = self.state.read().await.pending_ipc.clone();
                    if self.ipc_generation.load(Ordering::SeqCst) != generation {
                        return;
                    }
                    if let Some(payload) = payload {
                        handler.set_overlay_payload(payload).await;
                        trace!(peer = %self.uid(), "Delayed overlay payload delivered");
                    }
                    return;
                }
            }

            if Instant::now() >= deadline {
                debug!(peer = %self.uid(), "Delayed apply timed out; payload dropped");
                return;
            }
            sleep(self.deps.config.ipc_poll_interval).await;
        }
    }

    // ------------------------------------------------------------------
    // Presence lifecycle
    // ------------------------------------------------------------------

    /// Constructs (or refreshes) the presence binding.
    ///
    /// Serialized against [`Self::mark_offline`] by the binding lock:
    /// - already bound: a fresh descriptor is stored, nothing else happens;
    /// - no fresh and no previously-known descriptor: any stale handler is
    ///   disposed and the peer stays unbound;
    /// - otherwise: the stale handler is disposed, a new one is constructed,
    ///   and an already-rendered entity is bound straight away.
    pub async fn create_presence_binding(&self, fresh: Option<PresenceDescriptor>) {
        let _guard = self.binding_lock.lock().await;

        if self.is_rendered().await {
            if let Some(descriptor) = fresh {
                self.state.write().await.presence_descriptor = Some(descriptor);
            }
            trace!(peer = %self.uid(), "Presence binding refresh: already bound");
            return;
        }

        let descriptor = match fresh {
            Some(descriptor) => {
                self.state.write().await.presence_descriptor = Some(descriptor.clone());
                Some(descriptor)
            },
            None => self.state.read().await.presence_descriptor.clone(),
        };

        if let Some(stale) = self.presence.write().await.take() {
            stale.dispose(false).await;
        }

        let Some(descriptor) = descriptor else {
            debug!(peer = %self.uid(), "No presence descriptor; staying unbound");
            return;
        };

        let handler = Arc::new(PresenceHandler::new(
            self.uid().clone(),
            Arc::clone(&self.deps),
        ));
        *self.presence.write().await = Some(Arc::clone(&handler));
        debug!(peer = %self.uid(), "Presence binding created");

        // The entity may already be rendered; probe instead of waiting for
        // the next watcher notification.
        if let Some(entity) = self
            .deps
            .resolver
            .resolve_by_ident_hash(&descriptor.ident_hash)
        {
            let name = descriptor.identity.alias_or_uid().to_string();
            handler.bind(entity, name).await;
        }
    }

    /// Takes the peer offline: clears the network descriptor and pending
    /// payload, aborts the delayed-apply waiter, and disposes the presence.
    ///
    /// Tolerant of being called while already offline.
    pub async fn mark_offline(&self) {
        let _guard = self.binding_lock.lock().await;

        {
            let mut state = self.state.write().await;
            state.presence_descriptor = None;
            state.pending_ipc = None;
        }

        if let Some(waiter) = self.waiter.lock().await.take() {
            waiter.abort();
        }

        if let Some(handler) = self.presence.write().await.take() {
            handler.dispose(false).await;
        }
        debug!(peer = %self.uid(), "Marked offline");
    }

    fn emit_all(&self, events: Vec<PairEvent>) {
        for event in events {
            self.deps.events.emit(event);
        }
    }
}

impl std::fmt::Debug for Kinkster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kinkster")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Builds the notification(s) for an indexed-slot transition.
///
/// `Swapped` yields remove-old then add-new; everything else yields one
/// event whose `active` flag reflects whether the slot is occupied after
/// the transition.
#[allow(clippy::too_many_arguments)]
fn push_slot_events(
    events: &mut Vec<PairEvent>,
    peer: UserId,
    category: ItemCategory,
    slot: SlotRef,
    kind: UpdateKind,
    previous: Option<uuid::Uuid>,
    next: Option<uuid::Uuid>,
    enactor: UserId,
) {
    if kind == UpdateKind::Swapped {
        events.push(PairEvent::ItemChanged(ItemChange {
            peer: peer.clone(),
            category,
            kind: UpdateKind::Removed,
            slot,
            previous,
            next: None,
            enactor: enactor.clone(),
            active: false,
        }));
        events.push(PairEvent::ItemChanged(ItemChange {
            peer,
            category,
            kind: UpdateKind::Applied,
            slot,
            previous: None,
            next,
            enactor,
            active: true,
        }));
        return;
    }

    events.push(PairEvent::ItemChanged(ItemChange {
        peer,
        category,
        kind,
        slot,
        previous,
        next,
        enactor,
        active: next.is_some(),
    }));
}
