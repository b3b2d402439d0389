//! Presence binding and delayed-apply scenarios: payloads arriving before
//! the peer is rendered, last-payload-wins, overlay revert on unbind and
//! dispose, and the write-then-notify slot protocol.

mod common;

use std::time::Duration;

use common::{MockWorld, Nicknames, RecordingProfiles, RecordingSink, deps, deps_with, descriptor, eventually, presence};
use pairsync_client::directory::PairingDirectory;
use pairsync_core::composite::{ActiveGagSlot, ActiveRestraintState, CompositeActiveState, Padlock, RestraintLayers};
use pairsync_core::cache::{CacheSnapshot, RestraintItem};
use pairsync_core::events::{ItemCategory, PairEvent};
use pairsync_core::identity::UserId;
use pairsync_core::messages::{
    CompositeSnapshot, GagUpdate, OverlayPayload, RestraintUpdate, UpdateKind,
};
use tokio::time::sleep;
use uuid::Uuid;

#[tokio::test]
async fn payload_before_binding_is_applied_exactly_once() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));

    let kinkster = directory.add(descriptor("VAULT-001")).await;
    directory
        .mark_online(presence("VAULT-001", "hash-a"))
        .await
        .unwrap();

    // Payload arrives while the peer is online but not yet rendered.
    kinkster
        .apply_ipc_payload(OverlayPayload::new("moodles:a"))
        .await;
    assert!(world.applied_payloads().is_empty());

    // Presence binds 50ms later.
    sleep(Duration::from_millis(50)).await;
    let handle = world.spawn_entity("hash-a", 0x1000, true);
    directory
        .notify_entity_created("hash-a", handle, "Aeri Vale")
        .await;

    assert!(
        eventually(|| !world.applied_payloads().is_empty()).await,
        "payload was never applied"
    );
    // Exactly once, to the bound entity.
    sleep(Duration::from_millis(100)).await;
    let applied = world.applied_payloads();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].0, handle);
    assert_eq!(applied[0].1, OverlayPayload::new("moodles:a"));
}

#[tokio::test]
async fn only_the_latest_payload_is_applied() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));

    let kinkster = directory.add(descriptor("VAULT-001")).await;
    directory
        .mark_online(presence("VAULT-001", "hash-a"))
        .await
        .unwrap();

    kinkster
        .apply_ipc_payload(OverlayPayload::new("moodles:a"))
        .await;
    sleep(Duration::from_millis(10)).await;
    kinkster
        .apply_ipc_payload(OverlayPayload::new("moodles:b"))
        .await;

    let handle = world.spawn_entity("hash-a", 0x1000, true);
    directory
        .notify_entity_created("hash-a", handle, "Aeri Vale")
        .await;

    assert!(
        eventually(|| !world.applied_payloads().is_empty()).await,
        "payload was never applied"
    );
    sleep(Duration::from_millis(100)).await;
    let applied = world.applied_payloads();
    assert_eq!(applied.len(), 1, "a superseded payload was applied");
    assert_eq!(applied[0].1, OverlayPayload::new("moodles:b"));
}

#[tokio::test]
async fn payload_is_dropped_after_the_waiter_times_out() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));

    let kinkster = directory.add(descriptor("VAULT-001")).await;
    directory
        .mark_online(presence("VAULT-001", "hash-a"))
        .await
        .unwrap();

    kinkster
        .apply_ipc_payload(OverlayPayload::new("moodles:late"))
        .await;

    // Past the configured apply timeout (750ms in the test config).
    sleep(Duration::from_millis(900)).await;
    let handle = world.spawn_entity("hash-a", 0x1000, true);
    directory
        .notify_entity_created("hash-a", handle, "Aeri Vale")
        .await;

    sleep(Duration::from_millis(150)).await;
    assert!(
        world.applied_payloads().is_empty(),
        "timed-out payload must not be applied"
    );
}

#[tokio::test]
async fn payload_applies_immediately_while_bound() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));

    let kinkster = directory.add(descriptor("VAULT-001")).await;
    world.spawn_entity("hash-a", 0x1000, true);
    directory
        .mark_online(presence("VAULT-001", "hash-a"))
        .await
        .unwrap();
    assert!(kinkster.is_rendered().await);

    kinkster
        .apply_ipc_payload(OverlayPayload::new("moodles:now"))
        .await;
    assert_eq!(world.applied_payloads().len(), 1);
}

#[tokio::test]
async fn binding_waits_for_entity_load_before_applying() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));

    let kinkster = directory.add(descriptor("VAULT-001")).await;
    directory
        .mark_online(presence("VAULT-001", "hash-a"))
        .await
        .unwrap();
    kinkster
        .apply_ipc_payload(OverlayPayload::new("moodles:a"))
        .await;

    // The entity spawns but has not finished loading.
    let handle = world.spawn_entity("hash-a", 0x1000, false);
    directory
        .notify_entity_created("hash-a", handle, "Aeri Vale")
        .await;
    assert!(kinkster.is_rendered().await);

    sleep(Duration::from_millis(50)).await;
    assert!(
        world.applied_payloads().is_empty(),
        "applied before the entity finished loading"
    );

    world.finish_loading("hash-a");
    assert!(
        eventually(|| !world.applied_payloads().is_empty()).await,
        "payload was never applied after load completed"
    );
}

#[tokio::test]
async fn unbind_reverts_overlay_and_clears_state() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));
    let uid = UserId::new("VAULT-001");

    let kinkster = directory.add(descriptor("VAULT-001")).await;
    let handle = world.spawn_entity("hash-a", 0x1000, true);
    directory
        .mark_online(presence("VAULT-001", "hash-a"))
        .await
        .unwrap();
    kinkster
        .apply_ipc_payload(OverlayPayload::new("moodles:a"))
        .await;
    assert_eq!(world.applied_payloads().len(), 1);

    world.despawn("hash-a");
    directory.notify_entity_destroyed(handle).await;

    assert!(!kinkster.is_rendered().await);
    assert_eq!(world.cleared_entities(), vec![handle]);
    assert!(
        sink.recorded()
            .iter()
            .any(|e| matches!(e, PairEvent::PresenceUnbound { peer } if peer == &uid))
    );
}

#[tokio::test]
async fn revert_is_skipped_when_a_third_party_owns_the_entity() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));

    directory.add(descriptor("VAULT-001")).await;
    let handle = world.spawn_entity("hash-a", 0x1000, true);
    directory
        .mark_online(presence("VAULT-001", "hash-a"))
        .await
        .unwrap();

    world.claim_ownership(handle);
    world.despawn("hash-a");
    directory.notify_entity_destroyed(handle).await;

    assert!(world.cleared_entities().is_empty());
}

#[tokio::test]
async fn offline_disposal_reverts_in_the_background() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));
    let uid = UserId::new("VAULT-001");

    let kinkster = directory.add(descriptor("VAULT-001")).await;
    let handle = world.spawn_entity("hash-a", 0x1000, true);
    directory
        .mark_online(presence("VAULT-001", "hash-a"))
        .await
        .unwrap();
    kinkster
        .apply_ipc_payload(OverlayPayload::new("moodles:a"))
        .await;

    directory.mark_offline(&uid).await.unwrap();
    assert!(kinkster.presence().await.is_none());
    assert!(
        eventually(|| world.cleared_entities() == vec![handle]).await,
        "dispose revert never ran"
    );
}

#[tokio::test]
async fn nickname_overrides_display_name() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let profiles = RecordingProfiles::new();
    let deps = deps_with(&world, &sink, &profiles, Nicknames::with("VAULT-001", "Star"));
    let directory = PairingDirectory::new(deps);

    let kinkster = directory.add(descriptor("VAULT-001")).await;
    let handle = world.spawn_entity("hash-a", 0x1000, true);
    directory
        .mark_online(presence("VAULT-001", "hash-a"))
        .await
        .unwrap();
    let _ = handle;

    assert_eq!(kinkster.player_name().await.as_deref(), Some("Star"));
}

// ============================================================================
// Slot update protocol
// ============================================================================

#[tokio::test]
async fn restraint_removal_resets_slot_but_keeps_catalog_entry() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));

    let kinkster = directory.add(descriptor("VAULT-001")).await;
    let set_id = Uuid::new_v4();
    let catalog_entry = RestraintItem {
        id: set_id,
        label: "full-set".to_string(),
        slots: Vec::new(),
        layers: Vec::new(),
    };

    kinkster
        .apply_composite(CompositeSnapshot {
            active: CompositeActiveState {
                restraint: ActiveRestraintState {
                    set: Some(set_id),
                    layers: RestraintLayers::LAYER_1,
                    enabler: Some(UserId::new("VAULT-002")),
                    padlock: Padlock::Metal,
                    padlock_assigner: Some(UserId::new("VAULT-002")),
                },
                ..CompositeActiveState::default()
            },
            catalog: CacheSnapshot {
                restraints: vec![catalog_entry.clone()],
                ..CacheSnapshot::default()
            },
        })
        .await;
    assert_eq!(kinkster.summary().await.restraint.unwrap().label, "full-set");

    kinkster
        .apply_restraint_update(RestraintUpdate {
            kind: UpdateKind::Removed,
            new_data: ActiveRestraintState::default(),
            enactor: UserId::new("VAULT-002"),
        })
        .await;

    // The active slot is reset to its empty value...
    let composite = kinkster.composite().await;
    assert!(composite.restraint.is_empty());
    assert_eq!(composite.restraint, ActiveRestraintState::default());
    assert!(kinkster.summary().await.restraint.is_none());

    // ...but the catalog cache still holds the entry.
    let cached = kinkster
        .with_cache(|cache| cache.restraint(set_id).cloned())
        .await;
    assert_eq!(cached, Some(catalog_entry));
}

#[tokio::test]
async fn swapped_gag_emits_remove_then_apply() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));

    let kinkster = directory.add(descriptor("VAULT-001")).await;
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    let enactor = UserId::new("VAULT-002");

    kinkster
        .apply_gag_update(GagUpdate {
            kind: UpdateKind::Applied,
            slot: 0,
            new_data: ActiveGagSlot {
                gag: Some(first),
                enabler: Some(enactor.clone()),
                ..ActiveGagSlot::default()
            },
            enactor: enactor.clone(),
        })
        .await
        .unwrap();

    kinkster
        .apply_gag_update(GagUpdate {
            kind: UpdateKind::Swapped,
            slot: 0,
            new_data: ActiveGagSlot {
                gag: Some(second),
                enabler: Some(enactor.clone()),
                ..ActiveGagSlot::default()
            },
            enactor: enactor.clone(),
        })
        .await
        .unwrap();

    let changes: Vec<_> = sink
        .recorded()
        .into_iter()
        .filter_map(|e| match e {
            PairEvent::ItemChanged(change) if change.category == ItemCategory::Gag => Some(change),
            _ => None,
        })
        .collect();

    assert_eq!(changes.len(), 3);
    // The swap decomposes into remove-old then add-new, in that order.
    assert_eq!(changes[1].kind, UpdateKind::Removed);
    assert!(!changes[1].active);
    assert_eq!(changes[1].previous, Some(first));
    assert_eq!(changes[2].kind, UpdateKind::Applied);
    assert!(changes[2].active);
    assert_eq!(changes[2].next, Some(second));

    assert_eq!(kinkster.composite().await.gag_slots[0].gag, Some(second));
}

#[tokio::test]
async fn gag_removal_resets_the_slot() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));

    let kinkster = directory.add(descriptor("VAULT-001")).await;
    let gag = Uuid::new_v4();
    let enactor = UserId::new("VAULT-002");

    for kind in [UpdateKind::Applied, UpdateKind::Locked, UpdateKind::Unlocked] {
        kinkster
            .apply_gag_update(GagUpdate {
                kind,
                slot: 1,
                new_data: ActiveGagSlot {
                    gag: Some(gag),
                    enabler: Some(enactor.clone()),
                    padlock: if kind == UpdateKind::Locked {
                        Padlock::Metal
                    } else {
                        Padlock::None
                    },
                    padlock_assigner: None,
                },
                enactor: enactor.clone(),
            })
            .await
            .unwrap();
    }

    kinkster
        .apply_gag_update(GagUpdate {
            kind: UpdateKind::Removed,
            slot: 1,
            new_data: ActiveGagSlot::default(),
            enactor,
        })
        .await
        .unwrap();

    assert_eq!(
        kinkster.composite().await.gag_slots[1],
        ActiveGagSlot::default()
    );
}

#[tokio::test]
async fn out_of_range_slot_is_rejected_without_mutation() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));

    let kinkster = directory.add(descriptor("VAULT-001")).await;
    let before = kinkster.composite().await;
    let events_before = sink.recorded().len();

    let err = kinkster
        .apply_gag_update(GagUpdate {
            kind: UpdateKind::Applied,
            slot: 99,
            new_data: ActiveGagSlot::default(),
            enactor: UserId::new("VAULT-002"),
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        pairsync_client::error::PairingError::SlotOutOfRange { index: 99, .. }
    ));
    assert_eq!(kinkster.composite().await, before);
    assert_eq!(sink.recorded().len(), events_before);
}
