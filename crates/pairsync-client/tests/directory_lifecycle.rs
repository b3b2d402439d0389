//! Lifecycle tests for the pairing directory: idempotent adds, online and
//! offline transitions, presence observation, and the cached active-pairs
//! view.

mod common;

use common::{MockWorld, RecordingSink, deps, descriptor, descriptor_with_alias, presence};
use pairsync_client::directory::PairingDirectory;
use pairsync_client::error::PairingError;
use pairsync_core::events::PairEvent;
use pairsync_core::identity::UserId;
use pairsync_core::permissions::PuppetPerms;

#[tokio::test]
async fn add_is_idempotent() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));

    let first = directory.add(descriptor("VAULT-001")).await;
    let mut refreshed = descriptor("VAULT-001");
    refreshed.peer_perms.puppet_perms = PuppetPerms::SIT;
    let second = directory.add(refreshed).await;

    assert_eq!(directory.len().await, 1);
    // Same aggregate, re-applied snapshot.
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(
        first.permissions().await.peer.puppet_perms,
        PuppetPerms::SIT
    );
}

#[tokio::test]
async fn mark_online_for_unknown_pairing_fails_without_side_effects() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));

    let err = directory
        .mark_online(presence("VAULT-404", "hash-404"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        PairingError::UnknownPairing {
            uid: "VAULT-404".to_string()
        }
    );
    assert!(directory.is_empty().await);
}

#[tokio::test]
async fn presence_follows_online_and_observation() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));
    let uid = UserId::new("VAULT-001");

    let kinkster = directory.add(descriptor("VAULT-001")).await;
    assert!(!kinkster.is_online().await);
    assert!(!kinkster.is_rendered().await);

    // Online but not yet observed by the watcher: handler exists, unbound.
    directory
        .mark_online(presence("VAULT-001", "hash-a"))
        .await
        .unwrap();
    assert!(kinkster.is_online().await);
    assert!(!kinkster.is_rendered().await);

    // Watcher observes a matching entity.
    let handle = world.spawn_entity("hash-a", 0x1000, true);
    directory
        .notify_entity_created("hash-a", handle, "Aeri Vale")
        .await;
    assert!(kinkster.is_rendered().await);
    assert_eq!(kinkster.player_name().await.as_deref(), Some("Aeri Vale"));

    // Offline disposes the binding.
    directory.mark_offline(&uid).await.unwrap();
    assert!(!kinkster.is_online().await);
    assert!(!kinkster.is_rendered().await);
    assert!(kinkster.presence().await.is_none());

    // Tolerant of repeated offline calls.
    directory.mark_offline(&uid).await.unwrap();

    // Back online with the entity still rendered: bound via the probe.
    directory
        .mark_online(presence("VAULT-001", "hash-a"))
        .await
        .unwrap();
    assert!(kinkster.is_rendered().await);
}

#[tokio::test]
async fn mark_online_refresh_keeps_existing_binding() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));

    directory.add(descriptor("VAULT-001")).await;
    let handle = world.spawn_entity("hash-a", 0x1000, true);
    directory
        .mark_online(presence("VAULT-001", "hash-a"))
        .await
        .unwrap();

    let kinkster = directory.get(&UserId::new("VAULT-001")).await.unwrap();
    let bound_before = kinkster.presence().await.unwrap();

    // Second online notification while bound: no-op refresh.
    directory
        .mark_online(presence("VAULT-001", "hash-a"))
        .await
        .unwrap();
    let bound_after = kinkster.presence().await.unwrap();
    assert!(std::sync::Arc::ptr_eq(&bound_before, &bound_after));
    assert_eq!(
        bound_after.bound_entity().await.map(|e| e.handle),
        Some(handle)
    );
}

#[tokio::test]
async fn remove_evicts_and_notifies() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));
    let uid = UserId::new("VAULT-001");

    directory.add(descriptor("VAULT-001")).await;
    directory.remove(&uid).await.unwrap();

    assert!(directory.is_empty().await);
    assert!(
        sink.recorded()
            .iter()
            .any(|e| matches!(e, PairEvent::PairRemoved { peer } if peer == &uid))
    );

    let err = directory.remove(&uid).await.unwrap_err();
    assert!(matches!(err, PairingError::UnknownPairing { .. }));
}

#[tokio::test]
async fn entity_destroyed_unbinds_only_the_matching_peer() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));

    directory.add(descriptor("VAULT-001")).await;
    directory.add(descriptor("VAULT-002")).await;
    let handle_a = world.spawn_entity("hash-a", 0xA, true);
    let handle_b = world.spawn_entity("hash-b", 0xB, true);
    directory
        .mark_online(presence("VAULT-001", "hash-a"))
        .await
        .unwrap();
    directory
        .mark_online(presence("VAULT-002", "hash-b"))
        .await
        .unwrap();
    assert_eq!(directory.rendered_pairs().await.len(), 2);

    world.despawn("hash-a");
    directory.notify_entity_destroyed(handle_a).await;

    let rendered = directory.rendered_pairs().await;
    assert_eq!(rendered.len(), 1);
    assert_eq!(rendered[0].uid().as_str(), "VAULT-002");
    let _ = handle_b;
}

#[tokio::test]
async fn active_pairs_view_is_sorted_and_rebuilt_on_mutation() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));

    directory.add(descriptor_with_alias("VAULT-003", "Zephyr")).await;
    directory.add(descriptor_with_alias("VAULT-001", "Aster")).await;

    let view = directory.active_pairs().await;
    let labels: Vec<_> = view
        .iter()
        .map(|k| k.identity().alias_or_uid().to_string())
        .collect();
    assert_eq!(labels, ["Aster", "Zephyr"]);

    // A structural mutation invalidates the cached view.
    directory.add(descriptor_with_alias("VAULT-002", "Moss")).await;
    let labels: Vec<_> = directory
        .active_pairs()
        .await
        .iter()
        .map(|k| k.identity().alias_or_uid().to_string())
        .collect();
    assert_eq!(labels, ["Aster", "Moss", "Zephyr"]);

    directory.remove(&UserId::new("VAULT-003")).await.unwrap();
    assert_eq!(directory.active_pairs().await.len(), 2);
}

#[tokio::test]
async fn online_listing_tracks_descriptors() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));

    directory.add(descriptor("VAULT-001")).await;
    directory.add(descriptor("VAULT-002")).await;
    directory
        .mark_online(presence("VAULT-002", "hash-b"))
        .await
        .unwrap();

    let online = directory.online_pairs().await;
    assert_eq!(online.len(), 1);
    assert_eq!(online[0].uid().as_str(), "VAULT-002");
}

#[tokio::test]
async fn find_by_uid_matches_uid_and_alias() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));

    directory.add(descriptor_with_alias("VAULT-001", "Aster")).await;

    assert!(directory.find_by_uid("VAULT-001").await.is_some());
    assert!(directory.find_by_uid("Aster").await.is_some());
    assert!(directory.find_by_uid("Nobody").await.is_none());
}

#[tokio::test]
async fn clear_disposes_everything() {
    let world = MockWorld::new();
    let sink = RecordingSink::new();
    let directory = PairingDirectory::new(deps(&world, &sink));

    directory.add(descriptor("VAULT-001")).await;
    directory.add(descriptor("VAULT-002")).await;
    world.spawn_entity("hash-a", 0xA, true);
    directory
        .mark_online(presence("VAULT-001", "hash-a"))
        .await
        .unwrap();

    directory.clear().await;
    assert!(directory.is_empty().await);
    assert!(directory.active_pairs().await.is_empty());
}
