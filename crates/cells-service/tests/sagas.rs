mod common;

use cells_links::{Facing, Hinge, ToggleOutcome};
use cells_service::{
    CellsConfig, DoorInteraction, ExtensionOutcome, ExtensionRefusal, ServiceError,
    TeleportOutcome,
};
use cells_types::{ActorId, BlockLocation, Region};
use common::{harness, harness_with, rid, Harness};
use std::time::Duration;

async fn teleport_setup(cost: f64) -> (Harness, ActorId) {
    let h = harness();
    let admin = h.admin;
    let actor = ActorId::generate();
    h.give(actor, "jcell1");
    h.economy.set_balance(actor, 100.0);

    let admin_api = h.runtime.admin();
    admin_api.create_group(&admin, "jcells", None).unwrap();
    admin_api.add_region(&admin, "jcells", "jcell1").await.unwrap();
    admin_api.set_teleport_cost(&admin, "jcells", cost).unwrap();
    (h, actor)
}

#[tokio::test]
async fn test_teleport_charges_and_cools_down() {
    let (h, actor) = teleport_setup(50.0).await;
    let teleport = h.runtime.teleport();

    let outcome = teleport.teleport(&actor, "jcells").await;
    assert_eq!(
        outcome,
        TeleportOutcome::Teleported {
            region: rid("jcell1"),
            cost: 50.0
        }
    );
    assert_eq!(h.economy.balance(&actor), 50.0);
    assert_eq!(h.teleporter.moves(), vec![(actor, rid("jcell1"))]);

    assert!(matches!(
        teleport.teleport(&actor, "jcells").await,
        TeleportOutcome::CoolingDown { .. }
    ));

    h.clock.advance(Duration::from_secs(30));
    assert!(teleport.teleport(&actor, "jcells").await.is_success());
    assert_eq!(h.economy.balance(&actor), 0.0);
    assert_eq!(
        teleport.teleport(&actor, "jcells").await,
        TeleportOutcome::CoolingDown {
            remaining: Duration::from_secs(30)
        }
    );
}

#[tokio::test]
async fn test_teleport_failure_refunds() {
    let (h, actor) = teleport_setup(40.0).await;
    h.teleporter.set_failing(true);

    let outcome = h.runtime.teleport().teleport(&actor, "jcells").await;
    assert!(matches!(
        outcome,
        TeleportOutcome::TeleportFailed { refunded: true, .. }
    ));
    assert_eq!(h.economy.balance(&actor), 100.0);

    // A failed teleport does not start the cooldown
    h.teleporter.set_failing(false);
    assert!(h.runtime.teleport().teleport(&actor, "jcells").await.is_success());
}

#[tokio::test]
async fn test_failed_refund_is_reported() {
    let (h, actor) = teleport_setup(40.0).await;
    h.teleporter.set_failing(true);
    h.economy.set_fail_deposits(true);

    let outcome = h.runtime.teleport().teleport(&actor, "jcells").await;
    assert!(matches!(
        outcome,
        TeleportOutcome::TeleportFailed { refunded: false, .. }
    ));
    assert_eq!(h.economy.balance(&actor), 60.0);
}

#[tokio::test]
async fn test_teleport_refusals() {
    let (h, actor) = teleport_setup(500.0).await;
    let teleport = h.runtime.teleport();

    assert_eq!(
        teleport.teleport(&actor, "jcells").await,
        TeleportOutcome::InsufficientFunds { cost: 500.0 }
    );
    assert_eq!(teleport.teleport(&actor, "nope").await, TeleportOutcome::UnknownGroup);
    assert_eq!(
        teleport.teleport(&ActorId::generate(), "jcells").await,
        TeleportOutcome::NoCell
    );
    assert!(h.teleporter.moves().is_empty());
}

#[tokio::test]
async fn test_overlap_discount_and_free_groups() {
    let (h, actor) = teleport_setup(50.0).await;
    let admin = h.admin;
    let admin_api = h.runtime.admin();
    admin_api.create_group(&admin, "vip", None).unwrap();
    admin_api.add_region(&admin, "vip", "jcell1").await.unwrap();
    admin_api.set_teleport_cost(&admin, "vip", 10.0).unwrap();
    admin_api.set_teleport_access(&admin, "vip", "permission").unwrap();

    // No access to vip yet, so no discount
    let teleport = h.runtime.teleport();
    assert!(matches!(
        teleport.teleport(&actor, "jcells").await,
        TeleportOutcome::Teleported { cost, .. } if cost == 50.0
    ));

    h.caps.grant(actor, "cells.group.vip");
    teleport.clear_cooldown(&actor);
    assert!(matches!(
        teleport.teleport(&actor, "jcells").await,
        TeleportOutcome::Teleported { cost, .. } if cost == 10.0
    ));

    let mut config = CellsConfig::default();
    config.teleport.free_groups = vec!["JCELLS".to_string()];
    let free = harness_with(config);
    free.give(actor, "jcell1");
    free.runtime.admin().create_group(&free.admin, "jcells", None).unwrap();
    free.runtime
        .admin()
        .add_region(&free.admin, "jcells", "jcell1")
        .await
        .unwrap();
    free.runtime
        .admin()
        .set_teleport_cost(&free.admin, "jcells", 50.0)
        .unwrap();
    assert!(matches!(
        free.runtime.teleport().teleport(&actor, "jcells").await,
        TeleportOutcome::Teleported { cost, .. } if cost == 0.0
    ));
}

#[tokio::test]
async fn test_teleport_charges_requested_group_price() {
    let (h, actor) = teleport_setup(500.0).await;
    h.economy.set_balance(actor, 1000.0);
    let admin = h.admin;
    let admin_api = h.runtime.admin();
    admin_api.create_group(&admin, "staff", None).unwrap();
    admin_api.add_region(&admin, "staff", "jcell1").await.unwrap();
    admin_api.set_teleport_cost(&admin, "staff", 0.0).unwrap();
    admin_api.set_priority(&admin, "staff", 10).unwrap();
    admin_api.set_teleport_access(&admin, "staff", "permission").unwrap();

    // staff outranks jcells on jcell1 but the actor cannot use it
    let outcome = h.runtime.teleport().teleport(&actor, "jcells").await;
    assert_eq!(
        outcome,
        TeleportOutcome::Teleported {
            region: rid("jcell1"),
            cost: 500.0
        }
    );
    assert_eq!(h.economy.balance(&actor), 500.0);
}

#[tokio::test]
async fn test_teleport_owner_access() {
    let (h, actor) = teleport_setup(0.0).await;
    h.runtime
        .admin()
        .set_teleport_access(&h.admin, "jcells", "owner")
        .unwrap();

    assert!(h.runtime.teleport().teleport(&actor, "jcells").await.is_success());
    assert_eq!(
        h.runtime.teleport().teleport(&ActorId::generate(), "jcells").await,
        TeleportOutcome::NoAccess
    );
}

#[tokio::test]
async fn test_door_interaction() {
    let h = harness();
    let owner = ActorId::generate();
    let stranger = ActorId::generate();
    h.give(owner, "jcell1");
    let left = BlockLocation::new("world", 0, 64, 0);
    let right = BlockLocation::new("world", 1, 64, 0);
    h.world.place_door(&left, "iron_door", Facing::North, Hinge::Left);
    h.world.place_door(&right, "iron_door", Facing::North, Hinge::Right);
    h.runtime
        .admin()
        .link_door(&h.admin, &left.above(), "jcell1")
        .await
        .unwrap();

    let doors = h.runtime.doors();
    assert_eq!(
        doors.interact(&owner, &left).await,
        DoorInteraction::Toggled(ToggleOutcome::Applied { open: true, twin: true })
    );
    assert_eq!(h.world.is_open(&right), Some(true));
    assert_eq!(doors.interact(&stranger, &left).await, DoorInteraction::Denied);

    // Region deleted from the marketplace: the door stays shut for everyone
    h.regions.remove("jcell1");
    h.clock.advance(Duration::from_secs(1));
    assert_eq!(doors.interact(&owner, &left).await, DoorInteraction::Denied);

    let removed = h.runtime.admin().cleanup_links(&h.admin).await.unwrap();
    assert_eq!(removed, 1);
    assert!(matches!(
        doors.interact(&stranger, &left).await,
        DoorInteraction::Toggled(ToggleOutcome::Applied { open: false, .. })
    ));
}

#[tokio::test]
async fn test_door_rate_limit() {
    let h = harness();
    let actor = ActorId::generate();
    let at = BlockLocation::new("world", 5, 64, 5);
    for _ in 0..20 {
        assert!(matches!(
            h.runtime.doors().interact(&actor, &at).await,
            DoorInteraction::Toggled(ToggleOutcome::NoStructure)
        ));
    }
    assert_eq!(
        h.runtime.doors().interact(&actor, &at).await,
        DoorInteraction::RateLimited
    );
}

#[tokio::test]
async fn test_rental_partial_extension() {
    let h = harness();
    let tenant = ActorId::generate();
    h.regions
        .insert(Region::new(rid("rent1"), "world").rental().owned_by(tenant));
    h.market.set_max_periods(rid("rent1"), 2);

    let rental = h.runtime.rental();
    let outcome = rental.extend(&tenant, "rent1", 3).await.unwrap();
    assert_eq!(
        outcome,
        ExtensionOutcome::Partial {
            extended: 2,
            requested: 3,
            reason: ExtensionRefusal::LimitReached
        }
    );
    assert_eq!(outcome.message(), "Extended 2 of 3 (maximum rental time reached)");

    let outcome = rental.extend(&tenant, "rent1", 1).await.unwrap();
    assert!(matches!(outcome, ExtensionOutcome::Failed { requested: 1, .. }));

    assert!(matches!(
        rental.extend(&ActorId::generate(), "rent1", 1).await,
        Err(ServiceError::NotOwner(_))
    ));
    assert!(matches!(
        rental.extend(&tenant, "rent1", 0).await,
        Err(ServiceError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_rental_complete_and_rate_limited() {
    let h = harness();
    let tenant = ActorId::generate();
    h.regions
        .insert(Region::new(rid("rent2"), "world").rental().owned_by(tenant));

    let rental = h.runtime.rental();
    for _ in 0..3 {
        let outcome = rental.extend(&tenant, "rent2", 2).await.unwrap();
        assert_eq!(outcome, ExtensionOutcome::Complete { periods: 2 });
    }
    assert!(matches!(
        rental.extend(&tenant, "rent2", 1).await,
        Err(ServiceError::RateLimited { action: "purchase" })
    ));
    assert_eq!(h.market.extended("rent2"), 6);
}

#[tokio::test]
async fn test_full_sync_through_admin() {
    let h = harness();
    let admin = h.admin;
    h.market_regions(&["jcell1", "jcell2"]);
    let admin_api = h.runtime.admin();
    admin_api.create_group(&admin, "jcells", None).unwrap();
    admin_api.bulk_add(&admin, "jcells", "jcell*").await.unwrap();
    h.regions.remove("jcell2");

    let quick = admin_api.quick_check(&admin).await.unwrap();
    assert_eq!((quick.valid_regions(), quick.invalid_regions()), (1, 1));

    let writes = h.group_storage.write_count();
    let result = admin_api.full_sync(&admin).unwrap().wait().await.unwrap();
    assert_eq!(result.invalid_regions(), 1);
    assert_eq!(h.group_storage.write_count(), writes + 1);
    assert_eq!(admin_api.last_sync(), Some(result));
    assert_eq!(h.runtime.groups().get("jcells").unwrap().region_count(), 1);
}
