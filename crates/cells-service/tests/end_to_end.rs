mod common;

use cells_registry::{AcquisitionDecision, DenialReason, RegistryError};
use cells_service::{CellsConfig, CellsRuntime, Collaborators, ServiceError};
use cells_types::ActorId;
use common::{harness, rid};

#[tokio::test]
async fn test_global_limit_scenario() {
    let h = harness();
    let admin = h.admin;
    let actor = ActorId::generate();
    h.market_regions(&["jcell4", "jcell5"]);
    for id in ["jcell1", "jcell2", "jcell3"] {
        h.give(actor, id);
    }

    let admin_api = h.runtime.admin();
    admin_api.create_group(&admin, "jcells", Some("J Block")).unwrap();
    let outcome = admin_api.bulk_add(&admin, "jcells", "jcell1-5").await.unwrap();
    assert_eq!(outcome.added, 5);

    admin_api.set_global_limit(&admin, 3).unwrap();
    let decision = h
        .runtime
        .resolver()
        .resolve_for_acquisition(&actor, "jcell4")
        .await;
    assert_eq!(decision.reason(), Some(DenialReason::QuotaGlobal));
    assert_eq!(decision.reason().map(|r| r.code()), Some("quota-global"));

    admin_api.set_global_limit(&admin, 4).unwrap();
    let decision = h
        .runtime
        .resolver()
        .resolve_for_acquisition(&actor, "jcell4")
        .await;
    assert_eq!(
        decision,
        AcquisitionDecision::Allow {
            group: Some("jcells".parse().unwrap())
        }
    );
}

#[tokio::test]
async fn test_overlap_fallback_admits_through_second_group() {
    let h = harness();
    let admin = h.admin;
    let actor = ActorId::generate();
    h.market_regions(&["jcell4"]);

    let admin_api = h.runtime.admin();
    admin_api.create_group(&admin, "vip", None).unwrap();
    admin_api.create_group(&admin, "jcells", None).unwrap();
    admin_api.add_region(&admin, "vip", "jcell4").await.unwrap();
    admin_api.add_region(&admin, "jcells", "jcell4").await.unwrap();
    admin_api.set_priority(&admin, "vip", 10).unwrap();
    admin_api.set_permission(&admin, "vip", "cells.vip").unwrap();

    let resolver = h.runtime.resolver();
    assert_eq!(resolver.primary_group_for("jcell4").unwrap().name().as_str(), "vip");
    let decision = resolver.resolve_for_acquisition(&actor, "jcell4").await;
    assert_eq!(
        decision,
        AcquisitionDecision::Allow {
            group: Some("jcells".parse().unwrap())
        }
    );

    admin_api.set_permission(&admin, "jcells", "cells.jcells").unwrap();
    let decision = resolver.resolve_for_acquisition(&actor, "jcell4").await;
    assert_eq!(decision.reason(), Some(DenialReason::Capability));
    assert_eq!(decision.group().map(|g| g.as_str()), Some("vip"));
}

#[tokio::test]
async fn test_admin_requires_capability() {
    let h = harness();
    let stranger = ActorId::generate();
    let err = h.runtime.admin().create_group(&stranger, "jcells", None).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied { .. }));
    assert!(h.runtime.groups().is_empty());
}

#[tokio::test]
async fn test_add_region_requires_marketplace_region() {
    let h = harness();
    let admin = h.admin;
    let admin_api = h.runtime.admin();
    admin_api.create_group(&admin, "jcells", None).unwrap();

    let err = admin_api.add_region(&admin, "jcells", "nowhere").await.unwrap_err();
    assert!(matches!(err, ServiceError::RegionNotFound(_)));

    h.market_regions(&["jcell1"]);
    assert!(admin_api.add_region(&admin, "jcells", "jcell1").await.unwrap());
    assert!(!admin_api.add_region(&admin, "jcells", "jcell1").await.unwrap());
}

#[tokio::test]
async fn test_delete_refuses_non_empty_group() {
    let h = harness();
    let admin = h.admin;
    h.market_regions(&["jcell1"]);
    let admin_api = h.runtime.admin();
    admin_api.create_group(&admin, "jcells", None).unwrap();
    admin_api.add_region(&admin, "jcells", "jcell1").await.unwrap();

    let err = admin_api.delete_group(&admin, "jcells").unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Registry(RegistryError::NotEmpty { regions: 1, .. })
    ));

    assert!(admin_api.remove_region(&admin, "jcells", "jcell1").unwrap());
    admin_api.delete_group(&admin, "jcells").unwrap();
    assert!(h.runtime.groups().get("jcells").is_none());
    assert!(matches!(
        admin_api.delete_group(&admin, "jcells"),
        Err(ServiceError::Registry(RegistryError::NotFound(_)))
    ));
}

#[tokio::test]
async fn test_bulk_add_is_rate_limited() {
    let h = harness();
    let admin = h.admin;
    h.market_regions(&["acell1", "acell2"]);
    let admin_api = h.runtime.admin();
    admin_api.create_group(&admin, "acells", None).unwrap();

    admin_api.bulk_add(&admin, "acells", "acell*").await.unwrap();
    let second = admin_api.bulk_add(&admin, "acells", "acell*").await.unwrap();
    assert_eq!(second.skipped, 2);
    assert!(matches!(
        admin_api.bulk_add(&admin, "acells", "acell*").await,
        Err(ServiceError::RateLimited { action: "bulk_add" })
    ));
    assert_eq!(admin_api.rate_gate_stats(&admin).unwrap().get("bulk_add"), Some(&1));
}

#[tokio::test]
async fn test_option_validation() {
    let h = harness();
    let admin = h.admin;
    let admin_api = h.runtime.admin();
    admin_api.create_group(&admin, "jcells", None).unwrap();

    assert!(matches!(
        admin_api.set_cell_limit(&admin, "jcells", -2),
        Err(ServiceError::InvalidArgument(_))
    ));
    assert!(matches!(
        admin_api.set_teleport_cost(&admin, "jcells", f64::NAN),
        Err(ServiceError::InvalidArgument(_))
    ));
    assert!(matches!(
        admin_api.set_teleport_access(&admin, "jcells", "friends"),
        Err(ServiceError::Validation(_))
    ));
    assert!(matches!(
        admin_api.set_global_limit(&admin, -5),
        Err(ServiceError::Registry(_))
    ));

    let group = admin_api
        .set_display_name(&admin, "jcells", "  J Block ")
        .unwrap();
    assert_eq!(group.display_name(), "J Block");
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = CellsConfig::default();
    config.storage.data_dir = dir.path().to_path_buf();

    let h = harness();
    let build = || {
        let host = Collaborators::new(
            h.regions.clone(),
            h.caps.clone(),
            h.world.clone(),
            h.economy.clone(),
            h.teleporter.clone(),
            h.market.clone(),
        )
        .with_clock(h.clock.clone());
        CellsRuntime::new(config.clone(), host)
    };

    let admin = h.admin;
    h.market_regions(&["jcell1"]);
    let door = cells_types::BlockLocation::new("world", 3, 64, 3);

    let first = build();
    first.admin().create_group(&admin, "jcells", None).unwrap();
    first.admin().add_region(&admin, "jcells", "jcell1").await.unwrap();
    first.admin().set_global_limit(&admin, 7).unwrap();
    first.admin().link_door(&admin, &door, "jcell1").await.unwrap();
    assert!(dir.path().join("groups.yml").exists());
    assert!(dir.path().join("doors.yml").exists());

    let second = build();
    second.load().unwrap();
    let group = second.groups().get("jcells").unwrap();
    assert!(group.contains_region("jcell1"));
    assert_eq!(second.groups().global_limit().get(), 7);
    assert_eq!(second.links().linked_region(&door), Some(rid("jcell1")));

    let raw = std::fs::read_to_string(dir.path().join("groups.yml")).unwrap();
    let parsed: serde_yaml::Value = serde_yaml::from_str(&raw).unwrap();
    assert_eq!(parsed["global-limit"].as_i64(), Some(7));
}
