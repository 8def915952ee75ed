//! Session manager, classifier and walker working together over the
//! in-memory transport.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tb_domain::{EndpointUrl, NodeId};
use tb_opcua_client::{
    discover_roots, walk, AddressSpace, MemoryConnector, RootFilter, SessionManager, WalkOptions,
};

fn system_names() -> HashSet<String> {
    ["Server", "Types", "Views", "EventTypes", "BaseEventType"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[tokio::test]
async fn domain_tags_only_under_discovered_roots() {
    let space = AddressSpace::new();
    let plant = space.add_object(&space.objects(), "OilAndGasPlant").unwrap();
    let line = space.add_object(&plant, "Line1").unwrap();
    let pump = space.add_object(&line, "Pump").unwrap();
    space.add_variable(&pump, "MotorTemp", 0.0).unwrap();

    let url = EndpointUrl::parse("http://localhost:4840").unwrap();
    let connector = MemoryConnector::new();
    connector.bind(&url, space);
    let manager = SessionManager::new(Arc::new(connector), Duration::from_secs(1));

    let conn = manager.connect(&url).await.unwrap();
    let roots = discover_roots(conn.as_ref(), &system_names()).await.unwrap();
    let filter = RootFilter::new(&roots);
    let walked = walk(conn.as_ref(), &NodeId::root_folder(), WalkOptions::default()).await;

    let kept: Vec<_> = walked
        .nodes
        .iter()
        .filter(|n| filter.matches(&n.browse_path))
        .collect();

    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].browse_path, "Objects/OilAndGasPlant/Line1/Pump/MotorTemp");
    assert_eq!(kept[0].data_type.as_deref(), Some("Double"));
    assert!(walked.nodes.iter().any(|n| n.browse_path.starts_with("Objects/Server")));

    manager.disconnect_all().await;
    assert!(manager.list_connected().is_empty());
}
