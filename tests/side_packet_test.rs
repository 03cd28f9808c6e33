//! Side-packet bundle properties

mod common;

use graphlink::side_packet::SidePacketKey;
use graphlink::{SidePacketBundleBuilder, SidePacketValue};
use proptest::prelude::*;
use std::collections::HashMap;

fn key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z_][a-z0-9_]{0,8}",
        ("[a-z][a-z0-9]{0,5}", "[a-z][a-z0-9_]{0,5}").prop_map(|(s, n)| format!("{}__{}", s, n)),
    ]
}

fn value_strategy() -> impl Strategy<Value = SidePacketValue> {
    prop_oneof![
        "[ -~]{0,16}".prop_map(SidePacketValue::String),
        (-1.0e6f32..1.0e6f32).prop_map(SidePacketValue::Float32),
    ]
}

proptest! {
    #[test]
    fn test_finalize_keeps_distinct_keys_last_write_wins(
        entries in prop::collection::vec((key_strategy(), value_strategy()), 0..32)
    ) {
        let mut builder = SidePacketBundleBuilder::new();
        let mut expected = HashMap::new();
        for (key, value) in &entries {
            builder.put(key.as_str(), value.clone());
            expected.insert(key.clone(), value.clone());
        }
        let bundle = builder.finalize();

        prop_assert_eq!(bundle.len(), expected.len());
        for (key, value) in &expected {
            prop_assert_eq!(bundle.get(key), Some(value));
        }
    }

    #[test]
    fn test_subgraph_key_round_trip(
        subgraph in "[a-z][a-z0-9]{0,8}",
        name in "[a-z][a-z0-9_]{0,8}",
    ) {
        let key = SidePacketKey::in_subgraph(&subgraph, &name);
        prop_assert_eq!(key.subgraph(), Some(subgraph.as_str()));
        prop_assert_eq!(key.local_name(), name.as_str());
    }
}

#[test]
fn test_label_map_bundle() {
    let bundle = common::builders::label_map_bundle();
    assert_eq!(bundle.len(), 2);
    assert_eq!(
        bundle.get("file_path0").and_then(|v| v.as_str()),
        Some("labelmap0.txt")
    );
    assert_eq!(
        bundle.get("file_path1").and_then(|v| v.as_str()),
        Some("labelmap1.txt")
    );
}

#[test]
fn test_subgraph_partition() {
    let bundle = SidePacketBundleBuilder::new()
        .with("user_value_0", -4.4f32)
        .with("testsubgraph__user_value_0", "Input Side Packet...")
        .finalize();

    assert_eq!(bundle.subgraphs(), vec!["testsubgraph"]);
    let scoped = bundle.for_subgraph("testsubgraph");
    assert_eq!(
        scoped.get("user_value_0").and_then(|v| v.as_str()),
        Some("Input Side Packet...")
    );
    assert_eq!(bundle.top_level().count(), 1);
}
