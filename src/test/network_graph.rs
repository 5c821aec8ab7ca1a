use std::collections::BTreeSet;

use super::harness::Rng;
use crate::net::{NetworkId, NodeKey, Topology, TopologyError};

fn node_id(topo: &Topology, key: NodeKey) -> Option<u32> {
    topo.node(key).and_then(|n| n.node_id())
}

/// 成员编号与节点记录一致，非成员没有编号
fn assert_membership_consistent(topo: &Topology) {
    for node in topo.nodes() {
        match (node.network(), node.node_id()) {
            (Some(net), Some(id)) => {
                let network = topo.network(net).unwrap();
                assert_eq!(network.net_node_by_node_id(id), Some(node.key()));
                assert!(network.contains_net_node(node.key()));
            }
            (None, None) => {
                for network in topo.networks() {
                    assert!(!network.contains_net_node(node.key()));
                }
            }
            other => panic!("inconsistent membership for {:?}: {other:?}", node.key()),
        }
    }
}

#[test]
fn node_ids_start_at_zero_and_reuse_the_lowest_gap() {
    let mut topo = Topology::default();
    let net = topo.add_network("lan");
    let [a, b, c, d] = ["a", "b", "c", "d"].map(|n| topo.add_bridge(n));

    topo.add_connection(net, a, b).unwrap();
    topo.add_connection(net, b, c).unwrap();
    topo.add_connection(net, a, c).unwrap();
    topo.add_connection(net, a, d).unwrap();
    assert_eq!(
        [a, b, c, d].map(|k| node_id(&topo, k)),
        [Some(0), Some(1), Some(2), Some(3)]
    );

    // 三角形中去掉 b 不会孤立任何节点
    let removed = topo.remove_net_node(b).unwrap();
    assert_eq!(removed, BTreeSet::from([b]));
    assert_eq!(node_id(&topo, b), None);
    assert_eq!(node_id(&topo, c), Some(2));
    assert_eq!(node_id(&topo, d), Some(3));

    let e = topo.add_bridge("e");
    let f = topo.add_bridge("f");
    topo.add_connection(net, d, e).unwrap();
    topo.add_connection(net, e, f).unwrap();
    assert_eq!(node_id(&topo, e), Some(1));
    assert_eq!(node_id(&topo, f), Some(4));
    assert_membership_consistent(&topo);
}

#[test]
fn connection_queries() {
    let mut topo = Topology::default();
    let net = topo.add_network("lan");
    let hub = topo.add_bridge("hub");
    let spokes: Vec<_> = (0..3).map(|i| topo.add_bridge(format!("s{i}"))).collect();
    for &s in &spokes {
        topo.add_connection(net, hub, s).unwrap();
    }
    // 重复连接是空操作
    topo.add_connection(net, spokes[0], hub).unwrap();

    let network = topo.network(net).unwrap();
    assert_eq!(network.len(), 4);
    assert_eq!(network.connected_net_node_count(hub), 3);
    assert_eq!(network.connections().count(), 3);
    assert!(network.has_connection(spokes[1], hub));
    assert!(!network.has_connection(spokes[1], spokes[2]));
    assert_eq!(network.net_node_by_node_id(0), Some(hub));
    assert_eq!(
        topo.connected_net_nodes(hub).collect::<BTreeSet<_>>(),
        spokes.iter().copied().collect()
    );
}

#[test]
fn device_accepts_a_single_connection() {
    let mut topo = Topology::default();
    let net = topo.add_network("lan");
    let a = topo.add_bridge("a");
    let b = topo.add_bridge("b");
    let pc = topo.add_device("pc");

    topo.add_connection(net, a, pc).unwrap();
    let err = topo.add_connection(net, b, pc).unwrap_err();

    assert_eq!(err, TopologyError::ConnectionLimitExceeded { node: pc, max: 1 });
    // 失败的操作不留下任何痕迹
    assert_eq!(topo.node(b).unwrap().network(), None);
    assert_eq!(topo.network(net).unwrap().len(), 2);
}

#[test]
fn node_belongs_to_one_network() {
    let mut topo = Topology::default();
    let lan = topo.add_network("lan");
    let wan = topo.add_network("wan");
    let [a, b, c] = ["a", "b", "c"].map(|n| topo.add_bridge(n));

    topo.add_connection(lan, a, b).unwrap();
    assert_eq!(
        topo.add_connection(wan, b, c),
        Err(TopologyError::NodeInOtherNetwork { node: b, current: lan })
    );
    assert!(topo.network(wan).unwrap().is_empty());
    assert_eq!(topo.node(c).unwrap().network(), None);

    assert_eq!(topo.add_connection(lan, a, a), Err(TopologyError::SelfConnection(a)));
    assert_eq!(
        topo.add_connection(NetworkId(9), a, b),
        Err(TopologyError::UnknownNetwork(NetworkId(9)))
    );
    assert_eq!(
        topo.add_connection(lan, a, NodeKey(99)),
        Err(TopologyError::UnknownNode(NodeKey(99)))
    );
}

#[test]
fn removing_the_last_edge_releases_the_endpoint() {
    let mut topo = Topology::default();
    let net = topo.add_network("lan");
    let [a, b, c] = ["a", "b", "c"].map(|n| topo.add_bridge(n));
    topo.add_connection(net, a, b).unwrap();
    topo.add_connection(net, b, c).unwrap();

    assert_eq!(topo.remove_connection(net, b, c), Ok(true));
    assert_eq!(topo.node(c).unwrap().network(), None);
    assert_eq!(node_id(&topo, b), Some(1));
    assert_eq!(topo.remove_connection(net, b, c), Ok(false));

    assert_eq!(topo.remove_connection(net, a, b), Ok(true));
    assert!(topo.network(net).unwrap().is_empty());
    assert_membership_consistent(&topo);
}

#[test]
fn removing_a_cut_node_keeps_the_side_with_the_uplink() {
    let mut topo = Topology::default();
    let net = topo.add_network("office");
    let up = topo.add_uplink_router("up");
    let [a, b, c, d, e] = ["a", "b", "c", "d", "e"].map(|n| topo.add_bridge(n));
    topo.add_connection(net, up, a).unwrap();
    topo.add_connection(net, a, b).unwrap();
    topo.add_connection(net, b, c).unwrap();
    topo.add_connection(net, a, d).unwrap();
    topo.add_connection(net, d, e).unwrap();

    let removed = topo.remove_net_node(a).unwrap();

    assert_eq!(removed, BTreeSet::from([a, b, c, d, e]));
    assert_eq!(topo.network(net).unwrap().net_nodes().collect::<Vec<_>>(), vec![up]);
    assert_eq!(node_id(&topo, up), Some(0));
    assert_membership_consistent(&topo);
}

#[test]
fn without_an_uplink_the_largest_side_survives() {
    let mut topo = Topology::default();
    let net = topo.add_network("lan");
    let [x, y, z, w, v, p, q] = ["x", "y", "z", "w", "v", "p", "q"].map(|n| topo.add_bridge(n));
    topo.add_connection(net, x, y).unwrap();
    topo.add_connection(net, y, z).unwrap();
    topo.add_connection(net, z, w).unwrap();
    topo.add_connection(net, y, v).unwrap();
    // 与 y 无关的另一块
    topo.add_connection(net, p, q).unwrap();

    let removed = topo.remove_net_node(y).unwrap();

    assert_eq!(removed, BTreeSet::from([x, y, v]));
    assert_eq!(node_id(&topo, z), Some(2));
    assert_eq!(node_id(&topo, w), Some(3));
    assert_eq!(node_id(&topo, p), Some(5));
    assert_eq!(node_id(&topo, q), Some(6));
    assert_membership_consistent(&topo);
}

#[test]
fn removing_a_detached_node_is_a_no_op() {
    let mut topo = Topology::default();
    let lonely = topo.add_device("lonely");
    assert_eq!(topo.remove_net_node(lonely), Ok(BTreeSet::new()));
    assert_eq!(topo.remove_net_node(NodeKey(7)), Err(TopologyError::UnknownNode(NodeKey(7))));
}

#[test]
fn random_edits_keep_node_ids_compact_and_consistent() {
    let mut rng = Rng::new(0x5eed);
    let mut topo = Topology::default();
    let net = topo.add_network("lan");
    let keys: Vec<_> = (0..24).map(|i| topo.add_bridge(format!("n{i}"))).collect();

    for _ in 0..400 {
        let a = keys[rng.below(keys.len())];
        let b = keys[rng.below(keys.len())];
        if a == b {
            continue;
        }
        match rng.below(3) {
            0 | 1 => {
                let expected = lowest_unused(&topo, net);
                let joining = topo.node(a).unwrap().network().is_none();
                topo.add_connection(net, a, b).unwrap();
                if joining {
                    assert_eq!(node_id(&topo, a), Some(expected));
                }
            }
            _ => {
                if rng.below(2) == 0 {
                    topo.remove_connection(net, a, b).unwrap();
                } else {
                    let ids_before: Vec<_> = keys.iter().map(|&k| node_id(&topo, k)).collect();
                    let mut components: Vec<BTreeSet<NodeKey>> = Vec::new();
                    for n in topo.connected_net_nodes(a).collect::<Vec<_>>() {
                        if !components.iter().any(|c| c.contains(&n)) {
                            components.push(component_avoiding(&topo, n, a));
                        }
                    }
                    let joined = topo.node(a).unwrap().network().is_some();

                    let removed = topo.remove_net_node(a).unwrap();

                    // 幸存节点的编号不变
                    for (i, &k) in keys.iter().enumerate() {
                        if !removed.contains(&k) {
                            assert_eq!(node_id(&topo, k), ids_before[i]);
                        }
                    }
                    if !joined {
                        assert!(removed.is_empty());
                        continue;
                    }
                    // 被移除的恰好是 a 加上没能保留的分量；保留的分量原样不变
                    let (kept, lost): (Vec<_>, Vec<_>) = components
                        .iter()
                        .partition(|c| c.iter().all(|k| !removed.contains(k)));
                    assert!(kept.len() <= 1);
                    assert!(lost.iter().all(|c| c.is_subset(&removed)));
                    let mut expected: BTreeSet<NodeKey> = lost.into_iter().flatten().copied().collect();
                    expected.insert(a);
                    assert_eq!(removed, expected);
                    if let Some(&survivor) = kept.first() {
                        let largest = components.iter().map(BTreeSet::len).max().unwrap();
                        assert_eq!(survivor.len(), largest);
                        let start = *survivor.first().unwrap();
                        assert_eq!(&component_avoiding(&topo, start, a), survivor);
                    }
                }
            }
        }
        assert_membership_consistent(&topo);
    }
}

/// 不经过 `avoid` 的连通分量
fn component_avoiding(topo: &Topology, start: NodeKey, avoid: NodeKey) -> BTreeSet<NodeKey> {
    let mut seen = BTreeSet::from([start]);
    let mut frontier = vec![start];
    while let Some(k) = frontier.pop() {
        for n in topo.connected_net_nodes(k) {
            if n != avoid && seen.insert(n) {
                frontier.push(n);
            }
        }
    }
    seen
}

fn lowest_unused(topo: &Topology, net: NetworkId) -> u32 {
    let network = topo.network(net).unwrap();
    (0..).find(|&id| network.net_node_by_node_id(id).is_none()).unwrap()
}
