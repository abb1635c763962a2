#![forbid(unsafe_code)]

use infrasim_rendezvous::core::config::Config;
use infrasim_rendezvous::core::types::{NodeDescriptor, SlotKey};
use infrasim_rendezvous::rendezvous::codec;
use infrasim_rendezvous::rendezvous::deriver;
use infrasim_rendezvous::rendezvous::learner::PeerLearner;
use infrasim_rendezvous::rendezvous::store;
use tempfile::tempdir;

fn descriptor_frame(node_id: &str) -> Vec<u8> {
    let descriptor =
        NodeDescriptor::from_json_bytes(format!(r#"{{"node_id":"{node_id}"}}"#).as_bytes()).unwrap();
    codec::encode(&descriptor.to_json_bytes().unwrap(), None)
}

/// Mirrors scenario S3: two nodes sharing a `mesh_secret` derive the same
/// endpoint for a given slot, and each persists the other's descriptor once
/// its wire frame is decoded and run through the peer learner.
#[tokio::test]
async fn two_node_mutual_discovery_via_shared_endpoint() {
    let secret = b"shared-mesh-secret";
    let key = SlotKey::new(100, 0);
    let a_endpoint = deriver::derive(secret, key);
    let b_endpoint = deriver::derive(secret, key);
    assert_eq!(a_endpoint, b_endpoint, "identical inputs must derive the identical endpoint");

    let peers_a = tempdir().unwrap();
    let peers_b = tempdir().unwrap();
    let mut learner_a = PeerLearner::new("node-a", peers_a.path().to_path_buf(), 64, None, None, None);
    let mut learner_b = PeerLearner::new("node-b", peers_b.path().to_path_buf(), 64, None, None, None);

    let frame_from_a = descriptor_frame("node-a");
    let frame_from_b = descriptor_frame("node-b");

    let decoded_at_b = codec::decode(&frame_from_a).unwrap();
    let learned = learner_b.learn(decoded_at_b).await.unwrap();
    assert_eq!(learned.node_id, "node-a");
    assert!(peers_b.path().join("node-a.json").exists());

    let decoded_at_a = codec::decode(&frame_from_b).unwrap();
    let learned = learner_a.learn(decoded_at_a).await.unwrap();
    assert_eq!(learned.node_id, "node-b");
    assert!(peers_a.path().join("node-b.json").exists());
}

/// Mirrors scenario S4: a node that decodes its own broadcast frame (as
/// happens on some interfaces due to loopback delivery) must not create a
/// peer record for itself.
#[tokio::test]
async fn self_suppression_drops_own_descriptor() {
    let peers_dir = tempdir().unwrap();
    let mut learner = PeerLearner::new("node-a", peers_dir.path().to_path_buf(), 64, None, None, None);

    let own_frame = descriptor_frame("node-a");
    let decoded = codec::decode(&own_frame).unwrap();
    let err = learner.learn(decoded).await.unwrap_err();
    assert!(format!("{err}").contains("self_loop"));
    assert_eq!(std::fs::read_dir(peers_dir.path()).unwrap().count(), 0);
}

/// Mirrors scenario S6: malformed datagrams never reach the learner at all —
/// they are rejected at the wire codec.
#[test]
fn malformed_frame_is_rejected_at_the_codec_boundary() {
    assert!(codec::decode(b"not a valid frame at all").is_err());
    assert!(codec::decode(&[]).is_err());

    // A declared-but-absent signature length must not panic the decoder.
    let mut overflowing = 9000u32.to_be_bytes().to_vec();
    overflowing.extend_from_slice(b"short");
    assert!(codec::decode(&overflowing).is_err());
}

/// End-to-end slice of the startup path: parse a config file from disk, then
/// feed its `mesh_secret`/geometry straight into the deriver, confirming the
/// pieces compose without any engine-specific glue.
#[test]
fn config_drives_endpoint_derivation() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("rendezvous.conf");
    std::fs::write(
        &config_path,
        "mesh_secret = integration-test-secret\nepoch_seconds = 60\nslots_per_epoch = 4\nslot_duration_ms = 500\ninterface = wg0\n",
    )
    .unwrap();

    let cfg = Config::load(&config_path).unwrap();
    assert_eq!(cfg.interface, "wg0");

    let endpoint = deriver::derive(&cfg.mesh_secret, SlotKey::new(1, 2));
    assert!(deriver::is_link_local(&endpoint.address));
    assert_eq!(endpoint.port, deriver::BASE_PORT + 2);
}

/// A descriptor with no sibling `.sig` file still loads; the daemon runs
/// without a detached signature, it just never attaches one to outbound frames.
#[test]
fn local_descriptor_without_signature_still_loads() {
    let dir = tempdir().unwrap();
    let descriptor_path = dir.path().join("descriptor.json");
    std::fs::write(&descriptor_path, br#"{"node_id":"solo"}"#).unwrap();

    let local = store::load_local_descriptor(&descriptor_path).unwrap();
    assert_eq!(local.descriptor.node_id(), Some("solo"));
    assert!(local.signature.is_none());
}
