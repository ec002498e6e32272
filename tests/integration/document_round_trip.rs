use sector_reindex::document::{DocumentFormat, EditDocument, EditKind};
use sector_reindex::resolve::{ResolutionEngine, ResolveOptions};
use sector_reindex::store::{HashRecord, HashStore, SledHashStore};
use serde_json::Value;
use tempfile::TempDir;

const MOD_DOCUMENT: &str = r#"{
  "name": "remove-billboards",
  "streaming": {
    "sectors": [
      {
        "path": "base\\worlds\\03_night_city\\_compiled\\default\\exterior_-6_4_0_1.streamingsector",
        "expectedNodes": 4,
        "nodeDeletions": [
          { "type": "worldEntityNode", "index": 1, "debugName": "billboard" },
          { "type": "worldFoliageNode", "index": 3, "expectedInstances": 2, "instanceDeletions": [1] }
        ],
        "nodeMutations": [
          { "type": "worldMeshNode", "index": 0, "position": [1.0, 2.0, 3.0, 1.0], "nbNodesUnderProxyDiff": 0 }
        ]
      }
    ]
  }
}"#;

const KEY: &str = "03_night_city\\_compiled\\default\\exterior_-6_4_0_1";

#[test]
fn json_document_is_rebased_and_keeps_unknown_fields() {
    let dir = TempDir::new().unwrap();
    let store = SledHashStore::open(&dir.path().join("store")).unwrap();
    store.ensure_version("2.12").unwrap();
    store.ensure_version("2.2").unwrap();
    store
        .put(
            "2.12",
            KEY,
            &[
                HashRecord::new(1),
                HashRecord::new(2),
                HashRecord::new(3),
                HashRecord::instanced(4, vec![40, 41]),
            ],
        )
        .unwrap();
    store
        .put(
            "2.2",
            KEY,
            &[
                HashRecord::new(9),
                HashRecord::instanced(4, vec![41, 40]),
                HashRecord::new(1),
                HashRecord::new(3),
                HashRecord::new(2),
            ],
        )
        .unwrap();

    let mut document = EditDocument::parse(MOD_DOCUMENT).unwrap();
    let engine = ResolutionEngine::new(&store, "2.12", "2.2", ResolveOptions::default()).unwrap();
    let resolution = engine.resolve(document.sectors()).unwrap();
    assert!(resolution.report.is_clean());
    document.set_sectors(resolution.sectors);

    let output = dir.path().join("out").join("mod.json");
    document.save(&output).unwrap();

    let reread = EditDocument::load(&output).unwrap();
    assert_eq!(reread.format(), DocumentFormat::Json);
    let sector = &reread.sectors()[0];
    assert_eq!(sector.expected_nodes, 5);
    assert_eq!(sector.node_deletions[0].index, 4);
    assert_eq!(sector.node_deletions[1].index, 1);
    assert_eq!(
        sector.node_deletions[1].kind,
        EditKind::InstancedRemoval {
            expected_actors: 2,
            actor_deletions: vec![0],
            naming: sector_reindex::document::ActorFieldNaming::Instances,
        }
    );
    assert_eq!(sector.node_mutations[0].index, 2);

    let raw: Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(raw["name"], "remove-billboards");
    let deletion = &raw["streaming"]["sectors"][0]["nodeDeletions"][0];
    assert_eq!(deletion["debugName"], "billboard");
    let foliage = &raw["streaming"]["sectors"][0]["nodeDeletions"][1];
    assert_eq!(foliage["instanceDeletions"], serde_json::json!([0]));
    assert!(foliage.get("actorDeletions").is_none());
    let mutation = &raw["streaming"]["sectors"][0]["nodeMutations"][0];
    assert_eq!(mutation["position"], serde_json::json!([1.0, 2.0, 3.0, 1.0]));
}

#[test]
fn yaml_document_is_written_back_as_yaml() {
    let yaml = "streaming:\n  sectors:\n    - path: a\\area_0_0_0_1.streamingsector\n      expectedNodes: 1\n      nodeDeletions:\n        - type: worldEntityNode\n          index: 0\n";
    let dir = TempDir::new().unwrap();
    let document = EditDocument::parse(yaml).unwrap();
    assert_eq!(document.format(), DocumentFormat::Yaml);

    let output = dir.path().join("mod.yaml");
    document.save(&output).unwrap();
    let text = std::fs::read_to_string(&output).unwrap();
    assert!(serde_json::from_str::<Value>(&text).is_err());
    assert!(text.contains("expectedNodes: 1"));
}

#[test]
fn sector_level_fields_survive_resolution() {
    let dir = TempDir::new().unwrap();
    let store = SledHashStore::open(&dir.path().join("store")).unwrap();
    store.ensure_version("2.1").unwrap();
    store.ensure_version("2.2").unwrap();
    store.put("2.1", "area_0_0_0_1", &[HashRecord::new(1), HashRecord::new(2)]).unwrap();
    store.put("2.2", "area_0_0_0_1", &[HashRecord::new(2), HashRecord::new(1)]).unwrap();

    let mut document = EditDocument::parse(
        r#"{"streaming":{"sectors":[{"path":"area_0_0_0_1","expectedNodes":2,"comment":"keep me","tags":["billboards"],"nodeDeletions":[{"index":0}]}]}}"#,
    )
    .unwrap();
    let engine = ResolutionEngine::new(&store, "2.1", "2.2", ResolveOptions::default()).unwrap();
    let resolution = engine.resolve(document.sectors()).unwrap();
    document.set_sectors(resolution.sectors);

    let raw: Value = serde_json::from_str(&document.render().unwrap()).unwrap();
    let sector = &raw["streaming"]["sectors"][0];
    assert_eq!(sector["comment"], "keep me");
    assert_eq!(sector["tags"], serde_json::json!(["billboards"]));
    assert_eq!(sector["nodeDeletions"][0]["index"], 1);
}
