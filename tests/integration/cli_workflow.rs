use clap::Parser;
use sector_reindex::config::ReindexConfig;
use sector_reindex::store::HashStore;
use sector_reindex::tooling::cli::{Cli, CliContext, Commands};
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;

const PARTITION_DIR: &str = "base/worlds/03_night_city/_compiled/default";

fn write_export(root: &Path, name: &str, nodes: Value) {
    let dir = root.join(PARTITION_DIR);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(format!("{}.streamingsector.json", name)),
        serde_json::to_string(&nodes).unwrap(),
    )
    .unwrap();
}

fn context(dir: &TempDir) -> CliContext {
    CliContext::with_config(
        ReindexConfig::default(),
        Some(dir.path().join("store")),
        dir.path().join("config.toml"),
    )
    .unwrap()
}

fn ingest(ctx: &CliContext, dir: &Path, version: &str) -> String {
    ctx.execute(&Commands::Ingest {
        dir: dir.to_path_buf(),
        version: version.to_string(),
        parallelism: Some(2),
        force: false,
    })
    .unwrap()
}

#[test]
fn ingest_then_update_rebases_a_yaml_document() {
    let dir = TempDir::new().unwrap();
    let old = dir.path().join("exports-2.1");
    let new = dir.path().join("exports-2.2");

    write_export(
        &old,
        "area_10_5_0_1",
        json!([
            { "structural": { "mesh": "pillar.mesh" } },
            { "structural": { "mesh": "billboard.mesh" } },
            { "structural": { "mesh": "lamp.mesh" } }
        ]),
    );
    write_export(
        &new,
        "area_10_5_0_1",
        json!([
            { "structural": { "mesh": "pillar.mesh" } },
            { "structural": { "mesh": "lamp.mesh" } }
        ]),
    );
    write_export(
        &new,
        "area_11_5_0_1",
        json!([
            { "structural": { "mesh": "bench.mesh" } },
            { "structural": { "mesh": "billboard.mesh" } }
        ]),
    );

    let ctx = context(&dir);
    assert!(ingest(&ctx, &old, "2.1").contains("stored=1"));
    assert!(ingest(&ctx, &new, "2.2").contains("stored=2"));

    let input = dir.path().join("mod.yaml");
    std::fs::write(
        &input,
        "streaming:\n  sectors:\n    - path: base\\worlds\\03_night_city\\_compiled\\default\\area_10_5_0_1.streamingsector\n      expectedNodes: 3\n      nodeDeletions:\n        - type: worldEntityNode\n          index: 1\n        - type: worldEntityNode\n          index: 2\n",
    )
    .unwrap();
    let output = dir.path().join("out").join("mod.yaml");

    let report = ctx
        .execute(&Commands::Update {
            input: input.clone(),
            output: output.clone(),
            from: Some("2.1".to_string()),
            to: Some("2.2".to_string()),
            max_depth: Some(1),
            format: "json".to_string(),
        })
        .unwrap();
    let report: Value = serde_json::from_str(&report).unwrap();
    assert_eq!(report["stats"]["rescanned"], 1);
    assert_eq!(report["stats"]["relocated"], 1);
    assert_eq!(report["stats"]["unresolved"], 0);

    let written: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    let sectors = written["streaming"]["sectors"].as_sequence().unwrap();
    assert_eq!(sectors.len(), 2);
    assert_eq!(sectors[0]["expectedNodes"], 2);
    assert_eq!(sectors[0]["nodeDeletions"][0]["index"], 1);
    assert!(sectors[1]["path"].as_str().unwrap().ends_with("area_11_5_0_1.streamingsector"));
    assert_eq!(sectors[1]["nodeDeletions"][0]["index"], 1);
}

#[test]
fn reingest_skips_partitions_unless_forced() {
    let dir = TempDir::new().unwrap();
    let exports = dir.path().join("exports");
    write_export(&exports, "area_0_0_0_1", json!([{ "structural": 1 }]));

    let ctx = context(&dir);
    ingest(&ctx, &exports, "2.1");
    assert!(ingest(&ctx, &exports, "2.1").contains("skipped=1"));

    let forced = ctx
        .execute(&Commands::Ingest {
            dir: exports.clone(),
            version: "2.1".to_string(),
            parallelism: None,
            force: true,
        })
        .unwrap();
    assert!(forced.contains("stored=1"));
}

#[test]
fn export_import_and_inspection_commands() {
    let dir = TempDir::new().unwrap();
    let exports = dir.path().join("exports");
    write_export(
        &exports,
        "area_0_0_0_1",
        json!([{ "structural": 1, "actors": [1, 2] }, { "structural": 2 }]),
    );
    let ctx = context(&dir);
    ingest(&ctx, &exports, "2.1");

    let versions = ctx.execute(&Commands::Versions).unwrap();
    assert_eq!(versions, "2.1");

    let partitions = ctx
        .execute(&Commands::Partitions {
            version: "2.1".to_string(),
            hashes: None,
        })
        .unwrap();
    assert!(partitions.contains("area_0_0_0_1"));

    let hashes = ctx
        .execute(&Commands::Partitions {
            version: "2.1".to_string(),
            hashes: Some(
                "base\\worlds\\03_night_city\\_compiled\\default\\area_0_0_0_1.streamingsector"
                    .to_string(),
            ),
        })
        .unwrap();
    assert!(hashes.contains("Structural hash"));

    let bundle = dir.path().join("2.1.bundle");
    ctx.execute(&Commands::Export {
        version: "2.1".to_string(),
        file: bundle.clone(),
    })
    .unwrap();

    let other_dir = TempDir::new().unwrap();
    let other = context(&other_dir);
    let imported = other
        .execute(&Commands::Import {
            file: bundle.clone(),
        })
        .unwrap();
    assert!(imported.contains("1 partitions"));
    assert_eq!(
        other.store().unwrap().list_all("2.1").unwrap(),
        ctx.store().unwrap().list_all("2.1").unwrap()
    );
}

#[test]
fn update_against_unknown_version_fails() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let input = dir.path().join("mod.json");
    std::fs::write(&input, r#"{"streaming":{"sectors":[]}}"#).unwrap();
    let result = ctx.execute(&Commands::Update {
        input,
        output: dir.path().join("out.json"),
        from: Some("2.1".to_string()),
        to: Some("2.2".to_string()),
        max_depth: None,
        format: "text".to_string(),
    });
    assert!(result.unwrap_err().to_string().contains("Unknown version"));
}

#[test]
fn every_command_parses() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["sector-reindex", "update", "in.json", "--output", "out.json", "--from", "a", "--to", "b"],
        vec!["sector-reindex", "update", "in.yaml", "-o", "out.yaml", "--max-depth", "3", "--format", "json"],
        vec!["sector-reindex", "versions"],
        vec!["sector-reindex", "stats", "2.1"],
        vec!["sector-reindex", "partitions", "2.1", "--hashes", "key"],
        vec!["sector-reindex", "export", "2.1", "out.bundle"],
        vec!["sector-reindex", "import", "out.bundle"],
        vec!["sector-reindex", "ingest", "exports", "2.1", "--parallelism", "8", "--force"],
        vec!["sector-reindex", "config", "get"],
        vec!["sector-reindex", "config", "get", "resolution.max_sector_depth"],
        vec!["sector-reindex", "config", "set", "resolution.max_sector_depth", "4"],
        vec!["sector-reindex", "--log-format", "json", "--log-output", "stdout", "versions"],
    ];
    for args in cases {
        assert!(Cli::try_parse_from(args.clone()).is_ok(), "expected valid parse for args: {args:?}");
    }
    assert!(Cli::try_parse_from(["sector-reindex", "update", "in.json"]).is_err());
}
