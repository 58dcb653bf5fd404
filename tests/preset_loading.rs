use std::io::Write;
use std::sync::Arc;

use agora_core::error::AgoraError;
use agora_core::types::ModelTier;
use agora_heavy::{load_preset, run_heavy_mode, PresetLibrary};
use agora_test_utils::MockGenerator;

const PRESET: &str = r#"[
  {
    "id": "pro-side",
    "name": "Advocate",
    "systemInstruction": "Argue for the proposal.",
    "connections": ["judge"],
    "position": { "x": 10, "y": 20 }
  },
  {
    "id": "con-side",
    "name": "Skeptic",
    "systemInstruction": "Argue against the proposal.",
    "contextMessages": 2,
    "connections": ["judge", "ghost"]
  },
  {
    "id": "judge",
    "name": "Judge",
    "systemInstruction": "Weigh both sides.",
    "model": "pro",
    "order": 2
  }
]"#;

fn write_temp(content: &str) -> tempfile::NamedTempFile {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(content.as_bytes()).expect("write preset");
    tmp
}

#[test]
fn test_load_preset_from_file() {
    let tmp = write_temp(PRESET);
    let nodes = load_preset(tmp.path()).expect("load preset");

    assert_eq!(nodes.len(), 3);
    assert_eq!(nodes[1].context_messages, 2);
    assert_eq!(nodes[2].model, ModelTier::Pro);
    assert_eq!(nodes[0].position.map(|p| p.y), Some(20.0));
}

#[test]
fn test_import_drops_unknown_targets() {
    let tmp = write_temp(PRESET);
    let mut library = PresetLibrary::new();
    let graph = library.import_file(tmp.path()).expect("import");

    assert_eq!(graph.len(), 3);
    assert_eq!(graph.dropped_edges().len(), 1);
    assert_eq!(graph.dropped_edges()[0].to, "ghost");
    assert_eq!(graph.node("con-side").unwrap().connections, vec!["judge"]);
}

#[test]
fn test_rejected_file_leaves_library_unchanged() {
    let tmp = write_temp(r#"[{"id": "x", "name": "X", "systemInstruction": "", "order": "first"}]"#);
    let mut library = PresetLibrary::new();
    let before = library.export().unwrap();

    let err = library.import_file(tmp.path()).unwrap_err();
    assert!(matches!(err, AgoraError::InvalidPreset(_)));
    assert_eq!(library.export().unwrap(), before);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let err = load_preset(&dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, AgoraError::Io(_)));
}

#[test]
fn test_export_writes_importable_file() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("agents.json");

    let library = PresetLibrary::new();
    std::fs::write(&path, library.export().unwrap()).unwrap();

    let mut other = PresetLibrary::with_agents(vec![]);
    other.import_file(&path).unwrap();
    assert_eq!(other.active().nodes(), library.active().nodes());
}

#[tokio::test]
async fn test_imported_preset_runs_end_to_end() {
    let tmp = write_temp(PRESET);
    let mut library = PresetLibrary::new();
    library.import_file(tmp.path()).unwrap();

    let mock = Arc::new(MockGenerator::new().reply("Weigh both sides.", "verdict"));
    let response = run_heavy_mode(mock.clone(), "Should we ship?", &[], library.active())
        .await
        .unwrap();

    assert_eq!(response.final_text, "verdict");
    let judge = mock.request_for("Weigh both sides.").unwrap();
    assert!(judge.new_turn.contains("### Advocate"));
    assert!(judge.new_turn.contains("### Skeptic"));
}
