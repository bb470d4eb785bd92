use assert_cmd::prelude::*;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn write_scene(xml: &str) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("temp scene");
    tmp.write_all(xml.as_bytes()).expect("write scene");
    tmp
}

#[test]
fn cli_renders_scene_file_and_prints_final_state() {
    let scene = write_scene(
        r#"<scene>
  <object>
    <name>Lamp</name>
    <type>light</type>
    <light>point</light>
    <position>0 2 0</position>
  </object>
  <object>
    <name>Cube</name>
    <type>mesh</type>
    <material>flat</material>
    <position>1 0 -3</position>
  </object>
</scene>
"#,
    );
    let mut cmd = Command::cargo_bin("framework3d").expect("binary exists");
    cmd.arg(scene.path()).arg("--frames").arg("2");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 2 objects (1 lights)"))
        .stdout(contains(" - Cube (mesh)"))
        .stdout(contains("frame 2: 1 meshes, 1 draw calls, 1 lights"))
        .stdout(contains("Rendered 2 frame(s) with 2 draw call(s)"))
        .stdout(contains(" - Cube (mesh) pos=(1.00, 0.00, -3.00)"));
}

#[test]
fn cli_runs_builtin_demo_quietly() {
    let mut cmd = Command::cargo_bin("framework3d").expect("binary exists");
    cmd.arg("--quiet").arg("--frames").arg("3");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 6 objects (2 lights)"))
        .stdout(contains("Rendered 3 frame(s) with 9 draw call(s)"))
        .stdout(contains("frame 1:").not());
}

#[test]
fn cli_reports_bad_scene() {
    let scene = write_scene("<scene><object><type>mesh</type></object></scene>");
    let mut cmd = Command::cargo_bin("framework3d").expect("binary exists");
    cmd.arg(scene.path());
    cmd.assert()
        .failure()
        .stderr(contains("failed to parse scene XML"));
}

#[test]
fn cli_rejects_unknown_flags() {
    let mut cmd = Command::cargo_bin("framework3d").expect("binary exists");
    cmd.arg("--fullscreen");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --fullscreen"));
}
