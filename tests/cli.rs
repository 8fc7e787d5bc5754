use assert_cmd::Command;
use serde_json::json;
use std::fs;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;

fn write_sb3(path: &Path, project: &serde_json::Value) {
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let opts = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    zip.start_file("project.json", opts).unwrap();
    zip.write_all(serde_json::to_string_pretty(project).unwrap().as_bytes())
        .unwrap();
    zip.finish().unwrap();
}

fn hello_project(next: &str) -> serde_json::Value {
    json!({
        "targets": [
            { "isStage": true, "name": "Stage", "blocks": {} },
            {
                "isStage": false,
                "name": "Cat",
                "x": 5,
                "y": -7,
                "blocks": {
                    "hat": { "opcode": "event_whenflagclicked", "next": next, "inputs": {}, "fields": {} },
                    "say": { "opcode": "looks_say", "next": null, "inputs": { "MESSAGE": [1, [10, "hello"]] }, "fields": {} }
                }
            }
        ]
    })
}

#[test]
fn compiles_sb3_into_main_c() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("game.sb3");
    write_sb3(&input, &hello_project("say"));

    let output = Command::cargo_bin("sbswitch")
        .unwrap()
        .arg(&input)
        .output()
        .unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "{}", stderr);
    assert!(stderr.contains("compiled with 0 warnings"), "{}", stderr);

    let program = fs::read_to_string(dir.path().join("main.c")).unwrap();
    assert!(program.contains("sprites[0].x = 5;"));
    assert!(program.contains("sprites[0].y = -7;"));
    assert!(program.contains("printf(\"Sprite %d says: %s\\n\", 0, \"hello\");"));
}

#[test]
fn reads_bare_project_json_and_prints() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("project.json");
    fs::write(&input, hello_project("say").to_string()).unwrap();

    let output = Command::cargo_bin("sbswitch")
        .unwrap()
        .arg(&input)
        .arg("--print")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("int main(int argc, char* argv[]) {"));
    assert!(!dir.path().join("main.c").exists());
}

#[test]
fn structural_errors_fail_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.sb3");
    let out = dir.path().join("out").join("broken.c");
    write_sb3(&input, &hello_project("missing-block"));

    let output = Command::cargo_bin("sbswitch")
        .unwrap()
        .arg(&input)
        .arg(&out)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("compile failed"), "{}", stderr);
    assert!(stderr.contains("missing-block"), "{}", stderr);
    assert!(!out.exists());
}

#[test]
fn deny_warnings_rejects_unsupported_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("pen.sb3");
    let project = json!({
        "targets": [{
            "isStage": false,
            "name": "Cat",
            "blocks": {
                "hat": { "opcode": "event_whenflagclicked", "next": "pen", "inputs": {}, "fields": {} },
                "pen": { "opcode": "pen_clear", "next": null, "inputs": {}, "fields": {} }
            }
        }]
    });
    write_sb3(&input, &project);

    let output = Command::cargo_bin("sbswitch")
        .unwrap()
        .arg(&input)
        .arg("--deny-warnings")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("pen_clear"), "{}", stderr);

    let output = Command::cargo_bin("sbswitch")
        .unwrap()
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("compiled with 1 warnings"), "{}", stderr);
}

#[test]
fn missing_input_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::cargo_bin("sbswitch")
        .unwrap()
        .arg(dir.path().join("nope.sb3"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Input file not found"), "{}", stderr);
}
