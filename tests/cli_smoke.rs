use std::path::Path;
use std::process::Command;

fn goaster(cwd: &Path, args: &[&str]) -> std::process::Output {
    // `cargo test` sets this for integration tests.
    let bin = env!("CARGO_BIN_EXE_goaster");
    Command::new(bin)
        .args(args)
        .current_dir(cwd)
        .env_remove("GOASTER_LOG")
        .output()
        .expect("spawn goaster")
}

fn write_package(root: &Path) {
    std::fs::write(root.join("go.mod"), "module example.com/cli\n").unwrap();
    std::fs::create_dir_all(root.join("pkg/store")).unwrap();
    std::fs::write(
        root.join("pkg/store/store.go"),
        "package store\n\n// Record is persisted.\ntype Record struct {\n\tUserID int\n\tNote   string `json:\"note\"`\n\tcache  []byte\n}\n\nfunc (r *Record) Valid() bool { return r.UserID > 0 }\n",
    )
    .unwrap();
}

#[test]
fn inspect_lists_declarations_as_json() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path());

    let out = goaster(dir.path(), &["inspect", "./...", "--obj", "Typ", "--json"]);
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(out.status.success(), "inspect failed: {stderr}");

    let value: serde_json::Value = serde_json::from_slice(&out.stdout).expect("stdout is JSON");
    let items = value.as_array().expect("array of declarations");
    assert_eq!(items.len(), 1, "only the Record type: {value}");
    assert_eq!(items[0]["name"], "Record");
    assert_eq!(items[0]["objKind"], "Typ");
    assert_eq!(items[0]["typKind"], "Struct");
    assert_eq!(items[0]["methods"], serde_json::json!(["Valid"]));
}

#[test]
fn unknown_kinds_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path());

    let out = goaster(dir.path(), &["inspect", "pkg/store", "--obj", "Class"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Class"), "got: {stderr}");
}

#[test]
fn tag_write_updates_files() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path());

    let out = goaster(
        dir.path(),
        &["tag", "pkg/store", "--key", "json", "--option", "omitempty", "--write"],
    );
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(out.status.success(), "tag failed: {stderr}");
    assert!(stderr.contains("tagged 1 fields"), "got: {stderr}");

    let text = std::fs::read_to_string(dir.path().join("pkg/store/store.go")).unwrap();
    println!("{text}");
    assert!(text.contains("`json:\"user_id,omitempty\"`"), "got:\n{text}");
    assert!(text.contains("`json:\"note\"`"), "existing tag kept:\n{text}");
    assert!(!text.contains("cache  []byte `"), "unexported fields are skipped:\n{text}");
}

#[test]
fn lookup_prints_the_declaration() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path());

    let out = goaster(dir.path(), &["lookup", "pkg/store", "--name", "Valid"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("func (r *Record) Valid() bool"), "got: {stdout}");

    let out = goaster(dir.path(), &["lookup", "pkg/store", "--name", "Missing"]);
    assert!(!out.status.success());
}
