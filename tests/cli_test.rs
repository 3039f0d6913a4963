use btxz::format::v1;
use btxz::header::KdfParams;
use std::fs;
use std::process::{Command, Output};
use tempfile::tempdir;

fn btxz(args: &[&str], password: Option<&str>) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_btxz"));
    cmd.args(args).env_remove("BTXZ_PASSWORD");
    if let Some(pw) = password {
        cmd.env("BTXZ_PASSWORD", pw);
    }
    cmd.output().unwrap()
}

#[test]
fn test_cli_create_list_extract() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("docs");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("a.txt"), b"alpha").unwrap();
    let archive = dir.path().join("docs.btxz");
    let out = dir.path().join("out");
    let (archive_s, input_s, out_s) = (
        archive.to_str().unwrap(),
        input.to_str().unwrap(),
        out.to_str().unwrap(),
    );

    let created = btxz(&["create", "-o", archive_s, "-l", "fast", input_s], Some("pw"));
    assert!(created.status.success(), "{}", String::from_utf8_lossy(&created.stderr));

    let listed = btxz(&["list", "--json", archive_s], Some("pw"));
    assert!(listed.status.success());
    let entries: serde_json::Value = serde_json::from_slice(&listed.stdout).unwrap();
    assert_eq!(entries[0]["name"], "a.txt");
    assert_eq!(entries[0]["size"], 5);
    assert_eq!(entries[0]["kind"], "file");

    let extracted = btxz(&["extract", archive_s, "-o", out_s], Some("pw"));
    assert!(extracted.status.success());
    assert_eq!(fs::read(out.join("a.txt")).unwrap(), b"alpha");
}

#[test]
fn test_cli_create_without_password_fails() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("a.txt");
    fs::write(&input, b"a").unwrap();
    let archive = dir.path().join("a.btxz");

    let result = btxz(&["create", "-o", archive.to_str().unwrap(), input.to_str().unwrap()], None);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("password"));
    assert!(!archive.exists());
}

#[test]
fn test_cli_info_needs_no_password() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("a.txt");
    fs::write(&input, b"a").unwrap();
    let archive = dir.path().join("legacy.btxz");
    let kdf = KdfParams { time_cost: 1, memory_kib: 64, parallelism: 1 };
    v1::build(&archive, &[input], "pw", &kdf).unwrap();

    let result = btxz(&["info", archive.to_str().unwrap()], None);
    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("Format version 1"));
    assert!(stdout.contains("Header size    45 B"));
    assert!(stdout.contains("Argon2 memory  64 KiB"));
}
