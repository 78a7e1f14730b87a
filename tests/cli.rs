//! End-to-end tests of the letterbox binary

use std::fs::File;
use std::path::Path;
use std::time::{Duration, SystemTime};

use assert_cmd::Command;
use image::{GenericImageView, Rgb, RgbImage};
use predicates::prelude::*;
use tempfile::TempDir;

fn letterbox(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("letterbox").unwrap();
    cmd.current_dir(dir);
    cmd
}

fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32) {
    RgbImage::from_pixel(width, height, Rgb([40, 140, 220]))
        .save(dir.join(name))
        .unwrap();
}

fn age(path: &Path, by: Duration) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() - by)
        .unwrap();
}

fn output_count(dir: &Path) -> usize {
    std::fs::read_dir(dir.join("processed")).unwrap().count()
}

#[test]
fn processes_explicit_images_then_skips_on_rerun() {
    let dir = TempDir::new().unwrap();
    write_jpeg(dir.path(), "a.jpg", 160, 40);
    write_jpeg(dir.path(), "b.jpg", 64, 64);

    letterbox(dir.path())
        .args(["--concurrency", "1", "--aspect", "16:9", "a.jpg", "b.jpg"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Processed 2 images"));

    assert_eq!(output_count(dir.path()), 2);
    let a = image::open(dir.path().join("processed/a.jpg")).unwrap();
    assert_eq!(a.dimensions(), (160, 90));
    let b = image::open(dir.path().join("processed/b.jpg")).unwrap();
    assert_eq!(b.dimensions(), (64, 36));

    age(&dir.path().join("a.jpg"), Duration::from_secs(60));
    age(&dir.path().join("b.jpg"), Duration::from_secs(60));

    letterbox(dir.path())
        .args(["--concurrency", "1", "a.jpg", "b.jpg"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Processed 0 images"));

    letterbox(dir.path())
        .args(["--force", "a.jpg", "b.jpg"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Processed 2 images"));
}

#[test]
fn scans_current_directory_for_jpegs() {
    let dir = TempDir::new().unwrap();
    write_jpeg(dir.path(), "one.jpg", 32, 16);
    write_jpeg(dir.path(), "two.JPEG", 32, 16);
    RgbImage::new(8, 8).save(dir.path().join("three.png")).unwrap();

    letterbox(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Processed 2 images"));

    assert!(dir.path().join("processed/one.jpg").is_file());
    assert!(dir.path().join("processed/two.JPEG").is_file());
    assert!(!dir.path().join("processed/three.png").exists());
}

#[test]
fn white_flag_paints_white_bars() {
    let dir = TempDir::new().unwrap();
    write_jpeg(dir.path(), "a.jpg", 100, 20);

    letterbox(dir.path())
        .args(["--white", "--output", "out", "a.jpg"])
        .assert()
        .success();

    let out = image::open(dir.path().join("out/a.jpg")).unwrap().to_rgb8();
    let corner = out.get_pixel(1, 1).0;
    assert!(corner.iter().all(|&c| c > 235), "expected white bar, got {corner:?}");
}

#[test]
fn rejects_bad_aspect_before_processing() {
    let dir = TempDir::new().unwrap();
    write_jpeg(dir.path(), "a.jpg", 32, 16);

    letterbox(dir.path())
        .args(["--aspect", "16x9", "a.jpg"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Setup error"))
        .stderr(predicate::str::contains("expected A:B such as 16:9"));

    assert!(!dir.path().join("processed/a.jpg").exists());
}

#[test]
fn corrupt_image_fails_the_run() {
    let dir = TempDir::new().unwrap();
    write_jpeg(dir.path(), "good.jpg", 32, 16);
    std::fs::write(dir.path().join("bad.jpg"), b"not really a jpeg").unwrap();

    letterbox(dir.path())
        .args(["--concurrency", "1", "bad.jpg", "good.jpg"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bad.jpg is not a readable image"));
}

#[test]
fn json_summary_and_config_file() {
    let dir = TempDir::new().unwrap();
    write_jpeg(dir.path(), "a.jpg", 40, 40);
    std::fs::write(
        dir.path().join("letterbox.toml"),
        "output = \"boxed\"\naspect = \"4:3\"\nbackground = \"white\"\n",
    )
    .unwrap();

    let output = letterbox(dir.path())
        .args(["--config", "letterbox.toml", "--json", "a.jpg"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Processed 1 images"));

    // Logs go to stderr, so stdout is nothing but the JSON document
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["processed"], 1);
    assert_eq!(stats["skipped"], 0);

    let boxed = image::open(dir.path().join("boxed/a.jpg")).unwrap();
    assert_eq!(boxed.dimensions(), (40, 30));
}

#[test]
fn dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    write_jpeg(dir.path(), "a.jpg", 32, 16);

    letterbox(dir.path())
        .args(["--dry-run", "a.jpg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 of 1 images would be processed"));

    assert!(!dir.path().join("processed").exists());
}

#[test]
fn write_config_round_trips() {
    let dir = TempDir::new().unwrap();

    letterbox(dir.path())
        .args(["--aspect", "3:2", "--white", "--write-config", "saved.yaml"])
        .assert()
        .success();

    let saved = letterbox::Config::from_file(dir.path().join("saved.yaml")).unwrap();
    assert_eq!(saved.aspect, "3:2");
    assert_eq!(saved.background, letterbox::Background::White);
}
