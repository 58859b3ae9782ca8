use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_the_subcommands() {
    Command::cargo_bin("yt")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("download"))
        .stdout(predicate::str::contains("info"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn download_rejects_a_non_youtube_url_before_spawning_anything() {
    Command::cargo_bin("yt")
        .unwrap()
        .args(["download", "https://example.com/watch?v=abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a YouTube URL"));
}

#[test]
fn info_rejects_a_malformed_url() {
    Command::cargo_bin("yt")
        .unwrap()
        .args(["info", "definitely not a url"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid URL"));
}
