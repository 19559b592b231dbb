//! Binary-level behaviour of the `pipebind` writer client.

use std::time::{Duration, Instant};

use assert_cmd::Command;
use pipebind::{FieldSlot, Server};
use predicates::prelude::*;

fn pipebind_cmd() -> Command {
    Command::cargo_bin("pipebind").expect("binary built")
}

#[test]
fn help_lists_subcommands() {
    pipebind_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("call"))
        .stdout(predicate::str::contains("set"))
        .stdout(predicate::str::contains("send"));
}

#[test]
fn missing_pipe_is_a_failure() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("no-such.pipe");
    pipebind_cmd()
        .arg("--pipe")
        .arg(&path)
        .args(["send", "app.test=true"])
        .assert()
        .failure();
}

#[test]
fn embedded_double_quote_is_rejected_before_writing() {
    let dir = tempfile::tempdir().expect("temp dir");
    // Composition is validated before the pipe is touched, so no server is
    // needed; the path just has to parse.
    let path = dir.path().join("control.pipe");
    pipebind_cmd()
        .arg("--pipe")
        .arg(&path)
        .args(["set", "greeting", r#"say "hi""#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("double quote"));
}

#[test]
fn set_reaches_a_bound_field_end_to_end() {
    let dir = tempfile::tempdir().expect("temp dir");
    let server = Server::open(dir.path().join("control.pipe")).expect("open server");

    let motd = FieldSlot::new(String::new());
    server.bind_field("app.motd", &motd).expect("bind field");

    pipebind_cmd()
        .arg("--pipe")
        .arg(server.path())
        .args(["set", "app.motd", " hello there "])
        .assert()
        .success();

    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline && motd.get() != " hello there " {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(motd.get(), " hello there ");

    server.close().expect("close server");
}

#[test]
fn call_quotes_whitespace_arguments() {
    let dir = tempfile::tempdir().expect("temp dir");
    let server = Server::open(dir.path().join("control.pipe")).expect("open server");

    let (sender, receiver) = std::sync::mpsc::channel();
    server
        .register_command("test", move |_, args| {
            sender.send(args.to_vec())?;
            Ok(())
        })
        .expect("register command");

    pipebind_cmd()
        .arg("--pipe")
        .arg(server.path())
        .args(["call", "test", "arg", "with space"])
        .assert()
        .success();

    let args = receiver
        .recv_timeout(Duration::from_secs(2))
        .expect("command dispatched");
    assert_eq!(args, vec!["arg".to_owned(), "with space".to_owned()]);

    server.close().expect("close server");
}
