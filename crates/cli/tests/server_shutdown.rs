#![cfg(unix)]

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const BOUNDARY: &str = "recall-shutdown-boundary";

fn spawn_server(snapshot_dir: &std::path::Path) -> (Child, String) {
    let mut child = Command::new(assert_cmd::cargo::cargo_bin!("recall"))
        .args(["--quiet", "--upstream", "stub", "--embedding-dim", "16"])
        .arg("--snapshot-dir")
        .arg(snapshot_dir)
        .args(["serve-http", "--bind", "127.0.0.1:0"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let stdout = child.stdout.take().unwrap();
    let mut lines = BufReader::new(stdout).lines();
    let base_url = loop {
        let line = lines.next().expect("server exited before listening").unwrap();
        if let Some(url) = line.strip_prefix("Serving image index API: ") {
            break url.trim().to_string();
        }
    };
    // Keep draining so later banner lines never block the server.
    std::thread::spawn(move || for _ in lines {});
    (child, base_url)
}

fn wait_for_exit(child: &mut Child, limit: Duration) -> std::process::ExitStatus {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if started.elapsed() > limit {
            child.kill().ok();
            panic!("server did not exit within {limit:?} of SIGTERM");
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

#[tokio::test]
async fn sigterm_saves_index_before_exit() {
    let tmp = TempDir::new().unwrap();
    let snapshot = tmp.path().join("index");
    let (mut child, base_url) = spawn_server(&snapshot);

    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"file\"; filename=\"4_curry.jpg\"\r\n\r\n",
    );
    body.extend_from_slice(b"\xFF\xD8\xFFcurry");
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base_url}/add-image"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    drop(client);
    assert!(!snapshot.join("vectors.bin").exists());

    let killed = Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(killed.success());

    let status = wait_for_exit(&mut child, Duration::from_secs(10));
    assert!(status.success(), "server exited with {status}");
    assert!(snapshot.join("vectors.bin").exists());
    assert!(snapshot.join("metadata.json").exists());
}
