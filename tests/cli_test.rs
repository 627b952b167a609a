use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};

fn binary() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_intersection_sim"));
    command.env("RUST_LOG", "warn,intersection_sim=info");
    command
}

/// Test that commands on stdin produce one JSON line each and EOF exits cleanly
#[test]
fn test_interactive_session_over_stdin() {
    let mut child = binary()
        .args(["--seed", "9", "--speed", "1000"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start simulation");

    {
        let stdin = child.stdin.as_mut().expect("stdin not captured");
        stdin
            .write_all(b"\n\n\nget_metrics\nset_speed abc\nset_speed 500\nreset\nget_state\n")
            .expect("Failed to write commands");
    }
    // Closing stdin ends the session
    drop(child.stdin.take());

    let output = child.wait_with_output().expect("Failed to wait for simulation");
    assert!(
        output.status.success(),
        "Simulation exited with failure. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let replies: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("Reply is not JSON"))
        .collect();

    assert_eq!(replies.len(), 5, "stdout: {stdout}");
    assert_eq!(replies[0]["snapshot"]["ticks"], 3);
    assert_eq!(replies[1]["kind"], "parse_error");
    assert_eq!(replies[2]["speed"], 500.0);
    assert_eq!(replies[3]["command"], "reset");
    assert_eq!(replies[4]["time"], 0.0);
    assert_eq!(replies[4]["vehicles"].as_array().map(Vec::len), Some(0));
}

/// Test that headless mode runs to completion and prints the final snapshot
#[test]
fn test_headless_simulation_runs() {
    let output = binary()
        .args(["--headless", "--ticks", "120", "--seed", "1"])
        .output()
        .expect("Failed to execute simulation");

    assert!(
        output.status.success(),
        "Simulation failed to run in headless mode. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("SIMULATION COMPLETE"),
        "Simulation did not complete properly. stderr: {}",
        stderr
    );

    let snapshot: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Final snapshot is not JSON");
    assert_eq!(snapshot["ticks"], 120);
    assert!(snapshot["total_served"].as_u64().unwrap_or(0) > 0);
}

/// Test that an invalid configuration is refused at startup
#[test]
fn test_invalid_configuration_fails_fast() {
    let output = binary()
        .args(["--headless", "--ns-duration", "5"])
        .output()
        .expect("Failed to execute simulation");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Invalid simulation configuration"),
        "stderr: {}",
        stderr
    );
}

/// Test that a speed too slow to pace is refused and the session keeps going
#[test]
fn test_tiny_speed_does_not_stop_the_session() {
    let mut child = binary()
        .args(["--seed", "2", "--speed", "1000"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start simulation");

    {
        let stdin = child.stdin.as_mut().expect("stdin not captured");
        stdin
            .write_all(b"set_speed 1e-300\n\nget_state\n")
            .expect("Failed to write commands");
    }
    drop(child.stdin.take());

    let output = child.wait_with_output().expect("Failed to wait for simulation");
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let replies: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("Reply is not JSON"))
        .collect();
    assert_eq!(replies.len(), 2, "stdout: {stdout}");
    assert_eq!(replies[0]["kind"], "parse_error");
    assert_eq!(replies[1]["time"], 1.0);
}

/// Test that a tiny --speed is a usage error, not a crash
#[test]
fn test_tiny_speed_flag_is_rejected() {
    let output = binary()
        .args(["--headless", "--ticks", "1", "--speed", "1e-30"])
        .output()
        .expect("Failed to execute simulation");

    // clap reports invalid values with exit code 2
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("speed"), "stderr: {}", stderr);
}

/// Test that SIGINT ends an interactive session cleanly while stdin is still open
#[cfg(unix)]
#[test]
fn test_interrupt_exits_cleanly() {
    let mut child = binary()
        .args(["--seed", "4", "--speed", "1000"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start simulation");

    let mut stdin = child.stdin.take().expect("stdin not captured");
    let mut stdout = BufReader::new(child.stdout.take().expect("stdout not captured"));
    let mut stderr = BufReader::new(child.stderr.take().expect("stderr not captured"));

    // Signal handlers are installed before the ready line is logged
    let mut line = String::new();
    loop {
        line.clear();
        let read = stderr.read_line(&mut line).expect("Failed to read stderr");
        assert!(read > 0, "Simulation exited before becoming ready");
        if line.contains("waiting for commands") {
            break;
        }
    }

    stdin
        .write_all(b"\nget_metrics\n")
        .expect("Failed to write commands");
    stdin.flush().expect("Failed to flush commands");
    let mut reply = String::new();
    stdout.read_line(&mut reply).expect("Failed to read reply");
    let metrics: serde_json::Value = serde_json::from_str(&reply).expect("Reply is not JSON");
    assert_eq!(metrics["snapshot"]["ticks"], 1);

    let killed = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .expect("Failed to run kill");
    assert!(killed.success());

    let status = child.wait().expect("Failed to wait for simulation");
    assert_eq!(status.code(), Some(0));

    let mut rest = String::new();
    stdout.read_to_string(&mut rest).expect("Failed to read stdout");
    for line in rest.lines() {
        serde_json::from_str::<serde_json::Value>(line).expect("Partial reply on stdout");
    }
    let mut log = String::new();
    stderr.read_to_string(&mut log).expect("Failed to read stderr");
    assert!(log.contains("Simulation stopped"), "stderr: {}", log);

    // stdin stays open until the process has exited
    drop(stdin);
}
