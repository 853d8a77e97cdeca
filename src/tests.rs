use crate::config::Config;
use crate::error::QqError;
use crate::serve::RemoteHttpServer;
use crate::session::{RemoteSession, CSH_PROMPT_SETUP, PROMPT_SETUP};
use crate::ticket::TicketId;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A config whose "ssh" runs `body` locally instead of connecting anywhere
fn fake_ssh(body: &str) -> (TempDir, Config) {
    let temp_dir = TempDir::new().unwrap();
    let ssh = write_script(temp_dir.path(), "ssh", body);
    let ssh_config = temp_dir.path().join("ssh_config");
    fs::write(&ssh_config, "Host *\n").unwrap();

    let config = Config {
        ssh_config: Some(ssh_config),
        ssh_program: ssh.display().to_string(),
        login_timeout_secs: 10,
        command_timeout_secs: Some(10),
        serve_banner_timeout_secs: 5,
        ..Config::default()
    };
    (temp_dir, config)
}

fn local_shell() -> (TempDir, Config) {
    fake_ssh("exec /bin/sh -i")
}

#[test]
fn test_session_runs_commands() {
    let (_dir, config) = local_shell();
    let mut session = RemoteSession::login(&config, "script01").unwrap();
    assert_eq!(session.host(), "script01");
    assert_eq!(session.execute("echo hello").unwrap(), "hello");
    assert_eq!(session.execute("printf 'a\\nb\\n'").unwrap(), "a\nb");
    session.close().unwrap();
}

#[test]
fn test_session_keeps_shell_state() {
    let (_dir, config) = local_shell();
    let mut session = RemoteSession::login(&config, "script01").unwrap();
    session.execute("cd /").unwrap();
    session.execute("QQ_TEST_VALUE=kept").unwrap();
    assert_eq!(session.execute("pwd").unwrap(), "/");
    assert_eq!(session.execute("echo $QQ_TEST_VALUE").unwrap(), "kept");
    session.close().unwrap();
}

#[test]
fn test_run_reports_exit_status() {
    let (_dir, config) = local_shell();
    let mut session = RemoteSession::login(&config, "script01").unwrap();

    let failed = session.run("false").unwrap();
    assert_eq!(failed.exit_code, Some(1));
    assert_eq!(failed.text, "");

    let listed = session.run("printf 'x\\ny\\n'").unwrap();
    assert!(listed.success());
    assert_eq!(listed.text, "x\ny");
    session.close().unwrap();
}

#[test]
fn test_run_status_after_output_without_newline() {
    let (_dir, config) = local_shell();
    let mut session = RemoteSession::login(&config, "script01").unwrap();

    let partial = session.run("printf partial").unwrap();
    assert_eq!(partial.text, "partial");
    assert_eq!(partial.exit_code, Some(0));

    let failed = session.run("printf oops; false").unwrap();
    assert_eq!(failed.text, "oops");
    assert_eq!(failed.exit_code, Some(1));
    session.close().unwrap();
}

#[test]
fn test_prompt_setup_is_first_input() {
    let temp_dir = TempDir::new().unwrap();
    let log = temp_dir.path().join("input.log");
    let (_dir, config) = fake_ssh(&format!(
        "IFS= read -r first\n\
         printf '%s\\n' \"$first\" > '{log}'\n\
         printf '[QQPROMPT]> '\n\
         IFS= read -r next\n\
         printf '%s\\n' \"$next\" >> '{log}'",
        log = log.display()
    ));

    let session = RemoteSession::login(&config, "script01").unwrap();
    session.close().unwrap();

    let lines: Vec<String> = fs::read_to_string(&log)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(lines, vec![PROMPT_SETUP.to_string(), "exit".to_string()]);
}

#[test]
fn test_login_falls_back_to_csh_prompt() {
    let temp_dir = TempDir::new().unwrap();
    let log = temp_dir.path().join("input.log");
    // Rejects PS1= the way csh does, then hands over to sh once the csh
    // prompt command arrives
    let (_dir, config) = fake_ssh(&format!(
        "IFS= read -r first\n\
         printf 'PS1=[QQPROMPT]> : Command not found.\\nPS2=: Command not found.\\n%% '\n\
         IFS= read -r second\n\
         printf '%s\\n' \"$second\" > '{log}'\n\
         export PS1='[QQPROMPT]> '\n\
         exec /bin/sh -i",
        log = log.display()
    ));

    let mut session = RemoteSession::login(&config, "script01").unwrap();
    assert_eq!(session.execute("echo hello").unwrap(), "hello");
    session.close().unwrap();

    assert_eq!(
        fs::read_to_string(&log).unwrap().trim_end(),
        CSH_PROMPT_SETUP
    );
}

#[test]
fn test_login_permission_denied() {
    let (_dir, config) = fake_ssh(
        "printf 'user@script01: Permission denied (publickey).\\r\\n' >&2\nsleep 1\nexit 255",
    );
    match RemoteSession::login(&config, "script01") {
        Err(QqError::AuthenticationFailed { host, reason }) => {
            assert_eq!(host, "script01");
            assert!(reason.contains("Permission denied"));
        }
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("login should fail"),
    }
}

#[test]
fn test_login_ssh_exits_early() {
    let (_dir, config) = fake_ssh("exit 255");
    assert!(matches!(
        RemoteSession::login(&config, "script01"),
        Err(QqError::LoginFailed { .. })
    ));
}

#[test]
fn test_login_timeout() {
    let (_dir, mut config) = fake_ssh("sleep 30");
    config.login_timeout_secs = 1;
    assert!(matches!(
        RemoteSession::login(&config, "script01"),
        Err(QqError::Timeout(_))
    ));
}

#[test]
fn test_login_rejects_option_like_host() {
    let (_dir, config) = local_shell();
    assert!(matches!(
        RemoteSession::login(&config, "-oProxyCommand=id"),
        Err(QqError::Config(_))
    ));
}

#[test]
fn test_serve_reports_port_and_stops() {
    let (dir, mut config) = local_shell();
    let python = write_script(
        dir.path(),
        "python",
        "echo 'Serving HTTP on 0.0.0.0 port 53213 (http://0.0.0.0:53213/) ...'\nexec sleep 600",
    );
    config.python_program = python.display().to_string();
    let ticket = TicketId::new("SR12345").unwrap();

    let mut session = RemoteSession::login(&config, "script01").unwrap();
    {
        let mut server =
            RemoteHttpServer::start(&mut session, &config, &ticket, "10.0.0.5".to_string())
                .unwrap();
        assert_eq!(server.port(), 53213);
        assert_eq!(server.url(), "http://10.0.0.5:53213");

        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let raiser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(500));
            flag.store(true, Ordering::SeqCst);
        });
        server.serve_until(&stop).unwrap();
        raiser.join().unwrap();

        server.stop().unwrap();
    }

    // The shell is back at its prompt once the server is gone
    assert_eq!(session.execute("echo after").unwrap(), "after");
    session.close().unwrap();
}

#[test]
fn test_serve_dropped_server_is_stopped() {
    let (dir, mut config) = local_shell();
    let python = write_script(
        dir.path(),
        "python",
        "echo 'Serving HTTP on 0.0.0.0 port 8000 (http://0.0.0.0:8000/) ...'\nexec sleep 600",
    );
    config.python_program = python.display().to_string();
    let ticket = TicketId::new("SR1").unwrap();

    let mut session = RemoteSession::login(&config, "script01").unwrap();
    let server =
        RemoteHttpServer::start(&mut session, &config, &ticket, "10.0.0.5".to_string()).unwrap();
    drop(server);

    assert_eq!(session.execute("echo still-here").unwrap(), "still-here");
    session.close().unwrap();
}

#[test]
fn test_serve_notices_server_exit() {
    let (dir, mut config) = local_shell();
    let python = write_script(
        dir.path(),
        "python",
        "echo 'Serving HTTP on 0.0.0.0 port 8000 (http://0.0.0.0:8000/) ...'\n\
         sleep 1\n\
         echo 'OSError: [Errno 28] No space left on device'\n\
         exit 1",
    );
    config.python_program = python.display().to_string();
    let ticket = TicketId::new("SR12345").unwrap();

    let mut session = RemoteSession::login(&config, "script01").unwrap();
    {
        let mut server =
            RemoteHttpServer::start(&mut session, &config, &ticket, "10.0.0.5".to_string())
                .unwrap();

        let stop = AtomicBool::new(false);
        let start = Instant::now();
        match server.serve_until(&stop) {
            Err(QqError::ServerExited(output)) => {
                assert!(output.contains("No space left on device"), "{}", output)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(start.elapsed() < Duration::from_secs(5));
        server.stop().unwrap();
    }

    assert_eq!(session.execute("echo after").unwrap(), "after");
    session.close().unwrap();
}

#[test]
fn test_serve_server_exits_immediately() {
    let (dir, mut config) = local_shell();
    let python = write_script(dir.path(), "python", "echo 'No module named http' >&2\nexit 1");
    config.python_program = python.display().to_string();
    let ticket = TicketId::new("SR12345").unwrap();

    let mut session = RemoteSession::login(&config, "script01").unwrap();
    match RemoteHttpServer::start(&mut session, &config, &ticket, "10.0.0.5".to_string()) {
        Err(QqError::ServerStartFailed(output)) => assert!(output.contains("No module named")),
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("server should not start"),
    }
    session.close().unwrap();
}

#[test]
fn test_serve_banner_timeout() {
    let (dir, mut config) = local_shell();
    let python = write_script(dir.path(), "python", "exec sleep 600");
    config.python_program = python.display().to_string();
    config.serve_banner_timeout_secs = 1;
    let ticket = TicketId::new("SR12345").unwrap();

    let mut session = RemoteSession::login(&config, "script01").unwrap();
    match RemoteHttpServer::start(&mut session, &config, &ticket, "10.0.0.5".to_string()) {
        Err(QqError::BannerTimeout(timeout)) => assert_eq!(timeout, Duration::from_secs(1)),
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("server should not start"),
    }

    // The silent process was interrupted and the shell is usable again
    assert_eq!(session.execute("echo ok").unwrap(), "ok");
    session.close().unwrap();
}
