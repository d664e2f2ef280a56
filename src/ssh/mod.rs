use anyhow::{anyhow, Result};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::models::ConnectionTarget;

/// Transport runs CLI commands on a device. The EOS session driver only
/// needs these two primitives, which keeps it testable without a device.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Run a single exec-mode command and return its output
    async fn send_command(&self, target: &ConnectionTarget, command: &str) -> Result<String>;

    /// Feed lines into an interactive shell (PTY) and return the transcript
    async fn send_interactive(&self, target: &ConnectionTarget, lines: &[String]) -> Result<String>;
}

/// SSH transport backed by libssh2. Every call opens its own session.
#[derive(Debug, Clone, Default)]
pub struct SshTransport;

#[async_trait::async_trait]
impl Transport for SshTransport {
    async fn send_command(&self, target: &ConnectionTarget, command: &str) -> Result<String> {
        let target = target.clone();
        let command = command.to_string();

        tokio::task::spawn_blocking(move || ssh_run_command(&target, &command))
            .await
            .map_err(|e| anyhow!("Task join error: {}", e))?
    }

    async fn send_interactive(&self, target: &ConnectionTarget, lines: &[String]) -> Result<String> {
        let target = target.clone();
        let lines = lines.to_vec();

        tokio::task::spawn_blocking(move || ssh_run_interactive(&target, &lines))
            .await
            .map_err(|e| anyhow!("Task join error: {}", e))?
    }
}

/// Keyboard-interactive prompt handler that always responds with the password
struct PasswordPrompt {
    password: String,
}

impl ssh2::KeyboardInteractivePrompt for PasswordPrompt {
    fn prompt<'a>(
        &mut self,
        _username: &str,
        _instructions: &str,
        prompts: &[ssh2::Prompt<'a>],
    ) -> Vec<String> {
        prompts.iter().map(|_| self.password.clone()).collect()
    }
}

/// libssh2 takes its blocking timeout in milliseconds as a u32
fn timeout_millis(secs: u64) -> u32 {
    u32::try_from(secs.saturating_mul(1000)).unwrap_or(u32::MAX)
}

/// Create an SSH session and authenticate with password + keyboard-interactive.
/// This is blocking, so call from a spawn_blocking context.
pub fn ssh_connect(target: &ConnectionTarget) -> Result<ssh2::Session> {
    let timeout = Duration::from_secs(target.timeout_secs);
    let addr = (target.address.as_str(), target.port)
        .to_socket_addrs()
        .map_err(|e| anyhow!("Invalid address {}:{}: {}", target.address, target.port, e))?
        .next()
        .ok_or_else(|| anyhow!("No address resolved for {}", target.address))?;

    let tcp = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| anyhow!("TCP connection to {} failed: {}", addr, e))?;
    tcp.set_read_timeout(Some(timeout)).ok();
    tcp.set_write_timeout(Some(timeout)).ok();

    let mut session = ssh2::Session::new().map_err(|e| anyhow!("Failed to create SSH session: {}", e))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout_millis(target.timeout_secs));
    session
        .handshake()
        .map_err(|e| anyhow!("SSH handshake with {} failed: {}", target.name, e))?;

    // Try password auth first
    match session.userauth_password(&target.username, &target.password) {
        Ok(_) if session.authenticated() => return Ok(session),
        _ => {}
    }

    // Keyboard-interactive is what EOS offers by default
    let mut prompter = PasswordPrompt {
        password: target.password.clone(),
    };
    let _ = session.userauth_keyboard_interactive(&target.username, &mut prompter);

    if session.authenticated() {
        Ok(session)
    } else {
        Err(anyhow!("SSH authentication to {} failed: all methods exhausted", target.name))
    }
}

/// Connect and run one command on an exec channel. Blocking.
pub fn ssh_run_command(target: &ConnectionTarget, command: &str) -> Result<String> {
    let session = ssh_connect(target)?;

    let mut channel = session
        .channel_session()
        .map_err(|e| anyhow!("Failed to open channel: {}", e))?;
    channel
        .exec(command)
        .map_err(|e| anyhow!("Failed to execute '{}': {}", command, e))?;

    let mut output = String::new();
    channel
        .read_to_string(&mut output)
        .map_err(|e| anyhow!("Failed to read output: {}", e))?;
    channel
        .wait_close()
        .map_err(|e| anyhow!("Failed to close channel: {}", e))?;

    tracing::debug!("{}: '{}' returned {} bytes", target.name, command, output.len());
    Ok(output)
}

/// Connect, request a PTY and feed `lines` into the shell, then exit and
/// collect the whole transcript. Blocking.
pub fn ssh_run_interactive(target: &ConnectionTarget, lines: &[String]) -> Result<String> {
    let session = ssh_connect(target)?;

    let mut channel = session
        .channel_session()
        .map_err(|e| anyhow!("Failed to open channel: {}", e))?;
    channel
        .request_pty("vt100", None, Some((512, 24, 0, 0)))
        .map_err(|e| anyhow!("Failed to request PTY: {}", e))?;
    channel.shell().map_err(|e| anyhow!("Failed to start shell: {}", e))?;

    // Disable paging so long diffs are not cut at a --More-- prompt
    let mut payload = String::from("terminal length 0\n");
    for line in lines {
        payload.push_str(line);
        payload.push('\n');
    }
    payload.push_str("exit\n");

    channel
        .write_all(payload.as_bytes())
        .map_err(|e| anyhow!("Failed to write to shell: {}", e))?;
    channel.send_eof().ok();

    let mut output = String::new();
    channel
        .read_to_string(&mut output)
        .map_err(|e| anyhow!("Failed to read shell output: {}", e))?;
    channel.wait_close().ok();

    tracing::debug!("{}: interactive run of {} lines", target.name, lines.len());
    check_cli_errors(&output)?;
    Ok(output)
}

/// EOS reports rejected input inline with a leading `%`; surface it as an error
fn check_cli_errors(output: &str) -> Result<()> {
    let errors: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("% ") && !l.starts_with("% Warning"))
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("Device rejected input: {}", errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_cli_errors() {
        assert!(check_cli_errors("l1(config-s-x)#interface Ethernet1\nl1(config-s-x)#").is_ok());
        assert!(check_cli_errors("% Warning: something benign").is_ok());

        let err = check_cli_errors("l1(config-s-x)#bogus\n% Invalid input (at token 0: 'bogus')\n").unwrap_err();
        assert!(err.to_string().contains("Invalid input"));
    }

    #[test]
    fn test_connect_rejects_unresolvable_address() {
        let target = ConnectionTarget {
            name: "l1".to_string(),
            address: "not a host name".to_string(),
            port: 22,
            username: "admin".to_string(),
            password: "admin".to_string(),
            timeout_secs: 1,
        };
        assert!(ssh_connect(&target).is_err());
    }

    #[test]
    fn test_timeout_millis_saturates() {
        assert_eq!(timeout_millis(30), 30_000);
        assert_eq!(timeout_millis(5_000_000), u32::MAX);
        assert_eq!(timeout_millis(u64::MAX), u32::MAX);
    }
}
