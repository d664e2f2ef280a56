use anyhow::{anyhow, Result};
use regex_lite::Regex;

use crate::models::{ConfigSession, ConnectionTarget};
use crate::ssh::Transport;

/// Prefix of every configuration session this tool opens
pub const SESSION_PREFIX: &str = "netauto_cfg_";

/// New unique session name: `netauto_cfg_` plus 8 hex chars of a v4 uuid
pub fn new_session_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", SESSION_PREFIX, &id[..8])
}

/// Drop bare `end` lines; the session wrapper decides when config mode ends
pub fn strip_end_lines(config: &str) -> Vec<String> {
    config
        .lines()
        .filter(|line| !line.trim().eq_ignore_ascii_case("end"))
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.to_string())
        .collect()
}

/// Parse `show configuration sessions`.
///
/// EOS prints a two-line header (column names, then dashes) followed by one
/// row per session. A leading `*` marks the session the querying terminal is in.
pub fn parse_sessions(output: &str) -> Vec<ConfigSession> {
    let separator = Regex::new(r"^\s*-{3,}(\s+-{3,})*\s*$").ok();

    let mut sessions = Vec::new();
    let mut in_table = false;

    for line in output.lines() {
        if separator.as_ref().map_or(false, |re| re.is_match(line)) {
            in_table = true;
            continue;
        }
        if !in_table || line.trim().is_empty() {
            continue;
        }

        let trimmed = line.trim_start();
        let (current, rest) = match trimmed.strip_prefix('*') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let mut fields = rest.split_whitespace();
        let (Some(name), Some(state)) = (fields.next(), fields.next()) else {
            continue;
        };
        let user = fields.next().map(str::to_string);
        let terminal = fields.next().map(str::to_string);
        let remainder: Vec<&str> = fields.collect();

        sessions.push(ConfigSession {
            name: name.to_string(),
            state: state.to_lowercase(),
            user,
            terminal,
            current,
            details: remainder.join(" "),
        });
    }

    sessions
}

/// EosSession drives Arista EOS configuration sessions on one device
pub struct EosSession<'a, T: Transport + ?Sized> {
    transport: &'a T,
    target: &'a ConnectionTarget,
}

impl<'a, T: Transport + ?Sized> EosSession<'a, T> {
    pub fn new(transport: &'a T, target: &'a ConnectionTarget) -> Self {
        Self { transport, target }
    }

    /// Stage `config` into session `name`. With `replace` the session starts
    /// from a clean config so the result replaces the running config.
    pub async fn load_config(&self, name: &str, config: &str, replace: bool) -> Result<()> {
        let mut lines = vec![format!("configure session {}", name)];
        if replace {
            lines.push("rollback clean-config".to_string());
        }
        lines.extend(strip_end_lines(config));
        lines.push("end".to_string());

        tracing::debug!("{}: loading {} lines into session {}", self.target.name, lines.len(), name);
        self.transport.send_interactive(self.target, &lines).await?;
        Ok(())
    }

    pub async fn diff(&self, name: &str) -> Result<String> {
        let command = format!("show session-config named {} diffs", name);
        let output = self.transport.send_command(self.target, &command).await?;
        Ok(output.trim_end().to_string())
    }

    pub async fn commit(&self, name: &str) -> Result<()> {
        let lines = vec![format!("configure session {}", name), "commit".to_string()];
        self.transport.send_interactive(self.target, &lines).await?;
        tracing::debug!("{}: committed session {}", self.target.name, name);
        Ok(())
    }

    pub async fn abort(&self, name: &str) -> Result<()> {
        let lines = vec![format!("configure session {}", name), "abort".to_string()];
        self.transport.send_interactive(self.target, &lines).await?;
        tracing::debug!("{}: aborted session {}", self.target.name, name);
        Ok(())
    }

    pub async fn list_sessions(&self) -> Result<Vec<ConfigSession>> {
        let output = self
            .transport
            .send_command(self.target, "show configuration sessions")
            .await?;
        Ok(parse_sessions(&output))
    }

    /// Abort every pending session on the device; returns how many were aborted
    pub async fn abort_pending(&self) -> Result<usize> {
        let pending: Vec<ConfigSession> = self
            .list_sessions()
            .await?
            .into_iter()
            .filter(|s| s.is_pending())
            .collect();

        for session in &pending {
            self.abort(&session.name)
                .await
                .map_err(|e| anyhow!("Failed to abort session {}: {}", session.name, e))?;
        }
        Ok(pending.len())
    }

    /// Load, diff and abort. Nothing is left behind on the device.
    pub async fn dry_run(&self, config: &str) -> Result<String> {
        let name = new_session_name();
        self.load_config(&name, config, true).await?;

        let diff = self.diff(&name).await;
        let aborted = self.abort(&name).await;

        let diff = diff?;
        aborted?;
        Ok(diff)
    }

    /// Load, diff and commit. On a failed diff or commit the session is
    /// aborted on a best-effort basis.
    pub async fn commit_config(&self, config: &str) -> Result<String> {
        let name = new_session_name();
        self.load_config(&name, config, true).await?;

        let outcome = match self.diff(&name).await {
            Ok(diff) => self.commit(&name).await.map(|_| diff),
            Err(e) => Err(e),
        };

        if outcome.is_err() {
            if let Err(e) = self.abort(&name).await {
                tracing::warn!("{}: cleanup abort of {} failed: {}", self.target.name, name, e);
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const SESSIONS_OUTPUT: &str = "\
Maximum number of completed sessions: 1
Maximum number of pending sessions: 5

   Name                   State         User     Terminal
   ---------------------- ------------- -------- --------
 * netauto_cfg_1a2b3c4d   pending       admin    vty5
   netauto_cfg_deadbeef   completed
   maint                  pending       ops      vty2     Pending for 3 days
";

    #[derive(Default)]
    struct MockTransport {
        sent: Mutex<Vec<String>>,
        sessions_output: String,
        diff_output: String,
        fail_on: Option<String>,
    }

    impl MockTransport {
        fn record(&self, line: &str) -> Result<()> {
            self.sent.lock().unwrap().push(line.to_string());
            match &self.fail_on {
                Some(pattern) if line.starts_with(pattern.as_str()) => Err(anyhow!("% Invalid input")),
                _ => Ok(()),
            }
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Transport for MockTransport {
        async fn send_command(&self, _target: &ConnectionTarget, command: &str) -> Result<String> {
            self.record(command)?;
            if command == "show configuration sessions" {
                Ok(self.sessions_output.clone())
            } else {
                Ok(self.diff_output.clone())
            }
        }

        async fn send_interactive(&self, _target: &ConnectionTarget, lines: &[String]) -> Result<String> {
            for line in lines {
                self.record(line)?;
            }
            Ok(String::new())
        }
    }

    fn target() -> ConnectionTarget {
        ConnectionTarget {
            name: "l1".to_string(),
            address: "10.0.0.1".to_string(),
            port: 22,
            username: "admin".to_string(),
            password: "admin".to_string(),
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_session_name_format() {
        let name = new_session_name();
        assert!(name.starts_with(SESSION_PREFIX));
        let suffix = &name[SESSION_PREFIX.len()..];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(name, new_session_name());
    }

    #[test]
    fn test_strip_end_lines() {
        let lines = strip_end_lines("hostname l1\n!\nend\n  END  \ninterface Ethernet1\n");
        assert_eq!(lines, vec!["hostname l1", "!", "interface Ethernet1"]);
    }

    #[test]
    fn test_parse_sessions() {
        let sessions = parse_sessions(SESSIONS_OUTPUT);
        assert_eq!(sessions.len(), 3);

        assert_eq!(sessions[0].name, "netauto_cfg_1a2b3c4d");
        assert!(sessions[0].current);
        assert!(sessions[0].is_pending());
        assert_eq!(sessions[0].user.as_deref(), Some("admin"));
        assert_eq!(sessions[0].terminal.as_deref(), Some("vty5"));

        assert!(!sessions[1].current);
        assert!(!sessions[1].is_pending());
        assert_eq!(sessions[1].user, None);

        assert_eq!(sessions[2].details, "Pending for 3 days");
    }

    #[test]
    fn test_parse_sessions_empty_table() {
        let output = "   Name    State    User    Terminal\n   ------- -------- ------- --------\n";
        assert!(parse_sessions(output).is_empty());
        assert!(parse_sessions("").is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_ends_with_abort() {
        let transport = MockTransport {
            diff_output: "+hostname l1-new\n-hostname l1\n".to_string(),
            ..Default::default()
        };
        let target = target();
        let session = EosSession::new(&transport, &target);

        let diff = session.dry_run("hostname l1-new\nend\n").await.unwrap();
        assert_eq!(diff, "+hostname l1-new\n-hostname l1");

        let sent = transport.sent();
        let name = sent[0].trim_start_matches("configure session ").to_string();
        assert!(name.starts_with(SESSION_PREFIX));
        assert_eq!(
            sent,
            vec![
                format!("configure session {}", name),
                "rollback clean-config".to_string(),
                "hostname l1-new".to_string(),
                "end".to_string(),
                format!("show session-config named {} diffs", name),
                format!("configure session {}", name),
                "abort".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_commit_config_ends_with_commit() {
        let transport = MockTransport {
            diff_output: "+ntp server 10.0.0.9\n".to_string(),
            ..Default::default()
        };
        let target = target();
        let session = EosSession::new(&transport, &target);

        let diff = session.commit_config("ntp server 10.0.0.9\n").await.unwrap();
        assert_eq!(diff, "+ntp server 10.0.0.9");
        assert_eq!(transport.sent().last().map(String::as_str), Some("commit"));
        assert!(!transport.sent().iter().any(|l| l == "abort"));
    }

    #[tokio::test]
    async fn test_failed_commit_aborts_session() {
        let transport = MockTransport {
            fail_on: Some("commit".to_string()),
            ..Default::default()
        };
        let target = target();
        let session = EosSession::new(&transport, &target);

        assert!(session.commit_config("hostname l1\n").await.is_err());
        assert_eq!(transport.sent().last().map(String::as_str), Some("abort"));
    }

    #[tokio::test]
    async fn test_load_without_replace() {
        let transport = MockTransport::default();
        let target = target();
        let session = EosSession::new(&transport, &target);

        session.load_config("s1", "hostname l1", false).await.unwrap();
        assert_eq!(transport.sent(), vec!["configure session s1", "hostname l1", "end"]);
    }

    #[tokio::test]
    async fn test_abort_pending_only_touches_pending() {
        let transport = MockTransport {
            sessions_output: SESSIONS_OUTPUT.to_string(),
            ..Default::default()
        };
        let target = target();
        let session = EosSession::new(&transport, &target);

        assert_eq!(session.abort_pending().await.unwrap(), 2);
        let sent = transport.sent();
        assert!(sent.contains(&"configure session netauto_cfg_1a2b3c4d".to_string()));
        assert!(sent.contains(&"configure session maint".to_string()));
        assert!(!sent.contains(&"configure session netauto_cfg_deadbeef".to_string()));
    }
}
