//! Host-side iSCSI session setup.
//!
//! [`discover_and_login`] runs the host's `iscsiadm` in sendtargets discovery
//! mode against a portal and then logs in to every node record discovered
//! there.  Commands go through a [`ProcessRunner`] so tests can substitute a
//! fake; [`HostRunner`] is the real implementation and wraps the tool with
//! `sudo` when the process is not already root.
//!
//! Environment variables read by [`IscsiadmConfig::from_env`]:
//! - `RKSAN_ISCSIADM`: path of the iscsiadm binary. Defaults to `iscsiadm`.
//! - `RKSAN_ISCSI_SUDO`: set to `0`, `false`, `no` or `off` to run the tool
//!   without `sudo`.  Any other value, or leaving it unset, keeps `sudo`.

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::error::SanError;

const DEFAULT_ISCSIADM: &str = "iscsiadm";
const SUDO: &str = "sudo";

/// Settings for invoking the host iSCSI administration tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IscsiadmConfig {
    /// Binary name or path of `iscsiadm`.
    pub tool: String,
    /// Run the tool through `sudo` when not already root.
    pub use_sudo: bool,
}

impl Default for IscsiadmConfig {
    fn default() -> Self {
        Self {
            tool: DEFAULT_ISCSIADM.to_owned(),
            use_sudo: true,
        }
    }
}

impl IscsiadmConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            tool: lookup("RKSAN_ISCSIADM")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_ISCSIADM.to_owned()),
            use_sudo: lookup("RKSAN_ISCSI_SUDO").is_none_or(|v| !is_disabled(&v)),
        }
    }
}

fn is_disabled(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

// ---------------------------------------------------------------------------
// Process runner
// ---------------------------------------------------------------------------

/// Result of a finished host command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub code: Option<i32>,
    pub success: bool,
    /// stdout followed by stderr.
    pub output: String,
}

/// Runs host commands to completion.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args` and wait for it to exit.
    ///
    /// Returns `Err` only if the process could not be started; an unsuccessful
    /// exit is reported through [`CommandOutput`].
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, SanError>;
}

/// [`ProcessRunner`] that executes commands on the host.
#[derive(Debug, Clone)]
pub struct HostRunner {
    use_sudo: bool,
}

impl HostRunner {
    pub fn new(config: &IscsiadmConfig) -> Self {
        Self {
            use_sudo: config.use_sudo && !nix::unistd::geteuid().is_root(),
        }
    }

    /// The program and arguments actually executed for `program args...`.
    fn argv(&self, program: &str, args: &[&str]) -> (String, Vec<String>) {
        let args = args.iter().map(|a| (*a).to_owned());
        if self.use_sudo {
            (
                SUDO.to_owned(),
                std::iter::once(program.to_owned()).chain(args).collect(),
            )
        } else {
            (program.to_owned(), args.collect())
        }
    }
}

#[async_trait]
impl ProcessRunner for HostRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, SanError> {
        let (program, args) = self.argv(program, args);
        debug!(%program, ?args, "running host command");

        let output = tokio::process::Command::new(&program)
            .args(&args)
            .output()
            .await
            .map_err(|e| SanError::CommandLaunch {
                command: command_line(&program, &args),
                reason: e.to_string(),
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            code: output.status.code(),
            success: output.status.success(),
            output: combined,
        })
    }
}

fn command_line<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(AsRef::as_ref))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a command and turn an unsuccessful exit into [`SanError::CommandFailed`].
async fn run_checked<R: ProcessRunner + ?Sized>(
    runner: &R,
    program: &str,
    args: &[&str],
) -> Result<String, SanError> {
    let out = runner.run(program, args).await?;
    if !out.success {
        return Err(SanError::CommandFailed {
            command: command_line(program, args),
            code: out.code,
            output: out.output.trim().to_owned(),
        });
    }
    Ok(out.output)
}

// ---------------------------------------------------------------------------
// Discovery & login
// ---------------------------------------------------------------------------

/// A target record reported by sendtargets discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredTarget {
    /// `<address>:<port>,<tpgt>` as printed by iscsiadm.
    pub portal: String,
    pub iqn: String,
}

/// Parse `iscsiadm -m discoverydb` output.
///
/// Each record line reads `10.0.0.1:3260,1030 iqn.1992-08.com.netapp:sn.1`;
/// anything else is ignored.
pub fn parse_discovery_output(output: &str) -> Vec<DiscoveredTarget> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let portal = fields.next()?;
            let iqn = fields.next()?;
            (iqn.starts_with("iqn.") || iqn.starts_with("eui.")).then(|| DiscoveredTarget {
                portal: portal.to_owned(),
                iqn: iqn.to_owned(),
            })
        })
        .collect()
}

/// Discover the targets behind `target_ip` and log in to them.
///
/// Runs `<tool> -m discoverydb -t st -p <ip> --discover`, then
/// `<tool> -m node -p <ip> --login`.  A failed discovery stops before login.
/// Neither step is retried and nothing is rolled back: discovery is
/// idempotent on the host, so a later call simply repeats it.
///
/// Requires root, either directly or through a runner that escalates.
#[instrument(skip(runner))]
pub async fn discover_and_login<R: ProcessRunner + ?Sized>(
    runner: &R,
    tool: &str,
    target_ip: &str,
) -> Result<Vec<DiscoveredTarget>, SanError> {
    let output = run_checked(
        runner,
        tool,
        &["-m", "discoverydb", "-t", "st", "-p", target_ip, "--discover"],
    )
    .await?;

    let targets = parse_discovery_output(&output);
    info!(
        portal = target_ip,
        target_iqns = ?targets.iter().map(|t| t.iqn.as_str()).collect::<Vec<_>>(),
        "iSCSI target discovery succeeded",
    );

    run_checked(runner, tool, &["-m", "node", "-p", target_ip, "--login"]).await?;
    info!(portal = target_ip, "iSCSI login succeeded");

    Ok(targets)
}
