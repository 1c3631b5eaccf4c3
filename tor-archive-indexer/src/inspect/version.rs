use crate::error::IndexerError;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

/// The phrase the daemon prints when asked for its version.
static EXECUTION_OUTPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Tor version ([\d.]+)").unwrap());

/// Byte-scan candidates, tried in order: the labeled phrase, a version
/// embedded in a file-name-like token, a quoted assignment.
static SCAN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)Tor version ([\d.]+)").unwrap(),
        Regex::new(r"(?i)tor-([\d.]+)").unwrap(),
        Regex::new(r#"(?i)VERSION\s*=\s*"([\d.]+)""#).unwrap(),
    ]
});

/// A daemon version carries exactly four numeric components.
static STRICT_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+\.\d+$").unwrap());

const EXECUTION_TIMEOUT: Duration = Duration::from_secs(10);

/// One way of getting a version out of an opaque binary. Strategies are
/// evaluated in order until one yields a value.
#[async_trait::async_trait]
trait VersionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn try_match(&self, binary: &Path) -> Option<String>;
}

/// Determine the embedded daemon version: native execution where the
/// host can run the binary, otherwise a scan of the raw bytes.
pub async fn determine_version(binary: &Path) -> Option<String> {
    let strategies: &[&dyn VersionStrategy] = &[&NativeExecution, &ByteScan];

    for strategy in strategies {
        tracing::debug!("Trying version strategy '{}'", strategy.name());

        if let Some(version) = strategy.try_match(binary).await {
            return Some(version);
        }
    }

    tracing::warn!("No strategy yielded a version for {}", binary.display());

    None
}

/// Runs the binary with `--version` when the host can execute it.
struct NativeExecution;

#[async_trait::async_trait]
impl VersionStrategy for NativeExecution {
    fn name(&self) -> &'static str {
        "native execution"
    }

    async fn try_match(&self, binary: &Path) -> Option<String> {
        if !can_execute(binary, std::env::consts::OS) {
            tracing::debug!(
                "Host cannot execute {}, skipping native execution",
                binary.display()
            );
            return None;
        }

        if let Err(err) = make_executable(binary).await {
            tracing::warn!("Failed to mark {} executable: {}", binary.display(), err);
            return None;
        }

        for env_override in execution_environments(binary) {
            match run_version_command(binary, env_override.as_ref()).await {
                Ok(output) => {
                    if let Some(capture) = EXECUTION_OUTPUT.captures(&output) {
                        let version = capture[1].to_owned();
                        tracing::info!("Extracted version by execution: {}", version);
                        return Some(version);
                    }

                    tracing::warn!("Could not parse a version from the execution output");
                }
                Err(err) => {
                    tracing::warn!("Execution attempt failed: {}", err);
                }
            }
        }

        None
    }
}

/// A binary is natively executable only when the host platform token
/// appears in its path. Android and ARM builds can never run on the
/// batch host, whatever it is.
fn can_execute(binary: &Path, host_os: &str) -> bool {
    let path = binary.to_string_lossy().to_lowercase();

    if path.contains("android") || path.contains("arm") {
        return false;
    }

    match host_os {
        "linux" => path.contains("linux"),
        "windows" => path.contains("windows"),
        "macos" => path.contains("macos"),
        _ => false,
    }
}

/// Attempt order on linux: first with LD_LIBRARY_PATH pointing at the
/// bundle's own directory (shared libraries ship next to the binary),
/// then without. Elsewhere a single plain attempt.
fn execution_environments(binary: &Path) -> Vec<Option<(String, String)>> {
    let mut attempts = Vec::new();

    if std::env::consts::OS == "linux" {
        if let Some(lib_dir) = binary.parent() {
            attempts.push(Some((
                "LD_LIBRARY_PATH".to_owned(),
                lib_dir.to_string_lossy().into_owned(),
            )));
        }
    }

    attempts.push(None);

    attempts
}

#[cfg(unix)]
async fn make_executable(binary: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt as _;

    tokio::fs::set_permissions(binary, std::fs::Permissions::from_mode(0o755)).await
}

// Windows has no executable bit.
#[cfg(not(unix))]
async fn make_executable(_binary: &Path) -> std::io::Result<()> {
    Ok(())
}

async fn run_version_command(
    binary: &Path,
    env_override: Option<&(String, String)>,
) -> Result<String, IndexerError> {
    let mut command = tokio::process::Command::new(binary);
    command
        .arg("--version")
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);

    if let Some((key, value)) = env_override {
        tracing::info!("Running {} --version (with {})", binary.display(), key);
        command.env(key, value);
    } else {
        tracing::info!("Running {} --version", binary.display());
    }

    let output = tokio::time::timeout(EXECUTION_TIMEOUT, command.output())
        .await
        .map_err(|_| IndexerError::Timeout(EXECUTION_TIMEOUT))??;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    Ok(text)
}

/// Scans the raw bytes of the binary for an embedded version string.
struct ByteScan;

#[async_trait::async_trait]
impl VersionStrategy for ByteScan {
    fn name(&self) -> &'static str {
        "byte scan"
    }

    async fn try_match(&self, binary: &Path) -> Option<String> {
        let bytes = match tokio::fs::read(binary).await {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!("Failed to read {}: {}", binary.display(), err);
                return None;
            }
        };

        scan_bytes_for_version(&bytes)
    }
}

/// Search a byte buffer for a version string. Bytes are decoded as
/// latin-1, which never fails, so arbitrary binary noise around the
/// version text is harmless. The first capture that survives the strict
/// four-component check wins.
pub fn scan_bytes_for_version(bytes: &[u8]) -> Option<String> {
    let text: String = bytes.iter().map(|&b| b as char).collect();

    for pattern in SCAN_PATTERNS.iter() {
        if let Some(capture) = pattern.captures(&text) {
            let version = &capture[1];

            if STRICT_VERSION.is_match(version) {
                tracing::info!("Extracted version from binary strings: {}", version);
                return Some(version.to_owned());
            }
        }
    }

    None
}
