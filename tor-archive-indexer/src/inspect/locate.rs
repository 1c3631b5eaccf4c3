use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Relative paths the daemon usually lives at inside an extracted bundle.
const CANDIDATE_PATHS: &[&str] = &[
    "tor/tor",
    "tor/tor.exe",
    "tor/libtor.so",
    "tor.real",
    "Tor/tor",
];

/// File names accepted by the recursive fallback scan.
const CANDIDATE_NAMES: &[&str] = &["tor", "tor.exe", "libtor.so", "tor.real"];

const DIAGNOSTIC_LIMIT: usize = 20;

/// Locate the daemon executable inside an extracted bundle: the fixed
/// candidate paths first, then a full recursive scan for known names or
/// a tor-named shared object.
pub fn find_daemon_binary(extract_dir: &Path) -> Option<PathBuf> {
    for candidate in CANDIDATE_PATHS {
        let path = extract_dir.join(candidate);
        if path.is_file() {
            return Some(path);
        }
    }

    tracing::debug!("No candidate path matched, scanning {}", extract_dir.display());

    for entry in WalkDir::new(extract_dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        let name = name.to_lowercase();

        if CANDIDATE_NAMES.contains(&name.as_str())
            || (name.ends_with(".so") && name.contains("tor"))
        {
            return Some(entry.into_path());
        }
    }

    log_extracted_files(extract_dir);

    None
}

/// Operator aid when nothing matched: show what the archive contained.
fn log_extracted_files(extract_dir: &Path) {
    tracing::warn!("No daemon binary found, listing extracted files:");

    let mut total = 0;
    for entry in WalkDir::new(extract_dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }

        total += 1;
        if total <= DIAGNOSTIC_LIMIT {
            let shown = entry.path().strip_prefix(extract_dir).unwrap_or(entry.path());
            tracing::warn!("  - {}", shown.display());
        }
    }

    if total > DIAGNOSTIC_LIMIT {
        tracing::warn!("  ... and {} more files", total - DIAGNOSTIC_LIMIT);
    }
}
