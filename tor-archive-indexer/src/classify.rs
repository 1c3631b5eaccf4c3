/// Platform bucket for a distributable file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Android,
    Other,
}

const WINDOWS_KEYWORDS: &[&str] = &["win", "windows"];
const MACOS_KEYWORDS: &[&str] = &["mac", "osx", "darwin"];
const LINUX_KEYWORDS: &[&str] = &["linux"];
const ANDROID_KEYWORDS: &[&str] = &["android"];

impl Platform {
    /// Classify a file name by case-insensitive substring match. Buckets
    /// are checked in a fixed precedence order and the first match wins.
    pub fn classify(file_name: &str) -> Self {
        let lower = file_name.to_lowercase();

        if WINDOWS_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            Platform::Windows
        } else if MACOS_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            Platform::MacOs
        } else if LINUX_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            Platform::Linux
        } else if ANDROID_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            Platform::Android
        } else {
            Platform::Other
        }
    }
}

/// Filters applied to every raw directory listing, matched as substring:
/// debug artifacts, sorting query parameters leaked into anchors, hash
/// and signature sidecar files, unrelated tooling and self references.
pub const COMMON_EXCLUDES: &[&str] = &[
    "debug", "Debug", "DEBUG",
    "?C=N;O=D", "?C=M;O=A", "?C=S;O=A", "?C=D;O=A",
    "sha256", "SHA256", "Sha256",
    ".asc", ".ASC", ".Asc",
    ".txt", ".TXT", ".Txt",
    "mar-tools", "geckodriver", "src-",
    "/~sysrqb/builds/", "tmp.mar", "index.html%3fC",
    "index.html", "results", "sandbox-",
    "/tor-package-archive/torbrowser/",
];

/// Additional substrings stripping browser bundles out of the export tier.
pub const EXPORT_EXCLUDES: &[&str] = &["browser", "Browser", "BROWSER"];

/// Export-bundle prefixes stripped from the browser tier. Matched as
/// prefix only so browser files merely mentioning these tokens survive.
pub const BROWSER_EXCLUDE_PREFIXES: &[&str] = &["tor-win32-", "tor-expert-bundle"];

pub fn is_excluded(file_name: &str, rules: &[&str]) -> bool {
    rules.iter().any(|rule| file_name.contains(rule))
}

pub fn has_excluded_prefix(file_name: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| file_name.starts_with(prefix))
}

/// Export-tier verdict: common rules plus browser-named files.
pub fn excluded_from_export(file_name: &str) -> bool {
    is_excluded(file_name, COMMON_EXCLUDES) || is_excluded(file_name, EXPORT_EXCLUDES)
}

/// Browser-tier verdict: export-bundle prefixes only.
pub fn excluded_from_browser(file_name: &str) -> bool {
    has_excluded_prefix(file_name, BROWSER_EXCLUDE_PREFIXES)
}
