//! Process-wide error-code registry.
//!
//! [`declare`] binds a `(code, message)` pair at a call site and returns
//! the shared identity. Codes are bucketed by a 32-bit fingerprint of the
//! declaring file's directory, each package gets a first-come ordinal, and
//! empty or `@hhhh` local-id codes are expanded into a full
//! `fingerprint + package ordinal + code ordinal` hex form. A code bound
//! to one declaration site must never appear at another; that collision is
//! a programming defect and aborts the process.
//!
//! Registry state lives for the whole process. Concurrent declaration is
//! safe: package entries are created first-writer-wins through the map's
//! entry API, so a lost race only discards a redundant allocation.

use std::panic::Location;
use std::path::{Path, MAIN_SEPARATOR};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::underlying::Underlying;

/// Ordered pre-processing hook applied to every `(code, message)` pair
/// before registration. Extension point for code-generation policies such
/// as a build-time audit pass.
type DeclareFilter = Box<dyn Fn(String, String) -> (String, String) + Send + Sync>;

/// Per-package counters, keyed by directory fingerprint.
struct PackageCounters {
    /// First-come ordinal of this package, starting at 1.
    ordinal: u32,
    /// Highest code ordinal handed out (or pinned) in this package.
    code_seq: u32,
}

struct CodeRegistry {
    package_count: AtomicU32,
    packages: DashMap<u32, PackageCounters>,
    /// code → "file:line" of its one canonical declaration site.
    declared: DashMap<String, String>,
    filters: RwLock<Vec<DeclareFilter>>,
    module_root: RwLock<Option<String>>,
}

static REGISTRY: OnceLock<CodeRegistry> = OnceLock::new();

fn registry() -> &'static CodeRegistry {
    REGISTRY.get_or_init(|| CodeRegistry {
        package_count: AtomicU32::new(0),
        packages: DashMap::new(),
        declared: DashMap::new(),
        filters: RwLock::new(Vec::new()),
        module_root: RwLock::new(std::env::var("CARGO_MANIFEST_DIR").ok()),
    })
}

/// Declares an error identity at the caller's source location.
///
/// - An empty `code` is synthesized from the package fingerprint and a
///   per-package ordinal, with a warning: supply an explicit code.
/// - A local id `@hhhh` (exactly four lowercase hex digits) expands to the
///   full form and raises the package ordinal to at least that value,
///   supporting manually pinned, sparse numbering.
/// - Anything else is used verbatim.
///
/// # Panics
///
/// Panics on a malformed local id, or when the resulting code is already
/// bound to any declaration site (including this one). Both are
/// build-time correctness contracts, not recoverable errors.
#[track_caller]
pub fn declare(code: &str, message: &str) -> Arc<Underlying> {
    let loc = Location::caller();
    registry().declare_at(code, message, loc.file(), loc.line())
}

/// Installs a `(code, message)` pre-processing filter. Filters run in
/// registration order at every [`declare`] call, before code synthesis.
pub fn register_declare_filter(
    filter: impl Fn(String, String) -> (String, String) + Send + Sync + 'static,
) {
    let reg = registry();
    let mut filters = reg.filters.write().unwrap_or_else(|e| e.into_inner());
    filters.push(Box::new(filter));
}

/// Pins the source-path prefix stripped before fingerprinting, so codes
/// stay stable regardless of where the binary was built or installed.
/// Defaults to the runtime `CARGO_MANIFEST_DIR` when present.
pub fn set_module_root(root: impl Into<String>) {
    let reg = registry();
    let mut module_root = reg.module_root.write().unwrap_or_else(|e| e.into_inner());
    *module_root = Some(root.into());
}

impl CodeRegistry {
    fn declare_at(&self, code: &str, message: &str, file: &str, line: u32) -> Arc<Underlying> {
        let (mut code, message) = self.apply_filters(code.to_string(), message.to_string());
        let fingerprint = self.fingerprint(file);

        {
            let mut pkg = self.packages.entry(fingerprint).or_insert_with(|| {
                PackageCounters {
                    ordinal: self.package_count.fetch_add(1, Ordering::Relaxed) + 1,
                    code_seq: 0,
                }
            });
            if code.is_empty() {
                pkg.code_seq += 1;
                code = format!("{:08x}{:04x}{:04x}", fingerprint, pkg.ordinal, pkg.code_seq);
                tracing::warn!(
                    file,
                    line,
                    code = %code,
                    for_message = %message,
                    "empty error code; synthesized a temporary one, supply an explicit code",
                );
            } else if let Some(rest) = code.strip_prefix('@') {
                let local = parse_local_id(rest).unwrap_or_else(|| {
                    panic!("malformed local error code `{code}` at {file}:{line}")
                });
                if pkg.code_seq < local {
                    pkg.code_seq = local;
                }
                code = format!("{:08x}{:04x}{:04x}", fingerprint, pkg.ordinal, local);
            }
        }

        let site = format!("{file}:{line}");
        match self.declared.entry(code.clone()) {
            Entry::Occupied(existing) => {
                panic!(
                    "redeclared error code `{}`\n\tat: {}\n\tat: {}",
                    code,
                    site,
                    existing.get()
                );
            }
            Entry::Vacant(slot) => {
                slot.insert(site);
            }
        }

        Arc::new(Underlying::new(code, message))
    }

    fn apply_filters(&self, code: String, message: String) -> (String, String) {
        let filters = self.filters.read().unwrap_or_else(|e| e.into_inner());
        filters
            .iter()
            .fold((code, message), |(c, m), filter| filter(c, m))
    }

    fn fingerprint(&self, file: &str) -> u32 {
        let root = self.module_root.read().unwrap_or_else(|e| e.into_inner());
        fingerprint_dir(file, root.as_deref())
    }
}

/// 32-bit fingerprint of `file`'s directory, relative to `root` when the
/// directory lives under it.
fn fingerprint_dir(file: &str, root: Option<&str>) -> u32 {
    let dir = Path::new(file)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let relative = match root {
        Some(root) => dir
            .strip_prefix(root)
            .map(|rest| rest.trim_start_matches(MAIN_SEPARATOR))
            .unwrap_or(dir.as_str()),
        None => dir.as_str(),
    };
    let hash = blake3::hash(relative.as_bytes());
    let bytes = hash.as_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Parses a local code id: exactly four lowercase hex digits.
fn parse_local_id(rest: &str) -> Option<u32> {
    if rest.len() != 4 {
        return None;
    }
    if !rest.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
        return None;
    }
    u32::from_str_radix(rest, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    // All declare() calls below share this file's fingerprint, so the
    // synthesized-code assertions live in one test to keep the package
    // ordinal sequence deterministic under parallel test execution.
    #[test]
    fn synthesized_and_local_id_codes() {
        let a = declare("", "first without a code");
        let b = declare("", "second without a code");
        assert_eq!(a.code().len(), 16);
        assert_eq!(b.code().len(), 16);
        // Same package prefix (fingerprint + ordinal), distinct ordinals.
        assert_eq!(a.code()[..12], b.code()[..12]);
        assert!(a.code().ends_with("0001"));
        assert!(b.code().ends_with("0002"));

        // A pinned local id expands with the same prefix and raises the
        // package ordinal past it.
        let c = declare("@00a9", "pinned");
        assert_eq!(c.code()[..12], a.code()[..12]);
        assert!(c.code().ends_with("00a9"));

        let d = declare("", "after the pin");
        assert!(d.code().ends_with("00aa"));
    }

    #[test]
    fn verbatim_codes_pass_through() {
        let u = declare("verbatim-code-01", "kept as given");
        assert_eq!(u.code(), "verbatim-code-01");
        assert_eq!(u.message(), "kept as given");
    }

    #[test]
    #[should_panic(expected = "redeclared error code")]
    fn duplicate_code_from_two_sites_panics() {
        let _a = declare("dup-code-0001", "first site");
        let _b = declare("dup-code-0001", "second site");
    }

    #[test]
    #[should_panic(expected = "redeclared error code")]
    fn redeclaration_from_same_site_panics() {
        // No dedup-by-site exemption: the second pass over the same line
        // must fail too.
        for _ in 0..2 {
            let _ = declare("dup-code-0002", "same site twice");
        }
    }

    #[test]
    #[should_panic(expected = "malformed local error code")]
    fn malformed_local_id_panics() {
        let _ = declare("@12g4", "not hex");
    }

    #[test]
    #[should_panic(expected = "malformed local error code")]
    fn short_local_id_panics() {
        let _ = declare("@1f", "too short");
    }

    #[test]
    fn filters_apply_in_registration_order() {
        // Filters are process-global; these only rewrite their own probe
        // code so concurrent tests stay unaffected.
        register_declare_filter(|code, message| {
            if code == "filter-probe" {
                ("filter-probe-x".to_string(), message)
            } else {
                (code, message)
            }
        });
        register_declare_filter(|code, message| {
            if code == "filter-probe-x" {
                ("filter-probe-xy".to_string(), message)
            } else {
                (code, message)
            }
        });
        let u = declare("filter-probe", "rewritten twice");
        assert_eq!(u.code(), "filter-probe-xy");
    }

    #[test]
    fn fingerprint_relative_to_root() {
        let absolute = fingerprint_dir("/build/job/src/net/dial.rs", Some("/build/job"));
        let relocated = fingerprint_dir("/home/ci/src/net/dial.rs", Some("/home/ci"));
        assert_eq!(absolute, relocated);

        let other_dir = fingerprint_dir("/build/job/src/io/read.rs", Some("/build/job"));
        assert_ne!(absolute, other_dir);
    }

    #[test]
    fn fingerprint_without_root_uses_full_path() {
        let a = fingerprint_dir("/a/src/lib.rs", None);
        let b = fingerprint_dir("/b/src/lib.rs", None);
        assert_ne!(a, b);
    }

    #[test]
    fn local_id_parsing() {
        assert_eq!(parse_local_id("00a1"), Some(0xa1));
        assert_eq!(parse_local_id("ffff"), Some(0xffff));
        assert_eq!(parse_local_id("00A1"), None);
        assert_eq!(parse_local_id("a1"), None);
        assert_eq!(parse_local_id("00a12"), None);
    }
}
