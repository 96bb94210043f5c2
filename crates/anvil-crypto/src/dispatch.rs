//! Feature-detected hash dispatch.
//!
//! The `blake3` crate already does its own CPU-feature detection (AVX2,
//! SSE4.1, NEON, or a portable scalar path) internally and picks the best
//! available implementation the first time it's asked to hash anything —
//! reimplementing that dispatch by hand here would mean hand-rolling 8-way
//! SIMD compression inside a build orchestrator, which is exactly the kind
//! of invented-not-grounded code this crate avoids. What this module adds
//! on top is the one thing the spec asks for that `blake3` doesn't expose
//! as public API: a process-wide, set-once-at-startup record of *which*
//! path is active, so the driver can report it and so the
//! `ANVIL_DISABLE_SIMD` environment variable (§6) has somewhere to land.
//!
//! BLAKE3 guarantees bit-identical digests from every one of its internal
//! implementations, so `ANVIL_DISABLE_SIMD` is purely a performance/compliance
//! knob and never a correctness one. The catch: `blake3`'s SIMD-vs-portable
//! choice is a single process-wide function pointer selected the first time
//! it's used, and the crate exposes no runtime call to override it — the
//! only lever is the `pure` Cargo feature, which compiles the portable path
//! in as the *only* path and is therefore a build-time decision, not
//! something a binary can flip per-process from an environment variable.
//! This crate exposes that lever as its own `portable-only` feature. When it
//! isn't compiled in, `ANVIL_DISABLE_SIMD=1` can't actually force the
//! portable path, so `active()` says so via `tracing::warn!` instead of
//! silently reporting a dispatch that isn't real.

use std::sync::OnceLock;

/// Which hashing implementation is active for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Portable scalar compression, forced via `ANVIL_DISABLE_SIMD=1`.
    Portable,
    /// The best SIMD path the current CPU supports (AVX2/SSE4.1 on x86,
    /// NEON on aarch64), as selected by `blake3`'s own runtime detection.
    Simd,
}

static DISPATCH: OnceLock<Dispatch> = OnceLock::new();

/// Read `ANVIL_DISABLE_SIMD` and record the active dispatch. Idempotent:
/// the first call wins, matching the "process-global mutable state limited
/// to the SIMD dispatch function pointer" design note (§5/§9).
fn active() -> Dispatch {
    *DISPATCH.get_or_init(|| {
        let requested = std::env::var("ANVIL_DISABLE_SIMD")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if cfg!(feature = "portable-only") {
            // Compiled with `blake3/pure`: every hash call in this process
            // already runs the portable path regardless of the env var, so
            // report it honestly either way.
            return Dispatch::Portable;
        }

        if requested {
            tracing::warn!(
                "ANVIL_DISABLE_SIMD=1 was set, but this binary was not built \
                 with anvil-crypto's `portable-only` feature; blake3's SIMD \
                 dispatch cannot be overridden at runtime, so the SIMD path \
                 remains active"
            );
        }
        Dispatch::Simd
    })
}

/// Which dispatch path this process initialized to.
#[must_use]
pub fn current_dispatch() -> Dispatch {
    active()
}

/// Hash `bytes` with BLAKE3. Content-only: no domain prefix.
#[must_use]
pub fn hash(bytes: &[u8]) -> crate::Digest {
    let _ = active(); // ensure dispatch is initialized before first use
    *blake3::hash(bytes).as_bytes()
}

/// Hash `bytes` in BLAKE3's keyed mode with `key`.
#[must_use]
pub fn keyed_hash(key: &[u8; 32], bytes: &[u8]) -> crate::Digest {
    let _ = active();
    *blake3::keyed_hash(key, bytes).as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash(b"anvil"), hash(b"anvil"));
        assert_ne!(hash(b"anvil"), hash(b"forge"));
    }

    #[test]
    fn keyed_hash_depends_on_key() {
        let k1 = [1u8; 32];
        let k2 = [2u8; 32];
        assert_ne!(keyed_hash(&k1, b"data"), keyed_hash(&k2, b"data"));
    }

    #[cfg(feature = "portable-only")]
    #[test]
    fn portable_only_feature_always_reports_portable() {
        assert_eq!(current_dispatch(), Dispatch::Portable);
    }
}
