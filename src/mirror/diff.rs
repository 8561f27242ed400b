// src/mirror/diff.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Skip/copy decision for one object. Never looks at object content, only at the
// fingerprint the provider reports.

use crate::object_store::ObjectDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Skip,
    Copy,
}

/// Skip iff the target holds an object whose fingerprint equals the source's
/// byte for byte. `target == None` covers both "not found" and a failed lookup.
pub fn decide(source: &ObjectDescriptor, target: Option<&ObjectDescriptor>) -> Decision {
    match target {
        Some(existing) if existing.fingerprint == source.fingerprint => Decision::Skip,
        _ => Decision::Copy,
    }
}
