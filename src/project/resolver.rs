//! Manager resolver.
//!
//! Reduces a set of signals to exactly one owner. Precedence is data: the
//! [`PRECEDENCE`] table is walked top to bottom and the first manager whose
//! predicate holds wins, no matter which kind of marker produced the signal.

use super::{ManagerKind, Signal};

/// Predicate deciding whether a manager is present in the signal set.
pub type OwnerPredicate = fn(&[Signal]) -> bool;

/// Owner precedence, strongest first.
///
/// Lock files and explicit manifest tables outrank the bare
/// `.python-version` pin, which only ever yields uv or Rye.
pub const PRECEDENCE: &[(ManagerKind, OwnerPredicate)] = &[
    (ManagerKind::Poetry, |s| has_kind(s, ManagerKind::Poetry)),
    (ManagerKind::Uv, |s| has_kind(s, ManagerKind::Uv)),
    (ManagerKind::Rye, |s| has_kind(s, ManagerKind::Rye)),
    (ManagerKind::Pdm, |s| has_kind(s, ManagerKind::Pdm)),
    (ManagerKind::Hatch, |s| has_kind(s, ManagerKind::Hatch)),
    (ManagerKind::Pixi, |s| has_kind(s, ManagerKind::Pixi)),
    (ManagerKind::CondaOrMamba, |s| {
        has_kind(s, ManagerKind::CondaOrMamba)
    }),
];

fn has_kind(signals: &[Signal], kind: ManagerKind) -> bool {
    signals.iter().any(|signal| signal.kind == kind)
}

/// Resolve the single owning manager, or [`ManagerKind::None`] when there
/// is no evidence at all.
#[must_use]
pub fn resolve_owner(signals: &[Signal]) -> ManagerKind {
    if signals.is_empty() {
        return ManagerKind::None;
    }
    PRECEDENCE
        .iter()
        .find(|(_, present)| present(signals))
        .map_or(ManagerKind::None, |(kind, _)| *kind)
}
