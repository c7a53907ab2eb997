// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 stable-arena contributors
//
// Error kinds for the pool and stable-cell subsystems.
//
// One flat enum, manual `Display`, no external error-derive crate — the
// same unadorned style used throughout this codebase's own error types.

use std::fmt;

/// Errors surfaced by the allocation-pool and stable-cell subsystems.
///
/// Variants are either recovered locally (allocator fallback, task-level
/// fallback to a fresh confined scope) or propagated unchanged to the
/// caller — see module docs on the individual operations for which applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The slicing allocator could not satisfy a request against its slab.
    OutOfCapacity,
    /// Negative size, non-power-of-two alignment, size not a multiple of
    /// alignment, or a `null`/absent key where one is required.
    InvalidInput(&'static str),
    /// Operation invoked from a thread or task other than the scope's owner.
    WrongThread,
    /// Operation attempted on a scope that has already been closed.
    InvalidScope,
    /// `close()` called on a stacked-pool frame that is not the current top.
    OutOfSequence,
    /// `or_else_throw` invoked on a stable cell that is still `UNSET`.
    Unset,
    /// A memoized computation previously failed; only the failing
    /// computation's type name is retained, never its payload.
    Previous(&'static str),
    /// A supplier re-entered `compute_if_unset` on the same cell.
    Recursive,
    /// A memoized keyed function was queried with a key outside its
    /// declared key set.
    NotFound,
    /// Two equal keys were supplied while constructing a memoized function.
    DuplicateKey,
    /// A mutating operation invoked on a stable list or map, neither of
    /// which support anything beyond memoized reads over a fixed domain.
    Unsupported(&'static str),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::OutOfCapacity => write!(f, "allocator exhausted its backing slab"),
            CoreError::InvalidInput(why) => write!(f, "invalid input: {why}"),
            CoreError::WrongThread => write!(f, "scope accessed from a non-owning thread or task"),
            CoreError::InvalidScope => write!(f, "operation on a closed scope"),
            CoreError::OutOfSequence => write!(f, "close() called on a non-top stacked frame"),
            CoreError::Unset => write!(f, "stable cell is unset"),
            CoreError::Previous(class) => write!(f, "previous computation failed: {class}"),
            CoreError::Recursive => write!(f, "supplier re-entered its own stable cell"),
            CoreError::NotFound => write!(f, "key not present in the declared key set"),
            CoreError::DuplicateKey => write!(f, "duplicate key during memoized-function construction"),
            CoreError::Unsupported(op) => write!(f, "unsupported operation: {op}"),
        }
    }
}

impl CoreError {
    /// The variant's name, with any payload stripped — used when a memoized
    /// computation's failure must be remembered forever without retaining
    /// whatever the original error carried.
    pub fn class_name(&self) -> &'static str {
        match self {
            CoreError::OutOfCapacity => "OutOfCapacity",
            CoreError::InvalidInput(_) => "InvalidInput",
            CoreError::WrongThread => "WrongThread",
            CoreError::InvalidScope => "InvalidScope",
            CoreError::OutOfSequence => "OutOfSequence",
            CoreError::Unset => "Unset",
            CoreError::Previous(_) => "Previous",
            CoreError::Recursive => "Recursive",
            CoreError::NotFound => "NotFound",
            CoreError::DuplicateKey => "DuplicateKey",
            CoreError::Unsupported(_) => "Unsupported",
        }
    }
}

impl std::error::Error for CoreError {}

/// Result alias used throughout this crate, mirroring `std::io::Result`.
pub type CoreResult<T> = Result<T, CoreError>;
