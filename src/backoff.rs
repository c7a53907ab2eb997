// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 stable-arena contributors
//
// Pluggable contention backoff.
//
// Generalizes the pause -> yield -> sleep escalation ladder used by the
// spin lock into a composable strategy: busy-spin, yield, progressive
// sleep, and a staged combination of the three.

use std::time::Duration;

/// A backoff strategy used by spin-waiting code (the Segment FIFO's
/// per-bucket locks, dense-locks' spin step, the shared-slab pool's
/// CAS retry loop).
///
/// Call [`Backoff::spin`] once per failed attempt; it advances any internal
/// counter and performs the wait itself.
#[derive(Debug, Clone)]
pub enum Backoff {
    /// Bounded `std::hint::spin_loop` pause, looping forever with no
    /// escalation. Appropriate only for critical sections known to be a
    /// handful of instructions long.
    Busy { pause_iters: u32 },
    /// Cooperative `std::thread::yield_now()` on every attempt.
    Yield,
    /// Truncated exponential sleep starting at `initial` and capped at 7ms.
    Progressive { initial: Duration, attempt: u32 },
    /// Busy-spin for a few attempts, then yield, then progressive sleep —
    /// the default escalation (< 4 busy, < 16 pause, < 32 yield, else sleep).
    Composite { attempt: u32 },
}

const PROGRESSIVE_CAP: Duration = Duration::from_millis(7);

impl Backoff {
    /// The default composite strategy, reset to its first attempt.
    pub fn adaptive() -> Self {
        Backoff::Composite { attempt: 0 }
    }

    /// A fixed-iteration busy spin with no escalation.
    pub fn busy(pause_iters: u32) -> Self {
        Backoff::Busy { pause_iters }
    }

    /// Plain cooperative yielding.
    pub fn yielding() -> Self {
        Backoff::Yield
    }

    /// Progressive sleep starting at `initial_ns` nanoseconds.
    pub fn progressive(initial_ns: u64) -> Self {
        Backoff::Progressive {
            initial: Duration::from_nanos(initial_ns),
            attempt: 0,
        }
    }

    /// Perform one backoff step, escalating internal state where applicable.
    pub fn spin(&mut self) {
        match self {
            Backoff::Busy { pause_iters } => {
                for _ in 0..*pause_iters {
                    std::hint::spin_loop();
                }
            }
            Backoff::Yield => std::thread::yield_now(),
            Backoff::Progressive { initial, attempt } => {
                let factor = 1u32.checked_shl(*attempt).unwrap_or(u32::MAX);
                let wait = (*initial * factor).min(PROGRESSIVE_CAP);
                std::thread::sleep(wait);
                *attempt = attempt.saturating_add(1);
            }
            Backoff::Composite { attempt } => {
                if *attempt < 4 {
                    // busy spin
                } else if *attempt < 16 {
                    std::hint::spin_loop();
                } else if *attempt < 32 {
                    std::thread::yield_now();
                } else {
                    std::thread::sleep(Duration::from_millis(1));
                    return;
                }
                *attempt += 1;
            }
        }
    }

    /// Reset any escalation state back to the first attempt.
    pub fn reset(&mut self) {
        match self {
            Backoff::Progressive { attempt, .. } | Backoff::Composite { attempt } => *attempt = 0,
            _ => {}
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::adaptive()
    }
}
