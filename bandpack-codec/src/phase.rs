//! Band phases
//!
//! Writers move `NoPhase -> Collect [-> Frozen] -> Write -> Done`, readers
//! move `NoPhase -> Expect -> Read -> Disburse -> Done`. Read-side phases are
//! even, write-side phases odd, so the two paths never mix.

use serde::Serialize;
use std::fmt;

/// Position of a band in its collect/write or expect/read/disburse cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(u8)]
pub enum Phase {
    /// Not yet initialized.
    NoPhase = 0,
    /// Writer: accepting values.
    Collect = 1,
    /// Reader: accepting expected lengths.
    Expect = 2,
    /// Writer: retired without data.
    Frozen = 3,
    /// Reader: decoding bytes.
    Read = 4,
    /// Writer: emitting bytes.
    Write = 5,
    /// Reader: paying out decoded values.
    Disburse = 6,
    /// Finished on either side.
    Done = 8,
}

impl Phase {
    /// Numeric phase code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// True for phases on the read path (and the shared endpoints).
    pub fn is_read(self) -> bool {
        self.code() % 2 == 0
    }

    /// True if values may be added or decoded in this phase.
    pub fn can_change_length(self) -> bool {
        matches!(self, Phase::Collect | Phase::Read)
    }

    /// True if `self -> next` is a legal transition.
    ///
    /// This is only the shape of the state machine; per-band conditions such
    /// as "no values left" are checked by the band tree.
    pub fn can_become(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (NoPhase, Collect)
                | (Collect, Frozen)
                | (Frozen, Frozen)
                | (Collect, Write)
                | (Frozen, Write)
                | (Write, Done)
                | (NoPhase, Expect)
                | (Expect, Read)
                | (Read, Disburse)
                | (Disburse, Done)
        )
    }

    /// True if `self` is at or past `other` on the same path.
    ///
    /// `NoPhase` and `Done` compare against both paths.
    pub fn reached(self, other: Phase) -> bool {
        self.code() >= other.code()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::NoPhase => "none",
            Phase::Collect => "collect",
            Phase::Expect => "expect",
            Phase::Frozen => "frozen",
            Phase::Read => "read",
            Phase::Write => "write",
            Phase::Disburse => "disburse",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let writer = [Phase::NoPhase, Phase::Collect, Phase::Write, Phase::Done];
        let reader = [Phase::NoPhase, Phase::Expect, Phase::Read, Phase::Disburse, Phase::Done];
        for path in [&writer[..], &reader[..]] {
            for pair in path.windows(2) {
                assert!(pair[0].can_become(pair[1]), "{} -> {}", pair[0], pair[1]);
            }
        }
        assert!(Phase::Collect.can_become(Phase::Frozen));
        assert!(Phase::Frozen.can_become(Phase::Frozen));
        assert!(Phase::Frozen.can_become(Phase::Write));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!Phase::Collect.can_become(Phase::Read));
        assert!(!Phase::Expect.can_become(Phase::Disburse));
        assert!(!Phase::Disburse.can_become(Phase::Disburse));
        assert!(!Phase::Done.can_become(Phase::Collect));
        assert!(!Phase::Write.can_become(Phase::Collect));
    }

    #[test]
    fn test_parity() {
        assert!(Phase::Expect.is_read());
        assert!(Phase::Disburse.is_read());
        assert!(!Phase::Collect.is_read());
        assert!(!Phase::Write.is_read());
        assert_eq!(Phase::Done.code(), 8);
        assert!(Phase::Disburse.reached(Phase::Read));
        assert!(!Phase::Expect.reached(Phase::Disburse));
    }
}
