//! ATMI call flags.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A set of ATMI flags passed with a service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AtmiFlags(u32);

impl AtmiFlags {
    /// No flags set.
    pub const NOFLAG: Self = Self(0);
    /// Do not block when the request can not be sent immediately.
    pub const TPNOBLOCK: Self = Self(0x0000_0001);
    /// Restart interrupted system calls.
    pub const TPSIGRSTRT: Self = Self(0x0000_0002);
    /// No reply is expected.
    pub const TPNOREPLY: Self = Self(0x0000_0004);
    /// The call is not part of the caller's transaction.
    pub const TPNOTRAN: Self = Self(0x0000_0008);
    /// The call is part of the caller's transaction.
    pub const TPTRAN: Self = Self(0x0000_0010);
    /// Ignore blocking timeouts.
    pub const TPNOTIME: Self = Self(0x0000_0020);
    /// Get any outstanding reply.
    pub const TPGETANY: Self = Self(0x0000_0080);
    /// Reply buffer type may not change.
    pub const TPNOCHANGE: Self = Self(0x0000_0100);

    /// Creates a flag set from its raw value.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw value.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns true if every bit of `flag` is set.
    pub const fn is_set(&self, flag: AtmiFlags) -> bool {
        flag.0 != 0 && self.0 & flag.0 == flag.0
    }
}

impl BitOr for AtmiFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AtmiFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for AtmiFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
