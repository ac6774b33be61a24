//! XA flags and return codes (X/Open XA specification).

use std::fmt;

// ============================================================================
// XA Flags
// ============================================================================

/// No flags set.
pub const XA_TMNOFLAGS: i32 = 0x00000000;

/// Caller is joining existing transaction branch.
pub const XA_TMJOIN: i32 = 0x00200000;

/// Caller is resuming association with suspended transaction branch.
pub const XA_TMRESUME: i32 = 0x08000000;

/// Dissociate caller from transaction branch - successful.
pub const XA_TMSUCCESS: i32 = 0x04000000;

/// Dissociate caller from transaction branch - failed.
pub const XA_TMFAIL: i32 = 0x20000000;

/// Caller is suspending (not ending) its association with transaction branch.
pub const XA_TMSUSPEND: i32 = 0x02000000;

/// Start a recovery scan.
pub const XA_TMSTARTRSCAN: i32 = 0x01000000;

/// End a recovery scan.
pub const XA_TMENDRSCAN: i32 = 0x00800000;

/// Use one-phase commit optimization.
pub const XA_TMONEPHASE: i32 = 0x40000000;

// ============================================================================
// XA Return Codes
// ============================================================================

/// XA return and error codes.
///
/// Positive values are outcomes reported by a resource manager, values of
/// 100 and above are rollback reasons, negative values are `XAER_*` errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum XaReturnCode {
    /// Normal execution.
    XaOk = 0,
    /// The transaction branch was read-only and has been committed.
    XaRdonly = 3,
    /// Routine returned with no effect and may be reissued.
    XaRetry = 4,
    /// The branch was partially committed and partially rolled back.
    XaHeurmix = 5,
    /// The branch was heuristically rolled back.
    XaHeurrb = 6,
    /// The branch was heuristically committed.
    XaHeurcom = 7,
    /// The branch may have been heuristically completed.
    XaHeurhaz = 8,
    /// Resumption must occur where suspension occurred.
    XaNomigrate = 9,
    /// Rollback was caused by an unspecified reason.
    XaRbrollback = 100,
    /// Rollback was caused by a communication failure.
    XaRbcommfail = 101,
    /// A deadlock was detected.
    XaRbdeadlock = 102,
    /// A condition that violates the integrity of the resource was detected.
    XaRbintegrity = 103,
    /// The resource manager rolled back for a reason not listed.
    XaRbother = 104,
    /// A protocol error occurred in the resource manager.
    XaRbproto = 105,
    /// The branch took too long.
    XaRbtimeout = 106,
    /// The branch may be retried.
    XaRbtransient = 107,
    /// An asynchronous operation is already outstanding.
    XaerAsync = -2,
    /// A resource manager error occurred.
    XaerRmerr = -3,
    /// The xid is not valid.
    XaerNota = -4,
    /// Invalid arguments were given.
    XaerInval = -5,
    /// Routine invoked in an improper context.
    XaerProto = -6,
    /// The resource manager is unavailable.
    XaerRmfail = -7,
    /// The xid already exists.
    XaerDupid = -8,
    /// The resource manager is doing work outside the global transaction.
    XaerOutside = -9,
}

impl XaReturnCode {
    /// Returns the numeric code.
    pub fn code(&self) -> i32 {
        *self as i32
    }

    /// Maps a numeric code to a return code.
    pub fn from_code(code: i32) -> Option<Self> {
        use XaReturnCode::*;
        let value = match code {
            0 => XaOk,
            3 => XaRdonly,
            4 => XaRetry,
            5 => XaHeurmix,
            6 => XaHeurrb,
            7 => XaHeurcom,
            8 => XaHeurhaz,
            9 => XaNomigrate,
            100 => XaRbrollback,
            101 => XaRbcommfail,
            102 => XaRbdeadlock,
            103 => XaRbintegrity,
            104 => XaRbother,
            105 => XaRbproto,
            106 => XaRbtimeout,
            107 => XaRbtransient,
            -2 => XaerAsync,
            -3 => XaerRmerr,
            -4 => XaerNota,
            -5 => XaerInval,
            -6 => XaerProto,
            -7 => XaerRmfail,
            -8 => XaerDupid,
            -9 => XaerOutside,
            _ => return None,
        };
        Some(value)
    }

    /// Returns true for outcomes that let two-phase commit proceed.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::XaOk | Self::XaRdonly)
    }

    /// Returns the X/Open name of this code.
    pub fn name(&self) -> &'static str {
        use XaReturnCode::*;
        match self {
            XaOk => "XA_OK",
            XaRdonly => "XA_RDONLY",
            XaRetry => "XA_RETRY",
            XaHeurmix => "XA_HEURMIX",
            XaHeurrb => "XA_HEURRB",
            XaHeurcom => "XA_HEURCOM",
            XaHeurhaz => "XA_HEURHAZ",
            XaNomigrate => "XA_NOMIGRATE",
            XaRbrollback => "XA_RBROLLBACK",
            XaRbcommfail => "XA_RBCOMMFAIL",
            XaRbdeadlock => "XA_RBDEADLOCK",
            XaRbintegrity => "XA_RBINTEGRITY",
            XaRbother => "XA_RBOTHER",
            XaRbproto => "XA_RBPROTO",
            XaRbtimeout => "XA_RBTIMEOUT",
            XaRbtransient => "XA_RBTRANSIENT",
            XaerAsync => "XAER_ASYNC",
            XaerRmerr => "XAER_RMERR",
            XaerNota => "XAER_NOTA",
            XaerInval => "XAER_INVAL",
            XaerProto => "XAER_PROTO",
            XaerRmfail => "XAER_RMFAIL",
            XaerDupid => "XAER_DUPID",
            XaerOutside => "XAER_OUTSIDE",
        }
    }
}

impl fmt::Display for XaReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}
