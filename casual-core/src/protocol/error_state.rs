//! XATMI error states reported by a remote domain.

use std::fmt;

/// Outcome of a remote service or queue operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorState {
    /// The operation succeeded.
    #[default]
    Ok,
    /// The call was aborted.
    Tpeabort,
    /// Invalid call descriptor.
    Tpebaddesc,
    /// The call would block.
    Tpeblock,
    /// Invalid arguments.
    Tpeinval,
    /// A system limit was reached.
    Tpelimit,
    /// No such service or queue.
    Tpenoent,
    /// Operating system error.
    Tpeos,
    /// Permission denied.
    Tpeperm,
    /// Called in an improper context.
    Tpeproto,
    /// The service failed with an error.
    Tpesvcerr,
    /// The service returned failure.
    Tpesvcfail,
    /// Internal system error.
    Tpesystem,
    /// The call timed out.
    Tpetime,
    /// Transaction error.
    Tpetran,
    /// A signal was received.
    Tpgotsig,
    /// Input buffer type not recognised.
    Tpeitype,
    /// Output buffer type not recognised.
    Tpeotype,
    /// An event occurred on a conversation.
    Tpeevent,
    /// A matching request is already outstanding.
    Tpematch,
}

impl ErrorState {
    /// Returns the numeric code.
    pub fn code(&self) -> i32 {
        use ErrorState::*;
        match self {
            Ok => 0,
            Tpeabort => 1,
            Tpebaddesc => 2,
            Tpeblock => 3,
            Tpeinval => 4,
            Tpelimit => 5,
            Tpenoent => 6,
            Tpeos => 7,
            Tpeperm => 8,
            Tpeproto => 9,
            Tpesvcerr => 10,
            Tpesvcfail => 11,
            Tpesystem => 12,
            Tpetime => 13,
            Tpetran => 14,
            Tpgotsig => 15,
            Tpeitype => 17,
            Tpeotype => 18,
            Tpeevent => 22,
            Tpematch => 23,
        }
    }

    /// Maps a numeric code to an error state.
    pub fn from_code(code: i32) -> Option<Self> {
        use ErrorState::*;
        let value = match code {
            0 => Ok,
            1 => Tpeabort,
            2 => Tpebaddesc,
            3 => Tpeblock,
            4 => Tpeinval,
            5 => Tpelimit,
            6 => Tpenoent,
            7 => Tpeos,
            8 => Tpeperm,
            9 => Tpeproto,
            10 => Tpesvcerr,
            11 => Tpesvcfail,
            12 => Tpesystem,
            13 => Tpetime,
            14 => Tpetran,
            15 => Tpgotsig,
            17 => Tpeitype,
            18 => Tpeotype,
            22 => Tpeevent,
            23 => Tpematch,
            _ => return None,
        };
        Some(value)
    }

    /// Returns true for [`ErrorState::Ok`].
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ErrorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ErrorState::*;
        let name = match self {
            Ok => "OK",
            Tpeabort => "TPEABORT",
            Tpebaddesc => "TPEBADDESC",
            Tpeblock => "TPEBLOCK",
            Tpeinval => "TPEINVAL",
            Tpelimit => "TPELIMIT",
            Tpenoent => "TPENOENT",
            Tpeos => "TPEOS",
            Tpeperm => "TPEPERM",
            Tpeproto => "TPEPROTO",
            Tpesvcerr => "TPESVCERR",
            Tpesvcfail => "TPESVCFAIL",
            Tpesystem => "TPESYSTEM",
            Tpetime => "TPETIME",
            Tpetran => "TPETRAN",
            Tpgotsig => "TPGOTSIG",
            Tpeitype => "TPEITYPE",
            Tpeotype => "TPEOTYPE",
            Tpeevent => "TPEEVENT",
            Tpematch => "TPEMATCH",
        };
        f.write_str(name)
    }
}
