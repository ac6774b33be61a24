//! Transaction branch identifier.

use std::fmt;

use uuid::Uuid;

/// XA transaction branch identifier following the X/Open XA specification.
///
/// Equality is structural: two xids are equal when their format id, global
/// transaction id and branch qualifier are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Xid {
    format_id: i32,
    global_transaction_id: Vec<u8>,
    branch_qualifier: Vec<u8>,
}

impl Xid {
    /// Maximum length for global transaction ID.
    pub const MAXGTRIDSIZE: usize = 64;
    /// Maximum length for branch qualifier.
    pub const MAXBQUALSIZE: usize = 64;
    /// Format id marking the null xid.
    pub const NULL_FORMAT_ID: i32 = -1;

    /// Creates a new XA transaction identifier.
    ///
    /// # Panics
    ///
    /// Panics if `global_transaction_id` or `branch_qualifier` exceeds its maximum size.
    pub fn new(format_id: i32, global_transaction_id: &[u8], branch_qualifier: &[u8]) -> Self {
        assert!(
            global_transaction_id.len() <= Self::MAXGTRIDSIZE,
            "Global transaction ID exceeds maximum size of {} bytes",
            Self::MAXGTRIDSIZE
        );
        assert!(
            branch_qualifier.len() <= Self::MAXBQUALSIZE,
            "Branch qualifier exceeds maximum size of {} bytes",
            Self::MAXBQUALSIZE
        );

        Self {
            format_id,
            global_transaction_id: global_transaction_id.to_vec(),
            branch_qualifier: branch_qualifier.to_vec(),
        }
    }

    /// The null xid, sent on the wire when no branch is associated.
    pub fn null() -> Self {
        Self {
            format_id: Self::NULL_FORMAT_ID,
            global_transaction_id: Vec::new(),
            branch_qualifier: Vec::new(),
        }
    }

    /// Generates a new random xid.
    pub fn generate() -> Self {
        let gtrid = Uuid::new_v4();
        let bqual = Uuid::new_v4();
        Self::new(0, gtrid.as_bytes(), bqual.as_bytes())
    }

    /// Returns true if this is the null xid.
    pub fn is_null(&self) -> bool {
        self.format_id == Self::NULL_FORMAT_ID
    }

    /// Returns the format identifier.
    pub fn format_id(&self) -> i32 {
        self.format_id
    }

    /// Returns the global transaction identifier.
    pub fn global_transaction_id(&self) -> &[u8] {
        &self.global_transaction_id
    }

    /// Returns the branch qualifier.
    pub fn branch_qualifier(&self) -> &[u8] {
        &self.branch_qualifier
    }
}

impl Default for Xid {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("null-xid");
        }
        for byte in &self.global_transaction_id {
            write!(f, "{:02x}", byte)?;
        }
        f.write_str(":")?;
        for byte in &self.branch_qualifier {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ":{}", self.format_id)
    }
}
