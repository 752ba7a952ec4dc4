//! Field access flags
//!
//! One byte per managed member telling an enhanced class how reads and writes
//! of the member are intercepted.

use serde::Serialize;
use std::fmt;

use super::PersistenceModifier;

/// Access-flag byte of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct AccessFlags(u8);

impl AccessFlags {
    /// Reads check that the member is loaded
    pub const CHECK_READ: u8 = 1;
    /// Reads go through the state manager
    pub const MEDIATE_READ: u8 = 2;
    /// Writes are checked
    pub const CHECK_WRITE: u8 = 4;
    /// Writes go through the state manager
    pub const MEDIATE_WRITE: u8 = 8;
    /// Member takes part in serialization
    pub const SERIALIZABLE: u8 = 16;

    /// Wrap raw bits
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw bits
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Whether every bit of `flag` is set
    pub fn contains(self, flag: u8) -> bool {
        self.0 & flag == flag
    }

    /// Whether no bit is set
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Flags for a member with the given modifier and attributes
    pub fn compute(
        modifier: PersistenceModifier,
        transient: bool,
        primary_key: bool,
        default_fetch_group: bool,
    ) -> Self {
        let serializable = if transient { 0 } else { Self::SERIALIZABLE };
        let bits = match modifier {
            PersistenceModifier::None => return Self(0),
            PersistenceModifier::Transactional => Self::CHECK_WRITE | serializable,
            PersistenceModifier::Persistent if primary_key => Self::MEDIATE_WRITE | serializable,
            PersistenceModifier::Persistent if default_fetch_group => {
                Self::CHECK_READ | Self::CHECK_WRITE | serializable
            }
            PersistenceModifier::Persistent => {
                Self::MEDIATE_READ | Self::MEDIATE_WRITE | serializable
            }
        };
        Self(bits)
    }
}

impl fmt::Display for AccessFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(u8, &str); 5] = [
            (AccessFlags::CHECK_READ, "CHECK_READ"),
            (AccessFlags::MEDIATE_READ, "MEDIATE_READ"),
            (AccessFlags::CHECK_WRITE, "CHECK_WRITE"),
            (AccessFlags::MEDIATE_WRITE, "MEDIATE_WRITE"),
            (AccessFlags::SERIALIZABLE, "SERIALIZABLE"),
        ];
        if self.0 == 0 {
            return f.write_str("0");
        }
        let mut first = true;
        for (bit, name) in NAMES {
            if self.contains(bit) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CR: u8 = AccessFlags::CHECK_READ;
    const MR: u8 = AccessFlags::MEDIATE_READ;
    const CW: u8 = AccessFlags::CHECK_WRITE;
    const MW: u8 = AccessFlags::MEDIATE_WRITE;
    const SER: u8 = AccessFlags::SERIALIZABLE;

    #[test]
    fn test_flag_table() {
        use PersistenceModifier::*;
        let cases = [
            (Transactional, true, false, false, CW),
            (Transactional, false, false, false, CW | SER),
            (Persistent, true, true, false, MW),
            (Persistent, false, true, false, MW | SER),
            (Persistent, true, false, true, CR | CW),
            (Persistent, false, false, true, CR | CW | SER),
            (Persistent, true, false, false, MR | MW),
            (Persistent, false, false, false, MR | MW | SER),
        ];
        for (modifier, transient, pk, dfg, expected) in cases {
            assert_eq!(
                AccessFlags::compute(modifier, transient, pk, dfg).bits(),
                expected,
                "{:?} transient={} pk={} dfg={}",
                modifier,
                transient,
                pk,
                dfg
            );
        }
    }

    #[test]
    fn test_none_modifier_is_zero() {
        for transient in [true, false] {
            let flags = AccessFlags::compute(PersistenceModifier::None, transient, true, true);
            assert!(flags.is_empty());
        }
    }

    #[test]
    fn test_primary_key_wins_over_fetch_group() {
        let flags = AccessFlags::compute(PersistenceModifier::Persistent, false, true, true);
        assert_eq!(flags.bits(), MW | SER);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            AccessFlags::from_bits(CR | CW | SER).to_string(),
            "CHECK_READ|CHECK_WRITE|SERIALIZABLE"
        );
        assert_eq!(AccessFlags::default().to_string(), "0");
    }
}
