//! MaxDB SQL data type codes.
//!
//! Every parameter/column description carries one of these codes. The
//! enum keeps the raw code for anything it does not name, so a new server
//! type never fails metadata parsing; its values are read as raw bytes.

use crate::protocol::constants::*;

/// SQL data type of a column or parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Fixed,
    Float,
    VFloat,
    SmallInt,
    Integer,
    /// CHAR ASCII.
    Cha,
    /// CHAR EBCDIC.
    Che,
    /// CHAR BYTE.
    Chb,
    VarcharA,
    VarcharE,
    VarcharB,
    Unicode,
    VarcharUni,
    Date,
    Time,
    Timestamp,
    Boolean,
    StrA,
    StrE,
    StrB,
    LongA,
    LongE,
    LongB,
    StrUni,
    LongUni,
    /// Any code not listed above.
    Other(u8),
}

impl DataType {
    /// Map a wire code.
    pub fn from_code(code: u8) -> Self {
        match code {
            DT_FIXED => DataType::Fixed,
            DT_FLOAT => DataType::Float,
            DT_VFLOAT => DataType::VFloat,
            DT_SMALLINT => DataType::SmallInt,
            DT_INTEGER => DataType::Integer,
            DT_CHA => DataType::Cha,
            DT_CHE => DataType::Che,
            DT_CHB => DataType::Chb,
            DT_VARCHARA => DataType::VarcharA,
            DT_VARCHARE => DataType::VarcharE,
            DT_VARCHARB => DataType::VarcharB,
            DT_UNICODE => DataType::Unicode,
            DT_VARCHARUNI => DataType::VarcharUni,
            DT_DATE => DataType::Date,
            DT_TIME => DataType::Time,
            DT_TIMESTAMP => DataType::Timestamp,
            DT_BOOLEAN => DataType::Boolean,
            DT_STRA => DataType::StrA,
            DT_STRE => DataType::StrE,
            DT_STRB => DataType::StrB,
            DT_LONGA => DataType::LongA,
            DT_LONGE => DataType::LongE,
            DT_LONGB => DataType::LongB,
            DT_STRUNI => DataType::StrUni,
            DT_LONGUNI => DataType::LongUni,
            other => DataType::Other(other),
        }
    }

    /// Wire code.
    pub fn code(&self) -> u8 {
        match self {
            DataType::Fixed => DT_FIXED,
            DataType::Float => DT_FLOAT,
            DataType::VFloat => DT_VFLOAT,
            DataType::SmallInt => DT_SMALLINT,
            DataType::Integer => DT_INTEGER,
            DataType::Cha => DT_CHA,
            DataType::Che => DT_CHE,
            DataType::Chb => DT_CHB,
            DataType::VarcharA => DT_VARCHARA,
            DataType::VarcharE => DT_VARCHARE,
            DataType::VarcharB => DT_VARCHARB,
            DataType::Unicode => DT_UNICODE,
            DataType::VarcharUni => DT_VARCHARUNI,
            DataType::Date => DT_DATE,
            DataType::Time => DT_TIME,
            DataType::Timestamp => DT_TIMESTAMP,
            DataType::Boolean => DT_BOOLEAN,
            DataType::StrA => DT_STRA,
            DataType::StrE => DT_STRE,
            DataType::StrB => DT_STRB,
            DataType::LongA => DT_LONGA,
            DataType::LongE => DT_LONGE,
            DataType::LongB => DT_LONGB,
            DataType::StrUni => DT_STRUNI,
            DataType::LongUni => DT_LONGUNI,
            DataType::Other(code) => *code,
        }
    }

    /// Whether values of this type travel as long descriptors.
    pub fn is_long(&self) -> bool {
        matches!(
            self,
            DataType::StrA
                | DataType::StrE
                | DataType::StrB
                | DataType::LongA
                | DataType::LongE
                | DataType::LongB
                | DataType::StrUni
                | DataType::LongUni
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Fixed
                | DataType::Float
                | DataType::VFloat
                | DataType::SmallInt
                | DataType::Integer
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, DataType::Float | DataType::VFloat)
    }

    /// Whether trailing blanks are insignificant.
    pub fn is_varchar(&self) -> bool {
        matches!(
            self,
            DataType::VarcharA | DataType::VarcharE | DataType::VarcharB | DataType::VarcharUni
        )
    }

    /// SQL name of the type.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Fixed => "FIXED",
            DataType::Float | DataType::VFloat => "FLOAT",
            DataType::SmallInt => "SMALLINT",
            DataType::Integer => "INTEGER",
            DataType::Cha | DataType::Che => "CHAR",
            DataType::Chb => "CHAR BYTE",
            DataType::VarcharA | DataType::VarcharE => "VARCHAR",
            DataType::VarcharB => "VARCHAR BYTE",
            DataType::Unicode => "CHAR UNICODE",
            DataType::VarcharUni => "VARCHAR UNICODE",
            DataType::Date => "DATE",
            DataType::Time => "TIME",
            DataType::Timestamp => "TIMESTAMP",
            DataType::Boolean => "BOOLEAN",
            DataType::StrA | DataType::StrE | DataType::LongA | DataType::LongE => "LONG",
            DataType::StrB | DataType::LongB => "LONG BYTE",
            DataType::StrUni | DataType::LongUni => "LONG UNICODE",
            DataType::Other(_) => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Other(code) => write!(f, "UNKNOWN({})", code),
            other => write!(f, "{}", other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_map_both_ways() {
        for code in 0u8..=40 {
            assert_eq!(DataType::from_code(code).code(), code);
        }
        assert_eq!(DataType::from_code(DT_VARCHARUNI), DataType::VarcharUni);
    }

    #[test]
    fn test_families() {
        assert!(DataType::LongUni.is_long());
        assert!(!DataType::VarcharA.is_long());
        assert!(DataType::Integer.is_numeric());
        assert!(DataType::VFloat.is_floating());
        assert!(!DataType::Fixed.is_floating());
        assert!(DataType::VarcharB.is_varchar());
        assert!(!DataType::Cha.is_varchar());
    }

    #[test]
    fn test_display() {
        assert_eq!(DataType::Fixed.to_string(), "FIXED");
        assert_eq!(DataType::LongB.to_string(), "LONG BYTE");
        assert_eq!(DataType::Other(99).to_string(), "UNKNOWN(99)");
    }
}
