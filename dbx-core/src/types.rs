use std::fmt::{self, Display};

/// SQL:2003 column types every backend maps its native types onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ColumnType {
    Boolean = 0x00,
    SmallInt = 0x01,
    Integer = 0x02,
    BigInt = 0x03,
    Decimal = 0x07,
    Real = 0x08,
    Double = 0x09,
    Float = 0x0f,
    Char = 0x10,
    NChar = 0x11,
    Varchar = 0x12,
    NVarchar = 0x13,
    Clob = 0x20,
    NClob = 0x21,
    Xml = 0x22,
    Blob = 0x2f,
    Time = 0x30,
    TimeTz = 0x31,
    Timestamp = 0x32,
    TimestampTz = 0x33,
    Date = 0x34,
    Interval = 0x35,
    Array = 0x40,
    Multiset = 0x41,
    Datalink = 0x50,
    Unknown = 0xff,
}

impl ColumnType {
    pub const fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> ColumnType {
        use ColumnType::*;
        match id {
            0x00 => Boolean,
            0x01 => SmallInt,
            0x02 => Integer,
            0x03 => BigInt,
            0x07 => Decimal,
            0x08 => Real,
            0x09 => Double,
            0x0f => Float,
            0x10 => Char,
            0x11 => NChar,
            0x12 => Varchar,
            0x13 => NVarchar,
            0x20 => Clob,
            0x21 => NClob,
            0x22 => Xml,
            0x2f => Blob,
            0x30 => Time,
            0x31 => TimeTz,
            0x32 => Timestamp,
            0x33 => TimestampTz,
            0x34 => Date,
            0x35 => Interval,
            0x40 => Array,
            0x41 => Multiset,
            0x50 => Datalink,
            _ => Unknown,
        }
    }

    /// Large object types, their field value may be a locator.
    pub const fn is_large_object(self) -> bool {
        matches!(self, ColumnType::Clob | ColumnType::NClob | ColumnType::Blob)
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Outcome of fetching the next row of a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowStatus {
    /// No more rows, repeated calls keep returning this.
    Done = 0,
    /// A row is available through the field accessors.
    Next = 1,
}
