//! Semantic data types for property mappings.

/// The semantic data type of a mapped property.
///
/// This classifies what a property *means*, independent of how a particular
/// backend stores it. Backend type names (and any affinity rules) are the
/// backend crate's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    /// Boolean flag.
    Bool,
    /// Signed 16-bit integer.
    SmallInt,
    /// Signed 32-bit integer.
    Int,
    /// Signed 64-bit integer; the kind of every object ID.
    BigInt,
    /// Single-precision float.
    Float,
    /// Double-precision float.
    Double,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date and time.
    DateTime,
    /// Single character.
    Char,
    /// Unbounded text.
    Text,
    /// Opaque bytes.
    Blob,
}

impl DataKind {
    /// Name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            DataKind::Bool => "bool",
            DataKind::SmallInt => "smallint",
            DataKind::Int => "int",
            DataKind::BigInt => "bigint",
            DataKind::Float => "float",
            DataKind::Double => "double",
            DataKind::Date => "date",
            DataKind::Time => "time",
            DataKind::DateTime => "datetime",
            DataKind::Char => "char",
            DataKind::Text => "text",
            DataKind::Blob => "blob",
        }
    }

    /// Integer family: SmallInt, Int, BigInt.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, DataKind::SmallInt | DataKind::Int | DataKind::BigInt)
    }

    /// Floating family: Float, Double.
    #[must_use]
    pub const fn is_floating(self) -> bool {
        matches!(self, DataKind::Float | DataKind::Double)
    }

    /// Temporal family: Date, Time, DateTime.
    #[must_use]
    pub const fn is_temporal(self) -> bool {
        matches!(self, DataKind::Date | DataKind::Time | DataKind::DateTime)
    }

    /// Textual family: Char, Text.
    #[must_use]
    pub const fn is_textual(self) -> bool {
        matches!(self, DataKind::Char | DataKind::Text)
    }
}
