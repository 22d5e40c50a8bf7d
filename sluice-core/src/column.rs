use crate::TypeAdapter;
use std::{
    borrow::Cow,
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

/// Semantic type tag of a column or expression.
///
/// The tag drives the value conversions, `Custom` types are converted only by
/// the adapter attached to the column (or the session default adapter).
#[derive(Default, Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    Int,
    BigInt,
    Double,
    Decimal,
    String,
    Uuid,
    LocalDate,
    LocalTime,
    LocalDateTime,
    Blob,
    Json,
    Custom(Cow<'static, str>),
    /// Constants whose type is inferred from the other operand.
    #[default]
    Unknown,
}

impl DataType {
    pub fn custom(tag: impl Into<Cow<'static, str>>) -> Self {
        DataType::Custom(tag.into())
    }
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int | DataType::BigInt | DataType::Double | DataType::Decimal
        )
    }
}

/// Indicates how (or if) a column participates in the primary key.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryKeyType {
    /// Value provided by the caller.
    PrimaryKey,
    /// Value assigned by the database on insert (identity, serial, sequence).
    Autogenerated,
    /// Not part of the primary key.
    #[default]
    None,
}

/// Immutable column metadata.
#[derive(Clone)]
pub struct ColumnDef {
    /// Property name used by records and projections.
    pub property: Cow<'static, str>,
    /// Database facing name.
    pub name: Cow<'static, str>,
    pub data_type: DataType,
    pub nullable: bool,
    pub primary_key: PrimaryKeyType,
    /// Shares the database column of another property under a different type, never written.
    pub computed: bool,
    /// Sequence feeding an autogenerated primary key.
    pub sequence: Option<Cow<'static, str>>,
    pub adapter: Option<Arc<dyn TypeAdapter>>,
}

impl ColumnDef {
    pub fn new(
        property: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
        data_type: DataType,
    ) -> Self {
        Self {
            property: property.into(),
            name: name.into(),
            data_type,
            nullable: false,
            primary_key: PrimaryKeyType::None,
            computed: false,
            sequence: None,
            adapter: None,
        }
    }
    pub fn optional(mut self) -> Self {
        self.nullable = true;
        self
    }
    pub fn primary_key(mut self) -> Self {
        self.primary_key = PrimaryKeyType::PrimaryKey;
        self
    }
    pub fn autogenerated_primary_key(mut self) -> Self {
        self.primary_key = PrimaryKeyType::Autogenerated;
        self
    }
    pub fn autogenerated_by_sequence(mut self, sequence: impl Into<Cow<'static, str>>) -> Self {
        self.primary_key = PrimaryKeyType::Autogenerated;
        self.sequence = Some(sequence.into());
        self
    }
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }
    pub fn adapter(mut self, adapter: Arc<dyn TypeAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }
    pub fn is_primary_key(&self) -> bool {
        self.primary_key != PrimaryKeyType::None
    }
}

impl Debug for ColumnDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDef")
            .field("property", &self.property)
            .field("name", &self.name)
            .field("data_type", &self.data_type)
            .field("nullable", &self.nullable)
            .field("primary_key", &self.primary_key)
            .field("computed", &self.computed)
            .field("sequence", &self.sequence)
            .field("adapter", &self.adapter.is_some())
            .finish()
    }
}
