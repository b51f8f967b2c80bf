//! Static property and relation declarations.
//!
//! Entities declare their storage layout as `&'static` arrays of these
//! descriptors, built with const chains so the whole declaration lives in
//! rodata. Relation targets are function pointers rather than references,
//! which keeps mutually-referencing entity types representable.

use crate::entity::EntityDescriptor;
use crate::types::DataKind;

/// Correspondence between one entity field and one storage column.
#[derive(Debug, Clone, Copy)]
pub struct PropertyMapping {
    /// Source property name on the entity.
    pub name: &'static str,

    /// Storage column name. Defaults to the property name.
    pub column: &'static str,

    /// Semantic data type.
    pub kind: DataKind,

    /// This property is the persisted identity of the entity.
    pub object_id: bool,

    /// The backend assigns this property's value on insert.
    pub auto_generated: bool,

    /// NULL is a legal stored value.
    pub nullable: bool,
}

impl PropertyMapping {
    /// Declare a property mapped to a column of the same name.
    #[must_use]
    pub const fn new(name: &'static str, kind: DataKind) -> Self {
        Self {
            name,
            column: name,
            kind,
            object_id: false,
            auto_generated: false,
            nullable: false,
        }
    }

    /// Override the storage column name.
    #[must_use]
    pub const fn column(mut self, column: &'static str) -> Self {
        self.column = column;
        self
    }

    /// Mark this property as the objectId of its entity.
    #[must_use]
    pub const fn object_id(mut self, value: bool) -> Self {
        self.object_id = value;
        self
    }

    /// Mark this property as backend-assigned on insert.
    #[must_use]
    pub const fn auto_generated(mut self, value: bool) -> Self {
        self.auto_generated = value;
        self
    }

    /// Allow NULL as a stored value.
    #[must_use]
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }
}

/// Cardinality of a declared relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Many instances of this entity reference one target instance.
    ManyToOne,
    /// One instance of this entity collects many target instances.
    OneToMany,
}

/// A declared relation from one entity class to another.
///
/// The target is a descriptor accessor, resolved on demand through the
/// metadata cache. Foreign-key columns are derived during metadata build:
/// a many-to-one relation stores `<name>_id` on its own table unless
/// `column` overrides it; a one-to-many relation resolves the column on the
/// target side through `back_reference` or by scanning the target's
/// many-to-one relations.
#[derive(Debug, Clone, Copy)]
pub struct RelationDef {
    /// Name of the relation property on the entity.
    pub name: &'static str,

    /// Cardinality.
    pub kind: RelationKind,

    /// Accessor for the target entity's descriptor.
    pub target: fn() -> &'static EntityDescriptor,

    /// Explicit foreign-key column, overriding derivation.
    pub column: Option<&'static str>,

    /// The relation property on the target that points back here.
    pub back_reference: Option<&'static str>,

    /// A many-to-one target must exist before this entity is written.
    pub required: bool,
}

impl RelationDef {
    /// Declare a many-to-one relation. Required by default.
    #[must_use]
    pub const fn many_to_one(
        name: &'static str,
        target: fn() -> &'static EntityDescriptor,
    ) -> Self {
        Self {
            name,
            kind: RelationKind::ManyToOne,
            target,
            column: None,
            back_reference: None,
            required: true,
        }
    }

    /// Declare a one-to-many relation.
    #[must_use]
    pub const fn one_to_many(
        name: &'static str,
        target: fn() -> &'static EntityDescriptor,
    ) -> Self {
        Self {
            name,
            kind: RelationKind::OneToMany,
            target,
            column: None,
            back_reference: None,
            required: false,
        }
    }

    /// Override the derived foreign-key column.
    #[must_use]
    pub const fn column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self
    }

    /// Name the reciprocal relation property on the target.
    #[must_use]
    pub const fn back_reference(mut self, name: &'static str) -> Self {
        self.back_reference = Some(name);
        self
    }

    /// Set whether the target must precede this entity in a write batch.
    #[must_use]
    pub const fn required(mut self, value: bool) -> Self {
        self.required = value;
        self
    }
}
