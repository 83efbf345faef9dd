//! Record shapes and their resolution into columns.
//!
//! A record type describes itself once through `Record::shape`: an ordered
//! list of members, each with a declared name, an optional tag and a getter.
//! From that shape the saver derives, exactly once per type:
//! - the table name and ordered column list (`resolve`)
//! - one precomputed accessor per column (`accessor`)
//!
//! The shape is also exported as a type-erased `ShapeDescriptor`, which is
//! what a sink's schema introspection works on.

pub mod accessor;
pub mod naming;
pub mod resolve;
pub mod tag;
pub mod value;

use std::sync::Arc;

pub use accessor::{build_accessors, FieldAccessor};
pub use naming::NamingStrategy;
pub use resolve::{resolve_columns, ResolutionSource, ResolvedColumns};
pub use tag::FieldTag;
pub use value::{SqlValue, ToSqlValue};

/// A type that can be buffered and written by a batch saver.
///
/// # Examples
///
/// ```
/// use batch_saver::{Record, RecordShape};
///
/// struct Item {
///     id: i64,
///     name: String,
///     value: Option<f64>,
/// }
///
/// impl Record for Item {
///     fn shape() -> RecordShape<Self> {
///         RecordShape::new("Item")
///             .tagged_field("ID", "primaryKey", |i: &Item| &i.id)
///             .field("Name", |i: &Item| &i.name)
///             .field("Value", |i: &Item| &i.value)
///     }
/// }
/// ```
pub trait Record: Sized + Send + Sync + 'static {
    /// Declares the members of the type. Called once per saver.
    fn shape() -> RecordShape<Self>;
}

/// Whether a member takes part in persistence at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Mapped to a column unless its tag says otherwise
    Public,
    /// Never mapped to a column
    Private,
}

pub(crate) type Reader<T> = Arc<dyn Fn(&T) -> SqlValue + Send + Sync>;

enum MemberKind<T> {
    Field(Reader<T>),
    Embedded { members: Vec<Member<T>> },
}

/// One declared member of a record shape.
pub struct Member<T> {
    name: String,
    tag: Option<String>,
    visibility: Visibility,
    nullable: bool,
    kind: MemberKind<T>,
}

impl<T: 'static> Member<T> {
    /// A scalar field read through `get`.
    pub fn field<V>(name: impl Into<String>, get: fn(&T) -> &V) -> Self
    where
        V: ToSqlValue + ?Sized + 'static,
    {
        Member {
            name: name.into(),
            tag: None,
            visibility: Visibility::Public,
            nullable: V::NULLABLE,
            kind: MemberKind::Field(Arc::new(move |record: &T| get(record).to_sql_value())),
        }
    }

    /// An embedded record whose members are flattened into this shape.
    pub fn embedded<U: Record>(name: impl Into<String>, get: fn(&T) -> &U) -> Self {
        let inner = U::shape();
        Member {
            name: name.into(),
            tag: None,
            visibility: Visibility::Public,
            nullable: false,
            kind: MemberKind::Embedded {
                members: inner
                    .members
                    .into_iter()
                    .map(|member| member.project(get))
                    .collect(),
            },
        }
    }

    /// Attaches a tag such as `column:asset_id;autoIncrement`.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Marks the member private, so it never becomes a column.
    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    /// Declared member name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Re-roots a member of `U` onto a parent `T` that holds a `U`.
    fn project<P: 'static>(self, get: fn(&P) -> &T) -> Member<P> {
        let kind = match self.kind {
            MemberKind::Field(read) => {
                MemberKind::Field(Arc::new(move |parent: &P| read(get(parent))))
            }
            MemberKind::Embedded { members } => MemberKind::Embedded {
                members: members.into_iter().map(|m| m.project(get)).collect(),
            },
        };
        Member {
            name: self.name,
            tag: self.tag,
            visibility: self.visibility,
            nullable: self.nullable,
            kind,
        }
    }

    fn descriptor(&self) -> MemberDescriptor {
        MemberDescriptor {
            name: self.name.clone(),
            raw_tag: self.tag.clone(),
            tag: FieldTag::parse(self.tag.as_deref()),
            visibility: self.visibility,
            nullable: self.nullable,
            embedded: match &self.kind {
                MemberKind::Field(_) => None,
                MemberKind::Embedded { members } => {
                    Some(members.iter().map(Member::descriptor).collect())
                }
            },
        }
    }
}

/// The declared structure of a record type.
pub struct RecordShape<T> {
    type_name: String,
    table_name: Option<String>,
    members: Vec<Member<T>>,
}

impl<T: 'static> RecordShape<T> {
    /// An empty shape for the type called `type_name`. The name is what
    /// table names are derived from.
    pub fn new(type_name: impl Into<String>) -> Self {
        RecordShape {
            type_name: type_name.into(),
            table_name: None,
            members: Vec::new(),
        }
    }

    /// Declares the table explicitly instead of deriving it from the type name.
    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Appends a member built by hand.
    pub fn member(mut self, member: Member<T>) -> Self {
        self.members.push(member);
        self
    }

    /// Appends an untagged public field.
    pub fn field<V>(self, name: impl Into<String>, get: fn(&T) -> &V) -> Self
    where
        V: ToSqlValue + ?Sized + 'static,
    {
        self.member(Member::field(name, get))
    }

    /// Appends a public field with a tag.
    pub fn tagged_field<V>(
        self,
        name: impl Into<String>,
        tag: impl Into<String>,
        get: fn(&T) -> &V,
    ) -> Self
    where
        V: ToSqlValue + ?Sized + 'static,
    {
        self.member(Member::field(name, get).tag(tag))
    }

    /// Appends an embedded record, flattened into this shape's columns.
    pub fn embed<U: Record>(self, name: impl Into<String>, get: fn(&T) -> &U) -> Self {
        self.member(Member::embedded(name, get))
    }

    /// Declared type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Type-erased view handed to sink introspection.
    pub fn descriptor(&self) -> ShapeDescriptor {
        ShapeDescriptor {
            type_name: self.type_name.clone(),
            table_name: self.table_name.clone(),
            members: self.members.iter().map(Member::descriptor).collect(),
        }
    }

    /// Follows a structural access path down to a field getter.
    ///
    /// Returns `None` for an empty path, an out-of-range index, or a path that
    /// ends on an embedded member rather than a field.
    pub(crate) fn reader_at(&self, path: &[usize]) -> Option<Reader<T>> {
        let (last, parents) = path.split_last()?;
        let mut members = &self.members;
        for &index in parents {
            match &members.get(index)?.kind {
                MemberKind::Embedded { members: inner } => members = inner,
                MemberKind::Field(_) => return None,
            }
        }
        match &members.get(*last)?.kind {
            MemberKind::Field(read) => Some(Arc::clone(read)),
            MemberKind::Embedded { .. } => None,
        }
    }
}

/// Type-erased description of one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDescriptor {
    /// Declared member name
    pub name: String,
    /// Tag as written
    pub raw_tag: Option<String>,
    /// Parsed tag
    pub tag: FieldTag,
    /// Public or private
    pub visibility: Visibility,
    /// Field sits behind `Option` or `Box`
    pub nullable: bool,
    /// Members of an embedded record; `None` for plain fields
    pub embedded: Option<Vec<MemberDescriptor>>,
}

/// Type-erased description of a record shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeDescriptor {
    /// Declared type name
    pub type_name: String,
    /// Table declared by the shape itself
    pub table_name: Option<String>,
    /// Members in declaration order
    pub members: Vec<MemberDescriptor>,
}
