//! Per-type schemas: which names a record accepts, and where they land.
//!
//! A schema is registered once per record type, usually through
//! [`static_schema!`](crate::static_schema), and is immutable afterwards.
//! Every field carries an accessor closure that acts as a lens into the record:
//! given `&mut R` it hands back a [`FieldRef`] to the field, allocating any
//! intermediate `Option` layers on the way.

use std::{
    collections::HashMap,
    fmt::{self, Display},
};

use crate::{DecodeError, ast::Body, eval::Evaluator, value::DecodeValue};

/// A record type that can be decoded from a [`Body`].
///
/// # Example
/// ```
/// use kdl_decode::{Block, Schema, static_schema};
///
/// #[derive(Debug, Default)]
/// struct Endpoint {
///     url: String,
///     timeout: Option<u64>,
/// }
///
/// impl Block for Endpoint {
///     fn schema() -> &'static Schema<Self> {
///         static_schema!(Endpoint, |schema| schema
///             .attr("url", |e| &mut e.url)
///             .attr("timeout", |e| &mut e.timeout)
///             .optional())
///     }
/// }
///
/// # fn main() -> Result<(), kdl_decode::DecodeError> {
/// let endpoint: Endpoint = kdl_decode::from_str(r#"url "http://localhost:9090""#)?;
/// assert_eq!(endpoint.url, "http://localhost:9090");
/// assert_eq!(endpoint.timeout, None);
/// # Ok(())
/// # }
/// ```
pub trait Block: Sized + 'static {
    /// The schema for this type. Must return the same table on every call.
    fn schema() -> &'static Schema<Self>;

    /// Called before a body is decoded into `self`, to install defaults that
    /// differ from `Default`.
    fn set_to_default(&mut self) {}

    /// Called after a body decoded without errors.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Whether a field is written as `name value` or as `name { ... }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// A leaf value.
    Attribute,
    /// A nested body.
    Block,
}

impl Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Attribute => f.write_str("attribute"),
            FieldKind::Block => f.write_str("block"),
        }
    }
}

/// A mutable reference to a field, classified by how it consumes statements.
pub enum FieldRef<'a> {
    /// Receives one converted value.
    Attribute(&'a mut dyn DecodeValue),
    /// Receives the body of exactly one block.
    Singular(&'a mut dyn DecodeBody),
    /// Receives any number of blocks, one element each.
    Growable(&'a mut dyn GrowableBlockSeq),
    /// Receives exactly as many blocks as it has elements.
    Fixed(&'a mut dyn BlockSeq),
}

/// A value that a block body can be decoded into.
pub trait DecodeBody {
    /// Decodes `body` into `self`.
    fn decode_body(&mut self, body: &Body, evaluator: &Evaluator<'_>) -> Result<(), DecodeError>;
}

impl<T: Block> DecodeBody for T {
    fn decode_body(&mut self, body: &Body, evaluator: &Evaluator<'_>) -> Result<(), DecodeError> {
        evaluator.decode_body(body, self)
    }
}

/// An indexable sequence of block targets.
pub trait BlockSeq {
    /// Current number of elements.
    fn len(&self) -> usize;

    /// Returns true if there are no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The element at `index`, if in bounds.
    fn element(&mut self, index: usize) -> Option<&mut dyn DecodeBody>;
}

/// A block sequence whose length follows the source.
pub trait GrowableBlockSeq: BlockSeq {
    /// Replaces the contents with `len` default elements.
    fn reset(&mut self, len: usize);
}

impl<T: Block + Default> BlockSeq for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn element(&mut self, index: usize) -> Option<&mut dyn DecodeBody> {
        self.get_mut(index).map(|element| element as &mut dyn DecodeBody)
    }
}

impl<T: Block + Default> GrowableBlockSeq for Vec<T> {
    fn reset(&mut self, len: usize) {
        self.clear();
        self.resize_with(len, T::default);
    }
}

impl<T: Block, const N: usize> BlockSeq for [T; N] {
    fn len(&self) -> usize {
        N
    }

    fn element(&mut self, index: usize) -> Option<&mut dyn DecodeBody> {
        self.get_mut(index).map(|element| element as &mut dyn DecodeBody)
    }
}

type Accessor<R> = Box<dyn for<'a> Fn(&'a mut R) -> FieldRef<'a> + Send + Sync>;

// Pins the higher-ranked signature for closures built inside the builder.
fn accessor<R, F>(f: F) -> Accessor<R>
where
    F: for<'a> Fn(&'a mut R) -> FieldRef<'a> + Send + Sync + 'static,
{
    Box::new(f)
}

/// One named entry of a [`Schema`].
pub struct Field<R> {
    name: &'static str,
    kind: FieldKind,
    optional: bool,
    access: Accessor<R>,
}

impl<R> Field<R> {
    /// Dot-joined name of the field.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Segments of the name.
    pub fn path(&self) -> impl Iterator<Item = &'static str> {
        self.name.split('.')
    }

    /// Attribute or block.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Optional fields may be absent from the source.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Addresses the field inside `record`, allocating intermediate layers.
    pub fn resolve<'a>(&self, record: &'a mut R) -> FieldRef<'a> {
        (self.access)(record)
    }
}

impl<R> fmt::Debug for Field<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("optional", &self.optional)
            .finish_non_exhaustive()
    }
}

/// The ordered field table of a record type.
pub struct Schema<R> {
    fields: Vec<Field<R>>,
    by_name: HashMap<&'static str, usize>,
}

impl<R> Schema<R> {
    /// Starts registering fields for `R`.
    pub fn builder() -> SchemaBuilder<R> {
        SchemaBuilder { fields: Vec::new() }
    }

    /// Looks a field up by its full name.
    pub fn get(&self, name: &str) -> Option<&Field<R>> {
        self.by_name.get(name).map(|&index| &self.fields[index])
    }

    /// Fields in registration order.
    pub fn fields(&self) -> impl Iterator<Item = &Field<R>> {
        self.fields.iter()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<R> fmt::Debug for Schema<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.fields).finish()
    }
}

/// Registers the fields of a [`Schema`].
///
/// Every method adds one required field; chain [`optional`](Self::optional)
/// to relax the field added last.
pub struct SchemaBuilder<R> {
    fields: Vec<Field<R>>,
}

impl<R: 'static> SchemaBuilder<R> {
    fn push(mut self, name: &'static str, kind: FieldKind, access: Accessor<R>) -> Self {
        self.fields.push(Field {
            name,
            kind,
            optional: false,
            access,
        });
        self
    }

    /// An attribute converted into `V`.
    pub fn attr<V, F>(self, name: &'static str, access: F) -> Self
    where
        V: DecodeValue + 'static,
        F: for<'a> Fn(&'a mut R) -> &'a mut V + Send + Sync + 'static,
    {
        self.push(
            name,
            FieldKind::Attribute,
            accessor(move |record| FieldRef::Attribute(access(record))),
        )
    }

    /// A block decoded directly into the record `V`; may appear once.
    pub fn block<V, F>(self, name: &'static str, access: F) -> Self
    where
        V: Block,
        F: for<'a> Fn(&'a mut R) -> &'a mut V + Send + Sync + 'static,
    {
        self.push(
            name,
            FieldKind::Block,
            accessor(move |record| FieldRef::Singular(access(record))),
        )
    }

    /// A block decoded into an `Option<V>`, which becomes `Some` on first use.
    pub fn option_block<V, F>(self, name: &'static str, access: F) -> Self
    where
        V: Block + Default,
        F: for<'a> Fn(&'a mut R) -> &'a mut Option<V> + Send + Sync + 'static,
    {
        self.push(
            name,
            FieldKind::Block,
            accessor(move |record| {
                FieldRef::Singular(access(record).get_or_insert_with(V::default))
            }),
        )
    }

    /// A repeatable block collected into a `Vec<V>` in source order.
    pub fn blocks<V, F>(self, name: &'static str, access: F) -> Self
    where
        V: Block + Default,
        F: for<'a> Fn(&'a mut R) -> &'a mut Vec<V> + Send + Sync + 'static,
    {
        self.push(
            name,
            FieldKind::Block,
            accessor(move |record| FieldRef::Growable(access(record))),
        )
    }

    /// A block that must appear exactly `N` times.
    pub fn block_array<V, F, const N: usize>(self, name: &'static str, access: F) -> Self
    where
        V: Block,
        F: for<'a> Fn(&'a mut R) -> &'a mut [V; N] + Send + Sync + 'static,
    {
        self.push(
            name,
            FieldKind::Block,
            accessor(move |record| FieldRef::Fixed(access(record))),
        )
    }

    /// Marks the field registered last as optional.
    ///
    /// # Panics
    /// If no field has been registered yet.
    pub fn optional(mut self) -> Self {
        match self.fields.last_mut() {
            Some(field) => field.optional = true,
            None => panic!("optional() called before any field was registered"),
        }
        self
    }

    /// Finishes the schema.
    ///
    /// # Panics
    /// If two fields share a name.
    pub fn build(self) -> Schema<R> {
        let mut by_name = HashMap::with_capacity(self.fields.len());
        for (index, field) in self.fields.iter().enumerate() {
            if by_name.insert(field.name, index).is_some() {
                panic!("field {:?} registered twice", field.name);
            }
        }
        Schema {
            fields: self.fields,
            by_name,
        }
    }
}

/// Builds a `'static` [`Schema`] on first use and returns it on every call.
///
/// Meant as the body of [`Block::schema`]:
///
/// ```
/// # use kdl_decode::{Block, Schema, static_schema};
/// #[derive(Default)]
/// struct Rule {
///     action: String,
/// }
///
/// impl Block for Rule {
///     fn schema() -> &'static Schema<Self> {
///         static_schema!(Rule, |schema| schema.attr("action", |r| &mut r.action))
///     }
/// }
/// # assert_eq!(Rule::schema().len(), 1);
/// ```
#[macro_export]
macro_rules! static_schema {
    ($ty:ty, |$builder:ident| $body:expr) => {{
        static SCHEMA: ::std::sync::OnceLock<$crate::Schema<$ty>> = ::std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| {
            let $builder = $crate::Schema::<$ty>::builder();
            $body.build()
        })
    }};
}
