//! Constant-pool index contract
//!
//! Reference bands never look inside constant-pool entries. They only need
//! to turn an entry into its position in some index and back, which is what
//! [`Index`] provides. Which index a band uses is decided by its [`CpTag`].

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Constant-pool tag a reference band points into.
///
/// The last five are pseudo-tags: they name a group of indexes or defer the
/// choice of index to run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CpTag {
    /// Modified UTF-8 strings.
    Utf8,
    /// `int` constants.
    Integer,
    /// `float` constants.
    Float,
    /// `long` constants.
    Long,
    /// `double` constants.
    Double,
    /// Class references.
    Class,
    /// String constants.
    String,
    /// Name-and-type descriptors.
    NameAndType,
    /// Field references.
    Fieldref,
    /// Method references.
    Methodref,
    /// Interface method references.
    InterfaceMethodref,
    /// Method handles.
    MethodHandle,
    /// Method types.
    MethodType,
    /// Bootstrap method specifiers.
    BootstrapMethod,
    /// Invokedynamic call sites.
    InvokeDynamic,
    /// Type signatures.
    Signature,
    /// No fixed index; the caller supplies one per reference.
    None,
    /// The whole constant pool.
    All,
    /// Anything an `ldc` may load.
    LoadableValue,
    /// Any field or method reference.
    AnyMember,
    /// Chosen per field from its constant value type.
    FieldSpecific,
}

impl CpTag {
    /// True if bands with this tag get their index bound up front.
    pub fn is_bindable(self) -> bool {
        !matches!(self, CpTag::None | CpTag::FieldSpecific)
    }
}

impl fmt::Display for CpTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Positional index over constant-pool entries.
pub trait Index<E>: fmt::Debug {
    /// Number of entries.
    fn size(&self) -> usize;

    /// Entry at `position`, if in range.
    fn entry(&self, position: usize) -> Option<&E>;

    /// Position of `entry`, if present.
    fn index_of(&self, entry: &E) -> Option<usize>;
}

/// Shared handle to an index; bands never own the entries they point at.
pub type IndexRef<E> = Arc<dyn Index<E> + Send + Sync>;

/// Supplies the index for each tag once the constant pool is final.
pub trait IndexSource<E> {
    /// Index for `tag`, or `None` if the archive has no such index.
    fn index_for(&self, tag: CpTag) -> Option<IndexRef<E>>;
}
