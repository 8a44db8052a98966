//! Attribute definition tables
//!
//! Each context keeps a table of attribute definitions indexed by flag bit.
//! The first 32 (or 63, with `flags_hi`) indexes are flag slots; definitions
//! beyond that are "overflow" attributes counted explicitly per holder.
//!
//! Predefined attributes occupy fixed slots. An archive may redefine a slot
//! once; the tables remember which slots were explicitly defined so a second
//! definition is rejected.

use crate::layout::{AttrContext, Layout};
use bandpack_format::{PackError, Result};
use bitvec::prelude::*;

/// Flag bit that marks an overflow attribute count.
pub const X_ATTR_OVERFLOW: usize = 16;
/// `SourceFile` (class).
pub const CLASS_ATTR_SOURCE_FILE: usize = 17;
/// `EnclosingMethod` (class).
pub const CLASS_ATTR_ENCLOSING_METHOD: usize = 18;
/// `Signature` (class, field, method).
pub const X_ATTR_SIGNATURE: usize = 19;
/// `Deprecated` (class, field, method).
pub const X_ATTR_DEPRECATED: usize = 20;
/// `RuntimeVisibleAnnotations` (class, field, method).
pub const X_ATTR_RUNTIME_VISIBLE_ANNOTATIONS: usize = 21;
/// `RuntimeInvisibleAnnotations` (class, field, method).
pub const X_ATTR_RUNTIME_INVISIBLE_ANNOTATIONS: usize = 22;
/// `InnerClasses` (class).
pub const CLASS_ATTR_INNER_CLASSES: usize = 23;
/// `.ClassFile.version` pseudo-attribute (class).
pub const CLASS_ATTR_CLASS_FILE_VERSION: usize = 24;
/// `RuntimeVisibleTypeAnnotations` (all contexts).
pub const X_ATTR_RUNTIME_VISIBLE_TYPE_ANNOTATIONS: usize = 27;
/// `RuntimeInvisibleTypeAnnotations` (all contexts).
pub const X_ATTR_RUNTIME_INVISIBLE_TYPE_ANNOTATIONS: usize = 28;
/// `ConstantValue` (field).
pub const FIELD_ATTR_CONSTANT_VALUE: usize = 17;
/// `Code` (method).
pub const METHOD_ATTR_CODE: usize = 17;
/// `Exceptions` (method).
pub const METHOD_ATTR_EXCEPTIONS: usize = 18;
/// `RuntimeVisibleParameterAnnotations` (method).
pub const METHOD_ATTR_RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS: usize = 23;
/// `RuntimeInvisibleParameterAnnotations` (method).
pub const METHOD_ATTR_RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS: usize = 24;
/// `AnnotationDefault` (method).
pub const METHOD_ATTR_ANNOTATION_DEFAULT: usize = 25;
/// `MethodParameters` (method).
pub const METHOD_ATTR_METHOD_PARAMETERS: usize = 26;
/// `StackMapTable` (code).
pub const CODE_ATTR_STACK_MAP_TABLE: usize = 0;
/// `LineNumberTable` (code).
pub const CODE_ATTR_LINE_NUMBER_TABLE: usize = 1;
/// `LocalVariableTable` (code).
pub const CODE_ATTR_LOCAL_VARIABLE_TABLE: usize = 2;
/// `LocalVariableTypeTable` (code).
pub const CODE_ATTR_LOCAL_VARIABLE_TYPE_TABLE: usize = 3;

/// Flag slots available without `flags_hi`.
pub const ATTR_INDEX_LIMIT_LO: usize = 32;
/// Flag slots available with `flags_hi`.
pub const ATTR_INDEX_LIMIT_HI: usize = 63;
const MASK_BITS: usize = 64;

/// Archive option bit announcing `flags_hi` for `ctx`.
pub fn flags_hi_option(ctx: AttrContext) -> u32 {
    1 << (9 + ctx.index())
}

/// Where a definition goes: a fixed flag slot or the overflow list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrSlot {
    /// Explicit flag index.
    Flag(usize),
    /// Appended after every flag slot.
    Overflow,
}

type AttrMask = BitVec<u64, Lsb0>;

fn empty_mask() -> AttrMask {
    BitVec::repeat(false, MASK_BITS)
}

fn single_bit(bit: usize) -> AttrMask {
    let mut mask = empty_mask();
    mask.set(bit, true);
    mask
}

fn raw(mask: &AttrMask) -> u64 {
    mask.as_raw_slice().first().copied().unwrap_or(0)
}

/// Per-context attribute definitions and the flag masks derived from them.
#[derive(Debug, Clone)]
pub struct AttrTables {
    defs: [Vec<Option<Layout>>; 4],
    index_limit: [usize; 4],
    flag_mask: [AttrMask; 4],
    def_seen: [AttrMask; 4],
    overflow_mask: [AttrMask; 4],
    class_file_version_mask: AttrMask,
}

impl Default for AttrTables {
    fn default() -> Self {
        Self::new()
    }
}

impl AttrTables {
    /// Tables open for predefinition: 32 empty slots per context.
    pub fn new() -> Self {
        Self {
            defs: std::array::from_fn(|_| vec![None; ATTR_INDEX_LIMIT_LO]),
            index_limit: [ATTR_INDEX_LIMIT_LO; 4],
            flag_mask: std::array::from_fn(|_| empty_mask()),
            def_seen: std::array::from_fn(|_| empty_mask()),
            overflow_mask: std::array::from_fn(|_| empty_mask()),
            class_file_version_mask: empty_mask(),
        }
    }

    /// Close predefinition: forget which slots were defined so the archive
    /// may redefine them, and leave the index limits undecided until
    /// [`AttrTables::init_index_limit`].
    pub fn finish_predefs(&mut self) {
        for ctx in AttrContext::ALL {
            let i = ctx.index();
            self.def_seen[i] = empty_mask();
            self.overflow_mask[i] = single_bit(X_ATTR_OVERFLOW);
            self.index_limit[i] = 0;
        }
        self.class_file_version_mask = single_bit(CLASS_ATTR_CLASS_FILE_VERSION);
    }

    /// Decide the index limits from the archive options.
    pub fn init_index_limit(&mut self, archive_options: u32) -> Result<()> {
        for ctx in AttrContext::ALL {
            let i = ctx.index();
            if self.index_limit[i] != 0 {
                return Err(PackError::Invariant(format!(
                    "{} attribute index limit already decided",
                    ctx
                )));
            }
            let limit = if archive_options & flags_hi_option(ctx) != 0 {
                ATTR_INDEX_LIMIT_HI
            } else {
                ATTR_INDEX_LIMIT_LO
            };
            self.index_limit[i] = limit;
            let defs = &mut self.defs[i];
            if defs.len() < limit {
                defs.resize(limit, None);
            }
        }
        Ok(())
    }

    /// Install `def` in `slot`, returning the index it landed on.
    ///
    /// Explicitly defining the same flag slot twice is an error.
    pub fn set_layout_index(&mut self, def: Layout, slot: AttrSlot) -> Result<usize> {
        let i = def.ctx.index();
        let index = match slot {
            AttrSlot::Overflow => {
                let index = self.defs[i].len();
                tracing::debug!(attr = %def, index, "adding overflow attribute");
                self.defs[i].push(Some(def));
                return Ok(index);
            }
            AttrSlot::Flag(index) => index,
        };
        if index >= self.index_limit[i] || index >= MASK_BITS {
            return Err(PackError::AttributeDefinition(format!(
                "flag index {} out of range for {}",
                index, def
            )));
        }
        if self.def_seen[i][index] {
            return Err(PackError::AttributeDefinition(format!(
                "multiple explicit definition at {}: {}",
                index, def
            )));
        }
        self.def_seen[i].set(index, true);
        self.flag_mask[i].set(index, true);
        if let Some(old) = &self.defs[i][index] {
            tracing::debug!(attr = %def, index, replacing = %old, "fixing attribute");
        }
        self.defs[i][index] = Some(def);
        Ok(index)
    }

    /// Remove the definition at `index`, returning it.
    pub fn undefine(&mut self, ctx: AttrContext, index: usize) -> Result<Layout> {
        let i = ctx.index();
        let def = self.defs[i]
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| PackError::AttributeDefinition(format!("no {} attribute at {}", ctx, index)))?;
        if index < MASK_BITS {
            self.def_seen[i].set(index, false);
            self.flag_mask[i].set(index, false);
        }
        tracing::debug!(attr = %def, index, "removing attribute");
        Ok(def)
    }

    /// Clear the overflow and class-file-version bits of slots the archive
    /// took over with its own definitions.
    pub fn adjust_special_attr_masks(&mut self) {
        let seen: Vec<usize> = self.def_seen[AttrContext::Class.index()].iter_ones().collect();
        for bit in seen {
            self.class_file_version_mask.set(bit, false);
        }
        for i in 0..self.def_seen.len() {
            let seen: Vec<usize> = self.def_seen[i].iter_ones().collect();
            for bit in seen {
                self.overflow_mask[i].set(bit, false);
            }
        }
    }

    /// Current index limit; zero while undecided.
    pub fn index_limit(&self, ctx: AttrContext) -> usize {
        self.index_limit[ctx.index()]
    }

    /// Every slot of `ctx`, flag and overflow.
    pub fn defs(&self, ctx: AttrContext) -> &[Option<Layout>] {
        &self.defs[ctx.index()]
    }

    /// Definition at `index`, if any.
    pub fn def(&self, ctx: AttrContext, index: usize) -> Option<&Layout> {
        self.defs[ctx.index()].get(index).and_then(Option::as_ref)
    }

    /// Index of `def` in its context.
    pub fn index_of(&self, def: &Layout) -> Option<usize> {
        self.defs[def.ctx.index()]
            .iter()
            .position(|d| d.as_ref() == Some(def))
    }

    /// Flag bits claimed by attributes.
    pub fn flag_mask(&self, ctx: AttrContext) -> u64 {
        raw(&self.flag_mask[ctx.index()])
    }

    /// Flag bits explicitly defined by the archive.
    pub fn def_seen(&self, ctx: AttrContext) -> u64 {
        raw(&self.def_seen[ctx.index()])
    }

    /// Bits that still mean "overflow count follows".
    pub fn overflow_mask(&self, ctx: AttrContext) -> u64 {
        raw(&self.overflow_mask[ctx.index()])
    }

    /// Bits that still mean "class file version follows".
    pub fn class_file_version_mask(&self) -> u64 {
        raw(&self.class_file_version_mask)
    }

    /// True if slot `index` holds a definition the archive did not supply.
    pub fn is_predefined_attr(&self, ctx: AttrContext, index: usize) -> bool {
        let i = ctx.index();
        if index >= self.index_limit[i] || (index < MASK_BITS && self.def_seen[i][index]) {
            return false;
        }
        self.def(ctx, index).is_some()
    }

    /// Predefined definitions still in force, in slot order.
    pub fn predefined_attrs(&self, ctx: AttrContext) -> Vec<&Layout> {
        (0..self.index_limit(ctx))
            .filter(|&index| self.is_predefined_attr(ctx, index))
            .filter_map(|index| self.def(ctx, index))
            .collect()
    }

    /// Definitions with bands that need new bands: explicit definitions and
    /// overflow attributes.
    pub fn defs_needing_bands(&self, ctx: AttrContext) -> Vec<Layout> {
        let i = ctx.index();
        let limit = self.index_limit[i];
        self.defs[i]
            .iter()
            .enumerate()
            .filter_map(|(index, def)| {
                let def = def.as_ref()?;
                if def.band_count() == 0 {
                    return None;
                }
                let explicit = index >= limit || (index < MASK_BITS && self.def_seen[i][index]);
                explicit.then(|| def.clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::standard;

    fn tables() -> AttrTables {
        let mut t = AttrTables::new();
        t.set_layout_index(standard::source_file(), AttrSlot::Flag(CLASS_ATTR_SOURCE_FILE))
            .unwrap();
        t.set_layout_index(
            Layout::empty(AttrContext::Class, ".Overflow"),
            AttrSlot::Flag(X_ATTR_OVERFLOW),
        )
        .unwrap();
        t.finish_predefs();
        t.init_index_limit(0).unwrap();
        t
    }

    #[test]
    fn test_predefs_are_predefined() {
        let t = tables();
        assert!(t.is_predefined_attr(AttrContext::Class, CLASS_ATTR_SOURCE_FILE));
        assert!(!t.is_predefined_attr(AttrContext::Class, 0));
        assert_eq!(t.predefined_attrs(AttrContext::Class).len(), 2);
        assert_eq!(t.flag_mask(AttrContext::Class), (1 << 16) | (1 << 17));
        assert_eq!(t.def_seen(AttrContext::Class), 0);
    }

    #[test]
    fn test_redefinition_once() {
        let mut t = tables();
        let def = Layout::empty(AttrContext::Class, "Custom");
        t.set_layout_index(def.clone(), AttrSlot::Flag(CLASS_ATTR_SOURCE_FILE))
            .unwrap();
        assert!(!t.is_predefined_attr(AttrContext::Class, CLASS_ATTR_SOURCE_FILE));
        let again = t.set_layout_index(def, AttrSlot::Flag(CLASS_ATTR_SOURCE_FILE));
        assert!(matches!(again, Err(PackError::AttributeDefinition(_))));
    }

    #[test]
    fn test_overflow_appends() {
        let mut t = tables();
        let def = Layout::empty(AttrContext::Code, "Extra");
        let index = t.set_layout_index(def.clone(), AttrSlot::Overflow).unwrap();
        assert_eq!(index, ATTR_INDEX_LIMIT_LO);
        assert_eq!(t.index_of(&def), Some(index));
        assert!(!t.is_predefined_attr(AttrContext::Code, index));
    }

    #[test]
    fn test_flags_hi_limit() {
        let mut t = AttrTables::new();
        t.finish_predefs();
        t.init_index_limit(flags_hi_option(AttrContext::Method)).unwrap();
        assert_eq!(t.index_limit(AttrContext::Method), ATTR_INDEX_LIMIT_HI);
        assert_eq!(t.index_limit(AttrContext::Field), ATTR_INDEX_LIMIT_LO);
        assert_eq!(t.defs(AttrContext::Method).len(), ATTR_INDEX_LIMIT_HI);
        assert!(t.init_index_limit(0).is_err());
    }

    #[test]
    fn test_special_masks_follow_redefinition() {
        let mut t = tables();
        assert_eq!(t.overflow_mask(AttrContext::Class), 1 << X_ATTR_OVERFLOW);
        t.set_layout_index(
            Layout::empty(AttrContext::Class, "Mine"),
            AttrSlot::Flag(X_ATTR_OVERFLOW),
        )
        .unwrap();
        t.set_layout_index(
            Layout::empty(AttrContext::Class, "Other"),
            AttrSlot::Flag(CLASS_ATTR_CLASS_FILE_VERSION),
        )
        .unwrap();
        t.adjust_special_attr_masks();
        assert_eq!(t.overflow_mask(AttrContext::Class), 0);
        assert_eq!(t.overflow_mask(AttrContext::Field), 1 << X_ATTR_OVERFLOW);
        assert_eq!(t.class_file_version_mask(), 0);
    }

    #[test]
    fn test_undefine() {
        let mut t = tables();
        let def = t.undefine(AttrContext::Class, CLASS_ATTR_SOURCE_FILE).unwrap();
        assert_eq!(def.name, "SourceFile");
        assert_eq!(t.flag_mask(AttrContext::Class), 1 << 16);
        assert!(t.undefine(AttrContext::Class, CLASS_ATTR_SOURCE_FILE).is_err());
    }

    #[test]
    fn test_defs_needing_bands() {
        let mut t = tables();
        assert!(t.defs_needing_bands(AttrContext::Class).is_empty());
        t.set_layout_index(standard::exceptions(), AttrSlot::Overflow).unwrap();
        t.set_layout_index(Layout::empty(AttrContext::Method, "Empty"), AttrSlot::Overflow)
            .unwrap();
        let needing = t.defs_needing_bands(AttrContext::Method);
        assert_eq!(needing.len(), 1);
        assert_eq!(needing[0].name, "Exceptions");
    }
}
