//! Attribute layouts
//!
//! A layout describes the shape of an attribute as a tree of elements. The
//! codec does not interpret attribute contents; it only walks the tree to
//! decide which bands an attribute needs and how they are coded.
//!
//! Layouts are normally produced by a layout-language parser outside this
//! crate. The standard attributes are built here directly with the element
//! constructors.

use crate::index::CpTag;
use bandpack_format::{Coding, BCI5, BRANCH5, BYTE1, SIGNED5, UNSIGNED5};
use serde::Serialize;
use std::fmt;

/// Attribute context: which kind of structure an attribute hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AttrContext {
    /// Class attributes.
    Class = 0,
    /// Field attributes.
    Field = 1,
    /// Method attributes.
    Method = 2,
    /// Code attributes.
    Code = 3,
}

impl AttrContext {
    /// All contexts in table order.
    pub const ALL: [AttrContext; 4] = [AttrContext::Class, AttrContext::Field, AttrContext::Method, AttrContext::Code];

    /// Table slot.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Lower-case name used as a band name prefix.
    pub fn name(self) -> &'static str {
        match self {
            AttrContext::Class => "class",
            AttrContext::Field => "field",
            AttrContext::Method => "method",
            AttrContext::Code => "code",
        }
    }
}

impl fmt::Display for AttrContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a layout element stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Plain integer of `len` bytes.
    Int {
        /// Width in the class file.
        len: u8,
        /// Sign-extended.
        signed: bool,
    },
    /// Bytecode index; `delta` for an index relative to the previous one.
    Bci {
        /// Transmitted as a difference.
        delta: bool,
    },
    /// Bytecode offset.
    Bco,
    /// Flag word of `len` bytes.
    Flag {
        /// Width in the class file.
        len: u8,
    },
    /// Count followed by that many copies of `body`.
    Replication {
        /// Width of the count.
        len: u8,
        /// Repeated elements.
        body: Vec<LayoutElement>,
    },
    /// Tag followed by the case selected by it.
    Union {
        /// Width of the tag.
        len: u8,
        /// Sign-extended tag.
        signed: bool,
        /// Cases, each an [`ElementKind::Case`].
        body: Vec<LayoutElement>,
    },
    /// One arm of a union.
    Case {
        /// Shares the body of an earlier case and owns no bands.
        back: bool,
        /// Elements of this arm.
        body: Vec<LayoutElement>,
    },
    /// Constant-pool reference.
    Reference {
        /// Index the reference points into.
        tag: CpTag,
        /// Zero means "no entry".
        null_ok: bool,
    },
    /// Call to a callable by relative number.
    Call {
        /// Target callable.
        target: i32,
    },
    /// Named group of elements reachable by calls.
    Callable {
        /// Elements of the callable.
        body: Vec<LayoutElement>,
    },
}

/// One element of an attribute layout.
///
/// `layout` is the element's own spelling (for example `"NH"` or `"RUNH"`);
/// bands are named after it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayoutElement {
    /// Source spelling of this element, without its body.
    pub layout: String,
    /// Element kind and its parameters.
    pub kind: ElementKind,
}

impl LayoutElement {
    fn new(layout: &str, kind: ElementKind) -> Self {
        Self {
            layout: layout.to_string(),
            kind,
        }
    }

    /// Unsigned integer of `len` bytes.
    pub fn int(layout: &str, len: u8) -> Self {
        Self::new(layout, ElementKind::Int { len, signed: false })
    }

    /// Signed integer of `len` bytes.
    pub fn signed(layout: &str, len: u8) -> Self {
        Self::new(layout, ElementKind::Int { len, signed: true })
    }

    /// Bytecode index.
    pub fn bci(layout: &str) -> Self {
        Self::new(layout, ElementKind::Bci { delta: false })
    }

    /// Bytecode index relative to the previous one.
    pub fn bci_delta(layout: &str) -> Self {
        Self::new(layout, ElementKind::Bci { delta: true })
    }

    /// Bytecode offset.
    pub fn bco(layout: &str) -> Self {
        Self::new(layout, ElementKind::Bco)
    }

    /// Flag word.
    pub fn flag(layout: &str, len: u8) -> Self {
        Self::new(layout, ElementKind::Flag { len })
    }

    /// Counted repetition.
    pub fn replication(layout: &str, len: u8, body: Vec<LayoutElement>) -> Self {
        Self::new(layout, ElementKind::Replication { len, body })
    }

    /// Tagged union over `cases`.
    pub fn union(layout: &str, len: u8, cases: Vec<LayoutElement>) -> Self {
        Self::new(layout, ElementKind::Union { len, signed: false, body: cases })
    }

    /// Union arm with its own body.
    pub fn case(layout: &str, body: Vec<LayoutElement>) -> Self {
        Self::new(layout, ElementKind::Case { back: false, body })
    }

    /// Union arm reusing an earlier arm's body.
    pub fn back_case(layout: &str) -> Self {
        Self::new(layout, ElementKind::Case { back: true, body: Vec::new() })
    }

    /// Constant-pool reference.
    pub fn reference(layout: &str, tag: CpTag, null_ok: bool) -> Self {
        Self::new(layout, ElementKind::Reference { tag, null_ok })
    }

    /// Call to a callable.
    pub fn call(target: i32) -> Self {
        Self::new(&format!("({})", target), ElementKind::Call { target })
    }

    /// Callable group.
    pub fn callable(body: Vec<LayoutElement>) -> Self {
        Self::new("[]", ElementKind::Callable { body })
    }

    /// Nested elements, if any.
    pub fn body(&self) -> &[LayoutElement] {
        match &self.kind {
            ElementKind::Replication { body, .. }
            | ElementKind::Union { body, .. }
            | ElementKind::Case { body, .. }
            | ElementKind::Callable { body } => body,
            _ => &[],
        }
    }

    /// Band shape this element needs, if it gets a band of its own.
    pub fn band_spec(&self) -> Option<ElementBand> {
        let by_len = |len: u8, signed: bool| {
            if signed {
                SIGNED5
            } else if len == 1 {
                BYTE1
            } else {
                UNSIGNED5
            }
        };
        let coding = match &self.kind {
            ElementKind::Int { len, signed } => by_len(*len, *signed),
            ElementKind::Bci { delta: false } => BCI5,
            ElementKind::Bci { delta: true } | ElementKind::Bco => BRANCH5,
            ElementKind::Flag { len } | ElementKind::Replication { len, .. } => by_len(*len, false),
            ElementKind::Union { len, signed, .. } => by_len(*len, *signed),
            ElementKind::Reference { tag, null_ok } => {
                return Some(ElementBand::Reference {
                    tag: *tag,
                    null_ok: *null_ok,
                })
            }
            ElementKind::Case { .. } | ElementKind::Call { .. } | ElementKind::Callable { .. } => return None,
        };
        Some(ElementBand::Int(coding))
    }

    /// Bodies walked when allocating bands below this element.
    fn band_bodies(&self) -> &[LayoutElement] {
        match &self.kind {
            ElementKind::Case { back: true, .. } => &[],
            _ => self.body(),
        }
    }
}

/// Band needed by a layout element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementBand {
    /// Integer band with this regular coding.
    Int(Coding),
    /// `UNSIGNED5` reference band.
    Reference {
        /// Index of the references.
        tag: CpTag,
        /// Zero means "no entry".
        null_ok: bool,
    },
}

/// Visit every element that owns a band, in band allocation order.
pub fn walk_band_elements<'a>(elems: &'a [LayoutElement], visit: &mut dyn FnMut(&'a LayoutElement)) {
    for e in elems {
        if e.band_spec().is_some() {
            visit(e);
        }
        walk_band_elements(e.band_bodies(), visit);
    }
}

/// Band name for element `e`, the `n`-th band of its aggregate.
///
/// The element spelling is cut at its first bracket or parenthesis and a
/// trailing `H` is dropped.
pub fn element_band_name(prefix: &str, n: usize, e: &LayoutElement) -> String {
    let mut name = format!("{}{}_{}", prefix, n, e.layout);
    for stop in ['[', '('] {
        if let Some(pos) = name.find(stop).filter(|pos| *pos > 0) {
            name.truncate(pos);
        }
    }
    if name.ends_with('H') {
        name.pop();
    }
    name
}

/// An attribute definition: context, name and element tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Layout {
    /// Context the attribute belongs to.
    pub ctx: AttrContext,
    /// Attribute name.
    pub name: String,
    /// Layout string as transmitted in the archive.
    pub layout: String,
    /// Parsed elements.
    pub elements: Vec<LayoutElement>,
}

impl Layout {
    /// New layout definition.
    pub fn new(ctx: AttrContext, name: &str, layout: &str, elements: Vec<LayoutElement>) -> Self {
        Self {
            ctx,
            name: name.to_string(),
            layout: layout.to_string(),
            elements,
        }
    }

    /// Attribute with no contents.
    pub fn empty(ctx: AttrContext, name: &str) -> Self {
        Self::new(ctx, name, "", Vec::new())
    }

    /// Number of bands this layout needs.
    pub fn band_count(&self) -> usize {
        let mut n = 0;
        walk_band_elements(&self.elements, &mut |_| n += 1);
        n
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}[{}]", self.ctx, self.name, self.layout)
    }
}

/// Layouts of the standard attributes with fixed shapes.
pub mod standard {
    use super::*;
    use LayoutElement as E;

    /// `SourceFile`: `RUNH`.
    pub fn source_file() -> Layout {
        Layout::new(AttrContext::Class, "SourceFile", "RUNH", vec![E::reference("RUNH", CpTag::Utf8, true)])
    }

    /// `EnclosingMethod`: `RCHRDNH`.
    pub fn enclosing_method() -> Layout {
        Layout::new(
            AttrContext::Class,
            "EnclosingMethod",
            "RCHRDNH",
            vec![
                E::reference("RCH", CpTag::Class, false),
                E::reference("RDNH", CpTag::NameAndType, true),
            ],
        )
    }

    /// `.ClassFile.version`: `HH`.
    pub fn class_file_version() -> Layout {
        Layout::new(
            AttrContext::Class,
            ".ClassFile.version",
            "HH",
            vec![E::int("H", 2), E::int("H", 2)],
        )
    }

    /// `Signature`: `RSH`.
    pub fn signature(ctx: AttrContext) -> Layout {
        Layout::new(ctx, "Signature", "RSH", vec![E::reference("RSH", CpTag::Signature, false)])
    }

    /// `ConstantValue`: `KQH`, indexed by the field's constant type.
    pub fn constant_value() -> Layout {
        Layout::new(
            AttrContext::Field,
            "ConstantValue",
            "KQH",
            vec![E::reference("KQH", CpTag::FieldSpecific, false)],
        )
    }

    /// `Exceptions`: `NH[RCH]`.
    pub fn exceptions() -> Layout {
        Layout::new(
            AttrContext::Method,
            "Exceptions",
            "NH[RCH]",
            vec![E::replication("NH", 2, vec![E::reference("RCH", CpTag::Class, false)])],
        )
    }

    /// `MethodParameters`: `NB[RUNHFH]`.
    pub fn method_parameters() -> Layout {
        Layout::new(
            AttrContext::Method,
            "MethodParameters",
            "NB[RUNHFH]",
            vec![E::replication(
                "NB",
                1,
                vec![E::reference("RUNH", CpTag::Utf8, true), E::flag("FH", 2)],
            )],
        )
    }

    /// `LineNumberTable`: `NH[PHH]`.
    pub fn line_number_table() -> Layout {
        Layout::new(
            AttrContext::Code,
            "LineNumberTable",
            "NH[PHH]",
            vec![E::replication("NH", 2, vec![E::bci("PH"), E::int("H", 2)])],
        )
    }

    /// `LocalVariableTable` and `LocalVariableTypeTable`: `NH[PHOHRUHRSHH]`.
    pub fn local_variable_table(name: &str) -> Layout {
        Layout::new(
            AttrContext::Code,
            name,
            "NH[PHOHRUHRSHH]",
            vec![E::replication(
                "NH",
                2,
                vec![
                    E::bci("PH"),
                    E::bco("OH"),
                    E::reference("RUH", CpTag::Utf8, false),
                    E::reference("RSH", CpTag::Signature, false),
                    E::int("H", 2),
                ],
            )],
        )
    }

    /// `StackMapTable`, as a set of callables.
    pub fn stack_map_table() -> Layout {
        let call = E::call;
        let frame = E::union(
            "TB",
            1,
            vec![
                E::case("(64-127)", vec![call(2)]),
                E::case("(247)", vec![call(1), call(2)]),
                E::case("(248-251)", vec![call(1)]),
                E::case("(252)", vec![call(1), call(2)]),
                E::case("(253)", vec![call(1), call(2), call(2)]),
                E::case("(254)", vec![call(1), call(2), call(2), call(2)]),
                E::case(
                    "(255)",
                    vec![
                        call(1),
                        E::replication("NH", 2, vec![call(2)]),
                        E::replication("NH", 2, vec![call(2)]),
                    ],
                ),
                E::case("()", vec![]),
            ],
        );
        let verification_type = E::union(
            "TB",
            1,
            vec![
                E::case("(7)", vec![E::reference("RCH", CpTag::Class, false)]),
                E::case("(8)", vec![E::bci("PH")]),
                E::case("()", vec![]),
            ],
        );
        Layout::new(
            AttrContext::Code,
            "StackMapTable",
            "[NH[(1)]][TB(64-127)[(2)](247)[(1)(2)](248-251)[(1)](252)[(1)(2)](253)[(1)(2)(2)]\
             (254)[(1)(2)(2)(2)](255)[(1)NH[(2)]NH[(2)]]()[]][H][TB(7)[RCH](8)[PH]()[]]",
            vec![
                E::callable(vec![E::replication("NH", 2, vec![call(1)])]),
                E::callable(vec![frame]),
                E::callable(vec![E::int("H", 2)]),
                E::callable(vec![verification_type]),
            ],
        )
    }

    /// Annotation layouts: `annotations`, `annotation` and `value` callables.
    fn annotation_callables() -> Vec<LayoutElement> {
        vec![
            E::callable(vec![E::replication("NH", 2, vec![E::call(1)])]),
            annotation_callable(),
            value_callable(),
        ]
    }

    fn annotation_callable() -> LayoutElement {
        E::callable(vec![
            E::reference("RSH", CpTag::Signature, false),
            E::replication("NH", 2, vec![E::reference("RUH", CpTag::Utf8, false), E::call(1)]),
        ])
    }

    fn value_callable() -> LayoutElement {
        let k = |layout: &str, tag: CpTag| E::reference(layout, tag, false);
        E::callable(vec![E::union(
            "TB",
            1,
            vec![
                E::case("(66,67,73,83,90)", vec![k("KIH", CpTag::Integer)]),
                E::case("(68)", vec![k("KDH", CpTag::Double)]),
                E::case("(70)", vec![k("KFH", CpTag::Float)]),
                E::case("(74)", vec![k("KJH", CpTag::Long)]),
                E::case("(99)", vec![k("RSH", CpTag::Signature)]),
                E::case("(101)", vec![k("RSH", CpTag::Signature), k("RUH", CpTag::Utf8)]),
                E::case("(115)", vec![k("RUH", CpTag::Utf8)]),
                E::case("(91)", vec![E::replication("NH", 2, vec![E::call(0)])]),
                E::case(
                    "(64)",
                    vec![
                        k("RSH", CpTag::Signature),
                        E::replication("NH", 2, vec![k("RUH", CpTag::Utf8), E::call(0)]),
                    ],
                ),
                E::case("()", vec![]),
            ],
        )])
    }

    const ANNOTATIONS: &str = "[NH[(1)]][RSHNH[RUH(1)]][TB(66,67,73,83,90)[KIH](68)[KDH](70)[KFH](74)[KJH]\
                               (99)[RSH](101)[RSHRUH](115)[RUH](91)[NH[(0)]](64)[RSHNH[RUH(0)]]()[]]";

    /// `RuntimeVisibleAnnotations` and `RuntimeInvisibleAnnotations`.
    pub fn annotations(ctx: AttrContext, name: &str) -> Layout {
        Layout::new(ctx, name, ANNOTATIONS, annotation_callables())
    }

    /// `Runtime(In)VisibleParameterAnnotations`.
    pub fn parameter_annotations(name: &str) -> Layout {
        let mut elements = vec![E::callable(vec![E::replication("NB", 1, vec![E::call(1)])])];
        elements.extend(annotation_callables());
        Layout::new(
            AttrContext::Method,
            name,
            &format!("[NB[(1)]]{}", ANNOTATIONS),
            elements,
        )
    }

    /// `AnnotationDefault`: a single element value.
    pub fn annotation_default() -> Layout {
        Layout::new(
            AttrContext::Method,
            "AnnotationDefault",
            "[TB(66,67,73,83,90)[KIH](68)[KDH](70)[KFH](74)[KJH](99)[RSH](101)[RSHRUH](115)[RUH]\
             (91)[NH[(0)]](64)[RSHNH[RUH(0)]]()[]]",
            vec![value_callable()],
        )
    }

    /// `Runtime(In)VisibleTypeAnnotations`.
    pub fn type_annotations(ctx: AttrContext, name: &str) -> Layout {
        let target_info = E::union(
            "TB",
            1,
            vec![
                E::case("(0-1)", vec![E::int("B", 1)]),
                E::case("(16)", vec![E::flag("FH", 2)]),
                E::case("(17-18)", vec![E::int("B", 1), E::int("B", 1)]),
                E::case("(19-21)", vec![]),
                E::case("(22)", vec![E::int("B", 1)]),
                E::case("(23)", vec![E::int("H", 2)]),
                E::case(
                    "(64-65)",
                    vec![E::replication("NH", 2, vec![E::bci("PH"), E::bco("OH"), E::int("H", 2)])],
                ),
                E::case("(66)", vec![E::int("H", 2)]),
                E::case("(67-70)", vec![E::bci("PH")]),
                E::case("(71-75)", vec![E::bci("PH"), E::int("B", 1)]),
                E::case("()", vec![]),
            ],
        );
        let elements = vec![
            E::callable(vec![E::replication("NH", 2, vec![E::call(1), E::call(2), E::call(3)])]),
            E::callable(vec![target_info]),
            E::callable(vec![E::replication("NB", 1, vec![E::int("B", 1), E::int("B", 1)])]),
            annotation_callable(),
            value_callable(),
        ];
        Layout::new(
            ctx,
            name,
            "[NH[(1)(2)(3)]][TB(0-1)[B](16)[FH](17-18)[BB](19-21)[](22)[B](23)[H](64-65)[NH[PHOHH]]\
             (66)[H](67-70)[PH](71-75)[PHB]()[]][NB[BB]]",
            elements,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_names() {
        let e = LayoutElement::replication("NH", 2, vec![]);
        assert_eq!(element_band_name("class_RVA_", 0, &e), "class_RVA_0_N");
        let e = LayoutElement::reference("RUNH", CpTag::Utf8, true);
        assert_eq!(element_band_name("code_x_", 3, &e), "code_x_3_RUN");
        let e = LayoutElement::union("TB(1)[]", 1, vec![]);
        assert_eq!(element_band_name("p_", 4, &e), "p_4_TB");
        let e = LayoutElement::int("B", 1);
        assert_eq!(element_band_name("p_", 12, &e), "p_12_B");
    }

    #[test]
    fn test_band_specs() {
        use LayoutElement as E;
        assert_eq!(E::int("H", 2).band_spec(), Some(ElementBand::Int(UNSIGNED5)));
        assert_eq!(E::int("B", 1).band_spec(), Some(ElementBand::Int(BYTE1)));
        assert_eq!(E::signed("SH", 2).band_spec(), Some(ElementBand::Int(SIGNED5)));
        assert_eq!(E::bci("PH").band_spec(), Some(ElementBand::Int(BCI5)));
        assert_eq!(E::bci_delta("POH").band_spec(), Some(ElementBand::Int(BRANCH5)));
        assert_eq!(E::bco("OH").band_spec(), Some(ElementBand::Int(BRANCH5)));
        assert_eq!(E::call(0).band_spec(), None);
        assert_eq!(
            E::reference("RUNH", CpTag::Utf8, true).band_spec(),
            Some(ElementBand::Reference {
                tag: CpTag::Utf8,
                null_ok: true
            })
        );
    }

    #[test]
    fn test_standard_band_counts() {
        assert_eq!(standard::source_file().band_count(), 1);
        assert_eq!(standard::exceptions().band_count(), 2);
        assert_eq!(standard::method_parameters().band_count(), 3);
        assert_eq!(standard::local_variable_table("LocalVariableTable").band_count(), 6);
        assert_eq!(standard::stack_map_table().band_count(), 8);
        assert_eq!(standard::annotations(AttrContext::Class, "RuntimeVisibleAnnotations").band_count(), 17);
        assert_eq!(standard::parameter_annotations("RuntimeVisibleParameterAnnotations").band_count(), 18);
        assert_eq!(standard::annotation_default().band_count(), 13);
    }

    #[test]
    fn test_back_case_owns_no_bands() {
        use LayoutElement as E;
        let layout = Layout::new(
            AttrContext::Code,
            "X",
            "TB(1)[H](2)[(1)]",
            vec![E::union("TB", 1, vec![E::case("(1)", vec![E::int("H", 2)]), E::back_case("(2)")])],
        );
        assert_eq!(layout.band_count(), 2);
    }
}
