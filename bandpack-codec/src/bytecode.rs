//! Bytecode operand bands
//!
//! Constant-pool operands of instructions go to a band chosen by the kind of
//! entry they name, and branch targets are carried as differences between
//! encoded instruction positions.

use crate::bands::StaticBands;
use crate::index::CpTag;
use crate::structure::BandStructure;
use crate::tree::{CpRefBandId, IntBandId};
use bandpack_format::Result;
use std::fmt;

/// First field/method linker opcode (`getstatic`).
pub const FIRST_LINKER_OP: u8 = 178;
/// Last field linker opcode (`putfield`).
pub const LAST_FIELD_OP: u8 = 181;
/// Last method linker opcode that has a self form (`invokestatic`).
pub const LAST_SELF_METHOD_OP: u8 = 184;
/// First of the self-linker opcodes that refer to the current class.
pub const SELF_LINKER_OP: u8 = 202;
/// Added to a self-linker op when it is preceded by `aload_0`.
pub const SELF_LINKER_ALOAD_FLAG: u8 = 7;
/// Added to a self-linker op when it names the superclass.
pub const SELF_LINKER_SUPER_FLAG: u8 = 14;

/// Maps bytecode offsets to the positions branch labels are coded in.
pub trait BciMap {
    /// Coded position of bytecode offset `bci`.
    fn encode_bci(&self, bci: i32) -> i32;

    /// Bytecode offset of coded position `code`.
    fn decode_bci(&self, code: i32) -> i32;
}

/// Labels coded as raw bytecode offsets.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawBci;

impl BciMap for RawBci {
    fn encode_bci(&self, bci: i32) -> i32 {
        bci
    }

    fn decode_bci(&self, code: i32) -> i32 {
        code
    }
}

/// A self-linker opcode taken apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfOp {
    /// Underlying field or method opcode.
    pub op: u8,
    /// Refers to the superclass rather than the current class.
    pub is_super: bool,
    /// Folds a preceding `aload_0`.
    pub is_aload: bool,
}

impl SelfOp {
    /// Decode a self-linker opcode, or `None` if `bc` is not one.
    pub fn from_opcode(bc: u8) -> Option<Self> {
        let mut x = bc.checked_sub(SELF_LINKER_OP)?;
        let is_super = x >= SELF_LINKER_SUPER_FLAG;
        if is_super {
            x -= SELF_LINKER_SUPER_FLAG;
        }
        let is_aload = x >= SELF_LINKER_ALOAD_FLAG;
        if is_aload {
            x -= SELF_LINKER_ALOAD_FLAG;
        }
        let op = FIRST_LINKER_OP + x;
        (op <= LAST_SELF_METHOD_OP).then_some(Self { op, is_super, is_aload })
    }

    /// The self-linker opcode for this operation, if it has one.
    pub fn to_opcode(self) -> Option<u8> {
        if !(FIRST_LINKER_OP..=LAST_SELF_METHOD_OP).contains(&self.op) {
            return None;
        }
        let mut bc = SELF_LINKER_OP + (self.op - FIRST_LINKER_OP);
        if self.is_aload {
            bc += SELF_LINKER_ALOAD_FLAG;
        }
        if self.is_super {
            bc += SELF_LINKER_SUPER_FLAG;
        }
        Some(bc)
    }

    /// True for the four field opcodes.
    pub fn is_field(self) -> bool {
        self.op <= LAST_FIELD_OP
    }
}

impl fmt::Display for SelfOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let who = if self.is_super { "super" } else { "this" };
        let aload = if self.is_aload { "aload_0 " } else { "" };
        write!(f, "{}{}.{}", aload, who, self.op)
    }
}

impl StaticBands {
    /// Band carrying operands that name a `tag` entry, or `None` for kinds
    /// no instruction refers to directly.
    pub fn cp_ref_op_band(&self, tag: CpTag) -> Option<CpRefBandId> {
        let band = match tag {
            CpTag::Class => self.bc_classref,
            CpTag::Fieldref => self.bc_fieldref,
            CpTag::Methodref => self.bc_methodref,
            CpTag::InterfaceMethodref => self.bc_imethodref,
            CpTag::InvokeDynamic => self.bc_indyref,
            CpTag::Integer => self.bc_intref,
            CpTag::Float => self.bc_floatref,
            CpTag::Long => self.bc_longref,
            CpTag::Double => self.bc_doubleref,
            CpTag::String => self.bc_stringref,
            CpTag::LoadableValue | CpTag::MethodHandle | CpTag::MethodType => self.bc_loadablevalueref,
            _ => return None,
        };
        Some(band)
    }

    /// Band carrying the operand of opcode `bc`, for the linker and
    /// `ldc`-family opcodes.
    pub fn cp_ref_op_band_for_opcode(&self, bc: u8) -> Option<CpRefBandId> {
        let tag = match bc {
            178..=181 => CpTag::Fieldref,
            182..=184 => CpTag::Methodref,
            185 => CpTag::InterfaceMethodref,
            186 => CpTag::InvokeDynamic,
            187 | 189 | 192 | 193 | 197 | 233 | 236 => CpTag::Class,
            18 | 19 => CpTag::String,
            234 | 237 => CpTag::Integer,
            235 | 238 => CpTag::Float,
            20 => CpTag::Long,
            239 => CpTag::Double,
            240 | 241 => CpTag::LoadableValue,
            _ => return None,
        };
        self.cp_ref_op_band(tag)
    }

    /// Band for a field or method operand resolved against the current
    /// class or its superclass.
    pub fn self_op_ref_band(&self, is_super: bool, is_field: bool) -> CpRefBandId {
        match (is_super, is_field) {
            (false, true) => self.bc_thisfield,
            (true, true) => self.bc_superfield,
            (false, false) => self.bc_thismethod,
            (true, false) => self.bc_supermethod,
        }
    }

    /// Band for the operand of self-linker opcode `bc`.
    pub fn self_op_ref_band_for_opcode(&self, bc: u8) -> Option<CpRefBandId> {
        SelfOp::from_opcode(bc).map(|op| self.self_op_ref_band(op.is_super, op.is_field()))
    }
}

impl<E: Clone + fmt::Debug + 'static> BandStructure<E> {
    /// Collect the branch from `pc` to `target` as the difference of their
    /// coded positions.
    pub fn put_label(&mut self, band: IntBandId, map: &dyn BciMap, pc: i32, target: i32) -> Result<()> {
        let delta = map.encode_bci(target).wrapping_sub(map.encode_bci(pc));
        self.put_int(band, delta)
    }

    /// Take the next branch from `pc`, returning its target offset.
    pub fn get_label(&mut self, band: IntBandId, map: &dyn BciMap, pc: i32) -> Result<i32> {
        let delta = self.get_int(band)?;
        Ok(map.decode_bci(map.encode_bci(pc).wrapping_add(delta)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Mode;
    use crate::verify::StrictVerifier;
    use crate::CodecOptions;

    /// Every instruction is three bytes long.
    struct Stride3;

    impl BciMap for Stride3 {
        fn encode_bci(&self, bci: i32) -> i32 {
            bci / 3
        }

        fn decode_bci(&self, code: i32) -> i32 {
            code * 3
        }
    }

    fn structure(mode: Mode) -> BandStructure<String> {
        BandStructure::with_verifier(mode, CodecOptions::default(), Box::new(StrictVerifier)).unwrap()
    }

    #[test]
    fn test_cp_ref_op_band() {
        let s = structure(Mode::Writer);
        let b = s.bands();
        assert_eq!(b.cp_ref_op_band(CpTag::Class), Some(b.bc_classref));
        assert_eq!(b.cp_ref_op_band(CpTag::MethodType), Some(b.bc_loadablevalueref));
        assert_eq!(b.cp_ref_op_band(CpTag::Utf8), None);
        assert_eq!(b.cp_ref_op_band_for_opcode(180), Some(b.bc_fieldref));
        assert_eq!(b.cp_ref_op_band_for_opcode(185), Some(b.bc_imethodref));
        assert_eq!(b.cp_ref_op_band_for_opcode(236), Some(b.bc_classref));
        assert_eq!(b.cp_ref_op_band_for_opcode(20), Some(b.bc_longref));
        assert_eq!(b.cp_ref_op_band_for_opcode(0), None);
    }

    #[test]
    fn test_self_ops() {
        let getfield = SelfOp {
            op: 180,
            is_super: false,
            is_aload: true,
        };
        assert_eq!(getfield.to_opcode(), Some(202 + 2 + 7));
        assert_eq!(SelfOp::from_opcode(211), Some(getfield));
        for bc in SELF_LINKER_OP..SELF_LINKER_OP + 28 {
            let op = SelfOp::from_opcode(bc).unwrap();
            assert_eq!(op.to_opcode(), Some(bc), "{}", op);
        }
        assert_eq!(SelfOp::from_opcode(SELF_LINKER_OP + 28), None);
        assert_eq!(SelfOp::from_opcode(201), None);

        let s = structure(Mode::Writer);
        let b = s.bands();
        assert_eq!(b.self_op_ref_band(true, false), b.bc_supermethod);
        assert_eq!(b.self_op_ref_band_for_opcode(202), Some(b.bc_thisfield));
        assert_eq!(b.self_op_ref_band_for_opcode(202 + 14 + 4), Some(b.bc_supermethod));
    }

    #[test]
    fn test_labels() {
        let mut s = structure(Mode::Writer);
        let label = s.bands().bc_label;
        s.put_label(label, &RawBci, 10, 4).unwrap();
        s.put_label(label, &Stride3, 30, 60).unwrap();
        assert_eq!(s.values(label), &[-6, 10]);
        s.choose_band_codings().unwrap();
        let mut out = Vec::new();
        s.write_all_bands_to(&mut out).unwrap();

        let mut r = structure(Mode::Reader);
        let label = r.bands().bc_label;
        r.expect_length(label, 2).unwrap();
        r.read_all_bands_from(&out[..]).unwrap();
        assert_eq!(r.get_label(label, &RawBci, 10).unwrap(), 4);
        assert_eq!(r.get_label(label, &Stride3, 30).unwrap(), 60);
    }
}
