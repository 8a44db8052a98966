//! The static band tree
//!
//! Every archive carries the same fixed set of bands, declared here in wire
//! order. Bands declared without a coding inherit the regular coding of the
//! aggregate they live in.

use crate::index::CpTag;
use crate::layout::AttrContext;
use crate::tree::{BandTree, ByteBandId, CpRefBandId, IntBandId, MultiBandId};
use bandpack_format::{Coding, BCI5, BRANCH5, BYTE1, CHAR3, DELTA5, MDELTA5, UDELTA5, UNSIGNED5};

struct Builder<'a> {
    tree: &'a mut BandTree,
}

impl Builder<'_> {
    fn multi(&mut self, parent: MultiBandId, name: &str, coding: Coding) -> MultiBandId {
        self.tree.add_multi(Some(parent), name, coding)
    }

    fn int(&mut self, parent: MultiBandId, name: &str, coding: Coding) -> IntBandId {
        self.tree.add_int(parent, name, coding)
    }

    fn int_dflt(&mut self, parent: MultiBandId, name: &str) -> IntBandId {
        let coding = self.tree.regular_coding(parent);
        self.tree.add_int(parent, name, coding)
    }

    fn byte(&mut self, parent: MultiBandId, name: &str) -> ByteBandId {
        self.tree.add_byte(parent, name)
    }

    fn cp(&mut self, parent: MultiBandId, name: &str, coding: Coding, tag: CpTag) -> CpRefBandId {
        self.tree.add_cp_ref(parent, name, coding, tag, false)
    }

    fn cp_dflt(&mut self, parent: MultiBandId, name: &str, tag: CpTag) -> CpRefBandId {
        let coding = self.tree.regular_coding(parent);
        self.tree.add_cp_ref(parent, name, coding, tag, false)
    }

    fn cp_null(&mut self, parent: MultiBandId, name: &str, coding: Coding, tag: CpTag) -> CpRefBandId {
        self.tree.add_cp_ref(parent, name, coding, tag, true)
    }
}

/// Ids of every statically declared band.
#[allow(missing_docs)]
#[derive(Debug, Clone)]
pub struct StaticBands {
    pub all_bands: MultiBandId,

    // archive header
    pub archive_magic: ByteBandId,
    pub archive_header_0: IntBandId,
    pub archive_header_s: IntBandId,
    pub archive_header_1: IntBandId,
    pub band_headers: ByteBandId,

    // constant pool
    pub cp_bands: MultiBandId,
    pub cp_utf8_prefix: IntBandId,
    pub cp_utf8_suffix: IntBandId,
    pub cp_utf8_chars: IntBandId,
    pub cp_utf8_big_suffix: IntBandId,
    pub cp_utf8_big_chars: MultiBandId,
    pub cp_int: IntBandId,
    pub cp_float: IntBandId,
    pub cp_long_hi: IntBandId,
    pub cp_long_lo: IntBandId,
    pub cp_double_hi: IntBandId,
    pub cp_double_lo: IntBandId,
    pub cp_string: CpRefBandId,
    pub cp_class: CpRefBandId,
    pub cp_signature_form: CpRefBandId,
    pub cp_signature_classes: CpRefBandId,
    pub cp_descr_name: CpRefBandId,
    pub cp_descr_type: CpRefBandId,
    pub cp_field_class: CpRefBandId,
    pub cp_field_desc: CpRefBandId,
    pub cp_method_class: CpRefBandId,
    pub cp_method_desc: CpRefBandId,
    pub cp_imethod_class: CpRefBandId,
    pub cp_imethod_desc: CpRefBandId,
    pub cp_method_handle_refkind: IntBandId,
    pub cp_method_handle_member: CpRefBandId,
    pub cp_method_type: CpRefBandId,
    pub cp_bootstrap_method_ref: CpRefBandId,
    pub cp_bootstrap_method_arg_count: IntBandId,
    pub cp_bootstrap_method_arg: CpRefBandId,
    pub cp_invoke_dynamic_spec: CpRefBandId,
    pub cp_invoke_dynamic_desc: CpRefBandId,

    // attribute definitions
    pub attr_definition_bands: MultiBandId,
    pub attr_definition_headers: ByteBandId,
    pub attr_definition_name: CpRefBandId,
    pub attr_definition_layout: CpRefBandId,

    // inner classes
    pub ic_bands: MultiBandId,
    pub ic_this_class: CpRefBandId,
    pub ic_flags: IntBandId,
    pub ic_outer_class: CpRefBandId,
    pub ic_name: CpRefBandId,

    // classes
    pub class_bands: MultiBandId,
    pub class_this: CpRefBandId,
    pub class_super: CpRefBandId,
    pub class_interface_count: IntBandId,
    pub class_interface: CpRefBandId,
    pub class_field_count: IntBandId,
    pub class_method_count: IntBandId,

    // fields
    pub field_descr: CpRefBandId,
    pub field_attr_bands: MultiBandId,
    pub field_flags_hi: IntBandId,
    pub field_flags_lo: IntBandId,
    pub field_attr_count: IntBandId,
    pub field_attr_indexes: IntBandId,
    pub field_attr_calls: IntBandId,
    pub field_constant_value_kq: CpRefBandId,
    pub field_signature_rs: CpRefBandId,
    pub field_metadata_bands: MultiBandId,
    pub field_type_metadata_bands: MultiBandId,

    // methods
    pub method_descr: CpRefBandId,
    pub method_attr_bands: MultiBandId,
    pub method_flags_hi: IntBandId,
    pub method_flags_lo: IntBandId,
    pub method_attr_count: IntBandId,
    pub method_attr_indexes: IntBandId,
    pub method_attr_calls: IntBandId,
    pub method_exceptions_n: IntBandId,
    pub method_exceptions_rc: CpRefBandId,
    pub method_signature_rs: CpRefBandId,
    pub method_metadata_bands: MultiBandId,
    pub method_method_parameters_nb: IntBandId,
    pub method_method_parameters_name_run: CpRefBandId,
    pub method_method_parameters_flag_fh: IntBandId,
    pub method_type_metadata_bands: MultiBandId,

    // class attributes
    pub class_attr_bands: MultiBandId,
    pub class_flags_hi: IntBandId,
    pub class_flags_lo: IntBandId,
    pub class_attr_count: IntBandId,
    pub class_attr_indexes: IntBandId,
    pub class_attr_calls: IntBandId,
    pub class_source_file_run: CpRefBandId,
    pub class_enclosing_method_rc: CpRefBandId,
    pub class_enclosing_method_rdn: CpRefBandId,
    pub class_signature_rs: CpRefBandId,
    pub class_metadata_bands: MultiBandId,
    pub class_inner_classes_n: IntBandId,
    pub class_inner_classes_rc: CpRefBandId,
    pub class_inner_classes_f: IntBandId,
    pub class_inner_classes_outer_rcn: CpRefBandId,
    pub class_inner_classes_name_run: CpRefBandId,
    pub class_class_file_version_minor_h: IntBandId,
    pub class_class_file_version_major_h: IntBandId,
    pub class_type_metadata_bands: MultiBandId,

    // code
    pub code_bands: MultiBandId,
    pub code_headers: ByteBandId,
    pub code_max_stack: IntBandId,
    pub code_max_na_locals: IntBandId,
    pub code_handler_count: IntBandId,
    pub code_handler_start_p: IntBandId,
    pub code_handler_end_po: IntBandId,
    pub code_handler_catch_po: IntBandId,
    pub code_handler_class_rcn: CpRefBandId,

    // code attributes
    pub code_attr_bands: MultiBandId,
    pub code_flags_hi: IntBandId,
    pub code_flags_lo: IntBandId,
    pub code_attr_count: IntBandId,
    pub code_attr_indexes: IntBandId,
    pub code_attr_calls: IntBandId,
    pub stackmap_bands: MultiBandId,
    pub code_stack_map_table_n: IntBandId,
    pub code_stack_map_table_frame_t: IntBandId,
    pub code_stack_map_table_local_n: IntBandId,
    pub code_stack_map_table_stack_n: IntBandId,
    pub code_stack_map_table_offset: IntBandId,
    pub code_stack_map_table_t: IntBandId,
    pub code_stack_map_table_rc: CpRefBandId,
    pub code_stack_map_table_p: IntBandId,
    pub code_line_number_table_n: IntBandId,
    pub code_line_number_table_bci_p: IntBandId,
    pub code_line_number_table_line: IntBandId,
    pub code_local_variable_table_n: IntBandId,
    pub code_local_variable_table_bci_p: IntBandId,
    pub code_local_variable_table_span_o: IntBandId,
    pub code_local_variable_table_name_ru: CpRefBandId,
    pub code_local_variable_table_type_rs: CpRefBandId,
    pub code_local_variable_table_slot: IntBandId,
    pub code_local_variable_type_table_n: IntBandId,
    pub code_local_variable_type_table_bci_p: IntBandId,
    pub code_local_variable_type_table_span_o: IntBandId,
    pub code_local_variable_type_table_name_ru: CpRefBandId,
    pub code_local_variable_type_table_type_rs: CpRefBandId,
    pub code_local_variable_type_table_slot: IntBandId,
    pub code_type_metadata_bands: MultiBandId,

    // bytecodes
    pub bc_bands: MultiBandId,
    pub bc_codes: ByteBandId,
    pub bc_case_count: IntBandId,
    pub bc_case_value: IntBandId,
    pub bc_byte: ByteBandId,
    pub bc_short: IntBandId,
    pub bc_local: IntBandId,
    pub bc_label: IntBandId,
    pub bc_intref: CpRefBandId,
    pub bc_floatref: CpRefBandId,
    pub bc_longref: CpRefBandId,
    pub bc_doubleref: CpRefBandId,
    pub bc_stringref: CpRefBandId,
    pub bc_loadablevalueref: CpRefBandId,
    pub bc_classref: CpRefBandId,
    pub bc_fieldref: CpRefBandId,
    pub bc_methodref: CpRefBandId,
    pub bc_imethodref: CpRefBandId,
    pub bc_indyref: CpRefBandId,
    pub bc_thisfield: CpRefBandId,
    pub bc_superfield: CpRefBandId,
    pub bc_thismethod: CpRefBandId,
    pub bc_supermethod: CpRefBandId,
    pub bc_initref: IntBandId,
    pub bc_escref: CpRefBandId,
    pub bc_escrefsize: IntBandId,
    pub bc_escsize: IntBandId,
    pub bc_escbyte: ByteBandId,

    // resource files
    pub file_bands: MultiBandId,
    pub file_name: CpRefBandId,
    pub file_size_hi: IntBandId,
    pub file_size_lo: IntBandId,
    pub file_modtime: IntBandId,
    pub file_options: IntBandId,
    pub file_bits: ByteBandId,
}

impl StaticBands {
    /// Declare every static band in `tree`, in wire order.
    pub fn build(tree: &mut BandTree) -> Self {
        use CpTag::{
            All, AnyMember, BootstrapMethod, Class, Double, FieldSpecific, Fieldref, Float, Integer,
            InterfaceMethodref, InvokeDynamic, LoadableValue, Long, MethodHandle, Methodref, NameAndType, Signature,
            Utf8,
        };
        let all_bands = tree.add_multi(None, "(package)", UNSIGNED5);
        let mut b = Builder { tree };
        let root = all_bands;

        let archive_magic = b.byte(root, "archive_magic");
        let archive_header_0 = b.int(root, "archive_header_0", UNSIGNED5);
        let archive_header_s = b.int(root, "archive_header_S", UNSIGNED5);
        let archive_header_1 = b.int(root, "archive_header_1", UNSIGNED5);
        let band_headers = b.byte(root, "band_headers");

        let cp = b.multi(root, "(constant_pool)", DELTA5);
        let cp_utf8_prefix = b.int_dflt(cp, "cp_Utf8_prefix");
        let cp_utf8_suffix = b.int(cp, "cp_Utf8_suffix", UNSIGNED5);
        let cp_utf8_chars = b.int(cp, "cp_Utf8_chars", CHAR3);
        let cp_utf8_big_suffix = b.int_dflt(cp, "cp_Utf8_big_suffix");
        let cp_utf8_big_chars = b.multi(cp, "(cp_Utf8_big_chars)", DELTA5);
        let cp_int = b.int(cp, "cp_Int", UDELTA5);
        let cp_float = b.int(cp, "cp_Float", UDELTA5);
        let cp_long_hi = b.int(cp, "cp_Long_hi", UDELTA5);
        let cp_long_lo = b.int_dflt(cp, "cp_Long_lo");
        let cp_double_hi = b.int(cp, "cp_Double_hi", UDELTA5);
        let cp_double_lo = b.int_dflt(cp, "cp_Double_lo");
        let cp_string = b.cp(cp, "cp_String", UDELTA5, Utf8);
        let cp_class = b.cp(cp, "cp_Class", UDELTA5, Utf8);
        let cp_signature_form = b.cp_dflt(cp, "cp_Signature_form", Utf8);
        let cp_signature_classes = b.cp(cp, "cp_Signature_classes", UDELTA5, Class);
        let cp_descr_name = b.cp_dflt(cp, "cp_Descr_name", Utf8);
        let cp_descr_type = b.cp(cp, "cp_Descr_type", UDELTA5, Signature);
        let cp_field_class = b.cp_dflt(cp, "cp_Field_class", Class);
        let cp_field_desc = b.cp(cp, "cp_Field_desc", UDELTA5, NameAndType);
        let cp_method_class = b.cp_dflt(cp, "cp_Method_class", Class);
        let cp_method_desc = b.cp(cp, "cp_Method_desc", UDELTA5, NameAndType);
        let cp_imethod_class = b.cp_dflt(cp, "cp_Imethod_class", Class);
        let cp_imethod_desc = b.cp(cp, "cp_Imethod_desc", UDELTA5, NameAndType);
        let cp_method_handle_refkind = b.int(cp, "cp_MethodHandle_refkind", DELTA5);
        let cp_method_handle_member = b.cp(cp, "cp_MethodHandle_member", UDELTA5, AnyMember);
        let cp_method_type = b.cp(cp, "cp_MethodType", UDELTA5, Signature);
        let cp_bootstrap_method_ref = b.cp(cp, "cp_BootstrapMethod_ref", DELTA5, MethodHandle);
        let cp_bootstrap_method_arg_count = b.int(cp, "cp_BootstrapMethod_arg_count", UDELTA5);
        let cp_bootstrap_method_arg = b.cp(cp, "cp_BootstrapMethod_arg", DELTA5, LoadableValue);
        let cp_invoke_dynamic_spec = b.cp(cp, "cp_InvokeDynamic_spec", DELTA5, BootstrapMethod);
        let cp_invoke_dynamic_desc = b.cp(cp, "cp_InvokeDynamic_desc", UDELTA5, NameAndType);

        let ad = b.multi(root, "(attr_definition_bands)", UNSIGNED5);
        let attr_definition_headers = b.byte(ad, "attr_definition_headers");
        let attr_definition_name = b.cp_dflt(ad, "attr_definition_name", Utf8);
        let attr_definition_layout = b.cp_dflt(ad, "attr_definition_layout", Utf8);

        let ic = b.multi(root, "(ic_bands)", DELTA5);
        let ic_this_class = b.cp(ic, "ic_this_class", UDELTA5, Class);
        let ic_flags = b.int(ic, "ic_flags", UNSIGNED5);
        let ic_outer_class = b.cp_null(ic, "ic_outer_class", DELTA5, Class);
        let ic_name = b.cp_null(ic, "ic_name", DELTA5, Utf8);

        let cls = b.multi(root, "(class_bands)", DELTA5);
        let class_this = b.cp_dflt(cls, "class_this", Class);
        let class_super = b.cp_dflt(cls, "class_super", Class);
        let class_interface_count = b.int_dflt(cls, "class_interface_count");
        let class_interface = b.cp_dflt(cls, "class_interface", Class);
        let class_field_count = b.int_dflt(cls, "class_field_count");
        let class_method_count = b.int_dflt(cls, "class_method_count");

        let field_descr = b.cp_dflt(cls, "field_descr", NameAndType);
        let fa = b.multi(cls, "(field_attr_bands)", UNSIGNED5);
        let field_flags_hi = b.int_dflt(fa, "field_flags_hi");
        let field_flags_lo = b.int_dflt(fa, "field_flags_lo");
        let field_attr_count = b.int_dflt(fa, "field_attr_count");
        let field_attr_indexes = b.int_dflt(fa, "field_attr_indexes");
        let field_attr_calls = b.int_dflt(fa, "field_attr_calls");
        let field_constant_value_kq = b.cp_dflt(fa, "field_ConstantValue_KQ", FieldSpecific);
        let field_signature_rs = b.cp_dflt(fa, "field_Signature_RS", Signature);
        let field_metadata_bands = b.multi(fa, "(field_metadata_bands)", UNSIGNED5);
        let field_type_metadata_bands = b.multi(fa, "(field_type_metadata_bands)", UNSIGNED5);

        let method_descr = b.cp(cls, "method_descr", MDELTA5, NameAndType);
        let ma = b.multi(cls, "(method_attr_bands)", UNSIGNED5);
        let method_flags_hi = b.int_dflt(ma, "method_flags_hi");
        let method_flags_lo = b.int_dflt(ma, "method_flags_lo");
        let method_attr_count = b.int_dflt(ma, "method_attr_count");
        let method_attr_indexes = b.int_dflt(ma, "method_attr_indexes");
        let method_attr_calls = b.int_dflt(ma, "method_attr_calls");
        let method_exceptions_n = b.int_dflt(ma, "method_Exceptions_N");
        let method_exceptions_rc = b.cp_dflt(ma, "method_Exceptions_RC", Class);
        let method_signature_rs = b.cp_dflt(ma, "method_Signature_RS", Signature);
        let method_metadata_bands = b.multi(ma, "(method_metadata_bands)", UNSIGNED5);
        let method_method_parameters_nb = b.int(ma, "method_MethodParameters_NB", BYTE1);
        let method_method_parameters_name_run =
            b.cp_null(ma, "method_MethodParameters_name_RUN", UNSIGNED5, Utf8);
        let method_method_parameters_flag_fh = b.int_dflt(ma, "method_MethodParameters_flag_FH");
        let method_type_metadata_bands = b.multi(ma, "(method_type_metadata_bands)", UNSIGNED5);

        let ca = b.multi(cls, "(class_attr_bands)", UNSIGNED5);
        let class_flags_hi = b.int_dflt(ca, "class_flags_hi");
        let class_flags_lo = b.int_dflt(ca, "class_flags_lo");
        let class_attr_count = b.int_dflt(ca, "class_attr_count");
        let class_attr_indexes = b.int_dflt(ca, "class_attr_indexes");
        let class_attr_calls = b.int_dflt(ca, "class_attr_calls");
        let class_source_file_run = b.cp_null(ca, "class_SourceFile_RUN", UNSIGNED5, Utf8);
        let class_enclosing_method_rc = b.cp_dflt(ca, "class_EnclosingMethod_RC", Class);
        let class_enclosing_method_rdn = b.cp_null(ca, "class_EnclosingMethod_RDN", UNSIGNED5, NameAndType);
        let class_signature_rs = b.cp_dflt(ca, "class_Signature_RS", Signature);
        let class_metadata_bands = b.multi(ca, "(class_metadata_bands)", UNSIGNED5);
        let class_inner_classes_n = b.int_dflt(ca, "class_InnerClasses_N");
        let class_inner_classes_rc = b.cp_dflt(ca, "class_InnerClasses_RC", Class);
        let class_inner_classes_f = b.int_dflt(ca, "class_InnerClasses_F");
        let class_inner_classes_outer_rcn = b.cp_null(ca, "class_InnerClasses_outer_RCN", UNSIGNED5, Class);
        let class_inner_classes_name_run = b.cp_null(ca, "class_InnerClasses_name_RUN", UNSIGNED5, Utf8);
        let class_class_file_version_minor_h = b.int_dflt(ca, "class_ClassFile_version_minor_H");
        let class_class_file_version_major_h = b.int_dflt(ca, "class_ClassFile_version_major_H");
        let class_type_metadata_bands = b.multi(ca, "(class_type_metadata_bands)", UNSIGNED5);

        let code = b.multi(cls, "(code_bands)", UNSIGNED5);
        let code_headers = b.byte(code, "code_headers");
        let code_max_stack = b.int(code, "code_max_stack", UNSIGNED5);
        let code_max_na_locals = b.int(code, "code_max_na_locals", UNSIGNED5);
        let code_handler_count = b.int(code, "code_handler_count", UNSIGNED5);
        let code_handler_start_p = b.int(code, "code_handler_start_P", BCI5);
        let code_handler_end_po = b.int(code, "code_handler_end_PO", BRANCH5);
        let code_handler_catch_po = b.int(code, "code_handler_catch_PO", BRANCH5);
        let code_handler_class_rcn = b.cp_null(code, "code_handler_class_RCN", UNSIGNED5, Class);

        let xa = b.multi(cls, "(code_attr_bands)", UNSIGNED5);
        let code_flags_hi = b.int_dflt(xa, "code_flags_hi");
        let code_flags_lo = b.int_dflt(xa, "code_flags_lo");
        let code_attr_count = b.int_dflt(xa, "code_attr_count");
        let code_attr_indexes = b.int_dflt(xa, "code_attr_indexes");
        let code_attr_calls = b.int_dflt(xa, "code_attr_calls");

        let sm = b.multi(xa, "(StackMapTable_bands)", UNSIGNED5);
        let code_stack_map_table_n = b.int_dflt(sm, "code_StackMapTable_N");
        let code_stack_map_table_frame_t = b.int(sm, "code_StackMapTable_frame_T", BYTE1);
        let code_stack_map_table_local_n = b.int_dflt(sm, "code_StackMapTable_local_N");
        let code_stack_map_table_stack_n = b.int_dflt(sm, "code_StackMapTable_stack_N");
        let code_stack_map_table_offset = b.int(sm, "code_StackMapTable_offset", UNSIGNED5);
        let code_stack_map_table_t = b.int(sm, "code_StackMapTable_T", BYTE1);
        let code_stack_map_table_rc = b.cp_dflt(sm, "code_StackMapTable_RC", Class);
        let code_stack_map_table_p = b.int(sm, "code_StackMapTable_P", BCI5);

        let code_line_number_table_n = b.int_dflt(xa, "code_LineNumberTable_N");
        let code_line_number_table_bci_p = b.int(xa, "code_LineNumberTable_bci_P", BCI5);
        let code_line_number_table_line = b.int_dflt(xa, "code_LineNumberTable_line");

        let code_local_variable_table_n = b.int_dflt(xa, "code_LocalVariableTable_N");
        let code_local_variable_table_bci_p = b.int(xa, "code_LocalVariableTable_bci_P", BCI5);
        let code_local_variable_table_span_o = b.int(xa, "code_LocalVariableTable_span_O", BRANCH5);
        let code_local_variable_table_name_ru = b.cp_dflt(xa, "code_LocalVariableTable_name_RU", Utf8);
        let code_local_variable_table_type_rs = b.cp_dflt(xa, "code_LocalVariableTable_type_RS", Signature);
        let code_local_variable_table_slot = b.int_dflt(xa, "code_LocalVariableTable_slot");
        let code_local_variable_type_table_n = b.int_dflt(xa, "code_LocalVariableTypeTable_N");
        let code_local_variable_type_table_bci_p = b.int(xa, "code_LocalVariableTypeTable_bci_P", BCI5);
        let code_local_variable_type_table_span_o = b.int(xa, "code_LocalVariableTypeTable_span_O", BRANCH5);
        let code_local_variable_type_table_name_ru = b.cp_dflt(xa, "code_LocalVariableTypeTable_name_RU", Utf8);
        let code_local_variable_type_table_type_rs =
            b.cp_dflt(xa, "code_LocalVariableTypeTable_type_RS", Signature);
        let code_local_variable_type_table_slot = b.int_dflt(xa, "code_LocalVariableTypeTable_slot");
        let code_type_metadata_bands = b.multi(xa, "(code_type_metadata_bands)", UNSIGNED5);

        let bc = b.multi(root, "(byte_codes)", UNSIGNED5);
        let bc_codes = b.byte(bc, "bc_codes");
        let bc_case_count = b.int_dflt(bc, "bc_case_count");
        let bc_case_value = b.int(bc, "bc_case_value", DELTA5);
        let bc_byte = b.byte(bc, "bc_byte");
        let bc_short = b.int(bc, "bc_short", DELTA5);
        let bc_local = b.int_dflt(bc, "bc_local");
        let bc_label = b.int(bc, "bc_label", BRANCH5);
        let bc_intref = b.cp(bc, "bc_intref", DELTA5, Integer);
        let bc_floatref = b.cp(bc, "bc_floatref", DELTA5, Float);
        let bc_longref = b.cp(bc, "bc_longref", DELTA5, Long);
        let bc_doubleref = b.cp(bc, "bc_doubleref", DELTA5, Double);
        let bc_stringref = b.cp(bc, "bc_stringref", DELTA5, CpTag::String);
        let bc_loadablevalueref = b.cp(bc, "bc_loadablevalueref", DELTA5, LoadableValue);
        // A null class reference means the current class.
        let bc_classref = b.cp_null(bc, "bc_classref", UNSIGNED5, Class);
        let bc_fieldref = b.cp(bc, "bc_fieldref", DELTA5, Fieldref);
        let bc_methodref = b.cp_dflt(bc, "bc_methodref", Methodref);
        let bc_imethodref = b.cp(bc, "bc_imethodref", DELTA5, InterfaceMethodref);
        let bc_indyref = b.cp(bc, "bc_indyref", DELTA5, InvokeDynamic);
        let bc_thisfield = b.cp_dflt(bc, "bc_thisfield", CpTag::None);
        let bc_superfield = b.cp_dflt(bc, "bc_superfield", CpTag::None);
        let bc_thismethod = b.cp_dflt(bc, "bc_thismethod", CpTag::None);
        let bc_supermethod = b.cp_dflt(bc, "bc_supermethod", CpTag::None);
        let bc_initref = b.int_dflt(bc, "bc_initref");
        let bc_escref = b.cp_dflt(bc, "bc_escref", All);
        let bc_escrefsize = b.int_dflt(bc, "bc_escrefsize");
        let bc_escsize = b.int_dflt(bc, "bc_escsize");
        let bc_escbyte = b.byte(bc, "bc_escbyte");

        let fb = b.multi(root, "(file_bands)", UNSIGNED5);
        let file_name = b.cp_dflt(fb, "file_name", Utf8);
        let file_size_hi = b.int_dflt(fb, "file_size_hi");
        let file_size_lo = b.int_dflt(fb, "file_size_lo");
        let file_modtime = b.int(fb, "file_modtime", DELTA5);
        let file_options = b.int_dflt(fb, "file_options");
        let file_bits = b.byte(fb, "file_bits");

        Self {
            all_bands,
            archive_magic,
            archive_header_0,
            archive_header_s,
            archive_header_1,
            band_headers,
            cp_bands: cp,
            cp_utf8_prefix,
            cp_utf8_suffix,
            cp_utf8_chars,
            cp_utf8_big_suffix,
            cp_utf8_big_chars,
            cp_int,
            cp_float,
            cp_long_hi,
            cp_long_lo,
            cp_double_hi,
            cp_double_lo,
            cp_string,
            cp_class,
            cp_signature_form,
            cp_signature_classes,
            cp_descr_name,
            cp_descr_type,
            cp_field_class,
            cp_field_desc,
            cp_method_class,
            cp_method_desc,
            cp_imethod_class,
            cp_imethod_desc,
            cp_method_handle_refkind,
            cp_method_handle_member,
            cp_method_type,
            cp_bootstrap_method_ref,
            cp_bootstrap_method_arg_count,
            cp_bootstrap_method_arg,
            cp_invoke_dynamic_spec,
            cp_invoke_dynamic_desc,
            attr_definition_bands: ad,
            attr_definition_headers,
            attr_definition_name,
            attr_definition_layout,
            ic_bands: ic,
            ic_this_class,
            ic_flags,
            ic_outer_class,
            ic_name,
            class_bands: cls,
            class_this,
            class_super,
            class_interface_count,
            class_interface,
            class_field_count,
            class_method_count,
            field_descr,
            field_attr_bands: fa,
            field_flags_hi,
            field_flags_lo,
            field_attr_count,
            field_attr_indexes,
            field_attr_calls,
            field_constant_value_kq,
            field_signature_rs,
            field_metadata_bands,
            field_type_metadata_bands,
            method_descr,
            method_attr_bands: ma,
            method_flags_hi,
            method_flags_lo,
            method_attr_count,
            method_attr_indexes,
            method_attr_calls,
            method_exceptions_n,
            method_exceptions_rc,
            method_signature_rs,
            method_metadata_bands,
            method_method_parameters_nb,
            method_method_parameters_name_run,
            method_method_parameters_flag_fh,
            method_type_metadata_bands,
            class_attr_bands: ca,
            class_flags_hi,
            class_flags_lo,
            class_attr_count,
            class_attr_indexes,
            class_attr_calls,
            class_source_file_run,
            class_enclosing_method_rc,
            class_enclosing_method_rdn,
            class_signature_rs,
            class_metadata_bands,
            class_inner_classes_n,
            class_inner_classes_rc,
            class_inner_classes_f,
            class_inner_classes_outer_rcn,
            class_inner_classes_name_run,
            class_class_file_version_minor_h,
            class_class_file_version_major_h,
            class_type_metadata_bands,
            code_bands: code,
            code_headers,
            code_max_stack,
            code_max_na_locals,
            code_handler_count,
            code_handler_start_p,
            code_handler_end_po,
            code_handler_catch_po,
            code_handler_class_rcn,
            code_attr_bands: xa,
            code_flags_hi,
            code_flags_lo,
            code_attr_count,
            code_attr_indexes,
            code_attr_calls,
            stackmap_bands: sm,
            code_stack_map_table_n,
            code_stack_map_table_frame_t,
            code_stack_map_table_local_n,
            code_stack_map_table_stack_n,
            code_stack_map_table_offset,
            code_stack_map_table_t,
            code_stack_map_table_rc,
            code_stack_map_table_p,
            code_line_number_table_n,
            code_line_number_table_bci_p,
            code_line_number_table_line,
            code_local_variable_table_n,
            code_local_variable_table_bci_p,
            code_local_variable_table_span_o,
            code_local_variable_table_name_ru,
            code_local_variable_table_type_rs,
            code_local_variable_table_slot,
            code_local_variable_type_table_n,
            code_local_variable_type_table_bci_p,
            code_local_variable_type_table_span_o,
            code_local_variable_type_table_name_ru,
            code_local_variable_type_table_type_rs,
            code_local_variable_type_table_slot,
            code_type_metadata_bands,
            bc_bands: bc,
            bc_codes,
            bc_case_count,
            bc_case_value,
            bc_byte,
            bc_short,
            bc_local,
            bc_label,
            bc_intref,
            bc_floatref,
            bc_longref,
            bc_doubleref,
            bc_stringref,
            bc_loadablevalueref,
            bc_classref,
            bc_fieldref,
            bc_methodref,
            bc_imethodref,
            bc_indyref,
            bc_thisfield,
            bc_superfield,
            bc_thismethod,
            bc_supermethod,
            bc_initref,
            bc_escref,
            bc_escrefsize,
            bc_escsize,
            bc_escbyte,
            file_bands: fb,
            file_name,
            file_size_hi,
            file_size_lo,
            file_modtime,
            file_options,
            file_bits,
        }
    }

    /// Aggregate holding the non-predefined attribute bands of `ctx`.
    pub fn attr_bands(&self, ctx: AttrContext) -> MultiBandId {
        match ctx {
            AttrContext::Class => self.class_attr_bands,
            AttrContext::Field => self.field_attr_bands,
            AttrContext::Method => self.method_attr_bands,
            AttrContext::Code => self.code_attr_bands,
        }
    }

    /// Aggregate holding annotation bands of `ctx`; code has none.
    pub fn metadata_bands(&self, ctx: AttrContext) -> Option<MultiBandId> {
        match ctx {
            AttrContext::Class => Some(self.class_metadata_bands),
            AttrContext::Field => Some(self.field_metadata_bands),
            AttrContext::Method => Some(self.method_metadata_bands),
            AttrContext::Code => None,
        }
    }

    /// Aggregate holding type-annotation bands of `ctx`.
    pub fn type_metadata_bands(&self, ctx: AttrContext) -> MultiBandId {
        match ctx {
            AttrContext::Class => self.class_type_metadata_bands,
            AttrContext::Field => self.field_type_metadata_bands,
            AttrContext::Method => self.method_type_metadata_bands,
            AttrContext::Code => self.code_type_metadata_bands,
        }
    }
}
