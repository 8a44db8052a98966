//! The band structure orchestrator
//!
//! [`BandStructure`] owns one archive's worth of bands: the static tree from
//! [`StaticBands`], the attribute definition tables and the bands built for
//! them, and the binding of reference bands to constant-pool indexes.
//!
//! A writer collects values, calls [`BandStructure::choose_band_codings`] and
//! then [`BandStructure::write_all_bands_to`]. A reader announces lengths and
//! reads bands in declaration order, either one at a time with
//! [`BandStructure::read_band`] or all at once with
//! [`BandStructure::read_all_bands_from`], then takes the values out.

use crate::attributes::{
    AttrSlot, AttrTables, CLASS_ATTR_CLASS_FILE_VERSION, CLASS_ATTR_ENCLOSING_METHOD, CLASS_ATTR_INNER_CLASSES,
    CLASS_ATTR_SOURCE_FILE, CODE_ATTR_LINE_NUMBER_TABLE, CODE_ATTR_LOCAL_VARIABLE_TABLE,
    CODE_ATTR_LOCAL_VARIABLE_TYPE_TABLE, CODE_ATTR_STACK_MAP_TABLE, FIELD_ATTR_CONSTANT_VALUE, METHOD_ATTR_ANNOTATION_DEFAULT,
    METHOD_ATTR_CODE, METHOD_ATTR_EXCEPTIONS, METHOD_ATTR_METHOD_PARAMETERS,
    METHOD_ATTR_RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS, METHOD_ATTR_RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS,
    X_ATTR_DEPRECATED, X_ATTR_OVERFLOW, X_ATTR_RUNTIME_INVISIBLE_ANNOTATIONS, X_ATTR_RUNTIME_INVISIBLE_TYPE_ANNOTATIONS,
    X_ATTR_RUNTIME_VISIBLE_ANNOTATIONS, X_ATTR_RUNTIME_VISIBLE_TYPE_ANNOTATIONS, X_ATTR_SIGNATURE,
};
use crate::bands::StaticBands;
use crate::counter::ByteCounter;
use crate::dump::{dump_header, BandDumper, BandReport};
use crate::index::{CpTag, IndexRef, IndexSource};
use crate::layout::{element_band_name, standard, walk_band_elements, AttrContext, ElementBand, Layout};
use crate::phase::Phase;
use crate::tree::{BandId, BandKind, BandTree, ByteBandId, CpRefBandId, IntBandId, Mode, MultiBandId, ValueRole};
use crate::verify::{default_verifier, Verifier};
use crate::CodecOptions;
use ahash::AHashMap;
use bandpack_format::chooser::band_meta_coding;
use bandpack_format::constants::{MAX_EFFORT, MIN_EFFORT, SHORT_BAND_HEURISTIC};
use bandpack_format::escape::{decode_escape_value, encode_escape_value, supports_escapes};
use bandpack_format::{
    parse_meta_coding, Coding, CodingChooser, CodingMethod, MetaBytes, MetaReader, PackError, Result, UNSIGNED5,
};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::io::{Read, Write};

/// Class file version, ordered by major then minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ClassVersion {
    /// Major version.
    pub major: u16,
    /// Minor version.
    pub minor: u16,
}

impl ClassVersion {
    /// Version `major.minor`.
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ClassVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// First class version that may carry `StackMapTable`.
pub const STACK_MAP_CLASS_VERSION: ClassVersion = ClassVersion::new(50, 0);

/// The five bands every attribute context opens with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrBandGroup {
    /// High 32 flag bits, present when the archive says so.
    pub flags_hi: IntBandId,
    /// Low 32 flag bits.
    pub flags_lo: IntBandId,
    /// Overflow attribute counts.
    pub attr_count: IntBandId,
    /// Overflow attribute indexes.
    pub attr_indexes: IntBandId,
    /// Callable counts of layouts with backward calls.
    pub attr_calls: IntBandId,
}

/// One archive's bands, attribute tables and index bindings.
///
/// `E` is the constant-pool entry type references resolve to.
pub struct BandStructure<E> {
    tree: BandTree,
    bands: StaticBands,
    options: CodecOptions,
    effort: u8,
    chooser: CodingChooser,
    indexes: AHashMap<BandId, IndexRef<E>>,
    // Bands waiting for resolve_band_indexes; None once resolved.
    pending: Option<Vec<(CpRefBandId, CpTag)>>,
    kq_bands: Vec<CpRefBandId>,
    index_source: Option<Box<dyn IndexSource<E>>>,
    attrs: AttrTables,
    attr_band_table: AHashMap<Layout, Vec<BandId>>,
    header_bytes: Vec<u8>,
    header_pos: usize,
    band_sequence: VecDeque<String>,
    dumper: Option<BandDumper>,
    highest_class_version: Option<ClassVersion>,
    archive_options: u32,
}

impl<E> fmt::Debug for BandStructure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BandStructure")
            .field("mode", &self.tree.mode())
            .field("bands", &self.tree.band_count())
            .field("effort", &self.effort)
            .field("bound_indexes", &self.indexes.len())
            .field("highest_class_version", &self.highest_class_version)
            .finish()
    }
}

impl<E: Clone + fmt::Debug + 'static> BandStructure<E> {
    /// Build the static bands and predefined attributes for `mode`, with
    /// the default verifier.
    pub fn new(mode: Mode, options: CodecOptions) -> Result<Self> {
        Self::with_verifier(mode, options, default_verifier())
    }

    /// Like [`BandStructure::new`] with an explicit verifier.
    pub fn with_verifier(mode: Mode, options: CodecOptions, verifier: Box<dyn Verifier>) -> Result<Self> {
        let mut tree = BandTree::new(mode, verifier);
        tree.set_debug_bands(options.debug_bands);
        let bands = StaticBands::build(&mut tree);
        for id in [bands.archive_header_0, bands.archive_header_s, bands.archive_header_1] {
            if let Some(band) = tree.value_band_mut(id.id()) {
                band.fixed_coding = true;
            }
        }
        let effort = options.effective_effort();
        let mut chooser = CodingChooser::new(effort);
        if let Some(seed) = options.stress_seed {
            chooser = chooser.with_stress_seed(seed);
        }
        let dumper = match &options.dump_dir {
            Some(dir) => Some(BandDumper::new(dir.clone())?),
            None => None,
        };
        let mut structure = Self {
            tree,
            bands,
            options,
            effort,
            chooser,
            indexes: AHashMap::new(),
            pending: Some(Vec::new()),
            kq_bands: Vec::new(),
            index_source: None,
            attrs: AttrTables::new(),
            attr_band_table: AHashMap::new(),
            header_bytes: Vec::new(),
            header_pos: 0,
            band_sequence: VecDeque::new(),
            dumper,
            highest_class_version: None,
            archive_options: 0,
        };
        for id in structure.tree.leaves(structure.bands.all_bands) {
            if let Some(ValueRole::CpRef { tag, .. }) = structure.tree.value_band(id).map(|b| b.role) {
                structure.register_cp_ref(CpRefBandId(id), tag);
            }
        }
        structure.predefine_attributes()?;
        tracing::debug!(?mode, bands = structure.tree.band_count(), effort, "band structure ready");
        Ok(structure)
    }

    /// Writer or reader.
    pub fn mode(&self) -> Mode {
        self.tree.mode()
    }

    /// True on the read side.
    pub fn is_reader(&self) -> bool {
        self.tree.is_reader()
    }

    /// Options in force.
    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Effective chooser effort.
    pub fn effort(&self) -> u8 {
        self.effort
    }

    /// Ids of the static bands.
    pub fn bands(&self) -> &StaticBands {
        &self.bands
    }

    /// The band arena.
    pub fn tree(&self) -> &BandTree {
        &self.tree
    }

    /// Attribute definition tables.
    pub fn attrs(&self) -> &AttrTables {
        &self.attrs
    }

    /// Current phase of a band.
    pub fn phase(&self, id: impl Into<BandId>) -> Phase {
        self.tree.phase(id)
    }

    /// Values or bytes held by a band.
    pub fn len(&self, id: impl Into<BandId>) -> usize {
        self.tree.len(id)
    }

    /// Values held by a value band, disbursed or not.
    pub fn values(&self, id: impl Into<BandId>) -> &[i32] {
        self.tree.value_band(id.into()).map(|b| &b.values[..]).unwrap_or_default()
    }

    /// Coding a band was written or read with, once known.
    pub fn band_coding(&self, id: impl Into<BandId>) -> Option<&CodingMethod> {
        self.tree.value_band(id.into()).and_then(|b| b.coding.as_ref())
    }

    /// Meta-coding bytes of a band, once known.
    pub fn band_meta(&self, id: impl Into<BandId>) -> &[u8] {
        self.tree.value_band(id.into()).map(|b| &b.meta[..]).unwrap_or_default()
    }

    // ---------------------------------------------------------------
    // Dynamic bands

    /// Add an aggregate band under `parent`.
    pub fn add_multi_band(&mut self, parent: MultiBandId, name: &str, regular: Coding) -> MultiBandId {
        self.tree.add_multi(Some(parent), name, regular)
    }

    /// Add an integer band under `parent`.
    pub fn add_int_band(&mut self, parent: MultiBandId, name: &str, regular: Coding) -> IntBandId {
        self.tree.add_int(parent, name, regular)
    }

    /// Add a reference band under `parent`, bound like the static ones.
    pub fn add_cp_ref_band(
        &mut self,
        parent: MultiBandId,
        name: &str,
        regular: Coding,
        tag: CpTag,
        null_ok: bool,
    ) -> CpRefBandId {
        let id = self.tree.add_cp_ref(parent, name, regular, tag, null_ok);
        self.register_cp_ref(id, tag);
        id
    }

    /// Add a byte band under `parent`.
    pub fn add_byte_band(&mut self, parent: MultiBandId, name: &str) -> ByteBandId {
        self.tree.add_byte(parent, name)
    }

    // ---------------------------------------------------------------
    // Phases

    fn check_expected(&self, id: BandId, total: usize) -> Result<()> {
        let limits = &self.options.limits;
        let max = if id == self.bands.band_headers.id() {
            limits.max_band_header_bytes
        } else {
            limits.max_band_values
        };
        if total > max {
            return Err(PackError::LimitExceeded(format!(
                "{} expects {} values (max {})",
                self.tree.name(id),
                total,
                max
            )));
        }
        Ok(())
    }

    /// Announce how many values a band will read.
    pub fn expect_length(&mut self, id: impl Into<BandId>, len: usize) -> Result<()> {
        let id = id.into();
        self.check_expected(id, len)?;
        self.tree.expect_length(id, len)
    }

    /// Announce more values for a band.
    pub fn expect_more_length(&mut self, id: impl Into<BandId>, len: usize) -> Result<()> {
        let id = id.into();
        self.check_expected(id, self.tree.expected(id).saturating_add(len))?;
        self.tree.expect_more_length(id, len)
    }

    /// Finish paying out a band.
    pub fn done_disbursing(&mut self, id: impl Into<BandId>) -> Result<()> {
        self.tree.done_disbursing(id.into())
    }

    /// Retire a band that will carry no data.
    pub fn done_with_unused_band(&mut self, id: impl Into<BandId>) -> Result<()> {
        self.tree.done_with_unused_band(id.into())
    }

    /// Rewind a fully disbursed band for another pass.
    pub fn reset_for_second_pass(&mut self, id: impl Into<BandId>) -> Result<()> {
        self.tree.reset_for_second_pass(id.into())
    }

    // ---------------------------------------------------------------
    // Integers

    /// Collect one value.
    pub fn put_int(&mut self, id: IntBandId, value: i32) -> Result<()> {
        self.tree.put_value(id.id(), value)
    }

    /// Take the next value.
    pub fn get_int(&mut self, id: IntBandId) -> Result<i32> {
        self.tree.get_value(id.id())
    }

    /// Wrapping sum of every value; the band is rewound afterwards.
    pub fn get_int_total(&mut self, id: IntBandId) -> Result<i32> {
        self.tree.check_whole_pass(id.id())?;
        let mut total = 0i32;
        for _ in 0..self.tree.len(id) {
            total = total.wrapping_add(self.tree.get_value(id.id())?);
        }
        self.tree.reset_for_second_pass(id.id())?;
        Ok(total)
    }

    /// Number of values equal to `value`; the band is rewound afterwards.
    pub fn get_int_count(&mut self, id: IntBandId, value: i32) -> Result<usize> {
        self.tree.check_whole_pass(id.id())?;
        let mut count = 0;
        for _ in 0..self.tree.len(id) {
            if self.tree.get_value(id.id())? == value {
                count += 1;
            }
        }
        self.tree.reset_for_second_pass(id.id())?;
        Ok(count)
    }

    /// Overwrite one of the two archive size words in `archive_header_S`
    /// after the fact.
    pub fn patch_value(&mut self, id: IntBandId, i: usize, value: i32) -> Result<()> {
        if id != self.bands.archive_header_s || i > 1 {
            return Err(PackError::Invariant(format!(
                "cannot patch value {} of {}",
                i,
                self.tree.name(id)
            )));
        }
        let len = self.tree.len(id);
        let band = self
            .tree
            .value_band_mut(id.id())
            .ok_or_else(|| PackError::Invariant("archive_header_S is not a value band".to_string()))?;
        let slot = band
            .values
            .get_mut(i)
            .ok_or_else(|| PackError::Invariant(format!("cannot patch value {} of {} values", i, len)))?;
        *slot = value;
        band.output_size = None;
        Ok(())
    }

    // ---------------------------------------------------------------
    // References

    fn register_cp_ref(&mut self, id: CpRefBandId, tag: CpTag) {
        match tag {
            CpTag::FieldSpecific => self.kq_bands.push(id),
            CpTag::None => {}
            _ => match &mut self.pending {
                Some(pending) => pending.push((id, tag)),
                None => self.bind_index(id, tag),
            },
        }
    }

    fn bind_index(&mut self, id: CpRefBandId, tag: CpTag) {
        match self.index_source.as_ref().and_then(|s| s.index_for(tag)) {
            Some(index) => {
                self.indexes.insert(id.id(), index);
            }
            None => tracing::warn!(band = %self.tree.name(id), %tag, "no index for reference band"),
        }
    }

    /// Bind every reference band declared so far to the index of its tag.
    /// Bands declared later bind immediately. May be called once.
    pub fn resolve_band_indexes(&mut self, source: Box<dyn IndexSource<E>>) -> Result<()> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| PackError::Invariant("band indexes already resolved".to_string()))?;
        self.index_source = Some(source);
        let count = pending.len();
        for (id, tag) in pending {
            self.bind_index(id, tag);
        }
        tracing::debug!(bands = count, "bound reference bands");
        Ok(())
    }

    /// Index the source provides for `tag`.
    pub fn index_for(&self, tag: CpTag) -> Result<IndexRef<E>> {
        self.index_source
            .as_ref()
            .and_then(|s| s.index_for(tag))
            .ok_or_else(|| PackError::MissingIndex(tag.to_string()))
    }

    /// Index bound to a reference band.
    pub fn band_index(&self, id: CpRefBandId) -> Option<&IndexRef<E>> {
        self.indexes.get(&id.id())
    }

    /// Point the field-specific `ConstantValue` bands at the index of
    /// `tag`, or unbind them with `None`.
    pub fn set_constant_value_index(&mut self, tag: Option<CpTag>) -> Result<()> {
        let index = match tag {
            Some(tag) => Some(self.index_for(tag)?),
            None => None,
        };
        for id in &self.kq_bands {
            match &index {
                Some(index) => {
                    self.indexes.insert(id.id(), index.clone());
                }
                None => {
                    self.indexes.remove(&id.id());
                }
            }
        }
        Ok(())
    }

    fn ref_null_ok(&self, id: CpRefBandId) -> Result<bool> {
        match self.tree.value_band(id.id()).map(|b| b.role) {
            Some(ValueRole::CpRef { null_ok, .. }) => Ok(null_ok),
            _ => Err(PackError::Invariant(format!("{} is not a reference band", self.tree.name(id)))),
        }
    }

    fn bound_index(&self, id: CpRefBandId) -> Result<IndexRef<E>> {
        self.indexes
            .get(&id.id())
            .cloned()
            .ok_or_else(|| PackError::MissingIndex(self.tree.name(id).to_string()))
    }

    fn encode_ref(&self, id: CpRefBandId, entry: Option<&E>, index: &IndexRef<E>) -> Result<i32> {
        let null_ok = self.ref_null_ok(id)?;
        let position = match entry {
            None if null_ok => -1,
            None => {
                return Err(PackError::Invariant(format!("null reference in {}", self.tree.name(id))));
            }
            Some(e) => {
                let position = index.index_of(e).ok_or_else(|| {
                    PackError::Invariant(format!("{:?} is not in the index of {}", e, self.tree.name(id)))
                })?;
                i32::try_from(position)
                    .map_err(|_| PackError::LimitExceeded(format!("reference position {}", position)))?
            }
        };
        let code = position + i32::from(null_ok);
        tracing::trace!(band = %self.tree.name(id), code, "put ref");
        Ok(code)
    }

    fn decode_ref(&self, id: CpRefBandId, code: i32, index: &IndexRef<E>) -> Result<Option<E>> {
        let null_ok = self.ref_null_ok(id)?;
        let position = code.wrapping_sub(i32::from(null_ok));
        tracing::trace!(band = %self.tree.name(id), code, "get ref");
        if null_ok && position == -1 {
            return Ok(None);
        }
        usize::try_from(position)
            .ok()
            .and_then(|p| index.entry(p))
            .cloned()
            .map(Some)
            .ok_or_else(|| PackError::BadReference {
                band: self.tree.name(id).to_string(),
                value: code,
                limit: index.size() + usize::from(null_ok),
            })
    }

    /// Collect a reference through the band's bound index.
    pub fn put_ref(&mut self, id: CpRefBandId, entry: Option<&E>) -> Result<()> {
        let index = self.bound_index(id)?;
        let code = self.encode_ref(id, entry, &index)?;
        self.tree.put_value(id.id(), code)
    }

    /// Collect a reference through an explicit index, for bands whose
    /// index changes per value.
    pub fn put_ref_with(&mut self, id: CpRefBandId, entry: Option<&E>, index: &IndexRef<E>) -> Result<()> {
        self.tree.verifier().check(!self.indexes.contains_key(&id.id()), &|| {
            format!("{} already has a bound index", self.tree.name(id))
        })?;
        let code = self.encode_ref(id, entry, index)?;
        self.tree.put_value(id.id(), code)
    }

    /// Take the next reference through the band's bound index.
    pub fn get_ref(&mut self, id: CpRefBandId) -> Result<Option<E>> {
        let index = self.bound_index(id)?;
        let code = self.tree.get_value(id.id())?;
        self.decode_ref(id, code, &index)
    }

    /// Take the next reference through an explicit index.
    pub fn get_ref_with(&mut self, id: CpRefBandId, index: &IndexRef<E>) -> Result<Option<E>> {
        self.tree.verifier().check(!self.indexes.contains_key(&id.id()), &|| {
            format!("{} already has a bound index", self.tree.name(id))
        })?;
        let code = self.tree.get_value(id.id())?;
        self.decode_ref(id, code, index)
    }

    // ---------------------------------------------------------------
    // Bytes

    /// Collect one byte.
    pub fn put_byte(&mut self, id: ByteBandId, byte: u8) -> Result<()> {
        self.tree.put_bytes(id, &[byte])
    }

    /// Collect a run of bytes.
    pub fn put_bytes(&mut self, id: ByteBandId, bytes: &[u8]) -> Result<()> {
        self.tree.put_bytes(id, bytes)
    }

    /// Take the next byte.
    pub fn get_byte(&mut self, id: ByteBandId) -> Result<u8> {
        Ok(self.tree.get_bytes(id, 1)?[0])
    }

    /// Take the next `n` bytes.
    pub fn get_bytes(&mut self, id: ByteBandId, n: usize) -> Result<&[u8]> {
        self.tree.get_bytes(id, n)
    }

    // ---------------------------------------------------------------
    // Coding choice

    fn can_vary_coding(&self, id: BandId, len: usize) -> bool {
        if !self.options.vary_codings || len == 0 {
            return false;
        }
        match self.tree.value_band(id) {
            Some(band) if !band.fixed_coding => supports_escapes(&self.tree.regular_coding(id)),
            _ => false,
        }
    }

    /// Commit a coding for every collected value band.
    pub fn choose_band_codings(&mut self) -> Result<()> {
        if self.is_reader() {
            return Err(PackError::Invariant("a reader does not choose codings".to_string()));
        }
        for id in self.tree.leaves(self.bands.all_bands) {
            if self.tree.value_band(id).is_some() && self.tree.phase(id) == Phase::Collect {
                self.choose_band_coding(id)?;
            }
        }
        Ok(())
    }

    fn choose_band_coding(&mut self, id: BandId) -> Result<()> {
        let regular = self.tree.regular_coding(id);
        let len = self.tree.len(id);
        let can_vary = self.can_vary_coding(id, len);
        let search = can_vary && self.effort > MIN_EFFORT && (self.effort >= MAX_EFFORT || len >= SHORT_BAND_HEURISTIC);
        let Some(band) = self.tree.value_band(id) else {
            return Ok(());
        };
        let values = &band.values;
        let method: CodingMethod = if search {
            match self.chooser.choose(values, &regular) {
                Some(choice) => choice.method,
                None => UNSIGNED5.into(),
            }
        } else if regular.can_represent(values) {
            regular.into()
        } else if can_vary {
            UNSIGNED5.into()
        } else {
            let value = values
                .iter()
                .copied()
                .find(|&v| !regular.can_represent_value(v))
                .unwrap_or_default();
            return Err(PackError::ValueOutOfRange {
                value,
                coding: regular.to_string(),
            });
        };
        let meta = if can_vary {
            band_meta_coding(&method, values, &regular)
        } else {
            MetaBytes::new()
        };
        let data = method.array_length(values).ok_or_else(|| PackError::ValueOutOfRange {
            value: values.first().copied().unwrap_or_default(),
            coding: method.to_string(),
        })?;
        let escape = match meta.first() {
            Some(&xb) => {
                let x = encode_escape_value(xb, &regular)
                    .ok_or_else(|| PackError::InvalidCoding(format!("{} cannot carry escapes", regular)))?;
                regular.set_d(0).length_of(x)?
            }
            None => 0,
        };
        if !method.is_coding(&regular) {
            tracing::debug!(
                band = %self.tree.name(id),
                len,
                coding = %method,
                regular = %regular,
                meta = ?meta.as_slice(),
                "irregular coding"
            );
        }
        if meta.len() > 1 {
            self.tree.put_bytes(self.bands.band_headers, &meta[1..])?;
        }
        if let Some(band) = self.tree.value_band_mut(id) {
            band.coding = Some(method);
            band.meta = meta;
            band.output_size = Some(data + escape);
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Writing

    /// Write every band in wire order, returning the byte count.
    ///
    /// Codings must have been chosen first.
    pub fn write_all_bands_to<W: Write>(&mut self, out: W) -> Result<u64> {
        let mut out = ByteCounter::new(out);
        self.write_band(self.bands.all_bands.id(), &mut out)?;
        out.flush()?;
        let total = out.count();
        tracing::info!(bytes = total, bands = self.tree.band_count(), "wrote all bands");
        Ok(total)
    }

    fn write_band<W: Write>(&mut self, id: BandId, out: &mut ByteCounter<W>) -> Result<()> {
        self.tree.check_ready_to_write(id)?;
        let start = out.count();
        let retired = self.tree.phase(id) == Phase::Frozen;
        self.tree.set_phase(id, Phase::Write)?;
        if self.tree.is_multi(id) {
            let children = self.tree.children(MultiBandId(id)).to_vec();
            for child in children {
                self.write_band(child, out)?;
            }
        } else {
            if self.options.debug_bands && !retired {
                let name = self.tree.name(id);
                if !name.starts_with('(') {
                    self.band_sequence.push_back(name.to_string());
                }
            }
            self.write_data(id, out)?;
        }
        self.tree.set_phase(id, Phase::Done)?;
        let written = out.count() - start;
        if written > 0 {
            tracing::debug!(band = %self.tree.name(id), bytes = written, "wrote band");
        }
        Ok(())
    }

    fn write_data<W: Write>(&self, id: BandId, out: &mut ByteCounter<W>) -> Result<()> {
        let node = self.tree.node(id);
        match &node.kind {
            BandKind::Multi(_) => Ok(()),
            BandKind::Byte(band) => {
                out.write_all(&band.bytes)?;
                if let Some(dumper) = &self.dumper {
                    dumper.dump_bytes(&node.name, node.seq, &band.bytes)?;
                }
                Ok(())
            }
            BandKind::Value(band) => {
                if band.values.is_empty() {
                    return Ok(());
                }
                let method = band
                    .coding
                    .as_ref()
                    .ok_or_else(|| PackError::Invariant(format!("no coding chosen for {}", node)))?;
                let start = out.count();
                if let Some(&xb) = band.meta.first() {
                    let x = encode_escape_value(xb, &node.regular)
                        .ok_or_else(|| PackError::InvalidCoding(format!("{} cannot carry escapes", node.regular)))?;
                    node.regular.set_d(0).write_value(out, x)?;
                }
                let mut encoded = Vec::with_capacity(band.output_size.unwrap_or_default());
                method.write_array_to(&mut encoded, &band.values)?;
                out.write_all(&encoded)?;
                let written = (out.count() - start) as usize;
                if let Some(size) = band.output_size {
                    self.tree.verifier().check(size == written, &|| {
                        format!("{} wrote {} bytes, expected {}", node, written, size)
                    })?;
                }
                if let Some(dumper) = &self.dumper {
                    let irregular = !method.is_coding(&node.regular);
                    let header = dump_header(band.values.len(), written, irregular, &method.to_string(), &band.meta);
                    dumper.dump_values(&node.name, node.seq, &header, &band.values, &encoded)?;
                }
                Ok(())
            }
        }
    }

    // ---------------------------------------------------------------
    // Reading

    /// Read every band still expecting input, in declaration order.
    pub fn read_all_bands_from<R: Read>(&mut self, mut input: R) -> Result<()> {
        let mut read = 0usize;
        for id in self.tree.leaves(self.bands.all_bands) {
            if self.tree.phase(id) == Phase::Expect {
                self.read_band(id, &mut input)?;
                read += 1;
            }
        }
        tracing::info!(bands = read, "read all bands");
        Ok(())
    }

    /// Read one band, whose length must already be announced.
    ///
    /// Reading `band_headers` also loads the meta-coding cursor used by the
    /// bands after it.
    pub fn read_band<R: Read + ?Sized>(&mut self, id: impl Into<BandId>, input: &mut R) -> Result<()> {
        let id = id.into();
        if self.tree.is_multi(id) {
            return Err(PackError::Invariant(format!(
                "aggregate {} is read through its children",
                self.tree.name(id)
            )));
        }
        self.tree.check_ready_to_read(id)?;
        self.check_band_sequence(id)?;
        self.tree.set_phase(id, Phase::Read)?;
        let expected = self.tree.expected(id);
        self.check_expected(id, expected)?;
        if self.tree.value_band(id).is_some() {
            self.read_values(id, expected, input)?;
        } else {
            self.read_bytes(ByteBandId(id), expected, input)?;
        }
        self.tree.set_phase(id, Phase::Disburse)?;
        tracing::debug!(band = %self.tree.name(id), len = expected, "read band");
        if id == self.bands.band_headers.id() {
            self.load_band_headers()?;
        }
        Ok(())
    }

    fn check_band_sequence(&mut self, id: BandId) -> Result<()> {
        if !self.options.debug_bands {
            return Ok(());
        }
        let name = self.tree.name(id);
        if name.starts_with('(') {
            return Ok(());
        }
        match self.band_sequence.pop_front() {
            Some(logged) if logged == name => Ok(()),
            Some(logged) => self
                .tree
                .verifier()
                .violation(format!("expected {} but read {}", logged, name)),
            None => self
                .tree
                .verifier()
                .violation(format!("band sequence exhausted before {}", name)),
        }
    }

    fn read_bytes<R: Read + ?Sized>(&mut self, id: ByteBandId, n: usize, input: &mut R) -> Result<()> {
        let mut bytes = vec![0u8; n];
        input.read_exact(&mut bytes).map_err(PackError::from_read)?;
        let node = self.tree.node(id.id());
        if let Some(dumper) = &self.dumper {
            dumper.dump_bytes(&node.name, node.seq, &bytes)?;
        }
        if let BandKind::Byte(band) = &mut self.tree.node_mut(id.id()).kind {
            band.bytes = bytes;
            band.cursor = 0;
        }
        Ok(())
    }

    fn load_band_headers(&mut self) -> Result<()> {
        let id = self.bands.band_headers;
        let n = self.tree.len(id);
        self.header_bytes = self.tree.get_bytes(id, n)?.to_vec();
        self.header_pos = 0;
        self.tree.done_disbursing(id.id())
    }

    fn read_values<R: Read + ?Sized>(&mut self, id: BandId, n: usize, input: &mut R) -> Result<()> {
        let regular = self.tree.regular_coding(id);
        let mut values = vec![0i32; n];
        let mut method: CodingMethod = regular.into();
        let mut meta = MetaBytes::new();
        if n > 0 {
            let plain = regular.set_d(0);
            let first = if self.can_vary_coding(id, n) {
                Some(plain.read_value(input)?)
            } else {
                None
            };
            match first.map(|x| (x, decode_escape_value(x, &regular))) {
                Some((x, None)) => {
                    values[0] = x;
                    plain.read_array_from(input, &mut values[1..])?;
                    regular.undo_delta(&mut values);
                }
                Some((_, Some(xb))) => {
                    meta.push(xb);
                    if xb != 0 {
                        let rest = self.header_bytes.get(self.header_pos..).unwrap_or_default();
                        let mut reader = MetaReader::with_lead(xb, rest);
                        method = parse_meta_coding(&mut reader, &regular, &self.options.limits)?;
                        let used = reader.position();
                        meta.extend_from_slice(&rest[..used]);
                        self.header_pos += used;
                    }
                    method.read_array_from(input, &mut values)?;
                }
                None => method.read_array_from(input, &mut values)?,
            }
        }
        self.check_cp_refs(id, &values)?;
        if !method.is_coding(&regular) {
            tracing::debug!(band = %self.tree.name(id), len = n, coding = %method, meta = ?meta.as_slice(), "irregular coding");
        }
        if let Some(dumper) = &self.dumper {
            let node = self.tree.node(id);
            let mut encoded = Vec::new();
            method.write_array_to(&mut encoded, &values)?;
            let header = dump_header(n, encoded.len(), !method.is_coding(&regular), &method.to_string(), &meta);
            dumper.dump_values(&node.name, node.seq, &header, &values, &encoded)?;
        }
        if let Some(band) = self.tree.value_band_mut(id) {
            band.values = values;
            band.disbursed = 0;
            band.coding = Some(method);
            band.meta = meta;
        }
        Ok(())
    }

    fn check_cp_refs(&self, id: BandId, values: &[i32]) -> Result<()> {
        let Some(index) = self.indexes.get(&id) else {
            return Ok(());
        };
        let limit = index.size() + 1;
        let bad = values
            .iter()
            .enumerate()
            .find(|&(_, &v)| usize::try_from(v).map_or(true, |v| v >= limit));
        match bad {
            Some((i, v)) => self.tree.verifier().violation(format!(
                "reference out of range [{}] = {} in {}",
                i,
                v,
                self.tree.name(id)
            )),
            None => Ok(()),
        }
    }

    // ---------------------------------------------------------------
    // Diagnostics

    /// Take the band names recorded while writing with `debug_bands`.
    pub fn take_band_sequence(&mut self) -> Vec<String> {
        self.band_sequence.drain(..).collect()
    }

    /// Hand a writer's band sequence to this reader.
    pub fn set_band_sequence(&mut self, names: Vec<String>) {
        self.band_sequence = names.into();
    }

    /// Summary of every band in wire order.
    pub fn report(&self) -> BandReport {
        BandReport::collect(&self.tree, self.bands.all_bands)
    }

    // ---------------------------------------------------------------
    // Attributes

    fn predefine(&mut self, index: usize, def: Layout, bands: &[BandId]) -> Result<()> {
        if def.band_count() != bands.len() {
            return Err(PackError::AttributeDefinition(format!(
                "{} needs {} bands, got {}",
                def,
                def.band_count(),
                bands.len()
            )));
        }
        self.attrs.set_layout_index(def.clone(), AttrSlot::Flag(index))?;
        self.attr_band_table.insert(def, bands.to_vec());
        Ok(())
    }

    fn predefine_from_layout(&mut self, index: usize, def: Layout, prefix: &str, parent: MultiBandId) -> Result<()> {
        let bands = self.make_attribute_bands(prefix, &def, parent);
        self.predefine(index, def, &bands)
    }

    fn predefine_attributes(&mut self) -> Result<()> {
        use AttrContext::{Class, Code, Field, Method};
        let b = self.bands.clone();

        self.predefine(CLASS_ATTR_INNER_CLASSES, Layout::empty(Class, "InnerClasses"), &[])?;
        self.predefine(CLASS_ATTR_SOURCE_FILE, standard::source_file(), &[b.class_source_file_run.id()])?;
        self.predefine(
            CLASS_ATTR_ENCLOSING_METHOD,
            standard::enclosing_method(),
            &[b.class_enclosing_method_rc.id(), b.class_enclosing_method_rdn.id()],
        )?;
        self.predefine(
            CLASS_ATTR_CLASS_FILE_VERSION,
            standard::class_file_version(),
            &[b.class_class_file_version_minor_h.id(), b.class_class_file_version_major_h.id()],
        )?;
        self.predefine(X_ATTR_SIGNATURE, standard::signature(Class), &[b.class_signature_rs.id()])?;
        self.predefine(X_ATTR_DEPRECATED, Layout::empty(Class, "Deprecated"), &[])?;
        self.predefine(X_ATTR_OVERFLOW, Layout::empty(Class, ".Overflow"), &[])?;

        self.predefine(FIELD_ATTR_CONSTANT_VALUE, standard::constant_value(), &[b.field_constant_value_kq.id()])?;
        self.predefine(X_ATTR_SIGNATURE, standard::signature(Field), &[b.field_signature_rs.id()])?;
        self.predefine(X_ATTR_DEPRECATED, Layout::empty(Field, "Deprecated"), &[])?;
        self.predefine(X_ATTR_OVERFLOW, Layout::empty(Field, ".Overflow"), &[])?;

        self.predefine(METHOD_ATTR_CODE, Layout::empty(Method, "Code"), &[])?;
        self.predefine(
            METHOD_ATTR_EXCEPTIONS,
            standard::exceptions(),
            &[b.method_exceptions_n.id(), b.method_exceptions_rc.id()],
        )?;
        self.predefine(
            METHOD_ATTR_METHOD_PARAMETERS,
            standard::method_parameters(),
            &[
                b.method_method_parameters_nb.id(),
                b.method_method_parameters_name_run.id(),
                b.method_method_parameters_flag_fh.id(),
            ],
        )?;
        self.predefine(X_ATTR_SIGNATURE, standard::signature(Method), &[b.method_signature_rs.id()])?;
        self.predefine(X_ATTR_DEPRECATED, Layout::empty(Method, "Deprecated"), &[])?;
        self.predefine(X_ATTR_OVERFLOW, Layout::empty(Method, ".Overflow"), &[])?;

        for ctx in AttrContext::ALL {
            let name = ctx.name();
            if let Some(md) = b.metadata_bands(ctx) {
                self.predefine_from_layout(
                    X_ATTR_RUNTIME_VISIBLE_ANNOTATIONS,
                    standard::annotations(ctx, "RuntimeVisibleAnnotations"),
                    &format!("{}_RVA_", name),
                    md,
                )?;
                self.predefine_from_layout(
                    X_ATTR_RUNTIME_INVISIBLE_ANNOTATIONS,
                    standard::annotations(ctx, "RuntimeInvisibleAnnotations"),
                    &format!("{}_RIA_", name),
                    md,
                )?;
                if ctx == Method {
                    self.predefine_from_layout(
                        METHOD_ATTR_RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS,
                        standard::parameter_annotations("RuntimeVisibleParameterAnnotations"),
                        "method_RVPA_",
                        md,
                    )?;
                    self.predefine_from_layout(
                        METHOD_ATTR_RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS,
                        standard::parameter_annotations("RuntimeInvisibleParameterAnnotations"),
                        "method_RIPA_",
                        md,
                    )?;
                    self.predefine_from_layout(
                        METHOD_ATTR_ANNOTATION_DEFAULT,
                        standard::annotation_default(),
                        "method_AD_",
                        md,
                    )?;
                }
            }
            let tmd = b.type_metadata_bands(ctx);
            self.predefine_from_layout(
                X_ATTR_RUNTIME_VISIBLE_TYPE_ANNOTATIONS,
                standard::type_annotations(ctx, "RuntimeVisibleTypeAnnotations"),
                &format!("{}_RVTA_", name),
                tmd,
            )?;
            self.predefine_from_layout(
                X_ATTR_RUNTIME_INVISIBLE_TYPE_ANNOTATIONS,
                standard::type_annotations(ctx, "RuntimeInvisibleTypeAnnotations"),
                &format!("{}_RITA_", name),
                tmd,
            )?;
        }

        let stackmap = self.tree.leaves(b.stackmap_bands);
        self.predefine(CODE_ATTR_STACK_MAP_TABLE, standard::stack_map_table(), &stackmap)?;
        self.predefine(
            CODE_ATTR_LINE_NUMBER_TABLE,
            standard::line_number_table(),
            &[
                b.code_line_number_table_n.id(),
                b.code_line_number_table_bci_p.id(),
                b.code_line_number_table_line.id(),
            ],
        )?;
        self.predefine(
            CODE_ATTR_LOCAL_VARIABLE_TABLE,
            standard::local_variable_table("LocalVariableTable"),
            &[
                b.code_local_variable_table_n.id(),
                b.code_local_variable_table_bci_p.id(),
                b.code_local_variable_table_span_o.id(),
                b.code_local_variable_table_name_ru.id(),
                b.code_local_variable_table_type_rs.id(),
                b.code_local_variable_table_slot.id(),
            ],
        )?;
        self.predefine(
            CODE_ATTR_LOCAL_VARIABLE_TYPE_TABLE,
            standard::local_variable_table("LocalVariableTypeTable"),
            &[
                b.code_local_variable_type_table_n.id(),
                b.code_local_variable_type_table_bci_p.id(),
                b.code_local_variable_type_table_span_o.id(),
                b.code_local_variable_type_table_name_ru.id(),
                b.code_local_variable_type_table_type_rs.id(),
                b.code_local_variable_type_table_slot.id(),
            ],
        )?;
        self.predefine(X_ATTR_OVERFLOW, Layout::empty(Code, ".Overflow"), &[])?;

        self.attrs.finish_predefs();
        Ok(())
    }

    /// Create one band per band-carrying element of `def` under `parent`.
    fn make_attribute_bands(&mut self, prefix: &str, def: &Layout, parent: MultiBandId) -> Vec<BandId> {
        let mut elems = Vec::new();
        walk_band_elements(&def.elements, &mut |e| elems.push(e));
        let mut out = Vec::with_capacity(elems.len());
        for e in elems {
            let name = element_band_name(prefix, self.tree.children(parent).len(), e);
            let id = match e.band_spec() {
                Some(ElementBand::Int(coding)) => self.tree.add_int(parent, &name, coding).id(),
                Some(ElementBand::Reference { tag, null_ok }) => {
                    self.add_cp_ref_band(parent, &name, UNSIGNED5, tag, null_ok).id()
                }
                None => continue,
            };
            out.push(id);
        }
        out
    }

    /// Build bands for every attribute the archive defined itself. Bands
    /// previously serving a redefined slot are retired.
    pub fn make_new_attribute_bands(&mut self) -> Result<()> {
        self.adjust_special_attr_masks();
        for ctx in AttrContext::ALL {
            let parent = self.bands.attr_bands(ctx);
            for def in self.attrs.defs_needing_bands(ctx) {
                let prefix = format!("{}_{}_", ctx.name(), def.name);
                let bands = self.make_attribute_bands(&prefix, &def, parent);
                tracing::debug!(attr = %def, bands = bands.len(), "made attribute bands");
                if let Some(old) = self.attr_band_table.insert(def, bands) {
                    for id in old {
                        self.tree.done_with_unused_band(id)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Bands carrying attribute `def`, if any were made.
    pub fn attr_bands(&self, def: &Layout) -> Option<&[BandId]> {
        self.attr_band_table.get(def).map(Vec::as_slice)
    }

    /// Install an attribute definition from the archive.
    pub fn set_attribute_layout_index(&mut self, def: Layout, slot: AttrSlot) -> Result<usize> {
        self.attrs.set_layout_index(def, slot)
    }

    /// Drop the definition at `index` and retire its bands.
    pub fn undefine_attribute(&mut self, ctx: AttrContext, index: usize) -> Result<Layout> {
        let def = self.attrs.undefine(ctx, index)?;
        let bands = self.attr_band_table.get(&def).cloned().unwrap_or_default();
        for id in bands {
            self.tree.done_with_unused_band(id)?;
        }
        Ok(def)
    }

    /// The flag and count bands opening `ctx`.
    pub fn attr_band_group(&self, ctx: AttrContext) -> AttrBandGroup {
        let b = &self.bands;
        match ctx {
            AttrContext::Class => AttrBandGroup {
                flags_hi: b.class_flags_hi,
                flags_lo: b.class_flags_lo,
                attr_count: b.class_attr_count,
                attr_indexes: b.class_attr_indexes,
                attr_calls: b.class_attr_calls,
            },
            AttrContext::Field => AttrBandGroup {
                flags_hi: b.field_flags_hi,
                flags_lo: b.field_flags_lo,
                attr_count: b.field_attr_count,
                attr_indexes: b.field_attr_indexes,
                attr_calls: b.field_attr_calls,
            },
            AttrContext::Method => AttrBandGroup {
                flags_hi: b.method_flags_hi,
                flags_lo: b.method_flags_lo,
                attr_count: b.method_attr_count,
                attr_indexes: b.method_attr_indexes,
                attr_calls: b.method_attr_calls,
            },
            AttrContext::Code => AttrBandGroup {
                flags_hi: b.code_flags_hi,
                flags_lo: b.code_flags_lo,
                attr_count: b.code_attr_count,
                attr_indexes: b.code_attr_indexes,
                attr_calls: b.code_attr_calls,
            },
        }
    }

    /// Predefined definitions still in force for `ctx`.
    pub fn predefined_attrs(&self, ctx: AttrContext) -> Vec<&Layout> {
        self.attrs.predefined_attrs(ctx)
    }

    /// True if slot `index` of `ctx` holds a predefined attribute.
    pub fn is_predefined_attr(&self, ctx: AttrContext, index: usize) -> bool {
        self.attrs.is_predefined_attr(ctx, index)
    }

    /// Clear special mask bits for slots the archive redefined.
    pub fn adjust_special_attr_masks(&mut self) {
        self.attrs.adjust_special_attr_masks();
    }

    /// Record the archive options and size the attribute tables from them.
    pub fn set_archive_options(&mut self, options: u32) -> Result<()> {
        self.archive_options = options;
        self.attrs.init_index_limit(options)
    }

    /// Archive option bits.
    pub fn archive_options(&self) -> u32 {
        self.archive_options
    }

    /// Set the newest class version in the archive. Allowed once; versions
    /// older than [`STACK_MAP_CLASS_VERSION`] retire the `StackMapTable`
    /// bands.
    pub fn init_highest_class_version(&mut self, version: ClassVersion) -> Result<()> {
        if let Some(old) = self.highest_class_version {
            return Err(PackError::VersionAlreadySet(format!("{}; new setting is {}", old, version)));
        }
        self.highest_class_version = Some(version);
        if version < STACK_MAP_CLASS_VERSION {
            self.undefine_attribute(AttrContext::Code, CODE_ATTR_STACK_MAP_TABLE)?;
        }
        Ok(())
    }

    /// Newest class version, once set.
    pub fn highest_class_version(&self) -> Option<ClassVersion> {
        self.highest_class_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::ATTR_INDEX_LIMIT_LO;
    use crate::index::Index;
    use crate::layout::LayoutElement;
    use crate::verify::StrictVerifier;
    use bandpack_format::{DELTA5, SIGNED5};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Names(Vec<String>);

    impl Index<String> for Names {
        fn size(&self) -> usize {
            self.0.len()
        }

        fn entry(&self, position: usize) -> Option<&String> {
            self.0.get(position)
        }

        fn index_of(&self, entry: &String) -> Option<usize> {
            self.0.iter().position(|e| e == entry)
        }
    }

    struct OneIndex(IndexRef<String>);

    impl IndexSource<String> for OneIndex {
        fn index_for(&self, _tag: CpTag) -> Option<IndexRef<String>> {
            Some(self.0.clone())
        }
    }

    fn names(list: &[&str]) -> IndexRef<String> {
        Arc::new(Names(list.iter().map(|s| s.to_string()).collect()))
    }

    fn structure(mode: Mode) -> BandStructure<String> {
        structure_with(mode, CodecOptions::default())
    }

    fn structure_with(mode: Mode, options: CodecOptions) -> BandStructure<String> {
        BandStructure::with_verifier(mode, options, Box::new(StrictVerifier)).unwrap()
    }

    /// Plain UNSIGNED5 band appended after every static band.
    fn extra(s: &mut BandStructure<String>, regular: Coding) -> IntBandId {
        let root = s.bands().all_bands;
        s.add_int_band(root, "extra", regular)
    }

    fn write(s: &mut BandStructure<String>) -> Vec<u8> {
        s.choose_band_codings().unwrap();
        let mut out = Vec::new();
        s.write_all_bands_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_header_bands_are_fixed() {
        let s = structure(Mode::Writer);
        let header = s.bands().archive_header_s.id();
        assert!(s.tree().value_band(header).unwrap().fixed_coding);
        assert!(!s.can_vary_coding(header, 1000));
        assert!(s.can_vary_coding(s.bands().cp_int.id(), 1000));
        assert!(!s.can_vary_coding(s.bands().cp_int.id(), 0));
        // BYTE1 has no room for escapes.
        assert!(!s.can_vary_coding(s.bands().method_method_parameters_nb.id(), 1000));
    }

    #[test]
    fn test_empty_structure_writes_nothing() {
        let mut s = structure(Mode::Writer);
        assert!(write(&mut s).is_empty());
        assert_eq!(s.phase(s.bands().all_bands), Phase::Done);
    }

    #[test]
    fn test_short_band_keeps_regular_coding() {
        let mut s = structure(Mode::Writer);
        let band = extra(&mut s, UNSIGNED5);
        for v in [1, 2, 3] {
            s.put_int(band, v).unwrap();
        }
        assert_eq!(write(&mut s), vec![1, 2, 3]);
        assert!(s.band_meta(band).is_empty());
        assert_eq!(s.band_coding(band), Some(&CodingMethod::from(UNSIGNED5)));
    }

    #[test]
    fn test_escape_collision_gets_default_marker() {
        let mut s = structure(Mode::Writer);
        let band = extra(&mut s, UNSIGNED5);
        // 192 is the first escape value of UNSIGNED5.
        s.put_int(band, 192).unwrap();
        let out = write(&mut s);
        assert_eq!(s.band_meta(band), &[0]);
        assert_eq!(out.len(), 2 + 2);

        let mut r = structure(Mode::Reader);
        let rband = extra(&mut r, UNSIGNED5);
        r.expect_length(rband, 1).unwrap();
        r.read_all_bands_from(&out[..]).unwrap();
        assert_eq!(r.get_int(rband).unwrap(), 192);
        assert_eq!(r.band_meta(rband), &[0]);
    }

    #[test]
    fn test_unrepresentable_fixed_band() {
        let mut s = structure(Mode::Writer);
        s.put_int(s.bands().archive_header_0, -5).unwrap();
        assert!(s.choose_band_codings().is_ok());

        let mut s = structure_with(
            Mode::Writer,
            CodecOptions {
                vary_codings: false,
                ..CodecOptions::default()
            },
        );
        s.put_int(s.bands().method_method_parameters_nb, 300).unwrap();
        assert!(matches!(
            s.choose_band_codings(),
            Err(PackError::ValueOutOfRange { value: 300, .. })
        ));
    }

    #[test]
    fn test_delta_band_without_escape() {
        let mut s = structure_with(
            Mode::Writer,
            CodecOptions {
                effort: MIN_EFFORT,
                ..CodecOptions::default()
            },
        );
        let band = extra(&mut s, DELTA5);
        let values: Vec<i32> = (0..200).map(|i| 1000 + i * 3).collect();
        for &v in &values {
            s.put_int(band, v).unwrap();
        }
        let out = write(&mut s);
        assert_eq!(s.band_coding(band), Some(&CodingMethod::from(DELTA5)));

        let mut r = structure(Mode::Reader);
        let rband = extra(&mut r, DELTA5);
        r.expect_length(rband, values.len()).unwrap();
        r.read_all_bands_from(&out[..]).unwrap();
        assert_eq!(r.values(rband), &values[..]);
    }

    #[test]
    fn test_irregular_coding_round_trip() {
        let options = CodecOptions {
            effort: MAX_EFFORT,
            ..CodecOptions::default()
        };
        let mut s = structure_with(Mode::Writer, options.clone());
        let band = extra(&mut s, SIGNED5);
        let values: Vec<i32> = (0..300).map(|i| 1000 + (i % 11)).collect();
        for &v in &values {
            s.put_int(band, v).unwrap();
        }
        let out = write(&mut s);
        assert!(!s.band_meta(band).is_empty());
        assert!(out.len() < SIGNED5.array_length(&values).unwrap());
        let headers = s.len(s.bands().band_headers);

        let mut r = structure_with(Mode::Reader, options);
        r.expect_length(r.bands().band_headers, headers).unwrap();
        let rband = extra(&mut r, SIGNED5);
        r.expect_length(rband, values.len()).unwrap();
        r.read_all_bands_from(&out[..]).unwrap();
        assert_eq!(r.values(rband), &values[..]);
        assert_eq!(r.band_meta(rband), s.band_meta(band));
        assert_eq!(r.phase(r.bands().band_headers), Phase::Done);
    }

    #[test]
    fn test_int_total_and_count() {
        let mut s = structure(Mode::Writer);
        let band = extra(&mut s, UNSIGNED5);
        for v in [5, -3, 8, 5] {
            s.put_int(band, v).unwrap();
        }
        let out = write(&mut s);

        let mut r = structure(Mode::Reader);
        let band = extra(&mut r, UNSIGNED5);
        r.expect_length(band, 4).unwrap();
        r.read_all_bands_from(&out[..]).unwrap();
        assert_eq!(r.get_int_total(band).unwrap(), 15);
        assert_eq!(r.get_int_total(band).unwrap(), 15);
        assert_eq!(r.get_int_count(band, 5).unwrap(), 2);
        assert_eq!(r.get_int(band).unwrap(), 5);
        assert!(r.get_int_total(band).is_err());
    }

    #[test]
    fn test_expect_length_limit() {
        let mut options = CodecOptions::default();
        options.limits.max_band_values = 10;
        let mut r = structure_with(Mode::Reader, options);
        let band = r.bands().cp_int;
        assert!(matches!(r.expect_length(band, 11), Err(PackError::LimitExceeded(_))));
        r.expect_length(band, 10).unwrap();
        assert!(matches!(r.expect_more_length(band, 1), Err(PackError::LimitExceeded(_))));
    }

    #[test]
    fn test_truncated_input() {
        let mut r = structure(Mode::Reader);
        let band = r.bands().cp_int;
        r.expect_length(band, 3).unwrap();
        assert!(matches!(r.read_all_bands_from(&[1u8, 2][..]), Err(PackError::UnexpectedEof)));
    }

    #[test]
    fn test_patch_value() {
        let mut s = structure(Mode::Writer);
        let header = s.bands().archive_header_s;
        s.put_int(header, 0).unwrap();
        s.put_int(header, 0).unwrap();
        s.choose_band_codings().unwrap();
        s.patch_value(header, 1, 1000).unwrap();
        assert_eq!(s.values(header), &[0, 1000]);
        assert!(s.patch_value(header, 2, 1).is_err());
        assert!(s.patch_value(s.bands().archive_header_0, 0, 1).is_err());
        let mut out = Vec::new();
        s.write_all_bands_to(&mut out).unwrap();
        assert_eq!(out.len(), 1 + 2);
    }

    #[test]
    fn test_refs_need_resolution() {
        let mut s = structure(Mode::Writer);
        let band = s.bands().cp_class;
        let entry = "java/lang/Object".to_string();
        assert!(matches!(s.put_ref(band, Some(&entry)), Err(PackError::MissingIndex(_))));
        s.resolve_band_indexes(Box::new(OneIndex(names(&["a", "java/lang/Object"]))))
            .unwrap();
        s.put_ref(band, Some(&entry)).unwrap();
        assert_eq!(s.values(band), &[1]);
        assert!(s.put_ref(band, None).is_err());
        assert!(s.resolve_band_indexes(Box::new(OneIndex(names(&[])))).is_err());
    }

    #[test]
    fn test_null_ok_refs() {
        let index = names(&["x", "y"]);
        let mut s = structure(Mode::Writer);
        s.resolve_band_indexes(Box::new(OneIndex(index.clone()))).unwrap();
        let band = s.bands().ic_outer_class;
        s.put_ref(band, None).unwrap();
        s.put_ref(band, Some(&"y".to_string())).unwrap();
        assert_eq!(s.values(band), &[0, 2]);
        let out = write(&mut s);

        let mut r = structure(Mode::Reader);
        r.resolve_band_indexes(Box::new(OneIndex(index))).unwrap();
        r.expect_length(band, 2).unwrap();
        r.read_all_bands_from(&out[..]).unwrap();
        assert_eq!(r.get_ref(band).unwrap(), None);
        assert_eq!(r.get_ref(band).unwrap(), Some("y".to_string()));
    }

    #[test]
    fn test_out_of_range_ref() {
        let mut s = structure(Mode::Writer);
        let band = s.bands().cp_class;
        s.tree.put_value(band.id(), 7).unwrap();
        let out = write(&mut s);

        let mut r = structure(Mode::Reader);
        r.resolve_band_indexes(Box::new(OneIndex(names(&["only"])))).unwrap();
        r.expect_length(band, 1).unwrap();
        assert!(matches!(r.read_all_bands_from(&out[..]), Err(PackError::Invariant(_))));
    }

    #[test]
    fn test_constant_value_index_switch() {
        let mut s = structure(Mode::Writer);
        s.resolve_band_indexes(Box::new(OneIndex(names(&["1", "2"])))).unwrap();
        let kq = s.bands().field_constant_value_kq;
        assert!(s.band_index(kq).is_none());
        s.set_constant_value_index(Some(CpTag::Integer)).unwrap();
        s.put_ref(kq, Some(&"2".to_string())).unwrap();
        assert_eq!(s.values(kq), &[1]);
        s.set_constant_value_index(None).unwrap();
        assert!(matches!(s.put_ref(kq, Some(&"1".to_string())), Err(PackError::MissingIndex(_))));
    }

    #[test]
    fn test_put_ref_with_explicit_index() {
        let index = names(&["a", "b"]);
        let mut s = structure(Mode::Writer);
        let band = s.bands().bc_escref;
        s.put_ref_with(band, Some(&"b".to_string()), &index).unwrap();
        assert_eq!(s.values(band), &[1]);
    }

    #[test]
    fn test_predefined_attributes() {
        let mut s = structure(Mode::Writer);
        s.set_archive_options(0).unwrap();
        assert!(s.is_predefined_attr(AttrContext::Class, CLASS_ATTR_SOURCE_FILE));
        assert!(s.is_predefined_attr(AttrContext::Code, CODE_ATTR_STACK_MAP_TABLE));
        assert!(!s.is_predefined_attr(AttrContext::Class, 30));
        let field: Vec<&str> = s
            .predefined_attrs(AttrContext::Field)
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert!(field.contains(&"ConstantValue"));
        assert!(field.contains(&"RuntimeVisibleTypeAnnotations"));
        let report = s.report();
        assert!(report.bands.iter().any(|b| b.name.starts_with("class_RVA_")));
        assert!(report.bands.iter().any(|b| b.name.starts_with("method_AD_")));
        assert!(report.bands.iter().any(|b| b.name.starts_with("code_RVTA_")));
        assert!(!report.bands.iter().any(|b| b.name.starts_with("code_RVA_")));
    }

    #[test]
    fn test_new_attribute_bands() {
        let mut s = structure(Mode::Writer);
        s.set_archive_options(0).unwrap();
        let lines = standard::line_number_table();
        let def = Layout::new(AttrContext::Method, "Lines", &lines.layout, lines.elements);
        let slot = AttrSlot::Flag(ATTR_INDEX_LIMIT_LO - 1);
        assert_eq!(s.set_attribute_layout_index(def.clone(), slot).unwrap(), ATTR_INDEX_LIMIT_LO - 1);
        s.make_new_attribute_bands().unwrap();
        let bands = s.attr_bands(&def).unwrap().to_vec();
        assert_eq!(bands.len(), 3);
        assert!(s.tree().name(bands[0]).starts_with("method_Lines_"));
        let group = s.attr_band_group(AttrContext::Method);
        assert_eq!(s.tree().name(group.attr_calls), "method_attr_calls");
    }

    #[test]
    fn test_redefined_slot_retires_static_bands() {
        let mut s = structure(Mode::Writer);
        s.set_archive_options(0).unwrap();
        let def = Layout::new(
            AttrContext::Class,
            "SourceFile",
            "RUNH",
            vec![LayoutElement::reference("RUNH", CpTag::Utf8, true)],
        );
        s.set_attribute_layout_index(def.clone(), AttrSlot::Flag(CLASS_ATTR_SOURCE_FILE))
            .unwrap();
        s.make_new_attribute_bands().unwrap();
        assert_eq!(s.phase(s.bands().class_source_file_run), Phase::Frozen);
        assert_ne!(s.attr_bands(&def).unwrap()[0], s.bands().class_source_file_run.id());
    }

    #[test]
    fn test_old_class_version_retires_stack_maps() {
        let mut s = structure(Mode::Reader);
        s.init_highest_class_version(ClassVersion::new(49, 0)).unwrap();
        assert_eq!(s.phase(s.bands().code_stack_map_table_n), Phase::Done);
        assert!(s.attrs().def(AttrContext::Code, CODE_ATTR_STACK_MAP_TABLE).is_none());
        assert!(matches!(
            s.init_highest_class_version(ClassVersion::new(52, 0)),
            Err(PackError::VersionAlreadySet(_))
        ));

        let mut s = structure(Mode::Reader);
        s.init_highest_class_version(ClassVersion::new(50, 0)).unwrap();
        assert_eq!(s.phase(s.bands().code_stack_map_table_n), Phase::Expect);
        assert_eq!(s.highest_class_version(), Some(STACK_MAP_CLASS_VERSION));
    }

    #[test]
    fn test_band_sequence() {
        let options = CodecOptions {
            debug_bands: true,
            ..CodecOptions::default()
        };
        let mut s = structure_with(Mode::Writer, options.clone());
        s.put_int(s.bands().cp_int, 4).unwrap();
        s.done_with_unused_band(s.bands().cp_float).unwrap();
        let out = write(&mut s);
        let sequence = s.take_band_sequence();
        assert!(sequence.iter().all(|n| !n.starts_with('(')));
        assert!(sequence.contains(&"cp_Int".to_string()));
        assert!(!sequence.contains(&"cp_Float".to_string()));

        let mut r = structure_with(Mode::Reader, options.clone());
        r.set_band_sequence(sequence.clone());
        r.expect_length(r.bands().cp_int, 1).unwrap();
        r.done_with_unused_band(r.bands().cp_float).unwrap();
        r.read_all_bands_from(&out[..]).unwrap();
        assert_eq!(r.get_int(r.bands().cp_int).unwrap(), 4);

        let mut r = structure_with(Mode::Reader, options);
        r.set_band_sequence(sequence.into_iter().skip(1).collect());
        assert!(matches!(r.read_all_bands_from(&[0u8; 0][..]), Err(PackError::Invariant(_))));
    }

    #[test]
    fn test_report() {
        let mut s = structure(Mode::Writer);
        let band = extra(&mut s, UNSIGNED5);
        s.put_int(band, 1).unwrap();
        write(&mut s);
        let report = s.report();
        assert_eq!(report.bands.len(), s.tree().band_count());
        assert_eq!(report.bands[0].name, "(package)");
        assert_eq!(report.total_output_size(), 1);
        assert!(report.to_json().unwrap().contains("\"phase\""));
    }

    #[test]
    fn test_dump_dir() {
        let dir = tempfile::tempdir().unwrap();
        let options = CodecOptions {
            dump_dir: Some(dir.path().to_path_buf()),
            ..CodecOptions::default()
        };
        let mut s = structure_with(Mode::Writer, options);
        let band = extra(&mut s, UNSIGNED5);
        s.put_int(band, 9).unwrap();
        write(&mut s);
        let seq = s.tree().node(band.id()).seq;
        let stem = crate::dump::dump_file_name("extra", seq);
        let txt = std::fs::read_to_string(dir.path().join(format!("{}.txt", stem))).unwrap();
        assert!(txt.starts_with("# length=1 size=1 coding=(5,64)"));
        assert_eq!(std::fs::read(dir.path().join(format!("{}.bnd", stem))).unwrap(), vec![9]);
    }
}
