//! Band arena
//!
//! Every band lives in one [`BandTree`] and is addressed by a small copyable
//! id. Aggregate bands hold the ids of their children in declaration order,
//! so a pre-order walk from the root is exactly the wire order.
//!
//! The tree owns the phase machine: every phase change, length change and
//! value hand-out is checked here and violations go to the tree's
//! [`Verifier`].

use crate::index::CpTag;
use crate::phase::Phase;
use crate::verify::Verifier;
use ahash::AHashMap;
use bandpack_format::{Coding, CodingMethod, MetaBytes, PackError, Result, BYTE1};
use serde::Serialize;
use std::fmt;

/// Position of a band in its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BandId(u32);

impl BandId {
    /// Arena slot of this band.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

macro_rules! typed_band_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub(crate) BandId);

        impl $name {
            /// Untyped id of this band.
            pub fn id(self) -> BandId {
                self.0
            }
        }

        impl From<$name> for BandId {
            fn from(id: $name) -> BandId {
                id.0
            }
        }
    };
}

typed_band_id!(
    /// Integer band with `put_int`/`get_int`.
    IntBandId
);
typed_band_id!(
    /// Integer band carrying constant-pool references.
    CpRefBandId
);
typed_band_id!(
    /// Raw byte band; always `BYTE1`, never varies its coding.
    ByteBandId
);
typed_band_id!(
    /// Aggregate of child bands.
    MultiBandId
);

/// Which side of the archive a tree serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    /// Collect values, then write them.
    Writer,
    /// Expect lengths, read, then disburse values.
    Reader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueRole {
    Int,
    CpRef { tag: CpTag, null_ok: bool },
}

#[derive(Debug)]
pub(crate) struct ValueBand {
    pub(crate) role: ValueRole,
    pub(crate) values: Vec<i32>,
    pub(crate) disbursed: usize,
    /// Header bands must be readable before band_headers exists.
    pub(crate) fixed_coding: bool,
    pub(crate) coding: Option<CodingMethod>,
    pub(crate) meta: MetaBytes,
    pub(crate) output_size: Option<usize>,
}

#[derive(Debug, Default)]
pub(crate) struct ByteBand {
    pub(crate) bytes: Vec<u8>,
    pub(crate) cursor: usize,
}

#[derive(Debug, Default)]
pub(crate) struct MultiBand {
    pub(crate) children: Vec<BandId>,
}

#[derive(Debug)]
pub(crate) enum BandKind {
    Value(ValueBand),
    Byte(ByteBand),
    Multi(MultiBand),
}

#[derive(Debug)]
pub(crate) struct BandNode {
    pub(crate) name: String,
    pub(crate) seq: usize,
    pub(crate) regular: Coding,
    pub(crate) phase: Phase,
    pub(crate) expected: usize,
    pub(crate) prev: Option<BandId>,
    pub(crate) kind: BandKind,
}

impl BandNode {
    pub(crate) fn len(&self) -> usize {
        match &self.kind {
            BandKind::Value(v) => v.values.len(),
            BandKind::Byte(b) => b.bytes.len(),
            BandKind::Multi(_) => 0,
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        match &self.kind {
            BandKind::Value(v) => v.values.len().saturating_sub(v.disbursed),
            BandKind::Byte(b) => b.bytes.len().saturating_sub(b.cursor),
            BandKind::Multi(_) => 0,
        }
    }

    pub(crate) fn is_multi(&self) -> bool {
        matches!(self.kind, BandKind::Multi(_))
    }
}

impl fmt::Display for BandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            BandKind::Byte(_) => write!(f, "byte {}", self.name)?,
            _ => f.write_str(&self.name)?,
        }
        let len = self.len().max(self.expected);
        if len != 0 {
            write!(f, "[{}]", len)?;
        }
        Ok(())
    }
}

/// Arena of bands plus the phase machine that governs them.
#[derive(Debug)]
pub struct BandTree {
    mode: Mode,
    nodes: Vec<BandNode>,
    by_name: AHashMap<String, BandId>,
    verifier: Box<dyn Verifier>,
    debug_bands: bool,
}

impl BandTree {
    /// Empty tree for `mode`.
    pub fn new(mode: Mode, verifier: Box<dyn Verifier>) -> Self {
        Self {
            mode,
            nodes: Vec::new(),
            by_name: AHashMap::new(),
            verifier,
            debug_bands: false,
        }
    }

    /// Hand out zero from empty bands instead of failing (band debugging aid).
    pub fn set_debug_bands(&mut self, on: bool) {
        self.debug_bands = on;
    }

    /// Writer or reader.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// True for a reading tree.
    pub fn is_reader(&self) -> bool {
        self.mode == Mode::Reader
    }

    /// Verifier receiving invariant violations.
    pub fn verifier(&self) -> &dyn Verifier {
        self.verifier.as_ref()
    }

    /// Number of bands, aggregates included.
    pub fn band_count(&self) -> usize {
        self.nodes.len()
    }

    /// First band registered under `name`.
    pub fn find(&self, name: &str) -> Option<BandId> {
        self.by_name.get(name).copied()
    }

    /// Debug name of a band.
    pub fn name(&self, id: impl Into<BandId>) -> &str {
        &self.node(id.into()).name
    }

    /// Current phase of a band.
    pub fn phase(&self, id: impl Into<BandId>) -> Phase {
        self.node(id.into()).phase
    }

    /// Declared regular coding of a band.
    pub fn regular_coding(&self, id: impl Into<BandId>) -> Coding {
        self.node(id.into()).regular
    }

    /// Values (or bytes) currently held by a band.
    pub fn len(&self, id: impl Into<BandId>) -> usize {
        self.node(id.into()).len()
    }

    /// Values announced for a band on the read side.
    pub fn expected(&self, id: impl Into<BandId>) -> usize {
        self.node(id.into()).expected
    }

    /// Children of an aggregate band in declaration order.
    pub fn children(&self, id: MultiBandId) -> &[BandId] {
        match &self.node(id.0).kind {
            BandKind::Multi(m) => &m.children,
            _ => &[],
        }
    }

    /// True if `id` is an aggregate band.
    pub fn is_multi(&self, id: BandId) -> bool {
        self.node(id).is_multi()
    }

    /// Every non-aggregate band under `root`, in wire order.
    pub fn leaves(&self, root: MultiBandId) -> Vec<BandId> {
        let mut out = Vec::new();
        let mut stack = vec![root.0];
        while let Some(id) = stack.pop() {
            match &self.node(id).kind {
                BandKind::Multi(m) => stack.extend(m.children.iter().rev()),
                _ => out.push(id),
            }
        }
        out
    }

    pub(crate) fn node(&self, id: BandId) -> &BandNode {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: BandId) -> &mut BandNode {
        &mut self.nodes[id.index()]
    }

    pub(crate) fn value_band(&self, id: BandId) -> Option<&ValueBand> {
        match &self.node(id).kind {
            BandKind::Value(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn value_band_mut(&mut self, id: BandId) -> Option<&mut ValueBand> {
        match &mut self.node_mut(id).kind {
            BandKind::Value(v) => Some(v),
            _ => None,
        }
    }

    fn add(&mut self, parent: Option<MultiBandId>, name: &str, regular: Coding, kind: BandKind) -> BandId {
        let id = BandId(self.nodes.len() as u32);
        let is_multi = matches!(kind, BandKind::Multi(_));
        let prev = parent.and_then(|p| self.children(p).last().copied());
        let phase = match (self.mode, is_multi) {
            (Mode::Writer, _) => Phase::Collect,
            (Mode::Reader, false) => Phase::Expect,
            // Aggregates have nothing to read; they wait for their children.
            (Mode::Reader, true) => Phase::Disburse,
        };
        tracing::trace!(band = name, seq = id.0 + 1, "new band");
        self.nodes.push(BandNode {
            name: name.to_string(),
            seq: id.index() + 1,
            regular,
            phase,
            expected: 0,
            prev,
            kind,
        });
        self.by_name.entry(name.to_string()).or_insert(id);
        if let Some(parent) = parent {
            if let BandKind::Multi(m) = &mut self.node_mut(parent.0).kind {
                m.children.push(id);
            }
        }
        id
    }

    /// Add the root or a nested aggregate band.
    pub fn add_multi(&mut self, parent: Option<MultiBandId>, name: &str, regular: Coding) -> MultiBandId {
        MultiBandId(self.add(parent, name, regular, BandKind::Multi(MultiBand::default())))
    }

    /// Add an integer band.
    pub fn add_int(&mut self, parent: MultiBandId, name: &str, regular: Coding) -> IntBandId {
        IntBandId(self.add(Some(parent), name, regular, value_kind(ValueRole::Int)))
    }

    /// Add a reference band.
    pub fn add_cp_ref(
        &mut self,
        parent: MultiBandId,
        name: &str,
        regular: Coding,
        tag: CpTag,
        null_ok: bool,
    ) -> CpRefBandId {
        let role = ValueRole::CpRef { tag, null_ok };
        CpRefBandId(self.add(Some(parent), name, regular, value_kind(role)))
    }

    /// Add a byte band.
    pub fn add_byte(&mut self, parent: MultiBandId, name: &str) -> ByteBandId {
        ByteBandId(self.add(Some(parent), name, BYTE1, BandKind::Byte(ByteBand::default())))
    }

    /// Move a band to `next`, checking the transition.
    pub fn set_phase(&mut self, id: BandId, next: Phase) -> Result<()> {
        let node = self.node(id);
        let from = node.phase;
        if !from.can_become(next) {
            let msg = if from == next {
                format!("already in phase {} in {}", from, node)
            } else {
                format!("unexpected phase {} -> {} in {}", from, next, node)
            };
            self.verifier.violation(msg)?;
        } else {
            self.check_transition(id, from, next)?;
        }
        self.node_mut(id).phase = next;
        Ok(())
    }

    fn check_transition(&self, id: BandId, from: Phase, next: Phase) -> Result<()> {
        let node = self.node(id);
        let v = self.verifier();
        match (from, next) {
            (Phase::NoPhase, Phase::Collect) => v.check(!self.is_reader(), &|| format!("reader band {} cannot collect", node)),
            (Phase::NoPhase, Phase::Expect) => v.check(self.is_reader(), &|| format!("writer band {} cannot expect", node)),
            (Phase::Collect, Phase::Frozen) | (Phase::Frozen, Phase::Frozen) => {
                v.check(node.len() == 0, &|| format!("cannot freeze non-empty band {}", node))
            }
            (Phase::Read, Phase::Disburse) => v.check(node.remaining() == node.len(), &|| {
                format!("values disbursed before reading finished in {}", node)
            }),
            (Phase::Disburse, Phase::Done) => self.check_done_disbursing(id),
            _ => Ok(()),
        }
    }

    fn check_done_disbursing(&self, id: BandId) -> Result<()> {
        let node = self.node(id);
        let v = self.verifier();
        let left = node.remaining();
        v.check(left == 0, &|| format!("{} values left in {}", left, node))?;
        if let BandKind::Multi(m) = &node.kind {
            for &child in &m.children {
                let sub = self.node(child);
                v.check(sub.phase == Phase::Done, &|| {
                    format!("sub-band {} still in phase {}", sub, sub.phase)
                })?;
            }
        }
        Ok(())
    }

    fn check_phase(&self, id: BandId, expected: Phase) -> Result<()> {
        let node = self.node(id);
        self.verifier.check(node.phase == expected, &|| {
            format!("phase expected {} was {} in {}", expected, node.phase, node)
        })
    }

    fn check_can_change_length(&self, id: BandId) -> Result<()> {
        let node = self.node(id);
        self.verifier.check(node.phase.can_change_length(), &|| {
            format!("cannot change length of {} in phase {}", node, node.phase)
        })
    }

    /// Announce the number of values a band will read. Call at most once.
    pub fn expect_length(&mut self, id: BandId, len: usize) -> Result<()> {
        self.check_phase(id, Phase::Expect)?;
        let node = self.node(id);
        self.verifier
            .check(node.expected == 0, &|| format!("length of {} already expected", node))?;
        self.node_mut(id).expected = len;
        Ok(())
    }

    /// Announce more values; repeated calls accumulate.
    pub fn expect_more_length(&mut self, id: BandId, len: usize) -> Result<()> {
        self.check_phase(id, Phase::Expect)?;
        let node = self.node_mut(id);
        node.expected = node
            .expected
            .checked_add(len)
            .ok_or_else(|| PackError::LimitExceeded(format!("expected length of {}", node.name)))?;
        Ok(())
    }

    pub(crate) fn put_value(&mut self, id: BandId, value: i32) -> Result<()> {
        self.check_can_change_length(id)?;
        match self.value_band_mut(id) {
            Some(band) => {
                band.values.push(value);
                band.output_size = None;
                Ok(())
            }
            None => Err(PackError::Invariant(format!("{} is not a value band", self.name(id)))),
        }
    }

    pub(crate) fn get_value(&mut self, id: BandId) -> Result<i32> {
        self.check_phase(id, Phase::Disburse)?;
        let debug_bands = self.debug_bands;
        let node = self.node_mut(id);
        let BandKind::Value(band) = &mut node.kind else {
            return Err(PackError::Invariant(format!("{} is not a value band", node.name)));
        };
        match band.values.get(band.disbursed) {
            Some(&value) => {
                band.disbursed += 1;
                Ok(value)
            }
            None if debug_bands && band.values.is_empty() => Ok(0),
            None => Err(PackError::Invariant(format!(
                "all {} values of {} already disbursed",
                band.values.len(),
                node.name
            ))),
        }
    }

    /// Rewind a fully disbursed value band for another pass.
    pub fn reset_for_second_pass(&mut self, id: BandId) -> Result<()> {
        self.check_phase(id, Phase::Disburse)?;
        let node = self.node(id);
        self.verifier.check(node.remaining() == 0, &|| {
            format!("first pass over {} is not complete", node)
        })?;
        if let Some(band) = self.value_band_mut(id) {
            band.disbursed = 0;
        }
        Ok(())
    }

    /// Check that a value band has not handed out anything yet.
    pub(crate) fn check_whole_pass(&self, id: BandId) -> Result<()> {
        self.check_phase(id, Phase::Disburse)?;
        let node = self.node(id);
        self.verifier.check(node.remaining() == node.len(), &|| {
            format!("whole pass required over {}", node)
        })
    }

    pub(crate) fn put_bytes(&mut self, id: ByteBandId, bytes: &[u8]) -> Result<()> {
        self.check_phase(id.0, Phase::Collect)?;
        if let BandKind::Byte(band) = &mut self.node_mut(id.0).kind {
            band.bytes.extend_from_slice(bytes);
        }
        Ok(())
    }

    pub(crate) fn get_bytes(&mut self, id: ByteBandId, n: usize) -> Result<&[u8]> {
        self.check_phase(id.0, Phase::Disburse)?;
        if !matches!(self.node(id.0).kind, BandKind::Byte(_)) {
            return Err(PackError::Invariant(format!("{} is not a byte band", self.node(id.0))));
        }
        let BandKind::Byte(band) = &mut self.node_mut(id.0).kind else {
            return Err(PackError::Invariant(format!("{} is not a byte band", id.0)));
        };
        let end = band.cursor.checked_add(n).filter(|end| *end <= band.bytes.len());
        let end = end.ok_or(PackError::UnexpectedEof)?;
        let start = std::mem::replace(&mut band.cursor, end);
        Ok(&band.bytes[start..end])
    }

    /// Finish paying out a band; every value must have been taken.
    pub fn done_disbursing(&mut self, id: BandId) -> Result<()> {
        self.check_phase(id, Phase::Disburse)?;
        self.set_phase(id, Phase::Done)
    }

    /// Retire a band that will carry no data.
    ///
    /// Readers fast-forward it to `Done`; writers freeze it.
    pub fn done_with_unused_band(&mut self, id: BandId) -> Result<()> {
        if self.is_reader() {
            self.check_phase(id, Phase::Expect)?;
            let node = self.node(id);
            self.verifier.check(node.expected == 0, &|| {
                format!("unused band {} expects {} values", node, node.expected)
            })?;
            self.set_phase(id, Phase::Read)?;
            self.set_phase(id, Phase::Disburse)?;
            self.set_phase(id, Phase::Done)
        } else {
            self.set_phase(id, Phase::Frozen)
        }
    }

    /// The band declared just before `id` must be done writing.
    pub(crate) fn check_ready_to_write(&self, id: BandId) -> Result<()> {
        let Some(prev) = self.node(id).prev else {
            return Ok(());
        };
        let p = self.node(prev);
        self.verifier.check(p.phase.reached(Phase::Done), &|| {
            format!("previous band {} not done writing before {}", p, self.node(id))
        })
    }

    /// The band declared just before `id` must be done reading.
    pub(crate) fn check_ready_to_read(&self, id: BandId) -> Result<()> {
        let Some(prev) = self.node(id).prev else {
            return Ok(());
        };
        let p = self.node(prev);
        self.verifier.check(p.phase.reached(Phase::Disburse), &|| {
            format!("previous band {} not done reading before {}", p, self.node(id))
        })
    }
}

fn value_kind(role: ValueRole) -> BandKind {
    BandKind::Value(ValueBand {
        role,
        values: Vec::new(),
        disbursed: 0,
        fixed_coding: false,
        coding: None,
        meta: MetaBytes::new(),
        output_size: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::{LenientVerifier, StrictVerifier};
    use bandpack_format::UNSIGNED5;

    fn reader() -> (BandTree, MultiBandId, IntBandId, IntBandId) {
        let mut tree = BandTree::new(Mode::Reader, Box::new(StrictVerifier));
        let root = tree.add_multi(None, "(root)", UNSIGNED5);
        let a = tree.add_int(root, "a", UNSIGNED5);
        let b = tree.add_int(root, "b", UNSIGNED5);
        (tree, root, a, b)
    }

    fn fill(tree: &mut BandTree, id: BandId, values: &[i32]) {
        tree.set_phase(id, Phase::Read).unwrap();
        for &v in values {
            tree.put_value(id, v).unwrap();
        }
        tree.set_phase(id, Phase::Disburse).unwrap();
    }

    #[test]
    fn test_initial_phases() {
        let (tree, root, a, _) = reader();
        assert_eq!(tree.phase(root), Phase::Disburse);
        assert_eq!(tree.phase(a), Phase::Expect);

        let mut writer = BandTree::new(Mode::Writer, Box::new(StrictVerifier));
        let root = writer.add_multi(None, "(root)", UNSIGNED5);
        let x = writer.add_byte(root, "x");
        assert_eq!(writer.phase(root), Phase::Collect);
        assert_eq!(writer.phase(x), Phase::Collect);
        assert_eq!(writer.regular_coding(x), BYTE1);
    }

    #[test]
    fn test_over_read_fails() {
        let (mut tree, _, a, _) = reader();
        fill(&mut tree, a.0, &[7]);
        assert_eq!(tree.get_value(a.0).unwrap(), 7);
        assert!(matches!(tree.get_value(a.0), Err(PackError::Invariant(_))));
    }

    #[test]
    fn test_under_read_detected() {
        let (mut tree, _, a, _) = reader();
        fill(&mut tree, a.0, &[1, 2]);
        tree.get_value(a.0).unwrap();
        assert!(matches!(tree.done_disbursing(a.0), Err(PackError::Invariant(_))));
        tree.get_value(a.0).unwrap();
        tree.done_disbursing(a.0).unwrap();
        assert_eq!(tree.phase(a), Phase::Done);
    }

    #[test]
    fn test_get_bytes_from_value_band() {
        let (mut tree, _, a, _) = reader();
        fill(&mut tree, a.0, &[7]);
        let err = tree.get_bytes(ByteBandId(a.0), 1).unwrap_err();
        assert!(matches!(&err, PackError::Invariant(m) if m.contains("not a byte band")), "{}", err);
        assert_eq!(tree.get_value(a.0).unwrap(), 7);
    }

    #[test]
    fn test_lenient_under_read() {
        let mut tree = BandTree::new(Mode::Reader, Box::new(LenientVerifier));
        let root = tree.add_multi(None, "(root)", UNSIGNED5);
        let a = tree.add_int(root, "a", UNSIGNED5);
        fill(&mut tree, a.0, &[1, 2]);
        tree.done_disbursing(a.0).unwrap();
        assert_eq!(tree.phase(a), Phase::Done);
    }

    #[test]
    fn test_expect_length_once() {
        let (mut tree, _, a, _) = reader();
        tree.expect_length(a.0, 3).unwrap();
        assert!(tree.expect_length(a.0, 3).is_err());
        tree.expect_more_length(a.0, 2).unwrap();
        assert_eq!(tree.expected(a), 5);
    }

    #[test]
    fn test_multi_done_requires_children() {
        let (mut tree, root, a, b) = reader();
        tree.done_with_unused_band(a.0).unwrap();
        assert!(tree.done_disbursing(root.0).is_err());
        tree.done_with_unused_band(b.0).unwrap();
        tree.done_disbursing(root.0).unwrap();
    }

    #[test]
    fn test_unused_band_with_expectation() {
        let (mut tree, _, a, _) = reader();
        tree.expect_length(a.0, 1).unwrap();
        assert!(tree.done_with_unused_band(a.0).is_err());
    }

    #[test]
    fn test_writer_freeze() {
        let mut tree = BandTree::new(Mode::Writer, Box::new(StrictVerifier));
        let root = tree.add_multi(None, "(root)", UNSIGNED5);
        let a = tree.add_int(root, "a", UNSIGNED5);
        let b = tree.add_int(root, "b", UNSIGNED5);
        tree.done_with_unused_band(a.0).unwrap();
        tree.done_with_unused_band(a.0).unwrap();
        assert_eq!(tree.phase(a), Phase::Frozen);
        tree.put_value(b.0, 1).unwrap();
        assert!(tree.done_with_unused_band(b.0).is_err());
        assert!(tree.put_value(a.0, 1).is_err());
    }

    #[test]
    fn test_second_pass() {
        let (mut tree, _, a, _) = reader();
        fill(&mut tree, a.0, &[4, 5]);
        assert!(tree.reset_for_second_pass(a.0).is_err());
        tree.get_value(a.0).unwrap();
        tree.get_value(a.0).unwrap();
        tree.reset_for_second_pass(a.0).unwrap();
        assert_eq!(tree.get_value(a.0).unwrap(), 4);
    }

    #[test]
    fn test_read_order_check() {
        let (mut tree, _, a, b) = reader();
        assert!(tree.check_ready_to_read(b.0).is_err());
        fill(&mut tree, a.0, &[]);
        tree.check_ready_to_read(b.0).unwrap();
    }

    #[test]
    fn test_leaves_in_wire_order() {
        let mut tree = BandTree::new(Mode::Writer, Box::new(StrictVerifier));
        let root = tree.add_multi(None, "(root)", UNSIGNED5);
        let a = tree.add_int(root, "a", UNSIGNED5);
        let inner = tree.add_multi(Some(root), "(inner)", UNSIGNED5);
        let b = tree.add_byte(inner, "b");
        let c = tree.add_int(root, "c", UNSIGNED5);
        assert_eq!(tree.leaves(root), vec![a.id(), b.id(), c.id()]);
        assert_eq!(tree.find("b"), Some(b.id()));
        assert_eq!(tree.children(root).len(), 3);
    }
}
