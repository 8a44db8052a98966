//! Short code headers
//!
//! Most methods have a small operand stack, few locals beyond their
//! arguments and at most two exception handlers. Such a triple is packed into
//! a single `code_headers` byte; anything else is sent as
//! [`LONG_CODE_HEADER`] with the values in their own bands.

/// Header byte meaning "sizes follow in the long-form bands".
pub const LONG_CODE_HEADER: u8 = 0;

/// `(max_stack limit, non-argument locals limit)` per handler count.
const SHORT_CODE_LIMITS: [(u32, u32); 3] = [(12, 12), (8, 8), (7, 7)];

/// Sizes carried by a code header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeSizes {
    /// Operand stack depth.
    pub max_stack: u32,
    /// Locals not taken by the method's arguments.
    pub max_na_locals: u32,
    /// Exception handler count.
    pub handler_count: u32,
}

fn handler_base(h: usize) -> u32 {
    1 + SHORT_CODE_LIMITS[..h].iter().map(|(s, l)| s * l).sum::<u32>()
}

/// Pack `sizes` into one header byte, or [`LONG_CODE_HEADER`] if they do
/// not fit.
pub fn short_code_header(sizes: CodeSizes) -> u8 {
    let h = sizes.handler_count as usize;
    let Some(&(lims, liml)) = SHORT_CODE_LIMITS.get(h) else {
        return LONG_CODE_HEADER;
    };
    if sizes.max_stack >= lims || sizes.max_na_locals >= liml {
        return LONG_CODE_HEADER;
    }
    let sc = handler_base(h) + sizes.max_stack + lims * sizes.max_na_locals;
    u8::try_from(sc).unwrap_or(LONG_CODE_HEADER)
}

/// Pack a method's sizes given its total locals and argument size.
pub fn short_code_header_for(max_stack: u32, max_locals: u32, arg_size: u32, handler_count: u32) -> u8 {
    let Some(max_na_locals) = max_locals.checked_sub(arg_size) else {
        return LONG_CODE_HEADER;
    };
    short_code_header(CodeSizes {
        max_stack,
        max_na_locals,
        handler_count,
    })
}

/// Unpack a short header byte. Returns `None` for [`LONG_CODE_HEADER`].
pub fn decode_short_code_header(sc: u8) -> Option<CodeSizes> {
    if sc == LONG_CODE_HEADER {
        return None;
    }
    let sc = sc as u32;
    let h = (0..SHORT_CODE_LIMITS.len())
        .find(|&h| sc < handler_base(h + 1))
        .unwrap_or(SHORT_CODE_LIMITS.len() - 1);
    let lims = SHORT_CODE_LIMITS[h].0;
    let rel = sc - handler_base(h);
    Some(CodeSizes {
        max_stack: rel % lims,
        max_na_locals: rel / lims,
        handler_count: h as u32,
    })
}
