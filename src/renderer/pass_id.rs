//! Pass identifiers: which built-in operation a render-pipeline stage runs.
//!
//! A [`PassId`] is a plain integer so hosts can store and compare it freely.
//! The low byte selects the base pass; bits 8..16 carry a single G-Buffer
//! attachment flag, used only by [`PassId::COPY_G_TO_PP`]. Anything else
//! decodes to `None` and is treated as a no-op by the executor.

use std::fmt;
use std::ops::BitOr;

const BASE_MASK: u32 = 0xFF;
const ATTACHMENT_SHIFT: u32 = 8;
const ATTACHMENT_MASK: u32 = 0xFF << ATTACHMENT_SHIFT;

/// One of the eight G-Buffer color attachments, in binding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    /// Base color written by the geometry pass.
    Albedo,
    /// World-space normal.
    Normal,
    /// World-space position.
    Position,
    /// Roughness, metallic, lit flag.
    Rml,
    /// Lit color written by the lighting pass, OIT composites over it.
    Lit,
    /// Object id, depth, transparent fragment count.
    Eida,
    /// Lit color of opaque geometry only.
    Solid,
    /// Premultiplied transparent color accumulation.
    TransAccum,
}

impl Attachment {
    /// Every attachment, in index order.
    pub const ALL: [Self; 8] = [
        Self::Albedo,
        Self::Normal,
        Self::Position,
        Self::Rml,
        Self::Lit,
        Self::Eida,
        Self::Solid,
        Self::TransAccum,
    ];

    /// Zero-based attachment index.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Selector bit used inside a [`PassId`].
    pub const fn flag(self) -> u32 {
        1 << (ATTACHMENT_SHIFT + self as u32)
    }

    /// Decode a selector holding exactly one attachment bit.
    pub fn from_flag(bits: u32) -> Option<Self> {
        if bits.count_ones() != 1 || bits & !ATTACHMENT_MASK != 0 {
            return None;
        }
        let index = (bits.trailing_zeros() - ATTACHMENT_SHIFT) as usize;
        Self::ALL.get(index).copied()
    }

    /// Human-readable name for labels and logs.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Albedo => "Albedo",
            Self::Normal => "Normal",
            Self::Position => "Position",
            Self::Rml => "RML",
            Self::Lit => "Lit",
            Self::Eida => "EIDA",
            Self::Solid => "Solid",
            Self::TransAccum => "Transparent Accumulation",
        }
    }
}

/// Decoded form of a [`PassId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Run callbacks only.
    None,
    /// Opaque geometry into the G-Buffer.
    DrawSolid,
    /// Skybox into the G-Buffer.
    DrawSkybox,
    /// Transparent geometry into the OIT accumulation targets.
    DrawTransparent,
    /// Deferred lighting into the lit and solid targets.
    Lighting,
    /// Replay the stage's post-processing stack.
    PostProcessing,
    /// Depth-only redraw per shadow-casting light.
    Shadows,
    /// Clear every G-Buffer attachment.
    ClearGBuffer,
    /// Copy one attachment into the post-processing buffer.
    CopyGToPp(Attachment),
}

/// Integer pass identifier carried by a render-pipeline stage.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PassId(u32);

impl PassId {
    /// Callbacks only.
    pub const NONE: Self = Self(0);
    /// Opaque geometry.
    pub const DRAW_SOLID: Self = Self(1);
    /// Transparent geometry.
    pub const DRAW_TRANSPARENT: Self = Self(2);
    /// Post-processing stack replay.
    pub const POST_PROCESSING: Self = Self(3);
    /// Deferred lighting.
    pub const LIGHTING: Self = Self(4);
    /// Skybox.
    pub const DRAW_SKYBOX: Self = Self(5);
    /// Shadow maps.
    pub const SHADOWS: Self = Self(6);
    /// G-Buffer clear.
    pub const CLEAR_G_BUFFER: Self = Self(7);
    /// Base of the attachment-to-post-buffer copy; OR in one attachment.
    pub const COPY_G_TO_PP: Self = Self(8);

    /// Wrap a raw identifier without validation.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw integer.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// `COPY_G_TO_PP` with `attachment` selected.
    pub const fn copy_g_to_pp(attachment: Attachment) -> Self {
        Self(Self::COPY_G_TO_PP.0 | attachment.flag())
    }

    /// Decode into a [`Pass`], or `None` for identifiers that name no pass.
    pub fn decode(self) -> Option<Pass> {
        let base = self.0 & BASE_MASK;
        let selector = self.0 & ATTACHMENT_MASK;
        if self.0 & !(BASE_MASK | ATTACHMENT_MASK) != 0 {
            return None;
        }
        if base == Self::COPY_G_TO_PP.0 {
            return Attachment::from_flag(selector).map(Pass::CopyGToPp);
        }
        if selector != 0 {
            return None;
        }
        match base {
            0 => Some(Pass::None),
            1 => Some(Pass::DrawSolid),
            2 => Some(Pass::DrawTransparent),
            3 => Some(Pass::PostProcessing),
            4 => Some(Pass::Lighting),
            5 => Some(Pass::DrawSkybox),
            6 => Some(Pass::Shadows),
            7 => Some(Pass::ClearGBuffer),
            _ => None,
        }
    }
}

impl BitOr<Attachment> for PassId {
    type Output = Self;

    fn bitor(self, attachment: Attachment) -> Self {
        Self(self.0 | attachment.flag())
    }
}

impl From<u32> for PassId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Some(pass) => write!(f, "PassId({pass:?})"),
            None => write!(f, "PassId({:#x})", self.0),
        }
    }
}
