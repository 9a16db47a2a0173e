//! Persisted form of the global ledger.
//!
//! Layout (little endian):
//! ```text
//! u32 magic, u32 version, u32 image_count
//! per image:  u64 id, u32 mip_levels, u32 array_size, u32 aspects, u32 entry_count
//! per entry:  u32 aspect, u32 base_mip, u32 mip_count, u32 base_layer, u32 layer_count,
//!             u32 old (u32::MAX = untransitioned), u32 new
//! ```
//! Entries are written in ledger order, and read back in the same order.
use crate::{
    backend::Backend,
    range::{AspectMask, Extent, SubresourceRange},
    record::ResourceId,
    region::{ImageRegionState, PrevState},
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use slotmap::{Key, KeyData};

const MAGIC: u32 = u32::from_le_bytes(*b"ISTS");
const VERSION: u32 = 1;
const UNTRANSITIONED: u32 = u32::MAX;

const HEADER_SIZE: usize = 12;
const IMAGE_HEADER_SIZE: usize = 24;
const ENTRY_SIZE: usize = 28;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("not an image state block (magic {0:#010x})")]
    InvalidMagic(u32),
    #[error("unsupported image state version {0}")]
    UnsupportedVersion(u32),
    #[error("unexpected end of data: needed {needed} bytes, {remaining} left")]
    Truncated { needed: usize, remaining: usize },
    #[error("unknown state value {0:#x}")]
    UnknownState(u32),
    #[error("invalid aspect mask {0:#x}")]
    InvalidAspect(u32),
}

/// Ledger of one image, as stored.
#[derive(Clone, Debug)]
pub struct SerialisedImage<S> {
    pub id: ResourceId,
    pub aspects: AspectMask,
    pub extent: Extent,
    pub states: Vec<ImageRegionState<S>>,
}

fn ensure(buf: &impl Buf, needed: usize) -> Result<(), DecodeError> {
    if buf.remaining() < needed {
        Err(DecodeError::Truncated {
            needed,
            remaining: buf.remaining(),
        })
    } else {
        Ok(())
    }
}

fn read_aspects(buf: &mut impl Buf) -> Result<AspectMask, DecodeError> {
    let raw = buf.get_u32_le();
    AspectMask::from_bits(raw).ok_or(DecodeError::InvalidAspect(raw))
}

/// Writes flattened image ledgers.
pub fn write_image_states<'a, B, I>(backend: &B, images: I) -> Bytes
where
    B: Backend,
    B::State: 'a,
    I: IntoIterator<Item = &'a SerialisedImage<B::State>>,
{
    let mut buf = BytesMut::new();
    buf.put_u32_le(MAGIC);
    buf.put_u32_le(VERSION);
    let count_pos = buf.len();
    buf.put_u32_le(0);

    let mut count: u32 = 0;
    for image in images {
        buf.reserve(IMAGE_HEADER_SIZE + image.states.len() * ENTRY_SIZE);
        buf.put_u64_le(image.id.data().as_ffi());
        buf.put_u32_le(image.extent.mip_levels);
        buf.put_u32_le(image.extent.array_size);
        buf.put_u32_le(image.aspects.bits());
        buf.put_u32_le(image.states.len() as u32);
        for state in &image.states {
            let range = &state.range;
            buf.put_u32_le(range.aspect_mask.bits());
            buf.put_u32_le(range.base_mip_level);
            buf.put_u32_le(range.mip_levels);
            buf.put_u32_le(range.base_array_layer);
            buf.put_u32_le(range.array_size);
            buf.put_u32_le(match state.old {
                PrevState::Untransitioned => UNTRANSITIONED,
                PrevState::Known(old) => backend.state_to_raw(old),
            });
            buf.put_u32_le(backend.state_to_raw(state.new));
        }
        count += 1;
    }
    buf[count_pos..count_pos + 4].copy_from_slice(&count.to_le_bytes());
    buf.freeze()
}

/// Reads image ledgers written by [`write_image_states`].
pub fn read_image_states<B: Backend>(backend: &B, mut data: &[u8]) -> Result<Vec<SerialisedImage<B::State>>, DecodeError> {
    let buf = &mut data;
    ensure(buf, HEADER_SIZE)?;
    let magic = buf.get_u32_le();
    if magic != MAGIC {
        return Err(DecodeError::InvalidMagic(magic));
    }
    let version = buf.get_u32_le();
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    let image_count = buf.get_u32_le() as usize;

    let decode_state = |raw: u32| backend.state_from_raw(raw).ok_or(DecodeError::UnknownState(raw));

    // counts are untrusted: grow as entries are actually read
    let mut images = Vec::new();
    for _ in 0..image_count {
        ensure(buf, IMAGE_HEADER_SIZE)?;
        let id = ResourceId::from(KeyData::from_ffi(buf.get_u64_le()));
        let extent = Extent::new(buf.get_u32_le(), buf.get_u32_le());
        let aspects = read_aspects(buf)?;
        let entry_count = buf.get_u32_le() as usize;

        let mut states = Vec::new();
        for _ in 0..entry_count {
            ensure(buf, ENTRY_SIZE)?;
            let aspect_mask = read_aspects(buf)?;
            let range = SubresourceRange {
                aspect_mask,
                base_mip_level: buf.get_u32_le(),
                mip_levels: buf.get_u32_le(),
                base_array_layer: buf.get_u32_le(),
                array_size: buf.get_u32_le(),
            };
            let old = match buf.get_u32_le() {
                UNTRANSITIONED => PrevState::Untransitioned,
                raw => PrevState::Known(decode_state(raw)?),
            };
            let new = decode_state(buf.get_u32_le())?;
            states.push(ImageRegionState { range, old, new });
        }
        images.push(SerialisedImage {
            id,
            aspects,
            extent,
            states,
        });
    }
    Ok(images)
}
