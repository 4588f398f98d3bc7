//! Accumulation and sample packing.
//!
//! Sources are summed into an `f32` accumulator at full scale `[-1.0, 1.0]`
//! and converted once per block to the device representation. Integer
//! conversions scale by `2^(bits-1)`, round to nearest and saturate, so
//! `unpack(pack(x)) == x` for every value already representable at that
//! width.

use crate::format::SampleFormat;

/// A device sample type the accumulator can be written into directly.
pub trait PcmSample: Copy + Send + 'static {
    const FORMAT: SampleFormat;

    fn from_f32(value: f32) -> Self;

    fn to_f32(self) -> f32;
}

#[inline]
fn quantize(value: f32, scale: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    (value * scale).round().clamp(min, max)
}

impl PcmSample for u8 {
    const FORMAT: SampleFormat = SampleFormat::U8;

    #[inline]
    fn from_f32(value: f32) -> Self {
        (quantize(value, 128.0, -128.0, 127.0) as i16 + 128) as u8
    }

    #[inline]
    fn to_f32(self) -> f32 {
        (self as i16 - 128) as f32 / 128.0
    }
}

impl PcmSample for i8 {
    const FORMAT: SampleFormat = SampleFormat::I8;

    #[inline]
    fn from_f32(value: f32) -> Self {
        quantize(value, 128.0, -128.0, 127.0) as i8
    }

    #[inline]
    fn to_f32(self) -> f32 {
        self as f32 / 128.0
    }
}

impl PcmSample for i16 {
    const FORMAT: SampleFormat = SampleFormat::I16;

    #[inline]
    fn from_f32(value: f32) -> Self {
        quantize(value, 32768.0, -32768.0, 32767.0) as i16
    }

    #[inline]
    fn to_f32(self) -> f32 {
        self as f32 / 32768.0
    }
}

impl PcmSample for i32 {
    const FORMAT: SampleFormat = SampleFormat::I32;

    #[inline]
    fn from_f32(value: f32) -> Self {
        if value.is_nan() {
            return 0;
        }
        let scaled = (value as f64 * 2_147_483_648.0).round();
        scaled.clamp(i32::MIN as f64, i32::MAX as f64) as i32
    }

    #[inline]
    fn to_f32(self) -> f32 {
        (self as f64 / 2_147_483_648.0) as f32
    }
}

impl PcmSample for f32 {
    const FORMAT: SampleFormat = SampleFormat::F32;

    #[inline]
    fn from_f32(value: f32) -> Self {
        if value.is_nan() {
            0.0
        } else {
            value.clamp(-1.0, 1.0)
        }
    }

    #[inline]
    fn to_f32(self) -> f32 {
        self
    }
}

/// Zeroes `frames * channels` slots of the accumulator.
#[inline]
pub fn clear(accum: &mut [f32]) {
    accum.fill(0.0);
}

/// Adds `sample * gains[c]` to every channel of one accumulator frame.
#[inline]
pub fn accumulate_frame(frame: &mut [f32], sample: f32, gains: &[f32]) {
    for (slot, &gain) in frame.iter_mut().zip(gains) {
        *slot += sample * gain;
    }
}

/// Converts the accumulator into typed device samples, saturating.
#[inline]
pub fn pack_typed<T: PcmSample>(accum: &[f32], out: &mut [T]) {
    for (dst, &src) in out.iter_mut().zip(accum) {
        *dst = T::from_f32(src);
    }
}

/// Converts the accumulator into native-endian bytes of `format`.
///
/// Writes `accum.len() * format.bytes_per_sample()` bytes; `out` must be at
/// least that long.
pub fn pack(accum: &[f32], format: SampleFormat, out: &mut [u8]) {
    match format {
        SampleFormat::U8 => {
            for (dst, &src) in out.iter_mut().zip(accum) {
                *dst = u8::from_f32(src);
            }
        }
        SampleFormat::I8 => {
            for (dst, &src) in out.iter_mut().zip(accum) {
                *dst = i8::from_f32(src) as u8;
            }
        }
        SampleFormat::I16 => {
            for (dst, &src) in out.chunks_exact_mut(2).zip(accum) {
                dst.copy_from_slice(&i16::from_f32(src).to_ne_bytes());
            }
        }
        SampleFormat::I32 => {
            for (dst, &src) in out.chunks_exact_mut(4).zip(accum) {
                dst.copy_from_slice(&i32::from_f32(src).to_ne_bytes());
            }
        }
        SampleFormat::F32 => {
            for (dst, &src) in out.chunks_exact_mut(4).zip(accum) {
                dst.copy_from_slice(&f32::from_f32(src).to_ne_bytes());
            }
        }
    }
}

/// Inverse of [`pack`]: native-endian bytes of `format` to `f32`.
pub fn unpack(bytes: &[u8], format: SampleFormat, out: &mut [f32]) {
    match format {
        SampleFormat::U8 => {
            for (dst, &src) in out.iter_mut().zip(bytes) {
                *dst = src.to_f32();
            }
        }
        SampleFormat::I8 => {
            for (dst, &src) in out.iter_mut().zip(bytes) {
                *dst = (src as i8).to_f32();
            }
        }
        SampleFormat::I16 => {
            for (dst, src) in out.iter_mut().zip(bytes.chunks_exact(2)) {
                *dst = i16::from_ne_bytes([src[0], src[1]]).to_f32();
            }
        }
        SampleFormat::I32 => {
            for (dst, src) in out.iter_mut().zip(bytes.chunks_exact(4)) {
                *dst = i32::from_ne_bytes([src[0], src[1], src[2], src[3]]).to_f32();
            }
        }
        SampleFormat::F32 => {
            for (dst, src) in out.iter_mut().zip(bytes.chunks_exact(4)) {
                *dst = f32::from_ne_bytes([src[0], src[1], src[2], src[3]]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i16_roundtrip_is_exact() {
        let values: Vec<i16> = (i16::MIN..=i16::MAX).step_by(7).chain([i16::MAX]).collect();
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();

        let mut floats = vec![0.0f32; values.len()];
        unpack(&bytes, SampleFormat::I16, &mut floats);

        let mut repacked = vec![0u8; bytes.len()];
        pack(&floats, SampleFormat::I16, &mut repacked);

        for (original, chunk) in values.iter().zip(repacked.chunks_exact(2)) {
            let decoded = i16::from_ne_bytes([chunk[0], chunk[1]]);
            assert!((*original as i32 - decoded as i32).abs() <= 1);
        }
        assert_eq!(bytes, repacked);
    }

    #[test]
    fn test_saturation_instead_of_wraparound() {
        assert_eq!(i16::from_f32(1.5), i16::MAX);
        assert_eq!(i16::from_f32(-7.0), i16::MIN);
        assert_eq!(i16::from_f32(1.0), i16::MAX);
        assert_eq!(i8::from_f32(2.0), i8::MAX);
        assert_eq!(u8::from_f32(-2.0), 0);
        assert_eq!(u8::from_f32(2.0), 255);
        assert_eq!(i32::from_f32(3.0), i32::MAX);
        assert_eq!(i32::from_f32(-3.0), i32::MIN);
        assert_eq!(f32::from_f32(1.25), 1.0);
        assert_eq!(i16::from_f32(f32::NAN), 0);
    }

    #[test]
    fn test_silence_values() {
        assert_eq!(u8::from_f32(0.0), 0x80);
        assert_eq!(i8::from_f32(0.0), 0);
        assert_eq!(i16::from_f32(0.0), 0);
    }

    #[test]
    fn test_pack_writes_native_endian_frames() {
        let accum = [0.5f32, -0.5];
        let mut bytes = [0u8; 8];
        pack(&accum, SampleFormat::F32, &mut bytes);
        assert_eq!(&bytes[..4], &0.5f32.to_ne_bytes());
        assert_eq!(&bytes[4..], &(-0.5f32).to_ne_bytes());

        let mut bytes = [0u8; 4];
        pack(&accum, SampleFormat::I16, &mut bytes);
        assert_eq!(&bytes[..2], &16384i16.to_ne_bytes());
        assert_eq!(&bytes[2..], &(-16384i16).to_ne_bytes());
    }

    #[test]
    fn test_typed_pack_matches_byte_pack() {
        let accum = [0.1f32, -0.9, 0.33, 1.2];
        let mut typed = [0i32; 4];
        pack_typed(&accum, &mut typed);

        let mut bytes = [0u8; 16];
        pack(&accum, SampleFormat::I32, &mut bytes);
        for (value, chunk) in typed.iter().zip(bytes.chunks_exact(4)) {
            assert_eq!(*value, i32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
    }

    #[test]
    fn test_accumulate_frame() {
        let mut frame = [0.25f32, 0.0, 0.0];
        accumulate_frame(&mut frame, 0.5, &[1.0, 0.5, 0.0]);
        assert_eq!(frame, [0.75, 0.25, 0.0]);
    }
}
