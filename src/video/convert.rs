//! Pixel format conversion utilities
//!
//! Raw YUV captures are normalised to I420 (YUV 4:2:0 planar) so the JPEG
//! encoder can compress them without another colour space conversion.

use crate::error::{AppError, Result};
use crate::video::format::{PixelFormat, Resolution};

/// YUV420P buffer with separate Y, U, V planes
pub struct Yuv420pBuffer {
    /// Raw buffer containing all planes
    data: Vec<u8>,
    /// Width of the frame
    width: u32,
    /// Height of the frame
    height: u32,
}

impl Yuv420pBuffer {
    /// Create a new YUV420P buffer for the given resolution
    pub fn new(resolution: Resolution) -> Self {
        // YUV420P: Y = width*height, U = width*height/4, V = width*height/4
        let y_size = resolution.pixels() as usize;
        let total_size = y_size + (y_size / 4) * 2;

        Self {
            data: vec![0u8; total_size],
            width: resolution.width,
            height: resolution.height,
        }
    }

    /// Get the raw buffer as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Split into mutable Y, U and V planes
    pub fn planes_mut(&mut self) -> (&mut [u8], &mut [u8], &mut [u8]) {
        let y_size = (self.width * self.height) as usize;
        let uv_size = y_size / 4;
        let (y, uv) = self.data.split_at_mut(y_size);
        let (u, v) = uv.split_at_mut(uv_size);
        (y, u, v)
    }

    /// Get buffer length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get resolution
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Byte positions of Y0, Y1, U and V inside one 4-byte packed 4:2:2 macropixel
#[derive(Debug, Clone, Copy)]
struct PackedLayout {
    y0: usize,
    y1: usize,
    u: usize,
    v: usize,
}

impl PackedLayout {
    fn for_format(format: PixelFormat) -> Option<Self> {
        match format {
            PixelFormat::Yuyv => Some(Self { y0: 0, u: 1, y1: 2, v: 3 }),
            PixelFormat::Yvyu => Some(Self { y0: 0, v: 1, y1: 2, u: 3 }),
            PixelFormat::Uyvy => Some(Self { u: 0, y0: 1, v: 2, y1: 3 }),
            _ => None,
        }
    }
}

/// Software pixel format converter producing I420
pub struct PixelConverter {
    /// Source format
    src_format: PixelFormat,
    /// Frame resolution
    resolution: Resolution,
    /// Output buffer (reused across conversions)
    output_buffer: Yuv420pBuffer,
}

impl PixelConverter {
    /// Create a converter from `src_format` to I420
    pub fn to_i420(src_format: PixelFormat, resolution: Resolution) -> Result<Self> {
        if !Self::supports(src_format) {
            return Err(AppError::VideoError(format!(
                "Unsupported conversion: {} → YUV420",
                src_format
            )));
        }
        if resolution.width % 2 != 0 || resolution.height % 2 != 0 || resolution.pixels() == 0 {
            return Err(AppError::VideoError(format!(
                "I420 needs even, non-zero dimensions, got {}",
                resolution
            )));
        }

        Ok(Self {
            src_format,
            resolution,
            output_buffer: Yuv420pBuffer::new(resolution),
        })
    }

    /// Check whether a source format can be converted to I420
    pub fn supports(format: PixelFormat) -> bool {
        matches!(
            format,
            PixelFormat::Yuyv
                | PixelFormat::Yvyu
                | PixelFormat::Uyvy
                | PixelFormat::Nv12
                | PixelFormat::Yuv420
                | PixelFormat::Yvu420
        )
    }

    /// Source format this converter was built for
    pub fn src_format(&self) -> PixelFormat {
        self.src_format
    }

    /// Get resolution
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Convert a frame and return reference to the I420 output buffer
    ///
    /// `stride` is the length in bytes of one source line; 0 means tightly
    /// packed.
    pub fn convert(&mut self, input: &[u8], stride: u32) -> Result<&[u8]> {
        let width = self.resolution.width as usize;
        let stride = if stride == 0 {
            self.src_format.min_stride(self.resolution.width) as usize
        } else {
            stride as usize
        };

        if stride < self.src_format.min_stride(self.resolution.width) as usize {
            return Err(AppError::VideoError(format!(
                "Stride {} too small for {} {}",
                stride, self.resolution, self.src_format
            )));
        }

        let expected = self.expected_input_len(stride);
        if input.len() < expected {
            return Err(AppError::VideoError(format!(
                "{} data too small: {} < {}",
                self.src_format,
                input.len(),
                expected
            )));
        }

        match self.src_format {
            PixelFormat::Yuyv | PixelFormat::Yvyu | PixelFormat::Uyvy => {
                // Checked in to_i420
                let layout = PackedLayout::for_format(self.src_format)
                    .ok_or_else(|| AppError::Internal("packed layout missing".to_string()))?;
                self.convert_packed_422(input, stride, layout);
            }
            PixelFormat::Nv12 => self.convert_nv12(input, stride),
            PixelFormat::Yuv420 => self.copy_planar(input, stride, false),
            PixelFormat::Yvu420 => self.copy_planar(input, stride, true),
            other => {
                return Err(AppError::VideoError(format!(
                    "Unsupported conversion: {} → YUV420",
                    other
                )))
            }
        }

        debug_assert_eq!(self.output_buffer.len(), width * self.resolution.height as usize * 3 / 2);
        Ok(self.output_buffer.as_bytes())
    }

    fn expected_input_len(&self, stride: usize) -> usize {
        let height = self.resolution.height as usize;
        match self.src_format {
            PixelFormat::Nv12 => stride * height + stride * height / 2,
            PixelFormat::Yuv420 | PixelFormat::Yvu420 => stride * height + (stride / 2) * height,
            _ => stride * height,
        }
    }

    /// Packed 4:2:2 → I420, chroma averaged over each pair of lines
    fn convert_packed_422(&mut self, src: &[u8], stride: usize, layout: PackedLayout) {
        let width = self.resolution.width as usize;
        let height = self.resolution.height as usize;
        let half_width = width / 2;
        let (y_plane, u_plane, v_plane) = self.output_buffer.planes_mut();

        for row in (0..height).step_by(2) {
            let line0 = &src[row * stride..];
            let line1 = &src[(row + 1) * stride..];
            let uv_row = (row / 2) * half_width;

            for pair in 0..half_width {
                let px0 = &line0[pair * 4..pair * 4 + 4];
                let px1 = &line1[pair * 4..pair * 4 + 4];
                let col = pair * 2;

                y_plane[row * width + col] = px0[layout.y0];
                y_plane[row * width + col + 1] = px0[layout.y1];
                y_plane[(row + 1) * width + col] = px1[layout.y0];
                y_plane[(row + 1) * width + col + 1] = px1[layout.y1];

                u_plane[uv_row + pair] = ((px0[layout.u] as u16 + px1[layout.u] as u16) / 2) as u8;
                v_plane[uv_row + pair] = ((px0[layout.v] as u16 + px1[layout.v] as u16) / 2) as u8;
            }
        }
    }

    /// NV12 → I420: copy luma, deinterleave chroma
    fn convert_nv12(&mut self, src: &[u8], stride: usize) {
        let width = self.resolution.width as usize;
        let height = self.resolution.height as usize;
        let half_width = width / 2;
        let (y_plane, u_plane, v_plane) = self.output_buffer.planes_mut();

        for row in 0..height {
            y_plane[row * width..(row + 1) * width]
                .copy_from_slice(&src[row * stride..row * stride + width]);
        }

        let uv_src = &src[stride * height..];
        for row in 0..height / 2 {
            let line = &uv_src[row * stride..row * stride + width];
            for (i, uv) in line.chunks_exact(2).enumerate() {
                u_plane[row * half_width + i] = uv[0];
                v_plane[row * half_width + i] = uv[1];
            }
        }
    }

    /// Planar 4:2:0 copy, swapping chroma planes for YVU420
    fn copy_planar(&mut self, src: &[u8], stride: usize, swap_uv: bool) {
        let width = self.resolution.width as usize;
        let height = self.resolution.height as usize;
        let half_width = width / 2;
        let half_stride = stride / 2;
        let (y_plane, u_plane, v_plane) = self.output_buffer.planes_mut();

        for row in 0..height {
            y_plane[row * width..(row + 1) * width]
                .copy_from_slice(&src[row * stride..row * stride + width]);
        }

        let chroma_len = half_stride * (height / 2);
        let first = &src[stride * height..stride * height + chroma_len];
        let second = &src[stride * height + chroma_len..];
        let (u_src, v_src) = if swap_uv { (second, first) } else { (first, second) };

        for row in 0..height / 2 {
            let dst = row * half_width..(row + 1) * half_width;
            let srcr = row * half_stride..row * half_stride + half_width;
            u_plane[dst.clone()].copy_from_slice(&u_src[srcr.clone()]);
            v_plane[dst].copy_from_slice(&v_src[srcr]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i420_buffer_size() {
        let buf = Yuv420pBuffer::new(Resolution::HD1080);
        assert_eq!(buf.len(), 1920 * 1080 * 3 / 2);
    }

    #[test]
    fn test_yuyv_to_i420() {
        // 2x2 frame: line 0 = Y 10,20 U 100 V 200; line 1 = Y 30,40 U 110 V 210
        let src = [10, 100, 20, 200, 30, 110, 40, 210];
        let mut conv = PixelConverter::to_i420(PixelFormat::Yuyv, Resolution::new(2, 2)).unwrap();
        let out = conv.convert(&src, 0).unwrap();
        assert_eq!(out, &[10, 20, 30, 40, 105, 205]);
    }

    #[test]
    fn test_uyvy_and_yvyu_layouts() {
        let uyvy = [100, 10, 200, 20, 110, 30, 210, 40];
        let mut conv = PixelConverter::to_i420(PixelFormat::Uyvy, Resolution::new(2, 2)).unwrap();
        assert_eq!(conv.convert(&uyvy, 0).unwrap(), &[10, 20, 30, 40, 105, 205]);

        let yvyu = [10, 200, 20, 100, 30, 210, 40, 110];
        let mut conv = PixelConverter::to_i420(PixelFormat::Yvyu, Resolution::new(2, 2)).unwrap();
        assert_eq!(conv.convert(&yvyu, 0).unwrap(), &[10, 20, 30, 40, 105, 205]);
    }

    #[test]
    fn test_nv12_with_stride() {
        // 2x2 luma with 2 bytes of padding per line, then one UV line
        let src = [1, 2, 0, 0, 3, 4, 0, 0, 50, 60, 0, 0];
        let mut conv = PixelConverter::to_i420(PixelFormat::Nv12, Resolution::new(2, 2)).unwrap();
        assert_eq!(conv.convert(&src, 4).unwrap(), &[1, 2, 3, 4, 50, 60]);
    }

    #[test]
    fn test_yvu420_swaps_chroma() {
        let src = [1, 2, 3, 4, 60, 50];
        let mut conv = PixelConverter::to_i420(PixelFormat::Yvu420, Resolution::new(2, 2)).unwrap();
        assert_eq!(conv.convert(&src, 0).unwrap(), &[1, 2, 3, 4, 50, 60]);
    }

    #[test]
    fn test_short_input_rejected() {
        let mut conv = PixelConverter::to_i420(PixelFormat::Yuyv, Resolution::new(4, 2)).unwrap();
        assert!(conv.convert(&[0u8; 8], 0).is_err());
    }

    #[test]
    fn test_unsupported_and_odd_sizes() {
        assert!(PixelConverter::to_i420(PixelFormat::Rgb24, Resolution::VGA).is_err());
        assert!(PixelConverter::to_i420(PixelFormat::Yuyv, Resolution::new(3, 2)).is_err());
    }
}
