//! Pixel formats and frame geometry

use std::fmt;
use std::str::FromStr;
use v4l::format::fourcc::FourCC;

/// Pixel formats a frame source may deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Motion JPEG, one complete JPEG per frame
    Mjpeg,
    Jpeg,
    /// Packed 4:2:2, Y0 U Y1 V
    Yuyv,
    /// Packed 4:2:2, Y0 V Y1 U
    Yvyu,
    /// Packed 4:2:2, U Y0 V Y1
    Uyvy,
    /// Luma plane followed by interleaved UV at half resolution
    Nv12,
    /// Planar 4:2:0 (I420)
    Yuv420,
    /// Planar 4:2:0 with V before U (YV12)
    Yvu420,
    Rgb565,
    Rgb24,
    Bgr24,
    Grey,
}

struct FormatInfo {
    format: PixelFormat,
    name: &'static str,
    fourcc: &'static [u8; 4],
    /// Extra spellings accepted when parsing names or fourccs
    aliases: &'static [&'static str],
}

const FORMATS: &[FormatInfo] = &[
    FormatInfo { format: PixelFormat::Mjpeg, name: "MJPEG", fourcc: b"MJPG", aliases: &["MJPG"] },
    FormatInfo { format: PixelFormat::Jpeg, name: "JPEG", fourcc: b"JPEG", aliases: &[] },
    FormatInfo { format: PixelFormat::Yuyv, name: "YUYV", fourcc: b"YUYV", aliases: &["YUY2"] },
    FormatInfo { format: PixelFormat::Yvyu, name: "YVYU", fourcc: b"YVYU", aliases: &[] },
    FormatInfo { format: PixelFormat::Uyvy, name: "UYVY", fourcc: b"UYVY", aliases: &[] },
    FormatInfo { format: PixelFormat::Nv12, name: "NV12", fourcc: b"NV12", aliases: &[] },
    FormatInfo { format: PixelFormat::Yuv420, name: "YUV420", fourcc: b"YU12", aliases: &["I420", "YU12"] },
    FormatInfo { format: PixelFormat::Yvu420, name: "YVU420", fourcc: b"YV12", aliases: &["YV12"] },
    FormatInfo { format: PixelFormat::Rgb565, name: "RGB565", fourcc: b"RGBP", aliases: &[] },
    FormatInfo { format: PixelFormat::Rgb24, name: "RGB24", fourcc: b"RGB3", aliases: &["RGB3"] },
    FormatInfo { format: PixelFormat::Bgr24, name: "BGR24", fourcc: b"BGR3", aliases: &["BGR3"] },
    FormatInfo { format: PixelFormat::Grey, name: "GREY", fourcc: b"GREY", aliases: &["GRAY", "Y800"] },
];

impl PixelFormat {
    fn info(&self) -> &'static FormatInfo {
        // Every variant has exactly one table entry
        FORMATS
            .iter()
            .find(|info| info.format == *self)
            .unwrap_or(&FORMATS[0])
    }

    fn lookup(name: &str) -> Option<Self> {
        FORMATS
            .iter()
            .find(|info| {
                info.name.eq_ignore_ascii_case(name)
                    || info.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
            })
            .map(|info| info.format)
    }

    pub fn to_fourcc(&self) -> FourCC {
        FourCC::new(self.info().fourcc)
    }

    pub fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        FORMATS
            .iter()
            .find(|info| *info.fourcc == fourcc.repr)
            .map(|info| info.format)
            .or_else(|| std::str::from_utf8(&fourcc.repr).ok().and_then(Self::lookup))
    }

    /// JPEG already, nothing to encode
    pub fn is_compressed(&self) -> bool {
        matches!(self, PixelFormat::Mjpeg | PixelFormat::Jpeg)
    }

    /// Size of a tightly packed frame, `None` for compressed formats
    pub fn frame_size(&self, resolution: Resolution) -> Option<usize> {
        let pixels = resolution.pixels() as usize;
        match self {
            PixelFormat::Mjpeg | PixelFormat::Jpeg => None,
            PixelFormat::Nv12 | PixelFormat::Yuv420 | PixelFormat::Yvu420 => Some(pixels * 3 / 2),
            PixelFormat::Grey => Some(pixels),
            _ => Some(self.min_stride(resolution.width) as usize * resolution.height as usize),
        }
    }

    /// Shortest possible line in bytes (the luma line for planar formats)
    pub fn min_stride(&self, width: u32) -> u32 {
        match self {
            PixelFormat::Mjpeg | PixelFormat::Jpeg => 0,
            PixelFormat::Yuyv | PixelFormat::Yvyu | PixelFormat::Uyvy | PixelFormat::Rgb565 => {
                width * 2
            }
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => width * 3,
            PixelFormat::Nv12 | PixelFormat::Yuv420 | PixelFormat::Yvu420 | PixelFormat::Grey => {
                width
            }
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().name)
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s.trim()).ok_or_else(|| format!("Unknown pixel format: {}", s))
    }
}

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const QVGA: Resolution = Resolution::new(320, 240);
    pub const VGA: Resolution = Resolution::new(640, 480);
    pub const HD720: Resolution = Resolution::new(1280, 720);
    pub const HD1080: Resolution = Resolution::new(1920, 1080);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Within what V4L2 drivers accept (16x16 up to 16K)
    pub fn is_valid(&self) -> bool {
        (16..=15360).contains(&self.width) && (16..=8640).contains(&self.height)
    }

    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [PixelFormat; 12] = [
        PixelFormat::Mjpeg,
        PixelFormat::Jpeg,
        PixelFormat::Yuyv,
        PixelFormat::Yvyu,
        PixelFormat::Uyvy,
        PixelFormat::Nv12,
        PixelFormat::Yuv420,
        PixelFormat::Yvu420,
        PixelFormat::Rgb565,
        PixelFormat::Rgb24,
        PixelFormat::Bgr24,
        PixelFormat::Grey,
    ];

    #[test]
    fn test_every_format_has_table_entry() {
        for format in ALL {
            assert_eq!(format.info().format, format);
            assert_eq!(PixelFormat::from_fourcc(format.to_fourcc()), Some(format));
            assert_eq!(format.to_string().parse::<PixelFormat>(), Ok(format));
        }
    }

    #[test]
    fn test_fourcc_aliases() {
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"I420")), Some(PixelFormat::Yuv420));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"Y800")), Some(PixelFormat::Grey));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"H264")), None);
        assert_eq!(PixelFormat::Yuyv.to_fourcc(), FourCC::new(b"YUYV"));
    }

    #[test]
    fn test_frame_size() {
        assert_eq!(PixelFormat::Mjpeg.frame_size(Resolution::VGA), None);
        assert_eq!(PixelFormat::Yuyv.frame_size(Resolution::VGA), Some(640 * 480 * 2));
        assert_eq!(PixelFormat::Nv12.frame_size(Resolution::VGA), Some(640 * 480 * 3 / 2));
        assert_eq!(PixelFormat::Bgr24.frame_size(Resolution::QVGA), Some(320 * 240 * 3));
    }

    #[test]
    fn test_parse_display() {
        assert_eq!("mjpg".parse::<PixelFormat>(), Ok(PixelFormat::Mjpeg));
        assert_eq!("gray".parse::<PixelFormat>(), Ok(PixelFormat::Grey));
        assert!("vp8".parse::<PixelFormat>().is_err());
        assert_eq!(PixelFormat::Bgr24.to_string(), "BGR24");
        assert_eq!(Resolution::HD720.to_string(), "1280x720");
        assert!(!Resolution::new(8, 8).is_valid());
    }
}
