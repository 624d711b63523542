//! Frame types exchanged with the surrounding pipeline.
//!
//! Input frames arrive through the [`VideoFrame`] trait so any capture or
//! decode source can feed the transform; converted frames leave as
//! [`RgbFrame`] values handed to a [`FrameSink`].

use std::ops::{Deref, DerefMut};

use anyhow::{bail, Result};
use crossbeam_channel::Sender;

use crate::types::{FrameGeometry, PixelFormat, SurfaceFormat};

/// One plane of a frame as laid out in host memory.
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    pub data: &'a [u8],
    /// Bytes between the starts of consecutive rows.
    pub stride: u32,
}

/// A video frame offered to the transform.
pub trait VideoFrame {
    fn coded_width(&self) -> u32;
    fn coded_height(&self) -> u32;
    /// Declared pixel format. Some decode paths leave this unset.
    fn format(&self) -> Option<PixelFormat>;
    /// Presentation timestamp in microseconds.
    fn timestamp(&self) -> i64;
    /// Plane data in plane order (Y first).
    fn planes(&self) -> Vec<Plane<'_>>;
    /// Releases the frame's underlying resource. Called exactly once by the transform.
    fn close(&mut self);

    fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.coded_width(), self.coded_height())
    }
}

impl<T: VideoFrame + ?Sized> VideoFrame for &mut T {
    fn coded_width(&self) -> u32 {
        (**self).coded_width()
    }

    fn coded_height(&self) -> u32 {
        (**self).coded_height()
    }

    fn format(&self) -> Option<PixelFormat> {
        (**self).format()
    }

    fn timestamp(&self) -> i64 {
        (**self).timestamp()
    }

    fn planes(&self) -> Vec<Plane<'_>> {
        (**self).planes()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Ownership handle that closes the wrapped frame when it goes out of scope.
pub(crate) struct FrameLease<F: VideoFrame> {
    frame: F,
    closed: bool,
}

impl<F: VideoFrame> FrameLease<F> {
    pub(crate) fn new(frame: F) -> Self {
        Self {
            frame,
            closed: false,
        }
    }

    pub(crate) fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.frame.close();
        }
    }
}

impl<F: VideoFrame> Deref for FrameLease<F> {
    type Target = F;

    fn deref(&self) -> &Self::Target {
        &self.frame
    }
}

impl<F: VideoFrame> DerefMut for FrameLease<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.frame
    }
}

impl<F: VideoFrame> Drop for FrameLease<F> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Host-memory frame with owned, tightly packed planes.
///
/// Used by the CLI to feed raw YUV files and by tests to synthesise input.
#[derive(Debug, Clone)]
pub struct CpuFrame {
    width: u32,
    height: u32,
    format: Option<PixelFormat>,
    timestamp: i64,
    planes: Vec<(Vec<u8>, u32)>,
    closed: bool,
}

impl CpuFrame {
    /// Builds a frame from explicit planes; `planes` holds `(bytes, stride)` pairs.
    pub fn new(
        width: u32,
        height: u32,
        format: Option<PixelFormat>,
        timestamp: i64,
        planes: Vec<(Vec<u8>, u32)>,
    ) -> Self {
        Self {
            width,
            height,
            format,
            timestamp,
            planes,
            closed: false,
        }
    }

    /// Splits one packed I420 or NV12 picture (as stored in `.yuv` files) into planes.
    pub fn from_packed(
        format: PixelFormat,
        geometry: FrameGeometry,
        timestamp: i64,
        bytes: &[u8],
    ) -> Result<Self> {
        let (luma_len, chroma_len) = plane_lens(geometry);
        let chroma = geometry.chroma();
        let expected = packed_frame_len(format, geometry)?;
        if bytes.len() != expected {
            bail!(
                "packed {format} frame of {geometry} needs {expected} bytes, got {}",
                bytes.len()
            );
        }

        let (luma, rest) = bytes.split_at(luma_len);
        let planes = match format {
            PixelFormat::I420 => {
                let (u, v) = rest.split_at(chroma_len);
                vec![
                    (luma.to_vec(), geometry.width),
                    (u.to_vec(), chroma.width),
                    (v.to_vec(), chroma.width),
                ]
            }
            PixelFormat::Nv12 => {
                let Some(uv_stride) = chroma.width.checked_mul(2) else {
                    bail!("interleaved chroma stride of {geometry} does not fit in u32");
                };
                vec![(luma.to_vec(), geometry.width), (rest.to_vec(), uv_stride)]
            }
            other => bail!("packed input is only supported for I420 and NV12, not {other}"),
        };

        Ok(Self::new(
            geometry.width,
            geometry.height,
            Some(format),
            timestamp,
            planes,
        ))
    }

    /// A frame where every sample carries the same Y, U and V value.
    pub fn solid(
        format: PixelFormat,
        geometry: FrameGeometry,
        timestamp: i64,
        yuv: [u8; 3],
    ) -> Result<Self> {
        let (luma_len, chroma_len) = plane_lens(geometry);
        let chroma: Vec<u8> = match format {
            PixelFormat::I420 => std::iter::repeat(yuv[1])
                .take(chroma_len)
                .chain(std::iter::repeat(yuv[2]).take(chroma_len))
                .collect(),
            PixelFormat::Nv12 => [yuv[1], yuv[2]].repeat(chroma_len),
            other => bail!("solid frames are only supported for I420 and NV12, not {other}"),
        };
        let mut bytes = vec![yuv[0]; luma_len];
        bytes.extend_from_slice(&chroma);
        Self::from_packed(format, geometry, timestamp, &bytes)
    }

    /// Overrides the declared format, e.g. to mimic a decoder that reports none.
    pub fn with_format(mut self, format: Option<PixelFormat>) -> Self {
        self.format = format;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl VideoFrame for CpuFrame {
    fn coded_width(&self) -> u32 {
        self.width
    }

    fn coded_height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> Option<PixelFormat> {
        self.format
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn planes(&self) -> Vec<Plane<'_>> {
        self.planes
            .iter()
            .map(|(data, stride)| Plane {
                data: data.as_slice(),
                stride: *stride,
            })
            .collect()
    }

    fn close(&mut self) {
        self.closed = true;
        self.planes.clear();
    }
}

/// Size in bytes of one packed picture of `format` at `geometry`.
pub fn packed_frame_len(format: PixelFormat, geometry: FrameGeometry) -> Result<usize> {
    let (luma, chroma) = plane_lens(geometry);
    match format {
        PixelFormat::I420 | PixelFormat::Nv12 => Ok(luma + chroma * 2),
        other => bail!("no packed layout defined for {other}"),
    }
}

/// Sample counts of the luma plane and of one subsampled chroma plane.
fn plane_lens(geometry: FrameGeometry) -> (usize, usize) {
    let chroma = geometry.chroma();
    (
        geometry.width as usize * geometry.height as usize,
        chroma.width as usize * chroma.height as usize,
    )
}

/// A converted frame with tightly packed 8-bit pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbFrame {
    pub timestamp: i64,
    pub width: u32,
    pub height: u32,
    pub format: SurfaceFormat,
    pub data: Vec<u8>,
}

impl RgbFrame {
    /// Pixel at (`x`, `y`) in RGBA order regardless of the surface layout.
    pub fn rgba_at(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize)
            * self.format.bytes_per_pixel() as usize;
        let px = self.data.get(offset..offset.checked_add(4)?)?;
        Some(match self.format {
            SurfaceFormat::Rgba8 => [px[0], px[1], px[2], px[3]],
            SurfaceFormat::Bgra8 => [px[2], px[1], px[0], px[3]],
        })
    }

    /// Converts into an `image` buffer, swizzling BGRA when needed.
    pub fn to_rgba_image(&self) -> Result<image::RgbaImage> {
        let mut data = self.data.clone();
        if self.format == SurfaceFormat::Bgra8 {
            for px in data.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
        }
        image::RgbaImage::from_raw(self.width, self.height, data).ok_or_else(|| {
            anyhow::anyhow!(
                "frame buffer does not match {}x{} RGBA layout",
                self.width,
                self.height
            )
        })
    }
}

/// Downstream consumer of converted frames.
pub trait FrameSink {
    fn enqueue(&mut self, frame: RgbFrame);
}

impl FrameSink for Vec<RgbFrame> {
    fn enqueue(&mut self, frame: RgbFrame) {
        self.push(frame);
    }
}

impl FrameSink for Sender<RgbFrame> {
    fn enqueue(&mut self, frame: RgbFrame) {
        let timestamp = frame.timestamp;
        if self.send(frame).is_err() {
            tracing::warn!(timestamp, "frame consumer disconnected; discarding output frame");
        }
    }
}
