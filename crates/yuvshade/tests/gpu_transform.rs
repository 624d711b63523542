//! End-to-end conversions on a real adapter. Every test returns early when the
//! machine has no usable GPU (or software fallback) so CI without one passes.

use std::time::Duration;

use yuvshade::{
    expected_rgba8, CpuFrame, FrameGeometry, PixelFormat, RgbFrame, SurfaceFormat,
    TransformConfig, TransformError, YuvTransform,
};

fn ready_transform(config: TransformConfig) -> Option<YuvTransform> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut transform = YuvTransform::new(config);
    match transform.initialize() {
        Ok(()) => Some(transform),
        Err(TransformError::DeviceUnavailable { reason }) => {
            eprintln!("skipping GPU test: {reason}");
            None
        }
        Err(err) => panic!("unexpected initialization error: {err}"),
    }
}

fn solid(format: PixelFormat, width: u32, height: u32, timestamp: i64, yuv: [u8; 3]) -> CpuFrame {
    CpuFrame::solid(format, FrameGeometry::new(width, height), timestamp, yuv).unwrap()
}

fn assert_uniform(frame: &RgbFrame, expected: [u8; 4]) {
    for y in 0..frame.height {
        for x in 0..frame.width {
            let actual = frame.rgba_at(x, y).unwrap();
            for channel in 0..4 {
                let delta = (actual[channel] as i16 - expected[channel] as i16).abs();
                assert!(
                    delta <= 2,
                    "pixel ({x}, {y}) is {actual:?}, expected {expected:?}"
                );
            }
        }
    }
}

#[test]
fn converts_i420_constant_colour() {
    let Some(mut transform) = ready_transform(TransformConfig::default()) else {
        return;
    };
    let yuv = [81, 90, 240];
    let mut sink: Vec<RgbFrame> = Vec::new();
    transform.transform(solid(PixelFormat::I420, 16, 8, 1_000, yuv), &mut sink);

    assert_eq!(sink.len(), 1);
    let frame = &sink[0];
    assert_eq!((frame.width, frame.height), (16, 8));
    assert_eq!(frame.timestamp, 1_000);
    assert_eq!(frame.data.len(), 16 * 8 * 4);
    assert_uniform(frame, expected_rgba8(yuv));
}

#[test]
fn converts_nv12_constant_colour_on_rgba_surface() {
    let config = TransformConfig {
        surface_format: SurfaceFormat::Rgba8,
        ..TransformConfig::default()
    };
    let Some(mut transform) = ready_transform(config) else {
        return;
    };
    let yuv = [145, 54, 34];
    let mut sink: Vec<RgbFrame> = Vec::new();
    transform.transform(solid(PixelFormat::Nv12, 10, 6, 42, yuv), &mut sink);

    assert_eq!(sink.len(), 1);
    assert_eq!(sink[0].format, SurfaceFormat::Rgba8);
    assert_uniform(&sink[0], expected_rgba8(yuv));
}

#[test]
fn odd_dimensions_round_chroma_up() {
    let Some(mut transform) = ready_transform(TransformConfig::default()) else {
        return;
    };
    let yuv = [41, 240, 110];
    let mut sink: Vec<RgbFrame> = Vec::new();
    transform.transform(solid(PixelFormat::I420, 7, 5, 0, yuv), &mut sink);

    assert_eq!(sink.len(), 1);
    assert_uniform(&sink[0], expected_rgba8(yuv));
}

#[test]
fn rebuilds_only_on_change() {
    let Some(mut transform) = ready_transform(TransformConfig::default()) else {
        return;
    };
    let mut sink: Vec<RgbFrame> = Vec::new();
    transform.transform(solid(PixelFormat::Nv12, 8, 8, 0, [128; 3]), &mut sink);
    transform.transform(solid(PixelFormat::Nv12, 8, 8, 1, [128; 3]), &mut sink);

    let stats = transform.stats();
    assert_eq!(stats.surface_rebuilds, 1);
    assert_eq!(stats.pipeline_rebuilds, 1);

    transform.transform(solid(PixelFormat::Nv12, 16, 8, 2, [128; 3]), &mut sink);
    let stats = transform.stats();
    assert_eq!(stats.surface_rebuilds, 2);
    assert_eq!(stats.pipeline_rebuilds, 1);

    transform.transform(solid(PixelFormat::I420, 16, 8, 3, [128; 3]), &mut sink);
    let stats = transform.stats();
    assert_eq!(stats.surface_rebuilds, 2);
    assert_eq!(stats.pipeline_rebuilds, 2);

    assert_eq!(sink.len(), 4);
    assert_eq!(stats.frames_emitted, 4);
}

#[test]
fn unset_format_converts_as_nv12() {
    let Some(mut transform) = ready_transform(TransformConfig::default()) else {
        return;
    };
    let yuv = [170, 166, 16];
    let mut sink: Vec<RgbFrame> = Vec::new();
    transform.transform(solid(PixelFormat::Nv12, 4, 4, 5, yuv), &mut sink);
    transform.transform(
        solid(PixelFormat::Nv12, 4, 4, 6, yuv).with_format(None),
        &mut sink,
    );

    assert_eq!(sink.len(), 2);
    assert_eq!(sink[0].data, sink[1].data);
    assert_eq!(sink[1].timestamp, 6);
}

#[test]
fn unset_format_is_dropped_when_not_assumed() {
    let config = TransformConfig {
        assume_nv12_when_unset: false,
        ..TransformConfig::default()
    };
    let Some(mut transform) = ready_transform(config) else {
        return;
    };
    let mut frame = solid(PixelFormat::Nv12, 4, 4, 0, [128; 3]).with_format(None);
    let mut sink: Vec<RgbFrame> = Vec::new();
    transform.transform(&mut frame, &mut sink);

    assert!(sink.is_empty());
    assert!(frame.is_closed());
    assert_eq!(transform.stats().dropped_unsupported, 1);
}

#[test]
fn unsupported_format_does_not_disturb_next_frame() {
    let Some(mut transform) = ready_transform(TransformConfig::default()) else {
        return;
    };
    let mut rgba = CpuFrame::new(
        4,
        4,
        Some(PixelFormat::Rgba),
        0,
        vec![(vec![255; 4 * 4 * 4], 16)],
    );
    let mut sink: Vec<RgbFrame> = Vec::new();
    transform.transform(&mut rgba, &mut sink);
    assert!(sink.is_empty());
    assert!(rgba.is_closed());

    let yuv = [81, 90, 240];
    transform.transform(solid(PixelFormat::I420, 4, 4, 9, yuv), &mut sink);
    assert_eq!(sink.len(), 1);
    assert_uniform(&sink[0], expected_rgba8(yuv));

    let stats = transform.stats();
    assert_eq!(stats.dropped_unsupported, 1);
    assert_eq!(stats.frames_emitted, 1);
}

#[test]
fn malformed_planes_are_dropped() {
    let Some(mut transform) = ready_transform(TransformConfig::default()) else {
        return;
    };
    let mut short = CpuFrame::new(
        8,
        8,
        Some(PixelFormat::I420),
        0,
        vec![(vec![16; 64], 8), (vec![128; 4], 4)],
    );
    let mut empty = CpuFrame::new(0, 0, Some(PixelFormat::Nv12), 1, Vec::new());
    let mut sink: Vec<RgbFrame> = Vec::new();
    transform.transform(&mut short, &mut sink);
    transform.transform(&mut empty, &mut sink);

    assert!(sink.is_empty());
    assert!(short.is_closed());
    assert!(empty.is_closed());
    assert_eq!(transform.stats().dropped_import, 2);
    assert!(transform.is_ready());
}

#[test]
fn frames_are_closed_after_conversion() {
    let Some(mut transform) = ready_transform(TransformConfig::default()) else {
        return;
    };
    let mut frame = solid(PixelFormat::I420, 4, 4, 0, [128; 3]);
    let mut sink: Vec<RgbFrame> = Vec::new();
    transform.transform(&mut frame, &mut sink);

    assert_eq!(sink.len(), 1);
    assert!(frame.is_closed());
}

#[test]
fn timestamps_follow_input_order() {
    let config = TransformConfig {
        submission_timeout: Some(Duration::from_secs(10)),
        ..TransformConfig::default()
    };
    let Some(mut transform) = ready_transform(config) else {
        return;
    };
    let mut sink: Vec<RgbFrame> = Vec::new();
    for timestamp in [0, 33_333, 66_666, -5] {
        transform.transform(solid(PixelFormat::Nv12, 4, 2, timestamp, [128; 3]), &mut sink);
    }
    let timestamps: Vec<i64> = sink.iter().map(|frame| frame.timestamp).collect();
    assert_eq!(timestamps, vec![0, 33_333, 66_666, -5]);
}

#[test]
fn destroyed_transform_emits_nothing() {
    let Some(mut transform) = ready_transform(TransformConfig::default()) else {
        return;
    };
    transform.destroy();
    transform.destroy();
    assert!(!transform.is_ready());

    let mut frame = solid(PixelFormat::Nv12, 4, 4, 0, [128; 3]);
    let mut sink: Vec<RgbFrame> = Vec::new();
    transform.transform(&mut frame, &mut sink);
    assert!(sink.is_empty());
    assert!(frame.is_closed());
    assert!(transform.initialize().unwrap_err().is_fatal());
}

#[test]
fn output_feeds_a_channel_sink() {
    let Some(mut transform) = ready_transform(TransformConfig::default()) else {
        return;
    };
    let (mut sender, receiver) = crossbeam_channel::unbounded();
    transform.transform(solid(PixelFormat::I420, 4, 4, 77, [128; 3]), &mut sender);
    let frame = receiver.try_recv().unwrap();
    assert_eq!(frame.timestamp, 77);
}
