use super::*;

#[test]
fn synthetic_clip_sweeps_a_bar() {
    let mut src = SyntheticSource::new(Size::new(4, 2), 50.0)
        .with_length(3)
        .with_bar_color([255, 0, 0, 255]);
    let info = src.open().unwrap();
    assert_eq!(info.size, Size::new(4, 2));
    assert_eq!(info.frame_interval, Duration::from_millis(20));
    assert_eq!(info.duration, Some(Duration::from_millis(60)));

    let mut frame = VideoFrame::default();
    assert!(src.next_frame(&mut frame).unwrap());
    assert_eq!(&frame.data[0..4], &[255, 0, 0, 255]);
    assert_eq!(&frame.data[4..8], &[16, 16, 16, 255]);

    assert!(src.next_frame(&mut frame).unwrap());
    assert_eq!(frame.position, Duration::from_millis(20));
    assert_eq!(&frame.data[4..8], &[255, 0, 0, 255]);

    assert!(src.next_frame(&mut frame).unwrap());
    assert!(!src.next_frame(&mut frame).unwrap());
}

#[test]
fn looping_clip_restarts_and_seek_moves_the_cursor() {
    let mut src = SyntheticSource::new(Size::new(8, 1), 10.0)
        .with_length(2)
        .looping(true);
    src.open().unwrap();
    let mut frame = VideoFrame::default();
    for _ in 0..5 {
        assert!(src.next_frame(&mut frame).unwrap());
    }
    assert_eq!(frame.position, Duration::ZERO);

    src.seek(Duration::from_millis(150)).unwrap();
    src.next_frame(&mut frame).unwrap();
    assert_eq!(frame.position, Duration::from_millis(100));
}

#[test]
fn bar_colour_is_premultiplied() {
    let mut src = SyntheticSource::new(Size::new(1, 1), 25.0).with_bar_color([255, 255, 255, 128]);
    src.open().unwrap();
    let mut frame = VideoFrame::default();
    src.next_frame(&mut frame).unwrap();
    assert_eq!(frame.data, vec![128, 128, 128, 128]);
}

#[test]
fn empty_synthetic_size_fails_to_open() {
    let mut src = SyntheticSource::new(Size::new(0, 4), 25.0);
    assert!(matches!(src.open(), Err(VidgraphError::Resource(_))));
}

#[test]
fn out_of_range_frame_rate_fails_to_open() {
    for fps in [1e-300, MIN_FPS / 2.0, MAX_FPS * 2.0] {
        let mut src = SyntheticSource::new(Size::new(2, 2), fps);
        assert!(matches!(src.open(), Err(VidgraphError::Resource(_))), "fps {fps}");
    }
    let mut unknown = SyntheticSource::new(Size::new(2, 2), 0.0);
    assert_eq!(unknown.open().unwrap().frame_interval, Duration::from_millis(40));
}

#[test]
fn huge_clip_length_reports_no_duration() {
    let mut src = SyntheticSource::new(Size::new(2, 2), MIN_FPS).with_length(u64::MAX);
    let info = src.open().unwrap();
    assert_eq!(info.frame_interval, Duration::from_secs(100));
    assert_eq!(info.duration, None);
    assert_eq!(frame_time(Duration::from_millis(20), 3), Some(Duration::from_millis(60)));
}

#[cfg(not(feature = "media-ffmpeg"))]
#[test]
fn file_media_needs_the_ffmpeg_feature() {
    let mut src = FfmpegSource::new("clip.mp4");
    let err = src.open().unwrap_err();
    assert!(err.to_string().contains("media-ffmpeg"));
    assert_eq!(src.path(), Path::new("clip.mp4"));
}
