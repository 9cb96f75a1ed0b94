mod session_pipeline {
    use std::io::Write;
    use std::time::{Duration, Instant};

    use shadecast::{
        CancelToken, Geometry, Mapping, PatternRenderer, Pipeline, PipelineOpts, by_name,
        interval_for_fps,
    };

    const W: u32 = 16;
    const H: u32 = 12;

    fn renderer(interval: Duration) -> PatternRenderer {
        PatternRenderer::new(Geometry::new(W, H).unwrap(), interval, &[]).unwrap()
    }

    #[test]
    fn frame_limit_delivers_exactly_that_many_frames() {
        let interval = interval_for_fps(100.0).unwrap();
        let mut pipeline = Pipeline::new(
            Box::new(renderer(interval)),
            by_name("rgb24").unwrap(),
            PipelineOpts {
                interval: Some(interval),
                frame_limit: Some(10),
            },
        );

        let mut out = Vec::new();
        let stats = pipeline.run(&mut out, &CancelToken::new()).unwrap();

        assert_eq!(stats.frames_encoded, 10);
        assert_eq!(out.len(), 10 * (W * H * 3) as usize);
        pipeline.shutdown().unwrap();
    }

    #[test]
    fn single_frame_mode_emits_one_complete_image() {
        let mut pipeline = Pipeline::new(
            Box::new(renderer(Duration::ZERO)),
            by_name("png").unwrap(),
            PipelineOpts::default(),
        );

        let mut out = Vec::new();
        let stats = pipeline.run(&mut out, &CancelToken::new()).unwrap();

        assert_eq!(stats.frames_rendered, 1);
        assert_eq!(&out[..8], b"\x89PNG\r\n\x1a\n");
        pipeline.shutdown().unwrap();
    }

    #[test]
    fn gif_output_is_a_complete_animation_stream() {
        let interval = interval_for_fps(50.0).unwrap();
        let mut pipeline = Pipeline::new(
            Box::new(renderer(interval)),
            by_name("gif").unwrap(),
            PipelineOpts {
                interval: Some(interval),
                frame_limit: Some(5),
            },
        );

        let mut out = Vec::new();
        let stats = pipeline.run(&mut out, &CancelToken::new()).unwrap();

        assert_eq!(stats.frames_encoded, 5);
        assert_eq!(&out[..6], b"GIF89a");
        // GIF trailer byte closes the stream.
        assert_eq!(out.last(), Some(&0x3b));
    }

    #[test]
    fn raw_output_is_paced_to_the_interval() {
        let interval = Duration::from_millis(20);
        let mut pipeline = Pipeline::new(
            Box::new(renderer(interval)),
            by_name("rgb24").unwrap(),
            PipelineOpts {
                interval: Some(interval),
                frame_limit: Some(5),
            },
        );

        let start = Instant::now();
        let mut out = Vec::new();
        let stats = pipeline.run(&mut out, &CancelToken::new()).unwrap();

        assert_eq!(stats.frames_encoded, 5);
        // Five frames at 20ms each; allow slack for the first frame and
        // scheduler noise, but rendering flat-out would finish in
        // microseconds.
        assert!(
            start.elapsed() >= Duration::from_millis(60),
            "pipeline ignored the pacing interval, finished in {:?}",
            start.elapsed()
        );
        pipeline.shutdown().unwrap();
    }

    #[test]
    fn external_cancellation_terminates_every_stage() {
        let interval = interval_for_fps(1000.0).unwrap();
        let mut pipeline = Pipeline::new(
            Box::new(renderer(interval)),
            by_name("rgb24").unwrap(),
            PipelineOpts {
                interval: Some(interval),
                frame_limit: None,
            },
        );

        let cancel = CancelToken::new();
        {
            let cancel = cancel.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                cancel.cancel();
            });
        }

        let start = Instant::now();
        let mut out = Vec::new();
        let stats = pipeline.run(&mut out, &cancel).unwrap();

        assert!(
            start.elapsed() < Duration::from_secs(5),
            "cancellation did not unwind the pipeline promptly"
        );
        assert!(stats.frames_rendered > 0);
        assert_eq!(out.len() % (W * H * 3) as usize, 0, "torn frame in output");
        pipeline.shutdown().unwrap();
    }

    #[test]
    fn encoder_failure_aborts_without_deadlocking_the_producer() {
        struct BrokenPipe {
            remaining: usize,
        }
        impl Write for BrokenPipe {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                if self.remaining == 0 {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        "downstream closed",
                    ));
                }
                self.remaining -= 1;
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let interval = interval_for_fps(1000.0).unwrap();
        let mut pipeline = Pipeline::new(
            Box::new(renderer(interval)),
            by_name("rgb24").unwrap(),
            PipelineOpts {
                interval: Some(interval),
                frame_limit: None,
            },
        );

        let cancel = CancelToken::new();
        let mut sink = BrokenPipe { remaining: 3 };
        let start = Instant::now();
        let err = pipeline.run(&mut sink, &cancel).unwrap_err();

        assert!(err.to_string().contains("downstream closed"));
        assert!(cancel.is_cancelled());
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "encoder failure did not unwind the pipeline promptly"
        );
    }

    #[test]
    fn mapped_resources_fail_session_setup_when_unknown() {
        let mappings = Mapping::extract("#pragma map x=teapot:0").unwrap();
        let err = PatternRenderer::new(
            Geometry::new(W, H).unwrap(),
            Duration::from_millis(10),
            &mappings,
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("unknown resource kind"));
    }
}
