//! # Preprocessing Pipeline Tests
//!
//! End-to-end properties of the minimal and extended recipes on synthetic
//! scans: output shape, binarization, determinism and error attribution.

#[cfg(test)]
mod tests {
    use scantext::decoding::decode_image;
    use scantext::preprocessing::{
        PipelineProfile, PixelBuffer, PreprocessingError, PreprocessingPipeline, Stage,
        StageConfig,
    };

    /// Light page with dark "text" bars under a left-to-right lighting gradient.
    fn unevenly_lit_page(width: u32, height: u32) -> PixelBuffer {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let paper = 150 + (100 * x / width) as u8;
                let ink = (y / 6) % 3 == 1 && (x / 4) % 4 != 0;
                let v = if ink { paper / 4 } else { paper };
                data.extend_from_slice(&[v, v.saturating_sub(5), v]);
            }
        }
        PixelBuffer::new(width, height, 3, data).unwrap()
    }

    fn uniform_gray(width: u32, height: u32, value: u8) -> PixelBuffer {
        PixelBuffer::new(width, height, 1, vec![value; (width * height) as usize]).unwrap()
    }

    fn encode(buffer: &PixelBuffer) -> Vec<u8> {
        buffer.encode_png().unwrap()
    }

    #[test]
    fn test_minimal_output_is_binary_single_channel() {
        let output = PreprocessingPipeline::minimal()
            .run(unevenly_lit_page(120, 60))
            .unwrap();
        assert_eq!(output.channels(), 1);
        assert!(output.is_binary());
    }

    #[test]
    fn test_extended_output_is_binary_single_channel() {
        let output = PreprocessingPipeline::extended()
            .run(unevenly_lit_page(120, 60))
            .unwrap();
        assert_eq!(output.channels(), 1);
        assert!(output.is_binary());
    }

    #[test]
    fn test_narrow_images_are_upscaled_to_min_width() {
        let output = PreprocessingPipeline::minimal()
            .run(unevenly_lit_page(400, 300))
            .unwrap();
        assert_eq!(output.dimensions(), (1000, 750));

        let output = PreprocessingPipeline::extended()
            .run(unevenly_lit_page(333, 100))
            .unwrap();
        // 100 * 1000 / 333 = 300.3
        assert_eq!(output.dimensions(), (1000, 300));
    }

    #[test]
    fn test_wide_images_keep_their_size() {
        for width in [1000, 1200] {
            let output = PreprocessingPipeline::minimal()
                .run(uniform_gray(width, 20, 200))
                .unwrap();
            assert_eq!(output.dimensions(), (width, 20));
        }
    }

    #[test]
    fn test_runs_are_deterministic() {
        for pipeline in [
            PreprocessingPipeline::minimal(),
            PreprocessingPipeline::extended(),
        ] {
            let first = pipeline.run(unevenly_lit_page(90, 40)).unwrap();
            let second = pipeline.run(unevenly_lit_page(90, 40)).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_deterministic_through_png_decoding() {
        let png = encode(&unevenly_lit_page(64, 32));
        let pipeline = PreprocessingPipeline::extended();

        let first = pipeline.run(decode_image(&png).unwrap()).unwrap();
        let second = pipeline.run(decode_image(&png).unwrap()).unwrap();
        assert_eq!(encode(&first), encode(&second));
    }

    #[test]
    fn test_blank_pages_stay_white() {
        for value in [0, 128, 255] {
            let output = PreprocessingPipeline::extended()
                .run(uniform_gray(1000, 30, value))
                .unwrap();
            assert!(
                output.as_bytes().iter().all(|&p| p == 255),
                "uniform page of {} should binarize to white",
                value
            );
        }
    }

    #[test]
    fn test_ink_survives_uneven_lighting() {
        let output = PreprocessingPipeline::minimal()
            .run(unevenly_lit_page(1000, 36))
            .unwrap();
        let black = output.as_bytes().iter().filter(|&&p| p == 0).count();
        let white = output.as_bytes().len() - black;
        assert!(black > 0, "text bars should produce black pixels");
        assert!(white > black, "paper should dominate the page");
    }

    #[test]
    fn test_report_lists_every_stage_in_order() {
        let pipeline = PreprocessingPipeline::extended();
        let (output, reports) = pipeline.run_with_report(unevenly_lit_page(50, 20)).unwrap();

        let names: Vec<&str> = reports.iter().map(|r| r.stage).collect();
        let expected: Vec<&str> = Stage::EXTENDED.iter().map(|s| s.name()).collect();
        assert_eq!(names, expected);

        assert_eq!(reports[0].channels, 1);
        assert_eq!(reports[1].dimensions, (1000, 400));
        assert_eq!(reports.last().unwrap().dimensions, output.dimensions());
    }

    #[test]
    fn test_custom_stage_list() {
        let profile = PipelineProfile::parse_stage_list("grayscale, adaptive-threshold").unwrap();
        let pipeline = PreprocessingPipeline::new(profile, StageConfig::default()).unwrap();
        assert_eq!(
            pipeline.stages(),
            &[Stage::Grayscale, Stage::AdaptiveThreshold]
        );

        let output = pipeline.run(unevenly_lit_page(40, 20)).unwrap();
        assert_eq!(output.dimensions(), (40, 20));
        assert!(output.is_binary());
    }

    #[test]
    fn test_invalid_pipelines_are_rejected() {
        let not_grayscale_first =
            PreprocessingPipeline::with_stages(vec![Stage::Upscale], StageConfig::default());
        assert!(matches!(
            not_grayscale_first,
            Err(PreprocessingError::InvalidConfig { .. })
        ));

        let empty = PreprocessingPipeline::with_stages(Vec::new(), StageConfig::default());
        assert!(empty.is_err());

        let even_block = StageConfig {
            threshold_block_size: 10,
            ..Default::default()
        };
        assert!(PreprocessingPipeline::new(PipelineProfile::Minimal, even_block).is_err());

        assert!(PipelineProfile::parse_stage_list("grayscale,despeckle").is_err());
    }

    #[test]
    fn test_tall_slivers_fail_at_upscale() {
        // 10 px wide would become 1000 x 10,000,000
        let err = PreprocessingPipeline::minimal()
            .run(uniform_gray(10, 100_000, 255))
            .unwrap_err();
        assert!(matches!(err, PreprocessingError::StageFailed { .. }));
        assert_eq!(err.stage(), Some("upscale"));

        let capped = StageConfig {
            max_output_pixels: 1000 * 400,
            ..Default::default()
        };
        let pipeline = PreprocessingPipeline::new(PipelineProfile::Minimal, capped).unwrap();
        assert!(pipeline.run(uniform_gray(50, 20, 200)).is_ok());
        assert!(pipeline.run(uniform_gray(50, 21, 200)).is_err());
    }

    #[test]
    fn test_tiny_images_are_processed() {
        let output = PreprocessingPipeline::extended()
            .run(uniform_gray(2, 1, 40))
            .unwrap();
        assert_eq!(output.dimensions(), (1000, 500));
        assert!(output.is_binary());
    }
}
