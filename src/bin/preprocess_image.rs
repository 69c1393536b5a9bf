//! Runs the preprocessing pipeline on image files and writes the binarized
//! pages next to them (or into `--out <dir>`). With `--ocr`, the pages are
//! also read with Tesseract and the normalized text is printed.
//!
//! The pipeline profile comes from the same environment variables as the
//! server (`PIPELINE_PROFILE`, `PIPELINE_STAGES`).

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use scantext::config::AppConfig;
use scantext::decoding::decode_image;
use scantext::ocr::{TesseractExtractor, TextExtractor};
use scantext::preprocessing::PreprocessingPipeline;
use scantext::text_processing::TextNormalizer;

#[derive(Parser, Debug)]
#[command(name = "preprocess_image")]
#[command(about = "Binarize images with the OCR preprocessing pipeline")]
struct Args {
    /// Also run Tesseract and print the normalized text
    #[arg(long)]
    ocr: bool,

    /// Directory for the processed pages, defaults to each input's directory
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Images to process
    #[arg(required = true, value_name = "IMAGE")]
    inputs: Vec<PathBuf>,
}

fn output_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string());
    let name = format!("{}_processed.png", stem);
    match out_dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| anyhow::anyhow!("{}", e))?;
    config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;

    let pipeline = PreprocessingPipeline::new(
        config.pipeline.profile.clone(),
        config.pipeline.stages.clone(),
    )?;
    let normalizer = TextNormalizer::new(config.normalizer.clone())?;
    let extractor = TesseractExtractor::new(&config.ocr);

    if let Some(dir) = &args.out {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let stage_names: Vec<&str> = pipeline.stages().iter().map(|s| s.name()).collect();
    println!("Pipeline: {}", stage_names.join(" -> "));

    let mut failures = 0;
    for input in &args.inputs {
        let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
        let image = match decode_image(&bytes) {
            Ok(image) => image,
            Err(e) => {
                eprintln!("ERROR: {}: {}", input.display(), e);
                failures += 1;
                continue;
            }
        };

        let (page, reports) = match pipeline.run_with_report(image) {
            Ok(result) => result,
            Err(e) => {
                eprintln!("ERROR: {}: {}", input.display(), e);
                failures += 1;
                continue;
            }
        };

        println!("\n{}", input.display());
        for report in &reports {
            println!(
                "  {:<18} {}x{}  {} ms",
                report.stage, report.dimensions.0, report.dimensions.1, report.processing_time_ms
            );
        }

        let output = output_path(input, args.out.as_deref());
        let png = page.encode_png()?;
        fs::write(&output, png).with_context(|| format!("writing {}", output.display()))?;
        println!("  -> {}", output.display());

        if args.ocr {
            match extractor.extract(&page, &config.ocr.request) {
                Ok(raw) => println!("{}", normalizer.normalize(&raw)),
                Err(e) => {
                    eprintln!("ERROR: OCR failed for {}: {}", input.display(), e);
                    failures += 1;
                }
            }
        }
    }

    if failures > 0 {
        eprintln!("\n{} of {} image(s) failed", failures, args.inputs.len());
        process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_and_inputs() {
        let args =
            Args::try_parse_from(["preprocess_image", "--ocr", "--out", "pages", "a.png", "b.jpg"])
                .unwrap();
        assert!(args.ocr);
        assert_eq!(args.out, Some(PathBuf::from("pages")));
        assert_eq!(args.inputs, vec![PathBuf::from("a.png"), PathBuf::from("b.jpg")]);
    }

    #[test]
    fn test_unknown_flag_is_an_error() {
        // Used to be taken as an input path
        assert!(Args::try_parse_from(["preprocess_image", "--oc", "a.png"]).is_err());
    }

    #[test]
    fn test_inputs_are_required() {
        assert!(Args::try_parse_from(["preprocess_image", "--ocr"]).is_err());
        assert!(Args::try_parse_from(["preprocess_image", "--out"]).is_err());
    }

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path(Path::new("scans/page.jpg"), None),
            PathBuf::from("scans/page_processed.png")
        );
        assert_eq!(
            output_path(Path::new("scans/page.jpg"), Some(Path::new("out"))),
            PathBuf::from("out/page_processed.png")
        );
    }
}
