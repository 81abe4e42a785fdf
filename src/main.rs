// Number plate reader and validator

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use plate_scan::{
    models::PlateFormat, spoken_to_plate_text, ExtractorConfig, PlateError, PlateExtractor,
    PlateResult, PlateValidator,
};

#[derive(Parser, Debug)]
#[command(name = "platescan", version, about = "Read and validate vehicle number plates")]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Command,
}

/// Overrides applied on top of the config file.
#[derive(Args, Debug)]
struct EngineArgs {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// OCR language
    #[arg(long, global = true)]
    lang: Option<String>,

    /// Directory containing tessdata
    #[arg(long, global = true)]
    tessdata: Option<PathBuf>,

    /// Disable the single-line reader
    #[arg(long, global = true)]
    no_line: bool,

    /// Disable the block reader
    #[arg(long, global = true)]
    no_block: bool,

    /// Rank reads on raw confidence only
    #[arg(long, global = true)]
    no_boost: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract a plate from an image
    Extract {
        image: PathBuf,

        /// Print the JSON response instead of a report
        #[arg(long)]
        json: bool,
    },
    /// Validate typed plate text
    Validate {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Normalize and validate a spoken plate
    Spoken {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Run the built-in sample plates through the validator
    Patterns,
}

const SAMPLE_PLATES: [(&str, PlateFormat); 10] = [
    ("UA077AK", PlateFormat::NewStandard),
    ("UG092AK", PlateFormat::NewStandard),
    ("UDS164M", PlateFormat::Legacy),
    ("UAX123Y", PlateFormat::Legacy),
    ("UMA055AF", PlateFormat::Motorcycle),
    ("UMB010AL", PlateFormat::Motorcycle),
    ("UP6633", PlateFormat::Government),
    ("UG0793", PlateFormat::Government),
    ("ABC123", PlateFormat::Unknown),
    ("UABC12", PlateFormat::Unknown),
];

impl EngineArgs {
    fn load_config(&self) -> Result<ExtractorConfig, PlateError> {
        let mut config = match &self.config {
            Some(path) => ExtractorConfig::from_file(path)?,
            None => ExtractorConfig::default(),
        };

        if let Some(lang) = &self.lang {
            config.language = lang.clone();
        }
        if let Some(tessdata) = &self.tessdata {
            config.tessdata_path = Some(tessdata.clone());
        }
        if self.no_line {
            config.backends.tesseract_line = false;
        }
        if self.no_block {
            config.backends.tesseract_block = false;
        }
        if self.no_boost {
            config.confidence_boost = None;
        }
        Ok(config)
    }
}

fn print_report(result: &PlateResult) {
    println!("\n===============================================");
    println!("      PLATE EXTRACTION REPORT");
    println!("===============================================\n");

    if result.is_valid() {
        println!("  Plate:      {}", result.formatted_plate);
        println!("  Format:     {}", result.plate_format);
        println!("  Confidence: {:.2}", result.confidence);
        if let Some(bbox) = &result.bounding_box {
            println!("  Region:     {:?}", bbox.as_tuple());
        }
    } else {
        println!("  No plate: {}", result.error.as_deref().unwrap_or("low confidence"));
    }

    if let Some(raw) = &result.raw_detections {
        println!("\n  Raw detections ({}):", raw.len());
        for text in raw.iter().take(10) {
            println!("    - {}", text);
        }
    }
}

fn validate(text: &str) -> bool {
    match PlateValidator::validate_manual_entry(text) {
        Ok((formatted, format)) => {
            println!("{} -> {} ({})", text, formatted, format);
            true
        }
        Err(e) => {
            println!("{} -> {}", text, e);
            false
        }
    }
}

fn run(cli: Cli) -> Result<bool, PlateError> {
    match cli.command {
        Command::Extract { image, json } => {
            let config = cli.engine.load_config()?;
            let extractor = PlateExtractor::new(config);
            log::info!(
                "Backends: {:?} (lang {})",
                extractor.backend_ids(),
                extractor.config().language
            );

            let result = extractor.extract_from_file(&image);
            if json {
                let body = serde_json::to_string_pretty(&result.to_api_response())
                    .map_err(|e| PlateError::IoError(format!("Failed to serialize result: {}", e)))?;
                println!("{}", body);
            } else {
                print_report(&result);
            }
            Ok(result.is_valid())
        }
        Command::Validate { text } => {
            let mut all_valid = true;
            for entry in &text {
                all_valid &= validate(entry);
            }
            Ok(all_valid)
        }
        Command::Spoken { text } => {
            let transcript = text.join(" ");
            let plate_text = spoken_to_plate_text(&transcript);
            println!("Heard: {}", plate_text);
            Ok(validate(&plate_text))
        }
        Command::Patterns => {
            let mut passed = 0;
            for (plate, expected) in SAMPLE_PLATES {
                let (formatted, format, _) = PlateValidator::validate_and_format(plate);
                let ok = format == expected;
                if ok {
                    passed += 1;
                }
                println!(
                    "  {} {:10} -> {:10} ({})",
                    if ok { "PASS" } else { "FAIL" },
                    plate,
                    formatted,
                    format
                );
            }
            println!("\n  Results: {} passed, {} failed", passed, SAMPLE_PLATES.len() - passed);
            Ok(passed == SAMPLE_PLATES.len())
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}
