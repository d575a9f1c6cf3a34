#[cfg(feature = "cli")]
use anyhow::{Context, Result};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand, ValueEnum};
#[cfg(feature = "cli")]
use octofhir_fhir_converter::*;
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use std::time::Instant;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "fhir-converter")]
#[command(about = "Convert HL7v2 messages and C-CDA documents to FHIR using templates")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Convert a message to a FHIR bundle
    Convert {
        /// Input format
        #[arg(short, long, value_enum)]
        data_type: InputFormat,
        /// Directory holding the templates for the input format
        #[arg(short, long)]
        template_dir: PathBuf,
        /// Name of the root template (e.g., ORU_R01, CCD)
        #[arg(short, long)]
        root_template: String,
        /// Path to the message file
        #[arg(short, long)]
        input: PathBuf,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Render time limit in milliseconds, overrides the settings file
        #[arg(long)]
        timeout: Option<i64>,
        /// Processor settings JSON file (e.g., {"TimeOut": 5000})
        #[arg(long)]
        settings: Option<PathBuf>,
    },
}

#[cfg(feature = "cli")]
#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    Hl7v2,
    Ccda,
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,octofhir_fhir_converter=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            data_type,
            template_dir,
            root_template,
            input,
            output,
            timeout,
            settings,
        } => {
            let settings = load_settings(settings.as_ref(), timeout)?;
            let converter: Box<dyn FhirConverter> = match data_type {
                InputFormat::Hl7v2 => Box::new(Hl7v2Processor::new(settings)),
                InputFormat::Ccda => Box::new(CcdaProcessor::new(settings)),
            };

            convert(
                converter.as_ref(),
                &template_dir,
                &root_template,
                &input,
                output.as_ref(),
            )
            .await?;
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn load_settings(path: Option<&PathBuf>, timeout: Option<i64>) -> Result<ProcessorSettings> {
    let mut settings = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings file {}", path.display()))?;
            ProcessorSettings::from_json(&content)
                .with_context(|| format!("Invalid settings file {}", path.display()))?
        }
        None => ProcessorSettings::default(),
    };

    if let Some(timeout) = timeout {
        settings = settings.with_time_out(timeout);
    }
    Ok(settings)
}

#[cfg(feature = "cli")]
async fn convert(
    converter: &dyn FhirConverter,
    template_dir: &PathBuf,
    root_template: &str,
    input: &PathBuf,
    output: Option<&PathBuf>,
) -> Result<()> {
    let data = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read input file {}", input.display()))?;
    let provider = DirectoryTemplateProvider::new(template_dir);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("⚠️  Interrupted, cancelling conversion");
            on_interrupt.cancel();
        }
    });

    let started = Instant::now();
    let result = converter
        .convert(&data, Some(root_template), Some(&provider), Some(&cancel))
        .await;

    let bundle = match result {
        Ok(bundle) => bundle,
        Err(ConvertError::Cancelled) => anyhow::bail!("Conversion was cancelled"),
        Err(ConvertError::Converter(err)) => {
            eprintln!("❌ Conversion failed [{}]: {}", err.code, err.message);
            return Err(err).context(format!(
                "Failed to convert {} with template '{root_template}'",
                input.display()
            ));
        }
    };

    match output {
        Some(path) => {
            tokio::fs::write(path, &bundle)
                .await
                .with_context(|| format!("Failed to write output file {}", path.display()))?;
            eprintln!(
                "✅ Converted {} {} to {} in {:.2?}",
                converter.data_type(),
                input.display(),
                path.display(),
                started.elapsed()
            );
        }
        None => println!("{bundle}"),
    }

    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Please compile with --features cli");
    std::process::exit(1);
}
