use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use confproc_cli::ConfigProcessor;
use confproc_cli::config::{
	LoadedLayer, discover_layers, merge_order, parse_layer_file, user_layer_path,
};
use confproc_cli::host::ProcessEnv;

/// Environment variable holding the log filter (`tracing_subscriber::EnvFilter` syntax).
const LOG_ENV: &str = "CONFPROC_LOG";

#[derive(Parser)]
#[command(name = "confproc")]
#[command(
	author,
	version,
	about = "Resolve layered configuration with ENV/FILE/OBF/CONFIG directives"
)]
#[command(arg_required_else_help = true)]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Merge layers and print the fully resolved configuration
	Resolve {
		#[command(flatten)]
		layers: LayerArgs,

		/// Output format
		#[arg(long, value_enum, default_value_t = OutputFormat::Json)]
		format: OutputFormat,
	},
	/// Obfuscate a value for use behind an OBF: directive
	Obfuscate {
		/// The value to obfuscate
		value: String,

		/// Algorithm (defaults to configProcessor.obfuscator.defaultAlg)
		#[arg(long)]
		alg: Option<String>,

		#[command(flatten)]
		layers: LayerArgs,
	},
	/// List discovered layer files in merge order
	Layers,
}

#[derive(Args)]
struct LayerArgs {
	/// Extra layer file (TOML or JSON); later files win over earlier ones and
	/// over discovered layers
	#[arg(short = 'l', long = "layer", value_name = "FILE")]
	files: Vec<PathBuf>,

	/// Do not look for .confproc.toml files from the current directory upwards
	#[arg(long)]
	no_discover: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
	Json,
	Toml,
}

fn main() -> ExitCode {
	init_tracing();

	match run() {
		Ok(code) => code,
		Err(e) => {
			eprintln!("error: {e:?}");
			ExitCode::FAILURE
		}
	}
}

fn init_tracing() {
	let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

fn run() -> Result<ExitCode> {
	let cli = Cli::parse();

	match cli.command {
		Commands::Resolve { layers, format } => handle_resolve(&layers, format),
		Commands::Obfuscate { value, alg, layers } => {
			handle_obfuscate(&value, alg.as_deref(), &layers)
		}
		Commands::Layers => handle_layers(),
	}
}

fn handle_resolve(args: &LayerArgs, format: OutputFormat) -> Result<ExitCode> {
	let processor = build_processor(args)?;
	let resolved = processor
		.into_processed()
		.context("Failed to resolve configuration")?;

	let rendered = match format {
		OutputFormat::Json => serde_json::to_string_pretty(&resolved)
			.context("Failed to render configuration as JSON")?,
		OutputFormat::Toml => toml::to_string_pretty(&resolved)
			.context("Failed to render configuration as TOML (null values cannot be represented)")?,
	};

	println!("{}", rendered.trim_end());
	Ok(ExitCode::SUCCESS)
}

fn handle_obfuscate(value: &str, alg: Option<&str>, args: &LayerArgs) -> Result<ExitCode> {
	let processor = build_processor(args)?;
	let encoded = processor
		.obfuscate_string(value, alg)
		.context("Failed to obfuscate value")?;

	println!("OBF:{}", encoded);
	Ok(ExitCode::SUCCESS)
}

fn handle_layers() -> Result<ExitCode> {
	let layers = discovered_layers()?;

	if layers.is_empty() {
		println!("No layer files found.");
	} else {
		println!("Layer files (in merge order, last wins):\n");
		for loaded in &layers {
			let keys = loaded.value.as_object().map_or(0, |map| map.len());
			println!("  {} ({} top-level keys)", loaded.path.display(), keys);
		}
		println!();
	}

	if let Ok(user_path) = user_layer_path() {
		println!("User layer path: {}", user_path.display());
		if user_path.exists() {
			println!("  (exists)");
		} else {
			println!("  (not found)");
		}
	}

	Ok(ExitCode::SUCCESS)
}

/// Discovered layers in merge order (least specific first).
fn discovered_layers() -> Result<Vec<LoadedLayer>> {
	let cwd = std::env::current_dir().context("Failed to get current directory")?;
	let layers = discover_layers(&cwd, &ProcessEnv).context("Failed to discover layer files")?;
	Ok(merge_order(layers))
}

fn build_processor(args: &LayerArgs) -> Result<ConfigProcessor> {
	let mut layers: Vec<Option<Value>> = Vec::new();

	if !args.no_discover {
		layers.extend(discovered_layers()?.into_iter().map(|l| Some(l.value)));
	}

	for file in &args.files {
		let loaded = parse_layer_file(file)
			.with_context(|| format!("Failed to load layer {}", file.display()))?;
		layers.push(Some(loaded.value));
	}

	ConfigProcessor::new(layers).context("Failed to initialize config processor")
}
