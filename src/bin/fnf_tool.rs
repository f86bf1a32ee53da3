//! FNF Tool CLI
//!
//! Dumps FNF documents and converts them between the binary and XML encodings.

use std::fs::{self, File};
use std::io::{BufWriter, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use ipdr_fnf::{
    BinaryReader, BinaryWriter, DocEnd, DocHeader, ErrorList, FnfConfig, FnfData, Schema, XmlReader, XmlWriter,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fnf-tool")]
#[command(about = "Inspect and convert FNF record documents")]
struct Cli {
    /// Configuration file (defaults to fnf.toml lookup)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Schema to type and validate records against (JSON or TOML)
    #[arg(short, long, global = true)]
    schema: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the header, every record and the end-of-document metadata
    Dump {
        /// Binary or XML document; the encoding is detected
        file: PathBuf,
    },

    /// Re-encode a document
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Target encoding
        #[arg(long, value_enum)]
        to: Encoding,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Encoding {
    Binary,
    Xml,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_ref().map(|p| p.to_string_lossy().into_owned());
    let config = FnfConfig::load_from(config_path.as_deref()).context("loading configuration")?;
    let schema = match &cli.schema {
        Some(path) => Some(Arc::new(
            Schema::load(path).with_context(|| format!("loading schema {}", path.display()))?,
        )),
        None => None,
    };

    match cli.command {
        Commands::Dump { file } => dump(&file, &config, schema),
        Commands::Convert { input, output, to } => convert(&input, &output, to, &config, schema),
        Commands::Config { output } => {
            match output {
                Some(path) => {
                    config
                        .save(&path.to_string_lossy())
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("✅ Configuration written to {}", path.display());
                }
                None => print!("{}", toml::to_string_pretty(&config)?),
            }
            Ok(())
        }
    }
}

fn dump(path: &Path, config: &FnfConfig, schema: Option<Arc<Schema>>) -> anyhow::Result<()> {
    let mut input = Input::open(path, config, schema)?;
    let header = input.header()?;

    println!("📄 {} ({})", path.display(), input.encoding_name());
    println!("   docId:        {}", header.doc_id);
    println!("   version:      {}", header.version);
    println!("   created:      {}", ipdr_fnf::document::format_time(&header.creation_time));
    println!("   recorder:     {}", header.recorder_info);
    println!("   namespace:    {}", header.default_namespace);
    println!();

    let mut count = 0u64;
    let result = loop {
        match input.next_record() {
            Ok(Some(record)) => {
                count += 1;
                println!("{:>6}  {}", count, record);
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    println!();
    if let Some(end) = input.doc_end() {
        println!(
            "   end:          {} records at {}",
            end.count,
            ipdr_fnf::document::format_time(&end.end_time)
        );
    }
    report(input.errors());
    result.with_context(|| format!("reading {}", path.display()))
}

fn convert(
    input_path: &Path,
    output_path: &Path,
    to: Encoding,
    config: &FnfConfig,
    schema: Option<Arc<Schema>>,
) -> anyhow::Result<()> {
    let mut input = Input::open(input_path, config, schema.clone())?;
    let header = input.header()?;

    let file = File::create(output_path).with_context(|| format!("creating {}", output_path.display()))?;
    let mut output = Output::new(BufWriter::new(file), to, config, schema);
    output.write_header(header)?;

    while let Some(record) = input.next_record()? {
        output.write_record(&record)?;
    }
    let written = output.finish()?;

    report(input.errors());
    info!(records = written, "conversion complete");
    println!(
        "✅ {} -> {} ({} records)",
        input_path.display(),
        output_path.display(),
        written
    );
    Ok(())
}

fn report(errors: &ErrorList) {
    for record in errors.records() {
        println!("⚠️  {}", record);
    }
}

enum Input {
    Binary(BinaryReader<Cursor<Vec<u8>>>),
    Xml(XmlReader<Cursor<Vec<u8>>>),
}

impl Input {
    /// Open a document, detecting XML by its first non-blank byte
    fn open(path: &Path, config: &FnfConfig, schema: Option<Arc<Schema>>) -> anyhow::Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        if bytes.is_empty() {
            bail!("{} is empty", path.display());
        }
        let is_xml = bytes
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'<');

        let input = if is_xml {
            let reader = XmlReader::new(Cursor::new(bytes), config);
            Input::Xml(match schema {
                Some(schema) => reader.with_schema(schema),
                None => reader,
            })
        } else {
            let reader = BinaryReader::new(Cursor::new(bytes), config);
            Input::Binary(match schema {
                Some(schema) => reader.with_schema(schema),
                None => reader,
            })
        };
        Ok(input)
    }

    fn encoding_name(&self) -> &'static str {
        match self {
            Input::Binary(_) => "binary",
            Input::Xml(_) => "xml",
        }
    }

    fn header(&mut self) -> ipdr_fnf::Result<DocHeader> {
        match self {
            Input::Binary(r) => r.read_header().cloned(),
            Input::Xml(r) => r.read_header().cloned(),
        }
    }

    fn next_record(&mut self) -> ipdr_fnf::Result<Option<FnfData>> {
        match self {
            Input::Binary(r) => r.read_next(),
            Input::Xml(r) => r.read_next(),
        }
    }

    fn doc_end(&self) -> Option<&DocEnd> {
        match self {
            Input::Binary(r) => r.doc_end(),
            Input::Xml(r) => r.doc_end(),
        }
    }

    fn errors(&self) -> &ErrorList {
        match self {
            Input::Binary(r) => r.errors(),
            Input::Xml(r) => r.errors(),
        }
    }
}

enum Output {
    Binary(BinaryWriter<BufWriter<File>>),
    Xml(XmlWriter<BufWriter<File>>),
}

impl Output {
    fn new(sink: BufWriter<File>, encoding: Encoding, config: &FnfConfig, schema: Option<Arc<Schema>>) -> Self {
        match (encoding, schema) {
            (Encoding::Binary, Some(schema)) => Output::Binary(BinaryWriter::new(sink, config).with_schema(schema)),
            (Encoding::Binary, None) => Output::Binary(BinaryWriter::new(sink, config)),
            (Encoding::Xml, Some(schema)) => Output::Xml(XmlWriter::new(sink, config).with_schema(schema)),
            (Encoding::Xml, None) => Output::Xml(XmlWriter::new(sink, config)),
        }
    }

    fn write_header(&mut self, header: DocHeader) -> ipdr_fnf::Result<()> {
        match self {
            Output::Binary(w) => w.write_header(header),
            Output::Xml(w) => w.write_header(header),
        }
    }

    fn write_record(&mut self, record: &FnfData) -> ipdr_fnf::Result<()> {
        match self {
            Output::Binary(w) => w.write_record(record),
            Output::Xml(w) => w.write_record(record),
        }
    }

    /// Close the document and return the number of records written
    fn finish(self) -> ipdr_fnf::Result<u64> {
        match self {
            Output::Binary(w) => {
                let count = w.record_count();
                w.finish()?;
                Ok(count)
            }
            Output::Xml(w) => {
                let count = w.record_count();
                w.finish()?;
                Ok(count)
            }
        }
    }
}
