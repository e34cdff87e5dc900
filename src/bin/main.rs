//! Quarry CLI - load files into a warehouse and query them
//!
//! Usage:
//!   quarry preview <file> [--rows <n>]
//!   quarry render <spec.json> [--dialect <dialect>]
//!   quarry ingest <file> --database <db> --schema <schema> [--table <name>] [--mode <mode>]
//!   quarry query [<sql>] [--spec <spec.json>] [--export csv|tsv|json]
//!   quarry tables --database <db> --schema <schema>
//!   quarry describe <table> [--database <db>] [--schema <schema>] [--json]
//!
//! `ingest`, `query`, `tables` and `describe` need the `duckdb-backend` feature.
//!
//! Examples:
//!   quarry preview data/orders.csv --delimiter ';'
//!   quarry render spec.json --dialect duckdb
//!   quarry ingest data/orders.csv --database memory --schema raw --mode append

use clap::{Parser, Subcommand, ValueEnum};
use quarry::config::Settings;
use quarry::ingest::{normalize, FileUpload, TextEncoding};
use quarry::query::{render, QuerySpec};
use quarry::sql::Dialect;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Quarry - load files into a SQL warehouse and query them")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $QUARRY_CONFIG or ./quarry.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the inferred schema and first rows of a file
    Preview {
        /// File to read; the format comes from its extension
        file: PathBuf,

        /// Rows to show
        #[arg(short, long, default_value_t = 10)]
        rows: usize,

        #[command(flatten)]
        format: FormatArgs,
    },

    /// Render a JSON query spec to SQL
    Render {
        /// Path to the spec
        spec: PathBuf,

        /// SQL dialect to generate (defaults to the configured one)
        #[arg(short, long)]
        dialect: Option<DialectArg>,
    },

    /// Load a file into a table
    Ingest {
        file: PathBuf,

        #[arg(long)]
        database: Option<String>,

        #[arg(long)]
        schema: Option<String>,

        /// Table name (defaults to the upper-cased file stem)
        #[arg(long)]
        table: Option<String>,

        #[arg(long, default_value = "create-new")]
        mode: String,

        #[command(flatten)]
        format: FormatArgs,
    },

    /// Run SQL text or a query spec
    Query {
        /// SQL to run as typed
        #[arg(conflicts_with = "spec", required_unless_present = "spec")]
        sql: Option<String>,

        /// Query spec to render and run
        #[arg(long)]
        spec: Option<PathBuf>,

        /// Write the result as csv, tsv or json instead of a table
        #[arg(long)]
        export: Option<ExportArg>,

        /// Export destination (defaults to stdout)
        #[arg(short, long, requires = "export")]
        output: Option<PathBuf>,
    },

    /// List tables in a schema
    Tables {
        #[arg(long)]
        database: Option<String>,

        #[arg(long)]
        schema: Option<String>,

        /// Include temporary tables
        #[arg(long)]
        all: bool,
    },

    /// Show a table's columns with descriptions and sample values
    Describe {
        table: String,

        #[arg(long)]
        database: Option<String>,

        #[arg(long)]
        schema: Option<String>,

        /// Print the overview as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct FormatArgs {
    /// Field delimiter for csv/tsv
    #[arg(long)]
    delimiter: Option<char>,

    /// Text encoding for csv/tsv (utf-8, shift-jis, cp932)
    #[arg(long)]
    encoding: Option<String>,

    /// The first row is data, not column names
    #[arg(long)]
    no_header: bool,
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Snowflake,
    Duckdb,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Snowflake => Dialect::Snowflake,
            DialectArg::Duckdb => Dialect::DuckDb,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportArg {
    Csv,
    Tsv,
    Json,
}

impl From<ExportArg> for quarry::export::ExportFormat {
    fn from(arg: ExportArg) -> Self {
        match arg {
            ExportArg::Csv => quarry::export::ExportFormat::Csv,
            ExportArg::Tsv => quarry::export::ExportFormat::Tsv,
            ExportArg::Json => quarry::export::ExportFormat::Json,
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse_lossy(std::env::var("QUARRY_LOG").unwrap_or_else(|_| "quarry=info".to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Preview { file, rows, format } => cmd_preview(&settings, &file, rows, &format),
        Commands::Render { spec, dialect } => cmd_render(&settings, &spec, dialect),
        Commands::Ingest {
            file,
            database,
            schema,
            table,
            mode,
            format,
        } => backend::cmd_ingest(&settings, &file, database, schema, table, &mode, &format),
        Commands::Query {
            sql,
            spec,
            export,
            output,
        } => backend::cmd_query(&settings, sql, spec, export, output),
        Commands::Tables {
            database,
            schema,
            all,
        } => backend::cmd_tables(&settings, database, schema, all),
        Commands::Describe {
            table,
            database,
            schema,
            json,
        } => backend::cmd_describe(&settings, table, database, schema, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Read a file and apply configured and command-line format options.
fn read_upload(settings: &Settings, file: &Path, args: &FormatArgs) -> quarry::Result<FileUpload> {
    let mut options = settings.format_options()?;
    if let Some(delimiter) = args.delimiter {
        let byte = u8::try_from(delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                quarry::QuarryError::unsupported_format("csv", format!("delimiter '{delimiter}' is not ASCII"))
            })?;
        options = options.with_delimiter(byte);
    }
    if let Some(encoding) = &args.encoding {
        options = options.with_encoding(encoding.parse::<TextEncoding>()?);
    }
    if args.no_header {
        options = options.without_header();
    }
    Ok(FileUpload::from_path(file)?.with_options(options))
}

fn cmd_preview(settings: &Settings, file: &Path, rows: usize, format: &FormatArgs) -> quarry::Result<()> {
    let upload = read_upload(settings, file, format)?;
    let batch = normalize(&upload)?;
    print!("{}", batch.preview(rows)?);
    Ok(())
}

fn cmd_render(settings: &Settings, path: &Path, dialect: Option<DialectArg>) -> quarry::Result<()> {
    let source = fs::read_to_string(path)?;
    let spec: QuerySpec = serde_json::from_str(&source).map_err(|e| {
        quarry::QuarryError::malformed(e.line(), format!("invalid query spec: {e}"))
    })?;
    let dialect = dialect.map(Dialect::from).unwrap_or(settings.warehouse.dialect);
    println!("{}", render(&spec, dialect));
    Ok(())
}

#[cfg(feature = "duckdb-backend")]
mod backend {
    use super::*;
    use quarry::export::export;
    use quarry::ingest::{ingest, TableTarget, WriteMode};
    use quarry::query::{describe_columns, SqlEditor};
    use quarry::warehouse::{DuckDbWarehouse, Warehouse};
    use quarry::{QuarryError, TableName};
    use std::fs::File;
    use std::io::{self, BufWriter};

    fn open(settings: &Settings) -> quarry::Result<DuckDbWarehouse> {
        let stage_dir = match settings.stage.resolved_dir()? {
            Some(dir) => dir,
            None => std::env::temp_dir().join(settings.stage.name.to_lowercase()),
        };
        match settings.warehouse.resolved_path()? {
            Some(path) => DuckDbWarehouse::open(path, stage_dir),
            None => DuckDbWarehouse::in_memory(stage_dir),
        }
    }

    /// Database and schema from the command line, the config, or the warehouse.
    fn location(
        settings: &Settings,
        warehouse: &DuckDbWarehouse,
        database: Option<String>,
        schema: Option<String>,
    ) -> quarry::Result<(String, String)> {
        let database = match database.or_else(|| settings.ingest.default_database.clone()) {
            Some(db) => db,
            None => warehouse.default_database()?,
        };
        let schema = schema
            .or_else(|| settings.ingest.default_schema.clone())
            .unwrap_or_else(|| "main".to_string());
        Ok((database, schema))
    }

    pub fn cmd_ingest(
        settings: &Settings,
        file: &Path,
        database: Option<String>,
        schema: Option<String>,
        table: Option<String>,
        mode: &str,
        format: &FormatArgs,
    ) -> quarry::Result<()> {
        let mode: WriteMode = mode
            .parse()
            .map_err(QuarryError::execution)?;
        let upload = read_upload(settings, file, format)?;
        let warehouse = open(settings)?;
        let (database, schema) = location(settings, &warehouse, database, schema)?;

        let target = match table {
            Some(table) => TableTarget::new(TableName::new(database, schema, table), mode),
            None => TableTarget::from_file_name(&database, &schema, &upload.name, mode),
        };
        let loaded = ingest(&upload, &target, &warehouse)?;
        println!("Loaded {}", loaded);
        Ok(())
    }

    pub fn cmd_query(
        settings: &Settings,
        sql: Option<String>,
        spec: Option<PathBuf>,
        export_as: Option<ExportArg>,
        output: Option<PathBuf>,
    ) -> quarry::Result<()> {
        let warehouse = open(settings)?;
        let result = match (sql, spec) {
            (_, Some(path)) => {
                let source = fs::read_to_string(&path)?;
                let mut spec: QuerySpec = serde_json::from_str(&source).map_err(|e| {
                    QuarryError::malformed(e.line(), format!("invalid query spec: {e}"))
                })?;
                if spec.limit.is_none() {
                    spec.set_limit(settings.query.default_limit);
                }
                let schema = warehouse
                    .describe_table(&spec.table)?
                    .ok_or_else(|| QuarryError::execution(format!("table {} does not exist", spec.table)))?;
                spec.validate(&schema)?;
                SqlEditor::new(&spec, warehouse.dialect()).execute(&warehouse)?
            }
            (Some(sql), None) => warehouse.execute(&sql)?,
            (None, None) => return Err(QuarryError::execution("nothing to run")),
        };

        match (export_as, output) {
            (Some(format), Some(path)) => export(&result, format.into(), BufWriter::new(File::create(path)?)),
            (Some(format), None) => export(&result, format.into(), io::stdout().lock()),
            (None, _) => {
                print!("{}", result);
                Ok(())
            }
        }
    }

    pub fn cmd_tables(
        settings: &Settings,
        database: Option<String>,
        schema: Option<String>,
        all: bool,
    ) -> quarry::Result<()> {
        let warehouse = open(settings)?;
        let (database, schema) = location(settings, &warehouse, database, schema)?;
        let tables = if all {
            warehouse.list_tables(&database, &schema)?
        } else {
            warehouse.list_user_tables(&database, &schema)?
        };
        for table in tables {
            println!("{}", table);
        }
        Ok(())
    }

    pub fn cmd_describe(
        settings: &Settings,
        table: String,
        database: Option<String>,
        schema: Option<String>,
        json: bool,
    ) -> quarry::Result<()> {
        let warehouse = open(settings)?;
        let (database, schema) = location(settings, &warehouse, database, schema)?;
        let name = TableName::new(database, schema, table);
        let schema = warehouse
            .describe_table(&name)?
            .ok_or_else(|| QuarryError::execution(format!("table {name} does not exist")))?;
        let overview = describe_columns(&warehouse, &schema);

        if json {
            serde_json::to_writer_pretty(io::stdout().lock(), &overview).map_err(io::Error::from)?;
            println!();
            return Ok(());
        }
        println!("{}", overview.table);
        if !overview.description.is_empty() {
            println!("{}", overview.description);
        }
        println!();
        for column in &overview.columns {
            println!(
                "{}\t{}\t{}\t{}",
                column.name,
                column.column_type,
                column.description,
                column.samples.join(", ")
            );
        }
        Ok(())
    }
}

#[cfg(not(feature = "duckdb-backend"))]
mod backend {
    use super::*;
    use quarry::QuarryError;

    fn unavailable() -> quarry::Result<()> {
        Err(QuarryError::execution(
            "no warehouse backend: rebuild with `--features duckdb-backend`",
        ))
    }

    pub fn cmd_ingest(
        _settings: &Settings,
        _file: &Path,
        _database: Option<String>,
        _schema: Option<String>,
        _table: Option<String>,
        _mode: &str,
        _format: &FormatArgs,
    ) -> quarry::Result<()> {
        unavailable()
    }

    pub fn cmd_query(
        _settings: &Settings,
        _sql: Option<String>,
        _spec: Option<PathBuf>,
        _export_as: Option<ExportArg>,
        _output: Option<PathBuf>,
    ) -> quarry::Result<()> {
        unavailable()
    }

    pub fn cmd_tables(
        _settings: &Settings,
        _database: Option<String>,
        _schema: Option<String>,
        _all: bool,
    ) -> quarry::Result<()> {
        unavailable()
    }

    pub fn cmd_describe(
        _settings: &Settings,
        _table: String,
        _database: Option<String>,
        _schema: Option<String>,
        _json: bool,
    ) -> quarry::Result<()> {
        unavailable()
    }
}
