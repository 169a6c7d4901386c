use clap::{ArgAction, Parser as ClapParser, Subcommand, ValueEnum};
use remespath::{
    LoggerLevel, ParserOptions, PrettyStyle,
    cli::{self, CheckOptions, CheckResult, CliError, FormatOptions},
    to_json,
};
use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
};
use tracing::Level;

#[derive(ClapParser)]
#[command(name = "remes")]
#[command(about = "remes - lint, reformat and query JSON with RemesPath")]
#[command(version)]
struct Cli {
    /// Log more (-v debug, -vv trace); logs go to stderr
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Style {
    Google,
    Whitesmith,
    Pprint,
}

impl From<Style> for PrettyStyle {
    fn from(style: Style) -> Self {
        match style {
            Style::Google => PrettyStyle::Google,
            Style::Whitesmith => PrettyStyle::Whitesmith,
            Style::Pprint => PrettyStyle::PPrint,
        }
    }
}

/// Most lenient syntax accepted without complaint
#[derive(Clone, Copy, ValueEnum)]
enum Tier {
    Strict,
    Ok,
    NanInf,
    Jsonc,
    Json5,
}

impl From<Tier> for LoggerLevel {
    fn from(level: Tier) -> Self {
        match level {
            Tier::Strict => LoggerLevel::Strict,
            Tier::Ok => LoggerLevel::Ok,
            Tier::NanInf => LoggerLevel::NanInf,
            Tier::Jsonc => LoggerLevel::Jsonc,
            Tier::Json5 => LoggerLevel::Json5,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a RemesPath query against a JSON document
    Query {
        /// The RemesPath query to execute
        query: String,

        /// JSON file (reads --input or stdin if not provided)
        file: Option<PathBuf>,

        /// JSON input text
        #[arg(short, long)]
        input: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Only compile the query, don't execute
        #[arg(long)]
        syntax_only: bool,

        /// Read input with a strict JSON reader
        #[arg(long)]
        strict: bool,

        /// Seed for rand() and randint()
        #[arg(long)]
        seed: Option<u64>,

        /// Accept every recoverable deviation from strict JSON
        #[arg(long)]
        lenient: bool,

        /// Turn date-like strings into dates
        #[arg(long)]
        dates: bool,
    },

    /// List every deviation from strict JSON in a document
    Lint {
        /// JSON file (reads --input or stdin if not provided)
        file: Option<PathBuf>,

        /// JSON input text
        #[arg(short, long)]
        input: Option<String>,

        /// Deviations at or below this level are not reported
        #[arg(long, value_enum, default_value = "strict")]
        level: Tier,

        /// Treat the input as JSON Lines
        #[arg(long)]
        lines: bool,

        /// Print the lints as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Reprint a (possibly non-standard) JSON document as JSON
    Format {
        /// JSON file (reads --input or stdin if not provided)
        file: Option<PathBuf>,

        /// JSON input text
        #[arg(short, long)]
        input: Option<String>,

        #[arg(long, default_value_t = 4)]
        indent: usize,

        #[arg(long)]
        sort_keys: bool,

        #[arg(long, value_enum, default_value = "google")]
        style: Style,

        /// Print on one line
        #[arg(short, long)]
        compact: bool,

        /// Treat the input as JSON Lines
        #[arg(long)]
        lines: bool,

        /// Accept every recoverable deviation from strict JSON
        #[arg(long)]
        lenient: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let result = match cli.command {
        Commands::Query {
            query,
            file,
            input,
            pretty,
            syntax_only,
            strict,
            seed,
            lenient,
            dates,
        } => read_source(file, input).and_then(|input| {
            run_query(CheckOptions {
                query,
                input,
                pretty,
                syntax_only,
                strict,
                seed,
                parser: parser_options(lenient).with_parse_dates(dates),
            })
        }),
        Commands::Lint {
            file,
            input,
            level,
            lines,
            json,
        } => run_lint(file, input, level.into(), lines, json),
        Commands::Format {
            file,
            input,
            indent,
            sort_keys,
            style,
            compact,
            lines,
            lenient,
        } => read_source(file, input).and_then(|text| {
            let text = text.ok_or(CliError::NoInput)?;
            let options = FormatOptions {
                indent,
                sort_keys,
                style: style.into(),
                compact,
                json_lines: lines,
                parser: parser_options(lenient),
            };
            println!("{}", cli::execute_format(&text, &options)?);
            Ok(())
        }),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn parser_options(lenient: bool) -> ParserOptions {
    if lenient {
        ParserOptions::lenient()
    } else {
        ParserOptions::default()
    }
}

/// Input text from a file, from `--input`, or from piped stdin.
fn read_source(file: Option<PathBuf>, input: Option<String>) -> Result<Option<String>, CliError> {
    if let Some(path) = file {
        return Ok(Some(fs::read_to_string(path)?));
    }
    match input {
        Some(s) => Ok(Some(s)),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(Some(buffer))
        }
        None => Ok(None),
    }
}

fn run_query(options: CheckOptions) -> Result<(), CliError> {
    match cli::execute_check(&options)? {
        CheckResult::SyntaxValid => println!("Syntax is valid"),
        CheckResult::Success(output) => println!("{}", output),
    }
    Ok(())
}

fn run_lint(
    file: Option<PathBuf>,
    input: Option<String>,
    level: LoggerLevel,
    lines: bool,
    json: bool,
) -> Result<(), CliError> {
    let text = read_source(file, input)?.ok_or(CliError::NoInput)?;
    let options = ParserOptions::default().with_logger_level(level);
    let report = cli::execute_lint(&text, &options, lines);
    if json {
        println!("{}", to_json(&report.to_node()));
    } else {
        println!("{}", report);
    }
    if report.exited_early {
        std::process::exit(2);
    }
    Ok(())
}
