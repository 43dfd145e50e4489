use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use serde_json::json;
use tracing::{debug, info};
use xtql_parser::{compile_bytes, CompileError, CompileOptions, ParseError};

#[derive(Parser, Debug)]
#[command(name = "xtql-json")]
#[command(about = "Compile an XTQL query to its JSON form")]
#[command(version)]
struct Args {
    /// Query file (reads stdin when omitted)
    path: Option<PathBuf>,

    /// Print single-line JSON instead of indented
    #[arg(long)]
    compact: bool,

    /// How parse errors are reported on stderr
    #[arg(long, value_enum, default_value_t = ErrorFormat::Text)]
    error_format: ErrorFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorFormat {
    Text,
    Json,
}

const EXIT_PARSE: u8 = 1;
const EXIT_IO: u8 = 2;

fn main() -> ExitCode {
    let args = Args::parse();
    xtql_parser::logging::init_with_filter(&args.log_level);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("xtql-json: {}", e);
            ExitCode::from(EXIT_IO)
        }
    }
}

fn run(args: &Args) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let source = source_name(args);
    let input = read_input(args.path.as_ref())?;
    debug!(source = %source, bytes = input.len(), "read query");

    match compile_bytes(&input, &CompileOptions::default()) {
        Ok(doc) => {
            if args.compact {
                println!("{}", doc.to_json_string());
            } else {
                println!("{}", doc.to_pretty_string());
            }
            info!(source = %source, "compiled");
            Ok(ExitCode::SUCCESS)
        }
        Err(CompileError::Parse(e)) => {
            eprintln!("{}", render_parse_error(&source, &e, args.error_format));
            Ok(ExitCode::from(EXIT_PARSE))
        }
        Err(e) => Err(e.into()),
    }
}

fn source_name(args: &Args) -> String {
    args.path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<stdin>".to_string())
}

fn read_input(path: Option<&PathBuf>) -> io::Result<Vec<u8>> {
    match path {
        Some(path) => fs::read(path),
        None => {
            let mut buf = Vec::new();
            io::stdin().lock().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

fn render_parse_error(source: &str, error: &ParseError, format: ErrorFormat) -> String {
    match format {
        ErrorFormat::Text => format!(
            "{}:{}:{}: {}: {}",
            source, error.position.line, error.position.column, error.kind, error.message
        ),
        ErrorFormat::Json => json!({ "source": source, "error": error }).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_error(input: &str) -> ParseError {
        xtql_parser::compile(input).unwrap_err()
    }

    #[test]
    fn test_text_diagnostic() {
        let err = parse_error("(from :users\n  [name)");
        assert_eq!(
            render_parse_error("q.edn", &err, ErrorFormat::Text),
            format!("q.edn:2:8: unbalanced delimiter: {}", err.message)
        );
    }

    #[test]
    fn test_json_diagnostic() {
        let err = parse_error("");
        let rendered: serde_json::Value =
            serde_json::from_str(&render_parse_error("<stdin>", &err, ErrorFormat::Json)).unwrap();
        assert_eq!(rendered["source"], "<stdin>");
        assert_eq!(rendered["error"]["kind"], "empty_query");
        assert_eq!(rendered["error"]["position"]["line"], 1);
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "xtql-json",
            "q.edn",
            "--compact",
            "--error-format",
            "json",
        ])
        .unwrap();
        assert_eq!(args.path, Some(PathBuf::from("q.edn")));
        assert!(args.compact);
        assert_eq!(args.error_format, ErrorFormat::Json);
        assert_eq!(source_name(&args), "q.edn");
    }

    #[test]
    fn test_stdin_default() {
        let args = Args::try_parse_from(["xtql-json"]).unwrap();
        assert_eq!(source_name(&args), "<stdin>");
        assert_eq!(args.error_format, ErrorFormat::Text);
    }
}
