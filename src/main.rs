//! Purpose: `brokeradm` CLI entry point.
//! Role: Binary crate root; parses args, builds the management client, emits JSON on stdout.
//! Invariants: Commands emit pretty JSON on a tty and compact JSON otherwise.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Credentials never reach stdout, stderr, or logs.
#![allow(clippy::result_large_err)]
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod color_json;
mod command_dispatch;

use brokeradm::api::{
    CodecOptions, DynamicMap, DynamicValue, Error, ErrorKind, ManagementClient, codec,
    to_exit_code,
};
use color_json::colorize_json;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing();
    let color_mode = cli.color;
    command_dispatch::dispatch_command(cli.command, &cli.connection, color_mode)
        .map_err(add_connection_hint)
        .map_err(|err| (err, color_mode))
}

fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let replacement = arg.to_str().and_then(|value| match value {
                "---help" => Some("--help"),
                "---version" => Some("--version"),
                _ => None,
            });
            replacement.map(OsString::from).unwrap_or_else(|| arg)
        })
        .collect()
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "brokeradm",
    version,
    about = "Inspect and configure a message broker through its management HTTP API",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Responses are JSON. Argument tables and policy definitions keep the broker's
key order and integer types; date-time strings are normalized to RFC 3339.
"#,
    after_help = r#"EXAMPLES
  $ brokeradm overview
  $ brokeradm queue list --vhost /
  $ brokeradm policy put / ha-all --pattern '^ha\.' --definition '{"ha-mode":"all"}'
  $ brokeradm get nodes rabbit@localhost

LEARN MORE
  $ brokeradm <command> --help"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics and pretty JSON output: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone, Debug)]
struct ConnectionArgs {
    #[arg(
        long,
        global = true,
        env = "BROKERADM_URL",
        default_value = "http://localhost:15672",
        help = "Management API base URL (a reverse-proxy path prefix is allowed)"
    )]
    url: String,
    #[arg(
        long,
        global = true,
        env = "BROKERADM_USER",
        default_value = "guest",
        help = "Basic-auth username"
    )]
    user: String,
    #[arg(
        long,
        global = true,
        env = "BROKERADM_PASSWORD",
        default_value = "guest",
        hide_env_values = true,
        hide_default_value = true,
        help = "Basic-auth password"
    )]
    password: String,
    #[arg(
        long,
        global = true,
        env = "BROKERADM_CA_FILE",
        value_hint = clap::ValueHint::FilePath,
        help = "PEM CA bundle used to verify an https management listener"
    )]
    ca_file: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        env = "BROKERADM_TIMEOUT_MS",
        default_value_t = 30_000,
        help = "Request timeout in milliseconds"
    )]
    timeout_ms: u64,
}

impl ConnectionArgs {
    fn client(&self) -> Result<ManagementClient, Error> {
        if self.timeout_ms == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("--timeout-ms must be greater than zero"));
        }
        let mut client = ManagementClient::new(self.url.clone())?
            .with_credentials(&self.user, &self.password)?
            .with_timeout(Duration::from_millis(self.timeout_ms));
        if let Some(ca_file) = &self.ca_file {
            client = client.with_tls_ca_file(ca_file)?;
        }
        Ok(client)
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Show cluster versions, totals, listeners and contexts")]
    Overview,
    #[command(about = "List virtual hosts")]
    Vhosts,
    #[command(
        arg_required_else_help = true,
        about = "List, inspect, declare and delete queues"
    )]
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },
    #[command(
        arg_required_else_help = true,
        about = "List, inspect, declare and delete exchanges"
    )]
    Exchange {
        #[command(subcommand)]
        command: ExchangeCommand,
    },
    #[command(about = "List bindings")]
    Bindings {
        #[arg(long, help = "Only bindings in this vhost")]
        vhost: Option<String>,
    },
    #[command(
        arg_required_else_help = true,
        about = "List, inspect, set and delete policies"
    )]
    Policy {
        #[command(subcommand)]
        command: PolicyCommand,
    },
    #[command(
        arg_required_else_help = true,
        about = "GET any endpoint below /api and print it as dynamic JSON",
        long_about = r#"GET any endpoint below /api and print it as dynamic JSON.

Each path segment is a separate argument and is percent-encoded on its own,
so the default vhost is written as a bare `/`."#,
        after_help = r#"EXAMPLES
  $ brokeradm get nodes
  $ brokeradm get queues / orders
  $ brokeradm get exchanges / amq.direct bindings source"#
    )]
    Get {
        #[arg(required = true, num_args = 1.., help = "Path segments below /api")]
        segments: Vec<String>,
    },
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completion scripts",
        after_help = r#"EXAMPLES
  $ brokeradm completions bash > ~/.local/share/bash-completion/completions/brokeradm
  $ brokeradm completions zsh > ~/.zfunc/_brokeradm
  $ brokeradm completions fish > ~/.config/fish/completions/brokeradm.fish"#
    )]
    Completions {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum QueueCommand {
    #[command(about = "List queues")]
    List {
        #[arg(long, help = "Only queues in this vhost")]
        vhost: Option<String>,
    },
    #[command(about = "Show one queue")]
    Get { vhost: String, name: String },
    #[command(about = "Declare a queue")]
    Declare {
        vhost: String,
        name: String,
        #[arg(long, help = "Declare a non-durable queue")]
        transient: bool,
        #[arg(long, help = "Delete the queue when its last consumer goes away")]
        auto_delete: bool,
        #[arg(long, value_name = "JSON", help = "Queue arguments as a JSON object")]
        arguments: Option<String>,
    },
    #[command(about = "Delete a queue")]
    Delete { vhost: String, name: String },
}

#[derive(Subcommand)]
enum ExchangeCommand {
    #[command(about = "List exchanges")]
    List {
        #[arg(long, help = "Only exchanges in this vhost")]
        vhost: Option<String>,
    },
    #[command(about = "Show one exchange")]
    Get { vhost: String, name: String },
    #[command(about = "Declare an exchange")]
    Declare {
        vhost: String,
        name: String,
        #[arg(long = "type", default_value = "direct", help = "Exchange type")]
        kind: String,
        #[arg(long, help = "Declare a non-durable exchange")]
        transient: bool,
        #[arg(long, help = "Delete the exchange when its last binding goes away")]
        auto_delete: bool,
        #[arg(long, help = "Reject direct publishes")]
        internal: bool,
        #[arg(long, value_name = "JSON", help = "Exchange arguments as a JSON object")]
        arguments: Option<String>,
    },
    #[command(about = "Delete an exchange")]
    Delete { vhost: String, name: String },
}

#[derive(Subcommand)]
enum PolicyCommand {
    #[command(about = "List policies")]
    List {
        #[arg(long, help = "Only policies in this vhost")]
        vhost: Option<String>,
    },
    #[command(about = "Show one policy")]
    Get { vhost: String, name: String },
    #[command(about = "Create or replace a policy")]
    Put {
        vhost: String,
        name: String,
        #[arg(long, help = "Regular expression matched against queue/exchange names")]
        pattern: String,
        #[arg(long, value_name = "JSON", help = "Policy definition as a JSON object")]
        definition: String,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        priority: i64,
        #[arg(long, default_value = "all", help = "queues|exchanges|all")]
        apply_to: String,
    },
    #[command(about = "Delete a policy")]
    Delete { vhost: String, name: String },
}

/// Parses a CLI JSON argument that must be an object, through the dynamic bridge.
fn parse_object_arg(flag: &str, text: &str) -> Result<DynamicMap, Error> {
    let value = codec::from_str(text).map_err(|err| {
        let kind = match err.kind() {
            ErrorKind::Decode => ErrorKind::Usage,
            other => other,
        };
        let mut mapped = Error::new(kind)
            .with_message(format!("invalid json for {flag}"))
            .with_hint(format!("Provide a JSON object, for example {flag} '{{\"x-max-length\":10}}'."));
        if let Some(path) = err.path() {
            mapped = mapped.with_path(path);
        }
        mapped.with_source(err)
    })?;
    match value {
        DynamicValue::Object(map) => Ok(map),
        other => Err(Error::new(ErrorKind::Usage)
            .with_message(format!("{flag} must be a JSON object, got {}", other.kind()))),
    }
}

fn to_dynamic<T: Serialize>(value: &T) -> Result<DynamicValue, Error> {
    let json = serde_json::to_value(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode output json")
            .with_source(err)
    })?;
    // Typed fields are already type-directed; only `get` output is read as dynamic JSON.
    codec::from_json_with(&json, CodecOptions::new().with_timestamp_promotion(false))
}

fn emit_json(value: &DynamicValue, color_mode: ColorMode) -> Result<(), Error> {
    let is_tty = io::stdout().is_terminal();
    let use_color = color_mode.use_color(is_tty);
    let pretty = is_tty || use_color;
    let json = if pretty {
        if use_color {
            colorize_json(value, true)?
        } else {
            codec::to_string_pretty(value)?
        }
    } else {
        codec::to_string(value)?
    };
    println!("{json}");
    Ok(())
}

fn emit_ack(action: &str, vhost: &str, name: &str, color_mode: ColorMode) -> Result<(), Error> {
    let ack: DynamicValue = [
        ("ok", DynamicValue::from(true)),
        ("action", DynamicValue::from(action)),
        ("vhost", DynamicValue::from(vhost)),
        ("name", DynamicValue::from(name)),
    ]
    .into_iter()
    .collect();
    emit_json(&ack, color_mode)
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn add_connection_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Io if err.status().is_none() => err.with_hint(
            "Check --url (or BROKERADM_URL) and that the management plugin is enabled.",
        ),
        ErrorKind::Permission => {
            err.with_hint("Check --user/--password (or BROKERADM_USER/BROKERADM_PASSWORD).")
        }
        _ => err,
    }
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Conflict => "conflict".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Remote => "broker error".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::Decode => "invalid json".to_string(),
        ErrorKind::UnsupportedNode => "unsupported json node".to_string(),
        ErrorKind::DuplicateKey => "duplicate object key".to_string(),
        ErrorKind::TooDeep => "json nesting too deep".to_string(),
        ErrorKind::Unrepresentable => "value has no json form".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path));
    }
    if let Some(depth) = err.depth() {
        inner.insert("depth".to_string(), json!(depth));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {path}",
            colorize_label("path:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(status) = err.status() {
        lines.push(format!(
            "{} {status}",
            colorize_label("status:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `brokeradm --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "brokeradm") else {
        return "Try `brokeradm --help`.".to_string();
    };

    let mut parts = Vec::new();
    for token in tokens.iter().skip(pos + 1) {
        if token.starts_with('-') || token.starts_with('<') || token.starts_with('[') {
            break;
        }
        parts.push(*token);
    }

    if parts.is_empty() {
        return "Try `brokeradm --help`.".to_string();
    }
    format!("Try `brokeradm {} --help`.", parts.join(" "))
}
