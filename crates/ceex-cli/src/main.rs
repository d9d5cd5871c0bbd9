use std::io::Write;
use std::path::Path;

use ceex_codegen::{compile, Assigns, CompileOptions, Components};
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[derive(Parser)]
#[command(name = "ceex")]
#[command(about = "CEEx: HTML-aware template compiler")]
#[command(version)]
struct Cli {
    /// Log compiler activity to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a template and render it to stdout
    Render {
        /// Input template file
        path: String,

        /// Assigns as inline JSON, or `@file.json`
        #[arg(short, long)]
        assigns: Option<String>,

        /// Register a template file as a component: `name=path`
        #[arg(short, long = "component", value_name = "NAME=PATH")]
        components: Vec<String>,

        #[command(flatten)]
        origin: Origin,
    },

    /// Check a template for syntax errors without rendering it
    Check {
        /// Input template file
        path: String,

        #[command(flatten)]
        origin: Origin,
    },
}

/// Where the template starts in its file, for diagnostics.
#[derive(Args)]
struct Origin {
    /// Line number of the first template line
    #[arg(long, default_value_t = 1)]
    line: usize,

    /// Columns the template is indented by
    #[arg(long, default_value_t = 0)]
    indent: usize,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Render {
            path,
            assigns,
            components,
            origin,
        } => cmd_render(&path, assigns.as_deref(), &components, &origin),
        Command::Check { path, origin } => cmd_check(&path, &origin),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter);
    tracing_subscriber::registry().with(layer).init();
}

fn read_source(path: &str) -> String {
    let p = Path::new(path);
    if !p.exists() {
        eprintln!("Error: file not found: {path}");
        std::process::exit(1);
    }
    match std::fs::read_to_string(p) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {path}: {e}");
            std::process::exit(1);
        }
    }
}

fn options(path: &str, origin: &Origin) -> CompileOptions {
    CompileOptions::new(path)
        .line(origin.line)
        .indentation(origin.indent)
}

fn parse_assigns(arg: Option<&str>) -> Assigns {
    let Some(arg) = arg else {
        return Assigns::new();
    };
    let json = match arg.strip_prefix('@') {
        Some(path) => read_source(path),
        None => arg.to_string(),
    };
    match serde_json::from_str(&json) {
        Ok(assigns) => assigns,
        Err(e) => {
            eprintln!("Error: invalid assigns: {e}");
            std::process::exit(1);
        }
    }
}

/// Compile each `name=path` in order. A component can call the ones listed before it.
fn load_components(specs: &[String]) -> Components {
    let mut components = Components::new();
    for spec in specs {
        let Some((name, path)) = spec.split_once('=') else {
            eprintln!("Error: expected NAME=PATH for --component, got: {spec}");
            std::process::exit(1);
        };
        let source = read_source(path);
        let options = CompileOptions::new(path).components(components.clone());
        match compile(&source, &options) {
            Ok(template) => {
                debug!(component = name, path, "registered component");
                components.register(name, template);
            }
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
    }
    components
}

fn cmd_render(path: &str, assigns: Option<&str>, components: &[String], origin: &Origin) {
    let source = read_source(path);
    let assigns = parse_assigns(assigns);
    let options = options(path, origin).components(load_components(components));

    let template = match compile(&source, &options) {
        Ok(template) => template,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    match template.render(assigns) {
        Ok(output) => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = write!(stdout, "{output}").and_then(|_| stdout.flush()) {
                eprintln!("Error writing output: {e}");
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Render error: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_check(path: &str, origin: &Origin) {
    let source = read_source(path);

    if let Err(e) = compile(&source, &options(path, origin)) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    eprintln!("OK: {path}");
}
