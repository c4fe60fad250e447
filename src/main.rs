mod debug_report;

use std::io::{self, IsTerminal};
use std::sync::Arc;
use templar::{Document, Options, Stylesheet, TaskMode, apply_with};
use tracing_subscriber::EnvFilter;

const LOG_VAR: &str = "TEMPLAR_LOG";

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_VAR).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let sheet = match Stylesheet::compile(build_stylesheet(&config.rules)) {
        Ok(sheet) => Arc::new(sheet),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };

    let steps: Vec<&str> = config.path.split('/').filter(|s| !s.is_empty()).collect();
    let mut source = Document::new();
    source.path_chain(&steps);

    match apply_with(Arc::clone(&sheet), Arc::new(source), &config.options) {
        Ok(run) => debug_report::print_run(&config.path, &sheet, &run, &config.options, config.color),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

struct RuleArg {
    pattern: String,
    mode: Option<String>,
}

struct CliConfig {
    rules: Vec<RuleArg>,
    path: String,
    options: Options,
    color: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut rules = Vec::new();
    let mut path: Option<String> = None;
    let mut options = Options::from_env().map_err(|err| format!("error: {err}"))?;
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("templar {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--rule" | "-r" => {
                let value = args.next().ok_or_else(|| "error: --rule expects a value".to_string())?;
                rules.push(parse_rule(&value)?);
            }
            "--path" | "-p" => {
                let value = args.next().ok_or_else(|| "error: --path expects a value".to_string())?;
                if path.is_some() {
                    return Err("error: path provided multiple times".to_string());
                }
                path = Some(value);
            }
            "--mode" => {
                let value = args.next().ok_or_else(|| "error: --mode expects a value".to_string())?;
                options.mode = Some(value);
            }
            "--threads" => {
                let value = args.next().ok_or_else(|| "error: --threads expects a value".to_string())?;
                options.threads = value.parse().map_err(|_| format!("error: invalid --threads '{value}'"))?;
            }
            "--task-mode" => {
                let value = args.next().ok_or_else(|| "error: --task-mode expects a value".to_string())?;
                options.task_mode =
                    value.parse::<TaskMode>().map_err(|_| format!("error: invalid --task-mode '{value}'"))?;
            }
            _ if arg.starts_with("--rule=") => rules.push(parse_rule(arg.trim_start_matches("--rule="))?),
            _ if arg.starts_with("--path=") => {
                if path.is_some() {
                    return Err("error: path provided multiple times".to_string());
                }
                path = Some(arg.trim_start_matches("--path=").to_string());
            }
            _ => return Err(format!("error: unknown option '{arg}'")),
        }
    }

    let Some(path) = path else {
        return Err(format!("error: no path provided\n\n{}", help_text()));
    };
    if rules.is_empty() {
        return Err(format!("error: no rules provided\n\n{}", help_text()));
    }

    Ok(CliConfig { rules, path, options, color })
}

/// `PATTERN[@MODE]`. An `@` inside a predicate belongs to the pattern.
fn parse_rule(value: &str) -> Result<RuleArg, String> {
    let (pattern, mode) = match value.rfind('@') {
        Some(idx) if !value[idx..].contains(']') => (&value[..idx], Some(value[idx + 1..].to_string())),
        _ => (value, None),
    };
    if pattern.trim().is_empty() {
        return Err(format!("error: invalid --rule '{value}'"));
    }
    Ok(RuleArg { pattern: pattern.to_string(), mode: mode.filter(|m| !m.is_empty()) })
}

/// One template per rule; each body continues the walk in the rule's mode.
fn build_stylesheet(rules: &[RuleArg]) -> Document {
    let mut doc = Document::new();
    let top = doc.append_element(doc.root(), "xsl:stylesheet");
    for rule in rules {
        let template = doc.append_element(top, "xsl:template");
        doc.set_attribute(template, "match", &rule.pattern);
        let apply = doc.append_element(template, "xsl:apply-templates");
        if let Some(mode) = &rule.mode {
            doc.set_attribute(template, "mode", mode);
            doc.set_attribute(apply, "mode", mode);
        }
    }
    doc
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "templar {version}

Template-rule dispatch CLI: selects the winning template for every node of a
path-shaped document and schedules the template bodies.

Usage:
  templar --rule <pattern[@mode]>... --path <a/b/c> [OPTIONS]

Options:
  -r, --rule <pattern[@mode]>  Register a template. Repeatable.
  -p, --path <a/b/c>           Element chain to build under the document root.
  --mode <mode>                Mode used for the root. Default: none.
  --threads <n>                Worker threads (0 runs inline).
                               Env: {threads_var}
  --task-mode <mode>           single | default | deny.
                               Env: {task_mode_var}
  --color                      Force ANSI color output.
  --no-color                   Disable ANSI color output.
  -h, --help                   Show this help message.
  -V, --version                Print version information.

Environment:
  {parallel_var}             Comma-separated instructions that fork by default.
  {log_var}                  Log filter, e.g. templar=debug.

Exit codes:
  0  Success.
  1  Internal error.
  2  Invalid arguments or rules.
",
        version = env!("CARGO_PKG_VERSION"),
        threads_var = templar::THREADS_VAR,
        task_mode_var = templar::TASK_MODE_VAR,
        parallel_var = templar::PARALLEL_VAR,
        log_var = LOG_VAR,
    )
}
