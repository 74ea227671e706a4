//! sift CLI: driving adapter for the sift selector engine.
//!
//! Subcommands:
//! - `check <selector>`: validate a selector config loads and compiles
//! - `attrs <rule>`: print the attributes a rule reads
//! - `explain <rule> --tag div --attr key=value...`: trace a rule against one node
//! - `run <selector> <script>`: replay a scripted document and print open/close lines
//! - `info`: print the registered predicate and transform names

use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

use clap::{Parser, Subcommand};
use sift::{CompiledRule, Pipeline, Runtime, SelectorConfig};
use sift_test::fixture::{builtin_registry, Script};
use sift_test::{Recorder, TestDocument, TestNode};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sift", version, about = "Live selectors over a mutating tree")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log pipeline activity (`DebugTap` steps included)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a selector config (.json, .yaml or .yml)
    Check {
        /// Path to the selector config
        selector: PathBuf,
    },

    /// Print the attributes a rule depends on
    Attrs {
        /// Rule text, e.g. ".foo[data-y]"
        rule: String,
    },

    /// Evaluate a rule against one detached node and print the trace
    Explain {
        /// Rule text
        rule: String,

        /// Tag name of the node
        #[arg(long, default_value = "div")]
        tag: String,

        /// Attributes of the node
        #[arg(long = "attr", value_parser = parse_pair)]
        attributes: Vec<(String, String)>,
    },

    /// Replay a document script through a selector
    Run {
        /// Path to the selector config
        selector: PathBuf,

        /// Path to the YAML script (`document` plus `batches`)
        script: PathBuf,
    },

    /// Print registered function names
    Info,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Check { selector } => cmd_check(&selector),
        Commands::Attrs { rule } => cmd_attrs(&rule),
        Commands::Explain {
            rule,
            tag,
            attributes,
        } => cmd_explain(&rule, &tag, &attributes),
        Commands::Run { selector, script } => cmd_run(&selector, &script),
        Commands::Info => {
            cmd_info();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Commands
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_check(path: &Path) -> Result<(), String> {
    let pipeline = load_pipeline(path)?;
    println!("Selector valid ({} steps)", pipeline.len());
    Ok(())
}

fn cmd_attrs(rule: &str) -> Result<(), String> {
    let rule = CompiledRule::<TestNode>::compile(rule).map_err(|e| e.to_string())?;
    if rule.relevant_attributes().is_empty() {
        println!("(no attributes)");
    }
    for name in rule.relevant_attributes() {
        println!("{name}");
    }
    Ok(())
}

fn cmd_explain(rule: &str, tag: &str, attributes: &[(String, String)]) -> Result<(), String> {
    let rule = CompiledRule::<TestNode>::compile(rule).map_err(|e| e.to_string())?;
    let doc = TestDocument::new("body");
    let node = doc.create_element(tag);
    for (name, value) in attributes {
        doc.set_attribute(&node, name, value);
    }
    print!("{}", rule.explain(&node));
    Ok(())
}

fn cmd_run(selector: &Path, script: &Path) -> Result<(), String> {
    let pipeline = load_pipeline(selector)?;
    let script = Script::from_yaml(&read(script)?).map_err(|e| e.to_string())?;

    let doc = Rc::new(script.document.to_document());
    let runtime = Runtime::new(Rc::clone(&doc));
    let recorder = Recorder::record(&pipeline.select(&runtime, doc.root()));
    print_lines("initial", &recorder.take());

    for (index, batch) in script.batches.iter().enumerate() {
        for mutation in &batch.mutations {
            mutation.apply(&doc).map_err(|e| e.to_string())?;
        }
        doc.flush();
        print_lines(&format!("batch {index}"), &recorder.take());
    }
    Ok(())
}

fn cmd_info() {
    let registry = builtin_registry();

    println!("Registered predicates:");
    for name in registry.predicate_names() {
        println!("  {name}");
    }

    println!("\nRegistered transforms:");
    for name in registry.transform_names() {
        println!("  {name}");
    }
}

fn print_lines(heading: &str, lines: &[String]) {
    println!("{heading}:");
    for line in lines {
        println!("  {line}");
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Config loading
// ═══════════════════════════════════════════════════════════════════════════════

fn read(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("failed to read \"{}\": {e}", path.display()))
}

fn load_pipeline(path: &Path) -> Result<Pipeline<TestDocument>, String> {
    let config = parse_selector(path, &read(path)?)?;
    builtin_registry()
        .load_pipeline::<TestDocument>(&config)
        .map_err(|e| format!("selector invalid: {e}"))
}

fn parse_selector(path: &Path, content: &str) -> Result<SelectorConfig, String> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(content).map_err(|e| format!("JSON parse error: {e}"))
    } else {
        serde_yaml::from_str(content).map_err(|e| format!("YAML parse error: {e}"))
    }
}

fn parse_pair(pair: &str) -> Result<(String, String), String> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| format!("invalid attribute \"{pair}\", expected name=value"))?;
    Ok((key.to_owned(), value.to_owned()))
}
