use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use goaster::config::load_config;
use goaster::scanner::{package_dirs, ScanOptions};
use goaster::tools::snake_case;
use goaster::{Facade, LoadOptions, ObjKind, ObjKinds, Program, Scope, Tag, TypKind, TypKinds};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "goaster")]
#[command(version)]
#[command(about = "Query and rewrite the declarations of Go packages")]
struct Cli {
    /// Index declarations inside function bodies as well.
    #[arg(long, global = true)]
    locals: bool,

    /// Load `_test.go` files of each package.
    #[arg(long, global = true)]
    tests: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Args)]
struct Target {
    /// Package directories, a single .go file, or `dir/...` for every package below dir.
    #[arg(required = true, value_name = "PATHS")]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct Filter {
    /// Object kinds, e.g. `Typ` or `Fun,Var` (default: any)
    #[arg(long, value_parser = ObjKinds::parse_list, default_value = "*")]
    obj: ObjKinds,

    /// Type kinds, e.g. `Struct,Interface` (default: any)
    #[arg(long, value_parser = TypKinds::parse_list, default_value = "*")]
    typ: TypKinds,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List indexed declarations.
    Inspect {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        filter: Filter,
        /// Only declarations with this name.
        #[arg(long, default_value = "")]
        name: String,
        /// Emit JSON instead of one line per declaration.
        #[arg(long)]
        json: bool,
    },
    /// Print the formatted declarations with a given name.
    Lookup {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        filter: Filter,
        #[arg(long)]
        name: String,
    },
    /// Add `key:"snake_name,options"` to every exported struct field lacking the key.
    Tag {
        #[command(flatten)]
        target: Target,
        #[arg(long, default_value = "json")]
        key: String,
        /// Tag option, repeatable (e.g. --option omitempty)
        #[arg(long = "option")]
        options: Vec<String>,
        /// Rewrite files in place instead of printing them.
        #[arg(long)]
        write: bool,
    },
    /// Re-emit packages in gofmt style.
    Format {
        #[command(flatten)]
        target: Target,
        /// Rewrite files in place instead of printing them.
        #[arg(long)]
        write: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("GOASTER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb.set_message(msg.to_string());
    Ok(pb)
}

/// Expands `dir/...` patterns into package directories.
fn expand_paths(paths: &[PathBuf], opts: &LoadOptions) -> Result<Vec<PathBuf>> {
    let scan = ScanOptions::new(&opts.scan, opts.include_tests);
    let mut out = Vec::new();
    for p in paths {
        let text = p.to_string_lossy();
        match text.strip_suffix("...") {
            Some(root) => {
                let root = Path::new(root.trim_end_matches('/'));
                let root = if root.as_os_str().is_empty() { Path::new(".") } else { root };
                let dirs = package_dirs(root, &scan)
                    .with_context(|| format!("Failed to scan {}", root.display()))?;
                out.extend(dirs);
            }
            None => out.push(p.clone()),
        }
    }
    Ok(out)
}

fn load(target: &Target, opts: &LoadOptions) -> Result<Program> {
    if let [single] = target.paths.as_slice() {
        if single.is_file() {
            return Program::load_file_with(single, None, opts)
                .with_context(|| format!("Failed to load {}", single.display()));
        }
    }
    let dirs = expand_paths(&target.paths, opts)?;
    if let Some(file) = dirs.iter().find(|d| d.is_file()) {
        bail!("{} is a file; pass a single file or package directories", file.display());
    }

    let pb = spinner("loading packages...")?;
    let prog = Program::load_packages_with(&dirs, opts);
    match &prog {
        Ok(p) => pb.finish_with_message(format!("loaded {} packages", p.all_packages().len())),
        Err(_) => pb.finish_and_clear(),
    }
    prog.context("Failed to load packages")
}

fn created_scopes(prog: &Program) -> Vec<Scope> {
    prog.created_packages().map(|p| Scope::Package(p.id())).collect()
}

fn describe(f: &Facade<'_>) -> serde_json::Value {
    let methods: Vec<&str> = if f.obj_kind() == ObjKind::Typ {
        f.methods().map(|m| m.name()).collect()
    } else {
        Vec::new()
    };
    json!({
        "name": f.name(),
        "id": f.id(),
        "objKind": f.obj_kind(),
        "typKind": f.typ_kind(),
        "type": f.ty().to_string(),
        "exported": f.exported(),
        "local": f.is_local(),
        "position": f.position().map(|p| p.to_string()),
        "doc": f.doc(),
        "methods": methods,
    })
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let repo_root = std::env::current_dir().context("Failed to get current dir")?;
    let cfg = load_config(&repo_root);
    let mut opts = LoadOptions::from_config(&cfg);
    opts.local_declarations |= cli.locals;
    opts.include_tests |= cli.tests;

    match cli.cmd {
        Command::Inspect {
            target,
            filter,
            name,
            json,
        } => {
            let prog = load(&target, &opts)?;
            let mut found = Vec::new();
            for scope in created_scopes(&prog) {
                found.extend(prog.lookup_in(scope, filter.obj, filter.typ, &name));
            }
            if json {
                let out: Vec<_> = found.iter().map(describe).collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                for f in &found {
                    let at = f.position().map(|p| p.to_string()).unwrap_or_default();
                    let name = if f.name().is_empty() { "<anonymous>" } else { f.name() };
                    println!("{at}\t{}\t{}\t{name}", f.obj_kind(), f.typ_kind());
                }
            }
        }
        Command::Lookup { target, filter, name } => {
            let prog = load(&target, &opts)?;
            let found = prog.lookup(filter.obj, filter.typ, &name);
            if found.is_empty() {
                bail!("no declaration named {name:?}");
            }
            for f in found {
                println!("{f}\n");
            }
        }
        Command::Tag {
            target,
            key,
            options,
            write,
        } => {
            let mut prog = load(&target, &opts)?;
            let mut added = 0usize;
            let mut failures = Vec::new();
            for scope in created_scopes(&prog) {
                prog.inspect_mut(scope, |f| {
                    if f.obj_kind() != ObjKind::Typ || f.typ_kind() != TypKind::Struct {
                        return true;
                    }
                    for i in 0..f.num_fields() {
                        let mut field = f.field_mut(i);
                        if !field.exported() || field.embedded() || field.tags().get(&key).is_ok() {
                            continue;
                        }
                        let tag = Tag::new(key.as_str(), snake_case(field.name())).with_options(options.iter());
                        let set = field.tags_mut().set(tag);
                        match set {
                            Ok(()) => added += 1,
                            Err(e) => failures.push(format!("{}: {e}", field.name())),
                        }
                    }
                    true
                });
            }
            if !failures.is_empty() {
                bail!("failed to tag fields: {}", failures.join(", "));
            }
            eprintln!("tagged {added} fields");
            emit(&mut prog, write)?;
        }
        Command::Format { target, write } => {
            let mut prog = load(&target, &opts)?;
            emit(&mut prog, write)?;
        }
    }

    Ok(())
}

/// Prints the created packages, or writes every changed file back.
fn emit(prog: &mut Program, write: bool) -> Result<()> {
    if write {
        let written = prog.rewrite().context("Failed to rewrite files")?;
        eprintln!("rewrote {written} files");
        return Ok(());
    }
    let ids: Vec<_> = prog.created_packages().map(|p| p.id()).collect();
    for id in ids {
        for (name, text) in prog.format_package(id) {
            println!("// {name}");
            print!("{text}");
        }
    }
    Ok(())
}
