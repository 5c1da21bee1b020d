use std::io::Read;

use tracing_subscriber::{fmt, EnvFilter};

use weft::cli;
use weft::MapHost;

/// Logging filter comes from `WEFT_LOG`, falling back to `RUST_LOG`,
/// defaulting to `warn`. Diagnostics go to stderr so piped output stays
/// clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("WEFT_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn read_template(args: &cli::CliArgs) -> Result<String, String> {
    if let Some(t) = &args.template {
        return Ok(t.clone());
    }
    let raw = match &args.file {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("cannot read stdin: {e}"))?;
            buf
        }
    };
    // The final newline of a template file is an editor artifact, not
    // template text; keep it out of every output.
    let raw = raw.strip_suffix('\n').unwrap_or(&raw).to_owned();
    Ok(raw.strip_suffix('\r').unwrap_or(&raw).to_owned())
}

fn main() {
    init_tracing();

    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("weft: {e}");
            eprintln!("Usage: weft [-D <name>=<value>]... [-e <template>] [<file>]");
            std::process::exit(2);
        }
    };

    let input = match read_template(&args) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("weft: {e}");
            std::process::exit(1);
        }
    };

    let mut host = MapHost::new();
    for (name, value) in args.defines {
        host.set_var(name, value);
    }

    match weft::run(Some(&mut host), &input) {
        Ok(outputs) => {
            for line in outputs {
                println!("{line}");
            }
        }
        Err(e) => {
            eprintln!("weft: {e}");
            std::process::exit(1);
        }
    }
}
