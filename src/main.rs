use std::io::{self, Read};

use markwright::{Engine, Severity, default_schema, parse_with};

fn main() {
    env_logger::init();

    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let engine = Engine::new(default_schema());
    let parsed = match parse_with(&config.input, &engine) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    println!("{}", parsed.to_xml());

    if config.show_log && !parsed.log.is_empty() {
        eprintln!("--- parse log ---");
        for entry in parsed.log.entries() {
            let severity = match entry.severity {
                Severity::Debug => "debug",
                Severity::Warning => "warning",
                Severity::Error => "error",
            };
            let mut line = format!("[{severity}] {}", entry.msg);
            if let Some(pos) = entry.pos {
                line.push_str(&format!(" (pos {pos})"));
            }
            if let Some(tag) = &entry.tag_name {
                line.push_str(&format!(" tag={tag}"));
            }
            if let Some(attr) = &entry.attr_name {
                line.push_str(&format!(" attr={attr}"));
            }
            eprintln!("{line}");
        }
    }
}

struct CliConfig {
    input: String,
    show_log: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut input: Option<String> = None;
    let mut show_log = false;
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("markwright {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--log" | "-l" => show_log = true,
            "--input" | "-i" => {
                let value = args.next().ok_or_else(|| "error: --input expects a value".to_string())?;
                if input.is_some() {
                    return Err("error: input provided multiple times".to_string());
                }
                input = Some(value);
            }
            "--" => {
                let rest = args.collect::<Vec<_>>().join(" ");
                if !rest.is_empty() {
                    if input.is_some() {
                        return Err("error: input provided multiple times".to_string());
                    }
                    input = Some(rest);
                }
                break;
            }
            _ if arg.starts_with("--input=") => {
                let value = arg.trim_start_matches("--input=");
                if input.is_some() {
                    return Err("error: input provided multiple times".to_string());
                }
                input = Some(value.to_string());
            }
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                let rest = std::iter::once(arg).chain(args).collect::<Vec<_>>().join(" ");
                if input.is_some() {
                    return Err("error: input provided multiple times".to_string());
                }
                input = Some(rest);
                break;
            }
        }
    }

    let input = match input {
        Some(value) => value,
        None => read_stdin_input()?,
    };

    Ok(CliConfig { input, show_log })
}

fn read_stdin_input() -> Result<String, String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(|err| format!("error: failed to read stdin: {err}"))?;
    Ok(buffer)
}

fn help_text() -> String {
    format!(
        "markwright {version}

Text-markup parse engine CLI. Parses the input with the default forum-style
schema and prints the XML tree on stdout.

Usage:
  markwright [OPTIONS] [--] <input...>
  markwright [OPTIONS] --input <text>

Options:
  -i, --input <text>   Input text to parse. If omitted, reads remaining args
                       or stdin when no args are provided.
  -l, --log            Print the parse log on stderr.
  -h, --help           Show this help message.
  -V, --version        Print version information.

Exit codes:
  0  Success.
  1  Parse aborted (plugin match budget exceeded under the abort policy).
  2  Invalid arguments.
",
        version = env!("CARGO_PKG_VERSION")
    )
}
