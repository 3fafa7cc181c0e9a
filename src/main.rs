//! pforge – command-line HTML/Markdown/text → PDF, PNG, JPEG or SVG converter.
//!
//! Usage:
//!   pforge <input> [output] [--format pdf|png|jpeg|svg] [--options opts.json]
//!          [--title "My Report"] [--landscape] [--markdown|--text]
//!
//! If `output` is omitted the file is written next to the input with the same
//! stem and the extension of the output format (e.g. `report.md` → `report.pdf`).

use std::{env, fs, path::PathBuf, process};

use print_forge::content::ContentType;
use print_forge::options::{OutputFormat, PageOrientation, PrintOptions};
use print_forge::pipeline::{process_with_timeout, Document};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut input_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut options_path: Option<PathBuf> = None;
    let mut format: Option<OutputFormat> = None;
    let mut content_type: Option<ContentType> = None;
    let mut landscape = false;
    let mut title: Option<String> = None;
    let mut positional = 0usize;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--landscape" | "-l" => landscape = true,
            "--markdown" | "-m" => content_type = Some(ContentType::Markdown),
            "--text" => content_type = Some(ContentType::Text),
            "--title" | "-t" => match iter.next() {
                Some(v) => title = Some(v.clone()),
                None => fail_usage(&args[0], "--title needs a value"),
            },
            "--format" | "-f" => match iter.next().map(|v| (v, OutputFormat::parse(v))) {
                Some((_, Some(f))) => format = Some(f),
                Some((v, None)) => fail_usage(&args[0], &format!("unknown format '{v}'")),
                None => fail_usage(&args[0], "--format needs a value"),
            },
            "--options" | "-o" => match iter.next() {
                Some(v) => options_path = Some(PathBuf::from(v)),
                None => fail_usage(&args[0], "--options needs a file"),
            },
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other if other.starts_with('-') => fail_usage(&args[0], &format!("unknown flag: {other}")),
            path => {
                if positional == 0 {
                    input_path = Some(PathBuf::from(path));
                } else if positional == 1 {
                    output_path = Some(PathBuf::from(path));
                } else {
                    fail_usage(&args[0], &format!("unexpected argument: {path}"));
                }
                positional += 1;
            }
        }
    }

    let input = match input_path {
        Some(p) => p,
        None => fail_usage(&args[0], "no input file specified"),
    };

    let mut options = match &options_path {
        Some(p) => match PrintOptions::from_file(p) {
            Ok(o) => o,
            Err(e) => {
                eprintln!("Error reading options '{}': {e}", p.display());
                process::exit(1);
            }
        },
        None => PrintOptions::default(),
    };
    if landscape {
        options.page.orientation = PageOrientation::Landscape;
    }
    // Format: flag, then output extension, then options file.
    let format = format
        .or_else(|| {
            output_path
                .as_ref()
                .and_then(|o| o.extension())
                .and_then(|e| e.to_str())
                .and_then(OutputFormat::parse)
        })
        .unwrap_or(options.output.format);
    options.output.format = format;

    // Output: argument, then options filename next to the input, then input stem.
    let output = output_path
        .or_else(|| {
            options
                .output
                .filename
                .as_ref()
                .map(|name| input.with_file_name(name))
        })
        .unwrap_or_else(|| {
            let mut o = input.clone();
            o.set_extension(format.extension());
            o
        });

    let content = match fs::read(&input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading '{}': {e}", input.display());
            process::exit(1);
        }
    };

    let content_type = content_type.unwrap_or_else(|| {
        input
            .extension()
            .and_then(|e| e.to_str())
            .map(ContentType::from_extension)
            .unwrap_or_default()
    });

    // Default title: stem of the input filename.
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string();
    let document = Document::new(stem.clone(), content, content_type)
        .with_metadata("title", title.unwrap_or(stem));

    match process_with_timeout(&document, &options) {
        Ok(mut result) => {
            if let Err(e) = result.write_to(&output) {
                eprintln!("Error writing '{}': {e}", output.display());
                process::exit(1);
            }
            for w in &result.warnings {
                eprintln!("warning: {w}");
            }
            let pages = result.page_count;
            eprintln!(
                "Wrote '{}' ({} bytes, {} page{}, {:.0?})",
                output.display(),
                result.output_size,
                pages,
                if pages == 1 { "" } else { "s" },
                result.render_time
            );
        }
        Err(e) => {
            eprintln!("Error rendering '{}': {e}", input.display());
            process::exit(1);
        }
    }
}

fn fail_usage(prog: &str, message: &str) -> ! {
    eprintln!("Error: {message}");
    print_usage(prog);
    process::exit(1);
}

fn print_usage(prog: &str) {
    eprintln!("pforge – HTML, Markdown and text to PDF/PNG/JPEG/SVG (print-forge)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <input> [output] [--format pdf|png|jpeg|svg] [--options opts.json]");
    eprintln!("         [--title \"My Report\"] [--landscape] [--markdown|--text]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <input>        File to convert (.html, .md or .txt; images must be data URIs)");
    eprintln!("  [output]       Output path (default: input stem with the format's extension)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --format, -f   Output format (default: from output extension, else pdf)");
    eprintln!("  --options, -o  JSON print options file");
    eprintln!("  --title, -t    Document title in PDF metadata (default: input filename stem)");
    eprintln!("  --landscape    Use landscape page orientation");
    eprintln!("  --markdown     Treat input as Markdown");
    eprintln!("  --text         Treat input as plain text");
    eprintln!("  --help         Print this message");
    eprintln!();
    eprintln!("Set RUST_LOG=debug for per-stage timings.");
}
