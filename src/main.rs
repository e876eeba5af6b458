use std::io::{self, Write};
use std::ops::Range;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use serde::Serialize;
use tracing::debug;

use hexmark::decoder::Registry;
use hexmark::index::{Direction, FieldMap, SpanView};
use hexmark::io_stream::{self, parse_size, LoadOptions};
use hexmark::marks::Mark;
use hexmark::session::Session;

/// Bytes of each span shown in the listing.
const PREVIEW_LEN: usize = 8;

#[derive(Parser)]
#[command(name = "hexmark", version, about = "Annotate the fields of a binary file")]
struct Cli {
    /// Input file; standard input when absent
    file: Option<PathBuf>,
    /// Skip this many bytes of input (dd-style size)
    #[arg(short, long, default_value = "0")]
    offset: String,
    /// Load at most this many bytes (dd-style size)
    #[arg(short, long, default_value = "1G")]
    size: String,
    /// Decoder to use instead of auto-detection; `list` prints the known ones
    #[arg(short = 't', long = "type")]
    kind: Option<String>,
    /// Debug logging to stderr
    #[arg(short, long)]
    debug: bool,
    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
    /// Only report the fields at this offset
    #[arg(long)]
    at: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_tracing(cli.debug);

    let registry = Registry::with_builtins();
    if cli.kind.as_deref() == Some("list") {
        let mut out = io::stdout().lock();
        for name in registry.names() {
            writeln!(out, "{name}")?;
        }
        return Ok(());
    }

    let opts = LoadOptions {
        offset:     parse_size(&cli.offset)?,
        size_limit: parse_size(&cli.size)?,
    };
    let store = match &cli.file {
        Some(path) => io_stream::load_file(path, opts)?,
        None       => io_stream::load(io::stdin().lock(), opts)?,
    };
    debug!(base = store.base(), len = store.len(), "input ready");

    let annotated = match Session::new(store, registry).annotate(cli.kind.as_deref()) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("hexmark: decoding failed: {e}");
            process::exit(1);
        }
    };

    let mut out = io::stdout().lock();
    match &cli.at {
        Some(at) => {
            let report = AtReport::new(&annotated.fields, parse_size(at)?);
            if cli.json {
                serde_json::to_writer_pretty(&mut out, &report)?;
                writeln!(out)?;
            } else {
                report.print(&mut out)?;
            }
        }
        None if cli.json => {
            let listing = Listing {
                range: annotated.fields.range(),
                spans: annotated.fields.iter().collect(),
            };
            serde_json::to_writer_pretty(&mut out, &listing)?;
            writeln!(out)?;
        }
        None => {
            for view in annotated.fields.iter() {
                let bytes = annotated.store.get(view.start, view.end - view.start).unwrap_or_default();
                print_span(&mut out, &view, bytes)?;
            }
        }
    }
    Ok(())
}

// ── Output ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Listing<'a> {
    range: Range<u64>,
    spans: Vec<SpanView<'a>>,
}

#[derive(Serialize)]
struct AtReport<'a> {
    offset: u64,
    span:   Option<SpanView<'a>>,
    marks:  Vec<&'a Mark>,
    prev:   Option<u64>,
    next:   Option<u64>,
}

impl<'a> AtReport<'a> {
    fn new(fields: &'a FieldMap, offset: u64) -> Self {
        let span = fields
            .find_span_index(offset)
            .filter(|_| fields.range().contains(&offset))
            .and_then(|i| fields.view(i));
        Self {
            offset,
            span,
            marks: fields.marks_at(offset),
            prev:  fields.navigate(offset, Direction::Prev),
            next:  fields.navigate(offset, Direction::Next),
        }
    }

    fn print(&self, out: &mut impl Write) -> io::Result<()> {
        let boundary = |b: Option<u64>| b.map_or_else(|| "-".to_owned(), |o| format!("{o:#x}"));
        match &self.span {
            Some(span) => writeln!(out, "{:#x}: span {:#x}..{:#x}", self.offset, span.start, span.end)?,
            None       => writeln!(out, "{:#x}: outside the loaded range", self.offset)?,
        }
        for mark in &self.marks {
            writeln!(out, "  {:#x}+{}  {}", mark.offset, mark.len, mark.description)?;
        }
        writeln!(out, "prev {}  next {}", boundary(self.prev), boundary(self.next))
    }
}

fn print_span(out: &mut impl Write, view: &SpanView<'_>, bytes: &[u8]) -> io::Result<()> {
    let color = view.color.map_or_else(|| "-".to_owned(), |c| c.to_string());
    let preview = hex::encode(&bytes[..bytes.len().min(PREVIEW_LEN)]);
    let more = if bytes.len() > PREVIEW_LEN { ".." } else { "" };
    let labels: Vec<&str> = view.marks.iter().map(|m| m.description.as_str()).collect();
    writeln!(
        out,
        "{:08x}-{:08x} {} {:<18} {}",
        view.start,
        view.end,
        color,
        format!("{preview}{more}"),
        labels.join("; ")
    )
}

fn setup_tracing(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("hexmark=debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
