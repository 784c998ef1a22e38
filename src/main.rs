use anyhow::Context;
use clap::{ArgGroup, Parser, ValueEnum};
use crossterm::tty::IsTty;
use slotool_rs::report::{Report, ReportOptions};
use std::io::{self, BufWriter, Write};

#[derive(Parser, Debug)]
#[command(group(
    ArgGroup::new("report")
        .required(true)
        .multiple(true)
        .args(["mach_header", "load_commands", "shared_libs"]),
))]
struct Args {
    /// The Mach-O file to inspect
    input_file: String,
    /// Print the mach header
    #[arg(long, short('H'))]
    mach_header: bool,
    /// Print the load commands
    #[arg(long, short('l'))]
    load_commands: bool,
    /// Print the shared libraries used
    #[arg(long, short('L'))]
    shared_libs: bool,
    /// When to style the output
    #[arg(long, value_enum, default_value_t = Color::Auto)]
    color: Color,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Color {
    Auto,
    Always,
    Never,
}

impl Args {
    fn options(&self) -> ReportOptions {
        ReportOptions {
            mach_header: self.mach_header,
            load_commands: self.load_commands,
            shared_libs: self.shared_libs,
        }
    }

    fn use_color(&self) -> bool {
        match self.color {
            Color::Auto => io::stdout().is_tty(),
            Color::Always => true,
            Color::Never => false,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    let image = slotool_rs::parse(&args.input_file)
        .with_context(|| format!("failed to parse `{}`", args.input_file))?;

    let report = Report::new(args.options()).color(args.use_color());
    let mut out = BufWriter::new(io::stdout().lock());
    report.render(&image, &mut out)?;
    out.flush()?;

    Ok(())
}
