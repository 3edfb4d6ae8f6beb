mod ui;
mod video;

use clap::Parser;

use crate::ui::prelude::*;
use crate::video::{VideoCommands, handle_video_command};

/// Turn written articles into narrated, illustrated videos
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Activate debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    /// Output format for events
    #[arg(long, value_enum, global = true, default_value = "text")]
    output: OutputFormat,

    /// Disable coloured output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: VideoCommands,
}

fn main() {
    let cli = Cli::parse();

    ui::init(cli.output, !cli.no_color);
    ui::set_debug_mode(cli.debug);
    emit(Level::Debug, "vidgen.debug", "Debug mode is on", None);

    if let Err(err) = handle_video_command(cli.command) {
        emit(
            Level::Error,
            "vidgen.error",
            &format!("{err:#}"),
            Some(serde_json::json!({
                "chain": err.chain().map(|cause| cause.to_string()).collect::<Vec<_>>(),
            })),
        );
        std::process::exit(1);
    }
}
