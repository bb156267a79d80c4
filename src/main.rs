#[cfg(not(target_os = "linux"))]
compile_error!("taskman supports only linux");

mod config;
mod gui;
mod manager;
mod process;

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use gui::ProcessManagerApp;
use gui::table::{ProcessRow, ProcessTable};
use manager::Manager;
use tracing::level_filters::LevelFilter;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

const LIST_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(author, version, about = "List, filter and control running processes", long_about = None)]
struct Cli {
    /// Config file (default: ~/.config/taskman/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Seconds between automatic refreshes
    #[arg(long, value_name = "SECS")]
    interval: Option<f64>,

    /// Only refresh on demand
    #[arg(long)]
    no_auto_refresh: bool,

    /// More log output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Mode>,
}

#[derive(Subcommand)]
enum Mode {
    /// Print one snapshot of the process table and exit
    List {
        /// Only show processes whose name contains this text (case-insensitive)
        #[arg(short, long, default_value = "")]
        filter: String,
    },
}

fn main() -> eframe::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load(cli.config.as_deref());
    if let Some(interval) = cli.interval {
        config.refresh_interval_secs = interval;
    }
    if cli.no_auto_refresh {
        config.auto_refresh = false;
    }

    if let Some(Mode::List { filter }) = cli.command {
        run_list(&filter);
        return Ok(());
    }

    // Configure native options for the GUI
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window.width, config.window.height])
            .with_title("Task Manager"),
        ..Default::default()
    };

    // Run the GUI application
    eframe::run_native(
        "Task Manager",
        options,
        Box::new(move |cc| Box::new(ProcessManagerApp::new(cc, &config))),
    )
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let toolkit = level.min(LevelFilter::INFO);

    let filter = if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(format!(
            "{level},eframe={toolkit},egui_glow={toolkit},winit={toolkit}"
        ))
    };

    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish(),
    )
    .expect("enabling global logger");
}

/// Prints the filtered table once, space padded like the window's columns.
///
/// CPU usage needs two samples, so the table is read twice `LIST_SAMPLE_INTERVAL` apart.
fn run_list(filter: &str) {
    let mut manager = Manager::new();
    let mut table = ProcessTable::default();
    table.refresh(&mut manager);
    thread::sleep(LIST_SAMPLE_INTERVAL);
    table.set_filter(filter, &mut manager);

    if let Some(note) = table.notification() {
        error!("{}", note.message);
        std::process::exit(1);
    }

    print!("{}", render_table(table.rows()));
}

fn render_table(rows: &[ProcessRow]) -> String {
    let mut lines: Vec<[String; 5]> = vec![[
        "PID".to_string(),
        "NAME".to_string(),
        "CPU".to_string(),
        "MEM(MB)".to_string(),
        "STATUS".to_string(),
    ]];
    for row in rows {
        lines.push([
            row.pid.to_string(),
            row.name.clone(),
            row.cpu.clone(),
            row.memory.clone(),
            row.status.clone(),
        ]);
    }
    let widths: Vec<usize> = (0..5)
        .map(|i| {
            lines
                .iter()
                .map(|line| line[i].chars().count())
                .max()
                .unwrap_or_default()
                + 1
        })
        .collect();

    //output each line, buffered by space
    let mut out = String::new();
    for line in lines {
        for (i, &col) in widths.iter().enumerate() {
            out.push_str(&format!("{: <col$}", line[i]));
        }
        out.push('\n');
    }
    out
}
