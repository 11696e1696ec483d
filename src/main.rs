use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use workboard::board::JsonBoard;
use workboard::cli::Cli;
use workboard::cmd::*;
use workboard::settings::JsonSettings;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Completions never touch the data files.
    if let Commands::Completions { shell } = &cli.command {
        cmd_completions(*shell);
        return;
    }

    // Determine the data directory and file paths.
    let data_dir = {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".workboard")
    };
    if (cli.board.is_none() || cli.settings.is_none()) && !data_dir.exists() {
        if let Err(e) = std::fs::create_dir_all(&data_dir) {
            eprintln!("Failed to create data directory {}: {e}", data_dir.display());
            std::process::exit(1);
        }
    }
    let board_path = cli
        .board
        .clone()
        .unwrap_or_else(|| data_dir.join("board.json"));
    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(|| data_dir.join("settings.json"));

    if let Commands::Init { process, project } = &cli.command {
        cmd_init(&settings_path, &board_path, process, project);
        return;
    }

    let mut settings = match JsonSettings::open(&settings_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to open settings {}: {e}", settings_path.display());
            std::process::exit(1);
        }
    };
    let mut board = match JsonBoard::open(&board_path) {
        Ok(board) => board,
        Err(e) => {
            eprintln!("Failed to open board {}: {e}", board_path.display());
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Completions { .. } => unreachable!("completions handled above"),
        Commands::Init { .. } => unreachable!("init handled above"),

        Commands::Roadmap { json } => cmd_roadmap(&mut settings, &board, json),

        Commands::Unscheduled => cmd_unscheduled(&mut settings, &board),

        Commands::Hierarchy { action } => match action {
            HierarchyAction::Show => cmd_hierarchy_show(&mut settings, &board),
            HierarchyAction::Set { json, file } => cmd_hierarchy_set(&mut settings, json, file),
        },

        Commands::Config { action } => match action {
            ConfigAction::Show => cmd_config_show(&mut settings),
            ConfigAction::Set { start, end, unit } => {
                cmd_config_set(&mut settings, start, end, unit)
            }
        },

        Commands::UseProcess { id } => cmd_use_process(&mut settings, id),

        Commands::UseProject { id } => cmd_use_project(&mut settings, id),

        Commands::Schedule { id, date, at } => {
            cmd_schedule(&mut settings, &mut board, id, date, at)
        }

        Commands::Unschedule { id } => cmd_unschedule(&mut board, id),

        Commands::SetState { id, state } => cmd_set_state(&mut settings, &mut board, id, state),

        Commands::States { work_item_type } => cmd_states(&mut settings, &board, work_item_type),
    }
}
