//! High-level command orchestration for the CLI.
//!
//! This module contains the handler functions for each CLI command (`list`,
//! `create`, `add`, `use`, etc.) and the interactive menu that strings them
//! together. It serves as the coordination layer between:
//! - `crate::ui` for user interaction (output, prompts).
//! - `crate::profiles` for the config model and directory moves.
//!
//! Each function here generally corresponds to a subcommand in `main.rs`.

use anstyle::AnsiColor;
use anyhow::{Context, Result};
use inquire::{Confirm, InquireError, Select, Text};
use serde::Serialize;
use std::fmt;

use crate::doctor::run_doctor;
use crate::error::DotmanError;
use crate::fs_utils::{dir_stats, format_bytes};
use crate::profiles::{Activation, ProfileManager, SwitchPlan};
use crate::relocate::{MoveStatus, RelocationOutcome};
use crate::ui::Ui;

fn print_json<T: Serialize>(ui: &Ui, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    ui.println(json);
    Ok(())
}

/// Print one line per moved directory. Returns the number of failures.
fn report_outcomes(ui: &Ui, outcomes: &[RelocationOutcome], warn_missing: bool) -> usize {
    let mut failed = 0;
    for outcome in outcomes {
        match &outcome.status {
            MoveStatus::Moved => ui.ok(format!(
                "Moved {} -> {}",
                outcome.source.display(),
                outcome.dest.display()
            )),
            MoveStatus::Missing if warn_missing => {
                ui.warn(format!("Not a valid directory: {}", outcome.name))
            }
            MoveStatus::Missing => ui.println(ui.dim(format!("  skipped {} (not present)", outcome.name))),
            MoveStatus::Failed(msg) => {
                failed += 1;
                ui.err(msg);
            }
        }
    }
    failed
}

/// List all configs
pub fn list(pm: &ProfileManager, ui: &Ui, json: bool) -> Result<()> {
    let profiles = pm.list_profiles()?;

    if json {
        return print_json(ui, &profiles);
    }

    if profiles.is_empty() {
        ui.warn("No configs found.");
        ui.newline();
        ui.println("Create one with:");
        ui.println(format!("  {} create <name>", ui.bold("dotman")));
        return Ok(());
    }

    let mut table = ui.simple_table();
    table.set_header(vec![
        ui.header_cell(""),
        ui.header_cell("Config"),
        ui.header_cell("Tracked"),
        ui.header_cell("Status"),
    ]);

    for profile in &profiles {
        let icon = if profile.active { ui.icon_ok() } else { " " };
        let status_cell = if profile.active {
            ui.colored_cell("active", AnsiColor::Green)
        } else if !profile.indexed {
            ui.colored_cell("untracked storage", AnsiColor::Yellow)
        } else if !profile.stored {
            ui.colored_cell("storage missing", AnsiColor::Yellow)
        } else {
            ui.cell("-")
        };

        table.add_row(vec![
            ui.cell(icon),
            ui.cell(&profile.name),
            ui.cell(profile.tracked.to_string()),
            status_cell,
        ]);
    }

    ui.section("Configs");
    ui.println(table.to_string());
    Ok(())
}

/// Create a new config
pub fn create(pm: &ProfileManager, name: &str, ui: &Ui) -> Result<()> {
    pm.create_profile(name).map_err(|e| match e {
        DotmanError::AlreadyExists(_) => anyhow::anyhow!(
            "{}.\nHint: Use 'dotman list' to see existing configs, or choose a different name.",
            e
        ),
        other => other.into(),
    })?;

    ui.ok(format!("Config '{}' created!", name));
    ui.newline();
    ui.println("Move directories into it with:");
    ui.println(format!("  dotman add {} <dir>...", name));
    Ok(())
}

/// Move directories from the live config directory into a config
pub fn add(pm: &ProfileManager, profile: &str, dirs: &[String], ui: &Ui) -> Result<()> {
    if dirs.is_empty() {
        ui.warn("No directories given.");
        return Ok(());
    }

    let outcomes = pm.add_directories(profile, dirs).map_err(|e| match e {
        DotmanError::ProfileNotFound(_) => anyhow::anyhow!(
            "{}.\nHint: Create it first with 'dotman create {}'.",
            e,
            profile
        ),
        other => other.into(),
    })?;

    let failed = report_outcomes(ui, &outcomes, true);
    let moved = outcomes.iter().filter(|o| o.is_moved()).count();
    if moved > 0 {
        ui.info(format!("{} director{} now tracked by '{}'", moved, plural_y(moved), profile));
    }
    if failed > 0 {
        ui.warn(format!("{} director{} could not be moved", failed, plural_y(failed)));
    }
    Ok(())
}

fn plural_y(n: usize) -> &'static str {
    if n == 1 { "y" } else { "ies" }
}

/// Describe a pending switch and ask whether to go ahead
fn confirm_switch(ui: &Ui, plan: &SwitchPlan) -> Result<bool> {
    let current = plan.current.as_deref().unwrap_or_default();
    ui.info(format!("Currently active config: {}", current));
    if plan.returning.is_empty() {
        ui.println(format!("  Nothing of '{}' is live right now.", current));
    } else {
        ui.println(format!("  Going back to storage: {}", plan.returning.join(" ")));
    }
    if !plan.loading.is_empty() {
        ui.println(format!("  Loading from '{}': {}", plan.target, plan.loading.join(" ")));
    }

    Confirm::new("Switching will move your current config directories back to storage. Continue?")
        .with_default(false)
        .prompt()
        .context("Confirmation cancelled")
}

/// Activate a config, asking before another active config is put away.
///
/// Returns false if the switch was declined.
fn activate(pm: &ProfileManager, name: &str, ui: &Ui, assume_yes: bool) -> Result<bool> {
    let spinner = ui.spinner(format!("Loading config '{}'...", name));

    // The prompt runs under the index lock, against the plan that will be applied
    let mut prompt_err: Option<anyhow::Error> = None;
    let result = pm.activate(name, |plan| {
        if assume_yes {
            return true;
        }
        spinner
            .suspend(|| confirm_switch(ui, plan))
            .unwrap_or_else(|e| {
                prompt_err = Some(e);
                false
            })
    });

    if let Some(e) = prompt_err {
        spinner.finish_and_clear();
        return Err(e);
    }
    let activation = match result {
        Ok(activation) => activation,
        Err(e) => {
            ui.spinner_finish_err(&spinner, format!("Failed to activate: {}", e));
            return Err(e.into());
        }
    };

    match activation {
        Activation::Declined => {
            spinner.finish_and_clear();
            ui.warn("Operation cancelled.");
            Ok(false)
        }
        Activation::Activated {
            profile,
            deactivated,
            returned,
            loaded,
        } => {
            spinner.finish_and_clear();
            if let Some(previous) = deactivated {
                ui.info(format!("Saved '{}' back to storage", previous));
                report_outcomes(ui, &returned, false);
            }
            let failed = report_outcomes(ui, &loaded, true);
            if failed > 0 {
                ui.warn(format!(
                    "Config '{}' is active, but {} director{} could not be loaded",
                    profile,
                    failed,
                    plural_y(failed)
                ));
            } else {
                ui.ok(format!("Config '{}' is now active!", profile));
            }
            Ok(true)
        }
    }
}

/// Switch to a config
pub fn use_profile(pm: &ProfileManager, name: &str, ui: &Ui, assume_yes: bool) -> Result<()> {
    activate(pm, name, ui, assume_yes).map(|_| ())
}

/// Move a config's tracked directories back to storage
pub fn deactivate(pm: &ProfileManager, name: Option<&str>, ui: &Ui) -> Result<()> {
    let name = match name {
        Some(name) => name.to_string(),
        None => match pm.active_profile()? {
            Some(active) => active,
            None => {
                ui.warn("No config is active.");
                return Ok(());
            }
        },
    };

    ui.info("Saving current config back to storage...");
    let outcomes = pm.deactivate(&name)?;
    let failed = report_outcomes(ui, &outcomes, false);
    if failed == 0 {
        ui.ok(format!("Config '{}' deactivated", name));
    }
    Ok(())
}

#[derive(Serialize)]
struct TrackedRow {
    config: String,
    directory: String,
    location: &'static str,
    bytes: Option<u64>,
}

/// List tracked directories per config
pub fn tracked(pm: &ProfileManager, ui: &Ui, json: bool) -> Result<()> {
    let by_profile = pm.list_tracked()?;
    let layout = pm.layout();

    let mut rows = Vec::new();
    for (profile, dirs) in &by_profile {
        for dir in dirs {
            let stored = layout.stored_path(profile, dir);
            let live = layout.live_path(dir);
            let (location, path) = if stored.is_dir() {
                ("stored", Some(stored))
            } else if live.is_dir() {
                ("live", Some(live))
            } else {
                ("missing", None)
            };
            rows.push(TrackedRow {
                config: profile.clone(),
                directory: dir.clone(),
                location,
                bytes: path.and_then(|p| dir_stats(&p).ok()).map(|s| s.bytes),
            });
        }
    }

    if json {
        return print_json(ui, &rows);
    }

    if by_profile.is_empty() {
        ui.warn("No configs found");
        return Ok(());
    }
    if rows.is_empty() {
        ui.warn("No dotfiles tracked yet");
        return Ok(());
    }

    let mut table = ui.table();
    table.set_header(vec![
        ui.header_cell("Config"),
        ui.header_cell("Directory"),
        ui.header_cell("Location"),
        ui.header_cell("Size"),
    ]);
    for row in &rows {
        let location = match row.location {
            "missing" => ui.colored_cell(row.location, AnsiColor::Red),
            "live" => ui.colored_cell(row.location, AnsiColor::Green),
            _ => ui.cell(row.location),
        };
        table.add_row(vec![
            ui.cell(&row.config),
            ui.cell(&row.directory),
            location,
            ui.cell(row.bytes.map(format_bytes).unwrap_or_else(|| "-".into())),
        ]);
    }

    ui.section("Tracked configurations");
    ui.println(table.to_string());
    Ok(())
}

/// List directories in the live config directory
pub fn dirs(pm: &ProfileManager, ui: &Ui, json: bool) -> Result<()> {
    let dirs = pm.live_directories()?;

    if json {
        return print_json(ui, &dirs);
    }

    if dirs.is_empty() {
        ui.warn(format!(
            "No directories in {}",
            pm.layout().live_config_dir.display()
        ));
        return Ok(());
    }

    let mut table = ui.simple_table();
    table.set_header(vec![ui.header_cell("Directory"), ui.header_cell("Config")]);
    for dir in &dirs {
        let owner = match &dir.tracked_by {
            Some(owner) => ui.colored_cell(owner, AnsiColor::Green),
            None => ui.cell(ui.dim("-")),
        };
        table.add_row(vec![ui.cell(&dir.name), owner]);
    }

    ui.section(format!("{}", pm.layout().live_config_dir.display()));
    ui.println(table.to_string());
    Ok(())
}

/// Show the active config and where things live
pub fn status(pm: &ProfileManager, ui: &Ui) -> Result<()> {
    let index = pm.index()?;
    let layout = pm.layout();

    ui.section("Current Config");
    ui.newline();

    let mut table = ui.simple_table();
    match index.active_profile() {
        Some(profile) => {
            table.add_row(vec![ui.cell("Active config:"), ui.header_cell(profile)]);
        }
        None => {
            table.add_row(vec![ui.cell("Active config:"), ui.cell("(none)")]);
        }
    }
    if let Some(updated) = index.updated_at() {
        table.add_row(vec![
            ui.cell("Last change:"),
            ui.cell(updated.format("%Y-%m-%d %H:%M:%S").to_string()),
        ]);
    }
    table.add_row(vec![
        ui.cell("Config directory:"),
        ui.cell(layout.live_config_dir.display().to_string()),
    ]);
    table.add_row(vec![
        ui.cell("Storage:"),
        ui.cell(layout.profile_storage_root.display().to_string()),
    ]);
    table.add_row(vec![
        ui.cell("Tracking file:"),
        ui.cell(layout.tracking_doc_path.display().to_string()),
    ]);

    ui.println(table.to_string());
    Ok(())
}

/// Run diagnostics
pub fn doctor(pm: &ProfileManager, ui: &Ui) -> Result<()> {
    run_doctor(pm, ui);
    Ok(())
}

// -----------------------------------------------------------------------------
// Interactive menu
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuItem {
    ListConfigs,
    CreateConfig,
    MoveDotfiles,
    SetActive,
    ListTracked,
    Exit,
}

impl MenuItem {
    const ALL: [MenuItem; 6] = [
        MenuItem::ListConfigs,
        MenuItem::CreateConfig,
        MenuItem::MoveDotfiles,
        MenuItem::SetActive,
        MenuItem::ListTracked,
        MenuItem::Exit,
    ];
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuItem::ListConfigs => "List configs",
            MenuItem::CreateConfig => "Create new config",
            MenuItem::MoveDotfiles => "Move dotfiles to config",
            MenuItem::SetActive => "Set active config",
            MenuItem::ListTracked => "List tracked dotfiles",
            MenuItem::Exit => "Exit",
        };
        f.write_str(label)
    }
}

const NEW_CONFIG: &str = "(new config)";

/// True if the user backed out of a prompt (Esc / Ctrl-C)
fn is_cancel(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<InquireError>(),
        Some(InquireError::OperationCanceled | InquireError::OperationInterrupted)
    )
}

/// Interactive session. Errors are printed and the menu is shown again.
pub fn menu(pm: &ProfileManager, ui: &Ui) -> Result<()> {
    pm.layout().ensure_dirs()?;
    ui.section("=== Dotfile Manager ===");

    loop {
        let choice = match Select::new("Choice:", MenuItem::ALL.to_vec()).prompt() {
            Ok(choice) => choice,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                MenuItem::Exit
            }
            Err(e) => return Err(e).context("Menu prompt failed"),
        };

        let result = match choice {
            MenuItem::ListConfigs => list(pm, ui, false),
            MenuItem::CreateConfig => menu_create(pm, ui).map(|_| ()),
            MenuItem::MoveDotfiles => menu_move(pm, ui),
            MenuItem::SetActive => menu_activate(pm, ui),
            MenuItem::ListTracked => tracked(pm, ui, false),
            MenuItem::Exit => {
                ui.println("Goodbye!");
                return Ok(());
            }
        };

        if let Err(e) = result {
            if is_cancel(&e) {
                ui.warn("Cancelled.");
            } else {
                ui.err(format!("{:#}", e));
            }
        }
        ui.newline();
    }
}

/// Ask for names until one is free. Returns the created name.
fn menu_create(pm: &ProfileManager, ui: &Ui) -> Result<String> {
    let mut prompt = "Enter a name for the config:";
    loop {
        let name = Text::new(prompt).prompt()?;
        let name = name.trim();
        match pm.create_profile(name) {
            Ok(()) => {
                ui.ok(format!("Config '{}' created!", name));
                return Ok(name.to_string());
            }
            Err(DotmanError::AlreadyExists(_)) => {
                prompt = "Already a config, enter a new name:";
            }
            Err(e @ DotmanError::InvalidName { .. }) => {
                ui.warn(e.to_string());
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn menu_move(pm: &ProfileManager, ui: &Ui) -> Result<()> {
    let mut options: Vec<String> = pm
        .list_profiles()?
        .into_iter()
        .filter(|p| p.indexed)
        .map(|p| p.name)
        .collect();
    options.push(NEW_CONFIG.to_string());

    let selected = Select::new("Which config should these dotfiles be added to?", options).prompt()?;
    let profile = if selected == NEW_CONFIG {
        menu_create(pm, ui)?
    } else {
        selected
    };

    let untracked: Vec<String> = pm
        .live_directories()?
        .into_iter()
        .filter(|d| d.tracked_by.is_none())
        .map(|d| d.name)
        .collect();
    if !untracked.is_empty() {
        ui.println(ui.dim(untracked.join(" ")));
    }

    let input = Text::new(&format!(
        "In {}, enter directory names separated by spaces:",
        pm.layout().live_config_dir.display()
    ))
    .with_help_message("EX: dir1 dir2 dir3 dir4")
    .prompt()?;
    let dirs: Vec<String> = input.split_whitespace().map(str::to_string).collect();

    add(pm, &profile, &dirs, ui)
}

fn menu_activate(pm: &ProfileManager, ui: &Ui) -> Result<()> {
    let options: Vec<String> = pm
        .list_profiles()?
        .into_iter()
        .filter(|p| p.indexed)
        .map(|p| p.name)
        .collect();
    if options.is_empty() {
        ui.warn("No configs found.");
        return Ok(());
    }

    let name = Select::new("Config to activate:", options).prompt()?;
    if activate(pm, &name, ui, false)? {
        return Ok(());
    }

    let create_instead = Confirm::new("Would you like to create a new config instead?")
        .with_default(false)
        .prompt()?;
    if create_instead {
        menu_create(pm, ui)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{make_live_dir, setup_test_layout};
    use crate::ui::ColorMode;
    use tempfile::TempDir;

    fn test_ui() -> Ui {
        Ui::new(ColorMode::Never, false)
    }

    fn manager(temp_dir: &TempDir) -> ProfileManager {
        ProfileManager::new(setup_test_layout(temp_dir))
    }

    #[test]
    fn test_list_empty() {
        let temp_dir = TempDir::new().unwrap();
        let pm = manager(&temp_dir);
        let ui = test_ui();
        // Should not error, just show "no configs"
        assert!(list(&pm, &ui, false).is_ok());
        assert!(list(&pm, &ui, true).is_ok());
    }

    #[test]
    fn test_create_and_list() {
        let temp_dir = TempDir::new().unwrap();
        let pm = manager(&temp_dir);
        let ui = test_ui();

        create(&pm, "work", &ui).unwrap();

        assert!(pm.index().unwrap().has_profile("work"));
        assert!(list(&pm, &ui, false).is_ok());
    }

    #[test]
    fn test_create_duplicate() {
        let temp_dir = TempDir::new().unwrap();
        let pm = manager(&temp_dir);
        let ui = test_ui();

        create(&pm, "work", &ui).unwrap();
        let err = create(&pm, "work", &ui).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_add_to_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let pm = manager(&temp_dir);
        let ui = test_ui();

        let err = add(&pm, "ghost", &["nvim".to_string()], &ui).unwrap_err();
        assert!(err.to_string().contains("dotman create ghost"));
    }

    #[test]
    fn test_add_use_deactivate() {
        let temp_dir = TempDir::new().unwrap();
        let pm = manager(&temp_dir);
        let ui = test_ui();
        make_live_dir(pm.layout(), "nvim");

        create(&pm, "work", &ui).unwrap();
        add(&pm, "work", &["nvim".to_string(), "ghost".to_string()], &ui).unwrap();
        assert!(pm.layout().stored_path("work", "nvim").is_dir());

        use_profile(&pm, "work", &ui, false).unwrap();
        assert!(pm.layout().live_path("nvim").is_dir());
        assert!(tracked(&pm, &ui, false).is_ok());
        assert!(dirs(&pm, &ui, true).is_ok());

        deactivate(&pm, None, &ui).unwrap();
        assert!(pm.layout().stored_path("work", "nvim").is_dir());
        assert_eq!(pm.active_profile().unwrap(), None);
    }

    #[test]
    fn test_use_switch_with_assume_yes() {
        let temp_dir = TempDir::new().unwrap();
        let pm = manager(&temp_dir);
        let ui = test_ui();
        make_live_dir(pm.layout(), "nvim");
        create(&pm, "work", &ui).unwrap();
        create(&pm, "home", &ui).unwrap();
        add(&pm, "work", &["nvim".to_string()], &ui).unwrap();

        // Nothing active yet, so no prompt either way
        use_profile(&pm, "work", &ui, false).unwrap();
        assert!(pm.layout().live_path("nvim").is_dir());

        // With --yes the gate approves without prompting
        use_profile(&pm, "home", &ui, true).unwrap();
        assert_eq!(pm.active_profile().unwrap().as_deref(), Some("home"));
        assert!(!pm.layout().live_path("nvim").exists());
        assert!(pm.layout().stored_path("work", "nvim").is_dir());
    }

    #[test]
    fn test_use_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let pm = manager(&temp_dir);
        let ui = test_ui();
        assert!(use_profile(&pm, "nonexistent", &ui, true).is_err());
    }

    #[test]
    fn test_deactivate_without_active() {
        let temp_dir = TempDir::new().unwrap();
        let pm = manager(&temp_dir);
        let ui = test_ui();
        assert!(deactivate(&pm, None, &ui).is_ok());
    }

    #[test]
    fn test_status_no_state() {
        let temp_dir = TempDir::new().unwrap();
        let pm = manager(&temp_dir);
        let ui = test_ui();
        assert!(status(&pm, &ui).is_ok());
    }

    #[test]
    fn test_is_cancel() {
        let err = anyhow::Error::from(InquireError::OperationCanceled);
        assert!(is_cancel(&err));
        assert!(!is_cancel(&anyhow::anyhow!("other")));
    }

    #[test]
    fn test_menu_labels() {
        let labels: Vec<String> = MenuItem::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(labels.first().map(String::as_str), Some("List configs"));
        assert_eq!(labels.last().map(String::as_str), Some("Exit"));
    }
}
