//! Prompts and progress bars.
use anyhow::{Result, anyhow};
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};
use imgflow_core::DeviceDescriptor;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

/// Presents an interactive menu for the user to select a device.
pub fn select_device(devices: &[DeviceDescriptor], prompt: &str) -> Result<DeviceDescriptor> {
    let items: Vec<String> = devices.iter().map(|d| d.to_string()).collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&items)
        .default(0)
        .interact()?;

    Ok(devices[selection].clone())
}

/// Presents a final "Yes/No" confirmation to the user.
pub fn confirm_operation(prompt: &str, default: bool) -> Result<bool> {
    let confirmation = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(default)
        .interact()?;

    Ok(confirmation)
}

/// Asks for a file path, pre-filled with `initial`.
pub fn prompt_path(prompt: &str, initial: &str) -> Result<PathBuf> {
    let path: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .with_initial_text(initial)
        .interact_text()?;

    let path = path.trim();
    if path.is_empty() {
        return Err(anyhow!("No file name specified."));
    }
    Ok(PathBuf::from(path))
}

/// Presents a numbered menu and returns the chosen index.
pub fn select_action(prompt: &str, items: &[&str]) -> Result<usize> {
    Ok(Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact()?)
}

/// An idle progress bar; call [`start_bar`] once the total is known.
pub fn transfer_bar(prefix: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_prefix(prefix);
    bar
}

/// Styles `bar` as a byte bar, or as a byte-counting spinner when the total is unknown.
pub fn start_bar(bar: &ProgressBar, total: Option<u64>, color: &str) {
    let template = match total {
        Some(len) => {
            bar.set_length(len);
            format!(
                "{{prefix:12}} [{{elapsed_precise}}] [{{bar:40.{color}/black}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {{msg}}"
            )
        }
        None => {
            bar.unset_length();
            bar.enable_steady_tick(Duration::from_millis(100));
            "{prefix:12} [{elapsed_precise}] {spinner} {bytes} ({bytes_per_sec}) {msg}".to_string()
        }
    };

    let style = ProgressStyle::with_template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("■ ");
    bar.set_style(style);
}

/// Moves `bar` to `bytes`; at the end of a known total the destination is being synced.
pub fn track(bar: &ProgressBar, bytes: u64) {
    bar.set_position(bytes);
    if bar.length() == Some(bytes) {
        bar.set_message("Syncing...");
    }
}
