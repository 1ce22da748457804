use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use imgflow_core::device::{self, human_size};
use imgflow_core::{
    CompressionKind, DeviceDescriptor, TransferOptions, TransferResult, TransferSource, convert,
    read, write,
};
use indicatif::ProgressBar;
use std::fs::File;
use std::io::{IsTerminal, stdout};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(unix)]
use libc::ECHOCTL;
#[cfg(unix)]
use std::os::unix::io::AsRawFd;
#[cfg(unix)]
use termios::{TCSANOW, Termios, tcsetattr};

mod interrupt;
mod logging;
mod serve;
mod ui;

use interrupt::Interruptible;

#[derive(Parser)]
#[command(name = "imgflow")]
#[command(
    about = "Back up and flash removable drives, with transparent gzip/xz compression",
    long_about = "Back up and flash removable drives, with transparent gzip/xz compression.\n\nRun without a subcommand for an interactive menu.",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Bytes moved per read/write cycle
    #[arg(
        long,
        global = true,
        default_value_t = imgflow_core::copy::DEFAULT_CHUNK_SIZE,
        value_parser = parse_chunk_size
    )]
    chunk_size: usize,

    /// Compression level for gzip/xz output (0-9)
    #[arg(
        long,
        global = true,
        default_value_t = imgflow_core::stream::DEFAULT_LEVEL,
        value_parser = clap::value_parser!(u32).range(0..=9)
    )]
    level: u32,

    /// Do not open target devices with O_SYNC (the final sync still happens)
    #[arg(long, global = true)]
    no_sync_writes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an image to a device
    Write {
        /// Image file to write (.img, .iso, .gz or .xz)
        #[arg(required = true)]
        image: PathBuf,

        /// Target device; selected interactively when omitted
        #[arg(short, long)]
        device: Option<PathBuf>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Read a device to an image file
    Read {
        /// Output image file; the compression suffix is added if missing
        image: Option<PathBuf>,

        /// Source device; selected interactively when omitted
        #[arg(short, long)]
        device: Option<PathBuf>,

        /// Compress the image; asked interactively when omitted
        #[arg(short, long, value_enum)]
        compress: Option<Codec>,

        /// Also offer internal (non-removable) drives
        #[arg(short, long)]
        all: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Compress a raw image, or decompress a .gz/.xz image, next to itself
    Convert {
        /// Image file to convert
        #[arg(required = true)]
        image: PathBuf,

        /// Codec used when compressing a raw image
        #[arg(short, long, value_enum, default_value_t = Codec::Gzip)]
        compress: Codec,
    },
    /// Stream a device to every client that connects over TCP
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 2222)]
        port: u16,

        /// Source device; selected interactively when omitted
        #[arg(short, long)]
        device: Option<PathBuf>,

        /// Compression applied to the stream
        #[arg(short, long, value_enum, default_value_t = Codec::Gzip)]
        compress: Codec,

        /// Also offer internal (non-removable) drives
        #[arg(short, long)]
        all: bool,
    },
    /// List available devices
    List {
        /// Include internal (non-removable) drives
        #[arg(short, long)]
        all: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Codec {
    None,
    Gzip,
    Xz,
}

impl From<Codec> for CompressionKind {
    fn from(codec: Codec) -> Self {
        match codec {
            Codec::None => CompressionKind::None,
            Codec::Gzip => CompressionKind::Gzip,
            Codec::Xz => CompressionKind::Xz,
        }
    }
}

fn parse_chunk_size(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("chunk size must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// State shared by every command.
struct Context {
    running: Arc<AtomicBool>,
    options: TransferOptions,
}

impl Context {
    fn open_source(&self, path: &Path) -> Result<TransferSource<Interruptible<File>>> {
        let running = self.running.clone();
        Ok(TransferSource::open(path)?.map_reader(|r| Interruptible::new(r, running)))
    }
}

/// A helper struct that, on Unix, disables `ECHOCTL` for the terminal.
///
/// `ECHOCTL` is the terminal flag that causes Ctrl+C to be printed as `^C`.
/// By disabling it, we can have a cleaner exit when the user cancels the
/// operation. The original terminal state is restored when this struct is dropped.
struct TermRestorer {
    #[cfg(unix)]
    original_termios: Option<Termios>,
}

impl TermRestorer {
    fn new() -> Self {
        #[cfg(unix)]
        {
            if !stdout().is_terminal() {
                return Self {
                    original_termios: None,
                };
            }

            let fd = stdout().as_raw_fd();
            let original_termios = Termios::from_fd(fd).ok().filter(|original| {
                let mut quiet = *original;
                quiet.c_lflag &= !ECHOCTL;
                tcsetattr(fd, TCSANOW, &quiet).is_ok()
            });
            Self { original_termios }
        }
        #[cfg(not(unix))]
        {
            Self {}
        }
    }
}

impl Drop for TermRestorer {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(ref original_termios) = self.original_termios {
            tcsetattr(stdout().as_raw_fd(), TCSANOW, original_termios).ok();
        }
    }
}

/// Uses the device at `explicit`, or lets the user pick an eligible one.
fn resolve_device(
    explicit: Option<PathBuf>,
    removable_only: bool,
    prompt: &str,
) -> Result<DeviceDescriptor> {
    if let Some(path) = explicit {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let size_bytes = TransferSource::open(&path)?.size().unwrap_or(0);
        return Ok(DeviceDescriptor {
            path,
            name,
            size_bytes,
            ..Default::default()
        });
    }

    let devices = device::list_devices(removable_only)?;
    ui::select_device(&devices, prompt)
}

fn default_image_name(device: &DeviceDescriptor) -> String {
    let base = if device.model.trim().is_empty() {
        device.name.as_str()
    } else {
        device.model.trim()
    };
    format!("{}.img", base.replace([' ', '/'], "_"))
}

/// Finishes `bar` according to `result`.
fn finish(
    bar: &ProgressBar,
    result: imgflow_core::Result<TransferResult>,
    done: &'static str,
) -> Result<TransferResult> {
    match result {
        Ok(result) => {
            bar.finish_with_message(done);
            Ok(result)
        }
        Err(e) => {
            bar.abandon_with_message("❌ Operation failed.");
            Err(e.into())
        }
    }
}

fn flash(ctx: &Context, image: PathBuf, device: Option<PathBuf>, assume_yes: bool) -> Result<()> {
    let device = resolve_device(device, true, "Select the target device to WRITE to")?;

    println!(
        "{} This will erase all data on '{}' ({}).",
        style("WARNING:").red().bold(),
        device.name,
        human_size(device.size_bytes),
    );
    println!("  Device: {}", style(device.path.display()).cyan());
    println!("  Image:  {}", style(image.display()).cyan());
    println!();

    if !assume_yes && !ui::confirm_operation("Are you sure you want to proceed?", false)? {
        println!("Write operation cancelled.");
        return Ok(());
    }

    println!();

    let source = ctx.open_source(&image)?;
    let bar = ui::transfer_bar("Writing");
    let result = write::run(
        source,
        &device.path,
        &ctx.options,
        |compression, total| {
            ui::start_bar(&bar, total, "green");
            if compression != CompressionKind::None {
                bar.set_message(format!("(decompressing {compression})"));
            }
        },
        |bytes| ui::track(&bar, bytes),
    );
    let result = finish(&bar, result, "Write complete.")?;

    println!(
        "\n✨ Successfully flashed {} with {} ({} written).",
        style(device.path.display()).cyan(),
        style(image.display()).cyan(),
        human_size(result.bytes_written),
    );
    Ok(())
}

fn backup(
    ctx: &Context,
    image: Option<PathBuf>,
    device: Option<PathBuf>,
    compress: Option<CompressionKind>,
    all: bool,
    assume_yes: bool,
) -> Result<()> {
    let device = resolve_device(device, !all, "Select the source device to READ from")?;

    let image = match image {
        Some(image) => image,
        None => ui::prompt_path("Output filename", &default_image_name(&device))?,
    };
    let compression = match compress {
        Some(kind) => kind,
        None if assume_yes => CompressionKind::None,
        None => {
            if ui::confirm_operation("Would you like to enable compression (gzip)?", false)? {
                CompressionKind::Gzip
            } else {
                CompressionKind::None
            }
        }
    };
    let image = compression.with_suffix(image);

    println!(
        "This will read {} from '{}'.",
        human_size(device.size_bytes),
        device.name
    );
    println!("  Device: {}", style(device.path.display()).cyan());
    println!("  Output: {}", style(image.display()).cyan());
    println!();

    if !assume_yes && !ui::confirm_operation("Are you sure you want to proceed?", false)? {
        println!("Read operation cancelled.");
        return Ok(());
    }

    println!();

    let source = ctx.open_source(&device.path)?;
    let bar = ui::transfer_bar("Reading");
    if compression != CompressionKind::None {
        bar.set_message(format!("(compressing {compression})"));
    }
    let result = read::run(
        source,
        &image,
        compression,
        &ctx.options,
        |total| ui::start_bar(&bar, total, "green"),
        |bytes| ui::track(&bar, bytes),
    );
    finish(&bar, result, "Read complete.")?;

    println!(
        "\n✨ Successfully read {} to {}.",
        style(device.path.display()).cyan(),
        style(image.display()).cyan()
    );
    Ok(())
}

fn convert_image(ctx: &Context, image: PathBuf, compress_with: CompressionKind) -> Result<()> {
    let plan = convert::plan(&image, compress_with)?;
    let (prefix, action) = match plan.decode {
        CompressionKind::None => ("Compress", format!("Compressing with {}", plan.encode)),
        kind => ("Decompress", format!("Decompressing {kind}")),
    };
    println!("{action}: {}", style(plan.target.display()).cyan());

    let source = ctx.open_source(&image)?;
    let bar = ui::transfer_bar(prefix);
    ui::start_bar(&bar, source.size(), "blue");
    let result = convert::run(source, &plan, &ctx.options, |bytes| ui::track(&bar, bytes));
    let result = finish(&bar, result, "Done.")?;

    println!(
        "\n✨ Wrote {} ({}).",
        style(plan.target.display()).cyan(),
        human_size(result.bytes_written)
    );
    Ok(())
}

fn serve(
    ctx: &Context,
    port: u16,
    device: Option<PathBuf>,
    compression: CompressionKind,
    all: bool,
) -> Result<()> {
    let device = resolve_device(device, !all, "Select the device to SERVE")?;
    println!(
        "Serving {} ({}) as a {} stream.",
        style(device.path.display()).cyan(),
        human_size(device.size_bytes),
        compression
    );
    serve::run(
        &device.path,
        port,
        compression,
        &ctx.options,
        ctx.running.clone(),
    )
}

fn list(all: bool) -> Result<()> {
    let devices = match device::list_devices(!all) {
        Ok(devices) => devices,
        Err(imgflow_core::Error::NoEligibleDevice { .. }) => {
            println!("No eligible devices found.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Found {} devices:", devices.len());
    println!(
        "\n  {:<14} {:<25} {:>10}  {:<10} {}",
        "DEVICE", "MODEL", "SIZE", "TYPE", "LOCATION"
    );
    println!("  {:-<14} {:-<25} {:->10}  {:-<10} {:-<20}", "", "", "", "", "");
    for device in devices {
        let location = if device.mount_point.is_empty() {
            "(Not mounted)".to_string()
        } else {
            device.mount_point.clone()
        };
        let kind = if device.removable { "removable" } else { "fixed" };
        println!(
            "  {:<14} {:<25} {:>10}  {:<10} {}",
            device.path.display(),
            device.model.replace('_', " "),
            human_size(device.size_bytes),
            kind,
            location
        );
    }
    Ok(())
}

/// The interactive menu shown when no subcommand is given.
///
/// A failed action is reported and the menu shown again; the loop ends on
/// "Exit" or after Ctrl+C.
fn menu(ctx: &Context) -> Result<()> {
    const ACTIONS: [&str; 4] = [
        "Flash / Restore image file to USB drive",
        "Backup drive to image file",
        "Compress / Decompress image file",
        "Exit",
    ];

    while ctx.running.load(Ordering::SeqCst) {
        let outcome = match ui::select_action("What do you want to do?", &ACTIONS)? {
            0 => ui::prompt_path("Image file to flash", "")
                .and_then(|image| flash(ctx, image, None, false)),
            1 => ui::confirm_operation("Do you want to list internal drives?", false)
                .and_then(|all| backup(ctx, None, None, None, all, false)),
            2 => ui::prompt_path("Image file to convert", "")
                .and_then(|image| convert_image(ctx, image, CompressionKind::Gzip)),
            _ => return Ok(()),
        };

        if let Err(e) = outcome {
            eprintln!("{} {e:#}", style("Error:").red().bold());
        }
        println!();
    }

    Ok(())
}

fn main() -> Result<()> {
    // This guard will be dropped when main() exits, restoring the terminal.
    let _term_restorer = TermRestorer::new();

    // Cleared by Ctrl+C; sources wrapped in `Interruptible` start failing.
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let cli = Cli::parse();
    logging::init(cli.verbose);

    let ctx = Context {
        running,
        options: TransferOptions {
            chunk_size: cli.chunk_size,
            compression_level: cli.level,
            sync_writes: !cli.no_sync_writes,
        },
    };

    match cli.command {
        None => menu(&ctx),
        Some(Commands::Write { image, device, yes }) => flash(&ctx, image, device, yes),
        Some(Commands::Read {
            image,
            device,
            compress,
            all,
            yes,
        }) => backup(&ctx, image, device, compress.map(Into::into), all, yes),
        Some(Commands::Convert { image, compress }) => convert_image(&ctx, image, compress.into()),
        Some(Commands::Serve {
            port,
            device,
            compress,
            all,
        }) => serve(&ctx, port, device, compress.into(), all),
        Some(Commands::List { all }) => list(all),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn chunk_size_must_be_positive() {
        assert_eq!(parse_chunk_size("4096"), Ok(4096));
        assert!(parse_chunk_size("0").is_err());
        assert!(parse_chunk_size("lots").is_err());
    }

    #[test]
    fn parses_backup_flags() {
        let cli = Cli::try_parse_from([
            "imgflow", "read", "out.img", "--compress", "xz", "--all", "-y", "--chunk-size", "512",
        ])
        .unwrap();
        assert_eq!(cli.chunk_size, 512);
        match cli.command {
            Some(Commands::Read {
                image,
                compress,
                all,
                yes,
                ..
            }) => {
                assert_eq!(image, Some(PathBuf::from("out.img")));
                assert_eq!(compress, Some(Codec::Xz));
                assert!(all && yes);
            }
            _ => panic!("expected the read command"),
        }
    }

    #[test]
    fn no_subcommand_means_menu() {
        let cli = Cli::try_parse_from(["imgflow"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.level, imgflow_core::stream::DEFAULT_LEVEL);
    }

    #[test]
    fn default_image_name_prefers_model() {
        let mut device = DeviceDescriptor {
            name: "sdb".to_string(),
            model: "Ultra Fit".to_string(),
            ..Default::default()
        };
        assert_eq!(default_image_name(&device), "Ultra_Fit.img");

        device.model.clear();
        assert_eq!(default_image_name(&device), "sdb.img");
    }
}
