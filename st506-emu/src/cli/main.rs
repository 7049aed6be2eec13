use clap::{Arg, ArgAction, ArgMatches, Command, value_parser, ValueEnum};
use log::{info, LevelFilter};
use simplelog::{ConfigBuilder, LevelPadding, WriteLogger};
use std::fs::File;
use std::io::{self, Write};
use time::macros::format_description;

use st506_emu::{check_image, FileStorage, Geometry, SECTORS_PER_TRACK, Storage};
use st506_utils::hexdump::{blank_rows, hex_dump, ROW_BYTES};

const IMAGE_PATH: &str = "IMAGE";
const FORCE: &str = "force";
const CYLINDER: &str = "cylinder";
const HEAD: &str = "head";
const OFFSET: &str = "offset";
const LENGTH: &str = "length";
const SQUEEZE: &str = "squeeze";
const LOG_PATH: &str = "log-path";
const LOG_LEVEL: &str = "log-level";

const DEFAULT_DUMP_LENGTH: usize = 256;

/// Possible log levels.
#[derive(Debug, PartialEq, Eq, Copy, Clone, ValueEnum)]
enum LogLevel {
    TRACE,
    DEBUG,
    INFO,
}

fn image_arg() -> Arg {
    Arg::new(IMAGE_PATH)
        .help("Path to the drive image file.")
        .action(ArgAction::Set)
        .required(true)
}

fn cli() -> Command {
    // Hack to make the build dirty when the toml changes.
    include_str!("../../Cargo.toml");

    clap::command!()
        .max_term_width(100)
        .subcommand_required(true)
        .after_help("\
Image tooling for the ST-506 drive emulator. Images are raw MFM track data, \
cylinder-major then head-major, and must be exactly the size of the emulated \
drive.")
        .arg(Arg::new(LOG_PATH)
            .help("If set, a debug log will be written to the given path.")
            .short('l')
            .long("log")
            .action(ArgAction::Set)
            .global(true))
        .arg(Arg::new(LOG_LEVEL)
            .help("Set the log level. Has no effect without \
                   specifying --log as well. Case insensitive.")
            .short('L')
            .long("log-level")
            .action(ArgAction::Set)
            .default_value("trace")
            .value_parser(value_parser!(LogLevel))
            .ignore_case(true)
            .global(true))
        .subcommand(Command::new("create")
            .about("Create a blank image of the correct size.")
            .arg(image_arg())
            .arg(Arg::new(FORCE)
                .help("Overwrite the image if it already exists.")
                .short('f')
                .long("force")
                .action(ArgAction::SetTrue)))
        .subcommand(Command::new("check")
            .about("Check that an image can be used by the emulator.")
            .arg(image_arg()))
        .subcommand(Command::new("dump")
            .about("Hex dump part of one raw track of an image.")
            .arg(image_arg())
            .arg(Arg::new(CYLINDER)
                .help("Cylinder to dump.")
                .short('c')
                .long("cylinder")
                .action(ArgAction::Set)
                .required(true)
                .value_parser(value_parser!(u32)))
            .arg(Arg::new(HEAD)
                .help("Head to dump.")
                .short('H')
                .long("head")
                .action(ArgAction::Set)
                .required(true)
                .value_parser(value_parser!(u32)))
            .arg(Arg::new(OFFSET)
                .help("Byte offset within the track to start from.")
                .short('o')
                .long("offset")
                .action(ArgAction::Set)
                .default_value("0")
                .value_parser(value_parser!(usize)))
            .arg(Arg::new(LENGTH)
                .help("Number of bytes to dump; clipped to the end of the track.")
                .short('n')
                .long("length")
                .action(ArgAction::Set)
                .value_parser(value_parser!(usize)))
            .arg(Arg::new(SQUEEZE)
                .help("Skip leading rows of zeros.")
                .short('s')
                .long("squeeze")
                .action(ArgAction::SetTrue)))
}

/// Initialise logging to the given file.
fn init_logging(logfile: File, level: LevelFilter) -> Result<(), String> {
    let config = ConfigBuilder::new()
        .set_level_padding(LevelPadding::Right)
        .set_location_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .set_time_format_custom(format_description!(
            "[hour]:[minute]:[second].[subsecond digits:6]"))
        .build();

    WriteLogger::init(level, config, logfile)
        .map_err(|e| format!("Failed to initialise logging: {}", e))
}

fn create(args: &ArgMatches, geometry: Geometry, out: &mut dyn Write) -> Result<(), String> {
    let path = args.get_one::<String>(IMAGE_PATH).unwrap();
    let force = args.get_flag(FORCE);
    FileStorage::create(path, geometry.image_bytes(), force)
        .map_err(|e| format!("Failed to create image '{}': {}", path, e))?;
    writeln!(out, "Created '{}' ({} bytes).", path, geometry.image_bytes())
        .map_err(|e| e.to_string())
}

fn check(args: &ArgMatches, geometry: Geometry, out: &mut dyn Write) -> Result<(), String> {
    let path = args.get_one::<String>(IMAGE_PATH).unwrap();
    let storage = FileStorage::open(path)
        .map_err(|e| format!("Failed to open image '{}': {}", path, e))?;
    check_image(&storage, geometry)
        .map_err(|e| format!("Image '{}' is unusable: {}", path, e))?;
    writeln!(out, "'{}' is a valid image: {} cylinders, {} heads, \
                   {} sectors and {} raw bytes per track.",
             path, geometry.cylinders(), geometry.heads(),
             SECTORS_PER_TRACK, geometry.track_bytes())
        .map_err(|e| e.to_string())
}

fn dump(args: &ArgMatches, geometry: Geometry, out: &mut dyn Write) -> Result<(), String> {
    let path = args.get_one::<String>(IMAGE_PATH).unwrap();
    let cylinder = *args.get_one::<u32>(CYLINDER).unwrap();
    let head = *args.get_one::<u32>(HEAD).unwrap();
    let offset = *args.get_one::<usize>(OFFSET).unwrap();
    if cylinder >= geometry.cylinders() {
        return Err(format!("Cylinder {} out of range (the drive has {}).",
                           cylinder, geometry.cylinders()));
    }
    if head >= geometry.heads() {
        return Err(format!("Head {} out of range (the drive has {}).",
                           head, geometry.heads()));
    }
    if offset >= geometry.track_bytes() {
        return Err(format!("Offset {} is past the end of the {} byte track.",
                           offset, geometry.track_bytes()));
    }
    let length = args.get_one::<usize>(LENGTH).copied()
        .unwrap_or(DEFAULT_DUMP_LENGTH)
        .min(geometry.track_bytes() - offset);

    let mut storage = FileStorage::open(path)
        .map_err(|e| format!("Failed to open image '{}': {}", path, e))?;
    check_image(&storage, geometry)
        .map_err(|e| format!("Image '{}' is unusable: {}", path, e))?;
    let start = geometry.cylinder_offset(cylinder)
        + (geometry.track_offset(head) + offset) as u64;
    let mut buf = vec![0; length];
    storage.read_range(start, &mut buf, &|| false)
        .map_err(|e| format!("Failed to read image '{}': {}", path, e))?;
    info!("Dumping {} bytes of cylinder {} head {} from offset {}.",
          length, cylinder, head, offset);

    let skip = if args.get_flag(SQUEEZE) { blank_rows(&buf, 0) } else { 0 };
    let shown = (skip * ROW_BYTES).min(buf.len());
    if skip > 0 {
        writeln!(out, "({} rows of zeros skipped)", skip).map_err(|e| e.to_string())?;
    }
    if shown < buf.len() {
        writeln!(out, "{}", hex_dump(&buf[shown..], (offset + shown) as u64))
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Main run function; returns an exit code.
fn run(args: ArgMatches, out: &mut dyn Write) -> u8 {
    return match _run(args, out) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    fn _run(args: ArgMatches, out: &mut dyn Write) -> Result<(), String> {
        // Initialise logging if configured.
        if let Some(log_path) = args.get_one::<String>(LOG_PATH) {
            let logfile = File::create(log_path)
                .map_err(|e| format!("Failed to create log file: {}", e))?;
            let level = match args.get_one::<LogLevel>(LOG_LEVEL).unwrap() {
                LogLevel::TRACE => LevelFilter::Trace,
                LogLevel::DEBUG => LevelFilter::Debug,
                LogLevel::INFO => LevelFilter::Info,
            };
            init_logging(logfile, level)?;
        }

        let geometry = Geometry::ST506;
        match args.subcommand() {
            Some(("create", sub)) => create(sub, geometry, out),
            Some(("check", sub)) => check(sub, geometry, out),
            Some(("dump", sub)) => dump(sub, geometry, out),
            _ => unreachable!(),
        }
    }
}

fn main() {
    let args = cli().get_matches();
    std::process::exit(run(args, &mut io::stdout()).into());
}
