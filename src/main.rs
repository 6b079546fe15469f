use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use lockstep::{Console, ConsoleStatus, EmuConfig};

/// Run an iNES image headless for a number of frames and report CPU state.
#[derive(Parser, Debug)]
#[command(name = "lockstep")]
#[command(about = "Cycle-locked NES core runner", long_about = None)]
struct Args {
    /// Path to the iNES ROM file
    #[arg(short, long)]
    rom: PathBuf,

    /// Frames to run
    #[arg(short, long, default_value_t = 60)]
    frames: u32,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sleep between frames to run at console speed (scaled by the config's
    /// speed multiplier)
    #[arg(long)]
    pace: bool,
}

fn run(args: &Args) -> lockstep::Result<()> {
    let config = match &args.config {
        Some(path) => EmuConfig::load(path)?,
        None => EmuConfig::default(),
    };

    let mut console = Console::new(config);
    console.load_rom(&args.rom)?;
    console.power_on();

    let started = Instant::now();
    for _ in 0..args.frames {
        let frame_start = Instant::now();
        console.run_frame()?;
        if console.is_jammed() {
            break;
        }
        if args.pace {
            let budget = console.clock().frame_duration();
            if let Some(left) = budget.checked_sub(frame_start.elapsed()) {
                std::thread::sleep(left);
            }
        }
    }

    let regs = console.registers();
    log::info!(
        "ran {} frames ({} ticks) in {:.2?}",
        console.frames(),
        console.clock().ticks(),
        started.elapsed()
    );
    println!(
        "A:{:02X} X:{:02X} Y:{:02X} SP:{:02X} PC:{:04X} P:{:08b}",
        regs.a, regs.x, regs.y, regs.sp, regs.pc, regs.p
    );
    println!("frames: {}", console.frames());
    match console.status() {
        ConsoleStatus::Jammed => println!(
            "status: jammed (opcode ${:02X})",
            console.cpu().jam_opcode().unwrap_or_default()
        ),
        status => println!("status: {status:?}"),
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("lockstep: {e}");
            ExitCode::FAILURE
        }
    }
}
