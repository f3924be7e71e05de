use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use log::info;

use diskpanel::conf::Conf;
use diskpanel::io::dev::DiskDevice;
use diskpanel::io::pass::EraseFill;
use diskpanel::io::sim;
use diskpanel::job::supervisor::Supervisor;
use diskpanel::ui::App;
use diskpanel::{logging, lsblk};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Fill {
    Zero,
    Pattern,
    Random,
}

impl From<Fill> for EraseFill {
    fn from(f: Fill) -> Self {
        match f {
            Fill::Zero => EraseFill::Zero,
            Fill::Pattern => EraseFill::Pattern,
            Fill::Random => EraseFill::Random,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// ignore q and ctrl-c, for kiosk setups
    #[arg(long)]
    no_quit: bool,

    /// what erase writes
    #[arg(long, value_enum, default_value = "zero")]
    fill: Fill,

    /// blocks slower than this count as slow
    #[arg(long, default_value_t = 50)]
    slow_ms: u64,

    /// use these devices instead of asking lsblk, may repeat
    #[arg(long = "device", value_name = "PATH")]
    devices: Vec<PathBuf>,

    /// run against N simulated disks
    #[arg(long, value_name = "N")]
    simulate: Option<usize>,

    /// append log records to this file, nothing is logged without it
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

fn pick_devices(cli: &Cli) -> anyhow::Result<Vec<Arc<dyn DiskDevice>>> {
    if let Some(n) = cli.simulate {
        return Ok(sim::demo_disks(n));
    }
    if !cli.devices.is_empty() {
        return Ok(lsblk::open_disks(&cli.devices));
    }
    lsblk::discover().context("enumerate disks")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_file.as_deref())?;

    let mut conf = Conf::default();
    conf.quit_enabled = !cli.no_quit;
    conf.erase_fill = cli.fill.into();
    conf.slow_threshold = Duration::from_millis(cli.slow_ms);
    conf.validate()?;
    let conf = Arc::new(conf);

    let devices = pick_devices(&cli)?;
    info!("{} devices",devices.len());
    let sup = Supervisor::new(devices, conf.clone()).context("set up supervisor")?;
    App::new(sup, conf).run()
}
