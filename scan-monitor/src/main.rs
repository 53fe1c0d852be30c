#![deny(unsafe_code)]

use std::error::Error;
use std::fs::OpenOptions;
use std::io::{BufWriter, Read, Write};

use anyhow::Result;
use clap::Parser;
use scanner::encode::{PointDecoder, NO_DISTANCE};

/// Print points streamed by the scanner
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Serial port or capture file
    #[arg(short, default_value = "/dev/ttyACM0")]
    serial_port: std::path::PathBuf,
    /// Stop after this many points
    #[arg(short = 'n', long)]
    count: Option<usize>,
    /// Also print points without reflection
    #[arg(short, long)]
    all: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum MonitorError {
    StreamClosed(usize),
}

impl std::fmt::Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorError::StreamClosed(points) => {
                f.write_fmt(format_args!("StreamClosed({})", points))
            }
        }
    }
}

impl Error for MonitorError {}

fn format_point(azimuth: i16, distance: u16) -> String {
    format!("{:.1} {}", azimuth as f32 / 10.0, distance)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut device = OpenOptions::new().read(true).open(&args.serial_port)?;
    let mut out = BufWriter::new(std::io::stdout().lock());
    let mut decoder = PointDecoder::new();
    let mut points = 0;
    let mut buf = [0; 256];

    loop {
        let len = device.read(&mut buf)?;
        if len == 0 {
            out.flush()?;
            // A capture file just ends, a device shouldn't.
            if args.count.is_some() {
                Err(MonitorError::StreamClosed(points))?;
            }
            return Ok(());
        }

        for &c in &buf[..len] {
            let (azimuth, distance) = match decoder.push(c) {
                Some(point) => point,
                None => continue,
            };

            points += 1;
            if distance != NO_DISTANCE || args.all {
                writeln!(out, "{}", format_point(azimuth, distance))?;
            }

            if args.count == Some(points) {
                out.flush()?;
                return Ok(());
            }
        }
    }
}
