//! Subcommand implementations

use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use grbl_detect::{
    is_grbl_candidate, ConnectionConfig, DetectError, DeviceDescriptor, Handshake, PortScanner,
    PortSource,
};
use grbl_protocol::{terminated, LineTransport, BUILD_INFO};
use grbl_session::{connect, ExchangeLog, FileLog, NullLog, Session};
use grbl_sim::SimulatedGrbl;
use tracing::info;

use crate::cli::{Cli, Commands};

/// Port name reported for the simulated controller
pub const SIMULATED_PORT: &str = "sim://grbl";

/// What to do once a session is open
enum Exchange<'a> {
    Info,
    Query(&'a str),
    Send(&'a [String]),
}

/// Execute the parsed command line, writing results to `out`
pub fn run(cli: &Cli, out: &mut impl Write) -> Result<()> {
    let exchange = match &cli.command {
        Some(Commands::Ports { json }) => {
            return if cli.simulate {
                list_ports(&PortScanner::with_source(simulated_ports()), *json, out)
            } else {
                list_ports(&PortScanner::new(), *json, out)
            };
        }
        None | Some(Commands::Info) => Exchange::Info,
        Some(Commands::Query { command }) => Exchange::Query(command),
        Some(Commands::Send { commands }) => Exchange::Send(commands),
    };

    let log = exchange_log(cli);
    if cli.simulate {
        let handshake = Handshake::with_opener(open_simulator).with_boot_delay(Duration::ZERO);
        let session = connect(&PortScanner::with_source(simulated_ports()), &handshake, log)?;
        drive(session, exchange, out)
    } else {
        let session = connect(&PortScanner::new(), &Handshake::new(), log)?;
        drive(session, exchange, out)
    }
}

/// Print every serial port, marking the first controller candidate with `*`
pub fn list_ports<S: PortSource>(
    scanner: &PortScanner<S>,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let ports = scanner
        .enumerate_ports()
        .context("failed to enumerate serial ports")?;

    if json {
        serde_json::to_writer_pretty(&mut *out, &ports)?;
        writeln!(out)?;
        return Ok(());
    }

    if ports.is_empty() {
        writeln!(out, "No serial ports found")?;
        return Ok(());
    }

    let candidate = ports.iter().position(is_grbl_candidate);
    for (index, port) in ports.iter().enumerate() {
        let marker = if Some(index) == candidate { '*' } else { ' ' };
        writeln!(out, "{} {:<24} {}", marker, port.port, port.description)?;
    }
    Ok(())
}

fn drive<T: LineTransport>(
    session: Option<Session<T>>,
    exchange: Exchange<'_>,
    out: &mut impl Write,
) -> Result<()> {
    let Some(mut session) = session else {
        bail!("no GRBL controller found");
    };

    match exchange {
        Exchange::Info => {
            let version = session.query(BUILD_INFO).unwrap_or_default();
            writeln!(out, "ver: {}", version)?;
        }
        Exchange::Query(command) => {
            let reply = session.query(&terminated(command)).unwrap_or_default();
            writeln!(out, "{}", reply)?;
        }
        Exchange::Send(commands) => {
            for command in commands {
                session.command(&terminated(command))?;
                info!("ok {}", command);
            }
        }
    }

    session.close();
    Ok(())
}

fn exchange_log(cli: &Cli) -> Box<dyn ExchangeLog> {
    if cli.log {
        Box::new(FileLog::new(&cli.log_file))
    } else {
        Box::new(NullLog)
    }
}

fn simulated_ports() -> Vec<DeviceDescriptor> {
    vec![DeviceDescriptor::new(SIMULATED_PORT, "Simulated GRBL USB Serial")]
}

fn open_simulator(_port: &str, _config: &ConnectionConfig) -> Result<SimulatedGrbl, DetectError> {
    Ok(SimulatedGrbl::controller())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn run_args(args: &[&str]) -> (Result<()>, String) {
        let cli = Cli::parse_from(args.iter().copied());
        let mut out = Vec::new();
        let result = run(&cli, &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_list_ports_marks_candidate() {
        let scanner = PortScanner::with_source(vec![
            DeviceDescriptor::new("/dev/ttyS0", "n/a"),
            DeviceDescriptor::new("/dev/ttyACM0", "Arduino Uno"),
            DeviceDescriptor::new("/dev/ttyACM1", "Arduino Mega"),
        ]);
        let mut out = Vec::new();
        list_ports(&scanner, false, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("  /dev/ttyS0"));
        assert!(lines[1].starts_with("* /dev/ttyACM0"));
        assert!(lines[2].starts_with("  /dev/ttyACM1"));
    }

    #[test]
    fn test_list_ports_json() {
        let scanner = PortScanner::with_source(vec![DeviceDescriptor::new(
            "/dev/ttyUSB0",
            "FTDI USB Serial",
        )]);
        let mut out = Vec::new();
        list_ports(&scanner, true, &mut out).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed[0]["port"], "/dev/ttyUSB0");
        assert_eq!(parsed[0]["description"], "FTDI USB Serial");
        assert!(parsed[0]["vid"].is_null());
    }

    #[test]
    fn test_list_ports_empty() {
        let mut out = Vec::new();
        list_ports(&PortScanner::with_source(Vec::new()), false, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No serial ports found\n");
    }

    #[test]
    fn test_simulated_info() {
        let (result, out) = run_args(&["grblctl", "--simulate", "info"]);
        assert!(result.is_ok());
        assert_eq!(out, "ver: [VER:1.1h.20190825:]\n");
    }

    #[test]
    fn test_simulated_default_is_info() {
        let (result, out) = run_args(&["grblctl", "--simulate"]);
        assert!(result.is_ok());
        assert!(out.starts_with("ver: "));
    }

    #[test]
    fn test_simulated_query_adds_terminator() {
        let (result, out) = run_args(&["grblctl", "--simulate", "query", "$G"]);
        assert!(result.is_ok());
        assert!(out.starts_with("[GC:"));
    }

    #[test]
    fn test_simulated_send() {
        let (result, out) = run_args(&["grblctl", "--simulate", "send", "G0 X10", "M5"]);
        assert!(result.is_ok());
        assert!(out.is_empty());
    }

    #[test]
    fn test_simulated_ports() {
        let (result, out) = run_args(&["grblctl", "--simulate", "ports"]);
        assert!(result.is_ok());
        assert!(out.starts_with(&format!("* {}", SIMULATED_PORT)));
    }

    #[test]
    fn test_simulated_session_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("serial.log");
        let cli = Cli::parse_from([
            "grblctl",
            "--simulate",
            "--log",
            "--log-file",
            path.to_str().unwrap(),
            "send",
            "G0 X1",
        ]);
        run(&cli, &mut Vec::<u8>::new()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("SEND\nG90<0D>\n"));
        assert!(contents.contains("SEND\nG0 X1<0D>\n"));
    }
}
