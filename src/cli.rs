use anyhow::Result;
use std::net::Ipv4Addr;

#[derive(Debug, PartialEq, Eq)]
pub enum CliCommand {
    Scan {
        interface: Option<String>,
        json: bool,
    },
    Watch {
        interface: Option<String>,
        interval_secs: Option<u64>,
    },
    Probe {
        ip: Ipv4Addr,
    },
    Ports {
        ip: Ipv4Addr,
    },
    Wake {
        mac: String,
    },
    Interfaces,
    Help,
    Version,
}

pub fn version_text() -> String {
    format!("lanscout {}", env!("CARGO_PKG_VERSION"))
}

pub fn usage_text() -> String {
    format!(
        "{version}
LAN device discovery and inspection engine

Usage:
  lanscout [scan] [--interface <NAME>] [--json]
  lanscout watch [--interface <NAME>] [--interval <SECS>]
  lanscout probe <IP>
  lanscout ports <IP>
  lanscout wake <MAC>
  lanscout interfaces
  lanscout --help
  lanscout --version

Commands:
  scan        Run one discovery cycle and print the devices found
  watch       Scan continuously, streaming device events until Ctrl-C
  probe       Deep-probe one host (reverse DNS, banners, HTTP, NBSTAT, OS)
  ports       TCP port scan one host
  wake        Send a Wake-on-LAN magic packet
  interfaces  List network interfaces

Options:
  -i, --interface <NAME>  Select network interface by exact name
      --interval <SECS>   Watch: seconds between scan cycles
      --json              Scan: emit devices as JSON instead of a table
  -h, --help              Show this help text
  -V, --version           Show version",
        version = version_text()
    )
}

fn parse_ip_arg(command: &str, raw: Option<String>) -> Result<Ipv4Addr> {
    let raw = raw.ok_or_else(|| {
        anyhow::anyhow!("Missing <IP> argument for {}.\n\n{}", command, usage_text())
    })?;
    raw.parse::<Ipv4Addr>().map_err(|_| {
        anyhow::anyhow!(
            "Invalid IPv4 address '{}' for {}.\n\n{}",
            raw,
            command,
            usage_text()
        )
    })
}

fn parse_u64_arg(flag: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>().ok().filter(|v| *v > 0).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid value for {}: '{}'. Expected a positive integer.\n\n{}",
            flag,
            raw,
            usage_text()
        )
    })
}

pub fn parse_cli_args<I, S>(args: I) -> Result<CliCommand>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut iter = args.into_iter();
    // Skip the program name.
    iter.next();

    let mut command: Option<String> = None;
    let mut positional: Option<String> = None;
    let mut interface: Option<String> = None;
    let mut interval_secs: Option<u64> = None;
    let mut json = false;

    while let Some(arg) = iter.next() {
        let arg = arg.as_ref();
        match arg {
            "-h" | "--help" => return Ok(CliCommand::Help),
            "-V" | "--version" => return Ok(CliCommand::Version),
            "-i" | "--interface" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("Missing value for {}.\n\n{}", arg, usage_text())
                })?;
                interface = Some(value.as_ref().to_string());
            }
            "--interval" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("Missing value for --interval.\n\n{}", usage_text())
                })?;
                interval_secs = Some(parse_u64_arg("--interval", value.as_ref())?);
            }
            "--json" => json = true,
            other if other.starts_with('-') => {
                return Err(anyhow::anyhow!(
                    "Unknown option '{}'.\n\n{}",
                    other,
                    usage_text()
                ));
            }
            other => {
                if command.is_none() {
                    command = Some(other.to_string());
                } else if positional.is_none() {
                    positional = Some(other.to_string());
                } else {
                    return Err(anyhow::anyhow!(
                        "Unexpected argument '{}'.\n\n{}",
                        other,
                        usage_text()
                    ));
                }
            }
        }
    }

    match command.as_deref() {
        None | Some("scan") => Ok(CliCommand::Scan { interface, json }),
        Some("watch") => Ok(CliCommand::Watch {
            interface,
            interval_secs,
        }),
        Some("probe") => Ok(CliCommand::Probe {
            ip: parse_ip_arg("probe", positional)?,
        }),
        Some("ports") => Ok(CliCommand::Ports {
            ip: parse_ip_arg("ports", positional)?,
        }),
        Some("wake") => {
            let mac = positional.ok_or_else(|| {
                anyhow::anyhow!("Missing <MAC> argument for wake.\n\n{}", usage_text())
            })?;
            Ok(CliCommand::Wake { mac })
        }
        Some("interfaces") => Ok(CliCommand::Interfaces),
        Some(other) => Err(anyhow::anyhow!(
            "Unknown command '{}'.\n\n{}",
            other,
            usage_text()
        )),
    }
}
