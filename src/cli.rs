use anyhow::Result;
use std::path::PathBuf;

use crate::config::{ModuleSet, SSH_DEFAULT_DEVICE_TYPE};

/// Overrides shared by the crawl commands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlOptions {
    pub community: Option<String>,
    pub modules: Option<ModuleSet>,
    pub db: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Discover {
        seed: String,
        options: CrawlOptions,
    },
    Rescan {
        options: CrawlOptions,
    },
    SshProbe {
        address: String,
        username: Option<String>,
        password: Option<String>,
        device_type: String,
        db: Option<PathBuf>,
    },
    Summary {
        db: Option<PathBuf>,
    },
    Help,
    Version,
}

pub(crate) fn version_text() -> String {
    format!("nexus-inventory {}", env!("CARGO_PKG_VERSION"))
}

pub(crate) fn usage_text() -> String {
    format!(
        "{version}
NEXUS Inventory: SNMP/LLDP/CDP topology crawler

Usage:
  nexus-inventory discover <SEED> [--community <C>] [--modules <LIST>] [--db <PATH>]
  nexus-inventory rescan [--community <C>] [--modules <LIST>] [--db <PATH>]
  nexus-inventory ssh-probe <ADDR> [--user <U>] [--password <P>] [--device-type <T>] [--db <PATH>]
  nexus-inventory summary [--db <PATH>]
  nexus-inventory --help
  nexus-inventory --version

Options:
  -c, --community <C>     SNMP community for this crawl (default: $NEXUS_SNMP_COMMUNITY or public)
  -m, --modules <LIST>    Comma-separated subset of arp,cdp,lldp,ospf,ospfv3,bgp
      --db <PATH>         Inventory database file
  -u, --user <U>          SSH user name (default: the device's configured login)
  -p, --password <P>      SSH password (uses sshpass; key auth when omitted)
      --device-type <T>   SSH device type (default: {device_type})
  -h, --help              Show this help text
  -V, --version           Show version",
        version = version_text(),
        device_type = SSH_DEFAULT_DEVICE_TYPE,
    )
}

fn missing_value(flag: &str) -> anyhow::Error {
    anyhow::anyhow!("Missing value for {}.\n\n{}", flag, usage_text())
}

/// Value of `flag`, either inline (`--flag=value`) or the next argument
fn flag_value<I, S>(flag: &str, inline: Option<&str>, iter: &mut I) -> Result<String>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    let value = match inline {
        Some(value) => value.to_string(),
        None => iter
            .next()
            .map(|v| v.as_ref().to_string())
            .ok_or_else(|| missing_value(flag))?,
    };
    if value.trim().is_empty() {
        return Err(missing_value(flag));
    }
    Ok(value)
}

fn parse_modules_arg(raw: &str) -> Result<ModuleSet> {
    ModuleSet::parse(raw).map_err(|e| anyhow::anyhow!("Invalid --modules: {}\n\n{}", e, usage_text()))
}

pub(crate) fn parse_cli_args<I, S>(args: I) -> Result<CliCommand>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut iter = args.into_iter();
    let _program_name = iter.next();

    let mut command: Option<String> = None;
    let mut target: Option<String> = None;
    let mut community: Option<String> = None;
    let mut modules: Option<ModuleSet> = None;
    let mut db: Option<PathBuf> = None;
    let mut username: Option<String> = None;
    let mut password: Option<String> = None;
    let mut device_type: Option<String> = None;

    while let Some(arg) = iter.next() {
        let arg = arg.as_ref().to_string();
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value)),
            _ => (arg.clone(), None),
        };

        match flag.as_str() {
            "-h" | "--help" => return Ok(CliCommand::Help),
            "-V" | "--version" => return Ok(CliCommand::Version),
            "-c" | "--community" => community = Some(flag_value("--community", inline, &mut iter)?),
            "-m" | "--modules" => {
                modules = Some(parse_modules_arg(&flag_value("--modules", inline, &mut iter)?)?)
            }
            "--db" => db = Some(PathBuf::from(flag_value("--db", inline, &mut iter)?)),
            "-u" | "--user" => username = Some(flag_value("--user", inline, &mut iter)?),
            "-p" | "--password" => password = Some(flag_value("--password", inline, &mut iter)?),
            "--device-type" => device_type = Some(flag_value("--device-type", inline, &mut iter)?),
            "discover" | "rescan" | "ssh-probe" | "summary" if command.is_none() => {
                command = Some(flag.clone());
            }
            "discover" | "rescan" | "ssh-probe" | "summary" => {
                return Err(anyhow::anyhow!(
                    "Multiple commands provided. Use only one command.\n\n{}",
                    usage_text()
                ));
            }
            _ if flag.starts_with('-') => {
                return Err(anyhow::anyhow!("Unknown argument: {arg}\n\n{}", usage_text()));
            }
            _ if command.is_some() && target.is_none() => target = Some(arg),
            _ => {
                return Err(anyhow::anyhow!("Unexpected argument: {arg}\n\n{}", usage_text()));
            }
        }
    }

    let crawl_flags = community.is_some() || modules.is_some();
    let ssh_flags = username.is_some() || password.is_some() || device_type.is_some();

    match command.as_deref() {
        Some("discover") => {
            if ssh_flags {
                return Err(anyhow::anyhow!(
                    "--user/--password/--device-type are only valid with ssh-probe.\n\n{}",
                    usage_text()
                ));
            }
            let seed = target.ok_or_else(|| {
                anyhow::anyhow!("discover requires a seed address.\n\n{}", usage_text())
            })?;
            Ok(CliCommand::Discover {
                seed,
                options: CrawlOptions {
                    community,
                    modules,
                    db,
                },
            })
        }
        Some("rescan") => {
            if ssh_flags || target.is_some() {
                return Err(anyhow::anyhow!(
                    "rescan takes no address and no SSH options.\n\n{}",
                    usage_text()
                ));
            }
            Ok(CliCommand::Rescan {
                options: CrawlOptions {
                    community,
                    modules,
                    db,
                },
            })
        }
        Some("ssh-probe") => {
            if crawl_flags {
                return Err(anyhow::anyhow!(
                    "--community/--modules are not valid with ssh-probe.\n\n{}",
                    usage_text()
                ));
            }
            let address = target.ok_or_else(|| {
                anyhow::anyhow!("ssh-probe requires an address.\n\n{}", usage_text())
            })?;
            Ok(CliCommand::SshProbe {
                address,
                username,
                password,
                device_type: device_type.unwrap_or_else(|| SSH_DEFAULT_DEVICE_TYPE.to_string()),
                db,
            })
        }
        Some("summary") => {
            if crawl_flags || ssh_flags || target.is_some() {
                return Err(anyhow::anyhow!(
                    "summary only accepts --db.\n\n{}",
                    usage_text()
                ));
            }
            Ok(CliCommand::Summary { db })
        }
        _ => Err(anyhow::anyhow!("No command given.\n\n{}", usage_text())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryModule;

    #[test]
    fn parse_help_flag() {
        let parsed = parse_cli_args(["nexus-inventory", "--help"]).expect("help args should parse");
        assert_eq!(parsed, CliCommand::Help);
    }

    #[test]
    fn parse_version_flag() {
        let parsed =
            parse_cli_args(["nexus-inventory", "-V"]).expect("version args should parse");
        assert_eq!(parsed, CliCommand::Version);
    }

    #[test]
    fn parse_discover_with_options() {
        let args = [
            "nexus-inventory",
            "discover",
            "10.0.0.1",
            "--community",
            "s3cret",
            "--modules=lldp,ospf",
            "--db",
            "/tmp/inv.db",
        ];
        let parsed = parse_cli_args(args).expect("discover should parse");
        let CliCommand::Discover { seed, options } = parsed else {
            panic!("expected discover, got {parsed:?}");
        };
        assert_eq!(seed, "10.0.0.1");
        assert_eq!(options.community.as_deref(), Some("s3cret"));
        let modules = options.modules.expect("modules should be set");
        assert!(modules.contains(DiscoveryModule::Lldp));
        assert!(modules.contains(DiscoveryModule::Ospf));
        assert!(!modules.contains(DiscoveryModule::Arp));
        assert_eq!(options.db, Some(PathBuf::from("/tmp/inv.db")));
    }

    #[test]
    fn parse_discover_requires_seed() {
        let err = parse_cli_args(["nexus-inventory", "discover"]).expect_err("seed is required");
        assert!(err.to_string().contains("requires a seed"));
    }

    #[test]
    fn parse_rejects_unknown_module() {
        let err = parse_cli_args(["nexus-inventory", "discover", "10.0.0.1", "-m", "stp"])
            .expect_err("unknown module should fail");
        assert!(err.to_string().contains("Invalid --modules"));
    }

    #[test]
    fn parse_rescan_rejects_address() {
        let err = parse_cli_args(["nexus-inventory", "rescan", "10.0.0.1"])
            .expect_err("rescan takes no address");
        assert!(err.to_string().contains("rescan takes no address"));
    }

    #[test]
    fn parse_ssh_probe_defaults_device_type() {
        let parsed = parse_cli_args(["nexus-inventory", "ssh-probe", "10.0.0.9", "-u", "admin"])
            .expect("ssh-probe should parse");
        assert_eq!(
            parsed,
            CliCommand::SshProbe {
                address: "10.0.0.9".to_string(),
                username: Some("admin".to_string()),
                password: None,
                device_type: "cisco_ios".to_string(),
                db: None,
            }
        );
    }

    #[test]
    fn parse_ssh_probe_requires_address() {
        let err = parse_cli_args(["nexus-inventory", "ssh-probe", "-u", "admin"])
            .expect_err("address is required");
        assert!(err.to_string().contains("requires an address"));
    }

    #[test]
    fn parse_crawl_flags_rejected_on_ssh_probe() {
        let err = parse_cli_args([
            "nexus-inventory",
            "ssh-probe",
            "10.0.0.9",
            "--user",
            "admin",
            "--community",
            "x",
        ])
        .expect_err("community is not an ssh option");
        assert!(err.to_string().contains("not valid with ssh-probe"));
    }

    #[test]
    fn parse_summary_command() {
        let parsed = parse_cli_args(["nexus-inventory", "summary"]).expect("summary should parse");
        assert_eq!(parsed, CliCommand::Summary { db: None });
    }

    #[test]
    fn parse_multiple_commands_errors() {
        let err = parse_cli_args(["nexus-inventory", "summary", "rescan"])
            .expect_err("two commands should fail");
        assert!(err.to_string().contains("Multiple commands"));
    }

    #[test]
    fn parse_unknown_argument_errors() {
        let err = parse_cli_args(["nexus-inventory", "summary", "--unknown"])
            .expect_err("unknown flag should fail");
        assert!(err.to_string().contains("Unknown argument"));
    }

    #[test]
    fn parse_missing_value_errors() {
        let err = parse_cli_args(["nexus-inventory", "summary", "--db"])
            .expect_err("missing value should fail");
        assert!(err.to_string().contains("Missing value for --db"));
    }
}
