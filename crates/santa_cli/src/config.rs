use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use santa_core::config::{
    normalize_base_url, DEFAULT_APP_BASE_URL, DEFAULT_COUNTRY_CODE, DEFAULT_GATEWAY_INSTANCE,
    DEFAULT_GATEWAY_URL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SEND_INTERVAL, ENV_APP_BASE_URL,
    ENV_GATEWAY_API_KEY, ENV_GATEWAY_INSTANCE, ENV_GATEWAY_URL, ENV_SEND_INTERVAL_MS,
};
use santa_core::{default_log_level, DispatchConfig, GatewayConfig, SantaConfig};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Operator CLI for Secret Santa groups.
///
/// Gateway and link settings are read from flags or the environment (a
/// `.env` file in the working directory is loaded first).
#[derive(Parser, Debug, Clone)]
#[command(name = "santa", version, about = "Run and notify Secret Santa draws")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Base URL of the Evolution API.
    ///
    /// Environment variable: `EVOLUTION_API_URL`
    #[arg(long, global = true, env = ENV_GATEWAY_URL, default_value = DEFAULT_GATEWAY_URL)]
    pub gateway_url: String,

    /// Evolution instance that owns the WhatsApp session.
    ///
    /// Environment variable: `EVOLUTION_INSTANCE`
    #[arg(
        long,
        global = true,
        env = ENV_GATEWAY_INSTANCE,
        default_value = DEFAULT_GATEWAY_INSTANCE
    )]
    pub gateway_instance: String,

    /// API key sent in the `apikey` header. Empty disables delivery.
    ///
    /// Environment variable: `EVOLUTION_API_KEY`
    #[arg(
        long,
        global = true,
        env = ENV_GATEWAY_API_KEY,
        default_value = "",
        hide_env_values = true
    )]
    pub gateway_api_key: String,

    /// Country code prefixed to phone numbers that lack it.
    #[arg(long, global = true, default_value = DEFAULT_COUNTRY_CODE)]
    pub country_code: String,

    /// Per-request gateway timeout, in seconds.
    ///
    /// Environment variable: `EVOLUTION_TIMEOUT_SECS`
    #[arg(
        long,
        global = true,
        env = "EVOLUTION_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs()
    )]
    pub request_timeout_secs: u64,

    /// Public base URL used to build participant and admin links.
    ///
    /// Environment variable: `APP_BASE_URL`
    #[arg(long, global = true, env = ENV_APP_BASE_URL, default_value = DEFAULT_APP_BASE_URL)]
    pub app_base_url: String,

    /// Minimum delay between consecutive sends, in milliseconds.
    ///
    /// Environment variable: `SANTA_SEND_INTERVAL_MS`
    #[arg(
        long,
        global = true,
        env = ENV_SEND_INTERVAL_MS,
        default_value_t = DEFAULT_SEND_INTERVAL.as_millis() as u64
    )]
    pub send_interval_ms: u64,

    /// Send without checking gateway availability first.
    #[arg(long, global = true, default_value_t = false)]
    pub no_probe: bool,

    /// Directory for rotating log files. Logging is off when unset.
    ///
    /// Environment variable: `SANTA_LOG_DIR`
    #[arg(long, global = true, env = "SANTA_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log level (`trace`, `debug`, `info`, `warn`, `error`).
    ///
    /// Environment variable: `SANTA_LOG_LEVEL`
    #[arg(long, global = true, env = "SANTA_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print core linkage and version.
    Ping,
    /// Check whether the messaging gateway is reachable.
    Probe,
    /// Create a group in pending state.
    CreateGroup {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long)]
        organizer: Option<String>,
        #[arg(long)]
        organizer_contact: Option<String>,
        /// Suggested gift value, e.g. `50` or `49.90`.
        #[arg(long)]
        suggested_value: Option<String>,
        /// Exchange date, `YYYY-MM-DD`.
        #[arg(long)]
        event_date: Option<String>,
    },
    /// Add one participant to a pending group.
    AddParticipant {
        #[arg(long)]
        db: PathBuf,
        /// Group id or group code.
        #[arg(long)]
        group: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        contact: Option<String>,
    },
    /// Run the draw for a group and notify everyone.
    Draw {
        #[arg(long)]
        db: PathBuf,
        /// Group id or group code.
        #[arg(long)]
        group: String,
        /// Fixed RNG seed for a reproducible assignment.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Resend personal links after a draw.
    Resend {
        #[arg(long)]
        db: PathBuf,
        /// Group code; resends to every participant with a contact.
        #[arg(long, required_unless_present = "participant", conflicts_with = "participant")]
        group: Option<String>,
        /// Resend only to this participant.
        #[arg(long)]
        participant: Option<Uuid>,
    },
    /// Tell whoever drew this participant that their wishlist changed.
    NotifyGiver {
        #[arg(long)]
        db: PathBuf,
        /// Participant whose wishlist was updated.
        #[arg(long)]
        participant: Uuid,
    },
    /// Record that a participant opened their result.
    MarkViewed {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        participant: Uuid,
    },
    /// Show participants and who has opened their result.
    Status {
        #[arg(long)]
        db: PathBuf,
        /// Group id or group code.
        #[arg(long)]
        group: String,
    },
    /// Return a group stuck in `drawing` to `pending`.
    Release {
        #[arg(long)]
        db: PathBuf,
        /// Group id or group code.
        #[arg(long)]
        group: String,
    },
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub command: Command,
    pub santa: SantaConfig,
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
}

impl TryFrom<CliArgs> for CliConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.request_timeout_secs == 0 {
            bail!("EVOLUTION_TIMEOUT_SECS must be greater than 0");
        }
        if args.country_code.is_empty() || !args.country_code.bytes().all(|b| b.is_ascii_digit())
        {
            bail!("country code must be digits only, got `{}`", args.country_code);
        }

        let base_url = normalize_base_url(ENV_GATEWAY_URL, args.gateway_url)?;
        let app_base_url = normalize_base_url(ENV_APP_BASE_URL, args.app_base_url)?;
        let log_dir = match args.log_dir {
            Some(dir) if dir.is_relative() => Some(
                std::env::current_dir()
                    .context("cannot resolve relative log directory")?
                    .join(dir),
            ),
            other => other,
        };

        Ok(Self {
            command: args.command,
            santa: SantaConfig {
                app_base_url,
                gateway: GatewayConfig {
                    base_url,
                    instance: args.gateway_instance.trim().to_string(),
                    api_key: args.gateway_api_key.trim().to_string(),
                    default_country_code: args.country_code,
                    request_timeout: Duration::from_secs(args.request_timeout_secs),
                },
                dispatch: DispatchConfig {
                    send_interval: Duration::from_millis(args.send_interval_ms),
                    probe_before_send: !args.no_probe,
                },
            },
            log_dir,
            log_level: args
                .log_level
                .unwrap_or_else(|| default_log_level().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{CliArgs, CliConfig, Command};
    use clap::Parser;
    use std::time::Duration;

    fn parse(args: &[&str]) -> anyhow::Result<CliConfig> {
        let mut argv = vec!["santa"];
        argv.extend_from_slice(args);
        CliConfig::try_from(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn draw_flags_map_into_core_config() {
        let config = parse(&[
            "draw",
            "--db",
            "/tmp/santa.db",
            "--group",
            "ABC234",
            "--seed",
            "9",
            "--gateway-url",
            "https://gw.example.com/",
            "--gateway-api-key",
            "secret",
            "--send-interval-ms",
            "50",
            "--no-probe",
        ])
        .unwrap();

        assert!(matches!(
            config.command,
            Command::Draw { ref group, seed: Some(9), .. } if group == "ABC234"
        ));
        assert_eq!(config.santa.gateway.base_url, "https://gw.example.com");
        assert!(config.santa.gateway.is_configured());
        assert_eq!(config.santa.dispatch.send_interval, Duration::from_millis(50));
        assert!(!config.santa.dispatch.probe_before_send);
    }

    #[test]
    fn defaults_follow_core_constants() {
        let config = parse(&["ping"]).unwrap();
        assert_eq!(
            config.santa.gateway.request_timeout,
            santa_core::config::DEFAULT_REQUEST_TIMEOUT
        );
        assert_eq!(
            config.santa.dispatch.send_interval,
            santa_core::config::DEFAULT_SEND_INTERVAL
        );
    }

    #[test]
    fn operator_commands_parse() {
        let participant = "6f1c1f0e-2a43-4c55-9d2e-0d6f5b0a7c11";

        let config = parse(&["release", "--db", "/tmp/santa.db", "--group", "ABC234"]).unwrap();
        assert!(matches!(config.command, Command::Release { ref group, .. } if group == "ABC234"));

        let config = parse(&["notify-giver", "--db", "/tmp/santa.db", "--participant", participant])
            .unwrap();
        assert!(matches!(
            config.command,
            Command::NotifyGiver { participant: id, .. } if id.to_string() == participant
        ));

        let config = parse(&["status", "--db", "/tmp/santa.db", "--group", "ABC234"]).unwrap();
        assert!(matches!(config.command, Command::Status { .. }));

        let config = parse(&["mark-viewed", "--db", "/tmp/santa.db", "--participant", participant])
            .unwrap();
        assert!(matches!(config.command, Command::MarkViewed { .. }));

        let config = parse(&[
            "create-group",
            "--db",
            "/tmp/santa.db",
            "--name",
            "Office",
            "--suggested-value",
            "50",
            "--event-date",
            "2026-12-20",
        ])
        .unwrap();
        assert!(matches!(
            config.command,
            Command::CreateGroup { suggested_value: Some(ref value), event_date: Some(_), .. }
                if value == "50"
        ));

        assert!(parse(&["release", "--db", "/tmp/santa.db"]).is_err());
        assert!(parse(&["notify-giver", "--db", "/tmp/santa.db", "--participant", "nope"]).is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(parse(&["probe", "--request-timeout-secs", "0"]).is_err());
        assert!(parse(&["probe", "--country-code", "+55"]).is_err());
        assert!(parse(&["probe", "--app-base-url", "santa.example.com"]).is_err());
        assert!(parse(&["resend", "--db", "/tmp/santa.db"]).is_err());
    }
}
