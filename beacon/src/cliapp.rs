//! This module implements the definition of the command line app.

use clap::builder::ValueParser;
use clap::{Arg, ArgAction, Command};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const ABOUT: &str = "Beacon handles requests and records sampled telemetry for them.";

pub fn make_app() -> Command {
    Command::new("beacon")
        .disable_help_subcommand(true)
        .max_term_width(79)
        .propagate_version(true)
        .version(VERSION)
        .about(ABOUT)
        .arg(
            Arg::new("config")
                .value_name("CONFIG")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(ValueParser::path_buf())
                .help("The path to the config folder."),
        )
        .subcommand(
            Command::new("run")
                .about("Run the service")
                .after_help(
                    "This runs the service in the foreground until it's shut down. It will bind \
                     to the port and network interface configured in the config file. Running \
                     without a subcommand does the same.",
                )
                .arg(
                    Arg::new("host")
                        .value_name("HOST")
                        .long("host")
                        .short('H')
                        .help("The host the service should bind to (network interface)."),
                )
                .arg(
                    Arg::new("port")
                        .value_name("PORT")
                        .long("port")
                        .short('P')
                        .help("The port to bind for the HTTP server."),
                )
                .arg(
                    Arg::new("statsd")
                        .value_name("ADDR")
                        .long("statsd")
                        .help("Address of the statsd agent that receives push metrics."),
                )
                .arg(
                    Arg::new("log_target")
                        .value_name("ADDR")
                        .long("log-target")
                        .help("Address of the TCP log collector."),
                )
                .arg(
                    Arg::new("service")
                        .value_name("NAME")
                        .long("service")
                        .help("Service name attached to all telemetry."),
                )
                .arg(
                    Arg::new("env")
                        .value_name("ENV")
                        .long("env")
                        .help("Deployment environment attached to all telemetry."),
                )
                .arg(
                    Arg::new("auto_tune")
                        .long("auto-tune")
                        .action(ArgAction::SetTrue)
                        .help("Adjust the sample rate periodically based on service health."),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Manage the service config")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(
                    Command::new("show")
                        .about("Show the entire config out for debugging purposes")
                        .after_help(
                            "This dumps out the entire config including the values which \
                             are not in the config file but filled in from defaults or the \
                             environment.",
                        ),
                ),
        )
}
