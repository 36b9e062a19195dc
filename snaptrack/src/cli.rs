use anyhow::Context;
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use snaptrack_channel::{CommandIntent, CommandKind, Protocol, RuleAction, RuleSpec};

pub fn init() -> ArgMatches<'static> {
    app().get_matches()
}

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A channel which can be printed by `snaptrack watch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchChannel {
    All,
    Metrics,
    Services,
    Processes,
    Firewall,
    Ports,
    Logs,
}

impl WatchChannel {
    fn parse(name: &str) -> Self {
        match name {
            "metrics" => WatchChannel::Metrics,
            "services" => WatchChannel::Services,
            "processes" => WatchChannel::Processes,
            "firewall" => WatchChannel::Firewall,
            "ports" => WatchChannel::Ports,
            "logs" => WatchChannel::Logs,
            _ => WatchChannel::All,
        }
    }

    pub fn includes(&self, channel: WatchChannel) -> bool {
        *self == WatchChannel::All || *self == channel
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Watch(WatchChannel),
    Command(CommandIntent),
}

fn app() -> App<'static, 'static> {
    App::new("snaptrack")
        .version(VERSION)
        .about("Monitors and controls a remote host through the snaptrack agent.")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("LOG")
                .long("log")
                .required(false)
                .takes_value(true)
                .global(true)
                .possible_values(&["trace", "debug", "info", "warn", "error", "off"])
                .help("Sets the log level"),
        )
        .arg(
            Arg::with_name("ENDPOINT")
                .long("endpoint")
                .short("e")
                .takes_value(true)
                .global(true)
                .value_name("URL")
                .help("The websocket endpoint of the agent.  Overrides the config file & SNAPTRACK_ENDPOINT"),
        )
        .subcommand(
            SubCommand::with_name("watch")
                .about("Prints live state as it changes, until interrupted")
                .arg(
                    Arg::with_name("CHANNEL")
                        .index(1)
                        .required(false)
                        .possible_values(&[
                            "all",
                            "metrics",
                            "services",
                            "processes",
                            "firewall",
                            "ports",
                            "logs",
                        ])
                        .default_value("all"),
                ),
        )
        .subcommand(
            SubCommand::with_name("service")
                .about("Starts, stops, or restarts a service, or prints its recent logs")
                .arg(
                    Arg::with_name("ACTION")
                        .index(1)
                        .required(true)
                        .possible_values(&["start", "stop", "restart", "logs"]),
                )
                .arg(
                    Arg::with_name("NAME")
                        .index(2)
                        .required(true)
                        .validator(validate_service_name),
                ),
        )
        .subcommand(
            SubCommand::with_name("port")
                .about("Opens or closes a port")
                .setting(AppSettings::SubcommandRequiredElseHelp)
                .subcommand(
                    SubCommand::with_name("stop")
                        .about("Stops the process listening on the port")
                        .arg(port_arg().index(1))
                        .arg(
                            Arg::with_name("PID")
                                .index(2)
                                .required(true)
                                .validator(validate_pid),
                        ),
                )
                .subcommand(
                    SubCommand::with_name("add")
                        .about("Opens the port in the firewall")
                        .arg(port_arg().index(1))
                        .arg(protocol_arg().default_value("tcp")),
                ),
        )
        .subcommand(
            SubCommand::with_name("rule")
                .about("Manages firewall rules")
                .setting(AppSettings::SubcommandRequiredElseHelp)
                .subcommand(
                    SubCommand::with_name("add")
                        .about("Adds a firewall rule")
                        .arg(port_arg().long("port"))
                        .arg(protocol_arg().required(true))
                        .arg(
                            Arg::with_name("SOURCE")
                                .long("source")
                                .takes_value(true)
                                .default_value("any"),
                        )
                        .arg(
                            Arg::with_name("DESTINATION")
                                .long("destination")
                                .takes_value(true)
                                .default_value("any"),
                        )
                        .arg(
                            Arg::with_name("ACTION")
                                .long("action")
                                .takes_value(true)
                                .required(true)
                                .possible_values(&["allow", "deny"]),
                        ),
                ),
        )
}

fn port_arg() -> Arg<'static, 'static> {
    Arg::with_name("PORT")
        .takes_value(true)
        .required(true)
        .validator(validate_port)
}

fn protocol_arg() -> Arg<'static, 'static> {
    Arg::with_name("PROTOCOL")
        .long("protocol")
        .takes_value(true)
        .possible_values(&["tcp", "udp"])
}

/// Converts parsed arguments into the action the binary should perform.
pub fn invocation(args: &ArgMatches) -> anyhow::Result<Invocation> {
    match args.subcommand() {
        ("watch", Some(watch)) => {
            let channel = watch.value_of("CHANNEL").unwrap_or("all");
            Ok(Invocation::Watch(WatchChannel::parse(channel)))
        }
        ("service", Some(service)) => {
            let kind: CommandKind = required(service, "ACTION")?.parse()?;
            let name = required(service, "NAME")?;
            Ok(Invocation::Command(CommandIntent::service(kind, name)))
        }
        ("port", Some(port)) => match port.subcommand() {
            ("stop", Some(stop)) => {
                let intent = CommandIntent::stop_port(
                    required(stop, "PORT")?.parse()?,
                    required(stop, "PID")?.parse()?,
                );
                Ok(Invocation::Command(intent))
            }
            ("add", Some(add)) => {
                let intent = CommandIntent::add_port(
                    required(add, "PORT")?.parse()?,
                    required(add, "PROTOCOL")?.parse()?,
                );
                Ok(Invocation::Command(intent))
            }
            (name, _) => Err(anyhow::format_err!("unsupported port command: {}", name)),
        },
        ("rule", Some(rule)) => match rule.subcommand() {
            ("add", Some(add)) => {
                let protocol: Protocol = required(add, "PROTOCOL")?.parse()?;
                let action: RuleAction = required(add, "ACTION")?.parse()?;
                let mut spec = RuleSpec::new(required(add, "PORT")?.parse()?, protocol, action);
                spec.source = add.value_of("SOURCE").unwrap_or("any").to_string();
                spec.destination = add.value_of("DESTINATION").unwrap_or("any").to_string();

                Ok(Invocation::Command(CommandIntent::add_rule(spec)))
            }
            (name, _) => Err(anyhow::format_err!("unsupported rule command: {}", name)),
        },
        (name, _) => Err(anyhow::format_err!("unsupported command: {}", name)),
    }
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    args.value_of(name)
        .with_context(|| format!("the {} argument is required", name))
}

fn validate_service_name(name: String) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("service name may not be empty".into());
    }

    if name.contains(char::is_whitespace) {
        return Err("service name may not contain whitespace".into());
    }

    Ok(())
}

fn validate_port(port: String) -> Result<(), String> {
    match port.parse::<u32>() {
        Ok(port) if (1..=65535).contains(&port) => Ok(()),
        _ => Err("port must be a number between 1 and 65535".into()),
    }
}

fn validate_pid(pid: String) -> Result<(), String> {
    match pid.parse::<u32>() {
        Ok(pid) if pid > 0 => Ok(()),
        _ => Err("pid must be a positive number".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::{app, invocation, Invocation, WatchChannel};
    use pretty_assertions::assert_eq;
    use snaptrack_channel::{CommandIntent, CommandKind, Protocol, RuleAction, RuleSpec};

    fn parse(args: &[&str]) -> anyhow::Result<Invocation> {
        let matches = app().get_matches_from_safe(args)?;
        invocation(&matches)
    }

    #[test]
    fn watch_defaults_to_all() {
        assert_eq!(
            Invocation::Watch(WatchChannel::All),
            parse(&["snaptrack", "watch"]).unwrap()
        );
        assert_eq!(
            Invocation::Watch(WatchChannel::Ports),
            parse(&["snaptrack", "watch", "ports"]).unwrap()
        );
    }

    #[test]
    fn service_command() {
        assert_eq!(
            Invocation::Command(CommandIntent::service(CommandKind::Restart, "nginx")),
            parse(&["snaptrack", "service", "restart", "nginx"]).unwrap()
        );
    }

    #[test]
    fn service_name_is_validated() {
        assert!(parse(&["snaptrack", "service", "stop", "two words"]).is_err());
        assert!(parse(&["snaptrack", "service", "reload", "nginx"]).is_err());
    }

    #[test]
    fn port_commands() {
        assert_eq!(
            Invocation::Command(CommandIntent::stop_port(8080, 4312)),
            parse(&["snaptrack", "port", "stop", "8080", "4312"]).unwrap()
        );
        assert_eq!(
            Invocation::Command(CommandIntent::add_port(53, Protocol::Udp)),
            parse(&["snaptrack", "port", "add", "53", "--protocol", "udp"]).unwrap()
        );
        assert_eq!(
            Invocation::Command(CommandIntent::add_port(443, Protocol::Tcp)),
            parse(&["snaptrack", "port", "add", "443"]).unwrap()
        );
        assert!(parse(&["snaptrack", "port", "add", "70000"]).is_err());
        assert!(parse(&["snaptrack", "port", "stop", "22", "0"]).is_err());
    }

    #[test]
    fn rule_command() {
        let mut spec = RuleSpec::new(22, Protocol::Tcp, RuleAction::Deny);
        spec.source = "10.0.0.0/8".to_string();

        assert_eq!(
            Invocation::Command(CommandIntent::add_rule(spec)),
            parse(&[
                "snaptrack",
                "rule",
                "add",
                "--port",
                "22",
                "--protocol",
                "tcp",
                "--action",
                "deny",
                "--source",
                "10.0.0.0/8"
            ])
            .unwrap()
        );
    }

    #[test]
    fn global_options_follow_subcommands() {
        let matches = app()
            .get_matches_from_safe(&["snaptrack", "watch", "--endpoint", "ws://10.0.0.2:8000/ws"])
            .unwrap();

        let (_, watch) = matches.subcommand();
        assert_eq!(
            Some("ws://10.0.0.2:8000/ws"),
            watch.and_then(|watch| watch.value_of("ENDPOINT"))
        );
    }
}
