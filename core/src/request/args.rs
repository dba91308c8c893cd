//! Command line flags that feed a [`ConnectRequest`](super::ConnectRequest).

use clap::{ArgMatches, Args, Command, FromArgMatches};

use crate::domain::Subnet;
use crate::kubernetes::{FlagMap, KubeFlagSet};

/// Flags that shape the network side of a connection.
#[derive(Debug, Clone, Default, Args)]
#[command(next_help_heading = "Networking flags")]
pub struct NetworkArgs {
    /// Optional name to use for the connection
    #[arg(long)]
    pub name: Option<String>,

    /// Comma separated list of namespaces considered by DNS resolver and NAT
    /// for outbound connections. Defaults to all namespaces
    #[arg(long, value_delimiter = ',', value_name = "NAMESPACES")]
    pub mapped_namespaces: Vec<String>,

    /// Additional comma separated list of CIDR to proxy
    #[arg(long, value_delimiter = ',', value_name = "CIDR")]
    pub also_proxy: Vec<Subnet>,

    /// Comma separated list of CIDR to never proxy
    #[arg(long, value_delimiter = ',', value_name = "CIDR")]
    pub never_proxy: Vec<Subnet>,

    /// The namespace where the traffic manager is to be found. Overrides any
    /// other manager namespace set in config
    #[arg(long)]
    pub manager_namespace: Option<String>,

    /// Start a profiling server in the user daemon on this port
    #[arg(long, hide = true, default_value_t = 0)]
    pub userd_profiling_port: u16,

    /// Start a profiling server in the root daemon on this port
    #[arg(long, hide = true, default_value_t = 0)]
    pub rootd_profiling_port: u16,
}

/// Networking flags plus the kubectl flag group.
///
/// Only kubectl flags given on the command line are kept.
#[derive(Debug, Clone, Default)]
pub struct ConnectArgs {
    pub network: NetworkArgs,
    pub kube_flags: FlagMap,
}

impl FromArgMatches for ConnectArgs {
    fn from_arg_matches(matches: &ArgMatches) -> Result<Self, clap::Error> {
        Ok(Self {
            network: NetworkArgs::from_arg_matches(matches)?,
            kube_flags: KubeFlagSet::changed(matches),
        })
    }

    fn update_from_arg_matches(&mut self, matches: &ArgMatches) -> Result<(), clap::Error> {
        self.network.update_from_arg_matches(matches)?;
        self.kube_flags.extend(KubeFlagSet::changed(matches));
        Ok(())
    }
}

impl Args for ConnectArgs {
    fn augment_args(cmd: Command) -> Command {
        KubeFlagSet::augment(NetworkArgs::augment_args(cmd))
    }

    fn augment_args_for_update(cmd: Command) -> Command {
        KubeFlagSet::augment(NetworkArgs::augment_args_for_update(cmd))
    }
}

/// Flags accepted by every command.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalFlags {
    /// The name of the kubeconfig context to use
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Start, or connect to, daemon in a docker container
    #[arg(long, global = true)]
    pub docker: bool,

    /// Match expression that uniquely identifies the daemon container
    #[arg(long = "use", global = true, value_name = "MATCH")]
    pub use_pattern: Option<String>,
}
