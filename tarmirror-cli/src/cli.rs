use crate::commands;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "tarmirror",
    about = "mirror npm dependency trees as tarballs and republish them",
    version,
    color = clap::ColorChoice::Auto
)]
pub struct Cli {
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the flat list of packages a request resolves to
    Resolve(commands::resolve::ResolveArgs),
    /// Resolve and download every tarball into a directory
    Download(commands::download::DownloadArgs),
    /// Publish mirrored tarballs to another registry
    Publish(commands::publish::PublishArgs),
    /// Remove the registry metadata cache and the download record
    Clean(commands::clean::CleanArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_download_flags() {
        let cli = Cli::try_parse_from([
            "tarmirror",
            "download",
            "react@18.2.0",
            "@types/node",
            "--dev",
            "--dest",
            "out",
            "--archive",
            "--concurrency",
            "8",
            "--no-cache",
        ])
        .unwrap();

        let Command::Download(args) = cli.command else {
            panic!("expected download");
        };
        assert_eq!(args.source.packages, vec!["react@18.2.0", "@types/node"]);
        assert!(args.source.dev);
        assert!(!args.source.peer);
        assert_eq!(args.dest.to_str(), Some("out"));
        assert!(args.archive);
        assert_eq!(args.concurrency, Some(8));
        assert!(args.no_cache);
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["tarmirror", "resolve", "--top", "10", "-v"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn publish_needs_a_path() {
        assert!(Cli::try_parse_from(["tarmirror", "publish"]).is_err());
    }
}
