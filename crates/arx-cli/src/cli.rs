use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "arx",
    about = "arx: archival information packages over versioned storage",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Repository storage root (overrides `storage_root` from the config file; default ./arx-data)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Configuration file (defaults to ./arx.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the repository's containers
    Init,
    /// List, inspect, create or delete AIPs
    Aip(AipArgs),
    /// Manage descriptive metadata of an AIP
    Dm(DmArgs),
    /// Manage representations of an AIP
    Rep(RepArgs),
    /// Add or list files of a representation
    File(FileArgs),
    /// List raw storage resources under a path
    Ls(LsArgs),
}

#[derive(Args)]
pub struct AipArgs {
    #[command(subcommand)]
    pub action: AipAction,
}

#[derive(Subcommand)]
pub enum AipAction {
    /// List every AIP
    List {
        /// Only children of this AIP
        #[arg(long)]
        parent: Option<String>,
    },
    /// Show an AIP envelope
    Show { id: String },
    /// Create an empty AIP
    Create {
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        inactive: bool,
    },
    /// Delete an AIP and everything under it
    Delete { id: String },
}

#[derive(Args)]
pub struct DmArgs {
    #[command(subcommand)]
    pub action: DmAction,
}

#[derive(Subcommand)]
pub enum DmAction {
    /// Add descriptive metadata from a local file
    Add {
        aip: String,
        id: String,
        file: PathBuf,
        #[arg(long = "type")]
        metadata_type: String,
    },
    /// Replace descriptive metadata, keeping the old content as a version
    Update {
        aip: String,
        id: String,
        file: PathBuf,
        #[arg(long = "type")]
        metadata_type: String,
        #[arg(short, long)]
        message: Option<String>,
    },
    /// List stored versions
    Versions { aip: String, id: String },
    /// Restore an earlier version
    Revert {
        aip: String,
        id: String,
        version: String,
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Delete descriptive metadata
    Delete { aip: String, id: String },
}

#[derive(Args)]
pub struct RepArgs {
    #[command(subcommand)]
    pub action: RepAction,
}

#[derive(Subcommand)]
pub enum RepAction {
    /// Declare an empty representation
    Add {
        aip: String,
        id: String,
        #[arg(long)]
        original: bool,
    },
}

#[derive(Args)]
pub struct FileArgs {
    #[command(subcommand)]
    pub action: FileAction,
}

#[derive(Subcommand)]
pub enum FileAction {
    /// Store a local file in a representation
    Add {
        aip: String,
        rep: String,
        file: PathBuf,
        /// Folder inside the representation's data, e.g. `scans/2020`
        #[arg(long)]
        dir: Option<String>,
        /// File id (defaults to the local file name)
        #[arg(long)]
        id: Option<String>,
    },
    /// List files of a representation
    List {
        aip: String,
        rep: String,
        #[arg(long)]
        dir: Option<String>,
        #[arg(short, long)]
        recursive: bool,
    },
}

#[derive(Args)]
pub struct LsArgs {
    pub path: String,
    #[arg(short, long)]
    pub recursive: bool,
}

/// Split a `/`-separated folder argument into its segments.
pub fn folder_segments(dir: Option<&str>) -> Vec<String> {
    dir.map(|d| {
        d.split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["arx", "aip", "list", "--root", "/tmp/repo", "-v"]).unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/repo")));
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Command::Aip(AipArgs { action: AipAction::List { parent: None } })
        ));
    }

    #[test]
    fn dm_add_requires_type() {
        assert!(Cli::try_parse_from(["arx", "dm", "add", "a1", "dc", "dc.json"]).is_err());
        let cli = Cli::try_parse_from(["arx", "dm", "add", "a1", "dc", "dc.json", "--type", "dc"]).unwrap();
        match cli.command {
            Command::Dm(DmArgs {
                action: DmAction::Add { aip, metadata_type, .. },
            }) => {
                assert_eq!(aip, "a1");
                assert_eq!(metadata_type, "dc");
            }
            _ => panic!("expected dm add"),
        }
    }

    #[test]
    fn folder_segments_ignore_empty_parts() {
        assert_eq!(folder_segments(Some("/scans//2020/")), vec!["scans", "2020"]);
        assert!(folder_segments(None).is_empty());
    }
}
