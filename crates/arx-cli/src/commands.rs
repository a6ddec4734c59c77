use std::sync::Arc;

use anyhow::Context;
use arx_model::{AipPermissions, File, ModelService};
use arx_store::{ContentPayload, FileSystemStorage, Resource, StorageService};
use arx_types::StoragePath;
use colored::Colorize;

use crate::cli::*;
use crate::config::RepositoryConfig;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = RepositoryConfig::load(cli.config.as_deref())?;
    if let Some(root) = cli.root {
        config.storage_root = root;
    }
    let service = open(&config)?;
    match cli.command {
        Command::Init => cmd_init(&service, &config),
        Command::Aip(args) => cmd_aip(&service, args.action),
        Command::Dm(args) => cmd_dm(&service, args.action),
        Command::Rep(args) => cmd_rep(&service, args.action),
        Command::File(args) => cmd_file(&service, args.action),
        Command::Ls(args) => cmd_ls(&service, args),
    }
}

fn open(config: &RepositoryConfig) -> anyhow::Result<ModelService> {
    let storage = FileSystemStorage::open(&config.storage_root)
        .with_context(|| format!("opening repository at {}", config.storage_root.display()))?;
    Ok(ModelService::new(Arc::new(storage), config.model.clone()))
}

fn cmd_init(service: &ModelService, config: &RepositoryConfig) -> anyhow::Result<()> {
    let report = service.ensure_topology();
    for path in &report.created {
        println!("  {} {}", "created:".green(), path);
    }
    for path in &report.existing {
        println!("  {} {}", "exists:".dimmed(), path);
    }
    for (path, e) in &report.failed {
        println!("  {} {} ({})", "failed:".red(), path, e);
    }
    if !report.is_complete() {
        anyhow::bail!("{} container(s) could not be created", report.failed.len());
    }
    println!(
        "{} Initialized arx repository in {}",
        "✓".green().bold(),
        config.storage_root.display().to_string().bold()
    );
    Ok(())
}

fn cmd_aip(service: &ModelService, action: AipAction) -> anyhow::Result<()> {
    match action {
        AipAction::List { parent } => {
            let listing = match &parent {
                Some(parent) => service.list_child_aips(parent)?,
                None => service.list_aips()?,
            };
            let mut count = 0;
            for aip in listing {
                let aip = aip?;
                let state = if aip.active { "active".green() } else { "inactive".yellow() };
                println!(
                    "{}  {}  {} dm, {} rep",
                    aip.id.cyan(),
                    state,
                    aip.descriptive_metadata.len(),
                    aip.representations.len()
                );
                count += 1;
            }
            if count == 0 {
                println!("No AIPs.");
            }
        }
        AipAction::Show { id } => {
            let aip = service.retrieve_aip(&id)?;
            println!("AIP {}", aip.id.cyan().bold());
            if let Some(parent) = &aip.parent_id {
                println!("  Parent: {}", parent.cyan());
            }
            println!("  Active: {}", aip.active);
            for dm in &aip.descriptive_metadata {
                println!("  Descriptive: {} ({})", dm.id.bold(), dm.metadata_type);
            }
            for rep in &aip.representations {
                let original = if rep.original { " original" } else { "" };
                println!("  Representation: {}{}", rep.id.bold(), original.yellow());
            }
        }
        AipAction::Create { parent, inactive } => {
            let aip = service.create_aip(parent.as_deref(), !inactive, AipPermissions::default(), true)?;
            println!("{} Created AIP {}", "✓".green().bold(), aip.id.cyan());
        }
        AipAction::Delete { id } => {
            service.delete_aip(&id, true)?;
            println!("Deleted AIP {}", id.cyan());
        }
    }
    Ok(())
}

fn cmd_dm(service: &ModelService, action: DmAction) -> anyhow::Result<()> {
    match action {
        DmAction::Add { aip, id, file, metadata_type } => {
            let dm = service.create_descriptive_metadata(
                &aip,
                &id,
                &ContentPayload::from_path(file),
                &metadata_type,
                true,
            )?;
            println!("{} Added {} ({}) to {}", "✓".green().bold(), dm.id.bold(), dm.metadata_type, aip.cyan());
        }
        DmAction::Update { aip, id, file, metadata_type, message } => {
            service.update_descriptive_metadata(
                &aip,
                &id,
                &ContentPayload::from_path(file),
                &metadata_type,
                message.as_deref(),
                true,
            )?;
            println!("{} Updated {} of {}", "✓".green().bold(), id.bold(), aip.cyan());
        }
        DmAction::Versions { aip, id } => {
            let mut count = 0;
            for version in service.list_descriptive_metadata_versions(&aip, &id)? {
                let version = version?;
                println!(
                    "{}  {}  {}",
                    version.id.yellow(),
                    version.created.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                    version.message.as_deref().unwrap_or("")
                );
                count += 1;
            }
            if count == 0 {
                println!("No versions.");
            }
        }
        DmAction::Revert { aip, id, version, message } => {
            let snapshot = service.revert_descriptive_metadata_version(&aip, &id, &version, message.as_deref(), true)?;
            println!(
                "{} Reverted {} to {} (previous content kept as {})",
                "✓".green().bold(),
                id.bold(),
                version.yellow(),
                snapshot.id.yellow()
            );
        }
        DmAction::Delete { aip, id } => {
            service.delete_descriptive_metadata(&aip, &id, true)?;
            println!("Deleted {} of {}", id.bold(), aip.cyan());
        }
    }
    Ok(())
}

fn cmd_rep(service: &ModelService, action: RepAction) -> anyhow::Result<()> {
    match action {
        RepAction::Add { aip, id, original } => {
            let rep = service.create_representation(&aip, &id, original, true)?;
            println!("{} Added representation {} to {}", "✓".green().bold(), rep.id.bold(), aip.cyan());
        }
    }
    Ok(())
}

fn cmd_file(service: &ModelService, action: FileAction) -> anyhow::Result<()> {
    match action {
        FileAction::Add { aip, rep, file, dir, id } => {
            let id = match id {
                Some(id) => id,
                None => file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .with_context(|| format!("cannot derive a file id from {}", file.display()))?,
            };
            let folders = folder_segments(dir.as_deref());
            let stored = service.create_file(&aip, &rep, &folders, &id, &ContentPayload::from_path(file), true)?;
            println!("{} Stored {}", "✓".green().bold(), display_file(&stored));
        }
        FileAction::List { aip, rep, dir, recursive } => {
            let folders = folder_segments(dir.as_deref());
            let listing = if folders.is_empty() {
                service.list_files_under(&aip, &rep, recursive)?
            } else {
                service.list_files_under_directory(&aip, &rep, &folders, recursive)?
            };
            for file in listing {
                println!("{}", display_file(&file?));
            }
        }
    }
    Ok(())
}

fn display_file(file: &File) -> String {
    let mut segments = file.path.clone();
    segments.push(file.id.clone());
    let joined = segments.join("/");
    if file.is_directory {
        format!("{}/", joined.blue())
    } else {
        joined
    }
}

fn cmd_ls(service: &ModelService, args: LsArgs) -> anyhow::Result<()> {
    let storage = service.storage();
    let path = StoragePath::parse(&args.path)?;
    let listing = if path.is_container() {
        storage.list_resources_under_container(&path, args.recursive)?
    } else {
        match storage.get_resource(&path)? {
            Resource::Binary(binary) => {
                println!("{}  {} bytes", binary.path, binary.size_in_bytes);
                for (algorithm, digest) in &binary.content_digest {
                    println!("  {}: {}", algorithm, digest.dimmed());
                }
                return Ok(());
            }
            _ => storage.list_resources_under_directory(&path, args.recursive)?,
        }
    };
    for resource in listing {
        match resource? {
            Resource::Binary(binary) => println!("{}  {}", binary.path, binary.size_in_bytes.to_string().dimmed()),
            other => println!("{}/", other.path().to_string().blue()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn run(root: &std::path::Path, args: &[&str]) -> anyhow::Result<()> {
        let mut argv = vec!["arx", "--root", root.to_str().unwrap()];
        argv.extend_from_slice(args);
        run_command(Cli::try_parse_from(argv).unwrap())
    }

    fn service(root: &std::path::Path) -> ModelService {
        let config = RepositoryConfig {
            storage_root: root.to_path_buf(),
            ..RepositoryConfig::default()
        };
        open(&config).unwrap()
    }

    // -----------------------------------------------------------------------
    // Repository lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn init_creates_containers() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["init"]).unwrap();
        assert!(dir.path().join("aip").is_dir());
        assert!(dir.path().join("preservation").join("agents").is_dir());
        // A second init finds everything in place.
        run(dir.path(), &["init"]).unwrap();
    }

    #[test]
    fn aip_with_metadata_and_files() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["init"]).unwrap();
        run(dir.path(), &["aip", "create"]).unwrap();

        let aip = service(dir.path()).list_aips().unwrap().try_collect().unwrap().remove(0);
        let id = aip.id.as_str();

        let dc = dir.path().join("dc.json");
        std::fs::write(&dc, br#"{"title":"x"}"#).unwrap();
        run(dir.path(), &["dm", "add", id, "dc.json", dc.to_str().unwrap(), "--type", "dc"]).unwrap();
        std::fs::write(&dc, br#"{"title":"y"}"#).unwrap();
        run(
            dir.path(),
            &["dm", "update", id, "dc.json", dc.to_str().unwrap(), "--type", "dc", "-m", "retitle"],
        )
        .unwrap();
        run(dir.path(), &["dm", "versions", id, "dc.json"]).unwrap();

        run(dir.path(), &["rep", "add", id, "r1", "--original"]).unwrap();
        let scan = dir.path().join("page1.tif");
        std::fs::write(&scan, b"tiff").unwrap();
        run(
            dir.path(),
            &["file", "add", id, "r1", scan.to_str().unwrap(), "--dir", "scans"],
        )
        .unwrap();
        run(dir.path(), &["file", "list", id, "r1", "-r"]).unwrap();

        let svc = service(dir.path());
        let stored = svc.retrieve_aip(id).unwrap();
        assert_eq!(stored.descriptive_metadata.len(), 1);
        assert!(stored.representations[0].original);
        let versions = svc
            .list_descriptive_metadata_versions(id, "dc.json")
            .unwrap()
            .try_collect()
            .unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].message.as_deref(), Some("retitle"));
        let binary = svc.retrieve_file_binary(id, "r1", &["scans"], "page1.tif").unwrap();
        assert_eq!(binary.size_in_bytes, 4);

        run(dir.path(), &["ls", format!("aip/{id}").as_str(), "-r"]).unwrap();
        run(dir.path(), &["aip", "delete", id]).unwrap();
        assert!(svc.retrieve_aip(id).unwrap_err().is_not_found());
    }

    #[test]
    fn missing_aip_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["init"]).unwrap();
        assert!(run(dir.path(), &["aip", "show", "nope"]).is_err());
        assert!(run(dir.path(), &["ls", "bad path//x"]).is_err());
    }
}
