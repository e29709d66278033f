use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{image_url, GalleryClient, GalleryHandle, StagedImage};
use shared::protocol::StoredImageRecord;

mod config;

#[derive(Parser, Debug)]
struct Cli {
    /// Server origin, e.g. http://127.0.0.1:5000
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    employee_id: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload image files for the employee. Repeated --title flags pair with
    /// the files by position; files without one are labeled "Untitled".
    Upload {
        files: Vec<PathBuf>,
        #[arg(long = "title")]
        titles: Vec<String>,
    },
    /// List the images currently stored for the employee.
    Fetch,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let settings = config::load_settings();
    let server_url = cli.server_url.unwrap_or(settings.server_url);
    let employee_id = cli
        .employee_id
        .or(settings.employee_id)
        .unwrap_or_default();

    let client = GalleryClient::with_server_url(server_url.clone());
    client.set_employee_id(&employee_id).await;

    match cli.command {
        Command::Upload { files, titles } => {
            client.stage_images(stage_from_paths(&files, &titles).await?).await;
            match client.upload().await {
                Ok(stored) => {
                    println!(
                        "uploaded {} image(s) for employee {employee_id}",
                        stored.len()
                    );
                    print_records(&server_url, &stored);
                }
                Err(err) if err.is_validation() => return Err(err.into()),
                Err(_) => bail!("upload failed; see the log output for details"),
            }
        }
        Command::Fetch => match client.fetch_images().await {
            Ok(stored) if stored.is_empty() => {
                println!("no images stored for employee {employee_id}");
            }
            Ok(stored) => print_records(&server_url, &stored),
            Err(err) if err.is_validation() => return Err(err.into()),
            Err(_) => bail!("no images found for employee {employee_id}"),
        },
    }

    Ok(())
}

async fn stage_from_paths(files: &[PathBuf], titles: &[String]) -> Result<Vec<StagedImage>> {
    let mut staged = Vec::with_capacity(files.len());
    for (index, path) in files.iter().enumerate() {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image")
            .to_string();

        let mut image = StagedImage::new(file_name, bytes);
        if let Some(mime) = mime_guess::from_path(path).first() {
            image = image.with_mime_type(mime.essence_str());
        }
        if let Some(title) = titles.get(index).filter(|title| !title.is_empty()) {
            image = image.with_title(title.as_str());
        }
        staged.push(image);
    }
    Ok(staged)
}

fn print_records(server_url: &str, records: &[StoredImageRecord]) {
    for record in records {
        match image_url(server_url, &record.path) {
            Ok(url) => println!("{}\t{url}", record.title),
            Err(_) => println!("{}\t{}", record.title, record.path),
        }
    }
}
