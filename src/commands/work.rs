use clap::{Args, Subcommand};

use heritage_archive_core::{ShareLink, WorkRecord};

use super::practitioner::lookup;
use crate::config::Config;
use crate::media::{self, MediaKind};
use crate::sync::with_archive;

#[derive(Args)]
pub struct WorkCommand {
    #[command(subcommand)]
    pub command: WorkSubcommand,
}

#[derive(Subcommand)]
pub enum WorkSubcommand {
    /// Add a representative work to a practitioner
    Add {
        /// Practitioner ID or name
        practitioner: String,

        /// Name of the work
        name: String,

        #[arg(long)]
        technique: Option<String>,

        /// Time needed to make the work
        #[arg(long)]
        cycle: Option<String>,

        #[arg(long)]
        dimensions: Option<String>,

        #[arg(long)]
        price: Option<String>,

        /// Creative concept behind the work
        #[arg(long)]
        concept: Option<String>,

        /// Social significance of the work
        #[arg(long)]
        significance: Option<String>,

        /// Image URL or local file (can be repeated)
        #[arg(long = "image", value_name = "URL_OR_FILE")]
        images: Vec<String>,

        /// Video URL or local file (max 15 MB)
        #[arg(long)]
        video: Option<String>,
    },

    /// Remove a work from a practitioner
    Remove {
        /// Practitioner ID or name
        practitioner: String,

        /// Work ID
        work_id: String,
    },
}

impl WorkCommand {
    pub fn run(&self, config: &Config, link: &ShareLink) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            WorkSubcommand::Add {
                practitioner,
                name,
                technique,
                cycle,
                dimensions,
                price,
                concept,
                significance,
                images,
                video,
            } => {
                // Resolve media before touching the archive so a bad file
                // fails the command without a sync round trip
                let images = images
                    .iter()
                    .map(|i| media::resolve(i, MediaKind::Image))
                    .collect::<Result<Vec<_>, _>>()?;
                let video = video
                    .as_deref()
                    .map(|v| media::resolve(v, MediaKind::Video))
                    .transpose()?;

                let mut work = WorkRecord::new(name.clone()).with_images(images);
                if let Some(technique) = technique {
                    work = work.with_technique(technique);
                }
                if let Some(cycle) = cycle {
                    work = work.with_cycle(cycle);
                }
                if let Some(dimensions) = dimensions {
                    work = work.with_dimensions(dimensions);
                }
                if let Some(price) = price {
                    work = work.with_price(price);
                }
                if let Some(concept) = concept {
                    work = work.with_concept(concept);
                }
                if let Some(significance) = significance {
                    work = work.with_social_significance(significance);
                }
                if let Some(video) = video {
                    work = work.with_video(video);
                }
                let work = work.normalized();

                let owner = with_archive(config, link, |holder| {
                    let record = lookup(holder, practitioner)?.with_work(work.clone());
                    let owner = record.name.clone();
                    holder.update(|state| state.with_practitioner(record));
                    Ok(owner)
                })?;

                println!("Added work to '{}':", owner);
                println!("  {}", work);
                println!("  ID: {}", work.id);
                Ok(())
            }

            WorkSubcommand::Remove {
                practitioner,
                work_id,
            } => {
                let (owner, removed) = with_archive(config, link, |holder| {
                    let record = lookup(holder, practitioner)?;
                    let removed = record
                        .work(work_id)
                        .map(|w| w.name.clone())
                        .unwrap_or_default();
                    let owner = record.name.clone();
                    let record = record.without_work(work_id)?;
                    holder.update(|state| state.with_practitioner(record));
                    Ok((owner, removed))
                })?;

                println!("Removed work '{}' from '{}'", removed, owner);
                Ok(())
            }
        }
    }
}
